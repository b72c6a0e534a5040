//! # Marketplace fulfillment server
//! This crate hosts the HTTP server for the marketplace fulfillment engine. It is responsible for:
//! * Verifying who is calling, and whether their role may use the route they called.
//! * Receiving signed payment notifications from the payment gateway.
//! * Handing each request to the matching engine API.
//! * Delivering the engine's push notices and supplying driver ETAs, through the [integrations] clients.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/payments/webhook`: Payment gateway notifications. Requests must carry a valid HMAC signature.
//! * `/api/...`: Customer, merchant, driver and admin routes. See [routes] for the full list.

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
