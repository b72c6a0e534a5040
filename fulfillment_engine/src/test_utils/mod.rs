//! Helpers for tests that need a real database. Not for production use.
pub mod prepare_env;
pub mod seed;
