//! Clients for the external services the engine consumes. Both are best-effort: callers log their failures and move on.
pub mod expo;
pub mod locationiq;

pub use expo::ExpoNotifier;
pub use locationiq::LocationIqRouter;
