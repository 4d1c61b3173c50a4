/*
[INPUT]:  Public API exports for nordnet-next-feed crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod config;
pub mod runner;

// Re-export main types for convenience
pub use config::{RunnerConfig, SubscriptionConfig};
pub use runner::{FeedRunner, RunSummary, credentials_from_env};
