/*
[INPUT]:  HTTP client configuration, session state and API endpoints
[OUTPUT]: HTTP responses and typed API results
[POS]:    HTTP layer - REST API communication
[UPDATE]: When changing client behavior or call semantics
*/

pub mod client;
pub mod error;
pub mod gateway;

pub use client::{ClientConfig, RestClient};
pub use error::{NordnetError, Result};
pub use gateway::CallGateway;
