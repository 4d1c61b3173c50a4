/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public nExt adapter crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod auth;
pub mod client;
pub mod config;
pub mod feed;
pub mod http;
pub mod types;

pub use client::Nordnet;
pub use reqwest::Method;

pub use config::{FeedConfig, NordnetConfig, PublicKeySource};

// Re-export commonly used types from auth
pub use auth::{LoginEncryptor, Session, SessionManager, SessionStore, encrypt_login};

// Re-export commonly used types from http
pub use http::{CallGateway, ClientConfig, NordnetError, RestClient, Result};

// Re-export commonly used types from feed
pub use feed::{FeedCommand, FeedEvent, FeedEventBody, FeedEventBus, FeedHub};

// Re-export all types
pub use types::*;
