//! Exchange integration
//!
//! # Components
//!
//! - [`client`] - REST client, HTTP fetcher with timeout/retry, JSON decoder
//! - [`models`] - Request/response data types and the typed request builder
//! - [`signer`] - HMAC request signing and nonces
//! - [`gateway`] - Collaborator traits and the simulation gateway

pub mod client;
pub mod gateway;
pub mod models;
pub mod signer;

// Re-export commonly used types
pub use client::{decode, CexClient, HttpFetcher, DEFAULT_BASE_URL};
pub use gateway::{AccountData, MarketData, OrderGateway, SimulatedGateway};
pub use models::{RequestParams, SignedRequest, Ticker};
pub use signer::{sign, Credentials, NonceSource};
