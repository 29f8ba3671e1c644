//! This crate provides snapgate, a gateway that gives authenticated clients remote access to
//! subsets of large particle simulation snapshots over HTTP. Clients exchange credentials for a
//! time-limited bearer token, then request a named field from a registered snapshot with an
//! optional boolean or index mask; only the selected rows are read from disk and returned as a
//! typed, JSON-transportable array that the client can reconstruct losslessly.
//!
//! The gateway is built on top of a number of open source components.
//!
//! * [Tokio](tokio), the most popular asynchronous Rust runtime.
//! * [Axum](axum) web framework, built by the Tokio team on top of various popular components,
//!   including the [hyper] HTTP library.
//! * [Serde](serde) performs (de)serialisation of JSON request and response data.
//! * [jsonwebtoken] signs and verifies the bearer tokens issued after credential exchange.
//! * [ndarray] provides [NumPy](https://numpy.org)-like n-dimensional arrays used when slicing
//!   multi-dimensional fields.

pub mod app;
pub mod app_state;
pub mod array;
pub mod auth;
pub mod cli;
pub mod error;
pub mod loader;
pub mod masks;
pub mod metadata;
pub mod metrics;
pub mod models;
pub mod payload;
pub mod resolver;
pub mod server;
pub mod snapshot;
#[cfg(test)]
pub mod test_utils;
pub mod tracing;
pub mod validated_json;
