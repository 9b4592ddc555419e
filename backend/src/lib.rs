//! Price update re-encoder
//!
//! Fetches price accumulator updates from Hermes, decodes them into typed
//! records, and re-encodes a chosen subset into a fresh accumulator payload
//! and on-chain calldata.
//!
//! The [`codec`] module is pure and synchronous; everything async
//! (fetching, report files) lives in [`hermes_client`] and [`pipeline`].

pub mod codec;
pub mod config;
pub mod error;
pub mod hermes_client;
pub mod pipeline;
pub mod symbols;
pub mod types;
