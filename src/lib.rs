//! Lightweight Bitcoin Core RPC client library.
//!
//! This crate wraps a dozen of bitcoind's JSON-RPC methods (unspent outputs,
//! raw transaction creation/signing/broadcast, block and transaction lookups,
//! wallet addresses) behind a blocking [`Client`]. Every call is a single
//! HTTP POST with basic authentication; responses are reshaped into the
//! records of the [`types`] module.

mod client;
mod config;
mod error;
mod transport;
pub mod types;

pub use client::{CLIENT_ID, Client, JSONRPC_VERSION, MAX_CONFIRMATIONS, MIN_CONFIRMATIONS};
pub use config::{Auth, Config, DEFAULT_HOST, DEFAULT_PORT, RpcErrorPolicy};
pub use error::{Error, Result, TransportError};
pub use transport::{HttpRequest, HttpTransport, Transport};

pub use jsonrpc;
