//! JSON-RPC API Layer
//!
//! Exposes the queue estimator, appointment booking and maintenance over
//! JSON-RPC 2.0, plus a live subscription to queue events.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use handler::RpcHandler;
pub use server::{RpcServer, RpcServerConfig};
