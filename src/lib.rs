#![forbid(unsafe_code)]

//! Interactive execution sessions: launch a compiled program, stream its
//! console over a full-duplex channel, and tear everything down reliably.

pub mod compiler;
pub mod config;
pub mod errors;
pub mod models;
pub mod process;
pub mod retention;
pub mod session;
pub mod store;
pub mod transport;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
