//! Interactive execution sessions.
//!
//! `controller` drives the lifecycle, `registry` tracks what each live
//! session owns, and `state` holds the shared lifecycle state.

pub mod controller;
pub mod registry;
pub mod state;
