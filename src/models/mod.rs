//! Domain model module declarations.

pub mod artifact;
pub mod event;
pub mod session;
