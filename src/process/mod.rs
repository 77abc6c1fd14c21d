//! Child process plumbing.
//!
//! - `launcher`: spawns an artifact, applies the long-running policy and
//!   wires up the session's tasks.
//! - `heuristic`: the long-running classifier.
//! - `pump`: reads stdout/stderr into outbound events.
//! - `codec`: line framing for process output.
//! - `stdin`: forwards client input to the program.
//! - `exit`: exit watcher and exit-code policy.

pub mod codec;
pub mod exit;
pub mod heuristic;
pub mod launcher;
pub mod pump;
pub mod stdin;
