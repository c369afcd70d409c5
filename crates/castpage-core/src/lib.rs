//! Low-level helpers shared by the castpage crates.
//!
//! Provides the atomic text writer used for state and artifact persistence and
//! the wall-clock helpers the rate limiter and state store stamp records with.

pub mod atomic_io;
pub mod time_utils;

pub use atomic_io::write_text_atomic;
pub use time_utils::{current_unix_timestamp_ms, is_outside_window};
