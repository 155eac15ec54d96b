//! Shared utilities available to all phases

pub mod command;

pub use command::{capture, display_cmd, run_in, Captured};
