//! Command implementations.

mod fetch;

pub use fetch::{fetch, write_payload};
