//! Cooperative cancellation for batch runs.

mod token;

pub use token::{Cancellation, CancellationToken};
