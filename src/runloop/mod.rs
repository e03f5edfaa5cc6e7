//! Run loop controller
//!
//! Drives the iterate-classify-persist cycle until a terminal condition is
//! reached, applying the retry/backoff policy on recoverable failures.

pub mod backoff;
pub mod controller;

pub use backoff::BackoffPolicy;
pub use controller::RunLoopController;
