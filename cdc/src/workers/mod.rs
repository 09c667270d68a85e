//! Capture workers and the pool that runs them.

pub mod base;
pub mod capture;
pub mod pool;
