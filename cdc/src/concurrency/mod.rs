//! Coordination primitives shared by capture workers.

pub mod shutdown;
