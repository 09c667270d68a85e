//! Conversions from source text representations into typed [`crate::types::Cell`]s.

pub mod bool;
pub mod hex;
pub mod numeric;
pub mod text;
