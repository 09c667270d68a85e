//! Shared configuration types for change capture.

mod base;
mod connection;
mod replicator;
mod source;

pub use base::ValidationError;
pub use connection::{PgConnectionConfig, PgConnectionConfigWithoutSecrets, TcpKeepaliveConfig};
pub use replicator::{ReplicatorConfig, ReplicatorConfigWithoutSecrets};
pub use source::{DecodingDialect, SourceConfig, SourceConfigWithoutSecrets};
