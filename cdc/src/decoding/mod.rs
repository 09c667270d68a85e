//! Decoding of the text records produced by logical decoding output plugins.

pub mod escape;
pub mod metadata;
pub mod parser;
pub mod scanner;
pub mod type_hints;

pub use escape::{quote_identifier, quote_literal};
pub use metadata::{NoTableMetadata, StaticTableMetadata, TableMetadata, TableMetadataProvider};
pub use parser::{ControlMarker, DecodedRecord, LogicalDecodingParser, parse_control_marker};
