//! OData module
//!
//! HTTP client and schema utilities for SuccessFactors OData APIs

pub mod client;
pub mod metadata;

pub use client::{build_http_client, ODataClient, ODataError};
pub use metadata::{extract_schema, parse_metadata, FieldAttribute, MetadataError, SchemaDictionary};
