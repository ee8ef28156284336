//! SuccessFactors OData API documentation generator
//!
//! Downloads entity metadata and sample responses from a SuccessFactors
//! OData v2 API and compiles them into a spreadsheet technical reference.

pub mod auth;
pub mod config;
pub mod endpoints;
pub mod flatten;
pub mod odata;
pub mod pipeline;
pub mod report;

pub use auth::{authenticate, AuthError, Credential, CredentialChain};
pub use config::{Config, RuntimeConfig};
pub use endpoints::{run_endpoints, EndpointResult, EndpointSpec};
pub use flatten::{flatten, FlattenedField, Flattener};
pub use odata::{extract_schema, FieldAttribute, ODataClient, ODataError, SchemaDictionary};
pub use report::{cleanup, compose, ReportError, Workbook};
