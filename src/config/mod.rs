//! Configuration module

pub mod config;

pub use config::{
    AuthConfig, Config, ConfigError, HttpConfig, PathsConfig, ReferenceSheetConfig,
    RuntimeConfig, ServerConfig, TemplateConfig,
};
