//! Configuration records and TOML loading.
//!
//! Every record fills missing keys from its defaults and rejects keys it
//! doesn't know.

use std::path::Path;
use serde::Deserialize;
use crate::core::{AuxiliaryFields, FileSource, Result};
use crate::transport::HttpTransportConfig;

/// What a dispatcher sends and where.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    /// URL the file is posted to
    pub endpoint: String,
    pub file: FileSource,
    /// Extra form fields sent with the file
    pub fields: AuxiliaryFields,
    /// Emit diagnostic lines for every lifecycle event
    pub debug: bool,
}

impl UploadConfig {
    pub fn new(endpoint: impl Into<String>, file: impl Into<FileSource>) -> Self {
        Self {
            endpoint: endpoint.into(),
            file: file.into(),
            ..Default::default()
        }
    }

    pub fn with_fields(mut self, fields: impl Into<AuxiliaryFields>) -> Self {
        self.fields = fields.into();
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

/// Contents of a `charon.toml` file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub upload: UploadConfig,
    pub transport: HttpTransportConfig,
}

impl Settings {
    pub fn from_toml_str(source: &str) -> Result<Settings> {
        Ok(toml::from_str(source)?)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Settings> {
        let source = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_toml_str(&source)
    }
}
