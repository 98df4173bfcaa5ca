//! Dataset configuration read at startup and by the admin API.
//!
//! ```json
//! {
//!   "datasets": [
//!     {
//!       "name": "ds1",
//!       "endpoints": [
//!         { "name": "sparql", "operation": "query" },
//!         { "name": "data", "operation": "gsp-rw" }
//!       ],
//!       "access_control": {
//!         "users": { "alice": { "graphs": ["http://example/g1"] } }
//!       }
//!     }
//!   ]
//! }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use triplegate_core::{Quad, SecurityContext};

use crate::access::StaticAuthorization;
use crate::service::dataset::{DataService, Endpoint};
use crate::service::error::ConfigError;
use crate::service::operations::OperationRegistry;
use crate::storage::MemoryDataset;
use crate::traits::DatasetGraph;

/// Errors raised while reading a setup file.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// ServerSetup
// ---------------------------------------------------------------------------

/// Everything the server serves, as read from configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSetup {
    #[serde(default)]
    pub datasets: Vec<DatasetConfig>,
}

impl ServerSetup {
    /// Reads a JSON setup file.
    ///
    /// # Errors
    ///
    /// Returns `SetupError::Io` if the file cannot be read and
    /// `SetupError::Parse` if it is not a valid setup document.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SetupError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SetupError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| SetupError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Checks that dataset names are unique.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::DuplicateDataset` for the first repeated name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for dataset in &self.datasets {
            if !seen.insert(dataset.access_point_name()) {
                return Err(ConfigError::DuplicateDataset {
                    name: dataset.access_point_name().to_string(),
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DatasetConfig
// ---------------------------------------------------------------------------

/// One dataset: its routing name, endpoints, seed data and access control.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetConfig {
    pub name: String,
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
    /// Quads loaded into the in-memory store before serving.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<Quad>,
    /// Present when the dataset is filtered per identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_control: Option<AccessControlConfig>,
}

/// Endpoint name and the identifier of the operation it exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointConfig {
    pub name: String,
    pub operation: String,
}

impl EndpointConfig {
    #[must_use]
    pub fn new(name: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operation: operation.into(),
        }
    }
}

/// Per-user graph visibility for an access-controlled dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessControlConfig {
    #[serde(default)]
    pub users: BTreeMap<String, SecurityContext>,
    /// Context for requests that carry no identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anonymous: Option<SecurityContext>,
}

impl AccessControlConfig {
    fn authorization(&self) -> StaticAuthorization {
        let mut auth = StaticAuthorization::new(self.users.clone().into_iter().collect());
        if let Some(anonymous) = &self.anonymous {
            auth = auth.with_anonymous(anonymous.clone());
        }
        auth
    }
}

impl DatasetConfig {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn endpoint(mut self, name: impl Into<String>, operation: impl Into<String>) -> Self {
        self.endpoints.push(EndpointConfig::new(name, operation));
        self
    }

    #[must_use]
    pub fn with_access_control(mut self, access_control: AccessControlConfig) -> Self {
        self.access_control = Some(access_control);
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: impl IntoIterator<Item = Quad>) -> Self {
        self.data.extend(data);
        self
    }

    /// Routing name: the configured name without a leading `/`.
    #[must_use]
    pub fn access_point_name(&self) -> &str {
        self.name.trim_start_matches('/')
    }

    /// Creates the storage and the data service with its endpoints. Handlers
    /// are left to be resolved from the operation registry.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` for empty names,
    /// `ConfigError::UnknownOperation` for operation ids the registry does
    /// not know, and `ConfigError::DuplicateEndpoint` for repeated endpoint
    /// names.
    pub fn build(&self, operations: &OperationRegistry) -> Result<DataService, ConfigError> {
        let name = self.access_point_name();
        if name.is_empty() {
            return Err(ConfigError::Missing("dataset name".to_string()));
        }

        let store = match &self.access_control {
            Some(access_control) => MemoryDataset::access_controlled(Arc::new(access_control.authorization())),
            None => MemoryDataset::new(),
        }
        .with_quads(self.data.iter().cloned());
        let dataset: Arc<dyn DatasetGraph> = Arc::new(store);

        let mut builder = DataService::builder(name, dataset);
        for endpoint in &self.endpoints {
            if endpoint.name.is_empty() {
                return Err(ConfigError::Missing(format!("endpoint name in dataset '{name}'")));
            }
            let operation = operations.operation(&endpoint.operation)?;
            builder = builder.endpoint(Endpoint::new(endpoint.name.clone(), operation))?;
        }
        Ok(builder.build())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::io::Write;

    use triplegate_core::{GraphName, Operation};

    use super::*;

    const SETUP: &str = r#"{
        "datasets": [
            {
                "name": "/ds1",
                "endpoints": [
                    { "name": "sparql", "operation": "query" },
                    { "name": "data", "operation": "gsp-rw" }
                ],
                "data": [
                    { "subject": "ex:s", "predicate": "ex:p", "object": "ex:o" }
                ]
            },
            {
                "name": "secure",
                "endpoints": [ { "name": "sparql", "operation": "query" } ],
                "access_control": {
                    "users": { "alice": { "graphs": ["http://g1"], "default_graph": true } }
                }
            }
        ]
    }"#;

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SETUP.as_bytes()).unwrap();

        let setup = ServerSetup::from_file(file.path()).unwrap();
        assert_eq!(setup.datasets.len(), 2);
        assert_eq!(setup.datasets[0].access_point_name(), "ds1");
        assert_eq!(setup.datasets[0].data[0].graph, GraphName::Default);

        let acl = setup.datasets[1].access_control.as_ref().unwrap();
        assert!(acl.users["alice"].is_visible(&GraphName::Default));
        assert!(acl.users["alice"].is_visible(&GraphName::named("http://g1")));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ServerSetup::from_file(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, SetupError::Io { .. }));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{ "datasets": [ { "nom": "x" } ] }"#).unwrap();
        let err = ServerSetup::from_file(file.path()).unwrap_err();
        assert!(matches!(err, SetupError::Parse { .. }));
    }

    #[test]
    fn duplicate_dataset_names_rejected() {
        let setup = ServerSetup {
            datasets: vec![DatasetConfig::new("ds1"), DatasetConfig::new("/ds1")],
        };
        assert_eq!(
            setup.validate().unwrap_err(),
            ConfigError::DuplicateDataset {
                name: "ds1".to_string()
            }
        );
    }

    #[test]
    fn builds_service_with_endpoints() {
        let config = DatasetConfig::new("ds1")
            .endpoint("sparql", "query")
            .endpoint("data", "gsp-rw");
        let service = config.build(&OperationRegistry::standard()).unwrap();

        assert_eq!(service.name(), "ds1");
        assert_eq!(
            service.endpoint("data").unwrap().operation(),
            &Operation::GSP_RW
        );
        assert!(!service.dataset().is_access_controlled());
    }

    #[test]
    fn access_control_marks_dataset() {
        let config = DatasetConfig::new("secure")
            .endpoint("sparql", "query")
            .with_access_control(AccessControlConfig::default());
        let service = config.build(&OperationRegistry::standard()).unwrap();
        assert!(service.dataset().is_access_controlled());
    }

    #[test]
    fn unknown_operation_rejected() {
        let config = DatasetConfig::new("ds1").endpoint("x", "teleport");
        let err = config.build(&OperationRegistry::standard()).unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownOperation {
                id: "teleport".to_string()
            }
        );
    }

    #[test]
    fn empty_name_rejected() {
        let err = DatasetConfig::new("/").build(&OperationRegistry::standard()).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }
}
