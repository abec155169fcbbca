//! Service decomposition types
//!
//! Identified services, ranked candidates and the per-round mappings built
//! from them. Field names on the wire follow the decomposition backend.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// A sub-service found by decomposition or clarification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifiedService {
    /// Unique within one decomposition round
    #[serde(rename = "nom", alias = "name")]
    pub name: String,

    /// Why the decomposer believes this service is needed
    #[serde(rename = "raison", alias = "reason")]
    pub reason: String,

    /// Properties the user stated for this service only
    #[serde(rename = "proprietes", alias = "requiredProperties", default)]
    pub required_properties: BTreeMap<String, Value>,
}

impl IdentifiedService {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
            required_properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.required_properties.insert(key.into(), value);
        self
    }
}

/// Reference to a customer-facing service a candidate depends on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyRef {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub href: String,
}

/// One concrete implementation option for a sub-service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCandidate {
    /// Unique within its service's candidate list
    pub service_id: String,
    pub name: String,
    pub description: String,
    /// Relevance score in [0, 1]
    pub score: f64,
    #[serde(default)]
    pub dependencies: Vec<DependencyRef>,
}

impl ServiceCandidate {
    pub fn new(service_id: impl Into<String>, name: impl Into<String>, score: f64) -> Self {
        Self {
            service_id: service_id.into(),
            name: name.into(),
            description: String::new(),
            score,
            dependencies: Vec::new(),
        }
    }
}

/// Service name -> ranked candidates (highest first), current round only
pub type CandidateCatalog = BTreeMap<String, Vec<ServiceCandidate>>;

/// Service name -> picked candidate id, current round only
pub type Picks = BTreeMap<String, String>;

/// Service name -> chosen candidate, accumulated across rounds
pub type ValidatedSelection = BTreeMap<String, ServiceCandidate>;

/// Find a candidate by id within one service's list
pub fn find_candidate<'a>(catalog: &'a CandidateCatalog, service: &str, id: &str) -> Option<&'a ServiceCandidate> {
    debug!(%service, %id, "find_candidate: called");
    catalog
        .get(service)
        .and_then(|candidates| candidates.iter().find(|c| c.service_id == id))
}

/// Names of the given services, in order
pub fn service_names(services: &[IdentifiedService]) -> Vec<String> {
    services.iter().map(|s| s.name.clone()).collect()
}
