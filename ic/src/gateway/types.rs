//! Wire types for the negotiation services
//!
//! Rust field names are English; serde renames carry the names the
//! backend actually speaks.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{CandidateCatalog, FinalIntent, IdentifiedService, ValidatedSelection};

/// Category assigned by the classification service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestKind {
    #[serde(rename = "TELECOM")]
    Telecom,
    #[serde(rename = "GREETING")]
    Greeting,
    #[serde(rename = "OUT_OF_SCOPE", alias = "OFF_TOPIC")]
    OffTopic,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Telecom => write!(f, "TELECOM"),
            Self::Greeting => write!(f, "GREETING"),
            Self::OffTopic => write!(f, "OFF_TOPIC"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifyRequest {
    pub user_input: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifyResponse {
    #[serde(rename = "type")]
    pub kind: RequestKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecomposeRequest {
    pub user_input: String,
}

/// Services and candidates of one decomposition round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecompositionResponse {
    #[serde(rename = "services_identifies")]
    pub services: Vec<IdentifiedService>,
    pub candidates: CandidateCatalog,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarifyRequest {
    #[serde(rename = "user_clarification")]
    pub clarification: String,
    #[serde(rename = "services_valides_noms")]
    pub validated_names: Vec<String>,
    #[serde(rename = "services_refuses")]
    pub refused_names: Vec<String>,
    pub original_request: String,
    #[serde(rename = "services_valides_data")]
    pub validated: ValidatedSelection,
    #[serde(rename = "services_identifies_precedents")]
    pub previous_services: Vec<IdentifiedService>,
}

/// A decomposition round produced by clarification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarificationResponse {
    #[serde(rename = "services_identifies")]
    pub services: Vec<IdentifiedService>,
    pub candidates: CandidateCatalog,
    /// Services whose pick should be carried into the new round
    #[serde(rename = "pre_validated_services", default)]
    pub pre_validated: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativesRequest {
    #[serde(rename = "services_refuses")]
    pub refused_names: Vec<String>,
    #[serde(rename = "services_valides")]
    pub validated_names: Vec<String>,
    #[serde(rename = "historique")]
    pub history: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativesResponse {
    pub alternatives: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    #[serde(rename = "services_valides")]
    pub validated: ValidatedSelection,
    #[serde(rename = "services_identifies")]
    pub services: Vec<IdentifiedService>,
    #[serde(rename = "user_request_original")]
    pub original_request: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub intent: FinalIntent,
}

/// Body of the backend health probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy") || self.status.eq_ignore_ascii_case("ok")
    }
}
