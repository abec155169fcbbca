//! Shared test data for workflow tests

use serde_json::json;

use crate::domain::{CandidateCatalog, FinalIntent, IdentifiedService, ServiceCandidate};
use crate::gateway::{
    ClarificationResponse, ClassifyResponse, DecompositionResponse, GenerateResponse, RequestKind, ServiceError,
};

pub fn telecom() -> ClassifyResponse {
    ClassifyResponse {
        kind: RequestKind::Telecom,
        message: "Demande télécom identifiée. Analyse en cours...".to_string(),
    }
}

pub fn greeting() -> ClassifyResponse {
    ClassifyResponse {
        kind: RequestKind::Greeting,
        message: "Bonjour ! Comment puis-je vous aider ?".to_string(),
    }
}

pub fn camera_alert() -> DecompositionResponse {
    let mut candidates = CandidateCatalog::new();
    candidates.insert(
        "Camera".to_string(),
        vec![
            ServiceCandidate::new("cam-1", "Video Analytics", 0.91),
            ServiceCandidate::new("cam-2", "Edge Vision", 0.74),
        ],
    );
    candidates.insert(
        "Alert".to_string(),
        vec![
            ServiceCandidate::new("sms-1", "SMS Alert", 0.66),
            ServiceCandidate::new("mail-1", "Email Alert", 0.41),
        ],
    );

    DecompositionResponse {
        services: vec![
            IdentifiedService::new("Camera", "video surveillance").with_property("nb_cameras", json!(12)),
            IdentifiedService::new("Alert", "notify on intrusion"),
        ],
        candidates,
    }
}

/// Clarification round replacing Alert with Push, keeping Camera
pub fn camera_push(pre_validated: Option<Vec<&str>>) -> ClarificationResponse {
    let mut candidates = CandidateCatalog::new();
    candidates.insert(
        "Camera".to_string(),
        vec![
            ServiceCandidate::new("cam-3", "Smart Cam", 0.95),
            ServiceCandidate::new("cam-2", "Edge Vision", 0.74),
        ],
    );
    candidates.insert(
        "Push".to_string(),
        vec![ServiceCandidate::new("push-1", "Push Notification", 0.7)],
    );

    ClarificationResponse {
        services: vec![
            IdentifiedService::new("Camera", "video surveillance"),
            IdentifiedService::new("Push", "mobile notification"),
        ],
        candidates,
        pre_validated: pre_validated.map(|names| names.into_iter().map(String::from).collect()),
    }
}

pub fn intent(name: &str) -> GenerateResponse {
    GenerateResponse {
        intent: FinalIntent::new(name),
    }
}

pub fn server_error(message: &str) -> ServiceError {
    ServiceError::Api {
        status: 500,
        message: message.to_string(),
    }
}
