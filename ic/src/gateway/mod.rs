//! External service gateway
//!
//! Contracts for the classification, decomposition, clarification,
//! alternatives and generation services, plus the HTTP implementation.

use std::sync::Arc;

use tracing::debug;

pub mod client;
mod error;
mod http;
mod types;

pub use client::Gateway;
pub use error::ServiceError;
pub use http::HttpGateway;
pub use types::{
    AlternativesRequest, AlternativesResponse, ClarificationResponse, ClarifyRequest, ClassifyRequest,
    ClassifyResponse, DecomposeRequest, DecompositionResponse, GenerateRequest, GenerateResponse, HealthStatus,
    RequestKind,
};

use crate::config::GatewayConfig;

/// Create the gateway described by the config
pub fn create_gateway(config: &GatewayConfig) -> Result<Arc<dyn Gateway>, ServiceError> {
    debug!(base_url = %config.base_url, "create_gateway: called");
    Ok(Arc::new(HttpGateway::from_config(config)?))
}
