//! Gateway trait definition

use async_trait::async_trait;

use super::{
    AlternativesRequest, AlternativesResponse, ClarificationResponse, ClarifyRequest, ClassifyRequest,
    ClassifyResponse, DecomposeRequest, DecompositionResponse, GenerateRequest, GenerateResponse, HealthStatus,
    ServiceError,
};

/// Request/response contracts of the negotiation services
///
/// Each call is independent; the gateway holds no conversation state.
/// The workflow controller decides what to send and how to apply results.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Categorize free text as telecom, greeting or off-topic
    async fn classify(&self, request: &ClassifyRequest) -> Result<ClassifyResponse, ServiceError>;

    /// Break a request into services and rank candidates for each
    async fn decompose(&self, request: &DecomposeRequest) -> Result<DecompositionResponse, ServiceError>;

    /// Re-decompose with user clarification and prior decisions as context
    async fn clarify(&self, request: &ClarifyRequest) -> Result<ClarificationResponse, ServiceError>;

    /// Suggest replacement services for the refused ones
    async fn alternatives(&self, request: &AlternativesRequest) -> Result<AlternativesResponse, ServiceError>;

    /// Build the final intent from the validated selection
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, ServiceError>;

    /// Probe backend availability
    async fn health(&self) -> Result<HealthStatus, ServiceError>;
}
