//! Async driver pairing the controller with a gateway

use std::sync::Arc;

use tracing::debug;

use super::controller::{ClassifyOutcome, Controller, Settled, ValidateOutcome};
use super::error::WorkflowError;
use super::state::Step;
use crate::config::NegotiationConfig;
use crate::domain::ConversationState;
use crate::gateway::{Gateway, HealthStatus, ServiceError};

/// Runs one negotiation against a gateway
///
/// Every action takes `&mut self` and awaits its call to completion, so at
/// most one call is in flight. After each action the caller renders
/// [`Negotiator::step`]; errors are also kept in [`Negotiator::last_error`].
pub struct Negotiator {
    controller: Controller,
    gateway: Arc<dyn Gateway>,
}

impl Negotiator {
    pub fn new(gateway: Arc<dyn Gateway>, config: &NegotiationConfig) -> Self {
        Self {
            controller: Controller::new(config),
            gateway,
        }
    }

    pub fn step(&self) -> &Step {
        self.controller.step()
    }

    pub fn conversation(&self) -> &ConversationState {
        self.controller.conversation()
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn last_error(&self) -> Option<&str> {
        self.controller.last_error()
    }

    /// Classify a request; telecom requests are decomposed right away
    pub async fn submit(&mut self, text: &str) -> Result<(), WorkflowError> {
        debug!(text_len = text.len(), "submit: called");
        let pending = self.controller.begin_classify(text)?;
        let result = self.gateway.classify(&pending.request).await;

        match self.controller.complete_classify(pending, result)? {
            Settled::Applied(ClassifyOutcome::Decompose(next)) => {
                let result = self.gateway.decompose(&next.request).await;
                log_stale(self.controller.complete_decompose(next, result)?, "decompose");
            }
            Settled::Applied(ClassifyOutcome::NonTelecom) => {
                debug!("submit: non-telecom request");
            }
            Settled::Stale => debug!("submit: stale classification"),
        }
        Ok(())
    }

    pub fn select(&mut self, service: &str, candidate_id: &str) -> Result<(), WorkflowError> {
        self.controller.select(service, candidate_id)
    }

    pub fn deselect(&mut self, service: &str) -> Result<bool, WorkflowError> {
        self.controller.deselect(service)
    }

    /// Validate picks, generating the intent when every service is resolved
    pub async fn validate(&mut self) -> Result<(), WorkflowError> {
        debug!("validate: called");
        match self.controller.validate()? {
            ValidateOutcome::Generate(pending) => {
                let result = self.gateway.generate(&pending.request).await;
                log_stale(self.controller.complete_generate(pending, result)?, "generate");
            }
            ValidateOutcome::Incomplete { refused } => {
                debug!(?refused, "validate: incomplete");
            }
        }
        Ok(())
    }

    pub async fn clarify(&mut self, text: &str) -> Result<(), WorkflowError> {
        debug!(text_len = text.len(), "clarify: called");
        let pending = self.controller.begin_clarify(text)?;
        let result = self.gateway.clarify(&pending.request).await;
        log_stale(self.controller.complete_clarify(pending, result)?, "clarify");
        Ok(())
    }

    pub async fn request_alternatives(&mut self) -> Result<(), WorkflowError> {
        debug!("request_alternatives: called");
        let pending = self.controller.begin_alternatives()?;
        let result = self.gateway.alternatives(&pending.request).await;
        log_stale(self.controller.complete_alternatives(pending, result)?, "alternatives");
        Ok(())
    }

    /// Generate the intent from the services validated so far
    pub async fn finish(&mut self) -> Result<(), WorkflowError> {
        debug!("finish: called");
        let pending = self.controller.begin_finish()?;
        let result = self.gateway.generate(&pending.request).await;
        log_stale(self.controller.complete_generate(pending, result)?, "generate");
        Ok(())
    }

    pub fn reset(&mut self) {
        self.controller.reset();
    }

    /// Probe the backend; does not touch the negotiation
    pub async fn health(&self) -> Result<HealthStatus, ServiceError> {
        self.gateway.health().await
    }
}

fn log_stale<T>(settled: Settled<T>, operation: &str) {
    if settled.is_stale() {
        debug!(%operation, "negotiator: result discarded as stale");
    }
}
