//! Workflow controller - the negotiation state machine
//!
//! Every remote call is split in two halves. `begin_*` checks preconditions,
//! marks the controller busy and hands back a [`Pending`] holding the wire
//! request. `complete_*` takes the pending call back together with the
//! gateway's result and applies the transition. Nothing is committed until
//! a call succeeds, and results from before a [`Controller::reset`] are
//! discarded.

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::{RequestError, WorkflowError};
use super::reducer;
use super::state::Step;
use crate::config::NegotiationConfig;
use crate::domain::{ConversationState, FinalIntent, IdentifiedService, Picks, find_candidate, service_names};
use crate::gateway::{
    AlternativesRequest, AlternativesResponse, ClarificationResponse, ClarifyRequest, ClassifyRequest,
    ClassifyResponse, DecomposeRequest, DecompositionResponse, GenerateRequest, GenerateResponse, RequestKind,
    ServiceError,
};

/// Identifies one in-flight call within one epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    epoch: u64,
    seq: u64,
}

/// A call that has been started but not yet applied
#[derive(Debug)]
pub struct Pending<R> {
    ticket: Ticket,
    /// Wire request to send through the gateway
    pub request: R,
    /// History entries committed only if the call succeeds
    staged: Vec<String>,
}

/// Result of applying a call's response
#[derive(Debug, PartialEq)]
pub enum Settled<T> {
    Applied(T),
    /// The response belonged to a call from before a reset; ignored
    Stale,
}

impl<T> Settled<T> {
    pub fn is_stale(&self) -> bool {
        matches!(self, Settled::Stale)
    }
}

/// What happens after classification
#[derive(Debug)]
pub enum ClassifyOutcome {
    /// Telecom request; decomposition must be sent next
    Decompose(Pending<DecomposeRequest>),
    /// Greeting or off-topic; the negotiation stops here
    NonTelecom,
}

/// What happens after validation
#[derive(Debug)]
pub enum ValidateOutcome {
    /// Every service has a candidate; generation must be sent next
    Generate(Pending<GenerateRequest>),
    /// These services are still unresolved
    Incomplete { refused: Vec<String> },
}

/// Negotiation state machine
pub struct Controller {
    step: Step,
    conversation: ConversationState,
    negotiation_id: Uuid,
    epoch: u64,
    next_seq: u64,
    in_flight: Option<Ticket>,
    last_error: Option<String>,
    rounds: u32,
    max_rounds: u32,
}

impl Controller {
    pub fn new(config: &NegotiationConfig) -> Self {
        let negotiation_id = Uuid::now_v7();
        debug!(%negotiation_id, max_rounds = config.max_clarification_rounds, "Controller::new: called");
        Self {
            step: Step::Input,
            conversation: ConversationState::default(),
            negotiation_id,
            epoch: 0,
            next_seq: 0,
            in_flight: None,
            last_error: None,
            rounds: 0,
            max_rounds: config.max_clarification_rounds,
        }
    }

    pub fn step(&self) -> &Step {
        &self.step
    }

    pub fn conversation(&self) -> &ConversationState {
        &self.conversation
    }

    pub fn negotiation_id(&self) -> Uuid {
        self.negotiation_id
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// True while a call is in flight
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// The single user-visible error message, if the last action failed
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Clarification rounds completed in this negotiation
    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    // ------------------------------------------------------------------
    // Classification and decomposition
    // ------------------------------------------------------------------

    /// Start classifying a new request
    pub fn begin_classify(&mut self, text: &str) -> Result<Pending<ClassifyRequest>, WorkflowError> {
        debug!(text_len = text.len(), "begin_classify: called");
        self.ensure_idle()?;
        self.expect_step(matches!(self.step, Step::Input), "classify")?;

        let text = text.trim();
        if text.is_empty() {
            return Err(self.fail(RequestError::EmptyInput));
        }

        self.last_error = None;
        Ok(self.issue(
            ClassifyRequest {
                user_input: text.to_string(),
            },
            Vec::new(),
        ))
    }

    /// Apply the classification result
    ///
    /// A telecom request chains straight into decomposition without leaving
    /// `Input`; the classification is only recorded once decomposition succeeds.
    pub fn complete_classify(
        &mut self,
        pending: Pending<ClassifyRequest>,
        result: Result<ClassifyResponse, ServiceError>,
    ) -> Result<Settled<ClassifyOutcome>, WorkflowError> {
        let Some(response) = self.settle(pending.ticket, result)? else {
            return Ok(Settled::Stale);
        };
        let text = pending.request.user_input;
        info!(negotiation = %self.negotiation_id, kind = %response.kind, "complete_classify: classified");

        let entries = vec![
            format!("Request: {}", text),
            format!("Classification: {}", response.kind),
        ];

        match response.kind {
            RequestKind::Telecom => {
                let next = self.issue(DecomposeRequest { user_input: text }, entries);
                Ok(Settled::Applied(ClassifyOutcome::Decompose(next)))
            }
            kind @ (RequestKind::Greeting | RequestKind::OffTopic) => {
                self.conversation = ConversationState {
                    history: self.conversation.history_with(entries),
                    ..self.conversation.clone()
                };
                self.step = Step::ClassifiedNonTelecom {
                    kind,
                    message: response.message,
                };
                Ok(Settled::Applied(ClassifyOutcome::NonTelecom))
            }
        }
    }

    /// Apply the decomposition of a telecom request
    pub fn complete_decompose(
        &mut self,
        pending: Pending<DecomposeRequest>,
        result: Result<DecompositionResponse, ServiceError>,
    ) -> Result<Settled<()>, WorkflowError> {
        let Some(response) = self.settle(pending.ticket, result)? else {
            return Ok(Settled::Stale);
        };
        if let Err(e) = check_round(&response.services) {
            return Err(self.fail(e));
        }

        let summary = format!(
            "Decomposition: {} services identified ({})",
            response.services.len(),
            service_names(&response.services).join(", ")
        );
        info!(
            negotiation = %self.negotiation_id,
            services = response.services.len(),
            "complete_decompose: round ready"
        );

        let mut entries = pending.staged;
        entries.push(summary);
        self.conversation = ConversationState {
            original_request: pending.request.user_input,
            validated: self.conversation.validated.clone(),
            identified_services: response.services,
            history: self.conversation.history_with(entries),
        };
        self.step = Step::AwaitingValidation {
            catalog: response.candidates,
            picks: Picks::new(),
        };
        Ok(Settled::Applied(()))
    }

    // ------------------------------------------------------------------
    // Picking and validation
    // ------------------------------------------------------------------

    /// Pick a candidate for a service of the current round
    pub fn select(&mut self, service: &str, candidate_id: &str) -> Result<(), WorkflowError> {
        debug!(%service, %candidate_id, "select: called");
        self.ensure_idle()?;
        self.expect_step(matches!(self.step, Step::AwaitingValidation { .. }), "select a candidate")?;

        if !self.conversation.identified_services.iter().any(|s| s.name == service) {
            return Err(self.fail(RequestError::UnknownService(service.to_string())));
        }
        let offered = self
            .step
            .catalog()
            .is_some_and(|catalog| find_candidate(catalog, service, candidate_id).is_some());
        if !offered {
            let err = RequestError::UnknownCandidate {
                service: service.to_string(),
                candidate: candidate_id.to_string(),
            };
            return Err(self.fail(err));
        }

        if let Step::AwaitingValidation { picks, .. } = &mut self.step {
            picks.insert(service.to_string(), candidate_id.to_string());
        }
        self.last_error = None;
        Ok(())
    }

    /// Remove a pick; returns whether there was one
    pub fn deselect(&mut self, service: &str) -> Result<bool, WorkflowError> {
        debug!(%service, "deselect: called");
        self.ensure_idle()?;
        self.expect_step(matches!(self.step, Step::AwaitingValidation { .. }), "deselect a candidate")?;

        let removed = match &mut self.step {
            Step::AwaitingValidation { picks, .. } => picks.remove(service).is_some(),
            _ => false,
        };
        self.last_error = None;
        Ok(removed)
    }

    /// Validate the current picks
    ///
    /// When every service is resolved the merged selection is only committed
    /// once generation succeeds; otherwise it is committed now and the
    /// negotiation moves to clarification.
    pub fn validate(&mut self) -> Result<ValidateOutcome, WorkflowError> {
        debug!("validate: called");
        self.ensure_idle()?;
        let Step::AwaitingValidation { catalog, picks } = &self.step else {
            return Err(self.wrong_step("validate"));
        };
        if picks.is_empty() {
            return Err(self.fail(RequestError::NoSelection));
        }

        let catalog = catalog.clone();
        let round = reducer::resolve(picks, &catalog);
        let validated_entry = format!("Validated: {}", round.keys().cloned().collect::<Vec<_>>().join(", "));
        let merged = reducer::merge(&self.conversation.validated, round);
        let services = &self.conversation.identified_services;

        if reducer::is_complete(services, &merged) {
            info!(negotiation = %self.negotiation_id, validated = merged.len(), "validate: all services resolved");
            let request = GenerateRequest {
                validated: merged,
                services: services.clone(),
                original_request: self.conversation.original_request.clone(),
            };
            self.last_error = None;
            return Ok(ValidateOutcome::Generate(self.issue(request, vec![validated_entry])));
        }

        let refused = reducer::unresolved(services, &merged);
        info!(negotiation = %self.negotiation_id, refused = ?refused, "validate: services unresolved");
        let entries = [validated_entry, format!("Refused: {}", refused.join(", "))];

        self.conversation = ConversationState {
            validated: merged,
            history: self.conversation.history_with(entries),
            ..self.conversation.clone()
        };
        self.step = Step::AwaitingClarificationOrAlternatives {
            catalog,
            refused: refused.clone(),
            alternatives: Vec::new(),
        };
        self.last_error = None;
        Ok(ValidateOutcome::Incomplete { refused })
    }

    // ------------------------------------------------------------------
    // Clarification / alternatives / finish
    // ------------------------------------------------------------------

    /// Start a clarification round for the refused services
    pub fn begin_clarify(&mut self, text: &str) -> Result<Pending<ClarifyRequest>, WorkflowError> {
        debug!(text_len = text.len(), rounds = self.rounds, "begin_clarify: called");
        self.ensure_idle()?;
        let Step::AwaitingClarificationOrAlternatives { refused, .. } = &self.step else {
            return Err(self.wrong_step("clarify"));
        };
        let refused = refused.clone();

        let text = text.trim();
        if text.is_empty() {
            return Err(self.fail(RequestError::EmptyClarification));
        }
        if self.rounds >= self.max_rounds {
            return Err(self.fail(RequestError::RoundLimitReached(self.max_rounds)));
        }

        let request = ClarifyRequest {
            clarification: text.to_string(),
            validated_names: self.conversation.validated_names(),
            refused_names: refused,
            original_request: self.conversation.original_request.clone(),
            validated: self.conversation.validated.clone(),
            previous_services: self.conversation.identified_services.clone(),
        };
        self.last_error = None;
        Ok(self.issue(request, vec![format!("Clarification: {}", text)]))
    }

    /// Apply a clarification round, pre-filling picks for carried services
    pub fn complete_clarify(
        &mut self,
        pending: Pending<ClarifyRequest>,
        result: Result<ClarificationResponse, ServiceError>,
    ) -> Result<Settled<()>, WorkflowError> {
        let Some(response) = self.settle(pending.ticket, result)? else {
            return Ok(Settled::Stale);
        };
        if let Err(e) = check_round(&response.services) {
            return Err(self.fail(e));
        }

        let pre_validated = response.pre_validated.unwrap_or_default();
        let mut picks = reducer::prefill(&pre_validated, &self.conversation.validated, &response.candidates);
        picks.retain(|name, _| response.services.iter().any(|s| &s.name == name));

        let round = self.rounds + 1;
        info!(
            negotiation = %self.negotiation_id,
            round,
            services = response.services.len(),
            prefilled = picks.len(),
            "complete_clarify: round ready"
        );

        let mut entries = pending.staged;
        entries.push(format!(
            "Clarification round {}: {} services identified ({})",
            round,
            response.services.len(),
            service_names(&response.services).join(", ")
        ));
        self.conversation = ConversationState {
            identified_services: response.services,
            history: self.conversation.history_with(entries),
            ..self.conversation.clone()
        };
        self.rounds = round;
        self.step = Step::AwaitingValidation {
            catalog: response.candidates,
            picks,
        };
        Ok(Settled::Applied(()))
    }

    /// Start a request for alternative services
    pub fn begin_alternatives(&mut self) -> Result<Pending<AlternativesRequest>, WorkflowError> {
        debug!("begin_alternatives: called");
        self.ensure_idle()?;
        let Step::AwaitingClarificationOrAlternatives { refused, .. } = &self.step else {
            return Err(self.wrong_step("request alternatives"));
        };

        let request = AlternativesRequest {
            refused_names: refused.clone(),
            validated_names: self.conversation.validated_names(),
            history: self.conversation.history.clone(),
        };
        self.last_error = None;
        Ok(self.issue(request, Vec::new()))
    }

    /// Store suggested alternatives for display; conversation is untouched
    pub fn complete_alternatives(
        &mut self,
        pending: Pending<AlternativesRequest>,
        result: Result<AlternativesResponse, ServiceError>,
    ) -> Result<Settled<Vec<String>>, WorkflowError> {
        let Some(response) = self.settle(pending.ticket, result)? else {
            return Ok(Settled::Stale);
        };
        debug!(count = response.alternatives.len(), "complete_alternatives: received");

        if let Step::AwaitingClarificationOrAlternatives { alternatives, .. } = &mut self.step {
            *alternatives = response.alternatives.clone();
        }
        Ok(Settled::Applied(response.alternatives))
    }

    /// Start generating an intent from what has been validated so far
    pub fn begin_finish(&mut self) -> Result<Pending<GenerateRequest>, WorkflowError> {
        debug!("begin_finish: called");
        self.ensure_idle()?;
        self.expect_step(
            matches!(self.step, Step::AwaitingClarificationOrAlternatives { .. }),
            "finish",
        )?;
        if self.conversation.validated.is_empty() {
            return Err(self.fail(RequestError::NothingValidated));
        }

        let request = GenerateRequest {
            validated: self.conversation.validated.clone(),
            services: self.conversation.identified_services.clone(),
            original_request: self.conversation.original_request.clone(),
        };
        let entry = format!("Finished with validated: {}", self.conversation.validated_names().join(", "));
        self.last_error = None;
        Ok(self.issue(request, vec![entry]))
    }

    /// Apply a generated intent; commits the selection it was built from
    pub fn complete_generate(
        &mut self,
        pending: Pending<GenerateRequest>,
        result: Result<GenerateResponse, ServiceError>,
    ) -> Result<Settled<FinalIntent>, WorkflowError> {
        let Some(response) = self.settle(pending.ticket, result)? else {
            return Ok(Settled::Stale);
        };
        let intent = response.intent;
        info!(negotiation = %self.negotiation_id, intent = %intent.name, "complete_generate: intent ready");

        let mut entries = pending.staged;
        entries.push(format!("Intent: {}", intent.name));
        self.conversation = ConversationState {
            validated: pending.request.validated,
            history: self.conversation.history_with(entries),
            ..self.conversation.clone()
        };
        self.step = Step::IntentReady { intent: intent.clone() };
        Ok(Settled::Applied(intent))
    }

    // ------------------------------------------------------------------
    // Reset
    // ------------------------------------------------------------------

    /// Return to `Input` with an empty conversation
    ///
    /// Advances the epoch so results of calls started before now are ignored.
    pub fn reset(&mut self) {
        info!(negotiation = %self.negotiation_id, step = %self.step, "reset: called");
        self.step = Step::Input;
        self.conversation = ConversationState::default();
        self.negotiation_id = Uuid::now_v7();
        self.epoch += 1;
        self.in_flight = None;
        self.last_error = None;
        self.rounds = 0;
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn issue<R>(&mut self, request: R, staged: Vec<String>) -> Pending<R> {
        let ticket = Ticket {
            epoch: self.epoch,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.in_flight = Some(ticket);
        debug!(epoch = ticket.epoch, seq = ticket.seq, "issue: call in flight");
        Pending {
            ticket,
            request,
            staged,
        }
    }

    /// Clear the busy flag for a current call and unwrap its result
    ///
    /// Returns `Ok(None)` for a stale ticket without touching any state.
    fn settle<T>(&mut self, ticket: Ticket, result: Result<T, ServiceError>) -> Result<Option<T>, WorkflowError> {
        if ticket.epoch != self.epoch || self.in_flight != Some(ticket) {
            debug!(
                ticket_epoch = ticket.epoch,
                epoch = self.epoch,
                "settle: discarding stale result"
            );
            return Ok(None);
        }
        self.in_flight = None;

        match result {
            Ok(value) => {
                self.last_error = None;
                Ok(Some(value))
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn ensure_idle(&mut self) -> Result<(), WorkflowError> {
        if self.is_busy() {
            return Err(self.fail(RequestError::Busy));
        }
        Ok(())
    }

    fn expect_step(&mut self, ok: bool, operation: &'static str) -> Result<(), WorkflowError> {
        if ok { Ok(()) } else { Err(self.wrong_step(operation)) }
    }

    fn wrong_step(&mut self, operation: &'static str) -> WorkflowError {
        let step = self.step.name();
        self.fail(RequestError::WrongStep { operation, step })
    }

    fn fail(&mut self, err: impl Into<WorkflowError>) -> WorkflowError {
        let err = err.into();
        warn!(negotiation = %self.negotiation_id, step = %self.step, error = %err, "workflow error");
        self.last_error = Some(err.user_message());
        err
    }
}

/// A round must name at least one service, each name once
fn check_round(services: &[IdentifiedService]) -> Result<(), ServiceError> {
    if services.is_empty() {
        return Err(ServiceError::InvalidResponse("No service identified".to_string()));
    }
    let mut seen = std::collections::BTreeSet::new();
    for service in services {
        if !seen.insert(service.name.as_str()) {
            return Err(ServiceError::InvalidResponse(format!(
                "Service '{}' identified twice",
                service.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::fixtures::{camera_alert, camera_push, greeting, intent, server_error, telecom};

    fn controller() -> Controller {
        Controller::new(&NegotiationConfig::default())
    }

    /// Drive classify + decompose to AwaitingValidation
    fn at_validation() -> Controller {
        let mut c = controller();
        let pending = c.begin_classify("5G camera surveillance with alerts").unwrap();
        let Settled::Applied(ClassifyOutcome::Decompose(next)) = c.complete_classify(pending, Ok(telecom())).unwrap()
        else {
            panic!("expected decomposition");
        };
        c.complete_decompose(next, Ok(camera_alert())).unwrap();
        c
    }

    /// Camera validated, Alert refused
    fn at_clarification() -> Controller {
        let mut c = at_validation();
        c.select("Camera", "cam-2").unwrap();
        assert!(matches!(c.validate().unwrap(), ValidateOutcome::Incomplete { .. }));
        c
    }

    #[test]
    fn test_blank_input_rejected_without_call() {
        let mut c = controller();
        let err = c.begin_classify("   ").unwrap_err();
        assert_eq!(err.as_request(), Some(&RequestError::EmptyInput));
        assert!(!c.is_busy());
        assert_eq!(c.last_error(), Some("Request text is empty"));
        assert_eq!(c.step(), &Step::Input);
    }

    #[test]
    fn test_greeting_stops_negotiation() {
        let mut c = controller();
        let pending = c.begin_classify("Hello").unwrap();
        let outcome = c.complete_classify(pending, Ok(greeting())).unwrap();

        assert!(matches!(outcome, Settled::Applied(ClassifyOutcome::NonTelecom)));
        assert_eq!(c.step().name(), "CLASSIFIED_NON_TELECOM");
        assert!(!c.is_busy());
        assert_eq!(c.conversation().history, vec!["Request: Hello", "Classification: GREETING"]);

        // Only reset leaves this step
        let err = c.begin_classify("5G slice").unwrap_err();
        assert!(matches!(err.as_request(), Some(RequestError::WrongStep { .. })));
    }

    #[test]
    fn test_telecom_chains_into_decomposition() {
        let c = at_validation();
        let Step::AwaitingValidation { catalog, picks } = c.step() else {
            panic!("expected validation step");
        };
        assert_eq!(catalog.len(), 2);
        assert!(picks.is_empty());

        let conv = c.conversation();
        assert_eq!(conv.original_request, "5G camera surveillance with alerts");
        assert_eq!(service_names(&conv.identified_services), vec!["Camera", "Alert"]);
        assert!(conv.validated.is_empty());
        assert_eq!(conv.history.len(), 3);
        assert!(conv.history[2].starts_with("Decomposition: 2 services"));
    }

    #[test]
    fn test_decompose_failure_stays_in_input() {
        let mut c = controller();
        let pending = c.begin_classify("5G camera").unwrap();
        let Settled::Applied(ClassifyOutcome::Decompose(next)) = c.complete_classify(pending, Ok(telecom())).unwrap()
        else {
            panic!("expected decomposition");
        };
        assert!(c.is_busy());

        let err = c.complete_decompose(next, Err(server_error("LLM unavailable"))).unwrap_err();
        assert!(err.is_service());
        assert_eq!(c.step(), &Step::Input);
        assert!(c.conversation().is_empty());
        assert!(!c.is_busy());
        assert_eq!(c.last_error(), Some("LLM unavailable"));
    }

    #[test]
    fn test_empty_decomposition_is_service_error() {
        let mut c = controller();
        let pending = c.begin_classify("5G").unwrap();
        let Settled::Applied(ClassifyOutcome::Decompose(next)) = c.complete_classify(pending, Ok(telecom())).unwrap()
        else {
            panic!("expected decomposition");
        };
        let empty = DecompositionResponse {
            services: vec![],
            candidates: Default::default(),
        };
        let err = c.complete_decompose(next, Ok(empty)).unwrap_err();
        assert!(err.is_service());
        assert_eq!(c.step(), &Step::Input);
    }

    #[test]
    fn test_busy_rejects_second_call() {
        let mut c = controller();
        let _pending = c.begin_classify("5G").unwrap();
        let err = c.begin_classify("again").unwrap_err();
        assert_eq!(err.as_request(), Some(&RequestError::Busy));
        assert_eq!(c.last_error(), Some("Another request is still in progress"));
    }

    #[test]
    fn test_select_validates_against_round() {
        let mut c = at_validation();
        let err = c.select("Ghost", "cam-1").unwrap_err();
        assert_eq!(err.as_request(), Some(&RequestError::UnknownService("Ghost".to_string())));

        let err = c.select("Camera", "sms-1").unwrap_err();
        assert!(matches!(err.as_request(), Some(RequestError::UnknownCandidate { .. })));

        c.select("Camera", "cam-1").unwrap();
        c.select("Camera", "cam-2").unwrap();
        assert_eq!(c.step().picks().unwrap()["Camera"], "cam-2");
        assert!(c.last_error().is_none());

        assert!(c.deselect("Camera").unwrap());
        assert!(!c.deselect("Camera").unwrap());
    }

    #[test]
    fn test_validate_without_picks() {
        let mut c = at_validation();
        let err = c.validate().unwrap_err();
        assert_eq!(err.as_request(), Some(&RequestError::NoSelection));
        assert_eq!(c.step().name(), "AWAITING_VALIDATION");
    }

    #[test]
    fn test_partial_validation_moves_to_clarification() {
        let c = at_clarification();
        let Step::AwaitingClarificationOrAlternatives { refused, alternatives, .. } = c.step() else {
            panic!("expected clarification step");
        };
        assert_eq!(refused, &vec!["Alert".to_string()]);
        assert!(alternatives.is_empty());

        let validated = &c.conversation().validated;
        assert_eq!(validated.len(), 1);
        assert_eq!(validated["Camera"].service_id, "cam-2");
    }

    #[test]
    fn test_complete_validation_commits_only_with_intent() {
        let mut c = at_validation();
        c.select("Camera", "cam-1").unwrap();
        c.select("Alert", "sms-1").unwrap();

        let ValidateOutcome::Generate(pending) = c.validate().unwrap() else {
            panic!("expected generation");
        };
        assert_eq!(pending.request.validated.len(), 2);
        // Not committed while generation is in flight
        assert!(c.conversation().validated.is_empty());

        let err = c.complete_generate(pending, Err(server_error("boom"))).unwrap_err();
        assert!(err.is_service());
        assert!(c.conversation().validated.is_empty());
        assert_eq!(c.step().picks().unwrap().len(), 2);

        let ValidateOutcome::Generate(pending) = c.validate().unwrap() else {
            panic!("expected generation");
        };
        let settled = c.complete_generate(pending, Ok(intent("UserRequest_2_Services"))).unwrap();
        assert_eq!(settled, Settled::Applied(FinalIntent::new("UserRequest_2_Services")));
        assert!(c.step().is_terminal());
        assert_eq!(c.conversation().validated.len(), 2);
        assert_eq!(c.conversation().history.last().unwrap(), "Intent: UserRequest_2_Services");
    }

    #[test]
    fn test_clarify_request_carries_decisions() {
        let mut c = at_clarification();
        let err = c.begin_clarify("  ").unwrap_err();
        assert_eq!(err.as_request(), Some(&RequestError::EmptyClarification));

        let pending = c.begin_clarify("Push notifications instead of SMS").unwrap();
        let request = &pending.request;
        assert_eq!(request.clarification, "Push notifications instead of SMS");
        assert_eq!(request.validated_names, vec!["Camera"]);
        assert_eq!(request.refused_names, vec!["Alert"]);
        assert_eq!(request.original_request, "5G camera surveillance with alerts");
        assert_eq!(request.validated["Camera"].service_id, "cam-2");
        assert_eq!(service_names(&request.previous_services), vec!["Camera", "Alert"]);
    }

    #[test]
    fn test_clarify_prefers_prior_candidate() {
        let mut c = at_clarification();
        let pending = c.begin_clarify("Push notifications").unwrap();
        c.complete_clarify(pending, Ok(camera_push(Some(vec!["Camera"])))).unwrap();

        let picks = c.step().picks().unwrap();
        // cam-2 is still offered, so it wins over the top-ranked cam-3
        assert_eq!(picks["Camera"], "cam-2");
        assert!(!picks.contains_key("Push"));
        assert_eq!(c.rounds(), 1);
        assert_eq!(service_names(&c.conversation().identified_services), vec!["Camera", "Push"]);
    }

    #[test]
    fn test_earlier_validation_survives_later_round() {
        let mut c = at_clarification();
        let pending = c.begin_clarify("Push notifications").unwrap();
        c.complete_clarify(pending, Ok(camera_push(Some(vec!["Camera"])))).unwrap();

        // Only Push is picked this round; Camera counts from round one
        assert!(c.deselect("Camera").unwrap());
        c.select("Push", "push-1").unwrap();

        let ValidateOutcome::Generate(pending) = c.validate().unwrap() else {
            panic!("expected generation");
        };
        assert_eq!(pending.request.validated["Camera"].service_id, "cam-2");
        assert_eq!(pending.request.validated["Push"].service_id, "push-1");
        assert_eq!(c.conversation().validated["Camera"].service_id, "cam-2");

        c.complete_generate(pending, Ok(intent("UserRequest_2_Services"))).unwrap();
        let validated = &c.conversation().validated;
        assert_eq!(validated["Camera"].service_id, "cam-2");
        assert_eq!(validated["Push"].service_id, "push-1");
    }

    #[test]
    fn test_repick_replaces_earlier_validation() {
        let mut c = at_clarification();
        let pending = c.begin_clarify("Push notifications").unwrap();
        c.complete_clarify(pending, Ok(camera_push(Some(vec!["Camera"])))).unwrap();

        c.select("Camera", "cam-3").unwrap();
        let ValidateOutcome::Incomplete { refused } = c.validate().unwrap() else {
            panic!("expected clarification");
        };
        assert_eq!(refused, vec!["Push".to_string()]);
        assert_eq!(c.conversation().validated["Camera"].service_id, "cam-3");
    }

    #[test]
    fn test_clarify_without_pre_validated_starts_empty() {
        let mut c = at_clarification();
        let pending = c.begin_clarify("Push notifications").unwrap();
        c.complete_clarify(pending, Ok(camera_push(None))).unwrap();

        assert!(c.step().picks().unwrap().is_empty());
        // Earlier validation survives the new round
        assert_eq!(c.conversation().validated["Camera"].service_id, "cam-2");
    }

    #[test]
    fn test_clarify_failure_keeps_round() {
        let mut c = at_clarification();
        let before = c.conversation().clone();
        let pending = c.begin_clarify("Push").unwrap();
        let err = c.complete_clarify(pending, Err(server_error("timeout"))).unwrap_err();

        assert!(err.is_service());
        assert_eq!(c.conversation(), &before);
        assert_eq!(c.step().name(), "AWAITING_CLARIFICATION_OR_ALTERNATIVES");
        assert_eq!(c.rounds(), 0);
    }

    #[test]
    fn test_round_limit() {
        let mut c = Controller::new(&NegotiationConfig {
            max_clarification_rounds: 1,
        });
        let pending = c.begin_classify("5G camera").unwrap();
        let Settled::Applied(ClassifyOutcome::Decompose(next)) = c.complete_classify(pending, Ok(telecom())).unwrap()
        else {
            panic!("expected decomposition");
        };
        c.complete_decompose(next, Ok(camera_alert())).unwrap();
        c.select("Camera", "cam-1").unwrap();
        c.validate().unwrap();

        let pending = c.begin_clarify("Push").unwrap();
        c.complete_clarify(pending, Ok(camera_push(Some(vec!["Camera"])))).unwrap();
        c.validate().unwrap();

        let err = c.begin_clarify("again").unwrap_err();
        assert_eq!(err.as_request(), Some(&RequestError::RoundLimitReached(1)));
        // Finishing is still allowed
        assert!(c.begin_finish().is_ok());
    }

    #[test]
    fn test_alternatives_leave_conversation_untouched() {
        let mut c = at_clarification();
        let before = c.conversation().clone();

        let pending = c.begin_alternatives().unwrap();
        assert_eq!(pending.request.refused_names, vec!["Alert"]);
        assert_eq!(pending.request.history, before.history);

        let response = AlternativesResponse {
            alternatives: vec!["Push Notification".to_string(), "Voice Call".to_string()],
        };
        let settled = c.complete_alternatives(pending, Ok(response)).unwrap();
        assert_eq!(
            settled,
            Settled::Applied(vec!["Push Notification".to_string(), "Voice Call".to_string()])
        );

        let Step::AwaitingClarificationOrAlternatives { alternatives, .. } = c.step() else {
            panic!("expected clarification step");
        };
        assert_eq!(alternatives.len(), 2);
        assert_eq!(c.conversation(), &before);
    }

    #[test]
    fn test_finish_with_validated() {
        let mut c = at_clarification();
        let pending = c.begin_finish().unwrap();
        assert_eq!(pending.request.validated.len(), 1);
        assert_eq!(service_names(&pending.request.services), vec!["Camera", "Alert"]);

        c.complete_generate(pending, Ok(intent("UserRequest_1_Services"))).unwrap();
        assert_eq!(c.step().intent().unwrap().name, "UserRequest_1_Services");
    }

    #[test]
    fn test_finish_outside_clarification_rejected() {
        let mut c = controller();
        let err = c.begin_finish().unwrap_err();
        assert!(matches!(err.as_request(), Some(RequestError::WrongStep { .. })));

        let mut c = at_validation();
        let err = c.begin_finish().unwrap_err();
        assert_eq!(err.user_message(), "Cannot finish in step AWAITING_VALIDATION");
    }

    #[test]
    fn test_generate_while_busy_blocks_picks() {
        let mut c = at_validation();
        c.select("Camera", "cam-1").unwrap();
        c.select("Alert", "mail-1").unwrap();
        let ValidateOutcome::Generate(_pending) = c.validate().unwrap() else {
            panic!("expected generation");
        };
        let err = c.select("Camera", "cam-2").unwrap_err();
        assert_eq!(err.as_request(), Some(&RequestError::Busy));
        assert_eq!(c.step().picks().unwrap()["Camera"], "cam-1");
    }

    #[test]
    fn test_stale_result_after_reset_is_discarded() {
        let mut c = controller();
        let pending = c.begin_classify("5G camera").unwrap();
        c.reset();
        assert!(!c.is_busy());

        let settled = c.complete_classify(pending, Ok(greeting())).unwrap();
        assert!(settled.is_stale());
        assert_eq!(c.step(), &Step::Input);
        assert!(c.conversation().is_empty());

        // A stale failure is ignored too
        let pending = c.begin_classify("5G camera").unwrap();
        c.reset();
        let settled = c.complete_classify(pending, Err(server_error("late"))).unwrap();
        assert!(settled.is_stale());
        assert!(c.last_error().is_none());
    }

    #[test]
    fn test_reset_matches_fresh_state() {
        let mut c = at_clarification();
        let epoch = c.epoch();
        let negotiation_id = c.negotiation_id();
        c.reset();

        let fresh = controller();
        assert_eq!(c.step(), fresh.step());
        assert_eq!(c.conversation(), fresh.conversation());
        assert_eq!(c.rounds(), 0);
        assert!(c.last_error().is_none());
        assert_eq!(c.epoch(), epoch + 1);
        assert_ne!(c.negotiation_id(), negotiation_id);
    }

    #[test]
    fn test_check_round_rejects_duplicates() {
        let services = vec![IdentifiedService::new("A", "r"), IdentifiedService::new("A", "r")];
        assert!(check_round(&services).is_err());
        assert!(check_round(&[]).is_err());
        assert!(check_round(&[IdentifiedService::new("A", "r")]).is_ok());
    }
}
