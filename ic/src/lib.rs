//! IntentComposer - interactive TMF921 intent negotiation
//!
//! Turns a free-text telecom request into a structured service intent by
//! negotiating with the user: the request is classified, decomposed into
//! sub-services with ranked catalog candidates, and refined through rounds
//! of validation and clarification until an intent can be generated.
//!
//! # Core Concepts
//!
//! - **One owner**: the workflow controller is the only writer of the conversation
//! - **All-or-nothing**: a transition commits only when its call succeeds
//! - **Epochs**: results that arrive after a reset are discarded
//!
//! # Modules
//!
//! - [`workflow`] - Step machine, selection reducer and async negotiator
//! - [`gateway`] - Service contracts and the HTTP client
//! - [`domain`] - Services, candidates, conversation and intent types
//! - [`repl`] - Interactive terminal session
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod gateway;
pub mod repl;
pub mod workflow;

pub use config::Config;
pub use domain::{ConversationState, FinalIntent};
pub use gateway::{Gateway, ServiceError, create_gateway};
pub use workflow::{Negotiator, RequestError, Step, WorkflowError};
