//! Interactive REPL for IntentComposer
//!
//! Renders the negotiation step after every action and maps slash
//! commands onto workflow operations.

mod session;

pub use session::ReplSession;

use eyre::{Context, Result};

use crate::config::Config;
use crate::gateway::create_gateway;
use crate::workflow::Negotiator;

/// Run the interactive REPL
///
/// This is the main entry point for `ic repl`.
pub async fn run_interactive(config: &Config, initial_request: Option<String>) -> Result<()> {
    let gateway = create_gateway(&config.gateway).context("Failed to create gateway")?;
    let negotiator = Negotiator::new(gateway, &config.negotiation);

    let mut session = ReplSession::new(negotiator, config.export.dir.clone(), config.gateway.base_url.clone());
    session.run(initial_request).await
}
