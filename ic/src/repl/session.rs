//! REPL session management

use std::path::PathBuf;

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{debug, info};

use crate::domain::{CandidateCatalog, IdentifiedService, export_intent};
use crate::workflow::{Negotiator, Step, WorkflowError};

/// Interactive negotiation session
pub struct ReplSession {
    negotiator: Negotiator,
    export_dir: PathBuf,
    base_url: String,
}

impl ReplSession {
    pub fn new(negotiator: Negotiator, export_dir: PathBuf, base_url: String) -> Self {
        Self {
            negotiator,
            export_dir,
            base_url,
        }
    }

    /// Run the REPL main loop
    pub async fn run(&mut self, initial_request: Option<String>) -> Result<()> {
        self.print_welcome();

        if let Some(request) = initial_request {
            println!("{} {}", ">".bright_green(), request);
            self.process_text(&request).await;
        }

        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            let prompt = format!("{} ", self.prompt_marker().bright_green());
            match rl.readline(&prompt) {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(input);

                    if input.starts_with('/') {
                        match self.handle_slash_command(input).await {
                            SlashResult::Continue => continue,
                            SlashResult::Quit => break,
                        }
                    } else {
                        self.process_text(input).await;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(err) => {
                    return Err(eyre::eyre!("Readline error: {}", err));
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    fn prompt_marker(&self) -> &'static str {
        match self.negotiator.step() {
            Step::AwaitingClarificationOrAlternatives { .. } => "clarify>",
            Step::AwaitingValidation { .. } => "pick>",
            _ => ">",
        }
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", "IntentComposer Interactive Session".bright_cyan().bold());
        println!("Backend: {}", self.base_url);
        println!("Describe a telecom service request to start.");
        println!("Type {} for help, {} to quit", "/help".yellow(), "/quit".yellow());
        println!();
    }

    /// Plain text is a request in `Input` and a clarification later on
    async fn process_text(&mut self, text: &str) {
        debug!(step = %self.negotiator.step(), "process_text: called");
        let result = match self.negotiator.step() {
            Step::Input => {
                println!("{}", "Analyzing request...".dimmed());
                self.negotiator.submit(text).await
            }
            Step::AwaitingClarificationOrAlternatives { .. } => {
                println!("{}", "Re-analyzing with clarification...".dimmed());
                self.negotiator.clarify(text).await
            }
            Step::AwaitingValidation { .. } => {
                println!(
                    "Use {} to choose candidates, then {}",
                    "/pick <service> <candidate>".yellow(),
                    "/validate".yellow()
                );
                return;
            }
            Step::ClassifiedNonTelecom { .. } | Step::IntentReady { .. } => {
                println!("Use {} to start a new request", "/reset".yellow());
                return;
            }
        };
        self.report(result);
    }

    async fn handle_slash_command(&mut self, input: &str) -> SlashResult {
        let parts: Vec<&str> = input.split_whitespace().collect();
        let cmd = parts.first().copied().unwrap_or("");
        let args = &parts[1..];
        debug!(%cmd, args = args.len(), "handle_slash_command: called");

        match cmd {
            "/help" | "/h" => self.print_help(),
            "/quit" | "/q" | "/exit" => return SlashResult::Quit,
            "/pick" | "/p" => self.pick(args),
            "/unpick" => self.unpick(args),
            "/validate" | "/v" => {
                println!("{}", "Validating...".dimmed());
                let result = self.negotiator.validate().await;
                self.report(result);
            }
            "/clarify" => {
                let text = args.join(" ");
                println!("{}", "Re-analyzing with clarification...".dimmed());
                let result = self.negotiator.clarify(&text).await;
                self.report(result);
            }
            "/alternatives" | "/alt" => {
                println!("{}", "Looking for alternatives...".dimmed());
                let result = self.negotiator.request_alternatives().await;
                self.report(result);
            }
            "/finish" => {
                println!("{}", "Generating intent...".dimmed());
                let result = self.negotiator.finish().await;
                self.report(result);
            }
            "/export" => self.export(args.first().map(PathBuf::from)),
            "/status" | "/s" => self.print_status(),
            "/history" => self.print_history(),
            "/reset" => {
                self.negotiator.reset();
                println!("{}", "Negotiation reset.".dimmed());
                self.render();
            }
            _ => {
                println!("{} Unknown command: {}", "?".yellow(), cmd);
                println!("Type {} for available commands", "/help".yellow());
            }
        }
        SlashResult::Continue
    }

    fn pick(&mut self, args: &[&str]) {
        // Outside validation the workflow rejects the pick with the step name
        let catalog = self.negotiator.step().catalog().cloned().unwrap_or_default();
        let services = &self.negotiator.conversation().identified_services;
        match parse_pick(args, services, &catalog) {
            Ok((service, candidate)) => {
                let result = self.negotiator.select(&service, &candidate);
                self.report(result);
            }
            Err(usage) => println!("{} {}", "!".yellow(), usage),
        }
    }

    fn unpick(&mut self, args: &[&str]) {
        let services = &self.negotiator.conversation().identified_services;
        let Some(service) = resolve_service(&args.join(" "), services) else {
            println!("{} Usage: /unpick <service>", "!".yellow());
            return;
        };
        match self.negotiator.deselect(&service) {
            Ok(true) => self.render(),
            Ok(false) => println!("{}", format!("No pick for {}", service).dimmed()),
            Err(e) => self.print_error(&e),
        }
    }

    fn export(&self, dir: Option<PathBuf>) {
        let Some(intent) = self.negotiator.step().intent() else {
            println!("{} No intent to export yet", "!".yellow());
            return;
        };
        let dir = dir.unwrap_or_else(|| self.export_dir.clone());
        match export_intent(intent, &dir) {
            Ok(path) => println!("{} Intent written to {}", "✓".green(), path.display()),
            Err(e) => println!("{} {:#}", "Error:".red(), e),
        }
    }

    /// Show the outcome of an action: the error, or the new step
    fn report(&self, result: Result<(), WorkflowError>) {
        match result {
            Ok(()) => self.render(),
            Err(e) => self.print_error(&e),
        }
    }

    fn print_error(&self, err: &WorkflowError) {
        info!(error = %err, "ReplSession: action failed");
        println!("{} {}", "Error:".red(), err.user_message());
    }

    fn print_status(&self) {
        let controller = self.negotiator.controller();
        println!();
        println!("{} {}", "Negotiation:".bright_cyan(), controller.negotiation_id());
        println!("{} {}", "Step:".bright_cyan(), controller.step());
        println!(
            "{} {}/{}",
            "Clarification rounds:".bright_cyan(),
            controller.rounds(),
            controller.max_rounds()
        );
        if let Some(error) = controller.last_error() {
            println!("{} {}", "Last error:".bright_cyan(), error.red());
        }
        self.render();
    }

    /// Render the current step
    fn render(&self) {
        let step = self.negotiator.step();
        let conversation = self.negotiator.conversation();
        println!();

        match step {
            Step::Input => println!("{}", "Waiting for a request.".dimmed()),
            Step::ClassifiedNonTelecom { kind, message } => {
                println!("{} {}", format!("[{}]", kind).bright_blue(), message);
                println!("Use {} to make a telecom request", "/reset".yellow());
            }
            Step::AwaitingValidation { catalog, picks } => {
                println!("{}", "Identified services:".bright_cyan());
                for (i, service) in conversation.identified_services.iter().enumerate() {
                    let mut header = format!("  {}. {}", i + 1, service.name.bold());
                    if let Some(prior) = conversation.validated.get(&service.name) {
                        header.push_str(&format!(" {}", format!("(validated: {})", prior.service_id).green()));
                    }
                    println!("{}", header);
                    if !service.reason.is_empty() {
                        println!("     {}", service.reason.dimmed());
                    }
                    for (key, value) in &service.required_properties {
                        println!("     {}: {}", key, value);
                    }

                    let candidates = catalog.get(&service.name).map(Vec::as_slice).unwrap_or_default();
                    if candidates.is_empty() {
                        println!("     {}", "no candidates".yellow());
                    }
                    for (j, candidate) in candidates.iter().enumerate() {
                        let picked = picks.get(&service.name) == Some(&candidate.service_id);
                        let marker = if picked { "●".green() } else { "○".normal() };
                        println!(
                            "     {} {}) {} {} {:.2}",
                            marker,
                            j + 1,
                            candidate.service_id,
                            candidate.name,
                            candidate.score
                        );
                    }
                }
                println!();
                println!(
                    "Pick with {}, then {}",
                    "/pick <service> <candidate>".yellow(),
                    "/validate".yellow()
                );
            }
            Step::AwaitingClarificationOrAlternatives {
                refused, alternatives, ..
            } => {
                println!("{}", "Validated:".bright_cyan());
                for (name, candidate) in &conversation.validated {
                    println!("  {} {} -> {} {}", "✓".green(), name, candidate.service_id, candidate.name);
                }
                println!("{}", "Without a candidate:".bright_cyan());
                for name in refused {
                    println!("  {} {}", "✗".red(), name);
                }
                if !alternatives.is_empty() {
                    println!("{}", "Suggested alternatives:".bright_cyan());
                    for alternative in alternatives {
                        println!("  - {}", alternative);
                    }
                }
                let controller = self.negotiator.controller();
                println!();
                println!(
                    "Type a clarification ({}/{} rounds used), {} or {}",
                    controller.rounds(),
                    controller.max_rounds(),
                    "/alternatives".yellow(),
                    "/finish".yellow()
                );
            }
            Step::IntentReady { intent } => {
                println!("{} {}", "Intent ready:".bright_green().bold(), intent.name);
                match intent.to_pretty_json() {
                    Ok(json) => println!("{}", json),
                    Err(e) => println!("{} {:#}", "Error:".red(), e),
                }
                println!();
                println!("Save with {}, start over with {}", "/export [dir]".yellow(), "/reset".yellow());
            }
        }
        println!();
    }

    fn print_help(&self) {
        println!();
        println!("{}", "Available Commands:".bright_cyan());
        println!("  {:28} Choose a candidate (names or numbers)", "/pick <service> <candidate>".yellow());
        println!("  {:28} Remove a pick", "/unpick <service>".yellow());
        println!("  {:28} Validate the current picks", "/validate".yellow());
        println!("  {:28} Refine unresolved services", "/clarify <text>".yellow());
        println!("  {:28} Suggest replacement services", "/alternatives".yellow());
        println!("  {:28} Generate the intent from validated services", "/finish".yellow());
        println!("  {:28} Write the intent as JSON", "/export [dir]".yellow());
        println!("  {:28} Show the current step", "/status".yellow());
        println!("  {:28} Show the negotiation history", "/history".yellow());
        println!("  {:28} Start over", "/reset".yellow());
        println!("  {:28} Show this help", "/help".yellow());
        println!("  {:28} Exit", "/quit".yellow());
        println!();
    }

    fn print_history(&self) {
        let conversation = self.negotiator.conversation();
        if conversation.history.is_empty() {
            println!("{}", "No history yet.".dimmed());
            return;
        }

        println!();
        println!("{}", "Negotiation History:".bright_cyan());
        for (i, entry) in conversation.history.iter().enumerate() {
            println!("  {}. {}", i + 1, entry);
        }
        println!();
    }
}

/// Result of handling a slash command
enum SlashResult {
    Continue,
    Quit,
}

/// Map a service argument to a service name
///
/// Exact names win over 1-based positions.
fn resolve_service(arg: &str, services: &[IdentifiedService]) -> Option<String> {
    let arg = arg.trim();
    if arg.is_empty() {
        return None;
    }
    if let Some(service) = services.iter().find(|s| s.name == arg) {
        return Some(service.name.clone());
    }
    match arg.parse::<usize>() {
        Ok(n) if n >= 1 => services.get(n - 1).map(|s| s.name.clone()),
        _ => Some(arg.to_string()),
    }
}

/// Parse `/pick` arguments into (service, candidate id)
///
/// The last argument is the candidate, everything before it the service.
/// Unknown names are passed through so the workflow reports them.
fn parse_pick(
    args: &[&str],
    services: &[IdentifiedService],
    catalog: &CandidateCatalog,
) -> std::result::Result<(String, String), String> {
    let Some((candidate, service_parts)) = args.split_last() else {
        return Err("Usage: /pick <service> <candidate>".to_string());
    };
    let service = resolve_service(&service_parts.join(" "), services)
        .ok_or_else(|| "Usage: /pick <service> <candidate>".to_string())?;

    let candidates = catalog.get(&service).map(Vec::as_slice).unwrap_or_default();
    if candidates.iter().any(|c| c.service_id == *candidate) {
        return Ok((service, candidate.to_string()));
    }
    let id = match candidate.parse::<usize>() {
        Ok(n) if n >= 1 => candidates
            .get(n - 1)
            .map(|c| c.service_id.clone())
            .unwrap_or_else(|| candidate.to_string()),
        _ => candidate.to_string(),
    };
    Ok((service, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ServiceCandidate;

    fn round() -> (Vec<IdentifiedService>, CandidateCatalog) {
        let services = vec![
            IdentifiedService::new("Camera", "video"),
            IdentifiedService::new("Edge Storage", "retention"),
        ];
        let mut catalog = CandidateCatalog::new();
        catalog.insert(
            "Camera".to_string(),
            vec![
                ServiceCandidate::new("cam-1", "Video Analytics", 0.9),
                ServiceCandidate::new("2", "Numbered", 0.5),
            ],
        );
        catalog.insert(
            "Edge Storage".to_string(),
            vec![ServiceCandidate::new("st-1", "Object Store", 0.8)],
        );
        (services, catalog)
    }

    #[test]
    fn test_parse_pick_by_name() {
        let (services, catalog) = round();
        let parsed = parse_pick(&["Camera", "cam-1"], &services, &catalog).unwrap();
        assert_eq!(parsed, ("Camera".to_string(), "cam-1".to_string()));
    }

    #[test]
    fn test_parse_pick_by_position() {
        let (services, catalog) = round();
        let parsed = parse_pick(&["2", "1"], &services, &catalog).unwrap();
        assert_eq!(parsed, ("Edge Storage".to_string(), "st-1".to_string()));
    }

    #[test]
    fn test_parse_pick_multiword_service() {
        let (services, catalog) = round();
        let parsed = parse_pick(&["Edge", "Storage", "st-1"], &services, &catalog).unwrap();
        assert_eq!(parsed.0, "Edge Storage");
    }

    #[test]
    fn test_parse_pick_prefers_exact_id() {
        let (services, catalog) = round();
        // "2" is a real id, not the second position
        let parsed = parse_pick(&["Camera", "2"], &services, &catalog).unwrap();
        assert_eq!(parsed.1, "2");
    }

    #[test]
    fn test_parse_pick_passes_unknown_through() {
        let (services, catalog) = round();
        let parsed = parse_pick(&["Ghost", "x-9"], &services, &catalog).unwrap();
        assert_eq!(parsed, ("Ghost".to_string(), "x-9".to_string()));
        assert!(parse_pick(&[], &services, &catalog).is_err());
        assert!(parse_pick(&["cam-1"], &services, &catalog).is_err());
    }
}
