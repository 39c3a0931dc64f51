//! Console front end
//!
//! Line-oriented stand-in for the app screen: start Enroll/Auth, flip the
//! simulated radio, play the central, and watch the activation state.

use crate::domain::models::{AppEvent, MessageSeverity, RadioState, ServiceKind};
use crate::domain::registry;
use crate::infrastructure::peripheral::simulated::{AttResponse, SimulatedRadio};
use crate::infrastructure::peripheral::PeripheralHandle;
use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

const HELP: &str = "\
commands:
  enroll                     start the Enroll service
  auth                       start the Auth service
  power <on|off|state>       change the radio state
  write <enroll|auth> <text> central writes a request
  read <enroll|auth>         central reads the pending response
  status                     show radio and advertisement
  help                       this text
  quit                       exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    StartEnroll,
    StartAuth,
    Power(RadioState),
    Write(ServiceKind, String),
    Read(ServiceKind),
    Status,
    Help,
    Quit,
}

fn parse_service(word: Option<&str>) -> Result<ServiceKind, String> {
    match word.map(str::to_lowercase).as_deref() {
        Some("enroll") => Ok(ServiceKind::Enroll),
        Some("auth") => Ok(ServiceKind::Auth),
        Some(other) => Err(format!("unknown service '{}'", other)),
        None => Err("missing service (enroll|auth)".to_string()),
    }
}

fn parse_radio_state(word: Option<&str>) -> Result<RadioState, String> {
    match word.map(str::to_lowercase).as_deref() {
        Some("on") | Some("poweredon") => Ok(RadioState::PoweredOn),
        Some("off") | Some("poweredoff") => Ok(RadioState::PoweredOff),
        Some("unknown") => Ok(RadioState::Unknown),
        Some("resetting") => Ok(RadioState::Resetting),
        Some("unsupported") => Ok(RadioState::Unsupported),
        Some("unauthorized") => Ok(RadioState::Unauthorized),
        Some(other) => Err(format!("unknown radio state '{}'", other)),
        None => Err("missing radio state".to_string()),
    }
}

pub fn parse_command(line: &str) -> Result<ConsoleCommand, String> {
    let line = line.trim();
    let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim_start();

    match word.to_lowercase().as_str() {
        "enroll" => Ok(ConsoleCommand::StartEnroll),
        "auth" => Ok(ConsoleCommand::StartAuth),
        "power" => parse_radio_state(rest.split_whitespace().next()).map(ConsoleCommand::Power),
        "write" => {
            let (service, text) = rest.split_once(' ').unwrap_or((rest, ""));
            let service = parse_service(Some(service).filter(|s| !s.is_empty()))?;
            Ok(ConsoleCommand::Write(service, text.trim_start().to_string()))
        }
        "read" => parse_service(rest.split_whitespace().next()).map(ConsoleCommand::Read),
        "status" => Ok(ConsoleCommand::Status),
        "help" | "?" => Ok(ConsoleCommand::Help),
        "quit" | "exit" => Ok(ConsoleCommand::Quit),
        "" => Err("empty command".to_string()),
        other => Err(format!("unknown command '{}', try 'help'", other)),
    }
}

fn print_event(event: &AppEvent) {
    match event {
        AppEvent::ActivationChanged(state) => println!("mode: {}", state),
        AppEvent::LogMessage(status) => {
            let tag = match status.severity {
                MessageSeverity::Info => "info",
                MessageSeverity::Success => "ok",
                MessageSeverity::Warning => "warning",
                MessageSeverity::Error => "error",
            };
            println!("[{}] {}", tag, status.message);
        }
    }
}

fn print_response(response: &AttResponse) {
    match response.text() {
        Some(text) => println!("<- #{} {:?}: {}", response.request_id, response.result, text),
        None => println!("<- #{} {:?}", response.request_id, response.result),
    }
}

/// Run the console until `quit` or end of input
pub async fn run(
    handle: PeripheralHandle,
    mut radio: SimulatedRadio,
    mut events: mpsc::UnboundedReceiver<AppEvent>,
) -> Result<()> {
    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let command = match parse_command(&line) {
                    Ok(command) => command,
                    Err(e) => {
                        println!("{}", e);
                        continue;
                    }
                };
                match command {
                    ConsoleCommand::StartEnroll => handle.start_enroll()?,
                    ConsoleCommand::StartAuth => handle.start_auth()?,
                    ConsoleCommand::Power(state) => radio.set_power(state),
                    ConsoleCommand::Write(service, text) => {
                        let id = radio.write(service, text.as_bytes());
                        println!("-> #{} write {}: {}", id, service, text);
                    }
                    ConsoleCommand::Read(service) => {
                        let id = radio.read(service);
                        println!("-> #{} read {}", id, service);
                    }
                    ConsoleCommand::Status => {
                        let names = |uuids: Vec<uuid::Uuid>| -> Vec<&'static str> {
                            uuids.iter().map(registry::name_for).collect()
                        };
                        println!("radio: {}", radio.radio_state());
                        println!("registered: {:?}", names(radio.registered_services()));
                        match radio.advertised_services() {
                            Some(uuids) => println!("advertising: {:?}", names(uuids)),
                            None => println!("advertising: off"),
                        }
                    }
                    ConsoleCommand::Help => println!("{}", HELP),
                    ConsoleCommand::Quit => break,
                }
            }
            Some(event) = events.recv() => print_event(&event),
            Some(response) = radio.next_response() => print_response(&response),
        }
    }

    handle.shutdown()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse_command("enroll"), Ok(ConsoleCommand::StartEnroll));
        assert_eq!(parse_command(" AUTH "), Ok(ConsoleCommand::StartAuth));
        assert_eq!(parse_command("quit"), Ok(ConsoleCommand::Quit));
    }

    #[test]
    fn test_parse_power() {
        assert_eq!(
            parse_command("power on"),
            Ok(ConsoleCommand::Power(RadioState::PoweredOn))
        );
        assert_eq!(
            parse_command("power Unauthorized"),
            Ok(ConsoleCommand::Power(RadioState::Unauthorized))
        );
        assert!(parse_command("power").is_err());
        assert!(parse_command("power sideways").is_err());
    }

    #[test]
    fn test_parse_write_keeps_text() {
        assert_eq!(
            parse_command("write enroll Enroll request 3"),
            Ok(ConsoleCommand::Write(
                ServiceKind::Enroll,
                "Enroll request 3".to_string()
            ))
        );
        assert_eq!(
            parse_command("write auth"),
            Ok(ConsoleCommand::Write(ServiceKind::Auth, String::new()))
        );
        assert!(parse_command("write").is_err());
    }

    #[test]
    fn test_parse_read() {
        assert_eq!(
            parse_command("read auth"),
            Ok(ConsoleCommand::Read(ServiceKind::Auth))
        );
        assert!(parse_command("read nothing").is_err());
    }

    #[test]
    fn test_unknown_command() {
        assert!(parse_command("dance").is_err());
    }
}
