//! Maps typed console lines onto engine commands.

use conversation_core::award::{parse_field_list, ALL_TABLES};
use shared::{domain::CounterpartDecision, protocol::EngineCommand};
use thiserror::Error;

pub const HELP: &str = "\
commands:
  <number>              submit the numbered option
  /toggle <supplier>    select or deselect a supplier on the shortlist
  /accept, /reject      answer as the supplier
  /upload               upload an image where one is requested
  /reset                return to the dashboard
  /lane <name>          switch conversation lane
  /details <K: V, ...>  update award details, e.g. /details Brand: Acme, Type: Standard
  /state                print the conversation snapshot as JSON
  /view                 print the current context panel as JSON
  /quit
anything else is sent as a response; type \\n for a line break";

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleAction {
    Engine(EngineCommand),
    State,
    View,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LineError {
    #[error("usage: {0}")]
    MissingArgument(&'static str),
    #[error("no award fields recognised in '{0}'")]
    NoFields(String),
}

/// `options` are the currently published options; a bare number picks one of them.
pub fn parse_line(line: &str, options: &[String]) -> Result<Option<ConsoleAction>, LineError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (head, rest) = match line.split_once(' ') {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };
    let action = match head {
        "/quit" | "/exit" => ConsoleAction::Quit,
        "/help" => ConsoleAction::Help,
        "/state" => ConsoleAction::State,
        "/view" => ConsoleAction::View,
        "/accept" => respond(CounterpartDecision::Accept),
        "/reject" => respond(CounterpartDecision::Reject),
        "/upload" => ConsoleAction::Engine(EngineCommand::TriggerUpload),
        "/reset" => ConsoleAction::Engine(EngineCommand::ReturnToDashboard),
        "/toggle" => ConsoleAction::Engine(EngineCommand::ToggleSupplier {
            name: required(rest, "/toggle <supplier>")?,
        }),
        "/lane" => ConsoleAction::Engine(EngineCommand::SelectLane {
            lane: required(rest, "/lane <name>")?,
        }),
        "/details" => {
            let fields = required(rest, "/details <Key: Value, ...>")?;
            let details = parse_field_list(&fields, &ALL_TABLES);
            if details == Default::default() {
                return Err(LineError::NoFields(fields));
            }
            ConsoleAction::Engine(EngineCommand::UpdateAwardDetails { details })
        }
        _ => submit(line, options),
    };
    Ok(Some(action))
}

fn respond(decision: CounterpartDecision) -> ConsoleAction {
    ConsoleAction::Engine(EngineCommand::RespondAsCounterpart { decision })
}

fn required(rest: &str, usage: &'static str) -> Result<String, LineError> {
    if rest.is_empty() {
        Err(LineError::MissingArgument(usage))
    } else {
        Ok(rest.to_string())
    }
}

fn submit(line: &str, options: &[String]) -> ConsoleAction {
    let picked = line
        .parse::<usize>()
        .ok()
        .and_then(|number| number.checked_sub(1))
        .and_then(|index| options.get(index));
    let response = match picked {
        Some(option) => option.clone(),
        None => line.replace("\\n", "\n"),
    };
    ConsoleAction::Engine(EngineCommand::Submit { response })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submitted(line: &str, options: &[String]) -> String {
        match parse_line(line, options) {
            Ok(Some(ConsoleAction::Engine(EngineCommand::Submit { response }))) => response,
            other => panic!("expected a submit, got {other:?}"),
        }
    }

    #[test]
    fn numbers_pick_published_options() {
        let options = vec!["Retrieve it".to_string(), "Review Award".to_string()];
        assert_eq!(submitted("2", &options), "Review Award");
        assert_eq!(submitted("3", &options), "3");
        assert_eq!(submitted("0", &options), "0");
    }

    #[test]
    fn free_text_keeps_slash_prefixed_flow_commands() {
        assert_eq!(submitted("/beacon Create Award", &[]), "/beacon Create Award");
        assert_eq!(
            submitted("123,456,Widget,10,DC1\\n789,012,Gadget,5,DC2", &[]),
            "123,456,Widget,10,DC1\n789,012,Gadget,5,DC2"
        );
    }

    #[test]
    fn slash_commands_map_to_engine_commands() {
        assert_eq!(
            parse_line("/toggle PureVita Co.", &[]),
            Ok(Some(ConsoleAction::Engine(EngineCommand::ToggleSupplier {
                name: "PureVita Co.".into(),
            })))
        );
        assert_eq!(
            parse_line("/reject", &[]),
            Ok(Some(ConsoleAction::Engine(
                EngineCommand::RespondAsCounterpart {
                    decision: CounterpartDecision::Reject,
                }
            )))
        );
        assert_eq!(parse_line("  ", &[]), Ok(None));
        assert_eq!(parse_line("/quit", &[]), Ok(Some(ConsoleAction::Quit)));
        assert_eq!(
            parse_line("/lane", &[]),
            Err(LineError::MissingArgument("/lane <name>"))
        );
    }

    #[test]
    fn details_go_through_the_field_tables() {
        let Ok(Some(ConsoleAction::Engine(EngineCommand::UpdateAwardDetails { details }))) =
            parse_line("/details Brand: Acme, Freight: Prepaid, ROFR: Yes", &[])
        else {
            panic!("expected a details update");
        };
        assert_eq!(details.brand.as_deref(), Some("Acme"));
        assert_eq!(details.freight_terms.as_deref(), Some("Prepaid"));
        assert_eq!(details.rofr, Some(true));

        assert!(matches!(
            parse_line("/details Colour: blue", &[]),
            Err(LineError::NoFields(_))
        ));
    }
}
