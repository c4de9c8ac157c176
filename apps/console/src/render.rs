use std::time::Duration;

use conversation_core::{scale_delay, ConversationHandle, ConversationRuntime};
use shared::{
    domain::{AnimationKind, Message, MessageContent, Speaker},
    protocol::EngineEvent,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

/// How long the console lets an animation play before reporting it finished.
pub const ANIMATION_PLAYBACK: Duration = Duration::from_millis(3000);

pub fn speaker_label(speaker: Speaker, lane: &str) -> &str {
    match speaker {
        Speaker::Agent => lane,
        Speaker::User => "You",
    }
}

pub fn render_message(lane: &str, message: &Message) -> String {
    let speaker = speaker_label(message.speaker, lane);
    match &message.content {
        MessageContent::Text { text } => format!("[{lane}] {speaker}: {text}"),
        MessageContent::Animation {
            kind: AnimationKind::PdfGeneration,
            ..
        } => format!("[{lane}] {speaker}: (generating the award PDF...)"),
    }
}

/// Human-readable line(s) for one event; `None` for events the console keeps quiet about.
pub fn render_event(event: &EngineEvent) -> Option<String> {
    match event {
        EngineEvent::MessageAppended { lane, message } => Some(render_message(lane, message)),
        EngineEvent::LanesChanged { lanes, active } if lanes.len() > 1 => {
            Some(format!("-- lanes: {} (active: {active})", lanes.join(" | ")))
        }
        EngineEvent::ActivityChanged(flags) if flags.thinking => Some("   ...".to_string()),
        EngineEvent::ActivityChanged(flags) if flags.sending => {
            Some("   sending invites...".to_string())
        }
        EngineEvent::InputPublished(input) => {
            let mut lines: Vec<String> = input
                .options
                .iter()
                .enumerate()
                .map(|(index, option)| format!("  {}) {option}", index + 1))
                .collect();
            if input.image_upload {
                lines.push("  (type /upload to attach an image)".to_string());
            }
            (!lines.is_empty()).then(|| lines.join("\n"))
        }
        EngineEvent::SuppliersChanged { selected, statuses } if !selected.is_empty() => {
            let rows: Vec<String> = selected
                .iter()
                .map(|name| match statuses.get(name) {
                    Some(status) => format!("{name} [{}]", status.label()),
                    None => name.clone(),
                })
                .collect();
            Some(format!("-- suppliers: {}", rows.join(", ")))
        }
        EngineEvent::CounterpartDecided(decision) => {
            Some(format!("-- supplier decision: {decision:?}"))
        }
        EngineEvent::Halted => Some("-- end of conversation (/reset to start over)".to_string()),
        EngineEvent::Reset => Some("-- back at the dashboard".to_string()),
        EngineEvent::Rejected(rejection) => Some(format!("!! {}", rejection.message)),
        _ => None,
    }
}

/// Prints events until the channel closes, completing animations after their playback time.
pub async fn print_events(runtime: ConversationRuntime, json: bool) {
    let mut events = runtime.subscribe_events();
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "console: event printer fell behind");
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        if let EngineEvent::MessageAppended { message, .. } = &event {
            if let MessageContent::Animation {
                completion: Some(token),
                ..
            } = message.content
            {
                let runtime = runtime.clone();
                let playback = scale_delay(ANIMATION_PLAYBACK, runtime.time_scale());
                tokio::spawn(async move {
                    tokio::time::sleep(playback).await;
                    if let Err(rejected) = runtime.complete_content(token).await {
                        debug!(code = ?rejected.code, "console: animation completion ignored");
                    }
                });
            }
        }

        if json {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(err) => warn!("console: failed to encode event: {err}"),
            }
        } else if let Some(text) = render_event(&event) {
            println!("{text}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use shared::{
        domain::{CompletionToken, MessageId, SupplierStatus},
        protocol::{ActivityFlags, PublishedInput},
    };

    use super::*;

    fn message(speaker: Speaker, content: MessageContent) -> Message {
        Message {
            id: MessageId(1),
            speaker,
            content,
            is_thinking_message: false,
            sent_at: Utc::now(),
        }
    }

    #[test]
    fn messages_render_with_lane_and_speaker() {
        let agent = message(Speaker::Agent, MessageContent::text("Hello."));
        let user = message(Speaker::User, MessageContent::text("Hi."));
        assert_eq!(render_message("Beacon AI", &agent), "[Beacon AI] Beacon AI: Hello.");
        assert_eq!(render_message("Acme Award", &user), "[Acme Award] You: Hi.");

        let animation = message(
            Speaker::Agent,
            MessageContent::Animation {
                kind: AnimationKind::PdfGeneration,
                completion: Some(CompletionToken(3)),
            },
        );
        assert!(render_message("Beacon AI", &animation).contains("generating the award PDF"));
    }

    #[test]
    fn options_render_as_a_numbered_list() {
        let event = EngineEvent::InputPublished(PublishedInput {
            options: vec!["Retrieve it".into(), "Review Award".into()],
            image_upload: true,
        });
        assert_eq!(
            render_event(&event).as_deref(),
            Some("  1) Retrieve it\n  2) Review Award\n  (type /upload to attach an image)")
        );
        assert_eq!(
            render_event(&EngineEvent::InputPublished(PublishedInput::default())),
            None
        );
    }

    #[test]
    fn quiet_events_render_nothing() {
        assert_eq!(
            render_event(&EngineEvent::ActivityChanged(ActivityFlags::default())),
            None
        );
        assert_eq!(
            render_event(&EngineEvent::LanesChanged {
                lanes: vec!["Beacon AI".into()],
                active: "Beacon AI".into(),
            }),
            None
        );
        let suppliers = EngineEvent::SuppliersChanged {
            selected: vec!["PureVita Co.".into()],
            statuses: BTreeMap::from([("PureVita Co.".to_string(), SupplierStatus::Invited)]),
        };
        assert_eq!(
            render_event(&suppliers).as_deref(),
            Some("-- suppliers: PureVita Co. [Invited]")
        );
    }
}
