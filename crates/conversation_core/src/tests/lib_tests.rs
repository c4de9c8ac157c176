use std::time::Duration;

use shared::{
    domain::{CounterpartDecision, MessageContent, DEFAULT_LANE},
    error::RejectionCode,
    protocol::{EngineCommand, EngineEvent},
};
use tokio::sync::broadcast::Receiver;

use super::*;
use crate::{scenario::beacon_script, timers::NoJitter};

fn runtime(time_scale: f64) -> ConversationRuntime {
    let engine = StepEngine::new(beacon_script(), EngineSettings::default(), Box::new(NoJitter));
    ConversationRuntime::new(engine, time_scale)
}

/// Lets zero-delay timer chains run to completion.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

fn drain(events: &mut Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

fn appended_texts(events: &[EngineEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            EngineEvent::MessageAppended { message, .. } => {
                message.content.as_text().map(str::to_string)
            }
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn thinking_timer_fires_on_the_tokio_clock() {
    let runtime = runtime(1.0);
    let mut events = runtime.subscribe_events();
    runtime.start().await.expect("start");

    tokio::time::sleep(Duration::from_millis(799)).await;
    assert!(runtime.snapshot().await.active_messages().is_empty());

    tokio::time::sleep(Duration::from_millis(2)).await;
    let snapshot = runtime.snapshot().await;
    assert_eq!(snapshot.active_messages().len(), 1);
    assert_eq!(snapshot.input.options, vec!["Retrieve it".to_string()]);

    let received = drain(&mut events);
    assert!(matches!(
        received.first(),
        Some(EngineEvent::LanesChanged { .. })
    ));
    assert_eq!(appended_texts(&received).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn time_scale_stretches_delays() {
    let runtime = runtime(2.0);
    runtime.start().await.expect("start");

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(runtime.snapshot().await.active_messages().is_empty());
    tokio::time::sleep(Duration::from_millis(101)).await;
    assert_eq!(runtime.snapshot().await.active_messages().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn oversized_time_scale_falls_back_to_real_time() {
    let runtime = runtime(1e30);
    assert_eq!(runtime.time_scale(), 1.0);
    runtime.start().await.expect("start");

    tokio::time::sleep(Duration::from_millis(801)).await;
    assert_eq!(runtime.snapshot().await.active_messages().len(), 1);
}

#[test]
fn scaled_delays_saturate_instead_of_overflowing() {
    assert!(is_valid_time_scale(MAX_TIME_SCALE));
    assert!(!is_valid_time_scale(MAX_TIME_SCALE * 2.0));
    assert!(!is_valid_time_scale(-1.0));
    assert_eq!(
        scale_delay(Duration::from_secs(u64::MAX / 2), MAX_TIME_SCALE),
        Duration::MAX
    );
    assert_eq!(scale_delay(Duration::from_millis(800), 0.0), Duration::ZERO);
    assert_eq!(
        scale_delay(Duration::from_millis(800), 2.0),
        Duration::from_millis(1600)
    );
}

#[tokio::test(start_paused = true)]
async fn rejected_commands_are_broadcast() {
    let runtime = runtime(1.0);
    let mut events = runtime.subscribe_events();
    runtime.start().await.expect("start");
    drain(&mut events);

    let rejected = runtime
        .submit("Retrieve it")
        .await
        .expect_err("agent is still thinking");
    assert_eq!(rejected.code, RejectionCode::InputClosed);

    let received = drain(&mut events);
    assert!(matches!(
        received.as_slice(),
        [EngineEvent::Rejected(rejection)] if rejection.code == RejectionCode::InputClosed
    ));
}

#[tokio::test(start_paused = true)]
async fn dispatch_drives_the_review_flow_to_a_decision() {
    let runtime = runtime(0.0);
    let mut events = runtime.subscribe_events();
    runtime.start().await.expect("start");
    settle().await;

    runtime
        .dispatch(EngineCommand::Submit {
            response: "Review Award".into(),
        })
        .await
        .expect("review flow");
    settle().await;
    runtime
        .submit("Yes, send for approval")
        .await
        .expect("approval");
    settle().await;
    runtime
        .submit("Yes, generate the PDF")
        .await
        .expect("pdf");
    settle().await;

    let token = runtime
        .snapshot()
        .await
        .active_messages()
        .iter()
        .find_map(|message| match message.content {
            MessageContent::Animation {
                completion: Some(token),
                ..
            } => Some(token),
            _ => None,
        })
        .expect("pdf animation");
    runtime
        .dispatch(EngineCommand::CompleteContent { token })
        .await
        .expect("complete");
    settle().await;

    let snapshot = runtime.snapshot().await;
    assert_eq!(
        snapshot.counterpart_decision,
        Some(CounterpartDecision::Accept)
    );
    assert!(snapshot.is_halted());
    assert!(drain(&mut events)
        .contains(&EngineEvent::CounterpartDecided(CounterpartDecision::Accept)));
}

#[tokio::test(start_paused = true)]
async fn reset_discards_timers_armed_before_it() {
    let runtime = runtime(1.0);
    runtime.start().await.expect("start");
    tokio::time::sleep(Duration::from_millis(400)).await;

    runtime.return_to_dashboard().await.expect("reset");
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(runtime.snapshot().await.active_messages().is_empty());

    tokio::time::sleep(Duration::from_millis(301)).await;
    let snapshot = runtime.snapshot().await;
    assert_eq!(snapshot.active_lane, DEFAULT_LANE);
    assert_eq!(snapshot.active_messages().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn handle_trait_objects_share_one_engine() {
    let runtime = runtime(0.0);
    let handle: Arc<dyn ConversationHandle> = Arc::new(runtime.clone());
    runtime.start().await.expect("start");
    settle().await;

    handle.toggle_supplier("PureVita Co.").await.expect("toggle");
    assert_eq!(
        runtime.snapshot().await.selected_suppliers,
        vec!["PureVita Co.".to_string()]
    );
    assert_eq!(
        handle.select_lane("Missing").await.map_err(|err| err.code),
        Err(RejectionCode::UnknownLane)
    );
}
