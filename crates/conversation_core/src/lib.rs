use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use shared::{
    domain::{AwardDetails, CompletionToken, CounterpartDecision, TimerId},
    protocol::{ConversationSnapshot, EngineCommand, EngineEvent},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

pub mod award;
pub mod engine;
pub mod rules;
pub mod scenario;
pub mod script;
pub mod timers;
pub mod transcript;
pub mod views;

pub use engine::{EngineResult, EngineSettings, Progress, StepEngine};
pub use script::{ScriptError, ScriptTable};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Largest accepted time scale.
pub const MAX_TIME_SCALE: f64 = 1_000.0;

pub fn is_valid_time_scale(time_scale: f64) -> bool {
    time_scale.is_finite() && (0.0..=MAX_TIME_SCALE).contains(&time_scale)
}

/// Multiplies `delay` by `time_scale`, saturating at `Duration::MAX`.
pub fn scale_delay(delay: Duration, time_scale: f64) -> Duration {
    if time_scale == 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(delay.as_secs_f64() * time_scale).unwrap_or(Duration::MAX)
}

/// The surface presentation layers program against.
#[async_trait]
pub trait ConversationHandle: Send + Sync {
    async fn submit(&self, response: &str) -> EngineResult;
    async fn respond_as_counterpart(&self, decision: CounterpartDecision) -> EngineResult;
    async fn toggle_supplier(&self, name: &str) -> EngineResult;
    async fn update_award_details(&self, details: AwardDetails) -> EngineResult;
    async fn trigger_upload(&self) -> EngineResult;
    async fn return_to_dashboard(&self) -> EngineResult;
    async fn select_lane(&self, lane: &str) -> EngineResult;
    async fn complete_content(&self, token: CompletionToken) -> EngineResult;
    async fn snapshot(&self) -> ConversationSnapshot;
    fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent>;
}

/// Drives a [`StepEngine`] on tokio: one sleep task per timer, events fanned out on a
/// broadcast channel.
#[derive(Clone)]
pub struct ConversationRuntime {
    inner: Arc<RuntimeInner>,
}

struct RuntimeInner {
    engine: Mutex<StepEngine>,
    events: broadcast::Sender<EngineEvent>,
    time_scale: f64,
}

impl ConversationRuntime {
    /// `time_scale` multiplies every timer delay; 0 replays the script without pauses.
    pub fn new(engine: StepEngine, time_scale: f64) -> Self {
        let time_scale = if is_valid_time_scale(time_scale) {
            time_scale
        } else {
            warn!(
                time_scale,
                max = MAX_TIME_SCALE,
                "runtime: invalid time scale, using 1.0"
            );
            1.0
        };
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(RuntimeInner {
                engine: Mutex::new(engine),
                events,
                time_scale,
            }),
        }
    }

    pub fn time_scale(&self) -> f64 {
        self.inner.time_scale
    }

    pub async fn start(&self) -> EngineResult {
        self.apply(StepEngine::start).await
    }

    pub async fn dispatch(&self, command: EngineCommand) -> EngineResult {
        debug!(command = command.name(), "runtime: dispatching command");
        match command {
            EngineCommand::Submit { response } => {
                self.apply(|engine| engine.submit(&response)).await
            }
            EngineCommand::RespondAsCounterpart { decision } => {
                self.apply(|engine| engine.respond(decision)).await
            }
            EngineCommand::ToggleSupplier { name } => {
                self.apply(|engine| engine.toggle_supplier(&name)).await
            }
            EngineCommand::UpdateAwardDetails { details } => {
                self.apply(|engine| engine.update_details(details)).await
            }
            EngineCommand::TriggerUpload => self.apply(StepEngine::trigger_upload).await,
            EngineCommand::ReturnToDashboard => self.apply(StepEngine::return_to_dashboard).await,
            EngineCommand::SelectLane { lane } => {
                self.apply(|engine| engine.select_lane(&lane)).await
            }
            EngineCommand::CompleteContent { token } => {
                self.apply(|engine| engine.complete(token)).await
            }
        }
    }

    async fn apply<F>(&self, op: F) -> EngineResult
    where
        F: FnOnce(&mut StepEngine) -> EngineResult,
    {
        let mut engine = self.inner.engine.lock().await;
        let result = op(&mut *engine);
        if let Err(rejected) = &result {
            debug!(code = ?rejected.code, "runtime: command rejected: {}", rejected.message);
            let _ = self
                .inner
                .events
                .send(EngineEvent::Rejected(rejected.clone().into()));
        }
        self.flush(&mut *engine);
        result
    }

    async fn fire(&self, id: TimerId) {
        let mut engine = self.inner.engine.lock().await;
        if engine.fire(id) {
            self.flush(&mut *engine);
        }
    }

    /// Broadcasts pending events and arms newly requested timers. Runs under the engine lock so
    /// subscribers see events in engine order.
    fn flush(&self, engine: &mut StepEngine) {
        for event in engine.drain_events() {
            let _ = self.inner.events.send(event);
        }
        for request in engine.take_scheduled() {
            let delay = scale_delay(request.delay, self.inner.time_scale);
            let runtime = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                runtime.fire(request.id).await;
            });
        }
    }
}

#[async_trait]
impl ConversationHandle for ConversationRuntime {
    async fn submit(&self, response: &str) -> EngineResult {
        self.dispatch(EngineCommand::Submit {
            response: response.to_string(),
        })
        .await
    }

    async fn respond_as_counterpart(&self, decision: CounterpartDecision) -> EngineResult {
        self.dispatch(EngineCommand::RespondAsCounterpart { decision })
            .await
    }

    async fn toggle_supplier(&self, name: &str) -> EngineResult {
        self.dispatch(EngineCommand::ToggleSupplier {
            name: name.to_string(),
        })
        .await
    }

    async fn update_award_details(&self, details: AwardDetails) -> EngineResult {
        self.dispatch(EngineCommand::UpdateAwardDetails { details })
            .await
    }

    async fn trigger_upload(&self) -> EngineResult {
        self.dispatch(EngineCommand::TriggerUpload).await
    }

    async fn return_to_dashboard(&self) -> EngineResult {
        self.dispatch(EngineCommand::ReturnToDashboard).await
    }

    async fn select_lane(&self, lane: &str) -> EngineResult {
        self.dispatch(EngineCommand::SelectLane {
            lane: lane.to_string(),
        })
        .await
    }

    async fn complete_content(&self, token: CompletionToken) -> EngineResult {
        self.dispatch(EngineCommand::CompleteContent { token })
            .await
    }

    async fn snapshot(&self) -> ConversationSnapshot {
        self.inner.engine.lock().await.snapshot()
    }

    fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.events.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
