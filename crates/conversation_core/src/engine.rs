//! The step engine: walks the script, materializes each step once, and interprets responses.
//!
//! All state lives in [`StepEngine`] and changes only through its public methods. Timers are
//! requested from the [`TimerBook`] and come back through [`StepEngine::fire`]; every observable
//! change is queued as an [`EngineEvent`] for [`StepEngine::drain_events`].

use std::{collections::BTreeMap, time::Duration};

use shared::{
    domain::{
        AnimationKind, AwardDetails, CompletionToken, ContextView, ConversationStep,
        CounterpartDecision, CustomAction, MessageContent, Speaker, StepContent, Supplier,
        SupplierStatus, TimerId,
    },
    error::{CommandRejected, RejectionCode},
    protocol::{ActivityFlags, ConversationSnapshot, EngineEvent, PublishedInput},
};
use tracing::{debug, info};

use crate::{
    award::{self, BASICS, CLAUSES, TERMS},
    rules::{self, Response, RuleContext, START_OVER},
    scenario::{self, CANONICAL_HIERARCHY, EMPTY_SHORTLIST_REJECTION, UPLOAD_RESPONSE},
    script::{ResumePolicy, ScriptTable},
    timers::{JitterSource, TimerBook, TimerKind, TimerRequest},
    transcript::TranscriptStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub user_line_delay: Duration,
    pub thinking_jitter_bound: Duration,
    pub counterpart_delay: Duration,
    pub invite_default_delay: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            user_line_delay: Duration::from_millis(1000),
            thinking_jitter_bound: Duration::from_millis(1000),
            counterpart_delay: Duration::from_millis(5000),
            invite_default_delay: Duration::from_millis(2000),
        }
    }
}

/// What an accepted command did to Position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Advanced { to: usize },
    Jumped { to: usize },
    /// Accepted, Position unchanged.
    Held,
    /// Position moves later, when a timer fires.
    Deferred,
    Recorded,
    Updated,
}

pub type EngineResult = Result<Progress, CommandRejected>;

pub struct StepEngine {
    script: ScriptTable,
    settings: EngineSettings,
    jitter: Box<dyn JitterSource>,
    suppliers: Vec<Supplier>,
    timers: TimerBook,
    outbox: Vec<EngineEvent>,
    started: bool,
    position: usize,
    transcript: TranscriptStore,
    award: AwardDetails,
    activity: ActivityFlags,
    input: PublishedInput,
    input_open: bool,
    context_view: ContextView,
    selected: Vec<String>,
    statuses: BTreeMap<String, SupplierStatus>,
    decision: Option<CounterpartDecision>,
    review_flow: bool,
    awaiting: Option<CompletionToken>,
    next_token: u64,
}

impl StepEngine {
    pub fn new(
        script: ScriptTable,
        settings: EngineSettings,
        jitter: Box<dyn JitterSource>,
    ) -> Self {
        Self {
            script,
            settings,
            jitter,
            suppliers: scenario::qualified_suppliers(),
            timers: TimerBook::default(),
            outbox: Vec::new(),
            started: false,
            position: 0,
            transcript: TranscriptStore::new(),
            award: AwardDetails::default(),
            activity: ActivityFlags::default(),
            input: PublishedInput::default(),
            input_open: false,
            context_view: ContextView::default(),
            selected: Vec::new(),
            statuses: BTreeMap::new(),
            decision: None,
            review_flow: false,
            awaiting: None,
            next_token: 0,
        }
    }

    /// Runs the first step. The engine is inert until started.
    pub fn start(&mut self) -> EngineResult {
        if self.started {
            return Err(CommandRejected::new(
                RejectionCode::AlreadyActive,
                "engine already started",
            ));
        }
        self.started = true;
        info!(steps = self.script.len(), "engine: started");
        self.emit_lanes();
        self.enter_step();
        Ok(Progress::Jumped { to: self.position })
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn suppliers(&self) -> &[Supplier] {
        &self.suppliers
    }

    pub fn is_halted(&self) -> bool {
        self.position >= self.script.len()
    }

    pub fn take_scheduled(&mut self) -> Vec<TimerRequest> {
        self.timers.take_scheduled()
    }

    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.outbox)
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            position: self.position,
            script_len: self.script.len(),
            active_lane: self.transcript.active().to_string(),
            lanes: self.transcript.lane_names().to_vec(),
            messages: self.transcript.all_messages().clone(),
            activity: self.activity,
            input: self.input.clone(),
            context_view: self.context_view,
            active_form_section: self.script.get(self.position).and_then(|step| step.form_section),
            award_details: self.award.clone(),
            selected_suppliers: self.selected.clone(),
            supplier_statuses: self.statuses.clone(),
            counterpart_decision: self.decision,
            review_flow: self.review_flow,
        }
    }

    // ---- inbound commands ----

    pub fn submit(&mut self, response: &str) -> EngineResult {
        self.ensure_running()?;
        let Some(step) = self.script.get(self.position) else {
            return Err(halted());
        };
        let (rule, kind) = rules::classify(
            response,
            &RuleContext {
                script: &self.script,
                position: self.position,
                step,
            },
        );
        if !kind.is_global() && !self.input_open {
            debug!(position = self.position, rule, "engine: response ignored, input closed");
            return Err(CommandRejected::new(
                RejectionCode::InputClosed,
                format!("step {} is not accepting responses", self.position),
            ));
        }
        debug!(position = self.position, rule, "engine: response classified");

        let outgoing = match kind {
            Response::ConfirmShortlist if self.selected.is_empty() => {
                self.append(Speaker::Agent, MessageContent::text(EMPTY_SHORTLIST_REJECTION), false);
                return Ok(Progress::Held);
            }
            Response::ConfirmShortlist => format!("Shortlist: {}.", self.selected.join(", ")),
            _ => response.to_string(),
        };

        self.apply_mutation(kind, response);
        self.append(Speaker::User, MessageContent::text(outgoing), false);
        self.close_input();

        Ok(match kind {
            Response::EnterReviewFlow { start } => self.jump(start),
            Response::EnterAwardFlow { start } => self.jump(start),
            Response::ConfirmPdfGeneration { target } => self.jump(target),
            Response::StartOver { greeting } => self.jump(greeting),
            Response::AcceptDirectly { target } => self.jump(target),
            Response::ShowSummary { target } => self.jump(target),
            Response::SendInvites => self.send_invites(),
            _ => self.advance_by_one(),
        })
    }

    fn apply_mutation(&mut self, kind: Response, response: &str) {
        match kind {
            Response::EnterReviewFlow { .. } => {
                self.set_award(scenario::review_template());
                self.review_flow = true;
                self.set_view(ContextView::AwardSummary);
            }
            Response::EnterAwardFlow { .. } => {
                self.set_award(AwardDetails::default());
                self.review_flow = false;
            }
            Response::StartOver { .. } => {
                self.set_award(AwardDetails::default());
                self.review_flow = false;
                self.set_view(ContextView::AwardCreation);
            }
            Response::AwardBasics => self.merge_award(BASICS.parse(response)),
            Response::AwardTerms => self.merge_award(TERMS.parse(response)),
            Response::AwardClauses => self.merge_award(CLAUSES.parse(response)),
            Response::AcceptHierarchy => self.merge_award(AwardDetails {
                hierarchy: Some(CANONICAL_HIERARCHY.to_string()),
                ..AwardDetails::default()
            }),
            Response::ItemList => {
                let items = award::parse_line_items(response);
                if !items.is_empty() {
                    self.merge_award(AwardDetails {
                        items: Some(items),
                        ..AwardDetails::default()
                    });
                }
            }
            Response::SendForApproval => self.set_view(ContextView::AwardSending),
            _ => {}
        }
    }

    fn send_invites(&mut self) -> Progress {
        let origin = self.position;
        let pending: Vec<String> = self
            .suppliers
            .iter()
            .filter(|supplier| !supplier.onboarded && self.selected.contains(&supplier.name))
            .map(|supplier| supplier.name.clone())
            .collect();
        for name in pending {
            self.statuses.insert(name, SupplierStatus::SendingInvite);
        }
        self.emit_suppliers();
        self.update_activity(|flags| flags.sending = true);

        let delay = self
            .script
            .get(origin + 1)
            .and_then(|step| step.thinking_delay_ms)
            .map(Duration::from_millis)
            .unwrap_or(self.settings.invite_default_delay);
        let timer = self
            .timers
            .schedule_run(TimerKind::InvitesSent { origin }, delay);
        debug!(position = origin, timer = timer.0, "engine: invites sending");
        Progress::Deferred
    }

    /// Records the counterpart's decision and ends the run.
    pub fn respond(&mut self, decision: CounterpartDecision) -> EngineResult {
        if self.decision.is_some() {
            return Err(decided());
        }
        self.record_decision(decision);
        Ok(Progress::Recorded)
    }

    fn record_decision(&mut self, decision: CounterpartDecision) {
        self.timers.release_all();
        self.awaiting = None;
        self.update_activity(|flags| *flags = ActivityFlags::default());
        self.decision = Some(decision);
        self.outbox.push(EngineEvent::CounterpartDecided(decision));
        self.set_view(ContextView::AwardFinalStatus);
        self.close_input();
        self.append(
            Speaker::Agent,
            MessageContent::text(scenario::outcome_copy(decision)),
            false,
        );
        info!(?decision, position = self.position, "engine: counterpart decided");
        self.position = self.script.len();
        self.enter_step();
    }

    pub fn toggle_supplier(&mut self, name: &str) -> EngineResult {
        self.ensure_undecided()?;
        if let Some(index) = self.selected.iter().position(|known| known == name) {
            self.selected.remove(index);
        } else {
            self.selected.push(name.to_string());
        }
        if self.context_view == ContextView::SupplierDashboard {
            self.seed_dashboard_statuses();
        }
        self.emit_suppliers();
        Ok(Progress::Updated)
    }

    pub fn update_details(&mut self, update: AwardDetails) -> EngineResult {
        self.ensure_undecided()?;
        self.merge_award(update);
        Ok(Progress::Updated)
    }

    pub fn trigger_upload(&mut self) -> EngineResult {
        self.ensure_running()?;
        let upload_open = self.input_open
            && self
                .script
                .get(self.position)
                .is_some_and(|step| step.is_image_upload);
        if !upload_open {
            return Err(CommandRejected::new(
                RejectionCode::UploadUnavailable,
                format!("step {} does not accept an upload", self.position),
            ));
        }
        self.append(Speaker::User, MessageContent::text(UPLOAD_RESPONSE), false);
        self.close_input();
        Ok(self.advance_by_one())
    }

    /// Clears every lane and all accumulated state, then runs step 0 again.
    pub fn return_to_dashboard(&mut self) -> EngineResult {
        let released = self.timers.release_all();
        self.transcript.reset();
        self.award = AwardDetails::default();
        self.selected.clear();
        self.statuses.clear();
        self.decision = None;
        self.review_flow = false;
        self.awaiting = None;
        self.activity = ActivityFlags::default();
        self.input = PublishedInput::default();
        self.input_open = false;
        self.context_view = ContextView::Initial;
        self.position = 0;
        self.started = true;
        info!(released, "engine: reset");

        self.outbox.push(EngineEvent::Reset);
        self.emit_lanes();
        self.outbox.push(EngineEvent::ActivityChanged(self.activity));
        self.outbox.push(EngineEvent::InputPublished(self.input.clone()));
        self.outbox.push(EngineEvent::ContextViewChanged(self.context_view));
        self.outbox.push(EngineEvent::AwardDetailsChanged(self.award.clone()));
        self.emit_suppliers();
        self.enter_step();
        Ok(Progress::Jumped { to: 0 })
    }

    /// Makes an existing lane active and replays the current step there.
    pub fn select_lane(&mut self, lane: &str) -> EngineResult {
        if !self.transcript.contains(lane) {
            return Err(CommandRejected::new(
                RejectionCode::UnknownLane,
                format!("no lane named '{lane}'"),
            ));
        }
        if self.transcript.active() == lane {
            return Err(CommandRejected::new(
                RejectionCode::AlreadyActive,
                format!("lane '{lane}' is already active"),
            ));
        }
        self.transcript.activate(lane);
        self.emit_lanes();
        debug!(lane, position = self.position, "engine: lane selected");
        if self.decision.is_none() && !self.is_halted() {
            self.enter_step();
        }
        Ok(Progress::Updated)
    }

    pub fn complete(&mut self, token: CompletionToken) -> EngineResult {
        self.ensure_undecided()?;
        if self.awaiting != Some(token) {
            return Err(CommandRejected::new(
                RejectionCode::StaleCompletion,
                format!("completion token {} is not awaited", token.0),
            ));
        }
        self.awaiting = None;
        let finished_pdf = self
            .script
            .get(self.position)
            .is_some_and(|step| step.content == StepContent::Animation(AnimationKind::PdfGeneration));
        if finished_pdf {
            self.update_activity(|flags| flags.generating = false);
        }
        debug!(position = self.position, token = token.0, "engine: content completed");
        Ok(self.advance_by_one())
    }

    /// Applies a due timer. Returns false when the timer was released in the meantime.
    pub fn fire(&mut self, id: TimerId) -> bool {
        let Some(kind) = self.timers.claim(id) else {
            debug!(timer = id.0, "engine: stale timer discarded");
            return false;
        };
        debug!(timer = id.0, ?kind, position = self.position, "engine: timer fired");
        match kind {
            TimerKind::Thinking => self.show_agent_step(),
            TimerKind::Waiting => {
                self.update_activity(|flags| flags.waiting = false);
                self.resolve_input();
            }
            TimerKind::UserLine => {
                if let Some(text) = self
                    .script
                    .get(self.position)
                    .and_then(|step| step.content.text())
                    .map(str::to_string)
                {
                    self.append(Speaker::User, MessageContent::text(text), false);
                }
                self.advance_by_one();
            }
            TimerKind::InvitesSent { origin } => {
                for status in self.statuses.values_mut() {
                    if *status == SupplierStatus::SendingInvite {
                        *status = SupplierStatus::Invited;
                    }
                }
                self.emit_suppliers();
                self.update_activity(|flags| flags.sending = false);
                if self.position == origin {
                    self.advance_by_one();
                }
            }
            TimerKind::CounterpartReply(decision) => {
                if self.decision.is_none() {
                    self.record_decision(decision);
                }
            }
        }
        true
    }

    // ---- advance protocol ----

    fn advance_by_one(&mut self) -> Progress {
        let to = (self.position + 1).min(self.script.len());
        self.position = to;
        self.enter_step();
        Progress::Advanced { to }
    }

    fn jump(&mut self, to: usize) -> Progress {
        debug!(from = self.position, to, "engine: branch taken");
        self.position = to;
        self.enter_step();
        Progress::Jumped { to }
    }

    fn enter_step(&mut self) {
        self.timers.release_step();
        self.awaiting = None;
        self.close_input();
        self.update_activity(|flags| {
            flags.thinking = false;
            flags.waiting = false;
            flags.generating = false;
        });

        let Some(step) = self.script.get(self.position).cloned() else {
            info!(position = self.position, "engine: halted");
            self.outbox.push(EngineEvent::Halted);
            return;
        };
        self.outbox.push(EngineEvent::PositionChanged {
            position: self.position,
            form_section: step.form_section,
        });
        debug!(
            position = self.position,
            lane = self.transcript.active(),
            speaker = ?step.speaker,
            "engine: step entered"
        );

        match step.speaker {
            Speaker::Agent => match step.thinking_delay_ms {
                Some(millis) => {
                    let mut delay = Duration::from_millis(millis);
                    if millis > 0 {
                        delay += self.jitter.thinking_jitter(self.settings.thinking_jitter_bound);
                    }
                    self.update_activity(|flags| flags.thinking = true);
                    self.timers.schedule_step(TimerKind::Thinking, delay);
                }
                None => self.show_agent_step(),
            },
            Speaker::User => {
                if let Some(text) = step.content.text() {
                    if award::looks_like_item_list(text) {
                        self.merge_award(AwardDetails {
                            items: Some(award::parse_line_items(text)),
                            ..AwardDetails::default()
                        });
                    }
                }
                self.timers
                    .schedule_step(TimerKind::UserLine, self.settings.user_line_delay);
            }
        }
    }

    fn show_agent_step(&mut self) {
        let Some(step) = self.script.get(self.position).cloned() else {
            return;
        };
        self.update_activity(|flags| flags.thinking = false);

        let content = match step.content {
            StepContent::Text(text) => MessageContent::Text { text },
            StepContent::Animation(kind) if step.awaits_completion => {
                self.next_token += 1;
                let token = CompletionToken(self.next_token);
                self.awaiting = Some(token);
                if kind == AnimationKind::PdfGeneration {
                    self.update_activity(|flags| flags.generating = true);
                }
                MessageContent::Animation {
                    kind,
                    completion: Some(token),
                }
            }
            StepContent::Animation(kind) => MessageContent::Animation {
                kind,
                completion: None,
            },
        };

        if step.custom_action == Some(CustomAction::CreateAwardTab) {
            let lane = self.award.lane_name();
            let created = self.transcript.open_lane(&lane);
            self.transcript.activate(&lane);
            debug!(lane, created, "engine: award lane opened");
            self.emit_lanes();
        }
        self.append(Speaker::Agent, content, step.is_thinking_message);

        if let Some(view) = step.context_view {
            self.set_view(view);
        }

        if let Some(decision) = step.counterpart_reply {
            self.timers.schedule_step(
                TimerKind::CounterpartReply(decision),
                self.settings.counterpart_delay,
            );
        } else if let Some(millis) = step.waiting_delay_ms {
            self.update_activity(|flags| flags.waiting = true);
            self.timers
                .schedule_step(TimerKind::Waiting, Duration::from_millis(millis));
        } else {
            self.resolve_input();
        }
    }

    fn resolve_input(&mut self) {
        let Some(step) = self.script.get(self.position) else {
            return;
        };
        match ResumePolicy::of(step) {
            ResumePolicy::AutoContinue => {
                self.advance_by_one();
            }
            ResumePolicy::AwaitCompletion => {}
            policy => {
                let input = PublishedInput {
                    options: published_options(step, self.review_flow),
                    image_upload: step.is_image_upload,
                };
                self.input_open = policy != ResumePolicy::Idle;
                self.publish_input(input);
            }
        }
    }

    // ---- state helpers ----

    fn ensure_undecided(&self) -> Result<(), CommandRejected> {
        if self.decision.is_some() {
            return Err(decided());
        }
        Ok(())
    }

    fn ensure_running(&self) -> Result<(), CommandRejected> {
        self.ensure_undecided()?;
        if self.is_halted() {
            return Err(halted());
        }
        Ok(())
    }

    fn append(&mut self, speaker: Speaker, content: MessageContent, is_thinking_message: bool) {
        let message = self.transcript.append(speaker, content, is_thinking_message);
        let lane = self.transcript.active().to_string();
        debug!(lane, id = message.id.0, "engine: message appended");
        self.outbox.push(EngineEvent::MessageAppended { lane, message });
    }

    fn close_input(&mut self) {
        self.input_open = false;
        self.publish_input(PublishedInput::default());
    }

    fn publish_input(&mut self, input: PublishedInput) {
        if self.input != input {
            self.input = input;
            self.outbox.push(EngineEvent::InputPublished(self.input.clone()));
        }
    }

    fn update_activity(&mut self, change: impl FnOnce(&mut ActivityFlags)) {
        let before = self.activity;
        change(&mut self.activity);
        if self.activity != before {
            self.outbox.push(EngineEvent::ActivityChanged(self.activity));
        }
    }

    fn set_view(&mut self, view: ContextView) {
        if self.context_view != view {
            self.context_view = view;
            self.outbox.push(EngineEvent::ContextViewChanged(view));
        }
        if view == ContextView::SupplierDashboard {
            self.seed_dashboard_statuses();
            self.emit_suppliers();
        }
    }

    fn set_award(&mut self, details: AwardDetails) {
        self.award = details;
        self.outbox.push(EngineEvent::AwardDetailsChanged(self.award.clone()));
    }

    fn merge_award(&mut self, update: AwardDetails) {
        self.award.merge(update);
        self.outbox.push(EngineEvent::AwardDetailsChanged(self.award.clone()));
    }

    /// Statuses follow the selection: deselected names drop out, new ones are labelled.
    fn seed_dashboard_statuses(&mut self) {
        self.statuses.retain(|name, _| self.selected.contains(name));
        for name in &self.selected {
            if self.statuses.contains_key(name) {
                continue;
            }
            if let Some(supplier) = self.suppliers.iter().find(|known| &known.name == name) {
                let status = if supplier.onboarded {
                    SupplierStatus::Onboarded
                } else {
                    SupplierStatus::InvitePending
                };
                self.statuses.insert(name.clone(), status);
            }
        }
    }

    fn emit_suppliers(&mut self) {
        self.outbox.push(EngineEvent::SuppliersChanged {
            selected: self.selected.clone(),
            statuses: self.statuses.clone(),
        });
    }

    fn emit_lanes(&mut self) {
        self.outbox.push(EngineEvent::LanesChanged {
            lanes: self.transcript.lane_names().to_vec(),
            active: self.transcript.active().to_string(),
        });
    }
}

fn published_options(step: &ConversationStep, review_flow: bool) -> Vec<String> {
    step.options
        .iter()
        .filter(|option| !(review_flow && option.as_str() == START_OVER))
        .cloned()
        .collect()
}

fn halted() -> CommandRejected {
    CommandRejected::new(RejectionCode::Halted, "conversation has reached its end")
}

fn decided() -> CommandRejected {
    CommandRejected::new(
        RejectionCode::Decided,
        "counterpart decision already recorded; reset to continue",
    )
}

#[cfg(test)]
#[path = "tests/engine_tests.rs"]
mod tests;
