use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    domain::{
        AwardDetails, CompletionToken, ContextView, CounterpartDecision, FormSection, Message,
        SupplierStatus,
    },
    error::CommandRejection,
};

/// Inbound contract: the only ways a presentation layer may change conversation state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum EngineCommand {
    Submit { response: String },
    RespondAsCounterpart { decision: CounterpartDecision },
    ToggleSupplier { name: String },
    UpdateAwardDetails { details: AwardDetails },
    TriggerUpload,
    ReturnToDashboard,
    SelectLane { lane: String },
    CompleteContent { token: CompletionToken },
}

impl EngineCommand {
    pub fn name(&self) -> &'static str {
        match self {
            EngineCommand::Submit { .. } => "submit",
            EngineCommand::RespondAsCounterpart { .. } => "respond_as_counterpart",
            EngineCommand::ToggleSupplier { .. } => "toggle_supplier",
            EngineCommand::UpdateAwardDetails { .. } => "update_award_details",
            EngineCommand::TriggerUpload => "trigger_upload",
            EngineCommand::ReturnToDashboard => "return_to_dashboard",
            EngineCommand::SelectLane { .. } => "select_lane",
            EngineCommand::CompleteContent { .. } => "complete_content",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityFlags {
    pub thinking: bool,
    pub waiting: bool,
    pub sending: bool,
    pub generating: bool,
}

impl ActivityFlags {
    pub fn is_busy(&self) -> bool {
        self.thinking || self.waiting || self.sending || self.generating
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedInput {
    pub options: Vec<String>,
    pub image_upload: bool,
}

/// Outbound notifications, one per observable change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum EngineEvent {
    MessageAppended {
        lane: String,
        message: Message,
    },
    LanesChanged {
        lanes: Vec<String>,
        active: String,
    },
    ActivityChanged(ActivityFlags),
    InputPublished(PublishedInput),
    ContextViewChanged(ContextView),
    AwardDetailsChanged(AwardDetails),
    SuppliersChanged {
        selected: Vec<String>,
        statuses: BTreeMap<String, SupplierStatus>,
    },
    CounterpartDecided(CounterpartDecision),
    PositionChanged {
        position: usize,
        form_section: Option<FormSection>,
    },
    Halted,
    Reset,
    Rejected(CommandRejection),
}

/// Full outbound state at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSnapshot {
    pub position: usize,
    pub script_len: usize,
    pub active_lane: String,
    pub lanes: Vec<String>,
    pub messages: BTreeMap<String, Vec<Message>>,
    pub activity: ActivityFlags,
    pub input: PublishedInput,
    pub context_view: ContextView,
    pub active_form_section: Option<FormSection>,
    pub award_details: AwardDetails,
    pub selected_suppliers: Vec<String>,
    pub supplier_statuses: BTreeMap<String, SupplierStatus>,
    pub counterpart_decision: Option<CounterpartDecision>,
    pub review_flow: bool,
}

impl ConversationSnapshot {
    pub fn active_messages(&self) -> &[Message] {
        self.messages
            .get(&self.active_lane)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_halted(&self) -> bool {
        self.position >= self.script_len
    }
}
