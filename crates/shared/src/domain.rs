use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u64);
    };
}

id_newtype!(MessageId);
id_newtype!(CompletionToken);
id_newtype!(TimerId);

pub const DEFAULT_LANE: &str = "Beacon AI";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Agent,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextView {
    #[default]
    Initial,
    DraftIntakeForm,
    FinalIntakeForm,
    SupplierShortlist,
    SupplierDashboard,
    SupplierComparison,
    PoSummary,
    AwardCreation,
    AwardSummary,
    AwardSending,
    AwardPdfGeneration,
    AwardSupplierView,
    AwardFinalStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormSection {
    Initial,
    Hierarchy,
    Terms,
    Clauses,
    Items,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomAction {
    CreateAwardTab,
}

/// Symbolic anchors the response rules resolve by scanning the script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepMarker {
    ReviewFlowStart,
    DirectAccept,
    DirectAcceptTarget,
    SupplierInvite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationKind {
    PdfGeneration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum StepContent {
    Text(String),
    Animation(AnimationKind),
}

impl StepContent {
    pub fn text(&self) -> Option<&str> {
        match self {
            StepContent::Text(text) => Some(text),
            StepContent::Animation(_) => None,
        }
    }

    pub fn is_completable(&self) -> bool {
        matches!(self, StepContent::Animation(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CounterpartDecision {
    Accept,
    Reject,
}

/// One entry of the conversation script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationStep {
    pub speaker: Speaker,
    pub content: StepContent,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Milliseconds; jitter is added on top when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waiting_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_view: Option<ContextView>,
    #[serde(default)]
    pub is_image_upload: bool,
    #[serde(default)]
    pub auto_continue: bool,
    #[serde(default)]
    pub awaits_completion: bool,
    #[serde(default)]
    pub is_thinking_message: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_action: Option<CustomAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_section: Option<FormSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<StepMarker>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterpart_reply: Option<CounterpartDecision>,
}

impl ConversationStep {
    fn new(speaker: Speaker, content: StepContent) -> Self {
        Self {
            speaker,
            content,
            options: Vec::new(),
            thinking_delay_ms: None,
            waiting_delay_ms: None,
            context_view: None,
            is_image_upload: false,
            auto_continue: false,
            awaits_completion: false,
            is_thinking_message: false,
            custom_action: None,
            form_section: None,
            marker: None,
            counterpart_reply: None,
        }
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self::new(Speaker::Agent, StepContent::Text(text.into()))
    }

    pub fn agent_animation(kind: AnimationKind) -> Self {
        Self::new(Speaker::Agent, StepContent::Animation(kind))
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Speaker::User, StepContent::Text(text.into()))
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn thinking(mut self, millis: u64) -> Self {
        self.thinking_delay_ms = Some(millis);
        self
    }

    pub fn waiting(mut self, millis: u64) -> Self {
        self.waiting_delay_ms = Some(millis);
        self
    }

    pub fn view(mut self, view: ContextView) -> Self {
        self.context_view = Some(view);
        self
    }

    pub fn image_upload(mut self) -> Self {
        self.is_image_upload = true;
        self
    }

    pub fn auto_continue(mut self) -> Self {
        self.auto_continue = true;
        self
    }

    pub fn awaits_completion(mut self) -> Self {
        self.awaits_completion = true;
        self
    }

    pub fn thinking_message(mut self) -> Self {
        self.is_thinking_message = true;
        self
    }

    pub fn action(mut self, action: CustomAction) -> Self {
        self.custom_action = Some(action);
        self
    }

    pub fn form(mut self, section: FormSection) -> Self {
        self.form_section = Some(section);
        self
    }

    pub fn marker(mut self, marker: StepMarker) -> Self {
        self.marker = Some(marker);
        self
    }

    pub fn counterpart_reply(mut self, decision: CounterpartDecision) -> Self {
        self.counterpart_reply = Some(decision);
        self
    }

    pub fn has_options(&self) -> bool {
        !self.options.is_empty()
    }

    /// Options or an upload affordance; a form section alone does not count.
    pub fn offers_input(&self) -> bool {
        self.has_options() || self.is_image_upload
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text {
        text: String,
    },
    Animation {
        kind: AnimationKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        completion: Option<CompletionToken>,
    },
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        MessageContent::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text { text } => Some(text),
            MessageContent::Animation { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub speaker: Speaker,
    pub content: MessageContent,
    #[serde(default)]
    pub is_thinking_message: bool,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub upc: String,
    pub item_number: String,
    pub description: String,
    pub quantity: String,
    pub dc: String,
}

/// Accumulated award record. Unset fields are omitted when serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hierarchy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sourcing_manager: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub award_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freight_terms: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub award_length: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_index: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_commitment: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rofr: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_renewal: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<LineItem>>,
}

impl AwardDetails {
    /// Shallow merge: every field set in `update` overwrites the current value.
    pub fn merge(&mut self, update: AwardDetails) {
        let AwardDetails {
            market,
            hierarchy,
            vendor_number,
            sourcing_manager,
            brand,
            award_type,
            freight_terms,
            award_length,
            cost_index,
            pricing_method,
            volume_commitment,
            rofr,
            auto_renewal,
            items,
        } = update;

        overwrite(&mut self.market, market);
        overwrite(&mut self.hierarchy, hierarchy);
        overwrite(&mut self.vendor_number, vendor_number);
        overwrite(&mut self.sourcing_manager, sourcing_manager);
        overwrite(&mut self.brand, brand);
        overwrite(&mut self.award_type, award_type);
        overwrite(&mut self.freight_terms, freight_terms);
        overwrite(&mut self.award_length, award_length);
        overwrite(&mut self.cost_index, cost_index);
        overwrite(&mut self.pricing_method, pricing_method);
        overwrite(&mut self.volume_commitment, volume_commitment);
        overwrite(&mut self.rofr, rofr);
        overwrite(&mut self.auto_renewal, auto_renewal);
        overwrite(&mut self.items, items);
    }

    pub fn lane_name(&self) -> String {
        match self.brand.as_deref() {
            Some(brand) if !brand.is_empty() => format!("{brand} Award"),
            _ => "New Award".to_string(),
        }
    }
}

fn overwrite<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub score: u8,
    pub onboarded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplierStatus {
    Onboarded,
    InvitePending,
    SendingInvite,
    Invited,
}

impl SupplierStatus {
    pub fn label(self) -> &'static str {
        match self {
            SupplierStatus::Onboarded => "Onboarded",
            SupplierStatus::InvitePending => "Invite Pending",
            SupplierStatus::SendingInvite => "Sending Invite...",
            SupplierStatus::Invited => "Invited",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_fields_the_update_leaves_unset() {
        let mut details = AwardDetails {
            market: Some("wm-us".into()),
            brand: Some("Acme".into()),
            ..AwardDetails::default()
        };
        details.merge(AwardDetails {
            brand: Some("Zenith".into()),
            rofr: Some(false),
            ..AwardDetails::default()
        });

        assert_eq!(details.market.as_deref(), Some("wm-us"));
        assert_eq!(details.brand.as_deref(), Some("Zenith"));
        assert_eq!(details.rofr, Some(false));
    }

    #[test]
    fn lane_name_falls_back_without_brand() {
        assert_eq!(AwardDetails::default().lane_name(), "New Award");
        let details = AwardDetails {
            brand: Some("NatureWell".into()),
            ..AwardDetails::default()
        };
        assert_eq!(details.lane_name(), "NatureWell Award");
    }

    #[test]
    fn step_content_deserializes_from_tagged_form() {
        let content: StepContent =
            serde_json::from_str(r#"{"type":"animation","payload":"pdf_generation"}"#)
                .expect("content");
        assert_eq!(content, StepContent::Animation(AnimationKind::PdfGeneration));
        assert!(content.is_completable());
    }
}
