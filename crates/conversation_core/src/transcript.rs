//! Per-lane message logs. Append-only during a run; `reset` restores the single default lane.

use std::collections::BTreeMap;

use chrono::Utc;
use shared::domain::{Message, MessageContent, MessageId, Speaker, DEFAULT_LANE};

#[derive(Debug, Clone)]
pub struct TranscriptStore {
    order: Vec<String>,
    lanes: BTreeMap<String, Vec<Message>>,
    active: String,
}

impl Default for TranscriptStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptStore {
    pub fn new() -> Self {
        let mut lanes = BTreeMap::new();
        lanes.insert(DEFAULT_LANE.to_string(), Vec::new());
        Self {
            order: vec![DEFAULT_LANE.to_string()],
            lanes,
            active: DEFAULT_LANE.to_string(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn active(&self) -> &str {
        &self.active
    }

    pub fn lane_names(&self) -> &[String] {
        &self.order
    }

    pub fn contains(&self, lane: &str) -> bool {
        self.lanes.contains_key(lane)
    }

    pub fn messages(&self, lane: &str) -> &[Message] {
        self.lanes.get(lane).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn all_messages(&self) -> &BTreeMap<String, Vec<Message>> {
        &self.lanes
    }

    /// Creates the lane when absent. Returns true if it was created.
    pub fn open_lane(&mut self, lane: &str) -> bool {
        if self.lanes.contains_key(lane) {
            return false;
        }
        self.lanes.insert(lane.to_string(), Vec::new());
        self.order.push(lane.to_string());
        true
    }

    /// Returns false for unknown lanes.
    pub fn activate(&mut self, lane: &str) -> bool {
        if !self.lanes.contains_key(lane) {
            return false;
        }
        self.active = lane.to_string();
        true
    }

    /// Appends to the lane that is active right now.
    pub fn append(
        &mut self,
        speaker: Speaker,
        content: MessageContent,
        is_thinking_message: bool,
    ) -> Message {
        let lane = self.active.clone();
        self.append_to(&lane, speaker, content, is_thinking_message)
    }

    fn append_to(
        &mut self,
        lane: &str,
        speaker: Speaker,
        content: MessageContent,
        is_thinking_message: bool,
    ) -> Message {
        let messages = self.lanes.entry(lane.to_string()).or_default();
        let message = Message {
            id: MessageId(messages.len() as u64),
            speaker,
            content,
            is_thinking_message,
            sent_at: Utc::now(),
        };
        messages.push(message.clone());
        message
    }
}
