use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use shared::domain::{AnimationKind, ContextView, ConversationStep, Speaker, StepContent, StepMarker};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to read script file '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse script: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("script has no steps")]
    Empty,
    #[error("step marker {marker:?} is declared at steps {first} and {second}")]
    DuplicateMarker {
        marker: StepMarker,
        first: usize,
        second: usize,
    },
}

/// How advancement resumes once a step's message is shown, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumePolicy {
    AutoContinue,
    AwaitCompletion,
    ImageUpload,
    Options,
    FormInput,
    Idle,
}

impl ResumePolicy {
    pub fn of(step: &ConversationStep) -> Self {
        if step.auto_continue && !step.offers_input() {
            ResumePolicy::AutoContinue
        } else if step.awaits_completion {
            ResumePolicy::AwaitCompletion
        } else if step.is_image_upload {
            ResumePolicy::ImageUpload
        } else if step.has_options() {
            ResumePolicy::Options
        } else if step.form_section.is_some() {
            ResumePolicy::FormInput
        } else {
            ResumePolicy::Idle
        }
    }

    fn declared(step: &ConversationStep) -> usize {
        [
            step.auto_continue && !step.offers_input(),
            step.awaits_completion,
            step.is_image_upload || step.has_options(),
        ]
        .into_iter()
        .filter(|declared| *declared)
        .count()
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct ScriptFile {
    steps: Vec<ConversationStep>,
}

/// Ordered, immutable conversation script.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptTable {
    steps: Vec<ConversationStep>,
}

impl ScriptTable {
    /// Trusted construction for built-in scripts; no validation.
    pub fn from_steps(steps: Vec<ConversationStep>) -> Self {
        Self { steps }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ScriptError> {
        let file: ScriptFile = toml::from_str(raw)?;
        Self::validated(file.steps)
    }

    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        let raw = fs::read_to_string(path).map_err(|source| ScriptError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validated(steps: Vec<ConversationStep>) -> Result<Self, ScriptError> {
        if steps.is_empty() {
            return Err(ScriptError::Empty);
        }

        let mut seen: Vec<(StepMarker, usize)> = Vec::new();
        for (index, step) in steps.iter().enumerate() {
            if let Some(marker) = step.marker {
                if let Some((_, first)) = seen.iter().find(|(known, _)| *known == marker) {
                    return Err(ScriptError::DuplicateMarker {
                        marker,
                        first: *first,
                        second: index,
                    });
                }
                seen.push((marker, index));
            }

            if ResumePolicy::declared(step) > 1 {
                warn!(
                    step = index,
                    policy = ?ResumePolicy::of(step),
                    "script: step declares more than one resume policy; precedence applies"
                );
            }
            if step.speaker == Speaker::User && !matches!(step.content, StepContent::Text(_)) {
                warn!(step = index, "script: user step without text content");
            }
            if step.awaits_completion && !step.content.is_completable() {
                warn!(step = index, "script: step awaits completion but its content never completes");
            }
        }

        if !steps
            .iter()
            .any(|step| step.context_view == Some(ContextView::AwardSummary))
        {
            warn!("script: no award summary step; 'show the summary' will fall through");
        }

        Ok(Self { steps })
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&ConversationStep> {
        self.steps.get(position)
    }

    pub fn steps(&self) -> &[ConversationStep] {
        &self.steps
    }

    fn position_of(&self, predicate: impl Fn(&ConversationStep) -> bool) -> Option<usize> {
        self.steps.iter().position(predicate)
    }

    pub fn find_marker(&self, marker: StepMarker) -> Option<usize> {
        self.position_of(|step| step.marker == Some(marker))
    }

    /// First agent step whose text starts with `prefix`.
    pub fn find_greeting(&self, prefix: &str) -> Option<usize> {
        self.position_of(|step| {
            step.speaker == Speaker::Agent
                && step
                    .content
                    .text()
                    .is_some_and(|text| text.starts_with(prefix))
        })
    }

    pub fn find_view(&self, view: ContextView) -> Option<usize> {
        self.position_of(|step| step.context_view == Some(view))
    }

    pub fn find_animation(&self, kind: AnimationKind) -> Option<usize> {
        self.position_of(|step| step.content == StepContent::Animation(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::domain::FormSection;

    const SCRIPT: &str = r#"
[[steps]]
speaker = "agent"
content = { type = "text", payload = "Hello there." }
thinking_delay_ms = 500
options = ["Continue"]
context_view = "initial"

[[steps]]
speaker = "agent"
content = { type = "animation", payload = "pdf_generation" }
awaits_completion = true
marker = "review_flow_start"

[[steps]]
speaker = "user"
content = { type = "text", payload = "Thanks." }
form_section = "items"
"#;

    #[test]
    fn loads_steps_from_toml() {
        let script = ScriptTable::from_toml_str(SCRIPT).expect("script");
        assert_eq!(script.len(), 3);
        let first = script.get(0).expect("first");
        assert_eq!(first.thinking_delay_ms, Some(500));
        assert_eq!(first.options, vec!["Continue".to_string()]);
        assert_eq!(script.find_marker(StepMarker::ReviewFlowStart), Some(1));
        assert_eq!(script.find_animation(AnimationKind::PdfGeneration), Some(1));
        assert_eq!(script.get(2).and_then(|s| s.form_section), Some(FormSection::Items));
        assert_eq!(script.find_greeting("Hello"), Some(0));
        assert_eq!(script.find_greeting("Thanks"), None);
    }

    #[test]
    fn rejects_empty_and_duplicate_markers() {
        assert!(matches!(
            ScriptTable::from_toml_str("steps = []"),
            Err(ScriptError::Empty)
        ));

        let steps = vec![
            ConversationStep::agent("a").marker(StepMarker::SupplierInvite),
            ConversationStep::agent("b").marker(StepMarker::SupplierInvite),
        ];
        match ScriptTable::validated(steps) {
            Err(ScriptError::DuplicateMarker { first, second, .. }) => {
                assert_eq!((first, second), (0, 1));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn resume_policy_follows_precedence() {
        let auto = ConversationStep::agent("a").auto_continue();
        assert_eq!(ResumePolicy::of(&auto), ResumePolicy::AutoContinue);

        let auto_with_options = ConversationStep::agent("a")
            .auto_continue()
            .with_options(["x"]);
        assert_eq!(ResumePolicy::of(&auto_with_options), ResumePolicy::Options);

        let awaiting = ConversationStep::agent_animation(AnimationKind::PdfGeneration)
            .awaits_completion()
            .with_options(["x"]);
        assert_eq!(ResumePolicy::of(&awaiting), ResumePolicy::AwaitCompletion);

        let form = ConversationStep::agent("a").form(FormSection::Terms);
        assert_eq!(ResumePolicy::of(&form), ResumePolicy::FormInput);
        assert_eq!(
            ResumePolicy::of(&ConversationStep::agent("a")),
            ResumePolicy::Idle
        );
    }
}
