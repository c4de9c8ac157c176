//! Ordered response rules. Each rule is a predicate over the response text and the current
//! step; the first one that matches classifies the response. Rules whose branch target is
//! missing from the script do not match.

use shared::domain::{
    AnimationKind, ContextView, ConversationStep, FormSection, StepMarker,
};

use crate::{
    award::{BASICS, CLAUSES, TERMS},
    scenario::AWARD_GREETING_PREFIX,
    script::ScriptTable,
};

pub const REVIEW_FLOW_COMMANDS: [&str; 2] = ["Review Award", "/beacon Review Award"];
pub const AWARD_FLOW_COMMANDS: [&str; 2] = ["Create Award", "/beacon Create Award"];
pub const CONFIRM_PDF: &str = "Yes, generate the PDF";
pub const CONFIRM_SHORTLIST: &str = "Confirm Shortlist";
pub const ACCEPT_HIERARCHY: &str = "Accept Hierarchy";
pub const SEND_FOR_APPROVAL: &str = "Yes, send for approval";
pub const START_OVER: &str = "No, start over";
pub const SEND_INVITES: &str = "Yes, send them.";
pub const ACCEPT_DIRECTLY: &str = "Accept directly";
pub const SHOW_SUMMARY: &str = "Yes, show the summary";

pub struct RuleContext<'a> {
    pub script: &'a ScriptTable,
    pub position: usize,
    pub step: &'a ConversationStep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    EnterReviewFlow { start: usize },
    EnterAwardFlow { start: usize },
    ConfirmPdfGeneration { target: usize },
    ConfirmShortlist,
    AwardBasics,
    AcceptHierarchy,
    AwardTerms,
    AwardClauses,
    ItemList,
    SendForApproval,
    StartOver { greeting: usize },
    SendInvites,
    AcceptDirectly { target: usize },
    ShowSummary { target: usize },
    Free,
}

impl Response {
    /// Global commands are accepted even while the current step offers no input.
    pub fn is_global(&self) -> bool {
        matches!(
            self,
            Response::EnterReviewFlow { .. } | Response::EnterAwardFlow { .. }
        )
    }
}

struct Rule {
    name: &'static str,
    classify: fn(&str, &RuleContext<'_>) -> Option<Response>,
}

const RULES: &[Rule] = &[
    Rule {
        name: "review_flow_entry",
        classify: |response, ctx| {
            REVIEW_FLOW_COMMANDS
                .contains(&response)
                .then(|| ctx.script.find_marker(StepMarker::ReviewFlowStart))
                .flatten()
                .map(|start| Response::EnterReviewFlow { start })
        },
    },
    Rule {
        name: "award_flow_entry",
        classify: |response, ctx| {
            AWARD_FLOW_COMMANDS
                .contains(&response)
                .then(|| ctx.script.find_greeting(AWARD_GREETING_PREFIX))
                .flatten()
                .map(|start| Response::EnterAwardFlow { start })
        },
    },
    Rule {
        name: "pdf_confirmation",
        classify: |response, ctx| {
            (response == CONFIRM_PDF)
                .then(|| ctx.script.find_animation(AnimationKind::PdfGeneration))
                .flatten()
                .map(|target| Response::ConfirmPdfGeneration { target })
        },
    },
    Rule {
        name: "confirm_shortlist",
        classify: |response, ctx| {
            (ctx.step.context_view == Some(ContextView::SupplierShortlist)
                && response == CONFIRM_SHORTLIST)
                .then_some(Response::ConfirmShortlist)
        },
    },
    Rule {
        name: "award_basics",
        classify: |response, _| BASICS.matches(response).then_some(Response::AwardBasics),
    },
    Rule {
        name: "accept_hierarchy",
        classify: |response, _| (response == ACCEPT_HIERARCHY).then_some(Response::AcceptHierarchy),
    },
    Rule {
        name: "award_terms",
        classify: |response, _| TERMS.matches(response).then_some(Response::AwardTerms),
    },
    Rule {
        name: "award_clauses",
        classify: |response, _| CLAUSES.matches(response).then_some(Response::AwardClauses),
    },
    Rule {
        name: "item_list",
        classify: |response, ctx| {
            (ctx.step.form_section == Some(FormSection::Items) && response.contains(','))
                .then_some(Response::ItemList)
        },
    },
    Rule {
        name: "send_for_approval",
        classify: |response, _| (response == SEND_FOR_APPROVAL).then_some(Response::SendForApproval),
    },
    Rule {
        name: "start_over",
        classify: |response, ctx| {
            (response == START_OVER)
                .then(|| ctx.script.find_greeting(AWARD_GREETING_PREFIX))
                .flatten()
                .map(|greeting| Response::StartOver { greeting })
        },
    },
    Rule {
        name: "send_invites",
        classify: |response, ctx| {
            (response == SEND_INVITES
                && ctx.script.find_marker(StepMarker::SupplierInvite) == Some(ctx.position))
                .then_some(Response::SendInvites)
        },
    },
    Rule {
        name: "accept_directly",
        classify: |response, ctx| {
            if response != ACCEPT_DIRECTLY
                || ctx.script.find_marker(StepMarker::DirectAccept) != Some(ctx.position)
            {
                return None;
            }
            ctx.script
                .find_marker(StepMarker::DirectAcceptTarget)
                .map(|target| Response::AcceptDirectly { target })
        },
    },
    Rule {
        name: "show_summary",
        classify: |response, ctx| {
            (response == SHOW_SUMMARY)
                .then(|| ctx.script.find_view(ContextView::AwardSummary))
                .flatten()
                .map(|target| Response::ShowSummary { target })
        },
    },
];

/// Classifies a response; returns the matching rule name alongside for logging.
pub fn classify(response: &str, ctx: &RuleContext<'_>) -> (&'static str, Response) {
    RULES
        .iter()
        .find_map(|rule| (rule.classify)(response, ctx).map(|matched| (rule.name, matched)))
        .unwrap_or(("generic", Response::Free))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::beacon_script;

    fn classify_at(script: &ScriptTable, position: usize, response: &str) -> Response {
        let step = script.get(position).expect("step");
        classify(
            response,
            &RuleContext {
                script,
                position,
                step,
            },
        )
        .1
    }

    #[test]
    fn flow_entry_commands_resolve_their_targets() {
        let script = beacon_script();
        let greeting = script.find_greeting(AWARD_GREETING_PREFIX).expect("greeting");
        let review = script.find_marker(StepMarker::ReviewFlowStart).expect("review");

        for command in AWARD_FLOW_COMMANDS {
            assert_eq!(
                classify_at(&script, 0, command),
                Response::EnterAwardFlow { start: greeting }
            );
        }
        assert_eq!(
            classify_at(&script, 0, "Review Award"),
            Response::EnterReviewFlow { start: review }
        );
        assert!(Response::EnterAwardFlow { start: greeting }.is_global());
        assert!(!Response::AwardBasics.is_global());
    }

    #[test]
    fn missing_targets_fall_through_to_generic() {
        let script = ScriptTable::from_steps(vec![ConversationStep::agent("only step")]);
        assert_eq!(classify_at(&script, 0, "Create Award"), Response::Free);
        assert_eq!(classify_at(&script, 0, SHOW_SUMMARY), Response::Free);
        assert_eq!(classify_at(&script, 0, CONFIRM_PDF), Response::Free);
        assert_eq!(classify_at(&script, 0, START_OVER), Response::Free);
    }

    #[test]
    fn position_bound_rules_only_match_at_their_step() {
        let script = beacon_script();
        let invite = script.find_marker(StepMarker::SupplierInvite).expect("invite");
        let direct = script.find_marker(StepMarker::DirectAccept).expect("direct");
        let target = script
            .find_marker(StepMarker::DirectAcceptTarget)
            .expect("target");

        assert_eq!(classify_at(&script, invite, SEND_INVITES), Response::SendInvites);
        assert_eq!(classify_at(&script, invite + 1, SEND_INVITES), Response::Free);
        assert_eq!(
            classify_at(&script, direct, ACCEPT_DIRECTLY),
            Response::AcceptDirectly { target }
        );
        assert_eq!(classify_at(&script, direct + 1, ACCEPT_DIRECTLY), Response::Free);
    }

    #[test]
    fn field_lists_and_items_are_recognised() {
        let script = beacon_script();
        assert_eq!(
            classify_at(&script, 0, "Market: wm-us, Vendor: 1, Brand: A"),
            Response::AwardBasics
        );
        assert_eq!(classify_at(&script, 0, "Type: Standard"), Response::AwardTerms);
        assert_eq!(classify_at(&script, 0, "Commitment: Yes"), Response::AwardClauses);

        let items_step = script
            .steps()
            .iter()
            .position(|step| step.form_section == Some(FormSection::Items))
            .expect("items step");
        assert_eq!(
            classify_at(&script, items_step, "1,A,Thing,2,DC1"),
            Response::ItemList
        );
        assert_eq!(classify_at(&script, 0, "1,A,Thing,2,DC1"), Response::Free);
    }

    #[test]
    fn shortlist_confirmation_requires_the_shortlist_view() {
        let script = beacon_script();
        let shortlist = script
            .find_view(ContextView::SupplierShortlist)
            .expect("shortlist");
        assert_eq!(
            classify_at(&script, shortlist, CONFIRM_SHORTLIST),
            Response::ConfirmShortlist
        );
        assert_eq!(classify_at(&script, 0, CONFIRM_SHORTLIST), Response::Free);
    }
}
