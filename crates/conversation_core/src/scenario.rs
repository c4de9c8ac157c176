//! The built-in Beacon AI sourcing scenario: script, supplier reference list, and fixed copy.

use shared::domain::{
    AnimationKind, AwardDetails, ContextView, ConversationStep, CounterpartDecision, CustomAction,
    FormSection, LineItem, StepMarker, Supplier,
};

use crate::script::ScriptTable;

pub const AWARD_GREETING_PREFIX: &str = "Great! Let’s create the award.";
pub const CANONICAL_HIERARCHY: &str =
    "SBU: Health & Wellness → Dept: OTC Care → Category: Digestive Support";
pub const EMPTY_SHORTLIST_REJECTION: &str =
    "Please select at least one supplier before confirming.";
pub const UPLOAD_RESPONSE: &str = "Uploading the image.";

pub const ACCEPT_OUTCOME: &str = "[System Message]\n\"Thank you. Your acceptance has been recorded. You may download the award PDF for your records.\"";
pub const REJECT_OUTCOME: &str = "[System Message]\n\"The award process has been terminated. Please connect with the Sourcing Manager for any feedback. Thank you.\"";

pub fn outcome_copy(decision: CounterpartDecision) -> &'static str {
    match decision {
        CounterpartDecision::Accept => ACCEPT_OUTCOME,
        CounterpartDecision::Reject => REJECT_OUTCOME,
    }
}

pub fn qualified_suppliers() -> Vec<Supplier> {
    let supplier = |name: &str, kind: &str, score: u8, onboarded: bool| Supplier {
        name: name.to_string(),
        kind: kind.to_string(),
        score,
        onboarded,
    };
    vec![
        supplier("NutriSource Labs", "Manufacturer", 94, true),
        supplier("GreenLeaf Wellness", "Distributor", 89, false),
        supplier("PureVita Co.", "Manufacturer", 86, true),
        supplier("Summit Health Partners", "Manufacturer", 82, false),
        supplier("BioCore Nutrition", "Distributor", 77, false),
    ]
}

/// Award details the review flow starts from.
pub fn review_template() -> AwardDetails {
    let item = |upc: &str, item_number: &str, description: &str, quantity: &str| LineItem {
        upc: upc.to_string(),
        item_number: item_number.to_string(),
        description: description.to_string(),
        quantity: quantity.to_string(),
        dc: "DC7070".to_string(),
    };
    AwardDetails {
        market: Some("wm-us".into()),
        vendor_number: Some("987654321".into()),
        brand: Some("STEM Toys".into()),
        hierarchy: Some("SBU: Toys → Dept: Educational → Category: Building Blocks".into()),
        award_type: Some("Standard".into()),
        freight_terms: Some("Prepaid".into()),
        award_length: Some("Annual".into()),
        cost_index: Some("2.1".into()),
        pricing_method: Some("Fixed".into()),
        volume_commitment: Some(true),
        rofr: Some(false),
        auto_renewal: Some(true),
        items: Some(vec![
            item("1234567", "SKU-A", "STEM Blocks 500pcs", "5000"),
            item("1234568", "SKU-B", "Robotics Kit V2", "2500"),
        ]),
        ..AwardDetails::default()
    }
}

pub fn beacon_script() -> ScriptTable {
    ScriptTable::from_steps(beacon_steps())
}

fn beacon_steps() -> Vec<ConversationStep> {
    vec![
        // intake
        ConversationStep::agent(
            "Hi, I'm Beacon AI. A buy plan for Digestive Health (Q3) is waiting for intake. Shall I retrieve it?",
        )
        .thinking(800)
        .view(ContextView::Initial)
        .with_options(["Retrieve it"]),
        ConversationStep::agent("Retrieving the buy plan from the planning system...")
            .thinking(600)
            .thinking_message()
            .auto_continue(),
        ConversationStep::agent(
            "I drafted an intake form from the buy plan. Fields I could not infer are highlighted.",
        )
        .thinking(2000)
        .view(ContextView::DraftIntakeForm)
        .with_options(["Looks good, finalize it"]),
        ConversationStep::agent(
            "The intake form is final. Send it to the category team for review, or accept it directly?",
        )
        .thinking(1500)
        .view(ContextView::FinalIntakeForm)
        .marker(StepMarker::DirectAccept)
        .with_options(["Send for review", "Accept directly"]),
        ConversationStep::agent("Sent to the category team. Waiting for their review...")
            .thinking(1000)
            .waiting(3000)
            .auto_continue(),
        ConversationStep::agent("The category team approved the intake form without changes.")
            .thinking(1000)
            .auto_continue(),
        // sourcing
        ConversationStep::agent(
            "Based on the intake form I found qualified suppliers. Select the ones to shortlist.",
        )
        .thinking(2500)
        .view(ContextView::SupplierShortlist)
        .marker(StepMarker::DirectAcceptTarget)
        .with_options(["Confirm Shortlist"]),
        ConversationStep::agent(
            "Here is the supplier dashboard. Some shortlisted suppliers are not onboarded yet. Shall I send them invites?",
        )
        .thinking(1500)
        .view(ContextView::SupplierDashboard)
        .marker(StepMarker::SupplierInvite)
        .with_options(["Yes, send them."]),
        ConversationStep::agent("Invites are out. I will collect bids as they arrive.")
            .thinking(2000)
            .waiting(2500)
            .auto_continue(),
        ConversationStep::agent(
            "All bids are in. Here is the side-by-side comparison. You can also upload a photo of a sample for the record.",
        )
        .thinking(3000)
        .view(ContextView::SupplierComparison)
        .image_upload()
        .with_options(["Select the top-ranked supplier"]),
        ConversationStep::agent("A purchase order is drafted for the selected supplier.")
            .thinking(2000)
            .view(ContextView::PoSummary)
            .with_options(["Create Award"]),
        // award creation
        ConversationStep::agent(format!(
            "{AWARD_GREETING_PREFIX} Start with the basics: market, vendor number and brand."
        ))
        .thinking(1200)
        .view(ContextView::AwardCreation)
        .form(FormSection::Initial),
        ConversationStep::agent(format!(
            "Based on the brand I suggest this merchandise hierarchy: {CANONICAL_HIERARCHY}. Accept it or pick another."
        ))
        .thinking(1500)
        .form(FormSection::Hierarchy)
        .with_options(["Accept Hierarchy"]),
        ConversationStep::agent(
            "Next, the award terms: type, freight terms, length, cost index and pricing method.",
        )
        .thinking(1000)
        .form(FormSection::Terms),
        ConversationStep::agent(
            "Now the clauses: volume commitment, right of first refusal and auto-renewal.",
        )
        .thinking(1000)
        .form(FormSection::Clauses),
        ConversationStep::agent(
            "I opened a dedicated workspace for this award and pulled the items from the purchase order.",
        )
        .thinking(1500)
        .action(CustomAction::CreateAwardTab)
        .auto_continue(),
        ConversationStep::user(
            "0051234567,SKU-1001,Vitamin D3 1000IU 120ct,2400,DC6094\n0051234568,SKU-1002,Vitamin D3 2000IU 90ct,1800,DC6094",
        ),
        ConversationStep::agent(
            "Review the items. Paste corrections as UPC, item number, description, quantity, DC (one per line), or confirm.",
        )
        .thinking(1000)
        .form(FormSection::Items)
        .with_options(["Items look good"]),
        ConversationStep::agent("Every section is complete. Would you like to see the summary?")
            .thinking(800)
            .with_options(["Yes, show the summary", "No, start over"]),
        // finalization
        ConversationStep::agent("Here is the award summary. Shall I send it for approval?")
            .thinking(1500)
            .view(ContextView::AwardSummary)
            .marker(StepMarker::ReviewFlowStart)
            .with_options(["Yes, send for approval", "No, start over"]),
        ConversationStep::agent(
            "The category director approved the award. Ready to generate the award PDF?",
        )
        .thinking(3000)
        .with_options(["Yes, generate the PDF"]),
        ConversationStep::agent_animation(AnimationKind::PdfGeneration)
            .thinking(500)
            .view(ContextView::AwardPdfGeneration)
            .awaits_completion(),
        ConversationStep::agent(
            "The award PDF is on the supplier portal. Waiting for the supplier's decision...",
        )
        .thinking(1500)
        .view(ContextView::AwardSupplierView)
        .counterpart_reply(CounterpartDecision::Accept),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_carries_every_anchor_once() {
        let script = beacon_script();
        for marker in [
            StepMarker::ReviewFlowStart,
            StepMarker::DirectAccept,
            StepMarker::DirectAcceptTarget,
            StepMarker::SupplierInvite,
        ] {
            assert!(script.find_marker(marker).is_some(), "missing {marker:?}");
        }
        assert!(script.find_greeting(AWARD_GREETING_PREFIX).is_some());
        assert!(script.find_view(ContextView::AwardSummary).is_some());
        assert!(script.find_animation(AnimationKind::PdfGeneration).is_some());
    }

    #[test]
    fn direct_accept_skips_forward() {
        let script = beacon_script();
        let from = script.find_marker(StepMarker::DirectAccept).expect("from");
        let to = script.find_marker(StepMarker::DirectAcceptTarget).expect("to");
        assert!(to > from + 1);
    }
}
