//! Context view selector: picks the panel for the current view and the slice of state it gets.

use chrono::{Local, Timelike};
use serde::Serialize;
use shared::{
    domain::{AwardDetails, ContextView, CounterpartDecision, FormSection, Supplier, SupplierStatus},
    protocol::ConversationSnapshot,
};

pub const QUICK_ACTIONS: [&str; 3] = ["Retrieve it", "Create Award", "Review Award"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardRow {
    pub supplier: Supplier,
    pub status: Option<SupplierStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum ViewModel {
    Initial {
        greeting: &'static str,
        actions: Vec<&'static str>,
    },
    DraftIntakeForm,
    FinalIntakeForm,
    SupplierShortlist {
        suppliers: Vec<Supplier>,
        selected: Vec<String>,
    },
    SupplierDashboard {
        rows: Vec<DashboardRow>,
    },
    SupplierComparison {
        shortlisted: Vec<String>,
    },
    PoSummary,
    AwardCreation {
        details: AwardDetails,
        active_section: Option<FormSection>,
    },
    AwardSummary {
        details: AwardDetails,
    },
    AwardSending {
        details: AwardDetails,
    },
    AwardPdfGeneration,
    AwardSupplierView {
        details: AwardDetails,
    },
    AwardFinalStatus {
        decision: Option<CounterpartDecision>,
    },
}

pub fn greeting_for_hour(hour: u32) -> &'static str {
    match hour {
        0..=11 => "Good morning",
        12..=17 => "Good afternoon",
        _ => "Good evening",
    }
}

pub fn select_view(snapshot: &ConversationSnapshot, suppliers: &[Supplier]) -> ViewModel {
    select_view_at(snapshot, suppliers, Local::now().hour())
}

pub fn select_view_at(
    snapshot: &ConversationSnapshot,
    suppliers: &[Supplier],
    hour: u32,
) -> ViewModel {
    let details = || snapshot.award_details.clone();
    match snapshot.context_view {
        ContextView::Initial => ViewModel::Initial {
            greeting: greeting_for_hour(hour),
            actions: QUICK_ACTIONS.to_vec(),
        },
        ContextView::DraftIntakeForm => ViewModel::DraftIntakeForm,
        ContextView::FinalIntakeForm => ViewModel::FinalIntakeForm,
        ContextView::SupplierShortlist => ViewModel::SupplierShortlist {
            suppliers: suppliers.to_vec(),
            selected: snapshot.selected_suppliers.clone(),
        },
        ContextView::SupplierDashboard => ViewModel::SupplierDashboard {
            rows: suppliers
                .iter()
                .filter(|supplier| snapshot.selected_suppliers.contains(&supplier.name))
                .map(|supplier| DashboardRow {
                    supplier: supplier.clone(),
                    status: snapshot.supplier_statuses.get(&supplier.name).copied(),
                })
                .collect(),
        },
        ContextView::SupplierComparison => ViewModel::SupplierComparison {
            shortlisted: snapshot.selected_suppliers.clone(),
        },
        ContextView::PoSummary => ViewModel::PoSummary,
        ContextView::AwardCreation => ViewModel::AwardCreation {
            details: details(),
            active_section: snapshot.active_form_section,
        },
        ContextView::AwardSummary => ViewModel::AwardSummary { details: details() },
        ContextView::AwardSending => ViewModel::AwardSending { details: details() },
        ContextView::AwardPdfGeneration => ViewModel::AwardPdfGeneration,
        ContextView::AwardSupplierView => ViewModel::AwardSupplierView { details: details() },
        ContextView::AwardFinalStatus => ViewModel::AwardFinalStatus {
            decision: snapshot.counterpart_decision,
        },
    }
}
