use askama::Template;

use super::PageContext;
use crate::models::call::Call;

pub struct AffiliationColumn {
    pub name: String,
    pub requested: f64,
    pub requested_percent: f64,
    pub accepted: f64,
    pub accepted_percent: f64,
}

pub struct TabulationRow {
    pub proposal_id: i64,
    pub code: String,
    pub title: String,
    pub state_label: &'static str,
    pub pi_name: String,
    pub requested: f64,
    pub rating: String,
    pub rating_spread: String,
    pub decision: &'static str,
    /// Fraction of the proposal per column, formatted, in column order.
    pub shares: Vec<String>,
}

#[derive(Template)]
#[template(path = "admin/tabulation.html")]
pub struct TabulationTemplate {
    pub ctx: PageContext,
    pub call: Call,
    pub columns: Vec<AffiliationColumn>,
    pub rows: Vec<TabulationRow>,
    pub total_requested: f64,
    pub total_accepted: f64,
}

pub struct RaBinRow {
    pub label: String,
    pub hours: f64,
    pub bar_percent: f64,
}

#[derive(Template)]
#[template(path = "admin/rabins.html")]
pub struct RaBinsTemplate {
    pub ctx: PageContext,
    pub call: Call,
    pub bins: Vec<RaBinRow>,
    pub unknown: f64,
    pub total: f64,
}
