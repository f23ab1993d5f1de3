use askama::Template;

use super::{PageContext, SelectOption};
use crate::models::call::Call;
use crate::models::review::ReviewerInfo;

#[derive(Template)]
#[template(path = "reviews/list.html")]
pub struct MyReviewsTemplate {
    pub ctx: PageContext,
    pub reviews: Vec<ReviewerInfo>,
}

#[derive(Template)]
#[template(path = "reviews/edit.html")]
pub struct ReviewEditTemplate {
    pub ctx: PageContext,
    pub reviewer: ReviewerInfo,
    /// Set when the review cannot be edited now.
    pub locked_reason: Option<String>,
    pub awaiting_response: bool,
    pub has_rating: bool,
    pub has_weight: bool,
    pub has_assessment: bool,
    pub assessments: Vec<SelectOption>,
    pub text: String,
    pub rating: String,
    pub weight: String,
    pub done: bool,
    pub errors: Vec<String>,
}

pub struct GridCellView {
    pub field: String,
    pub options: Vec<SelectOption>,
}

pub struct GridRow {
    pub proposal_id: i64,
    pub code: String,
    pub title: String,
    pub cells: Vec<GridCellView>,
    /// Reviewers in roles outside the grid (external, other committee, peer).
    pub others: Vec<ReviewerInfo>,
}

#[derive(Template)]
#[template(path = "admin/reviewers.html")]
pub struct ReviewGridTemplate {
    pub ctx: PageContext,
    pub call: Call,
    pub role_labels: Vec<&'static str>,
    pub rows: Vec<GridRow>,
    pub extra_roles: Vec<SelectOption>,
    pub people: Vec<SelectOption>,
    pub errors: Vec<String>,
}
