use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::state::ProposalState;
use crate::models::call::format_datetime;

/// A proposal joined with its call, semester, and queue.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Proposal {
    pub id: i64,
    pub call_id: i64,
    pub number: i32,
    pub title: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub semester_id: i64,
    pub semester_code: String,
    pub semester_name: String,
    pub queue_id: i64,
    pub queue_code: String,
    pub queue_name: String,
    pub call_type: String,
    pub date_open: DateTime<Utc>,
    pub date_close: DateTime<Utc>,
}

impl Proposal {
    pub fn code(&self) -> String {
        proposal_code(&self.semester_code, &self.queue_code, self.number)
    }

    pub fn status(&self) -> ProposalState {
        ProposalState::from_code(&self.state).unwrap_or(ProposalState::Preparation)
    }

    pub fn state_label(&self) -> &'static str {
        self.status().label()
    }

    pub fn is_call_open_at(&self, now: DateTime<Utc>) -> bool {
        self.date_open <= now && now < self.date_close
    }

    /// Members may change the proposal only while it is editable and its call open.
    pub fn can_edit_at(&self, now: DateTime<Utc>) -> bool {
        self.status().is_editable() && self.is_call_open_at(now)
    }

    pub fn can_edit(&self) -> bool {
        self.can_edit_at(Utc::now())
    }

    pub fn call_title(&self) -> String {
        format!("{} {}", self.semester_name, self.queue_name)
    }

    pub fn close_display(&self) -> String {
        format_datetime(self.date_close)
    }

    pub fn submitted_display(&self) -> String {
        self.submitted_at.map(format_datetime).unwrap_or_default()
    }
}

/// `<semester code><queue code><number, three digits>`.
pub fn proposal_code(semester_code: &str, queue_code: &str, number: i32) -> String {
    format!("{semester_code}{queue_code}{number:03}")
}

/// A row in the proposal lists.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProposalListItem {
    pub id: i64,
    pub number: i32,
    pub title: String,
    pub state: String,
    pub semester_code: String,
    pub semester_name: String,
    pub queue_code: String,
    pub queue_name: String,
    pub pi_name: Option<String>,
    pub is_pi: bool,
    pub is_editor: bool,
}

impl ProposalListItem {
    pub fn code(&self) -> String {
        proposal_code(&self.semester_code, &self.queue_code, self.number)
    }

    pub fn state_label(&self) -> &'static str {
        ProposalState::from_code(&self.state)
            .map(|s| s.label())
            .unwrap_or("Unknown")
    }

    pub fn pi_display(&self) -> &str {
        self.pi_name.as_deref().unwrap_or("(none)")
    }
}

#[derive(Debug, Deserialize)]
pub struct NewProposalForm {
    pub title: String,
    #[serde(default)]
    pub affiliation_id: Option<String>,
    pub csrf_token: String,
}

#[derive(Debug, Deserialize)]
pub struct TitleForm {
    pub title: String,
    pub csrf_token: String,
}

pub fn validate_title(title: &str) -> Result<String, String> {
    let title = title.trim();
    if title.is_empty() {
        return Err("The proposal title is required".to_string());
    }
    if title.chars().count() > 200 {
        return Err("The proposal title must be at most 200 characters".to_string());
    }
    Ok(title.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_is_zero_padded() {
        assert_eq!(proposal_code("26B", "P", 7), "26BP007");
        assert_eq!(proposal_code("26B", "L", 1234), "26BL1234");
    }

    #[test]
    fn title_validation() {
        assert_eq!(validate_title("  Dust in M82 "), Ok("Dust in M82".to_string()));
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"x".repeat(201)).is_err());
    }
}
