use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::models::call::format_datetime;
use crate::models::proposal::{ProposalState, proposal_code};

/// The part a reviewer plays for one proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReviewerRole {
    Technical,
    External,
    CommitteePrimary,
    CommitteeSecondary,
    CommitteeOther,
    Feedback,
    Peer,
}

impl ReviewerRole {
    pub const ALL: [ReviewerRole; 7] = [
        ReviewerRole::Technical,
        ReviewerRole::External,
        ReviewerRole::CommitteePrimary,
        ReviewerRole::CommitteeSecondary,
        ReviewerRole::CommitteeOther,
        ReviewerRole::Feedback,
        ReviewerRole::Peer,
    ];

    /// Roles held by at most one person per proposal, assigned through the grid.
    pub const UNIQUE: [ReviewerRole; 4] = [
        ReviewerRole::Technical,
        ReviewerRole::CommitteePrimary,
        ReviewerRole::CommitteeSecondary,
        ReviewerRole::Feedback,
    ];

    pub fn code(self) -> &'static str {
        match self {
            ReviewerRole::Technical => "technical",
            ReviewerRole::External => "external",
            ReviewerRole::CommitteePrimary => "committee_primary",
            ReviewerRole::CommitteeSecondary => "committee_secondary",
            ReviewerRole::CommitteeOther => "committee_other",
            ReviewerRole::Feedback => "feedback",
            ReviewerRole::Peer => "peer",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ReviewerRole::Technical => "Technical",
            ReviewerRole::External => "External",
            ReviewerRole::CommitteePrimary => "Committee primary",
            ReviewerRole::CommitteeSecondary => "Committee secondary",
            ReviewerRole::CommitteeOther => "Committee other",
            ReviewerRole::Feedback => "Feedback",
            ReviewerRole::Peer => "Peer",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        ReviewerRole::ALL.into_iter().find(|r| r.code() == code)
    }

    pub fn is_unique(self) -> bool {
        ReviewerRole::UNIQUE.contains(&self)
    }

    pub fn has_rating(self) -> bool {
        matches!(
            self,
            ReviewerRole::External
                | ReviewerRole::CommitteePrimary
                | ReviewerRole::CommitteeSecondary
                | ReviewerRole::CommitteeOther
                | ReviewerRole::Peer
        )
    }

    pub fn has_weight(self) -> bool {
        self.has_rating()
    }

    pub fn has_assessment(self) -> bool {
        matches!(self, ReviewerRole::Technical)
    }

    /// The reviewer must accept (or declare a conflict) before reviewing.
    pub fn needs_acceptance(self) -> bool {
        matches!(
            self,
            ReviewerRole::External
                | ReviewerRole::CommitteePrimary
                | ReviewerRole::CommitteeSecondary
                | ReviewerRole::CommitteeOther
                | ReviewerRole::Peer
        )
    }

    /// The proposal state during which this role's review is written.
    pub fn review_state(self) -> ProposalState {
        match self {
            ReviewerRole::Feedback => ProposalState::FinalReview,
            _ => ProposalState::Review,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assessment {
    Feasible,
    Problem,
    Infeasible,
}

impl Assessment {
    pub const ALL: [Assessment; 3] = [Assessment::Feasible, Assessment::Problem, Assessment::Infeasible];

    pub fn code(self) -> &'static str {
        match self {
            Assessment::Feasible => "feasible",
            Assessment::Problem => "problem",
            Assessment::Infeasible => "infeasible",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Assessment::Feasible => "Feasible",
            Assessment::Problem => "Feasible with problems",
            Assessment::Infeasible => "Not feasible",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Assessment::ALL.into_iter().find(|a| a.code() == code)
    }
}

/// A reviewer assignment joined with its review (if started) and proposal.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReviewerInfo {
    pub id: i64,
    pub proposal_id: i64,
    pub person_id: i64,
    pub person_name: String,
    pub role: String,
    pub accepted: Option<bool>,
    pub text: Option<String>,
    pub assessment: Option<String>,
    pub rating: Option<i32>,
    pub weight: Option<i32>,
    pub review_state: Option<String>,
    pub edited_at: Option<DateTime<Utc>>,
    pub proposal_number: i32,
    pub proposal_title: String,
    pub proposal_state: String,
    pub semester_code: String,
    pub queue_code: String,
}

impl ReviewerInfo {
    pub fn reviewer_role(&self) -> Option<ReviewerRole> {
        ReviewerRole::from_code(&self.role)
    }

    pub fn role_label(&self) -> &'static str {
        self.reviewer_role().map(|r| r.label()).unwrap_or("Unknown")
    }

    pub fn proposal_code(&self) -> String {
        proposal_code(&self.semester_code, &self.queue_code, self.proposal_number)
    }

    pub fn is_done(&self) -> bool {
        self.review_state.as_deref() == Some("done")
    }

    pub fn acceptance_label(&self) -> &'static str {
        match self.accepted {
            None => "Not yet accepted",
            Some(true) => "Accepted",
            Some(false) => "Conflict of interest",
        }
    }

    pub fn assessment_label(&self) -> &'static str {
        self.assessment.as_deref().and_then(Assessment::from_code).map(|a| a.label()).unwrap_or("")
    }

    pub fn rating_display(&self) -> String {
        self.rating.map(|r| r.to_string()).unwrap_or_default()
    }

    pub fn weight_display(&self) -> String {
        self.weight.map(|w| w.to_string()).unwrap_or_default()
    }

    pub fn text_display(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    pub fn edited_display(&self) -> String {
        self.edited_at.map(format_datetime).unwrap_or_default()
    }

    /// Whether the reviewer may edit now, or why not.
    pub fn check_editable(&self) -> Result<ReviewerRole, String> {
        let role = self.reviewer_role().ok_or_else(|| "Unknown reviewer role".to_string())?;
        let state = ProposalState::from_code(&self.proposal_state);
        if state != Some(role.review_state()) {
            return Err(format!(
                "{} reviews can only be edited while the proposal is in {}",
                role.label(),
                role.review_state().label().to_lowercase()
            ));
        }
        if role.needs_acceptance() && self.accepted != Some(true) {
            return Err("The review must be accepted before it can be written".to_string());
        }
        Ok(role)
    }
}

#[derive(Debug, Deserialize)]
pub struct ReviewForm {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub assessment: String,
    #[serde(default)]
    pub rating: String,
    #[serde(default)]
    pub weight: String,
    #[serde(default)]
    pub done: Option<String>,
    pub csrf_token: String,
}

#[derive(Debug, Deserialize)]
pub struct AcceptanceForm {
    /// "accept" or "conflict".
    pub response: String,
    pub csrf_token: String,
}

/// Validated review values, ready to store.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewUpdate {
    pub text: String,
    pub assessment: Option<Assessment>,
    pub rating: Option<i32>,
    pub weight: Option<i32>,
    pub done: bool,
}

/// Check a review form against what the role carries. Fields the role does not
/// carry are dropped; a review marked done must have every carried field.
pub fn validate_review(role: ReviewerRole, form: &ReviewForm) -> Result<ReviewUpdate, Vec<String>> {
    let mut errors = Vec::new();
    let done = form.done.is_some();

    let mut percent = |value: &str, label: &str| -> Option<i32> {
        match value.trim() {
            "" => None,
            v => match v.parse::<i32>() {
                Ok(n) if (0..=100).contains(&n) => Some(n),
                _ => {
                    errors.push(format!("{label} must be a whole number from 0 to 100"));
                    None
                }
            },
        }
    };
    let rating = if role.has_rating() { percent(&form.rating, "Rating") } else { None };
    let weight = if role.has_weight() { percent(&form.weight, "Weight") } else { None };

    let assessment = if role.has_assessment() {
        match form.assessment.trim() {
            "" => None,
            code => {
                let a = Assessment::from_code(code);
                if a.is_none() {
                    errors.push("Unknown technical assessment".to_string());
                }
                a
            }
        }
    } else {
        None
    };

    let text = form.text.trim().to_string();
    if done {
        if text.is_empty() {
            errors.push("A completed review needs text".to_string());
        }
        if role.has_rating() && rating.is_none() && form.rating.trim().is_empty() {
            errors.push("A completed review needs a rating".to_string());
        }
        if role.has_weight() && weight.is_none() && form.weight.trim().is_empty() {
            errors.push("A completed review needs a weight".to_string());
        }
        if role.has_assessment() && assessment.is_none() && form.assessment.trim().is_empty() {
            errors.push("A completed review needs a technical assessment".to_string());
        }
    }

    if errors.is_empty() {
        Ok(ReviewUpdate { text, assessment, rating, weight, done })
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(text: &str, assessment: &str, rating: &str, weight: &str, done: bool) -> ReviewForm {
        ReviewForm {
            text: text.into(),
            assessment: assessment.into(),
            rating: rating.into(),
            weight: weight.into(),
            done: done.then(|| "on".to_string()),
            csrf_token: String::new(),
        }
    }

    #[test]
    fn role_attributes() {
        assert!(ReviewerRole::Technical.is_unique());
        assert!(!ReviewerRole::Technical.has_rating());
        assert!(ReviewerRole::Technical.has_assessment());
        assert!(!ReviewerRole::Technical.needs_acceptance());
        assert!(ReviewerRole::CommitteePrimary.has_rating() && ReviewerRole::CommitteePrimary.has_weight());
        assert!(!ReviewerRole::External.is_unique());
        assert!(ReviewerRole::Peer.needs_acceptance());
        assert_eq!(ReviewerRole::Feedback.review_state(), ProposalState::FinalReview);
        for role in ReviewerRole::ALL {
            assert_eq!(ReviewerRole::from_code(role.code()), Some(role));
        }
    }

    #[test]
    fn draft_reviews_may_be_partial() {
        let update = validate_review(ReviewerRole::CommitteePrimary, &form("", "", "70", "", false)).unwrap();
        assert_eq!(update.rating, Some(70));
        assert_eq!(update.weight, None);
        assert!(!update.done);
    }

    #[test]
    fn done_requires_carried_fields() {
        let errs = validate_review(ReviewerRole::CommitteePrimary, &form("Good", "", "", "", true)).unwrap_err();
        assert_eq!(errs.len(), 2);
        let errs = validate_review(ReviewerRole::Technical, &form("Fine", "", "", "", true)).unwrap_err();
        assert_eq!(errs, vec!["A completed review needs a technical assessment"]);
        let ok = validate_review(ReviewerRole::Technical, &form("Fine", "problem", "90", "", true)).unwrap();
        assert_eq!(ok.assessment, Some(Assessment::Problem));
        assert_eq!(ok.rating, None, "technical reviews carry no rating");
    }

    #[test]
    fn range_checks() {
        let errs = validate_review(ReviewerRole::Peer, &form("x", "", "101", "-1", false)).unwrap_err();
        assert_eq!(errs.len(), 2);
        let errs = validate_review(ReviewerRole::Technical, &form("x", "great", "", "", false)).unwrap_err();
        assert_eq!(errs, vec!["Unknown technical assessment"]);
    }
}
