use std::fmt;

use crate::errors::AppError;

/// Lifecycle of a proposal from drafting to the final decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProposalState {
    Preparation,
    Submitted,
    Withdrawn,
    Review,
    FinalReview,
    Accepted,
    Rejected,
    Abandoned,
}

/// Actions that move a proposal between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalAction {
    Submit,
    Withdraw,
    Reopen,
    CloseCall,
    AdvanceToFinal,
    Finalize { accept: bool },
}

impl ProposalState {
    pub const ALL: [ProposalState; 8] = [
        ProposalState::Preparation,
        ProposalState::Submitted,
        ProposalState::Withdrawn,
        ProposalState::Review,
        ProposalState::FinalReview,
        ProposalState::Accepted,
        ProposalState::Rejected,
        ProposalState::Abandoned,
    ];

    pub fn code(self) -> &'static str {
        match self {
            ProposalState::Preparation => "preparation",
            ProposalState::Submitted => "submitted",
            ProposalState::Withdrawn => "withdrawn",
            ProposalState::Review => "review",
            ProposalState::FinalReview => "final_review",
            ProposalState::Accepted => "accepted",
            ProposalState::Rejected => "rejected",
            ProposalState::Abandoned => "abandoned",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ProposalState::Preparation => "In preparation",
            ProposalState::Submitted => "Submitted",
            ProposalState::Withdrawn => "Withdrawn",
            ProposalState::Review => "Under review",
            ProposalState::FinalReview => "Final review",
            ProposalState::Accepted => "Accepted",
            ProposalState::Rejected => "Rejected",
            ProposalState::Abandoned => "Abandoned",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        ProposalState::ALL.into_iter().find(|s| s.code() == code)
    }

    /// States in which members may still change the proposal, provided the call is open.
    pub fn is_editable(self) -> bool {
        matches!(
            self,
            ProposalState::Preparation | ProposalState::Submitted | ProposalState::Withdrawn
        )
    }

    /// States in which reviewers may work on their reviews.
    pub fn is_reviewable(self) -> bool {
        matches!(self, ProposalState::Review | ProposalState::FinalReview)
    }

    pub fn is_final(self) -> bool {
        matches!(
            self,
            ProposalState::Accepted | ProposalState::Rejected | ProposalState::Abandoned
        )
    }

    /// Apply an action, returning the resulting state.
    pub fn transition(self, action: ProposalAction) -> Result<ProposalState, AppError> {
        use ProposalAction as A;
        use ProposalState as S;

        let next = match (self, action) {
            (S::Preparation | S::Withdrawn, A::Submit) => S::Submitted,
            (S::Submitted, A::Withdraw) => S::Withdrawn,
            (S::Withdrawn, A::Reopen) => S::Preparation,
            (S::Submitted, A::CloseCall) => S::Review,
            (S::Preparation | S::Withdrawn, A::CloseCall) => S::Abandoned,
            (S::Review, A::AdvanceToFinal) => S::FinalReview,
            (S::FinalReview, A::Finalize { accept: true }) => S::Accepted,
            (S::FinalReview, A::Finalize { accept: false }) => S::Rejected,
            _ => {
                return Err(AppError::InvalidTransition(format!(
                    "cannot {} a proposal which is {}",
                    action,
                    self.label().to_lowercase()
                )));
            }
        };
        Ok(next)
    }
}

impl fmt::Display for ProposalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for ProposalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProposalAction::Submit => "submit",
            ProposalAction::Withdraw => "withdraw",
            ProposalAction::Reopen => "reopen",
            ProposalAction::CloseCall => "close the call for",
            ProposalAction::AdvanceToFinal => "advance to final review",
            ProposalAction::Finalize { .. } => "finalize the decision for",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ProposalAction as A;
    use ProposalState as S;

    #[test]
    fn codes_round_trip() {
        for state in S::ALL {
            assert_eq!(S::from_code(state.code()), Some(state));
        }
        assert_eq!(S::from_code("draft"), None);
    }

    #[test]
    fn submission_cycle() {
        let s = S::Preparation.transition(A::Submit).unwrap();
        assert_eq!(s, S::Submitted);
        let s = s.transition(A::Withdraw).unwrap();
        assert_eq!(s, S::Withdrawn);
        assert_eq!(s.transition(A::Submit).unwrap(), S::Submitted);
        assert_eq!(s.transition(A::Reopen).unwrap(), S::Preparation);
    }

    #[test]
    fn closing_the_call() {
        assert_eq!(S::Submitted.transition(A::CloseCall).unwrap(), S::Review);
        assert_eq!(S::Preparation.transition(A::CloseCall).unwrap(), S::Abandoned);
        assert_eq!(S::Withdrawn.transition(A::CloseCall).unwrap(), S::Abandoned);
        assert!(S::Review.transition(A::CloseCall).is_err());
    }

    #[test]
    fn review_and_decision() {
        let s = S::Review.transition(A::AdvanceToFinal).unwrap();
        assert_eq!(s, S::FinalReview);
        assert_eq!(s.transition(A::Finalize { accept: true }).unwrap(), S::Accepted);
        assert_eq!(s.transition(A::Finalize { accept: false }).unwrap(), S::Rejected);
        assert!(S::Review.transition(A::Finalize { accept: true }).is_err());
    }

    #[test]
    fn illegal_moves_rejected() {
        assert!(S::Preparation.transition(A::Withdraw).is_err());
        assert!(S::Submitted.transition(A::Submit).is_err());
        assert!(S::Submitted.transition(A::Reopen).is_err());
        for terminal in [S::Accepted, S::Rejected, S::Abandoned] {
            assert!(terminal.is_final());
            for action in [A::Submit, A::Withdraw, A::Reopen, A::CloseCall, A::AdvanceToFinal] {
                assert!(terminal.transition(action).is_err());
            }
        }
    }

    #[test]
    fn error_message_names_action_and_state() {
        match S::Accepted.transition(A::Withdraw) {
            Err(AppError::InvalidTransition(msg)) => {
                assert_eq!(msg, "cannot withdraw a proposal which is accepted")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn editable_states() {
        assert!(S::Preparation.is_editable());
        assert!(S::Submitted.is_editable());
        assert!(S::Withdrawn.is_editable());
        assert!(!S::Review.is_editable());
        assert!(S::Review.is_reviewable());
        assert!(!S::Accepted.is_reviewable());
    }
}
