use actix_session::Session;
use sqlx::PgPool;

use crate::auth::session::{is_admin, require_person_id};
use crate::errors::AppError;
use crate::models::member::{self, MemberAccess};
use crate::models::proposal::{self, Proposal};
use crate::models::review;

/// A proposal together with what the logged-in person may do with it.
pub struct ProposalAccess {
    pub proposal: Proposal,
    pub person_id: i64,
    pub member: Option<MemberAccess>,
    pub is_admin: bool,
}

impl ProposalAccess {
    pub fn is_editor(&self) -> bool {
        self.member.is_some_and(|m| m.editor)
    }

    pub fn can_edit(&self) -> bool {
        self.is_editor() && self.proposal.can_edit()
    }
}

/// Members, administrators, and reviewers (unless they declared a conflict) may view a proposal.
pub async fn load_viewable(pool: &PgPool, session: &Session, proposal_id: i64) -> Result<ProposalAccess, AppError> {
    let person_id = require_person_id(session)?;
    let proposal = proposal::find_by_id(pool, proposal_id).await?.ok_or(AppError::NotFound)?;
    let member = member::find_access(pool, proposal_id, person_id).await?;
    let is_admin = is_admin(session);

    if member.is_none() && !is_admin && !review::is_reviewer(pool, proposal_id, person_id).await? {
        return Err(AppError::PermissionDenied("proposal.view".to_string()));
    }
    Ok(ProposalAccess { proposal, person_id, member, is_admin })
}

/// As `load_viewable`, but the person must be an editor and the proposal still open for editing.
pub async fn load_editable(pool: &PgPool, session: &Session, proposal_id: i64) -> Result<ProposalAccess, AppError> {
    let access = load_viewable(pool, session, proposal_id).await?;
    if !access.is_editor() {
        return Err(AppError::PermissionDenied("proposal.edit".to_string()));
    }
    if !access.proposal.can_edit() {
        return Err(AppError::InvalidTransition(format!(
            "Proposal {} can no longer be edited (state: {}, call closing date: {})",
            access.proposal.code(),
            access.proposal.state_label().to_lowercase(),
            access.proposal.close_display()
        )));
    }
    Ok(access)
}
