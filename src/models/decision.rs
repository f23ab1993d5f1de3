use serde::Deserialize;
use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::proposal::{ProposalAction, ProposalState};

#[derive(Debug, Clone, Default, sqlx::FromRow)]
pub struct Decision {
    pub proposal_id: i64,
    pub accept: Option<bool>,
    pub exempt: bool,
    pub ready: bool,
    pub note: String,
}

impl Decision {
    pub fn accept_label(&self) -> &'static str {
        match self.accept {
            None => "Undecided",
            Some(true) => "Accept",
            Some(false) => "Reject",
        }
    }

    /// Finalizing needs the decision marked ready with accept or reject chosen.
    pub fn finalizable(&self) -> Option<bool> {
        if self.ready { self.accept } else { None }
    }
}

#[derive(Debug, Deserialize)]
pub struct DecisionForm {
    /// "", "accept", or "reject".
    #[serde(default)]
    pub accept: String,
    #[serde(default)]
    pub exempt: Option<String>,
    #[serde(default)]
    pub ready: Option<String>,
    #[serde(default)]
    pub note: String,
    pub csrf_token: String,
}

impl DecisionForm {
    pub fn to_decision(&self, proposal_id: i64) -> Result<Decision, String> {
        let accept = match self.accept.as_str() {
            "" => None,
            "accept" => Some(true),
            "reject" => Some(false),
            other => return Err(format!("Unknown decision \"{other}\"")),
        };
        let ready = self.ready.is_some();
        if ready && accept.is_none() {
            return Err("A decision cannot be marked ready until accept or reject is chosen".to_string());
        }
        Ok(Decision { proposal_id, accept, exempt: self.exempt.is_some(), ready, note: self.note.trim().to_string() })
    }
}

pub async fn find(pool: &PgPool, proposal_id: i64) -> Result<Decision, AppError> {
    let row = sqlx::query_as::<_, Decision>(
        "SELECT proposal_id, accept, exempt, ready, note FROM decision WHERE proposal_id = $1",
    )
    .bind(proposal_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.unwrap_or(Decision { proposal_id, ..Decision::default() }))
}

pub async fn find_for_call(pool: &PgPool, call_id: i64) -> Result<Vec<Decision>, AppError> {
    let rows = sqlx::query_as::<_, Decision>(
        "SELECT d.proposal_id, d.accept, d.exempt, d.ready, d.note \
         FROM decision d JOIN proposal p ON p.id = d.proposal_id WHERE p.call_id = $1",
    )
    .bind(call_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn save(pool: &PgPool, decision: &Decision) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO decision (proposal_id, accept, exempt, ready, note) VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (proposal_id) DO UPDATE \
         SET accept = EXCLUDED.accept, exempt = EXCLUDED.exempt, ready = EXCLUDED.ready, note = EXCLUDED.note",
    )
    .bind(decision.proposal_id)
    .bind(decision.accept)
    .bind(decision.exempt)
    .bind(decision.ready)
    .bind(&decision.note)
    .execute(pool)
    .await?;
    Ok(())
}

/// Outcome of finalizing a call's decisions.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FinalizeSummary {
    pub accepted: Vec<i64>,
    pub rejected: Vec<i64>,
    pub not_ready: usize,
}

/// Move every proposal of the call in final review with a ready decision
/// to accepted or rejected; the rest are left alone and counted.
pub async fn finalize_call(pool: &PgPool, call_id: i64) -> Result<FinalizeSummary, AppError> {
    #[derive(sqlx::FromRow)]
    struct Row {
        id: i64,
        accept: Option<bool>,
        ready: Option<bool>,
    }

    let rows = sqlx::query_as::<_, Row>(
        "SELECT p.id, d.accept, d.ready FROM proposal p LEFT JOIN decision d ON d.proposal_id = p.id \
         WHERE p.call_id = $1 AND p.state = $2 ORDER BY p.number",
    )
    .bind(call_id)
    .bind(ProposalState::FinalReview.code())
    .fetch_all(pool)
    .await?;

    let mut summary = FinalizeSummary::default();
    let mut tx = pool.begin().await?;
    for row in rows {
        let decision = Decision {
            proposal_id: row.id,
            accept: row.accept,
            ready: row.ready.unwrap_or(false),
            ..Decision::default()
        };
        let Some(accept) = decision.finalizable() else {
            summary.not_ready += 1;
            continue;
        };
        let next = ProposalState::FinalReview.transition(ProposalAction::Finalize { accept })?;
        sqlx::query("UPDATE proposal SET state = $2 WHERE id = $1 AND state = $3")
            .bind(row.id)
            .bind(next.code())
            .bind(ProposalState::FinalReview.code())
            .execute(&mut *tx)
            .await?;
        if accept {
            summary.accepted.push(row.id);
        } else {
            summary.rejected.push(row.id);
        }
    }
    tx.commit().await?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(accept: &str, ready: bool) -> DecisionForm {
        DecisionForm {
            accept: accept.into(),
            exempt: None,
            ready: ready.then(|| "on".to_string()),
            note: " Strong science case. ".into(),
            csrf_token: String::new(),
        }
    }

    #[test]
    fn ready_needs_a_choice() {
        assert!(form("", true).to_decision(1).is_err());
        let d = form("reject", true).to_decision(1).unwrap();
        assert_eq!(d.accept, Some(false));
        assert_eq!(d.note, "Strong science case.");
        assert_eq!(d.finalizable(), Some(false));
        assert!(form("maybe", false).to_decision(1).is_err());
    }

    #[test]
    fn finalizable_only_when_ready() {
        let d = form("accept", false).to_decision(1).unwrap();
        assert_eq!(d.finalizable(), None);
        assert_eq!(Decision::default().accept_label(), "Undecided");
    }
}
