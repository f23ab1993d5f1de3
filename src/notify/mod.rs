//! Outgoing messages. Bodies are rendered from plain-text templates and
//! queued in the database; delivery happens elsewhere.

use askama::Template;
use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::message;

#[derive(Template)]
#[template(path = "notify/submitted.txt")]
pub struct ProposalSubmitted<'a> {
    pub app_name: &'a str,
    pub code: &'a str,
    pub title: &'a str,
    pub submitter: &'a str,
    pub call_title: &'a str,
    pub close_date: &'a str,
}

#[derive(Template)]
#[template(path = "notify/invitation.txt")]
pub struct ReviewerInvitation<'a> {
    pub app_name: &'a str,
    pub reviewer: &'a str,
    pub role: &'a str,
    pub code: &'a str,
    pub title: &'a str,
    pub needs_acceptance: bool,
}

pub struct ReminderItem {
    pub code: String,
    pub title: String,
    pub role: String,
}

#[derive(Template)]
#[template(path = "notify/reminder.txt")]
pub struct ReviewReminder<'a> {
    pub app_name: &'a str,
    pub reviewer: &'a str,
    pub items: &'a [ReminderItem],
}

#[derive(Template)]
#[template(path = "notify/feedback.txt")]
pub struct DecisionFeedback<'a> {
    pub app_name: &'a str,
    pub code: &'a str,
    pub title: &'a str,
    pub accepted: bool,
    pub feedback: &'a str,
    pub note: &'a str,
}

/// Render and queue a message. Returns the message id.
pub async fn send(
    pool: &PgPool,
    subject: &str,
    body: &impl Template,
    recipients: &[i64],
) -> Result<i64, AppError> {
    let text = body.render()?;
    let id = message::queue(pool, subject, &text, recipients).await?;
    log::info!("Queued message {id} \"{subject}\" for {} recipient(s)", recipients.len());
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submitted_message_mentions_code_and_deadline() {
        let body = ProposalSubmitted {
            app_name: "Hedwig",
            code: "26BP004",
            title: "Dust & gas in M82",
            submitter: "Ada Lovelace",
            call_title: "2026B PI",
            close_date: "2026-03-20 16:00 UTC",
        }
        .render()
        .unwrap();
        assert!(body.contains("26BP004"));
        assert!(body.contains("Dust & gas in M82"), "plain text is not escaped");
        assert!(body.contains("2026-03-20 16:00 UTC"));
    }

    #[test]
    fn invitation_asks_for_acceptance_when_needed() {
        let mut inv = ReviewerInvitation {
            app_name: "Hedwig",
            reviewer: "Bo",
            role: "External",
            code: "26BP001",
            title: "T",
            needs_acceptance: true,
        };
        assert!(inv.render().unwrap().contains("conflict of interest"));
        inv.needs_acceptance = false;
        assert!(!inv.render().unwrap().contains("conflict of interest"));
    }

    #[test]
    fn reminder_lists_every_review() {
        let items = vec![
            ReminderItem { code: "26BP001".into(), title: "A".into(), role: "Technical".into() },
            ReminderItem { code: "26BP002".into(), title: "B".into(), role: "Committee primary".into() },
        ];
        let body = ReviewReminder { app_name: "Hedwig", reviewer: "Cy", items: &items }.render().unwrap();
        assert!(body.contains("26BP001") && body.contains("26BP002"));
    }

    #[test]
    fn feedback_reports_outcome() {
        let body = DecisionFeedback {
            app_name: "Hedwig",
            code: "26BP003",
            title: "T",
            accepted: false,
            feedback: "Interesting but not feasible this semester.",
            note: "",
        }
        .render()
        .unwrap();
        assert!(body.contains("not been accepted"));
        assert!(body.contains("not feasible this semester"));
    }
}
