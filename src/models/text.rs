use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRole {
    Abstract,
    ScienceCase,
    TechnicalCase,
}

impl TextRole {
    pub const ALL: [TextRole; 3] = [TextRole::Abstract, TextRole::ScienceCase, TextRole::TechnicalCase];

    pub fn code(self) -> &'static str {
        match self {
            TextRole::Abstract => "abstract",
            TextRole::ScienceCase => "science_case",
            TextRole::TechnicalCase => "technical_case",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TextRole::Abstract => "Abstract",
            TextRole::ScienceCase => "Scientific justification",
            TextRole::TechnicalCase => "Technical justification",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        TextRole::ALL.into_iter().find(|r| r.code() == code)
    }

    /// Only the justification sections may be replaced by a PDF or carry figures.
    pub fn allows_attachments(self) -> bool {
        !matches!(self, TextRole::Abstract)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    Plain,
    Pdf,
}

impl TextFormat {
    pub fn code(self) -> &'static str {
        match self {
            TextFormat::Plain => "plain",
            TextFormat::Pdf => "pdf",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "plain" => Some(TextFormat::Plain),
            "pdf" => Some(TextFormat::Pdf),
            _ => None,
        }
    }
}

pub fn count_words(text: &str) -> i32 {
    text.split_whitespace().count() as i32
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProposalText {
    pub role: String,
    pub format: String,
    pub text: String,
    pub words: i32,
    pub edited_at: DateTime<Utc>,
    pub editor_name: Option<String>,
}

impl ProposalText {
    pub fn text_format(&self) -> TextFormat {
        TextFormat::from_code(&self.format).unwrap_or(TextFormat::Plain)
    }

    pub fn is_pdf(&self) -> bool {
        self.text_format() == TextFormat::Pdf
    }
}

#[derive(Debug, Deserialize)]
pub struct TextForm {
    pub text: String,
    pub csrf_token: String,
}

#[derive(Debug, Deserialize)]
pub struct FormatForm {
    pub format: String,
    pub csrf_token: String,
}

pub async fn find_for_proposal(pool: &PgPool, proposal_id: i64) -> Result<Vec<ProposalText>, AppError> {
    let rows = sqlx::query_as::<_, ProposalText>(
        "SELECT t.role, t.format, t.text, t.words, t.edited_at, p.name AS editor_name \
         FROM proposal_text t LEFT JOIN person p ON p.id = t.editor_id \
         WHERE t.proposal_id = $1",
    )
    .bind(proposal_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn find(pool: &PgPool, proposal_id: i64, role: TextRole) -> Result<Option<ProposalText>, AppError> {
    let row = sqlx::query_as::<_, ProposalText>(
        "SELECT t.role, t.format, t.text, t.words, t.edited_at, p.name AS editor_name \
         FROM proposal_text t LEFT JOIN person p ON p.id = t.editor_id \
         WHERE t.proposal_id = $1 AND t.role = $2",
    )
    .bind(proposal_id)
    .bind(role.code())
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Store plain text for a section, recording its word count.
pub async fn save_plain(
    pool: &PgPool,
    proposal_id: i64,
    role: TextRole,
    text: &str,
    editor_id: i64,
) -> Result<i32, AppError> {
    let text = text.trim();
    let words = count_words(text);
    sqlx::query(
        "INSERT INTO proposal_text (proposal_id, role, format, text, words, edited_at, editor_id) \
         VALUES ($1, $2, 'plain', $3, $4, now(), $5) \
         ON CONFLICT (proposal_id, role) DO UPDATE \
         SET format = 'plain', text = EXCLUDED.text, words = EXCLUDED.words, \
             edited_at = now(), editor_id = EXCLUDED.editor_id",
    )
    .bind(proposal_id)
    .bind(role.code())
    .bind(text)
    .bind(words)
    .bind(editor_id)
    .execute(pool)
    .await?;
    Ok(words)
}

/// Switch a section between plain text and PDF, keeping any text already written.
pub async fn set_format(
    pool: &PgPool,
    proposal_id: i64,
    role: TextRole,
    format: TextFormat,
    editor_id: i64,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO proposal_text (proposal_id, role, format, edited_at, editor_id) \
         VALUES ($1, $2, $3, now(), $4) \
         ON CONFLICT (proposal_id, role) DO UPDATE \
         SET format = EXCLUDED.format, edited_at = now(), editor_id = EXCLUDED.editor_id",
    )
    .bind(proposal_id)
    .bind(role.code())
    .bind(format.code())
    .bind(editor_id)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_split_on_any_whitespace() {
        assert_eq!(count_words(""), 0);
        assert_eq!(count_words("   \n\t "), 0);
        assert_eq!(count_words("Dust  emission\nin\tM82."), 4);
    }

    #[test]
    fn roles() {
        for role in TextRole::ALL {
            assert_eq!(TextRole::from_code(role.code()), Some(role));
        }
        assert!(!TextRole::Abstract.allows_attachments());
        assert!(TextRole::ScienceCase.allows_attachments());
    }
}
