use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use sqlx::PgPool;

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PubType {
    Plain,
    Doi,
    Arxiv,
    Ads,
}

static DOI: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^10\.\d{4,9}/\S+$").expect("valid DOI regex"));
static ARXIV: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}\.\d{4,5}(v\d+)?|[a-z-]+(\.[A-Z]{2})?/\d{7}(v\d+)?)$").expect("valid arXiv regex")
});
static ADS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}[A-Za-z&.]{5}[0-9.]{4}[A-Za-z.][0-9.]{4}[A-Z]$").expect("valid bibcode regex"));

impl PubType {
    pub const ALL: [PubType; 4] = [PubType::Doi, PubType::Arxiv, PubType::Ads, PubType::Plain];

    pub fn code(self) -> &'static str {
        match self {
            PubType::Plain => "plain",
            PubType::Doi => "doi",
            PubType::Arxiv => "arxiv",
            PubType::Ads => "ads",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PubType::Plain => "Plain text",
            PubType::Doi => "DOI",
            PubType::Arxiv => "arXiv",
            PubType::Ads => "ADS bibcode",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        PubType::ALL.into_iter().find(|t| t.code() == code)
    }

    /// Check the reference format; identifiers are not looked up.
    pub fn validate(self, description: &str) -> Result<String, String> {
        let description = description.trim();
        let description = match self {
            PubType::Doi => description
                .trim_start_matches("https://doi.org/")
                .trim_start_matches("doi:"),
            PubType::Arxiv => description.trim_start_matches("arXiv:"),
            _ => description,
        };
        if description.is_empty() {
            return Err("The publication reference is empty".to_string());
        }
        let ok = match self {
            PubType::Plain => true,
            PubType::Doi => DOI.is_match(description),
            PubType::Arxiv => ARXIV.is_match(description),
            PubType::Ads => description.len() == 19 && ADS.is_match(description),
        };
        if ok {
            Ok(description.to_string())
        } else {
            Err(format!("\"{description}\" is not a valid {}", self.label()))
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PrevProposal {
    pub id: i64,
    pub proposal_id: i64,
    pub proposal_code: String,
    pub continuation: bool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Publication {
    pub id: i64,
    pub prev_proposal_id: i64,
    pub pub_type: String,
    pub description: String,
}

impl Publication {
    pub fn type_label(&self) -> &'static str {
        PubType::from_code(&self.pub_type).map(|t| t.label()).unwrap_or("")
    }
}

/// A previous proposal with its publications, for display.
#[derive(Debug, Clone)]
pub struct PrevProposalDisplay {
    pub prev: PrevProposal,
    pub publications: Vec<Publication>,
}

#[derive(Debug, Deserialize)]
pub struct PrevProposalForm {
    pub proposal_code: String,
    #[serde(default)]
    pub continuation: Option<String>,
    #[serde(default)]
    pub pub_type: String,
    #[serde(default)]
    pub publication: String,
    pub csrf_token: String,
}

#[derive(Debug, Deserialize)]
pub struct PublicationForm {
    pub pub_type: String,
    pub description: String,
    pub csrf_token: String,
}

static CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9/_-]{3,32}$").expect("valid code regex"));

pub fn validate_code(code: &str) -> Result<String, String> {
    let code = code.trim().to_uppercase();
    if CODE.is_match(&code) {
        Ok(code)
    } else {
        Err(format!("\"{code}\" is not a proposal code"))
    }
}

pub async fn create(pool: &PgPool, proposal_id: i64, code: &str, continuation: bool) -> Result<i64, AppError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO prev_proposal (proposal_id, proposal_code, continuation) VALUES ($1, $2, $3) \
         ON CONFLICT (proposal_id, proposal_code) DO UPDATE SET continuation = EXCLUDED.continuation \
         RETURNING id",
    )
    .bind(proposal_id)
    .bind(code)
    .bind(continuation)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

pub async fn add_publication(
    pool: &PgPool,
    proposal_id: i64,
    prev_proposal_id: i64,
    pub_type: PubType,
    description: &str,
) -> Result<i64, AppError> {
    let id: Option<i64> = sqlx::query_scalar(
        "INSERT INTO prev_proposal_pub (prev_proposal_id, pub_type, description) \
         SELECT id, $3, $4 FROM prev_proposal WHERE id = $1 AND proposal_id = $2 \
         RETURNING id",
    )
    .bind(prev_proposal_id)
    .bind(proposal_id)
    .bind(pub_type.code())
    .bind(description)
    .fetch_optional(pool)
    .await?;
    id.ok_or(AppError::NotFound)
}

pub async fn find_for_proposal(pool: &PgPool, proposal_id: i64) -> Result<Vec<PrevProposalDisplay>, AppError> {
    let prevs = sqlx::query_as::<_, PrevProposal>(
        "SELECT id, proposal_id, proposal_code, continuation FROM prev_proposal \
         WHERE proposal_id = $1 ORDER BY proposal_code",
    )
    .bind(proposal_id)
    .fetch_all(pool)
    .await?;

    let pubs = sqlx::query_as::<_, Publication>(
        "SELECT pp.id, pp.prev_proposal_id, pp.pub_type, pp.description \
         FROM prev_proposal_pub pp JOIN prev_proposal p ON p.id = pp.prev_proposal_id \
         WHERE p.proposal_id = $1 ORDER BY pp.id",
    )
    .bind(proposal_id)
    .fetch_all(pool)
    .await?;

    Ok(prevs
        .into_iter()
        .map(|prev| {
            let publications = pubs.iter().filter(|p| p.prev_proposal_id == prev.id).cloned().collect();
            PrevProposalDisplay { prev, publications }
        })
        .collect())
}

pub async fn delete(pool: &PgPool, proposal_id: i64, id: i64) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM prev_proposal WHERE id = $1 AND proposal_id = $2")
        .bind(id)
        .bind(proposal_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doi_references() {
        assert_eq!(PubType::Doi.validate("10.1093/mnras/stw2600"), Ok("10.1093/mnras/stw2600".into()));
        assert_eq!(
            PubType::Doi.validate("https://doi.org/10.3847/1538-4357/aa6c69"),
            Ok("10.3847/1538-4357/aa6c69".into())
        );
        assert!(PubType::Doi.validate("11.1/abc").is_err());
    }

    #[test]
    fn arxiv_references() {
        assert!(PubType::Arxiv.validate("1703.01234").is_ok());
        assert!(PubType::Arxiv.validate("arXiv:2101.12345v2").is_ok());
        assert!(PubType::Arxiv.validate("astro-ph/0601001").is_ok());
        assert!(PubType::Arxiv.validate("17.03").is_err());
    }

    #[test]
    fn ads_bibcodes() {
        assert!(PubType::Ads.validate("2017MNRAS.465.2559H").is_ok());
        assert!(PubType::Ads.validate("2017MNRAS.465").is_err());
    }

    #[test]
    fn plain_and_codes() {
        assert!(PubType::Plain.validate("Smith et al. 2019, in prep.").is_ok());
        assert!(PubType::Plain.validate("   ").is_err());
        assert_eq!(validate_code(" m16ap001 "), Ok("M16AP001".into()));
        assert!(validate_code("x").is_err());
    }
}
