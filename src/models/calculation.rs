use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::errors::AppError;

/// A stored calculator result. Calculators run elsewhere and post their
/// input and output here as JSON.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Calculation {
    pub id: i64,
    pub proposal_id: i64,
    pub sort_order: i32,
    pub calculator: String,
    pub mode: String,
    pub version: String,
    pub input: serde_json::Value,
    pub output: serde_json::Value,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl Calculation {
    pub fn created_display(&self) -> String {
        self.created_at.format("%Y-%m-%d %H:%M").to_string()
    }

    /// Top-level `key: value` pairs of a JSON object, for display.
    pub fn input_pairs(&self) -> Vec<(String, String)> {
        json_pairs(&self.input)
    }

    pub fn output_pairs(&self) -> Vec<(String, String)> {
        json_pairs(&self.output)
    }
}

fn json_pairs(value: &serde_json::Value) -> Vec<(String, String)> {
    match value {
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(k, v)| {
                let shown = match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), shown)
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Body of `POST /proposals/{id}/calculations`.
#[derive(Debug, Deserialize)]
pub struct NewCalculation {
    pub calculator: String,
    pub mode: String,
    #[serde(default)]
    pub version: String,
    pub input: serde_json::Value,
    pub output: serde_json::Value,
    #[serde(default)]
    pub title: String,
}

impl NewCalculation {
    pub fn validate(&self) -> Result<(), String> {
        if self.calculator.trim().is_empty() || self.mode.trim().is_empty() {
            return Err("calculator and mode are required".to_string());
        }
        if !self.input.is_object() || !self.output.is_object() {
            return Err("input and output must be JSON objects".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct CalculationTitleForm {
    pub title: String,
    pub csrf_token: String,
}

const COLUMNS: &str = "id, proposal_id, sort_order, calculator, mode, version, input, output, title, created_at";

pub async fn create(pool: &PgPool, proposal_id: i64, calc: &NewCalculation) -> Result<i64, AppError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO calculation (proposal_id, sort_order, calculator, mode, version, input, output, title) \
         VALUES ($1, (SELECT COALESCE(MAX(sort_order), 0) + 1 FROM calculation WHERE proposal_id = $1), \
                 $2, $3, $4, $5, $6, $7) \
         RETURNING id",
    )
    .bind(proposal_id)
    .bind(calc.calculator.trim())
    .bind(calc.mode.trim())
    .bind(calc.version.trim())
    .bind(&calc.input)
    .bind(&calc.output)
    .bind(calc.title.trim())
    .fetch_one(pool)
    .await?;
    Ok(id)
}

pub async fn find_for_proposal(pool: &PgPool, proposal_id: i64) -> Result<Vec<Calculation>, AppError> {
    let rows = sqlx::query_as::<_, Calculation>(&format!(
        "SELECT {COLUMNS} FROM calculation WHERE proposal_id = $1 ORDER BY sort_order, id"
    ))
    .bind(proposal_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn count_for_proposal(pool: &PgPool, proposal_id: i64) -> Result<i64, AppError> {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM calculation WHERE proposal_id = $1")
        .bind(proposal_id)
        .fetch_one(pool)
        .await?;
    Ok(n)
}

pub async fn update_title(pool: &PgPool, proposal_id: i64, id: i64, title: &str) -> Result<(), AppError> {
    let result = sqlx::query("UPDATE calculation SET title = $3 WHERE id = $1 AND proposal_id = $2")
        .bind(id)
        .bind(proposal_id)
        .bind(title.trim())
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

pub async fn delete(pool: &PgPool, proposal_id: i64, id: i64) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM calculation WHERE id = $1 AND proposal_id = $2")
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
    use serde_json::json;

    #[test]
    fn api_body_validation() {
        let ok: NewCalculation = serde_json::from_value(json!({
            "calculator": "scuba2",
            "mode": "time",
            "input": {"map": "daisy", "rms": 1.5},
            "output": {"time": 3.2}
        }))
        .unwrap();
        assert!(ok.validate().is_ok());
        assert_eq!(ok.version, "");

        let bad: NewCalculation = serde_json::from_value(json!({
            "calculator": "scuba2", "mode": "", "input": {}, "output": 4
        }))
        .unwrap();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn pairs_for_display() {
        let calc = Calculation {
            id: 1,
            proposal_id: 1,
            sort_order: 1,
            calculator: "heterodyne".into(),
            mode: "rms".into(),
            version: "1".into(),
            input: json!({"freq": 345.8, "mol": "CO 3-2"}),
            output: json!([1, 2]),
            title: String::new(),
            created_at: Utc::now(),
        };
        assert_eq!(
            calc.input_pairs(),
            vec![("freq".to_string(), "345.8".to_string()), ("mol".to_string(), "CO 3-2".to_string())]
        );
        assert!(calc.output_pairs().is_empty());
    }
}
