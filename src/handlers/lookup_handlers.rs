//! JSON lookups used by forms while they are being filled in.

use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::PgPool;

use crate::errors::{AppError, json_error};
use crate::models::{affiliation, person};

const MIN_QUERY_LEN: usize = 2;
const MAX_RESULTS: i64 = 20;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

async fn search_people(pool: &PgPool, q: &str) -> Result<HttpResponse, AppError> {
    let q = q.trim();
    if q.chars().count() < MIN_QUERY_LEN {
        return Ok(HttpResponse::Ok().json(Vec::<person::PersonOption>::new()));
    }
    let people = person::search(pool, q, MAX_RESULTS).await?;
    Ok(HttpResponse::Ok().json(people))
}

/// `GET /api/people?q=...`
pub async fn people(pool: web::Data<PgPool>, query: web::Query<SearchQuery>) -> HttpResponse {
    search_people(&pool, &query.q).await.unwrap_or_else(json_error)
}

/// `GET /api/queues/{id}/affiliations`: the affiliations proposers may choose.
pub async fn affiliations(pool: web::Data<PgPool>, path: web::Path<i64>) -> HttpResponse {
    affiliation::find_for_queue(&pool, path.into_inner(), false)
        .await
        .map(|rows| HttpResponse::Ok().json(rows))
        .unwrap_or_else(json_error)
}
