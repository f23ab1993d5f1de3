//! Per-call tabulation of ratings and affiliation time, and RA-bin charts.

use std::collections::HashMap;

use actix_session::Session;
use actix_web::{HttpResponse, web};
use sqlx::PgPool;

use crate::config::AppConfig;
use crate::errors::{AppError, render};
use crate::models::affiliation::{self, EffectiveAffiliation};
use crate::models::call::{self, Call};
use crate::models::decision::{self, Decision};
use crate::models::member::{self, CallMemberAffiliation};
use crate::models::proposal::{self, ProposalListItem, ProposalState};
use crate::models::review::{self, RatingRow, ReviewerRole};
use crate::models::target;
use crate::tabulation::{
    AffiliationTotals, Assignment, MemberAffiliation, RaBins, RatingInput, RatingSummary, TargetTime,
    compute_fractions, summarize,
};
use crate::templates_structs::{
    AffiliationColumn, PageContext, RaBinRow, RaBinsTemplate, TabulationRow, TabulationTemplate,
};

/// Proposals that count towards a call's tabulation.
pub(super) fn tabulated(p: &ProposalListItem) -> bool {
    !matches!(
        ProposalState::from_code(&p.state),
        Some(ProposalState::Preparation | ProposalState::Withdrawn | ProposalState::Abandoned) | None
    )
}

/// Weighted rating per proposal, from completed reviews in roles that carry
/// both a rating and a weight.
pub(super) fn ratings_by_proposal(rows: &[RatingRow]) -> HashMap<i64, RatingSummary> {
    let mut inputs: HashMap<i64, Vec<RatingInput>> = HashMap::new();
    for row in rows {
        let counts = ReviewerRole::from_code(&row.role).is_some_and(|r| r.has_rating() && r.has_weight());
        if let (true, Some(rating), Some(weight)) = (counts, row.rating, row.weight) {
            inputs
                .entry(row.proposal_id)
                .or_default()
                .push(RatingInput { rating: f64::from(rating), weight: f64::from(weight) });
        }
    }
    inputs.into_iter().filter_map(|(id, i)| summarize(&i).map(|s| (id, s))).collect()
}

pub(super) fn rating_display(summary: Option<&RatingSummary>) -> String {
    summary.map(|s| format!("{:.1}", s.mean)).unwrap_or_default()
}

/// Everything needed to show or export a call's tabulation.
pub struct Tabulation {
    pub columns: Vec<AffiliationColumn>,
    pub rows: Vec<TabulationRow>,
    pub total_requested: f64,
    pub total_accepted: f64,
}

pub fn build_tabulation(
    proposals: &[ProposalListItem],
    affiliations: &[EffectiveAffiliation],
    members: &[CallMemberAffiliation],
    hours: &HashMap<i64, f64>,
    ratings: &HashMap<i64, RatingSummary>,
    decisions: &HashMap<i64, Decision>,
) -> Tabulation {
    let queue_standard: Vec<(i64, f64)> = affiliations
        .iter()
        .filter(|a| a.kind() == Assignment::Standard)
        .map(|a| (a.id, a.weight()))
        .collect();

    let mut totals = AffiliationTotals::new();
    let mut per_proposal = Vec::with_capacity(proposals.len());
    for p in proposals {
        let member_affiliations: Vec<MemberAffiliation> = members
            .iter()
            .filter(|m| m.proposal_id == p.id)
            .map(|m| MemberAffiliation {
                affiliation_id: m.affiliation_id,
                assignment: m.assignment.as_deref().and_then(Assignment::from_code).unwrap_or(Assignment::Standard),
                weight: m.weight.unwrap_or(0.0),
            })
            .collect();
        let shares = compute_fractions(&member_affiliations, &queue_standard);
        let requested = hours.get(&p.id).copied().unwrap_or(0.0);
        let decision = decisions.get(&p.id);
        let accepted = ProposalState::from_code(&p.state) == Some(ProposalState::Accepted)
            || decision.is_some_and(|d| d.accept == Some(true));
        totals.add(&shares, requested, if accepted { requested } else { 0.0 });
        per_proposal.push((p, shares, requested, decision));
    }

    let mut column_ids: Vec<Option<i64>> =
        affiliations.iter().filter(|a| a.kind() != Assignment::Excluded).map(|a| Some(a.id)).collect();
    if totals.has_unknown() {
        column_ids.push(None);
    }
    let name_of = |id: Option<i64>| match id {
        Some(id) => affiliations.iter().find(|a| a.id == id).map(|a| a.name.clone()).unwrap_or_default(),
        None => "Unknown".to_string(),
    };
    let columns = column_ids
        .iter()
        .map(|&id| AffiliationColumn {
            name: name_of(id),
            requested: totals.requested(id),
            requested_percent: totals.requested_percent(id),
            accepted: totals.accepted(id),
            accepted_percent: totals.accepted_percent(id),
        })
        .collect();

    let rows = per_proposal
        .into_iter()
        .map(|(p, shares, requested, decision)| {
            let rating = ratings.get(&p.id);
            TabulationRow {
                proposal_id: p.id,
                code: p.code(),
                title: p.title.clone(),
                state_label: p.state_label(),
                pi_name: p.pi_display().to_string(),
                requested,
                rating: rating_display(rating),
                rating_spread: rating.map(|s| format!("{:.1}", s.std_dev)).unwrap_or_default(),
                decision: decision.map(Decision::accept_label).unwrap_or(""),
                shares: column_ids
                    .iter()
                    .map(|id| {
                        shares
                            .iter()
                            .find(|s| s.affiliation_id == *id)
                            .map(|s| format!("{:.2}", s.fraction))
                            .unwrap_or_default()
                    })
                    .collect(),
            }
        })
        .collect();

    Tabulation { columns, rows, total_requested: totals.total_requested(), total_accepted: totals.total_accepted() }
}

async fn load(pool: &PgPool, call: &Call) -> Result<Tabulation, AppError> {
    let proposals: Vec<ProposalListItem> =
        proposal::find_for_call(pool, call.id).await?.into_iter().filter(tabulated).collect();
    let affiliations = affiliation::find_effective_for_call(pool, call.id).await?;
    let members = member::find_affiliations_for_call(pool, call.id).await?;

    let mut hours: HashMap<i64, f64> = HashMap::new();
    for t in target::find_for_call(pool, call.id).await? {
        *hours.entry(t.proposal_id).or_default() += t.time.unwrap_or(0.0);
    }
    let ratings = ratings_by_proposal(&review::find_ratings_for_call(pool, call.id).await?);
    let decisions: HashMap<i64, Decision> =
        decision::find_for_call(pool, call.id).await?.into_iter().map(|d| (d.proposal_id, d)).collect();

    Ok(build_tabulation(&proposals, &affiliations, &members, &hours, &ratings, &decisions))
}

pub async fn page(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let call = call::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;
    let tab = load(&pool, &call).await?;
    let ctx = PageContext::build(&session, &config, "/admin")?;
    render(TabulationTemplate {
        ctx,
        call,
        columns: tab.columns,
        rows: tab.rows,
        total_requested: tab.total_requested,
        total_accepted: tab.total_accepted,
    })
}

pub fn write_csv(tab: &Tabulation) -> Result<Vec<u8>, AppError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    let csv_err = |e: csv::Error| AppError::Io(e.into());

    let mut header: Vec<String> =
        ["Code", "Title", "State", "PI", "Requested (h)", "Rating", "Spread", "Decision"].map(String::from).to_vec();
    header.extend(tab.columns.iter().map(|c| c.name.clone()));
    wtr.write_record(&header).map_err(csv_err)?;

    for row in &tab.rows {
        let mut record = vec![
            row.code.clone(),
            row.title.clone(),
            row.state_label.to_string(),
            row.pi_name.clone(),
            format!("{:.2}", row.requested),
            row.rating.clone(),
            row.rating_spread.clone(),
            row.decision.to_string(),
        ];
        record.extend(row.shares.iter().cloned());
        wtr.write_record(&record).map_err(csv_err)?;
    }

    let blank = || vec![String::new(); 3];
    let mut requested = vec!["Requested (h)".to_string()];
    requested.extend(blank());
    requested.push(format!("{:.2}", tab.total_requested));
    requested.extend(vec![String::new(); 3]);
    requested.extend(tab.columns.iter().map(|c| format!("{:.2}", c.requested)));
    wtr.write_record(&requested).map_err(csv_err)?;

    let mut accepted = vec!["Accepted (h)".to_string()];
    accepted.extend(blank());
    accepted.push(format!("{:.2}", tab.total_accepted));
    accepted.extend(vec![String::new(); 3]);
    accepted.extend(tab.columns.iter().map(|c| format!("{:.2}", c.accepted)));
    wtr.write_record(&accepted).map_err(csv_err)?;

    wtr.into_inner().map_err(|e| AppError::Io(e.into_error()))
}

pub async fn csv_download(pool: web::Data<PgPool>, path: web::Path<i64>) -> Result<HttpResponse, AppError> {
    let call = call::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;
    let tab = load(&pool, &call).await?;
    let body = write_csv(&tab)?;
    let filename = format!("tabulation-{}{}.csv", call.semester_code, call.queue_code);
    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header(("Content-Disposition", format!("attachment; filename=\"{filename}\"")))
        .body(body))
}

pub fn bin_rows(bins: &RaBins) -> Vec<RaBinRow> {
    let max = bins.max_bin();
    bins.bins()
        .iter()
        .enumerate()
        .map(|(hour, &hours)| RaBinRow {
            label: format!("{hour:02}h"),
            hours,
            bar_percent: if max > 0.0 { 100.0 * hours / max } else { 0.0 },
        })
        .collect()
}

pub async fn rabins(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let call = call::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;
    let bins: RaBins = target::find_for_call(&pool, call.id)
        .await?
        .iter()
        .map(|t| TargetTime { ra_deg: t.as_target().icrs().map(|(ra, _)| ra), hours: t.time.unwrap_or(0.0) })
        .collect();

    let ctx = PageContext::build(&session, &config, "/admin")?;
    render(RaBinsTemplate { ctx, call, bins: bin_rows(&bins), unknown: bins.unknown(), total: bins.total() })
}
