//! Clash tool: coverage maps of reserved sky areas checked against targets.

use actix_multipart::Multipart;
use actix_session::Session;
use actix_web::{HttpResponse, web};
use sqlx::PgPool;

use crate::astro::{CoordSystem, Moc, format_dec, format_ra, parse_coordinates, to_icrs};
use crate::auth::csrf;
use crate::auth::session::{require_person_id, set_flash};
use crate::config::AppConfig;
use crate::errors::{AppError, redirect, render};
use crate::handlers::auth_handlers::CsrfOnly;
use crate::handlers::upload::read_multipart;
use crate::models::call::{self, Call};
use crate::models::moc::{self, MocSearchForm};
use crate::models::proposal::proposal_code;
use crate::models::target::{self, CallTarget};
use crate::templates_structs::{CallClashTemplate, ClashHit, ClashTemplate, PageContext, SelectOption};

fn system_options(selected: &str) -> Vec<SelectOption> {
    let selected = CoordSystem::from_code(selected).unwrap_or(CoordSystem::Icrs);
    CoordSystem::ALL
        .into_iter()
        .map(|s| SelectOption::new(s.code(), s.label(), s == selected))
        .collect()
}

async fn render_index(
    pool: &PgPool,
    config: &AppConfig,
    session: &Session,
    query: &MocSearchForm,
    search: Option<(String, Vec<String>)>,
    errors: Vec<String>,
) -> Result<HttpResponse, AppError> {
    let mocs = moc::find_all(pool, true).await?;
    let calls = call::find_all(pool).await?;
    let ctx = PageContext::build(session, config, "/admin/clash")?;
    render(ClashTemplate {
        ctx,
        mocs,
        calls,
        systems: system_options(&query.system),
        x: query.x.clone(),
        y: query.y.clone(),
        search,
        errors,
    })
}

pub async fn index(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let empty = MocSearchForm { system: String::new(), x: String::new(), y: String::new() };
    render_index(&pool, &config, &session, &empty, None, vec![]).await
}

/// Look up which stored MOCs contain a single position.
pub async fn search(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    query: web::Query<MocSearchForm>,
) -> Result<HttpResponse, AppError> {
    let Some(system) = CoordSystem::from_code(&query.system) else {
        let errors = vec![format!("Unknown coordinate system \"{}\"", query.system)];
        return render_index(&pool, &config, &session, &query, None, errors).await;
    };
    let (ra, dec) = match parse_coordinates(system, &query.x, &query.y) {
        Ok((x, y)) => to_icrs(system, x, y),
        Err(e) => return render_index(&pool, &config, &session, &query, None, vec![e]).await,
    };

    let mut names = Vec::new();
    for info in moc::find_all(&pool, true).await? {
        if moc::load(&pool, info.id).await?.contains(ra, dec) {
            names.push(info.name);
        }
    }
    let position = format!("{} {}", format_ra(ra), format_dec(dec));
    render_index(&pool, &config, &session, &query, Some((position, names)), vec![]).await
}

pub async fn upload(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let form = read_multipart(payload, config.max_upload_bytes).await?;
    csrf::validate_csrf(&session, form.field("csrf_token"))?;
    let person_id = require_person_id(&session)?;

    let name = form.field("name").trim();
    if name.is_empty() {
        set_flash(&session, "A name is required for the MOC");
        return Ok(redirect("/admin/clash"));
    }
    let Some(file) = &form.file else {
        set_flash(&session, "No file was uploaded");
        return Ok(redirect("/admin/clash"));
    };
    let parsed = std::str::from_utf8(&file.data)
        .map_err(|_| "The MOC file is not text; only the JSON and ASCII formats are supported".to_string())
        .and_then(Moc::parse);
    let moc_data = match parsed {
        Ok(m) if !m.is_empty() => m,
        Ok(_) => {
            set_flash(&session, "The MOC contains no cells");
            return Ok(redirect("/admin/clash"));
        }
        Err(e) => {
            set_flash(&session, e);
            return Ok(redirect("/admin/clash"));
        }
    };

    let public = !form.field("public").is_empty();
    let id = moc::save(&pool, name, form.field("description"), public, &moc_data).await?;
    let _ = crate::audit::log(
        &pool,
        person_id,
        "moc.uploaded",
        "moc",
        id,
        serde_json::json!({ "name": name, "cells": moc_data.num_cells(), "public": public }),
    )
    .await;
    set_flash(&session, format!("MOC \"{name}\" saved with {} cells", moc_data.num_cells()));
    Ok(redirect("/admin/clash"))
}

pub async fn delete(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let person_id = require_person_id(&session)?;
    let id = path.into_inner();
    moc::delete(&pool, id).await?;
    let _ = crate::audit::log(&pool, person_id, "moc.deleted", "moc", id, serde_json::json!({})).await;
    set_flash(&session, "MOC deleted");
    Ok(redirect("/admin/clash"))
}

/// Match every target of the call against every MOC. Returns the hits and
/// the number of targets without usable coordinates.
pub fn find_clashes(call: &Call, targets: &[CallTarget], mocs: &[(String, Moc)]) -> (Vec<ClashHit>, usize) {
    let mut hits = Vec::new();
    let mut without_coordinates = 0;
    for t in targets {
        let Some((ra, dec)) = t.as_target().icrs() else {
            without_coordinates += 1;
            continue;
        };
        for (name, m) in mocs {
            if m.contains(ra, dec) {
                hits.push(ClashHit {
                    moc_name: name.clone(),
                    proposal_id: t.proposal_id,
                    proposal_code: proposal_code(&call.semester_code, &call.queue_code, t.proposal_number),
                    proposal_title: t.proposal_title.clone(),
                    target_name: t.name.clone(),
                    ra: format_ra(ra),
                    dec: format_dec(dec),
                });
            }
        }
    }
    (hits, without_coordinates)
}

pub async fn call_clash(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let call = call::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;
    let targets = target::find_for_call(&pool, call.id).await?;
    let mut mocs = Vec::new();
    for info in moc::find_all(&pool, true).await? {
        let cells = moc::load(&pool, info.id).await?;
        mocs.push((info.name, cells));
    }

    let (hits, without_coordinates) = find_clashes(&call, &targets, &mocs);
    let ctx = PageContext::build(&session, &config, "/admin/clash")?;
    render(CallClashTemplate { ctx, call, moc_count: mocs.len(), hits, without_coordinates })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn call() -> Call {
        Call {
            id: 1,
            semester_id: 1,
            semester_code: "26B".into(),
            semester_name: "2026B".into(),
            queue_id: 1,
            queue_code: "P".into(),
            queue_name: "PI".into(),
            call_type: "standard".into(),
            date_open: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            date_close: Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
            abst_word_lim: 200,
            sci_word_lim: 1000,
            sci_fig_lim: 4,
            sci_page_lim: 2,
            tech_word_lim: 500,
            tech_fig_lim: 2,
            tech_page_lim: 1,
            capt_word_lim: 100,
            hidden: false,
        }
    }

    fn target(name: &str, x: Option<f64>, y: Option<f64>) -> CallTarget {
        CallTarget {
            proposal_id: 7,
            proposal_number: 4,
            proposal_title: "Orion".into(),
            proposal_state: "submitted".into(),
            name: name.into(),
            system: Some("ICRS".into()),
            x,
            y,
            time: Some(1.0),
        }
    }

    #[test]
    fn whole_sky_order_zero_catches_everything() {
        let all_sky = Moc::parse("0/0-11").unwrap();
        let targets = vec![target("M42", Some(83.8), Some(-5.4)), target("TBD", None, None)];
        let (hits, missing) = find_clashes(&call(), &targets, &[("All sky".into(), all_sky)]);
        assert_eq!(missing, 1);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].proposal_code, "26BP004");
        assert_eq!(hits[0].target_name, "M42");
    }

    #[test]
    fn empty_map_list_has_no_hits() {
        let (hits, missing) = find_clashes(&call(), &[target("M42", Some(83.8), Some(-5.4))], &[]);
        assert!(hits.is_empty());
        assert_eq!(missing, 0);
    }

    #[test]
    fn unknown_system_falls_back_to_icrs_option() {
        let options = system_options("nonsense");
        assert!(options.iter().any(|o| o.selected && o.value == "ICRS"));
    }
}
