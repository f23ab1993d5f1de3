use actix_web::{HttpResponse, middleware::from_fn, web};

use crate::auth::middleware::{require_admin, require_auth};
use crate::handlers::admin_handlers::{calls, clash, decisions, messages, reviewers, setup, tabulation};
use crate::handlers::proposal_handlers::{attachments, crud, extras, members, targets, text, workflow};
use crate::handlers::{
    account_handlers, auth_handlers, dashboard, job_handlers, lookup_handlers, review_handlers,
};

/// Register every route. Session middleware and shared data are added by the caller.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        // Public routes
        .route("/login", web::get().to(auth_handlers::login_page))
        .route("/login", web::post().to(auth_handlers::login_submit))
        .route("/register", web::get().to(auth_handlers::register_page))
        .route("/register", web::post().to(auth_handlers::register_submit))
        .route("/", web::get().to(|| async {
            HttpResponse::SeeOther().insert_header(("Location", "/dashboard")).finish()
        }))
        // Administration, checked before the catch-all authenticated scope
        .service(
            web::scope("/admin")
                .wrap(from_fn(require_admin))
                .wrap(from_fn(require_auth))
                .route("", web::get().to(setup::index))
                .route("/semesters", web::get().to(setup::semesters))
                .route("/semesters", web::post().to(setup::semester_create))
                .route("/queues", web::get().to(setup::queues))
                .route("/queues", web::post().to(setup::queue_create))
                .route("/queues/{id}/affiliations", web::get().to(setup::affiliations))
                .route("/queues/{id}/affiliations", web::post().to(setup::affiliation_create))
                .route("/affiliations/{id}", web::post().to(setup::affiliation_update))
                .route("/people", web::get().to(setup::people))
                .route("/people/{id}/admin", web::post().to(setup::set_admin))
                // Calls: /calls/new BEFORE /calls/{id}
                .route("/calls/new", web::get().to(calls::new_form))
                .route("/calls", web::post().to(calls::create))
                .route("/calls/{id}", web::get().to(calls::detail))
                .route("/calls/{id}", web::post().to(calls::update))
                .route("/calls/{id}/edit", web::get().to(calls::edit_form))
                .route("/calls/{id}/mid-closes", web::post().to(calls::add_mid_close))
                .route("/calls/{id}/weights", web::get().to(calls::weights))
                .route("/calls/{id}/weights", web::post().to(calls::weights_save))
                .route("/calls/{id}/close", web::post().to(calls::close))
                .route("/calls/{id}/advance", web::post().to(calls::advance))
                // Reviewers
                .route("/calls/{id}/reviewers", web::get().to(reviewers::grid))
                .route("/calls/{id}/reviewers", web::post().to(reviewers::grid_save))
                .route("/calls/{id}/reviewers/assign", web::post().to(reviewers::assign))
                .route("/calls/{id}/reviewers/remind", web::post().to(reviewers::remind))
                .route("/calls/{id}/reviewers/{rid}/remove", web::post().to(reviewers::remove))
                // Decisions and tabulation
                .route("/calls/{id}/decisions", web::get().to(decisions::page))
                .route("/calls/{id}/finalize", web::post().to(decisions::finalize))
                .route("/proposals/{id}/decision", web::post().to(decisions::save))
                .route("/calls/{id}/tabulation", web::get().to(tabulation::page))
                .route("/calls/{id}/tabulation.csv", web::get().to(tabulation::csv_download))
                .route("/calls/{id}/rabins", web::get().to(tabulation::rabins))
                // Clash tool
                .route("/calls/{id}/clash", web::get().to(clash::call_clash))
                .route("/clash", web::get().to(clash::index))
                .route("/clash/search", web::get().to(clash::search))
                .route("/clash/mocs", web::post().to(clash::upload))
                .route("/clash/mocs/{id}/delete", web::post().to(clash::delete))
                // Messages and audit
                .route("/messages", web::get().to(messages::list))
                .route("/messages/{id}/sent", web::post().to(messages::mark_sent))
                .route("/audit", web::get().to(messages::audit_list)),
        )
        // Protected routes
        .service(
            web::scope("")
                .wrap(from_fn(require_auth))
                .route("/logout", web::post().to(auth_handlers::logout))
                .route("/dashboard", web::get().to(dashboard::index))
                .route("/calls", web::get().to(dashboard::open_calls))
                .route("/account", web::get().to(account_handlers::form))
                .route("/account", web::post().to(account_handlers::submit))
                // Proposals
                .route("/calls/{id}/proposals/new", web::get().to(crud::new_form))
                .route("/calls/{id}/proposals", web::post().to(crud::create))
                .route("/proposals/{id}", web::get().to(crud::view))
                .route("/proposals/{id}/title", web::post().to(crud::update_title))
                .route("/proposals/{id}/members", web::get().to(members::page))
                .route("/proposals/{id}/members", web::post().to(members::update))
                .route("/proposals/{id}/members/add", web::post().to(members::add))
                .route("/proposals/{id}/members/{mid}/remove", web::post().to(members::remove))
                // Targets: /targets/upload BEFORE /targets/{tid}
                .route("/proposals/{id}/targets", web::get().to(targets::page))
                .route("/proposals/{id}/targets", web::post().to(targets::add))
                .route("/proposals/{id}/targets/upload", web::post().to(targets::upload))
                .route("/proposals/{id}/targets/{tid}/edit", web::get().to(targets::edit_form))
                .route("/proposals/{id}/targets/{tid}", web::post().to(targets::update))
                .route("/proposals/{id}/targets/{tid}/delete", web::post().to(targets::delete))
                .route("/proposals/{id}/targets/{tid}/move", web::post().to(targets::move_target))
                // Text sections and attachments
                .route("/proposals/{id}/text/{role}", web::get().to(text::edit_page))
                .route("/proposals/{id}/text/{role}", web::post().to(text::save))
                .route("/proposals/{id}/text/{role}/format", web::post().to(text::set_format))
                .route("/proposals/{id}/text/{role}/attachments", web::post().to(attachments::upload))
                .route("/proposals/{id}/attachments/{aid}", web::get().to(attachments::download))
                .route("/proposals/{id}/attachments/{aid}/caption", web::post().to(attachments::update_caption))
                .route("/proposals/{id}/attachments/{aid}/delete", web::post().to(attachments::delete))
                // Calculations and previous proposals
                .route("/proposals/{id}/calculations", web::get().to(extras::calculations_page))
                .route("/proposals/{id}/calculations", web::post().to(extras::calculation_create))
                .route("/proposals/{id}/calculations/{cid}/title", web::post().to(extras::calculation_title))
                .route("/proposals/{id}/calculations/{cid}/delete", web::post().to(extras::calculation_delete))
                .route("/proposals/{id}/previous", web::get().to(extras::previous_page))
                .route("/proposals/{id}/previous", web::post().to(extras::previous_add))
                .route("/proposals/{id}/previous/{pid}/publications", web::post().to(extras::publication_add))
                .route("/proposals/{id}/previous/{pid}/delete", web::post().to(extras::previous_delete))
                // Submission workflow
                .route("/proposals/{id}/validate", web::get().to(workflow::validate_page))
                .route("/proposals/{id}/submit", web::post().to(workflow::submit))
                .route("/proposals/{id}/withdraw", web::post().to(workflow::withdraw))
                .route("/proposals/{id}/reopen", web::post().to(workflow::reopen))
                .route("/proposals/{id}/pdf", web::post().to(workflow::pdf))
                .route("/proposals/{id}/copy", web::get().to(workflow::copy_form))
                .route("/proposals/{id}/copy", web::post().to(workflow::copy))
                // Background jobs
                .route("/jobs/{id}", web::get().to(job_handlers::status_page))
                .route("/jobs/{id}/status", web::get().to(job_handlers::status_json))
                .route("/jobs/{id}/download", web::get().to(job_handlers::download))
                // Reviews
                .route("/reviews", web::get().to(review_handlers::my_reviews))
                .route("/reviews/{id}", web::get().to(review_handlers::edit_page))
                .route("/reviews/{id}", web::post().to(review_handlers::save))
                .route("/reviews/{id}/respond", web::post().to(review_handlers::respond))
                // JSON lookups
                .route("/api/people", web::get().to(lookup_handlers::people))
                .route("/api/queues/{id}/affiliations", web::get().to(lookup_handlers::affiliations)),
        )
        // Default 404 handler (must be registered last)
        .default_service(web::to(not_found));
}

async fn not_found() -> HttpResponse {
    HttpResponse::NotFound()
        .content_type("text/html; charset=utf-8")
        .body(include_str!("../templates/errors/404.html"))
}
