use std::time::Duration;

use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::{App, HttpServer, cookie::Key, middleware, web};

use hedwig::auth::rate_limit::RateLimiter;
use hedwig::config::AppConfig;
use hedwig::jobs::processor::{run_attachment_processor, run_job_sweeper};
use hedwig::jobs::{JobsState, start_job_updater};
use hedwig::{audit, auth, db, routes};

fn startup_error(e: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::other(e.to_string())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let config = AppConfig::from_env().map_err(startup_error)?;

    // Initialize database
    let pool = db::init_pool(&config.database_url).await.map_err(startup_error)?;
    db::run_migrations(&pool).await.map_err(startup_error)?;

    let admin_hash = auth::password::hash_password(&config.admin_password).map_err(startup_error)?;
    db::seed_admin(&pool, &admin_hash).await.map_err(startup_error)?;

    match audit::cleanup_old_entries(&pool).await {
        Ok(n) if n > 0 => log::info!("Removed {n} expired audit entries"),
        Ok(_) => {}
        Err(e) => log::warn!("Audit cleanup failed: {e}"),
    }

    std::fs::create_dir_all(&config.pdf_dir)?;

    // Sessions survive restarts only with a fixed SESSION_KEY
    let secret_key = match &config.session_key {
        Some(val) if val.len() >= 64 => {
            log::info!("Using SESSION_KEY from environment");
            Key::from(val.as_bytes())
        }
        Some(val) => {
            log::warn!("SESSION_KEY too short ({} bytes, need 64+), generating random key", val.len());
            Key::generate()
        }
        None => {
            log::warn!("No SESSION_KEY set, generating random key (sessions lost on restart)");
            Key::generate()
        }
    };

    let limiter = RateLimiter::for_login();

    let (jobs, job_rx) = JobsState::new(64);
    tokio::spawn(start_job_updater(jobs.clone(), job_rx));
    tokio::spawn(run_attachment_processor(pool.clone(), config.process_interval_secs));
    tokio::spawn(run_job_sweeper(
        jobs.clone(),
        config.pdf_dir.clone(),
        Duration::from_secs(config.job_ttl_secs),
    ));

    let bind_addr = config.bind_addr.clone();
    log::info!("Starting {} at http://{bind_addr}", config.app_name);

    HttpServer::new(move || {
        let session_mw = SessionMiddleware::builder(CookieSessionStore::default(), secret_key.clone())
            .cookie_secure(false)
            .cookie_http_only(true)
            .build();

        App::new()
            .wrap(session_mw)
            .wrap(middleware::Logger::default())
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(jobs.clone()))
            .app_data(web::Data::new(limiter.clone()))
            .service(actix_files::Files::new("/static", "./static"))
            .configure(routes::configure)
    })
    .bind(bind_addr)?
    .run()
    .await
}
