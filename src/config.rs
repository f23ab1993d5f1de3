use std::path::PathBuf;

/// Runtime configuration, read from the environment (and `.env` via dotenvy).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub session_key: Option<String>,
    pub admin_password: String,
    pub app_name: String,
    pub pdf_dir: PathBuf,
    pub font_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub process_interval_secs: u64,
    /// How long finished jobs and their PDF files are kept.
    pub job_ttl_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL must be set".to_string())?;

        Ok(Self {
            database_url,
            bind_addr: env_or("BIND_ADDR", "127.0.0.1:8080"),
            session_key: std::env::var("SESSION_KEY").ok(),
            admin_password: env_or("ADMIN_PASSWORD", "admin123"),
            app_name: env_or("APP_NAME", "Hedwig"),
            pdf_dir: PathBuf::from(env_or("PDF_DIR", "data/pdf")),
            font_dir: PathBuf::from(env_or("FONT_DIR", "fonts")),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            process_interval_secs: parse_or("PROCESS_INTERVAL_SECS", 30)?,
            job_ttl_secs: parse_or("JOB_TTL_SECS", 3600)?,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, String> {
    match std::env::var(key) {
        Ok(val) => val
            .trim()
            .parse()
            .map_err(|_| format!("{key} has an invalid value: {val}")),
        Err(_) => Ok(default),
    }
}
