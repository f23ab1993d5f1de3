use askama::Template;

use super::PageContext;

#[derive(Template)]
#[template(path = "jobs/status.html")]
pub struct JobStatusTemplate {
    pub ctx: PageContext,
    pub job_id: String,
    pub kind_label: &'static str,
    pub proposal_id: i64,
    pub status_label: &'static str,
    pub detail: String,
    pub link: Option<String>,
    pub failed: bool,
    /// Whether the page should refresh itself, and with which poll count.
    pub refresh: bool,
    pub next_poll: u32,
    pub gave_up: bool,
}
