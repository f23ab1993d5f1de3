use askama::Template;

use super::{PageContext, SelectOption};
use crate::audit::AuditEntryPage;
use crate::models::affiliation::{Affiliation, EffectiveAffiliation};
use crate::models::call::{Call, CallMidClose};
use crate::models::decision::Decision;
use crate::models::message::Message;
use crate::models::moc::MocInfo;
use crate::models::person::PersonDisplay;
use crate::models::proposal::ProposalListItem;
use crate::models::queue::Queue;
use crate::models::semester::Semester;

#[derive(Template)]
#[template(path = "admin/index.html")]
pub struct AdminIndexTemplate {
    pub ctx: PageContext,
    pub calls: Vec<Call>,
    pub state_counts: Vec<(String, i64)>,
}

#[derive(Template)]
#[template(path = "admin/semesters.html")]
pub struct SemestersTemplate {
    pub ctx: PageContext,
    pub semesters: Vec<Semester>,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "admin/queues.html")]
pub struct QueuesTemplate {
    pub ctx: PageContext,
    pub queues: Vec<Queue>,
    pub errors: Vec<String>,
}

pub struct AffiliationRow {
    pub affiliation: Affiliation,
    pub assignments: Vec<SelectOption>,
}

#[derive(Template)]
#[template(path = "admin/affiliations.html")]
pub struct AffiliationsTemplate {
    pub ctx: PageContext,
    pub queue: Queue,
    pub rows: Vec<AffiliationRow>,
    pub assignments: Vec<SelectOption>,
    pub errors: Vec<String>,
}

/// Raw values of the call form, kept as entered so errors can be corrected.
pub struct CallFormValues {
    pub date_open: String,
    pub date_close: String,
    pub abst_word_lim: String,
    pub sci_word_lim: String,
    pub sci_fig_lim: String,
    pub sci_page_lim: String,
    pub tech_word_lim: String,
    pub tech_fig_lim: String,
    pub tech_page_lim: String,
    pub capt_word_lim: String,
    pub hidden: bool,
}

#[derive(Template)]
#[template(path = "admin/call_form.html")]
pub struct CallFormTemplate {
    pub ctx: PageContext,
    pub form_action: String,
    pub form_title: String,
    pub editing: bool,
    pub semesters: Vec<SelectOption>,
    pub queues: Vec<SelectOption>,
    pub call_types: Vec<SelectOption>,
    pub values: CallFormValues,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "admin/call.html")]
pub struct CallDetailTemplate {
    pub ctx: PageContext,
    pub call: Call,
    pub is_open: bool,
    pub next_close: String,
    pub proposals: Vec<ProposalListItem>,
    pub mid_closes: Vec<CallMidClose>,
    pub outstanding_reviews: usize,
}

#[derive(Template)]
#[template(path = "admin/weights.html")]
pub struct WeightsTemplate {
    pub ctx: PageContext,
    pub call: Call,
    pub affiliations: Vec<EffectiveAffiliation>,
}

pub struct DecisionRow {
    pub proposal_id: i64,
    pub code: String,
    pub title: String,
    pub state_label: &'static str,
    pub rating: String,
    pub decision: Decision,
    pub editable: bool,
}

#[derive(Template)]
#[template(path = "admin/decisions.html")]
pub struct DecisionsTemplate {
    pub ctx: PageContext,
    pub call: Call,
    pub rows: Vec<DecisionRow>,
    pub ready_count: usize,
}

pub struct ClashHit {
    pub moc_name: String,
    pub proposal_id: i64,
    pub proposal_code: String,
    pub proposal_title: String,
    pub target_name: String,
    pub ra: String,
    pub dec: String,
}

#[derive(Template)]
#[template(path = "admin/clash.html")]
pub struct ClashTemplate {
    pub ctx: PageContext,
    pub mocs: Vec<MocInfo>,
    pub calls: Vec<Call>,
    pub systems: Vec<SelectOption>,
    pub x: String,
    pub y: String,
    /// Position searched for and the names of the MOCs containing it.
    pub search: Option<(String, Vec<String>)>,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "admin/call_clash.html")]
pub struct CallClashTemplate {
    pub ctx: PageContext,
    pub call: Call,
    pub moc_count: usize,
    pub hits: Vec<ClashHit>,
    pub without_coordinates: usize,
}

#[derive(Template)]
#[template(path = "admin/messages.html")]
pub struct MessagesTemplate {
    pub ctx: PageContext,
    pub messages: Vec<Message>,
    pub unsent_only: bool,
}

#[derive(Template)]
#[template(path = "admin/audit.html")]
pub struct AuditListTemplate {
    pub ctx: PageContext,
    pub audit_page: AuditEntryPage,
    pub action_filter: String,
    pub target_type_filter: String,
}

#[derive(Template)]
#[template(path = "admin/people.html")]
pub struct PeopleTemplate {
    pub ctx: PageContext,
    pub people: Vec<PersonDisplay>,
}
