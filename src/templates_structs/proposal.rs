use askama::Template;

use super::{PageContext, SelectOption};
use crate::models::attachment::AttachmentInfo;
use crate::models::calculation::Calculation;
use crate::models::call::Call;
use crate::models::decision::Decision;
use crate::models::member::Member;
use crate::models::prev_proposal::PrevProposalDisplay;
use crate::models::proposal::Proposal;
use crate::models::proposal::validation::ValidationMessage;
use crate::models::review::ReviewerInfo;
use crate::models::target::Target;

/// One text section of a proposal with its uploads.
pub struct SectionView {
    pub role: &'static str,
    pub label: &'static str,
    pub is_pdf: bool,
    pub text: String,
    pub words: i32,
    pub word_limit: i32,
    pub figure_limit: i32,
    pub page_limit: i32,
    pub allows_attachments: bool,
    pub figures: Vec<AttachmentInfo>,
    pub pdf: Option<AttachmentInfo>,
    pub edited: String,
}

impl SectionView {
    pub fn is_empty(&self) -> bool {
        if self.is_pdf { self.pdf.is_none() } else { self.text.trim().is_empty() }
    }

    pub fn over_limit(&self) -> bool {
        !self.is_pdf && self.word_limit > 0 && self.words > self.word_limit
    }

    pub fn paragraphs(&self) -> Vec<&str> {
        self.text
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect()
    }
}

#[derive(Template)]
#[template(path = "proposals/new.html")]
pub struct NewProposalTemplate {
    pub ctx: PageContext,
    pub call: Call,
    pub affiliations: Vec<SelectOption>,
    pub title: String,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "proposals/view.html")]
pub struct ProposalViewTemplate {
    pub ctx: PageContext,
    pub proposal: Proposal,
    pub can_edit: bool,
    pub is_editor: bool,
    pub is_admin: bool,
    pub members: Vec<Member>,
    pub sections: Vec<SectionView>,
    pub targets: Vec<Target>,
    pub total_time: String,
    pub calculations: Vec<Calculation>,
    pub previous: Vec<PrevProposalDisplay>,
    pub reviewers: Vec<ReviewerInfo>,
    pub decision: Option<Decision>,
    pub error_count: usize,
    pub warning_count: usize,
}

pub struct MemberRow {
    pub member: Member,
    pub affiliations: Vec<SelectOption>,
}

#[derive(Template)]
#[template(path = "proposals/members.html")]
pub struct MembersTemplate {
    pub ctx: PageContext,
    pub proposal: Proposal,
    pub rows: Vec<MemberRow>,
    pub affiliations: Vec<SelectOption>,
    /// People matching the add-member search, when one was made.
    pub query: String,
    pub candidates: Vec<SelectOption>,
    pub can_edit: bool,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "proposals/targets.html")]
pub struct TargetsTemplate {
    pub ctx: PageContext,
    pub proposal: Proposal,
    pub targets: Vec<Target>,
    pub total_time: String,
    pub systems: Vec<SelectOption>,
    pub can_edit: bool,
    pub errors: Vec<String>,
    pub upload_text: String,
}

#[derive(Template)]
#[template(path = "proposals/target_edit.html")]
pub struct TargetEditTemplate {
    pub ctx: PageContext,
    pub proposal: Proposal,
    pub target_id: i64,
    pub name: String,
    pub systems: Vec<SelectOption>,
    pub x: String,
    pub y: String,
    pub time: String,
    pub priority: String,
    pub note: String,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "proposals/text.html")]
pub struct TextEditTemplate {
    pub ctx: PageContext,
    pub proposal: Proposal,
    pub section: SectionView,
    pub caption_limit: i32,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "proposals/calculations.html")]
pub struct CalculationsTemplate {
    pub ctx: PageContext,
    pub proposal: Proposal,
    pub calculations: Vec<Calculation>,
    pub can_edit: bool,
}

#[derive(Template)]
#[template(path = "proposals/previous.html")]
pub struct PreviousTemplate {
    pub ctx: PageContext,
    pub proposal: Proposal,
    pub previous: Vec<PrevProposalDisplay>,
    pub pub_types: Vec<SelectOption>,
    pub can_edit: bool,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "proposals/validate.html")]
pub struct ValidationTemplate {
    pub ctx: PageContext,
    pub proposal: Proposal,
    pub messages: Vec<ValidationMessage>,
    pub has_errors: bool,
    pub can_submit: bool,
    pub can_withdraw: bool,
    pub can_reopen: bool,
    pub deadline: String,
}

#[derive(Template)]
#[template(path = "proposals/copy.html")]
pub struct CopyTemplate {
    pub ctx: PageContext,
    pub proposal: Proposal,
    pub calls: Vec<Call>,
}
