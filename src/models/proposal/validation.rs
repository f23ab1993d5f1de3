//! Checks run before a proposal may be submitted.
//!
//! Errors block submission; warnings are shown but do not.

use crate::models::attachment::AttachmentState;
use crate::models::call::TextLimits;
use crate::models::text::{TextFormat, TextRole};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationMessage {
    pub is_error: bool,
    pub section: &'static str,
    pub text: String,
}

impl ValidationMessage {
    fn error(section: &'static str, text: impl Into<String>) -> Self {
        Self { is_error: true, section, text: text.into() }
    }

    fn warning(section: &'static str, text: impl Into<String>) -> Self {
        Self { is_error: false, section, text: text.into() }
    }
}

#[derive(Debug, Clone)]
pub struct FigureSnapshot {
    pub filename: String,
    pub caption_words: i32,
    pub state: AttachmentState,
}

/// One justification section: either plain text with figures, or an uploaded PDF.
#[derive(Debug, Clone)]
pub struct SectionSnapshot {
    pub role: TextRole,
    pub format: TextFormat,
    pub words: i32,
    pub figures: Vec<FigureSnapshot>,
    /// State and page count of the uploaded PDF, if any.
    pub pdf: Option<(AttachmentState, Option<i32>)>,
}

#[derive(Debug, Clone)]
pub struct MemberSnapshot {
    pub name: String,
    pub pi: bool,
    pub editor: bool,
    pub has_affiliation: bool,
}

#[derive(Debug, Clone)]
pub struct TargetSnapshot {
    pub name: String,
    pub has_coordinates: bool,
    pub has_time: bool,
}

#[derive(Debug, Clone)]
pub struct ProposalSnapshot {
    pub call_open: bool,
    pub limits: TextLimits,
    pub abstract_words: i32,
    pub science: SectionSnapshot,
    pub technical: SectionSnapshot,
    pub members: Vec<MemberSnapshot>,
    pub targets: Vec<TargetSnapshot>,
    pub calculations: usize,
}

/// Run every check; errors come before warnings within each section.
pub fn validate(p: &ProposalSnapshot) -> Vec<ValidationMessage> {
    let mut messages = Vec::new();

    if !p.call_open {
        messages.push(ValidationMessage::error("Call", "The call for proposals is not open."));
    }

    if p.abstract_words == 0 {
        messages.push(ValidationMessage::error("Abstract", "The abstract has not been written."));
    } else if p.limits.abst_word_lim > 0 && p.abstract_words > p.limits.abst_word_lim {
        messages.push(ValidationMessage::error(
            "Abstract",
            format!(
                "The abstract is {} words long, exceeding the limit of {} words.",
                p.abstract_words, p.limits.abst_word_lim
            ),
        ));
    }

    check_section(
        &p.science,
        p.limits.sci_word_lim,
        p.limits.sci_fig_lim,
        p.limits.sci_page_lim,
        p.limits.capt_word_lim,
        &mut messages,
    );
    check_section(
        &p.technical,
        p.limits.tech_word_lim,
        p.limits.tech_fig_lim,
        p.limits.tech_page_lim,
        p.limits.capt_word_lim,
        &mut messages,
    );

    check_members(&p.members, &mut messages);
    check_targets(&p.targets, &mut messages);

    if p.calculations == 0 {
        messages.push(ValidationMessage::warning(
            "Calculations",
            "No time calculations have been attached to the proposal.",
        ));
    }

    messages
}

pub fn has_errors(messages: &[ValidationMessage]) -> bool {
    messages.iter().any(|m| m.is_error)
}

fn check_section(
    s: &SectionSnapshot,
    word_lim: i32,
    fig_lim: i32,
    page_lim: i32,
    caption_lim: i32,
    messages: &mut Vec<ValidationMessage>,
) {
    let section = s.role.label();

    match s.format {
        TextFormat::Plain => {
            if s.words == 0 {
                messages.push(ValidationMessage::error(section, format!("The {} has not been written.", lower(section))));
            } else if word_lim > 0 && s.words > word_lim {
                messages.push(ValidationMessage::error(
                    section,
                    format!("The text is {} words long, exceeding the limit of {} words.", s.words, word_lim),
                ));
            }

            if fig_lim > 0 && s.figures.len() > fig_lim as usize {
                messages.push(ValidationMessage::error(
                    section,
                    format!("There are {} figures, exceeding the limit of {}.", s.figures.len(), fig_lim),
                ));
            }

            for figure in &s.figures {
                if caption_lim > 0 && figure.caption_words > caption_lim {
                    messages.push(ValidationMessage::error(
                        section,
                        format!(
                            "The caption of figure \"{}\" is {} words long, exceeding the limit of {} words.",
                            figure.filename, figure.caption_words, caption_lim
                        ),
                    ));
                }
                check_attachment_state(section, &figure.filename, figure.state, messages);
            }
        }
        TextFormat::Pdf => match s.pdf {
            None => messages.push(ValidationMessage::error(
                section,
                format!("No PDF file has been uploaded for the {}.", lower(section)),
            )),
            Some((state, pages)) => {
                check_attachment_state(section, "PDF file", state, messages);
                match pages {
                    Some(pages) if page_lim > 0 && pages > page_lim => messages.push(ValidationMessage::error(
                        section,
                        format!("The PDF is {pages} pages long, exceeding the limit of {page_lim} pages."),
                    )),
                    Some(_) => {}
                    None if state == AttachmentState::Ready => messages.push(ValidationMessage::error(
                        section,
                        "The number of pages in the PDF could not be determined; please upload it again.",
                    )),
                    None => {}
                }
            }
        },
    }
}

fn check_attachment_state(
    section: &'static str,
    name: &str,
    state: AttachmentState,
    messages: &mut Vec<ValidationMessage>,
) {
    match state {
        AttachmentState::Ready => {}
        AttachmentState::New => messages.push(ValidationMessage::warning(
            section,
            format!("\"{name}\" is still being processed."),
        )),
        AttachmentState::Error => messages.push(ValidationMessage::error(
            section,
            format!("\"{name}\" could not be processed; please upload it again."),
        )),
    }
}

fn check_members(members: &[MemberSnapshot], messages: &mut Vec<ValidationMessage>) {
    match members.iter().filter(|m| m.pi).count() {
        0 => messages.push(ValidationMessage::error("Members", "No member is marked as PI.")),
        1 => {}
        n => messages.push(ValidationMessage::error("Members", format!("{n} members are marked as PI."))),
    }
    if !members.iter().any(|m| m.editor) {
        messages.push(ValidationMessage::error("Members", "No member is an editor."));
    }
    for member in members.iter().filter(|m| !m.has_affiliation) {
        messages.push(ValidationMessage::error(
            "Members",
            format!("{} has no affiliation selected.", member.name),
        ));
    }
}

fn check_targets(targets: &[TargetSnapshot], messages: &mut Vec<ValidationMessage>) {
    if targets.is_empty() {
        messages.push(ValidationMessage::error("Targets", "No targets have been specified."));
        return;
    }
    for target in targets {
        if !target.has_coordinates {
            messages.push(ValidationMessage::warning(
                "Targets",
                format!("Target \"{}\" has no coordinates.", target.name),
            ));
        }
        if !target.has_time {
            messages.push(ValidationMessage::warning(
                "Targets",
                format!("Target \"{}\" has no requested time.", target.name),
            ));
        }
    }
}

fn lower(label: &str) -> String {
    label.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> TextLimits {
        TextLimits {
            abst_word_lim: 200,
            sci_word_lim: 1000,
            sci_fig_lim: 2,
            sci_page_lim: 2,
            tech_word_lim: 500,
            tech_fig_lim: 1,
            tech_page_lim: 1,
            capt_word_lim: 50,
        }
    }

    fn section(role: TextRole, words: i32) -> SectionSnapshot {
        SectionSnapshot { role, format: TextFormat::Plain, words, figures: Vec::new(), pdf: None }
    }

    fn good() -> ProposalSnapshot {
        ProposalSnapshot {
            call_open: true,
            limits: limits(),
            abstract_words: 150,
            science: section(TextRole::ScienceCase, 800),
            technical: section(TextRole::TechnicalCase, 300),
            members: vec![
                MemberSnapshot { name: "Ada".into(), pi: true, editor: true, has_affiliation: true },
                MemberSnapshot { name: "Bo".into(), pi: false, editor: false, has_affiliation: true },
            ],
            targets: vec![TargetSnapshot { name: "M82".into(), has_coordinates: true, has_time: true }],
            calculations: 1,
        }
    }

    fn errors(p: &ProposalSnapshot) -> Vec<String> {
        validate(p).into_iter().filter(|m| m.is_error).map(|m| m.text).collect()
    }

    #[test]
    fn complete_proposal_is_clean() {
        assert!(validate(&good()).is_empty());
    }

    #[test]
    fn closed_call_blocks() {
        let mut p = good();
        p.call_open = false;
        assert!(has_errors(&validate(&p)));
    }

    #[test]
    fn word_limits() {
        let mut p = good();
        p.abstract_words = 201;
        p.technical.words = 501;
        let errs = errors(&p);
        assert_eq!(errs.len(), 2);
        assert!(errs[0].contains("201 words"));

        // At the limit is fine; zero means unlimited.
        let mut p = good();
        p.abstract_words = 200;
        p.limits.sci_word_lim = 0;
        p.science.words = 50_000;
        assert!(errors(&p).is_empty());
    }

    #[test]
    fn missing_sections() {
        let mut p = good();
        p.abstract_words = 0;
        p.science.words = 0;
        let errs = errors(&p);
        assert_eq!(errs.len(), 2);
        assert!(errs[1].contains("scientific justification"));
    }

    #[test]
    fn figures_and_captions() {
        let mut p = good();
        let figure = |caption_words, state| FigureSnapshot { filename: "f.png".into(), caption_words, state };
        p.technical.figures = vec![figure(10, AttachmentState::Ready), figure(51, AttachmentState::New)];
        let messages = validate(&p);
        let errs: Vec<_> = messages.iter().filter(|m| m.is_error).collect();
        assert_eq!(errs.len(), 2, "{messages:?}");
        assert!(messages.iter().any(|m| !m.is_error && m.text.contains("still being processed")));
    }

    #[test]
    fn pdf_sections() {
        let mut p = good();
        p.science.format = TextFormat::Pdf;
        assert_eq!(errors(&p).len(), 1);

        p.science.pdf = Some((AttachmentState::Ready, Some(3)));
        assert!(errors(&p)[0].contains("3 pages"));

        p.science.pdf = Some((AttachmentState::Ready, Some(2)));
        assert!(errors(&p).is_empty());

        p.science.pdf = Some((AttachmentState::Error, None));
        assert_eq!(errors(&p).len(), 1);

        p.science.pdf = Some((AttachmentState::Ready, None));
        assert_eq!(errors(&p).len(), 1);
        assert!(errors(&p)[0].contains("could not be determined"));

        p.science.pdf = Some((AttachmentState::New, None));
        assert!(errors(&p).is_empty());
    }

    #[test]
    fn member_rules() {
        let mut p = good();
        p.members[0].pi = false;
        assert!(errors(&p).iter().any(|e| e.contains("No member is marked as PI")));

        let mut p = good();
        p.members[1].pi = true;
        assert!(errors(&p).iter().any(|e| e.contains("2 members")));

        let mut p = good();
        p.members[0].editor = false;
        p.members[1].has_affiliation = false;
        assert_eq!(errors(&p).len(), 2);
    }

    #[test]
    fn target_rules() {
        let mut p = good();
        p.targets.clear();
        assert!(has_errors(&validate(&p)));

        let mut p = good();
        p.targets[0].has_time = false;
        p.targets[0].has_coordinates = false;
        p.calculations = 0;
        let messages = validate(&p);
        assert!(!has_errors(&messages));
        assert_eq!(messages.len(), 3);
    }
}
