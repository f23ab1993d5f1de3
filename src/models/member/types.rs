use std::collections::HashSet;

use serde::Deserialize;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Member {
    pub id: i64,
    pub proposal_id: i64,
    pub person_id: i64,
    pub person_name: String,
    pub institution: String,
    pub affiliation_id: Option<i64>,
    pub affiliation_name: Option<String>,
    pub sort_order: i32,
    pub pi: bool,
    pub editor: bool,
    pub observer: bool,
    pub peer_reviewer: bool,
}

impl Member {
    pub fn affiliation_display(&self) -> &str {
        self.affiliation_name.as_deref().unwrap_or("Unknown")
    }

    pub fn flags(&self) -> MemberFlags {
        MemberFlags { person_id: self.person_id, pi: self.pi, editor: self.editor }
    }
}

/// What a person may do with a proposal through membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, sqlx::FromRow)]
pub struct MemberAccess {
    pub pi: bool,
    pub editor: bool,
    pub observer: bool,
}

/// The parts of a member row the membership invariants depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberFlags {
    pub person_id: i64,
    pub pi: bool,
    pub editor: bool,
}

/// Exactly one PI, at least one editor, and no person listed twice.
pub fn validate_members(members: &[MemberFlags]) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    match members.iter().filter(|m| m.pi).count() {
        1 => {}
        0 => errors.push("Exactly one member must be the PI".to_string()),
        _ => errors.push("Only one member can be the PI".to_string()),
    }
    if !members.iter().any(|m| m.editor) {
        errors.push("At least one member must be an editor".to_string());
    }
    let mut seen = HashSet::new();
    if members.iter().any(|m| !seen.insert(m.person_id)) {
        errors.push("A person can only be listed once".to_string());
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Edited values for one existing member, parsed from the members form.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberEdit {
    pub member_id: i64,
    pub affiliation_id: Option<i64>,
    pub sort_order: i32,
    pub pi: bool,
    pub editor: bool,
    pub observer: bool,
}

/// Parse the members form: `pi` names the PI's member id, and per member
/// `editor_<id>`, `observer_<id>`, `affiliation_<id>`, `sort_<id>`.
pub fn parse_member_edits(member_ids: &[i64], params: &[(String, String)]) -> Result<Vec<MemberEdit>, Vec<String>> {
    let field = |key: &str| params.iter().find(|(k, _)| k == key).map(|(_, v)| v.trim());
    let pi: Option<i64> = field("pi").and_then(|v| v.parse().ok());

    let mut errors = Vec::new();
    let mut edits = Vec::with_capacity(member_ids.len());
    for (i, id) in member_ids.iter().enumerate() {
        let affiliation_id = match field(&format!("affiliation_{id}")) {
            None | Some("") => None,
            Some(v) => match v.parse::<i64>() {
                Ok(a) => Some(a),
                Err(_) => {
                    errors.push(format!("Invalid affiliation for member {}", i + 1));
                    None
                }
            },
        };
        let sort_order = match field(&format!("sort_{id}")) {
            None | Some("") => i as i32 + 1,
            Some(v) => v.parse().unwrap_or_else(|_| {
                errors.push(format!("Invalid position for member {}", i + 1));
                0
            }),
        };
        edits.push(MemberEdit {
            member_id: *id,
            affiliation_id,
            sort_order,
            pi: pi == Some(*id),
            editor: field(&format!("editor_{id}")).is_some(),
            observer: field(&format!("observer_{id}")).is_some(),
        });
    }

    if errors.is_empty() { Ok(edits) } else { Err(errors) }
}

#[derive(Debug, Deserialize)]
pub struct AddMemberForm {
    pub person_id: i64,
    #[serde(default)]
    pub affiliation_id: Option<String>,
    #[serde(default)]
    pub editor: Option<String>,
    #[serde(default)]
    pub observer: Option<String>,
    pub csrf_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(person_id: i64, pi: bool, editor: bool) -> MemberFlags {
        MemberFlags { person_id, pi, editor }
    }

    #[test]
    fn single_pi_and_editor_required() {
        assert!(validate_members(&[flags(1, true, true), flags(2, false, false)]).is_ok());
        assert!(validate_members(&[flags(1, true, false), flags(2, false, true)]).is_ok());

        let errs = validate_members(&[flags(1, false, true)]).unwrap_err();
        assert_eq!(errs, vec!["Exactly one member must be the PI"]);

        let errs = validate_members(&[flags(1, true, false), flags(2, true, false)]).unwrap_err();
        assert_eq!(errs.len(), 2);

        assert!(validate_members(&[]).is_err());
    }

    #[test]
    fn duplicate_person_rejected() {
        let errs = validate_members(&[flags(1, true, true), flags(1, false, false)]).unwrap_err();
        assert_eq!(errs, vec!["A person can only be listed once"]);
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn parses_members_form() {
        let params = pairs(&[
            ("pi", "11"),
            ("editor_10", "on"),
            ("affiliation_10", "3"),
            ("affiliation_11", ""),
            ("sort_10", "2"),
            ("sort_11", "1"),
            ("observer_11", "on"),
        ]);
        let edits = parse_member_edits(&[10, 11], &params).unwrap();
        assert_eq!(
            edits[0],
            MemberEdit { member_id: 10, affiliation_id: Some(3), sort_order: 2, pi: false, editor: true, observer: false }
        );
        assert_eq!(
            edits[1],
            MemberEdit { member_id: 11, affiliation_id: None, sort_order: 1, pi: true, editor: false, observer: true }
        );
    }

    #[test]
    fn bad_numbers_reported() {
        let params = pairs(&[("pi", "10"), ("affiliation_10", "x"), ("sort_10", "first")]);
        let errs = parse_member_edits(&[10], &params).unwrap_err();
        assert_eq!(errs.len(), 2);
    }
}
