//! The reviewer assignment grid: one cell per (proposal, unique role).

use std::collections::{HashMap, HashSet};

use super::types::ReviewerRole;

/// One cell of the grid; `person_id = None` leaves the role unassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridCell {
    pub proposal_id: i64,
    pub role: ReviewerRole,
    pub person_id: Option<i64>,
}

pub fn grid_field(proposal_id: i64, role: ReviewerRole) -> String {
    format!("r_{proposal_id}_{}", role.code())
}

/// Read every grid cell for the given proposals from the form parameters.
pub fn parse_grid(proposal_ids: &[i64], params: &[(String, String)]) -> Result<Vec<GridCell>, Vec<String>> {
    let mut cells = Vec::new();
    let mut errors = Vec::new();
    for &proposal_id in proposal_ids {
        for role in ReviewerRole::UNIQUE {
            let key = grid_field(proposal_id, role);
            let value = params.iter().find(|(k, _)| *k == key).map(|(_, v)| v.trim()).unwrap_or("");
            let person_id = match value {
                "" => None,
                v => match v.parse::<i64>() {
                    Ok(id) => Some(id),
                    Err(_) => {
                        errors.push(format!("Invalid reviewer selection \"{v}\""));
                        continue;
                    }
                },
            };
            cells.push(GridCell { proposal_id, role, person_id });
        }
    }
    if errors.is_empty() { Ok(cells) } else { Err(errors) }
}

/// Check a complete grid.
///
/// `members` maps each proposal to the people on it, `codes` to its display code.
pub fn validate_grid(
    cells: &[GridCell],
    members: &HashMap<i64, HashSet<i64>>,
    codes: &HashMap<i64, String>,
) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();
    let code = |id: i64| codes.get(&id).cloned().unwrap_or_else(|| id.to_string());

    let mut seen = HashSet::new();
    for cell in cells {
        if !seen.insert((cell.proposal_id, cell.role)) {
            errors.push(format!("{}: more than one {} reviewer", code(cell.proposal_id), cell.role.label().to_lowercase()));
        }
        let Some(person_id) = cell.person_id else { continue };
        if members.get(&cell.proposal_id).is_some_and(|m| m.contains(&person_id)) {
            errors.push(format!(
                "{}: a proposal member cannot be its {} reviewer",
                code(cell.proposal_id),
                cell.role.label().to_lowercase()
            ));
        }
    }

    let assigned = |proposal_id: i64, role: ReviewerRole| {
        cells
            .iter()
            .find(|c| c.proposal_id == proposal_id && c.role == role)
            .and_then(|c| c.person_id)
    };
    let proposals: HashSet<i64> = cells.iter().map(|c| c.proposal_id).collect();
    let mut proposals: Vec<i64> = proposals.into_iter().collect();
    proposals.sort_unstable();
    for proposal_id in proposals {
        let primary = assigned(proposal_id, ReviewerRole::CommitteePrimary);
        let secondary = assigned(proposal_id, ReviewerRole::CommitteeSecondary);
        if primary.is_some() && primary == secondary {
            errors.push(format!(
                "{}: the same person cannot be both primary and secondary reviewer",
                code(proposal_id)
            ));
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn members() -> HashMap<i64, HashSet<i64>> {
        HashMap::from([(1, HashSet::from([100])), (2, HashSet::from([200]))])
    }

    fn codes() -> HashMap<i64, String> {
        HashMap::from([(1, "26BP001".to_string()), (2, "26BP002".to_string())])
    }

    #[test]
    fn parses_every_cell() {
        let cells = parse_grid(
            &[1, 2],
            &params(&[("r_1_technical", "300"), ("r_2_committee_primary", "301"), ("r_2_feedback", "")]),
        )
        .unwrap();
        assert_eq!(cells.len(), 8);
        assert!(cells.contains(&GridCell { proposal_id: 1, role: ReviewerRole::Technical, person_id: Some(300) }));
        assert!(cells.contains(&GridCell { proposal_id: 2, role: ReviewerRole::Feedback, person_id: None }));
        assert!(parse_grid(&[1], &params(&[("r_1_technical", "bob")])).is_err());
    }

    #[test]
    fn valid_grid() {
        let cells = parse_grid(
            &[1, 2],
            &params(&[
                ("r_1_committee_primary", "300"),
                ("r_1_committee_secondary", "301"),
                ("r_2_committee_primary", "301"),
                ("r_2_committee_secondary", "300"),
            ]),
        )
        .unwrap();
        assert!(validate_grid(&cells, &members(), &codes()).is_ok());
    }

    #[test]
    fn members_cannot_review_own_proposal() {
        let cells = parse_grid(&[1], &params(&[("r_1_technical", "100")])).unwrap();
        let errs = validate_grid(&cells, &members(), &codes()).unwrap_err();
        assert_eq!(errs, vec!["26BP001: a proposal member cannot be its technical reviewer"]);
    }

    #[test]
    fn primary_and_secondary_differ() {
        let cells = parse_grid(
            &[2],
            &params(&[("r_2_committee_primary", "300"), ("r_2_committee_secondary", "300")]),
        )
        .unwrap();
        let errs = validate_grid(&cells, &members(), &codes()).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert!(errs[0].starts_with("26BP002"));
    }

    #[test]
    fn duplicate_cells_rejected() {
        let cell = GridCell { proposal_id: 1, role: ReviewerRole::Feedback, person_id: Some(5) };
        assert!(validate_grid(&[cell, cell], &members(), &codes()).is_err());
    }
}
