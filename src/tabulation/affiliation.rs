use std::collections::BTreeMap;

/// How members of an affiliation count towards time allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    /// Counts for its own affiliation.
    Standard,
    /// Ignored when apportioning time.
    Excluded,
    /// Spread over all standard affiliations of the queue by their weights.
    Shared,
}

impl Assignment {
    pub const ALL: [Assignment; 3] = [Assignment::Standard, Assignment::Excluded, Assignment::Shared];

    pub fn code(self) -> &'static str {
        match self {
            Assignment::Standard => "standard",
            Assignment::Excluded => "excluded",
            Assignment::Shared => "shared",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Assignment::Standard => "Standard",
            Assignment::Excluded => "Excluded",
            Assignment::Shared => "Shared",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Assignment::ALL.into_iter().find(|a| a.code() == code)
    }
}

/// A proposal member's affiliation as needed for apportioning.
/// `affiliation_id = None` is a member who has not chosen one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemberAffiliation {
    pub affiliation_id: Option<i64>,
    pub assignment: Assignment,
    pub weight: f64,
}

/// Fraction of a proposal attributed to an affiliation (`None` = Unknown).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffiliationShare {
    pub affiliation_id: Option<i64>,
    pub fraction: f64,
}

/// Split a proposal between its members' affiliations.
///
/// `queue_standard` lists (affiliation id, effective weight) for every
/// standard affiliation of the queue; shared members are spread over it.
/// Fractions sum to 1 and are ordered by affiliation id, Unknown first.
pub fn compute_fractions(
    members: &[MemberAffiliation],
    queue_standard: &[(i64, f64)],
) -> Vec<AffiliationShare> {
    let mut contributions: BTreeMap<Option<i64>, f64> = BTreeMap::new();
    let mut shared = 0.0;

    for member in members {
        let weight = if member.weight.is_finite() { member.weight.max(0.0) } else { 0.0 };
        match (member.affiliation_id, member.assignment) {
            (None, _) => *contributions.entry(None).or_default() += 1.0,
            (Some(id), Assignment::Standard) => *contributions.entry(Some(id)).or_default() += weight,
            (Some(_), Assignment::Excluded) => {}
            (Some(_), Assignment::Shared) => shared += weight,
        }
    }

    if shared > 0.0 {
        let queue_total: f64 = queue_standard.iter().map(|(_, w)| w.max(0.0)).sum();
        if queue_total > 0.0 {
            for (id, w) in queue_standard {
                if *w > 0.0 {
                    *contributions.entry(Some(*id)).or_default() += shared * w / queue_total;
                }
            }
        } else {
            *contributions.entry(None).or_default() += shared;
        }
    }

    contributions.retain(|_, w| *w > 0.0);
    let total: f64 = contributions.values().sum();
    if total <= 0.0 {
        return vec![AffiliationShare { affiliation_id: None, fraction: 1.0 }];
    }

    contributions
        .into_iter()
        .map(|(affiliation_id, w)| AffiliationShare { affiliation_id, fraction: w / total })
        .collect()
}

/// Running per-affiliation totals of requested and accepted hours.
#[derive(Debug, Clone, Default)]
pub struct AffiliationTotals {
    requested: BTreeMap<Option<i64>, f64>,
    accepted: BTreeMap<Option<i64>, f64>,
}

impl AffiliationTotals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one proposal; `accepted_hours` is zero unless the proposal was accepted.
    pub fn add(&mut self, shares: &[AffiliationShare], requested_hours: f64, accepted_hours: f64) {
        for share in shares {
            *self.requested.entry(share.affiliation_id).or_default() += share.fraction * requested_hours;
            *self.accepted.entry(share.affiliation_id).or_default() += share.fraction * accepted_hours;
        }
    }

    pub fn requested(&self, affiliation_id: Option<i64>) -> f64 {
        self.requested.get(&affiliation_id).copied().unwrap_or(0.0)
    }

    pub fn accepted(&self, affiliation_id: Option<i64>) -> f64 {
        self.accepted.get(&affiliation_id).copied().unwrap_or(0.0)
    }

    pub fn total_requested(&self) -> f64 {
        self.requested.values().sum()
    }

    pub fn total_accepted(&self) -> f64 {
        self.accepted.values().sum()
    }

    /// Percentage of all requested time attributed to the affiliation.
    pub fn requested_percent(&self, affiliation_id: Option<i64>) -> f64 {
        percent(self.requested(affiliation_id), self.total_requested())
    }

    pub fn accepted_percent(&self, affiliation_id: Option<i64>) -> f64 {
        percent(self.accepted(affiliation_id), self.total_accepted())
    }

    /// Whether anything was attributed to Unknown.
    pub fn has_unknown(&self) -> bool {
        self.requested.contains_key(&None) || self.accepted.contains_key(&None)
    }
}

fn percent(part: f64, total: f64) -> f64 {
    if total > 0.0 { 100.0 * part / total } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: Option<i64>, assignment: Assignment, weight: f64) -> MemberAffiliation {
        MemberAffiliation { affiliation_id: id, assignment, weight }
    }

    fn fraction_of(shares: &[AffiliationShare], id: Option<i64>) -> f64 {
        shares.iter().find(|s| s.affiliation_id == id).map(|s| s.fraction).unwrap_or(0.0)
    }

    fn sums_to_one(shares: &[AffiliationShare]) -> bool {
        (shares.iter().map(|s| s.fraction).sum::<f64>() - 1.0).abs() < 1e-12
    }

    #[test]
    fn standard_members_weighted() {
        let shares = compute_fractions(
            &[
                member(Some(1), Assignment::Standard, 1.0),
                member(Some(1), Assignment::Standard, 1.0),
                member(Some(2), Assignment::Standard, 2.0),
            ],
            &[],
        );
        assert!(sums_to_one(&shares));
        assert!((fraction_of(&shares, Some(1)) - 0.5).abs() < 1e-12);
        assert!((fraction_of(&shares, Some(2)) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn excluded_members_ignored() {
        let shares = compute_fractions(
            &[member(Some(1), Assignment::Standard, 1.0), member(Some(9), Assignment::Excluded, 1.0)],
            &[],
        );
        assert_eq!(shares, vec![AffiliationShare { affiliation_id: Some(1), fraction: 1.0 }]);
    }

    #[test]
    fn shared_members_spread_over_queue() {
        let shares = compute_fractions(
            &[member(Some(1), Assignment::Standard, 1.0), member(Some(5), Assignment::Shared, 1.0)],
            &[(1, 3.0), (2, 1.0)],
        );
        assert!(sums_to_one(&shares));
        // Affiliation 1: 1 + 0.75, affiliation 2: 0.25, of a total of 2.
        assert!((fraction_of(&shares, Some(1)) - 0.875).abs() < 1e-12);
        assert!((fraction_of(&shares, Some(2)) - 0.125).abs() < 1e-12);
        assert_eq!(fraction_of(&shares, Some(5)), 0.0);
    }

    #[test]
    fn missing_affiliations_are_unknown() {
        let shares = compute_fractions(
            &[member(None, Assignment::Standard, 0.0), member(Some(1), Assignment::Standard, 1.0)],
            &[],
        );
        assert!((fraction_of(&shares, None) - 0.5).abs() < 1e-12);

        let all_excluded = compute_fractions(&[member(Some(3), Assignment::Excluded, 1.0)], &[]);
        assert_eq!(all_excluded, vec![AffiliationShare { affiliation_id: None, fraction: 1.0 }]);
    }

    #[test]
    fn totals_and_percentages() {
        let mut totals = AffiliationTotals::new();
        let half = [
            AffiliationShare { affiliation_id: Some(1), fraction: 0.5 },
            AffiliationShare { affiliation_id: Some(2), fraction: 0.5 },
        ];
        totals.add(&half, 10.0, 10.0);
        totals.add(&[AffiliationShare { affiliation_id: Some(1), fraction: 1.0 }], 10.0, 0.0);

        assert!((totals.requested(Some(1)) - 15.0).abs() < 1e-12);
        assert!((totals.accepted(Some(1)) - 5.0).abs() < 1e-12);
        assert!((totals.total_requested() - 20.0).abs() < 1e-12);
        assert!((totals.requested_percent(Some(2)) - 25.0).abs() < 1e-12);
        assert!((totals.accepted_percent(Some(2)) - 50.0).abs() < 1e-12);
        assert!(!totals.has_unknown());
    }
}
