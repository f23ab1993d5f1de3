//! Review-process arithmetic over rows already fetched from the database:
//! rating aggregation, affiliation time fractions, and RA-bin allocation.

pub mod affiliation;
pub mod rabins;
pub mod rating;

pub use affiliation::{AffiliationShare, AffiliationTotals, Assignment, MemberAffiliation, compute_fractions};
pub use rabins::{RaBins, TargetTime};
pub use rating::{RatingInput, RatingSummary, summarize};
