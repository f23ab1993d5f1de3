use crate::auth::session::Permissions;

/// Granted to every registered person.
const BASE_CODES: &[&str] = &[
    "proposal.create",
    "proposal.view",
    "review.edit",
    "person.lookup",
];

/// Administrators additionally run calls, the review process, and the clash tool.
const ADMIN_CODES: &[&str] = &[
    "admin",
    "call.manage",
    "review.assign",
    "decision.edit",
    "tabulation.view",
    "clash.manage",
    "message.view",
    "audit.view",
];

pub fn codes_for(admin: bool) -> Permissions {
    let mut codes: Vec<String> = BASE_CODES.iter().map(|c| c.to_string()).collect();
    if admin {
        codes.extend(ADMIN_CODES.iter().map(|c| c.to_string()));
    }
    Permissions(codes)
}
