use actix_session::Session;

use crate::errors::AppError;

/// Permission codes held in the session, with a `has()` helper usable from templates.
#[derive(Debug, Clone, Default)]
pub struct Permissions(pub Vec<String>);

impl Permissions {
    pub fn has(&self, code: &str) -> bool {
        self.0.iter().any(|p| p == code)
    }

    pub fn from_csv(csv: &str) -> Self {
        let codes = csv
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        Permissions(codes)
    }

    pub fn to_csv(&self) -> String {
        self.0.join(",")
    }
}

/// Store the identity of a freshly authenticated person.
pub fn log_in(session: &Session, person_id: i64, username: &str, permissions: &Permissions) {
    session.renew();
    let _ = session.insert("person_id", person_id);
    let _ = session.insert("username", username);
    let _ = session.insert("permissions", permissions.to_csv());
}

pub fn get_person_id(session: &Session) -> Option<i64> {
    session.get::<i64>("person_id").unwrap_or(None)
}

/// The logged-in person's id, or a session error (which redirects to /login).
pub fn require_person_id(session: &Session) -> Result<i64, AppError> {
    get_person_id(session).ok_or_else(|| AppError::Session("Not logged in".to_string()))
}

pub fn get_username(session: &Session) -> Result<String, String> {
    match session.get::<String>("username") {
        Ok(Some(username)) => Ok(username),
        Ok(None) => Err("No username in session".to_string()),
        Err(e) => Err(format!("Session error: {}", e)),
    }
}

pub fn get_permissions(session: &Session) -> Result<Permissions, String> {
    match session.get::<String>("permissions") {
        Ok(Some(csv)) => Ok(Permissions::from_csv(&csv)),
        Ok(None) => Err("No permissions in session".to_string()),
        Err(e) => Err(format!("Session error: {}", e)),
    }
}

pub fn is_admin(session: &Session) -> bool {
    get_permissions(session)
        .map(|p| p.has("admin"))
        .unwrap_or(false)
}

pub fn set_flash(session: &Session, message: impl Into<String>) {
    let _ = session.insert("flash", message.into());
}

pub fn take_flash(session: &Session) -> Option<String> {
    let flash = session.get::<String>("flash").unwrap_or(None);
    if flash.is_some() {
        session.remove("flash");
    }
    flash
}

pub fn require_permission(session: &Session, code: &str) -> Result<(), AppError> {
    let permissions = get_permissions(session)
        .map_err(|e| AppError::Session(format!("Failed to get permissions: {}", e)))?;

    if permissions.has(code) {
        Ok(())
    } else {
        Err(AppError::PermissionDenied(code.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_round_trip_skips_blanks() {
        let perms = Permissions::from_csv("proposal.create, ,review.edit,");
        assert_eq!(perms.0, vec!["proposal.create", "review.edit"]);
        assert!(perms.has("review.edit"));
        assert!(!perms.has("admin"));
        assert_eq!(perms.to_csv(), "proposal.create,review.edit");
    }
}
