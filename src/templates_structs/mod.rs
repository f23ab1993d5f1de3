// Template context structures for Askama templates, organized by area.

use actix_session::Session;

use crate::auth::csrf;
use crate::auth::session::{Permissions, get_permissions, get_person_id, get_username, take_flash};
use crate::config::AppConfig;
use crate::errors::AppError;

mod admin;
mod common;
mod job;
mod proposal;
mod review;
mod tabulation;

pub use self::admin::*;
pub use self::common::*;
pub use self::job::*;
pub use self::proposal::*;
pub use self::review::*;
pub use self::tabulation::*;

/// Common context shared by all authenticated pages.
/// Templates access these as `ctx.username`, `ctx.nav_items`, etc.
pub struct PageContext {
    pub username: String,
    pub person_id: i64,
    pub avatar_initial: String,
    pub permissions: Permissions,
    pub flash: Option<String>,
    pub nav_items: Vec<NavItem>,
    pub app_name: String,
    pub csrf_token: String,
}

pub struct NavItem {
    pub label: &'static str,
    pub href: &'static str,
    pub active: bool,
}

const NAV: &[(&str, &str, Option<&str>)] = &[
    ("Dashboard", "/dashboard", None),
    ("Calls", "/calls", None),
    ("Reviews", "/reviews", None),
    ("Administration", "/admin", Some("admin")),
    ("Clash tool", "/admin/clash", Some("clash.manage")),
    ("Messages", "/admin/messages", Some("message.view")),
    ("Audit log", "/admin/audit", Some("audit.view")),
];

impl PageContext {
    pub fn build(session: &Session, config: &AppConfig, current_path: &str) -> Result<Self, AppError> {
        let username = get_username(session)
            .map_err(|e| AppError::Session(format!("Failed to get username: {}", e)))?;
        let permissions = get_permissions(session)
            .map_err(|e| AppError::Session(format!("Failed to get permissions: {}", e)))?;
        let person_id = get_person_id(session)
            .ok_or_else(|| AppError::Session("No person in session".to_string()))?;
        let flash = take_flash(session);
        let csrf_token = csrf::get_or_create_token(session);
        let avatar_initial = username.chars().next().unwrap_or('?').to_uppercase().to_string();
        let nav_items = nav_items(&permissions, current_path);
        Ok(Self {
            username,
            person_id,
            avatar_initial,
            permissions,
            flash,
            nav_items,
            app_name: config.app_name.clone(),
            csrf_token,
        })
    }
}

/// The most specific matching entry is marked active, so /admin/clash does not also light up /admin.
fn nav_items(permissions: &Permissions, current_path: &str) -> Vec<NavItem> {
    let matches = |href: &str| current_path == href || current_path.starts_with(&format!("{href}/"));
    let visible: Vec<(&'static str, &'static str)> = NAV
        .iter()
        .filter(|(_, _, perm)| perm.is_none_or(|p| permissions.has(p)))
        .map(|&(label, href, _)| (label, href))
        .collect();
    let active = visible
        .iter()
        .filter(|(_, href)| matches(href))
        .max_by_key(|(_, href)| href.len())
        .map(|&(_, href)| href);
    visible
        .into_iter()
        .map(|(label, href)| NavItem { label, href, active: active == Some(href) })
        .collect()
}

/// One `<option>` of a select list.
pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

impl SelectOption {
    pub fn new(value: impl ToString, label: impl Into<String>, selected: bool) -> Self {
        Self { value: value.to_string(), label: label.into(), selected }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nav_marks_most_specific_entry() {
        let admin = crate::models::permission::codes_for(true);
        let items = nav_items(&admin, "/admin/clash/mocs");
        let active: Vec<_> = items.iter().filter(|i| i.active).map(|i| i.href).collect();
        assert_eq!(active, vec!["/admin/clash"]);

        let user = crate::models::permission::codes_for(false);
        let items = nav_items(&user, "/proposals/3");
        assert!(items.iter().all(|i| !i.href.starts_with("/admin")));
        assert!(items.iter().all(|i| !i.active));
    }
}
