use askama::Template;

use super::PageContext;
use crate::models::call::Call;
use crate::models::person::PersonDisplay;
use crate::models::proposal::ProposalListItem;
use crate::models::review::ReviewerInfo;

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub error: Option<String>,
    pub app_name: String,
    pub csrf_token: String,
}

#[derive(Template)]
#[template(path = "register.html")]
pub struct RegisterTemplate {
    pub app_name: String,
    pub csrf_token: String,
    pub errors: Vec<String>,
    pub username: String,
    pub name: String,
    pub email: String,
    pub institution: String,
}

#[derive(Template)]
#[template(path = "account.html")]
pub struct AccountTemplate {
    pub ctx: PageContext,
    pub person: PersonDisplay,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub ctx: PageContext,
    pub greeting: String,
    pub proposals: Vec<ProposalListItem>,
    pub reviews: Vec<ReviewerInfo>,
    pub open_calls: Vec<Call>,
}

#[derive(Template)]
#[template(path = "calls/list.html")]
pub struct CallListTemplate {
    pub ctx: PageContext,
    pub calls: Vec<Call>,
}
