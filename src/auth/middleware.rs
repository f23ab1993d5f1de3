use actix_session::SessionExt;
use actix_web::{
    Error, HttpResponse,
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    middleware::Next,
};

use super::session::Permissions;

/// Redirects to /login unless the session carries a logged-in person.
pub async fn require_auth(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let session = req.get_session();
    let logged_in = session.get::<i64>("person_id").unwrap_or(None).is_some();

    if !logged_in {
        let response = HttpResponse::SeeOther()
            .insert_header(("Location", "/login"))
            .finish();
        return Ok(req.into_response(response).map_into_right_body());
    }

    next.call(req).await.map(|res| res.map_into_left_body())
}

/// Guards the whole /admin scope: the session must hold the `admin` permission.
pub async fn require_admin(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let session = req.get_session();
    let is_admin = session
        .get::<String>("permissions")
        .unwrap_or(None)
        .map(|csv| Permissions::from_csv(&csv).has("admin"))
        .unwrap_or(false);

    if !is_admin {
        let response = HttpResponse::Forbidden().body("Administrator access required");
        return Ok(req.into_response(response).map_into_right_body());
    }

    next.call(req).await.map(|res| res.map_into_left_body())
}
