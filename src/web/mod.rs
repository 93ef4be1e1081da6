pub mod auth;
pub mod error;
pub mod index;
pub mod post;

use crate::middleware::ClientCtx;
use crate::user::ClientUser;
use actix_web::http::header;
use actix_web::HttpResponse;

/// Configures the web app
///
/// @see https://docs.rs/actix-web/4.0.1/actix_web/struct.App.html#method.configure
pub fn configure(conf: &mut actix_web::web::ServiceConfig) {
    index::configure(conf);
    auth::configure(conf);
    post::configure(conf);
}

pub(crate) fn redirect_to(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .append_header((header::LOCATION, location))
        .finish()
}

/// Explicit guard wrapped around any handler which requires a known identity.
/// Guests are bounced to the login form instead of an error page, and the
/// guarded handler body never runs.
pub(crate) fn require_login(client: &ClientCtx) -> Result<ClientUser, HttpResponse> {
    match client.get_user() {
        Some(user) => Ok(user),
        None => Err(redirect_to("/auth/login")),
    }
}
