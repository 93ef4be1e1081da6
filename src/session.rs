use crate::user::{get_user_by_id, ClientUser};
use actix_session::{Session, SessionInsertError};
use sea_orm::DatabaseConnection;

const USER_ID_KEY: &str = "user_id";

/// Establishes a fresh session for a user who just authenticated.
/// Whatever session existed before is dropped first so a cookie issued
/// pre-login can never be fixated onto the new identity.
pub fn establish(session: &Session, user_id: i32) -> Result<(), SessionInsertError> {
    session.clear();
    session.renew();
    session.insert(USER_ID_KEY, user_id)
}

/// Ends the session unconditionally and instructs the client to drop the cookie.
pub fn revoke(session: &Session) {
    session.purge();
}

/// Resolves the client's identity from the signed session cookie.
///
/// Anything short of a valid token naming an existing user resolves to
/// anonymous (None), never an error: a missing cookie, a tampered or
/// unreadable token, and a stale id for a row that no longer exists all
/// look the same to the rest of the request.
pub async fn authenticate_client_by_session(
    db: &DatabaseConnection,
    session: &Session,
) -> Option<ClientUser> {
    let user_id = match session.get::<i32>(USER_ID_KEY) {
        Ok(Some(id)) => id,
        Ok(None) => return None,
        Err(e) => {
            log::warn!("authenticate_client_by_session: session.get(): {}", e);
            return None;
        }
    };

    match get_user_by_id(db, user_id).await {
        Ok(Some(user)) => Some(user.into()),
        Ok(None) => None,
        Err(e) => {
            log::error!("authenticate_client_by_session: {}", e);
            None
        }
    }
}
