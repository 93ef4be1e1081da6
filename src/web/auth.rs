use crate::db::get_db_pool;
use crate::middleware::ClientCtx;
use crate::orm::users;
use crate::session;
use crate::user::get_user_by_name;
use actix_session::Session;
use actix_web::{error, get, post, web, Error, HttpResponse};
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordVerifier, SaltString};
use argon2::{Argon2, PasswordHasher};
use askama_actix::{Template, TemplateToResponse};
use sea_orm::{entity::*, DbErr};
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_register)
        .service(post_register)
        .service(view_login)
        .service(post_login)
        .service(view_logout);
}

#[derive(Template)]
#[template(path = "register.html")]
struct RegisterTemplate {
    client: ClientCtx,
    error: Option<String>,
}

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    client: ClientCtx,
    error: Option<String>,
}

#[derive(Deserialize)]
pub struct CredentialFormData {
    username: String,
    password: String,
}

fn hash_password(password: &str) -> Result<String, Error> {
    Argon2::default()
        .hash_password(password.as_bytes(), &SaltString::generate(&mut OsRng))
        .map(|hash| hash.to_string())
        .map_err(|e| {
            log::error!("hash_password: {}", e);
            error::ErrorInternalServerError("Failed to hash password.")
        })
}

/// True only for a failed UNIQUE constraint on the username column.
/// Any other storage failure is a server error, not a taken name.
fn is_username_taken(e: &DbErr) -> bool {
    match e {
        DbErr::Exec(msg) | DbErr::Query(msg) => {
            msg.contains("UNIQUE constraint failed: user.username")
        }
        _ => false,
    }
}

/// Constant-time verification against a stored argon2 hash.
/// A hash that fails to parse is logged and treated as a mismatch.
fn verify_password(password_hash: &str, password: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed_hash) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok(),
        Err(e) => {
            log::error!("verify_password: malformed hash: {}", e);
            false
        }
    }
}

#[get("/auth/register")]
async fn view_register(client: ClientCtx) -> Result<HttpResponse, Error> {
    Ok(RegisterTemplate {
        client,
        error: None,
    }
    .to_response())
}

#[post("/auth/register")]
async fn post_register(
    client: ClientCtx,
    form: web::Form<CredentialFormData>,
) -> Result<HttpResponse, Error> {
    let db = get_db_pool();

    let error = if form.username.is_empty() {
        Some("Username is required.".to_owned())
    } else if form.password.is_empty() {
        Some("Password is required.".to_owned())
    } else if get_user_by_name(db, &form.username)
        .await
        .map_err(error::ErrorInternalServerError)?
        .is_some()
    {
        Some(format!("User {} is already registered.", form.username))
    } else {
        None
    };

    if let Some(error) = error {
        return Ok(RegisterTemplate {
            client,
            error: Some(error),
        }
        .to_response());
    }

    let user = users::ActiveModel {
        username: Set(form.username.to_owned()),
        password: Set(hash_password(&form.password)?),
        ..Default::default()
    };
    // The pre-check above is advisory; the UNIQUE constraint is the authority.
    // Losing the race to a concurrent commit reads the same as the pre-check failing.
    match users::Entity::insert(user).exec(db).await {
        Ok(_) => Ok(super::redirect_to("/auth/login")),
        Err(e) if is_username_taken(&e) => {
            log::warn!("post_register: insert: {}", e);
            Ok(RegisterTemplate {
                client,
                error: Some(format!("User {} is already registered.", form.username)),
            }
            .to_response())
        }
        Err(e) => Err(error::ErrorInternalServerError(e)),
    }
}

#[get("/auth/login")]
async fn view_login(client: ClientCtx) -> Result<HttpResponse, Error> {
    Ok(LoginTemplate {
        client,
        error: None,
    }
    .to_response())
}

#[post("/auth/login")]
async fn post_login(
    client: ClientCtx,
    cookies: Session,
    form: web::Form<CredentialFormData>,
) -> Result<HttpResponse, Error> {
    let user = get_user_by_name(get_db_pool(), &form.username)
        .await
        .map_err(error::ErrorInternalServerError)?;

    match user {
        Some(user) if verify_password(&user.password, &form.password) => {
            session::establish(&cookies, user.id).map_err(error::ErrorInternalServerError)?;
            Ok(super::redirect_to("/"))
        }
        Some(_) => Ok(LoginTemplate {
            client,
            error: Some("Incorrect password.".to_owned()),
        }
        .to_response()),
        None => Ok(LoginTemplate {
            client,
            error: Some("Incorrect username.".to_owned()),
        }
        .to_response()),
    }
}

#[get("/auth/logout")]
async fn view_logout(cookies: Session) -> Result<HttpResponse, Error> {
    session::revoke(&cookies);
    Ok(super::redirect_to("/"))
}

#[cfg(test)]
mod tests {
    use super::{hash_password, is_username_taken, verify_password};
    use sea_orm::DbErr;

    #[test]
    fn password_hash_verifies_own_input_only() {
        let hash = hash_password("hunter2").expect("hashing failed");
        assert_ne!(hash, "hunter2");
        assert!(verify_password(&hash, "hunter2"));
        assert!(!verify_password(&hash, "hunter3"));
    }

    #[test]
    fn malformed_hash_is_a_mismatch() {
        assert!(!verify_password("not-a-phc-string", "hunter2"));
    }

    #[test]
    fn only_username_conflicts_read_as_taken() {
        assert!(is_username_taken(&DbErr::Exec(
            "error returned from database: UNIQUE constraint failed: user.username".to_owned()
        )));
        assert!(is_username_taken(&DbErr::Query(
            "UNIQUE constraint failed: user.username".to_owned()
        )));
        // Connection loss and unrelated constraints stay server errors.
        assert!(!is_username_taken(&DbErr::Conn(
            "connection refused".to_owned()
        )));
        assert!(!is_username_taken(&DbErr::Exec(
            "error returned from database: NOT NULL constraint failed: user.password".to_owned()
        )));
    }
}
