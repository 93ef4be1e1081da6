use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::cookie::Key;
use actix_web::http::StatusCode;
use actix_web::middleware::{ErrorHandlers, Logger};
use actix_web::{App, HttpServer};
use env_logger::Env;
use quill::db::{get_db_pool, init_db, init_schema};
use quill::middleware::ClientCtx;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    init_db(&std::env::var("DATABASE_URL").expect("DATABASE_URL must be set.")).await;
    init_schema(get_db_pool())
        .await
        .expect("Failed to initialize schema.");

    let secret_key = session_key();

    HttpServer::new(move || {
        // Order of middleware IS IMPORTANT and is in REVERSE EXECUTION ORDER.
        App::new()
            .wrap(
                ErrorHandlers::new()
                    .handler(StatusCode::FORBIDDEN, quill::web::error::error_document)
                    .handler(StatusCode::NOT_FOUND, quill::web::error::error_document)
                    .handler(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        quill::web::error::error_document,
                    ),
            )
            .wrap(ClientCtx::default())
            .wrap(SessionMiddleware::new(
                CookieSessionStore::default(),
                secret_key.clone(),
            ))
            .wrap(Logger::new("%a %{User-Agent}i"))
            .configure(quill::web::configure)
    })
    .bind("127.0.0.1:8080")?
    .run()
    .await
}

/// Signing key for the session cookie. Sessions issued before a restart
/// only survive it when SECRET_KEY is pinned in the environment.
fn session_key() -> Key {
    match std::env::var("SECRET_KEY") {
        Ok(secret) if secret.len() >= 64 => Key::derive_from(secret.as_bytes()),
        Ok(_) => panic!("SECRET_KEY must be at least 64 characters."),
        Err(_) => {
            log::warn!("SECRET_KEY not set; generating an ephemeral session key.");
            Key::generate()
        }
    }
}
