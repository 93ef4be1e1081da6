use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::cookie::Key;
use actix_web::http::{header, StatusCode};
use actix_web::{test, App};
use quill::db::{get_db_pool, init_db, init_schema};
use quill::middleware::ClientCtx;
use quill::orm::users;
use quill::user::get_user_by_name;
use sea_orm::{entity::*, query::*};

#[actix_rt::test]
async fn stale_session_resolves_to_guest() {
    init_schema(init_db("sqlite::memory:").await)
        .await
        .expect("failed to initialize schema");

    let secret_key = Key::generate();
    let app = test::init_service(
        App::new()
            .wrap(ClientCtx::default())
            .wrap(SessionMiddleware::new(
                CookieSessionStore::default(),
                secret_key,
            ))
            .configure(quill::web::configure),
    )
    .await;

    for (name, pass) in [("carol", "pw1"), ("dave", "pw2")] {
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/register")
                .set_form(&[("username", name), ("password", pass)])
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FOUND);
    }

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/auth/login")
            .set_form(&[("username", "carol"), ("password", "pw1")])
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    let carol = resp.response().cookies().next().unwrap().into_owned();

    // The live session identifies carol.
    let body = test::call_and_read_body(
        &app,
        test::TestRequest::get()
            .uri("/")
            .cookie(carol.clone())
            .to_request(),
    )
    .await;
    assert!(std::str::from_utf8(&body).unwrap().contains("carol"));

    // Pull the row out from under the session.
    let db = get_db_pool();
    let row = get_user_by_name(db, "carol")
        .await
        .expect("lookup failed")
        .expect("carol was not registered");
    users::Entity::delete_many()
        .filter(users::Column::Id.eq(row.id))
        .exec(db)
        .await
        .expect("delete failed");

    // The token still verifies but names nobody; the request renders as a
    // guest rather than failing.
    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/")
            .cookie(carol.clone())
            .to_request(),
    )
    .await;
    assert!(resp.status().is_success());
    let body = test::read_body(resp).await;
    let body = std::str::from_utf8(&body).unwrap();
    assert!(body.contains("Log In"));
    assert!(!body.contains("carol"));

    // Protected routes bounce the stale token to the login form, not a 500.
    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/create")
            .cookie(carol.clone())
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
        resp.headers().get(header::LOCATION).unwrap(),
        "/auth/login"
    );

    // Logging in over the stale cookie replaces it outright: the new session
    // carries only the fresh identity.
    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/auth/login")
            .cookie(carol.clone())
            .set_form(&[("username", "dave"), ("password", "pw2")])
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    let dave = resp
        .response()
        .cookies()
        .next()
        .expect("login did not reissue the session cookie")
        .into_owned();
    assert_ne!(dave.value(), carol.value());

    let body = test::call_and_read_body(
        &app,
        test::TestRequest::get()
            .uri("/")
            .cookie(dave)
            .to_request(),
    )
    .await;
    let body = std::str::from_utf8(&body).unwrap();
    assert!(body.contains("dave"));
    assert!(!body.contains("carol"));
}
