use super::post::{get_posts_for_template, PostForTemplate};
use crate::db::get_db_pool;
use crate::middleware::ClientCtx;
use actix_web::{error, get, Error, HttpResponse};
use askama_actix::{Template, TemplateToResponse};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_index);
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub client: ClientCtx,
    pub posts: Vec<PostForTemplate>,
}

#[get("/")]
async fn view_index(client: ClientCtx) -> Result<HttpResponse, Error> {
    let posts = get_posts_for_template(get_db_pool())
        .await
        .map_err(error::ErrorInternalServerError)?;

    Ok(IndexTemplate { client, posts }.to_response())
}
