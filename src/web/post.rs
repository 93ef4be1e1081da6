use crate::db::get_db_pool;
use crate::middleware::ClientCtx;
use crate::orm::{posts, users};
use actix_web::{error, get, post, web, Error, HttpResponse};
use askama_actix::{Template, TemplateToResponse};
use chrono::prelude::Utc;
use sea_orm::{entity::*, query::*, sea_query::Expr};
use sea_orm::{DatabaseConnection, DbErr, FromQueryResult, QueryFilter};
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_create_post)
        .service(create_post)
        .service(edit_post)
        .service(update_post)
        .service(destroy_post);
}

#[derive(Deserialize)]
pub struct PostFormData {
    pub title: String,
    pub body: String,
}

impl PostFormData {
    fn validate(&self) -> Option<String> {
        if self.title.is_empty() {
            Some("Title is required.".to_owned())
        } else {
            None
        }
    }

    fn body_column(&self) -> Option<String> {
        if self.body.is_empty() {
            None
        } else {
            Some(self.body.to_owned())
        }
    }
}

/// The post model joined with its author's username for rendering.
#[derive(Debug, FromQueryResult)]
pub struct PostForTemplate {
    pub id: i32,
    pub title: String,
    pub body: Option<String>,
    pub created: chrono::NaiveDateTime,
    pub author_id: i32,
    // join user
    pub username: String,
}

impl PostForTemplate {
    pub fn body_text(&self) -> &str {
        self.body.as_deref().unwrap_or("")
    }
}

#[derive(Template)]
#[template(path = "post_create.html")]
pub struct PostCreateTemplate {
    pub client: ClientCtx,
    pub error: Option<String>,
    pub title: String,
    pub body: String,
}

#[derive(Template)]
#[template(path = "post_update.html")]
pub struct PostUpdateTemplate {
    pub client: ClientCtx,
    pub error: Option<String>,
    pub post: PostForTemplate,
}

/// All posts with their author, most recent first.
pub async fn get_posts_for_template(
    db: &DatabaseConnection,
) -> Result<Vec<PostForTemplate>, DbErr> {
    posts::Entity::find()
        .left_join(users::Entity)
        .column_as(users::Column::Username, "username")
        .order_by_desc(posts::Column::Created)
        .into_model::<PostForTemplate>()
        .all(db)
        .await
}

pub async fn get_post_for_template(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<PostForTemplate>, DbErr> {
    posts::Entity::find_by_id(id)
        .left_join(users::Entity)
        .column_as(users::Column::Username, "username")
        .into_model::<PostForTemplate>()
        .one(db)
        .await
}

/// Loads a post for a mutating route. Missing rows are a 404; rows owned by
/// somebody else are a 403, which deliberately reveals that the post exists.
pub async fn get_post_for_client(
    db: &DatabaseConnection,
    client: &ClientCtx,
    id: i32,
    enforce_ownership: bool,
) -> Result<PostForTemplate, Error> {
    let post = get_post_for_template(db, id)
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound(format!("Post id {} doesn't exist.", id)))?;

    if enforce_ownership && !client.can_update_post(&post) {
        return Err(error::ErrorForbidden(
            "You do not have permission to modify this post.",
        ));
    }

    Ok(post)
}

#[get("/create")]
async fn view_create_post(client: ClientCtx) -> Result<HttpResponse, Error> {
    if let Err(redirect) = super::require_login(&client) {
        return Ok(redirect);
    }

    Ok(PostCreateTemplate {
        client,
        error: None,
        title: String::new(),
        body: String::new(),
    }
    .to_response())
}

#[post("/create")]
async fn create_post(
    client: ClientCtx,
    form: web::Form<PostFormData>,
) -> Result<HttpResponse, Error> {
    let user = match super::require_login(&client) {
        Ok(user) => user,
        Err(redirect) => return Ok(redirect),
    };

    if let Some(error) = form.validate() {
        return Ok(PostCreateTemplate {
            client,
            error: Some(error),
            title: form.title.to_owned(),
            body: form.body.to_owned(),
        }
        .to_response());
    }

    posts::Entity::insert(posts::ActiveModel {
        title: Set(form.title.to_owned()),
        body: Set(form.body_column()),
        created: Set(Utc::now().naive_utc()),
        author_id: Set(user.id),
        ..Default::default()
    })
    .exec(get_db_pool())
    .await
    .map_err(error::ErrorInternalServerError)?;

    Ok(super::redirect_to("/"))
}

#[get("/{post_id}/update")]
async fn edit_post(client: ClientCtx, path: web::Path<i32>) -> Result<HttpResponse, Error> {
    if let Err(redirect) = super::require_login(&client) {
        return Ok(redirect);
    }

    let post = get_post_for_client(get_db_pool(), &client, path.into_inner(), true).await?;

    Ok(PostUpdateTemplate {
        client,
        error: None,
        post,
    }
    .to_response())
}

#[post("/{post_id}/update")]
async fn update_post(
    client: ClientCtx,
    path: web::Path<i32>,
    form: web::Form<PostFormData>,
) -> Result<HttpResponse, Error> {
    if let Err(redirect) = super::require_login(&client) {
        return Ok(redirect);
    }

    let db = get_db_pool();
    let mut post = get_post_for_client(db, &client, path.into_inner(), true).await?;

    if let Some(error) = form.validate() {
        // Repopulate the form with the rejected input.
        post.title = form.title.to_owned();
        post.body = form.body_column();
        return Ok(PostUpdateTemplate {
            client,
            error: Some(error),
            post,
        }
        .to_response());
    }

    // Title and body only. Creation time and authorship are immutable.
    posts::Entity::update_many()
        .col_expr(posts::Column::Title, Expr::value(form.title.to_owned()))
        .col_expr(posts::Column::Body, Expr::value(form.body_column()))
        .filter(posts::Column::Id.eq(post.id))
        .exec(db)
        .await
        .map_err(error::ErrorInternalServerError)?;

    Ok(super::redirect_to("/"))
}

#[post("/{post_id}/delete")]
async fn destroy_post(client: ClientCtx, path: web::Path<i32>) -> Result<HttpResponse, Error> {
    if let Err(redirect) = super::require_login(&client) {
        return Ok(redirect);
    }

    let db = get_db_pool();
    // Result discarded; this is the existence and ownership check.
    let post = get_post_for_client(db, &client, path.into_inner(), true).await?;

    posts::Entity::delete_many()
        .filter(posts::Column::Id.eq(post.id))
        .exec(db)
        .await
        .map_err(error::ErrorInternalServerError)?;

    Ok(super::redirect_to("/"))
}

#[cfg(test)]
mod tests {
    use super::PostFormData;

    #[test]
    fn title_is_required() {
        let form = PostFormData {
            title: String::new(),
            body: "text".to_owned(),
        };
        assert_eq!(form.validate(), Some("Title is required.".to_owned()));

        let form = PostFormData {
            title: "Hello".to_owned(),
            body: String::new(),
        };
        assert_eq!(form.validate(), None);
    }

    #[test]
    fn empty_body_stores_null() {
        let form = PostFormData {
            title: "Hello".to_owned(),
            body: String::new(),
        };
        assert_eq!(form.body_column(), None);
    }
}
