use once_cell::sync::OnceCell;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};
use std::time::Duration;

static DB_POOL: OnceCell<DatabaseConnection> = OnceCell::new();

#[inline(always)]
pub fn get_db_pool() -> &'static DatabaseConnection {
    DB_POOL.get().expect("get_db_pool() called before init_db()")
}

/// Opens the database URL and initializes the DB_POOL static.
pub async fn init_db(database_url: &str) -> &'static DatabaseConnection {
    let mut opt = ConnectOptions::new(database_url.to_owned());
    // Single local store. One connection keeps writes strictly ordered.
    opt.max_connections(1)
        .connect_timeout(Duration::from_secs(8))
        .sqlx_logging(true);
    let pool = Database::connect(opt)
        .await
        .expect("Database connection was not established.");
    DB_POOL.set(pool).expect("init_db() called twice");
    get_db_pool()
}

const SCHEMA_SQL: [&str; 2] = [
    "CREATE TABLE IF NOT EXISTS user (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT UNIQUE NOT NULL,
        password TEXT NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS post (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        body TEXT,
        created TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        author_id INTEGER NOT NULL,
        FOREIGN KEY (author_id) REFERENCES user (id)
    );",
];

/// Creates the user and post tables on first run.
pub async fn init_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    for sql in SCHEMA_SQL {
        db.execute(Statement::from_string(
            db.get_database_backend(),
            sql.to_owned(),
        ))
        .await?;
    }
    Ok(())
}
