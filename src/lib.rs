pub mod db;
pub mod middleware;
pub mod orm;
pub mod session;
pub mod user;
pub mod web;

pub use db::get_db_pool;
