pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod seed;

use config::Config;
use db::pool::Db;

/// Shared request state. The store handle is opened once in `main` and
/// injected here; nothing else holds a global connection.
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub jwt: auth::jwt::JwtManager,
    pub config: Config,
}

impl AsRef<AppState> for AppState {
    fn as_ref(&self) -> &AppState {
        self
    }
}
