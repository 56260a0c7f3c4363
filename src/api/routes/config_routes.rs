use axum::{routing::get, Router};

use crate::api::controller::config::ConfigController;
use crate::app_state::AppState;

pub fn config_routes() -> Router<AppState> {
    Router::new().route("/", get(ConfigController::get_ui_config))
}
