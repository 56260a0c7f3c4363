use axum::extract::State;
use axum::Json;

use crate::api::dto::config_dto::UiConfigDto;
use crate::api::dto::ApiResponse;
use crate::app_state::AppState;

pub struct ConfigController;

impl ConfigController {
    pub async fn get_ui_config(State(state): State<AppState>) -> Json<ApiResponse<UiConfigDto>> {
        Json(ApiResponse::ok(UiConfigDto::from(state.config.as_ref())))
    }
}
