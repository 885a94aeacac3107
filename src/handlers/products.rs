//! Public catalog endpoints.

use axum::{extract::State, routing::get, Json, Router};

use crate::errors::ServiceError;
use crate::services::best_sellers::{self, BestSeller};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/best-sellers", get(list_best_sellers))
}

async fn list_best_sellers(
    State(state): State<AppState>,
) -> Result<Json<Vec<BestSeller>>, ServiceError> {
    Ok(Json(best_sellers::find_best_sellers(&state.db).await?))
}
