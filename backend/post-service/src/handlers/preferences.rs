use actix_web::{web, HttpResponse};

use crate::domain::Caller;
use crate::error::Result;
use crate::state::AppState;
use crate::store::EntityStore;

/// Tag weights learned from the caller's likes
pub async fn my_preferences<S: EntityStore>(
    state: web::Data<AppState<S>>,
    caller: Caller,
) -> Result<HttpResponse> {
    let preferences = state.preferences.get(&caller.user_id).await?;
    Ok(HttpResponse::Ok().json(preferences))
}
