use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::{api::AppState, models::Update};

/// POST /telegram/webhook. Always answers 200: Telegram re-delivers updates
/// on any other status and command errors are already reported in chat.
pub async fn webhook(State(state): State<AppState>, Json(update): Json<Update>) -> Json<Value> {
    match &state.bot {
        Some(bot) => bot.handle_update(&state, update).await,
        None => {
            tracing::warn!(update_id = update.update_id, "webhook update but no bot token configured");
        }
    }

    Json(json!({ "ok": true }))
}
