use axum::extract::Path;
use axum::response::Json;
use axum::Extension;
use serde_json::{json, Value};

use crate::middleware::AuthUser;

/// GET /:username/panel - the protected landing target behind the panel
/// gatekeeper. The panel UI proper lives in the front-end app; this
/// endpoint hands it the verified identity it renders against.
pub async fn panel_home(
    Path(username): Path<String>,
    Extension(user): Extension<AuthUser>,
) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "panel": username,
            "userId": user.user_id,
            "username": user.username,
            "role": user.role,
            "storeId": user.store_id,
        },
    }))
}
