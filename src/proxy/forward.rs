use crate::model::{Route, Verb};
use axum::body::Bytes;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::ProxyState;

/// Maximum upstream body relayed back (10 MB).
const MAX_UPSTREAM_BYTES: usize = 10 * 1024 * 1024;

/// Body fields relayed upstream for a mutating request. Anything else the
/// client sends is dropped; `user` is always added by the proxy.
pub(super) fn forwarded_fields(verb: Verb, route: Route) -> &'static [&'static str] {
    match (verb, route) {
        (Verb::Post, Route::Grades) => &["path"],
        (Verb::Post, Route::Courses | Route::Assignments | Route::Problems) => &["fromPath", "toPath"],
        (Verb::Put, Route::Courses) => &["path", "name"],
        (Verb::Patch | Verb::Delete, Route::Courses) => &["path"],
        _ => &[],
    }
}

fn message(status: StatusCode, text: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "message": text.into() }))).into_response()
}

/// Build the upstream payload: `{user, <forwarded fields>}`.
pub(super) fn build_payload(
    user: &str,
    verb: Verb,
    route: Route,
    body: &[u8],
) -> Result<serde_json::Value, String> {
    let parsed: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| format!("Invalid JSON body: {e}"))?;
    let Some(fields) = parsed.as_object() else {
        return Err("Request body must be a JSON object".to_string());
    };

    let mut payload = serde_json::Map::new();
    payload.insert("user".to_string(), serde_json::Value::String(user.to_string()));
    for &field in forwarded_fields(verb, route) {
        let value = fields
            .get(field)
            .ok_or_else(|| format!("Missing field \"{field}\""))?;
        payload.insert(field.to_string(), value.clone());
    }
    Ok(serde_json::Value::Object(payload))
}

/// Relay one request to `<upstream>/<route>` and mirror status and JSON body.
pub(super) async fn relay(state: &ProxyState, verb: Verb, route: Route, body: Bytes) -> Response {
    let mut url = match state.upstream.join(route.as_str()) {
        Ok(url) => url,
        Err(e) => return message(StatusCode::INTERNAL_SERVER_ERROR, format!("Invalid upstream route: {e}")),
    };

    let mut request = if verb == Verb::Get {
        url.query_pairs_mut().append_pair("user", &state.user);
        state.client.get(url)
    } else {
        let payload = match build_payload(&state.user, verb, route, &body) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(%verb, %route, "rejected request: {e}");
                return message(StatusCode::BAD_REQUEST, e);
            }
        };
        state.client.request(verb.into(), url).json(&payload)
    };
    request = request.header(reqwest::header::ACCEPT, "application/json");

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(%verb, %route, "upstream unreachable: {e}");
            return message(StatusCode::BAD_GATEWAY, format!("Course service unreachable: {e}"));
        }
    };

    let status = StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => return message(StatusCode::BAD_GATEWAY, format!("Failed to read upstream response: {e}")),
    };
    tracing::info!(%verb, %route, status = status.as_u16(), "relayed");

    if bytes.len() > MAX_UPSTREAM_BYTES {
        return message(StatusCode::BAD_GATEWAY, "Upstream response too large");
    }
    if status == StatusCode::NO_CONTENT || bytes.iter().all(u8::is_ascii_whitespace) {
        return status.into_response();
    }
    match serde_json::from_slice::<serde_json::Value>(&bytes) {
        Ok(json) => (status, Json(json)).into_response(),
        Err(_) => message(StatusCode::BAD_GATEWAY, "Course service returned a non-JSON response"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_keeps_only_forwarded_fields() {
        let body = br#"{"fromPath":"/a","toPath":"/b","user":"mallory","extra":1}"#;
        let payload = build_payload("ta", Verb::Post, Route::Assignments, body).unwrap();
        assert_eq!(
            payload,
            serde_json::json!({"user": "ta", "fromPath": "/a", "toPath": "/b"})
        );
    }

    #[test]
    fn payload_requires_every_field() {
        let err = build_payload("ta", Verb::Put, Route::Courses, br#"{"path":"/c1"}"#).unwrap_err();
        assert_eq!(err, "Missing field \"name\"");
        assert!(build_payload("ta", Verb::Patch, Route::Courses, b"[]").is_err());
        assert!(build_payload("ta", Verb::Delete, Route::Courses, b"").is_err());
    }

    #[test]
    fn field_table_matches_routes() {
        assert_eq!(forwarded_fields(Verb::Post, Route::Grades), &["path"]);
        assert_eq!(forwarded_fields(Verb::Post, Route::Courses), &["fromPath", "toPath"]);
        assert_eq!(forwarded_fields(Verb::Put, Route::Courses), &["path", "name"]);
        assert_eq!(forwarded_fields(Verb::Delete, Route::Courses), &["path"]);
        assert!(forwarded_fields(Verb::Get, Route::Config).is_empty());
    }
}
