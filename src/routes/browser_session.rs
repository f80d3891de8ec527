use crate::db::SharedRepository;
use crate::error::app_error::AppError;
use crate::models::browser_session::{BrowserSessionFilter, BrowserSessionKey, BrowserSessionRequest, BrowserSessionResponse, PayloadMode};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, delete, get, patch, post, put};
use rocket_okapi::openapi;
use uuid::Uuid;

/// A path segment that is not a UUID cannot name any record, so it is a 404 like any other miss.
fn primary_key(id: &str) -> Result<BrowserSessionKey, AppError> {
    match Uuid::parse_str(id) {
        Ok(uuid) => Ok(BrowserSessionKey::Id(uuid)),
        Err(_) => Err(AppError::NotFound(format!("No browser session with id {}", id))),
    }
}

fn alternate_key(browser_session_id: &str) -> BrowserSessionKey {
    BrowserSessionKey::BrowserSessionId(browser_session_id.to_string())
}

fn not_found(key: &BrowserSessionKey) -> AppError {
    AppError::NotFound(format!("No browser session with {}", key))
}

async fn retrieve(repo: &SharedRepository, key: BrowserSessionKey) -> Result<Json<BrowserSessionResponse>, AppError> {
    match repo.get_browser_session(&key).await? {
        Some(session) => Ok(Json(BrowserSessionResponse::from(&session))),
        None => Err(not_found(&key)),
    }
}

async fn update(repo: &SharedRepository, key: BrowserSessionKey, payload: &BrowserSessionRequest, mode: PayloadMode) -> Result<Json<BrowserSessionResponse>, AppError> {
    // Missing and ambiguous keys are reported before the payload is looked at
    if repo.get_browser_session(&key).await?.is_none() {
        return Err(not_found(&key));
    }

    payload.validate_for(mode)?;

    match repo.update_browser_session(&key, payload).await? {
        Some(session) => Ok(Json(BrowserSessionResponse::from(&session))),
        None => Err(not_found(&key)),
    }
}

async fn destroy(repo: &SharedRepository, key: BrowserSessionKey) -> Result<Status, AppError> {
    if repo.delete_browser_session(&key).await? {
        Ok(Status::NoContent)
    } else {
        Err(not_found(&key))
    }
}

/// List browser sessions, newest first, optionally filtered by exact browser session id and/or email
#[openapi(tag = "Browser Sessions")]
#[get("/?<browser_session_id>&<email>")]
pub async fn list_browser_sessions(
    repo: &State<SharedRepository>,
    browser_session_id: Option<String>,
    email: Option<String>,
) -> Result<Json<Vec<BrowserSessionResponse>>, AppError> {
    let filter = BrowserSessionFilter::new(browser_session_id, email);
    let sessions = repo.list_browser_sessions(&filter).await?;
    Ok(Json(sessions.iter().map(BrowserSessionResponse::from).collect()))
}

/// Create a browser session record
#[openapi(tag = "Browser Sessions")]
#[post("/", data = "<payload>")]
pub async fn create_browser_session(
    repo: &State<SharedRepository>,
    payload: Json<BrowserSessionRequest>,
) -> Result<(Status, Json<BrowserSessionResponse>), AppError> {
    payload.validate_for(PayloadMode::Create)?;

    let session = repo.create_browser_session(&payload).await?;
    Ok((Status::Created, Json(BrowserSessionResponse::from(&session))))
}

/// Get a browser session by primary key
#[openapi(tag = "Browser Sessions")]
#[get("/<id>")]
pub async fn get_browser_session(repo: &State<SharedRepository>, id: &str) -> Result<Json<BrowserSessionResponse>, AppError> {
    retrieve(repo, primary_key(id)?).await
}

/// Replace the mutable fields of a browser session addressed by primary key
#[openapi(tag = "Browser Sessions")]
#[put("/<id>", data = "<payload>")]
pub async fn put_browser_session(repo: &State<SharedRepository>, id: &str, payload: Json<BrowserSessionRequest>) -> Result<Json<BrowserSessionResponse>, AppError> {
    update(repo, primary_key(id)?, &payload, PayloadMode::Replace).await
}

/// Partially update a browser session addressed by primary key
#[openapi(tag = "Browser Sessions")]
#[patch("/<id>", data = "<payload>")]
pub async fn patch_browser_session(repo: &State<SharedRepository>, id: &str, payload: Json<BrowserSessionRequest>) -> Result<Json<BrowserSessionResponse>, AppError> {
    update(repo, primary_key(id)?, &payload, PayloadMode::Partial).await
}

/// Delete a browser session by primary key
#[openapi(tag = "Browser Sessions")]
#[delete("/<id>")]
pub async fn delete_browser_session(repo: &State<SharedRepository>, id: &str) -> Result<Status, AppError> {
    destroy(repo, primary_key(id)?).await
}

/// Get a browser session by its browser session id
#[openapi(tag = "Browser Sessions")]
#[get("/browser-session/<browser_session_id>")]
pub async fn get_by_browser_session_id(repo: &State<SharedRepository>, browser_session_id: &str) -> Result<Json<BrowserSessionResponse>, AppError> {
    retrieve(repo, alternate_key(browser_session_id)).await
}

/// Replace the mutable fields of a browser session addressed by its browser session id
#[openapi(tag = "Browser Sessions")]
#[put("/browser-session/<browser_session_id>", data = "<payload>")]
pub async fn put_by_browser_session_id(
    repo: &State<SharedRepository>,
    browser_session_id: &str,
    payload: Json<BrowserSessionRequest>,
) -> Result<Json<BrowserSessionResponse>, AppError> {
    update(repo, alternate_key(browser_session_id), &payload, PayloadMode::Replace).await
}

/// Partially update a browser session addressed by its browser session id
#[openapi(tag = "Browser Sessions")]
#[patch("/browser-session/<browser_session_id>", data = "<payload>")]
pub async fn patch_by_browser_session_id(
    repo: &State<SharedRepository>,
    browser_session_id: &str,
    payload: Json<BrowserSessionRequest>,
) -> Result<Json<BrowserSessionResponse>, AppError> {
    update(repo, alternate_key(browser_session_id), &payload, PayloadMode::Partial).await
}

/// Delete a browser session by its browser session id
#[openapi(tag = "Browser Sessions")]
#[delete("/browser-session/<browser_session_id>")]
pub async fn delete_by_browser_session_id(repo: &State<SharedRepository>, browser_session_id: &str) -> Result<Status, AppError> {
    destroy(repo, alternate_key(browser_session_id)).await
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![
        list_browser_sessions,
        create_browser_session,
        get_browser_session,
        put_browser_session,
        patch_browser_session,
        delete_browser_session,
        get_by_browser_session_id,
        put_by_browser_session_id,
        patch_by_browser_session_id,
        delete_by_browser_session_id
    ]
}

#[cfg(test)]
mod tests {
    use crate::test_utils::memory_client;
    use chrono::Utc;
    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::{Client, LocalResponse};
    use serde_json::{Value, json};

    async fn body_json(response: LocalResponse<'_>) -> Value {
        let body = response.into_string().await.expect("response body");
        serde_json::from_str(&body).expect("json body")
    }

    async fn create(client: &Client, payload: Value) -> Value {
        let response = client
            .post("/api/browser-sessions/")
            .header(ContentType::JSON)
            .body(payload.to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);
        body_json(response).await
    }

    #[rocket::async_test]
    async fn test_browser_session_lifecycle_by_browser_session_id() {
        let client = memory_client().await;
        let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();

        let created = create(&client, json!({ "email": "a@x.com", "browser_session_id": "s1", "session_status": "active" })).await;
        assert_eq!(created["created_at"], today.as_str());
        assert_eq!(created["email"], "a@x.com");

        let response = client.get("/api/browser-sessions/browser-session/s1/").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let fetched = body_json(response).await;
        assert_eq!(fetched, created);

        let response = client
            .patch("/api/browser-sessions/browser-session/s1/")
            .header(ContentType::JSON)
            .body(json!({ "session_status": "expired" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let patched = body_json(response).await;
        assert_eq!(patched["session_status"], "expired");
        assert_eq!(patched["created_at"], created["created_at"]);
        assert_eq!(patched["email"], "a@x.com");

        let response = client.delete("/api/browser-sessions/browser-session/s1/").dispatch().await;
        assert_eq!(response.status(), Status::NoContent);

        let response = client.get("/api/browser-sessions/browser-session/s1/").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
    }

    #[rocket::async_test]
    async fn test_create_then_retrieve_by_primary_key() {
        let client = memory_client().await;
        let created = create(&client, json!({ "email": "pk@x.com", "session_status": "RUNNING" })).await;
        let id = created["id"].as_str().expect("id");

        let response = client.get(format!("/api/browser-sessions/{}/", id)).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let fetched = body_json(response).await;
        assert_eq!(fetched, created);
        assert_eq!(fetched["browser_session_id"], Value::Null);
    }

    #[rocket::async_test]
    async fn test_create_with_invalid_email_is_rejected_and_not_stored() {
        let client = memory_client().await;

        for payload in [json!({ "browser_session_id": "s1" }), json!({ "email": "not-an-email", "browser_session_id": "s1" })] {
            let response = client
                .post("/api/browser-sessions/")
                .header(ContentType::JSON)
                .body(payload.to_string())
                .dispatch()
                .await;
            assert_eq!(response.status(), Status::BadRequest);
            let body = body_json(response).await;
            assert!(body["errors"]["email"].is_array());
        }

        let response = client.get("/api/browser-sessions/").dispatch().await;
        assert_eq!(body_json(response).await, json!([]));
    }

    #[rocket::async_test]
    async fn test_create_with_oversized_session_status_is_rejected() {
        let client = memory_client().await;
        let response = client
            .post("/api/browser-sessions/")
            .header(ContentType::JSON)
            .body(json!({ "email": "a@x.com", "session_status": "x".repeat(201) }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
        let body = body_json(response).await;
        assert!(body["errors"]["session_status"].is_array());
    }

    #[rocket::async_test]
    async fn test_list_filters_by_email_and_browser_session_id() {
        let client = memory_client().await;
        create(&client, json!({ "email": "a@x.com", "browser_session_id": "s1" })).await;
        create(&client, json!({ "email": "b@x.com", "browser_session_id": "s2" })).await;
        create(&client, json!({ "email": "a@x.com", "browser_session_id": "s3" })).await;

        let response = client.get("/api/browser-sessions/?email=a@x.com").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let listed = body_json(response).await;
        let listed = listed.as_array().unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|s| s["email"] == "a@x.com"));

        let response = client.get("/api/browser-sessions/?email=a@x.com&browser_session_id=s3").dispatch().await;
        let listed = body_json(response).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["browser_session_id"], "s3");

        let response = client.get("/api/browser-sessions/?email=nobody@x.com").dispatch().await;
        assert_eq!(body_json(response).await, json!([]));

        let response = client.get("/api/browser-sessions/?email=").dispatch().await;
        assert_eq!(body_json(response).await.as_array().unwrap().len(), 3);
    }

    #[rocket::async_test]
    async fn test_unknown_browser_session_id_is_not_found() {
        let client = memory_client().await;

        let response = client.get("/api/browser-sessions/browser-session/missing/").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);

        let response = client
            .put("/api/browser-sessions/browser-session/missing/")
            .header(ContentType::JSON)
            .body(json!({ "email": "a@x.com" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);

        let response = client
            .patch("/api/browser-sessions/browser-session/missing/")
            .header(ContentType::JSON)
            .body(json!({ "session_status": "x" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);

        let response = client.delete("/api/browser-sessions/browser-session/missing/").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
    }

    #[rocket::async_test]
    async fn test_put_requires_email_and_never_changes_created_at() {
        let client = memory_client().await;
        let created = create(&client, json!({ "email": "a@x.com", "browser_session_id": "s1", "session_status": "active" })).await;

        let response = client
            .put("/api/browser-sessions/browser-session/s1/")
            .header(ContentType::JSON)
            .body(json!({ "session_status": "done" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);

        let response = client
            .put("/api/browser-sessions/browser-session/s1/")
            .header(ContentType::JSON)
            .body(json!({ "email": "b@x.com", "browser_session_id": "s9", "created_at": "2000-01-01" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let replaced = body_json(response).await;
        assert_eq!(replaced["email"], "b@x.com");
        assert_eq!(replaced["browser_session_id"], "s9");
        assert_eq!(replaced["session_status"], "active");
        assert_eq!(replaced["created_at"], created["created_at"]);
        assert_eq!(replaced["id"], created["id"]);
    }

    #[rocket::async_test]
    async fn test_primary_key_routes_update_and_delete() {
        let client = memory_client().await;
        let created = create(&client, json!({ "email": "a@x.com", "browser_session_id": "s1" })).await;
        let path = format!("/api/browser-sessions/{}/", created["id"].as_str().unwrap());

        let response = client
            .patch(path.as_str())
            .header(ContentType::JSON)
            .body(json!({ "browser_session_id": null }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(body_json(response).await["browser_session_id"], Value::Null);

        let response = client.delete(path.as_str()).dispatch().await;
        assert_eq!(response.status(), Status::NoContent);

        let response = client.get(path.as_str()).dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
    }

    #[rocket::async_test]
    async fn test_malformed_primary_key_is_not_found() {
        let client = memory_client().await;

        let response = client.get("/api/browser-sessions/123/").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);

        let response = client.delete("/api/browser-sessions/abc/").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);

        let response = client
            .patch("/api/browser-sessions/abc/")
            .header(ContentType::JSON)
            .body(json!({ "session_status": "x" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);
    }

    #[rocket::async_test]
    async fn test_invalid_payload_for_unknown_key_is_not_found() {
        let client = memory_client().await;

        let response = client
            .put("/api/browser-sessions/browser-session/missing/")
            .header(ContentType::JSON)
            .body(json!({ "email": "bad" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);

        let response = client
            .patch(format!("/api/browser-sessions/{}/", uuid::Uuid::new_v4()))
            .header(ContentType::JSON)
            .body(json!({ "session_status": "x".repeat(201) }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);
    }

    #[rocket::async_test]
    async fn test_invalid_payload_for_ambiguous_key_is_conflict() {
        let client = memory_client().await;
        create(&client, json!({ "email": "a@x.com", "browser_session_id": "dup" })).await;
        create(&client, json!({ "email": "b@x.com", "browser_session_id": "dup" })).await;

        let response = client
            .put("/api/browser-sessions/browser-session/dup/")
            .header(ContentType::JSON)
            .body(json!({ "email": "bad" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Conflict);
    }

    #[rocket::async_test]
    async fn test_trailing_slash_is_optional() {
        let client = memory_client().await;
        create(&client, json!({ "email": "a@x.com", "browser_session_id": "s1" })).await;

        for path in ["/api/browser-sessions/browser-session/s1/", "/api/browser-sessions/browser-session/s1"] {
            assert_eq!(client.get(path).dispatch().await.status(), Status::Ok);
        }
        for path in ["/api/browser-sessions/", "/api/browser-sessions"] {
            assert_eq!(client.get(path).dispatch().await.status(), Status::Ok);
        }
    }

    #[rocket::async_test]
    async fn test_padded_values_are_stored_trimmed() {
        let client = memory_client().await;
        let created = create(&client, json!({ "email": " a@x.com ", "browser_session_id": " s1 ", "session_status": "\tactive\n" })).await;
        assert_eq!(created["email"], "a@x.com");
        assert_eq!(created["browser_session_id"], "s1");
        assert_eq!(created["session_status"], "active");

        let response = client.get("/api/browser-sessions/browser-session/s1/").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
    }

    #[rocket::async_test]
    async fn test_duplicate_browser_session_id_lookup_is_conflict() {
        let client = memory_client().await;
        create(&client, json!({ "email": "a@x.com", "browser_session_id": "dup" })).await;
        create(&client, json!({ "email": "b@x.com", "browser_session_id": "dup" })).await;

        let response = client.get("/api/browser-sessions/browser-session/dup/").dispatch().await;
        assert_eq!(response.status(), Status::Conflict);

        let response = client.delete("/api/browser-sessions/browser-session/dup/").dispatch().await;
        assert_eq!(response.status(), Status::Conflict);

        let response = client.get("/api/browser-sessions/?browser_session_id=dup").dispatch().await;
        assert_eq!(body_json(response).await.as_array().unwrap().len(), 2);
    }

    #[rocket::async_test]
    async fn test_malformed_json_body_is_rejected() {
        let client = memory_client().await;
        let response = client
            .post("/api/browser-sessions/")
            .header(ContentType::JSON)
            .body(r#"{"email": 42}"#)
            .dispatch()
            .await;
        assert!(response.status().class().is_client_error());
    }
}
