//! Unit tests for the Supabase collaborator.
//!
//! Each test starts an in-process axum server that imitates the GoTrue and
//! PostgREST endpoints the collaborator talks to, and records every request
//! so the wire contract can be asserted.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use smartmark::database::Database;
use smartmark::managers::session_manager::SessionManager;
use smartmark::services::backend::BookmarkBackend;
use smartmark::services::crypto_service::pkce_challenge;
use smartmark::services::supabase_backend::SupabaseBackend;
use smartmark::types::bookmark::{BookmarkId, NewBookmark};
use smartmark::types::errors::{AuthError, FetchError};
use smartmark::types::settings::{AppSettings, BackendKind};

const ANON_KEY: &str = "anon-key";
const USER_ID: &str = "user-1";
const GOOD_CODE: &str = "good-code";

#[derive(Debug, Clone)]
struct Recorded {
    method: &'static str,
    path: &'static str,
    query: HashMap<String, String>,
    apikey: Option<String>,
    bearer: Option<String>,
    prefer: Option<String>,
    body: Option<Value>,
}

#[derive(Default)]
struct FakeState {
    requests: Vec<Recorded>,
    valid_access: HashSet<String>,
    refresh_token: Option<String>,
    expected_challenge: Option<String>,
    issued: u32,
    rows: Vec<Value>,
    next_id: i64,
    fail_list: bool,
    fail_logout: bool,
}

type Shared = Arc<Mutex<FakeState>>;

fn header_str(headers: &HeaderMap, name: impl header::AsHeaderName) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    header_str(headers, header::AUTHORIZATION)
        .and_then(|v| v.strip_prefix("Bearer ").map(str::to_string))
}

fn record(
    state: &mut FakeState,
    method: &'static str,
    path: &'static str,
    query: &HashMap<String, String>,
    headers: &HeaderMap,
    body: Option<Value>,
) {
    state.requests.push(Recorded {
        method,
        path,
        query: query.clone(),
        apikey: header_str(headers, "apikey"),
        bearer: bearer(headers),
        prefer: header_str(headers, "prefer"),
        body,
    });
}

fn authorized(state: &FakeState, headers: &HeaderMap) -> bool {
    header_str(headers, "apikey").as_deref() == Some(ANON_KEY)
        && bearer(headers).map_or(false, |t| state.valid_access.contains(&t))
}

fn user_json() -> Value {
    json!({"id": USER_ID, "user_metadata": {"avatar_url": "https://avatars.example/u1.png"}})
}

fn issue_tokens(state: &mut FakeState) -> Value {
    state.issued += 1;
    let access = format!("access-{}", state.issued);
    let refresh = format!("refresh-{}", state.issued);
    state.valid_access.insert(access.clone());
    state.refresh_token = Some(refresh.clone());
    json!({
        "access_token": access,
        "refresh_token": refresh,
        "expires_in": 3600,
        "token_type": "bearer",
        "user": user_json(),
    })
}

async fn get_user(
    State(state): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let mut s = state.lock().unwrap();
    record(&mut s, "GET", "/auth/v1/user", &query, &headers, None);
    if authorized(&s, &headers) {
        Json(user_json()).into_response()
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({"msg": "invalid JWT"}))).into_response()
    }
}

async fn token(
    State(state): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut s = state.lock().unwrap();
    record(&mut s, "POST", "/auth/v1/token", &query, &headers, Some(body.clone()));

    match query.get("grant_type").map(String::as_str) {
        Some("pkce") => {
            let code = body["auth_code"].as_str().unwrap_or_default();
            let verifier = body["code_verifier"].as_str().unwrap_or_default();
            let challenge_ok = s.expected_challenge.as_deref() == Some(pkce_challenge(verifier).as_str());
            if code == GOOD_CODE && challenge_ok {
                Json(issue_tokens(&mut s)).into_response()
            } else {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error": "invalid_grant", "error_description": "invalid flow state"})),
                )
                    .into_response()
            }
        }
        Some("refresh_token") => {
            let presented = body["refresh_token"].as_str().map(str::to_string);
            if presented.is_some() && presented == s.refresh_token {
                Json(issue_tokens(&mut s)).into_response()
            } else {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error_description": "Invalid Refresh Token"})),
                )
                    .into_response()
            }
        }
        _ => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn logout(
    State(state): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let mut s = state.lock().unwrap();
    record(&mut s, "POST", "/auth/v1/logout", &query, &headers, None);
    if s.fail_logout {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"msg": "logout failed"}))).into_response();
    }
    if let Some(token) = bearer(&headers) {
        s.valid_access.remove(&token);
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn list_rows(
    State(state): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let mut s = state.lock().unwrap();
    record(&mut s, "GET", "/rest/v1/bookmarks", &query, &headers, None);
    if !authorized(&s, &headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "JWT expired"}))).into_response();
    }
    if s.fail_list {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"message": "boom"}))).into_response();
    }

    let owner = query.get("user_id").and_then(|v| v.strip_prefix("eq.")).unwrap_or_default();
    let mut rows: Vec<Value> = s
        .rows
        .iter()
        .filter(|r| r["user_id"] == owner)
        .cloned()
        .collect();
    if query.get("order").map(String::as_str) == Some("created_at.desc") {
        rows.sort_by(|a, b| b["created_at"].as_str().cmp(&a["created_at"].as_str()));
    }
    Json(Value::Array(rows)).into_response()
}

async fn insert_rows(
    State(state): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut s = state.lock().unwrap();
    record(&mut s, "POST", "/rest/v1/bookmarks", &query, &headers, Some(body.clone()));
    if !authorized(&s, &headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "JWT expired"}))).into_response();
    }

    let mut created = Vec::new();
    for item in body.as_array().cloned().unwrap_or_default() {
        if item["user_id"] != USER_ID {
            return (
                StatusCode::FORBIDDEN,
                Json(json!({"message": "new row violates row-level security policy"})),
            )
                .into_response();
        }
        s.next_id += 1;
        let mut row = item.clone();
        row["id"] = json!(s.next_id);
        row["created_at"] = json!(format!("2024-01-01T12:00:{:02}.000000+00:00", s.next_id));
        s.rows.push(row.clone());
        created.push(row);
    }
    (StatusCode::CREATED, Json(Value::Array(created))).into_response()
}

async fn delete_rows(
    State(state): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let mut s = state.lock().unwrap();
    record(&mut s, "DELETE", "/rest/v1/bookmarks", &query, &headers, None);
    if !authorized(&s, &headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "JWT expired"}))).into_response();
    }
    let id = query.get("id").and_then(|v| v.strip_prefix("eq.")).unwrap_or_default().to_string();
    s.rows.retain(|r| r["id"].to_string() != id);
    StatusCode::NO_CONTENT.into_response()
}

async fn spawn_fake(state: Shared) -> String {
    let app = Router::new()
        .route("/auth/v1/user", get(get_user))
        .route("/auth/v1/token", post(token))
        .route("/auth/v1/logout", post(logout))
        .route("/rest/v1/bookmarks", get(list_rows).post(insert_rows).delete(delete_rows))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn setup() -> (SupabaseBackend, Shared) {
    let state: Shared = Arc::new(Mutex::new(FakeState::default()));
    let base = spawn_fake(state.clone()).await;

    let mut settings = AppSettings::default();
    settings.backend.kind = BackendKind::Supabase;
    settings.backend.supabase_url = base;
    settings.backend.anon_key = ANON_KEY.to_string();

    let db = Arc::new(Database::open_in_memory().unwrap());
    let sessions = SessionManager::ephemeral(db).unwrap();
    (SupabaseBackend::new(&settings, sessions).unwrap(), state)
}

/// Runs the redirect half of the flow and hands the fake the PKCE challenge.
async fn start_login(backend: &SupabaseBackend, state: &Shared) -> reqwest::Url {
    let redirect = backend.sign_in_with_oauth("google").await.unwrap();
    let url = reqwest::Url::parse(&redirect.url).unwrap();
    let challenge = url
        .query_pairs()
        .find(|(k, _)| k == "code_challenge")
        .map(|(_, v)| v.into_owned());
    state.lock().unwrap().expected_challenge = challenge;
    url
}

async fn signed_in() -> (SupabaseBackend, Shared) {
    let (backend, state) = setup().await;
    start_login(&backend, &state).await;
    backend.complete_oauth(GOOD_CODE).await.unwrap();
    (backend, state)
}

fn requests_to(state: &Shared, method: &str, path: &str) -> Vec<Recorded> {
    state
        .lock()
        .unwrap()
        .requests
        .iter()
        .filter(|r| r.method == method && r.path == path)
        .cloned()
        .collect()
}

fn new_bookmark(title: &str) -> NewBookmark {
    NewBookmark {
        title: title.to_string(),
        url: format!("https://{}.example", title.to_lowercase()),
        user_id: USER_ID.to_string(),
    }
}

// ─── Auth ───

#[tokio::test]
async fn test_authorize_url_carries_pkce_parameters() {
    let (backend, state) = setup().await;
    let url = start_login(&backend, &state).await;

    assert_eq!(url.path(), "/auth/v1/authorize");
    let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
    assert_eq!(params["provider"], "google");
    assert_eq!(params["redirect_to"], "http://localhost:3000");
    assert_eq!(params["code_challenge_method"], "s256");
    assert_eq!(params["code_challenge"].len(), 43);
    // No request is made until the provider redirects back.
    assert!(state.lock().unwrap().requests.is_empty());
}

#[tokio::test]
async fn test_complete_oauth_exchanges_code_with_verifier() {
    let (backend, state) = setup().await;
    start_login(&backend, &state).await;

    let identity = backend.complete_oauth(GOOD_CODE).await.unwrap();
    assert_eq!(identity.id, USER_ID);
    assert_eq!(identity.avatar_url.as_deref(), Some("https://avatars.example/u1.png"));

    let grants = requests_to(&state, "POST", "/auth/v1/token");
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].query["grant_type"], "pkce");
    assert_eq!(grants[0].apikey.as_deref(), Some(ANON_KEY));
    let body = grants[0].body.as_ref().unwrap();
    assert_eq!(body["auth_code"], GOOD_CODE);
    assert_eq!(body["code_verifier"].as_str().unwrap().len(), 43);
}

#[tokio::test]
async fn test_bad_code_is_denied() {
    let (backend, state) = setup().await;
    start_login(&backend, &state).await;

    let result = backend.complete_oauth("bad-code").await;
    assert!(matches!(result, Err(AuthError::Denied(ref m)) if m == "invalid flow state"));
    assert!(backend.get_session().await.unwrap().is_none());
}

#[tokio::test]
async fn test_complete_without_login_is_denied() {
    let (backend, state) = setup().await;
    assert!(matches!(backend.complete_oauth(GOOD_CODE).await, Err(AuthError::Denied(_))));
    assert!(requests_to(&state, "POST", "/auth/v1/token").is_empty());
}

#[tokio::test]
async fn test_get_session_without_stored_session_makes_no_request() {
    let (backend, state) = setup().await;
    assert!(backend.get_session().await.unwrap().is_none());
    assert!(state.lock().unwrap().requests.is_empty());
}

#[tokio::test]
async fn test_get_session_looks_up_user_with_bearer() {
    let (backend, state) = signed_in().await;

    let identity = backend.get_session().await.unwrap().unwrap();
    assert_eq!(identity.id, USER_ID);

    let lookups = requests_to(&state, "GET", "/auth/v1/user");
    assert_eq!(lookups.len(), 1);
    assert_eq!(lookups[0].bearer.as_deref(), Some("access-1"));
    assert_eq!(lookups[0].apikey.as_deref(), Some(ANON_KEY));
}

#[tokio::test]
async fn test_revoked_access_token_is_refreshed_once() {
    let (backend, state) = signed_in().await;
    state.lock().unwrap().valid_access.clear();

    let identity = backend.get_session().await.unwrap().unwrap();
    assert_eq!(identity.id, USER_ID);

    let grants = requests_to(&state, "POST", "/auth/v1/token");
    assert_eq!(grants.last().unwrap().query["grant_type"], "refresh_token");
    assert_eq!(grants.last().unwrap().body.as_ref().unwrap()["refresh_token"], "refresh-1");

    let lookups = requests_to(&state, "GET", "/auth/v1/user");
    assert_eq!(lookups.len(), 2);
    assert_eq!(lookups[1].bearer.as_deref(), Some("access-2"));
}

#[tokio::test]
async fn test_rejected_refresh_signs_out_locally() {
    let (backend, state) = signed_in().await;
    {
        let mut s = state.lock().unwrap();
        s.valid_access.clear();
        s.refresh_token = None;
    }

    assert!(backend.get_session().await.unwrap().is_none());
    // The stored session is gone: no further lookups.
    let before = state.lock().unwrap().requests.len();
    assert!(backend.get_session().await.unwrap().is_none());
    assert_eq!(state.lock().unwrap().requests.len(), before);
}

#[tokio::test]
async fn test_sign_out_posts_logout_and_clears_session() {
    let (backend, state) = signed_in().await;
    backend.sign_out().await.unwrap();

    let logouts = requests_to(&state, "POST", "/auth/v1/logout");
    assert_eq!(logouts.len(), 1);
    assert_eq!(logouts[0].bearer.as_deref(), Some("access-1"));
    assert!(backend.get_session().await.unwrap().is_none());
}

#[tokio::test]
async fn test_failed_sign_out_still_clears_session() {
    let (backend, state) = signed_in().await;
    state.lock().unwrap().fail_logout = true;

    assert!(matches!(backend.sign_out().await, Err(AuthError::SignOut(ref m)) if m == "logout failed"));
    assert!(backend.get_session().await.unwrap().is_none());
}

// ─── Bookmarks ───

#[tokio::test]
async fn test_insert_requests_representation() {
    let (backend, state) = signed_in().await;

    let created = backend.insert_bookmark(&new_bookmark("Rust")).await.unwrap();
    assert_eq!(created.id, BookmarkId::from("1"));
    assert_eq!(created.title, "Rust");
    assert_eq!(created.user_id, USER_ID);

    let inserts = requests_to(&state, "POST", "/rest/v1/bookmarks");
    assert_eq!(inserts[0].prefer.as_deref(), Some("return=representation"));
    assert_eq!(inserts[0].bearer.as_deref(), Some("access-1"));
    assert_eq!(
        inserts[0].body,
        Some(json!([{"title": "Rust", "url": "https://rust.example", "user_id": USER_ID}]))
    );
}

#[tokio::test]
async fn test_list_filters_by_owner_newest_first() {
    let (backend, state) = signed_in().await;
    backend.insert_bookmark(&new_bookmark("Older")).await.unwrap();
    backend.insert_bookmark(&new_bookmark("Newer")).await.unwrap();

    let listed = backend.list_bookmarks(USER_ID).await.unwrap();
    let titles: Vec<&str> = listed.iter().map(|b| b.title.as_str()).collect();
    assert_eq!(titles, vec!["Newer", "Older"]);
    assert!(listed[0].created_at > listed[1].created_at);

    let lists = requests_to(&state, "GET", "/rest/v1/bookmarks");
    assert_eq!(lists[0].query["select"], "*");
    assert_eq!(lists[0].query["user_id"], format!("eq.{}", USER_ID));
    assert_eq!(lists[0].query["order"], "created_at.desc");
}

#[tokio::test]
async fn test_row_policy_rejection_surfaces_as_write_error() {
    let (backend, _state) = signed_in().await;
    let mut foreign = new_bookmark("Rust");
    foreign.user_id = "someone-else".to_string();

    let err = backend.insert_bookmark(&foreign).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Bookmark write rejected (403): new row violates row-level security policy"
    );
}

#[tokio::test]
async fn test_delete_by_id_twice() {
    let (backend, state) = signed_in().await;
    let created = backend.insert_bookmark(&new_bookmark("Gone")).await.unwrap();

    backend.delete_bookmark(&created.id).await.unwrap();
    backend.delete_bookmark(&created.id).await.unwrap();
    assert!(backend.list_bookmarks(USER_ID).await.unwrap().is_empty());

    let deletes = requests_to(&state, "DELETE", "/rest/v1/bookmarks");
    assert_eq!(deletes.len(), 2);
    assert_eq!(deletes[0].query["id"], "eq.1");
}

#[tokio::test]
async fn test_server_error_on_list() {
    let (backend, state) = signed_in().await;
    state.lock().unwrap().fail_list = true;

    let err = backend.list_bookmarks(USER_ID).await.unwrap_err();
    assert!(matches!(err, FetchError::Rejected { status: 500, ref message } if message == "boom"));
}

#[tokio::test]
async fn test_revoked_token_on_list_is_refreshed_and_retried() {
    let (backend, state) = signed_in().await;
    backend.insert_bookmark(&new_bookmark("Kept")).await.unwrap();
    state.lock().unwrap().valid_access.clear();

    let listed = backend.list_bookmarks(USER_ID).await.unwrap();
    assert_eq!(listed.len(), 1);

    let lists = requests_to(&state, "GET", "/rest/v1/bookmarks");
    assert_eq!(lists.len(), 2);
    assert_eq!(lists[0].bearer.as_deref(), Some("access-1"));
    assert_eq!(lists[1].bearer.as_deref(), Some("access-2"));
    let grants = requests_to(&state, "POST", "/auth/v1/token");
    assert_eq!(grants.last().unwrap().query["grant_type"], "refresh_token");
}

#[tokio::test]
async fn test_revoked_token_on_insert_and_delete_is_refreshed() {
    let (backend, state) = signed_in().await;
    state.lock().unwrap().valid_access.clear();
    let created = backend.insert_bookmark(&new_bookmark("Rust")).await.unwrap();
    assert_eq!(created.title, "Rust");

    state.lock().unwrap().valid_access.clear();
    backend.delete_bookmark(&created.id).await.unwrap();

    let deletes = requests_to(&state, "DELETE", "/rest/v1/bookmarks");
    assert_eq!(deletes.len(), 2);
    assert_eq!(deletes[1].bearer.as_deref(), Some("access-3"));
    assert!(state.lock().unwrap().rows.is_empty());
}

#[tokio::test]
async fn test_revoked_token_with_rejected_refresh_is_not_authenticated() {
    let (backend, state) = signed_in().await;
    {
        let mut s = state.lock().unwrap();
        s.valid_access.clear();
        s.refresh_token = None;
    }

    assert!(matches!(
        backend.list_bookmarks(USER_ID).await,
        Err(FetchError::NotAuthenticated)
    ));
    assert_eq!(requests_to(&state, "GET", "/rest/v1/bookmarks").len(), 1);
    assert!(backend.get_session().await.unwrap().is_none());
}

#[tokio::test]
async fn test_bookmark_calls_without_session_make_no_request() {
    let (backend, state) = setup().await;
    assert!(matches!(
        backend.list_bookmarks(USER_ID).await,
        Err(FetchError::NotAuthenticated)
    ));
    assert!(backend.insert_bookmark(&new_bookmark("Rust")).await.is_err());
    assert!(state.lock().unwrap().requests.is_empty());
}
