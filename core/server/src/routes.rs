//! JSON API routes.
//!
//! Handlers authenticate, normalize user paths, and delegate to the action
//! layer. Adapter and index failures surface as status payloads with the
//! matching HTTP status code, never as unhandled faults.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, DefaultBodyLimit, FromRequestParts, Multipart, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use http::request::Parts;
use http::{header, HeaderMap, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use vaultview_adapter::ByteStream;
use vaultview_common::{DirEntry, Error, Passphrase, VaultPath};
use vaultview_index::TreeNode;
use vaultview_session::{Session, SessionData};

use crate::actions;
use crate::state::AppState;

const SESSION_COOKIE: &str = "session";

/// Error wrapper that renders as `{"error": ...}` with a mapped status.
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::AlreadyExists(_) => StatusCode::CONFLICT,
            Error::InvalidPath(_) => StatusCode::BAD_REQUEST,
            Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Error::MountFailure(_) => StatusCode::BAD_GATEWAY,
            Error::AdapterUnavailable(_) => StatusCode::NOT_IMPLEMENTED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!(status = %status, error = %self.0, "request failed");
        }
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

/// The authenticated session, extracted from the signed cookie.
///
/// A missing, forged, or expired cookie is "not logged in", which clients
/// treat as a redirect to login.
pub struct CurrentSession(pub Arc<Session>);

impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_cookie(&parts.headers).ok_or(ApiError(Error::Unauthenticated))?;
        let session = state
            .sessions
            .get(&token)
            .ok_or(ApiError(Error::Unauthenticated))?;
        Ok(Self(session))
    }
}

#[derive(Debug, Deserialize)]
struct PathQuery {
    path: Option<String>,
}

impl PathQuery {
    fn normalized(&self) -> Result<VaultPath, Error> {
        VaultPath::parse(self.path.as_deref().unwrap_or("/"))
    }
}

#[derive(Deserialize)]
struct LoginForm {
    vault_id: String,
    passphrase: String,
}

#[derive(Debug, Deserialize)]
struct MkdirForm {
    folder_name: String,
}

#[derive(Debug, Deserialize)]
struct TransferForm {
    source_path: String,
    destination_dir: String,
}

#[derive(Debug, Deserialize)]
struct DeleteRequest {
    paths: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ListResponse {
    path: String,
    entries: Vec<DirEntry>,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    vault_id: String,
}

async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    if !state.limiter.allow(&addr.ip().to_string()) {
        return Err(Error::RateLimited.into());
    }

    let vault = state
        .config
        .vault(&form.vault_id)
        .ok_or_else(|| Error::NotFound(format!("unknown vault: {}", form.vault_id)))?
        .clone();
    let passphrase = Passphrase::new(form.passphrase);

    let index = actions::validate_login(&state, &vault, &passphrase).await?;

    let session = state.sessions.create(SessionData {
        vault_id: vault.id.clone(),
        vault_path: vault.path.clone(),
        passphrase,
        index,
    });
    info!(vault = %vault.id, "login succeeded");

    let token = state.sessions.sign(session.id());
    let mut response = Json(LoginResponse {
        vault_id: vault.id.to_string(),
    })
    .into_response();
    response
        .headers_mut()
        .insert(header::SET_COOKIE, session_cookie_value(&state, &token)?);
    Ok(response)
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    if let Some(token) = session_cookie(&headers) {
        if let Some(session) = state.sessions.get(&token) {
            state.sessions.destroy(session.id());
        }
    }
    let mut response = Json(StatusResponse { status: "ok" }).into_response();
    response.headers_mut().insert(
        header::SET_COOKIE,
        HeaderValue::from_static("session=; Path=/; HttpOnly; Max-Age=0"),
    );
    Ok(response)
}

async fn list(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Query(query): Query<PathQuery>,
) -> Result<Json<ListResponse>, ApiError> {
    let path = query.normalized()?;
    let entries = actions::list_entries(&state, &session, &path).await?;
    Ok(Json(ListResponse {
        path: path.to_string(),
        entries,
    }))
}

async fn tree(
    CurrentSession(session): CurrentSession,
) -> Json<Option<TreeNode>> {
    Json(actions::navigation_tree(&session))
}

async fn upload_file(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Query(query): Query<PathQuery>,
    mut multipart: Multipart,
) -> Result<Json<StatusResponse>, ApiError> {
    let path = query.normalized()?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let data = field.bytes().await.map_err(multipart_error)?;
        let stream: ByteStream =
            Box::pin(futures::stream::once(async move { Ok(data.to_vec()) }));
        actions::upload(&state, &session, &path, &filename, stream).await?;
        return Ok(Json(StatusResponse {
            status: "Upload complete",
        }));
    }
    Err(Error::InvalidPath("No file uploaded".to_string()).into())
}

async fn mkdir(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Query(query): Query<PathQuery>,
    Form(form): Form<MkdirForm>,
) -> Result<Json<StatusResponse>, ApiError> {
    let path = query.normalized()?;
    let folder_name = form.folder_name.trim();
    if folder_name.is_empty() {
        return Err(Error::InvalidPath("Folder name is required".to_string()).into());
    }
    actions::make_dir(&state, &session, &path, folder_name).await?;
    Ok(Json(StatusResponse {
        status: "Folder created",
    }))
}

async fn move_item(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Query(query): Query<PathQuery>,
    Form(form): Form<TransferForm>,
) -> Result<Json<StatusResponse>, ApiError> {
    let (source, dest_dir) = transfer_paths(&query, &form)?;
    actions::move_entry(&state, &session, &source, &dest_dir).await?;
    Ok(Json(StatusResponse { status: "Moved" }))
}

async fn copy_item(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Query(query): Query<PathQuery>,
    Form(form): Form<TransferForm>,
) -> Result<Json<StatusResponse>, ApiError> {
    let (source, dest_dir) = transfer_paths(&query, &form)?;
    actions::copy_entry(&state, &session, &source, &dest_dir).await?;
    Ok(Json(StatusResponse { status: "Copied" }))
}

async fn delete_batch(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Json(request): Json<DeleteRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let paths = request
        .paths
        .iter()
        .map(|raw| VaultPath::parse(raw))
        .collect::<Result<Vec<_>, _>>()?;
    actions::delete_entries(&state, &session, &paths).await?;
    Ok(Json(StatusResponse { status: "Deleted" }))
}

async fn download_file(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Query(query): Query<PathQuery>,
) -> Result<Response, ApiError> {
    let path = query.normalized()?;
    let (name, data) = actions::download(&state, &session, &path).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    let disposition = format!("attachment; filename=\"{}\"", name.replace('"', "_"));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition)
            .map_err(|_| Error::InvalidPath(format!("unencodable file name: {name}")))?,
    );
    Ok((headers, data).into_response())
}

/// Resolve the transfer form against the current browse path. Relative
/// inputs are joined below the current directory before normalization.
fn transfer_paths(
    query: &PathQuery,
    form: &TransferForm,
) -> Result<(VaultPath, VaultPath), ApiError> {
    let current = query.normalized()?;
    let source_input = form.source_path.trim();
    let dest_input = form.destination_dir.trim();
    if source_input.is_empty() || dest_input.is_empty() {
        return Err(Error::InvalidPath("Source and destination are required".to_string()).into());
    }
    let source = VaultPath::resolve(&current, source_input)?;
    let dest_dir = VaultPath::resolve(&current, dest_input)?;
    Ok((source, dest_dir))
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError(Error::Io(std::io::Error::other(err)))
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').map(str::trim).find_map(|pair| {
        pair.strip_prefix(SESSION_COOKIE)
            .and_then(|rest| rest.strip_prefix('='))
            .map(str::to_string)
    })
}

fn session_cookie_value(state: &AppState, token: &str) -> Result<HeaderValue, Error> {
    let mut cookie = format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly");
    if state.config.cookie_secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
        .map_err(|_| Error::Serialization("session token is not header-safe".to_string()))
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/api/v1/fs/list", get(list))
        .route("/api/v1/fs/tree", get(tree))
        .route("/api/v1/fs/upload", post(upload_file))
        .route("/api/v1/fs/mkdir", post(mkdir))
        .route("/api/v1/fs/move", post(move_item))
        .route("/api/v1/fs/copy", post(copy_item))
        .route("/api/v1/fs/delete", post(delete_batch))
        .route("/download", get(download_file))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Bind and run the service.
pub async fn serve(state: AppState, addr: SocketAddr) -> vaultview_common::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_is_parsed_from_the_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=abc.def; other=1"),
        );
        assert_eq!(session_cookie(&headers), Some("abc.def".to_string()));

        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark"));
        assert_eq!(session_cookie(&headers), None);
        assert_eq!(session_cookie(&HeaderMap::new()), None);
    }

    #[test]
    fn error_mapping_matches_the_taxonomy() {
        let cases = [
            (Error::NotFound("x".into()), StatusCode::NOT_FOUND),
            (Error::AlreadyExists("x".into()), StatusCode::CONFLICT),
            (Error::InvalidPath("x".into()), StatusCode::BAD_REQUEST),
            (Error::Unauthenticated, StatusCode::UNAUTHORIZED),
            (Error::RateLimited, StatusCode::TOO_MANY_REQUESTS),
            (Error::MountFailure("x".into()), StatusCode::BAD_GATEWAY),
            (
                Error::AdapterUnavailable("x".into()),
                StatusCode::NOT_IMPLEMENTED,
            ),
            (Error::Config("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            let response = ApiError(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[test]
    fn transfer_paths_resolve_relative_inputs() {
        let query = PathQuery {
            path: Some("/docs".into()),
        };
        let form = TransferForm {
            source_path: "a.txt".into(),
            destination_dir: "/archive".into(),
        };
        let (source, dest) = transfer_paths(&query, &form).unwrap();
        assert_eq!(source.to_string(), "/docs/a.txt");
        assert_eq!(dest.to_string(), "/archive");

        let escaping = TransferForm {
            source_path: "../outside".into(),
            destination_dir: "/archive".into(),
        };
        assert!(transfer_paths(&query, &escaping).is_err());
    }
}
