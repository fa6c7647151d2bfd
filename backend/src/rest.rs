use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::Value;
use shared::{
    ClearExpensesResponse, CreateExpenseResponse, DeleteExpenseResponse, ErrorResponse,
    UploadResponse,
};
use tower_http::services::{ServeDir, ServeFile};
use tracing::info;

use crate::domain::ExpenseService;
use crate::extract::ExtractionClient;
use crate::upload::{self, UploadError};

// Receipt photos can be large; cap multipart bodies at 10MB.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Application state shared across handlers. Every collaborator is
/// constructed at process start and injected here.
#[derive(Clone)]
pub struct AppState {
    pub expenses: ExpenseService,
    pub extraction: Option<Arc<ExtractionClient>>,
    pub upload_dir: PathBuf,
}

impl AppState {
    pub fn new(
        expenses: ExpenseService,
        extraction: Option<Arc<ExtractionClient>>,
        upload_dir: PathBuf,
    ) -> Self {
        Self {
            expenses,
            extraction,
            upload_dir,
        }
    }
}

/// Assemble the application router: the API surface, stored receipt serving,
/// and the SPA entry document for every other path so client-side routing
/// keeps working.
pub fn router(state: AppState, static_dir: &FsPath) -> Router {
    let spa = ServeDir::new(static_dir)
        .not_found_service(ServeFile::new(static_dir.join("index.html")));

    Router::new()
        .route(
            "/expenses",
            get(list_expenses).post(create_expense).delete(clear_expenses),
        )
        .route("/expenses/:id", delete(delete_expense))
        .route("/upload", post(upload_receipt))
        .route("/extract-details", post(extract_details))
        .nest_service("/uploads", ServeDir::new(&state.upload_dir))
        .fallback_service(spa)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// Axum handler function for GET /expenses
pub async fn list_expenses(State(state): State<AppState>) -> impl IntoResponse {
    info!("GET /expenses");

    match state.expenses.list_expenses().await {
        Ok(expenses) => (StatusCode::OK, Json(expenses)).into_response(),
        Err(e) => {
            tracing::error!("Error listing expenses: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Error listing expenses")),
            )
                .into_response()
        }
    }
}

/// Axum handler function for POST /expenses
pub async fn create_expense(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    info!("POST /expenses");

    match state.expenses.create_expense(&payload).await {
        Ok(id) => (
            StatusCode::CREATED,
            Json(CreateExpenseResponse {
                status: "success".to_string(),
                id,
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Error creating expense: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to store expense")),
            )
                .into_response()
        }
    }
}

/// Axum handler function for DELETE /expenses/:id
pub async fn delete_expense(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    info!("DELETE /expenses/{}", id);

    match state.expenses.delete_expense(id).await {
        Ok(true) => (
            StatusCode::OK,
            Json(DeleteExpenseResponse {
                status: "success".to_string(),
            }),
        )
            .into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Expense not found")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Error deleting expense {}: {:?}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to delete expense")),
            )
                .into_response()
        }
    }
}

/// Axum handler function for DELETE /expenses (clear all)
pub async fn clear_expenses(State(state): State<AppState>) -> impl IntoResponse {
    info!("DELETE /expenses");

    match state.expenses.clear_expenses().await {
        Ok(deleted) => (
            StatusCode::OK,
            Json(ClearExpensesResponse {
                status: "success".to_string(),
                deleted,
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Error clearing expenses: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to clear expenses")),
            )
                .into_response()
        }
    }
}

/// Axum handler function for POST /upload (multipart, "receipt" file part)
pub async fn upload_receipt(
    State(state): State<AppState>,
    multipart: Multipart,
) -> impl IntoResponse {
    info!("POST /upload");

    let part = match receipt_part(multipart).await {
        Ok(Some(part)) => part,
        Ok(None) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("No file part")),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("Error reading upload body: {:?}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("Malformed upload body")),
            )
                .into_response();
        }
    };

    if part.filename.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("No selected file")),
        )
            .into_response();
    }

    match upload::store_receipt(&state.upload_dir, &part.filename, &part.bytes).await {
        Ok(file_path) => (StatusCode::OK, Json(UploadResponse { file_path })).into_response(),
        Err(e @ (UploadError::EmptyFile | UploadError::EmptyFilename)) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(e.to_string())),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Error storing receipt: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to store file")),
            )
                .into_response()
        }
    }
}

/// Axum handler function for POST /extract-details (multipart, "receipt" part)
pub async fn extract_details(
    State(state): State<AppState>,
    multipart: Multipart,
) -> impl IntoResponse {
    info!("POST /extract-details");

    let Some(client) = state.extraction.clone() else {
        tracing::error!("Extraction requested but no API credential is configured");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("AI extraction is not configured")),
        )
            .into_response();
    };

    let part = match receipt_part(multipart).await {
        Ok(Some(part)) => part,
        Ok(None) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("No image provided for extraction")),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("Error reading extraction body: {:?}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("Malformed upload body")),
            )
                .into_response();
        }
    };

    match client.extract(&part.bytes).await {
        Ok(extracted) => (StatusCode::OK, Json(extracted)).into_response(),
        Err(e) => {
            tracing::error!("AI extraction failed ({}): {}", e.kind(), e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(format!(
                    "AI extraction failed. Server error: {}",
                    e
                ))),
            )
                .into_response()
        }
    }
}

/// A file part pulled out of a multipart body.
struct ReceiptPart {
    filename: String,
    bytes: axum::body::Bytes,
}

/// Find the "receipt" file part, if the body has one.
async fn receipt_part(mut multipart: Multipart) -> Result<Option<ReceiptPart>, MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("receipt") {
            let filename = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await?;
            return Ok(Some(ReceiptPart { filename, bytes }));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use tower::ServiceExt;

    /// Router backed by a unique in-memory database and a temp upload dir.
    /// The TempDir guard must stay alive for the duration of the test.
    async fn setup_test_app() -> (Router, tempfile::TempDir) {
        let db = Database::init_test().await.expect("Failed to create test database");
        let expenses = ExpenseService::new(db);

        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let upload_dir = dir.path().join("uploads");
        let static_dir = dir.path().join("dist");
        std::fs::create_dir_all(&upload_dir).unwrap();
        std::fs::create_dir_all(&static_dir).unwrap();
        std::fs::write(static_dir.join("index.html"), "<html>spa entry</html>").unwrap();

        let state = AppState::new(expenses, None, upload_dir);
        (router(state, &static_dir), dir)
    }

    async fn response_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn multipart_request(uri: &str, filename: &str, bytes: &[u8]) -> Request<Body> {
        let boundary = "test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"receipt\"; \
                 filename=\"{filename}\"\r\nContent-Type: image/jpeg\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_list_expenses() {
        let (app, _guard) = setup_test_app().await;

        let payload = r#"{
            "Date": "2025-08-01",
            "Expense_Name": "Taxi Nana",
            "Amount": 120.5,
            "Currency": "THB",
            "Paid_By": "Me",
            "Category": ["Food", "Transport"],
            "locations": [{"label": "Bangkok"}],
            "Status": "Submitted"
        }"#;

        let response = app
            .clone()
            .oneshot(json_request("POST", "/expenses", payload))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = response_json(response).await;
        assert_eq!(created["status"], "success");
        let id = created["id"].as_i64().unwrap();
        assert!(id > 0);

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/expenses").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let listed = response_json(response).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["id"], id);
        assert_eq!(listed[0]["expense_name"], "Taxi Nana");
        assert_eq!(listed[0]["category"], "Food, Transport");
        assert_eq!(listed[0]["locations"][0]["label"], "Bangkok");
    }

    #[tokio::test]
    async fn test_create_with_empty_body_is_a_client_error() {
        let (app, _guard) = setup_test_app().await;

        let response = app
            .oneshot(json_request("POST", "/expenses", ""))
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_delete_expense_and_not_found_on_second_delete() {
        let (app, _guard) = setup_test_app().await;

        let response = app
            .clone()
            .oneshot(json_request("POST", "/expenses", r#"{"Expense_Name": "target"}"#))
            .await
            .unwrap();
        let id = response_json(response).await["id"].as_i64().unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/expenses/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Deleting the same id again is "not found", not a server error
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/expenses/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = response_json(response).await;
        assert_eq!(body["error"], "Expense not found");
    }

    #[tokio::test]
    async fn test_clear_expenses_reports_count_and_empties_table() {
        let (app, _guard) = setup_test_app().await;

        for name in ["a", "b"] {
            app.clone()
                .oneshot(json_request(
                    "POST",
                    "/expenses",
                    &format!(r#"{{"Expense_Name": "{name}"}}"#),
                ))
                .await
                .unwrap();
        }

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/expenses")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_json(response).await["deleted"], 2);

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/expenses").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let listed = response_json(response).await;
        assert!(listed.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_stores_file_and_returns_path() {
        let (app, guard) = setup_test_app().await;

        let response = app
            .oneshot(multipart_request("/upload", "receipt.jpg", b"image bytes"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response_json(response).await;
        let file_path = body["filePath"].as_str().unwrap();
        assert!(file_path.starts_with("/uploads/"));

        let stored_name = file_path.trim_start_matches("/uploads/");
        let stored = std::fs::read(guard.path().join("uploads").join(stored_name)).unwrap();
        assert_eq!(stored, b"image bytes");
    }

    #[tokio::test]
    async fn test_upload_empty_file_is_rejected_and_writes_nothing() {
        let (app, guard) = setup_test_app().await;

        let response = app
            .oneshot(multipart_request("/upload", "receipt.jpg", b""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let uploads = guard.path().join("uploads");
        assert_eq!(std::fs::read_dir(uploads).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_upload_without_file_part_is_rejected() {
        let (app, _guard) = setup_test_app().await;

        let boundary = "test-boundary";
        let body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nvalue\r\n--{boundary}--\r\n"
        );
        let request = Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = response_json(response).await;
        assert_eq!(body["error"], "No file part");
    }

    #[tokio::test]
    async fn test_extract_details_unconfigured_reports_structured_error() {
        let (app, _guard) = setup_test_app().await;

        let response = app
            .clone()
            .oneshot(multipart_request("/extract-details", "receipt.jpg", b"image"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = response_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("not configured"));

        // The process stays healthy for subsequent requests
        let response = app
            .oneshot(Request::builder().uri("/expenses").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unmatched_paths_serve_the_spa_entry() {
        let (app, _guard) = setup_test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/some/client/route")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"<html>spa entry</html>");
    }
}
