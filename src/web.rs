//
// web.rs
// Lab-Deidentify-rs
//
// Axum-based HTTP server exposing upload, dataset info, deidentification, and download APIs.
//
// Thales Matheus Mendonça Santos - October 2026

use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::{
    anonymize::{self, DeidentifyOptions},
    dataset,
    models::DatasetInfo,
    storage::FileStore,
};

const UPLOAD_DIR: &str = "target/uploads";
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Clone)]
struct AppState {
    store: FileStore,
    options: DeidentifyOptions,
}

type ApiResult<T> = Result<T, (StatusCode, String)>;

/// Bootstraps the Axum HTTP server and wires up API routes. Stored exports
/// and derived files older than `retention` are deleted in the background.
pub async fn start_server(
    host: &str,
    port: u16,
    options: DeidentifyOptions,
    retention: Duration,
) -> anyhow::Result<()> {
    let store = FileStore::new(UPLOAD_DIR)?;
    tokio::spawn(sweep_uploads(store.clone(), retention));

    let app = router(AppState { store, options });

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!(%addr, ?retention, "server listening");
    println!("Server running at http://{}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn sweep_uploads(store: FileStore, retention: Duration) {
    let period = SWEEP_INTERVAL.min(retention).max(Duration::from_secs(1));
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        let store = store.clone();
        match tokio::task::spawn_blocking(move || store.purge_older_than(retention)).await {
            Ok(Ok(0)) => {}
            Ok(Ok(removed)) => info!(removed, "expired uploads deleted"),
            Ok(Err(err)) => warn!("upload sweep failed: {:#}", err),
            Err(err) => warn!("upload sweep task failed: {}", err),
        }
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/api/upload", post(upload_handler))
        .route("/api/info/:filename", get(info_handler))
        .route("/api/deidentify/:filename", post(deidentify_handler))
        .route("/api/download/:filename", get(download_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

async fn root_handler() -> Html<&'static str> {
    Html(include_str!("templates/index.html"))
}

async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(reject(StatusCode::BAD_REQUEST))?
    {
        if field.name() == Some("file") {
            let name = field.file_name().map(str::to_string);
            let bytes = field.bytes().await.map_err(reject(StatusCode::BAD_REQUEST))?;
            upload = Some((name, bytes));
            break;
        }
    }
    let (original_name, data) =
        upload.ok_or((StatusCode::BAD_REQUEST, "No file uploaded".to_string()))?;

    let store = state.store.clone();
    let saved_name = blocking(move || store.save(original_name.as_deref(), &data))
        .await
        .map_err(reject(StatusCode::INTERNAL_SERVER_ERROR))?;

    // A malformed export is reported at upload time.
    let path = state
        .store
        .resolve(&saved_name)
        .map_err(reject(StatusCode::INTERNAL_SERVER_ERROR))?;
    let info = read_info(path, &state.options)
        .await
        .map_err(reject(StatusCode::BAD_REQUEST))?;

    Ok(Json(json!({
        "success": true,
        "filename": saved_name,
        "info": info
    })))
}

async fn info_handler(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Json<DatasetInfo>> {
    let path = state
        .store
        .resolve(&filename)
        .map_err(reject(StatusCode::NOT_FOUND))?;
    let info = read_info(path, &state.options)
        .await
        .map_err(reject(StatusCode::BAD_REQUEST))?;
    Ok(Json(info))
}

async fn deidentify_handler(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Json<Value>> {
    let path = state
        .store
        .resolve(&filename)
        .map_err(reject(StatusCode::NOT_FOUND))?;
    let (data_name, data_path) = state.store.derived_path(&filename, "anonymized", "csv");
    let (mappings_name, mappings_path) = state.store.derived_path(&filename, "mappings", "json");

    // Each request gets its own tables; nothing is shared between uploads.
    let options = state.options.clone();
    let summary = blocking(move || {
        Ok(anonymize::process_file(
            &path,
            &data_path,
            &mappings_path,
            &options,
        )?)
    })
    .await
    .map_err(reject(StatusCode::BAD_REQUEST))?;

    Ok(Json(json!({
        "success": true,
        "data_file": data_name,
        "mappings_file": mappings_name,
        "summary": summary
    })))
}

async fn download_handler(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let path = state
        .store
        .resolve(&filename)
        .map_err(reject(StatusCode::NOT_FOUND))?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(reject(StatusCode::INTERNAL_SERVER_ERROR))?;
    let content_type = match path.extension().and_then(|e| e.to_str()) {
        Some("csv") => "text/csv; charset=utf-8",
        Some("json") => "application/json",
        _ => "text/tab-separated-values",
    };
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
        .map_err(reject(StatusCode::INTERNAL_SERVER_ERROR))?;
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content_type)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

async fn read_info(path: PathBuf, options: &DeidentifyOptions) -> anyhow::Result<DatasetInfo> {
    let encoding = options.encoding;
    blocking(move || {
        let records = dataset::read_records(&path, encoding)?;
        Ok(dataset::dataset_info(&records))
    })
    .await
}

/// Runs file I/O and the transform off the async worker threads.
async fn blocking<T, F>(work: F) -> anyhow::Result<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}

/// Maps any displayable error to a response with the given status.
fn reject<E: Display>(status: StatusCode) -> impl Fn(E) -> (StatusCode, String) {
    move |err| (status, format!("{:#}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{HeaderMap, Request};
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    const BOUNDARY: &str = "lab-export-boundary";

    fn export_row(patient: &str, location: &str) -> String {
        [
            patient,
            "55",
            "Jane",
            "",
            "Doe",
            "NID",
            "8801015555",
            "L01",
            location,
            "Blood",
            "T100",
            "CBC",
            "Hemoglobin",
            "OPD",
            "Hematology",
            "2024-01-02",
            "2024-01-03",
            "2024-01-01",
        ]
        .join("\t")
    }

    fn app() -> (TempDir, Router) {
        let dir = tempdir().expect("tempdir");
        let store = FileStore::new(dir.path().join("uploads")).expect("store");
        let state = AppState {
            store,
            options: DeidentifyOptions::default(),
        };
        (dir, router(state))
    }

    fn upload_request(field: &str, filename: &str, content: &str) -> Request<Body> {
        let body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
             Content-Type: text/plain\r\n\r\n\
             {content}\r\n\
             --{BOUNDARY}--\r\n"
        );
        Request::builder()
            .method("POST")
            .uri("/api/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("request")
    }

    fn request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .expect("request")
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
        let response = app.clone().oneshot(req).await.expect("response");
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, headers, body.to_vec())
    }

    fn as_json(body: &[u8]) -> Value {
        serde_json::from_slice(body).expect("json body")
    }

    async fn upload_and_deidentify(app: &Router) -> Value {
        let export = [
            export_row("1001", "LAB-A"),
            export_row("1002", "LAB-B"),
            export_row("1001", "LAB-A"),
        ]
        .join("\n");
        let upload = upload_request("file", "AllDataset.txt", &export);
        let (status, _, body) = send(app, upload).await;
        assert_eq!(status, StatusCode::OK);
        let uploaded = as_json(&body);
        assert_eq!(uploaded["info"]["records"], 3);
        assert_eq!(uploaded["info"]["distinct_patients"], 2);

        let filename = uploaded["filename"].as_str().expect("filename").to_string();
        assert!(filename.starts_with("AllDataset-") && filename.ends_with(".txt"));

        let (status, _, body) =
            send(app, request("POST", &format!("/api/deidentify/{filename}"))).await;
        assert_eq!(status, StatusCode::OK);
        let result = as_json(&body);
        let stem = filename.trim_end_matches(".txt");
        assert_eq!(result["data_file"], format!("{stem}-anonymized.csv"));
        assert_eq!(result["mappings_file"], format!("{stem}-mappings.json"));
        result
    }

    #[tokio::test]
    async fn upload_then_deidentify_reports_counts() {
        let (_dir, app) = app();
        let result = upload_and_deidentify(&app).await;
        assert_eq!(result["summary"]["records"], 3);
        assert_eq!(result["summary"]["chunks"], 1);
        assert_eq!(result["summary"]["mappings"]["patient_ids"], 2);
        assert_eq!(result["summary"]["mappings"]["document_ids"], 1);
        assert_eq!(result["summary"]["mappings"]["locations"], 2);
    }

    #[tokio::test]
    async fn anonymized_csv_and_mappings_download() {
        let (_dir, app) = app();
        let result = upload_and_deidentify(&app).await;

        let data_file = result["data_file"].as_str().expect("data file");
        let (status, headers, body) =
            send(&app, request("GET", &format!("/api/download/{data_file}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "text/csv; charset=utf-8");
        let csv = String::from_utf8(body).expect("utf8");
        assert!(csv.starts_with("patient_record_id,document_id,"));
        assert!(csv.contains("LOCATION2"));
        assert!(!csv.contains("Jane"));

        let mappings_file = result["mappings_file"].as_str().expect("mappings file");
        let (status, headers, body) =
            send(&app, request("GET", &format!("/api/download/{mappings_file}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(as_json(&body)["locations"]["LAB-A"], "LOCATION1");
    }

    #[tokio::test]
    async fn names_outside_the_store_are_not_found() {
        let (dir, app) = app();
        std::fs::write(dir.path().join("escape.txt"), export_row("1001", "LAB-A"))
            .expect("sibling file");

        let (status, _, _) = send(&app, request("GET", "/api/download/..%2Fescape.txt")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let deidentify = request("POST", "/api/deidentify/..%2Fescape.txt");
        let (status, _, _) = send(&app, deidentify).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, _) = send(&app, request("GET", "/api/info/missing.txt")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_upload_is_rejected() {
        let (_dir, app) = app();

        let short = upload_request("file", "short.txt", "1001\t55\tJane");
        let (status, _, body) = send(&app, short).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(String::from_utf8_lossy(&body).contains("expected 18 columns"));

        let (status, _, _) = send(&app, upload_request("notes", "a.txt", "hello")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
