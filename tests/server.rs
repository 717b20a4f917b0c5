//! HTTP-level tests for the conversion server.
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot`; the
//! external tools are replaced by fakes so no Python or LaTeX is needed.

#![cfg(feature = "server")]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use mesh2pdf::server::{build_router, AppState, ServerConfig};
use mesh2pdf::{
    ConversionConfig, DocumentEmbedder, Mesh2PdfError, MeshConverter, Stage, StageReporter,
};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ── Test helpers ─────────────────────────────────────────────────────────────

const BOUNDARY: &str = "mesh2pdf-test-boundary";

/// Route server logs to the test harness; `RUST_LOG=mesh2pdf=debug` shows them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mesh2pdf=warn")),
        )
        .with_test_writer()
        .try_init();
}

const CUBE_OBJ: &str = "\
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
f 1 2 3
f 1 3 4
";

struct FakeMesh;

#[async_trait]
impl MeshConverter for FakeMesh {
    async fn convert(
        &self,
        _input: &Path,
        output: &Path,
        _target_faces: u32,
        progress: &StageReporter,
    ) -> Result<(), Mesh2PdfError> {
        progress.report(Stage::Decimate, 100, "Decimated");
        tokio::fs::write(output, b"U3D\0").await.unwrap();
        Ok(())
    }
}

struct FakeEmbedder;

#[async_trait]
impl DocumentEmbedder for FakeEmbedder {
    async fn embed(
        &self,
        _interchange: &Path,
        output: &Path,
        _title: &str,
        _progress: &StageReporter,
    ) -> Result<(), Mesh2PdfError> {
        tokio::fs::write(output, b"%PDF-1.5\n%%EOF\n").await.unwrap();
        Ok(())
    }
}

/// Fails the way pdflatex does when media9 is missing.
struct LatexErrorEmbedder;

#[async_trait]
impl DocumentEmbedder for LatexErrorEmbedder {
    async fn embed(
        &self,
        _interchange: &Path,
        _output: &Path,
        _title: &str,
        _progress: &StageReporter,
    ) -> Result<(), Mesh2PdfError> {
        Err(Mesh2PdfError::EmbedFailed {
            code: Some(1),
            stdout: "This is pdfTeX".into(),
            stderr: "LaTeX Error".into(),
        })
    }
}

struct TestServer {
    _tmp: TempDir,
    state: AppState,
    app: Router,
}

impl TestServer {
    async fn new(embedder: Arc<dyn DocumentEmbedder>) -> Self {
        init_tracing();
        let tmp = TempDir::new().unwrap();
        let conversion = ConversionConfig::builder()
            .work_dir(tmp.path().join("output"))
            .mesh_converter(Arc::new(FakeMesh))
            .embedder(embedder)
            .build()
            .unwrap();
        let config = ServerConfig {
            upload_dir: tmp.path().join("uploads"),
            output_dir: tmp.path().join("output").join("pdf"),
            public_base_url: Some("http://localhost:5000".into()),
            conversion,
            ..ServerConfig::default()
        };
        let state = AppState::new(config).await.unwrap();
        let app = build_router(state.clone());
        Self {
            _tmp: tmp,
            state,
            app,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    async fn get(&self, uri: &str) -> (StatusCode, Vec<u8>) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn upload(
        &self,
        uri: &str,
        field: &str,
        file_name: &str,
        data: &[u8],
    ) -> (StatusCode, Value) {
        let (status, body) = self
            .send(multipart_request(uri, field, file_name, data))
            .await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn upload_count(&self) -> usize {
        self.upload_names().len()
    }

    fn upload_names(&self) -> Vec<String> {
        std::fs::read_dir(&self.state.config().upload_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }
}

fn multipart_request(uri: &str, field: &str, file_name: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::post(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn job_id(body: &Value) -> Uuid {
    body["jobId"].as_str().unwrap().parse().unwrap()
}

// ── Pages ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_folders() {
    let server = TestServer::new(Arc::new(FakeEmbedder)).await;
    let (status, body) = server.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert!(json["upload_folder"].as_str().unwrap().ends_with("uploads"));
    assert_eq!(json["active_jobs"], 0);
}

#[tokio::test]
async fn index_serves_upload_form() {
    let server = TestServer::new(Arc::new(FakeEmbedder)).await;
    let (status, body) = server.get("/").await;

    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("<form"));
    assert!(html.contains("EventSource"));
    assert!(html.contains(r##"href="#""##));
    assert!(html.trim_end().ends_with("</html>"));
}

// ── Upload validation ────────────────────────────────────────────────────────

#[tokio::test]
async fn wrong_extension_is_rejected_and_not_stored() {
    let server = TestServer::new(Arc::new(FakeEmbedder)).await;
    let (status, body) = server
        .upload("/convert", "file", "part.stl", b"solid part")
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Invalid file type");
    assert_eq!(server.upload_count(), 0);
    assert!(server.state.registry().is_empty());
}

#[tokio::test]
async fn missing_file_part_is_rejected() {
    let server = TestServer::new(Arc::new(FakeEmbedder)).await;
    let (status, body) = server
        .upload("/convert", "attachment", "cube.obj", CUBE_OBJ.as_bytes())
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No file part");
}

#[tokio::test]
async fn empty_file_name_is_rejected() {
    let server = TestServer::new(Arc::new(FakeEmbedder)).await;
    let (status, body) = server.upload("/convert", "file", "", b"").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No selected file");
}

#[tokio::test]
async fn mesh_without_faces_is_rejected_and_removed() {
    let server = TestServer::new(Arc::new(FakeEmbedder)).await;
    let (status, body) = server
        .upload("/convert", "file", "points.obj", b"v 0 0 0\nv 1 0 0\n")
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("no faces"));
    assert_eq!(server.upload_count(), 0);
    assert!(server.state.registry().is_empty());
}

#[tokio::test]
async fn unwritable_upload_dir_is_500_write_failure() {
    let server = TestServer::new(Arc::new(FakeEmbedder)).await;
    let upload_dir = server.state.config().upload_dir.clone();
    std::fs::remove_dir_all(&upload_dir).unwrap();
    std::fs::write(&upload_dir, b"not a directory").unwrap();

    let (status, body) = server
        .upload("/convert", "file", "cube.obj", CUBE_OBJ.as_bytes())
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    let message = body["message"].as_str().unwrap();
    assert!(message.starts_with("Failed to write upload"), "{message}");
    assert!(server.state.registry().is_empty());
}

// ── Conversion ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn cube_upload_converts_and_downloads() {
    let server = TestServer::new(Arc::new(FakeEmbedder)).await;
    let (status, body) = server
        .upload("/convert", "file", "cube.obj", CUBE_OBJ.as_bytes())
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    let id = job_id(&body);
    assert_eq!(
        body["downloadUrl"],
        format!("http://localhost:5000/download/{id}")
    );
    assert_eq!(server.state.registry().status(&id).unwrap().progress, 100);

    let response = server
        .app
        .clone()
        .oneshot(
            Request::get(format!("/download/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/pdf"
    );
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment"));
    assert!(disposition.contains("cube"));
    let length: usize = response.headers()[header::CONTENT_LENGTH]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    let pdf = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(pdf.starts_with(b"%PDF"));
    assert_eq!(pdf.len(), length);
}

#[tokio::test]
async fn client_directories_do_not_hide_job_id() {
    let server = TestServer::new(Arc::new(FakeEmbedder)).await;

    let mut ids = Vec::new();
    for _ in 0..2 {
        let (status, body) = server
            .upload("/convert", "file", "models/cube.obj", CUBE_OBJ.as_bytes())
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        ids.push(job_id(&body));
    }
    assert_ne!(ids[0], ids[1]);

    let mut names = server.upload_names();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), 2, "{names:?}");
    for id in &ids {
        let simple = id.simple().to_string();
        assert!(
            names.iter().any(|n| n == &format!("{simple}cube.obj")),
            "{simple} missing from {names:?}"
        );

        let (status, pdf) = server.get(&format!("/download/{id}")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(pdf.starts_with(b"%PDF"));
    }
}

#[tokio::test]
async fn embed_failure_returns_500_with_diagnostic() {
    let server = TestServer::new(Arc::new(LatexErrorEmbedder)).await;
    let (status, body) = server
        .upload("/convert", "file", "cube.obj", CUBE_OBJ.as_bytes())
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    let message = body["message"].as_str().unwrap();
    assert!(message.starts_with("Error during conversion"), "{message}");
    assert!(message.contains("LaTeX Error"), "{message}");

    let registry = server.state.registry();
    assert_eq!(registry.len(), 1);
    let statuses: Vec<i32> = std::fs::read_dir(&server.state.config().upload_dir)
        .unwrap()
        .filter_map(|e| {
            let name = e.unwrap().file_name().to_string_lossy().into_owned();
            let id = Uuid::parse_str(name.get(..32)?).ok()?;
            registry.status(&id).map(|s| s.progress)
        })
        .collect();
    assert_eq!(statuses, vec![-1]);
}

#[tokio::test]
async fn async_upload_streams_progress_to_completion() {
    let server = TestServer::new(Arc::new(FakeEmbedder)).await;
    let (status, body) = server
        .upload("/convert?async=true", "file", "cube.obj", CUBE_OBJ.as_bytes())
        .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    let id = job_id(&body);
    assert_eq!(
        body["progressUrl"],
        format!("http://localhost:5000/progress/{id}")
    );

    let (status, events) = server.get(&format!("/progress/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    let events = String::from_utf8(events).unwrap();
    let last = events
        .lines()
        .filter_map(|l| l.strip_prefix("data: "))
        .last()
        .unwrap();
    let last: Value = serde_json::from_str(last).unwrap();
    assert_eq!(last["progress"], 100);
}

// ── Unknown jobs ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_job_is_404_everywhere() {
    let server = TestServer::new(Arc::new(FakeEmbedder)).await;
    let id = Uuid::new_v4();

    let (status, body) = server.get(&format!("/progress/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "Job not found");

    let (status, body) = server.get(&format!("/download/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "File not found");

    let (status, _) = server.get("/progress/not-a-uuid").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
