//! Index page and health probe

use axum::{extract::State, response::Html, Json};
use serde::Serialize;

use crate::server::state::AppState;

/// Response for GET /health
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub server_ip: String,
    pub upload_folder: String,
    pub output_folder: String,
    pub work_folder: String,
    /// Jobs queued or running
    pub active_jobs: usize,
    pub version: &'static str,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    tracing::debug!("Health check requested");
    let config = state.config();
    Json(HealthResponse {
        status: "ok",
        server_ip: state.server_ip().to_string(),
        upload_folder: config.upload_dir.display().to_string(),
        output_folder: config.output_dir.display().to_string(),
        work_folder: config.conversion.work_dir.display().to_string(),
        active_jobs: state.registry().active_count(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>OBJ to PDF Converter</title>
    <style>
        body { font-family: sans-serif; max-width: 800px; margin: 0 auto; padding: 20px; }
        .progress-container { margin: 20px 0; display: none; }
        .progress-bar { width: 100%; height: 20px; background-color: #f0f0f0; border-radius: 10px; overflow: hidden; }
        .progress { width: 0%; height: 100%; background-color: #4CAF50; transition: width 0.3s; }
        .error { color: #c62828; }
        #download-link { display: none; margin-top: 10px; }
    </style>
</head>
<body>
    <h1>OBJ to PDF Converter</h1>
    <form id="uploadForm">
        <input type="file" name="file" accept=".obj" required>
        <button type="submit">Convert</button>
    </form>
    <div class="progress-container" id="progressContainer">
        <div class="progress-bar"><div class="progress" id="progressBar"></div></div>
        <div id="status"></div>
    </div>
    <a id="download-link" href="#" target="_blank">Download PDF</a>
    <script>
        const form = document.getElementById('uploadForm');
        const container = document.getElementById('progressContainer');
        const bar = document.getElementById('progressBar');
        const status = document.getElementById('status');
        const link = document.getElementById('download-link');

        function fail(message) {
            status.textContent = 'Error: ' + message;
            status.className = 'error';
            bar.style.width = '0%';
        }

        form.addEventListener('submit', async (e) => {
            e.preventDefault();
            const data = new FormData();
            data.append('file', e.target.file.files[0]);

            container.style.display = 'block';
            status.textContent = 'Uploading...';
            status.className = '';
            link.style.display = 'none';
            bar.style.width = '0%';

            let job;
            try {
                const response = await fetch('/convert?async=true', { method: 'POST', body: data });
                job = await response.json();
                if (!response.ok || !job.success) {
                    throw new Error(job.message || ('HTTP ' + response.status));
                }
            } catch (err) {
                fail(err.message);
                return;
            }

            const events = new EventSource('/progress/' + job.jobId);
            events.onmessage = (msg) => {
                const s = JSON.parse(msg.data);
                if (s.progress === -1) {
                    events.close();
                    fail(s.message);
                    return;
                }
                bar.style.width = s.progress + '%';
                status.textContent = s.message;
                if (s.progress >= 100) {
                    events.close();
                    status.textContent = 'Conversion complete! Click the link below to download.';
                    link.href = job.downloadUrl;
                    link.style.display = 'block';
                }
            };
            events.onerror = () => {
                events.close();
                fail('Lost connection to progress stream');
            };
        });
    </script>
</body>
</html>
"##;
