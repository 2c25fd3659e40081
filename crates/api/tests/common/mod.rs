#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{Request, Response};
use axum::Router;
use ehco_api::codec::orchestrator::JobOrchestrator;
use ehco_api::config::ServerConfig;
use ehco_api::router::build_app_router;
use ehco_api::state::AppState;
use ehco_core::scratch::ScratchArea;
use http_body_util::BodyExt;
use tower::ServiceExt;

const BOUNDARY: &str = "ehco-test-boundary-7MA4YWxkTrZu0gW";

/// Codec stand-in honouring the fixed-name contract: `<input>` copies the
/// input to `compressed.bin`, `-d` copies `compressed.bin` to `output.wav`.
pub const COPY_CODEC: &str = r#"
if [ "$1" = "-d" ]; then
  cp compressed.bin output.wav
else
  cp "$1" compressed.bin
fi
"#;

/// Metrics stand-in reporting a perfect match for identical files.
pub const CMP_METRICS: &str = r#"
if cmp -s "$1" "$2"; then mse=0; else mse=1; fi
echo "MSE: $mse"
echo "SNR: 42.5 dB"
echo "PSNR: 60.25 dB"
echo "THD (Input): 0.12 %"
echo "THD (Output): 0.34 %"
"#;

/// Scratch layout of one test: tools, work root, and public root.
pub struct TestDirs {
    pub root: tempfile::TempDir,
}

impl TestDirs {
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn tools_dir(&self) -> PathBuf {
        let dir = self.root.path().join("bin");
        std::fs::create_dir_all(&dir).expect("create tools dir");
        dir
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.root.path().join("scratch")
    }

    pub fn public_dir(&self) -> PathBuf {
        self.root.path().join("uploads")
    }

    /// Write an executable bash script into the tools directory.
    pub fn write_tool(&self, name: &str, body: &str) -> PathBuf {
        let path = self.tools_dir().join(name);
        std::fs::write(&path, format!("#!/bin/bash\n{body}")).expect("write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod script");
        path
    }

    /// Config pointing at this layout with the given tools.
    pub fn config(&self, compressor: PathBuf, metrics_tool: PathBuf) -> ServerConfig {
        test_config(
            compressor,
            metrics_tool,
            self.scratch_dir(),
            self.public_dir(),
        )
    }

    /// Number of entries left in the work root.
    pub fn scratch_entries(&self) -> usize {
        dir_entries(&self.scratch_dir()).len()
    }

    /// File names currently in the public root.
    pub fn public_files(&self) -> Vec<String> {
        dir_entries(&self.public_dir())
    }
}

/// Build a test `ServerConfig` with safe defaults.
///
/// Artifact retention is disabled and tool timeouts are short.
pub fn test_config(
    compressor: PathBuf,
    metrics_tool: PathBuf,
    scratch_dir: PathBuf,
    public_dir: PathBuf,
) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        compressor_path: compressor,
        metrics_tool_path: metrics_tool,
        tool_timeout_secs: 5,
        tool_concurrency: 1,
        scratch_dir,
        public_dir,
        artifact_ttl_secs: 0,
        max_upload_bytes: 10 * 1024 * 1024,
    }
}

/// Build the full application router the same way `main.rs` does.
pub async fn build_test_app(config: ServerConfig) -> Router {
    let scratch = ScratchArea::init(&config.scratch_dir, &config.public_dir)
        .await
        .expect("init scratch area");

    let orchestrator = Arc::new(JobOrchestrator::new(
        scratch,
        config.compressor_path.clone(),
        config.metrics_tool_path.clone(),
        config.tool_timeout(),
        config.tool_concurrency,
    ));

    build_app_router(AppState {
        config: Arc::new(config),
        orchestrator,
    })
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

/// One multipart file part: `(field name, file name, contents)`.
pub type Part<'a> = (&'a str, &'a str, &'a [u8]);

/// Encode `parts` as a `multipart/form-data` body.
pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for (field, file_name, data) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn post_multipart(app: Router, uri: &str, parts: &[Part<'_>]) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn dir_entries(dir: &Path) -> Vec<String> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    }
}
