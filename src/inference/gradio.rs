/// HTTP implementation of the inference contract against a Gradio app
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use tracing::{debug, info};

use super::protocol::{self, CallStarted, FileData, GradioConfig, StreamOutcome};
use super::{InferenceBackend, InferenceConnection, PredictReply, TryOnInputs};
use crate::error::{InferenceError, Result};
use crate::state::data::ImagePayload;

/// Opens [`GradioConnection`]s
pub struct GradioBackend {
    http: Client,
    hf_token: Option<String>,
}

impl GradioBackend {
    pub fn new(request_timeout: Duration, hf_token: Option<String>) -> Result<Self> {
        let http = Client::builder().timeout(request_timeout).build()?;
        Ok(Self { http, hf_token })
    }
}

#[async_trait]
impl InferenceBackend for GradioBackend {
    async fn connect(&self, endpoint: &str) -> Result<Arc<dyn InferenceConnection>> {
        let endpoint = endpoint.trim_end_matches('/');
        let url = format!("{}/config", endpoint);

        let response = authorize(self.http.get(&url), self.hf_token.as_deref())
            .send()
            .await
            .map_err(|e| InferenceError::Connect(format!("{}: {}", endpoint, e)))?;
        let response = check_status(response, "app config").await?;
        let config: GradioConfig = response.json().await?;

        let base = config.api_base(endpoint);
        info!(
            "Gradio app at {} (version {}, protocol {})",
            base,
            config.version.as_deref().unwrap_or("unknown"),
            config.protocol.as_deref().unwrap_or("unknown"),
        );

        Ok(Arc::new(GradioConnection {
            http: self.http.clone(),
            hf_token: self.hf_token.clone(),
            base,
            api_names: config.api_names(),
        }))
    }
}

/// A connected Gradio app
pub struct GradioConnection {
    http: Client,
    hf_token: Option<String>,
    /// Root plus API prefix, without trailing slash
    base: String,
    api_names: Vec<String>,
}

impl GradioConnection {
    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        authorize(builder, self.hf_token.as_deref())
    }

    /// Upload images in one request; returned references keep input order
    async fn upload(&self, images: &[&ImagePayload]) -> Result<Vec<FileData>> {
        let mut form = Form::new();
        for image in images {
            let part = Part::bytes(image.bytes.to_vec())
                .file_name(upload_name(image))
                .mime_str(image.mime)?;
            form = form.part("files", part);
        }

        let url = format!("{}/upload", self.base);
        let response = self.request(self.http.post(&url)).multipart(form).send().await?;
        let paths: Vec<String> = check_status(response, "upload").await?.json().await?;

        if paths.len() != images.len() {
            return Err(InferenceError::Protocol(format!(
                "upload returned {} paths for {} files",
                paths.len(),
                images.len()
            )));
        }

        Ok(paths
            .into_iter()
            .zip(images)
            .map(|(path, image)| FileData::uploaded(path, &image.name, image.mime, image.bytes.len()))
            .collect())
    }
}

#[async_trait]
impl InferenceConnection for GradioConnection {
    async fn predict(&self, operation: &str, inputs: &TryOnInputs) -> Result<PredictReply> {
        let api_name = operation.trim_start_matches('/');
        if !self.api_names.is_empty() && !self.api_names.iter().any(|n| n == api_name) {
            return Err(InferenceError::UnknownEndpoint(operation.to_string()));
        }

        let files = self.upload(&[&inputs.garment, &inputs.background]).await?;
        let payload = protocol::tryon_payload(&files[0], &files[1], &inputs.params);

        let url = format!("{}/call/{}", self.base, api_name);
        let response = self.request(self.http.post(&url)).json(&payload).send().await?;
        let started: CallStarted = check_status(response, "call").await?.json().await?;
        debug!("{} queued as event {}", operation, started.event_id);

        let url = format!("{}/call/{}/{}", self.base, api_name, started.event_id);
        let response = self.request(self.http.get(&url)).send().await?;
        let body = check_status(response, "event stream").await?.text().await?;

        match protocol::parse_event_stream(&body)? {
            StreamOutcome::Complete(mut data) => {
                protocol::resolve_urls(&mut data, &self.base);
                Ok(PredictReply::Data(data))
            }
            StreamOutcome::Error(message) => Ok(PredictReply::Failure(message)),
        }
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        // The token only goes back to the app that issued it
        let request = if is_under(url, &self.base) {
            self.request(self.http.get(url))
        } else {
            self.http.get(url)
        };
        let response = request.send().await?;
        let bytes = check_status(response, "download").await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}

fn authorize(builder: RequestBuilder, hf_token: Option<&str>) -> RequestBuilder {
    match hf_token {
        Some(token) => builder.bearer_auth(token),
        None => builder,
    }
}

/// True when `url` is `base` itself or a path below it
fn is_under(url: &str, base: &str) -> bool {
    match url.strip_prefix(base) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'),
        None => false,
    }
}

async fn check_status(response: Response, what: &str) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(InferenceError::Protocol(format!("{} returned {} - {}", what, status, body)))
}

/// Keep the user's file name but make sure the extension matches the content
fn upload_name(image: &ImagePayload) -> String {
    let ext = image.extension();
    let has_ext = std::path::Path::new(&image.name)
        .extension()
        .map(|e| e.eq_ignore_ascii_case(ext))
        .unwrap_or(false);
    if has_ext {
        image.name.clone()
    } else {
        format!("{}.{}", image.name, ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::TryOnParams;
    use crate::state::data::tests::payload;
    use serde_json::json;
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    #[test]
    fn test_upload_name_appends_missing_extension() {
        assert_eq!(upload_name(&payload("model.PNG")), "model.PNG");
        assert_eq!(upload_name(&payload("IMG_6943")), "IMG_6943.png");
        assert_eq!(upload_name(&payload("photo.jpeg")), "photo.jpeg.png");
    }

    #[test]
    fn test_backend_builds_with_token() {
        let backend = GradioBackend::new(Duration::from_secs(5), Some("hf_x".into())).unwrap();
        assert_eq!(backend.hf_token.as_deref(), Some("hf_x"));
    }

    #[test]
    fn test_is_under_matches_whole_origin() {
        let base = "http://127.0.0.1:7860";
        assert!(is_under("http://127.0.0.1:7860/file=out.png", base));
        assert!(is_under(base, base));
        assert!(!is_under("http://127.0.0.1:78601/file=out.png", base));
        assert!(!is_under("http://127.0.0.1:7860.evil.example/x.png", base));
        assert!(!is_under("https://cdn.example/out.png", base));
    }

    /// One request as the stub server saw it
    #[derive(Debug, Clone)]
    struct Seen {
        method: String,
        path: String,
        authorization: Option<String>,
        body: String,
    }

    /// (method, path, status, body)
    type Route = (&'static str, &'static str, u16, String);

    /// Minimal HTTP/1.1 server answering from a fixed route table
    struct StubServer {
        base: String,
        seen: Arc<Mutex<Vec<Seen>>>,
    }

    impl StubServer {
        async fn start(routes: Vec<Route>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let base = format!("http://{}", listener.local_addr().unwrap());
            let seen = Arc::new(Mutex::new(Vec::new()));
            let routes = Arc::new(routes);

            let log = Arc::clone(&seen);
            tokio::spawn(async move {
                while let Ok((socket, _)) = listener.accept().await {
                    let routes = Arc::clone(&routes);
                    let log = Arc::clone(&log);
                    tokio::spawn(async move { answer(socket, &routes, &log).await });
                }
            });

            Self { base, seen }
        }

        fn paths(&self) -> Vec<String> {
            self.seen.lock().unwrap().iter().map(|r| r.path.clone()).collect()
        }

        fn request(&self, path: &str) -> Seen {
            self.seen
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.path == path)
                .cloned()
                .unwrap_or_else(|| panic!("no request to {}", path))
        }
    }

    async fn answer(mut socket: TcpStream, routes: &[Route], log: &Mutex<Vec<Seen>>) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];

        let head_end = loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
        let mut lines = head.lines();
        let mut request_line = lines.next().unwrap_or_default().split_whitespace();
        let method = request_line.next().unwrap_or_default().to_string();
        let path = request_line.next().unwrap_or_default().to_string();

        let mut content_length = 0;
        let mut chunked = false;
        let mut authorization = None;
        for line in lines {
            if let Some((name, value)) = line.split_once(':') {
                match name.trim().to_ascii_lowercase().as_str() {
                    "content-length" => content_length = value.trim().parse().unwrap_or(0),
                    "transfer-encoding" => chunked = value.contains("chunked"),
                    "authorization" => authorization = Some(value.trim().to_string()),
                    _ => {}
                }
            }
        }

        loop {
            let body = &buf[head_end..];
            let complete = if chunked {
                body.ends_with(b"0\r\n\r\n")
            } else {
                body.len() >= content_length
            };
            if complete {
                break;
            }
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }

        log.lock().unwrap().push(Seen {
            method: method.clone(),
            path: path.clone(),
            authorization,
            body: String::from_utf8_lossy(&buf[head_end..]).to_string(),
        });

        let (status, body) = routes
            .iter()
            .find(|(m, p, _, _)| *m == method && *p == path)
            .map(|(_, _, status, body)| (*status, body.clone()))
            .unwrap_or((404, "Not Found".to_string()));
        let reason = if status < 400 { "OK" } else { "Error" };
        let response = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            reason,
            body.len(),
            body
        );
        let _ = socket.write_all(response.as_bytes()).await;
        let _ = socket.shutdown().await;
    }

    fn backend(token: Option<&str>) -> GradioBackend {
        GradioBackend {
            http: Client::builder().no_proxy().build().unwrap(),
            hf_token: token.map(str::to_string),
        }
    }

    fn inputs() -> TryOnInputs {
        TryOnInputs {
            garment: payload("shirt.png"),
            background: payload("model_1.png"),
            params: TryOnParams::default(),
        }
    }

    fn app_config(api_name: &str) -> Route {
        (
            "GET",
            "/config",
            200,
            json!({
                "version": "4.44.1",
                "protocol": "sse_v3",
                "dependencies": [{ "api_name": api_name }, { "api_name": false }],
            })
            .to_string(),
        )
    }

    fn uploaded() -> Route {
        (
            "POST",
            "/upload",
            200,
            json!(["/tmp/gradio/a1/shirt.png", "/tmp/gradio/b2/model_1.png"]).to_string(),
        )
    }

    fn queued() -> Route {
        ("POST", "/call/tryon", 200, json!({ "event_id": "ev42" }).to_string())
    }

    #[tokio::test]
    async fn test_predict_runs_upload_call_and_stream() {
        let events = concat!(
            "event: generating\ndata: null\n\n",
            "event: heartbeat\ndata: null\n\n",
            "event: complete\n",
            "data: [{\"path\": \"/tmp/gradio/out/result.png\"}, {\"url\": \"https://cdn.example/mask.png\"}]\n\n",
        );
        let stub = StubServer::start(vec![
            app_config("tryon"),
            uploaded(),
            queued(),
            ("GET", "/call/tryon/ev42", 200, events.to_string()),
        ])
        .await;

        let conn = backend(Some("hf_secret")).connect(&stub.base).await.unwrap();
        let reply = conn.predict("/tryon", &inputs()).await.unwrap();

        let data = match reply {
            PredictReply::Data(data) => data,
            other => panic!("expected data, got {:?}", other),
        };
        let expected = format!("{}/file=/tmp/gradio/out/result.png", stub.base);
        assert_eq!(PredictReply::first_url(&data), Some(expected.as_str()));
        assert_eq!(data[1]["url"], "https://cdn.example/mask.png");

        assert_eq!(
            stub.paths(),
            vec!["/config", "/upload", "/call/tryon", "/call/tryon/ev42"]
        );
        for seen in stub.seen.lock().unwrap().iter() {
            assert_eq!(seen.authorization.as_deref(), Some("Bearer hf_secret"), "{}", seen.path);
        }

        let upload = stub.request("/upload");
        assert_eq!(upload.method, "POST");
        assert!(upload.body.contains("filename=\"shirt.png\""));
        assert!(upload.body.contains("filename=\"model_1.png\""));

        let call: serde_json::Value = serde_json::from_str(&stub.request("/call/tryon").body).unwrap();
        let data = call["data"].as_array().unwrap();
        assert_eq!(data.len(), 7);
        assert_eq!(data[0]["background"]["path"], "/tmp/gradio/b2/model_1.png");
        assert_eq!(data[1]["path"], "/tmp/gradio/a1/shirt.png");
        assert_eq!(data[2], "Hello!!");
        assert_eq!(data[5], 20);
        assert_eq!(data[6], -1);
    }

    #[tokio::test]
    async fn test_error_event_becomes_failure_reply() {
        let events = "event: error\ndata: {\"message\": \"CUDA out of memory\"}\n\n";
        let stub = StubServer::start(vec![
            app_config("tryon"),
            uploaded(),
            queued(),
            ("GET", "/call/tryon/ev42", 200, events.to_string()),
        ])
        .await;

        let conn = backend(None).connect(&stub.base).await.unwrap();
        let reply = conn.predict("/tryon", &inputs()).await.unwrap();

        assert_eq!(reply, PredictReply::Failure("CUDA out of memory".to_string()));
        assert!(stub.request("/config").authorization.is_none());
    }

    #[tokio::test]
    async fn test_unknown_api_name_fails_before_upload() {
        let stub = StubServer::start(vec![app_config("predict"), uploaded(), queued()]).await;

        let conn = backend(None).connect(&stub.base).await.unwrap();
        let err = conn.predict("/tryon", &inputs()).await.unwrap_err();

        assert!(matches!(err, InferenceError::UnknownEndpoint(ref op) if op == "/tryon"), "{:?}", err);
        assert_eq!(stub.paths(), vec!["/config"]);
    }

    #[tokio::test]
    async fn test_upload_error_status_is_reported_with_body() {
        let stub = StubServer::start(vec![
            app_config("tryon"),
            ("POST", "/upload", 500, "disk full".to_string()),
            queued(),
        ])
        .await;

        let conn = backend(None).connect(&stub.base).await.unwrap();
        let err = conn.predict("/tryon", &inputs()).await.unwrap_err();

        let message = match err {
            InferenceError::Protocol(message) => message,
            other => panic!("expected protocol error, got {:?}", other),
        };
        assert!(message.starts_with("upload returned 500"), "{}", message);
        assert!(message.contains("disk full"), "{}", message);
        assert_eq!(stub.paths(), vec!["/config", "/upload"]);
    }

    #[tokio::test]
    async fn test_upload_path_count_mismatch_is_rejected() {
        let stub = StubServer::start(vec![
            app_config("tryon"),
            ("POST", "/upload", 200, json!(["/tmp/gradio/a1/shirt.png"]).to_string()),
            queued(),
        ])
        .await;

        let conn = backend(None).connect(&stub.base).await.unwrap();
        let err = conn.predict("/tryon", &inputs()).await.unwrap_err();

        assert!(matches!(err, InferenceError::Protocol(ref m) if m.contains("1 paths for 2 files")), "{:?}", err);
    }

    #[tokio::test]
    async fn test_connect_fails_without_app_config() {
        let stub = StubServer::start(Vec::new()).await;

        let err = match backend(None).connect(&stub.base).await {
            Ok(_) => panic!("connected to an app without /config"),
            Err(err) => err,
        };

        assert!(err.to_string().contains("404"), "{}", err);
    }

    #[tokio::test]
    async fn test_download_sends_token_only_to_the_app() {
        let app = StubServer::start(vec![
            app_config("tryon"),
            ("GET", "/file=out.png", 200, "app-bytes".to_string()),
        ])
        .await;
        let cdn = StubServer::start(vec![("GET", "/out.png", 200, "cdn-bytes".to_string())]).await;

        let conn = backend(Some("hf_secret")).connect(&app.base).await.unwrap();

        let own = conn.download(&format!("{}/file=out.png", app.base)).await.unwrap();
        let foreign = conn.download(&format!("{}/out.png", cdn.base)).await.unwrap();

        assert_eq!(own, b"app-bytes");
        assert_eq!(foreign, b"cdn-bytes");
        assert_eq!(
            app.request("/file=out.png").authorization.as_deref(),
            Some("Bearer hf_secret")
        );
        assert!(cdn.request("/out.png").authorization.is_none());
    }
}
