//! HTTP client for the Gradio generation app.
//!
//! A call goes through the app's public REST routes:
//! `POST /upload` for the input picture, `POST /call/<api>` to queue the job and
//! `GET /call/<api>/<event_id>` to stream its result as server-sent events.
//! Gradio 5 puts those routes under an `api_prefix` announced in `/config`.

use crate::{ClientError, ClientResult, GenerationClient, GenerationParams};
use log::{debug, info};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8080/";

#[derive(Debug, Deserialize)]
struct AppConfig {
    #[serde(default)]
    api_prefix: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallResponse {
    event_id: String,
}

pub struct GradioClient {
    endpoint: String,
    download_dir: PathBuf,
    http: reqwest::Client,
    api_prefix: Option<String>,
}

impl GradioClient {
    /// Creates a client without a request timeout. Generation can take minutes.
    pub fn new(endpoint: &str, download_dir: impl Into<PathBuf>) -> ClientResult<Self> {
        Self::with_timeout(endpoint, download_dir, None)
    }

    pub fn with_timeout(
        endpoint: &str,
        download_dir: impl Into<PathBuf>,
        timeout: Option<Duration>,
    ) -> ClientResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            download_dir: download_dir.into(),
            http: builder.build()?,
            api_prefix: None,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Fetches the app config once and returns the root URL of the API routes.
    pub async fn connect(&mut self) -> ClientResult<String> {
        if self.api_prefix.is_none() {
            info!("Connecting to {}", self.endpoint);
            let config: AppConfig = self
                .http
                .get(format!("{}/config", self.endpoint))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            let prefix = normalize_prefix(config.api_prefix.as_deref().unwrap_or(""));
            debug!("API prefix: {:?}", prefix);
            self.api_prefix = Some(prefix);
        }
        Ok(format!(
            "{}{}",
            self.endpoint,
            self.api_prefix.as_deref().unwrap_or("")
        ))
    }

    async fn upload(&self, root: &str, image: &Path) -> ClientResult<String> {
        let bytes = tokio::fs::read(image).await?;
        let file_name = image
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image.jpg")
            .to_string();
        let form = Form::new().part("files", Part::bytes(bytes).file_name(file_name));

        let paths: Vec<String> = self
            .http
            .post(format!("{root}/upload"))
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        paths
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::Protocol("upload returned no file path".into()))
    }

    async fn download(&self, root: &str, file: &RemoteFile, local: &Path) -> ClientResult<()> {
        let url = match &file.url {
            Some(url) => url.clone(),
            None => format!("{root}/file={}", file.path),
        };
        debug!("Downloading {}", url);
        let bytes = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        if let Some(dir) = local.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(local, &bytes).await?;
        Ok(())
    }
}

impl GenerationClient for GradioClient {
    async fn generate(
        &mut self,
        image: &Path,
        params: &GenerationParams,
    ) -> ClientResult<Vec<Value>> {
        let root = self.connect().await?;

        let server_path = self.upload(&root, image).await?;
        debug!("Uploaded {} as {}", image.display(), server_path);

        let name = params.endpoint_name();
        let call: CallResponse = self
            .http
            .post(format!("{root}/call/{name}"))
            .json(&json!({ "data": request_data(params, &server_path) }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!("Queued {} as event {}", name, call.event_id);

        let body = self
            .http
            .get(format!("{root}/call/{name}/{}", call.event_id))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let mut data = parse_sse_result(&body)?;

        let dir = self.download_dir.join(&call.event_id);
        let mut taken = HashSet::new();
        for item in data.iter_mut() {
            for (pointer, file) in find_remote_files(item) {
                let local = dir.join(unique_file_name(&file.file_name(), &mut taken));
                self.download(&root, &file, &local).await?;
                if let Some(slot) = item.pointer_mut(&pointer) {
                    *slot = Value::String(local.to_string_lossy().into_owned());
                }
            }
        }

        Ok(data)
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

/// Positional inputs of the `generation_all` endpoint.
pub fn request_data(params: &GenerationParams, server_path: &str) -> Value {
    json!([
        params.caption,
        { "path": server_path, "meta": { "_type": "gradio.FileData" } },
        params.steps,
        params.guidance_scale,
        params.seed,
        params.octree_resolution,
        params.remove_background,
    ])
}

/// Extracts the result array from a `/call/<api>/<event_id>` event stream.
pub fn parse_sse_result(body: &str) -> ClientResult<Vec<Value>> {
    let mut event = "";
    for line in body.lines() {
        if let Some(name) = line.strip_prefix("event:") {
            event = name.trim();
            continue;
        }
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        match event {
            "complete" => {
                return match serde_json::from_str::<Value>(data)? {
                    Value::Array(items) => Ok(items),
                    other => Err(ClientError::Protocol(format!(
                        "expected a result array, got {other}"
                    ))),
                };
            }
            "error" => {
                let message = match data {
                    "" | "null" => "unknown error".to_string(),
                    _ => data.to_string(),
                };
                return Err(ClientError::Service(message));
            }
            _ => {}
        }
    }
    Err(ClientError::Protocol(
        "event stream ended without a result".into(),
    ))
}

/// A file output the server reports as a Gradio `FileData` object.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFile {
    pub path: String,
    pub url: Option<String>,
    pub orig_name: Option<String>,
}

impl RemoteFile {
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let path = obj.get("path")?.as_str()?;
        let url = obj.get("url").and_then(Value::as_str);
        let tagged = obj
            .get("meta")
            .and_then(|meta| meta.get("_type"))
            .and_then(Value::as_str)
            == Some("gradio.FileData");
        if !tagged && url.is_none() {
            return None;
        }
        Some(Self {
            path: path.to_string(),
            url: url.map(str::to_string),
            orig_name: obj
                .get("orig_name")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    /// Local file name: the original upload name, else the last server path component.
    pub fn file_name(&self) -> String {
        self.orig_name
            .as_deref()
            .or_else(|| self.path.rsplit(['/', '\\']).next())
            .filter(|name| !name.is_empty())
            .unwrap_or("download")
            .to_string()
    }
}

/// Returns `name`, or `<stem>_<n>.<ext>` with the first free `n` if already taken.
pub fn unique_file_name(name: &str, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.to_string()) {
        return name.to_string();
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };
    let mut n = 1;
    loop {
        let candidate = match ext {
            Some(ext) => format!("{stem}_{n}.{ext}"),
            None => format!("{stem}_{n}"),
        };
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Finds every `FileData` object in `value`, returned with its JSON pointer.
pub fn find_remote_files(value: &Value) -> Vec<(String, RemoteFile)> {
    let mut found = Vec::new();
    collect_remote_files(value, String::new(), &mut found);
    found
}

fn collect_remote_files(value: &Value, pointer: String, found: &mut Vec<(String, RemoteFile)>) {
    if let Some(file) = RemoteFile::from_value(value) {
        found.push((pointer, file));
        return;
    }
    match value {
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                collect_remote_files(item, format!("{pointer}/{i}"), found);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                let key = key.replace('~', "~0").replace('/', "~1");
                collect_remote_files(item, format!("{pointer}/{key}"), found);
            }
        }
        _ => {}
    }
}
