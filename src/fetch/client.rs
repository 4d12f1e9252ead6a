use std::path::{Path, PathBuf};

use futures::StreamExt;
use regex::Regex;
use reqwest::Client;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::utils::sanitize_filename;

use super::models::FetchConfig;

const DRIVE_DOWNLOAD_ENDPOINT: &str = "https://drive.google.com/uc?export=download";

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid URL: '{0}'")]
    MalformedUrl(String),

    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, FetchError>;

#[derive(Clone)]
pub struct Fetcher {
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Self {
        Self { config }
    }

    /// Download `url` into `dest_dir`, returning the path of the written file.
    ///
    /// With `fuzzy` enabled, any recognizable Google Drive URL is rewritten to
    /// the canonical direct-download endpoint before fetching. When `quiet` is
    /// false, transfer progress goes to the ambient logger.
    pub async fn download(
        &self,
        url: &str,
        dest_dir: &Path,
        quiet: bool,
        fuzzy: bool,
    ) -> Result<PathBuf> {
        let parsed = Url::parse(url).map_err(|_| FetchError::MalformedUrl(url.to_string()))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(FetchError::MalformedUrl(url.to_string()));
        }

        let request_url = if fuzzy {
            match extract_drive_id(&parsed) {
                Some(id) => format!("{}&id={}", DRIVE_DOWNLOAD_ENDPOINT, id),
                None => parsed.to_string(),
            }
        } else {
            parsed.to_string()
        };

        if !quiet {
            tracing::info!("fetching {}", request_url);
        }

        let client = Client::new();
        let response = self.get(&client, &request_url).await?;

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("text/html"))
            .unwrap_or(false);

        if is_html {
            let html = response.text().await?;

            // Large files behind a virus-scan interstitial carry a form whose
            // hidden fields must be echoed back to get the actual bytes.
            if let Some(confirm_url) = parse_confirm_form(&html) {
                if !quiet {
                    tracing::debug!("following download confirmation form");
                }
                let confirmed = self.get(&client, &confirm_url).await?;
                return self
                    .write_body(confirmed, &request_url, dest_dir, quiet)
                    .await;
            }

            if is_drive_host(&request_url) {
                return Err(FetchError::Other(format!(
                    "Google Drive returned a page instead of a file for '{}' (quota exceeded or access denied)",
                    request_url
                )));
            }

            // An ordinary web page; keep it as-is.
            let path = dest_dir.join(output_filename(&filename_from_url(&request_url)));
            tokio::fs::write(&path, html.as_bytes()).await?;
            return Ok(path);
        }

        self.write_body(response, &request_url, dest_dir, quiet)
            .await
    }

    async fn get(&self, client: &Client, url: &str) -> Result<reqwest::Response> {
        let response = client
            .get(url)
            .header(reqwest::header::USER_AGENT, self.config.user_agent.as_str())
            .send()
            .await?
            .error_for_status()?;
        Ok(response)
    }

    /// Stream the response body to `dest_dir`, naming the file from the
    /// Content-Disposition header when present, else the URL path.
    async fn write_body(
        &self,
        response: reqwest::Response,
        request_url: &str,
        dest_dir: &Path,
        quiet: bool,
    ) -> Result<PathBuf> {
        let filename = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_disposition_filename)
            .unwrap_or_else(|| filename_from_url(request_url));
        let filename = output_filename(&filename);

        let total = response.content_length();
        let path = dest_dir.join(&filename);
        let mut file = tokio::fs::File::create(&path).await?;
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk: bytes::Bytes = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;

            if !quiet {
                match total {
                    Some(total) if total > 0 => {
                        tracing::debug!("{}: {}/{} bytes", filename, downloaded, total)
                    }
                    _ => tracing::debug!("{}: {} bytes", filename, downloaded),
                }
            }
        }
        file.sync_all().await?;

        if !quiet {
            tracing::info!("wrote {} bytes to {}", downloaded, path.display());
        }
        Ok(path)
    }
}

/// Extract the Drive file id from any of the known URL shapes
/// (`/file/d/<id>`, `/d/<id>`, `?id=<id>`).
fn extract_drive_id(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    if host != "drive.google.com" && host != "docs.google.com" {
        return None;
    }

    let re = Regex::new(r"/d/([0-9A-Za-z_-]{10,})").ok()?;
    if let Some(caps) = re.captures(url.path()) {
        return Some(caps[1].to_string());
    }

    url.query_pairs()
        .find(|(key, _)| key == "id")
        .map(|(_, value)| value.into_owned())
}

fn is_drive_host(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .host_str()
                .map(|host| host == "drive.google.com" || host == "docs.google.com")
        })
        .unwrap_or(false)
}

/// Rebuild the target URL from an interstitial page's `download-form`:
/// the form action plus every hidden input as a query parameter.
fn parse_confirm_form(html: &str) -> Option<String> {
    // Matches <form id="download-form" action="...">
    let form_re = Regex::new(r#"<form[^>]+id="download-form"[^>]+action="([^"]+)""#).ok()?;
    let action = form_re.captures(html)?.get(1)?.as_str().replace("&amp;", "&");

    let input_re =
        Regex::new(r#"<input[^>]+type="hidden"[^>]+name="([^"]+)"[^>]+value="([^"]*)""#).ok()?;
    let params: Vec<String> = input_re
        .captures_iter(html)
        .map(|caps| format!("{}={}", &caps[1], &caps[2]))
        .collect();

    if params.is_empty() {
        Some(action)
    } else {
        let separator = if action.contains('?') { '&' } else { '?' };
        Some(format!("{}{}{}", action, separator, params.join("&")))
    }
}

/// Filename from a raw Content-Disposition header value.
/// `filename*=UTF-8''...` (RFC 5987) takes precedence over `filename=`.
fn parse_content_disposition_filename(value: &str) -> Option<String> {
    let mut plain: Option<String> = None;

    for param in value.split(';') {
        let param = param.trim();
        if let Some(rest) = param.strip_prefix("filename*=") {
            let rest = rest.trim();
            if let Some(encoded) = rest
                .strip_prefix("UTF-8''")
                .or_else(|| rest.strip_prefix("utf-8''"))
            {
                let decoded = percent_decode(encoded);
                if !decoded.is_empty() {
                    return Some(decoded);
                }
            }
        } else if let Some(rest) = param.strip_prefix("filename=") {
            let unquoted = rest.trim().trim_matches('"');
            if !unquoted.is_empty() {
                plain = Some(unquoted.to_string());
            }
        }
    }

    plain
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Last non-empty path segment, or empty when the URL has none.
fn filename_from_url(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.rev().find(|s| !s.is_empty()).map(str::to_string))
        })
        .unwrap_or_default()
}

fn output_filename(candidate: &str) -> String {
    let sanitized = sanitize_filename(candidate);
    if sanitized.is_empty() {
        "download".to_string()
    } else {
        sanitized
    }
}
