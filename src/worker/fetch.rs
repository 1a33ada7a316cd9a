use std::path::PathBuf;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::CONTENT_DISPOSITION;
use tokio::io::AsyncWriteExt;

use super::{FetchedFile, Fetcher};
use crate::error::FetchError;
use crate::pipeline::Job;

/// Where the stored file's name comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum FileNaming {
    /// The `Content-Disposition` response header; jobs without one fail.
    #[default]
    ContentDisposition,
    /// The job's name.
    JobName,
}

/// Downloads over HTTP(S) into per-job directories under `directory`.
pub struct HttpFetcher {
    client: reqwest::Client,
    token: Option<String>,
    directory: PathBuf,
    naming: FileNaming,
}

impl HttpFetcher {
    pub fn new(directory: PathBuf, token: Option<String>, naming: FileNaming) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            directory,
            naming,
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, job: &Job) -> Result<FetchedFile, FetchError> {
        let url = job.source.as_str();
        let request_error = |source| FetchError::Request {
            url: url.to_string(),
            source,
        };

        let mut request = self.client.get(job.source.clone());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let file_name = match self.naming {
            FileNaming::ContentDisposition => response
                .headers()
                .get(CONTENT_DISPOSITION)
                .and_then(|value| value.to_str().ok())
                .and_then(parse_content_disposition_filename),
            FileNaming::JobName => Some(job.name.clone()),
        }
        .ok_or_else(|| FetchError::MissingFileName {
            url: url.to_string(),
        })?;

        let fetched = FetchedFile::allocate(&self.directory, &file_name)?;
        let mut file = tokio::fs::File::create(fetched.path()).await?;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            file.write_all(&chunk.map_err(request_error)?).await?;
        }
        file.flush().await?;

        tracing::info!(file = %file_name, url, %status, "downloaded");
        Ok(fetched)
    }
}

/// Pulls the file name out of a `Content-Disposition` value, e.g.
/// `attachment; filename=bionic-kvm.img.zip; filename*=UTF-8''bionic-kvm.img.zip`.
///
/// An RFC 5987 `filename*` in UTF-8 wins over a plain `filename`.
pub fn parse_content_disposition_filename(value: &str) -> Option<String> {
    let mut plain = None;

    for param in split_params(value).into_iter().map(str::trim) {
        let Some((key, raw)) = param.split_once('=') else {
            continue;
        };
        let raw = raw.trim();

        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                let mut parts = raw.splitn(3, '\'');
                let charset = parts.next().unwrap_or_default();
                let encoded = parts.nth(1);
                if let Some(encoded) = encoded.filter(|_| charset.eq_ignore_ascii_case("utf-8")) {
                    if let Ok(decoded) = urlencoding::decode(encoded) {
                        if !decoded.is_empty() {
                            return Some(decoded.into_owned());
                        }
                    }
                }
            }
            "filename" => {
                let unquoted = match raw.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
                    Some(quoted) => unescape_quoted(quoted),
                    None => raw.to_string(),
                };
                if !unquoted.is_empty() {
                    plain = Some(unquoted);
                }
            }
            _ => {}
        }
    }

    plain
}

/// Splits on `;` outside quoted strings.
fn split_params(value: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;

    for (i, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            ';' if !quoted => {
                params.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    params.push(&value[start..]);
    params
}

fn unescape_quoted(quoted: &str) -> String {
    let mut out = String::with_capacity(quoted.len());
    let mut chars = quoted.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            c => out.push(c),
        }
    }
    out
}
