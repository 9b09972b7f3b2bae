use std::time::Duration;

use consolidator_core::{
    ConsolidationOptions, FileHandle, JobId, JobSnapshot, SUBMISSION_FALLBACK,
};
use consolidator_logging::{con_debug, con_info};
use futures_util::StreamExt;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::multipart::{Form, Part};
use url::Url;

use crate::filename::content_disposition_filename;
use crate::types::ErrorBody;
use crate::{ApiError, DownloadedWorkbook, FailureKind, HealthReport, StatusResponse, SubmitReceipt};

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: Url,
    pub connect_timeout: Duration,
    /// Applies to status, health and download calls. Uploads use `upload_timeout`.
    pub request_timeout: Duration,
    pub upload_timeout: Duration,
    pub max_download_bytes: u64,
}

impl ApiSettings {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            upload_timeout: Duration::from_secs(300),
            max_download_bytes: 100 * 1024 * 1024,
        }
    }

    pub fn parse(base_url: &str) -> Result<Self, ApiError> {
        let url = Url::parse(base_url)
            .map_err(|err| ApiError::new(FailureKind::InvalidUrl, err.to_string()))?;
        Ok(Self::new(url))
    }
}

/// The consolidation backend as seen by this client.
#[async_trait::async_trait]
pub trait ApiClient: Send + Sync {
    /// One multipart upload; never retried.
    async fn submit(
        &self,
        template: &FileHandle,
        sources: &[FileHandle],
        options: &ConsolidationOptions,
    ) -> Result<SubmitReceipt, ApiError>;

    async fn status(&self, job_id: &JobId) -> Result<JobSnapshot, ApiError>;

    async fn download(&self, job_id: &JobId) -> Result<DownloadedWorkbook, ApiError>;

    async fn health(&self) -> Result<HealthReport, ApiError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestApiClient {
    settings: ApiSettings,
    client: reqwest::Client,
}

impl ReqwestApiClient {
    pub fn new(settings: ApiSettings) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { settings, client })
    }

    pub fn settings(&self) -> &ApiSettings {
        &self.settings
    }

    /// Resolves `path` below the configured base, keeping any base path prefix.
    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        let mut base = self.settings.base_url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(path.trim_start_matches('/'))
            .map_err(|err| ApiError::new(FailureKind::InvalidUrl, err.to_string()))
    }

    async fn file_part(file: &FileHandle) -> Result<Part, ApiError> {
        let bytes = tokio::fs::read(&file.path).await.map_err(|err| {
            ApiError::new(
                FailureKind::Io,
                format!("cannot read {}: {err}", file.path.display()),
            )
        })?;
        Ok(Part::bytes(bytes).file_name(file.name.clone()))
    }
}

#[async_trait::async_trait]
impl ApiClient for ReqwestApiClient {
    async fn submit(
        &self,
        template: &FileHandle,
        sources: &[FileHandle],
        options: &ConsolidationOptions,
    ) -> Result<SubmitReceipt, ApiError> {
        let url = self.endpoint("api/consolidate")?;

        let mut form = Form::new().part("template", Self::file_part(template).await?);
        for source in sources {
            form = form.part("sources", Self::file_part(source).await?);
        }
        for (name, value) in options.form_fields() {
            form = form.text(name, value);
        }

        con_info!(
            "submitting template={} sources={} to {}",
            template.name,
            sources.len(),
            url
        );
        let response = self
            .client
            .post(url)
            .timeout(self.settings.upload_timeout)
            .multipart(form)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(rejection(response, SUBMISSION_FALLBACK).await);
        }

        response
            .json::<SubmitReceipt>()
            .await
            .map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))
    }

    async fn status(&self, job_id: &JobId) -> Result<JobSnapshot, ApiError> {
        let url = self.endpoint(&format!("api/status/{job_id}"))?;
        let response = self
            .client
            .get(url)
            .timeout(self.settings.request_timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let body = response
            .json::<StatusResponse>()
            .await
            .map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))?;
        con_debug!(
            "status {} progress={} processed={}/{}",
            body.status,
            body.progress,
            body.processed_files,
            body.total_files
        );
        Ok(body.into_snapshot(job_id))
    }

    async fn download(&self, job_id: &JobId) -> Result<DownloadedWorkbook, ApiError> {
        let url = self.endpoint(&job_id.download_path())?;
        let response = self
            .client
            .get(url)
            .timeout(self.settings.request_timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(rejection(response, "Download failed").await);
        }

        let max_bytes = self.settings.max_download_bytes;
        if let Some(content_len) = response.content_length() {
            if content_len > max_bytes {
                return Err(ApiError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(content_len),
                    },
                    "result workbook too large",
                ));
            }
        }

        let suggested_name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(content_disposition_filename);

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > max_bytes {
                return Err(ApiError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(next_len),
                    },
                    "result workbook too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(DownloadedWorkbook {
            suggested_name,
            bytes,
        })
    }

    async fn health(&self) -> Result<HealthReport, ApiError> {
        let url = self.endpoint("health")?;
        let response = self
            .client
            .get(url)
            .timeout(self.settings.request_timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }
        response
            .json::<HealthReport>()
            .await
            .map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))
    }
}

/// Turns a non-2xx reply into an error carrying the backend's `{error}` text.
async fn rejection(response: reqwest::Response, fallback: &str) -> ApiError {
    let status = response.status().as_u16();
    let message = match response.text().await {
        Ok(text) => serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|body| body.error)
            .filter(|msg| !msg.trim().is_empty())
            .unwrap_or_else(|| fallback.to_string()),
        Err(_) => fallback.to_string(),
    };
    ApiError::new(FailureKind::Rejected { status }, message)
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(FailureKind::Timeout, err.to_string());
    }
    ApiError::new(FailureKind::Network, err.to_string())
}
