use std::error::Error as StdError;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tokio_util::sync::CancellationToken;

use super::{
    AnalysisError, AnalysisResult, CaseSubmission, ImageUpload, Lifecycle, SubmissionState,
    ValidationError,
};
use crate::config::{ClientConfig, APP_NAME, APP_VERSION};

/// Multipart field carrying the free-text symptom description.
pub const SYMPTOMS_FIELD: &str = "symptoms";
/// Multipart field carrying the image file.
pub const IMAGE_FIELD: &str = "image";
/// Multipart field referencing a prior case.
pub const FOLLOW_UP_FIELD: &str = "follow_up_case_id";

/// Anything that can turn a symptom description and an image into a triage
/// assessment. `AnalysisClient` is the HTTP implementation.
#[async_trait]
pub trait TriageAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        symptom_description: &str,
        image: ImageUpload,
        follow_up_case_id: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<AnalysisResult, AnalysisError>;
}

/// HTTP client for the analysis service's `POST /analyze/` endpoint.
///
/// Each call validates locally, sends one multipart request and waits at
/// most `config.timeout` for the complete response. Nothing is retried.
#[derive(Clone)]
pub struct AnalysisClient {
    config: ClientConfig,
    http: reqwest::Client,
}

impl AnalysisClient {
    pub fn new(config: ClientConfig) -> Result<Self, AnalysisError> {
        let http = reqwest::Client::builder()
            .user_agent(format!("{APP_NAME}/{APP_VERSION}"))
            .build()
            .map_err(|e| AnalysisError::Network(format!("failed to create HTTP client: {e}")))?;
        Ok(Self::with_http_client(config, http))
    }

    /// Use a caller-provided `reqwest::Client` (proxies, custom TLS roots).
    pub fn with_http_client(config: ClientConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Validate and submit one case.
    pub async fn submit(
        &self,
        symptom_description: &str,
        image: ImageUpload,
        follow_up_case_id: Option<String>,
    ) -> Result<AnalysisResult, AnalysisError> {
        self.submit_with_cancel(
            symptom_description,
            image,
            follow_up_case_id,
            &CancellationToken::new(),
        )
        .await
    }

    /// Validate and submit one case. Cancelling `cancel` while the request is
    /// in flight drops it and ends the submission with a network error.
    pub async fn submit_with_cancel(
        &self,
        symptom_description: &str,
        image: ImageUpload,
        follow_up_case_id: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<AnalysisResult, AnalysisError> {
        let mut lifecycle = Lifecycle::new();
        record(&mut lifecycle, SubmissionState::Validating);

        let submission = match CaseSubmission::new(
            symptom_description,
            image,
            follow_up_case_id,
            self.config.max_image_bytes,
        ) {
            Ok(submission) => submission,
            Err(e) => {
                tracing::info!(submission_id = %lifecycle.id(), reason = %e, "Submission rejected");
                record(&mut lifecycle, SubmissionState::Rejected);
                return Err(e.into());
            }
        };

        self.dispatch(lifecycle, submission, cancel).await
    }

    /// Submit an already-validated case.
    pub async fn send(
        &self,
        submission: CaseSubmission,
        cancel: &CancellationToken,
    ) -> Result<AnalysisResult, AnalysisError> {
        let mut lifecycle = Lifecycle::new();
        record(&mut lifecycle, SubmissionState::Validating);
        self.dispatch(lifecycle, submission, cancel).await
    }

    async fn dispatch(
        &self,
        mut lifecycle: Lifecycle,
        submission: CaseSubmission,
        cancel: &CancellationToken,
    ) -> Result<AnalysisResult, AnalysisError> {
        let symptom_chars = submission.symptom_description().chars().count();
        let image_bytes = submission.image().size_bytes();
        let follow_up = submission.follow_up_case_id().is_some();

        let form = match build_form(submission) {
            Ok(form) => form,
            Err(e) => {
                record(&mut lifecycle, SubmissionState::Rejected);
                return Err(e.into());
            }
        };

        record(&mut lifecycle, SubmissionState::Sending);
        tracing::info!(
            submission_id = %lifecycle.id(),
            url = %self.config.analyze_url(),
            symptom_chars,
            image_bytes,
            follow_up,
            "Submitting case for analysis"
        );

        let started = Instant::now();
        let timeout = self.config.timeout;

        // Dropping the exchange future aborts the underlying request.
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                Err(AnalysisError::Network("request aborted by caller".into()))
            }
            res = tokio::time::timeout(timeout, self.exchange(form)) => {
                res.unwrap_or(Err(AnalysisError::Timeout(timeout)))
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(result) => {
                record(&mut lifecycle, SubmissionState::Succeeded);
                tracing::info!(
                    submission_id = %lifecycle.id(),
                    elapsed_ms,
                    case_id = result.case_id.as_deref().unwrap_or("-"),
                    urgency = %result.urgency(),
                    "Analysis complete"
                );
            }
            Err(e) => {
                record(&mut lifecycle, e.terminal_state());
                tracing::warn!(
                    submission_id = %lifecycle.id(),
                    elapsed_ms,
                    kind = e.kind(),
                    error = %e,
                    "Analysis failed"
                );
            }
        }
        outcome
    }

    /// One request/response round trip, without deadline or cancellation.
    async fn exchange(&self, form: Form) -> Result<AnalysisResult, AnalysisError> {
        let response = self
            .http
            .post(self.config.analyze_url())
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!(
                        status = status.as_u16(),
                        error = %error_chain(&e),
                        "Failed to read error response body"
                    );
                    String::new()
                }
            };
            return Err(AnalysisError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        serde_json::from_str::<AnalysisResult>(&body).map_err(|e| {
            tracing::warn!(status = status.as_u16(), error = %e, "Malformed analysis result");
            AnalysisError::Server {
                status: status.as_u16(),
                body,
            }
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> AnalysisError {
        if e.is_timeout() {
            AnalysisError::Timeout(self.config.timeout)
        } else if e.is_connect() {
            AnalysisError::Network(format!(
                "cannot reach analysis service at {}: {}",
                self.config.base_url,
                error_chain(&e)
            ))
        } else {
            AnalysisError::Network(error_chain(&e))
        }
    }
}

#[async_trait]
impl TriageAnalyzer for AnalysisClient {
    async fn analyze(
        &self,
        symptom_description: &str,
        image: ImageUpload,
        follow_up_case_id: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<AnalysisResult, AnalysisError> {
        self.submit_with_cancel(symptom_description, image, follow_up_case_id, cancel)
            .await
    }
}

fn build_form(submission: CaseSubmission) -> Result<Form, ValidationError> {
    let (symptoms, image, follow_up_case_id) = submission.into_parts();
    let part = Part::bytes(image.bytes)
        .file_name(image.file_name)
        .mime_str(&image.media_type)
        .map_err(|_| ValidationError::InvalidImageType)?;

    let mut form = Form::new()
        .text(SYMPTOMS_FIELD, symptoms)
        .part(IMAGE_FIELD, part);
    if let Some(case_id) = follow_up_case_id {
        form = form.text(FOLLOW_UP_FIELD, case_id);
    }
    Ok(form)
}

fn record(lifecycle: &mut Lifecycle, next: SubmissionState) {
    if let Err(e) = lifecycle.advance(next) {
        tracing::error!(submission_id = %lifecycle.id(), "{e}");
    }
}

/// "outer: inner: innermost", so "connection refused" survives into the message.
fn error_chain(e: &dyn StdError) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(inner) = source {
        let text = inner.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = inner.source();
    }
    message
}
