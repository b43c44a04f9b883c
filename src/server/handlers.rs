use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ApiError, AppState};
use crate::core::artifacts::ArtifactStore;
use crate::core::notify::NotificationTarget;
use crate::core::queue::{CancelOutcome, Job, JobError, JobSpec, JobStatus};
use crate::core::voice::{CleanupPolicy, StabilityMode, VoiceSettings};

const DEFAULT_VOICE_NAME: &str = "My Voice";

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub message: String,
}

/// Public view of a job; the input text is not echoed back.
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: u8,
    pub stage: String,
    pub voice_name: String,
    pub model_id: String,
    pub voice_id: Option<String>,
    pub chunk_count: Option<usize>,
    pub output_size: Option<u64>,
    pub download_url: Option<String>,
    pub error: Option<JobError>,
    pub cancel_requested: bool,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        let download_url = (job.status == JobStatus::Completed)
            .then(|| format!("/v1/jobs/{}/download", job.id));
        Self {
            job_id: job.id,
            status: job.status,
            progress: job.progress,
            stage: job.stage,
            voice_name: job.voice_name,
            model_id: job.model_id,
            voice_id: job.voice_id,
            chunk_count: job.chunk_count,
            output_size: job.output_size,
            download_url,
            error: job.error,
            cancel_requested: job.cancel_requested,
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub max_chunk_chars: usize,
    pub stability: StabilityMode,
    pub default: bool,
}

// ============================================================================
// Job Submission
// ============================================================================

#[derive(Debug, Default)]
struct CloneForm {
    voice_name: Option<String>,
    text: Option<String>,
    model: Option<String>,
    description: Option<String>,
    notification_email: Option<String>,
    webhook_url: Option<String>,
    stability: Option<f32>,
    similarity_boost: Option<f32>,
    style: Option<f32>,
    delete_voice_on_cancel: bool,
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn parse_unit(field: &str, value: &str) -> Result<f32, ApiError> {
    match value.trim().parse::<f32>() {
        Ok(v) if (0.0..=1.0).contains(&v) => Ok(v),
        _ => Err(ApiError::bad_request(format!(
            "{} must be a number between 0.0 and 1.0",
            field
        ))),
    }
}

fn parse_flag(field: &str, value: &str) -> Result<bool, ApiError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        _ => Err(ApiError::bad_request(format!("{} must be a boolean", field))),
    }
}

/// Stream the multipart body, saving each audio file as it arrives.
async fn read_form(
    state: &AppState,
    multipart: &mut Multipart,
    scope: &str,
    form: &mut CloneForm,
    uploads: &mut Vec<PathBuf>,
) -> Result<(), ApiError> {
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "files" | "files[]" => {
                let Some(file_name) = field.file_name().map(String::from) else {
                    continue;
                };
                let data = field.bytes().await?;
                state.store.validate_upload(&file_name, data.len() as u64)?;
                uploads.push(state.store.save_upload(scope, &data, &file_name).await?);
            }
            "voice_name" => form.voice_name = non_empty(field.text().await?),
            "text" => form.text = Some(field.text().await?),
            "model" => form.model = non_empty(field.text().await?),
            "description" => form.description = non_empty(field.text().await?),
            "notification_email" => form.notification_email = non_empty(field.text().await?),
            "webhook_url" => form.webhook_url = non_empty(field.text().await?),
            "stability" => form.stability = Some(parse_unit(&name, &field.text().await?)?),
            "similarity_boost" => {
                form.similarity_boost = Some(parse_unit(&name, &field.text().await?)?)
            }
            "style" => form.style = Some(parse_unit(&name, &field.text().await?)?),
            "delete_voice_on_cancel" => {
                form.delete_voice_on_cancel = parse_flag(&name, &field.text().await?)?
            }
            other => log::debug!("Ignoring unknown form field '{}'", other),
        }
    }
    Ok(())
}

fn build_spec(state: &AppState, form: CloneForm, uploads: Vec<PathBuf>) -> Result<JobSpec, ApiError> {
    if uploads.is_empty() {
        return Err(ApiError::bad_request("No audio files provided"));
    }

    let text = form.text.as_deref().map(str::trim).unwrap_or_default();
    if text.is_empty() {
        return Err(ApiError::bad_request("Text cannot be empty"));
    }
    let max_chars = state.config.max_text_chars;
    if text.chars().count() > max_chars {
        return Err(ApiError::bad_request(format!(
            "Text too long (max {} characters)",
            max_chars
        )));
    }

    let model = form
        .model
        .unwrap_or_else(|| state.queue.config().default_model.clone());
    if !state.queue.models().contains(&model) {
        let supported: Vec<&str> = state.queue.models().iter().map(|(id, _)| id.as_str()).collect();
        return Err(ApiError::bad_request(format!(
            "Invalid model '{}'. Supported models: {}",
            model,
            supported.join(", ")
        )));
    }

    if let Some(email) = &form.notification_email {
        if !email.contains('@') {
            return Err(ApiError::bad_request("notification_email is not a valid address"));
        }
    }
    if let Some(url) = &form.webhook_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ApiError::bad_request("webhook_url must be an http(s) URL"));
        }
    }

    let voice_name = form.voice_name.as_deref().unwrap_or(DEFAULT_VOICE_NAME);
    let mut spec = JobSpec::new(voice_name, text, &model, uploads)
        .with_notification(NotificationTarget {
            email: form.notification_email,
            webhook_url: form.webhook_url,
        })
        .delete_voice_on_cancel(form.delete_voice_on_cancel);

    if let Some(description) = &form.description {
        spec = spec.with_description(description);
    }
    if form.stability.is_some() || form.similarity_boost.is_some() || form.style.is_some() {
        let defaults = VoiceSettings::default();
        spec = spec.with_settings(VoiceSettings {
            stability: form.stability.unwrap_or(defaults.stability),
            similarity_boost: form.similarity_boost.unwrap_or(defaults.similarity_boost),
            style: form.style.unwrap_or(defaults.style),
            ..defaults
        });
    }
    Ok(spec)
}

/// `POST /v1/voice-clone`
pub async fn submit_job(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let scope = format!("upload_{}", uuid::Uuid::new_v4().simple());
    let mut form = CloneForm::default();
    let mut uploads = Vec::new();

    let submitted = match read_form(&state, &mut multipart, &scope, &mut form, &mut uploads).await {
        Ok(()) => build_spec(&state, form, uploads.clone())
            .and_then(|spec| state.queue.submit(spec).map_err(ApiError::from)),
        Err(e) => Err(e),
    };

    match submitted {
        Ok(job_id) => Ok((
            StatusCode::ACCEPTED,
            Json(SubmitResponse {
                job_id,
                status: JobStatus::Pending,
                message: "Voice clone job queued".to_string(),
            }),
        )),
        Err(e) => {
            state.store.cleanup_temporary(&uploads).await;
            Err(e)
        }
    }
}

// ============================================================================
// Job Queries
// ============================================================================

/// `GET /v1/jobs/:job_id`
pub async fn job_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobResponse>, ApiError> {
    Ok(Json(state.queue.status(&job_id)?.into()))
}

/// `DELETE /v1/jobs/:job_id`
pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let outcome = state.queue.cancel(&job_id)?;
    let message = match outcome {
        CancelOutcome::Cancelled => "Job cancelled",
        CancelOutcome::CancellationRequested => "Cancellation requested; the job stops after its current step",
    };
    Ok(Json(serde_json::json!({
        "job_id": job_id,
        "outcome": outcome,
        "message": message
    })))
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub status: Option<String>,
    pub limit: Option<usize>,
}

/// `GET /v1/jobs?status=&limit=`
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<JobStatus>)
        .transpose()?;
    let jobs: Vec<JobResponse> = state
        .queue
        .list(status, query.limit)
        .into_iter()
        .map(JobResponse::from)
        .collect();
    Ok(Json(serde_json::json!({ "total": jobs.len(), "jobs": jobs })))
}

/// `GET /v1/jobs/:job_id/download`
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
    let job = state.queue.status(&job_id)?;
    if job.status != JobStatus::Completed {
        return Err(ApiError::conflict(format!(
            "Job {} is {}, not completed",
            job_id, job.status
        )));
    }
    let path = job
        .output_path
        .ok_or_else(|| ApiError::not_found("Output file not found"))?;

    let audio = match tokio::fs::read(&path).await {
        Ok(audio) => audio,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::not_found("Output file no longer exists"))
        }
        Err(e) => return Err(ApiError::internal(format!("Failed to read output: {}", e))),
    };

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("voice_clone.mp3")
        .to_string();
    Ok((
        [
            (header::CONTENT_TYPE, "audio/mpeg".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        audio,
    )
        .into_response())
}

// ============================================================================
// Voices, Models, Stats
// ============================================================================

/// `GET /v1/voices`
pub async fn list_voices(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let voices = state.client.list_voices().await?;
    let limit = state.client.voice_limit().await?;
    let managed = voices.iter().filter(|v| v.managed).count();
    Ok(Json(serde_json::json!({
        "total": voices.len(),
        "managed": managed,
        "limit": limit,
        "voices": voices
    })))
}

/// `POST /v1/voices/cleanup`
pub async fn cleanup_voices(
    State(state): State<Arc<AppState>>,
    Json(policy): Json<CleanupPolicy>,
) -> Result<Json<serde_json::Value>, ApiError> {
    log::info!("Voice cleanup requested: {:?}", policy);
    let report = state.queue.capacity().cleanup(&policy).await?;
    Ok(Json(serde_json::json!(report)))
}

/// `GET /v1/models`
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<Vec<ModelInfo>> {
    let default_model = &state.queue.config().default_model;
    Json(
        state
            .queue
            .models()
            .iter()
            .map(|(id, spec)| ModelInfo {
                id: id.clone(),
                max_chunk_chars: spec.max_chunk_chars,
                stability: spec.stability,
                default: id == default_model,
            })
            .collect(),
    )
}

/// `GET /v1/queue/stats`
pub async fn queue_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.queue.stats())
}

/// `GET /health`
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.queue.stats();
    let storage = state.store.directory_stats().await;
    let status = if state.queue.is_shutdown() { "shutting_down" } else { "ok" };

    Json(serde_json::json!({
        "status": status,
        "version": crate::VERSION,
        "provider": state.client.id(),
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "queue": stats,
        "storage": storage
    }))
}
