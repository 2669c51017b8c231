use crate::domain::entities::{
    ActorId, AttachmentDirection, AttachmentRecord, FileUpload, TicketId,
};
use crate::infrastructure::http::middleware::{ApiError, ApiResult, AppState};
use crate::services::OutboundTicket;
use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct EncodedFile {
    pub filename: String,
    #[serde(default)]
    pub mime_type: String,
    pub content_base64: String,
}

impl EncodedFile {
    fn decode(self) -> ApiResult<FileUpload> {
        let bytes = general_purpose::STANDARD
            .decode(self.content_base64.trim())
            .map_err(|e| {
                ApiError::BadRequest(format!("Invalid base64 content for {}: {}", self.filename, e))
            })?;
        Ok(FileUpload {
            filename: self.filename,
            mime_type: self.mime_type,
            bytes,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UploadAttachmentRequest {
    pub actor_id: Option<ActorId>,
    #[serde(flatten)]
    pub file: EncodedFile,
}

#[derive(Debug, Serialize)]
pub struct AttachmentResponse {
    pub id: String,
    pub ticket_id: TicketId,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub direction: AttachmentDirection,
    pub uploaded_at: DateTime<Utc>,
    pub uploaded_by: Option<ActorId>,
    pub url: String,
}

impl From<AttachmentRecord> for AttachmentResponse {
    fn from(record: AttachmentRecord) -> Self {
        Self {
            url: format!("/api/attachments/{}/download", record.id),
            id: record.id,
            ticket_id: record.ticket_id,
            filename: record.filename,
            mime_type: record.mime_type,
            size_bytes: record.size_bytes,
            direction: record.direction,
            uploaded_at: record.uploaded_at,
            uploaded_by: record.uploaded_by,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SendTicketRequest {
    pub actor_id: Option<ActorId>,
    pub recipients: Vec<String>,
    pub subject: String,
    pub html_body: Option<String>,
    #[serde(default)]
    pub text_body: String,
    #[serde(default)]
    pub files: Vec<EncodedFile>,
    #[serde(default)]
    pub attachment_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SendTicketResponse {
    pub message_id: String,
    pub recipients: Vec<String>,
    pub failed_recipients: Vec<String>,
    pub attachments: Vec<AttachmentResponse>,
}

pub async fn upload_attachment(
    State(state): State<AppState>,
    Path(ticket_id): Path<TicketId>,
    Json(request): Json<UploadAttachmentRequest>,
) -> ApiResult<(StatusCode, Json<AttachmentResponse>)> {
    let upload = request.file.decode()?;
    let record = state
        .attachment_service
        .receive_attachment(ticket_id, request.actor_id, upload)
        .await?;
    Ok((StatusCode::CREATED, Json(AttachmentResponse::from(record))))
}

pub async fn download_attachment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let (record, bytes) = state.attachment_service.download(&id).await?;

    let content_type = HeaderValue::from_str(&record.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = HeaderValue::from_str(&content_disposition(&record.filename))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// `attachment` disposition with an ASCII `filename` for old clients and an
/// RFC 5987 `filename*` carrying the exact UTF-8 name.
fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();
    if fallback == filename {
        return format!("attachment; filename=\"{}\"", filename);
    }
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    )
}

pub async fn send_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<TicketId>,
    Json(request): Json<SendTicketRequest>,
) -> ApiResult<(StatusCode, Json<SendTicketResponse>)> {
    let files = request
        .files
        .into_iter()
        .map(EncodedFile::decode)
        .collect::<ApiResult<Vec<_>>>()?;

    let sent = state
        .correspondence_service
        .send_ticket(
            ticket_id,
            request.actor_id,
            OutboundTicket {
                recipients: request.recipients,
                subject: request.subject,
                html_body: request.html_body,
                text_body: request.text_body,
                files,
                attachment_ids: request.attachment_ids,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SendTicketResponse {
            message_id: sent.message.id,
            recipients: sent.message.recipients,
            failed_recipients: sent.failed_recipients,
            attachments: sent.attachments.into_iter().map(AttachmentResponse::from).collect(),
        }),
    ))
}
