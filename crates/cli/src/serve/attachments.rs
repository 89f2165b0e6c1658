//! Attachment upload, listing and download.

use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use uuid::Uuid;

use pactum_core::{Actor, Attachment, User};
use pactum_storage::{apply, ContractStore as _};

use super::error::ApiError;
use super::state::AppState;

/// POST /api/contracts/{id}/attachments -- multipart upload; the first
/// `file` field is stored.
pub(crate) async fn handle_upload_attachment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(contract_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Attachment>), ApiError> {
    let actor = Actor::from(&user);

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| "file".to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        if bytes.is_empty() {
            return Err(ApiError::bad_request("uploaded file is empty"));
        }

        let attachment = apply::add_attachment(
            &state.store,
            &state.blobs,
            contract_id,
            &file_name,
            &bytes,
            &actor,
        )
        .await?;
        return Ok((StatusCode::CREATED, Json(attachment)));
    }

    Err(ApiError::bad_request("multipart field 'file' is required"))
}

/// GET /api/contracts/{id}/attachments
pub(crate) async fn handle_list_attachments(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(contract_id): Path<Uuid>,
) -> Result<Json<Vec<Attachment>>, ApiError> {
    let actor = Actor::from(&user);
    apply::fetch_contract(&state.store, contract_id, &actor).await?;
    Ok(Json(state.store.list_attachments(contract_id).await?))
}

/// GET /api/contracts/{id}/attachments/{attachment_id} -- download.
pub(crate) async fn handle_download_attachment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path((contract_id, attachment_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, ApiError> {
    let actor = Actor::from(&user);
    let (attachment, bytes) = apply::fetch_attachment(
        &state.store,
        &state.blobs,
        contract_id,
        attachment_id,
        &actor,
    )
    .await?;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                "application/octet-stream".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(&attachment.file_name),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// Build a Content-Disposition value that survives non-ASCII file names:
/// an ASCII fallback plus the RFC 5987 `filename*` form.
fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_graphic() && c != '"' && c != '\\' {
                c
            } else if c == ' ' {
                ' '
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        percent_encode(file_name)
    )
}

fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len() * 3);
    for b in s.bytes() {
        match b {
            b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'-' | b'.' | b'_' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_names_pass_through() {
        assert_eq!(
            content_disposition("report.pdf"),
            "attachment; filename=\"report.pdf\"; filename*=UTF-8''report.pdf"
        );
    }

    #[test]
    fn non_ascii_names_get_percent_encoded() {
        let value = content_disposition("合同.pdf");
        assert!(value.contains("filename=\"__.pdf\""));
        assert!(value.contains("filename*=UTF-8''%E5%90%88%E5%90%8C.pdf"));
    }
}
