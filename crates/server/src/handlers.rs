//! Route handlers for check, upload and merge.

use axum::Json;
use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Multipart, Query, State};
use bigfile_protocol::constants::{FIELD_CHUNK, FIELD_CHUNKS, FIELD_FILE, FIELD_MD5, FIELD_NAME};
use bigfile_protocol::{
    CheckParams, CheckResponse, JsonResult, MergeParams, MergeResponse, UploadResponse,
};
use bigfile_store::ChunkStatus;
use bigfile_transfer::{
    Fingerprint, parse_chunk_index, parse_chunk_total, validate_file_name,
};
use tracing::{debug, instrument};

use crate::AppState;
use crate::error::ApiError;

#[instrument(skip(state))]
pub(crate) async fn check(
    State(state): State<AppState>,
    query: Result<Query<CheckParams>, QueryRejection>,
) -> Result<Json<JsonResult<CheckResponse>>, ApiError> {
    let Query(params) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let fp = Fingerprint::parse(&params.file_md5)?;

    let response = match state.store().check(&fp).await? {
        ChunkStatus::Absent => CheckResponse::absent(),
        ChunkStatus::Complete => CheckResponse::complete(),
        ChunkStatus::PartiallyStored(indices) => CheckResponse::partially_stored(indices),
    };
    Ok(Json(JsonResult::success(response, "")))
}

#[instrument(skip_all)]
pub(crate) async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<JsonResult<UploadResponse>>, ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let chunk = UploadForm::read(&mut multipart).await?.validate()?;

    let count = state
        .store()
        .put_chunk(&chunk.fingerprint, chunk.index, &chunk.bytes)
        .await?;
    debug!(
        fingerprint = %chunk.fingerprint,
        index = chunk.index,
        total = chunk.total,
        count,
        "chunk accepted"
    );

    Ok(Json(JsonResult::success(
        UploadResponse {
            uploaded_chunk_count: count,
        },
        "",
    )))
}

#[instrument(skip(state))]
pub(crate) async fn merge(
    State(state): State<AppState>,
    query: Result<Query<MergeParams>, QueryRejection>,
) -> Result<Json<JsonResult<MergeResponse>>, ApiError> {
    let Query(params) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let fp = Fingerprint::parse(&params.file_md5)?;
    validate_file_name(&params.file_name)?;
    if params.chunks == Some(0) {
        return Err(ApiError::BadRequest(
            "total chunk count must be at least 1".into(),
        ));
    }

    let outcome = state.store().merge(&fp, &params.file_name, params.chunks).await?;
    Ok(Json(JsonResult::success(
        MergeResponse {
            size: outcome.size,
            chunk_count: outcome.chunk_count,
        },
        "",
    )))
}

/// Raw multipart fields of an upload request.
#[derive(Default)]
struct UploadForm {
    file: Option<Bytes>,
    chunk: Option<String>,
    chunks: Option<String>,
    name: Option<String>,
    md5: Option<String>,
}

/// An upload request whose identifying fields have all been validated.
struct ValidatedChunk {
    fingerprint: Fingerprint,
    index: u32,
    total: u32,
    bytes: Bytes,
}

impl UploadForm {
    async fn read(multipart: &mut Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?
        {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            if name == FIELD_FILE {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                form.file = Some(bytes);
                continue;
            }

            let slot = match name.as_str() {
                FIELD_CHUNK => &mut form.chunk,
                FIELD_CHUNKS => &mut form.chunks,
                FIELD_NAME => &mut form.name,
                FIELD_MD5 => &mut form.md5,
                _ => continue,
            };
            *slot = Some(
                field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?,
            );
        }
        Ok(form)
    }

    /// Checks every identifying field before anything touches storage.
    fn validate(self) -> Result<ValidatedChunk, ApiError> {
        let md5 = required(self.md5, FIELD_MD5)?;
        let chunk = required(self.chunk, FIELD_CHUNK)?;
        let chunks = required(self.chunks, FIELD_CHUNKS)?;
        let name = required(self.name, FIELD_NAME)?;
        let bytes = required(self.file, FIELD_FILE)?;

        let fingerprint = Fingerprint::parse(md5.trim())?;
        let index = parse_chunk_index(&chunk)?;
        let total = parse_chunk_total(&chunks)?;
        validate_file_name(&name)?;

        if index >= total {
            return Err(ApiError::BadRequest(format!(
                "chunk index {index} out of range for {total} chunks"
            )));
        }

        Ok(ValidatedChunk {
            fingerprint,
            index,
            total,
            bytes,
        })
    }
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, ApiError> {
    value.ok_or_else(|| ApiError::BadRequest(format!("missing field `{field}`")))
}
