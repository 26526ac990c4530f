//! HTTP handlers for the upload front end.

use axum::{
    extract::{multipart::MultipartError, Multipart, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use billscan_ocr::PipelineError;

use crate::routes::AppState;

pub const DEFAULT_SPREADSHEET: &str = "output.xlsx";
const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Pipeline(PipelineError::Decode(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Pipeline(PipelineError::Extraction(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Pipeline(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("{self}");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct FileList {
    pub excel_files: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub excel_file: String,
    pub rows_exported: usize,
    pub excel_files: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ViewQuery {
    pub file: Option<String>,
}

/// List the spreadsheets users can append to.
pub async fn index(State(state): State<AppState>) -> Result<Json<FileList>, ApiError> {
    Ok(Json(FileList { excel_files: spreadsheet_names(&state.excel_dir)? }))
}

/// Run one uploaded bill image through the pipeline into the chosen spreadsheet.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let form = UploadForm::read(&mut multipart).await?;
    let image = form
        .image
        .filter(|i| !i.bytes.is_empty())
        .ok_or_else(|| ApiError::BadRequest("no image uploaded".into()))?;
    let excel_file = resolve_destination(
        form.create_new,
        form.existing_file.as_deref(),
        form.new_file_name.as_deref(),
    )?;

    let destination = state.excel_dir.join(&excel_file);
    let create_new = form.create_new;
    let uploads = state.uploads.clone();
    let build_pipeline = state.pipeline.clone();
    let outcome = tokio::task::spawn_blocking(move || -> Result<_, ApiError> {
        let stored = uploads
            .save(&image.bytes, image.file_name.as_deref())
            .map_err(PipelineError::from)?;
        tracing::info!("Stored upload at {}", stored.display());
        let pipeline = build_pipeline().map_err(|e| ApiError::Internal(format!("{e:#}")))?;
        Ok(pipeline.process_bytes(&image.bytes, &destination, create_new)?)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Task join error: {e}")))??;

    Ok(Json(UploadResponse {
        excel_file,
        rows_exported: outcome.rows_exported,
        excel_files: spreadsheet_names(&state.excel_dir)?,
    }))
}

/// Download a spreadsheet, `output.xlsx` unless the caller names one.
pub async fn view_excel(
    State(state): State<AppState>,
    Query(query): Query<ViewQuery>,
) -> Result<Response, ApiError> {
    let name = query
        .file
        .filter(|f| !f.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SPREADSHEET.to_string());
    validate_file_name(&name)?;

    let content = match tokio::fs::read(state.excel_dir.join(&name)).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound("Excel file not found".into()));
        }
        Err(e) => return Err(ApiError::Internal(format!("Failed to read {name}: {e}"))),
    };

    Ok((
        [
            (header::CONTENT_TYPE, XLSX_MIME.to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{name}\"")),
        ],
        content,
    )
        .into_response())
}

/// Pick the spreadsheet for an upload: a new name when asked to create one,
/// else the selected existing file, else `output.xlsx`.
pub fn resolve_destination(
    create_new: bool,
    existing_file: Option<&str>,
    new_file_name: Option<&str>,
) -> Result<String, ApiError> {
    let name = match (create_new, new_file_name, existing_file) {
        (true, Some(new), _) if new.to_lowercase().ends_with(".xlsx") => new.to_string(),
        (true, Some(new), _) => format!("{new}.xlsx"),
        (_, _, Some(existing)) => existing.to_string(),
        _ => DEFAULT_SPREADSHEET.to_string(),
    };
    validate_file_name(&name)?;
    Ok(name)
}

/// Spreadsheet names must stay inside the spreadsheet directory.
pub fn validate_file_name(name: &str) -> Result<(), ApiError> {
    let bad = name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
        || name.contains('\0');
    if bad {
        return Err(ApiError::BadRequest(format!("invalid file name: {name:?}")));
    }
    Ok(())
}

fn spreadsheet_names(dir: &Path) -> Result<Vec<String>, ApiError> {
    match billscan_storage::list_spreadsheets(dir) {
        Ok(names) => Ok(names),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(ApiError::Internal(format!("Failed to list {}: {e}", dir.display()))),
    }
}

struct UploadedImage {
    file_name: Option<String>,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct UploadForm {
    image: Option<UploadedImage>,
    create_new: bool,
    existing_file: Option<String>,
    new_file_name: Option<String>,
}

impl UploadForm {
    async fn read(multipart: &mut Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" => {
                    let file_name = field.file_name().map(str::to_string);
                    let bytes = field.bytes().await.map_err(bad_multipart)?;
                    form.image = Some(UploadedImage { file_name, bytes: bytes.to_vec() });
                }
                "create_new" => {
                    form.create_new = field.text().await.map_err(bad_multipart)? == "on";
                }
                "existing_file" => {
                    form.existing_file = non_blank(field.text().await.map_err(bad_multipart)?);
                }
                "new_file_name" => {
                    form.new_file_name = non_blank(field.text().await.map_err(bad_multipart)?);
                }
                other => tracing::debug!("Ignoring form field {other:?}"),
            }
        }
        Ok(form)
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn bad_multipart(e: MultipartError) -> ApiError {
    ApiError::BadRequest(format!("malformed upload: {e}"))
}
