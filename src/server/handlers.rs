//! HTTP handlers for the analysis service

use std::path::Path;

use axum::{
    extract::{Multipart, State},
    Json,
};
use log::info;
use mime_guess::mime::{self, Mime};
use serde::Serialize;

use crate::error::AnalystError;
use crate::schema::AnalysisResponse;
use crate::server::error::ApiError;
use crate::server::AppState;

/// Extensions accepted by `POST /analyze`.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["csv", "pdf"];

/// Multipart field carrying the document.
pub const DOCUMENT_FIELD: &str = "file";

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Handler: GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Reject files the assistant cannot read before anything is uploaded.
pub fn ensure_supported(filename: &str) -> Result<(), AnalystError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension {
        Some(ext) if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(AnalystError::UnsupportedMediaType(format!(
            "Invalid file type for '{}'. Please upload a CSV or PDF file.",
            filename
        ))),
    }
}

/// Keep the client's declared type when it parses and says more than octet-stream;
/// otherwise guess from the extension.
fn resolve_mime(filename: &str, declared: Option<&str>) -> String {
    let declared = declared
        .and_then(|raw| raw.parse::<Mime>().ok())
        .filter(|parsed| *parsed != mime::APPLICATION_OCTET_STREAM);

    match declared {
        Some(parsed) => parsed.to_string(),
        None => mime_guess::from_path(filename)
            .first_or_octet_stream()
            .to_string(),
    }
}

/// Handler: POST /analyze
pub async fn analyze(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AnalysisResponse>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidRequest(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some(DOCUMENT_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::InvalidRequest("Uploaded file has no filename".into()))?;
        ensure_supported(&filename)?;

        let mime_type = resolve_mime(&filename, field.content_type());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to read upload: {}", e)))?;
        info!("Received file: {}, content type: {}", filename, mime_type);

        let report = state
            .orchestrator
            .analyze_document(bytes.to_vec(), &filename, &mime_type, None)
            .await?;
        info!("Analysis successful. Returning structured response.");
        return Ok(Json(report));
    }

    Err(ApiError::InvalidRequest(format!(
        "Missing multipart field '{}'",
        DOCUMENT_FIELD
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_extensions_case_insensitive() {
        assert!(ensure_supported("orcamento_2023.csv").is_ok());
        assert!(ensure_supported("Relatorio.PDF").is_ok());
        assert!(matches!(
            ensure_supported("notes.docx"),
            Err(AnalystError::UnsupportedMediaType(_))
        ));
        assert!(ensure_supported("README").is_err());
    }

    #[test]
    fn test_mime_falls_back_to_extension() {
        assert_eq!(resolve_mime("a.pdf", None), "application/pdf");
        assert_eq!(resolve_mime("a.csv", Some("application/octet-stream")), "text/csv");
        assert_eq!(resolve_mime("a.csv", Some("text/plain")), "text/plain");
    }

    #[test]
    fn test_unparseable_mime_falls_back_to_extension() {
        assert_eq!(resolve_mime("balanco.pdf", Some("not a mime")), "application/pdf");
        assert_eq!(resolve_mime("orcamento.csv", Some("")), "text/csv");
    }
}
