use axum::{
    extract::{rejection::FormRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use devcerts_cert::SigningIdentity;
use std::io::Cursor;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::bundle::{self, BundleError};
use crate::models::*;
use crate::AppState;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, error: String) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error,
            code: Some(code.to_string()),
        }),
    )
}

/// Issue a certificate and return it as a zip bundle
#[utoipa::path(
    post,
    path = "/create-certificate",
    request_body(
        content = CreateCertificateForm,
        content_type = "application/x-www-form-urlencoded"
    ),
    responses(
        (status = 200, description = "Zip archive holding cert.crt, cert.key and ca.crt"),
        (status = 400, description = "Malformed request or identity", body = ErrorResponse),
        (status = 500, description = "Certificate issuance failed", body = ErrorResponse)
    ),
    tag = "certificates"
)]
pub async fn create_certificate(
    State(state): State<Arc<AppState>>,
    form: Result<Form<CreateCertificateForm>, FormRejection>,
) -> Result<Response, ApiError> {
    let Form(form) = form.map_err(|e| {
        warn!("Rejected certificate form: {}", e);
        api_error(StatusCode::BAD_REQUEST, "INVALID_FORM", e.body_text())
    })?;

    let request: CertificateRequest = serde_json::from_str(&form.data).map_err(|e| {
        warn!("Rejected certificate request: {}", e);
        api_error(StatusCode::BAD_REQUEST, "INVALID_REQUEST", e.to_string())
    })?;

    debug!(
        "Issuing certificate for '{}' ({} names, {} ips)",
        request.common_name,
        request.names.len(),
        request.ips.len()
    );

    let authority = state.authority.clone();
    let common_name = request.common_name.clone();

    // Key generation is CPU bound
    let archive = tokio::task::spawn_blocking(move || issue_bundle(&authority, &request))
        .await
        .map_err(|e| {
            error!("Issuance task failed: {}", e);
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "ISSUANCE_FAILED",
                "Certificate issuance was interrupted".to_string(),
            )
        })?
        .map_err(|e| match e {
            BundleError::Cert(ref cert_error) if cert_error.is_client_error() => {
                warn!("Rejected identity for '{}': {}", common_name, e);
                api_error(StatusCode::BAD_REQUEST, "INVALID_IDENTITY", cert_error.to_string())
            }
            _ => {
                error!("Failed to issue certificate for '{}': {}", common_name, e);
                api_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "ISSUANCE_FAILED",
                    e.to_string(),
                )
            }
        })?;

    info!(
        "Sending certificate bundle for '{}' ({} bytes)",
        common_name,
        archive.len()
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/zip"),
            (header::CONTENT_DISPOSITION, "attachment; filename=cert.zip"),
        ],
        archive,
    )
        .into_response())
}

fn issue_bundle(
    authority: &SigningIdentity,
    request: &CertificateRequest,
) -> Result<Vec<u8>, BundleError> {
    let identity = authority.issue(&request.common_name, &request.names, &request.ips)?;
    let buffer = bundle::write_zip(&identity, Cursor::new(Vec::new()))?;
    Ok(buffer.into_inner())
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
