use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

/// Identities to bind into a new certificate
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRequest {
    /// Subject common name
    pub common_name: String,
    /// DNS names for the Subject Alternative Name extension, in order
    #[serde(default, deserialize_with = "null_as_empty")]
    pub names: Vec<String>,
    /// IPv4 or IPv6 literals for the Subject Alternative Name extension
    #[serde(default, deserialize_with = "null_as_empty")]
    pub ips: Vec<String>,
}

/// Treat an explicit `null` list like a missing one
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Form body posted by the web page
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateCertificateForm {
    /// JSON-encoded `CertificateRequest`
    pub data: String,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}
