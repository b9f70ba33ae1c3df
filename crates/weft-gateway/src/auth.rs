use weft_core::config::{ApiKeyRole, GatewayConfig};
use weft_core::error::{Result, WeftError};

/// Result of a successful authentication.
///
/// The key name becomes the owner id every execution the caller starts or
/// reads is scoped to.
#[derive(Debug, Clone)]
pub struct AuthResult {
    pub name: String,
    pub role: ApiKeyRole,
}

/// Validate a Bearer token against the configured api_keys.
///
/// With no keys configured the gateway runs open: every request is the
/// anonymous admin. Once any key exists, a matching Bearer is required.
///
/// Fails with `WeftError::Auth` when the token is missing or unknown.
pub fn validate_auth(config: &GatewayConfig, bearer: Option<&str>) -> Result<AuthResult> {
    if let Some(bearer_val) = bearer {
        for ak in &config.api_keys {
            if ak.key == bearer_val {
                return Ok(AuthResult {
                    name: ak.name.clone(),
                    role: ak.role.clone(),
                });
            }
        }
        return Err(WeftError::Auth("Unknown API key".to_string()));
    }

    if config.api_keys.is_empty() {
        Ok(AuthResult {
            name: "anonymous".into(),
            role: ApiKeyRole::Admin,
        })
    } else {
        Err(WeftError::Auth("Missing Bearer token".to_string()))
    }
}

/// Check if a role has at least viewer-level access.
pub fn has_viewer_access(role: &ApiKeyRole) -> bool {
    matches!(
        role,
        ApiKeyRole::Viewer | ApiKeyRole::Operator | ApiKeyRole::Admin
    )
}

/// Check if a role has at least operator-level access.
pub fn has_operator_access(role: &ApiKeyRole) -> bool {
    matches!(role, ApiKeyRole::Operator | ApiKeyRole::Admin)
}
