//! Error types for the planner core
//!
//! Provides error handling for:
//! - Backend requests (transport, status, decode)
//! - Tenant context preconditions
//! - Configuration loading
//! - User-facing notices derived from failures

use serde::Serialize;

/// Main planner error type
///
/// Carries only owned strings so it can be cloned into per-leaf fan-out
/// results and compared inside aggregate views.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlannerError {
    /// Non-success HTTP status with the backend's `detail`/`message`
    #[error("HTTP {status}: {detail}")]
    Http {
        /// Status code
        status: u16,
        /// Extracted detail text
        detail: String,
    },

    /// Request never produced a response
    #[error("transport error: {0}")]
    Transport(String),

    /// Response body could not be decoded
    #[error("decode error: {0}")]
    Decode(String),

    /// Tenant identifier or slug missing before a tenant-scoped request
    #[error("missing tenant context: {0}")]
    MissingTenantContext(String),

    /// Operation refused by role or view gating
    #[error("not permitted: {0}")]
    NotPermitted(String),

    /// Rejected input before any request was made
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl PlannerError {
    /// Create HTTP status error
    #[inline]
    pub fn http(status: u16, detail: impl Into<String>) -> Self {
        Self::Http {
            status,
            detail: detail.into(),
        }
    }

    /// Status code, if this error came from a response
    #[inline]
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if the backend answered "not found"
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Check if the credential was rejected
    #[inline]
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Check if the request was forbidden
    #[inline]
    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        self.status() == Some(403)
    }

    /// Check for a 403 caused by the endpoint's role requirement
    ///
    /// The backend phrases these as `Requiere rol admin` or
    /// `Requiere rol cliente (IES)`.
    #[must_use]
    pub fn is_role_mismatch(&self) -> bool {
        match self {
            Self::Http { status: 403, detail } => {
                let detail = detail.to_lowercase();
                detail.contains("requiere rol") || detail.contains("requires role")
            }
            _ => false,
        }
    }
}

/// Result alias used across the core
pub type Result<T, E = PlannerError> = std::result::Result<T, E>;

/// Notice severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational
    Info,
    /// Completed action
    Success,
    /// Refused action, recoverable
    Warning,
    /// Failure
    Danger,
}

/// User-facing notice
///
/// Every refused transition and every surfaced failure is expressed as one
/// of these; rendering is left to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// Administrator must pick a tenant before any data view
    SelectTenantFirst,
    /// Administrators do not fill operational records
    AdminCannotEditOperational,
    /// Tenant id or slug missing from the session
    MissingTenantContext {
        /// What is missing
        missing: String,
    },
    /// 401 from the backend
    SessionExpired,
    /// 403 caused by the endpoint's role requirement
    RoleMismatch {
        /// Operation context
        context: String,
        /// Backend detail
        detail: String,
    },
    /// Any other 403
    Forbidden {
        /// Operation context
        context: String,
        /// Backend detail
        detail: String,
    },
    /// Generic failure
    Failed {
        /// Operation context
        context: String,
        /// Error detail
        detail: String,
    },
    /// Record saved
    Saved,
}

impl Notice {
    /// Map an error to the notice shown for it
    #[must_use]
    pub fn from_error(context: impl Into<String>, error: &PlannerError) -> Self {
        let context = context.into();
        match error {
            e if e.is_unauthorized() => Self::SessionExpired,
            e if e.is_role_mismatch() => Self::RoleMismatch {
                context,
                detail: detail_of(e),
            },
            e if e.is_forbidden() => Self::Forbidden {
                context,
                detail: detail_of(e),
            },
            PlannerError::MissingTenantContext(missing) => Self::MissingTenantContext {
                missing: missing.clone(),
            },
            e => Self::Failed {
                context,
                detail: detail_of(e),
            },
        }
    }

    /// Severity for styling
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::SelectTenantFirst => Severity::Info,
            Self::Saved => Severity::Success,
            Self::AdminCannotEditOperational
            | Self::MissingTenantContext { .. }
            | Self::SessionExpired => Severity::Warning,
            Self::RoleMismatch { .. } | Self::Forbidden { .. } | Self::Failed { .. } => {
                Severity::Danger
            }
        }
    }

    /// Short title
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Self::SelectTenantFirst | Self::MissingTenantContext { .. } => "Tenant",
            Self::AdminCannotEditOperational => "Administrator mode",
            Self::SessionExpired => "Session",
            Self::RoleMismatch { .. } | Self::Forbidden { .. } => "Permissions",
            Self::Failed { .. } => "Error",
            Self::Saved => "Operational",
        }
    }

    /// Full message
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::SelectTenantFirst => {
                "Select a tenant first to open its general summary.".to_string()
            }
            Self::AdminCannotEditOperational => {
                "Administrators do not fill operational records. Use the general summary."
                    .to_string()
            }
            Self::MissingTenantContext { missing } => format!(
                "The session has no tenant {missing}. Check the tenant configuration of this account."
            ),
            Self::SessionExpired => {
                "Your session expired or is not valid. Sign in again.".to_string()
            }
            Self::RoleMismatch { context, detail } => format!(
                "{}The backend endpoint does not grant this role access ({detail}). \
                 This is a server-side permission, not a client error.",
                prefix(context)
            ),
            Self::Forbidden { context, detail } => {
                let detail = if detail.is_empty() {
                    "Access denied."
                } else {
                    detail.as_str()
                };
                format!("{}{detail}", prefix(context))
            }
            Self::Failed { context, detail } => format!("{}{detail}", prefix(context)),
            Self::Saved => "Row saved.".to_string(),
        }
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title(), self.message())
    }
}

fn detail_of(error: &PlannerError) -> String {
    match error {
        PlannerError::Http { detail, .. } => detail.clone(),
        other => other.to_string(),
    }
}

fn prefix(context: &str) -> String {
    if context.is_empty() {
        String::new()
    } else {
        format!("{context}. ")
    }
}
