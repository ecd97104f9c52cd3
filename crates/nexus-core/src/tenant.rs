//! Tenant context - the pure record threaded through every core operation.
//!
//! The source's Express middleware stack composed tenant context via
//! ambient request-local state. Here it is a single explicit value: every
//! function that touches a store takes a `&TenantContext`, full stop.

use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::error::CoreError;

static ID_PATTERN: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^[A-Za-z0-9_-]+$").expect("static pattern is valid"));

/// Reserved user id for background jobs (decay maintenance, ripple workers).
pub const SYSTEM_USER_ID: &str = "system";

/// The tenant coordinates and request identity carried through every operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    pub company_id: String,
    pub app_id: String,
    pub user_id: String,
    pub session_id: Option<String>,
    pub request_id: String,
}

impl TenantContext {
    pub fn new(
        company_id: impl Into<String>,
        app_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> crate::error::Result<Self> {
        let ctx = Self {
            company_id: company_id.into(),
            app_id: app_id.into(),
            user_id: user_id.into(),
            session_id: None,
            request_id: uuid::Uuid::new_v4().to_string(),
        };
        ctx.validate()?;
        Ok(ctx)
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Construct a context for a background job (decay maintenance, ripple).
    pub fn system(company_id: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            company_id: company_id.into(),
            app_id: app_id.into(),
            user_id: SYSTEM_USER_ID.to_string(),
            session_id: None,
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// `company:app`, the tenant-scoping key used by every store query.
    pub fn tenant_id(&self) -> String {
        format!("{}:{}", self.company_id, self.app_id)
    }

    pub fn is_system(&self) -> bool {
        self.user_id == SYSTEM_USER_ID
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        for (field, value) in [
            ("company_id", &self.company_id),
            ("app_id", &self.app_id),
            ("user_id", &self.user_id),
        ] {
            if !ID_PATTERN.is_match(value) {
                return Err(CoreError::InvalidIdFormat(format!(
                    "{field}={value:?} must match ^[A-Za-z0-9_-]+$"
                )));
            }
        }
        if let Some(session) = &self.session_id {
            if !ID_PATTERN.is_match(session) {
                return Err(CoreError::InvalidIdFormat(format!(
                    "session_id={session:?} must match ^[A-Za-z0-9_-]+$"
                )));
            }
        }
        Ok(())
    }
}
