use async_trait::async_trait;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Authorized,
    NotDetermined,
    Denied,
    Restricted,
}

/// Platform camera-permission check. Presenting the prompt is the
/// implementation's business; the pipeline only needs the answer.
#[async_trait]
pub trait PermissionProvider: Send + Sync {
    async fn status(&self) -> PermissionStatus;

    /// Asks the user. Only called while the status is undetermined.
    async fn request_access(&self) -> bool;
}

/// Resolves whether capture may start: authorized passes, undetermined asks,
/// anything else is a denial.
pub async fn check_permission(provider: &dyn PermissionProvider) -> bool {
    match provider.status().await {
        PermissionStatus::Authorized => true,
        PermissionStatus::NotDetermined => {
            debug!("Camera permission not determined, requesting access");
            let granted = provider.request_access().await;
            info!(granted, "Camera permission request answered");
            granted
        }
        PermissionStatus::Denied | PermissionStatus::Restricted => false,
    }
}

/// Fixed answer, for headless runs where no prompt can be shown.
#[derive(Debug, Clone, Copy)]
pub struct StaticPermission {
    status: PermissionStatus,
    grant_on_request: bool,
}

impl StaticPermission {
    pub fn granted() -> Self {
        Self {
            status: PermissionStatus::Authorized,
            grant_on_request: true,
        }
    }

    pub fn denied() -> Self {
        Self {
            status: PermissionStatus::Denied,
            grant_on_request: false,
        }
    }

    pub fn undetermined(grant_on_request: bool) -> Self {
        Self {
            status: PermissionStatus::NotDetermined,
            grant_on_request,
        }
    }
}

#[async_trait]
impl PermissionProvider for StaticPermission {
    async fn status(&self) -> PermissionStatus {
        self.status
    }

    async fn request_access(&self) -> bool {
        self.grant_on_request
    }
}
