pub mod directory_source;
pub(crate) mod frame_pump;
pub mod permission;
pub mod session;
pub mod source;

pub use directory_source::DirectorySource;
pub use permission::{PermissionProvider, PermissionStatus, StaticPermission, check_permission};
pub use session::{CaptureSessionManager, PermissionOutcome, SessionSettings};
pub use source::{
    CaptureOutput, CaptureSource, DeviceInfo, RuntimeErrorEvent, RuntimeErrorKind,
};
