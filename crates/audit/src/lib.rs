//! Challenge audit trail
//!
//! Every decision the challenger takes (observe, detect, skip, submit,
//! resolve, expire) is appended as one CSV row, off the hot path.

mod auditor;
mod entry;
mod stage;

pub use auditor::{AuditLog, DEFAULT_AUDIT_PATH};
pub use entry::AuditEntry;
pub use stage::ChallengeStage;

use std::{
    path::PathBuf,
    sync::{Arc, OnceLock},
};

static GLOBAL_AUDITOR: OnceLock<Arc<AuditLog>> = OnceLock::new();

/// Install the process-wide audit log. First call wins.
pub fn init_global_auditor(enabled: bool, path: Option<PathBuf>) {
    GLOBAL_AUDITOR.set(Arc::new(AuditLog::new(enabled, path))).ok();
}

/// The process-wide audit log, if installed.
pub fn get_global_auditor() -> Option<Arc<AuditLog>> {
    GLOBAL_AUDITOR.get().cloned()
}

/// Flush the process-wide audit log to the OS.
pub fn flush_global_auditor() -> std::io::Result<()> {
    get_global_auditor().map_or(Ok(()), |audit| audit.flush())
}

/// Flush and fsync the process-wide audit log. Call before exit.
pub fn sync_global_auditor() -> std::io::Result<()> {
    get_global_auditor().map_or(Ok(()), |audit| audit.sync_all())
}
