use std::time::SystemTime;

use parking_lot::{Mutex, RwLock};
use tracing::error;

/// Kind of security-relevant event recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEventKind {
    SecurityViolation,
    Timeout,
    BlockExecute,
    PermissionDenied,
}

/// One structured audit record: what was attempted, on what, and why it was
/// denied (or noted).
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub timestamp: SystemTime,
    pub kind: AuditEventKind,
    pub operation: String,
    pub resource: String,
    pub reason: String,
}

/// External collaborator interface for shipping audit records elsewhere
/// (file, syslog, a tamper-evident store). The in-memory log always keeps a
/// copy regardless of the sink.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord);
}

/// In-memory audit log with an optional forwarding sink.
#[derive(Default)]
pub struct AuditLog {
    records: Mutex<Vec<AuditRecord>>,
    sink: RwLock<Option<Box<dyn AuditSink>>>,
}

impl AuditLog {
    pub fn new() -> Self {
        AuditLog::default()
    }

    pub fn set_sink(&self, sink: Box<dyn AuditSink>) {
        *self.sink.write() = Some(sink);
    }

    pub fn record(
        &self,
        kind: AuditEventKind,
        operation: impl Into<String>,
        resource: impl Into<String>,
        reason: impl Into<String>,
    ) {
        let record = AuditRecord {
            timestamp: SystemTime::now(),
            kind,
            operation: operation.into(),
            resource: resource.into(),
            reason: reason.into(),
        };

        if kind == AuditEventKind::SecurityViolation {
            error!(
                operation = %record.operation,
                resource = %record.resource,
                reason = %record.reason,
                "sandbox violation"
            );
        }

        if let Some(sink) = self.sink.read().as_ref() {
            sink.record(&record);
        }
        self.records.lock().push(record);
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}
