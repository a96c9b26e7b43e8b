//! Task instance state machine: legal transitions for a single task
//! occurrence and the evidence each one requires.
//!
//! The guards here are pure; `service` executes them as guarded
//! conditional UPDATEs. Terminal outcomes are never reversed and
//! instances are never reopened.

pub mod service;
pub mod vitals;

use hearth_db::models::TaskStatus;

/// Transition guards over [`TaskStatus`].
///
/// `complete` and `report_issue` are deliberately permissive about the
/// source state (a missed task can still be completed late, an issue can
/// be reported on a skipped one); `skip` is only legal while the task is
/// still open.
pub struct TaskStateMachine;

impl TaskStateMachine {
    pub fn can_start(status: TaskStatus) -> bool {
        matches!(status, TaskStatus::Scheduled)
    }

    pub fn can_complete(status: TaskStatus) -> bool {
        !matches!(status, TaskStatus::Completed | TaskStatus::Cancelled)
    }

    pub fn can_skip(status: TaskStatus) -> bool {
        matches!(status, TaskStatus::Scheduled | TaskStatus::InProgress)
    }

    pub fn can_report_issue(status: TaskStatus) -> bool {
        !matches!(status, TaskStatus::Completed | TaskStatus::Cancelled)
    }

    pub fn can_cancel(status: TaskStatus) -> bool {
        matches!(status, TaskStatus::Scheduled | TaskStatus::InProgress)
    }

    pub fn can_mark_missed(status: TaskStatus) -> bool {
        matches!(status, TaskStatus::Scheduled)
    }
}

/// Collect every unmet completion requirement, not just the first.
pub fn completion_violations(
    require_signature: bool,
    require_note: bool,
    has_signature: bool,
    note: Option<&str>,
) -> Vec<String> {
    let mut violations = Vec::new();
    if require_signature && !has_signature {
        violations.push("a signature is required to complete this task".to_owned());
    }
    if require_note && note.is_none_or(|n| n.trim().is_empty()) {
        violations.push("a completion note is required for this task".to_owned());
    }
    violations
}
