use crate::calc::{both_present, calculate_percentage, pass_percentage};
use crate::model::{PositionKind, PositionSnapshot, ResultRecord, StudentEntry};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub record: ResultRecord,
    /// False when every derived field already matched; callers should keep
    /// their current record and skip the re-render.
    pub changed: bool,
}

/// Brings every derived field of `record` up to date:
///
/// 1. `summary.result` from `(totalStudents, passed)`, only when the class
///    has students.
/// 2. each entry's percentage where both marks and totalMarks are filled in.
/// 3. `firstPosition` from `data[0]` when that entry has a name.
/// 4. `secondPosition` from `data[1]` likewise.
///
/// The snapshot overwrite in steps 3 and 4 is unconditional, so reconciling
/// an already reconciled record is a fixed point.
pub fn reconcile(record: &ResultRecord) -> Reconciled {
    let mut next = record.clone();

    if let Some(result) = pass_percentage(next.summary.total_students, next.summary.passed) {
        next.summary.result = result;
    }

    for entry in next.data.iter_mut() {
        if both_present(&entry.marks, &entry.total_marks) {
            entry.percentage = calculate_percentage(&entry.marks, &entry.total_marks);
        }
    }

    for kind in [PositionKind::FirstPosition, PositionKind::SecondPosition] {
        if let Some(snapshot) = next
            .data
            .get(kind.source_index())
            .filter(|e| !e.name.is_empty())
            .map(snapshot_of)
        {
            *next.summary.position_mut(kind) = snapshot;
        }
    }

    let changed = derived_fields_differ(record, &next);
    Reconciled {
        record: next,
        changed,
    }
}

/// Reconciles in place, leaving `record` untouched when nothing changed.
pub fn reconcile_in_place(record: &mut ResultRecord) -> bool {
    let Reconciled { record: next, changed } = reconcile(record);
    if changed {
        *record = next;
    }
    changed
}

fn snapshot_of(entry: &StudentEntry) -> PositionSnapshot {
    let percentage = if entry.percentage.is_empty() {
        calculate_percentage(&entry.marks, &entry.total_marks)
    } else {
        entry.percentage.clone()
    };
    PositionSnapshot {
        name: entry.name.clone(),
        marks: entry.marks.clone(),
        total_marks: entry.total_marks.clone(),
        percentage,
    }
}

// Only the fields `reconcile` writes can differ between its input and output.
fn derived_fields_differ(before: &ResultRecord, after: &ResultRecord) -> bool {
    before.summary.result != after.summary.result
        || before.summary.first_position != after.summary.first_position
        || before.summary.second_position != after.summary.second_position
        || before
            .data
            .iter()
            .zip(after.data.iter())
            .any(|(a, b)| a.percentage != b.percentage)
}

/// Which fields of a position snapshot the form should render read-only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionLocks {
    /// Snapshot is auto-filled: its name and marks mirror the ranked entry.
    pub name_and_marks: bool,
    pub total_marks: bool,
    pub percentage: bool,
}

impl PositionLocks {
    pub fn auto_filled(&self) -> bool {
        self.name_and_marks
    }
}

pub fn position_locks(record: &ResultRecord, kind: PositionKind) -> PositionLocks {
    let Some(source) = record
        .data
        .get(kind.source_index())
        .filter(|e| !e.name.is_empty())
    else {
        return PositionLocks::default();
    };
    let snapshot = record.summary.position(kind);
    let auto_filled = snapshot.name == source.name && snapshot.marks == source.marks;
    PositionLocks {
        name_and_marks: auto_filled,
        total_marks: auto_filled && snapshot.total_marks == source.total_marks,
        percentage: auto_filled && snapshot.percentage == source.percentage,
    }
}
