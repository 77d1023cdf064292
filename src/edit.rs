use crate::calc::{both_present, calculate_percentage, parse_count};
use crate::model::{ClassName, PositionKind, ResultRecord, StudentEntry};
use serde::{Deserialize, Deserializer, Serialize};

/// Rows below this index are the seeded podium rows and stay in the form.
pub const FIRST_REMOVABLE_INDEX: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TopLevelField {
    Year,
    Class,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StudentField {
    Position,
    Name,
    Marks,
    TotalMarks,
    Percentage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SummaryField {
    TotalStudents,
    Passed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PositionField {
    Name,
    Marks,
    TotalMarks,
    Percentage,
}

pub fn edit_top_level_field(
    record: &ResultRecord,
    field: TopLevelField,
    value: &str,
) -> ResultRecord {
    let mut next = record.clone();
    match field {
        TopLevelField::Year => next.year = value.to_string(),
        TopLevelField::Class => {
            if let Ok(class) = value.parse::<ClassName>() {
                next.class = class;
            }
        }
    }
    next
}

pub fn edit_student_field(
    record: &ResultRecord,
    index: usize,
    field: StudentField,
    value: &str,
) -> ResultRecord {
    let mut next = record.clone();
    if index >= next.data.len() {
        return next;
    }
    let entry = &mut next.data[index];
    let slot = match field {
        StudentField::Position => &mut entry.position,
        StudentField::Name => &mut entry.name,
        StudentField::Marks => &mut entry.marks,
        StudentField::TotalMarks => &mut entry.total_marks,
        StudentField::Percentage => &mut entry.percentage,
    };
    *slot = value.to_string();

    if matches!(field, StudentField::Marks | StudentField::TotalMarks)
        && both_present(&entry.marks, &entry.total_marks)
    {
        entry.percentage = calculate_percentage(&entry.marks, &entry.total_marks);
    }
    next
}

pub fn edit_summary_field(
    record: &ResultRecord,
    field: SummaryField,
    value: &str,
) -> ResultRecord {
    let mut next = record.clone();
    let count = parse_count(value);
    match field {
        SummaryField::TotalStudents => next.summary.total_students = count,
        SummaryField::Passed => next.summary.passed = count,
    }
    next
}

pub fn edit_position_field(
    record: &ResultRecord,
    kind: PositionKind,
    field: PositionField,
    value: &str,
) -> ResultRecord {
    let mut next = record.clone();
    let snapshot = next.summary.position_mut(kind);
    let slot = match field {
        PositionField::Name => &mut snapshot.name,
        PositionField::Marks => &mut snapshot.marks,
        PositionField::TotalMarks => &mut snapshot.total_marks,
        PositionField::Percentage => &mut snapshot.percentage,
    };
    *slot = value.to_string();

    if matches!(field, PositionField::Marks | PositionField::TotalMarks)
        && both_present(&snapshot.marks, &snapshot.total_marks)
    {
        snapshot.percentage = calculate_percentage(&snapshot.marks, &snapshot.total_marks);
    }
    next
}

/// Appends a blank row labelled `"<n+1>th"`.
pub fn add_student(record: &ResultRecord) -> ResultRecord {
    let mut next = record.clone();
    let label = format!("{}th", next.data.len() + 1);
    next.data.push(StudentEntry::blank(label));
    next
}

/// Removes the row at `index`. Removal policy is the caller's concern, see
/// [`is_removable`].
pub fn remove_student(record: &ResultRecord, index: usize) -> ResultRecord {
    let mut next = record.clone();
    if index < next.data.len() {
        next.data.remove(index);
    }
    next
}

pub fn is_removable(index: usize) -> bool {
    index >= FIRST_REMOVABLE_INDEX
}

/// A single form edit as sent by the admin UI.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FieldEdit {
    TopLevel {
        field: TopLevelField,
        #[serde(deserialize_with = "text_or_number")]
        value: String,
    },
    Student {
        index: usize,
        field: StudentField,
        #[serde(deserialize_with = "text_or_number")]
        value: String,
    },
    Summary {
        field: SummaryField,
        #[serde(deserialize_with = "text_or_number")]
        value: String,
    },
    Position {
        position: PositionKind,
        field: PositionField,
        #[serde(deserialize_with = "text_or_number")]
        value: String,
    },
    AddStudent,
    RemoveStudent {
        index: usize,
    },
}

impl FieldEdit {
    pub fn apply(&self, record: &ResultRecord) -> ResultRecord {
        match self {
            FieldEdit::TopLevel { field, value } => edit_top_level_field(record, *field, value),
            FieldEdit::Student {
                index,
                field,
                value,
            } => edit_student_field(record, *index, *field, value),
            FieldEdit::Summary { field, value } => edit_summary_field(record, *field, value),
            FieldEdit::Position {
                position,
                field,
                value,
            } => edit_position_field(record, *position, *field, value),
            FieldEdit::AddStudent => add_student(record),
            FieldEdit::RemoveStudent { index } => remove_student(record, *index),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FieldEdit::TopLevel { .. } => "topLevel",
            FieldEdit::Student { .. } => "student",
            FieldEdit::Summary { .. } => "summary",
            FieldEdit::Position { .. } => "position",
            FieldEdit::AddStudent => "addStudent",
            FieldEdit::RemoveStudent { .. } => "removeStudent",
        }
    }
}

// Form inputs arrive as strings, but numeric widgets may send raw numbers.
fn text_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}
