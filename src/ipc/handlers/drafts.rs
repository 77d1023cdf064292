use crate::db;
use crate::edit::{is_removable, FieldEdit, PositionField, FIRST_REMOVABLE_INDEX};
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::results::locks_json;
use crate::ipc::helpers::{optional_str, required_param, HandlerErr};
use crate::ipc::types::{AppState, Draft, Request};
use crate::model::ResultRecord;
use crate::reconcile::{position_locks, reconcile};
use serde_json::json;
use tracing::{debug, info};

fn draft_view(draft: &Draft) -> serde_json::Value {
    let removable: Vec<bool> = (0..draft.record.data.len()).map(is_removable).collect();
    json!({
        "resultId": draft.result_id,
        "dirty": draft.dirty,
        "record": draft.record,
        "locks": locks_json(&draft.record),
        "removable": removable,
    })
}

/// Rejects edits the form would not offer: removing a podium row, touching a
/// row that does not exist, or overwriting a read-only snapshot field.
fn check_edit(record: &ResultRecord, edit: &FieldEdit) -> Result<(), HandlerErr> {
    match edit {
        FieldEdit::RemoveStudent { index } => {
            if !is_removable(*index) {
                return Err(HandlerErr::bad_params(format!(
                    "rows before index {FIRST_REMOVABLE_INDEX} cannot be removed"
                ))
                .with_details(json!({ "index": index })));
            }
            if *index >= record.data.len() {
                return Err(HandlerErr::bad_params("student index out of range")
                    .with_details(json!({ "index": index, "rows": record.data.len() })));
            }
        }
        FieldEdit::Student { index, .. } => {
            if *index >= record.data.len() {
                return Err(HandlerErr::bad_params("student index out of range")
                    .with_details(json!({ "index": index, "rows": record.data.len() })));
            }
        }
        FieldEdit::Position {
            position, field, ..
        } => {
            let locks = position_locks(record, *position);
            let locked = match field {
                PositionField::Name | PositionField::Marks => locks.auto_filled(),
                PositionField::TotalMarks => locks.total_marks,
                PositionField::Percentage => locks.percentage,
            };
            if locked {
                return Err(HandlerErr {
                    code: "field_locked",
                    message: "field is filled from the ranked student list".to_string(),
                    details: Some(json!({ "position": position, "field": field })),
                });
            }
        }
        FieldEdit::TopLevel { .. } | FieldEdit::Summary { .. } | FieldEdit::AddStudent => {}
    }
    Ok(())
}

fn handle_drafts_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let draft = match optional_str(req, "resultId") {
        Some(result_id) => {
            let Some(conn) = state.db.as_ref() else {
                return err(&req.id, "no_workspace", "select a workspace first", None);
            };
            match db::results_get(conn, &result_id) {
                Ok(stored) => Draft {
                    result_id: Some(stored.id),
                    record: stored.record,
                    dirty: false,
                },
                Err(e) => return HandlerErr::store(e, "query").response(&req.id),
            }
        }
        None => Draft {
            result_id: None,
            record: ResultRecord::default(),
            dirty: false,
        },
    };

    info!(result_id = ?draft.result_id, "draft opened");
    let view = draft_view(&draft);
    state.draft = Some(draft);
    ok(&req.id, json!({ "draft": view }))
}

fn handle_drafts_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    match state.draft.as_ref() {
        Some(draft) => ok(&req.id, json!({ "draft": draft_view(draft) })),
        None => err(&req.id, "no_draft", "open a draft first", None),
    }
}

fn handle_drafts_apply(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(draft) = state.draft.as_mut() else {
        return err(&req.id, "no_draft", "open a draft first", None);
    };
    let edit: FieldEdit = match required_param(req, "edit") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    if let Err(e) = check_edit(&draft.record, &edit) {
        return e.response(&req.id);
    }

    let edited = edit.apply(&draft.record);
    let out = reconcile(&edited);
    debug!(kind = edit.kind(), reconciled = out.changed, "draft edit applied");

    if out.record != draft.record {
        draft.record = out.record;
        draft.dirty = true;
    }
    ok(
        &req.id,
        json!({ "draft": draft_view(draft), "reconciled": out.changed }),
    )
}

fn handle_drafts_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(draft) = state.draft.as_mut() else {
        return err(&req.id, "no_draft", "open a draft first", None);
    };

    let result_id = match draft.result_id.clone() {
        Some(id) => match db::results_update(conn, &id, &draft.record) {
            Ok(()) => id,
            Err(e) => return HandlerErr::store(e, "update").response(&req.id),
        },
        None => match db::results_create(conn, &draft.record) {
            Ok(id) => id,
            Err(e) => return HandlerErr::store(e, "insert").response(&req.id),
        },
    };

    info!(%result_id, year = %draft.record.year, class = %draft.record.class, "draft saved");
    draft.result_id = Some(result_id.clone());
    draft.dirty = false;
    ok(
        &req.id,
        json!({ "resultId": result_id, "draft": draft_view(draft) }),
    )
}

fn handle_drafts_discard(state: &mut AppState, req: &Request) -> serde_json::Value {
    let discarded = state.draft.take().is_some();
    ok(&req.id, json!({ "discarded": discarded }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "drafts.open" => Some(handle_drafts_open(state, req)),
        "drafts.get" => Some(handle_drafts_get(state, req)),
        "drafts.apply" => Some(handle_drafts_apply(state, req)),
        "drafts.save" => Some(handle_drafts_save(state, req)),
        "drafts.discard" => Some(handle_drafts_discard(state, req)),
        _ => None,
    }
}
