use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{optional_str, required_record, required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{ClassName, PositionKind, ResultRecord};
use crate::reconcile::{position_locks, reconcile};
use serde_json::json;
use tracing::info;

pub fn locks_json(record: &ResultRecord) -> serde_json::Value {
    json!({
        "firstPosition": position_locks(record, PositionKind::FirstPosition),
        "secondPosition": position_locks(record, PositionKind::SecondPosition),
    })
}

fn handle_results_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "results": [] }));
    };

    let year = optional_str(req, "year");
    let class = match optional_str(req, "class").map(|c| c.parse::<ClassName>()) {
        None => None,
        Some(Ok(c)) => Some(c),
        Some(Err(e)) => {
            return err(
                &req.id,
                "bad_params",
                e.to_string(),
                Some(json!({ "allowed": ClassName::ALL.map(ClassName::as_str) })),
            )
        }
    };

    match db::results_list(conn, year.as_deref(), class) {
        Ok(results) => ok(&req.id, json!({ "results": results })),
        Err(e) => HandlerErr::store(e, "query").response(&req.id),
    }
}

fn handle_results_years(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "years": [] }));
    };
    match db::results_years(conn) {
        Ok(years) => ok(&req.id, json!({ "years": years })),
        Err(e) => HandlerErr::store(e, "query").response(&req.id),
    }
}

fn handle_results_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let result_id = match required_str(req, "resultId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match db::results_get(conn, &result_id) {
        Ok(stored) => ok(&req.id, json!({ "result": stored })),
        Err(e) => HandlerErr::store(e, "query").response(&req.id),
    }
}

fn handle_results_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let record = match required_record(req) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match db::results_create(conn, &record) {
        Ok(result_id) => {
            info!(%result_id, year = %record.year, class = %record.class, "result created");
            ok(&req.id, json!({ "resultId": result_id }))
        }
        Err(e) => HandlerErr::store(e, "insert").response(&req.id),
    }
}

fn handle_results_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let result_id = match required_str(req, "resultId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let record = match required_record(req) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match db::results_update(conn, &result_id, &record) {
        Ok(()) => {
            info!(%result_id, "result updated");
            ok(&req.id, json!({ "ok": true, "resultId": result_id }))
        }
        Err(e) => HandlerErr::store(e, "update").response(&req.id),
    }
}

fn handle_results_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let result_id = match required_str(req, "resultId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    if let Err(e) = db::results_delete(conn, &result_id) {
        return HandlerErr::store(e, "delete").response(&req.id);
    }
    info!(%result_id, "result deleted");

    // Saving an open draft of the deleted record creates a fresh one.
    if let Some(draft) = state.draft.as_mut() {
        if draft.result_id.as_deref() == Some(result_id.as_str()) {
            draft.result_id = None;
            draft.dirty = true;
        }
    }
    ok(&req.id, json!({ "ok": true }))
}

fn handle_results_reconcile(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let record = match required_record(req) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let out = reconcile(&record);
    ok(
        &req.id,
        json!({
            "record": out.record,
            "changed": out.changed,
            "locks": locks_json(&out.record),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "results.list" => Some(handle_results_list(state, req)),
        "results.years" => Some(handle_results_years(state, req)),
        "results.get" => Some(handle_results_get(state, req)),
        "results.create" => Some(handle_results_create(state, req)),
        "results.update" => Some(handle_results_update(state, req)),
        "results.delete" => Some(handle_results_delete(state, req)),
        "results.reconcile" => Some(handle_results_reconcile(state, req)),
        _ => None,
    }
}
