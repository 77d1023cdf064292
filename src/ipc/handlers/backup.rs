use crate::backup;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

fn handle_backup_export_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let out_path = match required_str(req, "outPath") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    let out = PathBuf::from(&out_path);
    let export = match backup::export_results_bundle(conn, &out) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "io_failed",
                format!("{e:#}"),
                Some(json!({ "path": out_path })),
            )
        }
    };
    info!(path = %out_path, records = export.record_count, "results bundle exported");

    ok(
        &req.id,
        json!({
            "ok": true,
            "path": out_path,
            "bundleFormat": export.bundle_format,
            "recordCount": export.record_count,
            "sha256": export.sha256
        }),
    )
}

fn handle_backup_import_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let in_path = match required_str(req, "inPath") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    let src = PathBuf::from(&in_path);
    if !src.is_file() {
        return err(
            &req.id,
            "not_found",
            "bundle file not found",
            Some(json!({ "path": in_path })),
        );
    }

    let import = match backup::import_results_bundle(conn, &src) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "io_failed",
                format!("{e:#}"),
                Some(json!({ "path": in_path })),
            )
        }
    };
    info!(path = %in_path, records = import.record_count, "results bundle imported");

    ok(
        &req.id,
        json!({
            "ok": true,
            "bundleFormat": import.bundle_format,
            "recordCount": import.record_count
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.exportBundle" => Some(handle_backup_export_bundle(state, req)),
        "backup.importBundle" => Some(handle_backup_import_bundle(state, req)),
        _ => None,
    }
}
