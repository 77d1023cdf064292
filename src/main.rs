mod backup;
mod calc;
mod config;
mod db;
mod edit;
mod ipc;
mod model;
mod reconcile;

use std::io::{self, BufRead, Write};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the stderr subscriber and returns the reason `RESULTSD_LOG` was
/// rejected, if it was set but invalid.
fn init_tracing() -> Option<String> {
    let (filter, rejected) = match EnvFilter::try_from_env(config::LOG_VAR) {
        Ok(f) => (f, None),
        Err(e) => {
            let set = std::env::var_os(config::LOG_VAR).is_some();
            (
                EnvFilter::new(config::DEFAULT_LOG_FILTER),
                set.then(|| e.to_string()),
            )
        }
    };
    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
    rejected
}

fn main() {
    if let Some(e) = init_tracing() {
        warn!(
            "invalid {} directive, using {}: {e}",
            config::LOG_VAR,
            config::DEFAULT_LOG_FILTER
        );
    }
    let cfg = config::Config::load();

    let mut state = ipc::AppState {
        workspace: None,
        db: None,
        draft: None,
    };
    if let Some(path) = cfg.workspace {
        match db::open_db(&path) {
            Ok(conn) => {
                info!(workspace = %path.display(), "workspace opened from environment");
                state.workspace = Some(path);
                state.db = Some(conn);
            }
            Err(e) => warn!(workspace = %path.display(), "failed to open workspace: {e:#}"),
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    info!(version = env!("CARGO_PKG_VERSION"), "resultsd ready");

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                warn!("failed to read stdin: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                warn!("unparseable request: {e}");
                // Can't reply without id.
                let _ = writeln!(
                    stdout,
                    "{}",
                    serde_json::json!({
                        "ok": false,
                        "error": { "code": "bad_json", "message": e.to_string() }
                    })
                );
                let _ = stdout.flush();
                continue;
            }
        };

        debug!(id = %req.id, method = %req.method, "request");
        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    info!("stdin closed, exiting");
}
