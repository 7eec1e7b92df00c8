mod answers;
mod bundle;
mod config;
mod db;
mod error;
mod evaluation;
mod ipc;
mod logging;
mod model;
mod question;
mod select;

use std::io::{self, BufRead, Write};

fn main() {
    let config = config::Config::from_env();
    logging::init(&config.log_filter);

    let startup_workspace = config.workspace.clone();
    let mut state = match ipc::AppState::new(config) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "replicator registry is incomplete");
            std::process::exit(1);
        }
    };
    if let Some(path) = startup_workspace {
        if let Err(e) = ipc::select_workspace(&mut state, &path) {
            tracing::error!(workspace = %path.to_string_lossy(), error = %format!("{e:#}"), "could not open workspace");
        }
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "evalbankd ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to answer to.
                tracing::warn!(error = %e, "unparseable request line");
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
