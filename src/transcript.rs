use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

pub type SharedTranscript = Rc<RefCell<Transcript>>;

/// Append-only JSONL log of one run: requests, session changes, admin checks.
/// Credentials and request bodies are never written.
pub struct Transcript {
    pub path: Option<PathBuf>,
    run_id: String,
    file: Option<File>,
}

#[derive(Serialize)]
struct Event<'a> {
    ts: DateTime<Utc>,
    run_id: &'a str,
    #[serde(rename = "type")]
    event_type: &'a str,
    #[serde(flatten)]
    data: serde_json::Value,
}

impl Transcript {
    pub fn new(path: &Path, run_id: &str) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            path: Some(path.to_path_buf()),
            run_id: run_id.to_string(),
            file: Some(file),
        })
    }

    /// A transcript that drops every event
    pub fn disabled(run_id: &str) -> Self {
        Self {
            path: None,
            run_id: run_id.to_string(),
            file: None,
        }
    }

    pub fn shared(self) -> SharedTranscript {
        Rc::new(RefCell::new(self))
    }

    pub fn log(&mut self, event_type: &str, data: serde_json::Value) -> Result<()> {
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };
        let event = Event {
            ts: Utc::now(),
            run_id: &self.run_id,
            event_type,
            data,
        };
        let line = serde_json::to_string(&event)?;
        writeln!(file, "{}", line)?;
        file.flush()?;
        Ok(())
    }

    pub fn request(&mut self, method: &str, path: &str, status: u16, duration_ms: u64) -> Result<()> {
        self.log(
            "request",
            serde_json::json!({
                "method": method,
                "path": path,
                "status": status,
                "duration_ms": duration_ms,
            }),
        )
    }

    pub fn request_failed(&mut self, method: &str, path: &str, error: &str) -> Result<()> {
        self.log(
            "request_failed",
            serde_json::json!({
                "method": method,
                "path": path,
                "error": error,
            }),
        )
    }

    pub fn hydrated(&mut self, authenticated: bool) -> Result<()> {
        self.log(
            "hydrated",
            serde_json::json!({ "authenticated": authenticated }),
        )
    }

    /// Log a successful login or registration
    pub fn signed_in(&mut self, kind: &str, username: &str, user_id: i64) -> Result<()> {
        self.log(
            kind,
            serde_json::json!({ "username": username, "user_id": user_id }),
        )
    }

    pub fn logout(&mut self) -> Result<()> {
        self.log("logout", serde_json::json!({}))
    }

    /// Log a forced session clear
    pub fn session_reset(&mut self, reason: &str, path: &str) -> Result<()> {
        self.log(
            "session_reset",
            serde_json::json!({ "reason": reason, "path": path }),
        )
    }

    pub fn admin_check(&mut self, granted: bool, network: bool) -> Result<()> {
        self.log(
            "admin_check",
            serde_json::json!({ "granted": granted, "network": network }),
        )
    }
}
