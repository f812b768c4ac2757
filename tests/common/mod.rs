#![allow(dead_code)]

use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

/// A running `classroomd` driven over its stdio pipes.
pub struct Sidecar {
    child: Child,
    stdin: Option<ChildStdin>,
    reader: BufReader<ChildStdout>,
    next_id: u64,
    pub workspace: Option<PathBuf>,
}

impl Sidecar {
    pub fn spawn() -> Self {
        let exe = env!("CARGO_BIN_EXE_classroomd");
        let mut child = Command::new(exe)
            .env_remove("CLASSROOMD_WORKSPACE")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn classroomd");
        let stdin = child.stdin.take().expect("child stdin");
        let stdout = child.stdout.take().expect("child stdout");
        Sidecar {
            child,
            stdin: Some(stdin),
            reader: BufReader::new(stdout),
            next_id: 0,
            workspace: None,
        }
    }

    /// Spawns and selects a fresh temporary workspace.
    pub fn with_workspace(prefix: &str) -> Self {
        let mut sidecar = Sidecar::spawn();
        let workspace = temp_dir(prefix);
        sidecar.ok(
            "workspace.select",
            json!({ "path": workspace.to_string_lossy() }),
        );
        sidecar.workspace = Some(workspace);
        sidecar
    }

    pub fn send_line(&mut self, line: &str) -> Value {
        let stdin = self.stdin.as_mut().expect("stdin open");
        writeln!(stdin, "{}", line).expect("write request");
        stdin.flush().expect("flush request");

        let mut out = String::new();
        self.reader.read_line(&mut out).expect("read response line");
        assert!(!out.trim().is_empty(), "empty response for {}", line);
        serde_json::from_str(out.trim()).expect("parse response json")
    }

    /// Sends one request and returns the whole response envelope.
    pub fn request(&mut self, method: &str, params: Value) -> Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let payload = json!({ "id": id, "method": method, "params": params });
        let value = self.send_line(&payload.to_string());
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    pub fn ok(&mut self, method: &str, params: Value) -> Value {
        let value = self.request(method, params);
        assert!(
            value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().unwrap_or_else(|| json!({}))
    }

    /// Expects a failure and returns its error code.
    pub fn err_code(&mut self, method: &str, params: Value) -> String {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        error_code(&value).unwrap_or_default().to_string()
    }

    /// Creates an identity without an actor: students, or the first administrator.
    pub fn create_identity(&mut self, username: &str, role: &str) -> i64 {
        let res = self.ok("identities.create", identity_params(username, role));
        res["userId"].as_i64().expect("userId")
    }

    /// Creates an identity on behalf of an administrator.
    pub fn create_identity_by(&mut self, actor: i64, username: &str, role: &str) -> i64 {
        let mut params = identity_params(username, role);
        params["actorId"] = json!(actor);
        let res = self.ok("identities.create", params);
        res["userId"].as_i64().expect("userId")
    }
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        drop(self.stdin.take());
        let _ = self.child.wait();
        if let Some(ws) = self.workspace.take() {
            let _ = std::fs::remove_dir_all(ws);
        }
    }
}

pub fn identity_params(username: &str, role: &str) -> Value {
    json!({
        "username": username,
        "email": format!("{}@school.test", username),
        "role": role,
    })
}

pub fn error_code(value: &Value) -> Option<&str> {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
}
