//! relay-cli: command line client for the Relay session API
//!
//! Talks to a running `relay-server` over its HTTP API.
//!
//! # Subcommands
//! - `upload <path> [--name <name>]`: store a message file
//! - `start --token .. --target .. --interval ..`: start a session
//! - `pause|resume|stop <id>`: lifecycle control
//! - `status <id> [--json]`: status, cursor and recent logs
//! - `health`: server health
//! - `sessions`, `statuses`, `delete <id>`, `passwd <new>`: admin only

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:5000";
const ADMIN_HEADER: &str = "x-admin-password";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "relay-cli", version, about = "Control Relay message sessions")]
struct Cli {
    /// Relay HTTP server URL (overrides RELAY_HTTP_URL env var)
    #[arg(long, env = "RELAY_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    /// Admin password for admin subcommands
    #[arg(long, env = "RELAY_ADMIN_PASSWORD", hide_env_values = true)]
    admin_password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Upload a message file (one message per line)
    Upload {
        path: PathBuf,

        /// Name to store the file under; defaults to the file name
        #[arg(long)]
        name: Option<String>,
    },

    /// Start a new session
    Start {
        #[arg(long, env = "RELAY_TOKEN", hide_env_values = true)]
        token: String,

        /// Destination thread id
        #[arg(long)]
        target: String,

        /// Seconds between messages
        #[arg(long)]
        interval: f64,

        #[arg(long)]
        prefix: Option<String>,

        /// Previously uploaded message file
        #[arg(long)]
        file: Option<String>,
    },

    Pause { id: String },
    Resume { id: String },
    Stop { id: String },

    /// Show status, cursor and recent logs
    Status {
        id: String,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Show server health
    Health,

    /// List every session (admin)
    Sessions,

    /// Status of every session (admin)
    Statuses,

    /// Delete a session and its logs (admin)
    Delete { id: String },

    /// Change the admin password (admin)
    Passwd { new_password: String },
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LogLine {
    pub ts: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub task_id: Option<String>,
    pub cursor: Option<u32>,
    #[serde(default)]
    pub logs: Vec<LogLine>,
}

#[derive(Debug, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub token: String,
    pub target: String,
    pub interval_seconds: f64,
    pub message_file: Option<String>,
    pub cursor: u32,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionList {
    pub count: usize,
    pub sessions: Vec<SessionSummary>,
}

// ============================================================================
// Formatting
// ============================================================================

pub fn format_status(report: &StatusResponse) -> String {
    let mut out = format!("Status: {}\n", report.status);
    if let Some(cursor) = report.cursor {
        out.push_str(&format!("Sent:   {}\n", cursor));
    }
    if let Some(task) = &report.task_id {
        out.push_str(&format!("Task:   {}\n", task));
    }
    if !report.logs.is_empty() {
        out.push('\n');
        for line in &report.logs {
            out.push_str(&format!("{}  {}\n", line.ts, line.message));
        }
    }
    out
}

pub fn format_session(s: &SessionSummary) -> String {
    format!(
        "{}  {:<7}  target={}  token={}  every {}s  file={}  sent={}",
        s.id,
        s.status,
        s.target,
        s.token,
        s.interval_seconds,
        s.message_file.as_deref().unwrap_or("-"),
        s.cursor
    )
}

/// Name an upload is stored under when `--name` is not given.
pub fn upload_name(path: &Path, name: Option<&str>) -> Option<String> {
    match name {
        Some(n) => Some(n.to_string()),
        None => path.file_name().map(|f| f.to_string_lossy().into_owned()),
    }
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

struct Api {
    server: String,
    admin_password: Option<String>,
    client: reqwest::blocking::Client,
}

impl Api {
    fn new(server: &str, admin_password: Option<String>) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            server: server.trim_end_matches('/').to_string(),
            admin_password,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.server, path)
    }

    fn admin(&self, req: reqwest::blocking::RequestBuilder) -> anyhow::Result<reqwest::blocking::RequestBuilder> {
        let Some(password) = &self.admin_password else {
            bail!("admin password required (--admin-password or RELAY_ADMIN_PASSWORD)");
        };
        Ok(req.header(ADMIN_HEADER, password))
    }

    /// Send `req` and return the JSON body, turning error bodies into errors.
    fn call(&self, req: reqwest::blocking::RequestBuilder) -> anyhow::Result<serde_json::Value> {
        let resp = req
            .send()
            .with_context(|| format!("cannot reach {}", self.server))?;
        let status = resp.status();
        let body: serde_json::Value = resp.json().unwrap_or_default();
        if !status.is_success() {
            let msg = body["error"].as_str().unwrap_or("request failed");
            bail!("server returned {}: {}", status, msg);
        }
        Ok(body)
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let api = Api::new(&cli.server, cli.admin_password)?;

    match cli.command {
        Commands::Upload { path, name } => {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            let Some(name) = upload_name(&path, name.as_deref()) else {
                bail!("cannot derive a file name from {}", path.display());
            };
            let body = api.call(api.client.put(api.url(&format!("/uploads/{}", name))).body(bytes))?;
            println!(
                "Stored {} ({} messages)",
                body["file"].as_str().unwrap_or("?"),
                body["lines"]
            );
        }
        Commands::Start {
            token,
            target,
            interval,
            prefix,
            file,
        } => {
            let body = api.call(api.client.post(api.url("/sessions")).json(&serde_json::json!({
                "token": token,
                "target": target,
                "interval_seconds": interval,
                "prefix": prefix,
                "message_file": file,
            })))?;
            println!("{}", body["id"].as_str().unwrap_or("?"));
        }
        Commands::Pause { id } => action(&api, &id, "pause")?,
        Commands::Resume { id } => action(&api, &id, "resume")?,
        Commands::Stop { id } => action(&api, &id, "stop")?,
        Commands::Status { id, json } => {
            let body = api.call(api.client.get(api.url(&format!("/sessions/{}/status", id))))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                let report: StatusResponse = serde_json::from_value(body)?;
                print!("{}", format_status(&report));
            }
        }
        Commands::Health => {
            let body = api.call(api.client.get(api.url("/health")))?;
            println!("Relay server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:      {}", body["version"].as_str().unwrap_or("?"));
            println!("SQLite:       {}", body["sqlite"].as_str().unwrap_or("?"));
            println!("Sender:       {}", body["sender"].as_str().unwrap_or("?"));
            println!("Socket:       {}", body["socket"].as_str().unwrap_or("?"));
        }
        Commands::Sessions => {
            let body = api.call(api.admin(api.client.get(api.url("/admin/sessions")))?)?;
            let list: SessionList = serde_json::from_value(body)?;
            if list.count == 0 {
                eprintln!("No sessions");
            }
            for s in &list.sessions {
                println!("{}", format_session(s));
            }
        }
        Commands::Statuses => {
            let body = api.call(api.admin(api.client.get(api.url("/admin/statuses")))?)?;
            if let Some(map) = body.as_object() {
                for (id, status) in map {
                    println!("{}  {}", id, status.as_str().unwrap_or("?"));
                }
            }
        }
        Commands::Delete { id } => {
            api.call(api.admin(api.client.delete(api.url(&format!("/admin/sessions/{}", id))))?)?;
            println!("Deleted {}", id);
        }
        Commands::Passwd { new_password } => {
            api.call(
                api.admin(api.client.post(api.url("/admin/password")))?
                    .json(&serde_json::json!({ "new_password": new_password })),
            )?;
            println!("Admin password changed");
        }
    }

    Ok(())
}

fn action(api: &Api, id: &str, verb: &str) -> anyhow::Result<()> {
    let body = api.call(api.client.post(api.url(&format!("/sessions/{}/{}", id, verb))))?;
    println!("{}", body["msg"].as_str().unwrap_or("ok"));
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("relay-cli: {:#}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_start_command() {
        let cli = Cli::try_parse_from([
            "relay-cli",
            "start",
            "--token",
            "tok",
            "--target",
            "42",
            "--interval",
            "2.5",
            "--file",
            "m.txt",
        ])
        .unwrap();
        match cli.command {
            Commands::Start {
                interval, file, prefix, ..
            } => {
                assert_eq!(interval, 2.5);
                assert_eq!(file.as_deref(), Some("m.txt"));
                assert!(prefix.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_format_status_lists_logs() {
        let report: StatusResponse = serde_json::from_value(serde_json::json!({
            "status": "Active",
            "task_id": "7b7c",
            "cursor": 3,
            "logs": [
                {"ts": "2024-01-01T00:00:00Z", "message": "Hi one"},
                {"ts": "2024-01-01T00:00:10Z", "message": "[FAILED 400] Hi two"}
            ]
        }))
        .unwrap();

        let out = format_status(&report);
        assert!(out.starts_with("Status: Active\n"));
        assert!(out.contains("Sent:   3"));
        assert!(out.contains("[FAILED 400] Hi two"));
    }

    #[test]
    fn test_format_status_unknown_session() {
        let report: StatusResponse = serde_json::from_value(serde_json::json!({
            "status": "Unknown",
            "task_id": null,
            "cursor": null,
            "logs": []
        }))
        .unwrap();
        assert_eq!(format_status(&report), "Status: Unknown\n");
    }

    #[test]
    fn test_format_session_line() {
        let s = SessionSummary {
            id: "abc".to_string(),
            token: "EAAB****oken".to_string(),
            target: "42".to_string(),
            interval_seconds: 10.0,
            message_file: None,
            cursor: 0,
            status: "Paused".to_string(),
        };
        let line = format_session(&s);
        assert!(line.contains("Paused"));
        assert!(line.contains("file=-"));
        assert!(line.contains("token=EAAB****oken"));
    }

    #[test]
    fn test_upload_name_prefers_override() {
        let path = Path::new("/tmp/dir/lines.txt");
        assert_eq!(upload_name(path, None).as_deref(), Some("lines.txt"));
        assert_eq!(upload_name(path, Some("other.txt")).as_deref(), Some("other.txt"));
        assert_eq!(upload_name(Path::new("/"), None), None);
    }
}
