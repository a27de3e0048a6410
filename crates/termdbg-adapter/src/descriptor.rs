use std::collections::BTreeSet;
use std::path::PathBuf;

use termdbg_dap::{AdapterProcess, SessionRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub stop_on_entry: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachOptions {
    pub pid: Option<u32>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebuggeeTarget {
    Launch(LaunchOptions),
    Attach(AttachOptions),
}

/// Everything needed to start one debug session. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterDescriptor {
    pub adapter_type: String,
    pub target: DebuggeeTarget,
    /// Adapter process to spawn.
    pub executable: AdapterProcess,
    /// Body of the `launch` or `attach` request.
    pub request_arguments: serde_json::Value,
    /// `output` event categories never shown to the user.
    pub mute_output_categories: BTreeSet<String>,
    /// Thread passed to `pause` before any thread has stopped.
    pub pause_thread: i64,
}

impl AdapterDescriptor {
    pub fn session_request(&self) -> SessionRequest {
        match self.target {
            DebuggeeTarget::Launch(_) => SessionRequest::Launch,
            DebuggeeTarget::Attach(_) => SessionRequest::Attach,
        }
    }

    pub fn is_muted(&self, category: &str) -> bool {
        self.mute_output_categories.contains(category)
    }

    /// Short human-readable target, e.g. `launch app.py` or `attach pid 42`.
    pub fn describe(&self) -> String {
        match &self.target {
            DebuggeeTarget::Launch(launch) => format!("launch {}", launch.program),
            DebuggeeTarget::Attach(attach) => match (attach.pid, &attach.host, attach.port) {
                (Some(pid), _, _) => format!("attach pid {pid}"),
                (None, host, Some(port)) => {
                    format!("attach {}:{}", host.as_deref().unwrap_or("localhost"), port)
                }
                _ => "attach".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(target: DebuggeeTarget) -> AdapterDescriptor {
        AdapterDescriptor {
            adapter_type: "python".into(),
            target,
            executable: AdapterProcess {
                program: "python3".into(),
                args: vec![],
                adapter_id: "debugpy".into(),
            },
            request_arguments: serde_json::Value::Null,
            mute_output_categories: BTreeSet::from(["telemetry".to_string()]),
            pause_thread: 0,
        }
    }

    #[test]
    fn describe_and_request_follow_target() {
        let launch = descriptor(DebuggeeTarget::Launch(LaunchOptions {
            program: "app.py".into(),
            args: vec![],
            cwd: None,
            stop_on_entry: false,
        }));
        assert_eq!(launch.describe(), "launch app.py");
        assert_eq!(launch.session_request(), SessionRequest::Launch);
        assert!(launch.is_muted("telemetry"));
        assert!(!launch.is_muted("stdout"));

        let attach = descriptor(DebuggeeTarget::Attach(AttachOptions {
            pid: None,
            host: None,
            port: Some(5678),
        }));
        assert_eq!(attach.describe(), "attach localhost:5678");
        assert_eq!(attach.session_request(), SessionRequest::Attach);
    }
}
