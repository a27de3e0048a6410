//! The built-in adapter types.
//!
//! An adapter knows which program suffixes it claims, which flags it
//! accepts, how to start its DAP server and how to phrase the `launch` and
//! `attach` requests. Everything else is shared.

use serde_json::{json, Map, Value};

use crate::args::{AdapterFlag, CWD, HOST, PID, PORT, STOP_ON_ENTRY};
use crate::descriptor::{AttachOptions, LaunchOptions};

pub trait DebuggerAdapter: Send + Sync {
    /// Value of `--type`.
    fn key(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// File suffixes, with the leading dot, used to infer the type.
    fn suffixes(&self) -> &'static [&'static str] {
        &[]
    }

    fn flags(&self) -> &'static [AdapterFlag];

    /// Program and arguments of the adapter process when no override is
    /// configured.
    fn default_executable(&self) -> (&'static str, &'static [&'static str]);

    /// Sent as `adapterID` in `initialize`.
    fn adapter_id(&self) -> &'static str {
        self.key()
    }

    fn muted_categories(&self) -> &'static [&'static str] {
        &["telemetry"]
    }

    fn pause_thread(&self) -> i64 {
        0
    }

    fn launch_arguments(&self, launch: &LaunchOptions) -> Result<Value, String>;

    fn attach_arguments(&self, attach: &AttachOptions) -> Result<Value, String>;

    /// Help shown when this adapter is identified on the command line.
    fn help(&self) -> String {
        let mut out = format!("{}: {}\n", self.key(), self.description());
        if !self.suffixes().is_empty() {
            out.push_str(&format!("  program types: {}\n", self.suffixes().join(", ")));
        }
        let (program, args) = self.default_executable();
        let command: Vec<&str> = std::iter::once(program).chain(args.iter().copied()).collect();
        out.push_str(&format!("  adapter: {}\n", command.join(" ")));
        if !self.flags().is_empty() {
            out.push_str("  options:\n");
            for flag in self.flags() {
                out.push_str(&format!("    {:<20} {}\n", flag.signature(), flag.help));
            }
        }
        out
    }
}

pub fn builtin_adapters() -> Vec<Box<dyn DebuggerAdapter>> {
    vec![
        Box::new(PythonAdapter),
        Box::new(NodeAdapter),
        Box::new(ReactNativeAdapter),
        Box::new(HhvmAdapter),
        Box::new(NativeAdapter),
    ]
}

/// `program`, `args`, `cwd` and `stopOnEntry`, the fields most adapters share.
fn launch_fields(launch: &LaunchOptions, program_key: &str) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(program_key.into(), json!(launch.program));
    map.insert("args".into(), json!(launch.args));
    if let Some(cwd) = &launch.cwd {
        map.insert("cwd".into(), json!(cwd.to_string_lossy()));
    }
    map.insert("stopOnEntry".into(), json!(launch.stop_on_entry));
    map
}

fn require_port(attach: &AttachOptions, default_port: Option<u16>) -> Result<u16, String> {
    attach
        .port
        .or(default_port)
        .ok_or_else(|| "attach requires --port".to_string())
}

pub struct PythonAdapter;

impl DebuggerAdapter for PythonAdapter {
    fn key(&self) -> &'static str {
        "python"
    }

    fn description(&self) -> &'static str {
        "Python programs through debugpy"
    }

    fn suffixes(&self) -> &'static [&'static str] {
        &[".py"]
    }

    fn flags(&self) -> &'static [AdapterFlag] {
        &[CWD, STOP_ON_ENTRY, PID, HOST, PORT]
    }

    fn default_executable(&self) -> (&'static str, &'static [&'static str]) {
        ("python3", &["-m", "debugpy.adapter"])
    }

    fn adapter_id(&self) -> &'static str {
        "debugpy"
    }

    fn launch_arguments(&self, launch: &LaunchOptions) -> Result<Value, String> {
        let mut map = launch_fields(launch, "program");
        map.insert("console".into(), json!("internalConsole"));
        map.insert("justMyCode".into(), json!(true));
        Ok(Value::Object(map))
    }

    fn attach_arguments(&self, attach: &AttachOptions) -> Result<Value, String> {
        if let Some(pid) = attach.pid {
            return Ok(json!({ "processId": pid, "justMyCode": true }));
        }
        let port = require_port(attach, None)?;
        Ok(json!({
            "connect": {
                "host": attach.host.as_deref().unwrap_or("127.0.0.1"),
                "port": port,
            },
            "justMyCode": true,
        }))
    }
}

pub struct NodeAdapter;

impl DebuggerAdapter for NodeAdapter {
    fn key(&self) -> &'static str {
        "node"
    }

    fn description(&self) -> &'static str {
        "Node.js programs"
    }

    fn suffixes(&self) -> &'static [&'static str] {
        &[".js", ".mjs"]
    }

    fn flags(&self) -> &'static [AdapterFlag] {
        &[CWD, STOP_ON_ENTRY, PID, HOST, PORT]
    }

    fn default_executable(&self) -> (&'static str, &'static [&'static str]) {
        ("js-debug-adapter", &[])
    }

    fn launch_arguments(&self, launch: &LaunchOptions) -> Result<Value, String> {
        let mut map = launch_fields(launch, "program");
        map.insert("type".into(), json!("pwa-node"));
        map.insert("console".into(), json!("internalConsole"));
        Ok(Value::Object(map))
    }

    fn attach_arguments(&self, attach: &AttachOptions) -> Result<Value, String> {
        if let Some(pid) = attach.pid {
            return Ok(json!({ "type": "pwa-node", "processId": pid.to_string() }));
        }
        Ok(json!({
            "type": "pwa-node",
            "address": attach.host.as_deref().unwrap_or("localhost"),
            "port": require_port(attach, Some(9229))?,
        }))
    }
}

pub struct ReactNativeAdapter;

impl DebuggerAdapter for ReactNativeAdapter {
    fn key(&self) -> &'static str {
        "react-native"
    }

    fn description(&self) -> &'static str {
        "React Native bundles served by Metro"
    }

    fn suffixes(&self) -> &'static [&'static str] {
        &[".js"]
    }

    fn flags(&self) -> &'static [AdapterFlag] {
        &[CWD, HOST, PORT]
    }

    fn default_executable(&self) -> (&'static str, &'static [&'static str]) {
        ("react-native-debug-adapter", &[])
    }

    fn launch_arguments(&self, launch: &LaunchOptions) -> Result<Value, String> {
        let mut map = launch_fields(launch, "program");
        map.remove("stopOnEntry");
        map.insert("sourceMaps".into(), json!(true));
        Ok(Value::Object(map))
    }

    fn attach_arguments(&self, attach: &AttachOptions) -> Result<Value, String> {
        Ok(json!({
            "address": attach.host.as_deref().unwrap_or("localhost"),
            "port": require_port(attach, Some(8081))?,
            "sourceMaps": true,
        }))
    }
}

pub struct HhvmAdapter;

impl DebuggerAdapter for HhvmAdapter {
    fn key(&self) -> &'static str {
        "hhvm"
    }

    fn description(&self) -> &'static str {
        "Hack and PHP scripts under HHVM"
    }

    fn suffixes(&self) -> &'static [&'static str] {
        &[".php", ".hack"]
    }

    fn flags(&self) -> &'static [AdapterFlag] {
        &[CWD, HOST, PORT]
    }

    fn default_executable(&self) -> (&'static str, &'static [&'static str]) {
        ("hhvm", &["--mode", "vsdebug"])
    }

    fn muted_categories(&self) -> &'static [&'static str] {
        &["telemetry", "console"]
    }

    fn launch_arguments(&self, launch: &LaunchOptions) -> Result<Value, String> {
        let mut map = launch_fields(launch, "script");
        map.remove("stopOnEntry");
        Ok(Value::Object(map))
    }

    fn attach_arguments(&self, attach: &AttachOptions) -> Result<Value, String> {
        Ok(json!({
            "host": attach.host.as_deref().unwrap_or("localhost"),
            "debugPort": require_port(attach, Some(8998))?,
        }))
    }
}

pub struct NativeAdapter;

impl DebuggerAdapter for NativeAdapter {
    fn key(&self) -> &'static str {
        "native"
    }

    fn description(&self) -> &'static str {
        "Native executables through lldb-dap"
    }

    fn flags(&self) -> &'static [AdapterFlag] {
        &[CWD, STOP_ON_ENTRY, PID]
    }

    fn default_executable(&self) -> (&'static str, &'static [&'static str]) {
        ("lldb-dap", &[])
    }

    fn adapter_id(&self) -> &'static str {
        "lldb"
    }

    fn launch_arguments(&self, launch: &LaunchOptions) -> Result<Value, String> {
        Ok(Value::Object(launch_fields(launch, "program")))
    }

    fn attach_arguments(&self, attach: &AttachOptions) -> Result<Value, String> {
        let pid = attach.pid.ok_or_else(|| "attach requires --pid".to_string())?;
        Ok(json!({ "pid": pid }))
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn launch(program: &str) -> LaunchOptions {
        LaunchOptions {
            program: program.into(),
            args: vec!["--fast".into()],
            cwd: Some(PathBuf::from("/work")),
            stop_on_entry: true,
        }
    }

    #[test]
    fn keys_are_unique() {
        let mut keys: Vec<&str> = builtin_adapters().iter().map(|a| a.key()).collect();
        let total = keys.len();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), total);
    }

    #[test]
    fn python_launch_arguments() {
        let args = PythonAdapter.launch_arguments(&launch("app.py")).unwrap();
        assert_eq!(args["program"], "app.py");
        assert_eq!(args["args"], json!(["--fast"]));
        assert_eq!(args["cwd"], "/work");
        assert_eq!(args["stopOnEntry"], true);
        assert_eq!(args["console"], "internalConsole");
    }

    #[test]
    fn python_attach_needs_pid_or_port() {
        let err = PythonAdapter
            .attach_arguments(&AttachOptions::default())
            .unwrap_err();
        assert!(err.contains("--port"));

        let by_port = PythonAdapter
            .attach_arguments(&AttachOptions {
                port: Some(5678),
                ..AttachOptions::default()
            })
            .unwrap();
        assert_eq!(by_port["connect"]["port"], 5678);
        assert_eq!(by_port["connect"]["host"], "127.0.0.1");
    }

    #[test]
    fn node_attach_defaults_to_inspector_port() {
        let args = NodeAdapter.attach_arguments(&AttachOptions::default()).unwrap();
        assert_eq!(args["port"], 9229);
    }

    #[test]
    fn hhvm_launch_uses_script_key() {
        let args = HhvmAdapter.launch_arguments(&launch("index.php")).unwrap();
        assert_eq!(args["script"], "index.php");
        assert!(args.get("stopOnEntry").is_none());
    }

    #[test]
    fn native_attach_requires_pid() {
        assert!(NativeAdapter.attach_arguments(&AttachOptions::default()).is_err());
        let args = NativeAdapter
            .attach_arguments(&AttachOptions {
                pid: Some(42),
                ..AttachOptions::default()
            })
            .unwrap();
        assert_eq!(args["pid"], 42);
    }

    #[test]
    fn help_lists_flags() {
        let help = PythonAdapter.help();
        assert!(help.starts_with("python: "));
        assert!(help.contains(".py"));
        assert!(help.contains("--stop-on-entry"));
        assert!(help.contains("python3 -m debugpy.adapter"));
    }
}
