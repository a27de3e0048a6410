use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::{Arg, ArgAction, Args, Command, FromArgMatches};
use termdbg_config::{AdapterEntry, Preset};
use termdbg_dap::AdapterProcess;
use tracing::{debug, warn};

use crate::adapters::{builtin_adapters, DebuggerAdapter};
use crate::args::{AdapterFlag, CoreArgs, FlagMode, FlagValues, ParsedArgs};
use crate::descriptor::{AdapterDescriptor, AttachOptions, DebuggeeTarget, LaunchOptions};
use crate::error::{ArgumentError, ResolutionError};

const ADAPTER_HEADING: &str = "Adapter options";

/// Turns command-line arguments into an [`AdapterDescriptor`].
pub struct DebuggerAdapterFactory {
    adapters: BTreeMap<String, Box<dyn DebuggerAdapter>>,
    overrides: BTreeMap<String, AdapterEntry>,
}

impl DebuggerAdapterFactory {
    /// A factory holding the built-in adapters.
    pub fn new() -> Self {
        Self::with_adapters(builtin_adapters())
    }

    pub fn with_adapters(adapters: Vec<Box<dyn DebuggerAdapter>>) -> Self {
        Self {
            adapters: adapters
                .into_iter()
                .map(|adapter| (adapter.key().to_string(), adapter))
                .collect(),
            overrides: BTreeMap::new(),
        }
    }

    /// Replace adapter executables with configured ones.
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, AdapterEntry>) -> Self {
        for (key, entry) in overrides {
            if self.adapters.contains_key(key) {
                self.overrides.insert(key.clone(), entry.clone());
            } else {
                warn!(adapter = %key, "ignoring executable override for unknown adapter type");
            }
        }
        self
    }

    /// Registered adapter types, sorted.
    pub fn all_adapter_keys(&self) -> Vec<String> {
        self.adapters.keys().cloned().collect()
    }

    pub fn adapter(&self, key: &str) -> Option<&dyn DebuggerAdapter> {
        self.adapters
            .get(&key.to_ascii_lowercase())
            .map(|adapter| adapter.as_ref())
    }

    /// Parse `argv`, including the binary name, into core and adapter flags.
    pub fn parse_arguments<I, T>(&self, argv: I) -> Result<ParsedArgs, ArgumentError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = self.command().try_get_matches_from(argv)?;
        let core = CoreArgs::from_arg_matches(&matches)?;
        let mut flags = FlagValues::default();
        for flag in self.known_flags() {
            match flag.value_name {
                Some(_) => {
                    if let Some(value) = matches.get_one::<String>(flag.name) {
                        flags.insert(flag.name, Some(value.clone()));
                    }
                }
                None => {
                    if matches.get_flag(flag.name) {
                        flags.insert(flag.name, None);
                    }
                }
            }
        }
        Ok(ParsedArgs { core, flags })
    }

    /// Splice the arguments of `--preset` into the command line and parse
    /// again.
    ///
    /// The user's flags come first, then the preset, then the user's program
    /// and arguments; a program given on both sides makes the user's
    /// positionals extra arguments of the preset's program.
    pub fn expand_preset(
        &self,
        argv: &[String],
        parsed: ParsedArgs,
        presets: &BTreeMap<String, Preset>,
    ) -> Result<ParsedArgs, ArgumentError> {
        let Some(name) = parsed.core.preset.clone() else {
            return Ok(parsed);
        };
        let preset = presets
            .get(&name)
            .ok_or_else(|| ArgumentError::UnknownPreset(name.clone()))?;

        let bin = argv.first().cloned().unwrap_or_else(|| "termdbg".to_string());
        let user_tail = &parsed.core.command_line;
        let head_end = argv.len().saturating_sub(user_tail.len()).max(1);
        let user_head = strip_preset_flag(argv.get(1..head_end).unwrap_or(&[]));

        let preset_parsed =
            self.parse_arguments(std::iter::once(bin.clone()).chain(preset.args.iter().cloned()))?;
        let split = preset
            .args
            .len()
            .saturating_sub(preset_parsed.core.command_line.len());
        let (preset_head, preset_tail) = preset.args.split_at(split);

        let spliced: Vec<String> = std::iter::once(bin)
            .chain(user_head)
            .chain(preset_head.iter().cloned())
            .chain(preset_tail.iter().cloned())
            .chain(user_tail.iter().cloned())
            .collect();
        debug!(preset = %name, argv = ?spliced, "expanded preset");

        let mut expanded = self.parse_arguments(&spliced)?;
        expanded.core.preset = None;
        Ok(expanded)
    }

    /// Resolve parsed arguments into a bound descriptor.
    pub fn adapter_from_arguments(
        &self,
        args: &ParsedArgs,
    ) -> Result<AdapterDescriptor, ResolutionError> {
        let adapter = self.select_adapter(args)?;
        let key = adapter.key();
        let mode = if args.core.attach {
            FlagMode::Attach
        } else {
            FlagMode::Launch
        };
        check_flags(adapter, mode, &args.flags)?;

        let (target, request_arguments) = match mode {
            FlagMode::Attach => {
                if let Some(program) = args.program() {
                    return Err(ResolutionError::invalid(
                        key,
                        format!("unexpected program '{program}' when attaching"),
                    ));
                }
                let attach = AttachOptions {
                    pid: parse_flag(key, &args.flags, "pid")?,
                    host: args.flags.value("host").map(str::to_string),
                    port: parse_flag(key, &args.flags, "port")?,
                };
                let body = adapter
                    .attach_arguments(&attach)
                    .map_err(|message| ResolutionError::invalid(key, message))?;
                (DebuggeeTarget::Attach(attach), body)
            }
            FlagMode::Launch => {
                let program = args
                    .program()
                    .ok_or_else(|| ResolutionError::invalid(key, "no program to launch"))?;
                let launch = LaunchOptions {
                    program: program.to_string(),
                    args: args.program_args().to_vec(),
                    cwd: args.flags.value("cwd").map(PathBuf::from),
                    stop_on_entry: args.flags.is_set("stop-on-entry"),
                };
                let body = adapter
                    .launch_arguments(&launch)
                    .map_err(|message| ResolutionError::invalid(key, message))?;
                (DebuggeeTarget::Launch(launch), body)
            }
        };

        let descriptor = AdapterDescriptor {
            adapter_type: key.to_string(),
            target,
            executable: self.executable(adapter),
            request_arguments,
            mute_output_categories: adapter
                .muted_categories()
                .iter()
                .map(|category| category.to_string())
                .collect(),
            pause_thread: adapter.pause_thread(),
        };
        debug!(adapter = key, target = %descriptor.describe(), "resolved adapter");
        Ok(descriptor)
    }

    /// Help for whatever adapter the arguments identify, else general usage.
    pub fn context_sensitive_help(&self, args: &ParsedArgs) -> String {
        let explicit = args
            .core
            .adapter_type
            .as_deref()
            .and_then(|key| self.adapter(key));
        let inferred = || {
            let candidates = args
                .program()
                .map(|program| self.adapters_for_program(program))
                .unwrap_or_default();
            match candidates.as_slice() {
                [only] => Some(*only),
                _ => None,
            }
        };
        match explicit.or_else(inferred) {
            Some(adapter) => format!(
                "{}\n\n{}",
                self.command().render_usage().to_string().trim_end(),
                adapter.help()
            ),
            None => self.usage(),
        }
    }

    /// General help: core flags, adapter flags and the adapter types.
    pub fn usage(&self) -> String {
        let mut out = self.command().render_help().to_string();
        out.push_str("\nAdapter types:\n");
        for adapter in self.adapters.values() {
            out.push_str(&format!("  {:<14} {}\n", adapter.key(), adapter.description()));
        }
        out
    }

    fn command(&self) -> Command {
        let base = Command::new("termdbg")
            .about("Interactive terminal debugger")
            .disable_help_flag(true)
            .disable_version_flag(true);
        let mut command = CoreArgs::augment_args(base);
        for flag in self.known_flags() {
            let arg = Arg::new(flag.name)
                .long(flag.name)
                .help(flag.help)
                .help_heading(ADAPTER_HEADING);
            let arg = match flag.value_name {
                Some(value_name) => arg.value_name(value_name).action(ArgAction::Set),
                None => arg.action(ArgAction::SetTrue),
            };
            command = command.arg(arg);
        }
        command
    }

    /// Every adapter flag, once, in adapter order.
    fn known_flags(&self) -> Vec<AdapterFlag> {
        let mut seen = BTreeSet::new();
        self.adapters
            .values()
            .flat_map(|adapter| adapter.flags().iter().copied())
            .filter(|flag| seen.insert(flag.name))
            .collect()
    }

    fn select_adapter(&self, args: &ParsedArgs) -> Result<&dyn DebuggerAdapter, ResolutionError> {
        if let Some(key) = &args.core.adapter_type {
            return self.adapter(key).ok_or_else(|| {
                ResolutionError::UnknownAdapterType(format!(
                    "unknown adapter type '{key}' (available: {})",
                    self.all_adapter_keys().join(", ")
                ))
            });
        }
        if args.core.attach {
            return Err(ResolutionError::MissingTypeForAttach);
        }
        let program = args.program().ok_or_else(|| {
            ResolutionError::UnknownAdapterType("no program or --type given".to_string())
        })?;
        match self.adapters_for_program(program).as_slice() {
            [] => Err(ResolutionError::UnknownAdapterType(format!(
                "cannot infer an adapter type for '{program}'; use --type"
            ))),
            [only] => Ok(*only),
            many => Err(ResolutionError::AmbiguousAdapterType {
                program: program.to_string(),
                candidates: many.iter().map(|adapter| adapter.key().to_string()).collect(),
            }),
        }
    }

    fn adapters_for_program(&self, program: &str) -> Vec<&dyn DebuggerAdapter> {
        let Some(extension) = Path::new(program).extension().and_then(|ext| ext.to_str()) else {
            return Vec::new();
        };
        let suffix = format!(".{}", extension.to_ascii_lowercase());
        self.adapters
            .values()
            .filter(|adapter| adapter.suffixes().contains(&suffix.as_str()))
            .map(|adapter| adapter.as_ref())
            .collect()
    }

    fn executable(&self, adapter: &dyn DebuggerAdapter) -> AdapterProcess {
        let (program, args) = match self.overrides.get(adapter.key()) {
            Some(entry) => (entry.command.clone(), entry.args.clone()),
            None => {
                let (program, args) = adapter.default_executable();
                (
                    program.to_string(),
                    args.iter().map(|arg| arg.to_string()).collect(),
                )
            }
        };
        AdapterProcess {
            program,
            args,
            adapter_id: adapter.adapter_id().to_string(),
        }
    }
}

impl Default for DebuggerAdapterFactory {
    fn default() -> Self {
        Self::new()
    }
}

fn check_flags(
    adapter: &dyn DebuggerAdapter,
    mode: FlagMode,
    flags: &FlagValues,
) -> Result<(), ResolutionError> {
    for name in flags.names() {
        let Some(flag) = adapter.flags().iter().find(|flag| flag.name == name) else {
            return Err(ResolutionError::invalid(
                adapter.key(),
                format!("--{name} is not supported"),
            ));
        };
        if flag.mode != mode {
            let only = match flag.mode {
                FlagMode::Attach => "with --attach",
                FlagMode::Launch => "when launching",
            };
            return Err(ResolutionError::invalid(
                adapter.key(),
                format!("--{name} is only valid {only}"),
            ));
        }
    }
    Ok(())
}

fn parse_flag<T: FromStr>(
    adapter: &str,
    flags: &FlagValues,
    name: &str,
) -> Result<Option<T>, ResolutionError> {
    flags
        .value(name)
        .map(|raw| {
            raw.parse::<T>().map_err(|_| {
                ResolutionError::invalid(adapter, format!("invalid value '{raw}' for --{name}"))
            })
        })
        .transpose()
}

/// Drop `--preset NAME`, `--preset=NAME` and a trailing `--`.
fn strip_preset_flag(args: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(args.len());
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--preset" {
            iter.next();
        } else if !arg.starts_with("--preset=") {
            out.push(arg.clone());
        }
    }
    if out.last().is_some_and(|arg| arg == "--") {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::{CWD, PORT, STOP_ON_ENTRY};

    fn parse(factory: &DebuggerAdapterFactory, argv: &[&str]) -> ParsedArgs {
        let full = std::iter::once("termdbg").chain(argv.iter().copied());
        factory.parse_arguments(full).unwrap()
    }

    fn resolve(argv: &[&str]) -> Result<AdapterDescriptor, ResolutionError> {
        let factory = DebuggerAdapterFactory::new();
        factory.adapter_from_arguments(&parse(&factory, argv))
    }

    struct OnlyPython;

    impl DebuggerAdapter for OnlyPython {
        fn key(&self) -> &'static str {
            "python"
        }
        fn description(&self) -> &'static str {
            "test python"
        }
        fn suffixes(&self) -> &'static [&'static str] {
            &[".py"]
        }
        fn flags(&self) -> &'static [AdapterFlag] {
            &[CWD, STOP_ON_ENTRY, PORT]
        }
        fn default_executable(&self) -> (&'static str, &'static [&'static str]) {
            ("fake-adapter", &[])
        }
        fn launch_arguments(&self, launch: &LaunchOptions) -> Result<serde_json::Value, String> {
            Ok(serde_json::json!({ "program": launch.program }))
        }
        fn attach_arguments(&self, _: &AttachOptions) -> Result<serde_json::Value, String> {
            Ok(serde_json::json!({}))
        }
    }

    #[test]
    fn keys_are_sorted() {
        let keys = DebuggerAdapterFactory::new().all_adapter_keys();
        assert_eq!(keys, vec!["hhvm", "native", "node", "python", "react-native"]);
    }

    #[test]
    fn parse_separates_core_adapter_and_program() {
        let factory = DebuggerAdapterFactory::new();
        let args = parse(
            &factory,
            &["--plain", "--cwd", "/srv", "--stop-on-entry", "app.py", "--verbose", "-x"],
        );
        assert!(args.core.plain);
        assert_eq!(args.flags.value("cwd"), Some("/srv"));
        assert!(args.flags.is_set("stop-on-entry"));
        assert_eq!(args.program(), Some("app.py"));
        assert_eq!(args.program_args(), ["--verbose".to_string(), "-x".to_string()]);
    }

    #[test]
    fn parse_rejects_unknown_flag() {
        let factory = DebuggerAdapterFactory::new();
        let err = factory.parse_arguments(["termdbg", "--bogus"]).unwrap_err();
        assert!(matches!(err, ArgumentError::Parse(_)));
    }

    #[test]
    fn attach_without_type_fails() {
        let err = resolve(&["--attach", "--pid", "12"]).unwrap_err();
        assert_eq!(err, ResolutionError::MissingTypeForAttach);
    }

    #[test]
    fn python_suffix_resolves_to_launch() {
        let factory = DebuggerAdapterFactory::with_adapters(vec![Box::new(OnlyPython)]);
        let descriptor = factory
            .adapter_from_arguments(&parse(&factory, &["app.py", "one"]))
            .unwrap();
        assert_eq!(descriptor.adapter_type, "python");
        match &descriptor.target {
            DebuggeeTarget::Launch(launch) => {
                assert_eq!(launch.program, "app.py");
                assert_eq!(launch.args, vec!["one".to_string()]);
                assert!(!launch.stop_on_entry);
            }
            other => panic!("expected launch, got {other:?}"),
        }
        assert_eq!(descriptor.executable.program, "fake-adapter");
    }

    #[test]
    fn builtin_python_descriptor() {
        let descriptor = resolve(&["--stop-on-entry", "tool.PY"]).unwrap();
        assert_eq!(descriptor.adapter_type, "python");
        assert_eq!(descriptor.executable.adapter_id, "debugpy");
        assert_eq!(descriptor.request_arguments["stopOnEntry"], true);
        assert!(descriptor.is_muted("telemetry"));
    }

    #[test]
    fn js_is_ambiguous() {
        let err = resolve(&["server.js"]).unwrap_err();
        assert_eq!(
            err,
            ResolutionError::AmbiguousAdapterType {
                program: "server.js".into(),
                candidates: vec!["node".into(), "react-native".into()],
            }
        );
        assert!(resolve(&["--type", "node", "server.js"]).is_ok());
    }

    #[test]
    fn unknown_suffix_and_missing_suffix_fail() {
        assert!(matches!(
            resolve(&["notes.txt"]),
            Err(ResolutionError::UnknownAdapterType(_))
        ));
        assert!(matches!(
            resolve(&["./a.out.d/prog"]),
            Err(ResolutionError::UnknownAdapterType(_))
        ));
        assert!(matches!(
            resolve(&["--type", "cobol", "x.cbl"]),
            Err(ResolutionError::UnknownAdapterType(_))
        ));
        assert!(matches!(
            resolve(&["--stop-on-entry"]),
            Err(ResolutionError::UnknownAdapterType(_))
        ));
    }

    #[test]
    fn adapter_validates_its_flags() {
        let err = resolve(&["--pid", "3", "app.py"]).unwrap_err();
        assert!(err.to_string().contains("--pid is only valid with --attach"));

        let err = resolve(&["--type", "hhvm", "--stop-on-entry", "index.php"]).unwrap_err();
        assert!(err.to_string().contains("--stop-on-entry is not supported"));

        let err = resolve(&["--attach", "--type", "native", "--pid", "abc"]).unwrap_err();
        assert_eq!(err.to_string(), "native: invalid value 'abc' for --pid");

        let err = resolve(&["--attach", "--type", "native"]).unwrap_err();
        assert_eq!(err.to_string(), "native: attach requires --pid");
    }

    #[test]
    fn attach_builds_attach_target() {
        let descriptor = resolve(&["--attach", "--type", "native", "--pid", "77"]).unwrap();
        assert_eq!(
            descriptor.target,
            DebuggeeTarget::Attach(AttachOptions {
                pid: Some(77),
                host: None,
                port: None,
            })
        );
        assert_eq!(descriptor.request_arguments["pid"], 77);
    }

    #[test]
    fn overrides_replace_executable() {
        let overrides = BTreeMap::from([
            (
                "python".to_string(),
                AdapterEntry {
                    command: "/opt/py/bin/python".into(),
                    args: vec!["-m".into(), "debugpy.adapter".into()],
                },
            ),
            (
                "nonexistent".to_string(),
                AdapterEntry {
                    command: "x".into(),
                    args: vec![],
                },
            ),
        ]);
        let factory = DebuggerAdapterFactory::new().with_overrides(&overrides);
        let descriptor = factory
            .adapter_from_arguments(&parse(&factory, &["app.py"]))
            .unwrap();
        assert_eq!(descriptor.executable.program, "/opt/py/bin/python");
        assert_eq!(descriptor.executable.adapter_id, "debugpy");
    }

    #[test]
    fn contextual_help_prefers_explicit_type() {
        let factory = DebuggerAdapterFactory::new();
        let help = factory.context_sensitive_help(&parse(&factory, &["--type", "native"]));
        assert!(help.contains("native: "));
        assert!(help.contains("lldb-dap"));

        let help = factory.context_sensitive_help(&parse(&factory, &["index.hack"]));
        assert!(help.contains("hhvm: "));

        let general = factory.context_sensitive_help(&parse(&factory, &["server.js"]));
        assert!(general.contains("Adapter types:"));
        assert!(general.contains("react-native"));
    }

    #[test]
    fn preset_is_spliced_between_flags_and_program() {
        let factory = DebuggerAdapterFactory::new();
        let presets = BTreeMap::from([(
            "web".to_string(),
            Preset {
                args: vec!["--type".into(), "node".into(), "server.js".into()],
                description: None,
            },
        )]);
        let argv: Vec<String> = ["termdbg", "--preset", "web", "--stop-on-entry", "--", "extra"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let parsed = factory.parse_arguments(&argv).unwrap();
        let expanded = factory.expand_preset(&argv, parsed, &presets).unwrap();

        assert_eq!(expanded.core.adapter_type.as_deref(), Some("node"));
        assert_eq!(expanded.core.preset, None);
        assert!(expanded.flags.is_set("stop-on-entry"));
        assert_eq!(expanded.program(), Some("server.js"));
        assert_eq!(expanded.program_args(), ["extra".to_string()]);
    }

    #[test]
    fn unknown_preset_fails() {
        let factory = DebuggerAdapterFactory::new();
        let argv: Vec<String> = vec!["termdbg".into(), "--preset=nope".into()];
        let parsed = factory.parse_arguments(&argv).unwrap();
        let err = factory
            .expand_preset(&argv, parsed, &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, ArgumentError::UnknownPreset(name) if name == "nope"));
    }
}
