//! Command-line handling: from `argv` to what the process should do.

use termdbg_adapter::{AdapterDescriptor, ArgumentError, DebuggerAdapterFactory};
use termdbg_config::Config;
use tracing::{info, warn};

/// How the process ends. Every variant exits with status 0; unhandled
/// errors take the `Err` path in `main` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Help or an argument problem was printed.
    Printed,
    /// The adapter failed to start; the reason and help were printed.
    LaunchFailed,
    /// The REPL ran until its input ended.
    Finished,
}

impl Termination {
    pub fn exit_code(self) -> i32 {
        match self {
            Termination::Printed | Termination::LaunchFailed | Termination::Finished => 0,
        }
    }
}

#[derive(Debug)]
pub struct SessionPlan {
    /// `None` when the arguments name no debuggee.
    pub descriptor: Option<AdapterDescriptor>,
    pub plain: bool,
    /// Shown if the adapter fails to start.
    pub help: String,
}

#[derive(Debug)]
pub enum Plan {
    /// Print the text and exit.
    Exit(String),
    Session(SessionPlan),
}

pub fn plan(factory: &DebuggerAdapterFactory, config: &Config, argv: &[String]) -> Plan {
    let parsed = factory
        .parse_arguments(argv)
        .and_then(|parsed| factory.expand_preset(argv, parsed, &config.presets));
    let parsed = match parsed {
        Ok(parsed) => parsed,
        Err(ArgumentError::Parse(message)) => {
            warn!(error = %message, "invalid command line");
            return Plan::Exit(message);
        }
        Err(err) => {
            warn!(error = %err, "invalid command line");
            return Plan::Exit(format!("termdbg: {err}\n\n{}", factory.usage()));
        }
    };

    let help = factory.context_sensitive_help(&parsed);
    if parsed.core.help {
        return Plan::Exit(help);
    }
    let plain = parsed.core.plain;
    if parsed.names_no_target() {
        info!("no debuggee given; starting without an adapter");
        return Plan::Session(SessionPlan {
            descriptor: None,
            plain,
            help,
        });
    }
    match factory.adapter_from_arguments(&parsed) {
        Ok(descriptor) => Plan::Session(SessionPlan {
            descriptor: Some(descriptor),
            plain,
            help,
        }),
        Err(err) => {
            info!(error = %err, "could not resolve an adapter");
            Plan::Exit(format!("termdbg: {err}\n\n{help}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use termdbg_config::Preset;

    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        std::iter::once("termdbg")
            .chain(args.iter().copied())
            .map(String::from)
            .collect()
    }

    fn plan_for(args: &[&str]) -> Plan {
        plan(&DebuggerAdapterFactory::new(), &Config::default(), &argv(args))
    }

    #[test]
    fn help_flag_prints_adapter_help() {
        match plan_for(&["--help", "--type", "python"]) {
            Plan::Exit(text) => assert!(text.contains("python: ")),
            other => panic!("expected help, got {other:?}"),
        }
    }

    #[test]
    fn no_arguments_starts_without_adapter() {
        match plan_for(&["--plain"]) {
            Plan::Session(session) => {
                assert!(session.descriptor.is_none());
                assert!(session.plain);
            }
            other => panic!("expected a session, got {other:?}"),
        }
    }

    #[test]
    fn resolution_failure_prints_message_and_help() {
        match plan_for(&["--attach", "--pid", "3"]) {
            Plan::Exit(text) => {
                assert!(text.starts_with("termdbg: --attach requires an explicit --type"));
                assert!(text.contains("Adapter types:"));
            }
            other => panic!("expected exit, got {other:?}"),
        }
    }

    #[test]
    fn program_resolves_descriptor() {
        match plan_for(&["app.py", "--port", "80"]) {
            Plan::Session(session) => {
                let descriptor = session.descriptor.unwrap();
                assert_eq!(descriptor.adapter_type, "python");
                assert!(session.help.contains("python: "));
            }
            other => panic!("expected a session, got {other:?}"),
        }
    }

    #[test]
    fn preset_supplies_the_target() {
        let mut config = Config::default();
        config.presets = BTreeMap::from([(
            "api".to_string(),
            Preset {
                args: vec!["--type".into(), "native".into(), "./server".into()],
                description: None,
            },
        )]);
        let plan = plan(&DebuggerAdapterFactory::new(), &config, &argv(&["--preset", "api"]));
        match plan {
            Plan::Session(session) => {
                assert_eq!(session.descriptor.unwrap().adapter_type, "native");
            }
            other => panic!("expected a session, got {other:?}"),
        }
    }

    #[test]
    fn bad_arguments_exit_with_text() {
        assert!(matches!(plan_for(&["--no-such-flag"]), Plan::Exit(_)));
        match plan_for(&["--preset", "missing"]) {
            Plan::Exit(text) => assert!(text.contains("unknown preset 'missing'")),
            other => panic!("expected exit, got {other:?}"),
        }
    }

    #[test]
    fn every_termination_exits_zero() {
        for termination in [
            Termination::Printed,
            Termination::LaunchFailed,
            Termination::Finished,
        ] {
            assert_eq!(termination.exit_code(), 0);
        }
    }
}
