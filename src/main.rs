mod cli;
mod logging;

use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info};

use termdbg_adapter::{DebuggerAdapterFactory, ProcessConnector};
use termdbg_command::CommandDispatcher;
use termdbg_config::{load_config, Config, LogLevel};
use termdbg_console::{ConsoleIo, FullScreenGuard, TerminalConsole};
use termdbg_platform::{DefaultPaths, PlatformPaths};
use termdbg_session::{Debugger, DebuggerSettings, SessionState};

use crate::cli::{Plan, SessionPlan, Termination};

fn run(argv: &[String]) -> Result<Termination> {
    let paths = DefaultPaths::new().context("failed to detect platform paths")?;
    let project_dir = env::current_dir().ok();
    let loaded = load_config(&paths.config_dir(), project_dir.as_deref());

    let (level, log_file) = match &loaded {
        Ok(config) => (config.log.level, config.log.file.clone()),
        Err(_) => (LogLevel::default(), None),
    };
    if let Err(e) = logging::init(&paths, level, log_file) {
        eprintln!("termdbg: logging disabled: {e:#}");
    }
    let config = loaded.unwrap_or_else(|e| {
        error!(error = %e, "failed to load config, using defaults");
        Config::default()
    });
    info!(version = env!("CARGO_PKG_VERSION"), "termdbg starting");

    let factory = DebuggerAdapterFactory::new().with_overrides(&config.adapters);
    let session = match cli::plan(&factory, &config, argv) {
        Plan::Exit(text) => {
            println!("{text}");
            return Ok(Termination::Printed);
        }
        Plan::Session(session) => session,
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;
    runtime.block_on(run_session(&config, session))
}

async fn run_session(config: &Config, plan: SessionPlan) -> Result<Termination> {
    let console: Arc<dyn ConsoleIo> = Arc::new(TerminalConsole::new(plan.plain));
    let connector = Arc::new(ProcessConnector::new(Duration::from_millis(
        config.session.request_timeout_ms,
    )));
    let settings = DebuggerSettings {
        close_timeout: Duration::from_millis(config.session.close_timeout_ms),
    };
    let debugger = Debugger::new(console.clone(), connector, settings);
    let dispatcher = CommandDispatcher::new(config.alias_tokens());
    debugger
        .register_commands(&dispatcher)
        .context("failed to register built-in commands")?;

    let full_screen =
        FullScreenGuard::enter(console.clone()).context("failed to enter full-screen mode")?;

    if let Some(descriptor) = plan.descriptor {
        if debugger.launch(descriptor).await == SessionState::Terminated {
            drop(full_screen);
            debugger.close_session().await;
            let reason = debugger
                .last_error()
                .unwrap_or_else(|| "the debug adapter did not start".to_string());
            println!("termdbg: {reason}\n\n{}", plan.help);
            return Ok(Termination::LaunchFailed);
        }
    }

    let state = debugger
        .run(&dispatcher)
        .await
        .context("debug session failed")?;
    drop(full_screen);
    info!(%state, "session finished");
    Ok(Termination::Finished)
}

fn main() {
    let argv: Vec<String> = env::args().collect();

    match run(&argv) {
        Ok(termination) => {
            info!(?termination, "exiting");
            std::process::exit(termination.exit_code());
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "fatal error");
            eprintln!("termdbg: {:#}", e);
            std::process::exit(1);
        }
    }
}
