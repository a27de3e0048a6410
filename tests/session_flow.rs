//! End-to-end REPL sessions over a scripted console and a fake adapter.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;
use termdbg_adapter::DebuggerAdapterFactory;
use termdbg_command::CommandDispatcher;
use termdbg_console::{ConsoleIo, ScriptedConsole};
use termdbg_session::{
    launch_descriptor, Debugger, DebuggerSettings, FakeChannel, FakeConnector, SessionState,
};

fn debugger_with(
    console: Arc<ScriptedConsole>,
    connector: Arc<FakeConnector>,
    aliases: BTreeMap<String, Vec<String>>,
) -> (Debugger, CommandDispatcher) {
    let debugger = Debugger::new(console, connector, DebuggerSettings::default());
    let dispatcher = CommandDispatcher::new(aliases);
    debugger.register_commands(&dispatcher).unwrap();
    (debugger, dispatcher)
}

async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn help_then_end_prints_help_once_and_terminates() {
    let console = Arc::new(ScriptedConsole::with_lines(["help"]));
    let connector = Arc::new(FakeConnector::new(Arc::new(FakeChannel::new())));
    let (debugger, dispatcher) = debugger_with(console.clone(), connector.clone(), BTreeMap::new());

    let state = debugger.run(&dispatcher).await.unwrap();

    assert_eq!(state, SessionState::Terminated);
    let headers = console
        .output()
        .iter()
        .filter(|line| line.as_str() == "Commands:")
        .count();
    assert_eq!(headers, 1);
    assert!(console.is_closed());
    assert_eq!(connector.connect_count(), 0);
}

#[tokio::test]
async fn unknown_command_is_reported_and_loop_continues() {
    let console = Arc::new(ScriptedConsole::with_lines(["zzz", "bl"]));
    let connector = Arc::new(FakeConnector::new(Arc::new(FakeChannel::new())));
    let (debugger, dispatcher) = debugger_with(console.clone(), connector, BTreeMap::new());

    debugger.run(&dispatcher).await.unwrap();

    assert!(console.output_contains("unknown command 'zzz'"));
    assert!(console.output_contains("no breakpoints"));
}

#[tokio::test]
async fn configured_alias_expands_before_dispatch() {
    let console = Arc::new(ScriptedConsole::with_lines(["ll"]));
    let connector = Arc::new(FakeConnector::new(Arc::new(FakeChannel::new())));
    let aliases = BTreeMap::from([("ll".to_string(), vec!["breakpoints".to_string()])]);
    let (debugger, dispatcher) = debugger_with(console.clone(), connector, aliases);

    debugger.run(&dispatcher).await.unwrap();
    assert!(console.output_contains("no breakpoints"));
}

#[tokio::test]
async fn interrupt_pauses_running_debuggee_once() {
    let console = Arc::new(ScriptedConsole::new());
    let channel = Arc::new(FakeChannel::new());
    let connector = Arc::new(FakeConnector::new(channel.clone()));
    let (debugger, dispatcher) = debugger_with(console.clone(), connector, BTreeMap::new());

    assert_eq!(
        debugger.launch(launch_descriptor("python", "app.py")).await,
        SessionState::Running
    );
    console.interrupt();
    console.interrupt();
    console.push_line("threads");
    channel.respond("threads", json!({ "threads": [{ "id": 1, "name": "main" }] }));

    let run = tokio::spawn({
        let debugger = debugger.clone();
        async move { debugger.run(&dispatcher).await }
    });
    settle().await;
    assert_eq!(debugger.state(), SessionState::Interrupted);
    assert_eq!(channel.pauses(), vec![0]);

    console.end_input();
    let state = run.await.unwrap().unwrap();
    assert_eq!(state, SessionState::Terminated);
    assert_eq!(channel.disconnect_count(), 1);
    assert!(console.output_contains("main"));
}

#[tokio::test]
async fn interrupt_is_handled_while_a_command_waits() {
    let console = Arc::new(ScriptedConsole::new());
    let channel = Arc::new(FakeChannel::new());
    let connector = Arc::new(FakeConnector::new(channel.clone()));
    let (debugger, dispatcher) = debugger_with(console.clone(), connector, BTreeMap::new());
    debugger.launch(launch_descriptor("python", "app.py")).await;

    channel.respond("threads", json!({ "threads": [{ "id": 1, "name": "main" }] }));
    let gate = channel.hold("threads");
    console.push_line("threads");
    let run = tokio::spawn({
        let debugger = debugger.clone();
        async move { debugger.run(&dispatcher).await }
    });
    settle().await;
    assert_eq!(channel.request_count("threads"), 1);

    console.interrupt();
    settle().await;
    assert_eq!(channel.pauses(), vec![0]);
    assert_eq!(debugger.state(), SessionState::Interrupted);
    assert!(!console.output_contains("main"));

    gate.notify_one();
    settle().await;
    assert!(console.output_contains("main"));

    console.end_input();
    assert_eq!(run.await.unwrap().unwrap(), SessionState::Terminated);
}

#[tokio::test]
async fn quit_ends_the_loop() {
    let console = Arc::new(ScriptedConsole::new());
    console.push_line("quit");
    let channel = Arc::new(FakeChannel::new());
    let connector = Arc::new(FakeConnector::new(channel.clone()));
    let (debugger, dispatcher) = debugger_with(console.clone(), connector, BTreeMap::new());
    debugger.launch(launch_descriptor("node", "server.js")).await;

    let state = debugger.run(&dispatcher).await.unwrap();

    assert_eq!(state, SessionState::Terminated);
    assert_eq!(channel.disconnect_count(), 1);
    assert_eq!(console.close_count(), 1);
}

#[tokio::test]
async fn failed_launch_leaves_reason_for_help() {
    let console = Arc::new(ScriptedConsole::new());
    let connector = Arc::new(FakeConnector::failing("spawn lldb-dap: not found"));
    let (debugger, _dispatcher) = debugger_with(console.clone(), connector, BTreeMap::new());

    let factory = DebuggerAdapterFactory::new();
    let args = factory
        .parse_arguments(["termdbg", "--attach", "--type", "native", "--pid", "7"])
        .unwrap();
    let descriptor = factory.adapter_from_arguments(&args).unwrap();

    assert_eq!(debugger.launch(descriptor).await, SessionState::Terminated);
    assert!(debugger.last_error().unwrap().contains("not found"));
    assert_eq!(debugger.close_session().await, SessionState::Terminated);
    assert!(console.is_closed());
}
