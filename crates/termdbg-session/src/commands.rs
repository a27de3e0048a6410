//! Built-in REPL commands.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use termdbg_command::{BoxError, Command, CommandDispatcher, CommandError, CommandListing};
use termdbg_dap::{
    EvaluateArguments, EvaluateResponseBody, StackTraceArguments, StackTraceResponseBody,
    ThreadArguments, ThreadsResponseBody,
};

use crate::debugger::Debugger;
use crate::error::SessionError;
use crate::state::SessionState;

const BREAK_USAGE: &str = "break <file>:<line> [if <condition>]";
const DELETE_USAGE: &str = "delete <breakpoint number>";
const PRINT_USAGE: &str = "print <expression>";
const BACKTRACE_USAGE: &str = "backtrace [thread id]";
const BACKTRACE_DEPTH: i64 = 50;

impl Debugger {
    /// Install the built-in commands. Works before and without `launch`.
    pub fn register_commands(&self, dispatcher: &CommandDispatcher) -> Result<(), CommandError> {
        let commands: Vec<Arc<dyn Command>> = vec![
            Arc::new(Help {
                debugger: self.clone(),
                listing: dispatcher.listing(),
            }),
            Arc::new(Quit(self.clone())),
            Arc::new(Resume::new(self, "continue", &["c"], "continue", "resume the debuggee")),
            Arc::new(Resume::new(self, "next", &["n"], "next", "step over the current line")),
            Arc::new(Resume::new(self, "step", &["s"], "stepIn", "step into the current call")),
            Arc::new(Resume::new(self, "out", &["finish"], "stepOut", "run until the current function returns")),
            Arc::new(Pause(self.clone())),
            Arc::new(Break(self.clone())),
            Arc::new(ListBreakpoints(self.clone())),
            Arc::new(Delete(self.clone())),
            Arc::new(Threads(self.clone())),
            Arc::new(Backtrace(self.clone())),
            Arc::new(Print(self.clone())),
        ];
        for command in commands {
            dispatcher.register_command(command)?;
        }
        Ok(())
    }

    /// Frame id of the innermost frame of the stopped thread.
    async fn top_frame(&self, thread_id: i64) -> Result<Option<i64>, SessionError> {
        let frames = self.stack_trace(thread_id, 1).await?;
        Ok(frames.stack_frames.first().map(|frame| frame.id))
    }

    async fn stack_trace(
        &self,
        thread_id: i64,
        levels: i64,
    ) -> Result<StackTraceResponseBody, SessionError> {
        let arguments = serde_json::to_value(StackTraceArguments {
            thread_id,
            start_frame: None,
            levels: Some(levels),
        })?;
        let body = self.channel()?.request("stackTrace", Some(arguments)).await?;
        Ok(serde_json::from_value(body)?)
    }
}

struct Help {
    debugger: Debugger,
    listing: CommandListing,
}

#[async_trait]
impl Command for Help {
    fn name(&self) -> &str {
        "help"
    }

    fn aliases(&self) -> &[&str] {
        &["h", "?"]
    }

    fn help_text(&self) -> &str {
        "list commands, or describe one: help [command]"
    }

    async fn execute(&self, args: &[String]) -> Result<(), BoxError> {
        if let Some(name) = args.first() {
            let info = self
                .listing
                .find(name)
                .ok_or_else(|| format!("no command named '{name}'"))?;
            self.debugger
                .output(&format!("{}: {}", info.signature(), info.help));
            return Ok(());
        }
        self.debugger.output("Commands:");
        for info in self.listing.commands() {
            self.debugger
                .output(&format!("  {:<24} {}", info.signature(), info.help));
        }
        Ok(())
    }
}

struct Quit(Debugger);

#[async_trait]
impl Command for Quit {
    fn name(&self) -> &str {
        "quit"
    }

    fn aliases(&self) -> &[&str] {
        &["q", "exit"]
    }

    fn help_text(&self) -> &str {
        "end the debug session and exit"
    }

    async fn execute(&self, _args: &[String]) -> Result<(), BoxError> {
        self.0.close_session().await;
        Ok(())
    }
}

/// `continue`, `next`, `step` and `out`: a thread request that lets the
/// debuggee run again.
struct Resume {
    debugger: Debugger,
    name: &'static str,
    aliases: &'static [&'static str],
    request: &'static str,
    help: &'static str,
}

impl Resume {
    fn new(
        debugger: &Debugger,
        name: &'static str,
        aliases: &'static [&'static str],
        request: &'static str,
        help: &'static str,
    ) -> Self {
        Self {
            debugger: debugger.clone(),
            name,
            aliases,
            request,
            help,
        }
    }
}

#[async_trait]
impl Command for Resume {
    fn name(&self) -> &str {
        self.name
    }

    fn aliases(&self) -> &[&str] {
        self.aliases
    }

    fn help_text(&self) -> &str {
        self.help
    }

    async fn execute(&self, _args: &[String]) -> Result<(), BoxError> {
        let thread_id = self.debugger.stopped_thread()?;
        let channel = self.debugger.channel()?;
        let arguments = serde_json::to_value(ThreadArguments { thread_id })?;
        // The adapter may report the next stop before this request returns.
        let stopped_on = self.debugger.mark_resumed();
        if let Err(err) = channel.request(self.request, Some(arguments)).await {
            self.debugger.resume_failed(stopped_on);
            return Err(err.into());
        }
        Ok(())
    }
}

struct Pause(Debugger);

#[async_trait]
impl Command for Pause {
    fn name(&self) -> &str {
        "pause"
    }

    fn help_text(&self) -> &str {
        "interrupt the running debuggee"
    }

    async fn execute(&self, _args: &[String]) -> Result<(), BoxError> {
        self.0.channel()?;
        if self.0.state() != SessionState::Running {
            return Err(SessionError::NotRunning.into());
        }
        self.0.break_into();
        Ok(())
    }
}

struct Break(Debugger);

impl Break {
    fn parse(args: &[String]) -> Result<(PathBuf, i64, Option<String>), SessionError> {
        let usage = || SessionError::Usage(BREAK_USAGE);
        let location = args.first().ok_or_else(usage)?;
        let (file, line) = location.rsplit_once(':').ok_or_else(usage)?;
        let line: i64 = line.parse().map_err(|_| usage())?;
        if file.is_empty() || line < 1 {
            return Err(usage());
        }
        let condition = match args.get(1).map(String::as_str) {
            None => None,
            Some("if") if args.len() > 2 => Some(args[2..].join(" ")),
            Some(_) => return Err(usage()),
        };
        let path = PathBuf::from(file);
        let path = if path.is_absolute() {
            path
        } else {
            std::env::current_dir()?.join(path)
        };
        Ok((path, line, condition))
    }
}

#[async_trait]
impl Command for Break {
    fn name(&self) -> &str {
        "break"
    }

    fn aliases(&self) -> &[&str] {
        &["b"]
    }

    fn help_text(&self) -> &str {
        "set a breakpoint: break <file>:<line> [if <condition>]"
    }

    async fn execute(&self, args: &[String]) -> Result<(), BoxError> {
        let (path, line, condition) = Self::parse(args)?;
        let id = self.0.breakpoints().add(path.clone(), line, condition);
        self.0.sync_breakpoints(&path).await?;
        let summary = self.0.breakpoints().get(id).map(|bp| {
            let status = if bp.verified { "" } else { " (pending)" };
            format!("breakpoint {id} at {}{status}", bp.location())
        });
        if let Some(summary) = summary {
            self.0.output(&summary);
        }
        Ok(())
    }
}

struct ListBreakpoints(Debugger);

#[async_trait]
impl Command for ListBreakpoints {
    fn name(&self) -> &str {
        "breakpoints"
    }

    fn aliases(&self) -> &[&str] {
        &["bl"]
    }

    fn help_text(&self) -> &str {
        "list breakpoints"
    }

    async fn execute(&self, _args: &[String]) -> Result<(), BoxError> {
        let lines: Vec<String> = self
            .0
            .breakpoints()
            .sorted()
            .into_iter()
            .map(|bp| {
                let status = if bp.verified { "verified" } else { "pending" };
                format!("  {:>3}  {}  [{status}]", bp.id, bp.location())
            })
            .collect();
        if lines.is_empty() {
            self.0.output("no breakpoints");
        }
        for line in lines {
            self.0.output(&line);
        }
        Ok(())
    }
}

struct Delete(Debugger);

#[async_trait]
impl Command for Delete {
    fn name(&self) -> &str {
        "delete"
    }

    fn aliases(&self) -> &[&str] {
        &["d"]
    }

    fn help_text(&self) -> &str {
        "remove a breakpoint: delete <number>"
    }

    async fn execute(&self, args: &[String]) -> Result<(), BoxError> {
        let id: u32 = args
            .first()
            .and_then(|arg| arg.parse().ok())
            .ok_or(SessionError::Usage(DELETE_USAGE))?;
        let removed = self
            .0
            .breakpoints()
            .remove(id)
            .ok_or(SessionError::UnknownBreakpoint(id))?;
        self.0.sync_breakpoints(&removed.path).await?;
        self.0
            .output(&format!("deleted breakpoint {id} at {}", removed.location()));
        Ok(())
    }
}

struct Threads(Debugger);

#[async_trait]
impl Command for Threads {
    fn name(&self) -> &str {
        "threads"
    }

    fn help_text(&self) -> &str {
        "list the debuggee's threads"
    }

    async fn execute(&self, _args: &[String]) -> Result<(), BoxError> {
        let body = self.0.channel()?.request("threads", None).await?;
        let threads: ThreadsResponseBody = serde_json::from_value(body)?;
        let current = self.0.current_thread();
        for thread in threads.threads {
            let marker = if Some(thread.id) == current { '*' } else { ' ' };
            self.0
                .output(&format!("{marker} {:>4}  {}", thread.id, thread.name));
        }
        Ok(())
    }
}

struct Backtrace(Debugger);

#[async_trait]
impl Command for Backtrace {
    fn name(&self) -> &str {
        "backtrace"
    }

    fn aliases(&self) -> &[&str] {
        &["bt", "where"]
    }

    fn help_text(&self) -> &str {
        "show the call stack of the stopped thread: backtrace [thread id]"
    }

    async fn execute(&self, args: &[String]) -> Result<(), BoxError> {
        let thread_id = match args.first() {
            Some(arg) => {
                self.0.channel()?;
                arg.parse()
                    .map_err(|_| SessionError::Usage(BACKTRACE_USAGE))?
            }
            None => self.0.stopped_thread()?,
        };
        let trace = self.0.stack_trace(thread_id, BACKTRACE_DEPTH).await?;
        if trace.stack_frames.is_empty() {
            self.0.output("no stack frames");
        }
        for (depth, frame) in trace.stack_frames.iter().enumerate() {
            let source = frame
                .source
                .as_ref()
                .map_or("<unknown>", |source| source.display_name());
            self.0.output(&format!(
                "#{depth:<3} {} at {source}:{}",
                frame.name, frame.line
            ));
        }
        Ok(())
    }
}

struct Print(Debugger);

#[async_trait]
impl Command for Print {
    fn name(&self) -> &str {
        "print"
    }

    fn aliases(&self) -> &[&str] {
        &["p", "eval"]
    }

    fn help_text(&self) -> &str {
        "evaluate an expression in the current frame"
    }

    async fn execute(&self, args: &[String]) -> Result<(), BoxError> {
        if args.is_empty() {
            return Err(SessionError::Usage(PRINT_USAGE).into());
        }
        let channel = self.0.channel()?;
        let frame_id = match self.0.stopped_thread() {
            Ok(thread_id) => self.0.top_frame(thread_id).await?,
            Err(_) => None,
        };
        let arguments = serde_json::to_value(EvaluateArguments {
            expression: args.join(" "),
            frame_id,
            context: Some("repl".to_string()),
        })?;
        let body = channel.request("evaluate", Some(arguments)).await?;
        let result: EvaluateResponseBody = serde_json::from_value(body)?;
        match result.result_type {
            Some(kind) if !kind.is_empty() => {
                self.0.output(&format!("{} ({kind})", result.result))
            }
            _ => self.0.output(&result.result),
        }
        Ok(())
    }
}
