//! Interactive chat loop

use anyhow::Result;
use console::style;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use parley_agent::{ChatApp, ConversationError, PendingReply, SendOutcome};
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error};

use crate::render;

/// One line of REPL input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Send(String),
    New,
    List,
    Open(String),
    Delete(String),
    Help,
    Quit,
    Unknown(String),
}

impl ReplCommand {
    /// Parse a line; anything not starting with `/` is a message
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        let Some(rest) = trimmed.strip_prefix('/') else {
            return ReplCommand::Send(line.to_string());
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        match (name, arg) {
            ("new", _) => ReplCommand::New,
            ("list", _) => ReplCommand::List,
            ("open", target) if !target.is_empty() => ReplCommand::Open(target.to_string()),
            ("delete", target) if !target.is_empty() => ReplCommand::Delete(target.to_string()),
            ("help", _) => ReplCommand::Help,
            ("quit" | "exit", _) => ReplCommand::Quit,
            _ => ReplCommand::Unknown(trimmed.to_string()),
        }
    }
}

const HELP: &str = "\
/new            start a new chat
/list           list chats
/open <n|id>    switch to a chat
/delete <n|id>  delete a chat
/help           show this help
/quit           leave";

/// Run the interactive loop until `/quit` or end of input
///
/// Replies are awaited in the background, so chats can be switched, created
/// and deleted while one is pending.
pub async fn run(app: &ChatApp) -> Result<()> {
    println!("{}", style("Parley").bold().cyan());
    println!("{}\n", style("Type a message, or /help for commands.").dim());
    print!("{}", render::transcript(&app.view()));

    let mut repl = Repl::new(app);
    let mut updates = app.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if repl.handle(ReplCommand::parse(&line)).is_break() {
                    break;
                }
            }
            result = wait_for_reply(&mut repl.pending) => repl.finish(result),
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let pending = updates.borrow_and_update().pending;
                repl.set_waiting(pending);
            }
        }
    }

    if let Some(mut reply) = repl.pending.take() {
        println!("{}", style("Waiting for the pending reply...").dim());
        let result = reply.join().await;
        repl.pending = Some(reply);
        repl.finish(result);
    }
    repl.set_waiting(false);
    Ok(())
}

/// Send one message and print the reply, with a spinner while pending
pub async fn send(app: &ChatApp, text: &str) -> Result<()> {
    let before = app.view().transcript.len();

    let spinner = spinner();
    let result = app.send(text).await;
    spinner.finish_and_clear();

    match result {
        Ok(SendOutcome::Ignored) => debug!("Ignoring blank input"),
        Ok(SendOutcome::Orphaned) => {
            println!("{}", style("The chat was deleted before the reply arrived.").dim())
        }
        Ok(_) => {
            let view = app.view();
            for entry in view.transcript.iter().skip(before) {
                print!("{}", render::entry(entry));
            }
        }
        Err(e) => {
            error!("Send failed: {}", e);
            return Err(e.into());
        }
    }
    Ok(())
}

async fn wait_for_reply(
    pending: &mut Option<PendingReply>,
) -> Result<SendOutcome, ConversationError> {
    match pending {
        Some(reply) => reply.join().await,
        None => std::future::pending().await,
    }
}

fn spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner());
    spinner.set_message("waiting for reply");
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Interactive session state: the reply in flight and its spinner
struct Repl<'a> {
    app: &'a ChatApp,
    pending: Option<PendingReply>,
    spinner: Option<ProgressBar>,
}

impl<'a> Repl<'a> {
    fn new(app: &'a ChatApp) -> Self {
        Self {
            app,
            pending: None,
            spinner: None,
        }
    }

    /// Run one command; failures are reported and the loop goes on
    fn handle(&mut self, command: ReplCommand) -> ControlFlow<()> {
        match command {
            ReplCommand::Send(text) => self.send(&text),
            ReplCommand::New => match self.app.new_chat() {
                Ok(_) => self.say(render::transcript(&self.app.view())),
                Err(e) => self.report(e),
            },
            ReplCommand::List => self.say(render::sidebar(&self.app.view())),
            ReplCommand::Open(target) => self.open(&target),
            ReplCommand::Delete(target) => self.delete(&target),
            ReplCommand::Help => self.say(format!("{}\n", HELP)),
            ReplCommand::Quit => return ControlFlow::Break(()),
            ReplCommand::Unknown(cmd) => self.say(format!(
                "{}\n",
                style(format!("Unknown command {}, try /help", cmd)).yellow()
            )),
        }
        ControlFlow::Continue(())
    }

    fn send(&mut self, text: &str) {
        match self.app.start(text) {
            Ok(Some(reply)) => self.pending = Some(reply),
            Ok(None) => debug!("Ignoring blank input"),
            Err(ConversationError::Busy) => self.say(format!(
                "{}\n",
                style("Still waiting for the previous reply.").yellow()
            )),
            Err(e) => self.report(e),
        }
    }

    /// Print the outcome of the reply that just finished
    fn finish(&mut self, result: Result<SendOutcome, ConversationError>) {
        let Some(reply) = self.pending.take() else {
            return;
        };
        self.set_waiting(false);

        match result {
            Ok(SendOutcome::Ignored) => {}
            Ok(SendOutcome::Orphaned) => self.say(format!(
                "{}\n",
                style("The chat was deleted before the reply arrived.").dim()
            )),
            Ok(_) => {
                let view = self.app.view();
                let shown = view
                    .active()
                    .is_some_and(|active| &active.id == reply.session_id());
                if shown {
                    if let Some(entry) = view.transcript.last() {
                        self.say(render::entry(entry));
                    }
                } else {
                    let title = render::title_of(&view, reply.session_id());
                    self.say(format!(
                        "{}\n",
                        style(format!("Reply arrived in \"{}\"", title)).dim()
                    ));
                }
            }
            Err(e) => self.report(e),
        }
    }

    fn open(&self, target: &str) {
        match render::resolve_target(&self.app.view(), target) {
            Some(id) if self.app.open(&id) => {
                self.say(format!(
                    "{}\n{}",
                    style(format!("Switched to {}", id)).dim(),
                    render::transcript(&self.app.view())
                ));
            }
            _ => self.say(format!(
                "{}\n",
                style(format!("No chat matches '{}'", target)).yellow()
            )),
        }
    }

    /// Confirm, then delete
    fn delete(&self, target: &str) {
        let view = self.app.view();
        let Some(id) = render::resolve_target(&view, target) else {
            self.say(format!(
                "{}\n",
                style(format!("No chat matches '{}'", target)).yellow()
            ));
            return;
        };
        let title = render::title_of(&view, &id);

        let prompt = Confirm::new()
            .with_prompt(format!("Delete \"{}\"?", title))
            .default(false);
        let confirmed = match &self.spinner {
            Some(spinner) => spinner.suspend(|| prompt.interact()),
            None => prompt.interact(),
        };
        match confirmed {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => return self.report(e),
        }

        match self.app.delete(&id) {
            Ok(()) => self.say(format!(
                "{}\n{}",
                style(format!("Deleted \"{}\"", title)).dim(),
                render::sidebar(&self.app.view())
            )),
            Err(e) if e.is_recoverable() => self.say(format!("{}\n", style(e).yellow())),
            Err(e) => self.report(e),
        }
    }

    /// Show or hide the spinner to match the pending flag
    fn set_waiting(&mut self, pending: bool) {
        match (pending, self.spinner.take()) {
            (true, None) => self.spinner = Some(spinner()),
            (true, Some(spinner)) => self.spinner = Some(spinner),
            (false, Some(spinner)) => spinner.finish_and_clear(),
            (false, None) => {}
        }
    }

    fn say(&self, text: impl std::fmt::Display) {
        match &self.spinner {
            Some(spinner) => spinner.suspend(|| print!("{}", text)),
            None => print!("{}", text),
        }
    }

    fn report(&self, e: impl std::fmt::Display) {
        error!("{}", e);
        self.say(format!("{}\n", style(e).red()));
    }
}
