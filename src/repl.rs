//! Interactive shell.
//!
//! Each line is one of: a built-in (`exit`, `logout`, `privy-status`,
//! `privy-index`, `privypm <package>`), a native command passed straight to `sh`, or a request
//! for the orchestrator. Suggested commands run only after the user confirms
//! with `[Y/n]`. Each exchange is recorded in a bounded history that feeds
//! the next request's prompt.

use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::agent::AgentOrchestrator;
use crate::config::expand_home;
use crate::models::{AgentResult, ConversationTurn};
use crate::{pm, status};

/// Commands executed directly instead of being sent to the model.
pub const NATIVE_COMMANDS: &[&str] = &[
    "ls", "cd", "pwd", "cat", "grep", "cp", "mv", "rm", "mkdir", "touch", "clear",
];

/// What to do with one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineAction {
    Skip,
    Exit,
    Status,
    Index,
    /// Install a package and print a cheat sheet for it.
    Pm(Option<String>),
    ChangeDir(Option<String>),
    Native(String),
    Ask(String),
}

pub fn classify_line(line: &str) -> LineAction {
    let line = line.trim();
    if line.is_empty() {
        return LineAction::Skip;
    }

    let lowered = line.to_lowercase();
    if lowered == "exit" || lowered == "logout" {
        return LineAction::Exit;
    }

    let root = line.split_whitespace().next().unwrap_or("");
    match root {
        "privy-status" => LineAction::Status,
        "privy-index" => LineAction::Index,
        "privypm" => LineAction::Pm(line.split_whitespace().nth(1).map(str::to_string)),
        "cd" => {
            let target = line[2..].trim();
            LineAction::ChangeDir((!target.is_empty()).then(|| target.to_string()))
        }
        _ if NATIVE_COMMANDS.contains(&root) => LineAction::Native(line.to_string()),
        _ => LineAction::Ask(line.to_string()),
    }
}

/// `y`, `yes` or an empty answer confirms.
pub fn is_confirmation(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "" | "y" | "yes")
}

pub struct Repl {
    agent: AgentOrchestrator,
    history: VecDeque<ConversationTurn>,
    history_limit: usize,
    ai_enabled: bool,
}

impl Repl {
    pub fn new(agent: AgentOrchestrator, history_limit: usize) -> Self {
        Self {
            agent,
            history: VecDeque::new(),
            history_limit,
            ai_enabled: true,
        }
    }

    pub fn history(&self) -> Vec<ConversationTurn> {
        self.history.iter().cloned().collect()
    }

    pub fn record(&mut self, turn: ConversationTurn) {
        if self.history_limit == 0 {
            return;
        }
        while self.history.len() >= self.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(turn);
    }

    /// Run the prompt loop until `exit`, `logout` or end of input.
    pub async fn run(&mut self) -> Result<()> {
        let interactive = atty::is(atty::Stream::Stdin);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        self.ai_enabled = self.agent.generator().ready().await;
        if !self.ai_enabled {
            println!(
                "[System] AI ({}) is not ready. Native commands still work.",
                self.agent.generator().name()
            );
        }

        loop {
            if interactive {
                let cwd = std::env::current_dir()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                print!("Privy {} > ", cwd);
                std::io::stdout().flush().ok();
            }

            let line = tokio::select! {
                line = lines.next_line() => line.context("Failed to read input")?,
                _ = tokio::signal::ctrl_c() => {
                    println!("\nExit with 'exit'");
                    continue;
                }
            };
            let Some(line) = line else {
                break;
            };

            match classify_line(&line) {
                LineAction::Skip => {}
                LineAction::Exit => break,
                LineAction::Status => {
                    let store = self.agent.index().map(|i| i.store().as_ref());
                    status::run_status(self.agent.generator().as_ref(), store).await?;
                }
                LineAction::Index => self.rebuild_index().await,
                LineAction::Pm(None) => println!("Usage: privypm <package>"),
                LineAction::Pm(Some(package)) => {
                    if let Err(e) = pm::run_pm(self.agent.generator().as_ref(), &package).await {
                        println!("[System] {:#}", e);
                    }
                }
                LineAction::ChangeDir(target) => change_dir(target.as_deref()),
                LineAction::Native(command) => {
                    run_shell(&command).await;
                }
                LineAction::Ask(query) => {
                    if !self.ai_enabled {
                        println!("AI disabled.");
                        continue;
                    }
                    self.ask(&query, &mut lines).await?;
                }
            }
        }

        Ok(())
    }

    async fn ask(&mut self, query: &str, lines: &mut Lines<BufReader<Stdin>>) -> Result<()> {
        println!("Thinking...");
        let history = self.history();
        let (result, checks) = self.agent.run_traced(query, &history).await;

        for check in &checks {
            println!("[Agent] Checked: {}", check.command);
        }

        let turn = match result {
            AgentResult::Message { content } => {
                println!("{}", content);
                ConversationTurn::new(query, "", "Answered")
            }
            AgentResult::Suggestion {
                content,
                explanation,
            } => {
                if let Some(explanation) = explanation {
                    println!("[Explanation] {}", explanation);
                }
                println!("Suggestion: {}", content);
                print!("Execute? [Y/n]: ");
                std::io::stdout().flush().ok();

                let answer = lines
                    .next_line()
                    .await
                    .context("Failed to read input")?
                    .unwrap_or_default();
                if is_confirmation(&answer) {
                    let outcome = match run_shell(&content).await {
                        Some(0) => "Executed".to_string(),
                        Some(code) => format!("Failed (exit {})", code),
                        None => "Failed".to_string(),
                    };
                    ConversationTurn::new(query, content, outcome)
                } else {
                    ConversationTurn::new(query, content, "Skipped")
                }
            }
            AgentResult::Error { content } => {
                println!("{}", content);
                ConversationTurn::new(query, "", "Error")
            }
        };

        self.record(turn);
        Ok(())
    }

    async fn rebuild_index(&self) {
        let Some(index) = self.agent.index() else {
            println!("[System] No index configured.");
            return;
        };
        println!("[System] Indexing {}...", index.docs_dir().display());
        match index.index_docs(self.agent.generator().as_ref()).await {
            Ok(stats) => println!(
                "[System] Indexed {} chunks from {} files ({} skipped).",
                stats.chunks, stats.files, stats.skipped
            ),
            Err(e) => println!("[System] Indexing failed: {:#}", e),
        }
    }
}

fn change_dir(target: Option<&str>) {
    let path = match target {
        Some(t) => expand_home(t),
        None => dirs::home_dir().unwrap_or_else(|| PathBuf::from("/")),
    };
    if let Err(e) = std::env::set_current_dir(&path) {
        println!("cd: {}: {}", path.display(), e);
    }
}

/// Run `command` through `sh` with the terminal attached; returns the exit code.
async fn run_shell(command: &str) -> Option<i32> {
    debug!(command = %command, "running shell command");
    match Command::new("sh").arg("-c").arg(command).status().await {
        Ok(status) => status.code(),
        Err(e) => {
            warn!(command = %command, error = %e, "failed to run command");
            println!("Error: {}", e);
            None
        }
    }
}
