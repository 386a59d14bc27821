//! Command-versus-prose classification of a terminal reply.
//!
//! The orchestrator only depends on [`CommandPolicy`]; [`HeuristicPolicy`]
//! is the default rule set:
//!
//! 1. Coder intent and a fenced candidate: always a command.
//! 2. First token on the binary allow-list, or a `|` / `&&` anywhere: a command.
//! 3. A rule-2 command spanning several lines without `&&` or `;` is demoted
//!    to a message, unless it was fenced.
//!
//! Anything else is a message.

use crate::models::Intent;
use crate::reply::ParsedReply;

/// Outcome of classifying a terminal reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Command,
    Message,
}

pub trait CommandPolicy: Send + Sync {
    fn classify(&self, reply: &ParsedReply, intent: Intent) -> Verdict;
}

pub const DEFAULT_BINARIES: &[&str] = &[
    "ls", "cd", "cat", "grep", "find", "mkdir", "rm", "mv", "cp", "git", "apt", "nano", "vim",
    "python", "curl", "wget", "ip", "ping", "systemctl", "sudo",
];

#[derive(Debug, Clone)]
pub struct HeuristicPolicy {
    binaries: Vec<String>,
}

impl Default for HeuristicPolicy {
    fn default() -> Self {
        Self::with_binaries(DEFAULT_BINARIES.iter().copied())
    }
}

impl HeuristicPolicy {
    pub fn with_binaries<I, S>(binaries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            binaries: binaries.into_iter().map(Into::into).collect(),
        }
    }

    fn looks_like_command(&self, text: &str) -> bool {
        let first = text.split_whitespace().next().unwrap_or("");
        self.binaries.iter().any(|b| b == first) || text.contains('|') || text.contains("&&")
    }
}

impl CommandPolicy for HeuristicPolicy {
    fn classify(&self, reply: &ParsedReply, intent: Intent) -> Verdict {
        if intent == Intent::Coder && reply.fenced {
            return Verdict::Command;
        }

        let text = reply.candidate.as_str();
        if !self.looks_like_command(text) {
            return Verdict::Message;
        }

        let multiline = text.trim().lines().count() > 1;
        let chained = text.contains("&&") || text.contains(';');
        if multiline && !chained && !reply.fenced {
            return Verdict::Message;
        }

        Verdict::Command
    }
}
