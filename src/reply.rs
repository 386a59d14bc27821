//! Parsing of generated replies.
//!
//! A reply is either a read-only check request (`[[CHECK: <command>]]`,
//! case-insensitive) or a terminal answer. For a terminal answer the first
//! fenced block, optionally tagged `bash`, `sh` or `shell`, is the command
//! candidate and the text around it is the explanation. Without a fence the
//! whole trimmed reply is the candidate.

use regex::Regex;
use std::sync::LazyLock;

static CHECK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[\[CHECK:\s*(.*?)\]\]").unwrap());

static CHECK_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\[\[CHECK:").unwrap());

static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:(?:bash|shell|sh)\s)?\s*(.*?)\s*```").unwrap()
});

/// What the orchestrator should do with a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Run this command and feed its output back.
    Check(String),
    Terminal(ParsedReply),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReply {
    /// Command candidate extracted from the reply.
    pub candidate: String,
    /// Whether the candidate came from a closed code fence.
    pub fenced: bool,
    /// Reply text with the fence removed; `None` when nothing is left.
    pub explanation: Option<String>,
}

pub fn parse_reply(reply: &str) -> Reply {
    if let Some(caps) = CHECK_RE.captures(reply) {
        let command = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        return Reply::Check(command.to_string());
    }
    Reply::Terminal(parse_terminal(reply))
}

fn parse_terminal(reply: &str) -> ParsedReply {
    if let Some(caps) = FENCE_RE.captures(reply) {
        let candidate = caps
            .get(1)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        let explanation = FENCE_RE.replace(reply, "").trim().to_string();
        return ParsedReply {
            candidate,
            fenced: true,
            explanation: (!explanation.is_empty()).then_some(explanation),
        };
    }

    let trimmed = reply.trim();
    let mut candidate = trimmed.to_string();

    // Unclosed or oddly closed fence wrapping the whole reply
    if trimmed.starts_with("```") {
        let lines: Vec<&str> = trimmed.lines().collect();
        if lines.len() >= 3 {
            candidate = lines[1..lines.len() - 1].join("\n").trim().to_string();
        }
    }

    ParsedReply {
        candidate,
        fenced: false,
        explanation: None,
    }
}

/// Remove stray `[[CHECK:` openers from prose and trim.
pub fn strip_check_markers(text: &str) -> String {
    CHECK_MARKER_RE.replace_all(text, "").trim().to_string()
}
