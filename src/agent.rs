//! The tool-use loop that turns one request into an [`AgentResult`].
//!
//! Each iteration composes a prompt, generates a reply, and parses it. A
//! `[[CHECK: ...]]` reply runs a read-only diagnostic and loops with its output
//! appended to the prompt; anything else ends the run as a suggestion or a
//! message, as decided by the [`CommandPolicy`]. The number of generations
//! per run is bounded by `max_iterations`.
//!
//! Nothing here returns `Err`: provider failures and loop exhaustion become
//! [`AgentResult::Error`], check failures become tool output, and retrieval
//! failures mean running without documentation context.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::check::{CheckRunner, ShellCheckRunner};
use crate::config::AgentConfig;
use crate::generator::TextGenerator;
use crate::index::RetrievalIndex;
use crate::intent::IntentClassifier;
use crate::models::{AgentResult, ConversationTurn, Intent, ToolInvocation};
use crate::policy::{CommandPolicy, HeuristicPolicy, Verdict};
use crate::reply::{parse_reply, strip_check_markers, Reply};

pub const LOOP_LIMIT_MESSAGE: &str = "Agent loop limit reached.";

const CODER_TEMPLATE: &str = "You are a Coding Assistant. First explain what you are going to do, \
then generate BASH commands to CREATE files using 'cat << EOF' inside a markdown code block (```bash ... ```).";

const ADMIN_TEMPLATE: &str = r#"MODES:
1. **QUERY/INFO** (User asks "What is...", "Check...", "Show me..."):
   - You can run read-only commands silently to get info.
   - FORMAT: `[[CHECK: command]]`
   - IMPORTANT: After receiving "TOOL OUTPUT", you MUST provide a human-readable summary. DO NOT loop unless the previous command failed.

2. **ACTION** (User asks "Create...", "Delete...", "Move...", "Install..."):
   - First, explain briefly what the command will do.
   - Then, output the BASH command inside a markdown code block (```bash ... ```).

EXAMPLE FLOW:
User: "How much RAM is free?"
Assistant: [[CHECK: free -h]]
System: TOOL OUTPUT: Mem: 16Gi 8Gi 8Gi ...
Assistant: You have 8Gi of free RAM.

3. **CHAT**:
   - Just reply nicely.
"#;

pub struct AgentOrchestrator {
    generator: Arc<dyn TextGenerator>,
    index: Option<Arc<RetrievalIndex>>,
    policy: Arc<dyn CommandPolicy>,
    checks: Arc<dyn CheckRunner>,
    intents: IntentClassifier,
    max_iterations: usize,
}

impl AgentOrchestrator {
    /// An orchestrator with the default policy and a shell check runner.
    pub fn new(generator: Arc<dyn TextGenerator>, config: &AgentConfig) -> Self {
        Self {
            generator,
            index: None,
            policy: Arc::new(HeuristicPolicy::default()),
            checks: Arc::new(ShellCheckRunner::from_config(config)),
            intents: IntentClassifier::with_extra_phrases(&config.coder_phrases),
            max_iterations: config.max_iterations,
        }
    }

    pub fn with_index(mut self, index: Arc<RetrievalIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_policy(mut self, policy: Arc<dyn CommandPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_check_runner(mut self, checks: Arc<dyn CheckRunner>) -> Self {
        self.checks = checks;
        self
    }

    pub fn with_intents(mut self, intents: IntentClassifier) -> Self {
        self.intents = intents;
        self
    }

    pub fn generator(&self) -> &Arc<dyn TextGenerator> {
        &self.generator
    }

    pub fn index(&self) -> Option<&Arc<RetrievalIndex>> {
        self.index.as_ref()
    }

    pub async fn run(&self, query: &str, history: &[ConversationTurn]) -> AgentResult {
        self.run_traced(query, history).await.0
    }

    /// Like [`run`](Self::run), also returning the checks executed on the way.
    pub async fn run_traced(
        &self,
        query: &str,
        history: &[ConversationTurn],
    ) -> (AgentResult, Vec<ToolInvocation>) {
        let intent = self.intents.classify(query);
        let context = self.retrieve(query).await;
        let system_instruction = system_instruction(intent, &context, history);
        let mut invocations: Vec<ToolInvocation> = Vec::new();

        debug!(intent = intent.as_str(), context_chars = context.len(), "starting agent loop");

        for iteration in 0..self.max_iterations {
            let prompt = user_prompt(query, &invocations);
            let reply = match self.generator.generate(&prompt, &system_instruction).await {
                Ok(r) => r,
                Err(e) => {
                    warn!(provider = self.generator.name(), error = %e, "generation failed");
                    return (AgentResult::error(format!("Error: {e}")), invocations);
                }
            };

            match parse_reply(&reply) {
                Reply::Check(command) => {
                    info!(iteration, command = %command, "model requested a check");
                    invocations.push(self.checks.run(&command).await);
                }
                Reply::Terminal(parsed) => {
                    let result = match self.policy.classify(&parsed, intent) {
                        Verdict::Command => AgentResult::Suggestion {
                            content: parsed.candidate,
                            explanation: parsed.explanation,
                        },
                        Verdict::Message => AgentResult::Message {
                            content: strip_check_markers(&reply),
                        },
                    };
                    return (result, invocations);
                }
            }
        }

        warn!(max_iterations = self.max_iterations, "agent loop limit reached");
        (AgentResult::error(LOOP_LIMIT_MESSAGE), invocations)
    }

    async fn retrieve(&self, query: &str) -> String {
        match &self.index {
            Some(index) => index.search_docs(query, self.generator.as_ref()).await,
            None => String::new(),
        }
    }
}

/// Template for `intent`, then documentation context, then history.
pub fn system_instruction(intent: Intent, context: &str, history: &[ConversationTurn]) -> String {
    let docs = if context.trim().is_empty() {
        String::new()
    } else {
        format!("\nLOCAL SYSTEM DOCUMENTATION:\n{context}\n")
    };

    let mut out = match intent {
        Intent::Coder => format!("{CODER_TEMPLATE}\n{docs}"),
        Intent::Admin => format!("You are Privy System Assistant.\n{docs}\n{ADMIN_TEMPLATE}"),
    };

    let history = render_history(history);
    if !history.is_empty() {
        out.push('\n');
        out.push_str(&history);
    }
    out
}

/// `User/Last Command/Result` triples under a `PREVIOUS CONTEXT:` header.
pub fn render_history(history: &[ConversationTurn]) -> String {
    if history.is_empty() {
        return String::new();
    }
    let mut out = String::from("PREVIOUS CONTEXT:\n");
    for turn in history {
        out.push_str(&format!(
            "User: {}\nLast Command: {}\nResult: {}\n---\n",
            turn.user, turn.cmd, turn.status
        ));
    }
    out
}

/// The request followed by every check output gathered so far.
pub fn user_prompt(query: &str, invocations: &[ToolInvocation]) -> String {
    let mut prompt = format!("User Request: {query}");
    for inv in invocations {
        prompt.push_str(&format!("\nTOOL OUTPUT for '{}':\n{}", inv.command, inv.output));
    }
    prompt
}
