use std::collections::VecDeque;
use std::fs;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use privy::agent::AgentOrchestrator;
use privy::check::ShellCheckRunner;
use privy::config::{AgentConfig, IndexConfig, RetrievalConfig};
use privy::error::ProviderError;
use privy::generator::TextGenerator;
use privy::index::RetrievalIndex;
use privy::models::{AgentResult, ConversationTurn};
use privy::store::InMemoryStore;
use tempfile::TempDir;

/// Replays canned replies and embeds by keyword presence.
struct FakeModel {
    replies: Mutex<VecDeque<String>>,
    seen: Mutex<Vec<(String, String)>>,
}

impl FakeModel {
    fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn seen(&self) -> Vec<(String, String)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for FakeModel {
    fn name(&self) -> &str {
        "fake"
    }

    fn identity(&self) -> String {
        "fake:keywords".to_string()
    }

    async fn generate(&self, prompt: &str, system: &str) -> Result<String, ProviderError> {
        self.seen
            .lock()
            .unwrap()
            .push((prompt.to_string(), system.to_string()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::Malformed {
                reason: "script exhausted".to_string(),
            })
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let t = text.to_lowercase();
        Ok(["backup", "nginx", "ram"]
            .iter()
            .map(|k| if t.contains(k) { 1.0 } else { 0.0 })
            .collect())
    }

    async fn ready(&self) -> bool {
        true
    }
}

async fn grounded_agent(model: Arc<FakeModel>, tmp: &TempDir) -> AgentOrchestrator {
    fs::write(
        tmp.path().join("backup.md"),
        "Nightly backup runs /usr/local/bin/privy-backup.sh at 02:00.",
    )
    .unwrap();
    fs::write(tmp.path().join("web.md"), "The nginx config lives in /etc/nginx.").unwrap();

    let index = RetrievalIndex::new(
        Arc::new(InMemoryStore::new()),
        IndexConfig {
            docs_dir: tmp.path().to_path_buf(),
            ..IndexConfig::default()
        },
        RetrievalConfig::default(),
    );
    index.index_docs(model.as_ref()).await.unwrap();

    AgentOrchestrator::new(model, &AgentConfig::default()).with_index(Arc::new(index))
}

#[tokio::test]
async fn test_documentation_reaches_system_instruction() {
    let tmp = TempDir::new().unwrap();
    let model = Arc::new(FakeModel::new(&[
        "This runs the backup now.\n```bash\nsudo /usr/local/bin/privy-backup.sh\n```",
    ]));
    let agent = grounded_agent(model.clone(), &tmp).await;

    let result = agent.run("Run the backup", &[]).await;
    assert_eq!(
        result,
        AgentResult::Suggestion {
            content: "sudo /usr/local/bin/privy-backup.sh".to_string(),
            explanation: Some("This runs the backup now.".to_string()),
        }
    );

    let (_, system) = model.seen().remove(0);
    assert!(system.contains("LOCAL SYSTEM DOCUMENTATION:"));
    assert!(system.contains("--- DOCUMENT: backup.md ---"));
    assert!(!system.contains("web.md"));
}

#[tokio::test]
async fn test_no_matching_docs_means_no_context_block() {
    let tmp = TempDir::new().unwrap();
    let model = Arc::new(FakeModel::new(&["Hello! How can I help?"]));
    let agent = grounded_agent(model.clone(), &tmp).await;

    let result = agent.run("Hi there", &[]).await;
    assert_eq!(
        result,
        AgentResult::Message {
            content: "Hello! How can I help?".to_string()
        }
    );
    let (_, system) = model.seen().remove(0);
    assert!(!system.contains("LOCAL SYSTEM DOCUMENTATION"));
}

#[tokio::test]
async fn test_real_check_output_is_fed_back() {
    let model = Arc::new(FakeModel::new(&[
        "[[CHECK: echo Mem: 16Gi 8Gi 8Gi]]",
        "You have 8Gi of free RAM.",
    ]));
    let agent = AgentOrchestrator::new(model.clone(), &AgentConfig::default())
        .with_check_runner(Arc::new(ShellCheckRunner::from_config(&AgentConfig::default())));

    let (result, checks) = agent.run_traced("How much RAM is free?", &[]).await;
    assert_eq!(result.content(), "You have 8Gi of free RAM.");
    assert_eq!(checks.len(), 1);
    assert_eq!(checks[0].exit_status, Some(0));

    let seen = model.seen();
    assert_eq!(
        seen[1].0,
        "User Request: How much RAM is free?\nTOOL OUTPUT for 'echo Mem: 16Gi 8Gi 8Gi':\nMem: 16Gi 8Gi 8Gi\n"
    );
}

#[tokio::test]
async fn test_failed_check_is_reported_to_model() {
    let model = Arc::new(FakeModel::new(&[
        "[[CHECK: sleep 3]]",
        "The check timed out, try again later.",
    ]));
    let agent = AgentOrchestrator::new(model.clone(), &AgentConfig::default())
        .with_check_runner(Arc::new(ShellCheckRunner::new(
            std::time::Duration::from_millis(100),
            2000,
            500,
        )));

    let result = agent.run("Is the disk slow?", &[]).await;
    assert!(!result.is_error());
    assert!(model.seen()[1].0.ends_with("Error: Command timed out."));
}

#[tokio::test]
async fn test_history_is_rendered_for_follow_ups() {
    let model = Arc::new(FakeModel::new(&["Done."]));
    let agent = AgentOrchestrator::new(model.clone(), &AgentConfig::default());
    let history = vec![
        ConversationTurn::new("make a dir", "mkdir demo", "Executed"),
        ConversationTurn::new("go there", "cd demo", "Skipped"),
    ];

    agent.run("and list it", &history).await;

    let (_, system) = model.seen().remove(0);
    assert!(system.contains(
        "PREVIOUS CONTEXT:\nUser: make a dir\nLast Command: mkdir demo\nResult: Executed\n---\nUser: go there\nLast Command: cd demo\nResult: Skipped\n---\n"
    ));
}

#[test]
fn test_result_json_shape() {
    let suggestion = AgentResult::Suggestion {
        content: "ls".to_string(),
        explanation: None,
    };
    assert_eq!(
        serde_json::to_value(&suggestion).unwrap(),
        serde_json::json!({"type": "suggestion", "content": "ls"})
    );

    let err = AgentResult::error("Agent loop limit reached.");
    assert_eq!(
        serde_json::to_value(&err).unwrap(),
        serde_json::json!({"type": "error", "content": "Agent loop limit reached."})
    );
}
