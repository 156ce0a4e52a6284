//! Shared fixtures: repository data and a scripted oracle
//!
//! `ScriptedOracle` answers each `OraclePurpose` from its own queue. The last
//! entry of a queue repeats, so a single script serves both parallel runs.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use insight_agent::ai::{AiError, AiResult, CompletionRequest, LlmClient, OraclePurpose};
use insight_agent::confirmation::ConfirmationMode;
use insight_agent::{DataContext, Orchestrator, PipelineConfig};

pub fn data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data")
}

pub fn data_context() -> DataContext {
    DataContext::load_dir(data_dir()).expect("repository data loads")
}

#[derive(Debug, Clone)]
pub enum Scripted {
    Reply(String),
    Fail(String),
    /// Sleep before replying, to exercise the per-call timeout
    Stall(Duration, String),
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub purpose: OraclePurpose,
    pub system_prompt: String,
    pub user_prompt: String,
    pub json_mode: bool,
}

#[derive(Debug, Default)]
pub struct ScriptedOracle {
    scripts: Mutex<HashMap<OraclePurpose, VecDeque<Scripted>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, purpose: OraclePurpose, text: impl Into<String>) -> Self {
        self.push(purpose, Scripted::Reply(text.into()))
    }

    pub fn reply_json(self, purpose: OraclePurpose, value: serde_json::Value) -> Self {
        self.reply(purpose, value.to_string())
    }

    pub fn fail(self, purpose: OraclePurpose, message: impl Into<String>) -> Self {
        self.push(purpose, Scripted::Fail(message.into()))
    }

    pub fn stall(self, purpose: OraclePurpose, delay: Duration, text: impl Into<String>) -> Self {
        self.push(purpose, Scripted::Stall(delay, text.into()))
    }

    fn push(self, purpose: OraclePurpose, entry: Scripted) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(purpose)
            .or_default()
            .push_back(entry);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, purpose: OraclePurpose) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.purpose == purpose)
            .collect()
    }

    fn next(&self, purpose: OraclePurpose) -> Option<Scripted> {
        let mut scripts = self.scripts.lock().unwrap();
        let queue = scripts.get_mut(&purpose)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl LlmClient for ScriptedOracle {
    async fn complete(&self, request: CompletionRequest) -> AiResult<String> {
        self.calls.lock().unwrap().push(RecordedCall {
            purpose: request.purpose,
            system_prompt: request.system_prompt.clone(),
            user_prompt: request.user_prompt.clone(),
            json_mode: request.json_mode,
        });

        match self.next(request.purpose) {
            Some(Scripted::Reply(text)) => Ok(text),
            Some(Scripted::Fail(message)) => Err(AiError::ApiError(message)),
            Some(Scripted::Stall(delay, text)) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            None => Err(AiError::ApiError(format!("no script for {}", request.purpose))),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }

    fn provider_name(&self) -> &str {
        "test"
    }
}

pub fn orchestrator(oracle: Arc<ScriptedOracle>) -> Orchestrator {
    orchestrator_with(oracle, ConfirmationMode::Oracle, Duration::from_secs(5))
}

pub fn orchestrator_with(
    oracle: Arc<ScriptedOracle>,
    confirmation_mode: ConfirmationMode,
    oracle_timeout: Duration,
) -> Orchestrator {
    let config = PipelineConfig {
        oracle_timeout,
        confirmation_mode,
    };
    Orchestrator::new(&data_context(), oracle, config)
}
