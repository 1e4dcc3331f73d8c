//! Test doubles shared by the integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use qa_orchestrator::{LanguageModel, OrchestratorError, Tool};

/// Replays canned responses in order and records every prompt it was given.
/// Once the script runs out the last response repeats.
pub struct ScriptedModel {
    responses: Mutex<VecDeque<String>>,
    last: Mutex<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new<I, S>(responses: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            last: Mutex::new(String::new()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// Always answers with the same text
    pub fn repeating(response: &str) -> Arc<Self> {
        Self::new([response])
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str) -> Result<String, OrchestratorError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.responses.lock().unwrap().pop_front() {
            *last = next;
        }
        Ok(last.clone())
    }
}

/// Sleeps before every response
pub struct SlowModel {
    pub delay: Duration,
    pub response: String,
}

#[async_trait]
impl LanguageModel for SlowModel {
    async fn complete(&self, _prompt: &str) -> Result<String, OrchestratorError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.response.clone())
    }
}

/// Fails every call
pub struct FailingModel(pub &'static str);

#[async_trait]
impl LanguageModel for FailingModel {
    async fn complete(&self, _prompt: &str) -> Result<String, OrchestratorError> {
        Err(OrchestratorError::ModelError(self.0.to_string()))
    }
}

/// A tool that returns a fixed reply and counts its executions
pub fn counting_tool(name: &str, reply: &'static str) -> (Tool, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let tool = Tool::new(name, format!("Test tool {}", name), move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(reply.to_string())
    });
    (tool, calls)
}

/// A tool that blocks its thread for `delay`
pub fn sleeping_tool(name: &str, delay: Duration) -> Tool {
    Tool::new(name, "Sleeps before answering", move |_| {
        std::thread::sleep(delay);
        Ok("finally done".to_string())
    })
}

pub fn calls(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}
