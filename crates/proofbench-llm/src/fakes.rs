//! In-memory chat clients (testing and smoke runs)
//!
//! `ScriptedChatClient` answers prompts from a fixed table and records every
//! request it receives, so runner tests can assert on call order.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use crate::client::{ChatClient, ChatRequest, ChatResponse};
use crate::error::ChatError;
use crate::Result;

#[derive(Debug, Clone)]
enum Scripted {
    Reply(String),
    Fail(String),
}

/// Chat client that replies from a prompt → answer table.
///
/// Unknown prompts get the fallback reply (empty string by default).
#[derive(Debug, Default)]
pub struct ScriptedChatClient {
    script: HashMap<String, Scripted>,
    fallback: String,
    calls: Mutex<Vec<ChatRequest>>,
}

impl ScriptedChatClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply `answer` when `prompt` is asked.
    pub fn reply(mut self, prompt: &str, answer: &str) -> Self {
        self.script
            .insert(prompt.to_string(), Scripted::Reply(answer.to_string()));
        self
    }

    /// Fail with an HTTP error when `prompt` is asked.
    pub fn fail(mut self, prompt: &str, message: &str) -> Self {
        self.script
            .insert(prompt.to_string(), Scripted::Fail(message.to_string()));
        self
    }

    /// Reply used for prompts not in the table.
    pub fn with_fallback(mut self, answer: &str) -> Self {
        self.fallback = answer.to_string();
        self
    }

    /// Prompts received so far, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.prompt.clone())
            .collect()
    }
}

#[async_trait]
impl ChatClient for ScriptedChatClient {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.calls.lock().unwrap().push(request.clone());
        match self.script.get(&request.prompt) {
            Some(Scripted::Fail(message)) => Err(ChatError::Http(message.clone())),
            Some(Scripted::Reply(text)) => Ok(reply(text)),
            None => Ok(reply(&self.fallback)),
        }
    }

    fn endpoint(&self) -> &str {
        "memory://scripted"
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

fn reply(text: &str) -> ChatResponse {
    ChatResponse {
        text: text.to_string(),
        raw: json!({"choices": [{"message": {"role": "assistant", "content": text}}]}),
    }
}
