//! Chat providers behind the workspace LLM configuration.
//!
//! Each workspace names a backend (`openai`, `groq`, `ollama`,
//! `anythingllm`), a model and optional URL/API key. The coordinator only
//! ever needs single-shot prompting: arrival greetings and expired-session
//! summaries.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{HelplineError, HelplineResult};
use crate::models::{LlmKind, Workspace};

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
const DEFAULT_GROQ_URL: &str = "https://api.groq.com/openai/v1";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Generous ceiling for chat completions; the classifier client runs much
/// tighter.
const CHAT_TIMEOUT_SECS: u64 = 60;

/// Single-shot prompting against a workspace's chat backend.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn chat(&self, prompt: &str) -> HelplineResult<String>;
}

/// Builds a [`ChatProvider`] for a workspace. Indirection point for tests,
/// which substitute scripted providers.
pub trait ProviderFactory: Send + Sync {
    fn provider(
        &self,
        workspace: &Workspace,
        thread_slug: Option<&str>,
    ) -> HelplineResult<Arc<dyn ChatProvider>>;
}

/// OpenAI-style chat completions. Serves both OpenAI and Groq; they differ
/// only in base URL.
pub struct OpenAiCompatProvider {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: String,
}

impl OpenAiCompatProvider {
    pub fn new(
        http: Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatProvider {
    async fn chat(&self, prompt: &str) -> HelplineResult<String> {
        debug!(model = %self.model, "chat completion request");

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [{"role": "user", "content": prompt}],
            }))
            .send()
            .await?
            .error_for_status()?;

        let parsed: CompletionResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| {
                HelplineError::ApiParseError("completion response had no choices".to_string())
            })
    }
}

/// Local Ollama chat endpoint.
pub struct OllamaProvider {
    http: Client,
    base_url: String,
    model: String,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: CompletionMessage,
}

impl OllamaProvider {
    pub fn new(http: Client, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl ChatProvider for OllamaProvider {
    async fn chat(&self, prompt: &str) -> HelplineResult<String> {
        debug!(model = %self.model, "ollama chat request");

        let response = self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .json(&json!({
                "model": self.model,
                "messages": [{"role": "user", "content": prompt}],
                "stream": false,
            }))
            .send()
            .await?
            .error_for_status()?;

        let parsed: OllamaResponse = response.json().await?;
        Ok(parsed.message.content)
    }
}

/// AnythingLLM workspace chat. When the session carries a thread slug the
/// call is scoped to that thread so the reply lands in the session's own
/// context buffer.
pub struct AnythingLlmProvider {
    http: Client,
    base_url: String,
    api_key: String,
    workspace_slug: String,
    thread_slug: Option<String>,
}

#[derive(Deserialize)]
struct AnythingLlmResponse {
    #[serde(rename = "textResponse")]
    text_response: String,
}

impl AnythingLlmProvider {
    pub fn new(
        http: Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        workspace_slug: impl Into<String>,
        thread_slug: Option<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            workspace_slug: workspace_slug.into(),
            thread_slug,
        }
    }

    fn chat_url(&self) -> String {
        match &self.thread_slug {
            Some(thread) => format!(
                "{}/api/v1/workspace/{}/thread/{}/chat",
                self.base_url, self.workspace_slug, thread
            ),
            None => format!(
                "{}/api/v1/workspace/{}/chat",
                self.base_url, self.workspace_slug
            ),
        }
    }
}

#[async_trait]
impl ChatProvider for AnythingLlmProvider {
    async fn chat(&self, prompt: &str) -> HelplineResult<String> {
        debug!(workspace = %self.workspace_slug, "anythingllm chat request");

        let response = self
            .http
            .post(self.chat_url())
            .bearer_auth(&self.api_key)
            .json(&json!({"message": prompt, "mode": "chat"}))
            .send()
            .await?
            .error_for_status()?;

        let parsed: AnythingLlmResponse = response.json().await?;
        Ok(parsed.text_response)
    }
}

/// Production factory: maps the workspace's LLM configuration onto a
/// concrete provider, sharing one HTTP client.
pub struct LlmProviderFactory {
    http: Client,
}

impl LlmProviderFactory {
    pub fn new() -> HelplineResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(CHAT_TIMEOUT_SECS))
            .build()?;
        Ok(Self { http })
    }
}

impl ProviderFactory for LlmProviderFactory {
    fn provider(
        &self,
        workspace: &Workspace,
        thread_slug: Option<&str>,
    ) -> HelplineResult<Arc<dyn ChatProvider>> {
        let api_key = workspace.llm_api_key.clone().unwrap_or_default();

        match workspace.llm {
            LlmKind::Openai => Ok(Arc::new(OpenAiCompatProvider::new(
                self.http.clone(),
                workspace
                    .llm_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
                api_key,
                workspace.model.clone(),
            ))),
            LlmKind::Groq => Ok(Arc::new(OpenAiCompatProvider::new(
                self.http.clone(),
                workspace
                    .llm_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_GROQ_URL.to_string()),
                api_key,
                workspace.model.clone(),
            ))),
            LlmKind::Ollama => Ok(Arc::new(OllamaProvider::new(
                self.http.clone(),
                workspace
                    .llm_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
                workspace.model.clone(),
            ))),
            LlmKind::Anythingllm => {
                let base_url = workspace.llm_url.clone().ok_or_else(|| {
                    HelplineError::UnsupportedProvider(
                        "anythingllm workspace has no llm_url".to_string(),
                    )
                })?;
                Ok(Arc::new(AnythingLlmProvider::new(
                    self.http.clone(),
                    base_url,
                    api_key,
                    workspace.model.clone(),
                    thread_slug.map(str::to_string),
                )))
            }
        }
    }
}

/// Provider returning a fixed reply. Used by tests and dry runs where no
/// chat backend is reachable.
pub struct StaticProvider {
    reply: String,
}

impl StaticProvider {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

#[async_trait]
impl ChatProvider for StaticProvider {
    async fn chat(&self, _prompt: &str) -> HelplineResult<String> {
        Ok(self.reply.clone())
    }
}

/// Factory handing out the same [`StaticProvider`] reply for every
/// workspace.
pub struct StaticProviderFactory {
    reply: String,
}

impl StaticProviderFactory {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

impl ProviderFactory for StaticProviderFactory {
    fn provider(
        &self,
        _workspace: &Workspace,
        _thread_slug: Option<&str>,
    ) -> HelplineResult<Arc<dyn ChatProvider>> {
        Ok(Arc::new(StaticProvider::new(self.reply.clone())))
    }
}
