//! Backend for OpenAI-compatible chat-completions endpoints.
//!
//! Works against OpenAI, vLLM, TGI and any other server implementing the
//! `/chat/completions` API shape. Uses iterative dispatch: providers that
//! offer asynchronous bulk submission should implement their own
//! [`ModelBackend`] with [`DispatchMode::Batch`].

use crate::backend::{DispatchMode, GenerationOutput, ModelBackend, StagedInput};
use crate::config::GenerationConfig;
use crate::error::BackendError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Backend speaking the OpenAI chat-completions protocol.
pub struct ChatCompletionsBackend {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl ChatCompletionsBackend {
    /// Create a backend for the given endpoint and model.
    ///
    /// `api_base` is the URL prefix up to but not including
    /// `/chat/completions`, e.g. `https://api.openai.com/v1`.
    pub fn new(api_base: &str, api_key: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    fn request_body(&self, input: &StagedInput, config: &GenerationConfig) -> ChatRequest {
        // Greedy decoding when sampling is off; the stop sequence is only
        // set outside thinking mode because traces contain newlines.
        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: input.prompt.clone(),
            }],
            max_tokens: config.generation_max_length,
            temperature: if config.do_sample {
                config.temperature
            } else {
                0.0
            },
            top_p: config.top_p,
            stop: if config.stop_newline && !config.thinking {
                Some(vec!["\n".to_string()])
            } else {
                None
            },
            seed: Some(config.seed),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: usize,
    temperature: f32,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: Option<usize>,
    #[serde(default)]
    completion_tokens: Option<usize>,
}

#[async_trait]
impl ModelBackend for ChatCompletionsBackend {
    fn name(&self) -> &str {
        &self.model
    }

    fn dispatch_mode(&self) -> DispatchMode {
        DispatchMode::Iterative
    }

    fn count_tokens(&self, text: &str) -> usize {
        // No local tokenizer for API models; the usual ~4 chars/token
        // heuristic is good enough for length auditing.
        text.chars().count().div_ceil(4)
    }

    async fn generate(
        &self,
        input: &StagedInput,
        config: &GenerationConfig,
    ) -> Result<Option<GenerationOutput>, BackendError> {
        if input.prompt.is_empty() {
            return Err(BackendError::InvalidRequest(
                "prompt cannot be empty".to_string(),
            ));
        }

        let url = format!("{}/chat/completions", self.api_base);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(input, config))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Transport(format!("HTTP {status}: {body}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| BackendError::MalformedResponse(e.to_string()))?;

        let Some(choice) = parsed.choices.into_iter().next() else {
            return Err(BackendError::MalformedResponse(
                "response contained no choices".to_string(),
            ));
        };

        let content = choice.message.content.unwrap_or_default();
        if content.trim().is_empty() {
            // Budget exhausted before any answer text, typically a runaway
            // reasoning trace. Content failure, not a transport error.
            log::warn!(
                "model returned empty content (finish_reason: {:?})",
                choice.finish_reason
            );
            return Ok(None);
        }

        let usage = parsed.usage.unwrap_or(ChatUsage {
            prompt_tokens: None,
            completion_tokens: None,
        });
        Ok(Some(GenerationOutput {
            input_len: usage.prompt_tokens.unwrap_or(input.input_len),
            output_len: usage
                .completion_tokens
                .unwrap_or_else(|| self.count_tokens(&content)),
            output: content,
            thoughts: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_parsing() {
        let json = r#"{
            "choices": [{"message": {"content": "Paris"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 1}
        }"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("Paris"));
        assert_eq!(parsed.usage.as_ref().unwrap().prompt_tokens, Some(12));
    }

    #[test]
    fn test_response_parsing_missing_usage() {
        let json = r#"{"choices": [{"message": {"content": "hi"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.usage.is_none());
        assert!(parsed.choices[0].finish_reason.is_none());
    }

    #[test]
    fn test_stop_sequence_only_outside_thinking() {
        let backend = ChatCompletionsBackend::new("http://localhost:8000/v1", "key", "m");
        let input = StagedInput {
            prompt: "q".to_string(),
            input_len: 1,
        };

        let plain = GenerationConfig::default().with_stop_newline(true);
        assert!(backend.request_body(&input, &plain).stop.is_some());

        let thinking = GenerationConfig::default()
            .with_stop_newline(true)
            .with_thinking_reserve();
        assert!(backend.request_body(&input, &thinking).stop.is_none());
    }

    #[test]
    fn test_greedy_when_sampling_off() {
        let backend = ChatCompletionsBackend::new("http://localhost:8000/v1", "key", "m");
        let input = StagedInput {
            prompt: "q".to_string(),
            input_len: 1,
        };

        let greedy = GenerationConfig::default().with_sampling(false, 0.7, 0.9);
        assert_eq!(backend.request_body(&input, &greedy).temperature, 0.0);

        let sampled = GenerationConfig::default().with_sampling(true, 0.7, 0.9);
        assert_eq!(backend.request_body(&input, &sampled).temperature, 0.7);
    }

    #[test]
    fn test_token_heuristic() {
        let backend = ChatCompletionsBackend::new("http://localhost", "key", "m");
        assert_eq!(backend.count_tokens(""), 0);
        assert_eq!(backend.count_tokens("abcd"), 1);
        assert_eq!(backend.count_tokens("abcde"), 2);
    }
}
