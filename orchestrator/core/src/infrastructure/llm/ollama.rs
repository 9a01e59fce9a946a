// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Ollama LLM Provider Adapter
//
// Anti-Corruption Layer for Ollama's /api/chat endpoint.
// Supports air-gapped deployments with local models and native tool calling.

use crate::domain::llm::{ChatMessage, ChatRequest, ChatResponse, LLMError, LLMProvider, ToolCall};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub struct OllamaAdapter {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "<[Value]>::is_empty")]
    tools: &'a [Value],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
}

#[derive(Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<OllamaToolCall>,
}

#[derive(Deserialize)]
struct OllamaToolCall {
    function: OllamaFunction,
}

#[derive(Deserialize)]
struct OllamaFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

impl OllamaAdapter {
    pub fn new(endpoint: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            model,
        }
    }
}

#[async_trait]
impl LLMProvider for OllamaAdapter {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LLMError> {
        let body = OllamaChatRequest {
            model: &self.model,
            messages: &request.messages,
            tools: &request.tools,
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
            },
        };

        let url = format!("{}/api/chat", self.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            return Err(if status == 404 {
                LLMError::ModelNotFound(self.model.clone())
            } else {
                LLMError::Provider(format!("HTTP {}: {}", status, error_text))
            });
        }

        let ollama_response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| LLMError::Provider(format!("Failed to parse response: {}", e)))?;

        let message = ollama_response.message;
        Ok(ChatResponse {
            content: message.content,
            tool_calls: message
                .tool_calls
                .into_iter()
                .map(|call| ToolCall {
                    name: call.function.name,
                    arguments: call.function.arguments,
                })
                .collect(),
        })
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        // Server is up when it can list its models
        let url = format!("{}/api/tags", self.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(LLMError::Network(format!("HTTP {}", response.status())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn request() -> ChatRequest {
        ChatRequest {
            messages: vec![
                ChatMessage::system("You are triage"),
                ChatMessage::user("Symptoms: crash"),
            ],
            tools: vec![json!({"type": "function", "function": {"name": "get_service_status"}})],
            temperature: 0.2,
        }
    }

    #[tokio::test]
    async fn test_chat_wire_format_and_tool_calls() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/chat")
            .match_body(Matcher::PartialJson(json!({
                "model": "llama3.2",
                "stream": false,
                "options": {"temperature": 0.2},
                "messages": [
                    {"role": "system", "content": "You are triage"},
                    {"role": "user", "content": "Symptoms: crash"}
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "model": "llama3.2",
                    "message": {
                        "role": "assistant",
                        "content": "",
                        "tool_calls": [{
                            "function": {
                                "name": "get_service_status",
                                "arguments": {"service_name": "api", "namespace": "default"}
                            }
                        }]
                    },
                    "done": true
                })
                .to_string(),
            )
            .create_async()
            .await;

        let adapter = OllamaAdapter::new(server.url(), "llama3.2".to_string());
        let response = adapter.chat(&request()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "get_service_status");
        assert_eq!(response.tool_calls[0].arguments["service_name"], "api");
    }

    #[tokio::test]
    async fn test_missing_model_maps_to_model_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/chat")
            .with_status(404)
            .with_body("model not found")
            .create_async()
            .await;

        let adapter = OllamaAdapter::new(server.url(), "ghost".to_string());
        let err = adapter.chat(&request()).await.unwrap_err();
        assert!(matches!(err, LLMError::ModelNotFound(ref m) if m == "ghost"));
    }

    #[tokio::test]
    async fn test_health_check() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/tags")
            .with_status(200)
            .with_body(r#"{"models":[]}"#)
            .create_async()
            .await;

        let adapter = OllamaAdapter::new(server.url(), "llama3.2".to_string());
        assert!(adapter.health_check().await.is_ok());
    }
}
