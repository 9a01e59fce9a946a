// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// OpenAI LLM Provider Adapter
//
// Anti-Corruption Layer for the OpenAI chat completions API.
// Also works with OpenAI-compatible APIs (LM Studio, vLLM, etc.)

use crate::domain::llm::{ChatRequest, ChatResponse, ChatRole, LLMError, LLMProvider, ToolCall};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub struct OpenAIAdapter {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "<[Value]>::is_empty")]
    tools: &'a [Value],
    temperature: f32,
}

#[derive(Serialize)]
struct OpenAIMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<OpenAIToolCall>,
}

#[derive(Deserialize)]
struct OpenAIToolCall {
    function: OpenAIFunction,
}

#[derive(Deserialize)]
struct OpenAIFunction {
    name: String,
    /// JSON-encoded object
    arguments: String,
}

impl OpenAIAdapter {
    pub fn new(endpoint: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            model,
        }
    }

    fn translate_messages(request: &ChatRequest) -> Vec<OpenAIMessage> {
        request
            .messages
            .iter()
            .map(|m| match m.role {
                ChatRole::System => OpenAIMessage {
                    role: "system",
                    content: m.content.clone(),
                },
                ChatRole::User => OpenAIMessage {
                    role: "user",
                    content: m.content.clone(),
                },
                ChatRole::Assistant => OpenAIMessage {
                    role: "assistant",
                    content: m.content.clone(),
                },
                // "tool" messages require a tool_call_id the domain does not track
                ChatRole::Tool => OpenAIMessage {
                    role: "user",
                    content: format!("Tool result: {}", m.content),
                },
            })
            .collect()
    }
}

#[async_trait]
impl LLMProvider for OpenAIAdapter {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LLMError> {
        let body = OpenAIRequest {
            model: &self.model,
            messages: Self::translate_messages(request),
            tools: &request.tools,
            temperature: request.temperature,
        };

        let url = format!("{}/chat/completions", self.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            return Err(if status == 401 || status == 403 {
                LLMError::Authentication(error_text)
            } else if status == 429 {
                LLMError::RateLimit
            } else if status == 404 {
                LLMError::ModelNotFound(self.model.clone())
            } else {
                LLMError::Provider(format!("HTTP {}: {}", status, error_text))
            });
        }

        let openai_response: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| LLMError::Provider(format!("Failed to parse response: {}", e)))?;

        let choice = openai_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::Provider("No response from model".into()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(|call| ToolCall {
                // malformed arguments are passed through and rejected by the invoker
                arguments: serde_json::from_str(&call.function.arguments)
                    .unwrap_or(Value::String(call.function.arguments)),
                name: call.function.name,
            })
            .collect();

        Ok(ChatResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
        })
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        let url = format!("{}/models", self.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else if response.status() == 401 || response.status() == 403 {
            Err(LLMError::Authentication("Invalid API key".into()))
        } else {
            Err(LLMError::Network(format!("HTTP {}", response.status())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::ChatMessage;
    use mockito::Matcher;
    use serde_json::json;

    #[tokio::test]
    async fn test_tool_call_arguments_are_decoded() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-4o",
                "messages": [{"role": "user", "content": "Tool result: {\"ok\":true}"}]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "choices": [{
                        "message": {
                            "role": "assistant",
                            "content": null,
                            "tool_calls": [{
                                "id": "call_1",
                                "type": "function",
                                "function": {
                                    "name": "query_metrics",
                                    "arguments": "{\"service_name\":\"api\",\"metric_name\":\"cpu_usage\"}"
                                }
                            }]
                        },
                        "finish_reason": "tool_calls"
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let adapter = OpenAIAdapter::new(server.url(), "sk-test".into(), "gpt-4o".into());
        let request = ChatRequest {
            messages: vec![ChatMessage::tool(r#"{"ok":true}"#)],
            tools: vec![],
            temperature: 0.2,
        };
        let response = adapter.chat(&request).await.unwrap();

        assert_eq!(response.content, "");
        assert_eq!(response.tool_calls[0].name, "query_metrics");
        assert_eq!(response.tool_calls[0].arguments["metric_name"], "cpu_usage");
    }

    #[tokio::test]
    async fn test_rate_limit() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .create_async()
            .await;

        let adapter = OpenAIAdapter::new(server.url(), "sk-test".into(), "gpt-4o".into());
        let request = ChatRequest {
            messages: vec![ChatMessage::user("hi")],
            tools: vec![],
            temperature: 0.2,
        };
        assert!(matches!(adapter.chat(&request).await, Err(LLMError::RateLimit)));
    }
}
