// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Reasoning service protocol shared by all LLM-backed agents
//!
//! One turn is: system + user prompt with the agent's tool schemas, then, if
//! the model asked for tools, run them in request order, append their results
//! and ask exactly once more. The final text is parsed into structured data.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::application::tool_invocation_service::ToolRegistry;
use crate::domain::agent::{AgentError, AgentStateCell, IncidentAgent};
use crate::domain::incident::{AgentContext, AgentResult, AgentState, DataMap};
use crate::domain::llm::{ChatMessage, ChatRequest, ChatResponse, LLMError, LLMProvider};
use crate::infrastructure::prompt_template_engine::{
    PromptContext, PromptTemplateEngine, DEFAULT_SYSTEM_TEMPLATE, DEFAULT_USER_TEMPLATE,
};

pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_REASONING_TIMEOUT: Duration = Duration::from_secs(120);

/// Outcome of one reasoning turn
#[derive(Debug, Clone, PartialEq)]
pub struct Reasoning {
    /// Final model text
    pub text: String,
    /// `text` parsed by [`parse_structured`]
    pub data: DataMap,
    /// `{"tool", "result"}` records of the tools run in between
    pub tool_results: Vec<Value>,
}

pub struct ReasoningEngine {
    provider: Arc<dyn LLMProvider>,
    templates: PromptTemplateEngine,
    system_template: String,
    user_template: String,
    temperature: f32,
    timeout: Duration,
}

impl ReasoningEngine {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            templates: PromptTemplateEngine::new(),
            system_template: DEFAULT_SYSTEM_TEMPLATE.to_string(),
            user_template: DEFAULT_USER_TEMPLATE.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            timeout: DEFAULT_REASONING_TIMEOUT,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_templates(mut self, system: impl Into<String>, user: impl Into<String>) -> Self {
        self.system_template = system.into();
        self.user_template = user.into();
        self
    }

    /// Run one reasoning turn. `state` moves to `Executing` while tools run.
    pub async fn reason(
        &self,
        mut prompt: PromptContext,
        tools: &ToolRegistry,
        state: &AgentStateCell,
    ) -> Result<Reasoning, AgentError> {
        for schema in tools.schemas() {
            prompt = prompt.tool(schema.name.clone(), schema.description.clone());
        }

        let system = self
            .templates
            .render(&self.system_template, &prompt)
            .map_err(|e| AgentError::Prompt(format!("{:#}", e)))?;
        let user = self
            .templates
            .render(&self.user_template, &prompt)
            .map_err(|e| AgentError::Prompt(format!("{:#}", e)))?;

        let mut request = ChatRequest {
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            tools: tools.describe(),
            temperature: self.temperature,
        };

        let response = self.chat(&request).await?;
        let mut tool_results = Vec::new();

        let response = if response.tool_calls.is_empty() {
            response
        } else {
            state.set(AgentState::Executing);
            info!(
                agent = %prompt.agent_name,
                calls = response.tool_calls.len(),
                "Executing requested tool calls"
            );

            request
                .messages
                .push(ChatMessage::assistant(response.content.clone()));

            for call in &response.tool_calls {
                let result = match tools.invoke(&call.name, call.arguments.clone()).await {
                    Ok(value) => value,
                    Err(e) => {
                        warn!(tool = %call.name, error = %e, "Tool call failed");
                        json!({ "error": e.to_string() })
                    }
                };
                let record = json!({ "tool": call.name, "result": result });
                request.messages.push(ChatMessage::tool(record.to_string()));
                tool_results.push(record);
            }

            // the follow-up turn gets no tools so the loop cannot continue
            request.tools.clear();
            let follow_up = self.chat(&request).await?;
            if !follow_up.tool_calls.is_empty() {
                debug!(
                    agent = %prompt.agent_name,
                    "Ignoring tool calls requested in the follow-up turn"
                );
            }
            follow_up
        };

        Ok(Reasoning {
            data: parse_structured(&response.content),
            text: response.content,
            tool_results,
        })
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        match tokio::time::timeout(self.timeout, self.provider.chat(request)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(AgentError::Reasoning(LLMError::Timeout(self.timeout))),
        }
    }
}

/// Structured data from model text: a fenced `json` block, else the first
/// fenced block, else the whole text; anything that is not a JSON object
/// becomes `{"response": text}`.
pub fn parse_structured(text: &str) -> DataMap {
    let candidate = if let Some((_, rest)) = text.split_once("```json") {
        rest.split("```").next()
    } else if let Some((_, rest)) = text.split_once("```") {
        rest.split("```").next()
    } else {
        Some(text)
    };

    match candidate.and_then(|c| serde_json::from_str::<Value>(c.trim()).ok()) {
        Some(Value::Object(map)) => map,
        _ => {
            let mut map = DataMap::new();
            map.insert("response".to_string(), json!(text));
            map
        }
    }
}

/// Agent that runs the bare reasoning protocol with a fixed tool set
pub struct LlmAgent {
    name: String,
    description: String,
    tools: ToolRegistry,
    engine: Arc<ReasoningEngine>,
    state: AgentStateCell,
}

impl LlmAgent {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        tools: ToolRegistry,
        engine: Arc<ReasoningEngine>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            tools,
            engine,
            state: AgentStateCell::new(),
        }
    }
}

#[async_trait]
impl IncidentAgent for LlmAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn execute(&self, context: &AgentContext) -> AgentResult {
        self.state.set(AgentState::Thinking);

        let prompt = PromptContext::for_agent(&self.name, &self.description).incident(context);
        match self.engine.reason(prompt, &self.tools, &self.state).await {
            Ok(reasoning) => {
                self.state.set(AgentState::Completed);
                let message = if reasoning.text.is_empty() {
                    "Task completed".to_string()
                } else {
                    reasoning.text
                };
                AgentResult::success(message, reasoning.data)
            }
            Err(e) => {
                self.state.set(AgentState::Error);
                warn!(agent = %self.name, error = %e, "Reasoning failed");
                AgentResult::failure(format!("Error executing {}: {}", self.name, e))
            }
        }
    }

    fn state(&self) -> AgentState {
        self.state.get()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::llm::{ChatRole, ToolCall};
    use crate::domain::tool::{
        FnTool, ParameterSpec, ParameterType, ToolArguments, ToolError, ToolSchema,
    };
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Replays canned responses and records every request
    #[derive(Default)]
    pub(crate) struct ScriptedProvider {
        responses: Mutex<VecDeque<Result<ChatResponse, LLMError>>>,
        pub requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedProvider {
        pub(crate) fn new(responses: Vec<Result<ChatResponse, LLMError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LLMError> {
            self.requests.lock().push(request.clone());
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(LLMError::Provider("script exhausted".into())))
        }

        async fn health_check(&self) -> Result<(), LLMError> {
            Ok(())
        }
    }

    fn echo_tools() -> ToolRegistry {
        let mut tools = ToolRegistry::new();
        tools.register(
            ToolSchema::new("echo", "Echo the input")
                .param("text", ParameterSpec::required(ParameterType::String)),
            Arc::new(FnTool(|args: ToolArguments| -> Result<Value, ToolError> {
                Ok(json!({ "echo": args["text"] }))
            })),
        );
        tools
    }

    fn context() -> AgentContext {
        AgentContext::new("INC-1", "api", "default", vec!["slow".into()])
    }

    #[test]
    fn test_parse_structured_prefers_json_fence() {
        let text = "Here:\n```json\n{\"severity\": \"high\"}\n```\nand ```{\"x\": 1}```";
        assert_eq!(parse_structured(text)["severity"], "high");
    }

    #[test]
    fn test_parse_structured_any_fence_then_whole_text() {
        assert_eq!(parse_structured("```\n{\"a\": 1}\n```")["a"], 1);
        assert_eq!(parse_structured("  {\"b\": true} ")["b"], true);
    }

    #[test]
    fn test_parse_structured_falls_back_to_response() {
        let data = parse_structured("restart the pods");
        assert_eq!(data["response"], "restart the pods");

        let data = parse_structured("[1, 2]");
        assert_eq!(data["response"], "[1, 2]");
    }

    #[tokio::test]
    async fn test_tool_round_trip_requeries_once() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(ChatResponse {
                content: String::new(),
                tool_calls: vec![
                    ToolCall {
                        name: "echo".into(),
                        arguments: json!({"text": "one"}),
                    },
                    ToolCall {
                        name: "missing".into(),
                        arguments: json!({}),
                    },
                ],
            }),
            Ok(ChatResponse {
                content: "{\"done\": true}".into(),
                tool_calls: vec![ToolCall {
                    name: "echo".into(),
                    arguments: json!({"text": "ignored"}),
                }],
            }),
        ]));
        let engine = ReasoningEngine::new(provider.clone());
        let state = AgentStateCell::new();

        let reasoning = engine
            .reason(
                PromptContext::for_agent("tester", "tests").incident(&context()),
                &echo_tools(),
                &state,
            )
            .await
            .unwrap();

        assert_eq!(reasoning.data["done"], true);
        assert_eq!(reasoning.tool_results.len(), 2);
        assert_eq!(reasoning.tool_results[0]["result"]["echo"], "one");
        assert!(reasoning.tool_results[1]["result"]["error"].is_string());
        assert_eq!(state.get(), AgentState::Executing);

        let requests = provider.requests.lock();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].tools.len(), 1);
        assert!(requests[1].tools.is_empty());
        let roles: Vec<ChatRole> = requests[1].messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                ChatRole::System,
                ChatRole::User,
                ChatRole::Assistant,
                ChatRole::Tool,
                ChatRole::Tool
            ]
        );
        assert!(requests[0].messages[0].content.contains("- echo: Echo the input"));
        assert!(requests[0].messages[1].content.contains("Incident ID: INC-1"));
        assert_eq!(requests[0].temperature, DEFAULT_TEMPERATURE);
    }

    #[tokio::test]
    async fn test_llm_agent_reports_reasoning_failure() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(LLMError::Network(
            "refused".into(),
        ))]));
        let agent = LlmAgent::new(
            "helper",
            "Generic helper",
            ToolRegistry::new(),
            Arc::new(ReasoningEngine::new(provider)),
        );

        let result = agent.execute(&context()).await;
        assert!(!result.success);
        assert!(result.message.contains("refused"));
        assert_eq!(agent.state(), AgentState::Error);
    }

    #[tokio::test]
    async fn test_llm_agent_success_without_tools() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(ChatResponse::text(
            "Scale the api deployment",
        ))]));
        let agent = LlmAgent::new(
            "helper",
            "Generic helper",
            ToolRegistry::new(),
            Arc::new(ReasoningEngine::new(provider)),
        );

        let result = agent.execute(&context()).await;
        assert!(result.success);
        assert_eq!(result.data["response"], "Scale the api deployment");
        assert_eq!(agent.state(), AgentState::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reasoning_timeout() {
        struct Stalled;

        #[async_trait]
        impl LLMProvider for Stalled {
            async fn chat(&self, _request: &ChatRequest) -> Result<ChatResponse, LLMError> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(ChatResponse::default())
            }

            async fn health_check(&self) -> Result<(), LLMError> {
                Ok(())
            }
        }

        let engine = ReasoningEngine::new(Arc::new(Stalled)).with_timeout(Duration::from_secs(1));
        let err = engine
            .reason(
                PromptContext::for_agent("slow", "").incident(&context()),
                &ToolRegistry::new(),
                &AgentStateCell::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Reasoning(LLMError::Timeout(_))));
    }
}
