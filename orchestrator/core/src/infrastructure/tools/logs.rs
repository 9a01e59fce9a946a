// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Loki log tools
//
// `query_logs` pulls recent lines for a service through the Loki
// `query_range` API and groups error lines into patterns; `analyze_logs`
// runs it for error and warn levels and turns the counts into
// recommendations.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use tracing::debug;

use crate::domain::tool::{
    int_arg, str_arg, ParameterSpec, ParameterType, ToolArguments, ToolError, ToolHandler,
    ToolSchema,
};

use super::metrics::lookback;

/// Characters of a message used as its pattern key
const PATTERN_KEY_CHARS: usize = 50;
const PATTERN_EXAMPLE_CHARS: usize = 200;
const TOP_PATTERNS: usize = 5;
const ANALYSIS_LIMIT: i64 = 500;
/// Error lines above which `analyze_logs` raises a high severity recommendation
const HIGH_ERROR_COUNT: usize = 100;

#[derive(Debug, Clone)]
pub struct LokiClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct LokiResponse {
    status: String,
    #[serde(default)]
    data: Option<LokiData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LokiData {
    #[serde(default)]
    result: Vec<LokiStream>,
}

#[derive(Debug, Deserialize)]
struct LokiStream {
    #[serde(default)]
    stream: Map<String, Value>,
    #[serde(default)]
    values: Vec<(String, String)>,
}

/// One log line with the labels agents care about
#[derive(Debug, Clone, PartialEq)]
struct LogLine {
    timestamp: String,
    level: String,
    pod: String,
    message: String,
}

impl LokiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Recent log lines for `service`, optionally for one level only
    pub async fn query_logs(
        &self,
        service: &str,
        namespace: &str,
        level: Option<&str>,
        limit: i64,
        duration: &str,
    ) -> Result<Value, ToolError> {
        let query = logql_for(service, namespace, level);

        let end = Utc::now();
        let start = end - lookback(duration);
        let nanos = |t: chrono::DateTime<Utc>| {
            t.timestamp_nanos_opt()
                .unwrap_or_else(|| t.timestamp().saturating_mul(1_000_000_000))
                .to_string()
        };
        let (start, end, limit) = (nanos(start), nanos(end), limit.max(1).to_string());

        let url = format!("{}/loki/api/v1/query_range", self.base_url.trim_end_matches('/'));
        debug!(%query, "Querying Loki");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("query", query.as_str()),
                ("limit", limit.as_str()),
                ("start", start.as_str()),
                ("end", end.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ToolError::failed(format!("Loki request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ToolError::failed(format!("Loki request failed: {}", e)))?;

        let mut result = json!({
            "service": service,
            "namespace": namespace,
            "level_filter": level,
            "duration": duration,
            "logs": [],
            "count": 0,
            "error_patterns": [],
        });

        // Loki answers query errors with plain text bodies
        let parsed: Option<LokiResponse> = serde_json::from_str(&body).ok();
        match parsed {
            Some(LokiResponse {
                status,
                data: Some(data),
                ..
            }) if status == "success" => {
                let lines = flatten_streams(data.result);
                result["count"] = json!(lines.len());
                result["error_patterns"] = error_patterns(&lines);
                result["logs"] = lines
                    .into_iter()
                    .map(|line| {
                        json!({
                            "timestamp": line.timestamp,
                            "level": line.level,
                            "pod": line.pod,
                            "message": line.message,
                        })
                    })
                    .collect();
            }
            Some(LokiResponse { error: Some(error), .. }) => result["error"] = json!(error),
            _ => {
                let text = body.trim();
                result["error"] = json!(if text.is_empty() {
                    format!("Loki returned {}", status)
                } else {
                    text.to_string()
                });
            }
        }

        Ok(result)
    }

    /// Error and warn counts, top error patterns and recommendations
    pub async fn analyze_logs(
        &self,
        service: &str,
        namespace: &str,
        duration: &str,
    ) -> Result<Value, ToolError> {
        let errors = self
            .query_logs(service, namespace, Some("error"), ANALYSIS_LIMIT, duration)
            .await?;
        let warnings = self
            .query_logs(service, namespace, Some("warn"), ANALYSIS_LIMIT, duration)
            .await?;

        Ok(analysis(service, namespace, duration, &errors, &warnings))
    }
}

/// Stream selector for a service, narrowed to one level when given
fn logql_for(service: &str, namespace: &str, level: Option<&str>) -> String {
    match level {
        Some(level) => format!(
            "{{app=\"{}\",namespace=\"{}\",level=\"{}\"}}",
            service, namespace, level
        ),
        None => format!("{{app=\"{}\",namespace=\"{}\"}}", service, namespace),
    }
}

fn flatten_streams(streams: Vec<LokiStream>) -> Vec<LogLine> {
    let mut lines = Vec::new();
    for stream in streams {
        let label = |name: &str| {
            stream
                .stream
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string()
        };
        let (level, pod) = (label("level"), label("pod"));

        for (timestamp, message) in stream.values {
            let timestamp = timestamp
                .parse::<i64>()
                .ok()
                .map(|nanos| Utc.timestamp_nanos(nanos).to_rfc3339())
                .unwrap_or(timestamp);
            lines.push(LogLine {
                timestamp,
                level: level.clone(),
                pod: pod.clone(),
                message,
            });
        }
    }
    lines
}

/// Error lines grouped by their first characters, most frequent first
fn error_patterns(lines: &[LogLine]) -> Value {
    let mut order: Vec<String> = Vec::new();
    let mut patterns: HashMap<String, (usize, String)> = HashMap::new();

    for line in lines.iter().filter(|l| l.level.eq_ignore_ascii_case("error")) {
        let key: String = line.message.chars().take(PATTERN_KEY_CHARS).collect();
        let entry = patterns.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            (0, line.message.chars().take(PATTERN_EXAMPLE_CHARS).collect())
        });
        entry.0 += 1;
    }

    let mut ranked: Vec<(String, usize, String)> = order
        .into_iter()
        .filter_map(|key| {
            patterns
                .remove(&key)
                .map(|(count, example)| (key, count, example))
        })
        .collect();
    // stable: equal counts keep first-seen order
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    ranked
        .into_iter()
        .take(TOP_PATTERNS)
        .map(|(pattern, count, example)| {
            json!({ "pattern": pattern, "count": count, "example": example })
        })
        .collect()
}

fn analysis(
    service: &str,
    namespace: &str,
    duration: &str,
    errors: &Value,
    warnings: &Value,
) -> Value {
    let error_count = errors["count"].as_u64().unwrap_or(0) as usize;
    let warn_count = warnings["count"].as_u64().unwrap_or(0) as usize;
    let patterns = match &errors["error_patterns"] {
        Value::Array(patterns) => Value::Array(patterns.clone()),
        _ => json!([]),
    };

    let mut recommendations = Vec::new();
    if error_count > HIGH_ERROR_COUNT {
        recommendations.push(json!({
            "severity": "high",
            "message": format!("High error count ({}) - investigate immediately", error_count),
        }));
    }
    if let Some(top) = patterns.get(0) {
        recommendations.push(json!({
            "severity": "medium",
            "message": format!(
                "Most frequent error ({} occurrences): {}",
                top["count"],
                top["pattern"].as_str().unwrap_or_default()
            ),
        }));
    }

    let mut result = json!({
        "service": service,
        "namespace": namespace,
        "duration": duration,
        "summary": {
            "total_logs": error_count + warn_count,
            "error_count": error_count,
            "warn_count": warn_count,
        },
        "error_patterns": patterns,
        "recommendations": recommendations,
    });

    let failures: Vec<&Value> = [errors, warnings]
        .into_iter()
        .filter_map(|r| r.get("error"))
        .collect();
    if !failures.is_empty() {
        result["errors"] = json!(failures);
    }

    result
}

fn log_params(schema: ToolSchema) -> ToolSchema {
    schema
        .param("service_name", ParameterSpec::required(ParameterType::String))
        .param(
            "namespace",
            ParameterSpec::optional(ParameterType::String).with_default(json!("default")),
        )
        .param(
            "duration",
            ParameterSpec::optional(ParameterType::String)
                .with_default(json!("1h"))
                .describe("5m, 15m, 30m, 1h, 24h or 7d"),
        )
}

pub struct QueryLogsTool(pub LokiClient);

impl QueryLogsTool {
    pub fn schema() -> ToolSchema {
        log_params(ToolSchema::new(
            "query_logs",
            "Query Loki logs for a service and group error lines into patterns",
        ))
        .param(
            "level",
            ParameterSpec::optional(ParameterType::String).describe("error, warn or info"),
        )
        .param(
            "limit",
            ParameterSpec::optional(ParameterType::Integer).with_default(json!(100)),
        )
    }
}

#[async_trait]
impl ToolHandler for QueryLogsTool {
    async fn call(&self, arguments: ToolArguments) -> Result<Value, ToolError> {
        let service = str_arg(&arguments, "service_name")?;
        let namespace = str_arg(&arguments, "namespace")?;
        let duration = str_arg(&arguments, "duration")?;
        let level = arguments.get("level").and_then(Value::as_str);
        let limit = int_arg(&arguments, "limit").unwrap_or(100);
        self.0
            .query_logs(service, namespace, level, limit, duration)
            .await
    }
}

pub struct AnalyzeLogsTool(pub LokiClient);

impl AnalyzeLogsTool {
    pub fn schema() -> ToolSchema {
        log_params(ToolSchema::new(
            "analyze_logs",
            "Count error and warn lines for a service and recommend what to look at",
        ))
    }
}

#[async_trait]
impl ToolHandler for AnalyzeLogsTool {
    async fn call(&self, arguments: ToolArguments) -> Result<Value, ToolError> {
        let service = str_arg(&arguments, "service_name")?;
        let namespace = str_arg(&arguments, "namespace")?;
        let duration = str_arg(&arguments, "duration")?;
        self.0.analyze_logs(service, namespace, duration).await
    }
}
