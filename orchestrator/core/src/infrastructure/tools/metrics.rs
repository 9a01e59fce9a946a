// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Prometheus metrics tool
//
// Maps well-known metric names to PromQL and summarises a range query.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::domain::tool::{
    str_arg, ParameterSpec, ParameterType, ToolArguments, ToolError, ToolHandler, ToolSchema,
};

const DEFAULT_STEP: &str = "15s";

/// Metrics read for a service health summary
const SUMMARY_METRICS: &[&str] = &[
    "cpu_usage",
    "memory_usage",
    "request_rate",
    "error_rate",
    "latency_p99",
    "restart_count",
];

#[derive(Debug, Clone)]
pub struct PrometheusClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct PromResponse {
    status: String,
    #[serde(default)]
    data: Option<PromData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PromData {
    #[serde(rename = "resultType")]
    result_type: String,
    #[serde(default)]
    result: Vec<PromSeries>,
}

#[derive(Debug, Deserialize)]
struct PromSeries {
    #[serde(default)]
    metric: Map<String, Value>,
    #[serde(default)]
    values: Vec<(f64, String)>,
}

impl PrometheusClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Range query for `service` over `duration`, summarised
    pub async fn query_metrics(
        &self,
        service: &str,
        metric: Option<&str>,
        duration: &str,
    ) -> Result<Value, ToolError> {
        let query = metric
            .and_then(|m| promql_for(m, service))
            .unwrap_or_else(|| format!("{{pod=~\"{}.*\"}}", service));

        let end = Utc::now();
        let start = end - lookback(duration);

        let (start, end) = (start.timestamp().to_string(), end.timestamp().to_string());

        let url = format!("{}/api/v1/query_range", self.base_url.trim_end_matches('/'));
        debug!(%query, "Querying Prometheus");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("query", query.as_str()),
                ("start", start.as_str()),
                ("end", end.as_str()),
                ("step", DEFAULT_STEP),
            ])
            .send()
            .await
            .map_err(|e| ToolError::failed(format!("Prometheus request failed: {}", e)))?;

        // Prometheus reports query errors as JSON bodies with 4xx statuses
        let body: PromResponse = response
            .json()
            .await
            .map_err(|e| ToolError::failed(format!("invalid Prometheus response: {}", e)))?;

        let mut result = json!({
            "service": service,
            "metric": metric.unwrap_or("all"),
            "duration": duration,
            "data": [],
            "summary": {},
        });

        match body {
            PromResponse {
                status,
                data: Some(data),
                ..
            } if status == "success" => {
                if data.result_type == "matrix" {
                    let mut series_out = Vec::new();
                    for series in &data.result {
                        if let Some(summary) = summarize(&series.values) {
                            // the last series with samples wins
                            result["summary"] = summary;
                        }
                        series_out.push(json!({
                            "labels": series.metric,
                            "values": series.values,
                        }));
                    }
                    result["data"] = Value::Array(series_out);
                }
            }
            other => {
                result["error"] = json!(other.error.unwrap_or_else(|| "Unknown error".to_string()));
            }
        }

        Ok(result)
    }

    /// Current value of each key metric over the last five minutes, with a
    /// 0-100 health score, alerts and a coarse status
    pub async fn service_metrics_summary(
        &self,
        service: &str,
        namespace: &str,
    ) -> Result<Value, ToolError> {
        let mut current = Map::new();
        for &metric in SUMMARY_METRICS {
            let result = self.query_metrics(service, Some(metric), "5m").await?;
            if let Some(value) = result["summary"].get("current") {
                current.insert(metric.to_string(), value.clone());
            }
        }

        let (health_score, alerts) = health_score(&current);
        let status = if health_score >= 80 {
            "healthy"
        } else if health_score >= 50 {
            "degraded"
        } else {
            "critical"
        };
        Ok(json!({
            "service": service,
            "namespace": namespace,
            "timestamp": Utc::now().to_rfc3339(),
            "metrics": current,
            "health_score": health_score,
            "alerts": alerts,
            "status": status,
        }))
    }
}

/// Deduct points for each metric past its alert threshold
fn health_score(metrics: &Map<String, Value>) -> (u32, Vec<&'static str>) {
    let value = |name: &str| metrics.get(name).and_then(Value::as_f64).unwrap_or(0.0);
    let checks = [
        (value("cpu_usage") > 80.0, 20, "High CPU usage"),
        (value("memory_usage") > 80.0, 20, "High memory usage"),
        (value("error_rate") > 0.01, 30, "Elevated error rate"),
        (value("restart_count") > 5.0, 15, "Multiple pod restarts"),
    ];

    let mut score: u32 = 100;
    let mut alerts = Vec::new();
    for (tripped, penalty, alert) in checks {
        if tripped {
            score = score.saturating_sub(penalty);
            alerts.push(alert);
        }
    }
    (score, alerts)
}

/// PromQL for a named metric, scoped to the service
pub fn promql_for(metric: &str, service: &str) -> Option<String> {
    let query = match metric {
        "cpu_usage" => format!(
            "rate(container_cpu_usage_seconds_total{{pod=~\"{s}.*\"}}[5m]) * 100",
            s = service
        ),
        "memory_usage" => format!(
            "container_memory_usage_bytes{{pod=~\"{s}.*\"}} / 1024 / 1024",
            s = service
        ),
        "request_rate" => format!("rate(http_requests_total{{service=\"{s}\"}}[5m])", s = service),
        "error_rate" => format!(
            "rate(http_requests_total{{service=\"{s}\",status=~\"5..\"}}[5m])",
            s = service
        ),
        "latency_p50" => format!(
            "histogram_quantile(0.5, rate(http_request_duration_seconds_bucket{{service=\"{s}\"}}[5m]))",
            s = service
        ),
        "latency_p99" => format!(
            "histogram_quantile(0.99, rate(http_request_duration_seconds_bucket{{service=\"{s}\"}}[5m]))",
            s = service
        ),
        "restart_count" => format!(
            "kube_pod_container_status_restarts_total{{pod=~\"{s}.*\"}}",
            s = service
        ),
        "disk_usage" => format!(
            "container_fs_usage_bytes{{pod=~\"{s}.*\"}} / container_fs_limit_bytes{{pod=~\"{s}.*\"}} * 100",
            s = service
        ),
        "network_rx" => format!(
            "rate(container_network_receive_bytes_total{{pod=~\"{s}.*\"}}[5m])",
            s = service
        ),
        "network_tx" => format!(
            "rate(container_network_transmit_bytes_total{{pod=~\"{s}.*\"}}[5m])",
            s = service
        ),
        _ => return None,
    };
    Some(query)
}

/// Unknown durations fall back to one hour
pub(super) fn lookback(duration: &str) -> ChronoDuration {
    match duration {
        "5m" => ChronoDuration::minutes(5),
        "15m" => ChronoDuration::minutes(15),
        "30m" => ChronoDuration::minutes(30),
        "24h" => ChronoDuration::hours(24),
        "7d" => ChronoDuration::days(7),
        _ => ChronoDuration::hours(1),
    }
}

fn summarize(values: &[(f64, String)]) -> Option<Value> {
    let samples: Vec<f64> = values
        .iter()
        .filter_map(|(_, v)| v.parse::<f64>().ok())
        .collect();
    let current = *samples.last()?;

    let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
    let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let avg = samples.iter().sum::<f64>() / samples.len() as f64;

    Some(json!({ "current": current, "min": min, "max": max, "avg": avg }))
}

pub struct MetricsSummaryTool(pub PrometheusClient);

impl MetricsSummaryTool {
    pub fn schema() -> ToolSchema {
        ToolSchema::new(
            "get_service_metrics_summary",
            "Summarise CPU, memory, traffic, errors, latency and restarts into a health score",
        )
        .param("service_name", ParameterSpec::required(ParameterType::String))
        .param(
            "namespace",
            ParameterSpec::optional(ParameterType::String).with_default(json!("default")),
        )
    }
}

#[async_trait]
impl ToolHandler for MetricsSummaryTool {
    async fn call(&self, arguments: ToolArguments) -> Result<Value, ToolError> {
        let service = str_arg(&arguments, "service_name")?;
        let namespace = str_arg(&arguments, "namespace")?;
        self.0.service_metrics_summary(service, namespace).await
    }
}

pub struct QueryMetricsTool(pub PrometheusClient);

impl QueryMetricsTool {
    pub fn schema() -> ToolSchema {
        ToolSchema::new("query_metrics", "Query Prometheus metrics for a service")
            .param("service_name", ParameterSpec::required(ParameterType::String))
            .param(
                "metric_name",
                ParameterSpec::optional(ParameterType::String).describe(
                    "cpu_usage, memory_usage, request_rate, error_rate, latency_p50, \
                     latency_p99, restart_count, disk_usage, network_rx or network_tx",
                ),
            )
            .param(
                "duration",
                ParameterSpec::optional(ParameterType::String)
                    .with_default(json!("1h"))
                    .describe("5m, 15m, 30m, 1h, 24h or 7d"),
            )
    }
}

#[async_trait]
impl ToolHandler for QueryMetricsTool {
    async fn call(&self, arguments: ToolArguments) -> Result<Value, ToolError> {
        let service = str_arg(&arguments, "service_name")?;
        let metric = arguments.get("metric_name").and_then(Value::as_str);
        let duration = arguments
            .get("duration")
            .and_then(Value::as_str)
            .unwrap_or("1h");
        self.0.query_metrics(service, metric, duration).await
    }
}
