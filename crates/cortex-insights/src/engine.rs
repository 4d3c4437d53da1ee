//! Analysis over metric samples: per-agent performance summaries,
//! statistical anomaly flags, and rule-based recommendations.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use cortex_core::error::CoreResult;
use cortex_core::models::agent::AgentKind;
use cortex_core::models::metric::{MetricSample, names};
use cortex_core::repository::MetricRepository;
use uuid::Uuid;

use crate::store::InsightStore;
use crate::types::{
    AgentPerformance, Insight, InsightKind, InsightSeverity, PerformanceSummary,
};

#[derive(Debug, Clone)]
pub struct InsightsConfig {
    /// Standard deviations from the mean before a latency sample is
    /// anomalous.
    pub anomaly_sigma: f64,
    /// Failure-rate ratio that flags an agent.
    pub failure_rate_threshold: f64,
    /// p95 latency above which caching is suggested.
    pub high_p95_ms: f64,
    /// Retries-per-task ratio above which capacity is suggested.
    pub retry_ratio_threshold: f64,
    /// Minimum samples before statistics are trusted.
    pub min_samples: usize,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            anomaly_sigma: 2.0,
            failure_rate_threshold: 0.2,
            high_p95_ms: 5_000.0,
            retry_ratio_threshold: 0.3,
            min_samples: 10,
        }
    }
}

pub struct InsightsEngine<M> {
    metrics: M,
    config: InsightsConfig,
    store: InsightStore,
}

impl<M: MetricRepository> InsightsEngine<M> {
    pub fn new(metrics: M, config: InsightsConfig) -> Self {
        Self {
            metrics,
            config,
            store: InsightStore::new(),
        }
    }

    /// Aggregate per-agent performance over a window.
    pub async fn summarize(
        &self,
        tenant_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> CoreResult<PerformanceSummary> {
        let samples = self.metrics.query(tenant_id, None, from, to).await?;
        let agents = aggregate_by_agent(&samples);
        Ok(PerformanceSummary {
            tenant_id,
            window_start: from,
            window_end: to,
            agents,
        })
    }

    /// Run the full analysis, persist the products in the retrievable
    /// store, and return them.
    pub async fn analyze(
        &self,
        tenant_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> CoreResult<Vec<Insight>> {
        let samples = self.metrics.query(tenant_id, None, from, to).await?;
        let performances = aggregate_by_agent(&samples);

        let mut insights = Vec::new();
        insights.extend(self.latency_anomalies(tenant_id, &samples));
        insights.extend(self.ratio_anomalies(tenant_id, &performances));
        insights.extend(self.recommendations(tenant_id, &performances));

        self.store.record(&insights);
        Ok(insights)
    }

    /// Previously produced insights, newest last.
    pub fn recent(&self, tenant_id: Uuid, since: DateTime<Utc>) -> Vec<Insight> {
        self.store.since(tenant_id, since)
    }

    /// Flag execution-latency samples deviating from the window mean
    /// by more than the configured number of standard deviations.
    fn latency_anomalies(&self, tenant_id: Uuid, samples: &[MetricSample]) -> Vec<Insight> {
        let mut by_agent: HashMap<AgentKind, Vec<f64>> = HashMap::new();
        for sample in samples.iter().filter(|s| s.name == names::TASK_EXEC_MS) {
            if let Some(kind) = sample.agent_kind {
                by_agent.entry(kind).or_default().push(sample.value);
            }
        }

        let mut insights = Vec::new();
        for (kind, values) in by_agent {
            if values.len() < self.config.min_samples {
                continue;
            }
            let (mean, std_dev) = mean_and_std_dev(&values);
            if std_dev == 0.0 {
                continue;
            }

            let worst = values
                .iter()
                .map(|v| (v - mean).abs() / std_dev)
                .fold(0.0, f64::max);
            if worst <= self.config.anomaly_sigma {
                continue;
            }

            let severity = if worst > self.config.anomaly_sigma * 2.0 {
                InsightSeverity::Critical
            } else if worst > self.config.anomaly_sigma * 1.5 {
                InsightSeverity::High
            } else {
                InsightSeverity::Medium
            };

            insights.push(Insight {
                id: Uuid::new_v4(),
                tenant_id,
                kind: InsightKind::Anomaly,
                severity,
                confidence: (worst / (self.config.anomaly_sigma * 2.0)).min(1.0),
                title: format!("{} execution latency anomaly", kind.as_str()),
                description: format!(
                    "Latency deviated {worst:.1} standard deviations from the \
                     window mean of {mean:.0} ms."
                ),
                recommendations: vec![
                    "Inspect recent provider latencies for this agent".into(),
                ],
                agent_kind: Some(kind),
                created_at: Utc::now(),
            });
        }
        insights
    }

    /// Flag agents whose failure rate crosses the threshold.
    fn ratio_anomalies(&self, tenant_id: Uuid, agents: &[AgentPerformance]) -> Vec<Insight> {
        let mut insights = Vec::new();
        for perf in agents {
            if perf.task_count < self.config.min_samples as u64 {
                continue;
            }
            let failure_rate = 1.0 - perf.success_rate;
            if failure_rate <= self.config.failure_rate_threshold {
                continue;
            }

            let severity = if failure_rate > 0.5 {
                InsightSeverity::Critical
            } else if failure_rate > 0.35 {
                InsightSeverity::High
            } else {
                InsightSeverity::Medium
            };

            insights.push(Insight {
                id: Uuid::new_v4(),
                tenant_id,
                kind: InsightKind::Anomaly,
                severity,
                confidence: (failure_rate / (self.config.failure_rate_threshold * 2.0)).min(1.0),
                title: format!("{} failure rate elevated", perf.kind.as_str()),
                description: format!(
                    "{:.0}% of {} tasks failed in the analysis window.",
                    failure_rate * 100.0,
                    perf.task_count
                ),
                recommendations: vec!["Review recent task error classes".into()],
                agent_kind: Some(perf.kind),
                created_at: Utc::now(),
            });
        }
        insights
    }

    /// Advisory optimisation patterns.
    fn recommendations(&self, tenant_id: Uuid, agents: &[AgentPerformance]) -> Vec<Insight> {
        let mut insights = Vec::new();
        for perf in agents {
            if perf.task_count == 0 {
                continue;
            }

            if perf.p95_latency_ms > self.config.high_p95_ms {
                insights.push(self.recommendation(
                    tenant_id,
                    perf.kind,
                    format!("High p95 latency for {}", perf.kind.as_str()),
                    format!(
                        "p95 execution latency is {:.0} ms; repeated prompts are \
                         candidates for caching.",
                        perf.p95_latency_ms
                    ),
                    vec!["Enable or lengthen result caching for this agent".into()],
                ));
            }

            let retry_ratio = perf.retry_count as f64 / perf.task_count as f64;
            if retry_ratio > self.config.retry_ratio_threshold {
                insights.push(self.recommendation(
                    tenant_id,
                    perf.kind,
                    format!("High transient failure rate for {}", perf.kind.as_str()),
                    format!(
                        "{:.1} retries per task suggest saturated provider capacity.",
                        retry_ratio
                    ),
                    vec!["Add provider capacity or spread load across entries".into()],
                ));
            }

            if perf.fallback_count as f64 >= perf.task_count as f64 * 0.5 {
                insights.push(self.recommendation(
                    tenant_id,
                    perf.kind,
                    format!("Frequent safe-default fallbacks for {}", perf.kind.as_str()),
                    format!(
                        "{} of {} tasks degraded along the fallback chain.",
                        perf.fallback_count, perf.task_count
                    ),
                    vec!["Check primary provider availability and credentials".into()],
                ));
            }
        }
        insights
    }

    fn recommendation(
        &self,
        tenant_id: Uuid,
        kind: AgentKind,
        title: String,
        description: String,
        recommendations: Vec<String>,
    ) -> Insight {
        Insight {
            id: Uuid::new_v4(),
            tenant_id,
            kind: InsightKind::Recommendation,
            severity: InsightSeverity::Low,
            confidence: 0.8,
            title,
            description,
            recommendations,
            agent_kind: Some(kind),
            created_at: Utc::now(),
        }
    }
}

fn aggregate_by_agent(samples: &[MetricSample]) -> Vec<AgentPerformance> {
    #[derive(Default)]
    struct Acc {
        latencies: Vec<f64>,
        success: u64,
        failure: u64,
        retries: u64,
        fallbacks: u64,
    }

    let mut by_agent: HashMap<AgentKind, Acc> = HashMap::new();
    for sample in samples {
        let Some(kind) = sample.agent_kind else {
            continue;
        };
        let acc = by_agent.entry(kind).or_default();
        match sample.name.as_str() {
            names::TASK_EXEC_MS => acc.latencies.push(sample.value),
            names::TASK_OUTCOME => match sample.labels.get("state").map(String::as_str) {
                Some("succeeded") => acc.success += 1,
                Some(_) => acc.failure += 1,
                None => {}
            },
            names::TASK_RETRY => acc.retries += 1,
            names::PROVIDER_FALLBACK => acc.fallbacks += 1,
            _ => {}
        }
    }

    let mut agents: Vec<AgentPerformance> = by_agent
        .into_iter()
        .map(|(kind, mut acc)| {
            acc.latencies.sort_by(|a, b| a.total_cmp(b));
            let task_count = acc.success + acc.failure;
            AgentPerformance {
                kind,
                task_count,
                success_count: acc.success,
                failure_count: acc.failure,
                success_rate: if task_count == 0 {
                    1.0
                } else {
                    acc.success as f64 / task_count as f64
                },
                p50_latency_ms: percentile(&acc.latencies, 0.50),
                p95_latency_ms: percentile(&acc.latencies, 0.95),
                retry_count: acc.retries,
                fallback_count: acc.fallbacks,
            }
        })
        .collect();
    agents.sort_by_key(|a| a.kind);
    agents
}

/// Nearest-rank percentile over a sorted slice. Empty input is 0.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((sorted.len() as f64 * q).ceil() as usize).clamp(1, sorted.len());
    sorted[rank - 1]
}

fn mean_and_std_dev(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}
