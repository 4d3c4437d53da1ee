//! SurrealDB implementation of [`MetricRepository`]. Append-only.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use cortex_core::error::CoreResult;
use cortex_core::models::agent::AgentKind;
use cortex_core::models::metric::MetricSample;
use cortex_core::repository::MetricRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct MetricRow {
    tenant_id: String,
    agent_kind: Option<String>,
    name: String,
    value: f64,
    labels: serde_json::Value,
    timestamp: DateTime<Utc>,
}

impl MetricRow {
    fn try_into_sample(self) -> Result<MetricSample, DbError> {
        let tenant_id = Uuid::parse_str(&self.tenant_id)
            .map_err(|e| DbError::Decode(format!("invalid tenant UUID: {e}")))?;
        let agent_kind = self
            .agent_kind
            .as_deref()
            .map(|k| {
                AgentKind::parse(k).ok_or_else(|| DbError::Decode(format!("unknown kind: {k}")))
            })
            .transpose()?;
        let labels: BTreeMap<String, String> = serde_json::from_value(self.labels)
            .map_err(|e| DbError::Decode(format!("metric labels: {e}")))?;
        Ok(MetricSample {
            tenant_id,
            agent_kind,
            name: self.name,
            value: self.value,
            labels,
            timestamp: self.timestamp,
        })
    }
}

/// SurrealDB implementation of the metric sample repository.
#[derive(Clone)]
pub struct SurrealMetricRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealMetricRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> MetricRepository for SurrealMetricRepository<C> {
    async fn append(&self, sample: MetricSample) -> CoreResult<()> {
        let labels =
            serde_json::to_value(&sample.labels).map_err(|e| DbError::Decode(e.to_string()))?;

        self.db
            .query(
                "CREATE metric_sample SET \
                 tenant_id = $tenant_id, \
                 agent_kind = $agent_kind, \
                 name = $name, \
                 value = $value, \
                 labels = $labels, \
                 timestamp = $timestamp",
            )
            .bind(("tenant_id", sample.tenant_id.to_string()))
            .bind((
                "agent_kind",
                sample.agent_kind.map(|k| k.as_str().to_string()),
            ))
            .bind(("name", sample.name))
            .bind(("value", sample.value))
            .bind(("labels", labels))
            .bind(("timestamp", sample.timestamp))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn query(
        &self,
        tenant_id: Uuid,
        name: Option<&str>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> CoreResult<Vec<MetricSample>> {
        let name_clause = if name.is_some() {
            " AND name = $name"
        } else {
            ""
        };

        let mut builder = self
            .db
            .query(format!(
                "SELECT * FROM metric_sample \
                 WHERE tenant_id = $tenant_id{name_clause} \
                 AND timestamp >= $from AND timestamp < $to \
                 ORDER BY timestamp ASC"
            ))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("from", from))
            .bind(("to", to));
        if let Some(name) = name {
            builder = builder.bind(("name", name.to_string()));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        let rows: Vec<MetricRow> = result.take(0).map_err(DbError::from)?;
        let samples = rows
            .into_iter()
            .map(|row| row.try_into_sample())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(samples)
    }
}
