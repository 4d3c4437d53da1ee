//! Bounded in-memory insight retention.
//!
//! The persisted collection set is fixed, so insight records live in
//! memory per tenant; history beyond the retention bound can be
//! rebuilt from metric samples.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::types::Insight;

const RETAINED_PER_TENANT: usize = 256;

#[derive(Default)]
pub struct InsightStore {
    by_tenant: Mutex<HashMap<Uuid, VecDeque<Insight>>>,
}

impl InsightStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, insights: &[Insight]) {
        let mut map = self.by_tenant.lock().expect("insight store poisoned");
        for insight in insights {
            let entries = map.entry(insight.tenant_id).or_default();
            if entries.len() == RETAINED_PER_TENANT {
                entries.pop_front();
            }
            entries.push_back(insight.clone());
        }
    }

    /// Insights for a tenant created at or after `since`, newest last.
    pub fn since(&self, tenant_id: Uuid, since: DateTime<Utc>) -> Vec<Insight> {
        let map = self.by_tenant.lock().expect("insight store poisoned");
        map.get(&tenant_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|i| i.created_at >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InsightKind, InsightSeverity};

    fn insight(tenant_id: Uuid) -> Insight {
        Insight {
            id: Uuid::new_v4(),
            tenant_id,
            kind: InsightKind::Anomaly,
            severity: InsightSeverity::Low,
            confidence: 0.5,
            title: "t".into(),
            description: "d".into(),
            recommendations: vec![],
            agent_kind: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn retention_is_bounded() {
        let store = InsightStore::new();
        let tenant = Uuid::new_v4();
        for _ in 0..(RETAINED_PER_TENANT + 10) {
            store.record(&[insight(tenant)]);
        }
        let all = store.since(tenant, Utc::now() - chrono::Duration::hours(1));
        assert_eq!(all.len(), RETAINED_PER_TENANT);
    }

    #[test]
    fn tenants_are_isolated() {
        let store = InsightStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store.record(&[insight(a)]);
        assert_eq!(store.since(b, Utc::now() - chrono::Duration::hours(1)).len(), 0);
    }
}
