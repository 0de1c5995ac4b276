// =============================================================================
// summary.rs - HOW DID THE RUN GO?
// =============================================================================
//
// A snapshot computed from the finished records, serialized to JSON and
// logged once at the end of the batch. Nothing here feeds back into the
// pipeline; it is for the human reading the logs at 9am.
// =============================================================================

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{CompanyRecord, RecordStatus};

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub companies: usize,
    pub ok: usize,
    pub partial: usize,
    pub failed: usize,
    /// Records carrying each metric, keyed by column prefix.
    pub metric_hits: BTreeMap<&'static str, usize>,
    /// Matches whose number could not be parsed and kept only the raw token.
    pub ambiguous_values: usize,
    /// Records per error reason (`FETCH:NETWORK_ERROR`, ...).
    pub failure_reasons: BTreeMap<String, usize>,
}

impl RunSummary {
    pub fn from_records(run_id: Uuid, started_at: DateTime<Utc>, records: &[CompanyRecord]) -> Self {
        let mut summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            companies: records.len(),
            ok: 0,
            partial: 0,
            failed: 0,
            metric_hits: BTreeMap::new(),
            ambiguous_values: 0,
            failure_reasons: BTreeMap::new(),
        };

        for record in records {
            match record.status {
                RecordStatus::Ok => summary.ok += 1,
                RecordStatus::Partial => summary.partial += 1,
                RecordStatus::Failed => summary.failed += 1,
            }
            for (metric, found) in record.metrics.iter() {
                let hits = summary.metric_hits.entry(metric.key()).or_insert(0);
                if let Some(m) = found {
                    *hits += 1;
                    if m.numeric_value.is_none() {
                        summary.ambiguous_values += 1;
                    }
                }
            }
            if let Some(reason) = &record.error {
                *summary.failure_reasons.entry(reason.clone()).or_insert(0) += 1;
            }
        }

        summary
    }

    pub fn log(&self) {
        match serde_json::to_string(self) {
            Ok(json) => info!(
                run_id = %self.run_id,
                ok = self.ok,
                partial = self.partial,
                failed = self.failed,
                summary = %json,
                "run summary"
            ),
            Err(e) => warn!(run_id = %self.run_id, error = %e, "could not serialize run summary"),
        }
    }
}
