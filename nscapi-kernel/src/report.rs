//! Vue report : snapshot du cache + champs custom résolus.

use crate::cache::StatusCache;
use crate::custom::CustomFieldStore;
use crate::models::{status_label, FieldSet};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckView {
    pub host: String,
    pub name: String,
    pub status: &'static str,
    pub message: String,
    pub timestamp: String,
    #[serde(rename = "statusFirstSeen")]
    pub status_first_seen: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportEntry {
    pub check: CheckView,
    pub custom: FieldSet,
}

/// Les retours à la ligne cassent les consommateurs ligne à ligne du report
pub fn sanitize_message(output: &str) -> String {
    output.replace('\n', " ")
}

pub fn build_report(cache: &StatusCache, fields: &CustomFieldStore) -> Vec<ReportEntry> {
    cache
        .snapshot()
        .into_iter()
        .map(|row| {
            let custom = fields.resolve(&row.host, &row.service);
            ReportEntry {
                check: CheckView {
                    status: status_label(row.result.state),
                    message: sanitize_message(&row.result.output),
                    timestamp: row.result.timestamp.to_string(),
                    status_first_seen: row.result.status_first_seen.to_string(),
                    host: row.host,
                    name: row.service,
                },
                custom,
            }
        })
        .collect()
}
