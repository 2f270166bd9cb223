//! The Row Projector (spec §4.4): turns one (descriptor, [`QueryResult`])
//! pair into a stream of [`Sample`]s.

use crate::catalog::{SampleKind, StatDescriptor};
use crate::query_result::QueryResult;
use tracing::warn;

/// One emitted measurement: a metric name (already `<descriptor>_<column>`),
/// its numeric kind, the parsed value, and label values in the descriptor's
/// declared label order (spec §3).
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    pub metric_name: String,
    pub kind: SampleKind,
    pub value: f64,
    pub label_values: Vec<String>,
}

/// Outcome of projecting one descriptor against one result.
pub struct Projection {
    pub samples: Vec<Sample>,
}

impl Projection {
    /// Per spec §4.4 step 3 and the resolved Open Question in §9: a
    /// descriptor counts as "collected this cycle" only if at least one
    /// sample was actually emitted, not merely because the query returned
    /// rows.
    #[must_use]
    pub fn collected(&self) -> bool {
        !self.samples.is_empty()
    }
}

/// Project a descriptor's query result into samples.
///
/// Label columns are looked up by name, not position (spec §4.4 step 2a) —
/// the query may return columns in any order. A label named by the
/// descriptor but absent from the result degrades to an empty string rather
/// than dropping the row, since a missing label is a schema mismatch, not a
/// per-cell data problem.
#[must_use]
pub fn project(descriptor: &StatDescriptor, result: &QueryResult) -> Projection {
    let mut samples = Vec::new();

    let value_column_names: Vec<&str> = result
        .columns()
        .iter()
        .map(|c| c.name.as_str())
        .filter(|name| !descriptor.label_columns.contains(name))
        .collect();

    for row in result.rows() {
        let label_values: Vec<String> = descriptor
            .label_columns
            .iter()
            .map(|label| {
                result
                    .column_index(label)
                    .and_then(|idx| row.get(idx))
                    .and_then(|cell| cell.as_ref())
                    .cloned()
                    .unwrap_or_default()
            })
            .collect();

        for &col_name in &value_column_names {
            let Some(idx) = result.column_index(col_name) else {
                continue;
            };
            let Some(cell) = row.get(idx) else {
                continue;
            };
            let Some(text) = cell.as_ref() else {
                continue; // null cell: silently skipped (spec §7)
            };
            if text.is_empty() {
                continue; // empty cell: silently skipped (spec §7)
            }

            match text.trim().parse::<f64>() {
                Ok(value) => {
                    let kind = descriptor
                        .value_columns
                        .iter()
                        .find(|vc| vc.name == col_name)
                        .map_or(SampleKind::Counter, |vc| vc.kind);

                    samples.push(Sample {
                        metric_name: descriptor.metric_name(Some(col_name)),
                        kind,
                        value,
                        label_values: label_values.clone(),
                    });
                }
                Err(_) => {
                    warn!(
                        descriptor = descriptor.name,
                        column = col_name,
                        raw = text.as_str(),
                        "unparseable numeric cell, skipping sample"
                    );
                }
            }
        }
    }

    Projection { samples }
}
