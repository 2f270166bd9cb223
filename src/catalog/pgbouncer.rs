//! Pooler (`PgBouncer`) stat descriptors (spec §4.1, third bullet list).
//! Both sources are cluster-shared/oneshot; the Database Cycle skips version
//! detection and query adjustment entirely for pooler services (spec §4.6).

use super::{ServiceKind, StatDescriptor, ValueColumn};
use crate::schedule::Schedule;

fn oneshot(name: &'static str, query: &'static str, values: Vec<ValueColumn>, labels: Vec<&'static str>) -> StatDescriptor {
    StatDescriptor {
        name,
        service_kind: ServiceKind::Pgbouncer,
        query,
        builtin: None,
        value_columns: values,
        label_columns: labels,
        oneshot: true,
        active: false,
        schedule: Schedule::every_cycle(),
        collect_done: false,
        wal_subdir: None,
    }
}

#[must_use]
pub fn descriptors() -> Vec<StatDescriptor> {
    vec![
        oneshot(
            "pgbouncer_pools",
            "SHOW POOLS",
            vec![
                ValueColumn::gauge("cl_active"),
                ValueColumn::gauge("cl_waiting"),
                ValueColumn::gauge("sv_active"),
                ValueColumn::gauge("sv_idle"),
                ValueColumn::gauge("sv_used"),
                ValueColumn::gauge("maxwait"),
            ],
            vec!["database", "user"],
        ),
        oneshot(
            "pgbouncer_stats_totals",
            "SHOW STATS_TOTALS",
            vec![
                ValueColumn::counter("total_xact_count"),
                ValueColumn::counter("total_query_count"),
                ValueColumn::counter("total_received"),
                ValueColumn::counter("total_sent"),
                ValueColumn::counter("total_xact_time"),
                ValueColumn::counter("total_query_time"),
            ],
            vec!["database"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pooler_descriptors_are_all_oneshot_and_cluster_shared() {
        for d in descriptors() {
            assert!(d.oneshot);
            assert_eq!(d.service_kind, ServiceKind::Pgbouncer);
        }
    }
}
