//! Postgres cluster-shared (oneshot) and per-database stat descriptors
//! (spec §4.1).

use super::{BuiltinProbe, ServiceKind, StatDescriptor, ValueColumn};
use crate::schedule::Schedule;
use std::time::Duration;

fn oneshot(name: &'static str, query: &'static str, values: Vec<ValueColumn>, labels: Vec<&'static str>) -> StatDescriptor {
    StatDescriptor {
        name,
        service_kind: ServiceKind::Postgres,
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

fn oneshot_periodic(
    name: &'static str,
    query: &'static str,
    values: Vec<ValueColumn>,
    labels: Vec<&'static str>,
    interval: Duration,
) -> StatDescriptor {
    StatDescriptor {
        schedule: Schedule::periodic(interval),
        ..oneshot(name, query, values, labels)
    }
}

fn per_database(name: &'static str, query: &'static str, values: Vec<ValueColumn>, labels: Vec<&'static str>) -> StatDescriptor {
    StatDescriptor {
        oneshot: false,
        ..oneshot(name, query, values, labels)
    }
}

/// Cluster-shared sources that fire at most once per collection cycle
/// (spec §4.1, first bullet list).
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn oneshot_descriptors() -> Vec<StatDescriptor> {
    vec![
        oneshot(
            "pg_stat_activity",
            "SELECT state, COALESCE(wait_event_type, 'none') AS wait_event_type, count(*) AS count \
             FROM pg_stat_activity GROUP BY state, wait_event_type",
            vec![ValueColumn::gauge("count")],
            vec!["state", "wait_event_type"],
        ),
        oneshot(
            "pg_stat_bgwriter",
            "SELECT checkpoints_timed, checkpoints_req, buffers_checkpoint, buffers_clean, \
             maxwritten_clean, buffers_backend, buffers_backend_fsync, buffers_alloc \
             FROM pg_stat_bgwriter",
            vec![
                ValueColumn::counter("checkpoints_timed"),
                ValueColumn::counter("checkpoints_req"),
                ValueColumn::counter("buffers_checkpoint"),
                ValueColumn::counter("buffers_clean"),
                ValueColumn::counter("maxwritten_clean"),
                ValueColumn::counter("buffers_backend"),
                ValueColumn::counter("buffers_backend_fsync"),
                ValueColumn::counter("buffers_alloc"),
            ],
            vec![],
        ),
        oneshot(
            "pg_stat_replication",
            "SELECT application_name, client_addr, state, \
             pg_wal_lsn_diff(pg_current_wal_lsn(), replay_lsn) AS lag_bytes \
             FROM pg_stat_replication",
            vec![ValueColumn::gauge("lag_bytes")],
            vec!["application_name", "client_addr", "state"],
        ),
        oneshot(
            "pg_replication_slots",
            "SELECT slot_name, slot_type, active::text, \
             pg_wal_lsn_diff(pg_current_wal_lsn(), restart_lsn) AS retained_bytes \
             FROM pg_replication_slots",
            vec![ValueColumn::gauge("retained_bytes")],
            vec!["slot_name", "slot_type", "active"],
        ),
        oneshot(
            "pg_recovery",
            "SELECT pg_is_in_recovery()::int AS in_recovery",
            vec![ValueColumn::gauge("in_recovery")],
            vec![],
        ),
        oneshot(
            "pg_stat_database_conflicts",
            "SELECT datname, confl_tablespace, confl_lock, confl_snapshot, confl_bufferpin, \
             confl_deadlock FROM pg_stat_database_conflicts",
            vec![
                ValueColumn::counter("confl_tablespace"),
                ValueColumn::counter("confl_lock"),
                ValueColumn::counter("confl_snapshot"),
                ValueColumn::counter("confl_bufferpin"),
                ValueColumn::counter("confl_deadlock"),
            ],
            vec!["datname"],
        ),
        oneshot(
            "pg_stat_progress_basebackup",
            "SELECT phase, backup_total, backup_streamed, tablespaces_total, tablespaces_streamed \
             FROM pg_stat_progress_basebackup",
            vec![
                ValueColumn::gauge("backup_total"),
                ValueColumn::gauge("backup_streamed"),
                ValueColumn::gauge("tablespaces_total"),
                ValueColumn::gauge("tablespaces_streamed"),
            ],
            vec!["phase"],
        ),
        oneshot(
            "pg_current_tmp_files",
            "SELECT count(*) AS files, COALESCE(sum(size), 0) AS bytes FROM pg_ls_tmpdir()",
            vec![ValueColumn::gauge("files"), ValueColumn::gauge("bytes")],
            vec![],
        ),
        oneshot_periodic(
            "pg_stat_statements",
            "SELECT queryid::text, calls, total_exec_time, rows \
             FROM pg_stat_statements ORDER BY total_exec_time DESC LIMIT 100",
            vec![
                ValueColumn::counter("calls"),
                ValueColumn::counter("total_exec_time"),
                ValueColumn::counter("rows"),
            ],
            vec!["queryid"],
            Duration::from_mins(1),
        ),
        oneshot(
            "pg_stat_autovacuum_workers",
            "SELECT count(*) AS workers FROM pg_stat_activity WHERE query LIKE 'autovacuum:%'",
            vec![ValueColumn::gauge("workers")],
            vec![],
        ),
        oneshot(
            "pg_stat_database",
            "SELECT datname, numbackends, xact_commit, xact_rollback, blks_read, blks_hit, \
             tup_returned, tup_fetched, tup_inserted, tup_updated, tup_deleted, temp_files, \
             temp_bytes, deadlocks FROM pg_stat_database WHERE datname IS NOT NULL",
            vec![
                ValueColumn::gauge("numbackends"),
                ValueColumn::counter("xact_commit"),
                ValueColumn::counter("xact_rollback"),
                ValueColumn::counter("blks_read"),
                ValueColumn::counter("blks_hit"),
                ValueColumn::counter("tup_returned"),
                ValueColumn::counter("tup_fetched"),
                ValueColumn::counter("tup_inserted"),
                ValueColumn::counter("tup_updated"),
                ValueColumn::counter("tup_deleted"),
                ValueColumn::counter("temp_files"),
                ValueColumn::counter("temp_bytes"),
                ValueColumn::counter("deadlocks"),
            ],
            vec!["datname"],
        ),
        StatDescriptor {
            builtin: Some(BuiltinProbe::PgDataDirectory),
            ..oneshot("pg_data_directory", "", vec![ValueColumn::gauge("value")], vec![
                "device",
                "mountpoint",
                "path",
            ])
        },
        StatDescriptor {
            builtin: Some(BuiltinProbe::PgWalDirectory),
            ..oneshot("pg_wal_directory", "", vec![ValueColumn::gauge("value")], vec![
                "device",
                "mountpoint",
                "path",
            ])
        },
        StatDescriptor {
            builtin: Some(BuiltinProbe::PgLogDirectory),
            ..oneshot("pg_log_directory", "", vec![ValueColumn::gauge("value")], vec![
                "device",
                "mountpoint",
                "path",
            ])
        },
        oneshot(
            "pg_settings_snapshot",
            "SELECT name, setting FROM pg_settings WHERE vartype IN ('integer', 'bool', 'real')",
            vec![ValueColumn::gauge("setting")],
            vec!["name"],
        ),
        oneshot(
            "pg_catalog_size",
            "SELECT count(*) AS relations FROM pg_class",
            vec![ValueColumn::gauge("relations")],
            vec![],
        ),
        oneshot(
            "pg_wal_directory_size",
            "SELECT count(*) AS segments, COALESCE(sum(size), 0) AS bytes FROM pg_ls_waldir()",
            vec![ValueColumn::gauge("segments"), ValueColumn::gauge("bytes")],
            vec![],
        ),
        oneshot(
            "pg_log_directory_size",
            "SELECT count(*) AS files, COALESCE(sum(size), 0) AS bytes FROM pg_ls_logdir()",
            vec![ValueColumn::gauge("files"), ValueColumn::gauge("bytes")],
            vec![],
        ),
    ]
}

/// Per-database sources, run once for every non-excluded database the
/// server reports (spec §4.1, second bullet list).
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn per_database_descriptors() -> Vec<StatDescriptor> {
    vec![
        per_database(
            "pg_stat_user_tables",
            "SELECT relname, seq_scan, seq_tup_read, idx_scan, idx_tup_fetch, n_tup_ins, \
             n_tup_upd, n_tup_del, n_live_tup, n_dead_tup FROM pg_stat_user_tables",
            vec![
                ValueColumn::counter("seq_scan"),
                ValueColumn::counter("seq_tup_read"),
                ValueColumn::counter("idx_scan"),
                ValueColumn::counter("idx_tup_fetch"),
                ValueColumn::counter("n_tup_ins"),
                ValueColumn::counter("n_tup_upd"),
                ValueColumn::counter("n_tup_del"),
                ValueColumn::gauge("n_live_tup"),
                ValueColumn::gauge("n_dead_tup"),
            ],
            vec!["relname"],
        ),
        per_database(
            "pg_statio_user_tables",
            "SELECT relname, heap_blks_read, heap_blks_hit, idx_blks_read, idx_blks_hit \
             FROM pg_statio_user_tables",
            vec![
                ValueColumn::counter("heap_blks_read"),
                ValueColumn::counter("heap_blks_hit"),
                ValueColumn::counter("idx_blks_read"),
                ValueColumn::counter("idx_blks_hit"),
            ],
            vec!["relname"],
        ),
        per_database(
            "pg_stat_user_indexes",
            "SELECT relname, indexrelname, idx_scan, idx_tup_read, idx_tup_fetch \
             FROM pg_stat_user_indexes",
            vec![
                ValueColumn::counter("idx_scan"),
                ValueColumn::counter("idx_tup_read"),
                ValueColumn::counter("idx_tup_fetch"),
            ],
            vec!["relname", "indexrelname"],
        ),
        per_database(
            "pg_statio_user_indexes",
            "SELECT relname, indexrelname, idx_blks_read, idx_blks_hit FROM pg_statio_user_indexes",
            vec![
                ValueColumn::counter("idx_blks_read"),
                ValueColumn::counter("idx_blks_hit"),
            ],
            vec!["relname", "indexrelname"],
        ),
        per_database(
            "pg_schema_tables_without_pk",
            "SELECT c.relname FROM pg_class c JOIN pg_namespace n ON n.oid = c.relnamespace \
             WHERE c.relkind = 'r' AND n.nspname NOT IN ('pg_catalog', 'information_schema') \
             AND NOT EXISTS (SELECT 1 FROM pg_constraint co WHERE co.conrelid = c.oid AND co.contype = 'p')",
            vec![ValueColumn::gauge("present")],
            vec!["relname"],
        ),
        per_database(
            "pg_schema_invalid_indexes",
            "SELECT c.relname AS indexrelname FROM pg_index i \
             JOIN pg_class c ON c.oid = i.indexrelid WHERE NOT i.indisvalid",
            vec![ValueColumn::gauge("present")],
            vec!["indexrelname"],
        ),
        per_database(
            "pg_schema_unindexed_foreign_keys",
            "SELECT conname, conrelid::regclass::text AS relname FROM pg_constraint \
             WHERE contype = 'f' AND NOT EXISTS ( \
               SELECT 1 FROM pg_index i WHERE i.indrelid = conrelid \
               AND (conkey::int[] <@ i.indkey::int2[]::int[]))",
            vec![ValueColumn::gauge("present")],
            vec!["conname", "relname"],
        ),
        per_database(
            "pg_schema_redundant_indexes",
            "SELECT indexrelid::regclass::text AS indexrelname FROM pg_index a \
             WHERE EXISTS (SELECT 1 FROM pg_index b WHERE b.indexrelid <> a.indexrelid \
               AND b.indrelid = a.indrelid AND b.indkey = a.indkey)",
            vec![ValueColumn::gauge("present")],
            vec!["indexrelname"],
        ),
        per_database(
            "pg_schema_sequence_fullness",
            "SELECT sequencename, COALESCE(last_value, 0)::float8 / NULLIF(max_value, 0)::float8 \
             AS ratio FROM pg_sequences",
            vec![ValueColumn::gauge("ratio")],
            vec!["sequencename"],
        ),
        per_database(
            "pg_schema_fk_type_mismatch",
            "SELECT conname, conrelid::regclass::text AS relname FROM pg_constraint c \
             JOIN pg_attribute a ON a.attrelid = c.conrelid AND a.attnum = ANY(c.conkey) \
             JOIN pg_attribute fa ON fa.attrelid = c.confrelid AND fa.attnum = ANY(c.confkey) \
             WHERE c.contype = 'f' AND a.atttypid <> fa.atttypid",
            vec![ValueColumn::gauge("present")],
            vec!["conname", "relname"],
        ),
        per_database(
            "pg_database_size",
            "SELECT pg_database_size(current_database()) AS bytes",
            vec![ValueColumn::gauge("bytes")],
            vec![],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_descriptors_have_no_query_text() {
        for d in oneshot_descriptors() {
            if d.builtin.is_some() {
                assert_eq!(d.query, "");
            }
        }
    }

    #[test]
    fn sequence_fullness_descriptor_is_present_for_the_adjuster_to_disable() {
        assert!(
            per_database_descriptors()
                .iter()
                .any(|d| d.name == "pg_schema_sequence_fullness")
        );
    }
}
