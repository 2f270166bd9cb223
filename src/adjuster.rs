//! The Query Adjuster (spec §4.9): rewrites a handful of descriptors'
//! query text (or disables one entirely) based on the target server's
//! reported major version. Idempotent — adjusting the same catalog twice
//! with the same version is a no-op the second time (invariant 6).

use crate::catalog::{Catalog, ServiceKind};

const PRE_TEN_REPLICATION: &str = "SELECT application_name, client_addr, state, \
     pg_xlog_location_diff(pg_current_xlog_location(), replay_location) AS lag_bytes \
     FROM pg_stat_replication";

const PRE_TEN_REPLICATION_SLOTS: &str = "SELECT slot_name, slot_type, active::text, \
     pg_xlog_location_diff(pg_current_xlog_location(), restart_lsn) AS retained_bytes \
     FROM pg_replication_slots";

/// `pg_wal_directory` is a builtin-probe descriptor (query is always empty);
/// the pre-10.0 variant of the directory it resolves is `pg_xlog`, not
/// `pg_wal`. We record that as a label-column value override rather than
/// query text, since the builtin probe has no SQL to rewrite.
const PRE_TEN_WAL_SUBDIR: &str = "pg_xlog";

/// Apply version-gated rewrites in place. `version` is the server's major
/// version as an integer (e.g. `100000` for 10.0, `90600` for 9.6), matching
/// the boundary the spec names explicitly: `100000` selects the `>= 10.0`
/// branch, `99999` the pre-10.0 branch.
pub fn adjust(catalog: &mut Catalog, version: u32) {
    let pre_ten = version < 100_000;

    for descriptor in &mut catalog.descriptors {
        match descriptor.name {
            "pg_stat_replication" if pre_ten => descriptor.query = PRE_TEN_REPLICATION,
            "pg_replication_slots" if pre_ten => descriptor.query = PRE_TEN_REPLICATION_SLOTS,
            "pg_wal_directory" if pre_ten => descriptor.wal_subdir = Some(PRE_TEN_WAL_SUBDIR),
            "pg_schema_sequence_fullness" => {
                descriptor.service_kind = ServiceKind::Disabled;
            }
            _ => {}
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::catalog::ServiceKind;

    #[test]
    fn pre_ten_version_rewrites_replication_queries() {
        let mut catalog = Catalog::for_kind(ServiceKind::Postgres);
        adjust(&mut catalog, 90_600);

        let replication = catalog
            .descriptors
            .iter()
            .find(|d| d.name == "pg_stat_replication")
            .expect("present");
        assert_eq!(replication.query, PRE_TEN_REPLICATION);

        let slots = catalog
            .descriptors
            .iter()
            .find(|d| d.name == "pg_replication_slots")
            .expect("present");
        assert_eq!(slots.query, PRE_TEN_REPLICATION_SLOTS);
    }

    #[test]
    fn version_exactly_100000_selects_modern_branch() {
        let mut catalog = Catalog::for_kind(ServiceKind::Postgres);
        let original = catalog
            .descriptors
            .iter()
            .find(|d| d.name == "pg_stat_replication")
            .expect("present")
            .query;

        adjust(&mut catalog, 100_000);

        let replication = catalog
            .descriptors
            .iter()
            .find(|d| d.name == "pg_stat_replication")
            .expect("present");
        assert_eq!(replication.query, original);
    }

    #[test]
    fn version_99999_selects_pre_ten_branch() {
        let mut catalog = Catalog::for_kind(ServiceKind::Postgres);
        adjust(&mut catalog, 99_999);

        let replication = catalog
            .descriptors
            .iter()
            .find(|d| d.name == "pg_stat_replication")
            .expect("present");
        assert_eq!(replication.query, PRE_TEN_REPLICATION);
    }

    #[test]
    fn sequence_fullness_is_disabled_regardless_of_version() {
        let mut catalog = Catalog::for_kind(ServiceKind::Postgres);
        adjust(&mut catalog, 160_000);

        let disabled = catalog
            .descriptors
            .iter()
            .find(|d| d.name == "pg_schema_sequence_fullness")
            .expect("present");
        assert_eq!(disabled.service_kind, ServiceKind::Disabled);
    }

    #[test]
    fn adjuster_is_idempotent() {
        let mut once = Catalog::for_kind(ServiceKind::Postgres);
        adjust(&mut once, 90_600);

        let mut twice = Catalog::for_kind(ServiceKind::Postgres);
        adjust(&mut twice, 90_600);
        adjust(&mut twice, 90_600);

        let names_and_queries = |c: &Catalog| -> Vec<(&'static str, &'static str)> {
            c.descriptors.iter().map(|d| (d.name, d.query)).collect()
        };
        assert_eq!(names_and_queries(&once), names_and_queries(&twice));
    }
}
