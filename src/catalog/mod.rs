//! The Descriptor Catalog (spec §4.1): a static, ordered list of Stat
//! Descriptors, fresh-cloned per [`crate::exporter::Exporter`] so that the
//! two mutable fields (`schedule`'s last-fired, `collect_done`) never alias
//! across exporters (spec §9, "Per-descriptor mutable state inside a shared
//! catalog").

mod pgbouncer;
mod postgres;
mod system;

use crate::schedule::Schedule;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    Postgres,
    Pgbouncer,
    System,
    Patroni,
    Disabled,
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Postgres => "postgres",
            Self::Pgbouncer => "pgbouncer",
            Self::System => "system",
            Self::Patroni => "patroni",
            Self::Disabled => "disabled",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SampleKind {
    #[default]
    Counter,
    Gauge,
}

/// A value-producing column: which column name in the query result holds it,
/// and whether it should be exposed as a counter or a gauge.
#[derive(Clone, Debug)]
pub struct ValueColumn {
    pub name: &'static str,
    pub kind: SampleKind,
}

impl ValueColumn {
    #[must_use]
    pub const fn counter(name: &'static str) -> Self {
        Self {
            name,
            kind: SampleKind::Counter,
        }
    }

    #[must_use]
    pub const fn gauge(name: &'static str) -> Self {
        Self {
            name,
            kind: SampleKind::Gauge,
        }
    }
}

/// One named probe the Database Cycle dispatches to when a descriptor's
/// query text is empty (spec §4.6 step "If descriptor's query is empty").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuiltinProbe {
    PgDataDirectory,
    PgWalDirectory,
    PgLogDirectory,
}

/// A Stat Descriptor (spec §3). Immutable after catalog construction except
/// for `schedule` and `collect_done`, which are private to the owning
/// Exporter.
#[derive(Clone, Debug)]
pub struct StatDescriptor {
    pub name: &'static str,
    pub service_kind: ServiceKind,
    pub query: &'static str,
    pub builtin: Option<BuiltinProbe>,
    pub value_columns: Vec<ValueColumn>,
    pub label_columns: Vec<&'static str>,
    pub oneshot: bool,
    pub active: bool,
    pub schedule: Schedule,
    pub collect_done: bool,
    /// Set by the Query Adjuster (spec §4.9) for `pg_wal_directory` on
    /// pre-10.0 servers, where the WAL subdirectory is named `pg_xlog`
    /// rather than `pg_wal`. `None` means use the builtin probe's default.
    pub wal_subdir: Option<&'static str>,
}

impl StatDescriptor {
    /// A pre-built metric name for a given value column (or the bare
    /// descriptor name when it has no value columns), per spec §3's Metric
    /// Descriptor naming rule `<descriptor-name>_<value-column>`.
    #[must_use]
    pub fn metric_name(&self, value_column: Option<&str>) -> String {
        match value_column {
            Some(col) => format!("{}_{col}", self.name),
            None => self.name.to_string(),
        }
    }

    /// Every metric name this descriptor can possibly emit.
    #[must_use]
    pub fn metric_names(&self) -> Vec<String> {
        if self.value_columns.is_empty() {
            vec![self.metric_name(None)]
        } else {
            self.value_columns
                .iter()
                .map(|vc| self.metric_name(Some(vc.name)))
                .collect()
        }
    }
}

/// The pre-registered name/label-schema for one (descriptor, value-column)
/// pair (spec GLOSSARY). Fixed labels `{project_id, service_id, hostname}`
/// are attached by the Emitter, not stored here.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricDescriptor {
    pub name: String,
    pub kind: SampleKind,
    pub variable_labels: Vec<&'static str>,
}

/// A fresh, owned snapshot of the catalog for one service kind.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    pub descriptors: Vec<StatDescriptor>,
}

impl Catalog {
    /// Build a fresh catalog for the given service kind (spec §4.1: "the
    /// catalog enumerates Postgres cluster-shared sources... Postgres
    /// per-database sources... Pooler sources... System sources").
    #[must_use]
    pub fn for_kind(kind: ServiceKind) -> Self {
        let descriptors = match kind {
            ServiceKind::Postgres => {
                let mut d = postgres::oneshot_descriptors();
                d.extend(postgres::per_database_descriptors());
                d
            }
            ServiceKind::Pgbouncer => pgbouncer::descriptors(),
            ServiceKind::System => system::descriptors(),
            ServiceKind::Patroni | ServiceKind::Disabled => Vec::new(),
        };
        Self { descriptors }
    }

    /// Every Metric Descriptor this catalog can ever emit (invariant 1, spec
    /// §8): the Exporter's `describe()` is exactly this, computed once.
    #[must_use]
    pub fn metric_descriptors(&self) -> Vec<MetricDescriptor> {
        self.descriptors
            .iter()
            .flat_map(|d| {
                if d.value_columns.is_empty() {
                    vec![MetricDescriptor {
                        name: d.metric_name(None),
                        kind: SampleKind::Gauge,
                        variable_labels: d.label_columns.clone(),
                    }]
                } else {
                    d.value_columns
                        .iter()
                        .map(|vc| MetricDescriptor {
                            name: d.metric_name(Some(vc.name)),
                            kind: vc.kind,
                            variable_labels: d.label_columns.clone(),
                        })
                        .collect()
                }
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn postgres_catalog_mixes_oneshot_and_per_database_descriptors() {
        let catalog = Catalog::for_kind(ServiceKind::Postgres);
        assert!(catalog.descriptors.iter().any(|d| d.oneshot));
        assert!(catalog.descriptors.iter().any(|d| !d.oneshot));
    }

    #[test]
    fn pooler_catalog_is_entirely_oneshot() {
        let catalog = Catalog::for_kind(ServiceKind::Pgbouncer);
        assert!(!catalog.descriptors.is_empty());
        assert!(catalog.descriptors.iter().all(|d| d.oneshot));
    }

    #[test]
    fn system_catalog_is_entirely_oneshot() {
        let catalog = Catalog::for_kind(ServiceKind::System);
        assert!(!catalog.descriptors.is_empty());
        assert!(catalog.descriptors.iter().all(|d| d.oneshot));
    }

    #[test]
    fn two_snapshots_do_not_alias() {
        let mut a = Catalog::for_kind(ServiceKind::Postgres);
        let b = Catalog::for_kind(ServiceKind::Postgres);

        a.descriptors.first_mut().expect("non-empty").collect_done = true;
        assert!(!b.descriptors.first().expect("non-empty").collect_done);
    }

    #[test]
    fn metric_descriptors_cover_every_value_column() {
        let catalog = Catalog::for_kind(ServiceKind::Postgres);
        let bgwriter = catalog
            .descriptors
            .iter()
            .find(|d| d.name == "pg_stat_bgwriter")
            .expect("bgwriter descriptor present");

        let names = catalog.metric_descriptors();
        for vc in &bgwriter.value_columns {
            let expected = bgwriter.metric_name(Some(vc.name));
            assert!(names.iter().any(|m| m.name == expected));
        }
    }
}
