//! Host (system) stat descriptors (spec §4.1, fourth bullet list). These
//! carry no query text: the System Cycle (spec §4.7) dispatches by
//! descriptor name straight to a [`crate::probe::SystemProbe`] function.

use super::{ServiceKind, StatDescriptor, ValueColumn};
use crate::schedule::Schedule;
use std::time::Duration;

fn every_cycle(name: &'static str, values: Vec<ValueColumn>, labels: Vec<&'static str>) -> StatDescriptor {
    StatDescriptor {
        name,
        service_kind: ServiceKind::System,
        query: "",
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

fn periodic(name: &'static str, values: Vec<ValueColumn>, labels: Vec<&'static str>, interval: Duration) -> StatDescriptor {
    StatDescriptor {
        schedule: Schedule::periodic(interval),
        ..every_cycle(name, values, labels)
    }
}

#[must_use]
#[allow(clippy::too_many_lines)]
pub fn descriptors() -> Vec<StatDescriptor> {
    vec![
        every_cycle(
            "node_cpu_seconds_total",
            vec![ValueColumn::counter("seconds")],
            vec!["mode"],
        ),
        every_cycle(
            "node_diskstats",
            vec![
                ValueColumn::counter("rcompleted"),
                ValueColumn::counter("rmerged"),
                ValueColumn::counter("rsectors"),
                ValueColumn::counter("rspent"),
                ValueColumn::counter("wcompleted"),
                ValueColumn::counter("wmerged"),
                ValueColumn::counter("wsectors"),
                ValueColumn::counter("wspent"),
                ValueColumn::gauge("ioinprogress"),
                ValueColumn::counter("tspent"),
                ValueColumn::counter("tweighted"),
                ValueColumn::gauge("uptime"),
            ],
            vec!["device"],
        ),
        every_cycle(
            "node_netdev",
            vec![
                ValueColumn::counter("rbytes"),
                ValueColumn::counter("rpackets"),
                ValueColumn::counter("rerrs"),
                ValueColumn::counter("rdrop"),
                ValueColumn::counter("rfifo"),
                ValueColumn::counter("rframe"),
                ValueColumn::counter("rcompressed"),
                ValueColumn::counter("rmulticast"),
                ValueColumn::counter("tbytes"),
                ValueColumn::counter("tpackets"),
                ValueColumn::counter("terrs"),
                ValueColumn::counter("tdrop"),
                ValueColumn::counter("tfifo"),
                ValueColumn::counter("tcolls"),
                ValueColumn::counter("tcarrier"),
                ValueColumn::counter("tcompressed"),
                ValueColumn::counter("saturation"),
                ValueColumn::gauge("uptime"),
                ValueColumn::gauge("speed"),
                ValueColumn::gauge("duplex"),
            ],
            vec!["device"],
        ),
        every_cycle(
            "node_memory_bytes",
            vec![ValueColumn::gauge("bytes")],
            vec!["class"],
        ),
        every_cycle(
            "node_filesystem",
            vec![
                ValueColumn::gauge("total_bytes"),
                ValueColumn::gauge("free_bytes"),
                ValueColumn::gauge("available_bytes"),
                ValueColumn::gauge("used_bytes"),
                ValueColumn::gauge("reserved_bytes"),
                ValueColumn::gauge("reserved_pct"),
                ValueColumn::gauge("total_inodes"),
                ValueColumn::gauge("free_inodes"),
                ValueColumn::gauge("used_inodes"),
            ],
            vec!["device", "mountpoint", "fstype"],
        ),
        periodic(
            "node_sysctl",
            vec![ValueColumn::gauge("value")],
            vec!["name"],
            Duration::from_mins(5),
        ),
        every_cycle(
            "node_cpu_core_state",
            vec![ValueColumn::gauge("count")],
            vec!["state"],
        ),
        periodic(
            "node_scaling_governor",
            vec![ValueColumn::gauge("cores")],
            vec!["governor"],
            Duration::from_mins(5),
        ),
        periodic(
            "node_numa_nodes",
            vec![ValueColumn::gauge("count")],
            vec![],
            Duration::from_mins(5),
        ),
        periodic(
            "node_disk_info",
            vec![ValueColumn::gauge("rotational")],
            vec!["device", "scheduler"],
            Duration::from_mins(5),
        ),
        every_cycle(
            "node_uptime_seconds",
            vec![ValueColumn::gauge("seconds")],
            vec![],
        ),
    ]
}
