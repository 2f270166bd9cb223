//! System Cycle (spec §4.7): iterate system descriptors in catalog order
//! and, for each due, call the corresponding System Probe function and
//! project its return into samples directly (no SQL, no Row Projector —
//! these descriptors carry empty query text).

use crate::catalog::{Catalog, SampleKind, StatDescriptor};
use crate::probe::{SystemProbe, TRACKED_SYSCTLS};
use crate::projector::Sample;
use std::time::Instant;
use tracing::warn;

fn kind_for(descriptor: &StatDescriptor, column: &str) -> SampleKind {
    descriptor
        .value_columns
        .iter()
        .find(|vc| vc.name == column)
        .map_or(SampleKind::Gauge, |vc| vc.kind)
}

fn sample(descriptor: &StatDescriptor, column: &str, value: f64, labels: Vec<String>) -> Sample {
    Sample {
        metric_name: descriptor.metric_name(Some(column)),
        kind: kind_for(descriptor, column),
        value,
        label_values: labels,
    }
}

#[must_use]
pub fn run(catalog: &mut Catalog, probe: &dyn SystemProbe) -> Vec<Sample> {
    let now = Instant::now();
    let mut samples = Vec::new();

    for descriptor in &mut catalog.descriptors {
        if !descriptor.schedule.active_now(now) {
            continue;
        }

        let collected = collect_one(descriptor, probe, &mut samples);
        if collected {
            descriptor.schedule.mark_fired(now);
        }
    }

    samples
}

#[allow(clippy::too_many_lines)]
fn collect_one(descriptor: &StatDescriptor, probe: &dyn SystemProbe, samples: &mut Vec<Sample>) -> bool {
    match descriptor.name {
        "node_cpu_seconds_total" => match probe.read_cpu_stat() {
            Ok(stat) => {
                for (mode, ticks) in stat.modes() {
                    #[allow(clippy::cast_precision_loss)]
                    samples.push(sample(descriptor, "seconds", ticks as f64, vec![mode.to_string()]));
                }
                true
            }
            Err(err) => {
                warn!(error = %err, "node_cpu_seconds_total probe failed");
                false
            }
        },
        "node_diskstats" => match probe.read_diskstats() {
            Ok(disks) => {
                for disk in disks {
                    let labels = vec![disk.device.clone()];
                    #[allow(clippy::cast_precision_loss)]
                    for (col, value) in [
                        ("rcompleted", disk.rcompleted as f64),
                        ("rmerged", disk.rmerged as f64),
                        ("rsectors", disk.rsectors as f64),
                        ("rspent", disk.rspent as f64),
                        ("wcompleted", disk.wcompleted as f64),
                        ("wmerged", disk.wmerged as f64),
                        ("wsectors", disk.wsectors as f64),
                        ("wspent", disk.wspent as f64),
                        ("ioinprogress", disk.ioinprogress as f64),
                        ("tspent", disk.tspent as f64),
                        ("tweighted", disk.tweighted as f64),
                        ("uptime", disk.uptime as f64),
                    ] {
                        samples.push(sample(descriptor, col, value, labels.clone()));
                    }
                }
                true
            }
            Err(err) => {
                warn!(error = %err, "node_diskstats probe failed");
                false
            }
        },
        "node_netdev" => match probe.read_netdev() {
            Ok(ifaces) => {
                for iface in ifaces {
                    let labels = vec![iface.device.clone()];
                    let saturation = iface.saturation();
                    #[allow(clippy::cast_precision_loss)]
                    for (col, value) in [
                        ("rbytes", iface.rbytes as f64),
                        ("rpackets", iface.rpackets as f64),
                        ("rerrs", iface.rerrs as f64),
                        ("rdrop", iface.rdrop as f64),
                        ("rfifo", iface.rfifo as f64),
                        ("rframe", iface.rframe as f64),
                        ("rcompressed", iface.rcompressed as f64),
                        ("rmulticast", iface.rmulticast as f64),
                        ("tbytes", iface.tbytes as f64),
                        ("tpackets", iface.tpackets as f64),
                        ("terrs", iface.terrs as f64),
                        ("tdrop", iface.tdrop as f64),
                        ("tfifo", iface.tfifo as f64),
                        ("tcolls", iface.tcolls as f64),
                        ("tcarrier", iface.tcarrier as f64),
                        ("tcompressed", iface.tcompressed as f64),
                        ("saturation", saturation as f64),
                        ("uptime", iface.uptime as f64),
                        ("speed", iface.speed as f64),
                        ("duplex", iface.duplex as f64),
                    ] {
                        samples.push(sample(descriptor, col, value, labels.clone()));
                    }
                }
                true
            }
            Err(err) => {
                warn!(error = %err, "node_netdev probe failed");
                false
            }
        },
        "node_memory_bytes" => match probe.read_memory() {
            Ok(mem) => {
                #[allow(clippy::cast_precision_loss)]
                for (class, bytes) in mem.classes() {
                    samples.push(sample(descriptor, "bytes", bytes as f64, vec![class.to_string()]));
                }
                true
            }
            Err(err) => {
                warn!(error = %err, "node_memory_bytes probe failed");
                false
            }
        },
        "node_filesystem" => match probe.read_filesystems() {
            Ok(filesystems) => {
                for fs in filesystems {
                    let labels = vec![fs.device.clone(), fs.mountpoint.clone(), fs.fstype.clone()];
                    #[allow(clippy::cast_precision_loss)]
                    let values: [(&str, f64); 9] = [
                        ("total_bytes", fs.total_bytes as f64),
                        ("free_bytes", fs.free_bytes as f64),
                        ("available_bytes", fs.available_bytes as f64),
                        ("used_bytes", fs.used_bytes as f64),
                        ("reserved_bytes", fs.reserved_bytes as f64),
                        ("reserved_pct", fs.reserved_pct),
                        ("total_inodes", fs.total_inodes as f64),
                        ("free_inodes", fs.free_inodes as f64),
                        ("used_inodes", fs.used_inodes as f64),
                    ];
                    for (col, value) in values {
                        samples.push(sample(descriptor, col, value, labels.clone()));
                    }
                }
                true
            }
            Err(err) => {
                warn!(error = %err, "node_filesystem probe failed");
                false
            }
        },
        "node_sysctl" => {
            let mut any = false;
            for name in TRACKED_SYSCTLS {
                match probe.get_sysctl(name) {
                    #[allow(clippy::cast_precision_loss)]
                    Ok(value) => {
                        samples.push(sample(descriptor, "value", value as f64, vec![(*name).to_string()]));
                        any = true;
                    }
                    Err(err) => warn!(sysctl = *name, error = %err, "node_sysctl probe failed"),
                }
            }
            any
        }
        "node_cpu_core_state" => match probe.count_cpus() {
            Ok(counts) => {
                samples.push(sample(descriptor, "count", f64::from(counts.online), vec!["online".to_string()]));
                samples.push(sample(descriptor, "count", f64::from(counts.offline), vec!["offline".to_string()]));
                true
            }
            Err(err) => {
                warn!(error = %err, "node_cpu_core_state probe failed");
                false
            }
        },
        "node_scaling_governor" => match probe.count_scaling_governors() {
            Ok(governors) => {
                for (governor, cores) in governors {
                    samples.push(sample(descriptor, "cores", f64::from(cores), vec![governor]));
                }
                true
            }
            Err(err) => {
                warn!(error = %err, "node_scaling_governor probe failed");
                false
            }
        },
        "node_numa_nodes" => match probe.count_numa_nodes() {
            Ok(count) => {
                samples.push(sample(descriptor, "count", f64::from(count), vec![]));
                true
            }
            Err(err) => {
                warn!(error = %err, "node_numa_nodes probe failed");
                false
            }
        },
        "node_disk_info" => match probe.enumerate_block_devices() {
            Ok(devices) => {
                for device in devices {
                    let labels = vec![device.device, device.scheduler];
                    let rotational = f64::from(u8::from(device.rotational));
                    samples.push(sample(descriptor, "rotational", rotational, labels));
                }
                true
            }
            Err(err) => {
                warn!(error = %err, "node_disk_info probe failed");
                false
            }
        },
        "node_uptime_seconds" => match probe.read_uptime_seconds() {
            Ok(seconds) => {
                samples.push(sample(descriptor, "seconds", seconds, vec![]));
                true
            }
            Err(err) => {
                warn!(error = %err, "node_uptime_seconds probe failed");
                false
            }
        },
        other => {
            warn!(descriptor = other, "no system probe dispatch registered for descriptor");
            false
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::catalog::ServiceKind;
    use crate::probe::{BlockDevice, CpuCounts, CpuStat, DiskStat, FilesystemStat, MemoryStat, NetDevStat};
    use std::collections::HashMap;

    struct FakeProbe;

    impl SystemProbe for FakeProbe {
        fn read_cpu_stat(&self) -> anyhow::Result<CpuStat> {
            Ok(CpuStat {
                user: 10,
                ..CpuStat::default()
            })
        }
        fn read_memory(&self) -> anyhow::Result<MemoryStat> {
            Ok(MemoryStat::default())
        }
        fn read_diskstats(&self) -> anyhow::Result<Vec<DiskStat>> {
            Ok(vec![DiskStat {
                device: "sda".into(),
                rcompleted: 5,
                rmerged: 0,
                rsectors: 0,
                rspent: 0,
                wcompleted: 0,
                wmerged: 0,
                wsectors: 0,
                wspent: 0,
                ioinprogress: 0,
                tspent: 0,
                tweighted: 0,
                uptime: 0,
            }])
        }
        fn read_netdev(&self) -> anyhow::Result<Vec<NetDevStat>> {
            Ok(vec![])
        }
        fn read_filesystems(&self) -> anyhow::Result<Vec<FilesystemStat>> {
            Ok(vec![])
        }
        fn read_mounts(&self) -> anyhow::Result<HashMap<String, String>> {
            Ok(HashMap::new())
        }
        fn get_sysctl(&self, _name: &str) -> anyhow::Result<i64> {
            Ok(1)
        }
        fn count_cpus(&self) -> anyhow::Result<CpuCounts> {
            Ok(CpuCounts { online: 4, offline: 0 })
        }
        fn count_scaling_governors(&self) -> anyhow::Result<HashMap<String, u32>> {
            Ok(HashMap::new())
        }
        fn count_numa_nodes(&self) -> anyhow::Result<u32> {
            Ok(1)
        }
        fn enumerate_block_devices(&self) -> anyhow::Result<Vec<BlockDevice>> {
            Ok(vec![BlockDevice {
                device: "sda".into(),
                rotational: false,
                scheduler: "none".into(),
            }])
        }
        fn read_uptime_seconds(&self) -> anyhow::Result<f64> {
            Ok(123.0)
        }
    }

    #[test]
    fn system_cycle_emits_samples_for_every_descriptor() {
        let mut catalog = Catalog::for_kind(ServiceKind::System);
        let samples = run(&mut catalog, &FakeProbe);
        assert!(samples.iter().any(|s| s.metric_name == "node_cpu_seconds_total_seconds"));
        assert!(samples.iter().any(|s| s.metric_name == "node_disk_info_rotational"));
        assert!(samples.iter().any(|s| s.metric_name == "node_uptime_seconds_seconds"));
    }

    #[test]
    fn diskstats_filtered_device_never_reaches_system_cycle() {
        let mut catalog = Catalog::for_kind(ServiceKind::System);
        let samples = run(&mut catalog, &FakeProbe);
        let sda_samples = samples
            .iter()
            .filter(|s| s.metric_name.starts_with("node_diskstats"))
            .count();
        assert_eq!(sda_samples, 12); // one FakeProbe device, 12 value columns
    }
}
