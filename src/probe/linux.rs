//! Linux implementation of the [`super::SystemProbe`] contract, reading
//! `/proc` and `/sys` directly (spec §6). Each function degrades to an
//! error on the first unexpected line rather than returning a partial
//! result; the caller logs and yields zero samples for that probe.

use super::{
    BlockDevice, CpuCounts, CpuStat, DiskStat, FilesystemStat, MemoryStat, NetDevStat,
    SystemProbe, BLOCK_DEVICE_PATTERN,
};
use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Probe rooted at `/proc` and `/sys`. Parameterized by root so tests can
/// point it at a fixture tree instead of the real filesystem.
pub struct LinuxProbe {
    proc_root: String,
    sys_root: String,
}

impl Default for LinuxProbe {
    fn default() -> Self {
        Self::new("/proc", "/sys")
    }
}

impl LinuxProbe {
    #[must_use]
    pub fn new(proc_root: impl Into<String>, sys_root: impl Into<String>) -> Self {
        Self {
            proc_root: proc_root.into(),
            sys_root: sys_root.into(),
        }
    }

    fn proc(&self, rel: &str) -> String {
        format!("{}/{rel}", self.proc_root)
    }

    fn sys(&self, rel: &str) -> String {
        format!("{}/{rel}", self.sys_root)
    }
}

fn parse_u64(field: Option<&str>) -> u64 {
    field.and_then(|s| s.parse().ok()).unwrap_or(0)
}

impl SystemProbe for LinuxProbe {
    fn read_cpu_stat(&self) -> Result<CpuStat> {
        let text = fs::read_to_string(self.proc("stat")).context("reading /proc/stat")?;
        let line = text
            .lines()
            .find(|l| l.starts_with("cpu "))
            .context("no aggregate cpu line in /proc/stat")?;
        let mut fields = line.split_whitespace();
        fields.next(); // "cpu"
        let next = |f: &mut std::str::SplitWhitespace<'_>| parse_u64(f.next());

        Ok(CpuStat {
            user: next(&mut fields),
            nice: next(&mut fields),
            system: next(&mut fields),
            idle: next(&mut fields),
            iowait: next(&mut fields),
            irq: next(&mut fields),
            softirq: next(&mut fields),
            steal: next(&mut fields),
            guest: next(&mut fields),
            guest_nice: next(&mut fields),
        })
    }

    fn read_memory(&self) -> Result<MemoryStat> {
        let text = fs::read_to_string(self.proc("meminfo")).context("reading /proc/meminfo")?;
        let mut kv: HashMap<String, u64> = HashMap::new();
        for line in text.lines() {
            let Some((key, rest)) = line.split_once(':') else {
                continue;
            };
            let kb = parse_u64(rest.split_whitespace().next());
            kv.insert(key.to_string(), kb * 1024);
        }
        let get = |k: &str| kv.get(k).copied().unwrap_or(0);

        Ok(MemoryStat {
            mem_total: get("MemTotal"),
            mem_free: get("MemFree"),
            mem_used: get("MemTotal").saturating_sub(get("MemFree")),
            swap_total: get("SwapTotal"),
            swap_free: get("SwapFree"),
            swap_used: get("SwapTotal").saturating_sub(get("SwapFree")),
            mem_cached: get("Cached"),
            mem_dirty: get("Dirty"),
            mem_writeback: get("Writeback"),
            mem_buffers: get("Buffers"),
            mem_available: get("MemAvailable"),
            mem_slab: get("Slab"),
            hp_total: get("HugePages_Total"),
            hp_free: get("HugePages_Free"),
            hp_rsvd: get("HugePages_Rsvd"),
            hp_surp: get("HugePages_Surp"),
            hp_pagesize: get("Hugepagesize"),
        })
    }

    fn read_diskstats(&self) -> Result<Vec<DiskStat>> {
        let text = fs::read_to_string(self.proc("diskstats")).context("reading /proc/diskstats")?;
        let mut out = Vec::new();
        for line in text.lines() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 14 {
                continue;
            }
            let field = |i: usize| fields.get(i).copied();
            let stat = DiskStat {
                device: field(2).unwrap_or_default().to_string(),
                rcompleted: parse_u64(field(3)),
                rmerged: parse_u64(field(4)),
                rsectors: parse_u64(field(5)),
                rspent: parse_u64(field(6)),
                wcompleted: parse_u64(field(7)),
                wmerged: parse_u64(field(8)),
                wsectors: parse_u64(field(9)),
                wspent: parse_u64(field(10)),
                ioinprogress: parse_u64(field(11)),
                tspent: parse_u64(field(12)),
                tweighted: parse_u64(field(13)),
                uptime: 0,
            };
            if stat.rcompleted == 0 && stat.wcompleted == 0 {
                continue; // spec §6: zero-activity devices are filtered out
            }
            out.push(stat);
        }
        Ok(out)
    }

    fn read_netdev(&self) -> Result<Vec<NetDevStat>> {
        let text = fs::read_to_string(self.proc("net/dev")).context("reading /proc/net/dev")?;
        let mut out = Vec::new();
        for line in text.lines().skip(2) {
            let Some((device, rest)) = line.split_once(':') else {
                continue;
            };
            let fields: Vec<&str> = rest.split_whitespace().collect();
            if fields.len() < 16 {
                continue;
            }
            let field = |i: usize| fields.get(i).copied();
            let stat = NetDevStat {
                device: device.trim().to_string(),
                rbytes: parse_u64(field(0)),
                rpackets: parse_u64(field(1)),
                rerrs: parse_u64(field(2)),
                rdrop: parse_u64(field(3)),
                rfifo: parse_u64(field(4)),
                rframe: parse_u64(field(5)),
                rcompressed: parse_u64(field(6)),
                rmulticast: parse_u64(field(7)),
                tbytes: parse_u64(field(8)),
                tpackets: parse_u64(field(9)),
                terrs: parse_u64(field(10)),
                tdrop: parse_u64(field(11)),
                tfifo: parse_u64(field(12)),
                tcolls: parse_u64(field(13)),
                tcarrier: parse_u64(field(14)),
                tcompressed: parse_u64(field(15)),
                uptime: 0,
                speed: 0,
                duplex: 0,
            };
            if stat.rpackets == 0 && stat.tpackets == 0 {
                continue; // spec §6: zero-activity interfaces are filtered out
            }
            out.push(stat);
        }
        Ok(out)
    }

    fn read_filesystems(&self) -> Result<Vec<FilesystemStat>> {
        let mounts = self.read_mounts_raw()?;
        let mut out = Vec::new();
        for (mountpoint, device, fstype) in mounts {
            if !super::TRACKED_FSTYPES.contains(&fstype.as_str()) {
                continue;
            }
            let Ok(statvfs) = nix::sys::statvfs::statvfs(Path::new(&mountpoint)) else {
                continue;
            };
            let block_size = statvfs.fragment_size();
            let total_bytes = statvfs.blocks() * block_size;
            let free_bytes = statvfs.blocks_free() * block_size;
            let available_bytes = statvfs.blocks_available() * block_size;
            let used_bytes = total_bytes.saturating_sub(free_bytes);
            let reserved_bytes = free_bytes.saturating_sub(available_bytes);
            let total_inodes = statvfs.files();
            let free_inodes = statvfs.files_free();
            let used_inodes = total_inodes.saturating_sub(free_inodes);
            #[allow(clippy::cast_precision_loss)]
            let reserved_pct = if total_bytes == 0 {
                0.0
            } else {
                reserved_bytes as f64 / total_bytes as f64 * 100.0
            };

            out.push(FilesystemStat {
                device,
                mountpoint,
                fstype,
                total_bytes,
                free_bytes,
                available_bytes,
                used_bytes,
                reserved_bytes,
                reserved_pct,
                total_inodes,
                free_inodes,
                used_inodes,
            });
        }
        Ok(out)
    }

    fn read_mounts(&self) -> Result<HashMap<String, String>> {
        Ok(self
            .read_mounts_raw()?
            .into_iter()
            .map(|(mountpoint, device, _)| (mountpoint, device))
            .collect())
    }

    fn get_sysctl(&self, name: &str) -> Result<i64> {
        let path = format!("{}/{}", self.proc("sys"), name.replace('.', "/"));
        let text = fs::read_to_string(&path).with_context(|| format!("reading sysctl {name}"))?;
        text.split_whitespace()
            .next()
            .context("empty sysctl value")?
            .parse()
            .with_context(|| format!("parsing sysctl {name}"))
    }

    fn count_cpus(&self) -> Result<CpuCounts> {
        let cpu_dir = self.sys("devices/system/cpu");
        let mut counts = CpuCounts::default();
        for entry in fs::read_dir(&cpu_dir).context("reading /sys/devices/system/cpu")? {
            let Ok(entry) = entry else { continue };
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.starts_with("cpu") || !name.get(3..).is_some_and(|n| n.chars().all(|c| c.is_ascii_digit())) {
                continue;
            }
            let online_path = entry.path().join("online");
            let online = fs::read_to_string(&online_path).map_or(true, |s| s.trim() == "1");
            if online {
                counts.online += 1;
            } else {
                counts.offline += 1;
            }
        }
        Ok(counts)
    }

    fn count_scaling_governors(&self) -> Result<HashMap<String, u32>> {
        let cpu_dir = self.sys("devices/system/cpu");
        let mut governors: HashMap<String, u32> = HashMap::new();
        for entry in fs::read_dir(&cpu_dir).context("reading /sys/devices/system/cpu")? {
            let Ok(entry) = entry else { continue };
            let governor_path = entry.path().join("cpufreq/scaling_governor");
            if let Ok(governor) = fs::read_to_string(&governor_path) {
                *governors.entry(governor.trim().to_string()).or_insert(0) += 1;
            }
        }
        Ok(governors)
    }

    fn count_numa_nodes(&self) -> Result<u32> {
        let node_dir = self.sys("devices/system/node");
        let count = fs::read_dir(&node_dir)
            .context("reading /sys/devices/system/node")?
            .filter_map(std::result::Result::ok)
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|n| n.starts_with("node"))
            })
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    fn enumerate_block_devices(&self) -> Result<Vec<BlockDevice>> {
        let pattern = Regex::new(BLOCK_DEVICE_PATTERN).context("compiling block device regex")?;
        let block_dir = self.sys("block");
        let mut out = Vec::new();
        for entry in fs::read_dir(&block_dir).context("reading /sys/block")? {
            let Ok(entry) = entry else { continue };
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !pattern.is_match(&name) {
                continue;
            }
            let rotational = fs::read_to_string(entry.path().join("queue/rotational")).is_ok_and(|s| s.trim() == "1");
            let scheduler = fs::read_to_string(entry.path().join("queue/scheduler"))
                .ok()
                .and_then(|s| {
                    s.split_whitespace()
                        .find(|tok| tok.starts_with('['))
                        .map(|tok| tok.trim_matches(['[', ']']).to_string())
                })
                .unwrap_or_default();
            out.push(BlockDevice {
                device: name,
                rotational,
                scheduler,
            });
        }
        Ok(out)
    }

    fn read_uptime_seconds(&self) -> Result<f64> {
        let text = fs::read_to_string(self.proc("uptime")).context("reading /proc/uptime")?;
        text.split_whitespace()
            .next()
            .context("empty /proc/uptime")?
            .parse()
            .context("parsing /proc/uptime")
    }
}

impl LinuxProbe {
    /// Returns `(mountpoint, device, fstype)` triples from `/proc/mounts`,
    /// with device-mapper names dereferenced via `/dev/mapper` (spec §6:
    /// "device-mapper names dereferenced").
    fn read_mounts_raw(&self) -> Result<Vec<(String, String, String)>> {
        let text = fs::read_to_string(self.proc("mounts")).context("reading /proc/mounts")?;
        let mut out = Vec::new();
        for line in text.lines() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let (Some(&device), Some(&mountpoint), Some(&fstype)) =
                (fields.first(), fields.get(1), fields.get(2))
            else {
                continue;
            };
            let device = Self::dereference_device(device);
            out.push((mountpoint.to_string(), device, fstype.to_string()));
        }
        Ok(out)
    }

    fn dereference_device(device: &str) -> String {
        if !device.starts_with("/dev/mapper/") {
            return device.to_string();
        }
        fs::canonicalize(device).map_or_else(
            |_| device.to_string(),
            |resolved| resolved.to_string_lossy().into_owned(),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::identity_op)]
mod tests {
    use super::*;
    use std::fs::{self as stdfs, File};
    use std::io::Write as _;

    fn fixture(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        for (rel, content) in files {
            let path = dir.path().join(rel);
            if let Some(parent) = path.parent() {
                stdfs::create_dir_all(parent).expect("mkdir");
            }
            let mut f = File::create(path).expect("create");
            f.write_all(content.as_bytes()).expect("write");
        }
        dir
    }

    #[test]
    fn reads_aggregate_cpu_line() {
        let dir = fixture(&[(
            "stat",
            "cpu  100 10 50 800 20 1 2 0 0 0\ncpu0 50 5 25 400 10 0 1 0 0 0\n",
        )]);
        let probe = LinuxProbe::new(dir.path().to_str().expect("utf8"), "/sys");
        let stat = probe.read_cpu_stat().expect("parsed");
        assert_eq!(stat.user, 100);
        assert_eq!(stat.idle, 800);
        assert_eq!(stat.total(), 100 + 10 + 50 + 800 + 20 + 1 + 2 + 0 + 0);
    }

    #[test]
    fn meminfo_converts_kb_to_bytes() {
        let dir = fixture(&[("meminfo", "MemTotal:       16384 kB\nMemFree:         2048 kB\n")]);
        let probe = LinuxProbe::new(dir.path().to_str().expect("utf8"), "/sys");
        let mem = probe.read_memory().expect("parsed");
        assert_eq!(mem.mem_total, 16_384 * 1024);
        assert_eq!(mem.mem_used, (16_384 - 2_048) * 1024);
    }

    #[test]
    fn diskstats_filters_idle_devices() {
        let dir = fixture(&[(
            "diskstats",
            "   8       0 sda 100 5 2000 30 200 10 4000 60 0 90 90\n   \
             8       1 sda1 0 0 0 0 0 0 0 0 0 0 0\n",
        )]);
        let probe = LinuxProbe::new(dir.path().to_str().expect("utf8"), "/sys");
        let stats = probe.read_diskstats().expect("parsed");
        assert_eq!(stats.len(), 1);
        assert_eq!(stats.first().expect("one").device, "sda");
    }

    #[test]
    fn netdev_computes_saturation() {
        let dir = fixture(&[(
            "net/dev",
            "Inter-|   Receive                                                |  Transmit\n \
             face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed\n  \
             eth0: 1000 10 1 2 0 0 0 0 500 5 0 1 0 1 1 0\n    lo:    0    0    0    0    0     0          0        0    0    0    0    0    0     0       0          0\n",
        )]);
        let probe = LinuxProbe::new(dir.path().to_str().expect("utf8"), "/sys");
        let stats = probe.read_netdev().expect("parsed");
        assert_eq!(stats.len(), 1);
        let eth0 = stats.first().expect("one");
        assert_eq!(eth0.device, "eth0");
        assert_eq!(eth0.saturation(), 1 + 2 + 1 + 0 + 1 + 1);
    }

    #[test]
    fn uptime_parses_first_field() {
        let dir = fixture(&[("uptime", "12345.67 54321.00\n")]);
        let probe = LinuxProbe::new(dir.path().to_str().expect("utf8"), "/sys");
        let uptime = probe.read_uptime_seconds().expect("parsed");
        assert!((uptime - 12_345.67).abs() < f64::EPSILON);
    }
}
