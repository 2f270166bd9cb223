//! The System Probe contract (spec §6): a set of pure, fallible read
//! functions over `/proc` and `/sys`, each scoped to one kind of host
//! statistic. A probe failure is per-call and never terminates the Exporter
//! (spec §7, "System probe read failure").

pub mod linux;

use std::collections::HashMap;

/// Per-mode CPU tick counts from `/proc/stat`'s first line.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CpuStat {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
    pub guest: u64,
    pub guest_nice: u64,
}

impl CpuStat {
    #[must_use]
    pub fn total(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
            + self.guest
            + self.guest_nice
    }

    /// `(mode, ticks)` pairs, in the order `node_cpu_seconds_total` declares
    /// its `mode` label values.
    #[must_use]
    pub fn modes(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("user", self.user),
            ("nice", self.nice),
            ("system", self.system),
            ("idle", self.idle),
            ("iowait", self.iowait),
            ("irq", self.irq),
            ("softirq", self.softirq),
            ("steal", self.steal),
            ("guest", self.guest),
            ("guest_nice", self.guest_nice),
            ("total", self.total()),
        ]
    }
}

/// Bytes per memory class from `/proc/meminfo`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemoryStat {
    pub mem_total: u64,
    pub mem_free: u64,
    pub mem_used: u64,
    pub swap_total: u64,
    pub swap_free: u64,
    pub swap_used: u64,
    pub mem_cached: u64,
    pub mem_dirty: u64,
    pub mem_writeback: u64,
    pub mem_buffers: u64,
    pub mem_available: u64,
    pub mem_slab: u64,
    pub hp_total: u64,
    pub hp_free: u64,
    pub hp_rsvd: u64,
    pub hp_surp: u64,
    pub hp_pagesize: u64,
}

impl MemoryStat {
    #[must_use]
    pub fn classes(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("mem_total", self.mem_total),
            ("mem_free", self.mem_free),
            ("mem_used", self.mem_used),
            ("swap_total", self.swap_total),
            ("swap_free", self.swap_free),
            ("swap_used", self.swap_used),
            ("mem_cached", self.mem_cached),
            ("mem_dirty", self.mem_dirty),
            ("mem_writeback", self.mem_writeback),
            ("mem_buffers", self.mem_buffers),
            ("mem_available", self.mem_available),
            ("mem_slab", self.mem_slab),
            ("hp_total", self.hp_total),
            ("hp_free", self.hp_free),
            ("hp_rsvd", self.hp_rsvd),
            ("hp_surp", self.hp_surp),
            ("hp_pagesize", self.hp_pagesize),
        ]
    }
}

/// Per-device counters from `/proc/diskstats`.
#[derive(Clone, Debug, PartialEq)]
pub struct DiskStat {
    pub device: String,
    pub rcompleted: u64,
    pub rmerged: u64,
    pub rsectors: u64,
    pub rspent: u64,
    pub wcompleted: u64,
    pub wmerged: u64,
    pub wsectors: u64,
    pub wspent: u64,
    pub ioinprogress: u64,
    pub tspent: u64,
    pub tweighted: u64,
    pub uptime: u64,
}

/// Per-interface counters from `/proc/net/dev`.
#[derive(Clone, Debug, PartialEq)]
pub struct NetDevStat {
    pub device: String,
    pub rbytes: u64,
    pub rpackets: u64,
    pub rerrs: u64,
    pub rdrop: u64,
    pub rfifo: u64,
    pub rframe: u64,
    pub rcompressed: u64,
    pub rmulticast: u64,
    pub tbytes: u64,
    pub tpackets: u64,
    pub terrs: u64,
    pub tdrop: u64,
    pub tfifo: u64,
    pub tcolls: u64,
    pub tcarrier: u64,
    pub tcompressed: u64,
    pub uptime: u64,
    pub speed: u64,
    pub duplex: u64,
}

impl NetDevStat {
    /// `saturation = rerrs + rdrop + tdrop + tfifo + tcolls + tcarrier` (spec §6).
    #[must_use]
    pub fn saturation(&self) -> u64 {
        self.rerrs + self.rdrop + self.tdrop + self.tfifo + self.tcolls + self.tcarrier
    }
}

/// One mounted filesystem of a tracked type (spec §6: `ext3`, `ext4`, `xfs`, `btrfs`).
#[derive(Clone, Debug, PartialEq)]
pub struct FilesystemStat {
    pub device: String,
    pub mountpoint: String,
    pub fstype: String,
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub available_bytes: u64,
    pub used_bytes: u64,
    pub reserved_bytes: u64,
    pub reserved_pct: f64,
    pub total_inodes: u64,
    pub free_inodes: u64,
    pub used_inodes: u64,
}

/// One matched block device (spec §6 device-name regex).
#[derive(Clone, Debug, PartialEq)]
pub struct BlockDevice {
    pub device: String,
    pub rotational: bool,
    pub scheduler: String,
}

/// Online/offline logical CPU counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CpuCounts {
    pub online: u32,
    pub offline: u32,
}

/// The System Probe contract (spec §6). A pure boundary so the engine can
/// be exercised against an in-memory fake in tests, and so non-Linux builds
/// have somewhere to plug in a stub.
pub trait SystemProbe: Send + Sync {
    /// # Errors
    /// Returns an error if `/proc/stat` is unreadable or malformed.
    fn read_cpu_stat(&self) -> anyhow::Result<CpuStat>;

    /// # Errors
    /// Returns an error if `/proc/meminfo` is unreadable or malformed.
    fn read_memory(&self) -> anyhow::Result<MemoryStat>;

    /// # Errors
    /// Returns an error if `/proc/diskstats` is unreadable or malformed.
    /// Devices with `rcompleted == 0 && wcompleted == 0` are filtered out.
    fn read_diskstats(&self) -> anyhow::Result<Vec<DiskStat>>;

    /// # Errors
    /// Returns an error if `/proc/net/dev` is unreadable or malformed.
    /// Interfaces with `rpackets == 0 && tpackets == 0` are filtered out.
    fn read_netdev(&self) -> anyhow::Result<Vec<NetDevStat>>;

    /// # Errors
    /// Returns an error if `/proc/mounts` is unreadable.
    fn read_filesystems(&self) -> anyhow::Result<Vec<FilesystemStat>>;

    /// # Errors
    /// Returns an error if `/proc/mounts` is unreadable.
    fn read_mounts(&self) -> anyhow::Result<HashMap<String, String>>;

    /// # Errors
    /// Returns an error if the named sysctl cannot be read or parsed.
    fn get_sysctl(&self, name: &str) -> anyhow::Result<i64>;

    /// # Errors
    /// Returns an error if `/sys/devices/system/cpu` is unreadable.
    fn count_cpus(&self) -> anyhow::Result<CpuCounts>;

    /// # Errors
    /// Returns an error if per-core scaling-governor files are unreadable.
    fn count_scaling_governors(&self) -> anyhow::Result<HashMap<String, u32>>;

    /// # Errors
    /// Returns an error if `/sys/devices/system/node` is unreadable.
    fn count_numa_nodes(&self) -> anyhow::Result<u32>;

    /// # Errors
    /// Returns an error if `/sys/block` is unreadable.
    fn enumerate_block_devices(&self) -> anyhow::Result<Vec<BlockDevice>>;

    /// # Errors
    /// Returns an error if `/proc/uptime` is unreadable or malformed.
    fn read_uptime_seconds(&self) -> anyhow::Result<f64>;
}

/// Fixed set of sysctl names queried every `node_sysctl` cycle (spec §6:
/// "the set of queried names is fixed at compile time").
pub const TRACKED_SYSCTLS: &[&str] = &[
    "vm.swappiness",
    "vm.dirty_ratio",
    "vm.dirty_background_ratio",
    "vm.overcommit_memory",
    "kernel.shmmax",
    "fs.file-max",
    "net.core.somaxconn",
];

/// Block-device name pattern (spec §6): `(s|xv|v)d[a-z]|nvme[0-9]n[0-9]|dm-[0-9]+|md[0-9]+`.
pub const BLOCK_DEVICE_PATTERN: &str = r"^(?:(?:s|xv|v)d[a-z]|nvme[0-9]+n[0-9]+|dm-[0-9]+|md[0-9]+)$";

/// Filesystem types the agent tracks (spec §6).
pub const TRACKED_FSTYPES: &[&str] = &["ext3", "ext4", "xfs", "btrfs"];
