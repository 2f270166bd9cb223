//! Directory→Mountpoint Resolution (spec §4.8): given a target path and the
//! host's mount table, find the device and mountpoint that path lives on.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// `(device, mountpoint)` for the most specific mount covering `target`.
/// Falls back to `/` if nothing more specific matched (spec §4.8 step 3).
#[must_use]
pub fn resolve(target: &Path, mounts: &HashMap<String, String>) -> (String, String) {
    for prefix in parent_prefixes(target) {
        let prefix_str = prefix.to_string_lossy().into_owned();

        if let Ok(link_target) = fs::read_link(&prefix) {
            let dereferenced = if link_target.is_absolute() {
                link_target
            } else {
                prefix.parent().map_or_else(|| link_target.clone(), |p| p.join(&link_target))
            };
            let dereferenced_str = dereferenced.to_string_lossy().into_owned();
            if let Some(device) = mounts.get(&dereferenced_str) {
                return (device.clone(), dereferenced_str);
            }
        }

        if let Some(device) = mounts.get(&prefix_str) {
            return (device.clone(), prefix_str);
        }
    }

    let root_device = mounts.get("/").cloned().unwrap_or_default();
    (root_device, "/".to_string())
}

/// Parent prefixes of `path`, most specific first, ending at (and
/// including) `/`.
fn parent_prefixes(path: &Path) -> Vec<PathBuf> {
    let mut prefixes = Vec::new();
    let mut current = Some(path.to_path_buf());
    while let Some(p) = current {
        prefixes.push(p.clone());
        current = p.parent().map(Path::to_path_buf).filter(|parent| parent != &p);
    }
    prefixes
}

/// Compute the WAL directory path for a given data directory and whether
/// the server is pre-10.0 (spec §4.8 step 1, §4.9's `wal_subdir` override).
#[must_use]
pub fn wal_directory(data_directory: &str, wal_subdir: Option<&str>) -> String {
    format!("{data_directory}/{}", wal_subdir.unwrap_or("pg_wal"))
}

/// Compute the log directory path (spec §4.8 step 1): absolute as-is,
/// otherwise relative to the data directory.
#[must_use]
pub fn log_directory(data_directory: &str, log_directory_setting: &str) -> String {
    if Path::new(log_directory_setting).is_absolute() {
        log_directory_setting.to_string()
    } else {
        format!("{data_directory}/{log_directory_setting}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn resolves_to_the_most_specific_mount() {
        let mut mounts = HashMap::new();
        mounts.insert("/".to_string(), "/dev/sda1".to_string());
        mounts.insert("/var/lib/pg".to_string(), "/dev/sdb1".to_string());

        let (device, mountpoint) = resolve(Path::new("/var/lib/pg/12/main"), &mounts);
        assert_eq!(device, "/dev/sdb1");
        assert_eq!(mountpoint, "/var/lib/pg");
    }

    #[test]
    fn falls_back_to_root_when_nothing_else_matches() {
        let mut mounts = HashMap::new();
        mounts.insert("/".to_string(), "/dev/sda1".to_string());

        let (device, mountpoint) = resolve(Path::new("/opt/data"), &mounts);
        assert_eq!(device, "/dev/sda1");
        assert_eq!(mountpoint, "/");
    }

    #[test]
    fn wal_directory_prefers_pg_wal_unless_overridden() {
        assert_eq!(wal_directory("/var/lib/pg/12/main", None), "/var/lib/pg/12/main/pg_wal");
        assert_eq!(
            wal_directory("/var/lib/pg/9.6/main", Some("pg_xlog")),
            "/var/lib/pg/9.6/main/pg_xlog"
        );
    }

    #[test]
    fn log_directory_is_absolute_or_relative_to_data_directory() {
        assert_eq!(log_directory("/var/lib/pg", "/var/log/pg"), "/var/log/pg");
        assert_eq!(log_directory("/var/lib/pg", "log"), "/var/lib/pg/log");
    }
}
