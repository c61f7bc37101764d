#![allow(dead_code)]

pub use assetdag_test_utils::{builders, init_tracing, recording_runner, with_timeout};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use walkdir::WalkDir;

/// Path of a demo project shipped under `demos/`.
pub fn demo_dir(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("demos").join(name)
}

/// Write `contents` to `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

/// Copy a directory tree (used to run demos without touching the checkout).
pub fn copy_tree(from: &Path, to: &Path) {
    for entry in WalkDir::new(from).sort_by_file_name() {
        let entry = entry.unwrap();
        let rel = entry.path().strip_prefix(from).unwrap();
        let target = to.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).unwrap();
        } else {
            fs::copy(entry.path(), &target).unwrap();
        }
    }
}

/// Digest of every file (path and contents) under `dir`.
///
/// Two trees have the same digest iff they hold the same files with the same
/// bytes.
pub fn tree_digest(dir: &Path) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.unwrap();
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(dir).unwrap();
        hasher.update(rel.to_string_lossy().as_bytes());
        hasher.update(&[0]);
        hasher.update(&fs::read(entry.path()).unwrap());
        hasher.update(&[0]);
    }
    hasher.finalize()
}

/// Is `pid` a live (non-zombie) process?
///
/// Orphaned grandchildren are reaped by init, not by the test, so a zombie
/// counts as dead.
#[cfg(unix)]
pub fn is_alive(pid: u32) -> bool {
    if let Ok(stat) = fs::read_to_string(format!("/proc/{pid}/stat")) {
        if let Some((_, rest)) = stat.rsplit_once(')') {
            return !rest.trim_start().starts_with('Z');
        }
    }
    std::process::Command::new("kill")
        .arg("-0")
        .arg(pid.to_string())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Pids a backend appended to `path`, one per line.
pub fn read_pids(path: &Path) -> Vec<u32> {
    fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect()
}

/// Poll `path` until it lists at least `count` pids.
pub async fn wait_for_pids(path: &Path, count: usize) -> Vec<u32> {
    loop {
        let pids = read_pids(path);
        if pids.len() >= count {
            return pids;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
