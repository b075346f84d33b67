use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
};

use regex::Regex;

/// First seven characters of a commit SHA, or `unknown` when it is empty.
pub fn short_sha(sha: &str) -> &str {
    let sha = sha.trim();
    if sha.is_empty() {
        return "unknown";
    }
    match sha.char_indices().nth(7) {
        Some((idx, _)) => &sha[..idx],
        None => sha,
    }
}

/// Directory holding everything downloaded for one run.
pub fn run_dir(root: impl AsRef<Path>, run_id: u64, head_sha: &str) -> PathBuf {
    root.as_ref().join(format!("{run_id}-{}", short_sha(head_sha)))
}

pub fn run_archive_name(run_id: u64) -> String { format!("run_{run_id}.zip") }

pub fn run_metadata_name(run_id: u64) -> String { format!("run_{run_id}_metadata.json") }

pub fn job_log_name(job_id: u64, job_name: &str) -> String {
    format!("job_{job_id}_{}.log", sanitize_file_name(job_name))
}

/// Replace every run of characters outside `[A-Za-z0-9_.-]` with a single `_`.
pub fn sanitize_file_name(name: &str) -> String {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = REGEX.get_or_init(|| Regex::new(r"[^A-Za-z0-9_.\-]+").unwrap());
    regex.replace_all(name, "_").into_owned()
}
