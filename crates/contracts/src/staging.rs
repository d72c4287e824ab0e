//! Attempt-private staging layout for directory-backed stores
//!
//! ```text
//! <output>/_temporary/<attempt-id>/part-m-00003   staged by one attempt
//! <output>/part-m-00003                             promoted on commit
//! <output>/_SUCCESS                                 written on job commit
//! ```
//!
//! Speculative attempts of the same task get distinct `<attempt-id>`
//! directories, so they never overwrite each other before a winner is chosen.

use std::path::{Path, PathBuf};

use crate::{TaskAttemptId, TaskId};

/// Directory holding every attempt's staged output
pub const TEMPORARY_DIR: &str = "_temporary";

/// Marker written into the output directory when the job commits
pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// `<output>/_temporary`
pub fn job_staging_dir(output_dir: &Path) -> PathBuf {
    output_dir.join(TEMPORARY_DIR)
}

/// `<output>/_temporary/<attempt-id>`
pub fn work_dir(output_dir: &Path, attempt: &TaskAttemptId) -> PathBuf {
    job_staging_dir(output_dir).join(attempt.to_string())
}

/// `part-<kind>-<partition:05>`
pub fn part_file_name(task: &TaskId) -> String {
    format!("part-{}-{:05}", task.kind.code(), task.partition)
}

/// Comparable form of a store location
///
/// Surrounding whitespace, repeated separators, `.` components and a
/// trailing separator are dropped, so `/out/a/` and `/out//a` compare equal.
/// `..` is kept as written.
pub fn normalize_location(location: &str) -> PathBuf {
    Path::new(location.trim()).components().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_dirs_differ_per_attempt() {
        let out = Path::new("/data/out");
        let a = TaskAttemptId::new("job_1".into(), TaskId::map(3), 0);
        let b = TaskAttemptId::new("job_1".into(), TaskId::map(3), 1);

        assert_ne!(work_dir(out, &a), work_dir(out, &b));
        assert!(work_dir(out, &a).starts_with(job_staging_dir(out)));
    }

    #[test]
    fn test_part_file_name() {
        assert_eq!(part_file_name(&TaskId::map(3)), "part-m-00003");
        assert_eq!(part_file_name(&TaskId::reduce(12)), "part-r-00012");
    }

    #[test]
    fn test_normalize_location() {
        let expected = PathBuf::from("/out/a");
        for raw in ["/out/a", "/out/a/", " /out//a ", "/out/./a"] {
            assert_eq!(normalize_location(raw), expected, "{raw:?}");
        }
        assert_ne!(normalize_location("/out/a"), normalize_location("/out/b/../a"));
        assert_eq!(normalize_location("debug"), PathBuf::from("debug"));
    }
}
