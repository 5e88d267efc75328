//! Naming and housekeeping of recording files in the output folder.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};

/// Prefix of every raw recording file.
pub const RAW_PREFIX: &str = "screen_record_";
/// Extension of raw recordings.
pub const RAW_EXTENSION: &str = "mp4";
/// Suffix appended to the raw stem for the share-ready file.
pub const FINAL_SUFFIX: &str = "_twitter.mp4";

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Raw output path for a session started at `started_at`.
///
/// A numeric suffix is appended if a file with the same second-resolution
/// name already exists.
pub fn raw_output_path(dir: &Path, started_at: DateTime<Local>) -> PathBuf {
    let stem = format!("{RAW_PREFIX}{}", started_at.format(TIMESTAMP_FORMAT));
    let candidate = dir.join(format!("{stem}.{RAW_EXTENSION}"));
    if !candidate.exists() {
        return candidate;
    }
    (1u32..)
        .map(|n| dir.join(format!("{stem}_{n}.{RAW_EXTENSION}")))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

/// `<dir>/<raw stem>_twitter.mp4`.
pub fn finalized_path(raw: &Path) -> PathBuf {
    let stem = raw
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    raw.with_file_name(format!("{stem}{FINAL_SUFFIX}"))
}

/// Whether `name` looks like a file this recorder produced.
pub fn is_artifact_name(name: &str) -> bool {
    let raw = name.starts_with(RAW_PREFIX) && name.ends_with(&format!(".{RAW_EXTENSION}"));
    raw || name.ends_with(FINAL_SUFFIX)
}

fn artifact_entries(dir: &Path) -> Vec<(PathBuf, SystemTime)> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(dir = %dir.display(), error = %e, "Output folder not readable");
            return Vec::new();
        }
    };

    entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter(|entry| is_artifact_name(&entry.file_name().to_string_lossy()))
        .map(|entry| {
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (entry.path(), modified)
        })
        .collect()
}

/// Delete earlier recordings from `dir` (non-recursive).
///
/// Failures are logged per file and skipped. Returns how many files were
/// removed.
pub fn delete_previous_artifacts(dir: &Path) -> usize {
    let mut removed = 0;
    for (path, _) in artifact_entries(dir) {
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(path = %path.display(), "Removed previous recording");
                removed += 1;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove previous recording");
            }
        }
    }
    removed
}

/// Most recently modified recording in `dir`; share-ready files win ties.
pub fn latest_artifact(dir: &Path) -> Option<PathBuf> {
    artifact_entries(dir)
        .into_iter()
        .max_by_key(|(path, modified)| {
            let is_final = path
                .file_name()
                .map(|n| n.to_string_lossy().ends_with(FINAL_SUFFIX))
                .unwrap_or(false);
            (*modified, is_final)
        })
        .map(|(path, _)| path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"x").unwrap();
        path
    }

    #[test]
    fn raw_name_uses_start_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            raw_output_path(dir.path(), at),
            dir.path().join("screen_record_20240309_140507.mp4")
        );
    }

    #[test]
    fn raw_name_collision_gets_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        touch(dir.path(), "screen_record_20240309_140507.mp4");
        let path = raw_output_path(dir.path(), at);
        assert_eq!(path, dir.path().join("screen_record_20240309_140507_1.mp4"));
        assert!(is_artifact_name(&path.file_name().unwrap().to_string_lossy()));
    }

    #[test]
    fn finalized_name_sits_next_to_raw() {
        assert_eq!(
            finalized_path(Path::new("/out/screen_record_20240309_140507.mp4")),
            PathBuf::from("/out/screen_record_20240309_140507_twitter.mp4")
        );
    }

    #[test]
    fn only_matching_files_are_deleted() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "screen_record_20240101_000000.mp4");
        touch(dir.path(), "screen_record_20240101_000000_twitter.mp4");
        touch(dir.path(), "holiday_twitter.mp4");
        let keep_mkv = touch(dir.path(), "screen_record_20240101_000000.mkv");
        let keep_other = touch(dir.path(), "notes.mp4");
        fs::create_dir(dir.path().join("sub")).unwrap();
        let nested = touch(&dir.path().join("sub"), "screen_record_1.mp4");

        assert_eq!(delete_previous_artifacts(dir.path()), 3);
        assert!(keep_mkv.exists());
        assert!(keep_other.exists());
        assert!(nested.exists());
    }

    #[test]
    fn missing_folder_deletes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(delete_previous_artifacts(&dir.path().join("absent")), 0);
        assert_eq!(latest_artifact(&dir.path().join("absent")), None);
    }

    #[test]
    fn latest_prefers_share_ready_on_tie() {
        let dir = tempfile::tempdir().unwrap();
        let raw = touch(dir.path(), "screen_record_20240101_000000.mp4");
        let finished = touch(dir.path(), "screen_record_20240101_000000_twitter.mp4");
        let stamp = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000);
        for path in [&raw, &finished] {
            fs::File::options()
                .write(true)
                .open(path)
                .unwrap()
                .set_modified(stamp)
                .unwrap();
        }
        assert_eq!(latest_artifact(dir.path()), Some(finished));
    }
}
