//! Post-processing of a closed recording into a share-ready file.
//!
//! The transcoder shells out to `ffprobe` and `ffmpeg`. It never fails the
//! session: if anything goes wrong the raw recording is the artifact.

use std::path::{Path, PathBuf};
use std::process::Command;

use reelcap_common::error::{ReelcapError, ReelcapResult};
use serde::Serialize;

use crate::artifacts::finalized_path;

/// Duration assumed when the probe fails.
pub const FALLBACK_DURATION_SECS: f64 = 10.0;

/// The file a session ultimately produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputArtifact {
    pub raw_path: PathBuf,
    /// Share-ready file, or the raw path if transcoding did not happen.
    pub final_path: PathBuf,
    pub duration_secs: f64,
    pub transcoded: bool,
}

/// Turns a closed raw recording into the session's artifact.
pub trait PostProcessor: Send + Sync {
    fn finalize(&self, raw: &Path) -> OutputArtifact;

    fn name(&self) -> &str;
}

/// Re-encodes to baseline H.264 with a silent stereo AAC track.
#[derive(Debug, Clone)]
pub struct Transcoder {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Default for Transcoder {
    fn default() -> Self {
        Self::with_programs("ffmpeg", "ffprobe")
    }
}

impl Transcoder {
    pub fn with_programs(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Whether both tools can be found on `PATH` (or at their configured paths).
    pub fn is_available(&self) -> bool {
        command_exists(&self.ffmpeg) && command_exists(&self.ffprobe)
    }

    /// Container duration in seconds, or [`FALLBACK_DURATION_SECS`] if the
    /// probe fails or reports a non-positive value.
    pub fn probe_duration(&self, path: &Path) -> f64 {
        match self.try_probe_duration(path) {
            Ok(secs) => secs,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    fallback = FALLBACK_DURATION_SECS,
                    "Duration probe failed"
                );
                FALLBACK_DURATION_SECS
            }
        }
    }

    fn try_probe_duration(&self, path: &Path) -> ReelcapResult<f64> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .output()
            .map_err(|e| ReelcapError::transcode(format!("Failed to start ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(ReelcapError::transcode(format!(
                "ffprobe exited with {}",
                output.status
            )));
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        let line = raw.lines().next().unwrap_or_default().trim();
        let secs: f64 = line
            .parse()
            .map_err(|_| ReelcapError::transcode(format!("Unparsable duration {line:?}")))?;
        if !secs.is_finite() || secs <= 0.0 {
            return Err(ReelcapError::transcode(format!(
                "Non-positive duration {secs}"
            )));
        }
        Ok(secs)
    }

    fn transcode_args(raw: &Path, out: &Path, duration_secs: f64) -> Vec<String> {
        vec![
            "-y".into(),
            "-i".into(),
            raw.to_string_lossy().into_owned(),
            "-f".into(),
            "lavfi".into(),
            "-t".into(),
            format!("{duration_secs}"),
            "-i".into(),
            "anullsrc=channel_layout=stereo:sample_rate=44100".into(),
            "-shortest".into(),
            "-vcodec".into(),
            "libx264".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-profile:v".into(),
            "baseline".into(),
            "-level".into(),
            "3.0".into(),
            "-acodec".into(),
            "aac".into(),
            "-b:a".into(),
            "128k".into(),
            out.to_string_lossy().into_owned(),
        ]
    }

    fn transcode(&self, raw: &Path, out: &Path, duration_secs: f64) -> ReelcapResult<()> {
        let args = Self::transcode_args(raw, out, duration_secs);
        tracing::debug!(?args, "Running ffmpeg");

        let output = Command::new(&self.ffmpeg)
            .args(&args)
            .output()
            .map_err(|e| ReelcapError::transcode(format!("Failed to start ffmpeg: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            return Err(ReelcapError::transcode(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                tail.into_iter().rev().collect::<Vec<_>>().join(" | ")
            )));
        }
        Ok(())
    }
}

impl PostProcessor for Transcoder {
    fn finalize(&self, raw: &Path) -> OutputArtifact {
        let duration_secs = self.probe_duration(raw);
        let out = finalized_path(raw);

        match self.transcode(raw, &out, duration_secs) {
            Ok(()) => {
                tracing::info!(
                    raw = %raw.display(),
                    output = %out.display(),
                    duration_secs,
                    "Recording converted"
                );
                OutputArtifact {
                    raw_path: raw.to_path_buf(),
                    final_path: out,
                    duration_secs,
                    transcoded: true,
                }
            }
            Err(e) => {
                tracing::warn!(
                    raw = %raw.display(),
                    error = %e,
                    "Conversion failed; keeping raw recording"
                );
                if out.exists() {
                    if let Err(e) = std::fs::remove_file(&out) {
                        tracing::debug!(path = %out.display(), error = %e, "Failed to remove partial output");
                    }
                }
                OutputArtifact {
                    raw_path: raw.to_path_buf(),
                    final_path: raw.to_path_buf(),
                    duration_secs,
                    transcoded: false,
                }
            }
        }
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

/// Keeps the raw recording as the artifact.
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

impl PostProcessor for Passthrough {
    fn finalize(&self, raw: &Path) -> OutputArtifact {
        OutputArtifact {
            raw_path: raw.to_path_buf(),
            final_path: raw.to_path_buf(),
            duration_secs: FALLBACK_DURATION_SECS,
            transcoded: false,
        }
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}

/// Whether `program` resolves to an executable.
pub fn command_exists(program: &Path) -> bool {
    if program.components().count() > 1 {
        return program.is_file();
    }
    Command::new("sh")
        .arg("-c")
        .arg(format!(
            "command -v '{}' >/dev/null 2>&1",
            program.to_string_lossy().replace('\'', "")
        ))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
        path
    }

    #[test]
    fn args_follow_share_profile() {
        let args = Transcoder::transcode_args(Path::new("in.mp4"), Path::new("out.mp4"), 12.5);
        let joined = args.join(" ");
        assert!(joined.starts_with("-y -i in.mp4 -f lavfi -t 12.5 -i anullsrc"));
        assert!(joined.contains("-profile:v baseline -level 3.0"));
        assert!(joined.ends_with("-acodec aac -b:a 128k out.mp4"));
    }

    #[test]
    fn probe_falls_back_when_tool_fails() {
        let dir = tempfile::tempdir().unwrap();
        let bad = script(dir.path(), "ffprobe", "exit 1");
        let zero = script(dir.path(), "ffprobe0", "echo 0.0");
        let junk = script(dir.path(), "ffprobe-junk", "echo N/A");

        for probe in [bad, zero, junk] {
            let transcoder = Transcoder::with_programs("ffmpeg", probe);
            assert_eq!(
                transcoder.probe_duration(Path::new("missing.mp4")),
                FALLBACK_DURATION_SECS
            );
        }
        let missing = Transcoder::with_programs("ffmpeg", dir.path().join("nope"));
        assert_eq!(
            missing.probe_duration(Path::new("missing.mp4")),
            FALLBACK_DURATION_SECS
        );
    }

    #[test]
    fn probe_reads_reported_duration() {
        let dir = tempfile::tempdir().unwrap();
        let probe = script(dir.path(), "ffprobe", "echo 3.250000");
        let transcoder = Transcoder::with_programs("ffmpeg", probe);
        assert_eq!(transcoder.probe_duration(Path::new("x.mp4")), 3.25);
    }

    #[test]
    fn failed_conversion_returns_raw_path() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("screen_record_20240101_000000.mp4");
        fs::write(&raw, b"raw").unwrap();
        let probe = script(dir.path(), "ffprobe", "echo 2.0");
        let ffmpeg = script(dir.path(), "ffmpeg", "exit 1");

        let artifact = Transcoder::with_programs(ffmpeg, probe).finalize(&raw);
        assert_eq!(artifact.final_path, raw);
        assert!(!artifact.transcoded);
        assert!(raw.exists());
    }

    #[test]
    fn successful_conversion_points_at_share_ready_file() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("screen_record_20240101_000000.mp4");
        fs::write(&raw, b"raw").unwrap();
        let probe = script(dir.path(), "ffprobe", "echo 2.0");
        // The output path is the last argument.
        let ffmpeg = script(dir.path(), "ffmpeg", "for last; do :; done; echo ok > \"$last\"");

        let artifact = Transcoder::with_programs(ffmpeg, probe).finalize(&raw);
        let expected = dir.path().join("screen_record_20240101_000000_twitter.mp4");
        assert_eq!(artifact.final_path, expected);
        assert!(artifact.transcoded);
        assert_eq!(artifact.duration_secs, 2.0);
        assert!(expected.exists());
    }

    #[test]
    fn command_exists_checks_paths_and_path_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let tool = script(dir.path(), "tool", "exit 0");
        assert!(command_exists(&tool));
        assert!(!command_exists(&dir.path().join("absent")));
        assert!(command_exists(Path::new("sh")));
    }

    #[test]
    fn passthrough_keeps_raw_file() {
        let artifact = Passthrough.finalize(Path::new("/tmp/screen_record_20240101_000000.mp4"));
        assert_eq!(artifact.final_path, artifact.raw_path);
        assert!(!artifact.transcoded);
        assert_eq!(artifact.duration_secs, FALLBACK_DURATION_SECS);
    }
}
