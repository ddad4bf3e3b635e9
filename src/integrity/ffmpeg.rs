//! ffmpeg-based media probe
//!
//! Runs `ffmpeg -v error -i <file> -vn -c copy -f null -`: the audio stream is
//! demuxed and copied into a null sink while video is skipped entirely. At
//! error verbosity an intact file produces no output at all, so any
//! diagnostic text means the file is damaged.

use super::{FailureCause, IntegrityError, MediaProbe, Verdict};
use ffmpeg_sidecar::command::FfmpegCommand;
use std::ffi::OsString;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// How often the running probe is polled for completion
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Default time budget for a single probe run
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Settings for running the ffmpeg probe
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Path or name of the ffmpeg executable
    pub binary: PathBuf,
    /// Maximum run time of one probe; `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            binary: ffmpeg_sidecar::paths::ffmpeg_path(),
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }
}

/// Media probe backed by the ffmpeg executable
#[derive(Debug, Clone, Default)]
pub struct FfmpegProbe {
    config: ProbeConfig,
}

impl FfmpegProbe {
    /// Creates a new probe with the given configuration
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    /// Checks that the configured ffmpeg binary can be executed
    ///
    /// Meant to be called once before a batch, so a missing tool aborts the
    /// run instead of surfacing on the first file.
    pub fn ensure_available(&self) -> Result<(), IntegrityError> {
        let status = Command::new(&self.config.binary)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| self.environment_error(e))?;

        if !status.success() {
            return Err(self.environment_error(io::Error::other(format!(
                "`{} -version` exited with {}",
                self.config.binary.display(),
                status
            ))));
        }

        Ok(())
    }

    fn environment_error(&self, source: io::Error) -> IntegrityError {
        IntegrityError::Environment {
            binary: self.config.binary.clone(),
            source,
        }
    }

    /// Arguments for the audio-only copy check of `path`
    fn probe_args(path: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-nostdin", "-hide_banner", "-v", "error", "-i"]
            .iter()
            .map(OsString::from)
            .collect();
        args.push(path.as_os_str().to_os_string());
        args.extend(["-vn", "-c", "copy", "-f", "null", "-"].iter().map(OsString::from));
        args
    }

    /// The full command run for `path`
    ///
    /// ffmpeg-sidecar prepends its own `-loglevel`; the later `-v error`
    /// overrides it.
    fn probe_command(&self, path: &Path) -> FfmpegCommand {
        let mut command = FfmpegCommand::new_with_path(&self.config.binary);
        command.args(Self::probe_args(path));
        command
    }

    /// Turns the probe's exit code and stderr text into a verdict
    ///
    /// Diagnostics take precedence over the exit code since they name the
    /// problem. `exit_code` is `None` when the process was killed by a signal.
    fn classify(exit_code: Option<i32>, diagnostics: &str) -> Verdict {
        let diagnostics = diagnostics.trim();

        if !diagnostics.is_empty() {
            return Verdict::Fail(FailureCause::Diagnostics(diagnostics.to_string()));
        }

        match exit_code {
            Some(0) => Verdict::Pass,
            other => Verdict::Fail(FailureCause::DecoderExit(other)),
        }
    }
}

impl MediaProbe for FfmpegProbe {
    fn probe(&self, path: &Path) -> Result<Verdict, IntegrityError> {
        let probe_failed = |source: io::Error| IntegrityError::ProbeFailed {
            path: path.to_path_buf(),
            source,
        };

        let mut command = self.probe_command(path);
        tracing::debug!(
            "probing {} with {} {:?}",
            path.display(),
            self.config.binary.display(),
            command.get_args().collect::<Vec<_>>()
        );

        let mut child = command
            .spawn()
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    self.environment_error(e)
                } else {
                    probe_failed(e)
                }
            })?;

        let stderr = child
            .take_stderr()
            .ok_or_else(|| probe_failed(io::Error::other("probe stderr was not captured")))?;

        // Drain stderr on a helper thread so a chatty probe never blocks on a
        // full pipe while we poll for its exit.
        let reader = thread::spawn(move || read_diagnostics(stderr));

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.as_inner_mut().try_wait().map_err(probe_failed)? {
                break status;
            }

            if let Some(timeout) = self.config.timeout {
                if started.elapsed() >= timeout {
                    tracing::warn!("probe of {} timed out, killing ffmpeg", path.display());
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(IntegrityError::Timeout {
                        path: path.to_path_buf(),
                        timeout,
                    });
                }
            }

            thread::sleep(POLL_INTERVAL);
        };

        let diagnostics = reader
            .join()
            .map_err(|_| probe_failed(io::Error::other("stderr reader panicked")))?
            .map_err(probe_failed)?;
        let verdict = Self::classify(status.code(), &diagnostics);

        if let Verdict::Fail(cause) = &verdict {
            tracing::debug!("{} failed verification: {:?}", path.display(), cause);
        }

        Ok(verdict)
    }
}

/// Reads the probe's stderr to the end
fn read_diagnostics(mut stderr: impl Read) -> io::Result<String> {
    let mut buffer = Vec::new();
    stderr.read_to_end(&mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::file_resolver::MediaFile;
    use crate::integrity::verify_media;
    use crate::temp::create_temp_dir;
    use std::fs;

    /// Renders a short silent clip with ffmpeg's lavfi sources
    ///
    /// Returns `None` when ffmpeg is not installed, so callers can skip.
    pub(crate) fn make_fixture(dir: &Path, name: &str, seconds: u32) -> Option<PathBuf> {
        if !ffmpeg_sidecar::command::ffmpeg_is_installed() {
            eprintln!("ffmpeg not installed, skipping");
            return None;
        }

        let output = dir.join(name);
        let status = Command::new(ffmpeg_sidecar::paths::ffmpeg_path())
            .args(["-nostdin", "-v", "error", "-y"])
            .args(["-f", "lavfi", "-i", "anullsrc=r=44100:cl=mono"])
            .args(["-f", "lavfi", "-i", "color=c=black:s=64x64:r=10"])
            .arg("-t")
            .arg(seconds.to_string())
            .args(["-c:v", "mpeg4", "-c:a", "aac"])
            .arg(&output)
            .status()
            .unwrap();
        assert!(status.success(), "fixture generation failed");

        Some(output)
    }

    /// Writes the first half of `source`'s bytes to `dir/name`
    pub(crate) fn truncate_copy(source: &Path, dir: &Path, name: &str) -> PathBuf {
        let bytes = fs::read(source).unwrap();
        let output = dir.join(name);
        fs::write(&output, &bytes[..bytes.len() / 2]).unwrap();
        output
    }

    /// Writes an executable shell script that takes ffmpeg's place
    #[cfg(unix)]
    pub(crate) fn stand_in_ffmpeg(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "#!/bin/sh").unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file.sync_all().unwrap();
        drop(file);
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// Stand-in body that fails inputs not ending in `END`, like ffmpeg on a
    /// truncated container
    #[cfg(unix)]
    pub(crate) const TAIL_CHECK: &str = r#"
while [ $# -gt 0 ]; do
    if [ "$1" = "-i" ]; then input="$2"; fi
    shift
done
if [ "$(tail -c 3 "$input")" != "END" ]; then
    echo "$input: partial file" >&2
    exit 1
fi
"#;

    #[cfg(unix)]
    fn with_stand_in(binary: PathBuf, timeout: Duration) -> FfmpegProbe {
        FfmpegProbe::new(ProbeConfig {
            binary,
            timeout: Some(timeout),
        })
    }

    #[test]
    fn test_probe_command_args() {
        let probe = FfmpegProbe::new(ProbeConfig {
            binary: PathBuf::from("ffmpeg"),
            timeout: None,
        });
        let command = probe.probe_command(Path::new("/media/a b.mp4"));
        let args: Vec<_> = command
            .get_args()
            .map(|a| a.to_str().unwrap().to_string())
            .collect();

        let expected = [
            "-nostdin",
            "-hide_banner",
            "-v",
            "error",
            "-i",
            "/media/a b.mp4",
            "-vn",
            "-c",
            "copy",
            "-f",
            "null",
            "-",
        ];
        assert!(
            args.ends_with(&expected.map(String::from)),
            "unexpected command line: {:?}",
            args
        );
        assert!(!args.contains(&"-n".to_string()));
    }

    #[test]
    fn test_read_diagnostics_propagates_errors() {
        struct Broken;

        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("pipe broke"))
            }
        }

        assert!(read_diagnostics(Broken).is_err());
        assert_eq!(
            read_diagnostics(&b"partial file\n"[..]).unwrap(),
            "partial file\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_silent_clean_exit_passes() {
        let dir = create_temp_dir("stand_in_silent").unwrap();
        let file = dir.join("episode.mp4");
        fs::write(&file, b"content").unwrap();
        let binary = stand_in_ffmpeg(&dir, "ffmpeg", "exit 0\n");

        let probe = with_stand_in(binary, Duration::from_secs(10));

        assert_eq!(probe.probe(&file).unwrap(), Verdict::Pass);
        assert_eq!(probe.probe(&file).unwrap(), Verdict::Pass);
    }

    #[cfg(unix)]
    #[test]
    fn test_diagnostics_fail_despite_clean_exit() {
        let dir = create_temp_dir("stand_in_noisy").unwrap();
        let file = dir.join("episode.mp4");
        fs::write(&file, b"content").unwrap();
        let binary = stand_in_ffmpeg(
            &dir,
            "ffmpeg",
            "echo 'episode.mp4: partial file' >&2\nexit 0\n",
        );

        let probe = with_stand_in(binary, Duration::from_secs(10));

        assert_eq!(
            probe.probe(&file).unwrap(),
            Verdict::Fail(FailureCause::Diagnostics(
                "episode.mp4: partial file".to_string()
            ))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_silent_nonzero_exit_fails() {
        let dir = create_temp_dir("stand_in_exit").unwrap();
        let file = dir.join("episode.mp4");
        fs::write(&file, b"content").unwrap();
        let binary = stand_in_ffmpeg(&dir, "ffmpeg", "exit 1\n");

        let probe = with_stand_in(binary, Duration::from_secs(10));

        assert_eq!(
            probe.probe(&file).unwrap(),
            Verdict::Fail(FailureCause::DecoderExit(Some(1)))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_large_diagnostics_do_not_block() {
        let dir = create_temp_dir("stand_in_chatty").unwrap();
        let file = dir.join("episode.mp4");
        fs::write(&file, b"content").unwrap();
        let binary = stand_in_ffmpeg(
            &dir,
            "ffmpeg",
            "head -c 2000000 /dev/zero | tr '\\0' 'x' >&2\nexit 0\n",
        );

        let probe = with_stand_in(binary, Duration::from_secs(30));

        match probe.probe(&file).unwrap() {
            Verdict::Fail(FailureCause::Diagnostics(text)) => assert_eq!(text.len(), 2_000_000),
            other => panic!("expected diagnostics failure, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_hanging_ffmpeg_times_out() {
        let dir = create_temp_dir("stand_in_hang").unwrap();
        let file = dir.join("episode.mp4");
        fs::write(&file, b"content").unwrap();
        let binary = stand_in_ffmpeg(&dir, "ffmpeg", "exec sleep 30\n");

        let probe = with_stand_in(binary, Duration::from_millis(300));
        let started = Instant::now();
        let result = probe.probe(&file);

        assert!(matches!(result, Err(IntegrityError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn test_truncated_copy_fails_with_tail_check() {
        let dir = create_temp_dir("stand_in_truncated").unwrap();
        let complete = dir.join("complete.mp4");
        fs::write(&complete, b"header payload payload END").unwrap();
        let truncated = truncate_copy(&complete, &dir, "truncated.mp4");
        let binary = stand_in_ffmpeg(&dir, "ffmpeg", TAIL_CHECK);

        let probe = with_stand_in(binary, Duration::from_secs(10));

        assert_eq!(probe.probe(&complete).unwrap(), Verdict::Pass);
        assert!(matches!(
            probe.probe(&truncated).unwrap(),
            Verdict::Fail(FailureCause::Diagnostics(_))
        ));
    }

    #[test]
    fn test_classify() {
        assert_eq!(FfmpegProbe::classify(Some(0), ""), Verdict::Pass);
        assert_eq!(FfmpegProbe::classify(Some(0), "  \n"), Verdict::Pass);

        assert_eq!(
            FfmpegProbe::classify(Some(0), "[mov] stream 1, offset 0x30: partial file\n"),
            Verdict::Fail(FailureCause::Diagnostics(
                "[mov] stream 1, offset 0x30: partial file".to_string()
            ))
        );
        assert_eq!(
            FfmpegProbe::classify(Some(1), ""),
            Verdict::Fail(FailureCause::DecoderExit(Some(1)))
        );
        assert_eq!(
            FfmpegProbe::classify(None, ""),
            Verdict::Fail(FailureCause::DecoderExit(None))
        );
    }

    #[test]
    fn test_missing_binary_is_environment_error() {
        let dir = create_temp_dir("probe_missing_binary").unwrap();
        let file = dir.join("episode.mp4");
        fs::write(&file, b"not really media").unwrap();

        let probe = FfmpegProbe::new(ProbeConfig {
            binary: PathBuf::from("/nonexistent/bin/ffmpeg"),
            timeout: Some(Duration::from_secs(5)),
        });

        assert!(matches!(
            probe.ensure_available(),
            Err(IntegrityError::Environment { .. })
        ));
        assert!(matches!(
            probe.probe(&file),
            Err(IntegrityError::Environment { .. })
        ));
    }

    #[test]
    fn test_complete_file_passes() {
        let dir = create_temp_dir("probe_complete").unwrap();
        let Some(valid) = make_fixture(&dir, "valid.mp4", 10) else {
            return;
        };

        let probe = FfmpegProbe::default();
        probe.ensure_available().unwrap();

        let media = MediaFile::new(&valid);
        let first = verify_media(&probe, &media, None).unwrap();
        let second = verify_media(&probe, &media, None).unwrap();

        assert_eq!(first, Verdict::Pass);
        assert_eq!(first, second);
    }

    #[test]
    fn test_truncated_and_empty_files_fail() {
        let dir = create_temp_dir("probe_truncated").unwrap();
        let Some(valid) = make_fixture(&dir, "valid.mp4", 10) else {
            return;
        };
        let truncated = truncate_copy(&valid, &dir, "truncated.mp4");
        let empty = dir.join("empty.mp4");
        fs::write(&empty, b"").unwrap();

        let probe = FfmpegProbe::default();

        // Probe directly so the empty-file shortcut in verify_media is bypassed.
        assert!(!probe.probe(&truncated).unwrap().is_pass());
        assert!(!probe.probe(&empty).unwrap().is_pass());
        assert!(!verify_media(&probe, &MediaFile::new(&truncated), None)
            .unwrap()
            .is_pass());
    }

    #[test]
    fn test_timeout_kills_probe() {
        let dir = create_temp_dir("probe_timeout").unwrap();
        let Some(valid) = make_fixture(&dir, "valid.mp4", 10) else {
            return;
        };

        let probe = FfmpegProbe::new(ProbeConfig {
            timeout: Some(Duration::ZERO),
            ..ProbeConfig::default()
        });

        assert!(matches!(
            probe.probe(&valid),
            Err(IntegrityError::Timeout { .. })
        ));
    }
}
