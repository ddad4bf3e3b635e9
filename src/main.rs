use clap::{Parser, Subcommand};
use humansize::{DECIMAL, format_size};
use pbskids_archive::{
    ArchiveConfig, DEFAULT_API_BASE, FfmpegProbe, ProbeConfig, ProgressEvent, ResumeOutcome,
    RetryPolicy, archive_show, logging, verify_path,
};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

/// Archive PBS Kids episodes and verify downloaded media
#[derive(Debug, Parser)]
#[command(name = "pbskids-archive", version, long_about = None)]
struct Cli {
    /// Print debug logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the ffmpeg executable
    #[arg(long, global = true, value_name = "PATH")]
    ffmpeg: Option<PathBuf>,

    /// Seconds a single integrity probe may run, 0 for no limit
    #[arg(long, global = true, value_name = "SECS", default_value_t = 600)]
    probe_timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Verify a media file, or every media file in a directory
    Verify {
        /// File or directory to verify
        path: PathBuf,

        /// Print a JSON object mapping each file to "pass" or "fail"
        #[arg(long)]
        json: bool,
    },

    /// Download a show's episodes, captions and episode records
    Download {
        /// Show identifier as used by pbskids.org, e.g. "peg-cat"
        show: String,

        /// Directory below which the show folder is created
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        output: PathBuf,

        /// Maximum downloads per episode, including the first
        #[arg(long, value_name = "N", default_value_t = 2)]
        max_attempts: u32,

        /// Seconds to wait before downloading a damaged file again
        #[arg(long, value_name = "SECS", default_value_t = 0)]
        retry_delay: u64,

        /// Seconds a single transfer may take, 0 for no limit
        #[arg(long, value_name = "SECS", default_value_t = 3600)]
        transfer_timeout: u64,

        /// Skip caption files
        #[arg(long)]
        no_captions: bool,

        /// Base URL of the content API
        #[arg(long, value_name = "URL", default_value = DEFAULT_API_BASE)]
        api_base: String,
    },
}

fn seconds(value: u64) -> Option<Duration> {
    (value > 0).then(|| Duration::from_secs(value))
}

/// Handles progress events and prints formatted output to stdout
fn handle_progress_event(event: ProgressEvent) {
    match event {
        ProgressEvent::VerifyStarted {
            target,
            file_count,
            directory_mode,
        } => {
            if directory_mode {
                println!("Verifying {} media file(s) in {}", file_count, target.display());
            }
        }
        ProgressEvent::VerifyingFile { index, total, path } => {
            if total > 1 {
                println!("[{}/{}] {}", index + 1, total, path.display());
            }
        }
        ProgressEvent::FileVerified { path, verdict } => {
            println!("{}: {}", path.display(), verdict.label());
        }
        ProgressEvent::VerifyComplete { passed, failed } => {
            println!("\n{} passed, {} failed", passed, failed);
        }
        ProgressEvent::FetchingEpisodes { show_slug } => {
            println!("Fetching episode list for '{}'...", show_slug);
        }
        ProgressEvent::EpisodesFound { show_name, count } => {
            println!("Found {} episode(s) of {}\n", count, show_name);
        }
        ProgressEvent::ProcessingEpisode {
            index,
            total,
            title,
        } => {
            println!("[{}/{}] {}", index + 1, total, title);
        }
        ProgressEvent::MissingMediaUrl { .. } => {
            println!("  No video listed, skipping");
        }
        ProgressEvent::CheckingExisting { .. } => {
            println!("  Verifying existing file...");
        }
        ProgressEvent::VerificationFailed { path, cause } => {
            println!("  Damaged ({}), removing {}", cause, path.display());
        }
        ProgressEvent::Downloading { attempt, .. } => {
            if attempt > 1 {
                println!("  Downloading (attempt {})...", attempt);
            } else {
                println!("  Downloading...");
            }
        }
        ProgressEvent::DownloadProgress {
            downloaded, total, ..
        } => match total {
            Some(total) if total > 0 => println!(
                "  {} / {} ({}%)",
                format_size(downloaded, DECIMAL),
                format_size(total, DECIMAL),
                downloaded * 100 / total
            ),
            _ => println!("  {}", format_size(downloaded, DECIMAL)),
        },
        ProgressEvent::GaveUp { attempts, .. } => {
            println!("  Still damaged after {} download(s), giving up", attempts);
        }
        ProgressEvent::MediaReady { path, outcome } => match outcome {
            ResumeOutcome::Kept => println!("  Already complete: {}", path.display()),
            ResumeOutcome::Downloaded { .. } => println!("  Saved {}", path.display()),
            ResumeOutcome::Exhausted { .. } => {}
        },
        ProgressEvent::CaptionSaved { format, .. } => {
            println!("  Captions saved ({})", format);
        }
        ProgressEvent::CaptionPresent { .. } => {
            println!("  Captions already present");
        }
        ProgressEvent::NoCaption { .. } => {
            println!("  No captions in a supported format");
        }
        ProgressEvent::ArchiveComplete {
            kept,
            downloaded,
            exhausted,
            skipped,
        } => {
            println!(
                "\nDone: {} downloaded, {} already complete, {} failed, {} without video",
                downloaded, kept, exhausted, skipped
            );
        }
    }
}

fn run_verify(path: PathBuf, json: bool, probe_config: ProbeConfig) {
    let probe = FfmpegProbe::new(probe_config);

    if let Err(e) = probe.ensure_available() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    let result = verify_path(&path, &probe, |event| {
        if !json {
            handle_progress_event(event);
        }
    });

    match result {
        Ok(report) => {
            if json {
                match report.to_json() {
                    Ok(output) => println!("{}", output),
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        process::exit(1);
                    }
                }
            }

            if !report.failures().is_empty() {
                if !json && report.directory_mode {
                    println!("\nDamaged files:");
                    for path in report.failures() {
                        println!("  {}", path.display());
                    }
                }
                process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn run_download(show: &str, config: ArchiveConfig) {
    match archive_show(show, &config, handle_progress_event) {
        Ok(report) => {
            if report.exhausted() > 0 {
                process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("\nError while archiving: {}", e);
            process::exit(1);
        }
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let probe_config = ProbeConfig {
        binary: cli
            .ffmpeg
            .unwrap_or_else(|| ProbeConfig::default().binary),
        timeout: seconds(cli.probe_timeout),
    };

    match cli.command {
        Command::Verify { path, json } => run_verify(path, json, probe_config),
        Command::Download {
            show,
            output,
            max_attempts,
            retry_delay,
            transfer_timeout,
            no_captions,
            api_base,
        } => {
            let mut config = ArchiveConfig::new(output);
            config.api_base = api_base;
            config.probe = probe_config;
            config.retry = RetryPolicy {
                max_attempts: max_attempts.max(1),
                delay: Duration::from_secs(retry_delay),
            };
            config.transfer_timeout = seconds(transfer_timeout);
            config.captions = !no_captions;

            tracing::debug!("archive config: {:?}", config);
            run_download(&show, config);
        }
    }
}
