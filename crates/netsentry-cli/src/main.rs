//! netsentry command-line interface.
//!
//! This binary runs the intrusion-detection pipeline over a capture
//! file (`-r`) or a live interface (`-i`). It is a thin wrapper over
//! the `netsentry-core` engine: source selection, stage toggles, export
//! paths, and signal handling live here; everything else is the
//! library's business.
//!
//! Typical usage:
//! - `netsentry -r capture.pcap`
//! - `netsentry -i eth0 --publish 127.0.0.1:5555`
//! - `netsentry -r capture.pcap --features-csv flows.csv --no-rules`
//!
//! Errors are reported to stderr; a non-zero exit code indicates a
//! fatal startup failure (bad interface, missing file, unbindable
//! endpoint, unopenable alert log). Ctrl-C drains the pipeline and
//! exits cleanly with the final statistics block.
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use netsentry_core::{
    DEFAULT_ENDPOINT, EngineConfig, FrameSource, LiveSource, PcapFileSource, PipelineReport,
    ShutdownFlag, run_pipeline,
};

#[derive(Parser, Debug)]
#[command(name = "netsentry")]
#[command(
    version = concat!(
        env!("CARGO_PKG_VERSION"),
        " (commit ",
        env!("NETSENTRY_BUILD_COMMIT"),
        ", built ",
        env!("NETSENTRY_BUILD_DATE"),
        ")"
    )
)]
#[command(
    about = "Signature-based network intrusion detection over live or captured traffic.",
    long_about = None,
    after_help = "Examples:\n  netsentry -r capture.pcap\n  netsentry -i eth0 --publish 127.0.0.1:5555\n  netsentry -r capture.pcap --features-csv flows.csv --no-rules"
)]
struct Cli {
    /// Read frames from a PCAP/PCAPNG capture file
    #[arg(
        short = 'r',
        long = "read-file",
        value_name = "FILE",
        conflicts_with = "interface",
        required_unless_present = "interface"
    )]
    read_file: Option<PathBuf>,

    /// Capture live from a network interface (needs capture privileges)
    #[arg(short = 'i', long = "interface", value_name = "IFACE")]
    interface: Option<String>,

    /// Skip HTTP/DNS application decoding
    #[arg(long)]
    no_decode: bool,

    /// Skip connection tracking (implies no feature extraction)
    #[arg(long)]
    no_track: bool,

    /// Skip feature extraction
    #[arg(long)]
    no_features: bool,

    /// Skip signature rule evaluation
    #[arg(long)]
    no_rules: bool,

    /// Export one feature vector per tracked packet as CSV
    #[arg(long, value_name = "FILE")]
    features_csv: Option<PathBuf>,

    /// Publish feature JSON on a TCP pub/sub endpoint
    #[arg(
        long,
        value_name = "ADDR",
        num_args = 0..=1,
        default_missing_value = DEFAULT_ENDPOINT
    )]
    publish: Option<String>,

    /// Append alerts to this JSONL file
    #[arg(long, value_name = "FILE", default_value = "alerts.jsonl")]
    alert_log: PathBuf,

    /// Keep alerts on stdout only
    #[arg(long)]
    no_alert_log: bool,

    /// Statistics print interval in seconds (live capture)
    #[arg(long, value_name = "SECS", default_value_t = 5.0)]
    stats_interval: f64,

    /// Suppress periodic statistics output
    #[arg(long)]
    quiet: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err.message);
            if let Some(hint) = err.hint {
                eprintln!("hint: {}", hint);
            }
            ExitCode::from(2)
        }
    }
}

#[derive(Debug)]
struct CliError {
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            message: message.into(),
            hint,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::new(err.to_string(), None)
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let live = cli.interface.is_some();
    let config = EngineConfig {
        decode_protocols: !cli.no_decode,
        track_connections: !cli.no_track,
        extract_features: !cli.no_track && !cli.no_features,
        evaluate_rules: !cli.no_rules,
        stats_interval_secs: cli.stats_interval,
        periodic_stats: live && !cli.quiet,
        publish_endpoint: cli.publish.clone(),
        features_csv: cli.features_csv.clone(),
        alert_log: (!cli.no_alert_log).then(|| cli.alert_log.clone()),
        ..EngineConfig::default()
    };

    let shutdown = ShutdownFlag::new();
    install_signal_handler(&shutdown)?;

    let report = match (&cli.read_file, &cli.interface) {
        (Some(path), None) => {
            validate_input_file(path)?;
            let source = PcapFileSource::open(path).map_err(|err| {
                CliError::new(
                    format!("cannot open capture file: {err}"),
                    Some("use a .pcap or .pcapng file".to_string()),
                )
            })?;
            run_source(source, &config, &shutdown)?
        }
        (None, Some(interface)) => {
            let source = LiveSource::open(interface, shutdown.clone()).map_err(|err| {
                CliError::new(
                    format!("cannot open interface: {err}"),
                    Some("check the interface name and capture privileges".to_string()),
                )
            })?;
            run_source(source, &config, &shutdown)?
        }
        // clap enforces exactly one source.
        _ => {
            return Err(CliError::new(
                "exactly one of --read-file and --interface is required",
                Some("pass -r <FILE> or -i <IFACE>".to_string()),
            ));
        }
    };

    if !cli.quiet {
        println!("{}", report.stats.render());
        eprintln!(
            "OK: {} packets, {} alerts, {} flows still active",
            report.stats.total_packets, report.stats.alerts_total, report.active_flows
        );
    }
    Ok(())
}

fn run_source<S: FrameSource>(
    source: S,
    config: &EngineConfig,
    shutdown: &ShutdownFlag,
) -> Result<PipelineReport, CliError> {
    run_pipeline(source, config, shutdown)
        .map_err(|err| CliError::new(format!("pipeline failed: {err}"), None))
}

fn install_signal_handler(shutdown: &ShutdownFlag) -> Result<(), CliError> {
    let flag = shutdown.clone();
    ctrlc::set_handler(move || {
        log::info!("shutdown requested");
        flag.trigger();
    })
    .context("failed to install signal handler")
    .map_err(CliError::from)
}

fn validate_input_file(input: &Path) -> Result<(), CliError> {
    if !input.exists() {
        return Err(CliError::new(
            format!("input file not found: {}", input.display()),
            Some("use a .pcap or .pcapng file".to_string()),
        ));
    }
    let ext = input
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    if ext != "pcap" && ext != "pcapng" {
        return Err(CliError::new(
            format!("unsupported input format '{}'", input.display()),
            Some("expected a .pcap or .pcapng file".to_string()),
        ));
    }
    Ok(())
}
