use clap::Parser;
use dstat_probe::config::{
    OutputFormat, Settings, DEFAULT_INTERVAL_SECS, OPTS_PROPERTY, PATH_PROPERTY,
};
use dstat_probe::report::ReportWriter;
use dstat_probe::{BenchmarkProbe, DStatProbe, ProbeConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Run dstat alongside a workload and print the parsed samples:
/// start the probe, drain it on a fixed cadence, stop it cleanly.
#[derive(Parser, Debug)]
#[command(name = "dstat-probe", version, about)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "dstat-probe.toml")]
    config: PathBuf,

    /// dstat executable (overrides config)
    #[arg(long)]
    path: Option<String>,

    /// dstat options, whitespace separated (overrides config)
    #[arg(long, allow_hyphen_values = true)]
    opts: Option<String>,

    /// Seconds between collections (overrides config)
    #[arg(short, long)]
    interval: Option<u64>,

    /// Seconds to run, 0 runs until Ctrl-C (overrides config)
    #[arg(short, long)]
    duration: Option<u64>,

    /// Output format (overrides config)
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Print the resolved dstat command line and exit
    #[arg(long)]
    dry_run: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Only warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

/// Merge CLI flags over the loaded settings.
fn apply_overrides(settings: &mut Settings, cli: &Cli) {
    if let Some(path) = &cli.path {
        settings
            .properties
            .insert(PATH_PROPERTY.to_string(), path.clone());
    }
    if let Some(opts) = &cli.opts {
        settings
            .properties
            .insert(OPTS_PROPERTY.to_string(), opts.clone());
    }
    if let Some(interval) = cli.interval {
        settings.collect.interval_secs = interval;
    }
    if let Some(duration) = cli.duration {
        settings.collect.duration_secs = duration;
    }
    if let Some(format) = cli.format {
        settings.collect.format = format;
    }
}

/// Cadence for draining the probe. Zero is not a usable interval.
fn collection_interval(interval_secs: u64) -> Duration {
    if interval_secs == 0 {
        tracing::warn!(
            default_secs = DEFAULT_INTERVAL_SECS,
            "interval_secs = 0 is not a valid collection interval, using default"
        );
        return Duration::from_secs(DEFAULT_INTERVAL_SECS);
    }
    Duration::from_secs(interval_secs)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    tracing::debug!(?cli, "parsed CLI arguments");

    let mut settings = match Settings::load(&cli.config) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    apply_overrides(&mut settings, &cli);

    let cfg = ProbeConfig::new(settings.properties.clone());
    if cli.dry_run {
        println!("{} {}", cfg.dstat_path(), cfg.dstat_opts().join(" "));
        return ExitCode::SUCCESS;
    }

    let collect = &settings.collect;
    let probe = DStatProbe::new().with_stop_timeout(Duration::from_secs(collect.stop_timeout_secs));
    if let Err(e) = probe.start(cfg).await {
        tracing::error!("{e}");
        return ExitCode::FAILURE;
    }

    let mut writer = ReportWriter::new(std::io::stdout(), collect.format);
    if let Err(e) = writer.write_header(&probe.meta_info()) {
        tracing::error!(error = %e, "failed to write header");
        probe.stop().await;
        return ExitCode::FAILURE;
    }

    let mut ticker = tokio::time::interval(collection_interval(collect.interval_secs));
    // The first tick completes immediately
    ticker.tick().await;

    let duration_secs = collect.duration_secs;
    let deadline = async move {
        if duration_secs == 0 {
            std::future::pending::<()>().await;
        } else {
            tokio::time::sleep(Duration::from_secs(duration_secs)).await;
        }
    };
    tokio::pin!(deadline);

    // One listener for the whole run so a Ctrl-C during a write is not missed
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    let mut status = ExitCode::SUCCESS;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = writer.write_samples(&probe.points()) {
                    tracing::error!(error = %e, "failed to write samples");
                    status = ExitCode::FAILURE;
                    break;
                }
            }
            _ = &mut deadline => {
                tracing::info!(duration_secs, "collection finished");
                break;
            }
            _ = &mut interrupted => {
                tracing::info!("interrupted, stopping probe");
                break;
            }
        }
    }

    probe.stop().await;
    // Samples ingested between the last tick and stop
    if let Err(e) = writer.write_samples(&probe.points()) {
        tracing::warn!(error = %e, "failed to write final samples");
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_settings() {
        let cli = Cli::parse_from([
            "dstat-probe",
            "--path",
            "/usr/bin/dstat",
            "--opts",
            "-c --noheaders 2",
            "--interval",
            "2",
            "--duration",
            "60",
            "--format",
            "json",
        ]);
        let mut settings = Settings::default();
        apply_overrides(&mut settings, &cli);

        let cfg = ProbeConfig::new(settings.properties.clone());
        assert_eq!(cfg.dstat_path(), "/usr/bin/dstat");
        assert_eq!(cfg.dstat_opts(), vec!["-c", "--noheaders", "2"]);
        assert_eq!(settings.collect.interval_secs, 2);
        assert_eq!(settings.collect.duration_secs, 60);
        assert_eq!(settings.collect.format, OutputFormat::Json);
    }

    #[test]
    fn test_cli_without_flags_keeps_settings() {
        let cli = Cli::parse_from(["dstat-probe"]);
        let mut settings = Settings::default();
        settings.collect.interval_secs = 7;
        apply_overrides(&mut settings, &cli);
        assert_eq!(settings.collect.interval_secs, 7);
        assert!(settings.properties.is_empty());
        assert_eq!(cli.config, PathBuf::from("dstat-probe.toml"));
    }

    #[test]
    fn test_zero_interval_falls_back_to_default() {
        assert_eq!(
            collection_interval(0),
            Duration::from_secs(DEFAULT_INTERVAL_SECS)
        );
        assert_eq!(collection_interval(5), Duration::from_secs(5));
    }
}
