//! Noise monitor (nmon-monitor) - Main entry point
//!
//! Performs one sampling run and exits. Scheduling (cron/systemd timer) is
//! external; the flag file turns monitoring on and off between runs.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use nmon_common::config::{ConfigResolver, Credentials};
use nmon_common::{Clock, SystemClock};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use nmon_monitor::config::{BootstrapLoad, TelemetryEndpoint};
use nmon_monitor::logging::init_logging;
use nmon_monitor::models::{RunOutcome, StatisticsBackend, Strictness};
use nmon_monitor::services::{
    CsvMeasurementStore, FfmpegTools, HttpTelemetry, ModelLoader, MonitorFlag, MonitorServices,
    PcmStatistics, RcloneArchive, SamplingOrchestrator, SoxStatistics, StatisticsSource,
};
use nmon_monitor::{CliOverrides, MonitorConfig, MonitorToml};

/// Command-line arguments for nmon-monitor
#[derive(Parser, Debug)]
#[command(name = "nmon-monitor")]
#[command(about = "Unattended acoustic event monitor: one sampling run per invocation")]
#[command(version)]
struct Args {
    /// Bootstrap TOML file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Deployment profile ([profiles.<name>] table)
    #[arg(short, long, env = "NMON_PROFILE")]
    profile: Option<String>,

    /// ALSA input device, e.g. hw:1,0
    #[arg(long = "in-device")]
    in_device: Option<String>,

    /// Seconds between samples
    #[arg(long)]
    sample_interval: Option<u64>,

    /// Seconds per sample
    #[arg(long)]
    sample_time: Option<u64>,

    /// Samples per run
    #[arg(long = "n-samples")]
    n_samples: Option<u32>,

    /// Comma-separated labels that keep a run qualifying
    #[arg(long, value_delimiter = ',')]
    passing_labels: Option<Vec<String>>,

    /// Model file (.eim)
    #[arg(long)]
    model: Option<PathBuf>,

    /// sox noise profile for detection enhancement
    #[arg(long = "noise-prof")]
    noise_prof: Option<PathBuf>,

    /// Window stride as a fraction of the model window (0, 1]
    #[arg(long)]
    overlap: Option<f64>,

    /// Failure policy for conversion, statistics and concatenation
    #[arg(long, value_enum)]
    strictness: Option<Strictness>,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            profile: self.profile.clone(),
            device: self.in_device.clone(),
            sample_duration_secs: self.sample_time,
            sample_interval_secs: self.sample_interval,
            sample_count: self.n_samples,
            passing_labels: self.passing_labels.clone(),
            model_path: self.model.clone(),
            noise_profile_path: self.noise_prof.clone(),
            overlap: self.overlap,
            strictness: self.strictness,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logging starts before the bootstrap outcome is reported, falling back
    // to built-in defaults when the file is unusable.
    let bootstrap = BootstrapLoad::read(ConfigResolver::new(args.config.clone()).resolve());
    let (logging, log_dir) = bootstrap.logging();
    let log_file = init_logging(&logging, &log_dir).context("Failed to initialize logging")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("GIT_HASH"),
        built = env!("BUILD_TIMESTAMP"),
        profile = env!("BUILD_PROFILE"),
        "Starting nmon-monitor"
    );

    let config_path = bootstrap.path;
    if !bootstrap.found {
        warn!(config = %config_path.display(), "Config file not found, using built-in defaults");
    }
    let toml: MonitorToml = match bootstrap.toml {
        Ok(toml) => toml,
        Err(e) => {
            error!(config = %config_path.display(), error = %e, "Failed to load configuration");
            return Err(e).with_context(|| format!("Failed to load {}", config_path.display()));
        }
    };
    info!(config = %config_path.display(), log_file = %log_file.display(), "Configuration source");

    let config = match MonitorConfig::resolve(toml, args.overrides()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e).context("Invalid configuration");
        }
    };

    let services = match build_services(&config) {
        Ok(services) => services,
        Err(e) => {
            error!(error = %e, "Startup check failed");
            return Err(e);
        }
    };

    let orchestrator = SamplingOrchestrator::new(config, services);

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    let report = match orchestrator.run(&cancel).await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "Sampling run failed");
            return Err(e).context("Sampling run failed");
        }
    };

    match report.outcome {
        RunOutcome::Aborted(reason) => bail!("Sampling run aborted: {}", reason),
        outcome => {
            info!(?outcome, run_id = %report.run.run_id, "Run complete");
            Ok(())
        }
    }
}

/// Configuration-fatal checks, then production collaborators
fn build_services(config: &MonitorConfig) -> Result<MonitorServices> {
    if !config.paths.model_path.exists() {
        bail!("Model file not found: {}", config.paths.model_path.display());
    }

    let credentials = Credentials::load(&config.paths.credentials_file)
        .context("Failed to load telemetry credentials")?;
    let endpoint = TelemetryEndpoint::resolve(&config.telemetry, &credentials)?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let statistics: Arc<dyn StatisticsSource> = match config.tools.statistics {
        StatisticsBackend::Sox => Arc::new(SoxStatistics::new(
            config.tools.sox.clone(),
            config.tool_deadline(),
        )),
        StatisticsBackend::Native => Arc::new(PcmStatistics::new()),
    };

    let telemetry = HttpTelemetry::new(
        endpoint.url,
        endpoint.api_key,
        Duration::from_secs(config.telemetry.timeout_secs),
    )
    .context("Failed to build telemetry client")?;

    Ok(MonitorServices {
        tools: Arc::new(FfmpegTools::from_config(config)),
        statistics,
        model_loader: model_loader(config)?,
        store: Arc::new(CsvMeasurementStore::new(
            config.paths.record_dir.clone(),
            clock.clone(),
        )),
        archive: Arc::new(RcloneArchive::new(
            config.tools.rclone.clone(),
            config.archive.remote.clone(),
            Duration::from_secs(config.archive.timeout_secs),
        )),
        telemetry: Arc::new(telemetry),
        clock,
        flag: MonitorFlag::new(config.paths.monitor_status_file.clone()),
    })
}

#[cfg(unix)]
fn model_loader(config: &MonitorConfig) -> Result<Arc<dyn ModelLoader>> {
    Ok(Arc::new(nmon_monitor::services::EimLoader::new(
        config.tool_deadline(),
    )))
}

#[cfg(not(unix))]
fn model_loader(_config: &MonitorConfig) -> Result<Arc<dyn ModelLoader>> {
    bail!(".eim model runners require a Unix platform")
}

/// Cancel the run on Ctrl+C or SIGTERM
async fn cancel_on_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, stopping run");
        },
        _ = terminate => {
            info!("Received terminate signal, stopping run");
        },
    }
    cancel.cancel();
}
