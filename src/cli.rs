use crate::{
    camera::{Camera, OnvifCamera},
    classify::VisionClient,
    config::{Config, TargetSpec},
    error::JobFailure,
    frame,
    interpret::{self, Target},
    notify,
    pipeline::Inspector,
    report::JobReport,
    util::{ensure_dir, env_present},
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "coop-watch")]
#[command(about = "PTZ coop inspector (ONVIF presets + vision model + SMS alerting)")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./coop-watch.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check camera, ffmpeg, and credential wiring without moving anything.
    Doctor {},
    /// Move to a target's preset and save one frame.
    Capture {
        #[arg(long)]
        target: String,
    },
    /// Run the full pipeline for a single target and print the outcome.
    Inspect {
        #[arg(long)]
        target: String,
    },
    /// Inspect every configured target and send the notification.
    Run {
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg_path = resolve_config_path(args.config.as_deref())?;
    let mut cfg = Config::load(&cfg_path)?;
    let _guard = init_logging(&args, &cfg)?;

    match &args.cmd {
        Command::Doctor {} => doctor(&cfg),
        Command::Capture { target } => capture(&cfg, target),
        Command::Inspect { target } => inspect(&cfg, target),
        Command::Run { out_dir } => {
            if let Some(dir) = out_dir {
                cfg.output.out_dir = dir.display().to_string();
            }
            run(&cfg)
        }
    }
}

fn resolve_config_path(user: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = user {
        return Ok(p.to_path_buf());
    }
    let default = PathBuf::from("coop-watch.toml");
    if default.exists() {
        Ok(default)
    } else {
        Ok(PathBuf::from("coop-watch.example.toml"))
    }
}

fn init_logging(args: &Args, cfg: &Config) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stdout_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = resolve_log_path(cfg) {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(&path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }

    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }

    Some(PathBuf::from(&cfg.output.out_dir).join("coop-watch.log"))
}

fn find_target<'a>(cfg: &'a Config, name: &str) -> Result<&'a TargetSpec> {
    cfg.targets.iter().find(|t| t.name == name).ok_or_else(|| {
        let known: Vec<&str> = cfg.targets.iter().map(|t| t.name.as_str()).collect();
        anyhow!("unknown target {name:?}; configured targets: {known:?}")
    })
}

fn doctor(cfg: &Config) -> Result<()> {
    let camera = OnvifCamera::new(cfg)?;
    let camera_diag = camera.doctor()?;

    let notify_credentials = match cfg.notify.backend.as_str() {
        "textbelt" => {
            env_present(&cfg.notify.textbelt.phone_env)
                && env_present(&cfg.notify.textbelt.key_env)
        }
        _ => true,
    };

    let diag = serde_json::json!({
        "camera": camera_diag,
        "inference": {
            "base_url": cfg.inference.base_url,
            "model": cfg.inference.model,
            "api_key_env": cfg.inference.api_key_env,
            "api_key_present": env_present(&cfg.inference.api_key_env),
        },
        "notify": {
            "backend": cfg.notify.backend,
            "credentials_present": notify_credentials,
        },
        "targets": cfg.targets.len(),
    });
    println!("{}", serde_json::to_string_pretty(&diag)?);
    Ok(())
}

fn capture(cfg: &Config, name: &str) -> Result<()> {
    let spec = find_target(cfg, name)?;
    let camera = OnvifCamera::new(cfg)?;

    camera.goto_preset(&spec.preset_token)?;
    let frame = frame::capture_with_retry(
        &camera,
        cfg.capture.max_attempts,
        Duration::from_secs(cfg.capture.retry_backoff_seconds),
    )?;

    ensure_dir(Path::new(&cfg.output.out_dir))?;
    let path = Path::new(&cfg.output.out_dir).join(format!("full_{name}.jpg"));
    std::fs::write(&path, &frame.jpeg)
        .with_context(|| format!("writing frame: {}", path.display()))?;

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "target": name,
            "path": path,
            "bytes": frame.jpeg.len(),
            "captured_at": frame.captured_at,
        }))?
    );
    Ok(())
}

fn inspect(cfg: &Config, name: &str) -> Result<()> {
    let spec = find_target(cfg, name)?;
    let target = Target::compile(spec)?;

    let camera = OnvifCamera::new(cfg)?;
    let classifier = VisionClient::new(cfg)?;
    let inspector = Inspector::new(cfg, camera, classifier);

    let outcome = inspector.inspect_target(&target);
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

fn run(cfg: &Config) -> Result<()> {
    let targets = interpret::compile_all(&cfg.targets)?;
    let notifier = notify::build_notifier(cfg)?;

    // A run that dies during setup still pages the operator, best-effort.
    let report = match run_pipeline(cfg, &targets) {
        Ok(report) => report,
        Err(err) => {
            let failure = JobFailure(err);
            notify::deliver_job_failure(notifier.as_ref(), cfg, &failure);
            let JobFailure(inner) = failure;
            return Err(inner);
        }
    };

    if cfg.output.write_report_json {
        ensure_dir(Path::new(&cfg.output.out_dir))?;
        let path = Path::new(&cfg.output.out_dir).join(&cfg.output.report_filename);
        std::fs::write(&path, serde_json::to_string_pretty(&report)?)?;
    }

    let delivered = notify::deliver(notifier.as_ref(), cfg, &report);

    if cfg.global.print_summary {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "overall": report.overall,
                "outcomes": report.outcomes.len(),
                "delivered": delivered,
            }))?
        );
    }
    Ok(())
}

fn run_pipeline(cfg: &Config, targets: &[Target]) -> Result<JobReport> {
    let camera = OnvifCamera::new(cfg)?;
    let classifier = VisionClient::new(cfg)?;
    let inspector = Inspector::new(cfg, camera, classifier);
    Ok(inspector.run_job(targets))
}
