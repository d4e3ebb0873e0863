use crate::{
    config::Config,
    error::{JobFailure, NotifyError},
    interpret::Status,
    report::JobReport,
    util::{require_env, truncate},
};
use anyhow::{Result, anyhow};
use reqwest::blocking::Client;
use std::time::Duration;
use tracing::{info, warn};

/// Outbound alert channel. At-least-once, best-effort; the caller decides
/// what a failed send means.
pub trait Notifier {
    fn name(&self) -> &'static str;
    fn send(&self, text: &str) -> Result<(), NotifyError>;
}

pub fn build_notifier(cfg: &Config) -> Result<Box<dyn Notifier>> {
    match cfg.notify.backend.as_str() {
        "textbelt" => Ok(Box::new(TextbeltSms::new(cfg)?)),
        "stdout" => Ok(Box::new(StdoutNotifier)),
        other => Err(anyhow!("unknown notify.backend: {other}")),
    }
}

/// Human-readable run summary: a title for the overall status, one line per
/// outcome, and the report timestamp.
pub fn render_summary(cfg: &Config, report: &JobReport) -> String {
    let title = match report.overall {
        Status::Ok => format!("[{}] all checks OK", cfg.global.job_name),
        Status::Problem => format!("[{}] PROBLEM detected", cfg.global.job_name),
        Status::Error => format!("[{}] check ERROR", cfg.global.job_name),
    };

    let mut lines = vec![title];
    for outcome in &report.outcomes {
        lines.push(format!("{}: {}", outcome.target, outcome.raw_text));
    }
    lines.push(format!("at {}", report.generated_at));
    lines.join("\n")
}

/// Render and send the report. Channel failure is logged and folded into the
/// returned flag; it never propagates to the caller, so a dead channel cannot
/// fail an otherwise healthy job.
pub fn deliver(notifier: &dyn Notifier, cfg: &Config, report: &JobReport) -> bool {
    let text = render_summary(cfg, report);
    match notifier.send(&text) {
        Ok(()) => {
            info!("notification delivered via {}", notifier.name());
            true
        }
        Err(err) => {
            warn!("notification via {} failed: {err}", notifier.name());
            false
        }
    }
}

/// Best-effort escalation for a run that died before producing a report.
pub fn deliver_job_failure(notifier: &dyn Notifier, cfg: &Config, failure: &JobFailure) {
    let text = format!("[{}] RUN FAILED\n{failure}", cfg.global.job_name);
    if let Err(err) = notifier.send(&text) {
        warn!("job-failure escalation via {} failed: {err}", notifier.name());
    }
}

/// Textbelt SMS gateway: a single form POST, `success` flag in the JSON reply.
pub struct TextbeltSms {
    http: Client,
    url: String,
    phone: String,
    key: String,
}

impl TextbeltSms {
    pub fn new(cfg: &Config) -> Result<Self, NotifyError> {
        let phone = require_env(&cfg.notify.textbelt.phone_env)
            .map_err(|e| NotifyError::Config(format!("{e:#}")))?;
        let key = require_env(&cfg.notify.textbelt.key_env)
            .map_err(|e| NotifyError::Config(format!("{e:#}")))?;
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            url: cfg.notify.textbelt.url.clone(),
            phone,
            key,
        })
    }
}

impl Notifier for TextbeltSms {
    fn name(&self) -> &'static str {
        "textbelt"
    }

    fn send(&self, text: &str) -> Result<(), NotifyError> {
        let response = self
            .http
            .post(&self.url)
            .form(&[
                ("phone", self.phone.as_str()),
                ("message", text),
                ("key", self.key.as_str()),
            ])
            .send()?;

        let status = response.status();
        let body = response.text().unwrap_or_default();
        if !status.is_success() {
            return Err(NotifyError::Rejected(format!(
                "HTTP {}: {}",
                status,
                truncate(&body, 300)
            )));
        }

        let payload: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| NotifyError::Rejected(format!("unparseable reply: {e}")))?;
        if payload["success"].as_bool() != Some(true) {
            let detail = payload["error"].as_str().unwrap_or("success=false");
            return Err(NotifyError::Rejected(detail.to_string()));
        }
        Ok(())
    }
}

/// Fallback channel when no SMS credentials are configured: the summary goes
/// to stdout and delivery always succeeds.
pub struct StdoutNotifier;

impl Notifier for StdoutNotifier {
    fn name(&self) -> &'static str {
        "stdout"
    }

    fn send(&self, text: &str) -> Result<(), NotifyError> {
        println!("{text}");
        Ok(())
    }
}
