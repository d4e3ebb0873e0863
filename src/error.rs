use thiserror::Error;

/// Camera refused or failed a preset move. Fatal for the current target only.
#[derive(Debug, Error)]
pub enum PositionError {
    #[error("PTZ request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("camera returned a fault for {action}: {detail}")]
    Fault { action: String, detail: String },

    #[error("no media profile available: {0}")]
    NoProfile(String),
}

/// Frame acquisition failure. `Exhausted` is the terminal form raised after
/// the retry budget is spent; the other variants describe a single attempt.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("could not open video feed: {0}")]
    Open(String),

    #[error("feed returned no frame data")]
    EmptyFrame,

    #[error("feed returned an unusable frame: {0}")]
    BadFrame(String),

    #[error("feed read timed out after {0}s")]
    Timeout(u64),

    #[error("no frame after {attempts} attempts, last error: {last}")]
    Exhausted { attempts: u32, last: String },
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("api key not set: {0}")]
    MissingApiKey(String),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate limited by inference service")]
    RateLimit,

    #[error("authentication rejected by inference service")]
    Auth,

    #[error("unusable response from inference service: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification channel misconfigured: {0}")]
    Config(String),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("channel rejected the message: {0}")]
    Rejected(String),
}

/// A run that died before producing a report. Escalated through the notifier
/// on a best-effort basis so a broken environment still pages someone.
#[derive(Debug)]
pub struct JobFailure(pub anyhow::Error);

impl std::fmt::Display for JobFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job run failed before producing a report: {:#}", self.0)
    }
}
