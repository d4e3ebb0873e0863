use super::{Camera, CameraDiag};
use crate::{
    config::Config,
    error::{CaptureError, PositionError},
    frame::Frame,
    util::{now_rfc3339, require_env, truncate},
};
use anyhow::{Context, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use rand::Rng;
use regex::Regex;
use reqwest::blocking::Client;
use sha1::{Digest, Sha1};
use std::io::Read;
use std::process::{Child, Command, Output, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// ONVIF PTZ camera with an RTSP main stream. Preset moves go over SOAP with
/// WS-UsernameToken auth; frames come off the stream through a bounded
/// `ffmpeg` subprocess, one JPEG per invocation.
pub struct OnvifCamera {
    camera: crate::config::Camera,
    capture: crate::config::Capture,
    http: Client,
    password: String,
    discovered_profile: OnceLock<String>,
}

impl OnvifCamera {
    pub fn new(cfg: &Config) -> Result<Self> {
        let password = require_env(&cfg.camera.password_env)?;
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.camera.request_timeout_seconds))
            .build()
            .with_context(|| "building ONVIF http client")?;
        Ok(Self {
            camera: cfg.camera.clone(),
            capture: cfg.capture.clone(),
            http,
            password,
            discovered_profile: OnceLock::new(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "http://{}:{}{}",
            self.camera.host, self.camera.onvif_port, self.camera.service_path
        )
    }

    fn rtsp_url(&self) -> String {
        format!(
            "rtsp://{}:{}@{}:{}/{}",
            self.camera.username,
            self.password,
            self.camera.host,
            self.camera.rtsp_port,
            self.camera.rtsp_path
        )
    }

    /// WS-UsernameToken digest header: Base64(SHA1(nonce + created + password)).
    fn wsse_header(&self) -> String {
        let mut nonce = [0u8; 16];
        rand::thread_rng().fill(&mut nonce[..]);
        let created = now_rfc3339();

        let mut hasher = Sha1::new();
        hasher.update(nonce);
        hasher.update(created.as_bytes());
        hasher.update(self.password.as_bytes());
        let digest = BASE64.encode(hasher.finalize());

        format!(
            r#"<Security s:mustUnderstand="1" xmlns="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd"><UsernameToken><Username>{}</Username><Password Type="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-username-token-profile-1.0#PasswordDigest">{}</Password><Nonce EncodingType="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary">{}</Nonce><Created xmlns="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd">{}</Created></UsernameToken></Security>"#,
            xml_escape(&self.camera.username),
            digest,
            BASE64.encode(nonce),
            created,
        )
    }

    fn post_soap(&self, action: &str, body: &str) -> Result<String, PositionError> {
        let envelope = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope"><s:Header>{}</s:Header><s:Body>{}</s:Body></s:Envelope>"#,
            self.wsse_header(),
            body,
        );

        debug!("soap {action} -> {}", self.endpoint());
        let resp = self
            .http
            .post(self.endpoint())
            .header("Content-Type", "application/soap+xml; charset=utf-8")
            .body(envelope)
            .send()?;

        let status = resp.status();
        let text = resp.text()?;

        if !status.is_success() || text.contains("Fault>") {
            return Err(PositionError::Fault {
                action: action.to_string(),
                detail: format!("HTTP {}: {}", status, truncate(text.trim(), 300)),
            });
        }
        Ok(text)
    }

    /// Media profile token for PTZ requests. The cameras we target expose the
    /// main stream as the first profile; when config does not pin a token we
    /// ask once and cache the answer for the life of the session.
    fn profile_token(&self) -> Result<String, PositionError> {
        if !self.camera.profile_token.is_empty() {
            return Ok(self.camera.profile_token.clone());
        }
        if let Some(token) = self.discovered_profile.get() {
            return Ok(token.clone());
        }

        let text = self.post_soap(
            "GetProfiles",
            r#"<GetProfiles xmlns="http://www.onvif.org/ver10/media/wsdl"/>"#,
        )?;
        let re = Regex::new(r#"Profiles[^>]*\btoken="([^"]+)""#)
            .map_err(|e| PositionError::NoProfile(e.to_string()))?;
        let token = re
            .captures(&text)
            .map(|c| c[1].to_string())
            .ok_or_else(|| {
                PositionError::NoProfile("GetProfiles response carries no profile token".into())
            })?;

        debug!("discovered media profile token {token:?}");
        let _ = self.discovered_profile.set(token.clone());
        Ok(token)
    }
}

impl Camera for OnvifCamera {
    fn doctor(&self) -> Result<CameraDiag> {
        let ffmpeg_version = match Command::new(&self.capture.ffmpeg_exe).arg("-version").output()
        {
            Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout)
                .lines()
                .next()
                .map(|l| l.to_string()),
            _ => None,
        };

        let (reachable, error) = match self.post_soap(
            "GetSystemDateAndTime",
            r#"<GetSystemDateAndTime xmlns="http://www.onvif.org/ver10/device/wsdl"/>"#,
        ) {
            Ok(_) => (true, None),
            Err(err) => (false, Some(err.to_string())),
        };

        Ok(CameraDiag {
            onvif_endpoint: self.endpoint(),
            reachable,
            ffmpeg_exe: self.capture.ffmpeg_exe.clone(),
            ok: reachable && ffmpeg_version.is_some(),
            ffmpeg_version,
            error,
        })
    }

    fn goto_preset(&self, preset_token: &str) -> Result<(), PositionError> {
        let profile = self.profile_token()?;
        let body = format!(
            r#"<GotoPreset xmlns="http://www.onvif.org/ver20/ptz/wsdl"><ProfileToken>{}</ProfileToken><PresetToken>{}</PresetToken></GotoPreset>"#,
            xml_escape(&profile),
            xml_escape(preset_token),
        );
        self.post_soap("GotoPreset", &body)?;

        // Frames grabbed right after the ack show motion blur or a half-way
        // viewpoint; wait out the move.
        debug!(
            "preset {preset_token} acknowledged, settling {}s",
            self.camera.settle_seconds
        );
        std::thread::sleep(Duration::from_secs(self.camera.settle_seconds));
        Ok(())
    }

    fn grab_frame(&self) -> Result<Frame, CaptureError> {
        let mut cmd = Command::new(&self.capture.ffmpeg_exe);
        cmd.arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-rtsp_transport")
            .arg("tcp")
            .arg("-i")
            .arg(self.rtsp_url())
            .arg("-frames:v")
            .arg("1")
            .arg("-f")
            .arg("image2pipe")
            .arg("-c:v")
            .arg("mjpeg")
            .arg("-");
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            CaptureError::Open(format!("spawn {}: {e}", self.capture.ffmpeg_exe))
        })?;

        let output = wait_with_timeout(
            &mut child,
            Duration::from_secs(self.capture.attempt_timeout_seconds),
        )?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CaptureError::Open(truncate(stderr.trim(), 300)));
        }
        if output.stdout.is_empty() {
            return Err(CaptureError::EmptyFrame);
        }
        if !output.stdout.starts_with(&[0xFF, 0xD8]) {
            return Err(CaptureError::BadFrame(format!(
                "{} bytes without a JPEG header",
                output.stdout.len()
            )));
        }

        Ok(Frame::new(output.stdout))
    }
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Output, CaptureError> {
    // Drain pipes while waiting so a chatty ffmpeg can't deadlock the child
    // on a full stdout/stderr buffer.
    let stdout_reader = child.stdout.take();
    let stderr_reader = child.stderr.take();

    let stdout_thread = std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout_reader {
            let _ = out.read_to_end(&mut buf);
        }
        buf
    });

    let stderr_thread = std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut err) = stderr_reader {
            let _ = err.read_to_end(&mut buf);
        }
        buf
    });

    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                let stdout = stdout_thread
                    .join()
                    .map_err(|_| CaptureError::Open("stdout reader thread panicked".into()))?;
                let stderr = stderr_thread
                    .join()
                    .map_err(|_| CaptureError::Open("stderr reader thread panicked".into()))?;
                return Ok(Output {
                    status,
                    stdout,
                    stderr,
                });
            }
            Ok(None) => {}
            Err(e) => return Err(CaptureError::Open(format!("wait on ffmpeg: {e}"))),
        }

        if start.elapsed() > timeout {
            warn!("ffmpeg timed out after {timeout:?}");
            let _ = child.kill();
            let _ = child.wait();
            return Err(CaptureError::Timeout(timeout.as_secs()));
        }

        std::thread::sleep(Duration::from_millis(50));
    }
}
