// src/capture/chrome.rs
// Headless Chrome capture adapter

use super::{CaptureOutput, VisualCapture, UNKNOWN_TITLE};
use crate::jobs::JobId;
use crate::stage::StageError;
use async_trait::async_trait;
use regex::Regex;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Instant;
use tokio::process::Command;

const WINDOW_SIZE: &str = "--window-size=1280,720";
const USER_AGENT: &str = "--user-agent=Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const VIRTUAL_TIME_BUDGET: &str = "--virtual-time-budget=15000";

pub struct ChromeCapture {
    bin_path: PathBuf,
    output_dir: PathBuf,
}

impl ChromeCapture {
    pub fn new(bin_path: PathBuf, output_dir: PathBuf) -> Self {
        tracing::info!(
            "Chrome capture initialized: bin={}, output={}",
            bin_path.display(),
            output_dir.display()
        );

        Self {
            bin_path,
            output_dir,
        }
    }

    async fn run_chrome(&self, args: &[String]) -> Result<Vec<u8>, StageError> {
        let output = Command::new(&self.bin_path)
            .args([
                "--headless=new",
                "--disable-gpu",
                "--no-sandbox",
                "--disable-dev-shm-usage",
                "--hide-scrollbars",
                "--mute-audio",
                "--no-first-run",
                USER_AGENT,
                VIRTUAL_TIME_BUDGET,
            ])
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                    StageError::ToolUnavailable(format!("{}: {}", self.bin_path.display(), e))
                }
                _ => StageError::Io(e.to_string()),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let last_line = stderr.lines().last().unwrap_or("").trim().to_string();
            return Err(StageError::Unreachable(format!(
                "browser exited with {}: {}",
                output.status, last_line
            )));
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl VisualCapture for ChromeCapture {
    async fn capture(&self, source_ref: &str, job_id: JobId) -> Result<CaptureOutput, StageError> {
        let started = Instant::now();
        let url = validate_source(source_ref)?;

        tracing::info!("Loading page: {}", url);
        let dom = self
            .run_chrome(&["--dump-dom".to_string(), url.to_string()])
            .await?;
        let dom = String::from_utf8_lossy(&dom);
        if dom.trim().is_empty() {
            return Err(StageError::Unreachable(format!("{} returned no document", url)));
        }

        let label = extract_title(&dom).unwrap_or_else(|| {
            tracing::warn!("Could not extract video title");
            UNKNOWN_TITLE.to_string()
        });

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| StageError::Io(e.to_string()))?;
        let file_name = format!("{}.png", job_id);
        let screenshot_path = self.output_dir.join(&file_name);

        self.run_chrome(&[
            format!("--screenshot={}", screenshot_path.display()),
            WINDOW_SIZE.to_string(),
            url.to_string(),
        ])
        .await?;

        if !screenshot_path.exists() {
            return Err(StageError::Unreachable(format!(
                "no screenshot produced for {}",
                url
            )));
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!("Screenshot captured in {}ms: {}", duration_ms, screenshot_path.display());

        Ok(CaptureOutput {
            reference: Some(format!("/screenshots/{}", file_name)),
            label,
            duration_ms,
        })
    }

    fn name(&self) -> &str {
        "Headless Chrome"
    }
}

/// Reject references no browser could ever load
pub(crate) fn validate_source(source_ref: &str) -> Result<&str, StageError> {
    static URL_RE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    let re = URL_RE
        .get_or_init(|| Regex::new(r"(?i)^https?://[^\s/$.?#][^\s]*$"))
        .as_ref()
        .map_err(|e| StageError::Io(format!("url pattern: {}", e)))?;

    let trimmed = source_ref.trim();
    if trimmed.is_empty() {
        return Err(StageError::InvalidSource("empty source reference".to_string()));
    }
    if !re.is_match(trimmed) {
        return Err(StageError::InvalidSource(trimmed.to_string()));
    }
    Ok(trimmed)
}

fn extract_title(dom: &str) -> Option<String> {
    static TITLE_RE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    let re = TITLE_RE
        .get_or_init(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>"))
        .as_ref()
        .ok()?;

    let raw = re.captures(dom)?.get(1)?.as_str();
    let title = decode_entities(raw.trim());
    let title = title
        .strip_suffix(" - YouTube")
        .unwrap_or(&title)
        .trim()
        .to_string();

    if title.is_empty() || title == "YouTube" {
        None
    } else {
        Some(title)
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}
