//! External media tool binding
//!
//! Segmentation, quality-metric computation and stream probing are delegated
//! to ffmpeg/ffprobe. The `MediaTool` trait is the seam the extractor and the
//! scorer depend on.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tqv_common::MediaSpec;

/// Media tool errors
#[derive(Debug, Error)]
pub enum MediaToolError {
    /// Tool binary not found in PATH
    #[error("Media tool binary not found: {0}")]
    BinaryNotFound(String),

    /// Failed to execute the tool
    #[error("Failed to execute media tool: {0}")]
    ExecutionError(String),

    /// Tool ran but exited unsuccessfully
    #[error("Media tool failed: {0}")]
    ToolFailed(String),

    /// Failed to parse tool output
    #[error("Failed to parse media tool output: {0}")]
    ParseError(String),

    /// I/O error (file read/write)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Operations the verifier needs from a media toolkit
#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Cut `input` at each of `cut_points` (seconds, ascending, all > 0)
    ///
    /// Writes `segment_NNNN.<ext>` files into `output_dir` and returns their
    /// paths. Segment `NNNN == k` starts at `0` for `k == 0` and at
    /// `cut_points[k - 1]` otherwise. A tool may produce fewer files than
    /// requested, leaving gaps in the numbering.
    async fn segment(
        &self,
        input: &Path,
        cut_points: &[f64],
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, MediaToolError>;

    /// Quality of `candidate` against `reference` (VMAF, 0-100)
    async fn quality(&self, reference: &Path, candidate: &Path) -> Result<f64, MediaToolError>;

    /// Encoding parameters of the first video stream
    async fn probe(&self, input: &Path) -> Result<MediaSpec, MediaToolError>;
}

/// ffmpeg/ffprobe backed media tool
pub struct FfmpegTool {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl FfmpegTool {
    /// Create new tool, checking that both binaries run
    pub fn new(ffmpeg_path: &str, ffprobe_path: &str) -> Result<Self, MediaToolError> {
        for binary in [ffmpeg_path, ffprobe_path] {
            match Command::new(binary).arg("-version").output() {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(MediaToolError::BinaryNotFound(binary.to_string()));
                }
                Err(e) => return Err(MediaToolError::ExecutionError(e.to_string())),
            }
        }

        Ok(Self {
            ffmpeg_path: ffmpeg_path.to_string(),
            ffprobe_path: ffprobe_path.to_string(),
        })
    }

    /// Run a command on the blocking pool and return its stdout
    async fn run(binary: String, args: Vec<String>) -> Result<Vec<u8>, MediaToolError> {
        tracing::debug!(binary = %binary, args = ?args, "Running media tool");

        let output = tokio::task::spawn_blocking(move || Command::new(&binary).args(&args).output())
            .await
            .map_err(|e| MediaToolError::ExecutionError(format!("Task join error: {}", e)))?
            .map_err(|e| MediaToolError::ExecutionError(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaToolError::ToolFailed(format!(
                "Exit code: {:?}, stderr: {}",
                output.status.code(),
                stderr.lines().rev().take(5).collect::<Vec<_>>().join(" | ")
            )));
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl MediaTool for FfmpegTool {
    async fn segment(
        &self,
        input: &Path,
        cut_points: &[f64],
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, MediaToolError> {
        tokio::fs::create_dir_all(output_dir).await?;

        let extension = input
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("ts")
            .to_string();
        let pattern = output_dir.join(format!("segment_%04d.{}", extension));

        let mut args = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-map".to_string(),
            "0".to_string(),
            "-c".to_string(),
            "copy".to_string(),
            "-f".to_string(),
            "segment".to_string(),
            "-reset_timestamps".to_string(),
            "1".to_string(),
        ];
        if !cut_points.is_empty() {
            let times: Vec<String> = cut_points.iter().map(|t| format!("{:.6}", t)).collect();
            args.push("-segment_times".to_string());
            args.push(times.join(","));
        }
        args.push("-y".to_string());
        args.push(pattern.to_string_lossy().to_string());

        Self::run(self.ffmpeg_path.clone(), args).await?;

        // Segment files are numbered by position, so sorted names are in index order
        let mut segments = Vec::new();
        let mut entries = tokio::fs::read_dir(output_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with("segment_") {
                segments.push(entry.path());
            }
        }
        segments.sort();

        Ok(segments)
    }

    async fn quality(&self, reference: &Path, candidate: &Path) -> Result<f64, MediaToolError> {
        let log_path = std::env::temp_dir().join(format!("vmaf_{}.json", uuid::Uuid::new_v4()));

        let args = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-i".to_string(),
            candidate.to_string_lossy().to_string(),
            "-i".to_string(),
            reference.to_string_lossy().to_string(),
            "-lavfi".to_string(),
            format!(
                "[0:v][1:v]libvmaf=log_fmt=json:log_path={}",
                log_path.to_string_lossy()
            ),
            "-f".to_string(),
            "null".to_string(),
            "-".to_string(),
        ];

        let result = Self::run(self.ffmpeg_path.clone(), args).await;
        if let Err(e) = result {
            let _ = std::fs::remove_file(&log_path);
            return Err(e);
        }

        let json_content = tokio::fs::read_to_string(&log_path).await;
        let _ = std::fs::remove_file(&log_path);

        parse_vmaf_log(&json_content?)
    }

    async fn probe(&self, input: &Path) -> Result<MediaSpec, MediaToolError> {
        let args = vec![
            "-v".to_string(),
            "quiet".to_string(),
            "-print_format".to_string(),
            "json".to_string(),
            "-show_format".to_string(),
            "-show_streams".to_string(),
            "-select_streams".to_string(),
            "v:0".to_string(),
            input.to_string_lossy().to_string(),
        ];

        let stdout = Self::run(self.ffprobe_path.clone(), args).await?;
        parse_probe_output(&stdout)
    }
}

#[derive(Debug, Deserialize)]
struct VmafLog {
    pooled_metrics: VmafPooled,
}

#[derive(Debug, Deserialize)]
struct VmafPooled {
    vmaf: VmafStats,
}

#[derive(Debug, Deserialize)]
struct VmafStats {
    mean: f64,
}

/// Pooled mean VMAF from a libvmaf JSON log
pub fn parse_vmaf_log(json: &str) -> Result<f64, MediaToolError> {
    let log: VmafLog =
        serde_json::from_str(json).map_err(|e| MediaToolError::ParseError(e.to_string()))?;
    Ok(log.pooled_metrics.vmaf.mean)
}

/// Build a `MediaSpec` from ffprobe JSON output
pub fn parse_probe_output(stdout: &[u8]) -> Result<MediaSpec, MediaToolError> {
    let json: serde_json::Value =
        serde_json::from_slice(stdout).map_err(|e| MediaToolError::ParseError(e.to_string()))?;

    let stream = json["streams"]
        .as_array()
        .and_then(|s| s.first())
        .ok_or_else(|| MediaToolError::ParseError("No video stream found".to_string()))?;

    let width = stream["width"].as_u64().unwrap_or(0);
    let height = stream["height"].as_u64().unwrap_or(0);
    let codec = stream["codec_name"].as_str().unwrap_or("unknown").to_string();

    let framerate = parse_framerate(
        stream["avg_frame_rate"]
            .as_str()
            .filter(|r| *r != "0/0")
            .or_else(|| stream["r_frame_rate"].as_str())
            .unwrap_or("0"),
    );

    // Stream bitrate is often absent in containers like MPEG-TS; fall back to format
    let bitrate = stream["bit_rate"]
        .as_str()
        .or_else(|| json["format"]["bit_rate"].as_str())
        .and_then(|b| b.parse::<u64>().ok())
        .unwrap_or(0);

    Ok(MediaSpec {
        codec,
        resolution: format!("{}x{}", width, height),
        bitrate,
        framerate,
    })
}

/// Parse "30000/1001" or "30" into frames per second
fn parse_framerate(fps: &str) -> f64 {
    if let Some((num, den)) = fps.split_once('/') {
        let num: f64 = num.parse().unwrap_or(0.0);
        let den: f64 = den.parse().unwrap_or(1.0);
        if den != 0.0 {
            return num / den;
        }
        return 0.0;
    }
    fps.parse().unwrap_or(0.0)
}
