//! Boundary to the external license plate recognizer.
//!
//! The recognizer itself is a third-party program; this crate only hands it an
//! image, parses what it reports and applies a candidate selection policy.

use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// Placeholder in recognizer arguments replaced by the image path.
pub const IMAGE_PLACEHOLDER: &str = "{image}";

const JPEG_QUALITY: u8 = 90;

#[derive(Debug, Error)]
pub enum AlprError {
    #[error("Failed to prepare image: {0}")]
    ImageError(String),
    #[error("Failed to launch recognizer: {0}")]
    LaunchError(String),
    #[error("Recognizer exited with {status}: {stderr}")]
    ProcessError { status: String, stderr: String },
    #[error("Failed to parse recognizer output: {0}")]
    ParseError(String),
}

/// One reading of a plate, confidence as reported by the recognizer (percent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateCandidate {
    pub plate: String,
    pub confidence: f32,
}

/// A detected plate region and its candidate readings, best first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlateZone {
    pub candidates: Vec<PlateCandidate>,
}

#[async_trait]
pub trait PlateRecognizer: Send + Sync {
    /// Recognize plates in the image stored at `image_path`.
    async fn recognize(&self, image_path: &Path) -> Result<Vec<PlateZone>, AlprError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// First candidate of the first zone, in recognizer order.
    #[default]
    FirstCandidate,
    /// Best scoring candidate across every zone.
    HighestConfidence,
}

/// How a single plate is chosen out of a recognition result.
///
/// The default reproduces the plain "first zone, first candidate" reading
/// with no confidence floor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionPolicy {
    #[serde(default)]
    pub strategy: SelectionStrategy,
    #[serde(default)]
    pub min_confidence: Option<f32>,
}

impl SelectionPolicy {
    pub fn select<'a>(&self, zones: &'a [PlateZone]) -> Option<&'a PlateCandidate> {
        let eligible = |c: &&PlateCandidate| {
            !c.plate.trim().is_empty()
                && self.min_confidence.map_or(true, |min| c.confidence >= min)
        };

        match self.strategy {
            SelectionStrategy::FirstCandidate => zones
                .first()
                .and_then(|zone| zone.candidates.first())
                .filter(eligible),
            SelectionStrategy::HighestConfidence => zones
                .iter()
                .flat_map(|zone| zone.candidates.iter())
                .filter(eligible)
                .fold(None, |best: Option<&PlateCandidate>, c| match best {
                    Some(b) if b.confidence >= c.confidence => Some(b),
                    _ => Some(c),
                }),
        }
    }
}

/// Runs an external ALPR program and reads OpenALPR-style JSON from stdout.
#[derive(Debug, Clone)]
pub struct CommandRecognizer {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandRecognizer {
    pub fn new<P: Into<PathBuf>>(program: P, args: Vec<String>) -> Self {
        let program = program.into();
        info!("Using external recognizer: {:?} {:?}", program, args);
        Self { program, args }
    }

    /// Arguments for one invocation. The image path replaces every
    /// placeholder, or is appended when no placeholder is present.
    fn build_args(&self, image_path: &Path) -> Vec<String> {
        let path = image_path.to_string_lossy();
        let mut substituted = false;
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|arg| {
                if arg.contains(IMAGE_PLACEHOLDER) {
                    substituted = true;
                    arg.replace(IMAGE_PLACEHOLDER, &path)
                } else {
                    arg.clone()
                }
            })
            .collect();

        if !substituted {
            args.push(path.into_owned());
        }
        args
    }
}

#[async_trait]
impl PlateRecognizer for CommandRecognizer {
    async fn recognize(&self, image_path: &Path) -> Result<Vec<PlateZone>, AlprError> {
        let output = Command::new(&self.program)
            .args(self.build_args(image_path))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AlprError::LaunchError(format!("{}: {}", self.program.display(), e)))?;

        if !output.status.success() {
            return Err(AlprError::ProcessError {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let zones = parse_report(&output.stdout)?;
        debug!("Recognizer reported {} plate zones", zones.len());
        Ok(zones)
    }
}

#[derive(Debug, Deserialize)]
struct Report {
    #[serde(default)]
    results: Vec<ReportResult>,
}

#[derive(Debug, Deserialize)]
struct ReportResult {
    plate: String,
    confidence: f32,
    #[serde(default)]
    candidates: Vec<PlateCandidate>,
}

/// Parse the recognizer's JSON report into zones.
///
/// A result without a candidate list contributes its top reading as the
/// only candidate.
pub fn parse_report(raw: &[u8]) -> Result<Vec<PlateZone>, AlprError> {
    let report: Report =
        serde_json::from_slice(raw).map_err(|e| AlprError::ParseError(e.to_string()))?;

    Ok(report
        .results
        .into_iter()
        .map(|result| {
            let candidates = if result.candidates.is_empty() {
                vec![PlateCandidate {
                    plate: result.plate,
                    confidence: result.confidence,
                }]
            } else {
                result.candidates
            };
            PlateZone { candidates }
        })
        .collect())
}

/// Encode `image` as a JPEG in a temporary file. The file is removed when
/// the returned handle is dropped.
pub fn write_temp_jpeg(image: &DynamicImage) -> Result<NamedTempFile, AlprError> {
    let mut file = tempfile::Builder::new()
        .prefix("frame_")
        .suffix(".jpg")
        .tempfile()
        .map_err(|e| AlprError::ImageError(e.to_string()))?;

    write_jpeg(image, &mut file)?;
    Ok(file)
}

fn write_jpeg<W: Write + Seek>(image: &DynamicImage, out: &mut W) -> Result<(), AlprError> {
    DynamicImage::ImageRgb8(image.to_rgb8())
        .write_to(out, image::ImageOutputFormat::Jpeg(JPEG_QUALITY))
        .map_err(|e| AlprError::ImageError(e.to_string()))
}

/// Recognize plates in an in-memory frame via a temporary image file.
pub async fn recognize_frame(
    recognizer: &dyn PlateRecognizer,
    image: &DynamicImage,
) -> Result<Vec<PlateZone>, AlprError> {
    let file = write_temp_jpeg(image)?;
    recognizer.recognize(file.path()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(candidates: &[(&str, f32)]) -> PlateZone {
        PlateZone {
            candidates: candidates
                .iter()
                .map(|(plate, confidence)| PlateCandidate {
                    plate: plate.to_string(),
                    confidence: *confidence,
                })
                .collect(),
        }
    }

    const REPORT: &str = r#"{
        "version": 2,
        "data_type": "alpr_results",
        "results": [
            {
                "plate": "AB1234CD",
                "confidence": 91.5,
                "candidates": [
                    {"plate": "AB1234CD", "confidence": 91.5},
                    {"plate": "A81234CD", "confidence": 80.1}
                ]
            },
            {"plate": "XY9999ZZ", "confidence": 95.0}
        ]
    }"#;

    #[test]
    fn test_parse_report() {
        let zones = parse_report(REPORT.as_bytes()).unwrap();
        assert_eq!(zones.len(), 2);
        assert_eq!(zones[0].candidates.len(), 2);
        assert_eq!(zones[0].candidates[1].plate, "A81234CD");
        // No candidate list: top reading is the only candidate
        assert_eq!(zones[1], zone(&[("XY9999ZZ", 95.0)]));
    }

    #[test]
    fn test_parse_report_without_results() {
        assert!(parse_report(br#"{"results": []}"#).unwrap().is_empty());
        assert!(parse_report(b"{}").unwrap().is_empty());
        assert!(matches!(
            parse_report(b"not json"),
            Err(AlprError::ParseError(_))
        ));
    }

    #[test]
    fn test_default_policy_takes_first_candidate_of_first_zone() {
        let zones = vec![zone(&[("AAA111", 10.0), ("BBB222", 99.0)]), zone(&[("CCC333", 99.0)])];
        let picked = SelectionPolicy::default().select(&zones).unwrap();
        assert_eq!(picked.plate, "AAA111");
    }

    #[test]
    fn test_default_policy_does_not_fall_through_empty_first_zone() {
        let zones = vec![PlateZone::default(), zone(&[("CCC333", 99.0)])];
        assert!(SelectionPolicy::default().select(&zones).is_none());
        assert!(SelectionPolicy::default().select(&[]).is_none());
    }

    #[test]
    fn test_confidence_threshold() {
        let zones = vec![zone(&[("AAA111", 40.0)])];
        let strict = SelectionPolicy {
            strategy: SelectionStrategy::FirstCandidate,
            min_confidence: Some(50.0),
        };
        assert!(strict.select(&zones).is_none());

        let lenient = SelectionPolicy {
            min_confidence: Some(40.0),
            ..strict
        };
        assert_eq!(lenient.select(&zones).unwrap().plate, "AAA111");
    }

    #[test]
    fn test_highest_confidence_across_zones() {
        let zones = vec![zone(&[("AAA111", 60.0), ("AAA11I", 20.0)]), zone(&[("CCC333", 85.0)])];
        let policy = SelectionPolicy {
            strategy: SelectionStrategy::HighestConfidence,
            min_confidence: Some(50.0),
        };
        assert_eq!(policy.select(&zones).unwrap().plate, "CCC333");
    }

    #[test]
    fn test_blank_plate_is_not_a_candidate() {
        let zones = vec![zone(&[("  ", 99.0)])];
        assert!(SelectionPolicy::default().select(&zones).is_none());
    }

    #[test]
    fn test_build_args() {
        let with_placeholder = CommandRecognizer::new("alpr", vec!["-j".into(), "{image}".into()]);
        assert_eq!(
            with_placeholder.build_args(Path::new("/tmp/f.jpg")),
            vec!["-j", "/tmp/f.jpg"]
        );

        let without = CommandRecognizer::new("alpr", vec!["-j".into()]);
        assert_eq!(without.build_args(Path::new("/tmp/f.jpg")), vec!["-j", "/tmp/f.jpg"]);
    }

    #[tokio::test]
    async fn test_command_recognizer_reads_stdout() {
        let script = r#"printf '%s' '{"results":[{"plate":"AB1234CD","confidence":90.0}]}'"#;
        let recognizer =
            CommandRecognizer::new("sh", vec!["-c".into(), script.into(), "{image}".into()]);

        let zones = tokio_test::assert_ok!(recognizer.recognize(Path::new("/tmp/unused.jpg")).await);
        assert_eq!(zones, vec![zone(&[("AB1234CD", 90.0)])]);
    }

    #[tokio::test]
    async fn test_command_recognizer_failure() {
        let recognizer = CommandRecognizer::new("sh", vec!["-c".into(), "exit 3".into()]);
        let err = recognizer.recognize(Path::new("/tmp/unused.jpg")).await.unwrap_err();
        assert!(matches!(err, AlprError::ProcessError { .. }));

        let missing = CommandRecognizer::new("/nonexistent/alpr-binary", vec![]);
        let err = missing.recognize(Path::new("/tmp/unused.jpg")).await.unwrap_err();
        assert!(matches!(err, AlprError::LaunchError(_)));
    }

    #[test]
    fn test_write_temp_jpeg() {
        let image = DynamicImage::new_rgba8(32, 16);
        let file = write_temp_jpeg(&image).unwrap();
        let path = file.path().to_path_buf();

        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 16));

        drop(file);
        assert!(!path.exists());
    }
}
