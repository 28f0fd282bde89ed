#![forbid(unsafe_code)]

//! Conformance packets for the FFA core.
//!
//! A packet is a JSON fixture of fold, single-stage, wrap and remainder
//! shuffle cases, each with either the expected output table or the exact
//! error message. Running a packet produces a [`PacketReport`] that can be
//! written next to a blake3 digest of its bytes.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use blake3::hash;
use ffa_fold::{
    FoldError, FoldOptions, FoldedArray, Shape2D, WrapOptions, fold, fold_stage,
    remainder_shuffle, wrap, wrap_masked,
};
use ffa_runtime::{
    RuntimeMode, TestLogEntry, TestLogLevel, TestResult, matrix_within_tolerance, now_unix_ms,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub fixture_root: PathBuf,
    pub artifact_root: PathBuf,
}

impl HarnessConfig {
    #[must_use]
    pub fn default_paths() -> Self {
        let fixture_root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures");
        Self {
            artifact_root: fixture_root.join("artifacts"),
            fixture_root,
        }
    }

    #[must_use]
    pub fn with_artifact_root(mut self, artifact_root: impl Into<PathBuf>) -> Self {
        self.artifact_root = artifact_root.into();
        self
    }

    #[must_use]
    pub fn artifact_dir_for(&self, packet_id: &str) -> PathBuf {
        self.artifact_root.join(packet_id)
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::default_paths()
    }
}

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("fixture load failed for {path}: {source}")]
    FixtureIo { path: PathBuf, source: io::Error },
    #[error("fixture parse failed for {path}: {source}")]
    FixtureParse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("artifact write failed for {path}: {source}")]
    ArtifactIo { path: PathBuf, source: io::Error },
    #[error("report serialization failed: {0}")]
    ReportSerialize(#[from] serde_json::Error),
}

/// Array literal used by fold cases.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FixtureInput {
    Rows { value: Vec<Vec<f64>> },
    Eye { rows: usize, cols: usize },
}

impl FixtureInput {
    pub fn materialize(&self) -> Result<FoldedArray, FoldError> {
        match self {
            Self::Rows { value } => FoldedArray::from_rows(value),
            Self::Eye { rows, cols } => FoldedArray::eye(*rows, *cols),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExpectedOutcome {
    Values {
        rows: Vec<Vec<f64>>,
        #[serde(default)]
        atol: f64,
    },
    Indices {
        rows: Vec<Vec<usize>>,
    },
    /// Wrapped data plus its validity mask; an absent mask expects none.
    Wrapped {
        rows: Vec<Vec<f64>>,
        #[serde(default)]
        mask: Option<Vec<Vec<bool>>>,
    },
    Error {
        error: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum FoldCase {
    Fold {
        case_id: String,
        mode: RuntimeMode,
        input: FixtureInput,
        expected: ExpectedOutcome,
    },
    FoldStage {
        case_id: String,
        stage: u32,
        input: FixtureInput,
        expected: ExpectedOutcome,
    },
    Wrap {
        case_id: String,
        sequence: Vec<f64>,
        #[serde(default)]
        valid: Option<Vec<bool>>,
        base_period: usize,
        fill_value: f64,
        pad_to_pow2: bool,
        expected: ExpectedOutcome,
    },
    RemainderShuffle {
        case_id: String,
        rows: usize,
        cols: usize,
        rem: usize,
        expected: ExpectedOutcome,
    },
}

impl FoldCase {
    #[must_use]
    pub fn case_id(&self) -> &str {
        match self {
            Self::Fold { case_id, .. }
            | Self::FoldStage { case_id, .. }
            | Self::Wrap { case_id, .. }
            | Self::RemainderShuffle { case_id, .. } => case_id,
        }
    }

    #[must_use]
    pub fn expected(&self) -> &ExpectedOutcome {
        match self {
            Self::Fold { expected, .. }
            | Self::FoldStage { expected, .. }
            | Self::Wrap { expected, .. }
            | Self::RemainderShuffle { expected, .. } => expected,
        }
    }

    fn execute(&self) -> Result<ActualOutcome, FoldError> {
        match self {
            Self::Fold { mode, input, .. } => {
                let options = FoldOptions::default().with_mode(*mode);
                let out = fold(&input.materialize()?, &options)?;
                Ok(ActualOutcome::Values(out.to_rows()))
            }
            Self::FoldStage { stage, input, .. } => {
                let out = fold_stage(&input.materialize()?, *stage)?;
                Ok(ActualOutcome::Values(out.to_rows()))
            }
            Self::Wrap {
                sequence,
                valid,
                base_period,
                fill_value,
                pad_to_pow2,
                ..
            } => {
                let options = WrapOptions::default()
                    .with_fill_value(*fill_value)
                    .with_pad_to_pow2(*pad_to_pow2);
                let wrapped = match valid {
                    Some(valid) => wrap_masked(sequence, valid, *base_period, &options)?,
                    None => wrap(sequence, *base_period, &options)?,
                };
                let mask = wrapped.mask().map(|mask| {
                    mask.as_slice()
                        .chunks_exact(mask.shape().cols)
                        .map(<[bool]>::to_vec)
                        .collect()
                });
                Ok(ActualOutcome::Wrapped {
                    rows: wrapped.data().to_rows(),
                    mask,
                })
            }
            Self::RemainderShuffle {
                rows, cols, rem, ..
            } => {
                let map = remainder_shuffle(Shape2D::new(*rows, *cols), *rem)?;
                let indices = (0..*rows)
                    .filter_map(|row| map.row(row).map(<[usize]>::to_vec))
                    .collect();
                Ok(ActualOutcome::Indices(indices))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ActualOutcome {
    Values(Vec<Vec<f64>>),
    Indices(Vec<Vec<usize>>),
    Wrapped {
        rows: Vec<Vec<f64>>,
        mask: Option<Vec<Vec<bool>>>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PacketFixture {
    pub packet_id: String,
    pub family: String,
    pub cases: Vec<FoldCase>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseResult {
    pub case_id: String,
    pub passed: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PacketReport {
    pub packet_id: String,
    pub family: String,
    pub case_results: Vec<CaseResult>,
    pub passed_cases: usize,
    pub failed_cases: usize,
    pub generated_unix_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PacketSummary {
    pub packet_id: String,
    pub family: String,
    pub passed_cases: usize,
    pub failed_cases: usize,
    pub total_cases: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParityArtifact {
    pub report_path: PathBuf,
    pub digest_path: PathBuf,
    pub blake3: String,
}

pub fn load_packet(path: &Path) -> Result<PacketFixture, HarnessError> {
    let raw = fs::read_to_string(path).map_err(|source| HarnessError::FixtureIo {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| HarnessError::FixtureParse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn run_fold_packet(
    config: &HarnessConfig,
    fixture_name: &str,
) -> Result<PacketReport, HarnessError> {
    let fixture = load_packet(&config.fixture_root.join(fixture_name))?;
    Ok(evaluate_packet(&fixture))
}

/// Run every case of an already-loaded packet.
#[must_use]
pub fn evaluate_packet(fixture: &PacketFixture) -> PacketReport {
    let case_results = fixture
        .cases
        .iter()
        .map(|case| {
            let (passed, message) = compare(case.expected(), case.execute());
            CaseResult {
                case_id: case.case_id().to_owned(),
                passed,
                message,
            }
        })
        .collect();
    build_packet_report(fixture.packet_id.clone(), fixture.family.clone(), case_results)
}

fn compare(
    expected: &ExpectedOutcome,
    actual: Result<ActualOutcome, FoldError>,
) -> (bool, String) {
    match (expected, actual) {
        (ExpectedOutcome::Values { rows, atol }, Ok(ActualOutcome::Values(actual))) => {
            if matrix_within_tolerance(&actual, rows, *atol, 0.0) {
                (true, "output matched expected profiles".to_owned())
            } else {
                (false, format!("mismatch: expected {rows:?}, got {actual:?}"))
            }
        }
        (ExpectedOutcome::Indices { rows }, Ok(ActualOutcome::Indices(actual))) => {
            if &actual == rows {
                (true, "column map matched expected indices".to_owned())
            } else {
                (false, format!("mismatch: expected {rows:?}, got {actual:?}"))
            }
        }
        (
            ExpectedOutcome::Wrapped { rows, mask },
            Ok(ActualOutcome::Wrapped {
                rows: actual_rows,
                mask: actual_mask,
            }),
        ) => {
            if !matrix_within_tolerance(&actual_rows, rows, 0.0, 0.0) {
                (false, format!("mismatch: expected {rows:?}, got {actual_rows:?}"))
            } else if &actual_mask != mask {
                (
                    false,
                    format!("mask mismatch: expected {mask:?}, got {actual_mask:?}"),
                )
            } else {
                (true, "wrapped data and mask matched".to_owned())
            }
        }
        (ExpectedOutcome::Error { error }, Err(actual)) => {
            if error == &actual.to_string() {
                (true, "error matched expected contract".to_owned())
            } else {
                (false, format!("mismatch: expected error `{error}`, got `{actual}`"))
            }
        }
        (expected, result) => (
            false,
            format!("outcome kind mismatch: expected {expected:?}, got {result:?}"),
        ),
    }
}

fn build_packet_report(
    packet_id: String,
    family: String,
    case_results: Vec<CaseResult>,
) -> PacketReport {
    let passed_cases = case_results.iter().filter(|case| case.passed).count();
    let failed_cases = case_results.len() - passed_cases;
    PacketReport {
        packet_id,
        family,
        case_results,
        passed_cases,
        failed_cases,
        generated_unix_ms: now_unix_ms(),
    }
}

#[must_use]
pub fn packet_summary(report: &PacketReport) -> PacketSummary {
    PacketSummary {
        packet_id: report.packet_id.clone(),
        family: report.family.clone(),
        passed_cases: report.passed_cases,
        failed_cases: report.failed_cases,
        total_cases: report.case_results.len(),
    }
}

/// One structured log entry per case, tagged with the packet as fixture id.
#[must_use]
pub fn report_log_entries(report: &PacketReport) -> Vec<TestLogEntry> {
    report
        .case_results
        .iter()
        .map(|case| {
            let (level, result) = if case.passed {
                (TestLogLevel::Info, TestResult::Pass)
            } else {
                (TestLogLevel::Error, TestResult::Fail)
            };
            TestLogEntry::new(&case.case_id, "ffa_conformance", &case.message)
                .with_fixture(&report.packet_id)
                .with_level(level)
                .with_result(result)
        })
        .collect()
}

/// Write `parity_report.json` and its blake3 digest under the packet's artifact dir.
pub fn write_parity_report(
    config: &HarnessConfig,
    report: &PacketReport,
) -> Result<ParityArtifact, HarnessError> {
    let output_dir = config.artifact_dir_for(&report.packet_id);
    fs::create_dir_all(&output_dir).map_err(|source| HarnessError::ArtifactIo {
        path: output_dir.clone(),
        source,
    })?;

    let report_path = output_dir.join("parity_report.json");
    let report_bytes = serde_json::to_vec_pretty(report)?;
    fs::write(&report_path, &report_bytes).map_err(|source| HarnessError::ArtifactIo {
        path: report_path.clone(),
        source,
    })?;

    let digest = hash(&report_bytes).to_hex().to_string();
    let digest_path = output_dir.join("parity_report.blake3");
    fs::write(&digest_path, format!("{digest}  parity_report.json\n")).map_err(|source| {
        HarnessError::ArtifactIo {
            path: digest_path.clone(),
            source,
        }
    })?;

    Ok(ParityArtifact {
        report_path,
        digest_path,
        blake3: digest,
    })
}
