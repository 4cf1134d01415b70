// Allow unused_assignments lint for error struct fields that are used in thiserror Display macros
// but appear as "never read" to the compiler.
#![allow(unused_assignments)]

//! Error types for the segmentation pipeline with rich diagnostics.
//!
//! Every stage fails fast: an error aborts the rest of the pipeline and is
//! returned to the caller unchanged. Nothing is retried internally because
//! every stage is deterministic for a given input.
//!
//! # Error Codes
//!
//! Each error has a unique code in the format `SEG-XXXX`:
//! - `SEG-1xxx`: Input errors (volume ingestion)
//! - `SEG-2xxx`: Configuration errors (unknown structure, bad parameters)
//! - `SEG-3xxx`: Segmentation errors (mask without an iso-surface)
//! - `SEG-4xxx`: Mesh errors (cleanup removed everything)
//! - `SEG-5xxx`: Export errors
//!
//! # Example
//!
//! ```
//! use anatomesh::{SegmentError, ErrorCode};
//!
//! let err = SegmentError::unknown_structure("spleen");
//! assert_eq!(err.code(), ErrorCode::UnknownStructure);
//! println!("{}: {}", err.code(), err.recovery_suggestion());
//! ```

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for segmentation operations.
pub type SegmentResult<T> = Result<T, SegmentError>;

/// Machine-readable error codes.
///
/// Codes follow the pattern `SEG-XXXX` where:
/// - 1xxx = Input errors
/// - 2xxx = Configuration errors
/// - 3xxx = Segmentation errors
/// - 4xxx = Mesh errors
/// - 5xxx = Export errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// SEG-1001: No volume data available
    InputAbsent = 1001,
    /// SEG-1002: Failed to read ingestion input
    IngestRead = 1002,
    /// SEG-1003: Failed to parse series metadata
    IngestParse = 1003,
    /// SEG-1004: Sample count does not match declared shape
    ShapeMismatch = 1004,

    /// SEG-2001: Unknown anatomical structure
    UnknownStructure = 2001,
    /// SEG-2002: Invalid pipeline parameter
    InvalidParameter = 2002,

    /// SEG-3001: Mask is entirely empty or entirely full
    EmptyOrFullSegmentation = 3001,

    /// SEG-4001: Cleanup removed all mesh content
    EmptyMesh = 4001,

    /// SEG-5001: Failed to write mesh
    ExportIo = 5001,
    /// SEG-5002: Unsupported export format
    UnsupportedFormat = 5002,
}

impl ErrorCode {
    /// Returns the error code as a string in the format `SEG-XXXX`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InputAbsent => "SEG-1001",
            ErrorCode::IngestRead => "SEG-1002",
            ErrorCode::IngestParse => "SEG-1003",
            ErrorCode::ShapeMismatch => "SEG-1004",
            ErrorCode::UnknownStructure => "SEG-2001",
            ErrorCode::InvalidParameter => "SEG-2002",
            ErrorCode::EmptyOrFullSegmentation => "SEG-3001",
            ErrorCode::EmptyMesh => "SEG-4001",
            ErrorCode::ExportIo => "SEG-5001",
            ErrorCode::UnsupportedFormat => "SEG-5002",
        }
    }

    /// True for errors caused by the caller's configuration rather than the data.
    pub fn is_configuration(&self) -> bool {
        matches!(self, ErrorCode::UnknownStructure | ErrorCode::InvalidParameter)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Recovery suggestions for segmentation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoverySuggestion {
    /// Check the input directory or metadata.
    CheckInput { checks: Vec<String> },
    /// Pick one of the supported structures.
    UseKnownStructure { supported: Vec<String> },
    /// Adjust parameters for the operation.
    AdjustParameters { parameters: Vec<(String, String)> },
    /// Check the output location.
    CheckOutput { checks: Vec<String> },
    /// No automatic recovery available.
    None,
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoverySuggestion::CheckInput { checks } => {
                write!(f, "Check the input for: {}", checks.join(", "))
            }
            RecoverySuggestion::UseKnownStructure { supported } => {
                write!(f, "Use one of: {}", supported.join(", "))
            }
            RecoverySuggestion::AdjustParameters { parameters } => {
                let params: Vec<String> = parameters
                    .iter()
                    .map(|(k, v)| format!("{} = {}", k, v))
                    .collect();
                write!(f, "Try adjusting: {}", params.join(", "))
            }
            RecoverySuggestion::CheckOutput { checks } => {
                write!(f, "Check the output location for: {}", checks.join(", "))
            }
            RecoverySuggestion::None => write!(f, "No automatic recovery available"),
        }
    }
}

/// Errors that can occur while turning a volume into a mesh.
#[derive(Debug, Error, Diagnostic)]
pub enum SegmentError {
    /// No volume data is available.
    #[error("no volume data available: {details}")]
    #[diagnostic(
        code(anatomesh::input::absent),
        help("Make sure the input directory contains slice files.")
    )]
    InputAbsent { details: String },

    /// Failed to read ingestion input.
    #[error("failed to read volume input {path}")]
    #[diagnostic(
        code(anatomesh::input::read),
        help("Check that the path exists and is readable.")
    )]
    IngestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Series metadata could not be parsed.
    #[error("failed to parse series metadata {path}: {details}")]
    #[diagnostic(
        code(anatomesh::input::parse),
        help("The series.json file must declare width, height and spacing.")
    )]
    IngestParse { path: PathBuf, details: String },

    /// The number of samples does not match the declared shape.
    #[error("shape mismatch: expected {expected} samples, found {actual}")]
    #[diagnostic(
        code(anatomesh::input::shape),
        help("Every slice must hold exactly width * height samples.")
    )]
    ShapeMismatch { expected: usize, actual: usize },

    /// Unknown anatomical structure key.
    #[error("unknown anatomical structure: {name:?}")]
    #[diagnostic(
        code(anatomesh::config::structure),
        help("Supported structures: bone, tissue, tumor, organ")
    )]
    UnknownStructure { name: String },

    /// A pipeline parameter is out of range.
    #[error("invalid parameter {parameter}: {details}")]
    #[diagnostic(code(anatomesh::config::parameter))]
    InvalidParameter {
        parameter: &'static str,
        details: String,
    },

    /// The final mask has no variation, so there is no iso-surface.
    #[error("segmentation is {}; adjust the thresholds or morphology parameters", fullness(.full))]
    #[diagnostic(
        code(anatomesh::segment::empty_or_full),
        help("The intensity window or the refinement radii do not suit this volume.")
    )]
    EmptyOrFullSegmentation { full: bool, voxel_count: usize },

    /// Cleanup removed every vertex or face.
    #[error("mesh is empty after cleanup: {details}")]
    #[diagnostic(code(anatomesh::mesh::empty))]
    EmptyMesh { details: String },

    /// The export collaborator could not persist the mesh.
    #[error("failed to write mesh to {path}")]
    #[diagnostic(
        code(anatomesh::export::io),
        help("Check that the directory exists and is writable")
    )]
    ExportIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The export path has an extension no writer handles.
    #[error("unsupported mesh format: {extension:?}")]
    #[diagnostic(code(anatomesh::export::format), help("Supported formats: STL, OBJ"))]
    UnsupportedFormat { extension: Option<String> },
}

fn fullness(full: &bool) -> &'static str {
    if *full { "full" } else { "empty" }
}

impl SegmentError {
    /// Returns the machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            SegmentError::InputAbsent { .. } => ErrorCode::InputAbsent,
            SegmentError::IngestRead { .. } => ErrorCode::IngestRead,
            SegmentError::IngestParse { .. } => ErrorCode::IngestParse,
            SegmentError::ShapeMismatch { .. } => ErrorCode::ShapeMismatch,
            SegmentError::UnknownStructure { .. } => ErrorCode::UnknownStructure,
            SegmentError::InvalidParameter { .. } => ErrorCode::InvalidParameter,
            SegmentError::EmptyOrFullSegmentation { .. } => ErrorCode::EmptyOrFullSegmentation,
            SegmentError::EmptyMesh { .. } => ErrorCode::EmptyMesh,
            SegmentError::ExportIo { .. } => ErrorCode::ExportIo,
            SegmentError::UnsupportedFormat { .. } => ErrorCode::UnsupportedFormat,
        }
    }

    /// Returns a recovery suggestion for this error.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self {
            SegmentError::InputAbsent { .. } => RecoverySuggestion::CheckInput {
                checks: vec!["slice files present".into(), "correct directory".into()],
            },
            SegmentError::IngestRead { .. } => RecoverySuggestion::CheckInput {
                checks: vec!["path exists".into(), "read permissions".into()],
            },
            SegmentError::IngestParse { .. } => RecoverySuggestion::CheckInput {
                checks: vec!["series.json syntax".into(), "required fields".into()],
            },
            SegmentError::ShapeMismatch { .. } => RecoverySuggestion::CheckInput {
                checks: vec!["slice dimensions".into(), "sample type".into()],
            },
            SegmentError::UnknownStructure { .. } => RecoverySuggestion::UseKnownStructure {
                supported: crate::profile::Structure::ALL
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            },
            SegmentError::InvalidParameter { parameter, .. } => {
                RecoverySuggestion::AdjustParameters {
                    parameters: vec![((*parameter).into(), "use a finite, non-negative value".into())],
                }
            }
            SegmentError::EmptyOrFullSegmentation { full, .. } => {
                let hint = if *full { "narrow the window" } else { "widen the window" };
                RecoverySuggestion::AdjustParameters {
                    parameters: vec![
                        ("low/high".into(), hint.into()),
                        ("min_component_voxels".into(), "try a smaller value".into()),
                    ],
                }
            }
            SegmentError::EmptyMesh { .. } => RecoverySuggestion::AdjustParameters {
                parameters: vec![("degenerate_area_threshold".into(), "try a smaller value".into())],
            },
            SegmentError::ExportIo { .. } => RecoverySuggestion::CheckOutput {
                checks: vec!["directory exists".into(), "write permissions".into()],
            },
            SegmentError::UnsupportedFormat { .. } => RecoverySuggestion::CheckOutput {
                checks: vec!["file extension is .stl or .obj".into()],
            },
        }
    }

    // Constructor helpers for common error patterns

    /// Create an InputAbsent error.
    pub fn input_absent(details: impl Into<String>) -> Self {
        SegmentError::InputAbsent {
            details: details.into(),
        }
    }

    /// Create an UnknownStructure error.
    pub fn unknown_structure(name: impl Into<String>) -> Self {
        SegmentError::UnknownStructure { name: name.into() }
    }

    /// Create an InvalidParameter error.
    pub fn invalid_parameter(parameter: &'static str, details: impl Into<String>) -> Self {
        SegmentError::InvalidParameter {
            parameter,
            details: details.into(),
        }
    }

    /// Create an EmptyMesh error.
    pub fn empty_mesh(details: impl Into<String>) -> Self {
        SegmentError::EmptyMesh {
            details: details.into(),
        }
    }

    /// Create an ExportIo error.
    pub fn export_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SegmentError::ExportIo {
            path: path.into(),
            source,
        }
    }

    /// Create an IngestRead error.
    pub fn ingest_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SegmentError::IngestRead {
            path: path.into(),
            source,
        }
    }

    /// Create an IngestParse error.
    pub fn ingest_parse(path: impl Into<PathBuf>, details: impl Into<String>) -> Self {
        SegmentError::IngestParse {
            path: path.into(),
            details: details.into(),
        }
    }
}
