//! Error types for morphology operations with rich diagnostics.
//!
//! Every error carries:
//! - A machine-readable code (`MORPH-XXXX`)
//! - An [`ErrorKind`] telling the caller whether changing parameters can help
//! - A recovery suggestion
//! - Help text rendered by miette
//!
//! # Error Codes
//!
//! - `MORPH-1xxx`: parameter validation (rejected before any work)
//! - `MORPH-2xxx`: precondition mismatch (the input mesh cannot be processed)
//! - `MORPH-3xxx`: numerical failure (an intermediate result was invalid)
//! - `MORPH-4xxx`: quality degradation (output violated quality thresholds)
//!
//! # Example
//!
//! ```
//! use mesh_morph::{ErrorCode, ErrorKind, MorphError};
//!
//! let err = MorphError::SubdivisionLevelExceeded { requested: 6, max: 5 };
//! assert_eq!(err.code(), ErrorCode::SubdivisionLevelExceeded);
//! assert_eq!(err.code().as_str(), "MORPH-1001");
//! assert_eq!(err.kind(), ErrorKind::ParameterValidation);
//! ```

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for morphology operations.
pub type MorphResult<T> = Result<T, MorphError>;

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Parameter validation (1xxx)
    /// MORPH-1001: Subdivision levels outside `1..=max_levels`
    SubdivisionLevelExceeded = 1001,
    /// MORPH-1002: Smoothing iterations outside `1..=max_iterations`
    InvalidIterationCount = 1002,
    /// MORPH-1003: Taubin lambda/mu pair rejected
    TaubinParametersInvalid = 1003,
    /// MORPH-1004: Generic out-of-range parameter
    InvalidParameter = 1004,
    /// MORPH-1005: Original and deformed control points differ in count
    CageControlPointMismatch = 1005,
    /// MORPH-1006: Fewer control points than a trilinear cage needs
    InsufficientCagePoints = 1006,
    /// MORPH-1007: Remesh target edge length out of range
    RemeshTargetEdgeLengthInvalid = 1007,
    /// MORPH-1008: Remesh iterations outside `1..=max_iterations`
    RemeshIterationLimitExceeded = 1008,

    // Precondition mismatch (2xxx)
    /// MORPH-2001: Loop subdivision on a mesh with non-triangle faces
    LoopRequiresTriangles = 2001,
    /// MORPH-2002: Butterfly subdivision on a mesh with non-triangle faces
    ButterflyRequiresTriangles = 2002,
    /// MORPH-2003: Mesh has no vertices or faces
    EmptyMesh = 2003,
    /// MORPH-2004: Face references a vertex that does not exist
    InvalidVertexIndex = 2004,
    /// MORPH-2005: Vertex has NaN or infinite coordinate
    InvalidCoordinate = 2005,
    /// MORPH-2006: Bounding box is degenerate
    DegenerateBounds = 2006,

    // Numerical failure (3xxx)
    /// MORPH-3001: Smoothing produced non-finite positions
    SmoothingConvergenceFailed = 3001,
    /// MORPH-3002: Cage deformation could not be evaluated
    CageDeformFailed = 3002,
    /// MORPH-3003: Remeshing produced an invalid mesh
    RemeshingFailed = 3003,

    // Quality degradation (4xxx)
    /// MORPH-4001: Subdivision output violated quality thresholds
    SubdivisionFailed = 4001,
}

impl ErrorCode {
    /// Returns the error code as a string in the format `MORPH-XXXX`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::SubdivisionLevelExceeded => "MORPH-1001",
            ErrorCode::InvalidIterationCount => "MORPH-1002",
            ErrorCode::TaubinParametersInvalid => "MORPH-1003",
            ErrorCode::InvalidParameter => "MORPH-1004",
            ErrorCode::CageControlPointMismatch => "MORPH-1005",
            ErrorCode::InsufficientCagePoints => "MORPH-1006",
            ErrorCode::RemeshTargetEdgeLengthInvalid => "MORPH-1007",
            ErrorCode::RemeshIterationLimitExceeded => "MORPH-1008",
            ErrorCode::LoopRequiresTriangles => "MORPH-2001",
            ErrorCode::ButterflyRequiresTriangles => "MORPH-2002",
            ErrorCode::EmptyMesh => "MORPH-2003",
            ErrorCode::InvalidVertexIndex => "MORPH-2004",
            ErrorCode::InvalidCoordinate => "MORPH-2005",
            ErrorCode::DegenerateBounds => "MORPH-2006",
            ErrorCode::SmoothingConvergenceFailed => "MORPH-3001",
            ErrorCode::CageDeformFailed => "MORPH-3002",
            ErrorCode::RemeshingFailed => "MORPH-3003",
            ErrorCode::SubdivisionFailed => "MORPH-4001",
        }
    }

    /// The kind encoded in the code's thousands digit.
    pub fn kind(&self) -> ErrorKind {
        match *self as u32 / 1000 {
            1 => ErrorKind::ParameterValidation,
            2 => ErrorKind::PreconditionMismatch,
            3 => ErrorKind::NumericalFailure,
            _ => ErrorKind::QualityDegradation,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Broad category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Out-of-range parameters; nothing was computed.
    ParameterValidation,
    /// The input mesh does not meet the operation's requirements.
    PreconditionMismatch,
    /// An intermediate mesh was numerically invalid and was discarded.
    NumericalFailure,
    /// The output violated configured quality thresholds.
    QualityDegradation,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::ParameterValidation => "parameter validation",
            ErrorKind::PreconditionMismatch => "precondition mismatch",
            ErrorKind::NumericalFailure => "numerical failure",
            ErrorKind::QualityDegradation => "quality degradation",
        };
        f.write_str(s)
    }
}

/// Recovery suggestions for morphology errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoverySuggestion {
    /// Adjust parameters for the operation.
    AdjustParameters { parameters: Vec<(String, String)> },
    /// Triangulate the mesh before retrying.
    Triangulate,
    /// Check the input mesh for issues.
    CheckSourceMesh { checks: Vec<String> },
    /// Use a different scheme for the operation.
    UseDifferentScheme { suggested: Vec<String> },
    /// No automatic recovery available.
    None,
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoverySuggestion::AdjustParameters { parameters } => {
                let params: Vec<String> = parameters
                    .iter()
                    .map(|(k, v)| format!("{} = {}", k, v))
                    .collect();
                write!(f, "Try adjusting: {}", params.join(", "))
            }
            RecoverySuggestion::Triangulate => {
                write!(f, "Triangulate the mesh (split quads) and retry")
            }
            RecoverySuggestion::CheckSourceMesh { checks } => {
                write!(f, "Check the source mesh for: {}", checks.join(", "))
            }
            RecoverySuggestion::UseDifferentScheme { suggested } => {
                write!(f, "Try a different scheme: {}", suggested.join(", "))
            }
            RecoverySuggestion::None => write!(f, "No automatic recovery available"),
        }
    }
}

/// Location information for morphology errors.
#[derive(Debug, Clone, PartialEq)]
pub enum MeshLocation {
    Vertex { index: usize },
    Face { index: usize },
    /// Iteration of an iterative engine.
    Iteration { index: usize },
    /// Subdivision level (1-based).
    Level { index: u32 },
}

impl std::fmt::Display for MeshLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MeshLocation::Vertex { index } => write!(f, "vertex {}", index),
            MeshLocation::Face { index } => write!(f, "face {}", index),
            MeshLocation::Iteration { index } => write!(f, "iteration {}", index),
            MeshLocation::Level { index } => write!(f, "subdivision level {}", index),
        }
    }
}

/// Errors that can occur during morphology operations.
#[derive(Debug, Error, Diagnostic)]
pub enum MorphError {
    #[error("subdivision levels {requested} outside allowed range 1..={max}")]
    #[diagnostic(
        code(morph::params::subdivision_levels),
        help("Each level quadruples the face count. Use fewer levels or raise subdivision.max_levels.")
    )]
    SubdivisionLevelExceeded { requested: u32, max: u32 },

    #[error("iteration count {requested} outside allowed range 1..={max}")]
    #[diagnostic(
        code(morph::params::iterations),
        help("Choose at least one iteration and stay within smoothing.max_iterations.")
    )]
    InvalidIterationCount { requested: usize, max: usize },

    #[error("invalid Taubin parameters: lambda = {lambda}, mu = {mu}")]
    #[diagnostic(
        code(morph::params::taubin),
        help("Taubin smoothing needs lambda > 0 and mu < -lambda, e.g. lambda = 0.5, mu = -0.53.")
    )]
    TaubinParametersInvalid { lambda: f64, mu: f64 },

    #[error("invalid parameter {name}: {details}")]
    #[diagnostic(code(morph::params::invalid))]
    InvalidParameter { name: String, details: String },

    #[error(
        "cage control point count mismatch: {original} original vs {deformed} deformed"
    )]
    #[diagnostic(
        code(morph::params::cage_mismatch),
        help("The deformed control points must correspond one-to-one with the original ones.")
    )]
    CageControlPointMismatch { original: usize, deformed: usize },

    #[error("cage has {count} control points, at least {required} are required")]
    #[diagnostic(
        code(morph::params::cage_points),
        help("A trilinear cage needs its 8 corner points.")
    )]
    InsufficientCagePoints { count: usize, required: usize },

    #[error("target edge length {target} outside valid range [{min}, {max}]")]
    #[diagnostic(
        code(morph::params::remesh_target),
        help("The lower bound scales with the model tolerance and the upper bound with the bounding box diagonal.")
    )]
    RemeshTargetEdgeLengthInvalid { target: f64, min: f64, max: f64 },

    #[error("remesh iteration count {requested} outside allowed range 1..={max}")]
    #[diagnostic(code(morph::params::remesh_iterations))]
    RemeshIterationLimitExceeded { requested: usize, max: usize },

    #[error("Loop subdivision requires a triangle mesh, found {non_triangle_faces} non-triangle faces")]
    #[diagnostic(
        code(morph::precondition::loop_triangles),
        help("Triangulate the mesh first.")
    )]
    LoopRequiresTriangles { non_triangle_faces: usize },

    #[error(
        "Butterfly subdivision requires a triangle mesh, found {non_triangle_faces} non-triangle faces"
    )]
    #[diagnostic(
        code(morph::precondition::butterfly_triangles),
        help("Triangulate the mesh first.")
    )]
    ButterflyRequiresTriangles { non_triangle_faces: usize },

    #[error("mesh is empty: {details}")]
    #[diagnostic(
        code(morph::precondition::empty),
        help("The mesh must have at least one vertex and one face.")
    )]
    EmptyMesh { details: String },

    #[error(
        "invalid vertex index: face {face_index} references vertex {vertex_index}, but mesh only has {vertex_count} vertices"
    )]
    #[diagnostic(code(morph::precondition::vertex_index))]
    InvalidVertexIndex {
        face_index: usize,
        vertex_index: u32,
        vertex_count: usize,
    },

    #[error("invalid coordinate at vertex {vertex_index}: {coordinate} is {value}")]
    #[diagnostic(
        code(morph::precondition::coordinate),
        help("Check the source data for NaN or infinite values.")
    )]
    InvalidCoordinate {
        vertex_index: usize,
        coordinate: &'static str,
        value: f64,
    },

    #[error("degenerate bounding box (diagonal {diagonal})")]
    #[diagnostic(
        code(morph::precondition::bounds),
        help("All vertices coincide; the mesh has no extent.")
    )]
    DegenerateBounds { diagonal: f64 },

    #[error("smoothing failed at iteration {iteration}: {details}")]
    #[diagnostic(
        code(morph::numeric::smoothing),
        help("Lower the step size (lambda or time_step) or use fewer iterations.")
    )]
    SmoothingConvergenceFailed { iteration: usize, details: String },

    #[error("cage deformation failed: {details}")]
    #[diagnostic(code(morph::numeric::cage))]
    CageDeformFailed { details: String },

    #[error("remeshing failed: {details}")]
    #[diagnostic(
        code(morph::numeric::remesh),
        help("Try adjusting the target edge length or cleaning the mesh first.")
    )]
    RemeshingFailed { details: String },

    #[error("subdivision failed at level {level}: {details}")]
    #[diagnostic(
        code(morph::quality::subdivision),
        help("The refined mesh violates the quality thresholds. Use fewer levels or relax quality thresholds.")
    )]
    SubdivisionFailed { level: u32, details: String },
}

impl MorphError {
    /// Returns the machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            MorphError::SubdivisionLevelExceeded { .. } => ErrorCode::SubdivisionLevelExceeded,
            MorphError::InvalidIterationCount { .. } => ErrorCode::InvalidIterationCount,
            MorphError::TaubinParametersInvalid { .. } => ErrorCode::TaubinParametersInvalid,
            MorphError::InvalidParameter { .. } => ErrorCode::InvalidParameter,
            MorphError::CageControlPointMismatch { .. } => ErrorCode::CageControlPointMismatch,
            MorphError::InsufficientCagePoints { .. } => ErrorCode::InsufficientCagePoints,
            MorphError::RemeshTargetEdgeLengthInvalid { .. } => {
                ErrorCode::RemeshTargetEdgeLengthInvalid
            }
            MorphError::RemeshIterationLimitExceeded { .. } => {
                ErrorCode::RemeshIterationLimitExceeded
            }
            MorphError::LoopRequiresTriangles { .. } => ErrorCode::LoopRequiresTriangles,
            MorphError::ButterflyRequiresTriangles { .. } => ErrorCode::ButterflyRequiresTriangles,
            MorphError::EmptyMesh { .. } => ErrorCode::EmptyMesh,
            MorphError::InvalidVertexIndex { .. } => ErrorCode::InvalidVertexIndex,
            MorphError::InvalidCoordinate { .. } => ErrorCode::InvalidCoordinate,
            MorphError::DegenerateBounds { .. } => ErrorCode::DegenerateBounds,
            MorphError::SmoothingConvergenceFailed { .. } => ErrorCode::SmoothingConvergenceFailed,
            MorphError::CageDeformFailed { .. } => ErrorCode::CageDeformFailed,
            MorphError::RemeshingFailed { .. } => ErrorCode::RemeshingFailed,
            MorphError::SubdivisionFailed { .. } => ErrorCode::SubdivisionFailed,
        }
    }

    /// Returns the broad category of the error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.code().kind()
    }

    /// Returns a recovery suggestion for this error.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self {
            MorphError::SubdivisionLevelExceeded { max, .. } => {
                RecoverySuggestion::AdjustParameters {
                    parameters: vec![("levels".into(), format!("between 1 and {}", max))],
                }
            }
            MorphError::InvalidIterationCount { max, .. }
            | MorphError::RemeshIterationLimitExceeded { max, .. } => {
                RecoverySuggestion::AdjustParameters {
                    parameters: vec![("iterations".into(), format!("between 1 and {}", max))],
                }
            }
            MorphError::TaubinParametersInvalid { .. } => RecoverySuggestion::AdjustParameters {
                parameters: vec![
                    ("lambda".into(), "0.5".into()),
                    ("mu".into(), "-0.53".into()),
                ],
            },
            MorphError::InvalidParameter { name, .. } => RecoverySuggestion::AdjustParameters {
                parameters: vec![(name.clone(), "a finite, positive value".into())],
            },
            MorphError::CageControlPointMismatch { original, .. } => {
                RecoverySuggestion::AdjustParameters {
                    parameters: vec![("deformed control points".into(), original.to_string())],
                }
            }
            MorphError::InsufficientCagePoints { required, .. } => {
                RecoverySuggestion::AdjustParameters {
                    parameters: vec![("control points".into(), format!("at least {}", required))],
                }
            }
            MorphError::RemeshTargetEdgeLengthInvalid { min, max, .. } => {
                RecoverySuggestion::AdjustParameters {
                    parameters: vec![(
                        "target_edge_length".into(),
                        format!("between {:.3e} and {:.3e}", min, max),
                    )],
                }
            }
            MorphError::LoopRequiresTriangles { .. }
            | MorphError::ButterflyRequiresTriangles { .. } => RecoverySuggestion::Triangulate,
            MorphError::EmptyMesh { .. } => RecoverySuggestion::CheckSourceMesh {
                checks: vec!["mesh has geometry".into()],
            },
            MorphError::InvalidVertexIndex { .. } => RecoverySuggestion::CheckSourceMesh {
                checks: vec!["face indices".into()],
            },
            MorphError::InvalidCoordinate { .. } => RecoverySuggestion::CheckSourceMesh {
                checks: vec!["coordinate values".into(), "export precision".into()],
            },
            MorphError::DegenerateBounds { .. } => RecoverySuggestion::CheckSourceMesh {
                checks: vec!["coincident vertices".into(), "model units".into()],
            },
            MorphError::SmoothingConvergenceFailed { .. } => {
                RecoverySuggestion::UseDifferentScheme {
                    suggested: vec!["taubin".into(), "uniform".into()],
                }
            }
            MorphError::CageDeformFailed { .. } => RecoverySuggestion::CheckSourceMesh {
                checks: vec!["cage bounding box volume".into()],
            },
            MorphError::RemeshingFailed { .. } => RecoverySuggestion::AdjustParameters {
                parameters: vec![("target_edge_length".into(), "try a larger value".into())],
            },
            MorphError::SubdivisionFailed { level, .. } => RecoverySuggestion::AdjustParameters {
                parameters: vec![("levels".into(), format!("at most {}", level.saturating_sub(1)))],
            },
        }
    }

    /// Returns location information if available.
    pub fn location(&self) -> Option<MeshLocation> {
        match self {
            MorphError::InvalidVertexIndex { face_index, .. } => Some(MeshLocation::Face {
                index: *face_index,
            }),
            MorphError::InvalidCoordinate { vertex_index, .. } => Some(MeshLocation::Vertex {
                index: *vertex_index,
            }),
            MorphError::SmoothingConvergenceFailed { iteration, .. } => {
                Some(MeshLocation::Iteration { index: *iteration })
            }
            MorphError::SubdivisionFailed { level, .. } => {
                Some(MeshLocation::Level { index: *level })
            }
            _ => None,
        }
    }

    // Constructor helpers for common error patterns

    /// Create an InvalidParameter error.
    pub fn invalid_parameter(name: impl Into<String>, details: impl Into<String>) -> Self {
        MorphError::InvalidParameter {
            name: name.into(),
            details: details.into(),
        }
    }

    /// Create an InvalidVertexIndex error.
    pub fn invalid_vertex_index(face_index: usize, vertex_index: u32, vertex_count: usize) -> Self {
        MorphError::InvalidVertexIndex {
            face_index,
            vertex_index,
            vertex_count,
        }
    }

    /// Create an InvalidCoordinate error.
    pub fn invalid_coordinate(vertex_index: usize, coordinate: &'static str, value: f64) -> Self {
        MorphError::InvalidCoordinate {
            vertex_index,
            coordinate,
            value,
        }
    }

    /// Create an EmptyMesh error.
    pub fn empty_mesh(details: impl Into<String>) -> Self {
        MorphError::EmptyMesh {
            details: details.into(),
        }
    }

    /// Create a SmoothingConvergenceFailed error.
    pub fn smoothing_failed(iteration: usize, details: impl Into<String>) -> Self {
        MorphError::SmoothingConvergenceFailed {
            iteration,
            details: details.into(),
        }
    }

    /// Create a CageDeformFailed error.
    pub fn cage_deform_failed(details: impl Into<String>) -> Self {
        MorphError::CageDeformFailed {
            details: details.into(),
        }
    }

    /// Create a RemeshingFailed error.
    pub fn remeshing_failed(details: impl Into<String>) -> Self {
        MorphError::RemeshingFailed {
            details: details.into(),
        }
    }

    /// Create a SubdivisionFailed error.
    pub fn subdivision_failed(level: u32, details: impl Into<String>) -> Self {
        MorphError::SubdivisionFailed {
            level,
            details: details.into(),
        }
    }
}
