//! Engine error taxonomy and the stable result codes handed to callers.

use std::path::PathBuf;

use thiserror::Error;

use crate::framework::{hresult, FrameworkError, PinDirection};
use crate::registry::ComponentRole;

pub const ERROR_FILE_NAME_NOT_DEFINED: i32 = -100;
pub const ERROR_FILE_NOT_FOUND: i32 = -101;
pub const ERROR_VIDEO_OUTPUT_WINDOW_NOT_DEFINED: i32 = -102;
pub const ERROR_NOTHING_RENDERED: i32 = -103;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    // Preconditions
    #[error("File name not defined")]
    FileNameMissing,
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("Video output window not defined")]
    OutputSurfaceMissing,

    // Fatal build errors
    #[error("Neither a video nor an audio chain could be rendered")]
    NothingRendered,
    #[error("Source failed to load file: {0}")]
    SourceLoad(FrameworkError),
    #[error("Cannot connect {from} to {to}: {source}")]
    ConnectionRejected {
        from: String,
        to: String,
        source: FrameworkError,
    },
    #[error("No {role} could be instantiated (0x{code:08X})")]
    ComponentUnavailable { role: ComponentRole, code: i32 },
    #[error("{component} has no {direction} pin matching {selector}")]
    PinNotFound {
        component: String,
        direction: PinDirection,
        selector: String,
    },
    #[error("Framework error while {context}: {source}")]
    Framework {
        context: &'static str,
        source: FrameworkError,
    },

    // Caller errors
    #[error("No graph has been built")]
    NotBuilt,
    #[error("No video renderer in the graph")]
    NoVideoSurface,
}

impl GraphError {
    pub(crate) fn framework(context: &'static str, source: FrameworkError) -> Self {
        Self::Framework { context, source }
    }

    /// Stable integer code: the engine's own negative codes for its
    /// taxonomy, the framework's code passed through for everything the
    /// framework reported.
    pub fn code(&self) -> i32 {
        match self {
            Self::FileNameMissing => ERROR_FILE_NAME_NOT_DEFINED,
            Self::FileNotFound(_) => ERROR_FILE_NOT_FOUND,
            Self::OutputSurfaceMissing => ERROR_VIDEO_OUTPUT_WINDOW_NOT_DEFINED,
            Self::NothingRendered => ERROR_NOTHING_RENDERED,
            Self::SourceLoad(e) => e.code,
            Self::ConnectionRejected { source, .. } => source.code,
            Self::ComponentUnavailable { code, .. } => *code,
            Self::PinNotFound { .. } => hresult::E_POINTER,
            Self::Framework { source, .. } => source.code,
            Self::NotBuilt => hresult::E_UNEXPECTED,
            Self::NoVideoSurface => hresult::E_NOINTERFACE,
        }
    }

    /// Preconditions are checked before anything is allocated
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::FileNameMissing | Self::FileNotFound(_) | Self::OutputSurfaceMissing
        )
    }
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Result code view of a build, for callers that want the small integer
/// taxonomy rather than a typed error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Ok,
    FileNameMissing,
    FileNotFound,
    OutputSurfaceMissing,
    NothingRendered,
    /// Raw framework code, opaque
    Framework(i32),
}

impl ResultCode {
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::Ok => hresult::S_OK,
            Self::FileNameMissing => ERROR_FILE_NAME_NOT_DEFINED,
            Self::FileNotFound => ERROR_FILE_NOT_FOUND,
            Self::OutputSurfaceMissing => ERROR_VIDEO_OUTPUT_WINDOW_NOT_DEFINED,
            Self::NothingRendered => ERROR_NOTHING_RENDERED,
            Self::Framework(code) => *code,
        }
    }

    pub fn from_i32(code: i32) -> Self {
        match code {
            hresult::S_OK => Self::Ok,
            ERROR_FILE_NAME_NOT_DEFINED => Self::FileNameMissing,
            ERROR_FILE_NOT_FOUND => Self::FileNotFound,
            ERROR_VIDEO_OUTPUT_WINDOW_NOT_DEFINED => Self::OutputSurfaceMissing,
            ERROR_NOTHING_RENDERED => Self::NothingRendered,
            other => Self::Framework(other),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl From<&GraphError> for ResultCode {
    fn from(err: &GraphError) -> Self {
        Self::from_i32(err.code())
    }
}

impl<T> From<&GraphResult<T>> for ResultCode {
    fn from(result: &GraphResult<T>) -> Self {
        match result {
            Ok(_) => Self::Ok,
            Err(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_codes() {
        assert_eq!(GraphError::FileNameMissing.code(), -100);
        assert_eq!(GraphError::FileNotFound("x.mp4".into()).code(), -101);
        assert_eq!(GraphError::OutputSurfaceMissing.code(), -102);
        assert_eq!(GraphError::NothingRendered.code(), -103);
        assert!(GraphError::OutputSurfaceMissing.is_precondition());
        assert!(!GraphError::NothingRendered.is_precondition());
    }

    #[test]
    fn test_framework_code_passthrough() {
        let err = GraphError::SourceLoad(FrameworkError::new(hresult::E_FILE_NOT_FOUND, "gone"));
        assert_eq!(err.code(), hresult::E_FILE_NOT_FOUND);
        assert_eq!(
            ResultCode::from(&err),
            ResultCode::Framework(hresult::E_FILE_NOT_FOUND)
        );
    }

    #[test]
    fn test_result_code_round_trips_taxonomy() {
        for code in [
            ResultCode::Ok,
            ResultCode::FileNameMissing,
            ResultCode::FileNotFound,
            ResultCode::OutputSurfaceMissing,
            ResultCode::NothingRendered,
        ] {
            assert_eq!(ResultCode::from_i32(code.as_i32()), code);
        }
    }

    #[test]
    fn test_result_code_from_result() {
        let ok: GraphResult<()> = Ok(());
        assert!(ResultCode::from(&ok).is_ok());
        let err: GraphResult<()> = Err(GraphError::NothingRendered);
        assert_eq!(ResultCode::from(&err), ResultCode::NothingRendered);
    }
}
