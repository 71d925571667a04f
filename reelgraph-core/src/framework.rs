//! Media framework seam
//!
//! The engine never talks to a concrete media framework directly. It drives a
//! [`FilterGraph`] produced by a [`MediaFramework`], and every capability the
//! assembled graph might expose (run control, seeking, the video window,
//! volume) comes back as an `Option` so that absence is explicit.
//!
//! Releasing a filter or pin is dropping its handle. Handles are not `Clone`,
//! so each one can be released exactly once.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::registry::ComponentDescriptor;
use crate::surface::Rect;

// ============================================================================
// Result codes (HRESULT values shared by every framework)
// ============================================================================

pub mod hresult {
    pub const S_OK: i32 = 0;
    pub const S_FALSE: i32 = 1;

    pub const E_NOINTERFACE: i32 = 0x8000_4002_u32 as i32;
    pub const E_POINTER: i32 = 0x8000_4003_u32 as i32;
    pub const E_FAIL: i32 = 0x8000_4005_u32 as i32;
    pub const E_UNEXPECTED: i32 = 0x8000_FFFF_u32 as i32;

    pub const REGDB_E_CLASSNOTREG: i32 = 0x8004_0154_u32 as i32;
    /// HRESULT_FROM_WIN32(ERROR_FILE_NOT_FOUND)
    pub const E_FILE_NOT_FOUND: i32 = 0x8007_0002_u32 as i32;

    pub const VFW_E_ALREADY_CONNECTED: i32 = 0x8004_0204_u32 as i32;
    pub const VFW_E_NO_ACCEPTABLE_TYPES: i32 = 0x8004_0207_u32 as i32;
    pub const VFW_E_INVALID_DIRECTION: i32 = 0x8004_0208_u32 as i32;
    pub const VFW_E_NOT_IN_GRAPH: i32 = 0x8004_022F_u32 as i32;
    pub const VFW_E_UNKNOWN_FILE_TYPE: i32 = 0x8004_0240_u32 as i32;
    pub const VFW_E_UNSUPPORTED_STREAM: i32 = 0x8004_0265_u32 as i32;
}

/// Error reported by the underlying framework: an opaque code plus whatever
/// text the framework attached to it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (0x{code:08X})")]
pub struct FrameworkError {
    pub code: i32,
    pub message: String,
}

impl FrameworkError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

pub type FrameworkResult<T> = Result<T, FrameworkError>;

// ============================================================================
// Pins and media types
// ============================================================================

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinDirection {
    Input = 0,
    Output = 1,
}

impl fmt::Display for PinDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
        }
    }
}

/// Major type of a media stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MajorType {
    Video,
    Audio,
    /// Unparsed byte stream (file source output)
    Stream,
    Other,
}

impl MajorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Stream => "stream",
            Self::Other => "other",
        }
    }
}

/// Media type offered by an output pin or accepted by an input pin
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaType {
    pub major: MajorType,
    pub subtype: String,
}

impl MediaType {
    pub fn new(major: MajorType, subtype: impl Into<String>) -> Self {
        Self {
            major,
            subtype: subtype.into(),
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.major.as_str(), self.subtype)
    }
}

// ============================================================================
// Window style
// ============================================================================

bitflags::bitflags! {
    /// Window style bits applied to the video window when it is parented to
    /// the output surface (Win32 `WS_*` values).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WindowStyle: u32 {
        const CHILD = 0x4000_0000;
        const CLIP_SIBLINGS = 0x0400_0000;
        const CLIP_CHILDREN = 0x0200_0000;
    }
}

impl WindowStyle {
    /// Style for a video window embedded in a host surface
    pub fn embedded() -> Self {
        Self::CHILD | Self::CLIP_CHILDREN | Self::CLIP_SIBLINGS
    }
}

// ============================================================================
// Framework traits
// ============================================================================

/// Entry point of a media framework: hands out empty filter graphs.
pub trait MediaFramework {
    type Graph: FilterGraph;

    /// Name for logging
    fn name(&self) -> &str;

    /// Create an empty graph container
    fn create_graph(&self) -> FrameworkResult<Self::Graph>;
}

/// A filter graph container.
///
/// `Filter` and `Pin` are owned handles; dropping one releases it.
pub trait FilterGraph {
    type Filter;
    type Pin;

    /// Instantiate the component a descriptor points at. The new filter is
    /// not yet part of the graph.
    fn instantiate(&mut self, descriptor: &ComponentDescriptor) -> FrameworkResult<Self::Filter>;

    fn add_filter(&mut self, filter: &Self::Filter, label: &str) -> FrameworkResult<()>;

    /// Remove a filter, breaking any connection it holds
    fn remove_filter(&mut self, filter: &Self::Filter) -> FrameworkResult<()>;

    /// Pins of one direction, in the order the filter enumerates them
    fn pins(&self, filter: &Self::Filter, direction: PinDirection) -> FrameworkResult<Vec<Self::Pin>>;

    /// Advertised pin name (DirectShow pin id)
    fn pin_name(&self, pin: &Self::Pin) -> String;

    /// Direct connection, no intermediate filters. Atomic: on error neither
    /// pin is left holding a negotiated type.
    fn connect(&mut self, output: &Self::Pin, input: &Self::Pin) -> FrameworkResult<()>;

    /// Point a file source filter at a file
    fn load_source(&mut self, source: &Self::Filter, path: &Path) -> FrameworkResult<()>;

    fn media_control(&self) -> Option<Box<dyn MediaControl>>;

    fn position_control(&self) -> Option<Arc<dyn PositionControl>>;

    fn video_window(&self) -> Option<Box<dyn VideoWindow>>;

    fn audio_control(&self) -> Option<Box<dyn AudioControl>>;
}

/// Run/pause/stop of the whole graph
pub trait MediaControl {
    fn run(&self) -> FrameworkResult<()>;
    fn pause(&self) -> FrameworkResult<()>;
    fn stop(&self) -> FrameworkResult<()>;
}

/// Seeking in the graph's native time base (seconds for the shipped
/// frameworks). Readable from a polling thread, hence `Send + Sync`.
pub trait PositionControl: Send + Sync {
    fn duration(&self) -> FrameworkResult<f64>;
    fn current_position(&self) -> FrameworkResult<f64>;
    fn set_current_position(&self, position: f64) -> FrameworkResult<()>;
}

/// Video window owned by the video renderer
pub trait VideoWindow {
    fn set_owner(&self, handle: isize) -> FrameworkResult<()>;
    fn set_message_drain(&self, handle: isize) -> FrameworkResult<()>;
    fn set_window_style(&self, style: WindowStyle) -> FrameworkResult<()>;
    fn set_window_position(&self, rect: Rect) -> FrameworkResult<()>;
    fn set_visible(&self, visible: bool) -> FrameworkResult<()>;
    /// Native size of the decoded video
    fn video_size(&self) -> FrameworkResult<(u32, u32)>;
}

/// Volume of the audio renderer, in hundredths of a decibel
/// (0 = full volume, -10_000 = silence)
pub trait AudioControl {
    fn volume(&self) -> FrameworkResult<i32>;
    fn set_volume(&self, volume: i32) -> FrameworkResult<()>;
}

pub const VOLUME_FULL: i32 = 0;
pub const VOLUME_SILENT: i32 = -10_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framework_error_formats_code_as_hex() {
        let err = FrameworkError::new(hresult::VFW_E_NO_ACCEPTABLE_TYPES, "no common type");
        assert_eq!(err.to_string(), "no common type (0x80040207)");
    }

    #[test]
    fn test_embedded_style() {
        let style = WindowStyle::embedded();
        assert!(style.contains(WindowStyle::CHILD));
        assert_eq!(style.bits(), 0x4600_0000);
    }

    #[test]
    fn test_media_type_display() {
        let mt = MediaType::new(MajorType::Video, "avc1");
        assert_eq!(mt.to_string(), "video/avc1");
    }
}
