//! # reelgraph core
//!
//! Filter graph construction, pin negotiation and transport control for
//! single-file media playback.
//!
//! A [`Pipeline`] takes a file path and an output surface, pulls components
//! out of the [`ComponentRegistry`], wires them
//! source → splitter → (video chain | audio chain) through the negotiator,
//! and hands back transport controls. Partial failure of one chain is
//! tolerated; everything else unwinds completely before the error returns.
//!
//! ```text
//! ┌────────┐   ┌──────────┐   ┌───────────────┐   ┌────────────────┐
//! │ Source │──▶│ Splitter │─┬▶│ Video decoder │──▶│ Video renderer │
//! └────────┘   └──────────┘ │ └───────────────┘   └────────────────┘
//!                           │ ┌───────────────┐   ┌────────────────┐
//!                           └▶│ Audio decoder │──▶│ Audio renderer │
//!                             └───────────────┘   └────────────────┘
//! ```
//!
//! The media framework itself sits behind [`MediaFramework`]. Two ship here:
//! [`sim`], an in-process reference framework, and `dshow` (Windows only),
//! DirectShow over COM.

// ============================================================================
// Engine
// ============================================================================
pub mod arena;
pub mod builder;
pub mod graph;
pub mod lifecycle;
pub mod negotiate;
pub mod registry;
pub mod transport;

// ============================================================================
// Seams / Ambient
// ============================================================================
pub mod config;
pub mod error;
pub mod framework;
pub mod poller;
pub mod surface;

// ============================================================================
// Frameworks
// ============================================================================
#[cfg(feature = "sim")]
pub mod sim;

#[cfg(windows)]
pub mod dshow;

pub use arena::{ChainKind, ComponentArena, ComponentId, PipelineComponent};
pub use builder::{BuildReport, SubChainOutcome};
pub use config::{ConfigError, EngineConfig};
pub use error::{GraphError, GraphResult, ResultCode};
pub use framework::{
    AudioControl, FilterGraph, FrameworkError, MajorType, MediaControl, MediaFramework,
    MediaType, PinDirection, PositionControl, VideoWindow, WindowStyle,
};
pub use graph::{BuildState, Pipeline, SubChain};
pub use negotiate::{Connection, PinSelector};
pub use poller::{CancelToken, ProgressPoller};
pub use registry::{ClassId, ComponentDescriptor, ComponentRegistry, ComponentRole};
pub use surface::{StaticSurface, NativeSurface, OutputSurface, Rect};
pub use transport::{PlaybackState, PositionProbe, TransportState};

// ============================================================================
// Version
// ============================================================================
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
