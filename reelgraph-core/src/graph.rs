//! # Pipeline
//!
//! One playback session: the filter graph, the components that live in it,
//! the sub-chains that made it to the renderers and the capabilities the
//! finished graph exposes. Construction lives in `builder`, teardown in
//! `lifecycle`, transport in `transport`.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::arena::{ComponentArena, ComponentId, PipelineComponent};
use crate::config::EngineConfig;
use crate::framework::{AudioControl, FilterGraph, MediaControl, MediaFramework, VideoWindow};
use crate::negotiate::Connection;
use crate::registry::ComponentRegistry;
use crate::surface::StaticSurface;
use crate::transport::PositionProbe;

// ============================================================================
// Build state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    /// Nothing allocated
    Empty,
    SourceLoaded,
    /// Source connected to the splitter, streams exposed
    Demultiplexed,
    VideoPending,
    AudioPending,
    /// At least one sub-chain reached its renderer
    Rendered { video: bool, audio: bool },
    Running,
    Paused,
    Stopped,
    /// Everything released; a new build may start
    TornDown,
}

impl BuildState {
    /// Whether a graph with at least one rendered chain exists
    pub fn is_built(&self) -> bool {
        matches!(
            self,
            Self::Rendered { .. } | Self::Running | Self::Paused | Self::Stopped
        )
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty"),
            Self::SourceLoaded => write!(f, "source loaded"),
            Self::Demultiplexed => write!(f, "demultiplexed"),
            Self::VideoPending => write!(f, "video pending"),
            Self::AudioPending => write!(f, "audio pending"),
            Self::Rendered { video, audio } => match (video, audio) {
                (true, true) => write!(f, "rendered"),
                (true, false) => write!(f, "rendered (video only)"),
                (false, true) => write!(f, "rendered (audio only)"),
                (false, false) => write!(f, "rendered (nothing)"),
            },
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Stopped => write!(f, "stopped"),
            Self::TornDown => write!(f, "torn down"),
        }
    }
}

/// A decoder → renderer chain hanging off one splitter output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubChain {
    /// Splitter output pin the chain is fed from
    pub splitter_pin: String,
    pub decoder: ComponentId,
    pub renderer: ComponentId,
}

// ============================================================================
// Pipeline
// ============================================================================

pub struct Pipeline<F: MediaFramework> {
    pub(crate) framework: F,
    pub(crate) registry: ComponentRegistry,
    pub(crate) video_pin_hint: String,
    pub(crate) audio_pin_hint: String,

    pub(crate) graph: Option<F::Graph>,
    pub(crate) arena: ComponentArena<<F::Graph as FilterGraph>::Filter>,
    pub(crate) connections: Vec<Connection>,
    pub(crate) state: BuildState,
    pub(crate) video: Option<SubChain>,
    pub(crate) audio: Option<SubChain>,

    // Capabilities of the finished graph
    pub(crate) media_control: Option<Box<dyn MediaControl>>,
    pub(crate) position: PositionProbe,
    pub(crate) video_window: Option<Box<dyn VideoWindow>>,
    pub(crate) audio_control: Option<Box<dyn AudioControl>>,

    pub(crate) is_playing: bool,
    pub(crate) source_path: Option<PathBuf>,
    pub(crate) surface: Option<StaticSurface>,
}

impl<F: MediaFramework> Pipeline<F> {
    pub fn new(framework: F) -> Self {
        Self::with_config(framework, &EngineConfig::default())
    }

    pub fn with_config(framework: F, config: &EngineConfig) -> Self {
        Self::with_registry(framework, ComponentRegistry::from_config(config), config)
    }

    pub fn with_registry(framework: F, registry: ComponentRegistry, config: &EngineConfig) -> Self {
        Self {
            framework,
            registry,
            video_pin_hint: config.video_pin_hint.clone(),
            audio_pin_hint: config.audio_pin_hint.clone(),
            graph: None,
            arena: ComponentArena::new(),
            connections: Vec::new(),
            state: BuildState::Empty,
            video: None,
            audio: None,
            media_control: None,
            position: PositionProbe::default(),
            video_window: None,
            audio_control: None,
            is_playing: false,
            source_path: None,
            surface: None,
        }
    }

    pub fn framework(&self) -> &F {
        &self.framework
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Changes apply to the next build
    pub fn registry_mut(&mut self) -> &mut ComponentRegistry {
        &mut self.registry
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn component_count(&self) -> usize {
        self.arena.len()
    }

    pub fn components(&self) -> impl Iterator<Item = &PipelineComponent> {
        self.arena.components()
    }

    /// Connections in the order they were made
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn video_chain(&self) -> Option<&SubChain> {
        self.video.as_ref()
    }

    pub fn audio_chain(&self) -> Option<&SubChain> {
        self.audio.as_ref()
    }

    pub fn has_video(&self) -> bool {
        self.video.is_some()
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    /// File of the current (or last successful) build
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }
}

impl<F: MediaFramework> fmt::Debug for Pipeline<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("framework", &self.framework.name())
            .field("state", &self.state)
            .field("components", &self.arena.len())
            .field("video", &self.video)
            .field("audio", &self.audio)
            .field("is_playing", &self.is_playing)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_state_is_built() {
        assert!(!BuildState::Empty.is_built());
        assert!(!BuildState::Demultiplexed.is_built());
        assert!(!BuildState::TornDown.is_built());
        assert!(BuildState::Rendered { video: true, audio: false }.is_built());
        assert!(BuildState::Running.is_built());
        assert!(BuildState::Stopped.is_built());
    }

    #[test]
    fn test_build_state_display() {
        assert_eq!(
            BuildState::Rendered { video: false, audio: true }.to_string(),
            "rendered (audio only)"
        );
        assert_eq!(BuildState::TornDown.to_string(), "torn down");
    }

    #[cfg(feature = "sim")]
    #[test]
    fn test_new_pipeline_is_empty() {
        let pipeline = Pipeline::new(crate::sim::SimFramework::new());
        assert_eq!(pipeline.state(), BuildState::Empty);
        assert_eq!(pipeline.component_count(), 0);
        assert!(!pipeline.is_playing());
        assert!(pipeline.video_chain().is_none());
        assert!(pipeline.connections().is_empty());
        assert!(format!("{:?}", pipeline).contains("sim"));
    }
}
