//! Pipeline builder
//!
//! Builds the graph incrementally:
//!
//! ```text
//! source ─load─▶ splitter ─┬─ "video" pin ─▶ decoder ─▶ renderer
//!                          └─ "audio" pin ─▶ decoder ─▶ renderer
//! ```
//!
//! Trunk failures (source, splitter, the connection between them) are fatal
//! and unwind the whole pipeline. A sub-chain failure only unwinds that
//! sub-chain; the build fails only if neither reaches its renderer.

use std::fmt;
use std::path::Path;

use crate::arena::{ChainKind, ComponentArena, ComponentId};
use crate::error::{GraphError, GraphResult};
use crate::framework::{
    hresult, FilterGraph, FrameworkError, MediaFramework, PinDirection, VideoWindow, WindowStyle,
};
use crate::graph::{BuildState, Pipeline, SubChain};
use crate::lifecycle::release_chain;
use crate::negotiate::{self, Connection, PinSelector};
use crate::registry::{ComponentRegistry, ComponentRole};
use crate::surface::{OutputSurface, StaticSurface};

// ============================================================================
// Build report
// ============================================================================

/// What happened to one sub-chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubChainOutcome {
    Rendered,
    /// The splitter exposed no pin for this media kind
    NoStream,
    /// The stream exists but the chain could not be completed
    Failed(GraphError),
}

impl SubChainOutcome {
    pub fn is_rendered(&self) -> bool {
        matches!(self, Self::Rendered)
    }
}

impl fmt::Display for SubChainOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rendered => write!(f, "rendered"),
            Self::NoStream => write!(f, "no stream"),
            Self::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildReport {
    pub video: SubChainOutcome,
    pub audio: SubChainOutcome,
    /// Seconds, 0 when unknown
    pub duration: f64,
}

// ============================================================================
// Graph helpers
// ============================================================================

/// Instantiate the best component for `role`, register it, add it to the
/// graph. Registration comes first so a failed add is still released by
/// the arena.
fn add_component<G: FilterGraph>(
    graph: &mut G,
    arena: &mut ComponentArena<G::Filter>,
    registry: &ComponentRegistry,
    role: ComponentRole,
    chain: ChainKind,
) -> GraphResult<ComponentId> {
    let (filter, descriptor) = registry.create_component(graph, role)?;
    let id = arena.register(role, descriptor.name.clone(), chain, filter);

    if let Some(filter) = arena.get(id) {
        graph
            .add_filter(filter, role.label())
            .map_err(|e| GraphError::framework("adding filter to graph", e))?;
    }

    tracing::debug!("Added {} {}", role, id);
    Ok(id)
}

/// Decoder then renderer, both connections made. Returns the finished
/// chain and its two connections; on error the caller rolls back.
fn connect_sub_chain<G: FilterGraph>(
    graph: &mut G,
    arena: &mut ComponentArena<G::Filter>,
    registry: &ComponentRegistry,
    splitter: (ComponentId, &G::Pin),
    chain: ChainKind,
) -> GraphResult<(SubChain, [Connection; 2])> {
    let (decoder_role, renderer_role) = match chain {
        ChainKind::Audio => (ComponentRole::AudioDecoder, ComponentRole::AudioRenderer),
        _ => (ComponentRole::VideoDecoder, ComponentRole::VideoRenderer),
    };

    let decoder = add_component(graph, arena, registry, decoder_role, chain)?;
    let decoder_input = negotiate::find_pin(
        graph,
        arena,
        decoder,
        PinDirection::Input,
        &PinSelector::first(),
    )?;
    let feed = negotiate::connect(graph, arena, splitter, (decoder, &decoder_input))?;

    let renderer = add_component(graph, arena, registry, renderer_role, chain)?;
    let render = negotiate::link(
        graph,
        arena,
        (decoder, &PinSelector::first()),
        (renderer, &PinSelector::first()),
    )?;

    let sub_chain = SubChain {
        splitter_pin: feed.from_pin.clone(),
        decoder,
        renderer,
    };
    Ok((sub_chain, [feed, render]))
}

/// Try one sub-chain. Only this chain's components are released on failure.
fn build_sub_chain<G: FilterGraph>(
    graph: &mut G,
    arena: &mut ComponentArena<G::Filter>,
    registry: &ComponentRegistry,
    connections: &mut Vec<Connection>,
    splitter: ComponentId,
    selector: &PinSelector,
    chain: ChainKind,
) -> (SubChainOutcome, Option<SubChain>) {
    let kind = match chain {
        ChainKind::Audio => "audio",
        _ => "video",
    };

    let splitter_pin = match negotiate::find_pin(graph, arena, splitter, PinDirection::Output, selector) {
        Ok(pin) => pin,
        Err(e) => {
            tracing::info!("No {} stream: {}", kind, e);
            return (SubChainOutcome::NoStream, None);
        }
    };

    match connect_sub_chain(graph, arena, registry, (splitter, &splitter_pin), chain) {
        Ok((sub_chain, made)) => {
            tracing::info!(
                "{} chain rendered from splitter pin {:?}",
                kind,
                sub_chain.splitter_pin
            );
            connections.extend(made);
            (SubChainOutcome::Rendered, Some(sub_chain))
        }
        Err(e) => {
            let released = release_chain(Some(graph), arena, chain);
            tracing::warn!(
                "No {} rendered: {} ({} component(s) rolled back)",
                kind,
                e,
                released
            );
            (SubChainOutcome::Failed(e), None)
        }
    }
}

fn bind_surface(window: &dyn VideoWindow, surface: &dyn OutputSurface) -> GraphResult<()> {
    let handle = surface.raw_handle();
    let rect = surface.client_rect();
    let bind = |e| GraphError::framework("binding video window", e);

    window.set_owner(handle).map_err(bind)?;
    window.set_message_drain(handle).map_err(bind)?;
    window
        .set_window_style(WindowStyle::embedded())
        .map_err(bind)?;
    window.set_window_position(rect).map_err(bind)?;
    window.set_visible(true).map_err(bind)?;

    tracing::debug!("Video window bound to {:#x} at {:?}", handle, rect);
    Ok(())
}

fn missing_capability(what: &str) -> GraphError {
    GraphError::framework(
        "querying graph capabilities",
        FrameworkError::new(hresult::E_NOINTERFACE, format!("graph has no {}", what)),
    )
}

fn check_preconditions<'s>(
    path: &Path,
    surface: Option<&'s dyn OutputSurface>,
) -> GraphResult<&'s dyn OutputSurface> {
    if path.as_os_str().to_string_lossy().trim().is_empty() {
        return Err(GraphError::FileNameMissing);
    }
    if !path.is_file() {
        return Err(GraphError::FileNotFound(path.to_path_buf()));
    }
    surface.ok_or(GraphError::OutputSurfaceMissing)
}

// ============================================================================
// Pipeline build
// ============================================================================

impl<F: MediaFramework> Pipeline<F> {
    /// Build and start a graph for `path`, rendering video into `surface`.
    ///
    /// Whatever the pipeline held before is cleared first. On error the
    /// pipeline is left `Empty` with nothing allocated.
    pub fn build_graph(
        &mut self,
        path: &Path,
        surface: Option<&dyn OutputSurface>,
    ) -> GraphResult<BuildReport> {
        self.clear();
        self.state = BuildState::Empty;

        let surface = match check_preconditions(path, surface) {
            Ok(surface) => surface,
            Err(e) => {
                tracing::warn!("Build refused: {}", e);
                return Err(e);
            }
        };

        tracing::info!("Building graph for {} ({})", path.display(), self.framework.name());
        match self.assemble(path, surface) {
            Ok(report) => {
                tracing::info!(
                    "Graph running: video {}, audio {}, duration {:.2}s",
                    report.video,
                    report.audio,
                    report.duration
                );
                Ok(report)
            }
            Err(e) => {
                tracing::error!("Graph build failed: {}", e);
                self.clear();
                self.state = BuildState::Empty;
                Err(e)
            }
        }
    }

    fn assemble(&mut self, path: &Path, surface: &dyn OutputSurface) -> GraphResult<BuildReport> {
        let graph = self
            .framework
            .create_graph()
            .map_err(|e| GraphError::framework("creating filter graph", e))?;
        let graph = self.graph.insert(graph);
        let arena = &mut self.arena;
        let registry = &self.registry;

        // Source
        let source = add_component(graph, arena, registry, ComponentRole::Source, ChainKind::Trunk)?;
        if let Some(filter) = arena.get(source) {
            graph.load_source(filter, path).map_err(GraphError::SourceLoad)?;
        }
        self.state = BuildState::SourceLoaded;
        tracing::debug!("Source loaded");

        // Splitter
        let splitter = add_component(graph, arena, registry, ComponentRole::Splitter, ChainKind::Trunk)?;
        let trunk = negotiate::link(
            graph,
            arena,
            (source, &PinSelector::first()),
            (splitter, &PinSelector::first()),
        )?;
        self.connections.push(trunk);
        self.state = BuildState::Demultiplexed;

        // Sub-chains
        self.state = BuildState::VideoPending;
        let (video, video_chain) = build_sub_chain(
            graph,
            arena,
            registry,
            &mut self.connections,
            splitter,
            &PinSelector::name_contains(self.video_pin_hint.as_str()),
            ChainKind::Video,
        );

        self.state = BuildState::AudioPending;
        let (audio, audio_chain) = build_sub_chain(
            graph,
            arena,
            registry,
            &mut self.connections,
            splitter,
            &PinSelector::name_contains(self.audio_pin_hint.as_str()),
            ChainKind::Audio,
        );

        if video_chain.is_none() && audio_chain.is_none() {
            return Err(GraphError::NothingRendered);
        }

        self.state = BuildState::Rendered {
            video: video_chain.is_some(),
            audio: audio_chain.is_some(),
        };
        self.video = video_chain;
        self.audio = audio_chain;

        // Capabilities
        let media_control = graph
            .media_control()
            .ok_or_else(|| missing_capability("media control"))?;

        if self.video.is_some() {
            let window = graph
                .video_window()
                .ok_or_else(|| missing_capability("video window"))?;
            bind_surface(window.as_ref(), surface)?;
            self.video_window = Some(window);
        }
        if self.audio.is_some() {
            self.audio_control = graph.audio_control();
        }

        let position = graph.position_control();
        if position.is_none() {
            tracing::warn!("Graph has no position interface; seeking disabled");
        }
        self.position.install(position);

        let media_control = self.media_control.insert(media_control);
        media_control
            .run()
            .map_err(|e| GraphError::framework("running graph", e))?;

        self.state = BuildState::Running;
        self.is_playing = true;
        self.source_path = Some(path.to_path_buf());
        self.surface = Some(StaticSurface {
            handle: surface.raw_handle(),
            rect: surface.client_rect(),
        });

        Ok(BuildReport {
            video,
            audio,
            duration: self.position.duration(),
        })
    }

    /// Rebuild the last file against the last surface and seek back to
    /// where playback was.
    pub fn reload(&mut self) -> GraphResult<BuildReport> {
        let (Some(path), Some(surface)) = (self.source_path.clone(), self.surface) else {
            return Err(GraphError::NotBuilt);
        };
        let position = self.get_position();
        tracing::info!("Reloading {} at {:.2}s", path.display(), position);

        let report = self.build_graph(&path, Some(&surface))?;
        if position > 0.0 {
            self.set_position(position);
        }
        Ok(report)
    }
}
