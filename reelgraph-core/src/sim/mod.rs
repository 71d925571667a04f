//! # Sim framework
//!
//! In-process filter graph that behaves like DirectShow where the engine can
//! tell the difference: filters are created by class id and may be missing,
//! pins negotiate on media types, the splitter only exposes stream pins once
//! its input is connected to a loaded source, decoders only offer output
//! after their input is connected, and removing a filter breaks its
//! connections.
//!
//! Every handle is tracked in a [`SimLedger`] so tests can check that a
//! pipeline releases exactly what it created, in the right order.
//!
//! Faults are switched on with the builder methods on [`SimFramework`].

pub mod clock;
mod ledger;
pub mod probe;

#[cfg(test)]
pub(crate) mod fixtures;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::framework::{
    hresult, AudioControl, FilterGraph, FrameworkError, FrameworkResult, MajorType, MediaControl,
    MediaFramework, MediaType, PinDirection, PositionControl, VideoWindow, WindowStyle,
    VOLUME_FULL, VOLUME_SILENT,
};
use crate::registry::{ClassId, ComponentDescriptor, ComponentRole};
use crate::surface::Rect;

pub use clock::SimClock;
pub use ledger::{SimEvent, SimLedger, WindowBinding};

/// Native size reported when the container does not carry one
const DEFAULT_VIDEO_SIZE: (u32, u32) = (640, 480);

// ============================================================================
// Framework
// ============================================================================

#[derive(Debug, Clone, Default)]
struct Faults {
    missing_roles: HashSet<ComponentRole>,
    missing_classes: HashSet<ClassId>,
    unsupported_codecs: HashSet<String>,
    reject_into: HashSet<ComponentRole>,
    source_load: Option<i32>,
    run: Option<i32>,
    no_position: bool,
}

#[derive(Clone, Default)]
pub struct SimFramework {
    faults: Faults,
    ledger: Arc<SimLedger>,
}

impl SimFramework {
    pub fn new() -> Self {
        Self::default()
    }

    /// No implementation of `role` can be instantiated
    pub fn without(mut self, role: ComponentRole) -> Self {
        self.faults.missing_roles.insert(role);
        self
    }

    /// This one class is not registered; other candidates for its role are
    pub fn without_class(mut self, class_id: ClassId) -> Self {
        self.faults.missing_classes.insert(class_id);
        self
    }

    /// Decoders refuse streams of this subtype
    pub fn unsupported_codec(mut self, subtype: impl Into<String>) -> Self {
        self.faults
            .unsupported_codecs
            .insert(subtype.into().to_ascii_lowercase());
        self
    }

    /// Every connection into an input pin of `role` is refused
    pub fn reject_connect(mut self, role: ComponentRole) -> Self {
        self.faults.reject_into.insert(role);
        self
    }

    pub fn fail_source_load(mut self, code: i32) -> Self {
        self.faults.source_load = Some(code);
        self
    }

    pub fn fail_run(mut self, code: i32) -> Self {
        self.faults.run = Some(code);
        self
    }

    /// Graphs expose no seeking capability
    pub fn without_position(mut self) -> Self {
        self.faults.no_position = true;
        self
    }

    pub fn ledger(&self) -> Arc<SimLedger> {
        self.ledger.clone()
    }
}

impl MediaFramework for SimFramework {
    type Graph = SimGraph;

    fn name(&self) -> &str {
        "sim"
    }

    fn create_graph(&self) -> FrameworkResult<SimGraph> {
        self.ledger.graph_created();
        Ok(SimGraph {
            faults: self.faults.clone(),
            ledger: self.ledger.clone(),
            nodes: HashMap::new(),
            clock: Arc::new(SimClock::new()),
            volume: Arc::new(Mutex::new(VOLUME_FULL)),
            video_size: DEFAULT_VIDEO_SIZE,
        })
    }
}

// ============================================================================
// Handles
// ============================================================================

/// Filter handle; dropping it releases the filter
pub struct SimFilter {
    id: u32,
    role: ComponentRole,
    ledger: Arc<SimLedger>,
}

impl SimFilter {
    pub fn role(&self) -> ComponentRole {
        self.role
    }
}

impl std::fmt::Debug for SimFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimFilter")
            .field("id", &self.id)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

impl Drop for SimFilter {
    fn drop(&mut self) {
        self.ledger.release(self.id);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PinKey {
    node: u32,
    direction: PinDirection,
    index: usize,
}

pub struct SimPin {
    key: PinKey,
    name: String,
}

// ============================================================================
// Graph
// ============================================================================

struct PinSlot {
    name: String,
    peer: Option<PinKey>,
}

impl PinSlot {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            peer: None,
        }
    }
}

struct Node {
    role: ComponentRole,
    in_graph: bool,
    inputs: Vec<PinSlot>,
    outputs: Vec<PinSlot>,
    /// Splitter only: type carried by each output pin
    stream_types: Vec<MediaType>,
    loaded: Option<PathBuf>,
}

impl Node {
    fn new(role: ComponentRole) -> Self {
        let (inputs, outputs) = match role {
            ComponentRole::Source => (vec![], vec!["Output"]),
            // Output pins appear once the input is connected
            ComponentRole::Splitter => (vec!["Input"], vec![]),
            ComponentRole::VideoDecoder | ComponentRole::AudioDecoder => (vec!["In"], vec!["Out"]),
            ComponentRole::VideoRenderer => (vec!["VMR Input0"], vec![]),
            ComponentRole::AudioRenderer => (vec!["Audio Input pin (rendered)"], vec![]),
        };
        Self {
            role,
            in_graph: false,
            inputs: inputs.into_iter().map(PinSlot::new).collect(),
            outputs: outputs.into_iter().map(PinSlot::new).collect(),
            stream_types: Vec::new(),
            loaded: None,
        }
    }

    fn slots(&self, direction: PinDirection) -> &Vec<PinSlot> {
        match direction {
            PinDirection::Input => &self.inputs,
            PinDirection::Output => &self.outputs,
        }
    }

    fn slots_mut(&mut self, direction: PinDirection) -> &mut Vec<PinSlot> {
        match direction {
            PinDirection::Input => &mut self.inputs,
            PinDirection::Output => &mut self.outputs,
        }
    }

    fn input_connected(&self) -> bool {
        self.inputs.iter().any(|p| p.peer.is_some())
    }

    /// Types an output pin can deliver right now
    fn offers(&self, index: usize) -> Vec<MediaType> {
        match self.role {
            ComponentRole::Source if self.loaded.is_some() => {
                vec![MediaType::new(MajorType::Stream, "file")]
            }
            ComponentRole::Splitter => self.stream_types.get(index).cloned().into_iter().collect(),
            ComponentRole::VideoDecoder if self.input_connected() => {
                vec![MediaType::new(MajorType::Video, "raw")]
            }
            ComponentRole::AudioDecoder if self.input_connected() => {
                vec![MediaType::new(MajorType::Audio, "pcm")]
            }
            _ => Vec::new(),
        }
    }
}

fn accepts(role: ComponentRole, media: &MediaType, faults: &Faults) -> bool {
    let supported = !faults.unsupported_codecs.contains(&media.subtype.to_ascii_lowercase());
    match role {
        ComponentRole::Source => false,
        ComponentRole::Splitter => media.major == MajorType::Stream,
        ComponentRole::VideoDecoder => media.major == MajorType::Video && supported,
        ComponentRole::AudioDecoder => media.major == MajorType::Audio && supported,
        ComponentRole::VideoRenderer => media.major == MajorType::Video && media.subtype == "raw",
        ComponentRole::AudioRenderer => media.major == MajorType::Audio && media.subtype == "pcm",
    }
}

fn stream_pin_names(streams: &[MediaType]) -> Vec<String> {
    let mut counts: HashMap<MajorType, usize> = HashMap::new();
    streams
        .iter()
        .map(|s| {
            let base = match s.major {
                MajorType::Video => "Video",
                MajorType::Audio => "Audio",
                _ => "Subtitle",
            };
            let n = counts.entry(s.major).or_insert(0);
            *n += 1;
            if *n == 1 {
                base.to_string()
            } else {
                format!("{} {}", base, n)
            }
        })
        .collect()
}

pub struct SimGraph {
    faults: Faults,
    ledger: Arc<SimLedger>,
    nodes: HashMap<u32, Node>,
    clock: Arc<SimClock>,
    volume: Arc<Mutex<i32>>,
    video_size: (u32, u32),
}

impl SimGraph {
    fn node(&self, id: u32) -> FrameworkResult<&Node> {
        self.nodes
            .get(&id)
            .ok_or_else(|| FrameworkError::new(hresult::E_POINTER, "filter not created by this graph"))
    }

    fn node_in_graph(&self, id: u32) -> FrameworkResult<&Node> {
        let node = self.node(id)?;
        if node.in_graph {
            Ok(node)
        } else {
            Err(FrameworkError::new(
                hresult::VFW_E_NOT_IN_GRAPH,
                format!("{} is not in the graph", node.role),
            ))
        }
    }

    fn slot(&self, key: PinKey) -> FrameworkResult<&PinSlot> {
        self.node(key.node)?
            .slots(key.direction)
            .get(key.index)
            .ok_or_else(|| FrameworkError::new(hresult::E_POINTER, "pin no longer exists"))
    }

    fn set_peer(&mut self, key: PinKey, peer: Option<PinKey>) {
        if let Some(slot) = self
            .nodes
            .get_mut(&key.node)
            .and_then(|n| n.slots_mut(key.direction).get_mut(key.index))
        {
            slot.peer = peer;
        }
    }

    fn rendering(&self, role: ComponentRole) -> bool {
        self.nodes
            .values()
            .any(|n| n.role == role && n.in_graph && n.input_connected())
    }

    /// Splitter input just connected: sniff the file and grow stream pins
    fn demultiplex(&mut self, splitter: u32, path: &Path) -> FrameworkResult<()> {
        let info = probe::probe_file(path)?;
        tracing::debug!(
            "sim splitter: {:?} with {} stream(s)",
            info.format,
            info.streams.len()
        );

        self.clock.set_duration(info.duration);
        self.video_size = info.video_size.unwrap_or(DEFAULT_VIDEO_SIZE);

        let names = stream_pin_names(&info.streams);
        if let Some(node) = self.nodes.get_mut(&splitter) {
            node.outputs = names.into_iter().map(PinSlot::new).collect();
            node.stream_types = info.streams;
        }
        Ok(())
    }
}

impl FilterGraph for SimGraph {
    type Filter = SimFilter;
    type Pin = SimPin;

    fn instantiate(&mut self, descriptor: &ComponentDescriptor) -> FrameworkResult<SimFilter> {
        if self.faults.missing_roles.contains(&descriptor.role)
            || self.faults.missing_classes.contains(&descriptor.class_id)
        {
            return Err(FrameworkError::new(
                hresult::REGDB_E_CLASSNOTREG,
                format!("{} {} is not registered", descriptor.name, descriptor.class_id),
            ));
        }

        let id = self.ledger.create(descriptor.role);
        self.nodes.insert(id, Node::new(descriptor.role));
        Ok(SimFilter {
            id,
            role: descriptor.role,
            ledger: self.ledger.clone(),
        })
    }

    fn add_filter(&mut self, filter: &SimFilter, _label: &str) -> FrameworkResult<()> {
        let node = self
            .nodes
            .get_mut(&filter.id)
            .ok_or_else(|| FrameworkError::new(hresult::E_POINTER, "filter not created by this graph"))?;
        if node.in_graph {
            return Err(FrameworkError::new(hresult::E_UNEXPECTED, "filter already in graph"));
        }
        node.in_graph = true;
        self.ledger.record(SimEvent::Added(filter.role));
        Ok(())
    }

    fn remove_filter(&mut self, filter: &SimFilter) -> FrameworkResult<()> {
        let node = self.node_in_graph(filter.id)?;
        let peers: Vec<PinKey> = node
            .inputs
            .iter()
            .chain(node.outputs.iter())
            .filter_map(|p| p.peer)
            .collect();

        for peer in peers {
            self.set_peer(peer, None);
        }
        if let Some(node) = self.nodes.get_mut(&filter.id) {
            node.in_graph = false;
            for slot in node.inputs.iter_mut().chain(node.outputs.iter_mut()) {
                slot.peer = None;
            }
        }
        self.ledger.record(SimEvent::Removed(filter.role));
        Ok(())
    }

    fn pins(&self, filter: &SimFilter, direction: PinDirection) -> FrameworkResult<Vec<SimPin>> {
        let node = self.node(filter.id)?;
        Ok(node
            .slots(direction)
            .iter()
            .enumerate()
            .map(|(index, slot)| SimPin {
                key: PinKey {
                    node: filter.id,
                    direction,
                    index,
                },
                name: slot.name.clone(),
            })
            .collect())
    }

    fn pin_name(&self, pin: &SimPin) -> String {
        pin.name.clone()
    }

    fn connect(&mut self, output: &SimPin, input: &SimPin) -> FrameworkResult<()> {
        if output.key.direction != PinDirection::Output || input.key.direction != PinDirection::Input {
            return Err(FrameworkError::new(
                hresult::VFW_E_INVALID_DIRECTION,
                "connect needs an output pin and an input pin",
            ));
        }

        let upstream = self.node_in_graph(output.key.node)?;
        let downstream = self.node_in_graph(input.key.node)?;
        if self.slot(output.key)?.peer.is_some() || self.slot(input.key)?.peer.is_some() {
            return Err(FrameworkError::new(
                hresult::VFW_E_ALREADY_CONNECTED,
                "pin is already connected",
            ));
        }

        let downstream_role = downstream.role;
        if self.faults.reject_into.contains(&downstream_role) {
            return Err(FrameworkError::new(
                hresult::E_FAIL,
                format!("{} refused the connection", downstream_role),
            ));
        }

        let offered = upstream.offers(output.key.index);
        let agreed = offered
            .iter()
            .find(|mt| accepts(downstream_role, mt, &self.faults))
            .cloned();
        let Some(media) = agreed else {
            let offered: Vec<String> = offered.iter().map(|m| m.to_string()).collect();
            return Err(FrameworkError::new(
                hresult::VFW_E_NO_ACCEPTABLE_TYPES,
                format!("{} accepts none of [{}]", downstream_role, offered.join(", ")),
            ));
        };

        if downstream_role == ComponentRole::Splitter {
            let path = upstream.loaded.clone().ok_or_else(|| {
                FrameworkError::new(hresult::E_UNEXPECTED, "source has no file loaded")
            })?;
            self.demultiplex(input.key.node, &path)?;
        }

        tracing::trace!("sim connect {} → {} as {}", output.name, input.name, media);
        self.set_peer(output.key, Some(input.key));
        self.set_peer(input.key, Some(output.key));
        Ok(())
    }

    fn load_source(&mut self, source: &SimFilter, path: &Path) -> FrameworkResult<()> {
        if source.role != ComponentRole::Source {
            return Err(FrameworkError::new(
                hresult::E_NOINTERFACE,
                format!("{} cannot load files", source.role),
            ));
        }
        if let Some(code) = self.faults.source_load {
            return Err(FrameworkError::new(code, "source refused the file"));
        }
        if !path.is_file() {
            return Err(FrameworkError::new(
                hresult::E_FILE_NOT_FOUND,
                format!("{} not found", path.display()),
            ));
        }

        let node = self
            .nodes
            .get_mut(&source.id)
            .ok_or_else(|| FrameworkError::new(hresult::E_POINTER, "filter not created by this graph"))?;
        node.loaded = Some(path.to_path_buf());
        Ok(())
    }

    fn media_control(&self) -> Option<Box<dyn MediaControl>> {
        Some(Box::new(SimMediaControl {
            clock: self.clock.clone(),
            ledger: self.ledger.clone(),
            run_failure: self.faults.run,
        }))
    }

    fn position_control(&self) -> Option<Arc<dyn PositionControl>> {
        if self.faults.no_position {
            return None;
        }
        Some(self.clock.clone() as Arc<dyn PositionControl>)
    }

    fn video_window(&self) -> Option<Box<dyn VideoWindow>> {
        if !self.rendering(ComponentRole::VideoRenderer) {
            return None;
        }
        Some(Box::new(SimVideoWindow {
            ledger: self.ledger.clone(),
            size: self.video_size,
        }))
    }

    fn audio_control(&self) -> Option<Box<dyn AudioControl>> {
        if !self.rendering(ComponentRole::AudioRenderer) {
            return None;
        }
        Some(Box::new(SimAudioControl {
            volume: self.volume.clone(),
        }))
    }
}

impl Drop for SimGraph {
    fn drop(&mut self) {
        self.clock.halt();
        self.ledger.graph_released();
    }
}

// ============================================================================
// Capabilities
// ============================================================================

struct SimMediaControl {
    clock: Arc<SimClock>,
    ledger: Arc<SimLedger>,
    run_failure: Option<i32>,
}

impl MediaControl for SimMediaControl {
    fn run(&self) -> FrameworkResult<()> {
        if let Some(code) = self.run_failure {
            return Err(FrameworkError::new(code, "graph failed to run"));
        }
        self.clock.start();
        self.ledger.record(SimEvent::Run);
        Ok(())
    }

    fn pause(&self) -> FrameworkResult<()> {
        self.clock.halt();
        self.ledger.record(SimEvent::Pause);
        Ok(())
    }

    fn stop(&self) -> FrameworkResult<()> {
        self.clock.halt();
        self.ledger.record(SimEvent::Stop);
        Ok(())
    }
}

struct SimVideoWindow {
    ledger: Arc<SimLedger>,
    size: (u32, u32),
}

impl VideoWindow for SimVideoWindow {
    fn set_owner(&self, handle: isize) -> FrameworkResult<()> {
        self.ledger.update_window(|w| w.owner = Some(handle));
        Ok(())
    }

    fn set_message_drain(&self, handle: isize) -> FrameworkResult<()> {
        self.ledger.update_window(|w| w.message_drain = Some(handle));
        Ok(())
    }

    fn set_window_style(&self, style: WindowStyle) -> FrameworkResult<()> {
        self.ledger.update_window(|w| w.style = Some(style));
        Ok(())
    }

    fn set_window_position(&self, rect: Rect) -> FrameworkResult<()> {
        self.ledger.update_window(|w| w.rect = Some(rect));
        Ok(())
    }

    fn set_visible(&self, visible: bool) -> FrameworkResult<()> {
        self.ledger.update_window(|w| w.visible = visible);
        Ok(())
    }

    fn video_size(&self) -> FrameworkResult<(u32, u32)> {
        Ok(self.size)
    }
}

struct SimAudioControl {
    volume: Arc<Mutex<i32>>,
}

impl AudioControl for SimAudioControl {
    fn volume(&self) -> FrameworkResult<i32> {
        Ok(*self.volume.lock())
    }

    fn set_volume(&self, volume: i32) -> FrameworkResult<()> {
        if !(VOLUME_SILENT..=VOLUME_FULL).contains(&volume) {
            return Err(FrameworkError::new(
                hresult::E_FAIL,
                format!("volume {} out of range", volume),
            ));
        }
        *self.volume.lock() = volume;
        Ok(())
    }
}
