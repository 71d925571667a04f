//! Connection negotiator
//!
//! Pin lookup and direct pin-to-pin connection. A connection attempt is a
//! single call into the framework; rejected pairs are not retried here. The
//! builder is the one that decides whether to try another pin or give up.

use std::fmt;

use crate::arena::{ComponentArena, ComponentId};
use crate::error::{GraphError, GraphResult};
use crate::framework::{hresult, FilterGraph, FrameworkError, PinDirection};

/// How to pick a pin on a component
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinSelector {
    /// n-th pin of the requested direction
    Index(usize),
    /// First pin whose name contains this text, ignoring case.
    ///
    /// Splitters expose an unknown number of stream pins and name them after
    /// the stream type ("Video", "Audio", ...). Matching on the name is loose:
    /// a splitter that names pins differently will not be classified.
    NameContains(String),
}

impl PinSelector {
    pub fn first() -> Self {
        Self::Index(0)
    }

    pub fn name_contains(text: impl Into<String>) -> Self {
        Self::NameContains(text.into())
    }

    fn matches(&self, index: usize, name: &str) -> bool {
        match self {
            Self::Index(n) => *n == index,
            Self::NameContains(text) => {
                !text.is_empty() && name.to_lowercase().contains(&text.to_lowercase())
            }
        }
    }
}

impl fmt::Display for PinSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(n) => write!(f, "index {}", n),
            Self::NameContains(text) => write!(f, "name containing {:?}", text),
        }
    }
}

/// Established link between an output pin and an input pin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub from: ComponentId,
    pub from_pin: String,
    pub to: ComponentId,
    pub to_pin: String,
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] → {}[{}]",
            self.from, self.from_pin, self.to, self.to_pin
        )
    }
}

fn lookup<'a, G: FilterGraph>(
    arena: &'a ComponentArena<G::Filter>,
    id: ComponentId,
) -> GraphResult<(&'a G::Filter, &'a str)> {
    match (arena.get(id), arena.info(id)) {
        (Some(filter), Some(info)) => Ok((filter, info.label.as_str())),
        _ => Err(GraphError::framework(
            "looking up component",
            FrameworkError::new(hresult::E_POINTER, format!("component {} is not registered", id)),
        )),
    }
}

/// Find a pin on a registered component
pub fn find_pin<G: FilterGraph>(
    graph: &G,
    arena: &ComponentArena<G::Filter>,
    id: ComponentId,
    direction: PinDirection,
    selector: &PinSelector,
) -> GraphResult<G::Pin> {
    let (filter, label) = lookup::<G>(arena, id)?;
    let pins = graph
        .pins(filter, direction)
        .map_err(|e| GraphError::framework("enumerating pins", e))?;

    pins.into_iter()
        .enumerate()
        .find(|(index, pin)| selector.matches(*index, &graph.pin_name(pin)))
        .map(|(_, pin)| pin)
        .ok_or_else(|| GraphError::PinNotFound {
            component: label.to_string(),
            direction,
            selector: selector.to_string(),
        })
}

/// Connect two already-located pins
pub fn connect<G: FilterGraph>(
    graph: &mut G,
    arena: &ComponentArena<G::Filter>,
    (from, output): (ComponentId, &G::Pin),
    (to, input): (ComponentId, &G::Pin),
) -> GraphResult<Connection> {
    let (_, from_label) = lookup::<G>(arena, from)?;
    let (_, to_label) = lookup::<G>(arena, to)?;
    let from_pin = graph.pin_name(output);
    let to_pin = graph.pin_name(input);

    match graph.connect(output, input) {
        Ok(()) => {
            let connection = Connection {
                from,
                from_pin,
                to,
                to_pin,
            };
            tracing::debug!("Connected {} → {}: {}", from_label, to_label, connection);
            Ok(connection)
        }
        Err(source) => Err(GraphError::ConnectionRejected {
            from: format!("{} [{}]", from_label, from_pin),
            to: format!("{} [{}]", to_label, to_pin),
            source,
        }),
    }
}

/// Locate both pins by selector and connect them
pub fn link<G: FilterGraph>(
    graph: &mut G,
    arena: &ComponentArena<G::Filter>,
    (from, from_selector): (ComponentId, &PinSelector),
    (to, to_selector): (ComponentId, &PinSelector),
) -> GraphResult<Connection> {
    let output = find_pin(graph, arena, from, PinDirection::Output, from_selector)?;
    let input = find_pin(graph, arena, to, PinDirection::Input, to_selector)?;
    connect(graph, arena, (from, &output), (to, &input))
}

#[cfg(all(test, feature = "sim"))]
mod tests {
    use super::*;
    use crate::arena::ChainKind;
    use crate::framework::MediaFramework;
    use crate::registry::{ComponentRegistry, ComponentRole};
    use crate::sim::{fixtures, SimFramework};

    fn add<G: FilterGraph>(
        graph: &mut G,
        arena: &mut ComponentArena<G::Filter>,
        registry: &ComponentRegistry,
        role: ComponentRole,
    ) -> ComponentId {
        let (filter, _) = registry.create_component(graph, role).unwrap();
        graph.add_filter(&filter, role.label()).unwrap();
        arena.register(role, role.label(), ChainKind::Trunk, filter)
    }

    #[test]
    fn test_selector_matching() {
        let video = PinSelector::name_contains("video");
        assert!(video.matches(3, "Video"));
        assert!(video.matches(0, "Video 2"));
        assert!(!video.matches(0, "Audio"));
        assert!(!PinSelector::name_contains("").matches(0, "Video"));
        assert!(PinSelector::Index(1).matches(1, "anything"));
        assert!(!PinSelector::Index(1).matches(0, "anything"));
    }

    #[test]
    fn test_link_source_to_splitter_then_find_stream_pins() {
        let file = fixtures::mp4_file(&[("vide", "avc1"), ("soun", "mp4a")], 10.0);
        let framework = SimFramework::new();
        let registry = ComponentRegistry::with_defaults();
        let mut graph = framework.create_graph().unwrap();
        let mut arena = ComponentArena::new();

        let source = add(&mut graph, &mut arena, &registry, ComponentRole::Source);
        graph
            .load_source(arena.get(source).unwrap(), file.path())
            .unwrap();
        let splitter = add(&mut graph, &mut arena, &registry, ComponentRole::Splitter);

        let connection = link(
            &mut graph,
            &arena,
            (source, &PinSelector::first()),
            (splitter, &PinSelector::first()),
        )
        .unwrap();
        assert_eq!(connection.from, source);
        assert_eq!(connection.to, splitter);

        let video = find_pin(
            &graph,
            &arena,
            splitter,
            PinDirection::Output,
            &PinSelector::name_contains("VIDEO"),
        )
        .unwrap();
        assert_eq!(graph.pin_name(&video), "Video");

        let missing = find_pin(
            &graph,
            &arena,
            splitter,
            PinDirection::Output,
            &PinSelector::name_contains("subtitle"),
        );
        assert!(matches!(missing, Err(GraphError::PinNotFound { .. })));
    }

    #[test]
    fn test_rejected_connection_leaves_pins_free() {
        let file = fixtures::mp4_file(&[("vide", "avc1")], 10.0);
        let framework = SimFramework::new();
        let registry = ComponentRegistry::with_defaults();
        let mut graph = framework.create_graph().unwrap();
        let mut arena = ComponentArena::new();

        let source = add(&mut graph, &mut arena, &registry, ComponentRole::Source);
        graph
            .load_source(arena.get(source).unwrap(), file.path())
            .unwrap();
        let splitter = add(&mut graph, &mut arena, &registry, ComponentRole::Splitter);
        link(
            &mut graph,
            &arena,
            (source, &PinSelector::first()),
            (splitter, &PinSelector::first()),
        )
        .unwrap();

        // Compressed video straight into an audio decoder: no common type.
        let audio_decoder = add(&mut graph, &mut arena, &registry, ComponentRole::AudioDecoder);
        let err = link(
            &mut graph,
            &arena,
            (splitter, &PinSelector::name_contains("video")),
            (audio_decoder, &PinSelector::first()),
        )
        .unwrap_err();
        match err {
            GraphError::ConnectionRejected { source, .. } => {
                assert_eq!(source.code, hresult::VFW_E_NO_ACCEPTABLE_TYPES)
            }
            other => panic!("unexpected {:?}", other),
        }

        // The video pin is still free for the right decoder.
        let video_decoder = add(&mut graph, &mut arena, &registry, ComponentRole::VideoDecoder);
        link(
            &mut graph,
            &arena,
            (splitter, &PinSelector::name_contains("video")),
            (video_decoder, &PinSelector::first()),
        )
        .unwrap();
    }
}
