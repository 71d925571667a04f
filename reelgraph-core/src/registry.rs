//! # Component Registry
//!
//! Maps abstract component roles to concrete, instantiable implementations.
//! Each role can have several candidates; the factory walks them in priority
//! order and keeps the first one the host can actually create.

use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{GraphError, GraphResult};
use crate::framework::{hresult, FilterGraph};

// ============================================================================
// Roles
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentRole {
    Source,
    Splitter,
    VideoDecoder,
    VideoRenderer,
    AudioDecoder,
    AudioRenderer,
}

impl ComponentRole {
    pub const ALL: [ComponentRole; 6] = [
        ComponentRole::Source,
        ComponentRole::Splitter,
        ComponentRole::VideoDecoder,
        ComponentRole::VideoRenderer,
        ComponentRole::AudioDecoder,
        ComponentRole::AudioRenderer,
    ];

    /// Label the component is added to the graph under
    pub fn label(&self) -> &'static str {
        match self {
            Self::Source => "Source filter",
            Self::Splitter => "Media splitter",
            Self::VideoDecoder => "Video decoder",
            Self::VideoRenderer => "Video renderer",
            Self::AudioDecoder => "Audio decoder",
            Self::AudioRenderer => "Audio renderer",
        }
    }
}

impl fmt::Display for ComponentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Class ids
// ============================================================================

/// COM-style class identifier of a component implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassId(pub Uuid);

impl ClassId {
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    /// Accepts braced (`{...}`), hyphenated and simple forms
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s.trim()).map(Self)
    }

    pub fn as_u128(&self) -> u128 {
        self.0.as_u128()
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{}}}",
            self.0.hyphenated().to_string().to_ascii_uppercase()
        )
    }
}

/// File Source (Async)
pub const CLSID_FILE_SOURCE_ASYNC: ClassId =
    ClassId::from_u128(0xe436ebb5_524f_11ce_9f53_0020af0ba770);

/// LAV Splitter (demuxer only, needs a source)
pub const CLSID_LAV_SPLITTER: ClassId =
    ClassId::from_u128(0x171252a0_8820_4afe_9df8_5c92b2d66b04);

/// LAV Video Decoder
pub const CLSID_LAV_VIDEO: ClassId = ClassId::from_u128(0xee30215d_164f_4a92_a4eb_9d4c13390f9f);

/// LAV Audio Decoder
pub const CLSID_LAV_AUDIO: ClassId = ClassId::from_u128(0xe8e73b6b_4cb3_44a4_be99_4f7bcb96e491);

/// Video Renderer (GDI/DirectDraw)
pub const CLSID_VIDEO_RENDERER: ClassId =
    ClassId::from_u128(0x70e102b0_5556_11ce_97c0_00aa0055595a);

/// Enhanced Video Renderer
pub const CLSID_ENHANCED_VIDEO_RENDERER: ClassId =
    ClassId::from_u128(0xfa10746c_9b63_4b6c_bc49_fc300ea5f256);

/// DirectSound Audio Renderer
pub const CLSID_DSOUND_RENDERER: ClassId =
    ClassId::from_u128(0x79376820_07d0_11cf_a24d_0020afd79767);

/// Default WaveOut Device
pub const CLSID_WAVEOUT_RENDERER: ClassId =
    ClassId::from_u128(0xe30629d1_27e5_11ce_875d_00608cb78066);

/// Microsoft DTV-DVD Video Decoder
pub const CLSID_MS_DTV_VIDEO: ClassId = ClassId::from_u128(0x212690fb_83e5_4526_8fd7_74478b7939cd);

/// Microsoft DTV-DVD Audio Decoder
pub const CLSID_MS_DTV_AUDIO: ClassId = ClassId::from_u128(0xe1f1a0b8_beee_490d_ba7c_066c40b5e2b9);

// ============================================================================
// Descriptors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    pub name: String,
    pub role: ComponentRole,
    pub class_id: ClassId,
    #[serde(default)]
    pub priority: i32,
}

impl ComponentDescriptor {
    pub fn new(name: impl Into<String>, role: ComponentRole, class_id: ClassId, priority: i32) -> Self {
        Self {
            name: name.into(),
            role,
            class_id,
            priority,
        }
    }
}

static DEFAULT_COMPONENTS: Lazy<Vec<ComponentDescriptor>> = Lazy::new(|| {
    use ComponentRole::*;
    vec![
        ComponentDescriptor::new("File Source (Async)", Source, CLSID_FILE_SOURCE_ASYNC, 100),
        ComponentDescriptor::new("LAV Splitter", Splitter, CLSID_LAV_SPLITTER, 100),
        ComponentDescriptor::new("LAV Video Decoder", VideoDecoder, CLSID_LAV_VIDEO, 100),
        ComponentDescriptor::new("Microsoft DTV-DVD Video Decoder", VideoDecoder, CLSID_MS_DTV_VIDEO, 50),
        ComponentDescriptor::new("Video Renderer", VideoRenderer, CLSID_VIDEO_RENDERER, 100),
        ComponentDescriptor::new("Enhanced Video Renderer", VideoRenderer, CLSID_ENHANCED_VIDEO_RENDERER, 50),
        ComponentDescriptor::new("LAV Audio Decoder", AudioDecoder, CLSID_LAV_AUDIO, 100),
        ComponentDescriptor::new("Microsoft DTV-DVD Audio Decoder", AudioDecoder, CLSID_MS_DTV_AUDIO, 50),
        ComponentDescriptor::new("DirectSound Audio Renderer", AudioRenderer, CLSID_DSOUND_RENDERER, 100),
        ComponentDescriptor::new("Default WaveOut Device", AudioRenderer, CLSID_WAVEOUT_RENDERER, 50),
    ]
});

// ============================================================================
// Registry
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    descriptors: Vec<ComponentDescriptor>,
}

impl ComponentRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        for descriptor in DEFAULT_COMPONENTS.iter() {
            registry.register(descriptor.clone());
        }
        registry
    }

    /// Defaults, plus the components the config adds, minus the ones it
    /// disables
    pub fn from_config(config: &EngineConfig) -> Self {
        let mut registry = Self::with_defaults();
        for descriptor in &config.components {
            registry.register(descriptor.clone());
        }
        for name in &config.disabled_components {
            if !registry.disable(name) {
                tracing::warn!("Disabled component not registered: {}", name);
            }
        }
        registry
    }

    /// Register a descriptor. Higher priority wins; equal priorities keep
    /// registration order.
    pub fn register(&mut self, descriptor: ComponentDescriptor) {
        self.descriptors.push(descriptor);
        self.descriptors.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    /// Drop every descriptor with this name. Returns whether any matched.
    pub fn disable(&mut self, name: &str) -> bool {
        let before = self.descriptors.len();
        self.descriptors.retain(|d| d.name != name);
        self.descriptors.len() != before
    }

    pub fn descriptors(&self) -> &[ComponentDescriptor] {
        &self.descriptors
    }

    /// Candidates for a role, best first
    pub fn candidates(&self, role: ComponentRole) -> impl Iterator<Item = &ComponentDescriptor> {
        self.descriptors.iter().filter(move |d| d.role == role)
    }

    /// Instantiate the best available implementation of `role`.
    ///
    /// The filter is returned unregistered: adding it to the graph and to the
    /// pipeline's arena is the caller's job.
    pub fn create_component<G: FilterGraph>(
        &self,
        graph: &mut G,
        role: ComponentRole,
    ) -> GraphResult<(G::Filter, &ComponentDescriptor)> {
        let mut last_code = hresult::REGDB_E_CLASSNOTREG;

        for descriptor in self.candidates(role) {
            match graph.instantiate(descriptor) {
                Ok(filter) => {
                    tracing::debug!("{}: using {} {}", role, descriptor.name, descriptor.class_id);
                    return Ok((filter, descriptor));
                }
                Err(e) => {
                    tracing::debug!("{}: {} unavailable: {}", role, descriptor.name, e);
                    last_code = e.code;
                }
            }
        }

        Err(GraphError::ComponentUnavailable {
            role,
            code: last_code,
        })
    }
}
