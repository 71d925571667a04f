//! Per-pipeline component arena
//!
//! Every filter the builder instantiates is registered here immediately,
//! tagged with the chain it belongs to. Release only ever happens by taking
//! slots back out of the arena, so a failed build can unwind by chain in
//! reverse creation order without scattered release calls.

use std::fmt;

use crate::registry::ComponentRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u32);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which part of the graph a component belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainKind {
    /// Source and splitter
    Trunk,
    Video,
    Audio,
}

/// Read-only view of a registered component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineComponent {
    pub id: ComponentId,
    pub role: ComponentRole,
    pub label: String,
    pub chain: ChainKind,
}

pub(crate) struct Slot<H> {
    pub(crate) info: PipelineComponent,
    pub(crate) handle: H,
}

pub struct ComponentArena<H> {
    slots: Vec<Slot<H>>,
    next_id: u32,
}

impl<H> ComponentArena<H> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            next_id: 0,
        }
    }

    /// Take ownership of a freshly instantiated component
    pub fn register(
        &mut self,
        role: ComponentRole,
        label: impl Into<String>,
        chain: ChainKind,
        handle: H,
    ) -> ComponentId {
        let id = ComponentId(self.next_id);
        self.next_id += 1;
        self.slots.push(Slot {
            info: PipelineComponent {
                id,
                role,
                label: label.into(),
                chain,
            },
            handle,
        });
        id
    }

    pub fn get(&self, id: ComponentId) -> Option<&H> {
        self.slots
            .iter()
            .find(|s| s.info.id == id)
            .map(|s| &s.handle)
    }

    pub fn info(&self, id: ComponentId) -> Option<&PipelineComponent> {
        self.slots.iter().find(|s| s.info.id == id).map(|s| &s.info)
    }

    pub fn components(&self) -> impl Iterator<Item = &PipelineComponent> {
        self.slots.iter().map(|s| &s.info)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn chain_len(&self, chain: ChainKind) -> usize {
        self.slots.iter().filter(|s| s.info.chain == chain).count()
    }

    /// Remove every slot of one chain, newest first
    pub(crate) fn take_chain(&mut self, chain: ChainKind) -> Vec<Slot<H>> {
        let mut taken = Vec::new();
        let mut i = self.slots.len();
        while i > 0 {
            i -= 1;
            if self.slots[i].info.chain == chain {
                taken.push(self.slots.remove(i));
            }
        }
        taken
    }
}

impl<H> Default for ComponentArena<H> {
    fn default() -> Self {
        Self::new()
    }
}
