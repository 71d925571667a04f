//! Lifecycle / resource manager
//!
//! The single release path of a pipeline. Teardown order:
//!
//! 1. stop the graph if it is running or paused
//! 2. detach the video window, drop the capability handles, empty the
//!    position slot shared with pollers
//! 3. video chain, audio chain, then splitter and source, each removed from
//!    the graph before its handle is dropped
//! 4. the graph itself
//!
//! `clear()` can be called from any state, any number of times.

use crate::arena::{ChainKind, ComponentArena};
use crate::framework::{FilterGraph, MediaFramework};
use crate::graph::{BuildState, Pipeline};

/// Remove one chain's components from the graph and drop them, newest
/// first. `graph` is `None` when the graph itself is already gone.
pub(crate) fn release_chain<G: FilterGraph>(
    mut graph: Option<&mut G>,
    arena: &mut ComponentArena<G::Filter>,
    chain: ChainKind,
) -> usize {
    let slots = arena.take_chain(chain);
    let count = slots.len();

    for slot in slots {
        if let Some(graph) = graph.as_mut() {
            if let Err(e) = graph.remove_filter(&slot.handle) {
                tracing::debug!("Removing {} from graph: {}", slot.info.label, e);
            }
        }
        tracing::trace!("Released {} {}", slot.info.id, slot.info.label);
        drop(slot);
    }

    count
}

impl<F: MediaFramework> Pipeline<F> {
    /// Release everything the pipeline holds
    pub fn clear(&mut self) {
        let holds_anything = self.graph.is_some()
            || !self.arena.is_empty()
            || self.media_control.is_some()
            || self.position.is_available();

        self.is_playing = false;
        self.video = None;
        self.audio = None;
        if !holds_anything {
            return;
        }

        if let Some(control) = self.media_control.as_ref() {
            if matches!(self.state, BuildState::Running | BuildState::Paused) {
                if let Err(e) = control.stop() {
                    tracing::warn!("Stopping graph before teardown: {}", e);
                }
            }
        }

        if let Some(window) = self.video_window.take() {
            // Hide and un-parent before the renderer goes away
            if let Err(e) = window.set_visible(false).and_then(|_| window.set_owner(0)) {
                tracing::debug!("Detaching video window: {}", e);
            }
        }
        self.audio_control = None;
        self.media_control = None;
        self.position.release();

        let mut released = 0;
        for chain in [ChainKind::Video, ChainKind::Audio, ChainKind::Trunk] {
            released += release_chain(self.graph.as_mut(), &mut self.arena, chain);
        }

        self.connections.clear();
        if self.graph.take().is_some() {
            tracing::trace!("Filter graph released");
        }

        self.state = BuildState::TornDown;
        tracing::info!("Pipeline cleared ({} components released)", released);
    }
}

impl<F: MediaFramework> Drop for Pipeline<F> {
    fn drop(&mut self) {
        self.clear();
    }
}
