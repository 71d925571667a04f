//! Transport controller
//!
//! Run/pause/stop, seeking and video-surface geometry on a built pipeline.
//! Queries degrade to neutral values when the graph lacks the capability:
//! no position interface reads as 0, no audio renderer has no volume.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{GraphError, GraphResult};
use crate::framework::{MediaFramework, PositionControl, VOLUME_FULL, VOLUME_SILENT};
use crate::graph::{BuildState, Pipeline};
use crate::surface::{OutputSurface, Rect};

// ============================================================================
// Position probe
// ============================================================================

/// Shared read access to the pipeline's position interface.
///
/// Clones see the same slot. The pipeline empties it under the write lock
/// during teardown, after which every read returns 0.
#[derive(Clone, Default)]
pub struct PositionProbe {
    slot: Arc<RwLock<Option<Arc<dyn PositionControl>>>>,
}

impl PositionProbe {
    pub(crate) fn install(&self, control: Option<Arc<dyn PositionControl>>) {
        *self.slot.write() = control;
    }

    /// Returns whether something was installed
    pub(crate) fn release(&self) -> bool {
        self.slot.write().take().is_some()
    }

    pub fn is_available(&self) -> bool {
        self.slot.read().is_some()
    }

    pub fn position(&self) -> f64 {
        match self.slot.read().as_ref() {
            Some(control) => control.current_position().unwrap_or_else(|e| {
                tracing::debug!("Position query failed: {}", e);
                0.0
            }),
            None => 0.0,
        }
    }

    pub fn duration(&self) -> f64 {
        match self.slot.read().as_ref() {
            Some(control) => control.duration().unwrap_or_else(|e| {
                tracing::debug!("Duration query failed: {}", e);
                0.0
            }),
            None => 0.0,
        }
    }

    /// No-op without a position interface
    pub fn seek(&self, position: f64) {
        if let Some(control) = self.slot.read().as_ref() {
            if let Err(e) = control.set_current_position(position) {
                tracing::warn!("Seek to {:.3} failed: {}", position, e);
            }
        }
    }
}

impl fmt::Debug for PositionProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PositionProbe")
            .field("available", &self.is_available())
            .finish()
    }
}

// ============================================================================
// Transport state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    Paused,
    Stopped,
}

/// Snapshot of the transport, derived from the graph on every call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportState {
    pub playback: PlaybackState,
    pub position: f64,
    pub duration: f64,
}

impl TransportState {
    /// Fraction played, 0.0 when the duration is unknown
    pub fn progress(&self) -> f64 {
        if self.duration > 0.0 {
            (self.position / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

// ============================================================================
// Pipeline transport
// ============================================================================

impl<F: MediaFramework> Pipeline<F> {
    pub fn play(&mut self) -> GraphResult<()> {
        let control = self.media_control.as_ref().ok_or(GraphError::NotBuilt)?;
        control
            .run()
            .map_err(|e| GraphError::framework("running graph", e))?;
        self.state = BuildState::Running;
        self.is_playing = true;
        tracing::debug!("Playing");
        Ok(())
    }

    pub fn pause(&mut self) -> GraphResult<()> {
        let control = self.media_control.as_ref().ok_or(GraphError::NotBuilt)?;
        control
            .pause()
            .map_err(|e| GraphError::framework("pausing graph", e))?;
        self.state = BuildState::Paused;
        self.is_playing = false;
        tracing::debug!("Paused");
        Ok(())
    }

    /// Stop without releasing anything; `play` resumes
    pub fn stop(&mut self) -> GraphResult<()> {
        let control = self.media_control.as_ref().ok_or(GraphError::NotBuilt)?;
        control
            .stop()
            .map_err(|e| GraphError::framework("stopping graph", e))?;
        self.state = BuildState::Stopped;
        self.is_playing = false;
        tracing::debug!("Stopped");
        Ok(())
    }

    /// Play when paused or stopped, pause when playing
    pub fn toggle_pause(&mut self) -> GraphResult<()> {
        if self.is_playing {
            self.pause()
        } else {
            self.play()
        }
    }

    /// Seconds; 0 without a position interface
    pub fn get_position(&self) -> f64 {
        self.position.position()
    }

    pub fn get_duration(&self) -> f64 {
        self.position.duration()
    }

    pub fn set_position(&mut self, position: f64) {
        self.position.seek(position);
    }

    /// Clone of the position slot, for readers on other threads
    pub fn position_probe(&self) -> PositionProbe {
        self.position.clone()
    }

    /// Move/resize the video window inside its surface
    pub fn set_output_rectangle(&mut self, rect: Rect) -> GraphResult<()> {
        let window = self.video_window.as_ref().ok_or(GraphError::NoVideoSurface)?;
        window
            .set_window_position(rect)
            .map_err(|e| GraphError::framework("positioning video window", e))?;
        if let Some(surface) = self.surface.as_mut() {
            surface.rect = rect;
        }
        Ok(())
    }

    /// Follow a resized surface. Audio-only pipelines have nothing to move.
    pub fn on_surface_resized(&mut self, surface: &dyn OutputSurface) -> GraphResult<()> {
        if self.video_window.is_none() {
            return Ok(());
        }
        self.set_output_rectangle(surface.client_rect())
    }

    /// Native size of the video, `None` without a video chain
    pub fn video_size(&self) -> Option<(u32, u32)> {
        let window = self.video_window.as_ref()?;
        match window.video_size() {
            Ok(size) => Some(size),
            Err(e) => {
                tracing::debug!("Video size query failed: {}", e);
                None
            }
        }
    }

    /// Hundredths of a decibel, `None` without an audio chain
    pub fn volume(&self) -> Option<i32> {
        self.audio_control.as_ref()?.volume().ok()
    }

    /// Clamped to the renderer's range. No-op without an audio chain.
    pub fn set_volume(&mut self, volume: i32) -> GraphResult<()> {
        let Some(control) = self.audio_control.as_ref() else {
            return Ok(());
        };
        control
            .set_volume(volume.clamp(VOLUME_SILENT, VOLUME_FULL))
            .map_err(|e| GraphError::framework("setting volume", e))
    }

    pub fn transport_state(&self) -> TransportState {
        let playback = match self.state {
            BuildState::Running if self.is_playing => PlaybackState::Playing,
            BuildState::Paused => PlaybackState::Paused,
            _ => PlaybackState::Stopped,
        };
        TransportState {
            playback,
            position: self.get_position(),
            duration: self.get_duration(),
        }
    }
}

#[cfg(all(test, feature = "sim"))]
mod tests {
    use super::*;
    use crate::sim::{fixtures, SimFramework};
    use crate::surface::StaticSurface;

    fn surface() -> StaticSurface {
        StaticSurface::new(0x77, 800, 450)
    }

    fn built(framework: SimFramework, file: &tempfile::NamedTempFile) -> Pipeline<SimFramework> {
        let mut pipeline = Pipeline::new(framework);
        pipeline.build_graph(file.path(), Some(&surface())).unwrap();
        pipeline
    }

    #[test]
    fn test_unbuilt_pipeline_transport() {
        let mut pipeline = Pipeline::new(SimFramework::new());
        assert_eq!(pipeline.play(), Err(GraphError::NotBuilt));
        assert_eq!(pipeline.pause(), Err(GraphError::NotBuilt));
        assert_eq!(pipeline.stop(), Err(GraphError::NotBuilt));
        assert_eq!(pipeline.get_position(), 0.0);
        assert_eq!(pipeline.get_duration(), 0.0);
        pipeline.set_position(5.0);
        assert_eq!(pipeline.get_position(), 0.0);
        assert_eq!(
            pipeline.set_output_rectangle(Rect::new(0, 0, 10, 10)),
            Err(GraphError::NoVideoSurface)
        );
        assert_eq!(pipeline.video_size(), None);
        assert_eq!(pipeline.volume(), None);
        assert_eq!(pipeline.set_volume(-500), Ok(()));
        assert_eq!(pipeline.transport_state().playback, PlaybackState::Stopped);
    }

    #[test]
    fn test_seek_round_trip() {
        let file = fixtures::mp4_file(&[("vide", "avc1"), ("soun", "mp4a")], 120.0);
        let mut pipeline = built(SimFramework::new(), &file);
        pipeline.pause().unwrap();

        pipeline.set_position(42.0);
        assert!((pipeline.get_position() - 42.0).abs() < 1e-9);
        assert_eq!(pipeline.get_duration(), 120.0);

        // Running clock keeps advancing from the seek point
        pipeline.play().unwrap();
        pipeline.set_position(60.0);
        let p = pipeline.get_position();
        assert!((60.0..60.5).contains(&p), "{}", p);
    }

    #[test]
    fn test_no_position_interface_reads_zero() {
        let file = fixtures::mp4_file(&[("vide", "avc1")], 30.0);
        let mut pipeline = built(SimFramework::new().without_position(), &file);
        assert!(pipeline.is_playing());
        pipeline.set_position(10.0);
        assert_eq!(pipeline.get_position(), 0.0);
        assert_eq!(pipeline.get_duration(), 0.0);
        assert!(!pipeline.position_probe().is_available());
    }

    #[test]
    fn test_play_pause_stop_states() {
        let file = fixtures::wav_file(5.0);
        let mut pipeline = built(SimFramework::new(), &file);
        assert_eq!(pipeline.transport_state().playback, PlaybackState::Playing);

        pipeline.pause().unwrap();
        assert_eq!(pipeline.state(), BuildState::Paused);
        assert_eq!(pipeline.transport_state().playback, PlaybackState::Paused);

        pipeline.toggle_pause().unwrap();
        assert!(pipeline.is_playing());

        pipeline.stop().unwrap();
        assert!(!pipeline.is_playing());
        assert_eq!(pipeline.state(), BuildState::Stopped);
        assert_eq!(pipeline.transport_state().playback, PlaybackState::Stopped);
        assert_eq!(pipeline.transport_state().duration, 5.0);
    }

    #[test]
    fn test_output_rectangle_and_video_size() {
        let file = fixtures::avi_file("XVID", false);
        let framework = SimFramework::new();
        let ledger = framework.ledger();
        let mut pipeline = built(framework, &file);

        assert_eq!(pipeline.video_size(), Some((640, 480)));

        let rect = Rect::new(10, 10, 320, 240);
        pipeline.set_output_rectangle(rect).unwrap();
        assert_eq!(ledger.window().rect, Some(rect));

        let resized = StaticSurface::new(0x77, 1024, 576);
        pipeline.on_surface_resized(&resized).unwrap();
        assert_eq!(ledger.window().rect, Some(Rect::new(0, 0, 1024, 576)));
    }

    #[test]
    fn test_audio_only_has_no_video_surface() {
        let file = fixtures::wav_file(1.0);
        let mut pipeline = built(SimFramework::new(), &file);
        assert_eq!(
            pipeline.set_output_rectangle(Rect::new(0, 0, 1, 1)),
            Err(GraphError::NoVideoSurface)
        );
        assert_eq!(pipeline.on_surface_resized(&surface()), Ok(()));
        assert_eq!(pipeline.video_size(), None);
    }

    #[test]
    fn test_volume_is_clamped() {
        let file = fixtures::wav_file(1.0);
        let mut pipeline = built(SimFramework::new(), &file);
        assert_eq!(pipeline.volume(), Some(VOLUME_FULL));
        pipeline.set_volume(-2500).unwrap();
        assert_eq!(pipeline.volume(), Some(-2500));
        pipeline.set_volume(-99_999).unwrap();
        assert_eq!(pipeline.volume(), Some(VOLUME_SILENT));
        pipeline.set_volume(400).unwrap();
        assert_eq!(pipeline.volume(), Some(VOLUME_FULL));
    }

    #[test]
    fn test_probe_survives_pipeline_clear() {
        let file = fixtures::mp4_file(&[("soun", "mp4a")], 50.0);
        let mut pipeline = built(SimFramework::new(), &file);
        let probe = pipeline.position_probe();
        assert!(probe.is_available());
        assert_eq!(probe.duration(), 50.0);

        pipeline.clear();
        assert!(!probe.is_available());
        assert_eq!(probe.position(), 0.0);
        assert_eq!(probe.duration(), 0.0);
    }
}
