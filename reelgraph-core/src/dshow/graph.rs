//! DirectShow filter graph
//!
//! Thin [`FilterGraph`] over `IGraphBuilder`. Filters and pins are the COM
//! interface pointers themselves; dropping one calls `Release`.

use std::path::Path;
use std::sync::Arc;

use windows::core::{Interface, HSTRING};
use windows::Win32::Media::DirectShow::{
    IBaseFilter, IBasicAudio, IBasicVideo, IFileSourceFilter, IGraphBuilder, IMediaControl,
    IMediaSeeking, IPin, IVideoWindow, AM_SEEKING_AbsolutePositioning, AM_SEEKING_NoPositioning,
    PINDIR_INPUT, PINDIR_OUTPUT,
};
use windows::Win32::System::Com::{CoCreateInstance, CoTaskMemFree, CLSCTX_INPROC_SERVER};

use super::interfaces::{self, OA_FALSE, OA_TRUE, REFTIME_PER_SEC};
use crate::framework::{
    hresult, AudioControl, FilterGraph, FrameworkError, FrameworkResult, MediaControl,
    PinDirection, PositionControl, VideoWindow, WindowStyle,
};
use crate::registry::ComponentDescriptor;
use crate::surface::Rect;

fn com_error(e: windows::core::Error) -> FrameworkError {
    FrameworkError::new(e.code().0, e.message().to_string())
}

pub struct DShowPin {
    pin: IPin,
    name: String,
}

pub struct DShowGraph {
    builder: IGraphBuilder,
}

impl DShowGraph {
    pub(super) fn new(builder: IGraphBuilder) -> Self {
        Self { builder }
    }
}

fn pin_id(pin: &IPin) -> String {
    unsafe {
        match pin.QueryId() {
            Ok(id) => {
                let name = id.to_string().unwrap_or_default();
                CoTaskMemFree(Some(id.0 as *const _));
                name
            }
            Err(_) => String::new(),
        }
    }
}

impl FilterGraph for DShowGraph {
    type Filter = IBaseFilter;
    type Pin = DShowPin;

    fn instantiate(&mut self, descriptor: &ComponentDescriptor) -> FrameworkResult<IBaseFilter> {
        if !interfaces::class_registered(descriptor.class_id) {
            return Err(FrameworkError::new(
                hresult::REGDB_E_CLASSNOTREG,
                format!("{} {} is not registered", descriptor.name, descriptor.class_id),
            ));
        }
        if let Some(server) = interfaces::class_server(descriptor.class_id) {
            tracing::trace!("{} served by {}", descriptor.name, server);
        }

        unsafe {
            CoCreateInstance(
                &interfaces::guid(descriptor.class_id),
                None,
                CLSCTX_INPROC_SERVER,
            )
            .map_err(com_error)
        }
    }

    fn add_filter(&mut self, filter: &IBaseFilter, label: &str) -> FrameworkResult<()> {
        unsafe {
            self.builder
                .AddFilter(filter, &HSTRING::from(label))
                .map_err(com_error)
        }
    }

    fn remove_filter(&mut self, filter: &IBaseFilter) -> FrameworkResult<()> {
        unsafe { self.builder.RemoveFilter(filter).map_err(com_error) }
    }

    fn pins(&self, filter: &IBaseFilter, direction: PinDirection) -> FrameworkResult<Vec<DShowPin>> {
        let wanted = match direction {
            PinDirection::Input => PINDIR_INPUT,
            PinDirection::Output => PINDIR_OUTPUT,
        };

        let mut found = Vec::new();
        unsafe {
            let pins = filter.EnumPins().map_err(com_error)?;
            let mut slot = [None];
            while pins.Next(&mut slot, None).0 == hresult::S_OK {
                let Some(pin) = slot[0].take() else { break };
                if pin.QueryDirection().map_err(com_error)? == wanted {
                    let name = pin_id(&pin);
                    found.push(DShowPin { pin, name });
                }
            }
        }
        Ok(found)
    }

    fn pin_name(&self, pin: &DShowPin) -> String {
        pin.name.clone()
    }

    fn connect(&mut self, output: &DShowPin, input: &DShowPin) -> FrameworkResult<()> {
        unsafe {
            self.builder
                .ConnectDirect(&output.pin, &input.pin, None)
                .map_err(com_error)
        }
    }

    fn load_source(&mut self, source: &IBaseFilter, path: &Path) -> FrameworkResult<()> {
        unsafe {
            let loader: IFileSourceFilter = source.cast().map_err(com_error)?;
            loader
                .Load(&HSTRING::from(path.as_os_str()), None)
                .map_err(com_error)
        }
    }

    fn media_control(&self) -> Option<Box<dyn MediaControl>> {
        let control: IMediaControl = self.builder.cast().ok()?;
        Some(Box::new(DShowMediaControl(control)))
    }

    fn position_control(&self) -> Option<Arc<dyn PositionControl>> {
        let seeking: IMediaSeeking = self.builder.cast().ok()?;
        Some(Arc::new(DShowSeeking(seeking)))
    }

    fn video_window(&self) -> Option<Box<dyn VideoWindow>> {
        let window: IVideoWindow = self.builder.cast().ok()?;
        let video: IBasicVideo = self.builder.cast().ok()?;
        Some(Box::new(DShowVideoWindow { window, video }))
    }

    fn audio_control(&self) -> Option<Box<dyn AudioControl>> {
        let audio: IBasicAudio = self.builder.cast().ok()?;
        Some(Box::new(DShowAudio(audio)))
    }
}

// ============================================================================
// Capabilities
// ============================================================================

struct DShowMediaControl(IMediaControl);

impl MediaControl for DShowMediaControl {
    fn run(&self) -> FrameworkResult<()> {
        unsafe { self.0.Run().map_err(com_error) }
    }

    fn pause(&self) -> FrameworkResult<()> {
        unsafe { self.0.Pause().map_err(com_error) }
    }

    fn stop(&self) -> FrameworkResult<()> {
        unsafe { self.0.Stop().map_err(com_error) }
    }
}

struct DShowSeeking(IMediaSeeking);

// The graph is created in the multithreaded apartment, so its interface
// pointers may be called from the polling thread.
unsafe impl Send for DShowSeeking {}
unsafe impl Sync for DShowSeeking {}

impl PositionControl for DShowSeeking {
    fn duration(&self) -> FrameworkResult<f64> {
        let duration = unsafe { self.0.GetDuration().map_err(com_error)? };
        Ok(duration as f64 / REFTIME_PER_SEC)
    }

    fn current_position(&self) -> FrameworkResult<f64> {
        let position = unsafe { self.0.GetCurrentPosition().map_err(com_error)? };
        Ok(position as f64 / REFTIME_PER_SEC)
    }

    fn set_current_position(&self, position: f64) -> FrameworkResult<()> {
        let mut current = (position.max(0.0) * REFTIME_PER_SEC) as i64;
        unsafe {
            self.0
                .SetPositions(
                    &mut current,
                    AM_SEEKING_AbsolutePositioning.0 as u32,
                    std::ptr::null_mut(),
                    AM_SEEKING_NoPositioning.0 as u32,
                )
                .map_err(com_error)
        }
    }
}

struct DShowVideoWindow {
    window: IVideoWindow,
    video: IBasicVideo,
}

impl VideoWindow for DShowVideoWindow {
    fn set_owner(&self, handle: isize) -> FrameworkResult<()> {
        unsafe { self.window.SetOwner(handle).map_err(com_error) }
    }

    fn set_message_drain(&self, handle: isize) -> FrameworkResult<()> {
        unsafe { self.window.SetMessageDrain(handle).map_err(com_error) }
    }

    fn set_window_style(&self, style: WindowStyle) -> FrameworkResult<()> {
        unsafe {
            self.window
                .SetWindowStyle(style.bits() as i32)
                .map_err(com_error)
        }
    }

    fn set_window_position(&self, rect: Rect) -> FrameworkResult<()> {
        unsafe {
            self.window
                .SetWindowPosition(rect.x, rect.y, rect.width, rect.height)
                .map_err(com_error)
        }
    }

    fn set_visible(&self, visible: bool) -> FrameworkResult<()> {
        let flag = if visible { OA_TRUE } else { OA_FALSE };
        unsafe { self.window.SetVisible(flag).map_err(com_error) }
    }

    fn video_size(&self) -> FrameworkResult<(u32, u32)> {
        let (mut width, mut height) = (0i32, 0i32);
        unsafe {
            self.video
                .GetVideoSize(&mut width, &mut height)
                .map_err(com_error)?;
        }
        Ok((width.max(0) as u32, height.max(0) as u32))
    }
}

struct DShowAudio(IBasicAudio);

impl AudioControl for DShowAudio {
    fn volume(&self) -> FrameworkResult<i32> {
        unsafe { self.0.Volume().map_err(com_error) }
    }

    fn set_volume(&self, volume: i32) -> FrameworkResult<()> {
        unsafe { self.0.SetVolume(volume).map_err(com_error) }
    }
}
