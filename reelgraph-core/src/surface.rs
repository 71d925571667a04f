//! Output surface
//!
//! The drawable area the video renderer is parented to. The engine only
//! needs a raw window handle and the current client rectangle; window
//! creation, sizing and centring belong to the front-end.

use std::cell::Cell;

use raw_window_handle::RawWindowHandle;

/// Rectangle in surface client coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// From left/top/right/bottom edges (Win32 `RECT` layout)
    pub fn from_edges(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self::new(left, top, right - left, bottom - top)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

/// Surface the video window is bound to
pub trait OutputSurface {
    /// Raw handle passed to the video window as owner and message drain
    fn raw_handle(&self) -> isize;

    /// Current client area
    fn client_rect(&self) -> Rect;
}

/// Output surface backed by a `raw-window-handle` handle.
///
/// The front-end keeps the client rectangle current with
/// [`NativeSurface::set_client_rect`] when its window is resized.
pub struct NativeSurface {
    handle: RawWindowHandle,
    client: Cell<Rect>,
}

impl NativeSurface {
    pub fn new(handle: RawWindowHandle, client: Rect) -> Self {
        Self {
            handle,
            client: Cell::new(client),
        }
    }

    pub fn set_client_rect(&self, rect: Rect) {
        self.client.set(rect);
    }

    pub fn handle(&self) -> RawWindowHandle {
        self.handle
    }
}

impl OutputSurface for NativeSurface {
    fn raw_handle(&self) -> isize {
        match self.handle {
            RawWindowHandle::Win32(h) => h.hwnd.get(),
            RawWindowHandle::Xlib(h) => h.window as isize,
            RawWindowHandle::Xcb(h) => h.window.get() as isize,
            RawWindowHandle::Wayland(h) => h.surface.as_ptr() as isize,
            RawWindowHandle::AppKit(h) => h.ns_view.as_ptr() as isize,
            _ => 0,
        }
    }

    fn client_rect(&self) -> Rect {
        self.client.get()
    }
}

/// Surface with a fixed handle and client rectangle. Used for headless
/// playback, where no window exists, and to remember what a pipeline was
/// last bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticSurface {
    pub handle: isize,
    pub rect: Rect,
}

impl StaticSurface {
    pub fn new(handle: isize, width: i32, height: i32) -> Self {
        Self {
            handle,
            rect: Rect::new(0, 0, width, height),
        }
    }
}

impl OutputSurface for StaticSurface {
    fn raw_handle(&self) -> isize {
        self.handle
    }

    fn client_rect(&self) -> Rect {
        self.rect
    }
}
