//! DirectShow framework
//!
//! Builds graphs through `IGraphBuilder` on the calling thread. COM is
//! initialised (multithreaded apartment) when the framework is created and
//! released when it is dropped, so a [`DShowFramework`] must outlive every
//! pipeline built from it and stay on its thread.

mod graph;
mod interfaces;

use windows::Win32::Media::DirectShow::IGraphBuilder;
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CoUninitialize, CLSCTX_INPROC_SERVER, COINIT_MULTITHREADED,
};

use crate::framework::{FrameworkError, FrameworkResult, MediaFramework};
use crate::registry::{ComponentRegistry, ComponentRole};

pub use graph::{DShowGraph, DShowPin};
pub use interfaces::{class_registered, CLSID_FILTERGRAPH};

pub struct DShowFramework {
    _com: ComGuard,
}

impl DShowFramework {
    pub fn new() -> FrameworkResult<Self> {
        Ok(Self {
            _com: ComGuard::new()?,
        })
    }

    /// Log which registered components are actually installed
    pub fn report_installed(registry: &ComponentRegistry) {
        for role in ComponentRole::ALL {
            for descriptor in registry.candidates(role) {
                if class_registered(descriptor.class_id) {
                    tracing::info!("{}: {} installed", role, descriptor.name);
                } else {
                    tracing::debug!("{}: {} not installed", role, descriptor.name);
                }
            }
        }
    }
}

impl MediaFramework for DShowFramework {
    type Graph = DShowGraph;

    fn name(&self) -> &str {
        "directshow"
    }

    fn create_graph(&self) -> FrameworkResult<DShowGraph> {
        let builder: IGraphBuilder = unsafe {
            CoCreateInstance(&CLSID_FILTERGRAPH, None, CLSCTX_INPROC_SERVER)
                .map_err(|e| FrameworkError::new(e.code().0, e.message().to_string()))?
        };
        Ok(DShowGraph::new(builder))
    }
}

/// Balanced CoInitializeEx/CoUninitialize for the owning thread
struct ComGuard;

impl ComGuard {
    fn new() -> FrameworkResult<Self> {
        unsafe {
            CoInitializeEx(None, COINIT_MULTITHREADED)
                .ok()
                .map_err(|e| FrameworkError::new(e.code().0, format!("COM initialisation failed: {}", e)))?;
        }
        tracing::debug!("COM initialised");
        Ok(Self)
    }
}

impl Drop for ComGuard {
    fn drop(&mut self) {
        unsafe { CoUninitialize() };
        tracing::debug!("COM released");
    }
}
