//! Windowing collaborator seam
//!
//! The core never creates windows or handles input; it only needs a native
//! surface handle and the current pixel dimensions. Any windowing backend
//! (GLFW, winit, ...) satisfies this by exposing its raw handles.

use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

/// Source of the native handles and pixel dimensions the renderer binds to.
///
/// Implementations are expected to outlive the [`Renderer`](crate::Renderer)
/// built on top of them; the surface created from these handles is destroyed
/// when the renderer's context is torn down.
pub trait WindowSource {
    /// Raw display handle for instance extension selection and surface creation
    fn raw_display_handle(&self) -> RawDisplayHandle;

    /// Raw window handle for surface creation
    fn raw_window_handle(&self) -> RawWindowHandle;

    /// Current framebuffer size in pixels
    ///
    /// Consulted only when the surface reports an undefined extent; the
    /// swapchain then takes the window size verbatim.
    fn framebuffer_size(&self) -> (u32, u32);
}
