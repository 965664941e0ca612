//! WGL context binding

use crate::config::GlVersion;
use anyhow::{Context, bail};
use log::{debug, warn};
use std::ffi::{CStr, c_int, c_void};
use std::mem;
use std::ptr;
use windows::Win32::Foundation::{BOOL, FARPROC, HMODULE};
use windows::Win32::Graphics::Gdi::HDC;
use windows::Win32::Graphics::OpenGL::{
    ChoosePixelFormat, HGLRC, PFD_DOUBLEBUFFER, PFD_DRAW_TO_WINDOW, PFD_SUPPORT_OPENGL,
    PFD_TYPE_RGBA, PIXELFORMATDESCRIPTOR, SetPixelFormat, SwapBuffers, wglCreateContext,
    wglDeleteContext, wglGetProcAddress, wglMakeCurrent,
};
use windows::Win32::System::LibraryLoader::{GetProcAddress, LoadLibraryW};
use windows::core::{PCSTR, s, w};

const WGL_CONTEXT_MAJOR_VERSION_ARB: c_int = 0x2091;
const WGL_CONTEXT_MINOR_VERSION_ARB: c_int = 0x2092;
const WGL_CONTEXT_PROFILE_MASK_ARB: c_int = 0x9126;
const WGL_CONTEXT_CORE_PROFILE_BIT_ARB: c_int = 0x0001;

type WglCreateContextAttribsArb =
    unsafe extern "system" fn(HDC, HGLRC, *const c_int) -> HGLRC;
type WglSwapIntervalExt = unsafe extern "system" fn(c_int) -> BOOL;

/// Some drivers hand out small sentinels instead of null for unknown names.
fn valid_proc(proc: FARPROC) -> FARPROC {
    let f = proc?;
    match f as usize {
        1 | 2 | 3 | usize::MAX => None,
        _ => Some(f),
    }
}

/// Double-buffered RGBA8 / depth 24 / stencil 8 pixel format. Must be set before any context is
/// created on `hdc`, and can only be set once per window.
pub(super) fn set_pixel_format(hdc: HDC) -> anyhow::Result<()> {
    let pfd = PIXELFORMATDESCRIPTOR {
        nSize: mem::size_of::<PIXELFORMATDESCRIPTOR>() as u16,
        nVersion: 1,
        dwFlags: PFD_DRAW_TO_WINDOW | PFD_SUPPORT_OPENGL | PFD_DOUBLEBUFFER,
        iPixelType: PFD_TYPE_RGBA,
        cColorBits: 32,
        cAlphaBits: 8,
        cDepthBits: 24,
        cStencilBits: 8,
        ..Default::default()
    };

    unsafe {
        let format = ChoosePixelFormat(hdc, &pfd);
        if format == 0 {
            bail!("no double-buffered RGBA pixel format is available");
        }
        SetPixelFormat(hdc, format, &pfd).context("SetPixelFormat failed")?;
    }

    Ok(())
}

pub(super) struct WglContext {
    context: HGLRC,
    opengl32: HMODULE,
    swap_interval_ext: Option<WglSwapIntervalExt>,
}

impl WglContext {
    /// Create a context of exactly `version` on `hdc`.
    ///
    /// `wglCreateContextAttribsARB` can only be resolved while some context is current, so a legacy
    /// context is bound for the duration of the call. Nothing is current on return.
    pub(super) fn create(hdc: HDC, version: GlVersion) -> anyhow::Result<Self> {
        unsafe {
            let opengl32 = LoadLibraryW(w!("opengl32.dll")).context("opengl32.dll is missing")?;

            let legacy = wglCreateContext(hdc).context("wglCreateContext failed")?;
            if let Err(e) = wglMakeCurrent(hdc, legacy) {
                _ = wglDeleteContext(legacy);
                return Err(e).context("could not bind the bootstrap context");
            }

            let create = valid_proc(wglGetProcAddress(s!("wglCreateContextAttribsARB")))
                .map(|f| mem::transmute::<unsafe extern "system" fn() -> isize, WglCreateContextAttribsArb>(f));

            let mut attributes = vec![
                WGL_CONTEXT_MAJOR_VERSION_ARB,
                version.major() as c_int,
                WGL_CONTEXT_MINOR_VERSION_ARB,
                version.minor() as c_int,
            ];
            if version.uses_core_profile() {
                attributes.extend([WGL_CONTEXT_PROFILE_MASK_ARB, WGL_CONTEXT_CORE_PROFILE_BIT_ARB]);
            }
            attributes.push(0);

            let context = match create {
                Some(create) => create(hdc, HGLRC::default(), attributes.as_ptr()),
                None => HGLRC::default(),
            };

            let swap_interval_ext = valid_proc(wglGetProcAddress(s!("wglSwapIntervalEXT")))
                .map(|f| mem::transmute::<unsafe extern "system" fn() -> isize, WglSwapIntervalExt>(f));

            _ = wglMakeCurrent(HDC::default(), HGLRC::default());
            _ = wglDeleteContext(legacy);

            if create.is_none() {
                bail!("WGL_ARB_create_context is not supported by the driver");
            }
            if context.is_invalid() {
                bail!("driver rejected OpenGL {} context creation", version);
            }

            debug!("Created WGL context for OpenGL {}", version);
            Ok(Self {
                context,
                opengl32,
                swap_interval_ext,
            })
        }
    }

    pub(super) fn make_current(&self, hdc: HDC) -> anyhow::Result<()> {
        unsafe { wglMakeCurrent(hdc, self.context) }.context("wglMakeCurrent failed")
    }

    pub(super) fn make_not_current() -> anyhow::Result<()> {
        unsafe { wglMakeCurrent(HDC::default(), HGLRC::default()) }
            .context("wglMakeCurrent(None) failed")
    }

    pub(super) fn swap_buffers(&self, hdc: HDC) -> anyhow::Result<()> {
        unsafe { SwapBuffers(hdc) }.context("SwapBuffers failed")
    }

    pub(super) fn set_swap_interval(&self, interval: i32) -> anyhow::Result<()> {
        let Some(swap_interval) = self.swap_interval_ext else {
            warn!("No WGL swap control extension, swap interval stays at the driver default");
            bail!("swap interval control is not supported by the driver");
        };

        if !unsafe { swap_interval(interval) }.as_bool() {
            bail!("wglSwapIntervalEXT({}) failed", interval);
        }
        Ok(())
    }

    /// Extension and post-1.1 functions come from the driver, the 1.1 core from opengl32.dll.
    pub(super) fn get_proc_address(&self, name: &CStr) -> *const c_void {
        unsafe {
            let name = PCSTR(name.as_ptr() as *const u8);
            match valid_proc(wglGetProcAddress(name)).or_else(|| GetProcAddress(self.opengl32, name)) {
                Some(f) => f as *const c_void,
                None => ptr::null(),
            }
        }
    }

    pub(super) fn destroy(&mut self) {
        if !self.context.is_invalid() {
            unsafe {
                _ = wglDeleteContext(self.context);
            }
            self.context = HGLRC::default();
        }
    }
}
