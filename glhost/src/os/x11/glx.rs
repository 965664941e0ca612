//! GLX context binding

use crate::config::GlVersion;
use crate::os::x11::X11Platform;
use anyhow::{Context, bail};
use log::{debug, warn};
use std::ffi::{CStr, c_int, c_void};
use std::mem;
use std::ptr;
use x11_dl::glx::{self, GLXContext, GLXFBConfig, Glx};
use x11_dl::xlib;

const GLX_CONTEXT_MAJOR_VERSION_ARB: c_int = 0x2091;
const GLX_CONTEXT_MINOR_VERSION_ARB: c_int = 0x2092;
const GLX_CONTEXT_PROFILE_MASK_ARB: c_int = 0x9126;
const GLX_CONTEXT_CORE_PROFILE_BIT_ARB: c_int = 0x0001;

type GlxCreateContextAttribsArb = unsafe extern "C" fn(
    *mut xlib::Display,
    GLXFBConfig,
    GLXContext,
    xlib::Bool,
    *const c_int,
) -> GLXContext;

type GlxSwapIntervalExt = unsafe extern "C" fn(*mut xlib::Display, glx::GLXDrawable, c_int);
type GlxSwapIntervalMesa = unsafe extern "C" fn(c_int) -> c_int;

/// Extension entry points resolved once per connection.
pub(super) struct GlxExtensions {
    create_context_attribs: Option<GlxCreateContextAttribsArb>,
    swap_interval_ext: Option<GlxSwapIntervalExt>,
    swap_interval_mesa: Option<GlxSwapIntervalMesa>,
}

impl GlxExtensions {
    pub(super) unsafe fn load(glx: &Glx, display: *mut xlib::Display, screen: c_int) -> Self {
        unsafe {
            let extensions = (glx.glXQueryExtensionsString)(display, screen);
            let extensions = if extensions.is_null() {
                ""
            } else {
                CStr::from_ptr(extensions).to_str().unwrap_or("")
            };
            let has = |name: &str| extensions.split_whitespace().any(|e| e == name);

            let lookup = |name: &CStr| (glx.glXGetProcAddress)(name.as_ptr() as *const u8);

            let create_context_attribs = if has("GLX_ARB_create_context") {
                lookup(c"glXCreateContextAttribsARB")
                    .map(|f| mem::transmute::<unsafe extern "C" fn(), GlxCreateContextAttribsArb>(f))
            } else {
                None
            };

            let swap_interval_ext = if has("GLX_EXT_swap_control") {
                lookup(c"glXSwapIntervalEXT")
                    .map(|f| mem::transmute::<unsafe extern "C" fn(), GlxSwapIntervalExt>(f))
            } else {
                None
            };

            let swap_interval_mesa = if has("GLX_MESA_swap_control") {
                lookup(c"glXSwapIntervalMESA")
                    .map(|f| mem::transmute::<unsafe extern "C" fn(), GlxSwapIntervalMesa>(f))
            } else {
                None
            };

            debug!(
                "GLX extensions: create_context={} swap_control_ext={} swap_control_mesa={}",
                create_context_attribs.is_some(),
                swap_interval_ext.is_some(),
                swap_interval_mesa.is_some()
            );

            Self {
                create_context_attribs,
                swap_interval_ext,
                swap_interval_mesa,
            }
        }
    }
}

/// Framebuffer configs (and therefore `glXCreateContextAttribsARB`) need GLX 1.3.
pub(super) fn check_version(glx: &Glx, display: *mut xlib::Display) -> anyhow::Result<()> {
    let (mut major, mut minor) = (0, 0);
    let ok = unsafe { (glx.glXQueryVersion)(display, &mut major, &mut minor) };

    if ok == xlib::False {
        bail!("X server does not support GLX");
    }

    if (major, minor) < (1, 3) {
        bail!("GLX {}.{} is too old, 1.3 is required", major, minor);
    }

    debug!("GLX version {}.{}", major, minor);
    Ok(())
}

/// Framebuffer configuration and the X visual the window has to be created with.
pub(super) struct ChosenVisual {
    pub fb_config: GLXFBConfig,
    pub visual: *mut xlib::Visual,
    pub visual_id: xlib::VisualID,
    pub depth: c_int,
}

/// Pick a double-buffered RGBA8 / depth 24 / stencil 8 framebuffer config.
pub(super) fn choose_visual(platform: &X11Platform) -> anyhow::Result<ChosenVisual> {
    let attributes = [
        glx::GLX_X_RENDERABLE,
        xlib::True,
        glx::GLX_DRAWABLE_TYPE,
        glx::GLX_WINDOW_BIT,
        glx::GLX_RENDER_TYPE,
        glx::GLX_RGBA_BIT,
        glx::GLX_X_VISUAL_TYPE,
        glx::GLX_TRUE_COLOR,
        glx::GLX_RED_SIZE,
        8,
        glx::GLX_GREEN_SIZE,
        8,
        glx::GLX_BLUE_SIZE,
        8,
        glx::GLX_ALPHA_SIZE,
        8,
        glx::GLX_DEPTH_SIZE,
        24,
        glx::GLX_STENCIL_SIZE,
        8,
        glx::GLX_DOUBLEBUFFER,
        xlib::True,
        0,
    ];

    unsafe {
        let mut count: c_int = 0;
        let configs = (platform.glx.glXChooseFBConfig)(
            platform.display,
            platform.default_screen,
            attributes.as_ptr(),
            &mut count,
        );

        if configs.is_null() || count <= 0 {
            bail!("no double-buffered RGBA framebuffer configuration is available");
        }

        let fb_config = *configs;
        (platform.xlib.XFree)(configs as *mut c_void);

        let info = (platform.glx.glXGetVisualFromFBConfig)(platform.display, fb_config);
        if info.is_null() {
            bail!("framebuffer configuration has no X visual");
        }

        let chosen = ChosenVisual {
            fb_config,
            visual: (*info).visual,
            visual_id: (*info).visualid,
            depth: (*info).depth,
        };
        (platform.xlib.XFree)(info as *mut c_void);

        Ok(chosen)
    }
}

pub(super) struct GlxContext {
    context: GLXContext,
}

impl GlxContext {
    pub(super) fn create(
        platform: &X11Platform,
        fb_config: GLXFBConfig,
        version: GlVersion,
    ) -> anyhow::Result<Self> {
        let create = platform
            .extensions
            .create_context_attribs
            .context("GLX_ARB_create_context is not supported by the driver")?;

        let mut attributes = vec![
            GLX_CONTEXT_MAJOR_VERSION_ARB,
            version.major() as c_int,
            GLX_CONTEXT_MINOR_VERSION_ARB,
            version.minor() as c_int,
        ];
        if version.uses_core_profile() {
            attributes.extend([GLX_CONTEXT_PROFILE_MASK_ARB, GLX_CONTEXT_CORE_PROFILE_BIT_ARB]);
        }
        attributes.push(0);

        // an unsupported version is reported as an X error (BadMatch / GLXBadFBConfig)
        let (context, x_error) = platform.with_error_trap(|| unsafe {
            create(
                platform.display,
                fb_config,
                ptr::null_mut(),
                xlib::True,
                attributes.as_ptr(),
            )
        });

        if context.is_null() || x_error {
            if !context.is_null() {
                unsafe { (platform.glx.glXDestroyContext)(platform.display, context) };
            }
            bail!("driver rejected OpenGL {} context creation", version);
        }

        debug!("Created GLX context for OpenGL {}", version);
        Ok(Self { context })
    }

    pub(super) fn make_current(
        &self,
        platform: &X11Platform,
        drawable: xlib::Window,
    ) -> anyhow::Result<()> {
        let ok = unsafe { (platform.glx.glXMakeCurrent)(platform.display, drawable, self.context) };
        if ok == xlib::False {
            bail!("glXMakeCurrent failed");
        }
        Ok(())
    }

    pub(super) fn make_not_current(platform: &X11Platform) -> anyhow::Result<()> {
        let ok = unsafe { (platform.glx.glXMakeCurrent)(platform.display, 0, ptr::null_mut()) };
        if ok == xlib::False {
            bail!("glXMakeCurrent(None) failed");
        }
        Ok(())
    }

    pub(super) fn swap_buffers(&self, platform: &X11Platform, drawable: xlib::Window) {
        unsafe { (platform.glx.glXSwapBuffers)(platform.display, drawable) };
    }

    pub(super) fn set_swap_interval(
        &self,
        platform: &X11Platform,
        drawable: xlib::Window,
        interval: i32,
    ) -> anyhow::Result<()> {
        if let Some(swap_interval) = platform.extensions.swap_interval_ext {
            unsafe { swap_interval(platform.display, drawable, interval) };
            return Ok(());
        }

        if let Some(swap_interval) = platform.extensions.swap_interval_mesa {
            if unsafe { swap_interval(interval.max(0)) } != 0 {
                bail!("glXSwapIntervalMESA({}) failed", interval);
            }
            return Ok(());
        }

        warn!("No GLX swap control extension, swap interval stays at the driver default");
        bail!("swap interval control is not supported by the driver")
    }

    pub(super) fn get_proc_address(platform: &X11Platform, name: &CStr) -> *const c_void {
        unsafe {
            match (platform.glx.glXGetProcAddress)(name.as_ptr() as *const u8) {
                Some(f) => f as *const c_void,
                None => ptr::null(),
            }
        }
    }

    pub(super) fn destroy(&mut self, platform: &X11Platform) {
        if !self.context.is_null() {
            unsafe { (platform.glx.glXDestroyContext)(platform.display, self.context) };
            self.context = ptr::null_mut();
        }
    }
}
