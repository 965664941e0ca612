use crate::Error;
use crate::config::GlConfig;
use crate::os::window::{NativeWindow, WindowAttributes, WindowId};
use crate::os::x11::X11Platform;
use crate::os::x11::glx::{self, GlxContext};
use anyhow::Context;
use log::debug;
use raw_window_handle::{
    HandleError, HasWindowHandle, RawWindowHandle, WindowHandle, XlibWindowHandle,
};
use std::ffi::{CStr, CString, c_long, c_uchar, c_ulong, c_void};
use std::mem;
use std::sync::Arc;
use x11_dl::xlib;
use x11_dl::xlib::{
    AllocNone, CWBorderPixel, CWColormap, CWEventMask, ExposureMask, FocusChangeMask,
    InputOutput, KeyPressMask, KeyReleaseMask, PPosition, PSize, PropModeReplace,
    PropertyChangeMask, StructureNotifyMask, SubstructureNotifyMask, SubstructureRedirectMask,
    USPosition, XSetWindowAttributes, XSizeHints,
};

const MWM_HINTS_DECORATIONS: c_ulong = 1 << 1;
const NET_WM_STATE_REMOVE: c_long = 0;
const NET_WM_STATE_ADD: c_long = 1;

pub(crate) struct X11Window {
    window: xlib::Window,
    colormap: xlib::Colormap,
    visual_id: u64,
    context: GlxContext,
    platform: Arc<X11Platform>,
}

impl HasWindowHandle for X11Window {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        unsafe {
            let mut wh = XlibWindowHandle::new(self.window);
            wh.visual_id = self.visual_id;

            Ok(WindowHandle::borrow_raw(RawWindowHandle::Xlib(wh)))
        }
    }
}

impl X11Window {
    pub(super) fn new(
        platform: Arc<X11Platform>,
        window_attributes: &WindowAttributes,
        config: GlConfig,
        id: WindowId,
    ) -> crate::Result<Self> {
        let title = CString::new(window_attributes.title.as_str())
            .context("window title contains a NUL byte")
            .map_err(Error::window_creation)?;

        let chosen = glx::choose_visual(&platform)
            .map_err(|e| Error::context_creation(config.version, e))?;

        unsafe {
            let colormap = (platform.xlib.XCreateColormap)(
                platform.display,
                platform.root_window,
                chosen.visual,
                AllocNone,
            );

            let mut swa: XSetWindowAttributes = mem::zeroed();
            swa.colormap = colormap;
            swa.border_pixel = 0;
            swa.event_mask = KeyPressMask
                | KeyReleaseMask
                | ExposureMask
                | StructureNotifyMask
                | FocusChangeMask
                | PropertyChangeMask;

            let (x, y) = window_attributes.position.map_or((0, 0), |p| (p.x, p.y));

            let (window, x_error) = platform.with_error_trap(|| {
                (platform.xlib.XCreateWindow)(
                    platform.display,
                    platform.root_window,
                    x,
                    y,
                    window_attributes.width,
                    window_attributes.height,
                    window_attributes.border_width,
                    chosen.depth,
                    InputOutput as u32,
                    chosen.visual,
                    CWColormap | CWBorderPixel | CWEventMask,
                    &mut swa,
                )
            });

            if window == 0 || x_error {
                (platform.xlib.XFreeColormap)(platform.display, colormap);
                return Err(Error::WindowCreation(format!(
                    "XCreateWindow failed for a {}x{} window",
                    window_attributes.width, window_attributes.height
                )));
            }

            let mut size_hints: XSizeHints = mem::zeroed();
            size_hints.flags = PSize;
            size_hints.width = window_attributes.width as i32;
            size_hints.height = window_attributes.height as i32;
            if window_attributes.position.is_some() {
                size_hints.flags |= PPosition | USPosition;
                size_hints.x = x;
                size_hints.y = y;
            }
            (platform.xlib.XSetWMNormalHints)(platform.display, window, &mut size_hints);

            let mut protocols = [platform.atoms.wm_delete_window];
            (platform.xlib.XSetWMProtocols)(platform.display, window, protocols.as_mut_ptr(), 1);

            let context = match GlxContext::create(&platform, chosen.fb_config, config.version) {
                Ok(context) => context,
                Err(e) => {
                    (platform.xlib.XDestroyWindow)(platform.display, window);
                    (platform.xlib.XFreeColormap)(platform.display, colormap);
                    return Err(Error::context_creation(config.version, e));
                }
            };

            platform.notify_window_created(window, id);

            let x11_window = Self {
                window,
                colormap,
                visual_id: chosen.visual_id,
                context,
                platform,
            };
            x11_window.store_title(&title);
            (x11_window.platform.xlib.XFlush)(x11_window.platform.display);

            debug!("Created X11 window {:#x} for {}", window, id);
            Ok(x11_window)
        }
    }

    fn store_title(&self, title: &CStr) {
        let p = &self.platform;
        unsafe {
            (p.xlib.XStoreName)(p.display, self.window, title.as_ptr());
            let bytes = title.to_bytes();
            (p.xlib.XChangeProperty)(
                p.display,
                self.window,
                p.atoms.net_wm_name,
                p.atoms.utf8_string,
                8,
                PropModeReplace,
                bytes.as_ptr(),
                bytes.len() as i32,
            );
        }
    }

    /// Ask the window manager to add or remove `_NET_WM_STATE` flags.
    fn send_wm_state(&self, add: bool, first: xlib::Atom, second: xlib::Atom) {
        let p = &self.platform;
        unsafe {
            let mut event: xlib::XEvent = mem::zeroed();
            event.client_message.type_ = xlib::ClientMessage;
            event.client_message.window = self.window;
            event.client_message.message_type = p.atoms.net_wm_state;
            event.client_message.format = 32;
            event.client_message.data.set_long(
                0,
                if add { NET_WM_STATE_ADD } else { NET_WM_STATE_REMOVE },
            );
            event.client_message.data.set_long(1, first as c_long);
            event.client_message.data.set_long(2, second as c_long);
            event.client_message.data.set_long(3, 1);

            (p.xlib.XSendEvent)(
                p.display,
                p.root_window,
                xlib::False,
                SubstructureRedirectMask | SubstructureNotifyMask,
                &mut event,
            );
        }
    }

    fn flush(&self) {
        unsafe {
            (self.platform.xlib.XFlush)(self.platform.display);
        }
    }
}

impl NativeWindow for X11Window {
    fn show(&self) -> anyhow::Result<()> {
        unsafe {
            (self.platform.xlib.XMapWindow)(self.platform.display, self.window);
        }
        self.flush();
        Ok(())
    }

    fn hide(&self) -> anyhow::Result<()> {
        unsafe {
            (self.platform.xlib.XUnmapWindow)(self.platform.display, self.window);
        }
        self.flush();
        Ok(())
    }

    fn set_title(&self, title: &str) -> anyhow::Result<()> {
        let title = CString::new(title).context("window title contains a NUL byte")?;
        self.store_title(&title);
        self.flush();
        Ok(())
    }

    fn set_size(&self, width: u32, height: u32) -> anyhow::Result<()> {
        unsafe {
            (self.platform.xlib.XResizeWindow)(self.platform.display, self.window, width, height);
        }
        self.flush();
        Ok(())
    }

    fn set_position(&self, x: i32, y: i32) -> anyhow::Result<()> {
        unsafe {
            (self.platform.xlib.XMoveWindow)(self.platform.display, self.window, x, y);
        }
        self.flush();
        Ok(())
    }

    fn set_decorated(&self, decorated: bool) -> anyhow::Result<()> {
        // flags, functions, decorations, input mode, status
        let hints: [c_ulong; 5] = [MWM_HINTS_DECORATIONS, 0, decorated as c_ulong, 0, 0];
        let p = &self.platform;
        unsafe {
            (p.xlib.XChangeProperty)(
                p.display,
                self.window,
                p.atoms.motif_wm_hints,
                p.atoms.motif_wm_hints,
                32,
                PropModeReplace,
                hints.as_ptr() as *const c_uchar,
                hints.len() as i32,
            );
        }
        self.flush();
        debug!("X11 window {:#x} decorated={}", self.window, decorated);
        Ok(())
    }

    fn set_border_width(&self, width: u32) -> anyhow::Result<()> {
        unsafe {
            (self.platform.xlib.XSetWindowBorderWidth)(self.platform.display, self.window, width);
        }
        self.flush();
        Ok(())
    }

    fn set_minimized(&self, minimized: bool) -> anyhow::Result<()> {
        let p = &self.platform;
        unsafe {
            if minimized {
                if (p.xlib.XIconifyWindow)(p.display, self.window, p.default_screen) == 0 {
                    anyhow::bail!("XIconifyWindow was refused");
                }
            } else {
                (p.xlib.XMapWindow)(p.display, self.window);
            }
        }
        self.flush();
        Ok(())
    }

    fn set_maximized(&self, maximized: bool) -> anyhow::Result<()> {
        self.send_wm_state(
            maximized,
            self.platform.atoms.net_wm_state_maximized_vert,
            self.platform.atoms.net_wm_state_maximized_horz,
        );
        self.flush();
        Ok(())
    }

    fn make_current(&self) -> anyhow::Result<()> {
        self.context.make_current(&self.platform, self.window)
    }

    fn make_not_current(&self) -> anyhow::Result<()> {
        GlxContext::make_not_current(&self.platform)
    }

    fn swap_buffers(&self) -> anyhow::Result<()> {
        self.context.swap_buffers(&self.platform, self.window);
        Ok(())
    }

    fn set_swap_interval(&self, interval: i32) -> anyhow::Result<()> {
        self.context
            .set_swap_interval(&self.platform, self.window, interval)
    }

    fn get_proc_address(&self, name: &CStr) -> *const c_void {
        GlxContext::get_proc_address(&self.platform, name)
    }
}

impl Drop for X11Window {
    fn drop(&mut self) {
        let platform = self.platform.clone();
        self.context.destroy(&platform);
        platform.notify_window_destroy(self.window);
        unsafe {
            (platform.xlib.XDestroyWindow)(platform.display, self.window);
            (platform.xlib.XFreeColormap)(platform.display, self.colormap);
            (platform.xlib.XFlush)(platform.display);
        }
    }
}
