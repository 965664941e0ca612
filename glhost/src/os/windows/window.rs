use crate::Error;
use crate::config::GlConfig;
use crate::os::window::{NativeWindow, WindowAttributes, WindowId};
use crate::os::windows::WindowsPlatform;
use crate::os::windows::wgl::{self, WglContext};
use anyhow::Context;
use log::debug;
use raw_window_handle::{
    HandleError, HasWindowHandle, RawWindowHandle, Win32WindowHandle, WindowHandle,
};
use std::ffi::{CStr, c_void};
use std::num::NonZeroIsize;
use std::sync::Arc;
use widestring::U16CString;
use windows::Win32::Foundation::{HWND, RECT};
use windows::Win32::Graphics::Gdi::{GetDC, HDC, ReleaseDC};
use windows::Win32::UI::WindowsAndMessaging::{
    AdjustWindowRectEx, CW_USEDEFAULT, CreateWindowExW, DestroyWindow, GWL_STYLE, GWLP_USERDATA,
    GetClientRect, GetWindowLongW, HMENU, SET_WINDOW_POS_FLAGS, SHOW_WINDOW_CMD, SW_HIDE,
    SW_MAXIMIZE, SW_MINIMIZE, SW_RESTORE, SW_SHOW, SWP_FRAMECHANGED, SWP_NOACTIVATE, SWP_NOMOVE,
    SWP_NOSIZE, SWP_NOZORDER, SetWindowLongPtrW, SetWindowLongW, SetWindowPos, SetWindowTextW,
    ShowWindow, WINDOW_EX_STYLE, WINDOW_STYLE, WS_OVERLAPPEDWINDOW, WS_POPUP,
};
use windows::core::PCWSTR;

pub(super) struct WindowsWindow {
    handle: HWND,
    hdc: HDC,
    context: WglContext,
    reference_block: Box<WindowReferenceBlock>,
}

/// Pointed to by `GWLP_USERDATA`, so the window procedure knows whose message it got.
pub(super) struct WindowReferenceBlock {
    pub id: WindowId,
    pub platform: Arc<WindowsPlatform>,
}

impl HasWindowHandle for WindowsWindow {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        unsafe {
            Ok(WindowHandle::borrow_raw(RawWindowHandle::Win32(
                Win32WindowHandle::new(NonZeroIsize::new_unchecked(self.handle.0 as _)),
            )))
        }
    }
}

/// Outer window rectangle whose client area is `width` x `height` at (`x`, `y`).
fn client_to_outer(
    style: WINDOW_STYLE,
    ex_style: WINDOW_EX_STYLE,
    (x, y): (i32, i32),
    (width, height): (u32, u32),
) -> RECT {
    let mut r = RECT {
        left: x,
        top: y,
        right: x + width as i32,
        bottom: y + height as i32,
    };

    unsafe {
        _ = AdjustWindowRectEx(&mut r, style, false, ex_style);
    }
    r
}

impl WindowsWindow {
    pub(super) fn new(
        platform: Arc<WindowsPlatform>,
        window_attributes: &WindowAttributes,
        config: GlConfig,
        id: WindowId,
    ) -> crate::Result<Self> {
        let title = U16CString::from_str(&window_attributes.title)
            .context("window title contains a NUL character")
            .map_err(Error::window_creation)?;

        let reference_block = Box::new(WindowReferenceBlock {
            id,
            platform: platform.clone(),
        });

        let ex_style = WINDOW_EX_STYLE::default();
        let style = WS_OVERLAPPEDWINDOW;

        let size = (window_attributes.width, window_attributes.height);
        let (x, y, width, height) = match window_attributes.position {
            Some(p) => {
                let r = client_to_outer(style, ex_style, (p.x, p.y), size);
                (r.left, r.top, r.right - r.left, r.bottom - r.top)
            }
            None => {
                let r = client_to_outer(style, ex_style, (0, 0), size);
                (CW_USEDEFAULT, CW_USEDEFAULT, r.right - r.left, r.bottom - r.top)
            }
        };

        let handle = unsafe {
            CreateWindowExW(
                ex_style,
                PCWSTR(platform.window_class.as_ptr()),
                PCWSTR(title.as_ptr()),
                style,
                x,
                y,
                width,
                height,
                HWND::default(),
                HMENU::default(),
                platform.hinstance,
                Some((&*reference_block as *const WindowReferenceBlock) as *const c_void),
            )
        }
        .context("CreateWindowExW failed")
        .map_err(Error::window_creation)?;

        let hdc = unsafe { GetDC(handle) };
        if hdc.is_invalid() {
            unsafe {
                _ = DestroyWindow(handle);
            }
            return Err(Error::WindowCreation(
                "window has no device context".to_string(),
            ));
        }

        let context = wgl::set_pixel_format(hdc).and_then(|_| WglContext::create(hdc, config.version));
        let context = match context {
            Ok(context) => context,
            Err(e) => {
                unsafe {
                    _ = ReleaseDC(handle, hdc);
                    _ = DestroyWindow(handle);
                }
                return Err(Error::context_creation(config.version, e));
            }
        };

        debug!("Created Win32 window {:?} for {}", handle.0, id);

        Ok(Self {
            handle,
            hdc,
            context,
            reference_block,
        })
    }

    fn style(&self) -> WINDOW_STYLE {
        WINDOW_STYLE(unsafe { GetWindowLongW(self.handle, GWL_STYLE) } as u32)
    }

    fn set_window_pos(&self, r: RECT, flags: SET_WINDOW_POS_FLAGS) -> anyhow::Result<()> {
        unsafe {
            SetWindowPos(
                self.handle,
                HWND::default(),
                r.left,
                r.top,
                r.right - r.left,
                r.bottom - r.top,
                flags | SWP_NOZORDER | SWP_NOACTIVATE,
            )
        }
        .context("SetWindowPos failed")
    }

    fn show_cmd(&self, cmd: SHOW_WINDOW_CMD) {
        // the return value is the previous visibility, not an error
        unsafe {
            _ = ShowWindow(self.handle, cmd);
        }
    }
}

impl NativeWindow for WindowsWindow {
    fn show(&self) -> anyhow::Result<()> {
        self.show_cmd(SW_SHOW);
        Ok(())
    }

    fn hide(&self) -> anyhow::Result<()> {
        self.show_cmd(SW_HIDE);
        Ok(())
    }

    fn set_title(&self, title: &str) -> anyhow::Result<()> {
        let title = U16CString::from_str(title)?;
        unsafe { SetWindowTextW(self.handle, PCWSTR(title.as_ptr())) }
            .context("SetWindowTextW failed")
    }

    fn set_size(&self, width: u32, height: u32) -> anyhow::Result<()> {
        let r = client_to_outer(self.style(), WINDOW_EX_STYLE::default(), (0, 0), (width, height));
        self.set_window_pos(r, SWP_NOMOVE)
    }

    fn set_position(&self, x: i32, y: i32) -> anyhow::Result<()> {
        let r = client_to_outer(self.style(), WINDOW_EX_STYLE::default(), (x, y), (1, 1));
        self.set_window_pos(r, SWP_NOSIZE)
    }

    fn set_decorated(&self, decorated: bool) -> anyhow::Result<()> {
        let style = if decorated {
            (self.style() & !WS_POPUP) | WS_OVERLAPPEDWINDOW
        } else {
            (self.style() & !WS_OVERLAPPEDWINDOW) | WS_POPUP
        };

        let mut client = RECT::default();
        unsafe {
            GetClientRect(self.handle, &mut client).context("GetClientRect failed")?;
            SetWindowLongW(self.handle, GWL_STYLE, style.0 as i32);
        }

        // keep the client area where it was, the frame changes around it
        let r = client_to_outer(
            style,
            WINDOW_EX_STYLE::default(),
            (0, 0),
            (
                (client.right - client.left) as u32,
                (client.bottom - client.top) as u32,
            ),
        );
        self.set_window_pos(r, SWP_NOMOVE | SWP_FRAMECHANGED)?;

        debug!("Win32 window {:?} decorated={}", self.handle.0, decorated);
        Ok(())
    }

    fn set_border_width(&self, width: u32) -> anyhow::Result<()> {
        debug!("Ignoring border width {} on Win32", width);
        Ok(())
    }

    fn set_minimized(&self, minimized: bool) -> anyhow::Result<()> {
        self.show_cmd(if minimized { SW_MINIMIZE } else { SW_RESTORE });
        Ok(())
    }

    fn set_maximized(&self, maximized: bool) -> anyhow::Result<()> {
        self.show_cmd(if maximized { SW_MAXIMIZE } else { SW_RESTORE });
        Ok(())
    }

    fn make_current(&self) -> anyhow::Result<()> {
        self.context.make_current(self.hdc)
    }

    fn make_not_current(&self) -> anyhow::Result<()> {
        WglContext::make_not_current()
    }

    fn swap_buffers(&self) -> anyhow::Result<()> {
        self.context.swap_buffers(self.hdc)
    }

    fn set_swap_interval(&self, interval: i32) -> anyhow::Result<()> {
        self.context.set_swap_interval(interval)
    }

    fn get_proc_address(&self, name: &CStr) -> *const c_void {
        self.context.get_proc_address(name)
    }
}

impl Drop for WindowsWindow {
    fn drop(&mut self) {
        unsafe {
            // messages sent while tearing down must not reach the reference block
            SetWindowLongPtrW(self.handle, GWLP_USERDATA, 0);
            self.context.destroy();
            _ = ReleaseDC(self.handle, self.hdc);
            _ = DestroyWindow(self.handle);
        }
        debug!("Destroyed Win32 window for {}", self.reference_block.id);
    }
}
