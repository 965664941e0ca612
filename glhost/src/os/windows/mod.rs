//! Win32 interop

#![cfg(windows)]

mod wgl;
mod window;

use crate::config::GlConfig;
use crate::event::KeyCode;
use crate::os::window::{NativeWindow, SizeState, WindowAttributes, WindowId};
use crate::os::windows::window::{WindowReferenceBlock, WindowsWindow};
use crate::os::{NativeEvent, NativeEventKind, Platform, PlatformKind};
use anyhow::{Context, bail};
use log::debug;
use raw_window_handle::{DisplayHandle, HandleError, HasDisplayHandle};
use std::cell::RefCell;
use std::sync::{Arc, Weak};
use widestring::U16CString;
use windows::Win32::Foundation::{HINSTANCE, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::Graphics::Gdi::ValidateRect;
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CREATESTRUCTW, CS_HREDRAW, CS_OWNDC, CS_VREDRAW, DefWindowProcW, DispatchMessageW,
    GWLP_USERDATA, GetMessageW, GetWindowLongPtrW, IDC_ARROW, LoadCursorW, MSG, PM_REMOVE,
    PeekMessageW, RegisterClassExW, SetWindowLongPtrW, TranslateMessage, UnregisterClassW,
    WM_CLOSE, WM_CREATE, WM_KEYDOWN, WM_KEYUP, WM_MOVE, WM_PAINT, WM_SIZE, WM_SYSKEYDOWN,
    WM_SYSKEYUP, WNDCLASSEXW,
};
use windows::core::PCWSTR;

const SIZE_RESTORED: usize = 0;
const SIZE_MINIMIZED: usize = 1;
const SIZE_MAXIMIZED: usize = 2;

pub(super) struct WindowsPlatform {
    hinstance: HINSTANCE,
    window_class: U16CString,
    /// Filled by the window procedure, drained by `pump_events`.
    pending: RefCell<Vec<NativeEvent>>,
    weak: Weak<Self>,
}

impl WindowsPlatform {
    pub(super) fn new() -> anyhow::Result<Arc<WindowsPlatform>> {
        let hinstance = HINSTANCE(unsafe { GetModuleHandleW(PCWSTR::null()) }?.0);

        let window_class = U16CString::from_str("glhost_window")?;

        let mut wc = WNDCLASSEXW::default();
        wc.cbSize = size_of::<WNDCLASSEXW>() as u32;
        wc.lpfnWndProc = Some(generic_window_proc);
        wc.lpszClassName = PCWSTR(window_class.as_ptr());
        // every GL window needs its own device context
        wc.style = CS_OWNDC | CS_HREDRAW | CS_VREDRAW;
        wc.hInstance = hinstance;
        wc.hCursor = unsafe { LoadCursorW(HINSTANCE::default(), IDC_ARROW) }.unwrap_or_default();

        if unsafe { RegisterClassExW(&wc) } == 0 {
            bail!(
                "RegisterClassExW failed: {}",
                windows::core::Error::from_win32()
            );
        }

        debug!("Registered window class {}", window_class.display());

        Ok(Arc::new_cyclic(|weak| Self {
            hinstance,
            window_class,
            pending: RefCell::new(Vec::new()),
            weak: weak.clone(),
        }))
    }

    fn push(&self, window: WindowId, kind: NativeEventKind) {
        self.pending.borrow_mut().push(NativeEvent::new(window, kind));
    }

    unsafe fn dispatch(&self, msg: &MSG) {
        unsafe {
            _ = TranslateMessage(msg);
            _ = DispatchMessageW(msg);
        }
    }
}

impl HasDisplayHandle for WindowsPlatform {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        Ok(DisplayHandle::windows())
    }
}

impl Platform for WindowsPlatform {
    fn name(&self) -> &'static str {
        super::names::WINDOWS
    }

    fn kind(&self) -> PlatformKind {
        PlatformKind::Windows
    }

    fn create_window(
        &self,
        window_attributes: &WindowAttributes,
        config: GlConfig,
        window_id: WindowId,
    ) -> crate::Result<Box<dyn NativeWindow>> {
        let platform = self.weak.upgrade().ok_or_else(|| {
            crate::Error::WindowCreation("Win32 platform is shutting down".to_string())
        })?;

        Ok(Box::new(WindowsWindow::new(
            platform,
            window_attributes,
            config,
            window_id,
        )?))
    }

    fn pump_events(&self, events: &mut Vec<NativeEvent>) -> anyhow::Result<()> {
        unsafe {
            let mut msg = MSG::default();

            // blocks until a message arrives
            let status = GetMessageW(&mut msg, HWND::default(), 0, 0);
            if status.0 == -1 {
                return Err(windows::core::Error::from_win32()).context("GetMessageW failed");
            }
            self.dispatch(&msg);

            while PeekMessageW(&mut msg, HWND::default(), 0, 0, PM_REMOVE).as_bool() {
                self.dispatch(&msg);
            }
        }

        events.append(&mut *self.pending.borrow_mut());
        Ok(())
    }
}

impl Drop for WindowsPlatform {
    fn drop(&mut self) {
        unsafe {
            _ = UnregisterClassW(PCWSTR(self.window_class.as_ptr()), self.hinstance);
        }
    }
}

#[inline]
fn loword(value: isize) -> i16 {
    (value & 0xffff) as u16 as i16
}

#[inline]
fn hiword(value: isize) -> i16 {
    ((value >> 16) & 0xffff) as u16 as i16
}

unsafe extern "system" fn generic_window_proc(
    hwnd: HWND,
    message: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    unsafe {
        if message == WM_CREATE {
            let cs = lparam.0 as *const CREATESTRUCTW;
            SetWindowLongPtrW(hwnd, GWLP_USERDATA, (*cs).lpCreateParams as isize);
            return LRESULT(0);
        }

        let reference_block = GetWindowLongPtrW(hwnd, GWLP_USERDATA) as *const WindowReferenceBlock;
        let Some(block) = reference_block.as_ref() else {
            return DefWindowProcW(hwnd, message, wparam, lparam);
        };

        let id = block.id;
        let platform = &block.platform;

        match message {
            WM_PAINT => {
                _ = ValidateRect(hwnd, None);
                platform.push(id, NativeEventKind::Expose);
                return LRESULT(0);
            }
            WM_KEYDOWN | WM_SYSKEYDOWN => {
                platform.push(id, NativeEventKind::KeyPress(KeyCode(wparam.0 as u32)));
            }
            WM_KEYUP | WM_SYSKEYUP => {
                platform.push(id, NativeEventKind::KeyRelease(KeyCode(wparam.0 as u32)));
            }
            WM_CLOSE => {
                // the host decides whether the window goes away
                platform.push(id, NativeEventKind::CloseRequest);
                return LRESULT(0);
            }
            WM_SIZE => {
                let state = match wparam.0 {
                    SIZE_MINIMIZED => Some(SizeState::Minimized),
                    SIZE_MAXIMIZED => Some(SizeState::Maximized),
                    SIZE_RESTORED => Some(SizeState::Normal),
                    _ => None,
                };
                if let Some(state) = state {
                    platform.push(id, NativeEventKind::SizeStateChanged(state));
                }
                if state != Some(SizeState::Minimized) {
                    platform.push(
                        id,
                        NativeEventKind::Resized {
                            width: loword(lparam.0) as u16 as u32,
                            height: hiword(lparam.0) as u16 as u32,
                        },
                    );
                }
            }
            WM_MOVE => {
                platform.push(
                    id,
                    NativeEventKind::Moved {
                        x: loword(lparam.0) as i32,
                        y: hiword(lparam.0) as i32,
                    },
                );
            }
            _ => (),
        }

        DefWindowProcW(hwnd, message, wparam, lparam)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lparam_words_are_signed() {
        let lparam = ((-20i16 as u16 as isize) << 16) | (-5i16 as u16 as isize);
        assert_eq!(loword(lparam), -5);
        assert_eq!(hiword(lparam), -20);
    }
}
