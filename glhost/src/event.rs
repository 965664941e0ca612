//! Abstract events and the translation from native messages.

use crate::os::NativeEventKind;
use hashbrown::HashSet;

/// Everything a handler can be told about its window.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// The window needs to be redrawn. Presenting is up to the handler.
    RedrawRequested,
    KeyDown(KeyCode),
    KeyUp(KeyCode),
    /// The user or the OS asked for the window to close. Nothing happens unless the handler acts on it.
    CloseRequested,
}

/// Platform-normalized virtual key.
///
/// Letters are their uppercase ASCII value, digits and space their ASCII value. Named keys use the
/// associated constants, which are the same on every backend. Punctuation uses the Win32 `VK_OEM_*`
/// values. Other keys without a shared name carry the backend's raw code, which on X11 is the
/// keysym offset by `0x0100_0000` so it never collides with a named key.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[repr(transparent)]
pub struct KeyCode(pub u32);

#[allow(missing_docs)]
impl KeyCode {
    pub const BACKSPACE: KeyCode = KeyCode(0x08);
    pub const TAB: KeyCode = KeyCode(0x09);
    pub const ENTER: KeyCode = KeyCode(0x0D);
    pub const SHIFT: KeyCode = KeyCode(0x10);
    pub const CONTROL: KeyCode = KeyCode(0x11);
    pub const ESCAPE: KeyCode = KeyCode(0x1B);
    pub const SPACE: KeyCode = KeyCode(0x20);
    pub const LEFT: KeyCode = KeyCode(0x25);
    pub const UP: KeyCode = KeyCode(0x26);
    pub const RIGHT: KeyCode = KeyCode(0x27);
    pub const DOWN: KeyCode = KeyCode(0x28);
    pub const F1: KeyCode = KeyCode(0x70);
    pub const F12: KeyCode = KeyCode(0x7B);

    /// Key for a letter or digit, case-insensitive.
    pub fn from_char(c: char) -> Option<KeyCode> {
        match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | ' ' => {
                Some(KeyCode(c.to_ascii_uppercase() as u32))
            }
            _ => None,
        }
    }

    /// The character this key types, if it is a letter, digit or space.
    pub fn to_char(self) -> Option<char> {
        char::from_u32(self.0).filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || *c == ' ')
    }
}

/// Held keys and the most recent press / release of one window.
///
/// The dispatcher updates this while translating and the polling accessors on
/// [`Host`](crate::Host) read it, so both paths always agree.
#[derive(Debug, Default)]
pub struct KeyState {
    held: HashSet<KeyCode>,
    latest_down: Option<KeyCode>,
    latest_up: Option<KeyCode>,
}

impl KeyState {
    /// Returns the `KeyDown` to deliver, or `None` for an auto-repeat of a held key.
    pub(crate) fn press(&mut self, key: KeyCode) -> Option<Event> {
        if self.held.insert(key) {
            self.latest_down = Some(key);
            Some(Event::KeyDown(key))
        } else {
            None
        }
    }

    /// Releases always produce a `KeyUp`, even for keys pressed before the window had focus.
    pub(crate) fn release(&mut self, key: KeyCode) -> Event {
        self.held.remove(&key);
        self.latest_up = Some(key);
        Event::KeyUp(key)
    }

    pub fn latest_down(&self) -> Option<KeyCode> {
        self.latest_down
    }

    pub fn latest_up(&self) -> Option<KeyCode> {
        self.latest_up
    }

    pub fn is_held(&self, key: KeyCode) -> bool {
        self.held.contains(&key)
    }
}

/// Per-batch translation state. A fresh translator is used for every drained batch.
#[derive(Debug, Default)]
pub(crate) struct Translator {
    redraw_queued: bool,
}

impl Translator {
    pub(crate) fn translate(&mut self, kind: &NativeEventKind, keys: &mut KeyState) -> Option<Event> {
        match *kind {
            NativeEventKind::Expose => {
                if std::mem::replace(&mut self.redraw_queued, true) {
                    None
                } else {
                    Some(Event::RedrawRequested)
                }
            }
            NativeEventKind::KeyPress(key) => keys.press(key),
            NativeEventKind::KeyRelease(key) => Some(keys.release(key)),
            NativeEventKind::CloseRequest => Some(Event::CloseRequested),
            NativeEventKind::Resized { .. }
            | NativeEventKind::Moved { .. }
            | NativeEventKind::SizeStateChanged(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::os::window::SizeState;

    fn translate_all(kinds: &[NativeEventKind], keys: &mut KeyState) -> Vec<Event> {
        let mut translator = Translator::default();
        kinds
            .iter()
            .filter_map(|k| translator.translate(k, keys))
            .collect()
    }

    #[test]
    fn test_repeat_burst_yields_single_key_down() {
        let k = KeyCode::from_char('k').unwrap();
        let mut keys = KeyState::default();
        let events = translate_all(
            &[
                NativeEventKind::KeyPress(k),
                NativeEventKind::KeyPress(k),
                NativeEventKind::KeyPress(k),
                NativeEventKind::KeyPress(k),
                NativeEventKind::KeyRelease(k),
            ],
            &mut keys,
        );
        assert_eq!(events, vec![Event::KeyDown(k), Event::KeyUp(k)]);
        assert!(!keys.is_held(k));
    }

    #[test]
    fn test_key_can_be_pressed_again_after_release() {
        let mut keys = KeyState::default();
        assert_eq!(keys.press(KeyCode::SPACE), Some(Event::KeyDown(KeyCode::SPACE)));
        assert_eq!(keys.release(KeyCode::SPACE), Event::KeyUp(KeyCode::SPACE));
        assert_eq!(keys.press(KeyCode::SPACE), Some(Event::KeyDown(KeyCode::SPACE)));
    }

    #[test]
    fn test_unmatched_release_still_reports_key_up() {
        let mut keys = KeyState::default();
        assert_eq!(keys.release(KeyCode::ESCAPE), Event::KeyUp(KeyCode::ESCAPE));
        assert_eq!(keys.latest_up(), Some(KeyCode::ESCAPE));
        assert_eq!(keys.latest_down(), None);
    }

    #[test]
    fn test_latest_keys_track_most_recent() {
        let a = KeyCode::from_char('a').unwrap();
        let b = KeyCode::from_char('b').unwrap();
        let mut keys = KeyState::default();
        assert_eq!(keys.latest_down(), None);

        keys.press(a);
        keys.press(b);
        keys.release(a);

        assert_eq!(keys.latest_down(), Some(b));
        assert_eq!(keys.latest_up(), Some(a));
        assert!(keys.is_held(b));
    }

    #[test]
    fn test_expose_burst_coalesces_within_batch() {
        let mut keys = KeyState::default();
        let events = translate_all(
            &[
                NativeEventKind::Expose,
                NativeEventKind::KeyPress(KeyCode::UP),
                NativeEventKind::Expose,
                NativeEventKind::Expose,
            ],
            &mut keys,
        );
        assert_eq!(events, vec![Event::RedrawRequested, Event::KeyDown(KeyCode::UP)]);
    }

    #[test]
    fn test_geometry_messages_produce_no_events() {
        let mut keys = KeyState::default();
        let events = translate_all(
            &[
                NativeEventKind::Resized { width: 10, height: 20 },
                NativeEventKind::Moved { x: 1, y: 2 },
                NativeEventKind::SizeStateChanged(SizeState::Maximized),
            ],
            &mut keys,
        );
        assert!(events.is_empty());
    }

    #[test]
    fn test_every_close_signal_is_reported() {
        let mut keys = KeyState::default();
        let events = translate_all(
            &[NativeEventKind::CloseRequest, NativeEventKind::CloseRequest],
            &mut keys,
        );
        assert_eq!(events, vec![Event::CloseRequested, Event::CloseRequested]);
    }

    #[test]
    fn test_key_code_chars() {
        assert_eq!(KeyCode::from_char('q'), Some(KeyCode(b'Q' as u32)));
        assert_eq!(KeyCode::from_char('7').and_then(KeyCode::to_char), Some('7'));
        assert_eq!(KeyCode::ESCAPE.to_char(), None);
        assert_eq!(KeyCode::from_char('#'), None);
    }
}
