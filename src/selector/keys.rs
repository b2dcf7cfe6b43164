//! Keyboard chords forwarded to the editor.

use crate::protocol::{KeybindPayload, Outbound, RawKeyEvent};

/// Chords whose browser default would fight the editor (undo, delete,
/// bookmark).
pub const BLOCKED_CHORDS: [&str; 3] = ["Meta+z", "Meta+Backspace", "Meta+d"];

/// `event.key` values of the modifier keys themselves.
const MODIFIER_KEYS: [&str; 4] = ["Meta", "Control", "Alt", "Shift"];

/// `Meta+Ctrl+Alt+Shift+key`, skipping absent parts. Pressing only a
/// modifier yields the held modifiers.
pub fn composite_key(event: &RawKeyEvent) -> String {
    let mut parts: Vec<&str> = Vec::new();
    if event.meta_key {
        parts.push("Meta");
    }
    if event.ctrl_key {
        parts.push("Ctrl");
    }
    if event.alt_key {
        parts.push("Alt");
    }
    if event.shift_key {
        parts.push("Shift");
    }
    if !event.key.is_empty() && !MODIFIER_KEYS.contains(&event.key.as_str()) {
        parts.push(&event.key);
    }
    parts.join("+")
}

/// Result of one `keydown`.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyChord {
    pub message: Option<Outbound>,
    pub prevent_default: bool,
}

/// Reduce a `keydown` to its `KEYBIND` message.
pub fn chord(event: RawKeyEvent, timestamp: f64) -> KeyChord {
    let composite = composite_key(&event);
    let prevent_default = BLOCKED_CHORDS.contains(&composite.as_str());
    let message = (!composite.is_empty()).then(|| Outbound::Keybind {
        payload: KeybindPayload {
            composite_key: composite,
            raw_event: event,
            timestamp,
        },
    });
    KeyChord {
        message,
        prevent_default,
    }
}
