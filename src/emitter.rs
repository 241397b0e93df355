/* Copyright (C) 2026 by the hidgadget-core contributors
 *
 * This file is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This file is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this file.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Stateful facade: the sole writer to endpoints, owner of latched
//! modifier/button state and the active locale. Grounded on
//! `send_key_sequence`/`hold_key`/`release_key`/`send_mouse_*` in
//! `hid-gadget.c`.

use crate::endpoint::{EndpointId, EndpointRegistry};
use crate::error::{HidError, Result};
use crate::keymap::{self, Locale};
use crate::led::LedReader;
use crate::report::{self, PointerReportSize};
use std::path::Path;
use std::sync::Mutex;
use std::thread::sleep;
use std::time::Duration;

pub const LCTRL: u8 = 0x01;
pub const LSHIFT: u8 = 0x02;
pub const LALT: u8 = 0x04;
pub const LGUI: u8 = 0x08;
pub const RCTRL: u8 = 0x10;
pub const RSHIFT: u8 = 0x20;
pub const RALT: u8 = 0x40;
pub const RGUI: u8 = 0x80;

pub const BTN_LEFT: u8 = 0x01;
pub const BTN_RIGHT: u8 = 0x02;
pub const BTN_MIDDLE: u8 = 0x04;

const CONSUMER_TAP_MS: u64 = 50;
const POINTER_CLICK_MS: u64 = 30;
const POINTER_SCROLL_MS: u64 = 10;
const DEFAULT_KEY_DELAY_MS: u64 = 10;
const MAX_KEY_DELAY_MS: u64 = 5000;

/// Resolves `KEY_DELAY_MS` (and the legacy `HID_KEY_DELAY_MS`), clamped to
/// `[0, 5000]`.
pub fn key_delay_from_env() -> u64 {
    let raw = std::env::var("KEY_DELAY_MS")
        .or_else(|_| std::env::var("HID_KEY_DELAY_MS"))
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(DEFAULT_KEY_DELAY_MS);
    raw.min(MAX_KEY_DELAY_MS)
}

/// Resolves `POINTER_REPORT_SIZE`/`HID_MOUSE_REPORT_SIZE` and
/// `POINTER_HSCROLL`/`HID_MOUSE_HSCROLL`.
pub fn pointer_config_from_env() -> (PointerReportSize, bool) {
    let hscroll = std::env::var("POINTER_HSCROLL")
        .or_else(|_| std::env::var("HID_MOUSE_HSCROLL"))
        .map(|v| truthy(&v))
        .unwrap_or(false);

    let size_env = std::env::var("POINTER_REPORT_SIZE")
        .or_else(|_| std::env::var("HID_MOUSE_REPORT_SIZE"))
        .ok()
        .and_then(|s| s.parse::<u32>().ok());

    let size = match size_env {
        Some(5) => PointerReportSize::Five,
        Some(4) => PointerReportSize::Four,
        _ if hscroll => PointerReportSize::Five,
        _ => PointerReportSize::Four,
    };
    (size, hscroll)
}

fn truthy(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

struct Latched {
    mods: u8,
    slots: [u8; 6],
    buttons: u8,
}

pub struct Emitter {
    registry: EndpointRegistry,
    led: LedReader,
    locale: Mutex<Locale>,
    latched: Mutex<Latched>,
    key_delay_ms: u64,
    pointer_size: PointerReportSize,
    hscroll_enabled: bool,
}

impl Emitter {
    pub fn new(registry: EndpointRegistry) -> Self {
        let (pointer_size, hscroll_enabled) = pointer_config_from_env();
        Emitter {
            registry,
            led: LedReader::new(),
            locale: Mutex::new(Locale::Us),
            latched: Mutex::new(Latched { mods: 0, slots: [0; 6], buttons: 0 }),
            key_delay_ms: key_delay_from_env(),
            pointer_size,
            hscroll_enabled,
        }
    }

    // ----- raw writes -----

    pub fn send_raw_keyboard(&self, modifiers: u8, slots: [u8; 6]) -> Result<()> {
        let report = report::build_keyboard(modifiers, slots);
        self.registry.write(EndpointId::Keyboard, &report)
    }

    /// Uses the configured pointer report size; a non-zero `hwheel` on a
    /// 4-byte report surfaces the codec's `UnsupportedFeature` rather than
    /// silently widening the report (callers that want horizontal wheel
    /// support configure `POINTER_REPORT_SIZE`/`POINTER_HSCROLL`, or go
    /// through `pointer_scroll`, which enforces that at the emitter level).
    pub fn send_raw_pointer(&self, buttons: u8, dx: i32, dy: i32, vwheel: i32, hwheel: i32) -> Result<()> {
        let report = report::build_pointer(buttons, dx, dy, vwheel, hwheel, self.pointer_size)?;
        self.registry.write(EndpointId::Pointer, &report)
    }

    pub fn send_consumer_tap(&self, name: &str) -> Result<()> {
        let usage = keymap::consumer_key_usage(name)
            .ok_or_else(|| HidError::UnknownConsumerKey(name.to_string()))?;
        self.registry.write(EndpointId::Consumer, &report::build_consumer(usage))?;
        sleep(Duration::from_millis(CONSUMER_TAP_MS));
        self.registry.write(EndpointId::Consumer, &report::build_consumer(0))
    }

    // ----- locale -----

    pub fn set_locale(&self, name: &str) {
        let mut locale = self.locale.lock().unwrap();
        *locale = Locale::parse(name);
    }

    fn locale(&self) -> Locale {
        *self.locale.lock().unwrap()
    }

    // ----- typed sequences -----

    /// `modifiers` is a dash-joined string of `CTRL`/`SHIFT`/`ALT`/`GUI`
    /// (already normalized by the caller); `sequence` may be a named key
    /// (checked first, case-insensitively) or a run of characters.
    pub fn type_sequence(&self, modifiers: Option<&str>, sequence: Option<&str>, hold: bool, release_only: bool) -> Result<()> {
        self.type_sequence_with_delay(modifiers, sequence, hold, release_only, None)
    }

    /// As `type_sequence`, but overrides the per-character delay (used by
    /// `STRINGLN`'s configurable char delay/fuzz) instead of the configured
    /// `KEY_DELAY_MS`.
    pub fn type_sequence_with_delay(
        &self,
        modifiers: Option<&str>,
        sequence: Option<&str>,
        hold: bool,
        release_only: bool,
        delay_override: Option<u64>,
    ) -> Result<()> {
        let explicit = modifiers.map(parse_modifier_string).unwrap_or(0);
        let delay_ms = delay_override.unwrap_or(self.key_delay_ms);

        if release_only {
            return self.send_raw_keyboard(0, [0; 6]);
        }

        let sequence = match sequence {
            Some(s) if !s.is_empty() => s,
            _ => {
                if explicit != 0 {
                    return self.send_raw_keyboard(explicit, [0; 6]);
                }
                return Ok(());
            }
        };

        if let Some(usage) = keymap::fn_key_usage(sequence) {
            self.send_raw_keyboard(explicit, [usage, 0, 0, 0, 0, 0])?;
            if !hold {
                self.send_raw_keyboard(explicit, [0; 6])?;
            }
            return Ok(());
        }

        self.type_chars(sequence, explicit, hold, delay_ms)
    }

    /// Types `text` one character at a time, unconditionally — never checks
    /// whether the whole string spells a named key first. `STRING`/
    /// `STRINGLN` go through this rather than `type_sequence`: the original
    /// (`original_source/src/ducky.c`'s `STRING` handling, which calls
    /// `send_key_sequence(NULL, single_char)` per character) always types
    /// literal text, so `STRING UP` or `STRING ENTER` types the letters, not
    /// a single named-key press. The CLI/bare-word path still wants the
    /// named-key-first behavior, so it keeps going through `type_sequence`.
    pub fn type_literal(&self, text: &str, delay_override: Option<u64>) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        let delay_ms = delay_override.unwrap_or(self.key_delay_ms);
        self.type_chars(text, 0, false, delay_ms)
    }

    fn type_chars(&self, sequence: &str, explicit: u8, hold: bool, delay_ms: u64) -> Result<()> {
        let locale = self.locale();
        for c in sequence.chars() {
            let usage = keymap::usage_for(locale, c);
            if usage == 0 {
                if (c as u32) < 128 {
                    warn!("no usage mapping for character {:?}, skipping", c);
                }
                continue;
            }
            let shift = if keymap::requires_shift(locale, c) { LSHIFT } else { 0 };
            let modifiers = explicit | shift;
            self.send_raw_keyboard(modifiers, [usage, 0, 0, 0, 0, 0])?;
            sleep(Duration::from_millis(delay_ms));
            if !hold {
                self.send_raw_keyboard(explicit, [0; 6])?;
            }
        }

        // The loop above already leaves the last written report at
        // `(explicit, 0, …)` once each character's own release fires. Only
        // an explicit modifier set needs one more write to fully clear it.
        if !hold && explicit != 0 {
            self.send_raw_keyboard(0, [0; 6])?;
        }
        Ok(())
    }

    // ----- latched keyboard state -----

    pub fn hold(&self, name: &str) -> Result<()> {
        let mut latched = self.latched.lock().unwrap();
        if let Some(bit) = modifier_bit(name) {
            latched.mods |= bit;
        } else {
            let usage = self.resolve_usage(name)?;
            if !latched.slots.contains(&usage) {
                if let Some(empty) = latched.slots.iter().position(|&s| s == 0) {
                    latched.slots[empty] = usage;
                } else {
                    debug!("all 6 keyboard slots full, dropping hold of {:?}", name);
                }
            }
        }
        let (mods, slots) = (latched.mods, latched.slots);
        drop(latched);
        self.send_raw_keyboard(mods, slots)
    }

    pub fn release(&self, name: &str) -> Result<()> {
        let mut latched = self.latched.lock().unwrap();
        if let Some(bit) = modifier_bit(name) {
            latched.mods &= !bit;
        } else {
            let usage = self.resolve_usage(name)?;
            for slot in latched.slots.iter_mut() {
                if *slot == usage {
                    *slot = 0;
                }
            }
        }
        let (mods, slots) = (latched.mods, latched.slots);
        drop(latched);
        self.send_raw_keyboard(mods, slots)
    }

    pub fn release_all(&self) -> Result<()> {
        {
            let mut latched = self.latched.lock().unwrap();
            latched.mods = 0;
            latched.slots = [0; 6];
            latched.buttons = 0;
        }
        self.send_raw_keyboard(0, [0; 6])
    }

    fn resolve_usage(&self, name: &str) -> Result<u8> {
        if let Some(u) = keymap::fn_key_usage(name) {
            return Ok(u);
        }
        let mut chars = name.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            let usage = keymap::usage_for(self.locale(), c);
            if usage != 0 {
                return Ok(usage);
            }
        }
        Err(HidError::UnknownKey(name.to_string()))
    }

    // ----- pointer -----

    pub fn pointer_move(&self, dx: i32, dy: i32) -> Result<()> {
        let buttons = self.latched.lock().unwrap().buttons;
        self.send_raw_pointer(buttons, dx, dy, 0, 0)
    }

    pub fn pointer_click(&self, button: u8) -> Result<()> {
        self.send_raw_pointer(button, 0, 0, 0, 0)?;
        sleep(Duration::from_millis(POINTER_CLICK_MS));
        let resting = self.latched.lock().unwrap().buttons;
        self.send_raw_pointer(resting, 0, 0, 0, 0)
    }

    pub fn pointer_press(&self, button: u8) -> Result<()> {
        let buttons = {
            let mut latched = self.latched.lock().unwrap();
            latched.buttons |= button;
            latched.buttons
        };
        self.send_raw_pointer(buttons, 0, 0, 0, 0)
    }

    pub fn pointer_release(&self) -> Result<()> {
        self.latched.lock().unwrap().buttons = 0;
        self.send_raw_pointer(0, 0, 0, 0, 0)
    }

    pub fn pointer_scroll(&self, v: i32, h: i32) -> Result<()> {
        let h = if h != 0 && !self.hscroll_enabled {
            warn!("horizontal scroll requested but not enabled, ignoring");
            0
        } else {
            h
        };
        let buttons = self.latched.lock().unwrap().buttons;
        self.send_raw_pointer(buttons, 0, 0, v, h)?;
        sleep(Duration::from_millis(POINTER_SCROLL_MS));
        self.send_raw_pointer(buttons, 0, 0, 0, 0)
    }

    // ----- LED -----

    pub fn led_state(&self) -> u8 {
        match self.registry.path(EndpointId::Keyboard) {
            Some(path) => self.led.read(path),
            None => 0,
        }
    }

    pub fn keyboard_path(&self) -> Option<&Path> {
        self.registry.path(EndpointId::Keyboard)
    }

    /// Every report written to `id` so far, in write order. Only meaningful
    /// on an `Emitter` built over `EndpointRegistry::with_memory_sinks`; lets
    /// tests outside this module (e.g. the interpreter's) assert on the
    /// exact report sequence a statement produced.
    #[cfg(test)]
    pub fn captured(&self, id: EndpointId) -> Vec<Vec<u8>> {
        self.registry.captured(id)
    }
}

/// Recognizes the same modifier-token spellings as the original
/// `parse_modifiers`, including its right-hand variants.
fn modifier_bit(name: &str) -> Option<u8> {
    match name.to_ascii_uppercase().as_str() {
        "CTRL" | "CONTROL" => Some(LCTRL),
        "SHIFT" => Some(LSHIFT),
        "ALT" => Some(LALT),
        "GUI" | "WIN" | "META" => Some(LGUI),
        "RCTRL" | "RCONTROL" => Some(RCTRL),
        "RSHIFT" => Some(RSHIFT),
        "RALT" => Some(RALT),
        "RGUI" | "RWIN" | "RMETA" => Some(RGUI),
        _ => None,
    }
}

fn parse_modifier_string(s: &str) -> u8 {
    s.split('-').filter_map(modifier_bit).fold(0, |acc, bit| acc | bit)
}

/// True if every character of `s` is drawn from the modifier-name alphabet
/// (letters and `-`). Mirrors the original CLI's "only_mods" character-class
/// heuristic for deciding whether a lone dashed token is a modifier set or
/// the start of a literal sequence.
fn looks_like_modifier_token(s: &str) -> bool {
    s.contains('-') && s.chars().all(|c| c.is_ascii_alphabetic() || c == '-')
}

/// Decides whether a single leading CLI token should be consumed as an
/// explicit modifier set rather than the start of the typed sequence: either
/// it actually resolves to at least one modifier bit, or it's made up
/// entirely of modifier-name characters (so a typo like `CTRLL-ALT` is still
/// treated as an attempted modifier set, not typed literally). Ported from
/// `process_keyboard`'s `temp_mods != 0 || only_mods` check.
pub fn token_is_explicit_modifiers(s: &str) -> bool {
    s.contains('-') && (parse_modifier_string(s) != 0 || looks_like_modifier_token(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::EndpointRegistry;
    use std::path::Path;

    fn mock_emitter() -> Emitter {
        let registry = EndpointRegistry::discover_in(Path::new("/nonexistent-dir-for-tests"));
        Emitter::new(registry)
    }

    #[test]
    fn modifier_string_combines_bits() {
        assert_eq!(parse_modifier_string("CTRL-SHIFT"), LCTRL | LSHIFT);
        assert_eq!(parse_modifier_string("gui"), LGUI);
        assert_eq!(parse_modifier_string(""), 0);
    }

    #[test]
    fn hold_is_idempotent_for_modifiers() {
        let emitter = mock_emitter();
        emitter.hold("CTRL").unwrap();
        emitter.hold("CTRL").unwrap();
        assert_eq!(emitter.latched.lock().unwrap().mods, LCTRL);
    }

    #[test]
    fn hold_is_idempotent_for_named_keys() {
        let emitter = mock_emitter();
        emitter.hold("a").unwrap();
        emitter.hold("a").unwrap();
        let slots = emitter.latched.lock().unwrap().slots;
        assert_eq!(slots.iter().filter(|&&s| s == 4).count(), 1);
    }

    #[test]
    fn release_all_clears_everything() {
        let emitter = mock_emitter();
        emitter.hold("CTRL").unwrap();
        emitter.hold("a").unwrap();
        emitter.pointer_press(BTN_LEFT).unwrap();
        emitter.release_all().unwrap();
        let latched = emitter.latched.lock().unwrap();
        assert_eq!(latched.mods, 0);
        assert_eq!(latched.slots, [0; 6]);
        assert_eq!(latched.buttons, 0);
    }

    #[test]
    fn unknown_key_is_surfaced() {
        let emitter = mock_emitter();
        assert!(matches!(emitter.hold("not-a-key-name"), Err(HidError::UnknownKey(_))));
    }

    fn capturing_emitter() -> Emitter {
        std::env::remove_var("POINTER_REPORT_SIZE");
        std::env::remove_var("HID_MOUSE_REPORT_SIZE");
        std::env::remove_var("POINTER_HSCROLL");
        std::env::remove_var("HID_MOUSE_HSCROLL");
        std::env::remove_var("KEY_DELAY_MS");
        std::env::remove_var("HID_KEY_DELAY_MS");
        Emitter::new(EndpointRegistry::with_memory_sinks())
    }

    /// Scenario 1: `type_sequence(0, "aB!")` under US locale.
    #[test]
    fn type_sequence_matches_scenario_one() {
        let emitter = capturing_emitter();
        emitter.type_sequence(None, Some("aB!"), false, false).unwrap();
        let writes = emitter.registry.captured(EndpointId::Keyboard);
        let expected: Vec<[u8; 8]> = vec![
            [0, 0, 4, 0, 0, 0, 0, 0],
            [0, 0, 0, 0, 0, 0, 0, 0],
            [2, 0, 5, 0, 0, 0, 0, 0],
            [0, 0, 0, 0, 0, 0, 0, 0],
            [2, 0, 30, 0, 0, 0, 0, 0],
            [0, 0, 0, 0, 0, 0, 0, 0],
        ];
        assert_eq!(writes.len(), expected.len());
        for (got, want) in writes.iter().zip(expected.iter()) {
            assert_eq!(got.as_slice(), want.as_slice());
        }
    }

    #[test]
    fn type_sequence_treats_named_key_word_as_single_press() {
        let emitter = capturing_emitter();
        emitter.type_sequence(None, Some("UP"), false, false).unwrap();
        let writes = emitter.registry.captured(EndpointId::Keyboard);
        assert_eq!(writes, vec![vec![0, 0, 82, 0, 0, 0, 0, 0], vec![0, 0, 0, 0, 0, 0, 0, 0]]);
    }

    #[test]
    fn type_literal_types_named_key_word_character_by_character() {
        let emitter = capturing_emitter();
        emitter.type_literal("UP", None).unwrap();
        let writes = emitter.registry.captured(EndpointId::Keyboard);
        // 'U' (shift) then 'P' (shift), each pressed and released; never the
        // single named-key usage (82) that `type_sequence` would emit.
        let expected: Vec<[u8; 8]> = vec![
            [LSHIFT, 0, 24, 0, 0, 0, 0, 0],
            [0, 0, 0, 0, 0, 0, 0, 0],
            [LSHIFT, 0, 19, 0, 0, 0, 0, 0],
            [0, 0, 0, 0, 0, 0, 0, 0],
        ];
        assert_eq!(writes.len(), expected.len());
        for (got, want) in writes.iter().zip(expected.iter()) {
            assert_eq!(got.as_slice(), want.as_slice());
        }
    }

    #[test]
    fn type_sequence_with_explicit_modifiers_ends_fully_clear() {
        let emitter = capturing_emitter();
        emitter.type_sequence(Some("CTRL"), Some("a"), false, false).unwrap();
        let writes = emitter.registry.captured(EndpointId::Keyboard);
        // press, per-char release (still holding CTRL), final clean-state release.
        assert_eq!(writes.len(), 3);
        assert_eq!(writes[0], vec![LCTRL, 0, 4, 0, 0, 0, 0, 0]);
        assert_eq!(writes[1], vec![LCTRL, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(writes[2], vec![0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn pointer_scroll_matches_scenario_two() {
        let emitter = capturing_emitter();
        emitter.pointer_scroll(300, 0).unwrap();
        let writes = emitter.registry.captured(EndpointId::Pointer);
        assert_eq!(writes, vec![vec![0, 0, 0, 127], vec![0, 0, 0, 0]]);
    }

    #[test]
    fn pointer_click_matches_scenario_three() {
        let emitter = capturing_emitter();
        emitter.pointer_click(BTN_RIGHT).unwrap();
        let writes = emitter.registry.captured(EndpointId::Pointer);
        assert_eq!(writes, vec![vec![BTN_RIGHT, 0, 0, 0], vec![0, 0, 0, 0]]);
    }

    #[test]
    fn consumer_tap_matches_scenario_four() {
        let emitter = capturing_emitter();
        emitter.send_consumer_tap("VOL+").unwrap();
        let writes = emitter.registry.captured(EndpointId::Consumer);
        assert_eq!(writes, vec![vec![0xE9, 0x00], vec![0x00, 0x00]]);
    }

    #[test]
    fn pointer_config_defaults_to_four_byte_no_hscroll() {
        std::env::remove_var("POINTER_REPORT_SIZE");
        std::env::remove_var("HID_MOUSE_REPORT_SIZE");
        std::env::remove_var("POINTER_HSCROLL");
        std::env::remove_var("HID_MOUSE_HSCROLL");
        let (size, hscroll) = pointer_config_from_env();
        assert_eq!(size, PointerReportSize::Four);
        assert!(!hscroll);
    }

    #[test]
    fn key_delay_clamps_to_max() {
        std::env::set_var("KEY_DELAY_MS", "999999");
        assert_eq!(key_delay_from_env(), MAX_KEY_DELAY_MS);
        std::env::remove_var("KEY_DELAY_MS");
    }

    #[test]
    fn modifier_token_heuristic_matches_original_cli() {
        assert!(token_is_explicit_modifiers("CTRL-SHIFT"));
        assert!(token_is_explicit_modifiers("ctrl-alt"));
        // Misspelled but still modifier-shaped: "only_mods" charset check.
        assert!(token_is_explicit_modifiers("CTRLL-ALT"));
        // No dash at all: never modifiers, even if it spells a modifier name.
        assert!(!token_is_explicit_modifiers("CTRL"));
        // Contains non-modifier characters alongside a dash: a sequence.
        assert!(!token_is_explicit_modifiers("hello-world"));
    }

    #[test]
    fn right_modifier_aliases_resolve() {
        assert_eq!(parse_modifier_string("RCTRL-RSHIFT"), RCTRL | RSHIFT);
        assert_eq!(parse_modifier_string("win-rmeta"), LGUI | RGUI);
    }
}
