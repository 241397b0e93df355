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

//! Character-to-usage tables, locale-parameterized, plus the named-key and
//! consumer-key catalogs.

mod us;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locale {
    Us,
}

impl Locale {
    /// Case-insensitive; unknown names fall back to US with a warning, per
    /// the original `set_hid_locale`.
    pub fn parse(name: &str) -> Locale {
        if name.eq_ignore_ascii_case("US") {
            Locale::Us
        } else {
            warn!("locale '{}' not supported yet, falling back to US", name);
            Locale::Us
        }
    }
}

/// Looks up the HID usage code for an ASCII character under `locale`. `0`
/// means unmapped; callers must check for `c as u32 >= 128` themselves.
pub fn usage_for(locale: Locale, c: char) -> u8 {
    if (c as u32) >= 128 {
        return 0;
    }
    match locale {
        Locale::Us => us::USAGE_TABLE[c as usize],
    }
}

pub fn requires_shift(locale: Locale, c: char) -> bool {
    match locale {
        Locale::Us => us::requires_shift(c),
    }
}

/// Named function/special keys, case-insensitive. Ported from the original
/// `fn_keys[]` table.
pub fn fn_key_usage(name: &str) -> Option<u8> {
    let upper = name.to_ascii_uppercase();
    FN_KEYS.iter().find(|(n, _)| *n == upper).map(|(_, u)| *u)
}

/// Named consumer-control keys, case-insensitive. Ported from the original
/// `consumer_keys[]` table.
pub fn consumer_key_usage(name: &str) -> Option<u16> {
    let upper = name.to_ascii_uppercase();
    CONSUMER_KEYS.iter().find(|(n, _)| *n == upper).map(|(_, u)| *u)
}

#[rustfmt::skip]
const FN_KEYS: &[(&str, u8)] = &[
    ("F1", 58), ("F2", 59), ("F3", 60), ("F4", 61),
    ("F5", 62), ("F6", 63), ("F7", 64), ("F8", 65),
    ("F9", 66), ("F10", 67), ("F11", 68), ("F12", 69),
    ("INSERT", 73), ("HOME", 74), ("PAGEUP", 75), ("DELETE", 76),
    ("END", 77), ("PAGEDOWN", 78), ("RIGHT", 79), ("LEFT", 80),
    ("DOWN", 81), ("UP", 82), ("NUMLOCK", 83), ("ESC", 41),
    ("TAB", 43), ("CAPSLOCK", 57), ("PRINTSCREEN", 70), ("SCROLLLOCK", 71),
    ("PAUSE", 72), ("BACKSPACE", 42), ("RETURN", 40), ("ENTER", 40),
    ("SPACE", 44),
];

#[rustfmt::skip]
const CONSUMER_KEYS: &[(&str, u16)] = &[
    ("PLAY", 0x00B0), ("PAUSE", 0x00B1), ("RECORD", 0x00B2),
    ("FORWARD", 0x00B3), ("REWIND", 0x00B4), ("NEXT", 0x00B5),
    ("PREVIOUS", 0x00B6), ("STOP", 0x00B7), ("EJECT", 0x00B8),
    ("MUTE", 0x00E2), ("VOL+", 0x00E9), ("VOL-", 0x00EA),
    ("BRIGHTNESS+", 0x006F), ("BRIGHTNESS-", 0x0070),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercase_letters_need_no_shift() {
        assert_eq!(usage_for(Locale::Us, 'a'), 4);
        assert_eq!(usage_for(Locale::Us, 'b'), 5);
        assert!(!requires_shift(Locale::Us, 'a'));
    }

    #[test]
    fn uppercase_and_bang_need_shift() {
        assert_eq!(usage_for(Locale::Us, 'B'), 5);
        assert!(requires_shift(Locale::Us, 'B'));
        assert_eq!(usage_for(Locale::Us, '1'), 30);
        assert!(requires_shift(Locale::Us, '!'));
    }

    #[test]
    fn unmapped_character_is_zero() {
        assert_eq!(usage_for(Locale::Us, '\u{0}'), 0);
    }

    #[test]
    fn fn_keys_are_case_insensitive() {
        assert_eq!(fn_key_usage("enter"), Some(40));
        assert_eq!(fn_key_usage("ENTER"), Some(40));
        assert_eq!(fn_key_usage("nope"), None);
    }

    #[test]
    fn consumer_keys_match_original_usages() {
        assert_eq!(consumer_key_usage("VOL+"), Some(0x00E9));
        assert_eq!(consumer_key_usage("vol-"), Some(0x00EA));
        assert_eq!(consumer_key_usage("BOGUS"), None);
    }

    #[test]
    fn unknown_locale_falls_back_to_us() {
        assert_eq!(Locale::parse("klingon"), Locale::Us);
    }
}
