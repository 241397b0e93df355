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

//! Name→value lookup with layered precedence: script-set, process
//! environment, computed system variables, then the bare OS constant tags.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::RefCell;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const HEX_DIGITS: &[u8] = b"0123456789ABCDEF";

/// `(major, build)` per OS name; anything else falls back to `("0", "0")`.
fn os_metadata(os: &str) -> (&'static str, &'static str) {
    match os {
        "WINDOWS" => ("10", "19041"),
        "WINDOWS_11" => ("11", "22000"),
        "MACOS" => ("14", "0"),
        "LINUX" => ("6", "0"),
        "ANDROID" => ("13", "0"),
        _ => ("0", "0"),
    }
}

pub struct VarTable {
    scripted: RefCell<HashMap<String, String>>,
    rng: RefCell<StdRng>,
}

impl VarTable {
    pub fn new() -> Self {
        VarTable { scripted: RefCell::new(HashMap::new()), rng: RefCell::new(StdRng::from_entropy()) }
    }

    /// For deterministic `_RANDOM_*` behavior in tests.
    pub fn with_seed(seed: u64) -> Self {
        VarTable { scripted: RefCell::new(HashMap::new()), rng: RefCell::new(StdRng::seed_from_u64(seed)) }
    }

    pub fn set(&self, name: &str, value: impl Into<String>) {
        self.scripted.borrow_mut().insert(name.to_string(), value.into());
    }

    /// `led_byte` carries the latest LED-State Reader value; callers fetch
    /// it fresh from the emitter before evaluating a condition that may
    /// reference `_CAPSLOCK_ON` et al.
    pub fn get(&self, name: &str, led_byte: u8) -> Option<String> {
        if let Some(v) = self.scripted.borrow().get(name) {
            return Some(v.clone());
        }
        if let Ok(v) = std::env::var(name) {
            return Some(v);
        }
        if let Some(v) = self.computed(name, led_byte) {
            return Some(v);
        }
        match name {
            "WINDOWS" | "LINUX" | "MACOS" => Some(name.to_string()),
            _ => None,
        }
    }

    fn computed(&self, name: &str, led_byte: u8) -> Option<String> {
        if !name.starts_with('_') {
            return None;
        }
        match name {
            "_OS" => Some(std::env::var("TARGET_OS").unwrap_or_else(|_| "WINDOWS".to_string())),
            "_OS_VERSION_MAJOR" => {
                let os = std::env::var("TARGET_OS").unwrap_or_else(|_| "WINDOWS".to_string());
                Some(os_metadata(&os).0.to_string())
            }
            "_BUILD_NUMBER" => {
                let os = std::env::var("TARGET_OS").unwrap_or_else(|_| "WINDOWS".to_string());
                Some(os_metadata(&os).1.to_string())
            }
            "_CAPSLOCK_ON" => Some(bool_str(crate::led::caps_lock(led_byte))),
            "_NUMLOCK_ON" => Some(bool_str(crate::led::num_lock(led_byte))),
            "_SCROLLOCK_ON" => Some(bool_str(crate::led::scroll_lock(led_byte))),
            "_RANDOM_INT" => Some((self.rng.borrow_mut().gen_range(0, 10000)).to_string()),
            "_RANDOM_LOWERCASE_LETTER" => Some(self.random_byte(LOWERCASE)),
            "_RANDOM_UPPERCASE_LETTER" => Some(self.random_byte(UPPERCASE)),
            "_RANDOM_HEX" => Some(self.random_byte(HEX_DIGITS)),
            "_RANDOM_CHAR" => {
                let c = self.rng.borrow_mut().gen_range(33u8, 127u8);
                Some((c as char).to_string())
            }
            "_TIMESTAMP" => {
                let secs = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
                Some(secs.to_string())
            }
            _ => None,
        }
    }

    fn random_byte(&self, alphabet: &[u8]) -> String {
        let idx = self.rng.borrow_mut().gen_range(0, alphabet.len());
        (alphabet[idx] as char).to_string()
    }
}

impl Default for VarTable {
    fn default() -> Self {
        Self::new()
    }
}

fn bool_str(b: bool) -> String {
    if b { "TRUE".to_string() } else { "FALSE".to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_set_wins_over_env_and_computed() {
        let vars = VarTable::with_seed(1);
        std::env::set_var("MY_VAR", "from-env");
        vars.set("MY_VAR", "from-script");
        assert_eq!(vars.get("MY_VAR", 0), Some("from-script".to_string()));
        std::env::remove_var("MY_VAR");
    }

    #[test]
    fn process_env_wins_over_computed_and_constants() {
        std::env::set_var("LINUX", "custom");
        let vars = VarTable::with_seed(1);
        assert_eq!(vars.get("LINUX", 0), Some("custom".to_string()));
        std::env::remove_var("LINUX");
    }

    #[test]
    fn bare_os_tags_return_their_own_name() {
        let vars = VarTable::with_seed(1);
        assert_eq!(vars.get("WINDOWS", 0), Some("WINDOWS".to_string()));
        assert_eq!(vars.get("MACOS", 0), Some("MACOS".to_string()));
    }

    #[test]
    fn led_booleans_reflect_byte() {
        let vars = VarTable::with_seed(1);
        assert_eq!(vars.get("_CAPSLOCK_ON", 0x02), Some("TRUE".to_string()));
        assert_eq!(vars.get("_NUMLOCK_ON", 0x02), Some("FALSE".to_string()));
    }

    #[test]
    fn random_int_is_in_range() {
        let vars = VarTable::with_seed(42);
        let v: i64 = vars.get("_RANDOM_INT", 0).unwrap().parse().unwrap();
        assert!(v < 10000);
    }

    #[test]
    fn unknown_name_is_absent() {
        let vars = VarTable::with_seed(1);
        assert_eq!(vars.get("NOT_A_REAL_VARIABLE", 0), None);
    }
}
