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

//! Reads the keyboard endpoint's output report (LED state) non-blockingly.
//! Never fails the caller: if the endpoint can't be read, the last cached
//! value (or zero) stands in.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Mutex;

pub const NUM_LOCK: u8 = 0x01;
pub const CAPS_LOCK: u8 = 0x02;
pub const SCROLL_LOCK: u8 = 0x04;

struct State {
    handle: Option<File>,
    last: u8,
}

pub struct LedReader {
    state: Mutex<State>,
}

impl LedReader {
    pub fn new() -> Self {
        LedReader { state: Mutex::new(State { handle: None, last: 0 }) }
    }

    fn ensure_open(state: &mut State, path: &Path) {
        if state.handle.is_some() {
            return;
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            match std::fs::OpenOptions::new()
                .read(true)
                .custom_flags(libc::O_NONBLOCK)
                .open(path)
            {
                Ok(f) => state.handle = Some(f),
                Err(e) => debug!("LED endpoint {:?} not readable yet: {}", path, e),
            }
        }
        #[cfg(not(unix))]
        {
            let _ = path;
        }
    }

    /// Drains every currently available byte from the keyboard endpoint,
    /// retaining the most recent one. Returns the cached value (possibly
    /// stale, possibly zero) if nothing new is available.
    pub fn read(&self, path: &Path) -> u8 {
        let mut state = self.state.lock().unwrap();
        Self::ensure_open(&mut state, path);

        if let Some(file) = state.handle.as_mut() {
            let mut byte = [0u8; 1];
            loop {
                match file.read(&mut byte) {
                    Ok(1) => state.last = byte[0],
                    _ => break,
                }
            }
        }
        state.last
    }
}

impl Default for LedReader {
    fn default() -> Self {
        Self::new()
    }
}

pub fn num_lock(byte: u8) -> bool {
    byte & NUM_LOCK != 0
}

pub fn caps_lock(byte: u8) -> bool {
    byte & CAPS_LOCK != 0
}

pub fn scroll_lock(byte: u8) -> bool {
    byte & SCROLL_LOCK != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_helpers_decode_combined_state() {
        let byte = NUM_LOCK | SCROLL_LOCK;
        assert!(num_lock(byte));
        assert!(!caps_lock(byte));
        assert!(scroll_lock(byte));
    }

    #[test]
    fn unread_reader_reports_zero() {
        let reader = LedReader::new();
        assert_eq!(reader.read(Path::new("/nonexistent-hidg-endpoint")), 0);
    }
}
