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

//! Resolves and holds the three gadget endpoint handles (keyboard, pointer,
//! consumer). Discovery order: explicit environment overrides first, then a
//! sorted scan of `/dev/hidg<N>` character-special devices for whatever
//! slots remain unset.

use crate::error::{HidError, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointId {
    Keyboard,
    Pointer,
    Consumer,
}

impl EndpointId {
    const ALL: [EndpointId; 3] = [EndpointId::Keyboard, EndpointId::Pointer, EndpointId::Consumer];

    fn index(self) -> usize {
        match self {
            EndpointId::Keyboard => 0,
            EndpointId::Pointer => 1,
            EndpointId::Consumer => 2,
        }
    }

    /// Primary environment variable name.
    fn env_name(self) -> &'static str {
        match self {
            EndpointId::Keyboard => "KEYBOARD_DEV",
            EndpointId::Pointer => "POINTER_DEV",
            EndpointId::Consumer => "CONSUMER_DEV",
        }
    }

    /// Legacy alias accepted for compatibility with scripts written against
    /// the original hid-gadget tool.
    fn legacy_env_name(self) -> &'static str {
        match self {
            EndpointId::Keyboard => "HID_KEYBOARD_DEV",
            EndpointId::Pointer => "HID_MOUSE_DEV",
            EndpointId::Consumer => "HID_CONSUMER_DEV",
        }
    }
}

fn is_char_device(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use nix::sys::stat::{stat, SFlag};
        match stat(path) {
            Ok(st) => SFlag::from_bits_truncate(st.st_mode).contains(SFlag::S_IFCHR),
            Err(_) => false,
        }
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        false
    }
}

/// Parses a `/dev` entry name of the form `hidg<N>` into its index.
fn hidg_number(name: &str) -> Option<u32> {
    let digits = name.strip_prefix("hidg")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Scans `/dev` for `hidg<N>` character-special devices, sorted by `N`.
fn scan_hidg_devices(dev_dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dev_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("directory scan of {:?} failed: {}", dev_dir, e);
            return Vec::new();
        }
    };

    let mut found: Vec<(u32, PathBuf)> = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = match name.to_str() {
            Some(n) => n,
            None => continue,
        };
        let number = match hidg_number(name) {
            Some(n) => n,
            None => continue,
        };
        let path = entry.path();
        if is_char_device(&path) {
            found.push((number, path));
        }
    }
    found.sort_by_key(|(n, _)| *n);
    found.into_iter().map(|(_, p)| p).collect()
}

struct Slot {
    path: Option<PathBuf>,
    mocked: bool,
    handle: Mutex<Option<File>>,
    /// Set only by `with_memory_sinks` in tests: diverts writes into memory
    /// instead of opening `path`, so tests can assert on the exact report
    /// sequence the emitter produces.
    capture: Option<Mutex<Vec<Vec<u8>>>>,
}

impl Slot {
    fn empty() -> Self {
        Slot { path: None, mocked: false, handle: Mutex::new(None), capture: None }
    }
}

pub struct EndpointRegistry {
    slots: [Slot; 3],
}

impl EndpointRegistry {
    /// Resolves endpoint paths per §4.1: environment overrides first (primary
    /// then legacy name), then a directory scan fills whatever slots remain,
    /// lowest `hidg<N>` first. With the `mock-hid` feature and zero devices
    /// discovered, synthesizes `/dev/null` paths routed through a hex-dump
    /// sink.
    pub fn discover() -> Self {
        Self::discover_in(Path::new("/dev"))
    }

    pub fn discover_in(dev_dir: &Path) -> Self {
        let mut slots = [Slot::empty(), Slot::empty(), Slot::empty()];

        for &id in EndpointId::ALL.iter() {
            let idx = id.index();
            if let Ok(p) = std::env::var(id.env_name()) {
                let path = PathBuf::from(p);
                if is_char_device(&path) {
                    slots[idx].path = Some(path);
                    continue;
                }
            }
            if let Ok(p) = std::env::var(id.legacy_env_name()) {
                let path = PathBuf::from(p);
                if is_char_device(&path) {
                    slots[idx].path = Some(path);
                }
            }
        }

        let unfilled: Vec<usize> = EndpointId::ALL
            .iter()
            .map(|id| id.index())
            .filter(|&i| slots[i].path.is_none())
            .collect();

        if !unfilled.is_empty() {
            let discovered = scan_hidg_devices(dev_dir);
            for (slot_idx, path) in unfilled.into_iter().zip(discovered.into_iter()) {
                slots[slot_idx].path = Some(path);
            }
        }

        let any_found = slots.iter().any(|s| s.path.is_some());
        if !any_found && cfg!(feature = "mock-hid") {
            info!("no hidg devices found; synthesizing mock endpoints");
            for slot in slots.iter_mut() {
                slot.path = Some(PathBuf::from("/dev/null"));
                slot.mocked = true;
            }
        }

        EndpointRegistry { slots }
    }

    /// Builds a registry whose three endpoints are all present but write into
    /// in-memory buffers instead of a filesystem path, so tests can assert
    /// on the exact sequence of reports the emitter produced.
    #[cfg(test)]
    pub fn with_memory_sinks() -> Self {
        let mut slots = [Slot::empty(), Slot::empty(), Slot::empty()];
        for slot in slots.iter_mut() {
            slot.path = Some(PathBuf::from("<memory>"));
            slot.capture = Some(Mutex::new(Vec::new()));
        }
        EndpointRegistry { slots }
    }

    /// Every report written to `id` so far, in write order. Only meaningful
    /// on a registry built with `with_memory_sinks`.
    #[cfg(test)]
    pub fn captured(&self, id: EndpointId) -> Vec<Vec<u8>> {
        match &self.slots[id.index()].capture {
            Some(buf) => buf.lock().unwrap().clone(),
            None => Vec::new(),
        }
    }

    pub fn path(&self, id: EndpointId) -> Option<&Path> {
        self.slots[id.index()].path.as_deref()
    }

    fn open(&self, id: EndpointId) -> Result<()> {
        let slot = &self.slots[id.index()];
        if slot.capture.is_some() {
            return Ok(());
        }
        let path = slot.path.as_ref().ok_or(HidError::EndpointUnavailable(id))?;
        let mut guard = slot.handle.lock().unwrap();
        if guard.is_some() {
            return Ok(());
        }
        match OpenOptions::new().write(true).open(path) {
            Ok(f) => {
                *guard = Some(f);
                Ok(())
            }
            Err(e) => {
                warn!("opening {:?} ({:?}) failed: {}", id, path, e);
                Err(HidError::EndpointUnavailable(id))
            }
        }
    }

    /// Writes one report to `id`, opening and caching the handle lazily.
    /// Serialized per-endpoint by the slot's mutex.
    pub fn write(&self, id: EndpointId, report: &[u8]) -> Result<()> {
        self.open(id)?;
        let slot = &self.slots[id.index()];
        if let Some(capture) = &slot.capture {
            capture.lock().unwrap().push(report.to_vec());
            return Ok(());
        }
        if slot.mocked {
            debug!("[mock {:?}] {}", id, hex_dump(report));
        }
        let mut guard = slot.handle.lock().unwrap();
        let file = guard.as_mut().ok_or(HidError::EndpointUnavailable(id))?;
        let n = file.write(report).map_err(|_| HidError::WriteShort {
            endpoint: id,
            expected: report.len(),
            actual: 0,
        })?;
        if n != report.len() {
            return Err(HidError::WriteShort { endpoint: id, expected: report.len(), actual: n });
        }
        Ok(())
    }
}

fn hex_dump(buf: &[u8]) -> String {
    buf.iter().map(|b| format!("{:02X} ", b)).collect::<String>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidg_number_parses_digits_only() {
        assert_eq!(hidg_number("hidg0"), Some(0));
        assert_eq!(hidg_number("hidg12"), Some(12));
        assert_eq!(hidg_number("hidgx"), None);
        assert_eq!(hidg_number("hidg"), None);
        assert_eq!(hidg_number("other0"), None);
    }

    #[test]
    fn env_override_wins_over_scan() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("KEYBOARD_DEV", "/dev/null");
        std::env::remove_var("POINTER_DEV");
        std::env::remove_var("CONSUMER_DEV");
        std::env::remove_var("HID_MOUSE_DEV");
        std::env::remove_var("HID_CONSUMER_DEV");
        let reg = EndpointRegistry::discover_in(dir.path());
        assert_eq!(reg.path(EndpointId::Keyboard), Some(Path::new("/dev/null")));
        std::env::remove_var("KEYBOARD_DEV");
    }
}
