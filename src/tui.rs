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

//! Minimal raw-terminal front end. Calls only the emitter entry points
//! required by the wider interpreter: `type_sequence`, `pointer_move`,
//! `pointer_click`, `pointer_press`, `pointer_release`, `send_consumer_tap`.
//! Keeps its own sticky-modifier toggle rather than assuming the emitter
//! preserves latches across calls.

use crate::emitter::Emitter;
use crate::error::{HidError, Result};
use std::io::{Read, Write};
use std::sync::atomic::Ordering;

#[cfg(unix)]
struct RawModeGuard {
    original: libc::termios,
}

#[cfg(unix)]
impl RawModeGuard {
    fn enable() -> std::io::Result<Self> {
        unsafe {
            let mut original: libc::termios = std::mem::zeroed();
            if libc::tcgetattr(libc::STDIN_FILENO, &mut original) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            let mut raw = original;
            raw.c_lflag &= !(libc::ICANON | libc::ECHO | libc::ISIG);
            raw.c_cc[libc::VMIN] = 1;
            raw.c_cc[libc::VTIME] = 0;
            if libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &raw) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(RawModeGuard { original })
        }
    }
}

#[cfg(unix)]
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        unsafe {
            libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &self.original);
        }
    }
}

pub struct Tui<'a> {
    emitter: &'a Emitter,
    sticky_shift: bool,
}

impl<'a> Tui<'a> {
    pub fn new(emitter: &'a Emitter) -> Self {
        Tui { emitter, sticky_shift: false }
    }

    /// Runs the event loop until `q` is pressed or `RUNNING` flips false.
    #[cfg(unix)]
    pub fn run(&mut self) -> Result<()> {
        let _raw = RawModeGuard::enable().map_err(|_| HidError::UnsupportedFeature("raw terminal mode"))?;
        self.print_banner();

        let mut stdin = std::io::stdin();
        let mut byte = [0u8; 1];
        loop {
            if !crate::RUNNING.load(Ordering::SeqCst) {
                break;
            }
            match stdin.read(&mut byte) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    if !self.handle_byte(byte[0])? {
                        break;
                    }
                }
            }
        }
        println!();
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn run(&mut self) -> Result<()> {
        Err(HidError::UnsupportedFeature("tui requires a unix terminal"))
    }

    fn print_banner(&self) {
        println!("hidgadget tui — q quits, tab toggles sticky shift, arrow keys nudge the pointer");
        self.print_status();
    }

    fn print_status(&self) {
        let led = self.emitter.led_state();
        print!(
            "\r[caps={} num={} scroll={} shift={}] > ",
            crate::led::caps_lock(led),
            crate::led::num_lock(led),
            crate::led::scroll_lock(led),
            self.sticky_shift,
        );
        let _ = std::io::stdout().flush();
    }

    /// Returns `false` to end the loop.
    fn handle_byte(&mut self, b: u8) -> Result<bool> {
        const ESC: u8 = 0x1b;
        const TAB: u8 = 0x09;

        match b {
            b'q' => return Ok(false),
            TAB => {
                self.sticky_shift = !self.sticky_shift;
            }
            ESC => {
                // Best-effort arrow-key handling: consume the `[` + direction
                // byte if present, otherwise treat ESC alone as a no-op.
                let mut rest = [0u8; 2];
                if std::io::stdin().read_exact(&mut rest).is_ok() && rest[0] == b'[' {
                    match rest[1] {
                        b'A' => self.emitter.pointer_move(0, -5)?,
                        b'B' => self.emitter.pointer_move(0, 5)?,
                        b'C' => self.emitter.pointer_move(5, 0)?,
                        b'D' => self.emitter.pointer_move(-5, 0)?,
                        _ => {}
                    }
                }
            }
            b'\r' | b'\n' => {
                self.emitter.type_sequence(None, Some("RETURN"), false, false)?;
            }
            b'[' => self.emitter.pointer_click(crate::emitter::BTN_LEFT)?,
            b']' => self.emitter.pointer_click(crate::emitter::BTN_RIGHT)?,
            b'{' => self.emitter.pointer_press(crate::emitter::BTN_LEFT)?,
            b'}' => self.emitter.pointer_release()?,
            b'v' => self.emitter.send_consumer_tap("VOL+").map_err(|e| {
                warn!("consumer tap failed: {}", e);
                e
            })?,
            c if c.is_ascii_graphic() || c == b' ' => {
                let text = (c as char).to_string();
                let mods = if self.sticky_shift { Some("SHIFT") } else { None };
                self.emitter.type_sequence(mods, Some(&text), false, false)?;
            }
            _ => {}
        }
        self.print_status();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::EndpointRegistry;
    use std::path::Path;

    #[test]
    fn tab_toggles_sticky_shift_without_emitting() {
        let registry = EndpointRegistry::discover_in(Path::new("/nonexistent-dir-for-tests"));
        let emitter = Emitter::new(registry);
        let mut tui = Tui::new(&emitter);
        assert!(!tui.sticky_shift);
        tui.handle_byte(0x09).unwrap();
        assert!(tui.sticky_shift);
        tui.handle_byte(0x09).unwrap();
        assert!(!tui.sticky_shift);
    }

    #[test]
    fn q_ends_the_loop() {
        let registry = EndpointRegistry::discover_in(Path::new("/nonexistent-dir-for-tests"));
        let emitter = Emitter::new(registry);
        let mut tui = Tui::new(&emitter);
        assert!(!tui.handle_byte(b'q').unwrap());
    }
}
