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

// ----- Crates -----

#[macro_use]
extern crate log;

// ----- Modules -----

pub mod error;
pub mod endpoint;
pub mod report;
pub mod keymap;
pub mod led;
pub mod emitter;
pub mod script;
pub mod vars;
pub mod eval;
pub mod interp;
pub mod tui;

pub mod built_info {
    // This file is generated at build time using build.rs
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

// ----- Globals -----

use lazy_static::lazy_static;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

lazy_static! {
    /// Flipped to false by the Ctrl-C handler. Consulted by the `tui` event
    /// loop and by WAIT_FOR_* busy-polls so a session can be interrupted
    /// cleanly.
    pub static ref RUNNING: Arc<AtomicBool> = Arc::new(AtomicBool::new(true));
}
