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

//! Error kinds shared across the endpoint registry, codec, emitter and
//! interpreter. Plain enums rather than a boxed trait object, following the
//! daemon's existing `AckWaitError` convention.

use crate::endpoint::EndpointId;
use std::fmt;

#[derive(Debug)]
pub enum HidError {
    /// A required endpoint has no resolved path, or failed to open.
    EndpointUnavailable(EndpointId),
    /// The OS accepted fewer bytes than the report size.
    WriteShort { endpoint: EndpointId, expected: usize, actual: usize },
    /// A character or named key has no mapping in the active locale.
    UnknownKey(String),
    /// A consumer control name was not found in the catalog.
    UnknownConsumerKey(String),
    /// A pointer report size/feature combination the codec can't encode.
    UnsupportedFeature(&'static str),
    /// A malformed numeric argument or script line.
    ParseError(String),
    /// IF/FOR/REM_BLOCK with no matching terminator before end-of-script.
    UnterminatedBlock(&'static str),
}

impl fmt::Display for HidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HidError::EndpointUnavailable(id) => {
                write!(f, "endpoint unavailable: {:?}", id)
            }
            HidError::WriteShort { endpoint, expected, actual } => write!(
                f,
                "short write on {:?}: wrote {} of {} bytes",
                endpoint, actual, expected
            ),
            HidError::UnknownKey(name) => write!(f, "unknown key: {}", name),
            HidError::UnknownConsumerKey(name) => {
                write!(f, "unknown consumer control: {}", name)
            }
            HidError::UnsupportedFeature(what) => write!(f, "unsupported: {}", what),
            HidError::ParseError(what) => write!(f, "parse error: {}", what),
            HidError::UnterminatedBlock(kind) => {
                write!(f, "unterminated {} block", kind)
            }
        }
    }
}

impl std::error::Error for HidError {}

pub type Result<T> = std::result::Result<T, HidError>;
