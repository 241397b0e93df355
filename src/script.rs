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

//! Loads a script from a file or stdin (`-`) and indexes its labels and
//! function signatures in one forward pass.

use std::collections::HashMap;
use std::io::{self, BufRead, Read};
use std::path::Path;

pub const MAX_LINE_LEN: usize = 1024;
pub const MAX_LINES: usize = 2048;
pub const MAX_LABELS: usize = 128;
pub const MAX_FUNCTIONS: usize = 32;
pub const MAX_FUNC_PARAMS: usize = 8;

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub start_line: usize,
    pub params: Vec<String>,
}

#[derive(Debug)]
pub struct Script {
    pub lines: Vec<String>,
    pub labels: HashMap<String, usize>,
    pub functions: HashMap<String, FunctionDef>,
}

impl Script {
    /// Loads from a filesystem path, or from stdin when `source == "-"`.
    pub fn load(source: &str) -> io::Result<Script> {
        if source == "-" {
            let stdin = io::stdin();
            Self::from_reader(stdin.lock())
        } else {
            Self::from_path(Path::new(source))
        }
    }

    pub fn from_path(path: &Path) -> io::Result<Script> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(io::BufReader::new(file))
    }

    pub fn from_reader<R: Read>(reader: R) -> io::Result<Script> {
        let mut lines = Vec::new();
        for raw in io::BufReader::new(reader).lines() {
            let raw = raw?;
            if lines.len() >= MAX_LINES {
                warn!("script exceeds {} lines, truncating", MAX_LINES);
                break;
            }
            let trimmed = raw.trim_end().to_string();
            if trimmed.len() > MAX_LINE_LEN {
                warn!("line {} exceeds {} bytes, truncating", lines.len(), MAX_LINE_LEN);
                lines.push(trimmed[..MAX_LINE_LEN].to_string());
            } else {
                lines.push(trimmed);
            }
        }
        Ok(Self::index(lines))
    }

    fn index(lines: Vec<String>) -> Script {
        let mut labels = HashMap::new();
        let mut functions = HashMap::new();

        for (i, line) in lines.iter().enumerate() {
            let trimmed = line.trim_start();
            if let Some(name) = trimmed.strip_prefix(':') {
                if labels.len() >= MAX_LABELS {
                    warn!("script exceeds {} labels, ignoring {:?}", MAX_LABELS, name);
                    continue;
                }
                labels.insert(name.trim().to_string(), i);
                continue;
            }
            if let Some(rest) = trimmed.strip_prefix("FUNCTION ").or_else(|| trimmed.strip_prefix("FUNCTION")) {
                if functions.len() >= MAX_FUNCTIONS {
                    warn!("script exceeds {} functions, ignoring signature at line {}", MAX_FUNCTIONS, i);
                    continue;
                }
                if let Some((name, params)) = parse_function_signature(rest) {
                    functions.insert(name, FunctionDef { start_line: i + 1, params });
                }
            }
        }

        Script { lines, labels, functions }
    }
}

/// Parses `name(param, param2)` or bare `name` following `FUNCTION`/`FUNCTION `.
fn parse_function_signature(rest: &str) -> Option<(String, Vec<String>)> {
    let rest = rest.trim_start();
    let name_end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or_else(|| rest.len());
    if name_end == 0 {
        return None;
    }
    let name = rest[..name_end].to_string();

    let params = match (rest.find('('), rest.find(')')) {
        (Some(open), Some(close)) if close > open => rest[open + 1..close]
            .split(',')
            .map(|p| p.trim().trim_start_matches('$').to_string())
            .filter(|p| !p.is_empty())
            .take(MAX_FUNC_PARAMS)
            .collect(),
        _ => Vec::new(),
    };
    Some((name, params))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script_of(text: &str) -> Script {
        Script::from_reader(text.as_bytes()).unwrap()
    }

    #[test]
    fn indexes_labels() {
        let s = script_of("STRING hi\n:loop\nGOTO loop\n");
        assert_eq!(s.labels.get("loop"), Some(&1));
    }

    #[test]
    fn indexes_function_with_params() {
        let s = script_of("FUNCTION greet($name, $times)\nSTRING hi\nEND_FUNCTION\n");
        let f = s.functions.get("greet").unwrap();
        assert_eq!(f.start_line, 1);
        assert_eq!(f.params, vec!["name".to_string(), "times".to_string()]);
    }

    #[test]
    fn indexes_function_without_params() {
        let s = script_of("FUNCTION greet()\nSTRING hi\nEND_FUNCTION\n");
        let f = s.functions.get("greet").unwrap();
        assert_eq!(f.start_line, 1);
        assert!(f.params.is_empty());
    }

    #[test]
    fn trims_trailing_whitespace_only() {
        let s = script_of("  STRING hi   \n");
        assert_eq!(s.lines[0], "  STRING hi");
    }

    #[test]
    fn oversized_line_is_truncated_not_dropped() {
        let long = "STRING ".to_string() + &"a".repeat(MAX_LINE_LEN + 50);
        let s = script_of(&long);
        assert_eq!(s.lines[0].len(), MAX_LINE_LEN);
    }
}
