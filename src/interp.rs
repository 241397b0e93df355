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

//! Executes an indexed script over the emitter. A flat program counter with
//! explicit jumps (no call-stack recursion for IF/FOR) mirrors the
//! line-oriented original rather than building a statement AST.
//!
//! `DEFAULTDELAY`/`STRINGLN` fuzz jitter has no configuring statement in
//! this dialect, so the fuzz term is always zero; see DESIGN.md.

use crate::emitter::Emitter;
use crate::error::Result;
use crate::eval;
use crate::led;
use crate::script::Script;
use crate::vars::VarTable;
use std::sync::atomic::Ordering;
use std::thread::sleep;
use std::time::Duration;

const LED_POLL_MS: u64 = 10;

const MODIFIER_TOKENS: &[(&str, &str)] = &[
    ("CTRL", "CTRL"),
    ("CONTROL", "CTRL"),
    ("SHIFT", "SHIFT"),
    ("ALT", "ALT"),
    ("OPTION", "ALT"),
    ("GUI", "GUI"),
    ("WINDOWS", "GUI"),
    ("COMMAND", "GUI"),
];

struct ForFrame {
    var: String,
    current: i64,
    end: i64,
    body_start: usize,
}

pub struct Interpreter<'a> {
    emitter: &'a Emitter,
    vars: VarTable,
    default_delay_ms: u64,
    for_stack: Vec<ForFrame>,
    return_stack: Vec<usize>,
    warned_function_params: bool,
}

impl<'a> Interpreter<'a> {
    pub fn new(emitter: &'a Emitter) -> Self {
        Interpreter {
            emitter,
            vars: VarTable::new(),
            default_delay_ms: 0,
            for_stack: Vec::new(),
            return_stack: Vec::new(),
            warned_function_params: false,
        }
    }

    pub fn vars(&self) -> &VarTable {
        &self.vars
    }

    fn led_byte(&self) -> u8 {
        self.emitter.led_state()
    }

    fn sub(&self, s: &str) -> String {
        eval::substitute(s, &self.vars, self.led_byte())
    }

    /// Runs the whole script to completion, or until a process signal flips
    /// `RUNNING` to false.
    pub fn run(&mut self, script: &Script) -> Result<()> {
        // A preseed variables file shares the script's working directory
        // convention; see `load_preseed` in the CLI entry point for the
        // actual file load. Interpreter itself only executes lines.
        let mut pc = 0usize;
        while pc < script.lines.len() {
            if !crate::RUNNING.load(Ordering::SeqCst) {
                break;
            }
            pc = self.step(script, pc)?;
        }
        Ok(())
    }

    fn step(&mut self, script: &Script, pc: usize) -> Result<usize> {
        let raw = &script.lines[pc];
        let line = raw.trim_start();

        if line.is_empty() {
            return Ok(pc + 1);
        }
        if !line.starts_with(':') {
            debug!("{}: {}", pc, line);
        }

        if line.starts_with("REM_BLOCK") {
            return Ok(match find_end_rem_block(&script.lines, pc + 1) {
                Some(end) => end + 1,
                None => {
                    warn!("unterminated REM_BLOCK at line {}, ending script", pc);
                    script.lines.len()
                }
            });
        }
        if line.starts_with("REM") {
            return Ok(pc + 1);
        }
        if line.starts_with(':') {
            return Ok(pc + 1);
        }
        if let Some(rest) = line.strip_prefix("GOTO ") {
            let target = rest.trim();
            return Ok(script.labels.get(target).copied().unwrap_or(pc + 1));
        }
        if let Some(rest) = line.strip_prefix("STRINGLN ") {
            let text = self.sub(rest);
            self.emitter.type_literal(&text, None)?;
            self.emitter.type_sequence(None, Some("RETURN"), false, false)?;
            return Ok(self.delayed(pc + 1));
        }
        if let Some(rest) = line.strip_prefix("STRING ") {
            let text = self.sub(rest);
            self.emitter.type_literal(&text, None)?;
            return Ok(self.delayed(pc + 1));
        }
        if let Some(rest) = line.strip_prefix("DEFAULTDELAY ") {
            self.default_delay_ms = eval::atoi(&self.sub(rest)).max(0) as u64;
            return Ok(pc + 1);
        }
        if let Some(rest) = line.strip_prefix("DELAY ") {
            let ms = eval::atoi(&self.sub(rest)).max(0) as u64;
            sleep(Duration::from_millis(ms));
            return Ok(pc + 1);
        }
        if let Some(rest) = line.strip_prefix("IF ") {
            return self.exec_if(script, pc, rest);
        }
        if line.starts_with("ELSE") {
            // Reached by falling through the true branch; skip the false
            // branch entirely.
            let endif = find_matching_endif(&script.lines, pc + 1)?;
            return Ok(endif + 1);
        }
        if line.starts_with("ENDIF") || line.starts_with("END_IF") {
            return Ok(pc + 1);
        }
        if let Some(rest) = line.strip_prefix("FOR ") {
            return self.exec_for(script, pc, rest);
        }
        if line.starts_with("NEXT") {
            return Ok(self.exec_next(pc));
        }
        if let Some(rest) = line.strip_prefix("VAR ") {
            self.exec_assignment(rest);
            return Ok(self.delayed(pc + 1));
        }
        if line.starts_with('$') {
            if let Some(eq) = line.find('=') {
                self.exec_assignment(&line[1..]);
                let _ = eq;
                return Ok(self.delayed(pc + 1));
            }
        }
        if let Some(rest) = line.strip_prefix("HOLD ") {
            self.emitter.hold(rest.trim())?;
            return Ok(self.delayed(pc + 1));
        }
        if let Some(rest) = line.strip_prefix("RELEASE ") {
            self.emitter.release(rest.trim())?;
            return Ok(self.delayed(pc + 1));
        }
        if let Some(rest) = line.strip_prefix("LOCALE ") {
            self.emitter.set_locale(rest.trim());
            return Ok(self.delayed(pc + 1));
        }
        if let Some(rest) = line.strip_prefix("KEYCODE ") {
            let bytes = parse_keycode(rest);
            self.emitter.send_raw_keyboard(bytes[0], [bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7]])?;
            return Ok(self.delayed(pc + 1));
        }
        if let Some(which) = wait_for_led(line) {
            self.exec_wait_for(which);
            return Ok(pc + 1);
        }
        if let Some(rest) = line.strip_prefix("ECHO ") {
            println!("{}", self.sub(rest));
            return Ok(self.delayed(pc + 1));
        }
        if line.starts_with("ATTACKMODE")
            || line.starts_with("LED")
            || line.starts_with("WAIT_FOR_BUTTON_PRESS")
            || line.starts_with("EXTENSION")
        {
            info!("recognized but inert statement: {}", line);
            return Ok(pc + 1);
        }
        if line.starts_with("FUNCTION") {
            return Ok(find_end_function(&script.lines, pc + 1).map(|e| e + 1).unwrap_or(script.lines.len()));
        }
        if line.starts_with("END_FUNCTION") || line.starts_with("RETURN") {
            return Ok(match self.return_stack.pop() {
                Some(ret) => ret,
                None => pc + 1,
            });
        }

        self.exec_bare_word(script, pc, line)
    }

    fn delayed(&self, next_pc: usize) -> usize {
        if self.default_delay_ms > 0 {
            sleep(Duration::from_millis(self.default_delay_ms));
        }
        next_pc
    }

    fn exec_if(&mut self, script: &Script, pc: usize, rest: &str) -> Result<usize> {
        let cond = rest.strip_suffix(" THEN").unwrap_or(rest);
        let (else_line, endif_line) = find_if_block(&script.lines, pc + 1)?;
        if eval::eval(cond, &self.vars, self.led_byte()) {
            Ok(pc + 1)
        } else {
            match else_line {
                Some(line) => Ok(line + 1),
                None => Ok(endif_line + 1),
            }
        }
    }

    fn exec_for(&mut self, script: &Script, pc: usize, rest: &str) -> Result<usize> {
        let (var, a, b) = match parse_for_header(rest) {
            Some(parts) => parts,
            None => {
                warn!("malformed FOR header at line {}: {:?}", pc, rest);
                return Ok(pc + 1);
            }
        };
        let start_val = eval::atoi(&self.sub(&a));
        let end_val = eval::atoi(&self.sub(&b));
        let body_start = pc + 1;
        self.vars.set(&var, start_val.to_string());
        self.for_stack.push(ForFrame { var, current: start_val, end: end_val, body_start });
        if start_val > end_val {
            let next_line = find_matching_next(&script.lines, body_start)?;
            self.for_stack.pop();
            return Ok(next_line + 1);
        }
        Ok(body_start)
    }

    fn exec_next(&mut self, pc: usize) -> usize {
        let (keep_looping, next_pc, var_name, current_val) = match self.for_stack.last_mut() {
            Some(frame) => {
                frame.current += 1;
                let keep_looping = frame.current <= frame.end;
                let next_pc = if keep_looping { frame.body_start } else { pc + 1 };
                (keep_looping, next_pc, frame.var.clone(), frame.current)
            }
            None => return pc + 1,
        };
        self.vars.set(&var_name, current_val.to_string());
        if !keep_looping {
            self.for_stack.pop();
        }
        next_pc
    }

    fn exec_assignment(&mut self, rest: &str) {
        let mut parts = rest.splitn(2, '=');
        let name = match parts.next() {
            Some(n) => n.trim().trim_start_matches('$').to_string(),
            None => return,
        };
        let expr = match parts.next() {
            Some(e) => e.trim(),
            None => return,
        };
        let substituted = self.sub(expr);
        let value = match eval::try_eval_arithmetic(&substituted) {
            Some(n) => n.to_string(),
            None => substituted,
        };
        self.vars.set(&name, value);
    }

    fn exec_wait_for(&self, which: WaitFor) {
        loop {
            if !crate::RUNNING.load(Ordering::SeqCst) {
                return;
            }
            let byte = self.led_byte();
            let satisfied = match which {
                WaitFor::CapsOn => led::caps_lock(byte),
                WaitFor::CapsOff => !led::caps_lock(byte),
                WaitFor::NumOn => led::num_lock(byte),
                WaitFor::NumOff => !led::num_lock(byte),
                WaitFor::ScrollOn => led::scroll_lock(byte),
                WaitFor::ScrollOff => !led::scroll_lock(byte),
            };
            if satisfied {
                return;
            }
            sleep(Duration::from_millis(LED_POLL_MS));
        }
    }

    fn exec_bare_word(&mut self, script: &Script, pc: usize, line: &str) -> Result<usize> {
        let mut tokens = line.split_whitespace();
        let first = match tokens.next() {
            Some(t) => t,
            None => return Ok(pc + 1),
        };

        if let Some(func) = script.functions.get(first) {
            if !func.params.is_empty() && !self.warned_function_params {
                debug!("function {:?} parameters accepted but unused", first);
                self.warned_function_params = true;
            }
            self.return_stack.push(pc + 1);
            return Ok(func.start_line);
        }

        let mut modifiers: Vec<&str> = Vec::new();
        let mut key: Option<&str> = None;
        for tok in line.split_whitespace() {
            if let Some((_, canon)) = MODIFIER_TOKENS.iter().find(|(name, _)| tok.eq_ignore_ascii_case(name)) {
                if !modifiers.contains(canon) {
                    modifiers.push(canon);
                }
            } else if key.is_none() {
                key = Some(tok);
            }
        }
        let mod_string = if modifiers.is_empty() { None } else { Some(modifiers.join("-")) };
        self.emitter.type_sequence(mod_string.as_deref(), key, false, false)?;
        Ok(self.delayed(pc + 1))
    }
}

#[derive(Clone, Copy)]
enum WaitFor {
    CapsOn,
    CapsOff,
    NumOn,
    NumOff,
    ScrollOn,
    ScrollOff,
}

fn wait_for_led(line: &str) -> Option<WaitFor> {
    match line {
        "WAIT_FOR_CAPS_ON" => Some(WaitFor::CapsOn),
        "WAIT_FOR_CAPS_OFF" => Some(WaitFor::CapsOff),
        "WAIT_FOR_NUM_ON" => Some(WaitFor::NumOn),
        "WAIT_FOR_NUM_OFF" => Some(WaitFor::NumOff),
        "WAIT_FOR_SCROLL_ON" => Some(WaitFor::ScrollOn),
        "WAIT_FOR_SCROLL_OFF" => Some(WaitFor::ScrollOff),
        _ => None,
    }
}

fn parse_for_header(rest: &str) -> Option<(String, String, String)> {
    let to_idx = rest.find(" TO ")?;
    let (head, tail) = (&rest[..to_idx], &rest[to_idx + 4..]);
    let eq_idx = head.find('=')?;
    let var = head[..eq_idx].trim().trim_start_matches('$').to_string();
    let a = head[eq_idx + 1..].trim().to_string();
    let b = tail.trim().to_string();
    Some((var, a, b))
}

fn parse_keycode(rest: &str) -> [u8; 8] {
    let mut bytes = [0u8; 8];
    for (i, tok) in rest.split_whitespace().take(8).enumerate() {
        bytes[i] = parse_byte_token(tok);
    }
    bytes
}

fn parse_byte_token(tok: &str) -> u8 {
    if let Some(hex) = tok.strip_prefix("0x").or_else(|| tok.strip_prefix("0X")) {
        u8::from_str_radix(hex, 16).unwrap_or(0)
    } else {
        tok.parse::<u8>().unwrap_or(0)
    }
}

fn starts_with_word(line: &str, word: &str) -> bool {
    line.starts_with(word)
        && line[word.len()..].chars().next().map(|c| c.is_whitespace() || c == '(').unwrap_or(true)
}

/// Scans from `start` for the `IF`'s matching `ENDIF`/`END_IF`, recording
/// the first top-level `ELSE` seen along the way.
fn find_if_block(lines: &[String], start: usize) -> Result<(Option<usize>, usize)> {
    let mut depth = 1;
    let mut else_line = None;
    for i in start..lines.len() {
        let t = lines[i].trim_start();
        if starts_with_word(t, "IF") {
            depth += 1;
        } else if starts_with_word(t, "ENDIF") || starts_with_word(t, "END_IF") {
            depth -= 1;
            if depth == 0 {
                return Ok((else_line, i));
            }
        } else if depth == 1 && starts_with_word(t, "ELSE") && else_line.is_none() {
            else_line = Some(i);
        }
    }
    Err(crate::error::HidError::UnterminatedBlock("IF"))
}

/// As `find_if_block`, but only cares about the matching terminator (used
/// when a standalone `ELSE` is reached by fallthrough).
fn find_matching_endif(lines: &[String], start: usize) -> Result<usize> {
    let mut depth = 1;
    for i in start..lines.len() {
        let t = lines[i].trim_start();
        if starts_with_word(t, "IF") {
            depth += 1;
        } else if starts_with_word(t, "ENDIF") || starts_with_word(t, "END_IF") {
            depth -= 1;
            if depth == 0 {
                return Ok(i);
            }
        }
    }
    Err(crate::error::HidError::UnterminatedBlock("IF"))
}

fn find_matching_next(lines: &[String], start: usize) -> Result<usize> {
    let mut depth = 1;
    for i in start..lines.len() {
        let t = lines[i].trim_start();
        if starts_with_word(t, "FOR") {
            depth += 1;
        } else if starts_with_word(t, "NEXT") {
            depth -= 1;
            if depth == 0 {
                return Ok(i);
            }
        }
    }
    Err(crate::error::HidError::UnterminatedBlock("FOR"))
}

fn find_end_rem_block(lines: &[String], start: usize) -> Option<usize> {
    (start..lines.len()).find(|&i| lines[i].trim_start().starts_with("END_REM_BLOCK"))
}

fn find_end_function(lines: &[String], start: usize) -> Option<usize> {
    (start..lines.len()).find(|&i| lines[i].trim_start().starts_with("END_FUNCTION"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::EndpointRegistry;
    use std::path::Path;

    fn mock_emitter() -> Emitter {
        Emitter::new(EndpointRegistry::discover_in(Path::new("/nonexistent-dir-for-tests")))
    }

    #[test]
    fn for_loop_iterates_inclusive_range() {
        let emitter = mock_emitter();
        let mut interp = Interpreter::new(&emitter);
        let script = Script::from_reader("FOR $i = 1 TO 3\nSTRING $i\nNEXT\n".as_bytes()).unwrap();
        interp.run(&script).unwrap();
        assert_eq!(interp.vars().get("i", 0), Some("4".to_string()));
    }

    #[test]
    fn var_assignment_evaluates_integer_arithmetic() {
        let emitter = mock_emitter();
        let mut interp = Interpreter::new(&emitter);
        let script = Script::from_reader("VAR $x = 2 + 3\nSTRING x=$x\n".as_bytes()).unwrap();
        interp.run(&script).unwrap();
        assert_eq!(interp.vars().get("x", 0), Some("5".to_string()));
    }

    #[test]
    fn if_else_picks_correct_branch() {
        let emitter = mock_emitter();
        let mut interp = Interpreter::new(&emitter);
        let script = Script::from_reader(
            "IF 1 == 2 THEN\nVAR $r = 1\nELSE\nVAR $r = 2\nENDIF\n".as_bytes(),
        )
        .unwrap();
        interp.run(&script).unwrap();
        assert_eq!(interp.vars().get("r", 0), Some("2".to_string()));
    }

    #[test]
    fn goto_jumps_to_label() {
        let emitter = mock_emitter();
        let mut interp = Interpreter::new(&emitter);
        let script = Script::from_reader(
            "GOTO skip\nVAR $r = 1\n:skip\nVAR $r = 2\n".as_bytes(),
        )
        .unwrap();
        interp.run(&script).unwrap();
        assert_eq!(interp.vars().get("r", 0), Some("2".to_string()));
    }

    #[test]
    fn function_call_returns_to_caller() {
        let emitter = mock_emitter();
        let mut interp = Interpreter::new(&emitter);
        let script = Script::from_reader(
            "greet\nVAR $done = 1\nFUNCTION greet()\nVAR $called = 1\nEND_FUNCTION\n".as_bytes(),
        )
        .unwrap();
        interp.run(&script).unwrap();
        assert_eq!(interp.vars().get("called", 0), Some("1".to_string()));
        assert_eq!(interp.vars().get("done", 0), Some("1".to_string()));
    }

    #[test]
    fn rem_block_is_skipped_entirely() {
        let emitter = mock_emitter();
        let mut interp = Interpreter::new(&emitter);
        let script = Script::from_reader(
            "REM_BLOCK\nVAR $r = 99\nEND_REM_BLOCK\nVAR $r = 1\n".as_bytes(),
        )
        .unwrap();
        interp.run(&script).unwrap();
        assert_eq!(interp.vars().get("r", 0), Some("1".to_string()));
    }

    /// `STRING` must type a word that happens to spell a named key (`UP`,
    /// `ENTER`, ...) literally, character by character, not as one press of
    /// that named key.
    #[test]
    fn string_types_named_key_word_literally() {
        let emitter = Emitter::new(EndpointRegistry::with_memory_sinks());
        let mut interp = Interpreter::new(&emitter);
        let script = Script::from_reader("STRING UP\n".as_bytes()).unwrap();
        interp.run(&script).unwrap();
        let writes = emitter.captured(crate::endpoint::EndpointId::Keyboard);
        // 'U' (shift) press+release, then 'P' (shift) press+release; never
        // the single named-key usage (82) a `type_sequence` call would emit.
        let expected: Vec<[u8; 8]> = vec![
            [0x02, 0, 24, 0, 0, 0, 0, 0],
            [0, 0, 0, 0, 0, 0, 0, 0],
            [0x02, 0, 19, 0, 0, 0, 0, 0],
            [0, 0, 0, 0, 0, 0, 0, 0],
        ];
        assert_eq!(writes.len(), expected.len());
        for (got, want) in writes.iter().zip(expected.iter()) {
            assert_eq!(got.as_slice(), want.as_slice());
        }
    }
}
