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

//! `$name` substitution and condition evaluation. Both operate on plain
//! strings; there is no expression AST.

use crate::vars::VarTable;

/// Replaces every resolvable `$name` token with its value, repeating until
/// a pass makes no further substitution. Tokens that never resolve are left
/// as `$name` in the output.
pub fn substitute(s: &str, vars: &VarTable, led_byte: u8) -> String {
    let mut current = s.to_string();
    loop {
        let (next, changed) = substitute_pass(&current, vars, led_byte);
        if !changed {
            return next;
        }
        current = next;
    }
}

fn substitute_pass(s: &str, vars: &VarTable, led_byte: u8) -> (String, bool) {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut changed = false;
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '$' {
            let start = i + 1;
            let mut end = start;
            while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_') {
                end += 1;
            }
            if end > start {
                let name: String = chars[start..end].iter().collect();
                if let Some(value) = vars.get(&name, led_byte) {
                    out.push_str(&value);
                    changed = true;
                    i = end;
                    continue;
                }
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    (out, changed)
}

/// Substitutes, then evaluates as a logical/relational expression. `&&` is
/// checked for before `||` at every level, matching the line-oriented
/// original rather than a general-purpose precedence grammar.
pub fn eval(cond: &str, vars: &VarTable, led_byte: u8) -> bool {
    let substituted = substitute(cond, vars, led_byte);
    eval_expr(&substituted)
}

fn eval_expr(s: &str) -> bool {
    if let Some(idx) = s.find(" && ") {
        let (lhs, rhs) = (&s[..idx], &s[idx + 4..]);
        return eval_expr(lhs) && eval_expr(rhs);
    }
    if let Some(idx) = s.find(" || ") {
        let (lhs, rhs) = (&s[..idx], &s[idx + 4..]);
        return eval_expr(lhs) || eval_expr(rhs);
    }
    eval_leaf(s.trim())
}

const RELATIONAL_OPS: [&str; 6] = ["==", "!=", ">=", "<=", ">", "<"];

fn eval_leaf(s: &str) -> bool {
    if s.eq_ignore_ascii_case("true") {
        return true;
    }
    if s.eq_ignore_ascii_case("false") {
        return false;
    }
    for op in RELATIONAL_OPS.iter() {
        if let Some(idx) = s.find(op) {
            let lhs = s[..idx].trim();
            let rhs = s[idx + op.len()..].trim();
            return match *op {
                "==" => lhs == rhs,
                "!=" => lhs != rhs,
                ">" => atoi(lhs) > atoi(rhs),
                "<" => atoi(lhs) < atoi(rhs),
                ">=" => atoi(lhs) >= atoi(rhs),
                "<=" => atoi(lhs) <= atoi(rhs),
                _ => unreachable!(),
            };
        }
    }
    atoi(s) != 0
}

/// `atoi`-style: skips leading whitespace, an optional sign, then consumes
/// leading digits; `0` if nothing parses. Used for both relational leaves
/// and `VAR`/`FOR` integer arithmetic.
pub fn atoi(s: &str) -> i64 {
    let s = s.trim_start();
    let mut chars = s.chars().peekable();
    let mut sign = 1i64;
    if let Some(&c) = chars.peek() {
        if c == '-' {
            sign = -1;
            chars.next();
        } else if c == '+' {
            chars.next();
        }
    }
    let mut value: i64 = 0;
    let mut any = false;
    for c in chars {
        if let Some(d) = c.to_digit(10) {
            any = true;
            value = value.saturating_mul(10).saturating_add(d as i64);
        } else {
            break;
        }
    }
    if any {
        sign * value
    } else {
        0
    }
}

/// Consumes a leading `[+-]?[0-9]+` token, returning its value and how many
/// bytes of `s` it occupied. `None` if `s` doesn't start with a digit (after
/// an optional sign).
fn leading_integer(s: &str) -> Option<(i64, usize)> {
    let bytes = s.as_bytes();
    let mut i = 0;
    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }
    let digits_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == digits_start {
        return None;
    }
    Some((atoi(&s[..i]), i))
}

/// Parses `INT OP INT` with `OP in {+,-,*,/}` (integer division, `/0 -> 0`).
/// Returns `None` when the text doesn't match that exact shape, so the
/// caller can fall back to treating it as plain substituted text. Ported
/// from `sscanf(expr, "%d %c %d", ...)`: both integers are read as leading
/// tokens rather than located by searching for the operator character, so a
/// negative left operand (`-5 - 3`) doesn't get its sign mistaken for the
/// operator.
pub fn try_eval_arithmetic(s: &str) -> Option<i64> {
    let s = s.trim();
    let (lhs, consumed) = leading_integer(s)?;
    let rest = s[consumed..].trim_start();
    let mut chars = rest.chars();
    let op = chars.next()?;
    if !matches!(op, '+' | '-' | '*' | '/') {
        return None;
    }
    let after_op = chars.as_str().trim_start();
    let (rhs, _) = leading_integer(after_op)?;
    Some(match op {
        '+' => lhs + rhs,
        '-' => lhs - rhs,
        '*' => lhs * rhs,
        '/' => if rhs == 0 { 0 } else { lhs / rhs },
        _ => unreachable!(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitute_resolves_script_variable() {
        let vars = VarTable::with_seed(1);
        vars.set("x", "5");
        assert_eq!(substitute("value=$x", &vars, 0), "value=5");
    }

    #[test]
    fn substitute_leaves_unresolved_tokens_verbatim() {
        let vars = VarTable::with_seed(1);
        assert_eq!(substitute("hi $nope bye", &vars, 0), "hi $nope bye");
    }

    #[test]
    fn substitute_terminates_on_chained_variables() {
        let vars = VarTable::with_seed(1);
        vars.set("a", "$b");
        vars.set("b", "final");
        assert_eq!(substitute("$a", &vars, 0), "final");
    }

    #[test]
    fn relational_operators_compare_as_integers() {
        assert!(eval_expr("5 > 3"));
        assert!(!eval_expr("5 < 3"));
        assert!(eval_expr("5 >= 5"));
        assert!(eval_expr("3 <= 5"));
    }

    #[test]
    fn equality_compares_as_strings() {
        assert!(eval_expr("abc == abc"));
        assert!(eval_expr("abc != abd"));
        assert!(!eval_expr("007 == 7"));
    }

    #[test]
    fn and_binds_before_or_left_to_right() {
        assert!(eval_expr("TRUE && TRUE || FALSE"));
        assert!(!eval_expr("FALSE && TRUE"));
        assert!(eval_expr("FALSE || TRUE"));
    }

    #[test]
    fn bare_leaf_uses_integer_truthiness() {
        assert!(eval_expr("1"));
        assert!(!eval_expr("0"));
        assert!(!eval_expr("nonnumeric"));
    }

    #[test]
    fn atoi_handles_sign_and_garbage_suffix() {
        assert_eq!(atoi("42"), 42);
        assert_eq!(atoi("-7"), -7);
        assert_eq!(atoi("12abc"), 12);
        assert_eq!(atoi("abc"), 0);
    }

    #[test]
    fn arithmetic_handles_division_by_zero() {
        assert_eq!(try_eval_arithmetic("6 / 0"), Some(0));
        assert_eq!(try_eval_arithmetic("2 + 3"), Some(5));
        assert_eq!(try_eval_arithmetic("not an expr"), None);
    }

    #[test]
    fn arithmetic_handles_negative_left_operand() {
        assert_eq!(try_eval_arithmetic("-5 - 3"), Some(-8));
        assert_eq!(try_eval_arithmetic("-5 + 3"), Some(-2));
        assert_eq!(try_eval_arithmetic("-5 * -3"), Some(15));
    }
}
