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

//! US keyboard usage table. Values are HID keyboard/keypad usage codes;
//! `0` means unmapped. Index is the ASCII code point.

#[rustfmt::skip]
pub const USAGE_TABLE: [u8; 128] = [
    0,  0,  0,  0,  0,  0,  0,  0,
    42, 43, 40, 0,  0,  0,  0,  0,
    0,  0,  0,  0,  0,  0,  0,  0,
    0,  0,  0,  41, 0,  0,  0,  0,
    // 32-39: SPACE ! " # $ % & '
    44, 30, 52, 32, 33, 34, 35, 52,
    // 40-47: ( ) * + , - . /
    38, 39, 37, 46, 54, 45, 55, 56,
    // 48-55: 0-7
    39, 30, 31, 32, 33, 34, 35, 36,
    // 56-63: 8 9 : ; < = > ?
    37, 38, 51, 51, 54, 46, 55, 56,
    // 64-71: @ A-G
    31, 4,  5,  6,  7,  8,  9,  10,
    // 72-79: H-O
    11, 12, 13, 14, 15, 16, 17, 18,
    // 80-87: P-W
    19, 20, 21, 22, 23, 24, 25, 26,
    // 88-95: X Y Z [ \ ] ^ _
    27, 28, 29, 47, 49, 48, 33, 38,
    // 96-103: ` a-g
    53, 4,  5,  6,  7,  8,  9,  10,
    // 104-111: h-o
    11, 12, 13, 14, 15, 16, 17, 18,
    // 112-119: p-w
    19, 20, 21, 22, 23, 24, 25, 26,
    // 120-127: x y z { | } ~ DEL
    27, 28, 29, 47, 49, 48, 53, 0,
];

/// Characters whose production requires SHIFT to be held.
pub const SHIFT_REQUIRED: &str = "!@#$%^&*()_+{}|:\"<>?~ABCDEFGHIJKLMNOPQRSTUVWXYZ";

pub fn requires_shift(c: char) -> bool {
    SHIFT_REQUIRED.contains(c)
}
