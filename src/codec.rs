/*
 * This file is part of lm83.
 *
 * Copyright (C) 2025 lm83 contributors
 *
 * lm83 is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * lm83 is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with lm83. If not, see <https://www.gnu.org/licenses/>.
 */

//! Temperature register encoding
//!
//! LM83 temperatures are plain two's-complement bytes in whole degrees
//! Celsius. There is no fractional part to preserve.

/// Highest temperature the chip can represent; also the power-on alarm limit
pub const TEMP_MAX: i32 = 127;
/// Lowest temperature the chip can represent
pub const TEMP_MIN: i32 = -128;

/// Decode a raw register byte into degrees Celsius
pub fn temp_from_reg(raw: u8) -> i32 {
    if raw > 127 {
        i32::from(raw) - 256
    } else {
        i32::from(raw)
    }
}

/// Encode degrees Celsius into a raw register byte
///
/// Values outside the chip's range are clamped first.
pub fn temp_to_reg(degrees: i32) -> u8 {
    let degrees = degrees.clamp(TEMP_MIN, TEMP_MAX);
    if degrees < 0 {
        (degrees + 256) as u8
    } else {
        degrees as u8
    }
}
