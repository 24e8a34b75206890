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

//! Monotonic time source for cache ageing

use std::time::Instant;

/// Injected time source so cache expiry can be driven from tests
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// The host's monotonic clock
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
