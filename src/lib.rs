/*
 * This file is part of smcfand.
 *
 * Copyright (C) 2026 smcfand contributors
 *
 * smcfand is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * smcfand is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with smcfand. If not, see <https://www.gnu.org/licenses/>.
 */

//! smcfand - closed-loop fan control for MacBook hardware
//!
//! Polls coretemp temperature sensors, computes a target base fan speed
//! with a threshold-ramp or PID controller, and drives applesmc fans in
//! manual mode for the lifetime of the process.

pub mod config;
pub mod control;
pub mod daemon;
pub mod fans;
pub mod hwmon;
pub mod logger;
pub mod sensors;
