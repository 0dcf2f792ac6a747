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

//! Temperature-to-base-speed control algorithms.
//!
//! Two interchangeable engines, chosen once at startup: Classic shapes a
//! quadratic ramp between the configured thresholds using triangular
//! numbers; PID tracks `high_temp` as its setpoint while the temperature
//! stays above `low_temp`. Both are pure state machines over the config
//! thresholds; the daemon applies their output to the fan registry.

use serde_json::json;

use crate::config::{Config, PidGains};
use crate::logger;

fn triangular(n: i64) -> i64 {
    n * (n + 1) / 2
}

//
// "Classic" fan control
//

#[derive(Debug)]
pub struct ClassicState {
    step_up: f64,
    step_down: f64,
    fan_speed: i32,
    old_temp: i32,
}

impl ClassicState {
    pub fn new(cfg: &Config, start_temperature: f64) -> Self {
        let span = (cfg.max_fan_speed - cfg.min_fan_speed) as f64;
        let up_steps = triangular((cfg.max_temp - cfg.high_temp) as i64);
        let down_steps = triangular((cfg.max_temp - cfg.low_temp) as i64);

        // A zero divisor means the ramp band is empty; the matching branch
        // in step() can never fire, so the step size is irrelevant.
        Self {
            step_up: if up_steps == 0 { 0.0 } else { span / up_steps as f64 },
            step_down: if down_steps == 0 { 0.0 } else { span / down_steps as f64 },
            fan_speed: cfg.min_fan_speed,
            old_temp: start_temperature as i32,
        }
    }

    /// One control step. The fractional part of the temperature is
    /// intentionally dropped; the ramp works on whole degrees.
    pub fn step(&mut self, temperature: f64, cfg: &Config) -> i32 {
        let new_temp = temperature as i32;
        let temp_change = new_temp - self.old_temp;
        self.old_temp = new_temp;

        let speed = if new_temp >= cfg.max_temp {
            cfg.max_fan_speed
        } else if new_temp <= cfg.low_temp {
            cfg.min_fan_speed
        } else if temp_change > 0 && new_temp > cfg.high_temp && new_temp < cfg.max_temp {
            let steps = triangular((new_temp - cfg.high_temp) as i64) as f64;
            self.fan_speed
                .max((cfg.min_fan_speed as f64 + steps * self.step_up).ceil() as i32)
        } else if temp_change < 0 && new_temp > cfg.low_temp && new_temp < cfg.max_temp {
            let steps = triangular((cfg.max_temp - new_temp) as i64) as f64;
            self.fan_speed
                .min((cfg.max_fan_speed as f64 - steps * self.step_down).floor() as i32)
        } else {
            cfg.min_fan_speed
        };

        self.fan_speed = speed;
        speed
    }
}

//
// PID fan control
//

#[derive(Debug)]
pub struct PidState {
    gains: PidGains,
    error_prior: f64,
    integral: f64,
    last_speed: i32,
}

impl PidState {
    pub fn new(gains: PidGains) -> Self {
        Self {
            gains,
            error_prior: 0.0,
            integral: 0.0,
            last_speed: 0,
        }
    }

    /// One control step. Active above `low_temp` with `high_temp` as the
    /// target; leaving the active band discards the accumulated state so
    /// the integral cannot wind up while the fans idle.
    pub fn step(&mut self, temperature: f64, cfg: &Config) -> i32 {
        if temperature > cfg.low_temp as f64 {
            let error = temperature - cfg.high_temp as f64;
            self.integral += error * cfg.polling_interval as f64;

            let p = (self.gains.kp as f64 * error) as i32;
            let i = (self.gains.ki as f64 * self.integral) as i32;
            let d = (self.gains.kd as f64 * (error - self.error_prior)
                / cfg.polling_interval as f64) as i32;

            // min_fan_speed is the bias
            let new_speed = (cfg.min_fan_speed + p + i + d).max(cfg.min_fan_speed);
            if logger::verbose() {
                eprintln!(
                    "smcfand: PID: error {:.1}C. P={} I={} D={} -> {} RPM ({:+} RPM)",
                    error,
                    p,
                    i,
                    d,
                    new_speed,
                    new_speed - self.last_speed
                );
            }

            self.last_speed = new_speed;
            self.error_prior = error;
        } else {
            self.last_speed = cfg.min_fan_speed;
            self.integral = 0.0;
            self.error_prior = 0.0;
        }

        self.last_speed
    }

    pub fn last_speed(&self) -> i32 {
        self.last_speed
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn error_prior(&self) -> f64 {
        self.error_prior
    }
}

/// The active control engine, selected once at startup by the presence of
/// PID gains in the configuration and never switched afterwards.
#[derive(Debug)]
pub enum Control {
    Classic(ClassicState),
    Pid(PidState),
}

impl Control {
    pub fn from_config(cfg: &Config, start_temperature: f64) -> Self {
        match cfg.pid {
            Some(gains) => {
                eprintln!(
                    "smcfand: PID control initialized. Kp={:.1} Ki={:.1} Kd={:.1}",
                    gains.kp, gains.ki, gains.kd
                );
                logger::log_event(
                    "control_init",
                    json!({ "algorithm": "pid", "kp": gains.kp, "ki": gains.ki, "kd": gains.kd }),
                );
                Control::Pid(PidState::new(gains))
            }
            None => {
                eprintln!("smcfand: classic control initialized.");
                logger::log_event(
                    "control_init",
                    json!({ "algorithm": "classic", "start_temperature": start_temperature }),
                );
                Control::Classic(ClassicState::new(cfg, start_temperature))
            }
        }
    }

    pub fn step(&mut self, temperature: f64, cfg: &Config) -> i32 {
        match self {
            Control::Classic(state) => state.step(temperature, cfg),
            Control::Pid(state) => state.step(temperature, cfg),
        }
    }
}
