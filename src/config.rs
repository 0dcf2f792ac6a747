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

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logger;

pub fn default_config_path() -> PathBuf {
    PathBuf::from("/etc/smcfand/config.json")
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid fan speeds: min_fan_speed {min}, max_fan_speed {max}")]
    InvalidFanSpeeds { min: i32, max: i32 },
    #[error("invalid temperatures: low_temp {low}, high_temp {high}, max_temp {max}")]
    InvalidTemperatures { low: i32, high: i32, max: i32 },
    #[error("invalid per-fan speeds for fan #{index}: min {min}, max {max}")]
    InvalidPerFanSpeeds { index: usize, min: i32, max: i32 },
}

/// PID gains. Presence of this object in the config switches the control
/// engine from Classic to PID at startup.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

/// Per-fan tuning resolved from the config vectors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FanTuning {
    pub ratio: f32,
    pub min_speed: i32,
    pub max_speed: i32,
}

// Unknown keys are ignored so a misspelled setting cannot take the whole
// file down with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base speed bounds in RPM.
    #[serde(default = "default_min_fan_speed")]
    pub min_fan_speed: i32,
    #[serde(default = "default_max_fan_speed")]
    pub max_fan_speed: i32,
    /// Temperature thresholds in degrees Celsius:
    /// below low_temp the fans run at minimum, above high_temp they ramp,
    /// above max_temp they run at full speed.
    #[serde(default = "default_low_temp")]
    pub low_temp: i32,
    #[serde(default = "default_high_temp")]
    pub high_temp: i32,
    #[serde(default = "default_max_temp")]
    pub max_temp: i32,
    /// Seconds between control cycles.
    #[serde(default = "default_polling_interval")]
    pub polling_interval: u64,
    /// Fan names matched against hardware labels. Empty means "drive every
    /// fan the hardware reports".
    #[serde(default)]
    pub fan_list: Vec<String>,
    /// Per-fan tuning vectors, indexed like fan_list. Missing entries fall
    /// back to ratio 1.0 and the global speed bounds.
    #[serde(default)]
    pub fan_ratios: Vec<f32>,
    #[serde(default)]
    pub fan_min_speeds: Vec<i32>,
    #[serde(default)]
    pub fan_max_speeds: Vec<i32>,
    #[serde(default)]
    pub pid: Option<PidGains>,
}

fn default_min_fan_speed() -> i32 {
    2000
}
fn default_max_fan_speed() -> i32 {
    6200
}
fn default_low_temp() -> i32 {
    63
}
fn default_high_temp() -> i32 {
    66
}
fn default_max_temp() -> i32 {
    86
}
fn default_polling_interval() -> u64 {
    7
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_fan_speed: default_min_fan_speed(),
            max_fan_speed: default_max_fan_speed(),
            low_temp: default_low_temp(),
            high_temp: default_high_temp(),
            max_temp: default_max_temp(),
            polling_interval: default_polling_interval(),
            fan_list: Vec::new(),
            fan_ratios: Vec::new(),
            fan_min_speeds: Vec::new(),
            fan_max_speeds: Vec::new(),
            pid: None,
        }
    }
}

impl Config {
    /// Tuning for the fan at `index` in fan_list order. Ratios are floored
    /// at 0.1 so a typo cannot park a fan.
    pub fn fan_tuning(&self, index: usize) -> FanTuning {
        FanTuning {
            ratio: self.fan_ratios.get(index).copied().unwrap_or(1.0).max(0.1),
            min_speed: self
                .fan_min_speeds
                .get(index)
                .copied()
                .unwrap_or(self.min_fan_speed),
            max_speed: self
                .fan_max_speeds
                .get(index)
                .copied()
                .unwrap_or(self.max_fan_speed),
        }
    }
}

pub fn validate_config(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.min_fan_speed > cfg.max_fan_speed {
        return Err(ConfigError::InvalidFanSpeeds {
            min: cfg.min_fan_speed,
            max: cfg.max_fan_speed,
        });
    }
    if cfg.low_temp > cfg.high_temp || cfg.high_temp > cfg.max_temp {
        return Err(ConfigError::InvalidTemperatures {
            low: cfg.low_temp,
            high: cfg.high_temp,
            max: cfg.max_temp,
        });
    }
    let per_fan = cfg.fan_min_speeds.len().max(cfg.fan_max_speeds.len());
    for index in 0..per_fan {
        let tuning = cfg.fan_tuning(index);
        if tuning.min_speed > tuning.max_speed {
            return Err(ConfigError::InvalidPerFanSpeeds {
                index,
                min: tuning.min_speed,
                max: tuning.max_speed,
            });
        }
    }
    Ok(())
}

/// Load the configuration. A missing or unparsable file falls back to the
/// built-in defaults; a file that parses but violates the speed/threshold
/// ordering is fatal.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let cfg = match fs::read_to_string(path) {
        Err(_) => {
            if logger::verbose() {
                eprintln!("smcfand: couldn't open configfile, using defaults");
            }
            Config::default()
        }
        Ok(data) => match serde_json::from_str::<Config>(&data) {
            Ok(cfg) => cfg,
            Err(e) => {
                // Running on default thresholds changes thermal behavior;
                // always say so.
                eprintln!(
                    "smcfand: couldn't read configfile {} ({}), using defaults",
                    path.display(),
                    e
                );
                Config::default()
            }
        },
    };
    validate_config(&cfg)?;
    Ok(cfg)
}
