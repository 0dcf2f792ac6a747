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

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use serde_json::json;

use crate::config::{Config, FanTuning};
use crate::hwmon::{HwmonError, MAX_SEARCH_FANS};
use crate::logger;

const APPLESMC_DIR: &str = "applesmc.768";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanMode {
    Auto,
    Manual,
}

impl FanMode {
    fn as_flag(self) -> &'static str {
        match self {
            FanMode::Auto => "0",
            FanMode::Manual => "1",
        }
    }
}

/// One controllable fan. The output handle stays open for the process
/// lifetime; the manual-mode file is opened per write since some fans
/// lack it entirely.
#[derive(Debug)]
pub struct Fan {
    pub name: String,
    pub fan_id: usize,
    output: File,
    manual_path: PathBuf,
    tuning: FanTuning,
    last_speed: Option<i32>,
}

impl Fan {
    pub fn tuning(&self) -> FanTuning {
        self.tuning
    }

    pub fn last_speed(&self) -> Option<i32> {
        self.last_speed
    }
}

/// Base speed scaled by the fan's ratio and clamped to its bounds.
pub fn effective_speed(tuning: FanTuning, base_speed: i32) -> i32 {
    (base_speed as f32 * tuning.ratio)
        .min(tuning.max_speed as f32)
        .max(tuning.min_speed as f32) as i32
}

/// Hardware labels indexed by fan id, `fan{0..16}_label`. Trailing
/// whitespace and control bytes are stripped; a missing label file leaves
/// a hole so indices keep matching hardware ids.
fn read_fan_labels(applesmc: &Path) -> Vec<Option<String>> {
    let mut labels = Vec::with_capacity(MAX_SEARCH_FANS);
    for counter in 0..MAX_SEARCH_FANS {
        let path = applesmc.join(format!("fan{}_label", counter));
        let label = File::open(&path).ok().and_then(|mut f| {
            let mut raw = String::new();
            f.read_to_string(&mut raw).ok()?;
            let trimmed = raw.trim_end_matches(|c: char| c.is_whitespace() || c.is_control());
            Some(trimmed.to_string())
        });
        labels.push(label);
    }
    labels
}

fn write_speed(file: &File, rpm: i32) -> io::Result<()> {
    file.write_at(rpm.to_string().as_bytes(), 0)?;
    Ok(())
}

#[derive(Debug)]
pub struct FanRegistry {
    fans: Vec<Fan>,
}

impl FanRegistry {
    /// Resolve every configured fan name against the hardware label set
    /// and open its output endpoint. An empty configured list drives every
    /// labelled fan the hardware reports. Resolution is exact-match,
    /// first label wins; an unresolved name or two names landing on the
    /// same hardware id is fatal, as is an unopenable output file.
    pub fn discover(platform_root: &Path, cfg: &Config) -> Result<Self, HwmonError> {
        let applesmc = platform_root.join(APPLESMC_DIR);
        let labels = read_fan_labels(&applesmc);

        let names: Vec<String> = if cfg.fan_list.is_empty() {
            labels.iter().flatten().cloned().collect()
        } else {
            cfg.fan_list.clone()
        };

        if names.is_empty() {
            return Err(HwmonError::NoFans);
        }

        let mut fans: Vec<Fan> = Vec::with_capacity(names.len());
        for (index, name) in names.iter().enumerate() {
            let fan_id = labels
                .iter()
                .position(|label| label.as_deref() == Some(name.as_str()))
                .ok_or_else(|| HwmonError::UnresolvedFan(name.clone()))?;

            if let Some(prev) = fans.iter().find(|f| f.fan_id == fan_id) {
                return Err(HwmonError::DuplicateFanId {
                    first: prev.name.clone(),
                    second: name.clone(),
                    id: fan_id,
                });
            }

            let output_path = applesmc.join(format!("fan{}_output", fan_id));
            let output = OpenOptions::new()
                .write(true)
                .open(&output_path)
                .map_err(|source| HwmonError::OpenOutput {
                    path: output_path,
                    source,
                })?;

            fans.push(Fan {
                name: name.clone(),
                fan_id,
                output,
                manual_path: applesmc.join(format!("fan{}_manual", fan_id)),
                tuning: cfg.fan_tuning(index),
                last_speed: None,
            });
        }

        if logger::verbose() {
            for fan in &fans {
                eprintln!(
                    "smcfand: {:>9}: fan{}, ratio {:.1}, min {:4} RPM, max {:4} RPM",
                    fan.name, fan.fan_id, fan.tuning.ratio, fan.tuning.min_speed, fan.tuning.max_speed
                );
            }
        }
        logger::log_event(
            "fan_discovery",
            json!({
                "fans": fans.iter().map(|f| json!({
                    "name": f.name,
                    "fan_id": f.fan_id,
                    "ratio": f.tuning.ratio,
                    "min_speed": f.tuning.min_speed,
                    "max_speed": f.tuning.max_speed,
                })).collect::<Vec<_>>(),
            }),
        );

        Ok(Self { fans })
    }

    /// Flip every fan between automatic and manual control. A fan whose
    /// mode file is absent is skipped; not every fan exposes one.
    pub fn set_mode(&self, mode: FanMode) {
        for fan in &self.fans {
            let opened = OpenOptions::new().write(true).open(&fan.manual_path);
            match opened {
                Ok(mut file) => {
                    let _ = file.write_all(mode.as_flag().as_bytes());
                }
                Err(_) => {
                    if logger::verbose() {
                        eprintln!(
                            "smcfand: no mode file for fan{}, skipping",
                            fan.fan_id
                        );
                    }
                }
            }
        }
    }

    /// Apply one base speed to every fan, per-fan scaled and clamped.
    /// Writes are suppressed while the effective value is unchanged; a
    /// failed write keeps the cache stale so the next cycle retries.
    pub fn apply_speed(&mut self, base_speed: i32) {
        for fan in &mut self.fans {
            let effective = effective_speed(fan.tuning, base_speed);
            if fan.last_speed == Some(effective) {
                continue;
            }
            match write_speed(&fan.output, effective) {
                Ok(()) => {
                    fan.last_speed = Some(effective);
                    logger::log_event(
                        "fan_write",
                        json!({
                            "fan_id": fan.fan_id,
                            "base": base_speed,
                            "effective": effective,
                        }),
                    );
                }
                Err(e) => {
                    if logger::verbose() {
                        eprintln!("smcfand: could not set speed of fan{}: {}", fan.fan_id, e);
                    }
                    logger::log_event(
                        "fan_write_failed",
                        json!({ "fan_id": fan.fan_id, "error": e.to_string() }),
                    );
                }
            }
        }
    }

    pub fn fans(&self) -> &[Fan] {
        &self.fans
    }

    pub fn len(&self) -> usize {
        self.fans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fans.is_empty()
    }
}
