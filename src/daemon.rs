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

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde_json::json;
use signal_hook::consts::{SIGINT, SIGTERM};

use crate::config::Config;
use crate::control::Control;
use crate::fans::{FanMode, FanRegistry};
use crate::hwmon;
use crate::logger;
use crate::sensors::SensorRegistry;

/// Delay between the first min-speed write and engine init, so the first
/// cycle has a temperature delta to work with.
const WARMUP: Duration = Duration::from_secs(2);

/// Sleep slice; the interval sleep is chunked so a termination signal is
/// honored promptly instead of after a full polling interval.
const SLEEP_SLICE: Duration = Duration::from_millis(250);

/// Sleep for `total`, waking early when `term` is raised. Returns true if
/// termination was requested.
fn sleep_interruptible(total: Duration, term: &AtomicBool) -> bool {
    let mut remaining = total;
    while remaining > Duration::ZERO {
        if term.load(Ordering::Relaxed) {
            return true;
        }
        let slice = remaining.min(SLEEP_SLICE);
        thread::sleep(slice);
        remaining -= slice;
    }
    term.load(Ordering::Relaxed)
}

fn check_kernel() -> Result<()> {
    if let Some(release) = hwmon::kernel_release() {
        if let Some(major) = hwmon::kernel_major(&release) {
            if major < 3 {
                bail!(
                    "detected a pre-3.x.x linux kernel. Detected version: {}",
                    release
                );
            }
        }
    }
    Ok(())
}

/// Run the control loop until terminated. Fatal startup errors bubble up;
/// SIGTERM/SIGINT restore automatic fan control and return cleanly.
pub fn run(cfg: &Config, platform_root: &Path) -> Result<()> {
    check_kernel()?;

    let term = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGTERM, Arc::clone(&term))
        .context("registering SIGTERM handler")?;
    signal_hook::flag::register(SIGINT, Arc::clone(&term))
        .context("registering SIGINT handler")?;

    let mut sensors = SensorRegistry::discover(platform_root).context("sensor discovery")?;
    let mut fans = FanRegistry::discover(platform_root, cfg).context("fan discovery")?;

    fans.set_mode(FanMode::Manual);

    sensors.refresh();
    let start_temp = sensors.average_temperature();

    fans.apply_speed(cfg.min_fan_speed);

    if logger::verbose() {
        eprintln!("smcfand: sleeping for 2 seconds to get first temp delta");
    }
    if sleep_interruptible(WARMUP, &term) {
        fans.set_mode(FanMode::Auto);
        return Ok(());
    }

    let mut control = Control::from_config(cfg, start_temp);
    let interval = Duration::from_secs(cfg.polling_interval);

    loop {
        sensors.refresh();
        let temp = sensors.average_temperature();
        let base_speed = control.step(temp, cfg);

        if logger::verbose() {
            eprintln!(
                "smcfand: temperature: {:.1} C. base speed: {} RPM",
                temp, base_speed
            );
        }
        logger::log_event(
            "cycle",
            json!({ "temperature": temp, "base_speed": base_speed }),
        );

        fans.apply_speed(base_speed);

        if sleep_interruptible(interval, &term) {
            break;
        }
    }

    eprintln!("smcfand: terminating, restoring automatic fan control");
    logger::log_event("shutdown", json!({}));
    fans.set_mode(FanMode::Auto);
    Ok(())
}
