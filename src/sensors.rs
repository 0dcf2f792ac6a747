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

use std::fs::File;
use std::io;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use serde_json::json;

use crate::hwmon::{self, HwmonError, MAX_SENSOR_PROBE};
use crate::logger;

/// One readable temperature endpoint. The handle stays open for the
/// process lifetime and is re-read in place every cycle.
#[derive(Debug)]
pub struct Sensor {
    path: PathBuf,
    file: File,
    /// Last observed value in millidegrees Celsius.
    pub temperature: i64,
}

#[derive(Debug)]
pub struct SensorRegistry {
    sensors: Vec<Sensor>,
}

fn read_millidegrees(file: &File) -> io::Result<i64> {
    let mut buf = [0u8; 16];
    let n = file.read_at(&mut buf, 0)?;
    let s = std::str::from_utf8(&buf[..n])
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    s.trim()
        .parse()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

impl SensorRegistry {
    /// Probe `temp{0..10}_input` under the resolved coretemp prefix and
    /// open every endpoint that exists. Zero sensors is fatal.
    pub fn discover(platform_root: &Path) -> Result<Self, HwmonError> {
        let prefix = hwmon::coretemp_temp_prefix(platform_root);
        let mut sensors = Vec::new();

        for counter in 0..MAX_SENSOR_PROBE {
            let path = PathBuf::from(format!("{}{}_input", prefix.display(), counter));
            let Ok(file) = File::open(&path) else { continue };
            let temperature = read_millidegrees(&file).unwrap_or(0);
            sensors.push(Sensor {
                path,
                file,
                temperature,
            });
        }

        if logger::verbose() {
            eprintln!("smcfand: found {} sensors", sensors.len());
        }
        if sensors.is_empty() {
            return Err(HwmonError::NoSensors(platform_root.to_path_buf()));
        }

        logger::log_event(
            "sensor_discovery",
            json!({
                "count": sensors.len(),
                "paths": sensors.iter().map(|s| s.path.display().to_string()).collect::<Vec<_>>(),
            }),
        );
        Ok(Self { sensors })
    }

    /// Re-read every endpoint in place. An endpoint that fails to read
    /// keeps its last value; stale data beats a dead control loop.
    pub fn refresh(&mut self) {
        for sensor in &mut self.sensors {
            match read_millidegrees(&sensor.file) {
                Ok(value) => sensor.temperature = value,
                Err(e) => {
                    if logger::verbose() {
                        eprintln!(
                            "smcfand: sensor {} unreadable ({}), keeping last value",
                            sensor.path.display(),
                            e
                        );
                    }
                }
            }
        }
    }

    /// Average of the raw milli-degree readings, in degrees Celsius. The
    /// divisor floors at one sensor; an empty registry cannot exist after
    /// a successful discover, so this is a degenerate-input guard only.
    pub fn average_temperature(&self) -> f64 {
        let sum: i64 = self.sensors.iter().map(|s| s.temperature).sum();
        sum as f64 / (self.sensors.len().max(1) * 1000) as f64
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fake_platform(temps: &[i64]) -> TempDir {
        let dir = TempDir::new().unwrap();
        let hwmon = dir.path().join("coretemp.0/hwmon/hwmon0");
        fs::create_dir_all(&hwmon).unwrap();
        for (i, t) in temps.iter().enumerate() {
            fs::write(hwmon.join(format!("temp{}_input", i + 1)), format!("{}\n", t)).unwrap();
        }
        dir
    }

    #[test]
    fn test_discover_modern_layout() {
        let dir = fake_platform(&[65000, 67000]);
        let registry = SensorRegistry::discover(dir.path()).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_discover_legacy_layout() {
        let dir = TempDir::new().unwrap();
        let coretemp = dir.path().join("coretemp.0");
        fs::create_dir_all(&coretemp).unwrap();
        fs::write(coretemp.join("temp2_input"), "54000\n").unwrap();
        let registry = SensorRegistry::discover(dir.path()).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.average_temperature(), 54.0);
    }

    #[test]
    fn test_discover_no_sensors_is_fatal() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("coretemp.0")).unwrap();
        assert!(matches!(
            SensorRegistry::discover(dir.path()),
            Err(HwmonError::NoSensors(_))
        ));
    }

    #[test]
    fn test_average_temperature() {
        let dir = fake_platform(&[65000, 67000]);
        let registry = SensorRegistry::discover(dir.path()).unwrap();
        assert_eq!(registry.average_temperature(), 66.0);
    }

    #[test]
    fn test_refresh_picks_up_new_values() {
        let dir = fake_platform(&[60000]);
        let mut registry = SensorRegistry::discover(dir.path()).unwrap();
        assert_eq!(registry.average_temperature(), 60.0);

        let input = dir.path().join("coretemp.0/hwmon/hwmon0/temp1_input");
        fs::write(&input, "72000\n").unwrap();
        registry.refresh();
        assert_eq!(registry.average_temperature(), 72.0);
    }

    #[test]
    fn test_refresh_keeps_stale_value_on_bad_read() {
        let dir = fake_platform(&[60000]);
        let mut registry = SensorRegistry::discover(dir.path()).unwrap();

        let input = dir.path().join("coretemp.0/hwmon/hwmon0/temp1_input");
        fs::write(&input, "not a number\n").unwrap();
        registry.refresh();
        assert_eq!(registry.average_temperature(), 60.0);
    }
}
