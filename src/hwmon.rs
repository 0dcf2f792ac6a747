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

use std::ffi::CStr;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Platform device root under which coretemp and applesmc live.
pub const DEFAULT_PLATFORM_ROOT: &str = "/sys/devices/platform";

/// Upper bound of sensor endpoint indices probed during discovery.
pub const MAX_SENSOR_PROBE: usize = 10;
/// Upper bound of fan label endpoints probed during discovery.
pub const MAX_SEARCH_FANS: usize = 16;

#[derive(Error, Debug)]
pub enum HwmonError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("no temperature sensors detected under {0}")]
    NoSensors(PathBuf),
    #[error("no fans configured or discovered")]
    NoFans,
    #[error("unable to find ID of fan '{0}'")]
    UnresolvedFan(String),
    #[error("fans '{first}' and '{second}' both resolve to fan{id}")]
    DuplicateFanId {
        first: String,
        second: String,
        id: usize,
    },
    #[error("unable to open '{path}': {source}")]
    OpenOutput { path: PathBuf, source: io::Error },
}

pub fn read_trimmed<P: AsRef<Path>>(p: P) -> io::Result<String> {
    let mut s = String::new();
    fs::File::open(p)?.read_to_string(&mut s)?;
    Ok(s.trim().to_string())
}

/// Resolve the coretemp temperature path prefix. Newer kernels nest the
/// endpoints in a hwmon subdirectory; older ones expose them directly
/// under coretemp.0. The choice is made once by probing, and discovery
/// appends `{index}_input` to the returned prefix.
pub fn coretemp_temp_prefix(platform_root: &Path) -> PathBuf {
    let coretemp = platform_root.join("coretemp.0");

    for counter in 0..MAX_SENSOR_PROBE {
        let hwmon_dir = coretemp.join("hwmon").join(format!("hwmon{}", counter));
        if hwmon_dir.is_dir() {
            if crate::logger::verbose() {
                eprintln!("smcfand: found hwmon path at {}", hwmon_dir.display());
            }
            return hwmon_dir.join("temp");
        }
    }

    if crate::logger::verbose() {
        eprintln!("smcfand: using legacy coretemp layout");
    }
    coretemp.join("temp")
}

/// Kernel release string from uname, e.g. "6.8.0-generic".
pub fn kernel_release() -> Option<String> {
    let mut uts: libc::utsname = unsafe { std::mem::zeroed() };
    if unsafe { libc::uname(&mut uts) } != 0 {
        return None;
    }
    let release = unsafe { CStr::from_ptr(uts.release.as_ptr()) };
    release.to_str().ok().map(|s| s.to_string())
}

/// Major version parsed from a kernel release string.
pub fn kernel_major(release: &str) -> Option<u32> {
    release.split('.').next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_read_trimmed_strips_whitespace() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("value");
        let mut f = fs::File::create(&file).unwrap();
        writeln!(f, "  65000  ").unwrap();
        assert_eq!(read_trimmed(&file).unwrap(), "65000");
    }

    #[test]
    fn test_read_trimmed_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(read_trimmed(dir.path().join("nope")).is_err());
    }

    #[test]
    fn test_coretemp_prefix_modern_layout() {
        let dir = TempDir::new().unwrap();
        let hwmon = dir.path().join("coretemp.0/hwmon/hwmon2");
        fs::create_dir_all(&hwmon).unwrap();
        assert_eq!(coretemp_temp_prefix(dir.path()), hwmon.join("temp"));
    }

    #[test]
    fn test_coretemp_prefix_legacy_layout() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("coretemp.0")).unwrap();
        assert_eq!(
            coretemp_temp_prefix(dir.path()),
            dir.path().join("coretemp.0/temp")
        );
    }

    #[test]
    fn test_kernel_major_parsing() {
        assert_eq!(kernel_major("6.8.0-generic"), Some(6));
        assert_eq!(kernel_major("3.10.0"), Some(3));
        assert_eq!(kernel_major("garbage"), None);
    }

    #[test]
    fn test_kernel_release_available() {
        // uname should work anywhere these tests run
        let release = kernel_release().unwrap();
        assert!(!release.is_empty());
    }
}
