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

mod config;
mod control;
mod daemon;
mod fans;
mod hwmon;
mod logger;
mod sensors;

use std::path::{Path, PathBuf};

fn main() {
    // Check if running as root
    if unsafe { libc::geteuid() } != 0 {
        eprintln!("Error: smcfand requires root privileges to control fans.");
        eprintln!(
            "Please run with: sudo {}",
            std::env::args().next().unwrap_or_else(|| "smcfand".to_string())
        );
        std::process::exit(1);
    }

    // Gather args once
    let args: Vec<String> = std::env::args().collect();

    logger::set_verbose(args.iter().any(|a| a == "-v" || a == "--verbose"));

    // Optional logging to /etc/smcfand/logs.json
    if args.iter().any(|a| a == "--logging") {
        logger::init_logging();
        logger::log_event("startup", serde_json::json!({ "args": args }));
    }

    // Config file override: -f FILE or --config FILE
    let mut config_path: Option<PathBuf> = None;
    for (i, arg) in args.iter().enumerate() {
        if arg == "-f" || arg == "--config" {
            match args.get(i + 1) {
                Some(path) => config_path = Some(PathBuf::from(path)),
                None => {
                    eprintln!("smcfand: {} requires a file argument", arg);
                    std::process::exit(1);
                }
            }
        }
    }

    let config_path = config_path.unwrap_or_else(config::default_config_path);
    let cfg = match config::load_config(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("smcfand: {}", e);
            logger::log_event("fatal_error", serde_json::json!({ "error": e.to_string() }));
            std::process::exit(1);
        }
    };

    if let Err(e) = daemon::run(&cfg, Path::new(hwmon::DEFAULT_PLATFORM_ROOT)) {
        eprintln!("smcfand: error: {:#}", e);
        logger::log_event("fatal_error", serde_json::json!({ "error": e.to_string() }));
        std::process::exit(1);
    }
}
