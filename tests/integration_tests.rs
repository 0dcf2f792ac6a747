/*
 * Integration tests for smcfand
 *
 * These tests exercise discovery, control, and speed application together
 * over a fake sysfs tree, the way the daemon drives them per cycle.
 */

use std::fs;
use std::path::PathBuf;

use serial_test::serial;
use tempfile::TempDir;

use smcfand::config::{Config, PidGains};
use smcfand::control::Control;
use smcfand::fans::{FanMode, FanRegistry};
use smcfand::sensors::SensorRegistry;

/// Fake platform root with a modern coretemp layout and an applesmc fan
/// bank: one sensor per entry in `temps`, one fan per entry in `labels`.
fn fake_platform(temps: &[i64], labels: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();

    let hwmon = dir.path().join("coretemp.0/hwmon/hwmon0");
    fs::create_dir_all(&hwmon).unwrap();
    for (i, t) in temps.iter().enumerate() {
        fs::write(hwmon.join(format!("temp{}_input", i + 1)), format!("{}\n", t)).unwrap();
    }

    let smc = dir.path().join("applesmc.768");
    fs::create_dir_all(&smc).unwrap();
    for (i, label) in labels.iter().enumerate() {
        fs::write(smc.join(format!("fan{}_label", i)), format!("{}\n", label)).unwrap();
        fs::write(smc.join(format!("fan{}_output", i)), "0000").unwrap();
        fs::write(smc.join(format!("fan{}_manual", i)), "0").unwrap();
    }

    dir
}

fn set_temps(dir: &TempDir, temps: &[i64]) {
    let hwmon = dir.path().join("coretemp.0/hwmon/hwmon0");
    for (i, t) in temps.iter().enumerate() {
        fs::write(hwmon.join(format!("temp{}_input", i + 1)), format!("{}\n", t)).unwrap();
    }
}

fn output_file(dir: &TempDir, fan_id: usize) -> PathBuf {
    dir.path().join(format!("applesmc.768/fan{}_output", fan_id))
}

fn read_rpm(dir: &TempDir, fan_id: usize) -> i32 {
    fs::read_to_string(output_file(dir, fan_id))
        .unwrap()
        .trim()
        .parse()
        .unwrap()
}

#[test]
fn test_discovery_end_to_end() {
    let dir = fake_platform(&[65000, 67000], &["Left side", "Right side"]);
    let cfg = Config {
        fan_list: vec!["Right side".to_string(), "Left side".to_string()],
        ..Config::default()
    };

    let sensors = SensorRegistry::discover(dir.path()).unwrap();
    assert_eq!(sensors.len(), 2);
    assert_eq!(sensors.average_temperature(), 66.0);

    let fans = FanRegistry::discover(dir.path(), &cfg).unwrap();
    assert_eq!(fans.len(), 2);
    assert_eq!(fans.fans()[0].fan_id, 1);
    assert_eq!(fans.fans()[1].fan_id, 0);
}

#[test]
fn test_startup_sequence_like_daemon() {
    let dir = fake_platform(&[70000], &["Exhaust"]);
    let cfg = Config::default();

    let mut sensors = SensorRegistry::discover(dir.path()).unwrap();
    let mut fans = FanRegistry::discover(dir.path(), &cfg).unwrap();

    // Manual mode entry, initial sample, minimum speed
    fans.set_mode(FanMode::Manual);
    sensors.refresh();
    let start_temp = sensors.average_temperature();
    fans.apply_speed(cfg.min_fan_speed);

    assert_eq!(
        fs::read_to_string(dir.path().join("applesmc.768/fan0_manual")).unwrap(),
        "1"
    );
    assert_eq!(read_rpm(&dir, 0), cfg.min_fan_speed);
    assert_eq!(start_temp, 70.0);
}

#[test]
#[serial]
fn test_applied_speeds_stay_within_bounds_every_cycle() {
    let dir = fake_platform(&[60000], &["Left side", "Right side"]);
    let cfg = Config {
        fan_list: vec!["Left side".to_string(), "Right side".to_string()],
        fan_ratios: vec![1.0, 0.5],
        ..Config::default()
    };

    let mut sensors = SensorRegistry::discover(dir.path()).unwrap();
    let mut fans = FanRegistry::discover(dir.path(), &cfg).unwrap();
    fans.set_mode(FanMode::Manual);
    sensors.refresh();
    let mut control = Control::from_config(&cfg, sensors.average_temperature());

    // A full excursion: idle, ramp up, saturate, cool back down
    let schedule: &[i64] = &[
        60000, 65000, 70000, 75000, 82000, 88000, 90000, 84000, 76000, 68000, 62000, 58000,
    ];

    for &milli in schedule {
        set_temps(&dir, &[milli]);
        sensors.refresh();
        let base = control.step(sensors.average_temperature(), &cfg);
        fans.apply_speed(base);

        for fan in fans.fans() {
            let rpm = read_rpm(&dir, fan.fan_id);
            let tuning = fan.tuning();
            assert!(
                rpm >= tuning.min_speed && rpm <= tuning.max_speed,
                "fan{} at {} RPM outside [{}, {}] (temp {} mC, base {})",
                fan.fan_id,
                rpm,
                tuning.min_speed,
                tuning.max_speed,
                milli,
                base
            );
        }
    }
}

#[test]
fn test_saturation_and_recovery() {
    let dir = fake_platform(&[70000], &["Exhaust"]);
    let cfg = Config::default();

    let mut sensors = SensorRegistry::discover(dir.path()).unwrap();
    let mut fans = FanRegistry::discover(dir.path(), &cfg).unwrap();
    sensors.refresh();
    let mut control = Control::from_config(&cfg, sensors.average_temperature());

    set_temps(&dir, &[90000]);
    sensors.refresh();
    let base = control.step(sensors.average_temperature(), &cfg);
    fans.apply_speed(base);
    assert_eq!(read_rpm(&dir, 0), cfg.max_fan_speed);

    set_temps(&dir, &[55000]);
    sensors.refresh();
    let base = control.step(sensors.average_temperature(), &cfg);
    fans.apply_speed(base);
    assert_eq!(read_rpm(&dir, 0), cfg.min_fan_speed);
}

#[test]
fn test_pid_cycle_end_to_end() {
    let dir = fake_platform(&[70000], &["Exhaust"]);
    let cfg = Config {
        pid: Some(PidGains {
            kp: 1.0,
            ki: 0.0,
            kd: 0.0,
        }),
        ..Config::default()
    };

    let mut sensors = SensorRegistry::discover(dir.path()).unwrap();
    let mut fans = FanRegistry::discover(dir.path(), &cfg).unwrap();
    sensors.refresh();
    let mut control = Control::from_config(&cfg, sensors.average_temperature());

    // 70C against a 66C setpoint: pure proportional term of 4 RPM
    sensors.refresh();
    let base = control.step(sensors.average_temperature(), &cfg);
    fans.apply_speed(base);
    assert_eq!(read_rpm(&dir, 0), cfg.min_fan_speed + 4);
}

#[test]
fn test_idempotent_write_suppression_across_cycles() {
    let dir = fake_platform(&[70000], &["Exhaust"]);
    let cfg = Config::default();

    let mut fans = FanRegistry::discover(dir.path(), &cfg).unwrap();

    fans.apply_speed(4000);
    assert_eq!(read_rpm(&dir, 0), 4000);

    // Overwrite the file externally; an unchanged base speed must not
    // touch the endpoint again.
    fs::write(output_file(&dir, 0), "9999").unwrap();
    fans.apply_speed(4000);
    assert_eq!(read_rpm(&dir, 0), 9999);

    fans.apply_speed(4100);
    assert_eq!(read_rpm(&dir, 0), 4100);
}

#[test]
fn test_auto_mode_restoration() {
    let dir = fake_platform(&[70000], &["Left side", "Right side"]);
    let cfg = Config::default();

    let fans = FanRegistry::discover(dir.path(), &cfg).unwrap();
    fans.set_mode(FanMode::Manual);
    fans.set_mode(FanMode::Auto);

    for id in 0..2 {
        assert_eq!(
            fs::read_to_string(dir.path().join(format!("applesmc.768/fan{}_manual", id))).unwrap(),
            "0"
        );
    }
}
