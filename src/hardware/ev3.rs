// ev3dev sysfs backend
//
// Motors live under /sys/class/tacho-motor/motorN and sensors under
// /sys/class/lego-sensor/sensorN. Every attribute is a small text file:
// writes take effect immediately, reads return a single trimmed line.

use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, info};

use super::{HardwareError, HeadingSensor, MotorActuator, Result};
use crate::config::SYSFS_ROOT;

const TACHO_CLASS: &str = "tacho-motor";
const SENSOR_CLASS: &str = "lego-sensor";

const GYRO_DRIVER: &str = "lego-ev3-gyro";
const GYRO_MODE_ANGLE: &str = "GYRO-ANG";

/// Motor commands understood by the tacho-motor driver
#[derive(Debug, Clone, Copy)]
enum Command {
    RunForever,
    RunTimed,
    RunToRelPos,
    Stop,
}

impl Command {
    fn as_str(self) -> &'static str {
        match self {
            Command::RunForever => "run-forever",
            Command::RunTimed => "run-timed",
            Command::RunToRelPos => "run-to-rel-pos",
            Command::Stop => "stop",
        }
    }
}

fn io_error(path: PathBuf) -> impl FnOnce(std::io::Error) -> HardwareError {
    move |source| HardwareError::Io { path, source }
}

fn read_attr(dir: &Path, name: &str) -> Result<String> {
    let path = dir.join(name);
    fs::read_to_string(&path)
        .map(|value| value.trim().to_string())
        .map_err(io_error(path))
}

fn parse_attr<T: FromStr>(dir: &Path, name: &str) -> Result<T> {
    let value = read_attr(dir, name)?;
    value.parse().map_err(|_| HardwareError::Parse {
        path: dir.join(name),
        value,
    })
}

fn write_attr(dir: &Path, name: &str, value: impl Display) -> Result<()> {
    let path = dir.join(name);
    let value = value.to_string();
    debug!("{} <- {}", path.display(), value);
    fs::write(&path, value).map_err(io_error(path))
}

/// Find the device in `root/class` whose `address` names `port`.
///
/// Addresses look like `ev3-ports:outA`, so a suffix match on the port name is used.
/// When `driver` is given, the device's `driver_name` must match as well.
fn find_device(root: &Path, class: &str, port: &str, driver: Option<&str>) -> Result<PathBuf> {
    let class_dir = root.join(class);
    let entries = fs::read_dir(&class_dir).map_err(io_error(class_dir.clone()))?;

    for entry in entries {
        let dir = entry.map_err(io_error(class_dir.clone()))?.path();
        let Ok(address) = read_attr(&dir, "address") else {
            continue;
        };
        if !address.ends_with(port) {
            continue;
        }
        if let Some(driver) = driver {
            if read_attr(&dir, "driver_name").ok().as_deref() != Some(driver) {
                continue;
            }
        }
        return Ok(dir);
    }

    Err(HardwareError::PortNotFound {
        class: class.to_string(),
        port: port.to_string(),
    })
}

/// An EV3 large/medium motor driven through the tacho-motor class
#[derive(Debug)]
pub struct TachoMotor {
    dir: PathBuf,
    max_speed: i32,
    regulated: bool,
}

impl TachoMotor {
    /// Open the motor attached to `port` (e.g. `outA`)
    pub fn open(port: &str) -> Result<Self> {
        Self::open_in(Path::new(SYSFS_ROOT), port)
    }

    /// Open using a custom sysfs class root
    pub fn open_in(root: &Path, port: &str) -> Result<Self> {
        let dir = find_device(root, TACHO_CLASS, port, None)?;
        let max_speed = parse_attr(&dir, "max_speed")?;
        info!("Opened motor on {} at {}", port, dir.display());
        Ok(Self {
            dir,
            max_speed,
            regulated: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Write the setpoint for the active regulation mode.
    ///
    /// Regulated motors take a speed in tacho counts per second, unregulated ones a duty cycle.
    fn set_power(&mut self, power: i16) -> Result<()> {
        let power = i32::from(power).clamp(-100, 100);
        if self.regulated {
            write_attr(&self.dir, "speed_sp", power * self.max_speed / 100)
        } else {
            write_attr(&self.dir, "duty_cycle_sp", power)
        }
    }

    fn command(&mut self, command: Command) -> Result<()> {
        write_attr(&self.dir, "command", command.as_str())
    }
}

impl MotorActuator for TachoMotor {
    fn run(&mut self, power: i16) -> Result<()> {
        self.set_power(power)?;
        self.command(Command::RunForever)
    }

    fn run_timed(&mut self, power: i16, ms: i32) -> Result<()> {
        self.set_power(power)?;
        write_attr(&self.dir, "time_sp", ms)?;
        self.command(Command::RunTimed)
    }

    fn run_to_rel_pos(&mut self, power: i16, degrees: i32) -> Result<()> {
        self.set_power(power)?;
        write_attr(&self.dir, "position_sp", degrees)?;
        self.command(Command::RunToRelPos)
    }

    fn stop(&mut self) -> Result<()> {
        self.command(Command::Stop)
    }

    fn run_state(&mut self) -> Result<String> {
        read_attr(&self.dir, "state")
    }

    fn set_brake_on_stop(&mut self, enabled: bool) -> Result<()> {
        write_attr(&self.dir, "stop_action", if enabled { "brake" } else { "coast" })
    }

    fn set_regulation(&mut self, enabled: bool) -> Result<()> {
        // Newer kernels dropped the attribute and always regulate
        if !self.dir.join("speed_regulation").exists() {
            if enabled {
                self.regulated = true;
                return Ok(());
            }
            return Err(HardwareError::Unsupported(format!(
                "speed regulation cannot be disabled on {}",
                self.dir.display()
            )));
        }
        write_attr(&self.dir, "speed_regulation", if enabled { "on" } else { "off" })?;
        self.regulated = enabled;
        Ok(())
    }
}

/// EV3 gyro sensor in angle mode
#[derive(Debug)]
pub struct Ev3Gyro {
    dir: PathBuf,
}

impl Ev3Gyro {
    /// Open the gyro attached to `port` (e.g. `in2`)
    pub fn open(port: &str) -> Result<Self> {
        Self::open_in(Path::new(SYSFS_ROOT), port)
    }

    /// Open using a custom sysfs class root
    pub fn open_in(root: &Path, port: &str) -> Result<Self> {
        let dir = find_device(root, SENSOR_CLASS, port, Some(GYRO_DRIVER))?;
        write_attr(&dir, "mode", GYRO_MODE_ANGLE)?;
        info!("Opened gyro on {} at {}", port, dir.display());
        Ok(Self { dir })
    }
}

impl HeadingSensor for Ev3Gyro {
    fn read_heading(&mut self) -> Result<i32> {
        parse_attr(&self.dir, "value0")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a throwaway sysfs tree under the system temp dir
    fn sysfs_root(name: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!("ev3-sysfs-{}-{}", std::process::id(), name));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(root.join(TACHO_CLASS)).unwrap();
        fs::create_dir_all(root.join(SENSOR_CLASS)).unwrap();
        root
    }

    fn add_motor(root: &Path, name: &str, address: &str, legacy_regulation: bool) -> PathBuf {
        let dir = root.join(TACHO_CLASS).join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("address"), format!("{}\n", address)).unwrap();
        fs::write(dir.join("max_speed"), "1050\n").unwrap();
        fs::write(dir.join("state"), "\n").unwrap();
        if legacy_regulation {
            fs::write(dir.join("speed_regulation"), "off\n").unwrap();
        }
        dir
    }

    fn read(dir: &Path, name: &str) -> String {
        fs::read_to_string(dir.join(name)).unwrap()
    }

    #[test]
    fn test_open_finds_motor_by_port() {
        let root = sysfs_root("open");
        add_motor(&root, "motor0", "ev3-ports:outA", true);
        let right = add_motor(&root, "motor1", "ev3-ports:outC", true);

        let motor = TachoMotor::open_in(&root, "outC").unwrap();
        assert_eq!(motor.path(), right.as_path());
    }

    #[test]
    fn test_missing_port_is_reported() {
        let root = sysfs_root("missing");
        add_motor(&root, "motor0", "ev3-ports:outA", true);

        let err = TachoMotor::open_in(&root, "outD").unwrap_err();
        assert!(matches!(err, HardwareError::PortNotFound { ref port, .. } if port == "outD"));
    }

    #[test]
    fn test_unregulated_run_writes_duty_cycle() {
        let root = sysfs_root("duty");
        let dir = add_motor(&root, "motor0", "ev3-ports:outB", true);

        let mut motor = TachoMotor::open_in(&root, "outB").unwrap();
        motor.set_regulation(false).unwrap();
        motor.run(-40).unwrap();

        assert_eq!(read(&dir, "speed_regulation"), "off");
        assert_eq!(read(&dir, "duty_cycle_sp"), "-40");
        assert_eq!(read(&dir, "command"), "run-forever");
    }

    #[test]
    fn test_regulated_run_scales_speed_and_clamps() {
        let root = sysfs_root("speed");
        let dir = add_motor(&root, "motor0", "ev3-ports:outB", true);

        let mut motor = TachoMotor::open_in(&root, "outB").unwrap();
        motor.set_regulation(true).unwrap();

        motor.run_timed(50, 1500).unwrap();
        assert_eq!(read(&dir, "speed_sp"), "525");
        assert_eq!(read(&dir, "time_sp"), "1500");
        assert_eq!(read(&dir, "command"), "run-timed");

        // Heading correction can ask for more than full power
        motor.run_to_rel_pos(110, 720).unwrap();
        assert_eq!(read(&dir, "speed_sp"), "1050");
        assert_eq!(read(&dir, "position_sp"), "720");
        assert_eq!(read(&dir, "command"), "run-to-rel-pos");
    }

    #[test]
    fn test_modern_kernel_regulation() {
        let root = sysfs_root("modern");
        add_motor(&root, "motor0", "ev3-ports:outB", false);

        let mut motor = TachoMotor::open_in(&root, "outB").unwrap();
        motor.set_regulation(true).unwrap();
        assert!(matches!(
            motor.set_regulation(false),
            Err(HardwareError::Unsupported(_))
        ));
    }

    #[test]
    fn test_brake_stop_and_state() {
        let root = sysfs_root("brake");
        let dir = add_motor(&root, "motor0", "ev3-ports:outB", true);
        let mut motor = TachoMotor::open_in(&root, "outB").unwrap();

        motor.set_brake_on_stop(true).unwrap();
        assert_eq!(read(&dir, "stop_action"), "brake");
        motor.set_brake_on_stop(false).unwrap();
        assert_eq!(read(&dir, "stop_action"), "coast");

        motor.stop().unwrap();
        assert_eq!(read(&dir, "command"), "stop");

        assert_eq!(motor.run_state().unwrap(), "");
        fs::write(dir.join("state"), "running ramping\n").unwrap();
        assert_eq!(motor.run_state().unwrap(), "running ramping");
    }

    #[test]
    fn test_gyro_angle_mode_and_read() {
        let root = sysfs_root("gyro");
        let touch = root.join(SENSOR_CLASS).join("sensor0");
        fs::create_dir_all(&touch).unwrap();
        fs::write(touch.join("address"), "ev3-ports:in2\n").unwrap();
        fs::write(touch.join("driver_name"), "lego-ev3-touch\n").unwrap();

        let gyro_dir = root.join(SENSOR_CLASS).join("sensor1");
        fs::create_dir_all(&gyro_dir).unwrap();
        fs::write(gyro_dir.join("address"), "ev3-ports:in2\n").unwrap();
        fs::write(gyro_dir.join("driver_name"), "lego-ev3-gyro\n").unwrap();
        fs::write(gyro_dir.join("value0"), "-12\n").unwrap();

        let mut gyro = Ev3Gyro::open_in(&root, "in2").unwrap();
        assert_eq!(read(&gyro_dir, "mode"), GYRO_MODE_ANGLE);
        assert_eq!(gyro.read_heading().unwrap(), -12);

        fs::write(gyro_dir.join("value0"), "garbage\n").unwrap();
        assert!(matches!(
            gyro.read_heading(),
            Err(HardwareError::Parse { .. })
        ));
    }
}
