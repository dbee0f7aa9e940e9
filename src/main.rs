use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ev3_drive_runtime::config::DriveConfig;
use ev3_drive_runtime::drive::Drive;
use ev3_drive_runtime::hardware::{CallLog, Ev3Gyro, SimGyro, SimMotor, TachoMotor};
use ev3_drive_runtime::runtime;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let config = DriveConfig::parse();

    if let Err(e) = start(config).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}

async fn start(config: DriveConfig) -> Result<(), BoxError> {
    if config.simulate {
        info!("Using simulated motors and gyro");
        let log = CallLog::new();
        let left = SimMotor::new(&config.left, log.clone());
        let right = SimMotor::new(&config.right, log);
        let gyro = config.gyro_port().map(|_| SimGyro::default());

        let drive = Drive::configure(left, right, gyro, config.regulation())?;
        return runtime::run(drive).await;
    }

    info!("Left motor on {}, right motor on {}", config.left, config.right);
    let left = TachoMotor::open(&config.left)?;
    let right = TachoMotor::open(&config.right)?;
    let gyro = config.gyro_port().map(Ev3Gyro::open).transpose()?;

    let drive = Drive::configure(left, right, gyro, config.regulation())?;
    runtime::run(drive).await
}
