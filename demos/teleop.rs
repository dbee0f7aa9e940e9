// Keyboard teleop: W/S drive, A/D steer, Z/C spin, G hold heading 0, SPACE stop, R/F power, Q quit
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use ev3_drive_runtime::config::TOPIC_CMD_MOVE;
use ev3_drive_runtime::{MoveCommand, MoveRequest};
use std::time::Duration;
use tracing::info;

const POWERS: [i16; 3] = [25, 50, 80]; // percent
const STEER: f32 = 30.0; // percent
const SPIN: f32 = 100.0; // percent, inner wheel fully reversed

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD_MOVE).await?;

    info!("Controls: W/S=drive, A/D=steer, Z/C=spin, G=hold heading, SPACE=stop, R/F=power, Q=quit");
    info!("Power: LOW");

    enable_raw_mode()?;
    let result = run_teleop(&publisher).await;
    disable_raw_mode()?;

    result
}

async fn run_teleop(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut power_idx: usize = 0;

    loop {
        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        let Event::Key(KeyEvent { code, kind, .. }) = event::read()? else {
            continue;
        };
        if kind != KeyEventKind::Press {
            continue;
        }

        let power = POWERS[power_idx];
        let cmd = match code {
            KeyCode::Char('w') => MoveCommand::On {
                steering: 0.0,
                power,
            },
            KeyCode::Char('s') => MoveCommand::On {
                steering: 0.0,
                power: -power,
            },
            KeyCode::Char('a') => MoveCommand::On {
                steering: -STEER,
                power,
            },
            KeyCode::Char('d') => MoveCommand::On {
                steering: STEER,
                power,
            },
            KeyCode::Char('z') => MoveCommand::On {
                steering: -SPIN,
                power,
            },
            KeyCode::Char('c') => MoveCommand::On {
                steering: SPIN,
                power,
            },
            KeyCode::Char('g') => MoveCommand::OnGyro { heading: 0, power },
            KeyCode::Char(' ') => MoveCommand::Off { brake: true },

            // Power control
            KeyCode::Char('r') => {
                power_idx = (power_idx + 1).min(2);
                print_power(power_idx);
                continue;
            }
            KeyCode::Char('f') => {
                power_idx = power_idx.saturating_sub(1);
                print_power(power_idx);
                continue;
            }

            // Quit, stopping the robot on the way out
            KeyCode::Char('q') | KeyCode::Esc => {
                publish(publisher, &MoveCommand::Off { brake: false }).await?;
                break;
            }

            _ => continue,
        };

        publish(publisher, &cmd).await?;
    }

    Ok(())
}

async fn publish(
    publisher: &zenoh::pubsub::Publisher<'_>,
    cmd: &MoveCommand,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let request = MoveRequest::from(cmd);
    publisher.put(serde_json::to_string(&request)?).await?;
    info!("Sent {} {:?}", request.op, request.args);
    Ok(())
}

fn print_power(idx: usize) {
    let label = ["LOW", "MED", "HIGH"][idx];
    info!("Power: {}", label);
}
