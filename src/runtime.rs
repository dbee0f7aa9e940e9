// Zenoh command loop
// Move requests arrive as JSON on TOPIC_CMD_MOVE and are executed strictly in
// order. Timed and positional moves block the loop until they finish, so
// requests sent meanwhile queue up in the subscriber. After each request the
// outcome is published on TOPIC_STATE_DRIVE. Ctrl-C preempts a move in
// progress, and the motors are braked before exiting.

use tracing::{info, warn};

// local imports
use crate::config::{TOPIC_CMD_MOVE, TOPIC_STATE_DRIVE};
use crate::drive::Drive;
use crate::error::DriveError;
use crate::hardware::{HeadingSensor, MotorActuator};
use crate::messages::{DriveStatus, MoveCommand, MoveRequest};

pub struct Runtime<M: MotorActuator, G: HeadingSensor> {
    drive: Drive<M, G>,
}

impl<M: MotorActuator, G: HeadingSensor> Runtime<M, G> {
    pub fn new(drive: Drive<M, G>) -> Self {
        Self { drive }
    }

    pub fn drive(&self) -> &Drive<M, G> {
        &self.drive
    }

    /// Parse and execute one request payload, returning the status to publish
    pub async fn on_request(&mut self, payload: &[u8]) -> DriveStatus {
        let req = match serde_json::from_slice::<MoveRequest>(payload) {
            Ok(req) => req,
            Err(e) => {
                warn!("Failed to parse move request: {}", e);
                return self.status("invalid", Err(format!("invalid request: {}", e)));
            }
        };

        info!("Received request: {} {:?}", req.op, req.args);
        let result = match MoveCommand::try_from(&req) {
            Ok(cmd) => self.drive.execute(cmd).await,
            Err(e) => Err(e),
        };
        if let Err(ref e) = result {
            warn!("Request {} failed: {}", req.op, e);
        }

        self.status(&req.op, result.map_err(|e: DriveError| e.to_string()))
    }

    /// Like [`Runtime::on_request`], but gives up as soon as `interrupt` completes.
    ///
    /// Returns `None` when interrupted. The move is abandoned where it stands, so
    /// the caller is expected to follow up with [`Runtime::shutdown`].
    pub async fn on_request_until<F>(
        &mut self,
        payload: &[u8],
        interrupt: &mut F,
    ) -> Option<DriveStatus>
    where
        F: Future + Unpin,
    {
        tokio::select! {
            status = self.on_request(payload) => Some(status),
            _ = interrupt => {
                warn!("Request interrupted before it finished");
                None
            }
        }
    }

    /// Stop the robot before exiting
    pub async fn shutdown(&mut self) -> DriveStatus {
        info!("Shutting down, braking motors");
        let result = self.drive.execute(MoveCommand::Off { brake: true }).await;
        self.status("off", result.map_err(|e| e.to_string()))
    }

    fn status(&self, op: &str, result: Result<(), String>) -> DriveStatus {
        DriveStatus {
            op: op.to_string(),
            ok: result.is_ok(),
            error: result.err(),
            heading_hold_active: self.drive.heading_hold_active(),
        }
    }
}

pub async fn run<M: MotorActuator, G: HeadingSensor>(
    drive: Drive<M, G>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publisher and subscriber...");
    let subscriber = session.declare_subscriber(TOPIC_CMD_MOVE).await?;
    let pub_status = session.declare_publisher(TOPIC_STATE_DRIVE).await?;

    let mut runtime = Runtime::new(drive);

    info!("Subscribed to: {}", TOPIC_CMD_MOVE);
    info!("Publishing to: {}", TOPIC_STATE_DRIVE);

    // Created once so a signal is seen even while a move is blocking the loop
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let sample = tokio::select! {
            sample = subscriber.recv_async() => sample?,
            _ = &mut ctrl_c => break,
        };
        let payload = sample.payload().to_bytes();

        let Some(status) = runtime.on_request_until(&payload, &mut ctrl_c).await else {
            break;
        };
        pub_status.put(serde_json::to_string(&status)?).await?;
    }

    let status = runtime.shutdown().await;
    pub_status.put(serde_json::to_string(&status)?).await?;

    Ok(())
}
