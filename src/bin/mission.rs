use std::time::Duration;

use aerial_motion::sim::{SimConfig, SimulatedLink};
use aerial_motion::{MotionConfig, MotionController, Position};
use anyhow::Result;
use tracing::info;

/// Flies a small square with a turn at every corner against the simulated vehicle.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let height: f64 = env_or("TAKEOFF_HEIGHT", 1.0)?;
    let side: f64 = env_or("SQUARE_SIDE", 0.5)?;
    let noise: f64 = env_or("SIM_NOISE", 0.01)?;
    let fast = std::env::var("FAST_MODE").is_ok_and(|v| v == "1" || v == "true");

    let link = SimulatedLink::new(
        SimConfig::builder()
            .start(Position::new(0.0, 0.0, 0.02, 0.0))
            .noise(noise)
            .takeoff_drift(0.05)
            .partial_every(50)
            .build(),
    );
    let config = MotionConfig::builder()
        .settle_timeout(Duration::from_secs(30))
        .build();

    info!(height, side, fast, "Starting mission");

    let mut controller = MotionController::activate(link.clone(), config).await?;
    controller.set_mode(fast);

    controller.takeoff(height).await?;
    for corner in 1..=4 {
        controller.forward(side).await?;
        controller.turn_left(90.0).await?;
        info!(corner, target = %controller.target(), position = %link.position(), "Corner reached");
    }

    controller.deactivate().await?;

    info!(
        position = %link.position(),
        commands = link.issued().len(),
        "Mission complete"
    );

    Ok(())
}

fn env_or(name: &str, default: f64) -> Result<f64> {
    match std::env::var(name) {
        Ok(value) => Ok(value.parse()?),
        Err(_) => Ok(default),
    }
}
