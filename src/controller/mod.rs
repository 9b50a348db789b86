//! The motion controller drives a [`FlightMachine`] against a real [`FlightLink`].
//!
//! Every public motion call is `async` and returns only once the motion it started has settled:
//! the command is issued, the controller sleeps for the planned duration, and then polls the
//! telemetry feed until the measured pose is within tolerance of the target.

mod directions;
pub mod error;
pub mod speed;

use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

pub use self::error::FlightError;
pub use self::speed::SpeedSelector;
use crate::config::{MotionConfig, SpeedProfile};
use crate::feed::TelemetryFeed;
use crate::link::{FlightLink, POSE_CHANNELS, SubscriptionId};
use crate::planner::MoveDelta;
use crate::position::Position;
use crate::state_machine::StateMachine;
use crate::state_machine::flight::{FlightCommand, FlightInput, FlightMachine, FlightOutput};

/// Relative-position motion control for one vehicle.
///
/// A controller only exists while it is active: [`activate`](Self::activate) performs the
/// hardware check and waits for the first pose, and [`deactivate`](Self::deactivate) lands if
/// needed and releases the telemetry subscription.
///
/// ```ignore
/// let mut controller = MotionController::activate(link, MotionConfig::default()).await?;
/// controller.takeoff(1.0).await?;
/// controller.forward(0.5).await?;
/// controller.turn_left(90.0).await?;
/// controller.deactivate().await?;
/// ```
#[derive(Debug)]
pub struct MotionController<L: FlightLink> {
    link: L,
    config: MotionConfig,
    machine: FlightMachine,
    feed: TelemetryFeed,
    subscription: SubscriptionId,
    speed: SpeedSelector,
}

impl<L: FlightLink> MotionController<L> {
    /// Check for the required module, subscribe to pose telemetry and wait for the first pose,
    /// which becomes both home and target.
    pub async fn activate(link: L, config: MotionConfig) -> Result<Self, FlightError> {
        info!(module = %config.required_module, "Activating motion controller");
        config.validate()?;

        if !link.has_module(&config.required_module).await? {
            return Err(FlightError::RequiredModuleNotFound {
                module: config.required_module.clone(),
            });
        }

        let subscription = link.subscribe(config.telemetry_period, &POSE_CHANNELS)?;
        let subscription_id = subscription.id;
        let mut feed = TelemetryFeed::spawn(subscription.records);

        let home = match feed.first_sample(config.first_sample_timeout).await {
            Ok(home) => home,
            Err(e) => {
                if let Err(unsubscribe_err) = link.unsubscribe(&subscription_id) {
                    warn!(error = %unsubscribe_err, "Failed to release telemetry subscription");
                }
                return Err(e);
            }
        };

        info!(%home, "Motion controller ready");

        Ok(Self {
            machine: FlightMachine::new(home, &config),
            link,
            config,
            feed,
            subscription: subscription_id,
            speed: SpeedSelector::default(),
        })
    }

    /// Land if still flying, then stop the telemetry subscription.
    ///
    /// The subscription is released even when landing fails; the landing error is returned.
    pub async fn deactivate(mut self) -> Result<(), FlightError> {
        info!("Deactivating motion controller");

        let landed = if self.is_flying() {
            self.land().await
        } else {
            Ok(())
        };

        self.feed.close();
        let released = self.link.unsubscribe(&self.subscription);

        landed?;
        released?;
        Ok(())
    }

    /// Take off and end up `height` metres above the pre-takeoff altitude.
    ///
    /// The vehicle first hops up a fixed distance at a fixed rate, then flies to the requested
    /// height while correcting any sideways drift picked up near the ground.
    pub async fn takeoff(&mut self, height: f64) -> Result<(), FlightError> {
        info!(height, "Taking off");

        let current = self.current()?;
        self.run(FlightInput::Takeoff { height, current }).await?;

        let current = self.current()?;
        let profile = self.profile();
        self.run(FlightInput::Approach { current, profile }).await
    }

    /// Descend to home altitude. The last few centimetres are a drop with the motors off.
    pub async fn land(&mut self) -> Result<(), FlightError> {
        info!("Landing");

        let current = self.current()?;
        self.run(FlightInput::Land { current }).await
    }

    /// Move relative to the current heading. Opposing components of `delta` cancel out.
    pub async fn move_by(&mut self, delta: MoveDelta) -> Result<(), FlightError> {
        let relative = delta.net();
        info!(
            forward = relative.forward,
            left = relative.left,
            up = relative.up,
            yaw = relative.yaw,
            "Moving"
        );

        let current = self.current()?;
        let profile = self.profile();
        self.run(FlightInput::Move {
            relative,
            current,
            profile,
        })
        .await
    }

    /// Switch between the normal and fast speed profiles for subsequent moves.
    pub fn set_mode(&self, fast: bool) {
        info!(fast, "Setting fast mode");
        self.speed.set_fast(fast);
    }

    /// A handle to the fast-mode switch that can be used from other tasks.
    pub fn speed_selector(&self) -> SpeedSelector {
        self.speed.clone()
    }

    pub fn is_flying(&self) -> bool {
        self.machine.is_flying()
    }

    pub fn home(&self) -> &Position {
        self.machine.home()
    }

    pub fn target(&self) -> &Position {
        self.machine.target()
    }

    /// The latest measured pose. Fails once the telemetry stream has ended, since the last pose
    /// can no longer be trusted.
    pub fn current(&self) -> Result<Position, FlightError> {
        if self.feed.is_closed() {
            return Err(FlightError::TelemetryClosed);
        }
        self.feed.latest().ok_or(FlightError::TelemetryClosed)
    }

    fn profile(&self) -> SpeedProfile {
        self.config.profile(self.speed.is_fast())
    }

    async fn run(&mut self, input: FlightInput) -> Result<(), FlightError> {
        for command in self.dispatch(input)? {
            self.execute(command).await?;
        }
        Ok(())
    }

    fn dispatch(&mut self, input: FlightInput) -> Result<Vec<FlightCommand>, FlightError> {
        self.machine.process_input(input);

        let mut commands = Vec::new();
        while let Some(output) = self.machine.poll_output() {
            match output {
                FlightOutput::Command(command) => commands.push(command),
                FlightOutput::Rejected(error) => return Err(error.into()),
            }
        }
        Ok(commands)
    }

    async fn execute(&self, command: FlightCommand) -> Result<(), FlightError> {
        match command {
            FlightCommand::Ascend { height, duration } => {
                self.link.ascend_to(height, duration).await?;
            }
            FlightCommand::Descend {
                height, duration, ..
            } => {
                self.link.descend_to(height, duration).await?;
            }
            FlightCommand::GoTo { target, duration } => {
                self.link
                    .go_to(target.x, target.y, target.z, target.yaw_radians(), duration)
                    .await?;
            }
        }

        sleep(command.wait()).await;

        if let FlightCommand::GoTo { target, .. } = command {
            self.settle(&target).await?;
        }
        Ok(())
    }

    /// Poll the feed until the measured pose is close enough to `target`.
    async fn settle(&self, target: &Position) -> Result<(), FlightError> {
        let wait = async {
            loop {
                let current = self.current()?;
                if current.distance_to(target) <= self.config.linear_threshold
                    && current.angle_to(target) <= self.config.angular_threshold
                {
                    return Ok::<_, FlightError>(current);
                }
                sleep(self.config.settle_poll_interval).await;
            }
        };

        let settled = match self.config.settle_timeout {
            Some(limit) => timeout(limit, wait)
                .await
                .map_err(|_| FlightError::SettleTimeout {
                    target: *target,
                    limit,
                })??,
            None => wait.await?,
        };

        debug!(position = %settled, %target, "Settled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::link::LinkError;
    use crate::sim::{IssuedCommand, SimConfig, SimulatedLink};
    use crate::state_machine::flight::TransitionError;

    const START: Position = Position::new(0.5, 0.25, 0.01, 0.0);

    async fn activated(sim: SimConfig) -> (SimulatedLink, MotionController<SimulatedLink>) {
        let link = SimulatedLink::new(sim);
        let controller = MotionController::activate(link.clone(), MotionConfig::default())
            .await
            .unwrap();
        (link, controller)
    }

    async fn flying() -> (SimulatedLink, MotionController<SimulatedLink>) {
        let (link, mut controller) = activated(SimConfig::builder().start(START).build()).await;
        controller.takeoff(1.0).await.unwrap();
        (link, controller)
    }

    fn last_go_to_duration(link: &SimulatedLink) -> Duration {
        link.issued()
            .into_iter()
            .rev()
            .find_map(|command| match command {
                IssuedCommand::GoTo { duration, .. } => Some(duration),
                _ => None,
            })
            .unwrap()
    }

    fn assert_near(actual: &Position, expected: &Position, tolerance: f64) {
        assert!(
            actual.distance_to(expected) <= tolerance,
            "expected {expected}, got {actual}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_activate_captures_home() {
        let (link, controller) = activated(SimConfig::builder().start(START).build()).await;

        assert_eq!(controller.home(), &START);
        assert_eq!(controller.target(), &START);
        assert!(!controller.is_flying());
        assert_eq!(link.active_subscriptions(), 1);
        assert!(link.issued().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_activate_without_required_module() {
        let link = SimulatedLink::new(SimConfig::builder().modules(vec![]).build());

        let result = MotionController::activate(link.clone(), MotionConfig::default()).await;

        assert!(matches!(
            result,
            Err(FlightError::RequiredModuleNotFound { ref module }) if module == "bcFlow2"
        ));
        assert_eq!(link.active_subscriptions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activate_rejects_invalid_config() {
        let link = SimulatedLink::default();
        let config = MotionConfig::builder().landing_rate(0.0).build();

        let result = MotionController::activate(link.clone(), config).await;

        assert!(matches!(result, Err(FlightError::Config(_))));
        assert_eq!(link.active_subscriptions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activate_ignores_partial_records() {
        let (_link, mut controller) = activated(
            SimConfig::builder()
                .start(START)
                .partial_every(2)
                .build(),
        )
        .await;

        assert_eq!(controller.home(), &START);
        controller.takeoff(0.5).await.unwrap();
        assert!(controller.is_flying());
    }

    #[tokio::test(start_paused = true)]
    async fn test_move_on_ground_is_rejected() {
        let (link, mut controller) = activated(SimConfig::default()).await;
        let before = *controller.target();

        let result = controller.forward(1.0).await;

        assert!(matches!(
            result,
            Err(FlightError::Transition(TransitionError::CannotMoveOnGround))
        ));
        assert_eq!(controller.target(), &before);
        assert!(link.issued().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_takeoff() {
        let (link, controller) = flying().await;

        assert!(controller.is_flying());
        assert!((controller.target().z - (START.z + 1.0)).abs() < 1e-12);
        assert_near(&link.position(), controller.target(), 0.075);

        let issued = link.issued();
        assert_eq!(issued.len(), 2);
        assert!(matches!(
            issued[0],
            IssuedCommand::Ascend { height, duration }
                if (height - (START.z + 0.5)).abs() < 1e-12 && duration == Duration::from_secs(1)
        ));
        assert!(matches!(issued[1], IssuedCommand::GoTo { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_takeoff_twice_is_rejected() {
        let (link, mut controller) = flying().await;
        let before = *controller.target();

        let result = controller.takeoff(1.0).await;

        assert!(matches!(
            result,
            Err(FlightError::Transition(TransitionError::AlreadyFlying))
        ));
        assert_eq!(controller.target(), &before);
        assert_eq!(link.issued().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_takeoff_corrects_ground_effect_drift() {
        let (link, mut controller) = activated(
            SimConfig::builder()
                .start(START)
                .takeoff_drift(0.3)
                .build(),
        )
        .await;

        controller.takeoff(1.0).await.unwrap();

        let position = link.position();
        assert!((position.x - START.x).abs() <= 0.075);
        assert!((position.z - (START.z + 1.0)).abs() <= 0.075);
    }

    #[tokio::test(start_paused = true)]
    async fn test_land_on_ground_is_rejected() {
        let (link, mut controller) = activated(SimConfig::default()).await;

        let result = controller.land().await;

        assert!(matches!(
            result,
            Err(FlightError::Transition(TransitionError::AlreadyLanded))
        ));
        assert!(link.issued().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_land() {
        let (link, mut controller) = flying().await;

        controller.land().await.unwrap();

        assert!(!controller.is_flying());
        assert_eq!(controller.target().z, controller.home().z);
        assert_eq!(link.position().z, START.z);
        assert!(matches!(
            link.issued().last(),
            Some(IssuedCommand::Descend { height, .. }) if (height - (START.z + 0.04)).abs() < 1e-12
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_move_duration_follows_speed_mode() {
        let (link, mut controller) = flying().await;

        controller.forward(1.0).await.unwrap();
        assert!((last_go_to_duration(&link).as_secs_f64() - 4.0).abs() < 0.05);

        controller.set_mode(true);
        controller.forward(1.0).await.unwrap();
        assert!((last_go_to_duration(&link).as_secs_f64() - 1.0).abs() < 0.05);

        // A switch flipped from elsewhere applies to the next move
        controller.speed_selector().set_fast(false);
        controller.back(1.0).await.unwrap();
        assert!((last_go_to_duration(&link).as_secs_f64() - 4.0).abs() < 0.05);
    }

    #[tokio::test(start_paused = true)]
    async fn test_turn_duration_uses_angular_rate() {
        let (link, mut controller) = flying().await;

        controller.turn_left(90.0).await.unwrap();

        // 90 degrees at 45 deg/s
        assert!((last_go_to_duration(&link).as_secs_f64() - 2.0).abs() < 0.05);
        assert_eq!(controller.target().yaw, 90.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_moves_follow_heading() {
        let (link, mut controller) = flying().await;
        let hover = *controller.target();

        controller.turn_left(90.0).await.unwrap();
        controller.forward(1.0).await.unwrap();
        controller.right(0.5).await.unwrap();

        // Facing +y: forward is +y, right is +x
        let expected = Position::new(hover.x + 0.5, hover.y + 1.0, hover.z, 90.0);
        assert_near(controller.target(), &expected, 1e-9);
        assert_near(&link.position(), &expected, 0.075);
    }

    #[tokio::test(start_paused = true)]
    async fn test_yaw_accumulates_past_half_turn() {
        let (_link, mut controller) = flying().await;

        controller.turn_left(135.0).await.unwrap();
        controller.turn_left(135.0).await.unwrap();
        controller.turn_left(135.0).await.unwrap();

        // Reported yaw wraps, the target does not
        assert_eq!(controller.target().yaw, 405.0);
        assert!(controller.current().unwrap().angle_to(controller.target()) <= 2.5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forward_back_round_trip() {
        let (_link, mut controller) = flying().await;

        for turn in [0.0, 37.0, 120.0] {
            controller.turn_left(turn).await.unwrap();
            let before = *controller.target();

            controller.forward(1.0).await.unwrap();
            controller.back(1.0).await.unwrap();

            assert_near(controller.target(), &before, 1e-9);
            assert_eq!(controller.target().yaw, before.yaw);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_combined_move() {
        let (_link, mut controller) = flying().await;
        let hover = *controller.target();

        controller
            .move_by(
                MoveDelta::builder()
                    .forward(1.0)
                    .back(0.25)
                    .up(0.5)
                    .down(0.25)
                    .build(),
            )
            .await
            .unwrap();

        let expected = Position::new(hover.x + 0.75, hover.y, hover.z + 0.25, hover.yaw);
        assert_near(controller.target(), &expected, 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settles_despite_noise() {
        let (link, mut controller) = activated(
            SimConfig::builder()
                .start(START)
                .noise(0.02)
                .seed(42)
                .build(),
        )
        .await;

        controller.takeoff(1.0).await.unwrap();
        controller.left(0.5).await.unwrap();

        assert_near(&link.position(), controller.target(), 0.075);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_timeout() {
        let link = SimulatedLink::new(SimConfig::builder().frozen(true).build());
        let config = MotionConfig::builder()
            .settle_timeout(Duration::from_secs(2))
            .build();
        let mut controller = MotionController::activate(link.clone(), config).await.unwrap();

        let result = controller.takeoff(1.0).await;

        assert!(matches!(
            result,
            Err(FlightError::SettleTimeout { limit, .. }) if limit == Duration::from_secs(2)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_settles_after_late_arrival() {
        let (link, mut controller) =
            activated(SimConfig::builder().start(START).lag(1.5).build()).await;
        controller.takeoff(1.0).await.unwrap();

        let started = tokio::time::Instant::now();
        controller.forward(1.0).await.unwrap();

        // Planned for 4 s, the vehicle needs 6 s
        assert!((last_go_to_duration(&link).as_secs_f64() - 4.0).abs() < 0.05);
        assert!(started.elapsed() > Duration::from_secs(5));
        assert_near(&link.position(), controller.target(), 0.075);
    }

    #[tokio::test(start_paused = true)]
    async fn test_telemetry_loss_during_move() {
        let (link, mut controller) = flying().await;

        let remote = link.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(500)).await;
            remote.disconnect();
        });
        let result = controller.forward(1.0).await;

        assert!(matches!(result, Err(FlightError::TelemetryClosed)));
        assert!(matches!(
            controller.current(),
            Err(FlightError::TelemetryClosed)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_failure_is_reported() {
        let (link, mut controller) = flying().await;

        link.disconnect();
        let result = controller.forward(1.0).await;

        assert!(matches!(result, Err(FlightError::Link(LinkError::Closed))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deactivate_lands_when_flying() {
        let (link, controller) = flying().await;

        controller.deactivate().await.unwrap();

        assert!(matches!(
            link.issued().last(),
            Some(IssuedCommand::Descend { .. })
        ));
        assert_eq!(link.position().z, START.z);
        assert_eq!(link.active_subscriptions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deactivate_on_ground() {
        let (link, controller) = activated(SimConfig::default()).await;

        controller.deactivate().await.unwrap();

        assert!(link.issued().is_empty());
        assert_eq!(link.active_subscriptions(), 0);
    }
}
