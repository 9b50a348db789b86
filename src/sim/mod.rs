//! An in-process vehicle implementing [`FlightLink`].
//!
//! The simulated vehicle follows every primitive by linear interpolation over the commanded
//! duration, so a controller driving it sees the same timing it would see on hardware. All time
//! is taken from [`tokio::time`], which lets tests run whole flights on a paused clock.

pub mod subscriptions;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_stream::stream;
use bon::Builder;
use futures::StreamExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::Instant;
use tracing::debug;

use self::subscriptions::{ActiveSubscription, SubscriptionMap};
use crate::config::MIN_TELEMETRY_PERIOD;
use crate::link::{
    CHANNEL_X, CHANNEL_Y, CHANNEL_YAW, CHANNEL_Z, FlightLink, LinkError, POSE_CHANNELS,
    Subscription, SubscriptionId, TelemetryRecord,
};
use crate::position::Position;

/// How the simulated vehicle behaves.
#[derive(Debug, Clone, Builder)]
pub struct SimConfig {
    /// Pose at power-on. Its altitude is also the ground level.
    #[builder(default)]
    pub start: Position,

    /// Hardware modules reported as attached.
    #[builder(default = vec!["bcFlow2".to_string()])]
    pub modules: Vec<String>,

    /// Amplitude of uniform noise added to each reported x, y and z, in metres.
    #[builder(default)]
    pub noise: f64,

    #[builder(default = 7)]
    pub seed: u64,

    /// Sideways drift along x picked up during the takeoff hop, in metres.
    #[builder(default)]
    pub takeoff_drift: f64,

    /// When set, every n-th record is sent without its yaw channel.
    pub partial_every: Option<u32>,

    /// A frozen vehicle accepts commands but never moves.
    #[builder(default)]
    pub frozen: bool,

    /// Factor applied to every commanded duration. Above 1.0 the vehicle arrives late.
    #[builder(default = 1.0)]
    pub lag: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A primitive received by the simulated vehicle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IssuedCommand {
    Ascend { height: f64, duration: Duration },
    Descend { height: f64, duration: Duration },
    GoTo { target: Position, duration: Duration },
}

#[derive(Debug, Clone, Copy)]
struct Trajectory {
    from: Position,
    to: Position,
    started: Instant,
    duration: Duration,
    /// Altitude the vehicle drops to once the segment is complete.
    rest_z: Option<f64>,
}

impl Trajectory {
    fn hold(pos: Position) -> Self {
        Self {
            from: pos,
            to: pos,
            started: Instant::now(),
            duration: Duration::ZERO,
            rest_z: None,
        }
    }

    fn sample(&self, now: Instant) -> Position {
        let elapsed = now.saturating_duration_since(self.started);
        if elapsed >= self.duration {
            let mut end = self.to;
            if let Some(z) = self.rest_z {
                end.z = z;
            }
            return end;
        }

        let t = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        let lerp = |a: f64, b: f64| a + (b - a) * t;
        Position {
            x: lerp(self.from.x, self.to.x),
            y: lerp(self.from.y, self.to.y),
            z: lerp(self.from.z, self.to.z),
            yaw: lerp(self.from.yaw, self.to.yaw),
        }
    }
}

#[derive(Debug)]
struct SimState {
    config: SimConfig,
    open: AtomicBool,
    trajectory: Mutex<Trajectory>,
    issued: Mutex<Vec<IssuedCommand>>,
    subscriptions: SubscriptionMap,
}

impl SimState {
    fn position(&self) -> Position {
        self.trajectory
            .lock()
            .expect("trajectory lock poisoned")
            .sample(Instant::now())
    }

    fn ensure_open(&self) -> Result<(), LinkError> {
        if self.open.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(LinkError::Closed)
        }
    }

    fn execute(
        &self,
        command: IssuedCommand,
        plan: impl FnOnce(Position) -> (Position, Option<f64>),
    ) -> Result<(), LinkError> {
        self.ensure_open()?;
        debug!(?command, "Simulated vehicle received command");

        self.issued
            .lock()
            .expect("issued command lock poisoned")
            .push(command);

        if self.config.frozen {
            return Ok(());
        }

        let duration = match command {
            IssuedCommand::Ascend { duration, .. }
            | IssuedCommand::Descend { duration, .. }
            | IssuedCommand::GoTo { duration, .. } => duration,
        };

        let duration = if self.config.lag == 1.0 {
            duration
        } else {
            Duration::try_from_secs_f64(duration.as_secs_f64() * self.config.lag)
                .unwrap_or(Duration::MAX)
        };

        let now = Instant::now();
        let mut trajectory = self.trajectory.lock().expect("trajectory lock poisoned");
        let from = trajectory.sample(now);
        let (to, rest_z) = plan(from);
        *trajectory = Trajectory {
            from,
            to,
            started: now,
            duration,
            rest_z,
        };

        Ok(())
    }

    fn record(
        &self,
        pos: Position,
        channels: &[String],
        partial: bool,
        rng: &mut StdRng,
    ) -> TelemetryRecord {
        let noise = self.config.noise;
        let mut jitter = || {
            if noise > 0.0 {
                rng.random_range(-noise..=noise)
            } else {
                0.0
            }
        };
        let reported = Position {
            x: pos.x + jitter(),
            y: pos.y + jitter(),
            z: pos.z + jitter(),
            yaw: wrap_degrees(pos.yaw),
        };

        channels
            .iter()
            .filter(|channel| !(partial && channel.as_str() == CHANNEL_YAW))
            .filter_map(|channel| {
                let value = match channel.as_str() {
                    CHANNEL_X => reported.x,
                    CHANNEL_Y => reported.y,
                    CHANNEL_Z => reported.z,
                    CHANNEL_YAW => reported.yaw,
                    _ => return None,
                };
                Some((channel.clone(), value))
            })
            .collect()
    }
}

/// Map an accumulated yaw into `(-180, 180]`, the range an onboard estimator reports.
fn wrap_degrees(yaw: f64) -> f64 {
    let wrapped = (yaw + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 { 180.0 } else { wrapped }
}

/// A simulated vehicle. Clones share the same vehicle.
#[derive(Debug, Clone)]
pub struct SimulatedLink {
    state: Arc<SimState>,
}

impl SimulatedLink {
    pub fn new(config: SimConfig) -> Self {
        let start = config.start;
        Self {
            state: Arc::new(SimState {
                config,
                open: AtomicBool::new(true),
                trajectory: Mutex::new(Trajectory::hold(start)),
                issued: Mutex::new(Vec::new()),
                subscriptions: SubscriptionMap::new(),
            }),
        }
    }

    /// The true pose of the vehicle right now, without noise or yaw wrapping.
    pub fn position(&self) -> Position {
        self.state.position()
    }

    /// Every primitive received so far, oldest first.
    pub fn issued(&self) -> Vec<IssuedCommand> {
        self.state
            .issued
            .lock()
            .expect("issued command lock poisoned")
            .clone()
    }

    pub fn active_subscriptions(&self) -> usize {
        self.state.subscriptions.active_count()
    }

    /// Drop the link. Every later request fails with [`LinkError::Closed`].
    pub fn disconnect(&self) {
        self.state.open.store(false, Ordering::Release);
    }
}

impl Default for SimulatedLink {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl FlightLink for SimulatedLink {
    async fn has_module(&self, name: &str) -> Result<bool, LinkError> {
        self.state.ensure_open()?;
        Ok(self.state.config.modules.iter().any(|module| module == name))
    }

    fn subscribe(&self, period: Duration, channels: &[&str]) -> Result<Subscription, LinkError> {
        self.state.ensure_open()?;

        if period < MIN_TELEMETRY_PERIOD {
            return Err(LinkError::PeriodTooShort {
                period,
                minimum: MIN_TELEMETRY_PERIOD,
            });
        }
        if let Some(unknown) = channels.iter().find(|c| !POSE_CHANNELS.contains(*c)) {
            return Err(LinkError::UnknownChannel(unknown.to_string()));
        }

        let channels: Vec<String> = channels.iter().map(|c| c.to_string()).collect();
        let id = self.state.subscriptions.open(ActiveSubscription {
            period,
            channels: channels.clone(),
        });

        let state = Arc::clone(&self.state);
        let stream_id: SubscriptionId = id.clone();
        let records = stream! {
            let mut rng = StdRng::seed_from_u64(state.config.seed);
            let mut ticker = tokio::time::interval(period);
            let mut count: u32 = 0;

            loop {
                ticker.tick().await;
                let active = state.subscriptions.is_active(&stream_id);
                if !active || state.ensure_open().is_err() {
                    break;
                }

                count = count.wrapping_add(1);
                let partial = state.config.partial_every.is_some_and(|n| n > 0 && count % n == 0);
                yield state.record(state.position(), &channels, partial, &mut rng);
            }
        };

        Ok(Subscription {
            id,
            records: records.boxed(),
        })
    }

    fn unsubscribe(&self, id: &SubscriptionId) -> Result<(), LinkError> {
        self.state.subscriptions.close(id)?;
        Ok(())
    }

    async fn ascend_to(&self, height: f64, duration: Duration) -> Result<(), LinkError> {
        let drift = self.state.config.takeoff_drift;
        self.state
            .execute(IssuedCommand::Ascend { height, duration }, |from| {
                let to = Position {
                    x: from.x + drift,
                    z: height,
                    ..from
                };
                (to, None)
            })
    }

    async fn descend_to(&self, height: f64, duration: Duration) -> Result<(), LinkError> {
        let ground = self.state.config.start.z;
        self.state
            .execute(IssuedCommand::Descend { height, duration }, |from| {
                (Position { z: height, ..from }, Some(ground))
            })
    }

    async fn go_to(
        &self,
        x: f64,
        y: f64,
        z: f64,
        yaw: f64,
        duration: Duration,
    ) -> Result<(), LinkError> {
        let target = Position::new(x, y, z, yaw.to_degrees());
        self.state
            .execute(IssuedCommand::GoTo { target, duration }, |_| (target, None))
    }
}
