use std::collections::VecDeque;
use std::time::Duration;

use tracing::debug;

use super::StateMachine;
use crate::config::{MotionConfig, SpeedProfile};
use crate::planner::{self, RelativeMove};
use crate::position::Position;

/// Whether the vehicle is on the ground or in the air.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightState {
    Grounded,
    Flying,
}

/// A request the flight machine refused. Refusals never change any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("the drone is already flying, cannot take off again")]
    AlreadyFlying,

    #[error("the drone is not flying, cannot land")]
    AlreadyLanded,

    #[error("the drone cannot move on the ground, it must take off first")]
    CannotMoveOnGround,

    #[error("requested distance is not a finite number")]
    NonFiniteDistance,
}

/// An absolute-pose command for the vehicle, with the time it is given to complete.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlightCommand {
    /// Climb vertically to `height`.
    Ascend { height: f64, duration: Duration },
    /// Descend vertically to `height` and cut the motors, then rest for `cooldown`.
    Descend {
        height: f64,
        duration: Duration,
        cooldown: Duration,
    },
    /// Fly to `target` and hold it until the measured pose has settled.
    GoTo { target: Position, duration: Duration },
}

impl FlightCommand {
    /// Total time to wait after issuing the command before checking the pose.
    pub fn wait(&self) -> Duration {
        match self {
            Self::Ascend { duration, .. } | Self::GoTo { duration, .. } => *duration,
            Self::Descend {
                duration, cooldown, ..
            } => duration.saturating_add(*cooldown),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct FixedRates {
    takeoff_rate: f64,
    takeoff_hop: f64,
    landing_rate: f64,
    landing_fall_distance: f64,
    landing_cooldown: Duration,
}

impl From<&MotionConfig> for FixedRates {
    fn from(config: &MotionConfig) -> Self {
        Self {
            takeoff_rate: config.takeoff_rate,
            takeoff_hop: config.takeoff_hop,
            landing_rate: config.landing_rate,
            landing_fall_distance: config.landing_fall_distance,
            landing_cooldown: config.landing_cooldown,
        }
    }
}

/// Takeoff, landing and relative-move logic around a home and a target pose.
///
/// The machine owns the intended trajectory. Measured poses and the active speed profile come in
/// with each input; commands come out through [`poll_output`](StateMachine::poll_output).
#[derive(Debug)]
pub struct FlightMachine {
    rates: FixedRates,
    state: FlightState,
    home: Position,
    target: Position,
    pending: VecDeque<FlightOutput>,
}

impl FlightMachine {
    /// A grounded machine whose home and target are the first measured pose.
    pub fn new(home: Position, config: &MotionConfig) -> Self {
        Self {
            rates: FixedRates::from(config),
            state: FlightState::Grounded,
            home,
            target: home,
            pending: VecDeque::new(),
        }
    }

    pub fn state(&self) -> FlightState {
        self.state
    }

    pub fn is_flying(&self) -> bool {
        self.state == FlightState::Flying
    }

    pub fn home(&self) -> &Position {
        &self.home
    }

    pub fn target(&self) -> &Position {
        &self.target
    }

    fn takeoff(&mut self, height: f64, current: &Position) -> Result<(), TransitionError> {
        if self.state != FlightState::Grounded {
            return Err(TransitionError::AlreadyFlying);
        }
        if !height.is_finite() {
            return Err(TransitionError::NonFiniteDistance);
        }

        self.state = FlightState::Flying;
        self.target.z += height;

        // Quick fixed hop out of ground effect; the approach that follows fixes height and drift
        let hop = self.rates.takeoff_hop;
        self.emit(FlightCommand::Ascend {
            height: current.z + hop,
            duration: planner::vertical_duration(hop, self.rates.takeoff_rate),
        });

        Ok(())
    }

    fn approach(
        &mut self,
        current: &Position,
        profile: &SpeedProfile,
    ) -> Result<(), TransitionError> {
        if self.state != FlightState::Flying {
            return Err(TransitionError::CannotMoveOnGround);
        }

        self.emit_go_to(current, profile);
        Ok(())
    }

    fn relative_move(
        &mut self,
        relative: &RelativeMove,
        current: &Position,
        profile: &SpeedProfile,
    ) -> Result<(), TransitionError> {
        if self.state != FlightState::Flying {
            return Err(TransitionError::CannotMoveOnGround);
        }
        if !relative.is_finite() {
            return Err(TransitionError::NonFiniteDistance);
        }

        self.target = planner::plan(&self.target, relative);
        self.emit_go_to(current, profile);
        Ok(())
    }

    fn land(&mut self, current: &Position) -> Result<(), TransitionError> {
        if self.state != FlightState::Flying {
            return Err(TransitionError::AlreadyLanded);
        }

        self.state = FlightState::Grounded;
        self.target.z = self.home.z;

        let fall = current.z - self.target.z;
        self.emit(FlightCommand::Descend {
            height: self.target.z + self.rates.landing_fall_distance,
            duration: planner::vertical_duration(fall, self.rates.landing_rate),
            cooldown: self.rates.landing_cooldown,
        });

        Ok(())
    }

    fn emit_go_to(&mut self, current: &Position, profile: &SpeedProfile) {
        let duration = planner::flight_duration(
            current.distance_to(&self.target),
            current.angle_to(&self.target),
            profile,
        );
        self.emit(FlightCommand::GoTo {
            target: self.target,
            duration,
        });
    }

    fn emit(&mut self, command: FlightCommand) {
        debug!(?command, target = %self.target, "Flight command planned");
        self.pending.push_back(FlightOutput::Command(command));
    }

    fn reject(&mut self, error: TransitionError) {
        debug!(%error, state = ?self.state, "Flight request rejected");
        self.pending.push_back(FlightOutput::Rejected(error));
    }
}

pub enum FlightInput {
    /// Leave the ground and end up `height` above the pre-takeoff target.
    Takeoff { height: f64, current: Position },
    /// Fly to the current target without changing it.
    Approach {
        current: Position,
        profile: SpeedProfile,
    },
    /// Shift the target by a body-frame move and fly there.
    Move {
        relative: RelativeMove,
        current: Position,
        profile: SpeedProfile,
    },
    /// Return to the ground at home altitude.
    Land { current: Position },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlightOutput {
    Command(FlightCommand),
    Rejected(TransitionError),
}

impl StateMachine for FlightMachine {
    type Input = FlightInput;
    type Output = FlightOutput;

    fn process_input(&mut self, input: Self::Input) {
        let result = match input {
            FlightInput::Takeoff { height, current } => self.takeoff(height, &current),
            FlightInput::Approach { current, profile } => self.approach(&current, &profile),
            FlightInput::Move {
                relative,
                current,
                profile,
            } => self.relative_move(&relative, &current, &profile),
            FlightInput::Land { current } => self.land(&current),
        };

        if let Err(error) = result {
            self.reject(error);
        }
    }

    fn poll_output(&mut self) -> Option<Self::Output> {
        self.pending.pop_front()
    }
}
