use tracing::trace;

use super::StateMachine;
use crate::link::{CHANNEL_X, CHANNEL_Y, CHANNEL_YAW, CHANNEL_Z, TelemetryRecord};
use crate::position::Position;

/// Turns raw telemetry records into poses, keeping only the latest complete one.
#[derive(Debug)]
pub struct TelemetryMachine {
    latest_position: Option<Position>,
    pending: bool,
    discarded: u64,
}

impl TelemetryMachine {
    pub fn new() -> Self {
        Self {
            latest_position: None,
            pending: false,
            discarded: 0,
        }
    }

    /// Number of records dropped for missing a pose channel.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    fn update_record(&mut self, record: TelemetryRecord) {
        match parse_pose(&record) {
            Some(pos) => {
                self.latest_position = Some(pos);
                self.pending = true;
            }
            None => {
                self.discarded += 1;
                trace!(channels = record.len(), "Discarded partial telemetry record");
            }
        }
    }

    fn poll_position(&mut self) -> Option<Position> {
        if self.pending {
            self.pending = false;
            self.latest_position
        } else {
            None
        }
    }
}

impl Default for TelemetryMachine {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_pose(record: &TelemetryRecord) -> Option<Position> {
    let pos = Position {
        x: record.get(CHANNEL_X)?,
        y: record.get(CHANNEL_Y)?,
        z: record.get(CHANNEL_Z)?,
        yaw: record.get(CHANNEL_YAW)?,
    };

    pos.is_finite().then_some(pos)
}

pub enum TelemetryInput {
    Record(TelemetryRecord),
}

pub enum TelemetryOutput {
    PositionUpdate(Position),
}

impl StateMachine for TelemetryMachine {
    type Input = TelemetryInput;
    type Output = TelemetryOutput;

    fn process_input(&mut self, input: Self::Input) {
        match input {
            TelemetryInput::Record(record) => self.update_record(record),
        }
    }

    fn poll_output(&mut self) -> Option<Self::Output> {
        self.poll_position().map(TelemetryOutput::PositionUpdate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(x: f64) -> TelemetryRecord {
        [
            (CHANNEL_X, x),
            (CHANNEL_Y, -0.5),
            (CHANNEL_Z, 0.01),
            (CHANNEL_YAW, 12.0),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_initial_state() {
        let mut machine = TelemetryMachine::new();
        assert!(machine.poll_output().is_none());
        assert_eq!(machine.discarded(), 0);
    }

    #[test]
    fn test_update_and_poll() {
        let mut machine = TelemetryMachine::new();

        machine.process_input(TelemetryInput::Record(sample_record(1.5)));

        let expected = Position::new(1.5, -0.5, 0.01, 12.0);
        let output = machine.poll_output();
        assert!(matches!(output, Some(TelemetryOutput::PositionUpdate(p)) if p == expected));

        // Each pose is reported once
        assert!(machine.poll_output().is_none());
    }

    #[test]
    fn test_latest_position_overwrites() {
        let mut machine = TelemetryMachine::new();

        machine.process_input(TelemetryInput::Record(sample_record(1.0)));
        machine.process_input(TelemetryInput::Record(sample_record(2.0)));

        let output = machine.poll_output();
        assert!(matches!(output, Some(TelemetryOutput::PositionUpdate(p)) if p.x == 2.0));
    }

    #[test]
    fn test_partial_record_is_discarded() {
        let mut machine = TelemetryMachine::new();
        machine.process_input(TelemetryInput::Record(sample_record(1.0)));
        let _ = machine.poll_output();

        let partial: TelemetryRecord = [(CHANNEL_X, 9.0), (CHANNEL_Y, 9.0), (CHANNEL_Z, 9.0)]
            .into_iter()
            .collect();
        machine.process_input(TelemetryInput::Record(partial));
        machine.process_input(TelemetryInput::Record(TelemetryRecord::new()));

        let mut corrupt = sample_record(3.0);
        corrupt.insert(CHANNEL_YAW, f64::NAN);
        machine.process_input(TelemetryInput::Record(corrupt));

        assert_eq!(machine.discarded(), 3);
        assert!(machine.poll_output().is_none());

        // The next complete record is still picked up
        machine.process_input(TelemetryInput::Record(sample_record(4.0)));
        let output = machine.poll_output();
        assert!(matches!(output, Some(TelemetryOutput::PositionUpdate(p)) if p.x == 4.0));
    }
}
