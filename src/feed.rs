use std::time::Duration;

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::controller::error::FlightError;
use crate::link::TelemetryRecord;
use crate::position::Position;
use crate::state_machine::StateMachine;
use crate::state_machine::telemetry::{TelemetryInput, TelemetryMachine, TelemetryOutput};

/// The latest measured pose, kept up to date by a background task.
///
/// The task is the only writer. Readers always see a whole pose, possibly a slightly old one.
#[derive(Debug)]
pub struct TelemetryFeed {
    latest: watch::Receiver<Option<Position>>,
    task: JoinHandle<()>,
}

impl TelemetryFeed {
    /// Spawn a task that reads `records` until the stream ends or the feed is closed.
    pub fn spawn(records: BoxStream<'static, TelemetryRecord>) -> Self {
        let (tx, latest) = watch::channel(None);
        let task = tokio::spawn(run_feed(records, tx));

        Self { latest, task }
    }

    /// The most recent complete pose, if any has arrived yet.
    pub fn latest(&self) -> Option<Position> {
        *self.latest.borrow()
    }

    /// Wait until the first complete pose has arrived and return it.
    pub async fn first_sample(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<Position, FlightError> {
        let wait = async {
            self.latest
                .wait_for(Option::is_some)
                .await
                .map(|pos| *pos)
                .map_err(|_| FlightError::TelemetryClosed)
        };

        let first = match timeout {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .map_err(|_| FlightError::FirstSampleTimeout { limit })??,
            None => wait.await?,
        };

        first.ok_or(FlightError::TelemetryClosed)
    }

    /// Stop the background task. The last pose stays readable until the feed is dropped.
    pub fn close(&self) {
        self.task.abort();
    }

    /// Whether the stream has ended or the feed was closed.
    pub fn is_closed(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for TelemetryFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_feed(
    mut records: BoxStream<'static, TelemetryRecord>,
    tx: watch::Sender<Option<Position>>,
) {
    let mut machine = TelemetryMachine::new();

    while let Some(record) = records.next().await {
        machine.process_input(TelemetryInput::Record(record));

        while let Some(TelemetryOutput::PositionUpdate(pos)) = machine.poll_output() {
            if tx.send_replace(Some(pos)).is_none() {
                info!(position = %pos, "First pose received");
            }
        }
    }

    debug!(discarded = machine.discarded(), "Telemetry stream ended");
}
