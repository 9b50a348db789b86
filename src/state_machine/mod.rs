pub mod flight;
pub mod telemetry;

/// The [`StateMachine`] trait separates flight logic that must be deterministic from the runner
/// that talks to the vehicle.
///
/// # Functionality
/// A state machine consumes [`Input`](StateMachine::Input) values and produces
/// [`Output`](StateMachine::Output) values. Both are usually enums with one variant per kind of
/// event. [`process_input`](StateMachine::process_input) dispatches an input variant to the
/// matching handler, and [`poll_output`](StateMachine::poll_output) drains whatever the handlers
/// left pending, one value per call.
///
/// # Invariants
/// Implementors are pure. The result of feeding a sequence of inputs must depend only on those
/// inputs.
///
/// ## No Interior Mutability
/// State is only changed through `&mut self`. No cells, mutexes, atomics or reference counted
/// pointers.
///
/// ## No IO, Time or Randomness
/// No link traffic, no reading the clock and no system entropy. Anything of that kind (the
/// latest measured pose, the active speed profile) is passed in as part of an input.
///
/// ## No Blocking and No Async
/// Handlers return immediately. Sleeping for a flight duration or polling for a settled pose is
/// the job of the runner, which turns the emitted commands into real waits.
///
/// # Side Effects
/// Logging through `tracing` is allowed as long as the logic never depends on it.
///
/// # Runners
/// [`MotionController`](crate::controller::MotionController) is the runner for the
/// [`FlightMachine`](flight::FlightMachine): it reads the telemetry feed, feeds the pose into the
/// machine, executes the emitted commands on the link and waits for them to settle. The
/// [`TelemetryFeed`](crate::feed::TelemetryFeed) does the same for the
/// [`TelemetryMachine`](telemetry::TelemetryMachine) on its own task.
///
/// # Example
/// ```ignore
/// let mut machine = TelemetryMachine::new();
/// machine.process_input(TelemetryInput::Record(record));
///
/// while let Some(TelemetryOutput::PositionUpdate(pos)) = machine.poll_output() {
///     publish(pos);
/// }
/// ```
pub trait StateMachine {
    /// The type of input that is [processed](StateMachine::process_input) by the state machine.
    type Input;
    /// The type of output that is [polled](StateMachine::poll_output) from the state machine.
    type Output;

    /// Process the provided `input`, dispatching it to the handler for its variant.
    fn process_input(&mut self, input: Self::Input);

    /// Poll the state machine for output, returning the first available output if present.
    fn poll_output(&mut self) -> Option<Self::Output>;
}
