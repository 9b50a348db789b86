use super::{FlightError, MotionController};
use crate::link::FlightLink;
use crate::planner::MoveDelta;

/// Single-direction shorthands for [`MotionController::move_by`].
impl<L: FlightLink> MotionController<L> {
    pub async fn forward(&mut self, distance: f64) -> Result<(), FlightError> {
        self.move_by(MoveDelta::builder().forward(distance).build()).await
    }

    pub async fn back(&mut self, distance: f64) -> Result<(), FlightError> {
        self.move_by(MoveDelta::builder().back(distance).build()).await
    }

    pub async fn left(&mut self, distance: f64) -> Result<(), FlightError> {
        self.move_by(MoveDelta::builder().left(distance).build()).await
    }

    pub async fn right(&mut self, distance: f64) -> Result<(), FlightError> {
        self.move_by(MoveDelta::builder().right(distance).build()).await
    }

    pub async fn up(&mut self, distance: f64) -> Result<(), FlightError> {
        self.move_by(MoveDelta::builder().up(distance).build()).await
    }

    pub async fn down(&mut self, distance: f64) -> Result<(), FlightError> {
        self.move_by(MoveDelta::builder().down(distance).build()).await
    }

    /// Turn counter-clockwise by `angle` degrees.
    pub async fn turn_left(&mut self, angle: f64) -> Result<(), FlightError> {
        self.move_by(MoveDelta::builder().turn_left(angle).build()).await
    }

    /// Turn clockwise by `angle` degrees.
    pub async fn turn_right(&mut self, angle: f64) -> Result<(), FlightError> {
        self.move_by(MoveDelta::builder().turn_right(angle).build()).await
    }
}
