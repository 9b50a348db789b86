//! Relative-position motion control for small quadrotors.
//!
//! High-level requests such as "take off to 1 m", "move forward 0.5 m" or "turn left 90°" are
//! turned into absolute-pose commands for the vehicle's onboard trajectory primitives. A
//! continuously updated pose estimate decides how long each move is given and when it has
//! settled.

pub mod config;
pub mod controller;
pub mod feed;
pub mod link;
pub mod planner;
pub mod position;
pub mod sim;
pub mod state_machine;

pub use config::{MotionConfig, SpeedProfile};
pub use controller::{FlightError, MotionController, SpeedSelector};
pub use link::{FlightLink, LinkError};
pub use planner::MoveDelta;
pub use position::Position;
