use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::constants::PhysicalConstants;
use crate::error::{check_range, ShooterError};

// Valid ranges for user-tunable shot parameters
pub const ANGLE_RANGE_DEG: (f64, f64) = (10.0, 80.0);
pub const RPM_RANGE: (f64, f64) = (1000.0, 5000.0);
pub const COEFFICIENT_RANGE: (f64, f64) = (0.0, 1.0);
pub const ORIENTATION_RANGE_DEG: (f64, f64) = (-90.0, 90.0);
pub const LAUNCH_HEIGHT_RANGE_M: (f64, f64) = (0.0, 2.0);

/// Robot position on the field (meters)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LaunchPosition {
    pub x: f64,
    pub y: f64,
}

/// One snapshot of the shooter setup.
///
/// Rebuilt by the caller on every change and passed by reference into the
/// core; nothing in the core keeps hold of it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShotParameters {
    pub angle_deg: f64,         // launch angle above horizontal
    pub rpm: f64,               // flywheel speed
    pub c_roll: f64,            // fraction of wheel surface speed given to the ball
    pub c_drag: f64,
    pub c_lift: f64,
    pub launch_position: LaunchPosition,
    pub orientation_deg: f64,   // robot yaw, 0 = +x
    pub launch_height: f64,     // meters above the floor
}

impl Default for ShotParameters {
    fn default() -> Self {
        Self {
            angle_deg: 70.0,
            rpm: 2750.0,
            c_roll: 0.5,
            c_drag: 0.6,
            c_lift: 0.0,
            launch_position: LaunchPosition { x: 0.54, y: 0.73 },
            orientation_deg: 0.0,
            launch_height: 0.15,
        }
    }
}

impl ShotParameters {
    /// Check every field against its documented range.
    ///
    /// The first offending field is reported; values are never clamped.
    pub fn validate(&self) -> Result<(), ShooterError> {
        check_range("angle_deg", self.angle_deg, ANGLE_RANGE_DEG.0, ANGLE_RANGE_DEG.1)?;
        check_range("rpm", self.rpm, RPM_RANGE.0, RPM_RANGE.1)?;
        check_range("c_roll", self.c_roll, COEFFICIENT_RANGE.0, COEFFICIENT_RANGE.1)?;
        check_range("c_drag", self.c_drag, COEFFICIENT_RANGE.0, COEFFICIENT_RANGE.1)?;
        check_range("c_lift", self.c_lift, COEFFICIENT_RANGE.0, COEFFICIENT_RANGE.1)?;
        check_range(
            "orientation_deg",
            self.orientation_deg,
            ORIENTATION_RANGE_DEG.0,
            ORIENTATION_RANGE_DEG.1,
        )?;
        check_range(
            "launch_height",
            self.launch_height,
            LAUNCH_HEIGHT_RANGE_M.0,
            LAUNCH_HEIGHT_RANGE_M.1,
        )?;
        check_range(
            "launch_position.x",
            self.launch_position.x,
            f64::MIN,
            f64::MAX,
        )?;
        check_range(
            "launch_position.y",
            self.launch_position.y,
            f64::MIN,
            f64::MAX,
        )?;
        Ok(())
    }

    pub fn with_angle(&self, angle_deg: f64) -> Self {
        Self { angle_deg, ..*self }
    }

    /// Wheel rim speed (m/s)
    pub fn surface_speed(&self, constants: &PhysicalConstants) -> f64 {
        (self.rpm / 60.0) * 2.0 * PI * constants.wheel_radius_m
    }

    /// Ball exit speed (m/s)
    pub fn exit_speed(&self, constants: &PhysicalConstants) -> f64 {
        self.surface_speed(constants) * self.c_roll
    }

    /// Backspin picked up from the speed the ball did not take (rad/s)
    pub fn ball_spin(&self, constants: &PhysicalConstants) -> f64 {
        self.surface_speed(constants) / constants.ball_radius_m * (1.0 - self.c_roll)
    }

    pub fn angle_rad(&self) -> f64 {
        self.angle_deg.to_radians()
    }

    pub fn orientation_rad(&self) -> f64 {
        self.orientation_deg.to_radians()
    }
}
