/// Physical constants used in shooter trajectory calculations
use serde::{Deserialize, Serialize};

use crate::error::ShooterError;

/// Gravitational acceleration in m/s²
pub const G_ACCEL_MPS2: f64 = 9.81;

/// Air density at sea level, room temperature (kg/m³)
pub const AIR_DENSITY_SEA_LEVEL: f64 = 1.2;

/// Conversion factor: inches to meters
pub const INCHES_TO_METERS: f64 = 2.54 / 100.0;

/// Flywheel radius (4" wheel)
pub const DEFAULT_WHEEL_RADIUS_M: f64 = 2.0 * INCHES_TO_METERS;

/// Cargo ball radius (15 cm diameter)
pub const DEFAULT_BALL_RADIUS_M: f64 = 0.15 / 2.0;

/// Cargo ball mass in kg
pub const DEFAULT_BALL_MASS_KG: f64 = 0.225;

// Numerical stability constants
/// Minimum threshold for velocity magnitude to avoid division by zero
pub const MIN_VELOCITY_THRESHOLD: f64 = 1e-9;

/// Minimum threshold for preventing division by zero in interpolation
pub const MIN_DIVISION_THRESHOLD: f64 = 1e-12;

// Integration defaults
/// Default integrator step (seconds)
pub const DEFAULT_TIME_STEP_S: f64 = 0.001;

/// Non-convergence guard: integration stops here if the ball never lands
pub const DEFAULT_MAX_TIME_S: f64 = 10.0;

/// Process-wide physical quantities, injected into every core call.
///
/// Nothing here changes during a run. Tests swap in alternative values to
/// check behavior under a different gravity or a thinner atmosphere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalConstants {
    pub wheel_radius_m: f64,
    pub ball_radius_m: f64,
    pub ball_mass_kg: f64,
    pub air_density_kg_m3: f64,
    pub gravity_mps2: f64,
}

impl Default for PhysicalConstants {
    fn default() -> Self {
        Self {
            wheel_radius_m: DEFAULT_WHEEL_RADIUS_M,
            ball_radius_m: DEFAULT_BALL_RADIUS_M,
            ball_mass_kg: DEFAULT_BALL_MASS_KG,
            air_density_kg_m3: AIR_DENSITY_SEA_LEVEL,
            gravity_mps2: G_ACCEL_MPS2,
        }
    }
}

impl PhysicalConstants {
    /// Every constant must be strictly positive (and finite).
    pub fn validate(&self) -> Result<(), ShooterError> {
        let fields = [
            ("wheel_radius_m", self.wheel_radius_m),
            ("ball_radius_m", self.ball_radius_m),
            ("ball_mass_kg", self.ball_mass_kg),
            ("air_density_kg_m3", self.air_density_kg_m3),
            ("gravity_mps2", self.gravity_mps2),
        ];
        for (field, value) in fields {
            if !(value.is_finite() && value > 0.0) {
                return Err(ShooterError::invalid(field, value, f64::MIN_POSITIVE, f64::INFINITY));
            }
        }
        Ok(())
    }

    /// Ball cross-sectional area (m²)
    pub fn ball_area_m2(&self) -> f64 {
        std::f64::consts::PI * self.ball_radius_m.powi(2)
    }
}

/// FRC 2022 (Rapid React) field and hub dimensions, in meters.
///
/// The hub is a truncated cone sitting on a square post. A shot scores when
/// the ball comes down through the outer ring at the scoring height
/// (`hub_height + rim_height + shot_margin`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldGeometry {
    pub field_length_m: f64,
    pub field_width_m: f64,
    pub hub_width_m: f64,
    pub hub_height_m: f64,
    pub rim_height_m: f64,
    pub inner_ring_radius_m: f64,
    pub outer_ring_radius_m: f64,
    pub shot_margin_m: f64,
    pub wall_height_m: f64,
}

impl Default for FieldGeometry {
    fn default() -> Self {
        Self {
            field_length_m: 158.611 * INCHES_TO_METERS,
            field_width_m: 318.188 * INCHES_TO_METERS,
            hub_width_m: 60.0 * INCHES_TO_METERS,
            hub_height_m: 60.0 * INCHES_TO_METERS,
            rim_height_m: 13.5 * INCHES_TO_METERS,
            inner_ring_radius_m: 25.0 / 2.0 * INCHES_TO_METERS,
            outer_ring_radius_m: 45.0 / 2.0 * INCHES_TO_METERS,
            shot_margin_m: 0.1,
            wall_height_m: 20.0 * INCHES_TO_METERS,
        }
    }
}

impl FieldGeometry {
    /// Hub centre in field coordinates
    pub fn hub_center(&self) -> (f64, f64) {
        (
            self.field_length_m + self.hub_width_m / 2.0,
            self.field_width_m / 2.0,
        )
    }

    /// Height at which a descending ball counts as entering the hub
    pub fn scoring_height_m(&self) -> f64 {
        self.hub_height_m + self.rim_height_m + self.shot_margin_m
    }

    /// Whether a point at scoring height lies inside the outer ring
    pub fn is_in_hub(&self, x: f64, y: f64) -> bool {
        let (cx, cy) = self.hub_center();
        ((x - cx).powi(2) + (y - cy).powi(2)).sqrt() < self.outer_ring_radius_m
    }
}
