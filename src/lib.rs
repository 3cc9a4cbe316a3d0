//! # Shooter Ballistics
//!
//! Trajectory engine for a flywheel ball shooter: gravity, quadratic drag and
//! Magnus lift, a launch-angle solver, and a Monte Carlo impact-zone estimator.

// Re-export the main types and functions
pub use angle_solver::{
    solve_angle_for_height, solve_optimal_angle, AngleSearchSettings, HubAngleResult,
    OptimalAngleResult,
};
pub use config::{load_config, load_or_default, save_config, ShooterConfig};
pub use constants::{FieldGeometry, PhysicalConstants};
pub use error::ShooterError;
pub use impact_zone::{
    estimate_impact_zone, ImpactZone, ImpactZoneSettings, LandingPoint, PerturbationDistribution,
};
pub use params::{LaunchPosition, ShotParameters};
pub use shot::{simulate_shot, ShotSimulation};
pub use trajectory::{
    integrate, launch_state, IntegrationMethod, IntegrationSettings, Trajectory, TrajectorySample,
};

// Module declarations
pub mod angle_solver;
pub mod config;
pub mod constants;
mod error;
pub mod impact_zone;
pub mod params;
pub mod shot;
pub mod trajectory;
