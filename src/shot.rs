use serde::{Deserialize, Serialize};

use crate::constants::{FieldGeometry, PhysicalConstants};
use crate::error::ShooterError;
use crate::params::ShotParameters;
use crate::trajectory::{integrate, IntegrationSettings, Trajectory, TrajectorySample};

/// Ideal and real flights of one shot, with where each comes down through
/// the hub's scoring height.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotSimulation {
    pub ideal: Trajectory,
    pub real: Trajectory,
    pub ideal_crossing: Option<TrajectorySample>,
    pub real_crossing: Option<TrajectorySample>,
    pub hub_distance: f64,  // launch position to hub centre
}

impl ShotSimulation {
    /// Real flight passes the scoring height inside the outer ring
    pub fn scores(&self, field: &FieldGeometry) -> bool {
        self.real_crossing
            .map_or(false, |s| field.is_in_hub(s.position.x, s.position.y))
    }

    /// Range lost to air effects, when both flights landed
    pub fn drag_loss(&self) -> Option<f64> {
        Some(self.ideal.landing_distance()? - self.real.landing_distance()?)
    }
}

/// Fly the shot twice, in vacuum and with drag and lift.
pub fn simulate_shot(
    params: &ShotParameters,
    constants: &PhysicalConstants,
    settings: &IntegrationSettings,
    field: &FieldGeometry,
) -> Result<ShotSimulation, ShooterError> {
    let ideal = integrate(params, constants, settings, false)?;
    let real = integrate(params, constants, settings, true)?;

    let scoring_height = field.scoring_height_m();
    let ideal_crossing = ideal.descending_crossing(scoring_height);
    let real_crossing = real.descending_crossing(scoring_height);

    let (hub_x, hub_y) = field.hub_center();
    let hub_distance = ((hub_x - params.launch_position.x).powi(2)
        + (hub_y - params.launch_position.y).powi(2))
    .sqrt();

    Ok(ShotSimulation {
        ideal,
        real,
        ideal_crossing,
        real_crossing,
        hub_distance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_shot() {
        let sim = simulate_shot(
            &ShotParameters::default(),
            &PhysicalConstants::default(),
            &IntegrationSettings::default(),
            &FieldGeometry::default(),
        )
        .unwrap();

        assert!(sim.ideal.converged());
        assert!(sim.real.converged());
        assert!(!sim.ideal.include_air_effects());
        assert!(sim.real.include_air_effects());
        assert!(sim.drag_loss().unwrap() > 0.0);
        assert!(sim.hub_distance > 3.0);
    }

    #[test]
    fn test_crossings_are_on_the_way_down() {
        let field = FieldGeometry::default();
        let params = ShotParameters {
            angle_deg: 60.0,
            rpm: 3500.0,
            c_roll: 0.8,
            ..Default::default()
        };
        let sim = simulate_shot(
            &params,
            &PhysicalConstants::default(),
            &IntegrationSettings::default(),
            &field,
        )
        .unwrap();

        let ideal = sim.ideal_crossing.unwrap();
        let real = sim.real_crossing.unwrap();
        for crossing in [ideal, real] {
            assert!((crossing.position.z - field.scoring_height_m()).abs() < 1e-9);
            assert!(crossing.velocity.z < 0.0);
        }
        // Drag brings the ball down sooner and shorter
        assert!(real.position.x < ideal.position.x);
        assert!(real.time < ideal.time);
    }

    #[test]
    fn test_low_shot_never_reaches_scoring_height() {
        let field = FieldGeometry::default();
        let params = ShotParameters {
            angle_deg: 15.0,
            rpm: 1500.0,
            ..Default::default()
        };
        let sim = simulate_shot(
            &params,
            &PhysicalConstants::default(),
            &IntegrationSettings::default(),
            &field,
        )
        .unwrap();

        assert!(sim.ideal_crossing.is_none());
        assert!(sim.real_crossing.is_none());
        assert!(!sim.scores(&field));
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let params = ShotParameters {
            c_drag: 1.2,
            ..Default::default()
        };
        let err = simulate_shot(
            &params,
            &PhysicalConstants::default(),
            &IntegrationSettings::default(),
            &FieldGeometry::default(),
        )
        .unwrap_err();
        assert_eq!(err.field(), Some("c_drag"));
    }
}
