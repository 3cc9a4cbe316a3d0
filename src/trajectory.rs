//! Trajectory integration for a flywheel-launched ball.
//!
//! Coordinates are field coordinates: `x`/`y` on the floor plane, `z` up.
//! The ball leaves the shooter at `launch_height` heading along the robot's
//! yaw, and flight ends when it comes back down through that height.

use log::debug;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::constants::{
    PhysicalConstants, DEFAULT_MAX_TIME_S, DEFAULT_TIME_STEP_S, MIN_DIVISION_THRESHOLD,
    MIN_VELOCITY_THRESHOLD,
};
use crate::error::{check_range, ShooterError};
use crate::params::ShotParameters;

/// Upper bound on `max_time`; a ball from this shooter lands within seconds
const MAX_TIME_LIMIT_S: f64 = 120.0;

/// Smallest accepted step (seconds)
const MIN_TIME_STEP_S: f64 = 1e-5;

/// Cap on `max_time / dt`, which bounds both run time and sample storage
const MAX_INTEGRATION_STEPS: f64 = 1_000_000.0;

/// Numerical scheme used to advance the state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IntegrationMethod {
    /// Velocity first, then position with the new velocity
    #[default]
    SemiImplicitEuler,
    /// Classic fourth-order Runge-Kutta
    Rk4,
}

/// Step size, time guard and scheme for one integration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntegrationSettings {
    pub dt: f64,
    pub max_time: f64,
    pub method: IntegrationMethod,
}

impl Default for IntegrationSettings {
    fn default() -> Self {
        Self {
            dt: DEFAULT_TIME_STEP_S,
            max_time: DEFAULT_MAX_TIME_S,
            method: IntegrationMethod::SemiImplicitEuler,
        }
    }
}

impl IntegrationSettings {
    pub fn validate(&self) -> Result<(), ShooterError> {
        check_range("dt", self.dt, MIN_TIME_STEP_S, 0.1)?;
        check_range("max_time", self.max_time, self.dt, MAX_TIME_LIMIT_S)?;
        check_range("max_time", self.max_time, self.dt, self.dt * MAX_INTEGRATION_STEPS)?;
        Ok(())
    }
}

/// State of the ball at one instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySample {
    pub time: f64,
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
}

impl TrajectorySample {
    pub fn speed(&self) -> f64 {
        self.velocity.norm()
    }

    fn lerp(a: &TrajectorySample, b: &TrajectorySample, frac: f64) -> TrajectorySample {
        TrajectorySample {
            time: a.time + (b.time - a.time) * frac,
            position: a.position + (b.position - a.position) * frac,
            velocity: a.velocity + (b.velocity - a.velocity) * frac,
        }
    }
}

/// A sampled flight, from launch to ground contact.
///
/// When `converged` is false the integration ran out of time before the ball
/// came back down, and the last sample is not a landing point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TrajectoryRecord")]
pub struct Trajectory {
    samples: Vec<TrajectorySample>,
    converged: bool,
    include_air_effects: bool,
}

/// Unchecked wire form; a trajectory always holds at least its launch sample
#[derive(Deserialize)]
struct TrajectoryRecord {
    samples: Vec<TrajectorySample>,
    converged: bool,
    include_air_effects: bool,
}

impl TryFrom<TrajectoryRecord> for Trajectory {
    type Error = String;

    fn try_from(record: TrajectoryRecord) -> Result<Self, Self::Error> {
        if record.samples.is_empty() {
            return Err("trajectory has no samples".to_string());
        }
        Ok(Trajectory {
            samples: record.samples,
            converged: record.converged,
            include_air_effects: record.include_air_effects,
        })
    }
}

impl Trajectory {
    pub fn samples(&self) -> &[TrajectorySample] {
        &self.samples
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    pub fn include_air_effects(&self) -> bool {
        self.include_air_effects
    }

    /// Launch state (always present)
    pub fn launch(&self) -> &TrajectorySample {
        &self.samples[0]
    }

    pub fn last(&self) -> &TrajectorySample {
        &self.samples[self.samples.len() - 1]
    }

    /// Landing sample, if the ball actually landed
    pub fn landing(&self) -> Option<&TrajectorySample> {
        self.converged.then(|| self.last())
    }

    /// Landing `(x, y)` on the field
    pub fn landing_point(&self) -> Option<(f64, f64)> {
        self.landing().map(|s| (s.position.x, s.position.y))
    }

    /// Horizontal distance from the launch position to the landing point
    pub fn landing_distance(&self) -> Option<f64> {
        self.landing().map(|s| self.downrange(s))
    }

    pub fn flight_time(&self) -> Option<f64> {
        self.landing().map(|s| s.time)
    }

    /// Highest sample of the flight
    pub fn apex(&self) -> &TrajectorySample {
        self.samples
            .iter()
            .fold(self.launch(), |best, s| if s.position.z > best.position.z { s } else { best })
    }

    /// Horizontal distance of a sample from the launch position
    pub fn downrange(&self, sample: &TrajectorySample) -> f64 {
        let offset = sample.position - self.launch().position;
        (offset.x * offset.x + offset.y * offset.y).sqrt()
    }

    /// `(downrange, height)` pairs for a side-view plot
    pub fn downrange_profile(&self) -> Vec<(f64, f64)> {
        self.samples
            .iter()
            .map(|s| (self.downrange(s), s.position.z))
            .collect()
    }

    /// Point where the falling ball passes `height`, interpolated between samples.
    ///
    /// Only crossings after the apex count; `None` if the ball never gets that
    /// high or never comes back down through it.
    pub fn descending_crossing(&self, height: f64) -> Option<TrajectorySample> {
        self.samples.windows(2).find_map(|pair| {
            let (a, b) = (&pair[0], &pair[1]);
            if b.velocity.z < 0.0 && a.position.z >= height && b.position.z < height {
                let span = a.position.z - b.position.z;
                let frac = if span > MIN_DIVISION_THRESHOLD {
                    (a.position.z - height) / span
                } else {
                    0.0
                };
                Some(TrajectorySample::lerp(a, b, frac))
            } else {
                None
            }
        })
    }

    /// Interpolated state when the ball first reaches `distance` downrange
    pub fn sample_at_distance(&self, distance: f64) -> Option<TrajectorySample> {
        self.samples.windows(2).find_map(|pair| {
            let (d0, d1) = (self.downrange(&pair[0]), self.downrange(&pair[1]));
            if d0 <= distance && distance <= d1 {
                let span = d1 - d0;
                let frac = if span > MIN_DIVISION_THRESHOLD {
                    (distance - d0) / span
                } else {
                    0.0
                };
                Some(TrajectorySample::lerp(&pair[0], &pair[1], frac))
            } else {
                None
            }
        })
    }

    /// Ball height when it first reaches `distance` downrange
    pub fn height_at_distance(&self, distance: f64) -> Option<f64> {
        self.sample_at_distance(distance).map(|s| s.position.z)
    }
}

/// Forces acting on the ball, reduced to per-unit-mass factors
struct FlightModel {
    gravity: Vector3<f64>,
    heading: Vector3<f64>,
    drag_per_v2: f64,
    lift_per_v: f64,
    include_air_effects: bool,
}

impl FlightModel {
    fn new(params: &ShotParameters, constants: &PhysicalConstants, include_air_effects: bool) -> Self {
        let area = constants.ball_area_m2();
        let rho = constants.air_density_kg_m3;
        let mass = constants.ball_mass_kg;
        let spin = params.ball_spin(constants);
        let yaw = params.orientation_rad();

        Self {
            gravity: Vector3::new(0.0, 0.0, -constants.gravity_mps2),
            heading: Vector3::new(yaw.cos(), yaw.sin(), 0.0),
            drag_per_v2: 0.5 * params.c_drag * rho * area / mass,
            lift_per_v: 0.5 * rho * area * constants.ball_radius_m * spin * params.c_lift / mass,
            include_air_effects,
        }
    }

    fn acceleration(&self, velocity: &Vector3<f64>) -> Vector3<f64> {
        if !self.include_air_effects {
            return self.gravity;
        }

        let speed = velocity.norm();
        if speed < MIN_VELOCITY_THRESHOLD {
            return self.gravity;
        }

        // Drag opposes velocity
        let drag = -velocity / speed * (self.drag_per_v2 * speed * speed);

        // Magnus lift: velocity rotated +90° within the vertical plane of the shot
        let theta = velocity.z.atan2(velocity.dot(&self.heading));
        let lift_dir = self.heading * -theta.sin() + Vector3::z() * theta.cos();
        let lift = lift_dir * (self.lift_per_v * speed);

        self.gravity + drag + lift
    }

    fn step(
        &self,
        method: IntegrationMethod,
        position: &Vector3<f64>,
        velocity: &Vector3<f64>,
        dt: f64,
    ) -> (Vector3<f64>, Vector3<f64>) {
        match method {
            IntegrationMethod::SemiImplicitEuler => {
                let new_velocity = velocity + self.acceleration(velocity) * dt;
                (position + new_velocity * dt, new_velocity)
            }
            IntegrationMethod::Rk4 => {
                // Forces depend on velocity only
                let acc1 = self.acceleration(velocity);
                let vel2 = velocity + acc1 * (dt * 0.5);
                let acc2 = self.acceleration(&vel2);
                let vel3 = velocity + acc2 * (dt * 0.5);
                let acc3 = self.acceleration(&vel3);
                let vel4 = velocity + acc3 * dt;
                let acc4 = self.acceleration(&vel4);

                let new_position = position + (velocity + vel2 * 2.0 + vel3 * 2.0 + vel4) * (dt / 6.0);
                let new_velocity = velocity + (acc1 + acc2 * 2.0 + acc3 * 2.0 + acc4) * (dt / 6.0);
                (new_position, new_velocity)
            }
        }
    }
}

/// Launch state: exit speed split along the launch angle and robot yaw
pub fn launch_state(params: &ShotParameters, constants: &PhysicalConstants) -> TrajectorySample {
    let speed = params.exit_speed(constants);
    let (angle, yaw) = (params.angle_rad(), params.orientation_rad());
    let horizontal = speed * angle.cos();

    TrajectorySample {
        time: 0.0,
        position: Vector3::new(
            params.launch_position.x,
            params.launch_position.y,
            params.launch_height,
        ),
        velocity: Vector3::new(
            horizontal * yaw.cos(),
            horizontal * yaw.sin(),
            speed * angle.sin(),
        ),
    }
}

/// Integrate one flight.
///
/// With `include_air_effects` false only gravity acts, giving the ideal
/// vacuum trajectory used for comparison.
pub fn integrate(
    params: &ShotParameters,
    constants: &PhysicalConstants,
    settings: &IntegrationSettings,
    include_air_effects: bool,
) -> Result<Trajectory, ShooterError> {
    params.validate()?;
    constants.validate()?;
    settings.validate()?;

    let model = FlightModel::new(params, constants, include_air_effects);
    let ground = params.launch_height;
    let dt = settings.dt;
    let max_steps = (settings.max_time / dt + 1e-6).floor() as usize;

    let mut samples = Vec::with_capacity(max_steps.min(4096) + 1);
    samples.push(launch_state(params, constants));

    let mut converged = false;
    for step in 1..=max_steps {
        let prev = samples[samples.len() - 1];
        let (position, velocity) = model.step(settings.method, &prev.position, &prev.velocity, dt);
        let next = TrajectorySample {
            time: step as f64 * dt,
            position,
            velocity,
        };

        if next.velocity.z < 0.0 && next.position.z < ground {
            let span = prev.position.z - next.position.z;
            let frac = if span > MIN_DIVISION_THRESHOLD {
                ((prev.position.z - ground) / span).clamp(0.0, 1.0)
            } else {
                1.0
            };
            let mut landing = TrajectorySample::lerp(&prev, &next, frac);

            if landing.time > prev.time {
                landing.position.z = ground;
                samples.push(landing);
            } else if samples.len() > 1 {
                // Crossing coincides with the previous sample
                let last = samples.len() - 1;
                samples[last] = landing;
            } else {
                // Ball dropped straight off the shooter
                samples.push(next);
            }
            converged = true;
            break;
        }

        samples.push(next);
    }

    if !converged {
        debug!(
            "integration hit max_time {:.3}s without ground contact (angle {:.2}°, rpm {:.0})",
            settings.max_time, params.angle_deg, params.rpm
        );
    }

    Ok(Trajectory {
        samples,
        converged,
        include_air_effects,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::LaunchPosition;
    use proptest::prelude::*;

    fn vacuum_shot(angle_deg: f64) -> ShotParameters {
        ShotParameters {
            angle_deg,
            rpm: 3000.0,
            c_roll: 1.0,
            c_drag: 0.0,
            c_lift: 0.0,
            launch_position: LaunchPosition { x: 0.0, y: 0.0 },
            orientation_deg: 0.0,
            launch_height: 0.0,
        }
    }

    fn ideal_range(params: &ShotParameters, constants: &PhysicalConstants) -> f64 {
        let v = params.exit_speed(constants);
        v * v * (2.0 * params.angle_rad()).sin() / constants.gravity_mps2
    }

    #[test]
    fn test_ideal_range_matches_closed_form_at_45() {
        let params = vacuum_shot(45.0);
        let constants = PhysicalConstants::default();
        let trajectory = integrate(&params, &constants, &IntegrationSettings::default(), false).unwrap();

        assert!(trajectory.converged());
        let range = trajectory.landing_distance().unwrap();
        // 15.96² / 9.81
        assert!((ideal_range(&params, &constants) - 25.96).abs() < 0.02);
        assert!((range - ideal_range(&params, &constants)).abs() < 0.05, "range {range}");
    }

    #[test]
    fn test_rk4_ideal_range_is_tight() {
        let params = vacuum_shot(30.0);
        let constants = PhysicalConstants::default();
        let settings = IntegrationSettings {
            method: IntegrationMethod::Rk4,
            ..Default::default()
        };
        let trajectory = integrate(&params, &constants, &settings, false).unwrap();
        let range = trajectory.landing_distance().unwrap();
        assert!((range - ideal_range(&params, &constants)).abs() < 1e-3, "range {range}");
    }

    #[test]
    fn test_drag_shortens_flight() {
        let constants = PhysicalConstants::default();
        let settings = IntegrationSettings::default();
        let params = ShotParameters {
            c_drag: 0.5,
            ..vacuum_shot(45.0)
        };

        let ideal = integrate(&params, &constants, &settings, false).unwrap();
        let real = integrate(&params, &constants, &settings, true).unwrap();
        assert!(real.landing_distance().unwrap() < ideal.landing_distance().unwrap());
        assert!(real.apex().position.z < ideal.apex().position.z);
    }

    #[test]
    fn test_backspin_lift_extends_flight() {
        let constants = PhysicalConstants::default();
        let settings = IntegrationSettings::default();
        let base = ShotParameters {
            c_roll: 0.6,
            c_drag: 0.3,
            ..vacuum_shot(45.0)
        };
        let lifted = ShotParameters { c_lift: 0.5, ..base };

        let plain = integrate(&base, &constants, &settings, true).unwrap();
        let with_lift = integrate(&lifted, &constants, &settings, true).unwrap();
        assert!(with_lift.flight_time().unwrap() > plain.flight_time().unwrap());
    }

    #[test]
    fn test_orientation_rotates_landing_point() {
        let constants = PhysicalConstants::default();
        let settings = IntegrationSettings::default();
        let params = ShotParameters {
            orientation_deg: 90.0,
            launch_position: LaunchPosition { x: 1.0, y: 2.0 },
            ..vacuum_shot(45.0)
        };
        let trajectory = integrate(&params, &constants, &settings, false).unwrap();
        let (x, y) = trajectory.landing_point().unwrap();
        assert!((x - 1.0).abs() < 1e-9);
        assert!(y > 20.0);
    }

    #[test]
    fn test_landing_sample_ends_on_launch_plane() {
        let params = ShotParameters::default();
        let constants = PhysicalConstants::default();
        let trajectory = integrate(&params, &constants, &IntegrationSettings::default(), true).unwrap();

        assert!(trajectory.converged());
        let last = trajectory.last();
        assert!((last.position.z - params.launch_height).abs() < 1e-9);
        assert!(last.velocity.z < 0.0);
    }

    #[test]
    fn test_time_guard_flags_non_convergence() {
        let params = vacuum_shot(80.0);
        let constants = PhysicalConstants::default();
        let settings = IntegrationSettings {
            dt: 0.001,
            max_time: 0.5,
            method: IntegrationMethod::SemiImplicitEuler,
        };
        let trajectory = integrate(&params, &constants, &settings, true).unwrap();
        assert!(!trajectory.converged());
        assert!(trajectory.landing_point().is_none());
        assert!(trajectory.landing_distance().is_none());
        assert!(trajectory.last().time <= 0.5 + 1e-9);
    }

    #[test]
    fn test_zero_exit_speed_drops_in_place() {
        let params = ShotParameters {
            c_roll: 0.0,
            ..vacuum_shot(45.0)
        };
        let constants = PhysicalConstants::default();
        let trajectory = integrate(&params, &constants, &IntegrationSettings::default(), true).unwrap();
        assert!(trajectory.converged());
        assert_eq!(trajectory.samples().len(), 2);
        assert!(trajectory.last().time > trajectory.launch().time);
        assert!(trajectory.landing_distance().unwrap() < 1e-9);
    }

    #[test]
    fn test_invalid_inputs_rejected_before_integration() {
        let constants = PhysicalConstants::default();
        let settings = IntegrationSettings::default();
        let bad_angle = ShotParameters { angle_deg: 5.0, ..Default::default() };
        assert_eq!(
            integrate(&bad_angle, &constants, &settings, true).unwrap_err().field(),
            Some("angle_deg")
        );

        let bad_step = IntegrationSettings { dt: 0.0, ..Default::default() };
        assert_eq!(
            integrate(&ShotParameters::default(), &constants, &bad_step, true).unwrap_err().field(),
            Some("dt")
        );
    }

    #[test]
    fn test_deserialize_requires_samples() {
        let constants = PhysicalConstants::default();
        let trajectory =
            integrate(&ShotParameters::default(), &constants, &IntegrationSettings::default(), true).unwrap();
        let json = serde_json::to_string(&trajectory).unwrap();
        let restored: Trajectory = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.samples().len(), trajectory.samples().len());
        assert_eq!(restored.converged(), trajectory.converged());

        let empty = r#"{"samples": [], "converged": false, "include_air_effects": true}"#;
        let err = serde_json::from_str::<Trajectory>(empty).unwrap_err();
        assert!(err.to_string().contains("no samples"), "{err}");
    }

    #[test]
    fn test_step_count_is_bounded() {
        let tiny_step = IntegrationSettings { dt: 1e-9, ..Default::default() };
        assert_eq!(tiny_step.validate().unwrap_err().field(), Some("dt"));

        // Each setting alone is in range, but together they exceed the step cap
        let too_many_steps = IntegrationSettings {
            dt: 1e-5,
            max_time: 60.0,
            ..Default::default()
        };
        assert_eq!(too_many_steps.validate().unwrap_err().field(), Some("max_time"));

        let finest = IntegrationSettings {
            dt: 1e-5,
            max_time: 5.0,
            ..Default::default()
        };
        assert!(finest.validate().is_ok());
    }

    #[test]
    fn test_descending_crossing_and_height_queries() {
        let params = vacuum_shot(45.0);
        let constants = PhysicalConstants::default();
        let settings = IntegrationSettings {
            method: IntegrationMethod::Rk4,
            ..Default::default()
        };
        let trajectory = integrate(&params, &constants, &settings, false).unwrap();

        let crossing = trajectory.descending_crossing(2.0).unwrap();
        assert!((crossing.position.z - 2.0).abs() < 1e-6);
        assert!(crossing.velocity.z < 0.0);
        assert!(trajectory.downrange(&crossing) > trajectory.downrange(trajectory.apex()));

        // Too high to ever reach
        assert!(trajectory.descending_crossing(50.0).is_none());

        // z = x tanθ - g x² / (2 v² cos²θ)
        let v = params.exit_speed(&constants);
        let d = 10.0;
        let expected = d - constants.gravity_mps2 * d * d / (v * v);
        let height = trajectory.height_at_distance(d).unwrap();
        assert!((height - expected).abs() < 1e-3, "height {height} expected {expected}");
        assert!(trajectory.height_at_distance(100.0).is_none());

        let profile = trajectory.downrange_profile();
        assert_eq!(profile.len(), trajectory.samples().len());
        assert_eq!(profile[0], (0.0, 0.0));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_trajectory_starts_at_launch_and_time_increases(
            angle in 10.0f64..=80.0,
            rpm in 1000.0f64..=5000.0,
            c_roll in 0.0f64..=1.0,
            c_drag in 0.0f64..=1.0,
            c_lift in 0.0f64..=1.0,
            orientation in -90.0f64..=90.0,
            x in -5.0f64..5.0,
            y in -5.0f64..5.0,
            air in any::<bool>(),
        ) {
            let params = ShotParameters {
                angle_deg: angle,
                rpm,
                c_roll,
                c_drag,
                c_lift,
                launch_position: LaunchPosition { x, y },
                orientation_deg: orientation,
                launch_height: 0.15,
            };
            let constants = PhysicalConstants::default();
            let trajectory = integrate(&params, &constants, &IntegrationSettings::default(), air).unwrap();

            let first = trajectory.launch();
            prop_assert_eq!(first.time, 0.0);
            prop_assert_eq!(first.position, Vector3::new(x, y, 0.15));
            for pair in trajectory.samples().windows(2) {
                prop_assert!(pair[1].time > pair[0].time);
            }
            if trajectory.converged() {
                prop_assert!(trajectory.last().position.z <= 0.15 + 1e-12);
            }
        }

        #[test]
        fn prop_positive_drag_lands_short_of_ideal(
            angle in 10.0f64..=80.0,
            rpm in 1000.0f64..=5000.0,
            c_roll in 0.3f64..=1.0,
            c_drag in 0.1f64..=1.0,
        ) {
            let params = ShotParameters {
                angle_deg: angle,
                rpm,
                c_roll,
                c_drag,
                c_lift: 0.0,
                ..Default::default()
            };
            let constants = PhysicalConstants::default();
            let settings = IntegrationSettings::default();
            let ideal = integrate(&params, &constants, &settings, false).unwrap();
            let real = integrate(&params, &constants, &settings, true).unwrap();
            prop_assert!(real.landing_distance().unwrap() < ideal.landing_distance().unwrap());
        }
    }
}
