use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::constants::PhysicalConstants;
use crate::error::{check_range, ShooterError};
use crate::params::{ShotParameters, ANGLE_RANGE_DEG};
use crate::trajectory::{integrate, IntegrationSettings};

/// Golden ratio conjugate, (√5 - 1) / 2
const INV_PHI: f64 = 0.618_033_988_749_894_9;

/// Search domain and stopping rules for the launch-angle solvers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleSearchSettings {
    pub min_angle_deg: f64,
    pub max_angle_deg: f64,
    pub coarse_step_deg: f64,        // scan resolution
    pub angle_resolution_deg: f64,   // refinement stops once the bracket is this narrow
    pub tolerance_m: f64,            // error accepted as a hit
    pub max_refine_iterations: usize,
    pub integration: IntegrationSettings,
}

impl Default for AngleSearchSettings {
    fn default() -> Self {
        Self {
            min_angle_deg: ANGLE_RANGE_DEG.0,
            max_angle_deg: ANGLE_RANGE_DEG.1,
            coarse_step_deg: 1.0,
            angle_resolution_deg: 1e-3,
            tolerance_m: 0.03,
            max_refine_iterations: 60,
            integration: IntegrationSettings::default(),
        }
    }
}

impl AngleSearchSettings {
    pub fn validate(&self) -> Result<(), ShooterError> {
        check_range("min_angle_deg", self.min_angle_deg, ANGLE_RANGE_DEG.0, ANGLE_RANGE_DEG.1)?;
        check_range("max_angle_deg", self.max_angle_deg, self.min_angle_deg, ANGLE_RANGE_DEG.1)?;
        check_range("coarse_step_deg", self.coarse_step_deg, 1e-3, 10.0)?;
        check_range("angle_resolution_deg", self.angle_resolution_deg, 1e-9, self.coarse_step_deg)?;
        check_range("tolerance_m", self.tolerance_m, f64::MIN_POSITIVE, f64::MAX)?;
        self.integration.validate()
    }
}

/// Best launch angle for a landing distance.
///
/// `converged` is false when even the best angle misses by more than the
/// tolerance; the angle is then only the closest approximation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimalAngleResult {
    pub angle_deg: f64,
    pub flight_time: f64,
    pub landing_distance: f64,
    pub landing_error: f64,
    pub converged: bool,
    pub evaluations: usize,
}

/// Best launch angle for passing a given height at a given distance (hub aiming)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HubAngleResult {
    pub angle_deg: f64,
    pub height_at_target: f64,
    pub height_error: f64,
    pub time_to_target: f64,
    pub speed_at_target: f64,
    pub converged: bool,
    pub evaluations: usize,
}

/// One objective evaluation at a candidate angle
#[derive(Debug, Clone, Copy)]
struct Evaluation {
    error: f64,
    value: f64,
    time: f64,
    speed: f64,
}

#[derive(Debug, Clone, Copy)]
struct SearchOutcome {
    best: Option<(f64, Evaluation)>,
    evaluations: usize,
}

/// Coarse scan of the whole domain, then golden-section refinement around
/// the best scanned angle.
///
/// Angles whose flight never produces a value (ball never lands, never
/// reaches the distance) are skipped; `best` is `None` only if every angle
/// was skipped.
fn scan_and_refine<F>(settings: &AngleSearchSettings, mut evaluate: F) -> Result<SearchOutcome, ShooterError>
where
    F: FnMut(f64) -> Result<Option<Evaluation>, ShooterError>,
{
    let (lo_bound, hi_bound) = (settings.min_angle_deg, settings.max_angle_deg);
    let step = settings.coarse_step_deg;

    let mut evaluations = 0;
    let mut best: Option<(f64, Evaluation)> = None;
    let mut probe = |angle: f64, best: &mut Option<(f64, Evaluation)>| -> Result<f64, ShooterError> {
        evaluations += 1;
        match evaluate(angle)? {
            Some(eval) => {
                // Strict comparison keeps the lowest angle on ties
                if best.map_or(true, |(_, b)| eval.error < b.error) {
                    *best = Some((angle, eval));
                }
                Ok(eval.error)
            }
            None => Ok(f64::INFINITY),
        }
    };

    // Coarse scan, always including the upper bound
    let n_steps = ((hi_bound - lo_bound) / step).floor() as usize;
    for i in 0..=n_steps {
        probe(lo_bound + i as f64 * step, &mut best)?;
    }
    if lo_bound + n_steps as f64 * step < hi_bound {
        probe(hi_bound, &mut best)?;
    }

    let Some((coarse_angle, coarse_eval)) = best else {
        return Ok(SearchOutcome { best, evaluations });
    };
    debug!("coarse scan best: {:.2}° (error {:.4})", coarse_angle, coarse_eval.error);

    // Golden-section refinement over the bracketing interval
    let mut lo = (coarse_angle - step).max(lo_bound);
    let mut hi = (coarse_angle + step).min(hi_bound);
    let mut c = hi - INV_PHI * (hi - lo);
    let mut d = lo + INV_PHI * (hi - lo);
    let mut fc = probe(c, &mut best)?;
    let mut fd = probe(d, &mut best)?;

    for iteration in 0..settings.max_refine_iterations {
        if hi - lo < settings.angle_resolution_deg {
            break;
        }
        if fc < fd {
            hi = d;
            d = c;
            fd = fc;
            c = hi - INV_PHI * (hi - lo);
            fc = probe(c, &mut best)?;
        } else {
            lo = c;
            c = d;
            fc = fd;
            d = lo + INV_PHI * (hi - lo);
            fd = probe(d, &mut best)?;
        }
        debug!(
            "  refine {}: [{:.5}°, {:.5}°] errors {:.6} / {:.6}",
            iteration, lo, hi, fc, fd
        );
    }

    Ok(SearchOutcome { best, evaluations })
}

fn validate_search(
    params: &ShotParameters,
    constants: &PhysicalConstants,
    settings: &AngleSearchSettings,
) -> Result<(), ShooterError> {
    settings.validate()?;
    constants.validate()?;
    // The caller's angle is ignored; check everything else
    params.with_angle(settings.min_angle_deg).validate()
}

/// Find the launch angle whose landing distance is closest to `target_distance`.
///
/// Landing distance is not monotonic in angle once drag and lift act, so the
/// whole domain is scanned before refining. Deterministic for identical inputs.
pub fn solve_optimal_angle(
    target_distance: f64,
    params: &ShotParameters,
    constants: &PhysicalConstants,
    settings: &AngleSearchSettings,
) -> Result<OptimalAngleResult, ShooterError> {
    check_range("target_distance", target_distance, f64::MIN_POSITIVE, f64::MAX)?;
    validate_search(params, constants, settings)?;

    let outcome = scan_and_refine(settings, |angle| {
        let trajectory = integrate(&params.with_angle(angle), constants, &settings.integration, true)?;
        Ok(trajectory.landing().map(|landing| {
            let distance = trajectory.downrange(landing);
            Evaluation {
                error: (distance - target_distance).abs(),
                value: distance,
                time: landing.time,
                speed: landing.speed(),
            }
        }))
    })?;

    let result = match outcome.best {
        Some((angle_deg, best)) => OptimalAngleResult {
            angle_deg,
            flight_time: best.time,
            landing_distance: best.value,
            landing_error: best.error,
            converged: best.error <= settings.tolerance_m,
            evaluations: outcome.evaluations,
        },
        None => OptimalAngleResult {
            angle_deg: (settings.min_angle_deg + settings.max_angle_deg) / 2.0,
            flight_time: 0.0,
            landing_distance: 0.0,
            landing_error: f64::INFINITY,
            converged: false,
            evaluations: outcome.evaluations,
        },
    };

    if !result.converged {
        warn!(
            "no angle lands within {:.3} m of {:.2} m; closest is {:.2}° (error {:.3} m)",
            settings.tolerance_m, target_distance, result.angle_deg, result.landing_error
        );
    }
    Ok(result)
}

/// Find the launch angle that puts the ball closest to `target_height` when
/// it reaches `target_distance` downrange.
pub fn solve_angle_for_height(
    target_distance: f64,
    target_height: f64,
    params: &ShotParameters,
    constants: &PhysicalConstants,
    settings: &AngleSearchSettings,
) -> Result<HubAngleResult, ShooterError> {
    check_range("target_distance", target_distance, f64::MIN_POSITIVE, f64::MAX)?;
    check_range("target_height", target_height, 0.0, f64::MAX)?;
    validate_search(params, constants, settings)?;

    let outcome = scan_and_refine(settings, |angle| {
        let trajectory = integrate(&params.with_angle(angle), constants, &settings.integration, true)?;
        Ok(trajectory.sample_at_distance(target_distance).map(|sample| Evaluation {
            error: (sample.position.z - target_height).abs(),
            value: sample.position.z,
            time: sample.time,
            speed: sample.speed(),
        }))
    })?;

    let result = match outcome.best {
        Some((angle_deg, best)) => HubAngleResult {
            angle_deg,
            height_at_target: best.value,
            height_error: best.error,
            time_to_target: best.time,
            speed_at_target: best.speed,
            converged: best.error <= settings.tolerance_m,
            evaluations: outcome.evaluations,
        },
        None => HubAngleResult {
            angle_deg: (settings.min_angle_deg + settings.max_angle_deg) / 2.0,
            height_at_target: 0.0,
            height_error: f64::INFINITY,
            time_to_target: 0.0,
            speed_at_target: 0.0,
            converged: false,
            evaluations: outcome.evaluations,
        },
    };

    if !result.converged {
        warn!(
            "target may not be reachable at {:.0} rpm: best {:.2}° misses by {:.3} m",
            params.rpm, result.angle_deg, result.height_error
        );
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::LaunchPosition;

    fn vacuum_shot() -> ShotParameters {
        ShotParameters {
            angle_deg: 45.0,
            rpm: 3000.0,
            c_roll: 1.0,
            c_drag: 0.0,
            c_lift: 0.0,
            launch_position: LaunchPosition { x: 0.0, y: 0.0 },
            orientation_deg: 0.0,
            launch_height: 0.0,
        }
    }

    fn ideal_range(params: &ShotParameters, angle_deg: f64, constants: &PhysicalConstants) -> f64 {
        let v = params.exit_speed(constants);
        v * v * (2.0 * angle_deg.to_radians()).sin() / constants.gravity_mps2
    }

    #[test]
    fn test_recovers_45_degrees_from_ideal_range() {
        let params = vacuum_shot();
        let constants = PhysicalConstants::default();
        let target = ideal_range(&params, 45.0, &constants);

        let result = solve_optimal_angle(target, &params, &constants, &AngleSearchSettings::default()).unwrap();
        assert!(result.converged, "{result:?}");
        assert!((result.angle_deg - 45.0).abs() < 0.5, "{result:?}");
        assert!(result.landing_error < 0.03);
        assert!((result.flight_time - 2.3).abs() < 0.05);
    }

    #[test]
    fn test_recovers_one_of_two_arcs() {
        let params = vacuum_shot();
        let constants = PhysicalConstants::default();
        let target = ideal_range(&params, 30.0, &constants);

        let result = solve_optimal_angle(target, &params, &constants, &AngleSearchSettings::default()).unwrap();
        assert!(result.converged, "{result:?}");
        // sin(2θ) has the same value at 30° and 60°
        let near_low = (result.angle_deg - 30.0).abs() < 0.1;
        let near_high = (result.angle_deg - 60.0).abs() < 0.1;
        assert!(near_low || near_high, "{result:?}");
    }

    #[test]
    fn test_deterministic() {
        let params = ShotParameters::default();
        let constants = PhysicalConstants::default();
        let settings = AngleSearchSettings::default();

        let first = solve_optimal_angle(2.0, &params, &constants, &settings).unwrap();
        let second = solve_optimal_angle(2.0, &params, &constants, &settings).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.angle_deg.to_bits(), second.angle_deg.to_bits());
    }

    #[test]
    fn test_unreachable_target_is_flagged_not_failed() {
        let params = ShotParameters {
            rpm: 1000.0,
            ..ShotParameters::default()
        };
        let constants = PhysicalConstants::default();
        let result = solve_optimal_angle(50.0, &params, &constants, &AngleSearchSettings::default()).unwrap();

        assert!(!result.converged);
        assert!(result.landing_error > 40.0);
        assert!(result.angle_deg >= 10.0 && result.angle_deg <= 80.0);
    }

    #[test]
    fn test_invalid_target_rejected() {
        let params = vacuum_shot();
        let constants = PhysicalConstants::default();
        let settings = AngleSearchSettings::default();

        let err = solve_optimal_angle(-1.0, &params, &constants, &settings).unwrap_err();
        assert_eq!(err.field(), Some("target_distance"));

        let bad_bounds = AngleSearchSettings {
            min_angle_deg: 50.0,
            max_angle_deg: 40.0,
            ..settings
        };
        let err = solve_optimal_angle(10.0, &params, &constants, &bad_bounds).unwrap_err();
        assert_eq!(err.field(), Some("max_angle_deg"));

        let bad_rpm = ShotParameters { rpm: 9000.0, ..params };
        let err = solve_optimal_angle(10.0, &bad_rpm, &constants, &settings).unwrap_err();
        assert_eq!(err.field(), Some("rpm"));
    }

    #[test]
    fn test_narrow_bounds_respected() {
        let params = vacuum_shot();
        let constants = PhysicalConstants::default();
        let settings = AngleSearchSettings {
            min_angle_deg: 60.0,
            max_angle_deg: 70.0,
            ..Default::default()
        };
        let target = ideal_range(&params, 30.0, &constants);
        let result = solve_optimal_angle(target, &params, &constants, &settings).unwrap();
        assert!((result.angle_deg - 60.0).abs() < 0.1, "{result:?}");
    }

    #[test]
    fn test_hub_height_solution() {
        let params = ShotParameters {
            c_drag: 0.0,
            ..vacuum_shot()
        };
        let constants = PhysicalConstants::default();
        let settings = AngleSearchSettings::default();

        let result = solve_angle_for_height(4.0, 2.0, &params, &constants, &settings).unwrap();
        assert!(result.converged, "{result:?}");
        assert!((result.height_at_target - 2.0).abs() < 0.03);
        assert!(result.time_to_target > 0.0);
        assert!(result.speed_at_target > 0.0);
    }

    #[test]
    fn test_hub_height_unreachable() {
        let params = ShotParameters {
            rpm: 1000.0,
            c_roll: 0.3,
            ..vacuum_shot()
        };
        let constants = PhysicalConstants::default();
        let result =
            solve_angle_for_height(10.0, 2.0, &params, &constants, &AngleSearchSettings::default()).unwrap();
        assert!(!result.converged);
        assert!(result.height_error.is_infinite());
        assert!(result.evaluations > 0);
    }
}
