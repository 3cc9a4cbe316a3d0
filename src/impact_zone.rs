//! Monte Carlo impact-zone estimation.
//!
//! Angle and flywheel speed are perturbed around a nominal shot, each
//! perturbed shot is flown with air effects, and the landing points are
//! summarised as a centroid, spread radius and on-target fraction.
//!
//! Perturbations are drawn up front from a seeded ChaCha generator as unit
//! offsets in `[-1, 1]` and only then scaled by the variance bounds, so a
//! fixed seed gives the same draws at every variance setting. The flights
//! themselves run in parallel.

use log::{debug, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal, Uniform};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::constants::{FieldGeometry, PhysicalConstants};
use crate::error::{check_range, ShooterError};
use crate::params::{ShotParameters, ANGLE_RANGE_DEG, RPM_RANGE};
use crate::trajectory::{integrate, IntegrationSettings};

const MAX_SAMPLE_COUNT: usize = 100_000;

/// Truncated Gaussian draws use σ = bound / 2
const GAUSSIAN_SIGMA: f64 = 0.5;

/// Shape of the perturbation inside the symmetric variance bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PerturbationDistribution {
    /// Every offset within the bound equally likely
    #[default]
    Uniform,
    /// Normal with σ = bound / 2, redrawn until it falls inside the bound
    TruncatedGaussian,
}

impl PerturbationDistribution {
    /// One offset in `[-1, 1]`
    fn sample_unit(&self, rng: &mut ChaCha8Rng) -> f64 {
        match self {
            PerturbationDistribution::Uniform => Uniform::new_inclusive(-1.0, 1.0).sample(rng),
            PerturbationDistribution::TruncatedGaussian => loop {
                let z: f64 = StandardNormal.sample(rng);
                let z = z * GAUSSIAN_SIGMA;
                if z.abs() <= 1.0 {
                    return z;
                }
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpactZoneSettings {
    pub angle_variance_deg: f64,    // ± degrees
    pub rpm_variance_pct: f64,      // ± percent of nominal rpm
    pub sample_count: usize,
    pub seed: u64,
    pub distribution: PerturbationDistribution,
    pub on_target_radius_m: f64,    // around the nominal landing point
    pub spread_fraction: f64,       // share of samples inside `spread_radius`
    pub integration: IntegrationSettings,
}

impl Default for ImpactZoneSettings {
    fn default() -> Self {
        Self {
            angle_variance_deg: 2.0,
            rpm_variance_pct: 3.0,
            sample_count: 200,
            seed: 42,
            distribution: PerturbationDistribution::Uniform,
            on_target_radius_m: 0.25,
            spread_fraction: 0.9,
            integration: IntegrationSettings::default(),
        }
    }
}

impl ImpactZoneSettings {
    pub fn validate(&self) -> Result<(), ShooterError> {
        // Zero is accepted so a caller can check the unperturbed shot
        check_range("angle_variance_deg", self.angle_variance_deg, 0.0, 5.0)?;
        check_range("rpm_variance_pct", self.rpm_variance_pct, 0.0, 10.0)?;
        check_range(
            "sample_count",
            self.sample_count as f64,
            1.0,
            MAX_SAMPLE_COUNT as f64,
        )?;
        check_range("on_target_radius_m", self.on_target_radius_m, f64::MIN_POSITIVE, f64::MAX)?;
        check_range("spread_fraction", self.spread_fraction, f64::MIN_POSITIVE, 1.0)?;
        self.integration.validate()
    }
}

/// Point on the field floor plane
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LandingPoint {
    pub x: f64,
    pub y: f64,
}

impl LandingPoint {
    pub fn distance_to(&self, other: &LandingPoint) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Landing distribution of perturbed shots.
///
/// Draws whose flight never landed are counted in `non_converged` and left
/// out of `points`; they count as misses in both fractions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactZone {
    pub nominal_landing: Option<LandingPoint>,
    pub points: Vec<LandingPoint>,
    pub centroid: Option<LandingPoint>,
    pub spread_radius: f64,
    pub max_radius: f64,
    pub on_target_fraction: f64,
    pub hub_hit_fraction: Option<f64>,
    pub centroid_in_hub: Option<bool>,  // centroid inside the hub's outer ring
    pub max_height: f64,                // highest apex over all perturbed flights
    pub non_converged: usize,
}

/// Perturbed copy of the nominal shot, clamped to the valid parameter ranges
fn perturb(nominal: &ShotParameters, settings: &ImpactZoneSettings, unit_angle: f64, unit_rpm: f64) -> ShotParameters {
    let angle = nominal.angle_deg + unit_angle * settings.angle_variance_deg;
    let rpm = nominal.rpm * (1.0 + unit_rpm * settings.rpm_variance_pct / 100.0);
    ShotParameters {
        angle_deg: angle.clamp(ANGLE_RANGE_DEG.0, ANGLE_RANGE_DEG.1),
        rpm: rpm.clamp(RPM_RANGE.0, RPM_RANGE.1),
        ..*nominal
    }
}

/// Estimate where shots land given angle and rpm uncertainty.
///
/// With `field` set, each perturbed flight is also checked for passing the
/// hub's scoring height inside the outer ring.
pub fn estimate_impact_zone(
    nominal: &ShotParameters,
    constants: &PhysicalConstants,
    settings: &ImpactZoneSettings,
    field: Option<&FieldGeometry>,
) -> Result<ImpactZone, ShooterError> {
    nominal.validate()?;
    constants.validate()?;
    settings.validate()?;

    let baseline = integrate(nominal, constants, &settings.integration, true)?;
    let nominal_landing = baseline.landing_point().map(|(x, y)| LandingPoint { x, y });
    if nominal_landing.is_none() {
        warn!("nominal shot never landed; on-target fraction will be zero");
    }

    let mut rng = ChaCha8Rng::seed_from_u64(settings.seed);
    let draws: Vec<(f64, f64)> = (0..settings.sample_count)
        .map(|_| {
            let unit_angle = settings.distribution.sample_unit(&mut rng);
            let unit_rpm = settings.distribution.sample_unit(&mut rng);
            (unit_angle, unit_rpm)
        })
        .collect();

    let scoring_height = field.map(|f| f.scoring_height_m());
    let outcomes: Vec<(Option<LandingPoint>, bool, f64)> = draws
        .par_iter()
        .map(|&(unit_angle, unit_rpm)| {
            let params = perturb(nominal, settings, unit_angle, unit_rpm);
            let trajectory = integrate(&params, constants, &settings.integration, true)?;

            let landing = trajectory.landing_point().map(|(x, y)| LandingPoint { x, y });
            let hub_hit = match (field, scoring_height) {
                (Some(field), Some(height)) => trajectory
                    .descending_crossing(height)
                    .map_or(false, |s| field.is_in_hub(s.position.x, s.position.y)),
                _ => false,
            };
            Ok((landing, hub_hit, trajectory.apex().position.z))
        })
        .collect::<Result<_, ShooterError>>()?;

    let points: Vec<LandingPoint> = outcomes.iter().filter_map(|(p, _, _)| *p).collect();
    let max_height = outcomes
        .iter()
        .map(|(_, _, apex)| *apex)
        .fold(f64::NEG_INFINITY, f64::max);
    let non_converged = outcomes.len() - points.len();
    let total = settings.sample_count as f64;

    let centroid = if points.is_empty() {
        None
    } else {
        let n = points.len() as f64;
        Some(LandingPoint {
            x: points.iter().map(|p| p.x).sum::<f64>() / n,
            y: points.iter().map(|p| p.y).sum::<f64>() / n,
        })
    };

    let (spread_radius, max_radius) = match centroid {
        Some(center) => {
            let mut radii: Vec<f64> = points.iter().map(|p| p.distance_to(&center)).collect();
            radii.sort_by(|a, b| a.total_cmp(b));
            let max = radii.last().copied().unwrap_or(0.0);
            (percentile(&radii, settings.spread_fraction), max)
        }
        None => (0.0, 0.0),
    };

    let on_target_fraction = match nominal_landing {
        Some(nominal_point) => {
            let hits = points
                .iter()
                .filter(|p| p.distance_to(&nominal_point) <= settings.on_target_radius_m)
                .count();
            hits as f64 / total
        }
        None => 0.0,
    };

    let hub_hit_fraction = field.map(|_| outcomes.iter().filter(|(_, hit, _)| *hit).count() as f64 / total);
    let centroid_in_hub = field.map(|f| centroid.map_or(false, |c| f.is_in_hub(c.x, c.y)));

    debug!(
        "impact zone: {} samples, {} landed, spread {:.3} m, on-target {:.1}%",
        settings.sample_count,
        points.len(),
        spread_radius,
        on_target_fraction * 100.0
    );

    Ok(ImpactZone {
        nominal_landing,
        points,
        centroid,
        spread_radius,
        max_radius,
        on_target_fraction,
        hub_hit_fraction,
        centroid_in_hub,
        max_height,
        non_converged,
    })
}

/// Calculate percentile of sorted values using linear interpolation
fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let n = sorted_values.len();
    if n == 1 {
        return sorted_values[0];
    }

    let index = p * (n - 1) as f64;
    let lower = index.floor() as usize;
    let upper = index.ceil() as usize;

    if lower == upper {
        sorted_values[lower]
    } else {
        let weight = index - lower as f64;
        sorted_values[lower] * (1.0 - weight) + sorted_values[upper] * weight
    }
}
