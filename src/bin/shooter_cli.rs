use clap::{Args, Parser, Subcommand, ValueEnum};
use log::warn;
use serde::Serialize;
use std::error::Error;
use std::path::PathBuf;

use shooter_ballistics::{
    estimate_impact_zone, load_or_default, save_config, simulate_shot, solve_angle_for_height,
    solve_optimal_angle, AngleSearchSettings, FieldGeometry, ImpactZoneSettings, IntegrationMethod,
    IntegrationSettings, LaunchPosition, PerturbationDistribution, ShooterConfig, ShotParameters,
    Trajectory,
};

#[derive(Parser)]
#[command(name = "shooter-cli")]
#[command(version)]
#[command(about = "Flywheel shooter trajectory calculator", long_about = None)]
struct Cli {
    /// Shooter preset (JSON); defaults are used if it fails to load
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides applied on top of the loaded preset
#[derive(Args, Debug)]
struct ShotArgs {
    /// Launch angle (degrees)
    #[arg(short = 'a', long)]
    angle: Option<f64>,

    /// Flywheel speed (rpm)
    #[arg(short = 'r', long)]
    rpm: Option<f64>,

    /// Roll coefficient (share of wheel surface speed given to the ball)
    #[arg(long)]
    c_roll: Option<f64>,

    /// Drag coefficient
    #[arg(long)]
    c_drag: Option<f64>,

    /// Lift coefficient
    #[arg(long)]
    c_lift: Option<f64>,

    /// Robot x position (m)
    #[arg(short = 'x', long, allow_hyphen_values = true)]
    x: Option<f64>,

    /// Robot y position (m)
    #[arg(short = 'y', long, allow_hyphen_values = true)]
    y: Option<f64>,

    /// Robot orientation (degrees, 0 = +x)
    #[arg(long, allow_hyphen_values = true)]
    orientation: Option<f64>,

    /// Launch height above the floor (m)
    #[arg(long)]
    launch_height: Option<f64>,

    /// Integration step (seconds)
    #[arg(long, default_value = "0.001")]
    time_step: f64,

    /// Integration scheme
    #[arg(long, default_value = "euler")]
    method: Method,
}

impl ShotArgs {
    fn apply(&self, base: ShotParameters) -> ShotParameters {
        ShotParameters {
            angle_deg: self.angle.unwrap_or(base.angle_deg),
            rpm: self.rpm.unwrap_or(base.rpm),
            c_roll: self.c_roll.unwrap_or(base.c_roll),
            c_drag: self.c_drag.unwrap_or(base.c_drag),
            c_lift: self.c_lift.unwrap_or(base.c_lift),
            launch_position: LaunchPosition {
                x: self.x.unwrap_or(base.launch_position.x),
                y: self.y.unwrap_or(base.launch_position.y),
            },
            orientation_deg: self.orientation.unwrap_or(base.orientation_deg),
            launch_height: self.launch_height.unwrap_or(base.launch_height),
        }
    }

    fn integration(&self) -> IntegrationSettings {
        IntegrationSettings {
            dt: self.time_step,
            method: self.method.into(),
            ..Default::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Fly one shot, with and without air effects
    Trajectory {
        #[command(flatten)]
        shot: ShotArgs,

        /// Output format
        #[arg(short = 'o', long, default_value = "table")]
        output: OutputFormat,

        /// Full output (show all trajectory points)
        #[arg(long)]
        full: bool,
    },

    /// Find the launch angle for a landing distance or a hub height
    OptimalAngle {
        #[command(flatten)]
        shot: ShotArgs,

        /// Target horizontal distance (m)
        #[arg(short = 'd', long)]
        distance: f64,

        /// Hit this height at the target distance instead of landing there (m)
        #[arg(long)]
        height: Option<f64>,

        /// Lowest angle searched (degrees)
        #[arg(long, default_value = "10.0")]
        min_angle: f64,

        /// Highest angle searched (degrees)
        #[arg(long, default_value = "80.0")]
        max_angle: f64,

        /// Output format
        #[arg(short = 'o', long, default_value = "table")]
        output: OutputFormat,
    },

    /// Estimate the landing spread under angle and rpm uncertainty
    ImpactZone {
        #[command(flatten)]
        shot: ShotArgs,

        /// Angle uncertainty (± degrees)
        #[arg(long, default_value = "2.0")]
        angle_variance: f64,

        /// Flywheel speed uncertainty (± percent)
        #[arg(long, default_value = "3.0")]
        rpm_variance: f64,

        /// Number of perturbed shots
        #[arg(short = 'n', long, default_value = "200")]
        samples: usize,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Perturbation distribution
        #[arg(long, default_value = "uniform")]
        distribution: Distribution,

        /// Radius around the nominal landing point counted as on target (m)
        #[arg(long, default_value = "0.25")]
        on_target_radius: f64,

        /// Also score each shot against the hub
        #[arg(long)]
        hub: bool,

        /// Output format
        #[arg(short = 'o', long, default_value = "summary")]
        output: ZoneOutput,
    },

    /// Manage shooter presets
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Display constants and derived launch speeds
    Info,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write the default preset
    Init {
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate a preset and print it
    Show { path: PathBuf },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
    Table,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ZoneOutput {
    Summary,
    Full,
    Points,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum Method {
    #[default]
    Euler,
    Rk4,
}

impl From<Method> for IntegrationMethod {
    fn from(method: Method) -> Self {
        match method {
            Method::Euler => IntegrationMethod::SemiImplicitEuler,
            Method::Rk4 => IntegrationMethod::Rk4,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Distribution {
    Uniform,
    Gaussian,
}

impl From<Distribution> for PerturbationDistribution {
    fn from(distribution: Distribution) -> Self {
        match distribution {
            Distribution::Uniform => PerturbationDistribution::Uniform,
            Distribution::Gaussian => PerturbationDistribution::TruncatedGaussian,
        }
    }
}

#[derive(Debug, Serialize)]
struct FlightSummary {
    landed: bool,
    landing_x: Option<f64>,
    landing_y: Option<f64>,
    landing_distance: Option<f64>,
    flight_time: Option<f64>,
    max_height: f64,
    impact_velocity: f64,
}

impl FlightSummary {
    fn from_trajectory(trajectory: &Trajectory) -> Self {
        let landing = trajectory.landing_point();
        Self {
            landed: trajectory.converged(),
            landing_x: landing.map(|(x, _)| x),
            landing_y: landing.map(|(_, y)| y),
            landing_distance: trajectory.landing_distance(),
            flight_time: trajectory.flight_time(),
            max_height: trajectory.apex().position.z,
            impact_velocity: trajectory.last().speed(),
        }
    }
}

#[derive(Debug, Serialize)]
struct TrajectoryReport<'a> {
    parameters: ShotParameters,
    exit_speed: f64,
    ball_spin: f64,
    hub_distance: f64,
    scores: bool,
    ideal: FlightSummary,
    real: FlightSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    points: Option<&'a Trajectory>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            let (config, err) = load_or_default(path);
            if let Some(err) = err {
                eprintln!("Warning: {} not loaded ({}); using defaults", path.display(), err);
            }
            config
        }
        None => ShooterConfig::default(),
    };
    let constants = config.constants();

    match cli.command {
        Commands::Trajectory { shot, output, full } => {
            let params = shot.apply(config.parameters);
            let field = FieldGeometry::default();
            let sim = simulate_shot(&params, &constants, &shot.integration(), &field)?;

            let report = TrajectoryReport {
                parameters: params,
                exit_speed: params.exit_speed(&constants),
                ball_spin: params.ball_spin(&constants),
                hub_distance: sim.hub_distance,
                scores: sim.scores(&field),
                ideal: FlightSummary::from_trajectory(&sim.ideal),
                real: FlightSummary::from_trajectory(&sim.real),
                points: full.then_some(&sim.real),
            };
            display_trajectory(&report, &sim.real, output, full)?;
        }

        Commands::OptimalAngle {
            shot,
            distance,
            height,
            min_angle,
            max_angle,
            output,
        } => {
            let params = shot.apply(config.parameters);
            let settings = AngleSearchSettings {
                min_angle_deg: min_angle,
                max_angle_deg: max_angle,
                integration: shot.integration(),
                ..Default::default()
            };

            match height {
                Some(height) => {
                    let result = solve_angle_for_height(distance, height, &params, &constants, &settings)?;
                    match output {
                        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
                        OutputFormat::Csv => {
                            println!("angle_deg,height_at_target,height_error,time_to_target,speed_at_target,converged");
                            println!(
                                "{:.4},{:.4},{:.4},{:.4},{:.4},{}",
                                result.angle_deg,
                                result.height_at_target,
                                result.height_error,
                                result.time_to_target,
                                result.speed_at_target,
                                result.converged
                            );
                        }
                        OutputFormat::Table => {
                            println!("╔════════════════════════════════════════╗");
                            println!("║         HUB ANGLE SOLUTION             ║");
                            println!("╠════════════════════════════════════════╣");
                            println!("║ Target:        {:>6.2} m @ {:>6.2} m     ║", height, distance);
                            println!("║ Angle:             {:>8.3} °          ║", result.angle_deg);
                            println!("║ Height at Target:  {:>8.3} m          ║", result.height_at_target);
                            println!("║ Height Error:      {:>8.3} m          ║", result.height_error);
                            println!("║ Time to Target:    {:>8.3} s          ║", result.time_to_target);
                            println!("║ Speed at Target:   {:>8.2} m/s        ║", result.speed_at_target);
                            println!("║ Converged:         {:>8}            ║", result.converged);
                            println!("╚════════════════════════════════════════╝");
                        }
                    }
                }
                None => {
                    let result = solve_optimal_angle(distance, &params, &constants, &settings)?;
                    match output {
                        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
                        OutputFormat::Csv => {
                            println!("angle_deg,landing_distance,landing_error,flight_time,converged");
                            println!(
                                "{:.4},{:.4},{:.4},{:.4},{}",
                                result.angle_deg,
                                result.landing_distance,
                                result.landing_error,
                                result.flight_time,
                                result.converged
                            );
                        }
                        OutputFormat::Table => {
                            println!("╔════════════════════════════════════════╗");
                            println!("║         OPTIMAL ANGLE                  ║");
                            println!("╠════════════════════════════════════════╣");
                            println!("║ Target Distance:   {:>8.3} m          ║", distance);
                            println!("║ Angle:             {:>8.3} °          ║", result.angle_deg);
                            println!("║ Landing Distance:  {:>8.3} m          ║", result.landing_distance);
                            println!("║ Landing Error:     {:>8.3} m          ║", result.landing_error);
                            println!("║ Flight Time:       {:>8.3} s          ║", result.flight_time);
                            println!("║ Evaluations:       {:>8}            ║", result.evaluations);
                            println!("║ Converged:         {:>8}            ║", result.converged);
                            println!("╚════════════════════════════════════════╝");
                        }
                    }
                }
            }
        }

        Commands::ImpactZone {
            shot,
            angle_variance,
            rpm_variance,
            samples,
            seed,
            distribution,
            on_target_radius,
            hub,
            output,
        } => {
            let params = shot.apply(config.parameters);
            let settings = ImpactZoneSettings {
                angle_variance_deg: angle_variance,
                rpm_variance_pct: rpm_variance,
                sample_count: samples,
                seed,
                distribution: distribution.into(),
                on_target_radius_m: on_target_radius,
                integration: shot.integration(),
                ..Default::default()
            };
            let field = FieldGeometry::default();
            let zone = estimate_impact_zone(&params, &constants, &settings, hub.then_some(&field))?;

            match output {
                ZoneOutput::Summary => {
                    println!("╔════════════════════════════════════════╗");
                    println!("║         IMPACT ZONE                    ║");
                    println!("║         {:>6} samples                 ║", samples);
                    println!("╠════════════════════════════════════════╣");
                    if let Some(nominal) = zone.nominal_landing {
                        println!("║ Nominal:      ({:>7.3}, {:>7.3}) m     ║", nominal.x, nominal.y);
                    }
                    if let Some(centroid) = zone.centroid {
                        println!("║ Centroid:     ({:>7.3}, {:>7.3}) m     ║", centroid.x, centroid.y);
                    }
                    println!(
                        "║ Spread ({:>3.0}%):     {:>8.3} m          ║",
                        settings.spread_fraction * 100.0,
                        zone.spread_radius
                    );
                    println!("║ Max Radius:        {:>8.3} m          ║", zone.max_radius);
                    println!("║ On Target:         {:>8.1} %          ║", zone.on_target_fraction * 100.0);
                    if let Some(fraction) = zone.hub_hit_fraction {
                        println!("║ Hub Hits:          {:>8.1} %          ║", fraction * 100.0);
                    }
                    if let Some(in_hub) = zone.centroid_in_hub {
                        println!("║ Centroid in Hub:   {:>8}            ║", in_hub);
                    }
                    println!("║ Max Height:        {:>8.3} m          ║", zone.max_height);
                    println!("║ Never Landed:      {:>8}            ║", zone.non_converged);
                    println!("╚════════════════════════════════════════╝");
                }
                ZoneOutput::Full => {
                    println!("{}", serde_json::to_string_pretty(&zone)?);
                }
                ZoneOutput::Points => {
                    println!("x,y");
                    for p in &zone.points {
                        println!("{:.4},{:.4}", p.x, p.y);
                    }
                }
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Init { path, force } => {
                if path.exists() && !force {
                    return Err(format!("{} already exists (use --force to overwrite)", path.display()).into());
                }
                save_config(&path, &ShooterConfig::default())?;
                println!("Wrote default preset to {}", path.display());
            }
            ConfigAction::Show { path } => {
                let config = shooter_ballistics::load_config(&path)?;
                println!("{}", config.to_json()?);
            }
        },

        Commands::Info => {
            let params = config.parameters;
            println!("╔════════════════════════════════════════╗");
            println!("║      SHOOTER BALLISTICS v{:<14}║", env!("CARGO_PKG_VERSION"));
            println!("╠════════════════════════════════════════╣");
            println!("║ CONSTANTS                              ║");
            println!("║ Wheel Radius:      {:>8.4} m          ║", constants.wheel_radius_m);
            println!("║ Ball Radius:       {:>8.4} m          ║", constants.ball_radius_m);
            println!("║ Ball Mass:         {:>8.4} kg         ║", constants.ball_mass_kg);
            println!("║ Air Density:       {:>8.3} kg/m³      ║", constants.air_density_kg_m3);
            println!("║ Gravity:           {:>8.3} m/s²       ║", constants.gravity_mps2);
            println!("╠════════════════════════════════════════╣");
            println!("║ LAUNCH @ {:>6.0} rpm                    ║", params.rpm);
            println!("║ Surface Speed:     {:>8.3} m/s        ║", params.surface_speed(&constants));
            println!("║ Exit Speed:        {:>8.3} m/s        ║", params.exit_speed(&constants));
            println!("║ Ball Spin:         {:>8.2} rad/s      ║", params.ball_spin(&constants));
            println!("╚════════════════════════════════════════╝");
        }
    }

    Ok(())
}

fn display_trajectory(
    report: &TrajectoryReport,
    real: &Trajectory,
    format: OutputFormat,
    full: bool,
) -> Result<(), Box<dyn Error>> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }

        OutputFormat::Csv => {
            println!("time,x,y,z,vx,vy,vz,speed");
            for s in real.samples() {
                println!(
                    "{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4}",
                    s.time,
                    s.position.x,
                    s.position.y,
                    s.position.z,
                    s.velocity.x,
                    s.velocity.y,
                    s.velocity.z,
                    s.speed()
                );
            }
        }

        OutputFormat::Table => {
            if !report.real.landed {
                warn!("real trajectory did not land within the time limit");
            }
            let fmt = |v: Option<f64>| v.map_or_else(|| "     n/a".to_string(), |v| format!("{:>8.3}", v));

            println!("╔════════════════════════════════════════╗");
            println!("║         TRAJECTORY RESULTS             ║");
            println!("╠════════════════════════════════════════╣");
            println!("║ Exit Speed:        {:>8.3} m/s        ║", report.exit_speed);
            println!("║ Ball Spin:         {:>8.2} rad/s      ║", report.ball_spin);
            println!("║ Hub Distance:      {:>8.3} m          ║", report.hub_distance);
            println!("╠═══════════════════╦══════════╦═════════╣");
            println!("║                   ║  IDEAL   ║  REAL   ║");
            println!("║ Landing Dist (m)  ║ {} ║{} ║", fmt(report.ideal.landing_distance), fmt(report.real.landing_distance));
            println!("║ Flight Time (s)   ║ {} ║{} ║", fmt(report.ideal.flight_time), fmt(report.real.flight_time));
            println!("║ Max Height (m)    ║ {:>8.3} ║{:>8.3} ║", report.ideal.max_height, report.real.max_height);
            println!("║ Impact Vel (m/s)  ║ {:>8.3} ║{:>8.3} ║", report.ideal.impact_velocity, report.real.impact_velocity);
            println!("╠═══════════════════╩══════════╩═════════╣");
            println!("║ Scores:            {:>8}            ║", report.scores);
            println!("╚════════════════════════════════════════╝");

            let samples = real.samples();
            if full {
                println!("\nFull Trajectory Points:");
            } else {
                println!("\nTrajectory Points (every {:.2}s):", real.last().time / 10.0);
            }
            println!("┌──────────┬──────────┬──────────┬──────────┬──────────┐");
            println!("│ Time (s) │  X (m)   │  Y (m)   │  Z (m)   │ Vel(m/s) │");
            println!("├──────────┼──────────┼──────────┼──────────┼──────────┤");
            let step = if full { 1 } else { (samples.len() / 10).max(1) };
            for (i, s) in samples.iter().enumerate() {
                if i % step == 0 || i == samples.len() - 1 {
                    println!(
                        "│ {:>8.3} │ {:>8.3} │ {:>8.3} │ {:>8.3} │ {:>8.3} │",
                        s.time, s.position.x, s.position.y, s.position.z, s.speed()
                    );
                }
            }
            println!("└──────────┴──────────┴──────────┴──────────┴──────────┘");
        }
    }

    Ok(())
}
