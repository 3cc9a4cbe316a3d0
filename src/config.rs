//! JSON persistence for shooter presets.
//!
//! A document holds the parameter set and, optionally, overridden physical
//! constants:
//!
//! ```json
//! {
//!   "parameters": {
//!     "angle_deg": 70.0, "rpm": 2750.0, "c_roll": 0.5, "c_drag": 0.6,
//!     "c_lift": 0.0, "launch_position": { "x": 0.54, "y": 0.73 },
//!     "orientation_deg": 0.0, "launch_height": 0.15
//!   }
//! }
//! ```

use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

use crate::constants::PhysicalConstants;
use crate::error::ShooterError;
use crate::params::ShotParameters;

const PARAMETER_FIELDS: [&str; 8] = [
    "angle_deg",
    "rpm",
    "c_roll",
    "c_drag",
    "c_lift",
    "launch_position",
    "orientation_deg",
    "launch_height",
];

const CONSTANT_FIELDS: [&str; 5] = [
    "wheel_radius_m",
    "ball_radius_m",
    "ball_mass_kg",
    "air_density_kg_m3",
    "gravity_mps2",
];

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ShooterConfig {
    pub parameters: ShotParameters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constants: Option<PhysicalConstants>,
}

impl ShooterConfig {
    /// Constants to run with: the overrides, or the defaults
    pub fn constants(&self) -> PhysicalConstants {
        self.constants.unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), ShooterError> {
        self.parameters.validate()?;
        if let Some(constants) = &self.constants {
            constants.validate()?;
        }
        Ok(())
    }

    /// Parse and validate a JSON document.
    ///
    /// Missing or mistyped fields are reported by their dotted path
    /// (`parameters.rpm`); out-of-range values by parameter name.
    pub fn from_json(text: &str) -> Result<Self, ShooterError> {
        let document: Value = serde_json::from_str(text).map_err(|e| {
            ShooterError::config("document", format!("line {}, column {}: {e}", e.line(), e.column()))
        })?;
        check_structure(&document)?;
        let config: ShooterConfig =
            serde_json::from_value(document).map_err(|e| ShooterError::config("document", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ShooterError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn require_object<'a>(value: &'a Value, path: &str) -> Result<&'a serde_json::Map<String, Value>, ShooterError> {
    value
        .as_object()
        .ok_or_else(|| ShooterError::config(path, "expected an object"))
}

fn require_numbers(object: &serde_json::Map<String, Value>, prefix: &str, fields: &[&str]) -> Result<(), ShooterError> {
    for field in fields {
        let path = format!("{prefix}.{field}");
        match object.get(*field) {
            None => return Err(ShooterError::config(&path, "missing field")),
            Some(v) if !v.is_number() => return Err(ShooterError::config(&path, "expected a number")),
            Some(_) => {}
        }
    }
    Ok(())
}

/// Walk the document so an incomplete one is reported by the field it lacks
fn check_structure(document: &Value) -> Result<(), ShooterError> {
    let root = require_object(document, "document")?;

    let parameters = root
        .get("parameters")
        .ok_or_else(|| ShooterError::config("parameters", "missing field"))?;
    let parameters = require_object(parameters, "parameters")?;
    let scalar_fields: Vec<&str> = PARAMETER_FIELDS
        .iter()
        .copied()
        .filter(|f| *f != "launch_position")
        .collect();
    require_numbers(parameters, "parameters", &scalar_fields)?;

    let position = parameters
        .get("launch_position")
        .ok_or_else(|| ShooterError::config("parameters.launch_position", "missing field"))?;
    let position = require_object(position, "parameters.launch_position")?;
    require_numbers(position, "parameters.launch_position", &["x", "y"])?;

    match root.get("constants") {
        None | Some(Value::Null) => Ok(()),
        Some(constants) => {
            let constants = require_object(constants, "constants")?;
            require_numbers(constants, "constants", &CONSTANT_FIELDS)
        }
    }
}

/// Load a preset from disk.
pub fn load_config(path: impl AsRef<Path>) -> Result<ShooterConfig, ShooterError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let config = ShooterConfig::from_json(&text)?;
    info!("loaded shooter config from {}", path.display());
    Ok(config)
}

/// Write a preset to disk as pretty-printed JSON.
///
/// The preset is validated first so a file written here always loads back.
pub fn save_config(path: impl AsRef<Path>, config: &ShooterConfig) -> Result<(), ShooterError> {
    let path = path.as_ref();
    config.validate()?;
    fs::write(path, config.to_json()?)?;
    info!("saved shooter config to {}", path.display());
    Ok(())
}

/// Load a preset, falling back to the default preset if it cannot be read.
///
/// The failure is returned alongside the defaults so the caller can report it.
pub fn load_or_default(path: impl AsRef<Path>) -> (ShooterConfig, Option<ShooterError>) {
    let path = path.as_ref();
    match load_config(path) {
        Ok(config) => (config, None),
        Err(err) => {
            warn!("using default shooter config, {} failed to load: {}", path.display(), err);
            (ShooterConfig::default(), Some(err))
        }
    }
}
