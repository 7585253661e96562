use serde::{Deserialize, Serialize};
use std::path::Path;

/// Errors raised while building or loading [`BloomParameters`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be >= 0, got {value}")]
    Negative { field: &'static str, value: f32 },
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),
}

/// Immutable bloom configuration, fixed at construction.
///
/// Values are validated, never clamped: a negative or non-finite field is a
/// caller mistake and is reported as such. Deserialization goes through the
/// same validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBloomParameters", into = "RawBloomParameters")]
pub struct BloomParameters {
    threshold: f32,
    strength: f32,
    radius: f32,
    exposure: f32,
}

#[derive(Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawBloomParameters {
    threshold: f32,
    strength: f32,
    radius: f32,
    exposure: f32,
}

impl Default for RawBloomParameters {
    fn default() -> Self {
        BloomParameters::default().into()
    }
}

impl TryFrom<RawBloomParameters> for BloomParameters {
    type Error = ConfigError;

    fn try_from(raw: RawBloomParameters) -> Result<Self, Self::Error> {
        BloomParameters::new(raw.threshold, raw.strength, raw.radius, raw.exposure)
    }
}

impl From<BloomParameters> for RawBloomParameters {
    fn from(p: BloomParameters) -> Self {
        Self {
            threshold: p.threshold,
            strength: p.strength,
            radius: p.radius,
            exposure: p.exposure,
        }
    }
}

impl Default for BloomParameters {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            strength: 2.0,
            radius: 4.0,
            exposure: 1.0,
        }
    }
}

fn check(field: &'static str, value: f32) -> Result<f32, ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::NotFinite { field });
    }
    if value < 0.0 {
        return Err(ConfigError::Negative { field, value });
    }
    Ok(value)
}

impl BloomParameters {
    pub fn new(threshold: f32, strength: f32, radius: f32, exposure: f32) -> Result<Self, ConfigError> {
        Ok(Self {
            threshold: check("threshold", threshold)?,
            strength: check("strength", strength)?,
            radius: check("radius", radius)?,
            exposure: check("exposure", exposure)?,
        })
    }

    /// Luminance below which bloom input is zeroed.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Scale applied to pixels that pass the threshold.
    pub fn strength(&self) -> f32 {
        self.strength
    }

    /// Blur spread in pixels (Gaussian sigma).
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Linear multiplier applied when the composite is presented.
    pub fn exposure(&self) -> f32 {
        self.exposure
    }

    pub fn from_yaml_str(src: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(src)?)
    }

    pub fn from_json_str(src: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(src)?)
    }

    /// Load from a `.yaml`, `.yml` or `.json` file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let src = match ext.as_str() {
            "yaml" | "yml" | "json" => std::fs::read_to_string(path)?,
            _ => return Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        };
        let params = if ext == "json" {
            Self::from_json_str(&src)?
        } else {
            Self::from_yaml_str(&src)?
        };
        tracing::debug!(path = %path.display(), ?params, "loaded bloom parameters");
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let p = BloomParameters::default();
        assert!(BloomParameters::new(p.threshold(), p.strength(), p.radius(), p.exposure()).is_ok());
    }

    #[test]
    fn negative_values_are_rejected_not_clamped() {
        let err = BloomParameters::new(-0.1, 1.0, 1.0, 1.0).unwrap_err();
        assert!(matches!(err, ConfigError::Negative { field: "threshold", .. }));

        let err = BloomParameters::new(0.0, -1.0, 1.0, 1.0).unwrap_err();
        assert!(matches!(err, ConfigError::Negative { field: "strength", .. }));

        let err = BloomParameters::new(0.0, 1.0, -2.0, 1.0).unwrap_err();
        assert!(matches!(err, ConfigError::Negative { field: "radius", .. }));

        let err = BloomParameters::new(0.0, 1.0, 1.0, -0.5).unwrap_err();
        assert!(matches!(err, ConfigError::Negative { field: "exposure", .. }));
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let err = BloomParameters::new(f32::NAN, 1.0, 1.0, 1.0).unwrap_err();
        assert!(matches!(err, ConfigError::NotFinite { field: "threshold" }));
        let err = BloomParameters::new(0.0, f32::INFINITY, 1.0, 1.0).unwrap_err();
        assert!(matches!(err, ConfigError::NotFinite { field: "strength" }));
    }

    #[test]
    fn zero_is_accepted() {
        let p = BloomParameters::new(0.0, 0.0, 0.0, 0.0).unwrap();
        assert_eq!(p.radius(), 0.0);
    }

    #[test]
    fn yaml_missing_fields_take_defaults() {
        let p = BloomParameters::from_yaml_str("strength: 1.5\n").unwrap();
        assert_eq!(p.strength(), 1.5);
        assert_eq!(p.threshold(), BloomParameters::default().threshold());
        assert_eq!(p.radius(), BloomParameters::default().radius());
    }

    #[test]
    fn yaml_validation_runs_on_load() {
        let err = BloomParameters::from_yaml_str("threshold: -1.0\n").unwrap_err();
        assert!(err.to_string().contains("threshold"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(BloomParameters::from_json_str(r#"{"strenght": 1.0}"#).is_err());
    }

    #[test]
    fn json_round_trip() {
        let p = BloomParameters::new(0.25, 1.0, 2.0, 0.8).unwrap();
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(BloomParameters::from_json_str(&json).unwrap(), p);
    }

    #[test]
    fn load_from_files() {
        let mut yaml = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(yaml, "threshold: 0.1\nstrength: 3.0\nradius: 1.0\nexposure: 0.5").unwrap();
        let p = BloomParameters::load(yaml.path()).unwrap();
        assert_eq!(p, BloomParameters::new(0.1, 3.0, 1.0, 0.5).unwrap());

        let mut json = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(json, r#"{{"radius": 0.0}}"#).unwrap();
        assert_eq!(BloomParameters::load(json.path()).unwrap().radius(), 0.0);
    }

    #[test]
    fn load_rejects_unknown_extension() {
        let toml = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        let err = BloomParameters::load(toml.path()).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }
}
