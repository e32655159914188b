//! ef-project: equilibrium scenario files.
//!
//! A scenario names a database, its components, the conditions and one
//! calculation. Files are YAML (`.yaml`, `.yml`) or JSON (`.json`), chosen by
//! extension. Loading migrates to `LATEST_VERSION` and validates; saving
//! validates first so an invalid scenario never reaches disk.

pub mod migrate;
pub mod schema;
pub mod validate;

pub use migrate::{LATEST_VERSION, migrate_to_latest};
pub use schema::*;
pub use validate::{ValidationError, validate_scenario};

use std::fmt;
use std::path::{Path, PathBuf};

pub type ProjectResult<T> = Result<T, ProjectError>;

#[derive(thiserror::Error, Debug)]
pub enum ProjectError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Migration error: {what}")]
    Migration { what: String },

    #[error("Cannot access scenario {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Scenario files must end in .yaml, .yml or .json: {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("Malformed {format} scenario: {message}")]
    Parse {
        format: ScenarioFormat,
        message: String,
    },
}

/// On-disk encoding of a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioFormat {
    Yaml,
    Json,
}

impl ScenarioFormat {
    /// Format implied by the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> ProjectResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("yaml" | "yml") => Ok(Self::Yaml),
            Some("json") => Ok(Self::Json),
            _ => Err(ProjectError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

impl fmt::Display for ScenarioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yaml => write!(f, "YAML"),
            Self::Json => write!(f, "JSON"),
        }
    }
}

/// Parse, migrate and validate scenario text.
pub fn parse(content: &str, format: ScenarioFormat) -> ProjectResult<Scenario> {
    let parse_error = |message: String| ProjectError::Parse { format, message };
    let scenario: Scenario = match format {
        ScenarioFormat::Yaml => serde_yaml::from_str(content).map_err(|e| parse_error(e.to_string()))?,
        ScenarioFormat::Json => serde_json::from_str(content).map_err(|e| parse_error(e.to_string()))?,
    };
    let scenario = migrate_to_latest(scenario)?;
    validate_scenario(&scenario)?;
    Ok(scenario)
}

/// Parse scenario YAML.
pub fn from_yaml_str(content: &str) -> ProjectResult<Scenario> {
    parse(content, ScenarioFormat::Yaml)
}

/// Validate and encode a scenario.
pub fn render(scenario: &Scenario, format: ScenarioFormat) -> ProjectResult<String> {
    validate_scenario(scenario)?;
    let render_error = |message: String| ProjectError::Parse { format, message };
    match format {
        ScenarioFormat::Yaml => serde_yaml::to_string(scenario).map_err(|e| render_error(e.to_string())),
        ScenarioFormat::Json => {
            serde_json::to_string_pretty(scenario).map_err(|e| render_error(e.to_string()))
        }
    }
}

/// Read a scenario file; the format follows the extension.
pub fn load(path: &Path) -> ProjectResult<Scenario> {
    let format = ScenarioFormat::from_path(path)?;
    let content = std::fs::read_to_string(path).map_err(|source| ProjectError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&content, format)
}

/// Write a scenario file; the format follows the extension.
pub fn save(path: &Path, scenario: &Scenario) -> ProjectResult<()> {
    let content = render(scenario, ScenarioFormat::from_path(path)?)?;
    std::fs::write(path, content).map_err(|source| ProjectError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_follows_extension() {
        assert_eq!(
            ScenarioFormat::from_path(Path::new("a/sweep.YML")).unwrap(),
            ScenarioFormat::Yaml
        );
        assert_eq!(
            ScenarioFormat::from_path(Path::new("sweep.json")).unwrap(),
            ScenarioFormat::Json
        );
        assert!(matches!(
            ScenarioFormat::from_path(Path::new("sweep.toml")),
            Err(ProjectError::UnsupportedFormat { .. })
        ));
        assert!(ScenarioFormat::from_path(Path::new("sweep")).is_err());
    }

    #[test]
    fn parse_error_names_the_format() {
        let err = parse("{ not json", ScenarioFormat::Json).unwrap_err();
        assert!(matches!(
            err,
            ProjectError::Parse {
                format: ScenarioFormat::Json,
                ..
            }
        ));
        assert!(err.to_string().starts_with("Malformed JSON scenario"));
    }

    #[test]
    fn missing_file_reports_its_path() {
        let err = load(Path::new("/nonexistent/equiflow/scenario.yaml")).unwrap_err();
        assert!(matches!(err, ProjectError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/equiflow/scenario.yaml"));
    }
}
