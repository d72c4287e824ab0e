//! # Config Loader
//!
//! Job plan loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON job plans
//! - Validate plan legality
//! - Generate `JobPlan`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let plan = ConfigLoader::load_from_path(Path::new("plan.toml")).unwrap();
//! println!("Job: {}", plan.job.name);
//! ```

mod parser;
mod validator;

pub use contracts::JobPlan;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Job plan loader
///
/// Provides static methods to load plans from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load a plan from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<JobPlan, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load a plan from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<JobPlan, ContractError> {
        Self::parse_and_validate(content, format)
    }

    /// Serialize JobPlan to TOML string
    pub fn to_toml(plan: &JobPlan) -> Result<String, ContractError> {
        toml::to_string_pretty(plan)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize JobPlan to JSON string
    pub fn to_json(plan: &JobPlan) -> Result<String, ContractError> {
        serde_json::to_string_pretty(plan)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer plan format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read plan file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse and validate plan content
    fn parse_and_validate(content: &str, format: ConfigFormat) -> Result<JobPlan, ContractError> {
        let plan = parser::parse(content, format)?;
        validator::validate(&plan)?;
        Ok(plan)
    }
}
