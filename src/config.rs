//! Launcher configuration.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use serde::Serialize;
use url::Url;

use crate::control::ControlFailureMode;
use crate::validate::UniformPolicy;
use crate::version::PipelineVersion;

/// Default submission endpoint.
const DEFAULT_ENDPOINT: &str = "https://cromwell-launcher-hxpirayhja-ue.a.run.app";

/// Default submission timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default submission endpoint function for serde.
fn default_endpoint() -> Url {
    // SAFETY: this is checked statically with tests to always unwrap.
    Url::parse(DEFAULT_ENDPOINT).unwrap()
}

/// Default submission timeout function for serde.
fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Default donor policy function for serde.
fn default_donor_policy() -> UniformPolicy {
    UniformPolicy::NullOnConflict
}

/// Launcher configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Submission settings.
    #[serde(default)]
    pub submission: SubmissionConfig,
    /// Validation settings.
    #[serde(default)]
    pub validation: ValidationConfig,
    /// Control resolution settings.
    #[serde(default)]
    pub control: ControlConfig,
    /// Pipeline settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Submission configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionConfig {
    /// The endpoint jobs are submitted to.
    #[serde(default = "default_endpoint")]
    pub endpoint: Url,
    /// The submission timeout in seconds (default: `60`).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Validation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// What to do when a ChIP-seq batch has more than one donor (default:
    /// `null-on-conflict`).
    #[serde(default = "default_donor_policy")]
    pub donor_policy: UniformPolicy,
}

/// Control resolution configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlConfig {
    /// What to do when a CNV control cannot be resolved (default:
    /// `continue`).
    #[serde(default)]
    pub failure_mode: ControlFailureMode,
}

/// Pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// The pipeline version recorded in ChIP-seq requests (default: the
    /// latest commit of the ChIP-seq workflow).
    #[serde(default)]
    pub version: PipelineVersion,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            donor_policy: default_donor_policy(),
        }
    }
}

impl SubmissionConfig {
    /// Gets the submission timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// configuration is invalid.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file `{}`", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file `{}`", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !matches!(self.submission.endpoint.scheme(), "http" | "https") {
            anyhow::bail!(
                "submission endpoint `{}` must be an HTTP(S) URL",
                self.submission.endpoint
            );
        }

        if self.submission.timeout_secs == 0 {
            anyhow::bail!("`timeout_secs` must be greater than zero");
        }

        if let PipelineVersion::Fixed(version) = &self.pipeline.version
            && version.trim().is_empty()
        {
            anyhow::bail!("a fixed pipeline version cannot be empty");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.submission.endpoint.as_str(), format!("{DEFAULT_ENDPOINT}/"));
        assert_eq!(config.submission.timeout(), Duration::from_secs(60));
        assert_eq!(config.validation.donor_policy, UniformPolicy::NullOnConflict);
        assert_eq!(config.control.failure_mode, ControlFailureMode::Continue);
        assert_eq!(config.pipeline.version, PipelineVersion::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[submission]
endpoint = "http://localhost:8000/submit"
timeout_secs = 5

[validation]
donor_policy = "fail"

[control]
failure_mode = "abort"

[pipeline]
version = {{ fixed = "v2.1.0" }}
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(
            config,
            Config {
                submission: SubmissionConfig {
                    endpoint: Url::parse("http://localhost:8000/submit").unwrap(),
                    timeout_secs: 5,
                },
                validation: ValidationConfig {
                    donor_policy: UniformPolicy::Fail,
                },
                control: ControlConfig {
                    failure_mode: ControlFailureMode::Abort,
                },
                pipeline: PipelineConfig {
                    version: PipelineVersion::Fixed("v2.1.0".to_string()),
                },
            }
        );
    }

    #[test]
    fn empty_file_uses_defaults() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(Config::from_file(file.path()).unwrap(), Config::default());
    }

    #[test]
    fn invalid_config() {
        let config = Config {
            submission: SubmissionConfig {
                timeout_secs: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(
            config.validate().unwrap_err().to_string(),
            "`timeout_secs` must be greater than zero"
        );

        let config = Config {
            submission: SubmissionConfig {
                endpoint: Url::parse("ftp://example.com/").unwrap(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(
            config.validate().unwrap_err().to_string(),
            "submission endpoint `ftp://example.com/` must be an HTTP(S) URL"
        );

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[submission]\ntimeout_secs = \"soon\"\n").unwrap();
        let err = Config::from_file(file.path()).unwrap_err();
        assert!(err.to_string().starts_with("failed to parse config file"));
    }
}
