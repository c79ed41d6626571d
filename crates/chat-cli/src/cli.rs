use std::path::PathBuf;

use shared::chat::LineFraming;
use shared::config::{
    CHAT_EXPORT_DIR_VAR, CHAT_MODEL_VAR, CHAT_RELAY_URL_VAR, CHAT_STREAM_FRAMING_VAR, ClientConfig,
    ConfigError,
};
use thiserror::Error;

/// Flags given on the command line. Each one replaces its environment
/// variable when the [`ClientConfig`] is resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOptions {
    pub relay_url: Option<String>,
    pub model: Option<String>,
    pub framing: Option<LineFraming>,
    pub export_dir: Option<PathBuf>,
}

#[derive(Debug, Error, PartialEq)]
pub enum CliError {
    #[error("unknown argument: {0}")]
    UnknownArgument(String),
    #[error("missing value for argument: {0}")]
    MissingValue(String),
    #[error("invalid --framing value: {0}")]
    InvalidFraming(String),
    #[error("help requested")]
    HelpRequested,
}

impl CliOptions {
    pub fn parse<I>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut options = Self::default();

        let mut iter = args.into_iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--help" | "-h" => return Err(CliError::HelpRequested),
                "--relay-url" => options.relay_url = Some(required_value(&arg, iter.next())?),
                "--model" => options.model = Some(required_value(&arg, iter.next())?),
                "--framing" => {
                    let value = required_value(&arg, iter.next())?;
                    let framing = value
                        .parse::<LineFraming>()
                        .map_err(|_| CliError::InvalidFraming(value))?;
                    options.framing = Some(framing);
                }
                "--export-dir" => {
                    options.export_dir = Some(PathBuf::from(required_value(&arg, iter.next())?));
                }
                unknown => return Err(CliError::UnknownArgument(unknown.to_string())),
            }
        }

        Ok(options)
    }

    /// Flag value standing in for an environment key, if the flag was given.
    pub fn override_for(&self, key: &str) -> Option<String> {
        match key {
            CHAT_RELAY_URL_VAR => self.relay_url.clone(),
            CHAT_MODEL_VAR => self.model.clone(),
            CHAT_STREAM_FRAMING_VAR => self.framing.map(|framing| framing.as_str().to_string()),
            CHAT_EXPORT_DIR_VAR => self
                .export_dir
                .as_ref()
                .map(|dir| dir.to_string_lossy().into_owned()),
            _ => None,
        }
    }

    pub fn resolve(&self) -> Result<ClientConfig, ConfigError> {
        ClientConfig::from_env_with(|key| self.override_for(key))
    }
}

fn required_value(flag: &str, value: Option<String>) -> Result<String, CliError> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| CliError::MissingValue(flag.to_string()))
}
