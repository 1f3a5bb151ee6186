//! Runtime settings read from the environment (and `.env`).

use std::env;
use std::path::PathBuf;

use thiserror::Error;

use crate::blockchain::{Framer, SignPolicy};

/// What the binary does when a record fails to decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorMode {
    #[default]
    Abort,
    Skip,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no block file given: pass a path or set BLOCK_FILE")]
    MissingBlockFile,

    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub block_file: PathBuf,
    pub magic: Option<[u8; 4]>,
    pub stop_at_padding: bool,
    pub sign_policy: SignPolicy,
    pub max_blocks: Option<usize>,
    pub on_error: ErrorMode,
}

impl Config {
    /// Read from the process environment. `path` (first CLI argument) wins over `BLOCK_FILE`.
    pub fn from_env(path: Option<String>) -> Result<Self, ConfigError> {
        Self::from_lookup(path, |key| env::var(key).ok())
    }

    pub fn from_lookup<F>(path: Option<String>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let block_file = path
            .or_else(|| lookup("BLOCK_FILE"))
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .ok_or(ConfigError::MissingBlockFile)?;

        let magic = lookup("BLOCK_MAGIC")
            .map(|v| parse_magic(&v))
            .transpose()?;

        let stop_at_padding = lookup("STOP_AT_PADDING")
            .map(|v| parse_bool("STOP_AT_PADDING", &v))
            .transpose()?
            .unwrap_or(false);

        let sign_policy = match lookup("REJECT_NEGATIVE_BITS")
            .map(|v| parse_bool("REJECT_NEGATIVE_BITS", &v))
            .transpose()?
        {
            Some(true) => SignPolicy::Reject,
            _ => SignPolicy::Ignore,
        };

        let max_blocks = lookup("MAX_BLOCKS")
            .map(|v| {
                v.trim().parse::<usize>().map_err(|_| ConfigError::Invalid {
                    key: "MAX_BLOCKS",
                    value: v.clone(),
                    reason: "expected a non-negative integer",
                })
            })
            .transpose()?;

        let on_error = match lookup("ON_ERROR").as_deref().map(str::trim) {
            None | Some("abort") => ErrorMode::Abort,
            Some("skip") => ErrorMode::Skip,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "ON_ERROR",
                    value: other.to_string(),
                    reason: "expected `abort` or `skip`",
                });
            }
        };

        Ok(Self {
            block_file,
            magic,
            stop_at_padding,
            sign_policy,
            max_blocks,
            on_error,
        })
    }

    /// Apply the framing settings to a new `Framer`.
    pub fn framer<R: std::io::Read>(&self, reader: R) -> Framer<R> {
        let framer = Framer::new(reader).stop_at_padding(self.stop_at_padding);
        match self.magic {
            Some(magic) => framer.with_magic(magic),
            None => framer,
        }
    }
}

fn parse_magic(value: &str) -> Result<[u8; 4], ConfigError> {
    let trimmed = value.trim().trim_start_matches("0x");
    let invalid = |reason| ConfigError::Invalid {
        key: "BLOCK_MAGIC",
        value: value.to_string(),
        reason,
    };
    let bytes = hex::decode(trimmed).map_err(|_| invalid("expected hex"))?;
    bytes.try_into().map_err(|_| invalid("expected 4 bytes"))
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "expected a boolean",
        }),
    }
}
