//! Queue settings parsed from declare arguments.

use std::collections::HashMap;
use thiserror::Error;

pub const DURABLE_KEY: &str = "durable";
pub const DROP_MESSAGES_AT_LIMIT_KEY: &str = "dropMessagesAtLimit";
pub const LVQ_KEY: &str = "lvqKey";
pub const PRIORITIES_KEY: &str = "priorities";
pub const DEFAULT_FAIRSHARE_KEY: &str = "defaultFairshare";
pub const FAIRSHARE_KEY: &str = "fairshare";
pub const GROUP_KEY: &str = "groupKey";
pub const MAX_COUNT_KEY: &str = "qpid.max_count";
pub const MAX_SIZE_KEY: &str = "qpid.max_size";
pub const FLOW_STOP_COUNT_KEY: &str = "qpid.flow_stop_count";
pub const FLOW_RESUME_COUNT_KEY: &str = "qpid.flow_resume_count";
pub const FLOW_STOP_SIZE_KEY: &str = "qpid.flow_stop_size";
pub const FLOW_RESUME_SIZE_KEY: &str = "qpid.flow_resume_size";

/// Highest number of priority levels a queue may be declared with.
pub const MAX_PRIORITY_LEVELS: u8 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
    #[error("{0}")]
    Contradiction(String),
    #[error("flow {axis} thresholds invalid: resume={resume} stop={stop}")]
    FlowThresholds {
        axis: &'static str,
        stop: u64,
        resume: u64,
    },
    #[error("flow stop {axis}={stop} must be below the queue maximum {max}")]
    FlowAboveMax {
        axis: &'static str,
        stop: u64,
        max: u64,
    },
}

/// Declared configuration of a queue, before construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueSettings {
    pub durable: bool,
    pub drop_messages_at_limit: bool,
    pub lvq_key: String,
    pub priorities: u8,
    pub default_fairshare: bool,
    /// Per-level dequeue credits, highest level first; empty unless
    /// fair-share is configured per level.
    pub fairshare: Vec<u32>,
    pub group_key: String,
    pub max_count: u32,
    pub max_size: u64,
    pub flow_stop_count: u32,
    pub flow_resume_count: u32,
    pub flow_stop_size: u64,
    pub flow_resume_size: u64,
    /// True when any qpid.flow_* key was given explicitly; explicit
    /// settings suppress broker-default derivation.
    pub flow_explicit: bool,
}

fn parse<T: std::str::FromStr>(
    arguments: &HashMap<String, String>,
    key: &str,
) -> Result<Option<T>, SettingsError> {
    match arguments.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| SettingsError::InvalidValue {
                key: key.to_string(),
                value: raw.clone(),
            }),
    }
}

fn parse_bool(
    arguments: &HashMap<String, String>,
    key: &str,
) -> Result<bool, SettingsError> {
    match arguments.get(key).map(String::as_str) {
        None => Ok(false),
        Some("1" | "true" | "True") => Ok(true),
        Some("0" | "false" | "False" | "") => Ok(false),
        Some(other) => Err(SettingsError::InvalidValue {
            key: key.to_string(),
            value: other.to_string(),
        }),
    }
}

impl QueueSettings {
    /// Parse declare arguments. Unknown keys are ignored, matching the
    /// permissive handling of client-supplied argument tables.
    pub fn from_arguments(
        arguments: &HashMap<String, String>,
    ) -> Result<Self, SettingsError> {
        let fairshare = match arguments.get(FAIRSHARE_KEY) {
            None => Vec::new(),
            Some(raw) => raw
                .split(',')
                .filter(|part| !part.trim().is_empty())
                .map(|part| {
                    part.trim()
                        .parse::<u32>()
                        .map_err(|_| SettingsError::InvalidValue {
                            key: FAIRSHARE_KEY.to_string(),
                            value: raw.clone(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?,
        };

        let flow_explicit = [
            FLOW_STOP_COUNT_KEY,
            FLOW_RESUME_COUNT_KEY,
            FLOW_STOP_SIZE_KEY,
            FLOW_RESUME_SIZE_KEY,
        ]
        .iter()
        .any(|key| arguments.contains_key(*key));

        let settings = Self {
            durable: parse_bool(arguments, DURABLE_KEY)?,
            drop_messages_at_limit: parse_bool(arguments, DROP_MESSAGES_AT_LIMIT_KEY)?,
            lvq_key: arguments.get(LVQ_KEY).cloned().unwrap_or_default(),
            priorities: parse(arguments, PRIORITIES_KEY)?.unwrap_or(0),
            default_fairshare: parse_bool(arguments, DEFAULT_FAIRSHARE_KEY)?,
            fairshare,
            group_key: arguments.get(GROUP_KEY).cloned().unwrap_or_default(),
            max_count: parse(arguments, MAX_COUNT_KEY)?.unwrap_or(0),
            max_size: parse(arguments, MAX_SIZE_KEY)?.unwrap_or(0),
            flow_stop_count: parse(arguments, FLOW_STOP_COUNT_KEY)?.unwrap_or(0),
            flow_resume_count: parse(arguments, FLOW_RESUME_COUNT_KEY)?.unwrap_or(0),
            flow_stop_size: parse(arguments, FLOW_STOP_SIZE_KEY)?.unwrap_or(0),
            flow_resume_size: parse(arguments, FLOW_RESUME_SIZE_KEY)?.unwrap_or(0),
            flow_explicit,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn has_lvq_key(&self) -> bool {
        !self.lvq_key.is_empty()
    }

    pub fn has_group_key(&self) -> bool {
        !self.group_key.is_empty()
    }

    pub fn fairshare_enabled(&self) -> bool {
        self.default_fairshare || !self.fairshare.is_empty()
    }

    /// Reject contradictory or out-of-range settings before any part of
    /// the queue is constructed.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.drop_messages_at_limit && self.has_lvq_key() {
            return Err(SettingsError::Contradiction(
                "dropMessagesAtLimit cannot be combined with lvqKey".into(),
            ));
        }
        if self.has_lvq_key() && self.priorities > 0 {
            return Err(SettingsError::Contradiction(
                "lvqKey cannot be combined with priorities".into(),
            ));
        }
        if self.priorities > MAX_PRIORITY_LEVELS {
            return Err(SettingsError::InvalidValue {
                key: PRIORITIES_KEY.to_string(),
                value: self.priorities.to_string(),
            });
        }
        if self.fairshare_enabled() && self.priorities == 0 {
            return Err(SettingsError::Contradiction(
                "fairshare requires priorities".into(),
            ));
        }
        if !self.fairshare.is_empty() && self.fairshare.len() != self.priorities as usize {
            return Err(SettingsError::Contradiction(format!(
                "fairshare lists {} levels but the queue declares {}",
                self.fairshare.len(),
                self.priorities
            )));
        }

        validate_flow_pair(
            "count",
            u64::from(self.flow_stop_count),
            u64::from(self.flow_resume_count),
            u64::from(self.max_count),
        )?;
        validate_flow_pair(
            "size",
            self.flow_stop_size,
            self.flow_resume_size,
            self.max_size,
        )?;
        Ok(())
    }
}

/// A flow axis is valid when both values are zero (disabled) or both
/// positive with resume at or below stop, and stop below any declared
/// maximum depth on the same axis.
fn validate_flow_pair(
    axis: &'static str,
    stop: u64,
    resume: u64,
    max: u64,
) -> Result<(), SettingsError> {
    if stop == 0 && resume == 0 {
        return Ok(());
    }
    if stop == 0 || resume == 0 || resume > stop {
        return Err(SettingsError::FlowThresholds { axis, stop, resume });
    }
    if max != 0 && max < stop {
        return Err(SettingsError::FlowAboveMax { axis, stop, max });
    }
    Ok(())
}
