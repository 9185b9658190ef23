//! Merge strategy that moves INFO fields into the per-sample calls.

use regex::Regex;

use crate::err::PreflightError;

/// Configuration of the MOVE_TO_CALLS merge strategy.
///
/// Holds the compiled key pattern and the optional call field names that the
/// downstream merge executor reads when combining duplicate records. Without
/// a pattern, no INFO field is moved.
#[derive(Debug, Clone)]
pub struct MoveToCallsStrategy {
    info_keys_regex: Option<Regex>,
    copy_quality_to_calls: Option<String>,
    copy_filter_to_calls: Option<String>,
}

impl MoveToCallsStrategy {
    pub fn new(
        info_keys_regex: Option<&str>,
        copy_quality_to_calls: Option<String>,
        copy_filter_to_calls: Option<String>,
    ) -> Result<Self, PreflightError> {
        let info_keys_regex = info_keys_regex.map(Regex::new).transpose()?;
        Ok(Self {
            info_keys_regex,
            copy_quality_to_calls,
            copy_filter_to_calls,
        })
    }

    /// Whether the INFO field with the given key is moved into the calls.
    pub fn should_move_info_key(&self, key: &str) -> bool {
        self.info_keys_regex
            .as_ref()
            .map(|regex| regex.is_match(key))
            .unwrap_or(false)
    }

    /// The configured INFO key pattern, if any.
    pub fn info_keys_regex(&self) -> Option<&Regex> {
        self.info_keys_regex.as_ref()
    }

    /// Call field that receives the record QUAL value, if any.
    pub fn copy_quality_to_calls(&self) -> Option<&str> {
        self.copy_quality_to_calls.as_deref()
    }

    /// Call field that receives the record FILTER value, if any.
    pub fn copy_filter_to_calls(&self) -> Option<&str> {
        self.copy_filter_to_calls.as_deref()
    }
}
