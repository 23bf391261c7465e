//! Build parameters given as `key=value,key=value`.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::ProtoError;

/// Ordered build parameters.
///
/// Keys are unique; inserting an existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildParams(Vec<(String, String)>);

impl BuildParams {
    /// No parameters.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Whether no parameter is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Set `key` to `value`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.0.push((key, value)),
        }
    }

    /// Value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Layer `overrides` on top of these parameters.
    #[must_use]
    pub fn merged_with(mut self, overrides: &Self) -> Self {
        for (k, v) in overrides.iter() {
            self.insert(k, v);
        }
        self
    }

    /// Iterate over `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// What a trigger sends: the user's parameters over configured defaults.
///
/// Defaults such as `token` or `delay` are always sent. Only user
/// parameters make the trigger parameterized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerParams {
    user: BuildParams,
    defaults: BuildParams,
}

impl TriggerParams {
    /// User parameters layered on `defaults`.
    #[must_use]
    pub const fn new(user: BuildParams, defaults: BuildParams) -> Self {
        Self { user, defaults }
    }

    /// Whether the user gave any parameter.
    #[must_use]
    pub fn is_parameterized(&self) -> bool {
        !self.user.is_empty()
    }

    /// Everything to send, defaults first.
    #[must_use]
    pub fn query(&self) -> BuildParams {
        self.defaults.clone().merged_with(&self.user)
    }
}

impl From<BuildParams> for TriggerParams {
    fn from(user: BuildParams) -> Self {
        Self::new(user, BuildParams::new())
    }
}

impl FromStr for BuildParams {
    type Err = ProtoError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut params = Self::new();
        if input.trim().is_empty() {
            return Ok(params);
        }
        for pair in input.split(',') {
            let mut parts = pair.split('=');
            let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
                return Err(ProtoError::InvalidParams {
                    input: input.to_string(),
                    reason: format!("'{pair}' is not of the form key=value"),
                });
            };
            let key = key.trim();
            if key.is_empty() {
                return Err(ProtoError::InvalidParams {
                    input: input.to_string(),
                    reason: format!("'{pair}' has an empty key"),
                });
            }
            params.insert(key, value);
        }
        Ok(params)
    }
}

impl fmt::Display for BuildParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{k}={v}")?;
        }
        Ok(())
    }
}
