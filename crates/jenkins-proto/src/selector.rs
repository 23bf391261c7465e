//! The `JOB[/ID]` build selector.
//!
//! `ID` is either a build number, an inclusive range `LO..HI`, or a
//! case-insensitive abbreviation of one of the server's symbolic build
//! names (`lastBuild`, `lastFailedBuild`, ...). Abbreviations must match
//! exactly one name; `last` is shorthand for `lastBuild`.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::ProtoError;
use crate::types::BuildNumber;

/// Permalinks the server maintains for every job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SymbolicBuild {
    /// `lastBuild`
    Last,
    /// `lastCompletedBuild`
    LastCompleted,
    /// `lastFailedBuild`
    LastFailed,
    /// `lastSuccessfulBuild`
    LastSuccessful,
    /// `lastStableBuild`
    LastStable,
    /// `lastUnstableBuild`
    LastUnstable,
    /// `lastUnsuccessfulBuild`
    LastUnsuccessful,
}

impl SymbolicBuild {
    /// Every permalink, in the order they are matched and displayed.
    pub const ALL: [Self; 7] = [
        Self::Last,
        Self::LastCompleted,
        Self::LastFailed,
        Self::LastSuccessful,
        Self::LastStable,
        Self::LastUnstable,
        Self::LastUnsuccessful,
    ];

    /// Name used in URLs and JSON keys.
    #[must_use]
    pub const fn api_name(self) -> &'static str {
        match self {
            Self::Last => "lastBuild",
            Self::LastCompleted => "lastCompletedBuild",
            Self::LastFailed => "lastFailedBuild",
            Self::LastSuccessful => "lastSuccessfulBuild",
            Self::LastStable => "lastStableBuild",
            Self::LastUnstable => "lastUnstableBuild",
            Self::LastUnsuccessful => "lastUnsuccessfulBuild",
        }
    }

    /// Resolve a user abbreviation.
    ///
    /// # Errors
    ///
    /// Returns a reason string when the abbreviation matches no name or
    /// more than one.
    pub fn from_abbreviation(input: &str) -> Result<Self, String> {
        let needle = input.to_ascii_lowercase();
        if needle == "last" {
            return Ok(Self::Last);
        }
        if let Some(exact) = Self::ALL
            .into_iter()
            .find(|s| s.api_name().eq_ignore_ascii_case(&needle))
        {
            return Ok(exact);
        }

        let matches: Vec<Self> = Self::ALL
            .into_iter()
            .filter(|s| s.api_name().to_ascii_lowercase().contains(&needle))
            .collect();
        match matches.as_slice() {
            [one] => Ok(*one),
            [] => Err(format!(
                "expected a build number, LO..HI or one of: {}",
                Self::ALL.map(Self::api_name).join(", ")
            )),
            many => Err(format!(
                "matches several builds: {}",
                many.iter()
                    .map(|s| s.api_name())
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        }
    }
}

impl fmt::Display for SymbolicBuild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_name())
    }
}

/// The `ID` part of a selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BuildId {
    /// A single numbered build.
    Number(BuildNumber),
    /// An inclusive range, always `lo <= hi`.
    Range {
        /// First build.
        lo: BuildNumber,
        /// Last build.
        hi: BuildNumber,
    },
    /// A permalink resolved by the server.
    Symbolic(SymbolicBuild),
}

impl BuildId {
    /// Path segment for a single build, `None` for ranges.
    #[must_use]
    pub fn path_segment(&self) -> Option<String> {
        match self {
            Self::Number(n) => Some(n.to_string()),
            Self::Symbolic(s) => Some(s.api_name().to_string()),
            Self::Range { .. } => None,
        }
    }

    /// Whether this selects more than one build.
    #[must_use]
    pub const fn is_range(&self) -> bool {
        matches!(self, Self::Range { lo, hi } if lo.get() != hi.get())
    }

    /// Build numbers covered by a range or a single number.
    ///
    /// Symbolic ids have to be resolved against the server first and yield
    /// nothing here.
    pub fn numbers(&self) -> impl Iterator<Item = BuildNumber> {
        let (lo, hi) = match self {
            Self::Number(n) => (n.get(), n.get()),
            Self::Range { lo, hi } => (lo.get(), hi.get()),
            Self::Symbolic(_) => (1, 0),
        };
        (lo..=hi).filter_map(|n| BuildNumber::new(n).ok())
    }
}

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Range { lo, hi } => write!(f, "{lo}..{hi}"),
            Self::Symbolic(s) => write!(f, "{s}"),
        }
    }
}

/// A parsed `JOB[/ID]` argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSelector {
    /// Job name.
    pub job: String,
    /// Build part, `None` when the user gave only the job.
    pub build: Option<BuildId>,
}

impl JobSelector {
    /// Selector for the job alone.
    #[must_use]
    pub fn job(job: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            build: None,
        }
    }

    /// The build part, defaulting to `lastBuild`.
    #[must_use]
    pub fn build_or_last(&self) -> BuildId {
        self.build.unwrap_or(BuildId::Symbolic(SymbolicBuild::Last))
    }
}

impl FromStr for JobSelector {
    type Err = ProtoError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| ProtoError::InvalidSelector {
            input: input.to_string(),
            reason,
        };

        let (job, id) = match input.split_once('/') {
            Some((job, id)) => (job, Some(id)),
            None => (input, None),
        };
        if job.is_empty() {
            return Err(invalid("job name is empty".into()));
        }

        let build = match id {
            None | Some("") => None,
            Some(id) => Some(parse_build_id(id).map_err(invalid)?),
        };

        Ok(Self {
            job: job.to_string(),
            build,
        })
    }
}

impl fmt::Display for JobSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.build {
            Some(id) => write!(f, "{}/{id}", self.job),
            None => f.write_str(&self.job),
        }
    }
}

fn parse_build_id(id: &str) -> Result<BuildId, String> {
    if let Some((lo, hi)) = id.split_once("..") {
        let lo = parse_number(lo)?;
        let hi = parse_number(hi)?;
        let (lo, hi) = if lo > hi { (hi, lo) } else { (lo, hi) };
        return Ok(BuildId::Range { lo, hi });
    }
    if id.bytes().all(|b| b.is_ascii_digit()) {
        return parse_number(id).map(BuildId::Number);
    }
    SymbolicBuild::from_abbreviation(id).map(BuildId::Symbolic)
}

fn parse_number(s: &str) -> Result<BuildNumber, String> {
    let n: u32 = s
        .parse()
        .map_err(|e| format!("bad build number '{s}': {e}"))?;
    BuildNumber::new(n).map_err(|e| e.to_string())
}
