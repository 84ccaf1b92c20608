//! Choosing a mark strategy from configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseTrackingLevelError;
use crate::graph::{Analysis, AnalysisContext, DependencyAnalyzer};

use super::{FirstMarkLogStrategy, FullGraphLogStrategy, NoLogStrategy};

/// How much provenance an analysis run should keep.
///
/// Drivers usually derive this from their logging options: no dependency
/// log means [`None`](Self::None), a log means [`First`](Self::First), and a
/// full log means [`All`](Self::All).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyTrackingLevel {
    /// Only the final marked set; uses [`NoLogStrategy`].
    #[default]
    None,

    /// The first reason for every mark; uses [`FirstMarkLogStrategy`].
    First,

    /// Every reason for every mark; uses [`FullGraphLogStrategy`].
    All,
}

impl DependencyTrackingLevel {
    /// Create an analyzer using the strategy for this level.
    pub fn create_analyzer<C>(self, context: C) -> Box<dyn Analysis<C>>
    where
        C: AnalysisContext + 'static,
    {
        match self {
            DependencyTrackingLevel::None => {
                Box::new(DependencyAnalyzer::<C, NoLogStrategy<C>>::new(context))
            }
            DependencyTrackingLevel::First => {
                Box::new(DependencyAnalyzer::<C, FirstMarkLogStrategy<C>>::new(context))
            }
            DependencyTrackingLevel::All => {
                Box::new(DependencyAnalyzer::<C, FullGraphLogStrategy<C>>::new(context))
            }
        }
    }
}

impl FromStr for DependencyTrackingLevel {
    type Err = ParseTrackingLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(DependencyTrackingLevel::None),
            "first" => Ok(DependencyTrackingLevel::First),
            "all" | "full" => Ok(DependencyTrackingLevel::All),
            _ => Err(ParseTrackingLevelError(s.to_string())),
        }
    }
}

impl fmt::Display for DependencyTrackingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DependencyTrackingLevel::None => "none",
            DependencyTrackingLevel::First => "first",
            DependencyTrackingLevel::All => "all",
        };
        f.write_str(name)
    }
}
