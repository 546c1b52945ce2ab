//! Combinatorial optimization tasks supported by the trainer.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// The combinatorial assignment problem a policy is trained on.
///
/// Each task defines the shape of an instance (how many feature rows the
/// state carries) and how a learned permutation is scored (see
/// [`reward`](crate::reward)).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Task {
    /// Sort a sequence of scalars: minimize total successive difference.
    Sort,
    /// Traveling-salesman tour over 2D points: minimize closed tour length.
    Tsp,
    /// Minimum/maximum-weight bipartite matching between two 2D point sets.
    Mwm2D,
}

impl Task {
    /// Feature dimensionality of a single point.
    pub fn n_features(self) -> usize {
        match self {
            Task::Sort => 1,
            Task::Tsp | Task::Mwm2D => 2,
        }
    }

    /// Number of point groups in an instance (matching pairs two groups).
    pub fn n_groups(self) -> usize {
        match self {
            Task::Sort | Task::Tsp => 1,
            Task::Mwm2D => 2,
        }
    }

    /// Number of rows in the state matrix for problem size `n`.
    ///
    /// Matching instances stack both point groups, so their states carry
    /// `2n` rows; the permutation itself stays `n × n`.
    pub fn state_rows(self, n: usize) -> usize {
        self.n_groups() * n
    }

    /// Whether generated datasets carry oracle labels for this task.
    ///
    /// Only the matching task has an exact polynomial-time oracle wired in;
    /// sort/tsp datasets are written unlabeled.
    pub fn has_oracle_labels(self) -> bool {
        matches!(self, Task::Mwm2D)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Task::Sort => "sort",
            Task::Tsp => "tsp",
            Task::Mwm2D => "mwm2D",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Task {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sort" => Ok(Task::Sort),
            "tsp" => Ok(Task::Tsp),
            "mwm2D" | "mwm2d" => Ok(Task::Mwm2D),
            other => Err(Error::Config(format!("unknown task '{}'", other))),
        }
    }
}
