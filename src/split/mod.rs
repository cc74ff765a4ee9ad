//! Split-direction strategies.
//!
//! Each rule consumes the member vectors of a node and produces one direction
//! of the node's dimensionality. Members are then projected onto that
//! direction and partitioned by quantile thresholds (see [`crate::partition`]).
//!
//! - [`SplitRule::Kd`]: coordinate axis of maximum variance.
//! - [`SplitRule::Pca`]: top eigenvector of the covariance matrix.
//! - [`SplitRule::TwoMeans`]: difference of two online k-means centroids.
//! - [`SplitRule::RandomProjection`]: widest-spread of several random directions.

pub mod kd;
pub mod pca;
pub mod random_projection;
pub mod two_means;

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpillTreeError};
use crate::source::DataSource;
use crate::vector::Vector;

/// Default minimum number of online assignment steps for two-means splits.
pub const DEFAULT_STEPS_2MEANS: usize = 1000;

/// Default number of candidate directions for random-projection splits.
pub const DEFAULT_SAMPLES_RP: usize = 10;

/// The heuristic used to choose a node's split direction.
///
/// Serialized as `{"type": "<name>", ...params}` using the same names as
/// [`SplitRule::name`]; a bare name string is accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RuleRepr", into = "RuleRepr")]
pub enum SplitRule {
    /// Axis-aligned split on the coordinate of maximum variance.
    #[default]
    Kd,
    /// Split along the principal component.
    Pca,
    /// Split along the difference of two streaming k-means centroids.
    TwoMeans {
        /// Minimum number of assignment steps.
        steps: usize,
    },
    /// Split along the widest of several random unit directions.
    RandomProjection {
        /// Number of candidate directions.
        samples: usize,
    },
}

impl SplitRule {
    /// Two-means rule with the default step budget.
    pub fn two_means() -> Self {
        SplitRule::TwoMeans {
            steps: DEFAULT_STEPS_2MEANS,
        }
    }

    /// Random-projection rule with the default number of samples.
    pub fn random_projection() -> Self {
        SplitRule::RandomProjection {
            samples: DEFAULT_SAMPLES_RP,
        }
    }

    /// The short name of this rule.
    pub fn name(&self) -> &'static str {
        match self {
            SplitRule::Kd => "kd",
            SplitRule::Pca => "pca",
            SplitRule::TwoMeans { .. } => "2-means",
            SplitRule::RandomProjection { .. } => "rp",
        }
    }

    /// Check rule-specific parameters.
    pub fn validate(&self) -> Result<()> {
        match self {
            SplitRule::RandomProjection { samples: 0 } => Err(SpillTreeError::config(
                "samples_rp must be at least 1",
            )),
            _ => Ok(()),
        }
    }

    /// Compute a split direction for the given members.
    ///
    /// Fails with a numerical error when `members` is empty, or when the PCA
    /// rule is given fewer than two members.
    pub fn direction<S, R>(
        &self,
        source: &S,
        members: &[S::Key],
        dimension: usize,
        rng: &mut R,
    ) -> Result<Vector>
    where
        S: DataSource + ?Sized,
        R: Rng + ?Sized,
    {
        if members.is_empty() {
            return Err(SpillTreeError::numerical(format!(
                "{} split attempted on a node with no members",
                self.name()
            )));
        }

        match *self {
            SplitRule::Kd => kd::direction(source, members, dimension),
            SplitRule::Pca => pca::direction(source, members, dimension),
            SplitRule::TwoMeans { steps } => {
                two_means::direction(source, members, dimension, steps, rng)
            }
            SplitRule::RandomProjection { samples } => {
                random_projection::direction(source, members, dimension, samples, rng)
            }
        }
    }
}

impl fmt::Display for SplitRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SplitRule {
    type Err = SpillTreeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "kd" => Ok(SplitRule::Kd),
            "pca" => Ok(SplitRule::Pca),
            "2-means" => Ok(SplitRule::two_means()),
            "rp" => Ok(SplitRule::random_projection()),
            _ => Err(SpillTreeError::config(format!("Unsupported split rule: {s}"))),
        }
    }
}

/// Wire form of a [`SplitRule`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleRepr {
    /// Bare rule name with default parameters.
    Name(String),
    /// Rule name with optional parameters.
    Tagged {
        #[serde(rename = "type")]
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        steps: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        samples: Option<usize>,
    },
}

impl TryFrom<RuleRepr> for SplitRule {
    type Error = SpillTreeError;

    fn try_from(repr: RuleRepr) -> Result<Self> {
        let (name, steps, samples) = match repr {
            RuleRepr::Name(name) => (name, None, None),
            RuleRepr::Tagged {
                name,
                steps,
                samples,
            } => (name, steps, samples),
        };

        let rule = match name.parse::<SplitRule>()? {
            SplitRule::TwoMeans { steps: default } => SplitRule::TwoMeans {
                steps: steps.unwrap_or(default),
            },
            SplitRule::RandomProjection { samples: default } => SplitRule::RandomProjection {
                samples: samples.unwrap_or(default),
            },
            rule => rule,
        };
        rule.validate()?;
        Ok(rule)
    }
}

impl From<SplitRule> for RuleRepr {
    fn from(rule: SplitRule) -> Self {
        let (steps, samples) = match rule {
            SplitRule::TwoMeans { steps } => (Some(steps), None),
            SplitRule::RandomProjection { samples } => (None, Some(samples)),
            SplitRule::Kd | SplitRule::Pca => (None, None),
        };
        RuleRepr::Tagged {
            name: rule.name().to_string(),
            steps,
            samples,
        }
    }
}

/// Accumulate the per-coordinate mean of the member vectors in `f64`.
pub(crate) fn mean<S>(source: &S, members: &[S::Key], dimension: usize) -> Result<Vec<f64>>
where
    S: DataSource + ?Sized,
{
    let mut mean = vec![0.0; dimension];
    for key in members {
        let vector = source.vector_at(key)?;
        vector.validate_dimension(dimension)?;
        for (m, &x) in mean.iter_mut().zip(vector.data.iter()) {
            *m += x as f64;
        }
    }
    let n = members.len() as f64;
    for m in &mut mean {
        *m /= n;
    }
    Ok(mean)
}

/// Index of the first maximum of `values`, ignoring NaN entries.
pub(crate) fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &value) in values.iter().enumerate() {
        if value.is_nan() {
            continue;
        }
        match best {
            Some((_, current)) if value <= current => {}
            _ => best = Some((i, value)),
        }
    }
    best.map(|(i, _)| i)
}
