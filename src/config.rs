//! Construction parameters for spill trees.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpillTreeError};
use crate::split::{RuleRepr, SplitRule};

/// Default fraction of members propagated to both children of a split.
pub const DEFAULT_SPILL: f64 = 0.25;

/// Default minimum number of members a node needs before it may split.
pub const DEFAULT_MIN_ITEMS: usize = 64;

/// Target average leaf size used to derive a default height.
pub const TARGET_LEAF_SIZE: f64 = 500.0;

/// Configuration for building a spill tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpillTreeConfig {
    /// Split-direction heuristic, inherited by every node.
    pub rule: SplitRule,
    /// Fraction in `[0, 1)` of members that reach both children.
    pub spill: f64,
    /// Maximum height; `None` derives one from the member count.
    pub height: Option<i64>,
    /// Nodes with fewer members than this stay leaves.
    pub min_items: usize,
    /// Seed for the split-rule random source.
    pub seed: Option<u64>,
    /// Build sibling subtrees on the rayon pool.
    pub parallel_build: bool,
}

impl Default for SpillTreeConfig {
    fn default() -> Self {
        Self {
            rule: SplitRule::Kd,
            spill: DEFAULT_SPILL,
            height: None,
            min_items: DEFAULT_MIN_ITEMS,
            seed: None,
            parallel_build: false,
        }
    }
}

impl SpillTreeConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the split rule.
    pub fn with_rule(mut self, rule: SplitRule) -> Self {
        self.rule = rule;
        self
    }

    /// Set the spill fraction.
    pub fn with_spill(mut self, spill: f64) -> Self {
        self.spill = spill;
        self
    }

    /// Set an explicit maximum height.
    pub fn with_height(mut self, height: i64) -> Self {
        self.height = Some(height);
        self
    }

    /// Set the minimum node size for splitting.
    pub fn with_min_items(mut self, min_items: usize) -> Self {
        self.min_items = min_items;
        self
    }

    /// Seed the split-rule random source.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Enable or disable parallel construction.
    pub fn with_parallel_build(mut self, parallel_build: bool) -> Self {
        self.parallel_build = parallel_build;
        self
    }

    /// Check every parameter range.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.spill) {
            return Err(SpillTreeError::config(format!(
                "spill={:.2e}, must lie in range [0,1)",
                self.spill
            )));
        }

        if let Some(height) = self.height
            && height < 0
        {
            return Err(SpillTreeError::config(format!(
                "height={height}, must be non-negative"
            )));
        }

        self.rule.validate()
    }

    /// Height budget for a tree over `n` members.
    ///
    /// Uses the explicit height when set, otherwise [`default_height`].
    pub fn resolve_height(&self, n: usize) -> Result<usize> {
        self.validate()?;
        Ok(match self.height {
            Some(height) => height as usize,
            None => default_height(n, self.spill),
        })
    }

    /// Parse a configuration from JSON; missing fields take defaults.
    ///
    /// An unknown split-rule name is reported as a configuration error rather
    /// than a JSON error.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut value: serde_json::Value = serde_json::from_str(json)?;
        let rule = match value.as_object_mut().and_then(|fields| fields.remove("rule")) {
            Some(raw) => Some(SplitRule::try_from(serde_json::from_value::<RuleRepr>(raw)?)?),
            None => None,
        };

        let mut config: Self = serde_json::from_value(value)?;
        if let Some(rule) = rule {
            config.rule = rule;
        }
        config.validate()?;
        Ok(config)
    }

    /// Serialize this configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Height that yields leaves of roughly 500 members for `n` points.
///
/// With spill each child keeps about `(1 + spill) / 2` of its parent, so the
/// height is `ceil(log(n / 500) / log(2 / (1 + spill)))`, floored at 0.
///
/// `n / 500` is a real ratio. Truncating it to an integer first would give
/// height 0 for every `n` below 1000; here 750 points get one level.
pub fn default_height(n: usize, spill: f64) -> usize {
    if n == 0 {
        return 0;
    }
    let ratio = n as f64 / TARGET_LEAF_SIZE;
    let shrink = 2.0 / (1.0 + spill);
    let height = (ratio.ln() / shrink.ln()).ceil();
    if height.is_finite() && height > 0.0 {
        height as usize
    } else {
        0
    }
}
