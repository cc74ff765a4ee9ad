//! # spilltree
//!
//! Approximate nearest-neighbor search with spatial partition trees.
//!
//! A [`SpillTree`] recursively splits a set of keyed vectors along a projection
//! direction chosen by one of four rules:
//!
//! - `kd`: coordinate axis of maximum variance
//! - `pca`: principal component
//! - `2-means`: difference of two streaming k-means centroids
//! - `rp`: widest of several random directions
//!
//! With `spill > 0`, points whose projection falls near the split threshold
//! are copied into both children. The overlap costs memory but raises the
//! chance that a query lands in a leaf holding its true neighbors.
//!
//! Vectors stay in a caller-owned [`DataSource`]; the tree stores keys only.

pub mod config;
pub mod error;
pub mod partition;
pub mod search;
pub mod source;
pub mod split;
pub mod tree;
pub mod vector;

pub use config::SpillTreeConfig;
pub use error::{Result, SpillTreeError};
pub use partition::Thresholds;
pub use search::{Neighbor, Query};
pub use source::{Addressing, DataSource, DenseSource, Key, KeyedSource};
pub use split::SplitRule;
pub use tree::{Node, SpillTree, TreeStats};
pub use vector::Vector;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
