//! Problem-instance datasets: canonical record format, generation, loading.
//!
//! One text file per instance, under `<root>/<split>/N=<n>/<index>.txt`.
//! Validation and test records (and training records in supervised-label
//! mode) carry the oracle's optimal matching so evaluation can report an
//! optimality ratio against a provably optimal baseline.

mod generator;
mod instance;
mod loader;

pub use generator::{generate, GeneratorConfig, SplitDirs, SplitSelection};
pub use instance::{Instance, Label};
pub use loader::InstanceDataset;

use std::path::{Path, PathBuf};

/// Dataset partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    /// Directory name for this split.
    pub fn dir_name(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }

    /// Stable numeric id, mixed into per-instance RNG seeds.
    pub fn id(self) -> u64 {
        match self {
            Split::Train => 0,
            Split::Val => 1,
            Split::Test => 2,
        }
    }

    /// All splits in canonical order.
    pub fn all() -> [Split; 3] {
        [Split::Train, Split::Val, Split::Test]
    }

    /// Directory for this split under `root`, namespaced by problem size.
    pub fn dir(self, root: &Path, n_nodes: usize) -> PathBuf {
        root.join(self.dir_name()).join(format!("N={}", n_nodes))
    }
}
