//! Loading generated instances back into tensors.

use std::fs;
use std::path::PathBuf;

use tch::{Device, Kind, Tensor};

use super::instance::Instance;
use crate::error::{Error, Result};
use crate::task::Task;

/// A split directory of generated instances, loadable by dense index.
#[derive(Debug, Clone)]
pub struct InstanceDataset {
    dir: PathBuf,
    task: Task,
    n_nodes: usize,
    size: usize,
}

impl InstanceDataset {
    /// Opens a split directory. `size` is the number of records present.
    pub fn new(dir: impl Into<PathBuf>, task: Task, n_nodes: usize, size: usize) -> Self {
        Self {
            dir: dir.into(),
            task,
            n_nodes,
            size,
        }
    }

    /// Number of instances in this split.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Whether the split is empty.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Problem size N.
    pub fn n_nodes(&self) -> usize {
        self.n_nodes
    }

    /// Loads the instance at `index`. Missing or malformed files surface as
    /// dataset errors; nothing is recovered.
    pub fn load(&self, index: usize) -> Result<Instance> {
        let path = self.dir.join(format!("{}.txt", index));
        let record =
            fs::read_to_string(&path).map_err(|e| Error::dataset_io(path.clone(), e))?;
        Instance::parse_record(&record, self.task, self.n_nodes, &path)
    }

    /// Loads a batch of instances as a `[batch, rows, n_features]` tensor.
    pub fn state_batch(&self, indices: &[usize], device: Device) -> Result<Tensor> {
        let rows = self.task.state_rows(self.n_nodes) as i64;
        let feats = self.task.n_features() as i64;
        let mut flat = Vec::with_capacity(indices.len() * (rows * feats) as usize);
        for &index in indices {
            flat.extend(self.load(index)?.flat_f32());
        }
        Ok(Tensor::from_slice(&flat)
            .reshape([indices.len() as i64, rows, feats])
            .to_kind(Kind::Float)
            .to_device(device))
    }

    /// Yields contiguous index minibatches, dropping a trailing partial one.
    pub fn batches(&self, batch_size: usize) -> impl Iterator<Item = Vec<usize>> + '_ {
        (0..self.size / batch_size)
            .map(move |b| (b * batch_size..(b + 1) * batch_size).collect())
    }

    /// Mean oracle weight across the split, the mwm2D optimality-ratio
    /// baseline. Fails if any record is unlabeled.
    pub fn average_optimal_weight(&self) -> Result<f64> {
        if self.size == 0 {
            return Err(Error::Config("empty dataset has no baseline".into()));
        }
        let mut total = 0.0;
        for index in 0..self.size {
            let instance = self.load(index)?;
            let label = instance.label.ok_or_else(|| {
                Error::dataset_format(
                    self.dir.join(format!("{}.txt", index)),
                    "record is unlabeled; baseline requires oracle labels",
                )
            })?;
            total += label.weight;
        }
        Ok(total / self.size as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::generator::{generate, GeneratorConfig};

    fn generated(tag: &str) -> (GeneratorConfig, crate::dataset::SplitDirs, PathBuf) {
        let root = std::env::temp_dir().join(format!(
            "sinkrl-load-{}-{}",
            tag,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&root);
        let cfg = GeneratorConfig {
            train_size: 4,
            val_size: 3,
            test_size: 2,
            ..GeneratorConfig::mwm2d(4, &root, 7)
        };
        let dirs = generate(&cfg).unwrap();
        (cfg, dirs, root)
    }

    #[test]
    fn load_round_trips_generated_instances() {
        let (cfg, dirs, root) = generated("roundtrip");
        let ds = InstanceDataset::new(&dirs.val, cfg.task, cfg.n_nodes, cfg.val_size);
        for idx in 0..ds.len() {
            let inst = ds.load(idx).unwrap();
            assert_eq!(inst.points.len(), cfg.task.state_rows(cfg.n_nodes));
            assert!(inst.label.is_some());
        }
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn missing_file_is_io_error() {
        let (cfg, dirs, root) = generated("missing");
        let ds = InstanceDataset::new(&dirs.test, cfg.task, cfg.n_nodes, 50);
        assert!(matches!(ds.load(49), Err(Error::DatasetIo { .. })));
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn state_batch_shape() {
        let (cfg, dirs, root) = generated("batch");
        let ds = InstanceDataset::new(&dirs.train, cfg.task, cfg.n_nodes, cfg.train_size);
        let states = ds.state_batch(&[0, 1, 2], Device::Cpu).unwrap();
        assert_eq!(states.size(), &[3, 8, 2]); // 2 groups × 4 nodes, 2D points
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn average_optimal_weight_is_positive() {
        let (cfg, dirs, root) = generated("baseline");
        let ds = InstanceDataset::new(&dirs.val, cfg.task, cfg.n_nodes, cfg.val_size);
        let baseline = ds.average_optimal_weight().unwrap();
        assert!(baseline > 0.0);
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn baseline_requires_labels() {
        let (cfg, dirs, root) = generated("nolabel");
        // Training records are unlabeled by default.
        let ds = InstanceDataset::new(&dirs.train, cfg.task, cfg.n_nodes, cfg.train_size);
        assert!(ds.average_optimal_weight().is_err());
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn batches_drop_partial_tail() {
        let (cfg, dirs, root) = generated("batches");
        let ds = InstanceDataset::new(&dirs.val, cfg.task, cfg.n_nodes, cfg.val_size);
        let batches: Vec<_> = ds.batches(2).collect();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0], vec![0, 1]);
        let _ = fs::remove_dir_all(&root);
    }
}
