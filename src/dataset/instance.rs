//! A single problem instance and its on-disk record format.

use std::path::Path;

use crate::error::{Error, Result};
use crate::task::Task;

/// Oracle-computed optimal assignment attached to an instance.
///
/// Used only for post-hoc optimality-ratio evaluation (and optional
/// supervision), never as RL training-time ground truth.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    /// `assignment[i] = j` pairs point `i` of group A with point `j` of
    /// group B.
    pub assignment: Vec<usize>,
    /// Exact total weight of the optimal matching.
    pub weight: f64,
}

/// An ordered sequence of feature vectors, immutable once generated.
///
/// Single-group tasks (sort, tsp) hold `n` points; the matching task holds
/// `2n` points, group A first.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    /// Task this instance belongs to (fixes the record shape).
    pub task: Task,
    /// Problem size N.
    pub n_nodes: usize,
    /// `task.state_rows(n_nodes)` points of `task.n_features()` values each.
    pub points: Vec<Vec<f64>>,
    /// Optional oracle label.
    pub label: Option<Label>,
}

impl Instance {
    /// Returns the points of one group (0 = A, 1 = B).
    pub fn group(&self, g: usize) -> &[Vec<f64>] {
        let n = self.n_nodes;
        &self.points[g * n..(g + 1) * n]
    }

    /// Flattens the points row-major into `f32` for tensor construction.
    pub fn flat_f32(&self) -> Vec<f32> {
        self.points
            .iter()
            .flat_map(|p| p.iter().map(|&v| v as f32))
            .collect()
    }

    /// Serializes to the canonical record: one whitespace-separated row per
    /// feature dimension per group (`groups × n_features` rows of `n` values);
    /// a label appends the permutation indices and weight to the final row.
    pub fn to_record(&self) -> String {
        let n = self.n_nodes;
        let n_features = self.task.n_features();
        let n_groups = self.task.n_groups();
        let n_rows = n_groups * n_features;

        let mut out = String::new();
        for row in 0..n_rows {
            let group = row / n_features;
            let feat = row % n_features;
            let values: Vec<String> = (0..n)
                .map(|j| self.points[group * n + j][feat].to_string())
                .collect();
            out.push_str(&values.join(" "));
            if row + 1 == n_rows {
                if let Some(label) = &self.label {
                    for idx in &label.assignment {
                        out.push(' ');
                        out.push_str(&idx.to_string());
                    }
                    out.push(' ');
                    out.push_str(&label.weight.to_string());
                }
            }
            out.push('\n');
        }
        out
    }

    /// Parses a record written by [`Instance::to_record`].
    ///
    /// `path` is only used for error reporting.
    pub fn parse_record(
        record: &str,
        task: Task,
        n_nodes: usize,
        path: &Path,
    ) -> Result<Instance> {
        let n_features = task.n_features();
        let n_groups = task.n_groups();
        let n_rows = n_groups * n_features;

        let lines: Vec<&str> = record.lines().collect();
        if lines.len() != n_rows {
            return Err(Error::dataset_format(
                path,
                format!("expected {} rows, found {}", n_rows, lines.len()),
            ));
        }

        let mut points = vec![vec![0.0f64; n_features]; n_groups * n_nodes];
        let mut label = None;
        for (row, line) in lines.iter().enumerate() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let last_row = row + 1 == n_rows;
            let labeled = last_row && tokens.len() == 2 * n_nodes + 1;
            if tokens.len() != n_nodes && !labeled {
                return Err(Error::dataset_format(
                    path,
                    format!(
                        "row {}: expected {} values{}, found {}",
                        row,
                        n_nodes,
                        if last_row {
                            format!(" (or {} when labeled)", 2 * n_nodes + 1)
                        } else {
                            String::new()
                        },
                        tokens.len()
                    ),
                ));
            }

            let group = row / n_features;
            let feat = row % n_features;
            for j in 0..n_nodes {
                points[group * n_nodes + j][feat] = parse_f64(tokens[j], path, row)?;
            }

            if labeled {
                let assignment: Vec<usize> = tokens[n_nodes..2 * n_nodes]
                    .iter()
                    .map(|t| {
                        t.parse::<usize>()
                            .ok()
                            .filter(|&j| j < n_nodes)
                            .ok_or_else(|| {
                                Error::dataset_format(
                                    path,
                                    format!("assignment index '{}' not in 0..{}", t, n_nodes),
                                )
                            })
                    })
                    .collect::<Result<_>>()?;
                let weight = parse_f64(tokens[2 * n_nodes], path, row)?;
                label = Some(Label { assignment, weight });
            }
        }

        Ok(Instance {
            task,
            n_nodes,
            points,
            label,
        })
    }
}

fn parse_f64(token: &str, path: &Path, row: usize) -> Result<f64> {
    token.parse::<f64>().map_err(|_| {
        Error::dataset_format(path, format!("row {}: bad number '{}'", row, token))
    })
}
