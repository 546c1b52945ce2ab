//! Generates a small labeled mwm2D dataset and prints the split layout.
//!
//! Usage: `cargo run --example generate_dataset [out_dir]`

use sinkrl::{generate, GeneratorConfig, InstanceDataset, Split, Task};

fn main() -> sinkrl::Result<()> {
    let out_dir = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "data/mwm2d".into());

    let config = GeneratorConfig {
        train_size: 2000,
        val_size: 200,
        test_size: 200,
        ..GeneratorConfig::mwm2d(10, &out_dir, 1234)
    };
    let dirs = generate(&config)?;

    for split in Split::all() {
        println!("{}: {}", split.dir_name(), dirs.dir(split).display());
    }

    let val = InstanceDataset::new(&dirs.val, Task::Mwm2D, config.n_nodes, config.val_size);
    println!(
        "average optimal matching weight (val): {:.4}",
        val.average_optimal_weight()?
    );
    Ok(())
}
