//! End-to-end mwm2D training demo at toy scale.
//!
//! Generates a labeled dataset, trains the siamese matching actor-critic for
//! a few epochs, and reports the optimality ratio against the exact oracle
//! baseline after each epoch.
//!
//! Usage: `cargo run --example train_mwm2d`

use tch::Device;

use sinkrl::{
    generate, EvalReport, GeneratorConfig, InstanceDataset, SpgConfig, SpgTrainer, StderrSink,
    Task, TrainingState,
};

fn main() -> sinkrl::Result<()> {
    let n_nodes = 10;
    let data_dir = std::env::temp_dir().join("sinkrl-demo-mwm2d");

    let gen_config = GeneratorConfig {
        train_size: 512,
        val_size: 64,
        test_size: 64,
        ..GeneratorConfig::mwm2d(n_nodes, &data_dir, 1234)
    };
    let dirs = generate(&gen_config)?;
    let train = InstanceDataset::new(&dirs.train, Task::Mwm2D, n_nodes, gen_config.train_size);
    let val = InstanceDataset::new(&dirs.val, Task::Mwm2D, n_nodes, gen_config.val_size);

    let config = SpgConfig {
        buffer_capacity: 4096,
        batch_size: 32,
        epsilon_decay_step: 1000,
        log_step: 10,
        ..SpgConfig::for_task(Task::Mwm2D, n_nodes)
    };
    let device = Device::cuda_if_available();
    let mut trainer = SpgTrainer::new(config.clone(), device)?;
    let mut state = TrainingState::new(&config);
    let mut sink = StderrSink;

    let baseline: EvalReport = trainer.evaluate(&val, config.batch_size)?;
    eprintln!("before training:\n{}", baseline);

    for epoch in 0..3 {
        let summary = trainer.train_epoch(&train, &mut state, &mut sink)?;
        let report = trainer.evaluate(&val, config.batch_size)?;
        eprintln!(
            "epoch {}: steps={} aborted={} train_reward={:.4}\n{}",
            epoch, summary.steps, summary.aborted_steps, summary.mean_reward, report
        );
    }

    Ok(())
}
