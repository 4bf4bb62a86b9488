use crate::analysis::Analyzer;
use crate::config::Config;
use crate::engine::Engine;
use anyhow::{Context, Result};
use glob::glob;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

/// Seed a run was performed with.
#[derive(Debug, Serialize, Deserialize)]
struct RunInfo {
    seed: u64,
}

pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    /// Perform a new run of `n_trials` independent trials.
    pub fn create_run(&self) -> Result<()> {
        let run_idx = self.count_run_dirs().context("failed to count run dirs")?;

        let run_dir = self.run_dir(run_idx);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        // Seeds must fit in a TOML integer.
        let seed = match self.cfg.output.seed {
            Some(seed) => seed,
            None => rand::rng().random_range(0..=i64::MAX as u64),
        };
        let info_file = self.info_file(run_idx);
        let info_str = toml::to_string(&RunInfo { seed }).context("failed to serialize info")?;
        fs::write(&info_file, info_str).with_context(|| format!("failed to write {info_file:?}"))?;
        log::info!("using seed {seed}");

        let n_trials = self.cfg.output.n_trials;
        let n_done = AtomicUsize::new(0);
        (0..n_trials).into_par_iter().try_for_each(|trial_idx| {
            let engine = Engine::new(&self.cfg, seed, trial_idx)
                .with_context(|| format!("failed to construct engine of trial {trial_idx}"))?;
            let trajectory = engine.run();

            let trial_file = self.trial_file(run_idx, trial_idx);
            trajectory
                .save(&trial_file)
                .with_context(|| format!("failed to save {trial_file:?}"))?;

            let n_done = n_done.fetch_add(1, Ordering::Relaxed) + 1;
            let progress = 100.0 * n_done as f64 / n_trials as f64;
            log::info!("completed {progress:06.2}%");

            anyhow::Ok(())
        })?;

        Ok(())
    }

    /// Aggregate the trials of every run.
    pub fn analyze_sim(&self) -> Result<()> {
        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        for run_idx in 0..n_runs {
            let mut analyzer = Analyzer::new(&self.cfg);

            for trial_file in self.trial_files(run_idx)? {
                analyzer
                    .add_file(&trial_file)
                    .with_context(|| format!("failed to add {trial_file:?}"))?;
            }

            let results_file = self.results_file(run_idx);
            let results = analyzer
                .save_results(&results_file)
                .with_context(|| format!("failed to save {results_file:?}"))?;
            log::info!(
                "run {run_idx}: {} trials, cure rate {:.4}",
                results.n_trials,
                results.cure_rate
            );
            if let Some(final_total) = &results.final_total {
                log::info!(
                    "run {run_idx}: final population {:.2} +- {:.2}",
                    final_total.mean,
                    final_total.std_dev
                );
            }
        }

        Ok(())
    }

    /// Remove every run directory.
    pub fn clean_sim(&self) -> Result<()> {
        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        for run_idx in 0..n_runs {
            let run_dir = self.run_dir(run_idx);
            fs::remove_dir_all(&run_dir)
                .with_context(|| format!("failed to remove {run_dir:?}"))?;
            log::info!("removed {run_dir:?}");
        }

        Ok(())
    }

    fn count_run_dirs(&self) -> Result<usize> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let count = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .count();
        Ok(count)
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }

    fn trial_files(&self, run_idx: usize) -> Result<Vec<PathBuf>> {
        let pattern = self.run_dir(run_idx).join("trial-*.msgpack");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let files = glob(pattern)
            .context("failed to glob trial files")?
            .filter_map(Result::ok)
            .collect();
        Ok(files)
    }

    fn info_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("seed.toml")
    }

    fn trial_file(&self, run_idx: usize, trial_idx: usize) -> PathBuf {
        self.run_dir(run_idx)
            .join(format!("trial-{trial_idx:04}.msgpack"))
    }

    fn results_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("results.msgpack")
    }
}
