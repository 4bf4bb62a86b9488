use crate::config::Config;
use crate::model::Trajectory;
use crate::stats::{Accumulator, AccumulatorReport, Histogram, HistogramReport};
use anyhow::{Context, Result, bail};
use rmp_serde::encode;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

/// Observable computed over the trials of a run.
pub trait Obs {
    fn update(&mut self, trajectory: &Trajectory) -> Result<()>;
    fn report(&self, results: &mut Results);
}

/// Monte Carlo statistics of a run.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Results {
    pub n_trials: usize,

    /// Steps at which records were saved.
    pub steps: Vec<usize>,
    /// Total population at each saved step.
    pub total: Vec<AccumulatorReport>,
    /// Resistant subpopulations, indexed by tracked set and then saved step.
    pub resistant: Vec<Vec<AccumulatorReport>>,

    pub final_total: Option<AccumulatorReport>,
    pub final_hist: Option<HistogramReport>,
    /// Fraction of trials whose final population is at most the cure threshold.
    pub cure_rate: f64,
}

pub struct TotalPop {
    acc_vec: Vec<Accumulator>,
}

impl TotalPop {
    pub fn new() -> Self {
        Self {
            acc_vec: Vec::new(),
        }
    }
}

impl Obs for TotalPop {
    fn update(&mut self, trajectory: &Trajectory) -> Result<()> {
        let records = &trajectory.records;
        if self.acc_vec.is_empty() {
            self.acc_vec.resize_with(records.len(), Accumulator::new);
        }
        if records.len() != self.acc_vec.len() {
            bail!(
                "trajectory must have {} records, but has {}",
                self.acc_vec.len(),
                records.len()
            );
        }

        for (acc, rec) in self.acc_vec.iter_mut().zip(records) {
            acc.add(rec.total as f64);
        }
        Ok(())
    }

    fn report(&self, results: &mut Results) {
        results.total = self.acc_vec.iter().map(|acc| acc.report()).collect();
    }
}

pub struct ResistantPop {
    n_sets: usize,
    acc_mat: Vec<Vec<Accumulator>>,
}

impl ResistantPop {
    pub fn new(cfg: &Config) -> Self {
        let n_sets = cfg.output.tracked.len();
        Self {
            n_sets,
            acc_mat: Vec::new(),
        }
    }
}

impl Obs for ResistantPop {
    fn update(&mut self, trajectory: &Trajectory) -> Result<()> {
        let records = &trajectory.records;
        if self.acc_mat.is_empty() {
            self.acc_mat = (0..self.n_sets)
                .map(|_| {
                    let mut acc_vec = Vec::new();
                    acc_vec.resize_with(records.len(), Accumulator::new);
                    acc_vec
                })
                .collect();
        }

        for (i_rec, rec) in records.iter().enumerate() {
            if rec.resistant.len() != self.n_sets {
                bail!(
                    "record {i_rec} must track {} sets, but tracks {}",
                    self.n_sets,
                    rec.resistant.len()
                );
            }
            for (acc_vec, &count) in self.acc_mat.iter_mut().zip(&rec.resistant) {
                acc_vec
                    .get_mut(i_rec)
                    .with_context(|| format!("unexpected record {i_rec}"))?
                    .add(count as f64);
            }
        }
        Ok(())
    }

    fn report(&self, results: &mut Results) {
        results.resistant = self
            .acc_mat
            .iter()
            .map(|acc_vec| acc_vec.iter().map(|acc| acc.report()).collect())
            .collect();
    }
}

pub struct FinalPop {
    cure_threshold: usize,
    n_cured: usize,
    acc: Accumulator,
    hist: Histogram,
}

impl FinalPop {
    pub fn new(cfg: &Config) -> Self {
        Self {
            cure_threshold: cfg.output.cure_threshold,
            n_cured: 0,
            acc: Accumulator::new(),
            hist: Histogram::new(cfg.patient.max_pop, cfg.output.hist_bins),
        }
    }
}

impl Obs for FinalPop {
    fn update(&mut self, trajectory: &Trajectory) -> Result<()> {
        let final_total = trajectory.final_total();
        self.acc.add(final_total as f64);
        self.hist.add(final_total);
        if final_total <= self.cure_threshold {
            self.n_cured += 1;
        }
        Ok(())
    }

    fn report(&self, results: &mut Results) {
        results.final_total = Some(self.acc.report());
        results.final_hist = Some(self.hist.report());
        results.cure_rate = if results.n_trials > 0 {
            self.n_cured as f64 / results.n_trials as f64
        } else {
            f64::NAN
        };
    }
}

/// Aggregates trial trajectories into [`Results`].
pub struct Analyzer {
    n_trials: usize,
    steps: Option<Vec<usize>>,
    obs_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    pub fn new(cfg: &Config) -> Self {
        let obs_vec: Vec<Box<dyn Obs>> = vec![
            Box::new(TotalPop::new()),
            Box::new(ResistantPop::new(cfg)),
            Box::new(FinalPop::new(cfg)),
        ];
        Self {
            n_trials: 0,
            steps: None,
            obs_vec,
        }
    }

    pub fn add_trajectory(&mut self, trajectory: &Trajectory) -> Result<()> {
        let steps: Vec<_> = trajectory.records.iter().map(|rec| rec.step).collect();
        match &self.steps {
            None => self.steps = Some(steps),
            Some(exp_steps) if exp_steps != &steps => {
                bail!("trial {} was saved at different steps", trajectory.trial_idx);
            }
            Some(_) => {}
        }

        for obs in &mut self.obs_vec {
            obs.update(trajectory)?;
        }
        self.n_trials += 1;
        Ok(())
    }

    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let trajectory =
            Trajectory::load(file).with_context(|| format!("failed to load {file:?}"))?;
        self.add_trajectory(&trajectory)
    }

    pub fn results(&self) -> Results {
        let mut results = Results {
            n_trials: self.n_trials,
            steps: self.steps.clone().unwrap_or_default(),
            ..Results::default()
        };
        for obs in &self.obs_vec {
            obs.report(&mut results);
        }
        results
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<Results> {
        let results = self.results();

        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, &results).context("failed to serialize results")?;
        writer.flush().context("failed to flush writer stream")?;

        Ok(results)
    }
}
