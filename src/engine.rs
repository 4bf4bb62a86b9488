use crate::config::Config;
use crate::model::{Record, Trajectory};
use crate::patient::PatientSimulation;
use crate::virus::VirusParticle;
use anyhow::{Context, Result};
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;

/// Single trial engine.
///
/// Holds the configuration and the simulated patient, applies the treatment
/// schedule and records the population at regular intervals.
pub struct Engine<'a> {
    cfg: &'a Config,
    patient: PatientSimulation,
    seed: u64,
    trial_idx: usize,
    step: usize,
}

impl<'a> Engine<'a> {
    /// Create the engine of trial `trial_idx` of a run seeded with `seed`.
    ///
    /// Every trial draws from its own stream of the run's generator, so trials
    /// are independent and reproducible regardless of execution order.
    pub fn new(cfg: &'a Config, seed: u64, trial_idx: usize) -> Result<Self> {
        let mut rng = ChaCha12Rng::seed_from_u64(seed);
        rng.set_stream(trial_idx as u64);

        let template = cfg
            .virus_template()
            .context("failed to construct virus template")?;
        let population = VirusParticle::collection(cfg.patient.n_viruses, &template);
        let patient = PatientSimulation::new(population, cfg.patient.max_pop, rng)
            .context("failed to construct patient")?;

        Ok(Self {
            cfg,
            patient,
            seed,
            trial_idx,
            step: 0,
        })
    }

    pub fn patient(&self) -> &PatientSimulation {
        &self.patient
    }

    /// Run the trial to completion and return its trajectory.
    pub fn run(mut self) -> Trajectory {
        let cfg = self.cfg;
        let output = &cfg.output;
        let mut records = Vec::with_capacity(output.n_steps / output.steps_per_save + 2);
        records.push(self.record());

        let mut saturated = false;
        while self.step < output.n_steps {
            self.perform_step();

            if !saturated && self.patient.last_density() == Some(1.0) {
                saturated = true;
                log::warn!(
                    "trial {} reached the maximum population at step {}",
                    self.trial_idx,
                    self.step
                );
            }

            if self.step % output.steps_per_save == 0 || self.step == output.n_steps {
                records.push(self.record());
            }
        }

        let trajectory = Trajectory {
            seed: self.seed,
            trial_idx: self.trial_idx,
            records,
        };
        log::debug!(
            "trial {} finished with {} viruses",
            self.trial_idx,
            trajectory.final_total()
        );
        trajectory
    }

    fn perform_step(&mut self) {
        // Drugs scheduled for this step act on it.
        for pre in &self.cfg.treatment.prescriptions {
            if pre.step == self.step {
                self.patient.prescribe(&pre.drug);
            }
        }

        self.patient.advance_step();
        self.step += 1;
    }

    fn record(&self) -> Record {
        Record {
            step: self.step,
            total: self.patient.total_population(),
            resistant: self
                .cfg
                .output
                .tracked
                .iter()
                .map(|drugs| self.patient.resistant_count(drugs))
                .collect(),
        }
    }
}
