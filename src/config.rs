use crate::utils::{check_num, check_prob};
use crate::virus::{Resistances, VirusParticle};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Parameters shared by every particle of the initial population.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VirusConfig {
    /// Reproduction probability at zero population density.
    pub max_birth_prob: f64,
    /// Per-step clearance probability.
    pub clear_prob: f64,
    /// Per-trait probability that an offspring flips its parent's resistance.
    pub mut_prob: f64,
    /// Initial resistance to each drug.
    #[serde(default)]
    pub resistances: Resistances,
}

impl TryFrom<VirusConfig> for VirusParticle {
    type Error = anyhow::Error;

    fn try_from(virus: VirusConfig) -> Result<Self> {
        VirusParticle::new(
            virus.max_birth_prob,
            virus.clear_prob,
            virus.mut_prob,
            virus.resistances,
        )
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatientConfig {
    /// Initial number of virus particles.
    pub n_viruses: usize,
    /// Maximum sustainable virus population.
    pub max_pop: usize,
}

/// A drug introduced before the given step is computed.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Prescription {
    pub step: usize,
    pub drug: String,
}

#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TreatmentConfig {
    #[serde(default)]
    pub prescriptions: Vec<Prescription>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Number of independent trials per run.
    pub n_trials: usize,
    /// Number of steps per trial.
    pub n_steps: usize,
    /// Number of steps between saved records.
    pub steps_per_save: usize,
    /// Largest final population counted as cured.
    pub cure_threshold: usize,
    /// Number of bins of the final population histogram.
    pub hist_bins: usize,
    /// Drug combinations whose resistant subpopulations are recorded.
    #[serde(default)]
    pub tracked: Vec<Vec<String>>,
    /// Base seed of the run. Drawn at random when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub virus: VirusConfig,
    pub patient: PatientConfig,
    #[serde(default)]
    pub treatment: TreatmentConfig,
    pub output: OutputConfig,
}

impl Config {
    /// Load a [`Config`] from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::from_toml(&contents)
    }

    /// Parse and validate a [`Config`] from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    /// Build a single particle of the initial population.
    pub fn virus_template(&self) -> Result<VirusParticle> {
        VirusParticle::try_from(self.virus.clone())
    }

    fn validate(&self) -> Result<()> {
        check_prob(self.virus.max_birth_prob).context("invalid maximum birth probability")?;
        check_prob(self.virus.clear_prob).context("invalid clearance probability")?;
        check_prob(self.virus.mut_prob).context("invalid mutation probability")?;

        check_num(self.patient.n_viruses, 1..).context("invalid initial number of viruses")?;
        check_num(self.patient.max_pop, 1..).context("invalid maximum population")?;

        check_num(self.output.n_trials, 1..).context("invalid number of trials")?;
        check_num(self.output.n_steps, 1..).context("invalid number of steps")?;
        check_num(self.output.steps_per_save, 1..).context("invalid number of steps per save")?;
        check_num(self.output.hist_bins, 1..).context("invalid number of histogram bins")?;

        for (i_pre, pre) in self.treatment.prescriptions.iter().enumerate() {
            check_num(pre.step, 0..=self.output.n_steps)
                .with_context(|| format!("invalid step of prescription {i_pre}"))?;
            self.check_drug(&pre.drug)
                .with_context(|| format!("invalid drug of prescription {i_pre}"))?;
        }

        for (i_set, drugs) in self.output.tracked.iter().enumerate() {
            for drug in drugs {
                self.check_drug(drug)
                    .with_context(|| format!("invalid drug of tracked set {i_set}"))?;
            }
        }

        Ok(())
    }

    fn check_drug(&self, drug: &str) -> Result<()> {
        if !self.virus.resistances.contains_key(drug) {
            bail!("drug {drug:?} has no resistance trait");
        }
        Ok(())
    }
}
