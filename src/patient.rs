//! Patient simulation.
//!
//! A `PatientSimulation` owns a virus population, the maximum population the
//! patient can sustain and the drugs prescribed so far. Each call to
//! [`PatientSimulation::advance_step`] applies one time step in a fixed order:
//!
//! 1. Clearance: every living particle is cleared with its own probability.
//! 2. Density: the survivor count divided by the maximum population, capped at 1.
//! 3. Reproduction: every survivor reproduces against that density and the
//!    prescribed drugs. Offspring join the population after the pass.

use crate::virus::VirusParticle;
use anyhow::{Result, bail};
use rand_chacha::ChaCha12Rng;
use std::collections::BTreeSet;

/// Virus population dynamics inside a single patient.
#[derive(Clone)]
pub struct PatientSimulation {
    population: Vec<VirusParticle>,
    max_pop: usize,
    prescribed_drugs: BTreeSet<String>,
    rng: ChaCha12Rng,
    last_density: Option<f64>,
}

impl PatientSimulation {
    /// Create a new simulation.
    ///
    /// # Errors
    /// Returns an error if `max_pop` is zero, if `population` is empty or if
    /// its particles do not all carry the same resistance traits.
    pub fn new(population: Vec<VirusParticle>, max_pop: usize, rng: ChaCha12Rng) -> Result<Self> {
        if max_pop == 0 {
            bail!("maximum population must be positive");
        }
        let Some(first) = population.first() else {
            bail!("initial population must not be empty");
        };
        if population
            .iter()
            .any(|virus| !virus.resistances().keys().eq(first.resistances().keys()))
        {
            bail!("all initial particles must carry the same resistance traits");
        }

        Ok(Self {
            population,
            max_pop,
            prescribed_drugs: BTreeSet::new(),
            rng,
            last_density: None,
        })
    }

    pub fn population(&self) -> &[VirusParticle] {
        &self.population
    }

    pub fn max_pop(&self) -> usize {
        self.max_pop
    }

    pub fn total_population(&self) -> usize {
        self.population.len()
    }

    /// Density used by the reproduction pass of the last step, if any step ran.
    pub fn last_density(&self) -> Option<f64> {
        self.last_density
    }

    /// Prescribe `drug` from now on. Prescribing a drug twice has no effect.
    pub fn prescribe(&mut self, drug: &str) {
        if self.prescribed_drugs.insert(drug.to_string()) {
            log::debug!("prescribed {drug}");
        }
    }

    pub fn prescribed_drugs(&self) -> &BTreeSet<String> {
        &self.prescribed_drugs
    }

    /// Number of particles resistant to every drug in `drugs`.
    ///
    /// An empty `drugs` matches every particle.
    pub fn resistant_count<S: AsRef<str>>(&self, drugs: &[S]) -> usize {
        self.population
            .iter()
            .filter(|virus| virus.is_resistant_to_all(drugs))
            .count()
    }

    /// Advance the population by one time step and return its new size.
    pub fn advance_step(&mut self) -> usize {
        // Each particle is tested exactly once.
        let rng = &mut self.rng;
        self.population.retain(|virus| !virus.does_clear(rng));

        let density = (self.population.len() as f64 / self.max_pop as f64).min(1.0);
        self.last_density = Some(density);

        let offspring: Vec<_> = self
            .population
            .iter()
            .filter_map(|virus| virus.reproduce(density, &self.prescribed_drugs, &mut self.rng))
            .collect();
        self.population.extend(offspring);

        self.population.len()
    }
}
