//! Virus particles.

use crate::utils::check_prob;
use anyhow::{Context, Result};
use rand::Rng;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Mapping from drug name to resistance flag.
pub type Resistances = BTreeMap<String, bool>;

/// A single virus particle.
///
/// Holds its birth, clearance and mutation probabilities and the set of
/// resistance traits it carries. A particle with no traits behaves as a
/// virus without any drug resistance.
///
/// Deserialized particles go through [`VirusParticle::new`] and are
/// validated the same way.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "crate::config::VirusConfig")]
pub struct VirusParticle {
    max_birth_prob: f64,
    clear_prob: f64,
    mut_prob: f64,
    resistances: Resistances,
}

impl VirusParticle {
    /// Create a new particle.
    ///
    /// # Errors
    /// Returns an error if any probability lies outside `[0, 1]`.
    pub fn new(
        max_birth_prob: f64,
        clear_prob: f64,
        mut_prob: f64,
        resistances: Resistances,
    ) -> Result<Self> {
        check_prob(max_birth_prob).context("invalid maximum birth probability")?;
        check_prob(clear_prob).context("invalid clearance probability")?;
        check_prob(mut_prob).context("invalid mutation probability")?;
        Ok(Self {
            max_birth_prob,
            clear_prob,
            mut_prob,
            resistances,
        })
    }

    /// Build `n_viruses` identical copies of `template`.
    pub fn collection(n_viruses: usize, template: &VirusParticle) -> Vec<VirusParticle> {
        vec![template.clone(); n_viruses]
    }

    pub fn max_birth_prob(&self) -> f64 {
        self.max_birth_prob
    }

    pub fn clear_prob(&self) -> f64 {
        self.clear_prob
    }

    pub fn mut_prob(&self) -> f64 {
        self.mut_prob
    }

    pub fn resistances(&self) -> &Resistances {
        &self.resistances
    }

    /// Whether this particle is resistant to `drug`.
    ///
    /// Drugs the particle carries no trait for are treated as drugs it is
    /// not resistant to.
    pub fn is_resistant_to(&self, drug: &str) -> bool {
        self.resistances.get(drug).copied().unwrap_or(false)
    }

    /// Whether this particle is resistant to every drug in `drugs`.
    pub fn is_resistant_to_all<I, S>(&self, drugs: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        drugs
            .into_iter()
            .all(|drug| self.is_resistant_to(drug.as_ref()))
    }

    /// Decide whether this particle is cleared in the current step.
    pub fn does_clear<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        rng.random::<f64>() < self.clear_prob
    }

    /// Reproduction probability at the given population density.
    ///
    /// A NaN density is treated as a saturated population.
    pub fn birth_prob(&self, pop_density: f64) -> f64 {
        let pop_density = if pop_density.is_nan() {
            1.0
        } else {
            pop_density.clamp(0.0, 1.0)
        };
        (self.max_birth_prob * (1.0 - pop_density)).clamp(0.0, 1.0)
    }

    /// Attempt to reproduce under `active_drugs` at `pop_density`.
    ///
    /// Returns `None` when no offspring is produced. A particle that is not
    /// resistant to every active drug never reproduces and draws no random
    /// numbers.
    pub fn reproduce<I, S, R>(
        &self,
        pop_density: f64,
        active_drugs: I,
        rng: &mut R,
    ) -> Option<VirusParticle>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        R: Rng + ?Sized,
    {
        if !self.is_resistant_to_all(active_drugs) {
            return None;
        }

        if rng.random::<f64>() >= self.birth_prob(pop_density) {
            return None;
        }

        // Each trait is inherited with probability `1 - mut_prob` and flipped otherwise.
        let resistances = self
            .resistances
            .iter()
            .map(|(drug, &flag)| {
                let inherited = rng.random::<f64>() < 1.0 - self.mut_prob;
                (drug.clone(), if inherited { flag } else { !flag })
            })
            .collect();

        Some(Self {
            max_birth_prob: self.max_birth_prob,
            clear_prob: self.clear_prob,
            mut_prob: self.mut_prob,
            resistances,
        })
    }
}
