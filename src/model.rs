//! Trial output data types.

use anyhow::{Context, Result};
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Record of a trial at a single step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Number of steps computed so far.
    pub step: usize,

    /// Total virus population.
    pub total: usize,

    /// Resistant subpopulation of each tracked drug combination.
    pub resistant: Vec<usize>,
}

/// Records of a single trial, in step order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub seed: u64,
    pub trial_idx: usize,
    pub records: Vec<Record>,
}

impl Trajectory {
    /// Final total population of the trial.
    pub fn final_total(&self) -> usize {
        self.records.last().map_or(0, |rec| rec.total)
    }

    /// Save the trajectory to a MessagePack-encoded file.
    pub fn save<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, self).context("failed to serialize trajectory")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }

    /// Load a trajectory saved with [`Trajectory::save`].
    pub fn load<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        let trajectory = decode::from_read(&mut reader).context("failed to deserialize trajectory")?;
        Ok(trajectory)
    }
}
