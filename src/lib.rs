//! Stochastic simulation of virus populations and drug resistance inside a patient.

pub mod analysis;
pub mod config;
pub mod engine;
pub mod manager;
pub mod model;
pub mod patient;
pub mod stats;
mod utils;
pub mod virus;

pub use patient::PatientSimulation;
pub use virus::{Resistances, VirusParticle};
