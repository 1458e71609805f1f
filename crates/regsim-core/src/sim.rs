//! Simulation state and per-step reporting types.

use crate::fixed::{Fixed64, Ticks};
use crate::id::{ProductId, SiteId};

// ---------------------------------------------------------------------------
// Simulation state
// ---------------------------------------------------------------------------

/// Mutable simulation state tracked by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimState {
    /// Current tick counter. Incremented by 1 for each step.
    pub tick: Ticks,
}

impl SimState {
    pub fn new() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Step report
// ---------------------------------------------------------------------------

/// One transcription event: a bound polymerase releasing a gene's product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transcription {
    pub polymerase: ProductId,
    pub gene: SiteId,
    /// `None` when the gene has no product; nothing was added.
    pub product: Option<ProductId>,
    pub amount: Fixed64,
}

/// What happened during one `Engine::step()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Tick after the step completed.
    pub tick: Ticks,
    /// Polymerases that bound to an active gene.
    pub bound: Vec<ProductId>,
    pub transcriptions: Vec<Transcription>,
    /// Polymerases that moved one site downstream.
    pub advanced: Vec<ProductId>,
    /// Polymerases that stepped past the last site.
    pub departed: Vec<ProductId>,
    /// Polymerases dropped from the position map.
    pub removed: Vec<ProductId>,
    /// Polymerases that could not move because the next site was occupied.
    pub blocked: Vec<ProductId>,
}

impl StepReport {
    /// Total amount transcribed this step.
    pub fn total_transcribed(&self) -> Fixed64 {
        self.transcriptions
            .iter()
            .fold(Fixed64::ZERO, |acc, t| acc.saturating_add(t.amount))
    }
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// A simple deterministic hash of simulation state for reproducibility
/// checks.
///
/// Uses FNV-1a (64-bit). Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    /// Feed bytes into the hash.
    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_bool(&mut self, v: bool) {
        self.write(&[v as u8]);
    }

    pub fn write_fixed64(&mut self, v: Fixed64) {
        self.write(&v.to_bits().to_le_bytes());
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}
