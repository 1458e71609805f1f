//! Model parameters: rate constants, site lengths and the distributions they
//! are drawn from.
//!
//! A [`Parameters`] value is built (or loaded) once, validated, and handed to
//! the engine. Entities sample their constants from it at creation time, so
//! changing a parameter afterwards only affects entities created later.
//!
//! # Layout
//!
//! ```text
//! sequence.gene   { length, production, leakage }
//! sequence.tf     { length, threshold }
//! sequence.nap    { length, mean, prob, states }
//! sequence.empty  { length }
//! mobile.enzyme / mobile.tf / mobile.nap / mobile.rnap
//!                 { association, dissociation, diffusion, degradation }
//! rules           { binding, activation, degradation }
//! ```

use crate::mobile::ProductKind;
use rand::Rng;
use rand_distr::{Binomial, Distribution, Exp};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised when a parameter set could produce invalid entities.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field}: value is not finite")]
    NonFinite { field: String },
    #[error("{field}: rate constant may be negative (lower bound {bound})")]
    NegativeRate { field: String, bound: f64 },
    #[error("{field}: diffusion must be strictly positive (lower bound {bound})")]
    NonPositiveDiffusion { field: String, bound: f64 },
    #[error("{field}: site length may fall below 1 (lower bound {bound})")]
    NonPositiveLength { field: String, bound: f64 },
    #[error("{field}: probability {value} outside [0, 1]")]
    InvalidProbability { field: String, value: f64 },
    #[error("{field}: uniform bounds inverted ({min} > {max})")]
    InvertedBounds { field: String, min: f64, max: f64 },
    #[error("{field}: exponential rate must be positive, got {rate}")]
    InvalidExponentialRate { field: String, rate: f64 },
    #[error("sequence.tf.threshold must be finite and non-negative, got {0}")]
    InvalidThreshold(f64),
    #[error("sequence.nap.mean must be finite and non-negative, got {0}")]
    InvalidNapMean(f64),
    #[error("sequence.nap.states must be between 1 and 5, got {0}")]
    NapStatesOutOfRange(u32),
}

// ---------------------------------------------------------------------------
// Samplers
// ---------------------------------------------------------------------------

/// A zero-argument distribution a constant is drawn from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sampler {
    /// Always the same value.
    Constant(f64),
    /// Uniform on `[min, max)`; `min` when the interval is empty.
    Uniform { min: f64, max: f64 },
    /// `(Exp(rate) + offset) * scale`.
    Exponential { rate: f64, offset: f64, scale: f64 },
    /// Number of successes in `trials` draws with probability `prob`.
    Binomial { trials: u64, prob: f64 },
}

impl Sampler {
    /// Draw one value.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            Sampler::Constant(v) => v,
            Sampler::Uniform { min, max } => {
                if min < max {
                    rng.random_range(min..max)
                } else {
                    min
                }
            }
            Sampler::Exponential {
                rate,
                offset,
                scale,
            } => match Exp::new(rate) {
                Ok(exp) => (exp.sample(rng) + offset) * scale,
                Err(_) => offset * scale,
            },
            Sampler::Binomial { trials, prob } => match Binomial::new(trials, prob) {
                Ok(binomial) => binomial.sample(rng) as f64,
                Err(_) => 0.0,
            },
        }
    }

    /// Draw a site length: the sample floored to an integer, never below 1.
    pub fn sample_length<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        let v = self.sample(rng).floor();
        if v < 1.0 { 1 } else { v as u64 }
    }

    /// The smallest value this sampler can produce.
    pub fn lower_bound(&self) -> f64 {
        match *self {
            Sampler::Constant(v) => v,
            Sampler::Uniform { min, .. } => min,
            Sampler::Exponential { offset, scale, .. } => {
                if scale >= 0.0 {
                    offset * scale
                } else {
                    f64::NEG_INFINITY
                }
            }
            Sampler::Binomial { .. } => 0.0,
        }
    }

    /// Check internal consistency, independent of what the value is used for.
    fn check(&self, field: &str) -> Result<(), ConfigError> {
        let finite = |v: f64| {
            if v.is_finite() {
                Ok(())
            } else {
                Err(ConfigError::NonFinite {
                    field: field.to_string(),
                })
            }
        };
        match *self {
            Sampler::Constant(v) => finite(v),
            Sampler::Uniform { min, max } => {
                finite(min)?;
                finite(max)?;
                if min > max {
                    return Err(ConfigError::InvertedBounds {
                        field: field.to_string(),
                        min,
                        max,
                    });
                }
                Ok(())
            }
            Sampler::Exponential {
                rate,
                offset,
                scale,
            } => {
                finite(offset)?;
                finite(scale)?;
                if !(rate.is_finite() && rate > 0.0) {
                    return Err(ConfigError::InvalidExponentialRate {
                        field: field.to_string(),
                        rate,
                    });
                }
                Ok(())
            }
            Sampler::Binomial { prob, .. } => check_probability(field, prob),
        }
    }

    fn check_rate(&self, field: &str) -> Result<(), ConfigError> {
        self.check(field)?;
        let bound = self.lower_bound();
        if bound < 0.0 {
            return Err(ConfigError::NegativeRate {
                field: field.to_string(),
                bound,
            });
        }
        Ok(())
    }

    fn check_diffusion(&self, field: &str) -> Result<(), ConfigError> {
        self.check(field)?;
        let bound = self.lower_bound();
        if bound <= 0.0 {
            return Err(ConfigError::NonPositiveDiffusion {
                field: field.to_string(),
                bound,
            });
        }
        Ok(())
    }

    fn check_length(&self, field: &str) -> Result<(), ConfigError> {
        self.check(field)?;
        let bound = self.lower_bound();
        if bound.floor() < 1.0 {
            return Err(ConfigError::NonPositiveLength {
                field: field.to_string(),
                bound,
            });
        }
        Ok(())
    }
}

fn check_probability(field: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidProbability {
            field: field.to_string(),
            value,
        })
    }
}

fn default_length() -> Sampler {
    Sampler::Exponential {
        rate: 1.0,
        offset: 1.0,
        scale: 1000.0,
    }
}

// ---------------------------------------------------------------------------
// Sequence parameters
// ---------------------------------------------------------------------------

/// Parameters for gene sites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneSiteParams {
    pub length: Sampler,
    /// Transcription rate of an induced gene.
    pub production: Sampler,
    /// Transcription rate of a gene in the neutral state.
    pub leakage: Sampler,
}

impl Default for GeneSiteParams {
    fn default() -> Self {
        Self {
            length: default_length(),
            production: Sampler::Constant(1.0),
            leakage: Sampler::Constant(0.0),
        }
    }
}

/// Parameters for transcription factor binding sites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TfSiteParams {
    pub length: Sampler,
    /// A promoter is bound when `factor * concentration >= threshold`.
    pub threshold: f64,
}

impl Default for TfSiteParams {
    fn default() -> Self {
        Self {
            length: Sampler::Constant(10.0),
            threshold: 1.0,
        }
    }
}

/// Parameters for nucleoid-associated protein binding sites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NapSiteParams {
    pub length: Sampler,
    /// Mean number of binding sites per NAP.
    pub mean: f64,
    /// Success probability of the site-count binomial.
    pub prob: f64,
    /// Number of regulation states; codes are `0..states` shifted by -2.
    pub states: u32,
}

impl Default for NapSiteParams {
    fn default() -> Self {
        Self {
            length: Sampler::Constant(10.0),
            mean: 0.0,
            prob: 0.2,
            states: 5,
        }
    }
}

impl NapSiteParams {
    /// Distribution of the number of binding sites seeded per NAP:
    /// `Binomial(round(mean / prob), prob)`.
    pub fn num(&self) -> Sampler {
        let trials = if self.prob > 0.0 {
            (self.mean / self.prob).round().max(0.0) as u64
        } else {
            0
        };
        Sampler::Binomial {
            trials,
            prob: self.prob,
        }
    }
}

/// Parameters for empty (spacer) sites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmptySiteParams {
    pub length: Sampler,
}

impl Default for EmptySiteParams {
    fn default() -> Self {
        Self {
            length: default_length(),
        }
    }
}

/// Parameters for every sequence element kind.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceParams {
    pub gene: GeneSiteParams,
    pub tf: TfSiteParams,
    pub nap: NapSiteParams,
    pub empty: EmptySiteParams,
}

// ---------------------------------------------------------------------------
// Mobile parameters
// ---------------------------------------------------------------------------

/// Rate constant distributions for one mobile product kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateParams {
    pub association: Sampler,
    pub dissociation: Sampler,
    pub diffusion: Sampler,
    pub degradation: Sampler,
}

impl Default for RateParams {
    fn default() -> Self {
        Self {
            association: Sampler::Constant(0.5),
            dissociation: Sampler::Constant(0.2),
            diffusion: Sampler::Constant(1e4),
            degradation: Sampler::Constant(1.0),
        }
    }
}

/// Rate constant distributions per mobile product kind.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MobileParams {
    pub enzyme: RateParams,
    pub tf: RateParams,
    pub nap: RateParams,
    pub rnap: RateParams,
}

impl MobileParams {
    /// The category a product kind samples its constants from.
    pub fn for_kind(&self, kind: ProductKind) -> &RateParams {
        match kind {
            ProductKind::Enzyme => &self.enzyme,
            ProductKind::TranscriptionFactor => &self.tf,
            ProductKind::NucleoidAssociatedProtein => &self.nap,
            ProductKind::RnaPolymerase => &self.rnap,
        }
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// How promoter binding sites decide whether their ligand is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingRule {
    /// Bound iff `factor * concentration >= threshold`.
    #[default]
    Threshold,
    /// A bound site releases with probability `dissociation`; an unbound
    /// site binds with probability `factor * concentration`.
    Stochastic,
}

/// How the contributions of a gene's promoters are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationRule {
    /// Product of contributions; one bound repressor dominates.
    #[default]
    Multiplicative,
    /// Sum of contributions.
    Additive,
}

/// How much of each concentration pool decays per step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationRule {
    /// `ceil(degradation * concentration)`.
    #[default]
    Ceiling,
    /// `Binomial(floor(concentration), degradation)`.
    Binomial,
}

/// Selection of the step rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleParams {
    pub binding: BindingRule,
    pub activation: ActivationRule,
    pub degradation: DegradationRule,
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// The complete parameter set for one simulation run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    pub sequence: SequenceParams,
    pub mobile: MobileParams,
    pub rules: RuleParams,
}

impl Parameters {
    /// Verify that no sampler can yield a negative rate, a non-positive
    /// diffusion constant or a site shorter than one unit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let seq = &self.sequence;
        seq.gene.length.check_length("sequence.gene.length")?;
        seq.gene.production.check_rate("sequence.gene.production")?;
        seq.gene.leakage.check_rate("sequence.gene.leakage")?;
        seq.tf.length.check_length("sequence.tf.length")?;
        if !(seq.tf.threshold.is_finite() && seq.tf.threshold >= 0.0) {
            return Err(ConfigError::InvalidThreshold(seq.tf.threshold));
        }
        seq.nap.length.check_length("sequence.nap.length")?;
        if !(seq.nap.mean.is_finite() && seq.nap.mean >= 0.0) {
            return Err(ConfigError::InvalidNapMean(seq.nap.mean));
        }
        check_probability("sequence.nap.prob", seq.nap.prob)?;
        if !(1..=5).contains(&seq.nap.states) {
            return Err(ConfigError::NapStatesOutOfRange(seq.nap.states));
        }
        seq.empty.length.check_length("sequence.empty.length")?;

        for kind in ProductKind::ALL {
            let rates = self.mobile.for_kind(kind);
            let prefix = format!("mobile.{}", kind.category());
            rates
                .association
                .check_rate(&format!("{prefix}.association"))?;
            rates
                .dissociation
                .check_rate(&format!("{prefix}.dissociation"))?;
            rates
                .diffusion
                .check_diffusion(&format!("{prefix}.diffusion"))?;
            rates
                .degradation
                .check_rate(&format!("{prefix}.degradation"))?;
        }
        Ok(())
    }
}
