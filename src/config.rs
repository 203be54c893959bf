//! Aligner configuration.
//!
//! Every parameter that shapes an alignment lives here and is threaded
//! explicitly through the aligner; nothing is read from global state.

use thiserror::Error;

use crate::align::{AlignMode, ScoreMatrix};
use crate::kmer::{DEFAULT_MAX_SPANNING, MAX_KMER_LEN, MIN_KMER_LEN};

/// Invalid configuration values, detected once at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// K-mer length outside the supported range.
    #[error("k-mer length {0} outside [2, 32]")]
    InvalidKmerLength(usize),

    /// Index stride of zero.
    #[error("index step must be greater than zero")]
    InvalidStep,

    /// DP band of zero.
    #[error("alignment band must be greater than zero")]
    InvalidBand,

    /// Branch exploration cap of zero.
    #[error("{0} must be greater than zero")]
    InvalidBranchCap(&'static str),

    /// Gap penalty that would reward gaps.
    #[error("gap penalty must be negative, got {0}")]
    NonNegativeGap(i64),

    /// Matrix without a positive match score.
    #[error("best match score must be positive, got {0}")]
    NonPositiveMatch(i64),
}

/// Parameters shared by every alignment of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignerConfig {
    /// K-mer length for the seed index.
    pub kmer_len: usize,
    /// Stride between indexed graph windows.
    pub step: usize,
    /// Substitution matrix and gap penalty.
    pub scoring: ScoreMatrix,
    /// Local (soft-clipping) or global (end-to-end read) extension.
    pub mode: AlignMode,
    /// Reads scoring below this are reported unmapped.
    pub min_score: i64,
    /// Maximum diagonal distance explored by the DP.
    pub band: usize,
    /// Extra graph bases gathered beyond the unaligned read length.
    pub target_slack: usize,
    /// Maximum graph paths evaluated per DP extension.
    pub max_branches: usize,
    /// Maximum chains produced per seed hit.
    pub max_seed_branches: usize,
    /// Maximum edge-spanning index keys per graph position.
    pub max_spanning_keys: usize,
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            kmer_len: 32,
            step: 32,
            scoring: ScoreMatrix::default(),
            mode: AlignMode::Local,
            min_score: 20,
            band: 32,
            target_slack: 16,
            max_branches: 64,
            max_seed_branches: 64,
            max_spanning_keys: DEFAULT_MAX_SPANNING,
        }
    }
}

impl AlignerConfig {
    /// Set the k-mer length.
    pub fn with_kmer_len(mut self, kmer_len: usize) -> Self {
        self.kmer_len = kmer_len;
        self
    }

    /// Set the index stride.
    pub fn with_step(mut self, step: usize) -> Self {
        self.step = step;
        self
    }

    /// Set the scoring scheme.
    pub fn with_scoring(mut self, scoring: ScoreMatrix) -> Self {
        self.scoring = scoring;
        self
    }

    /// Set the alignment mode.
    pub fn with_mode(mut self, mode: AlignMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the minimum mapped score.
    pub fn with_min_score(mut self, min_score: i64) -> Self {
        self.min_score = min_score;
        self
    }

    /// Set the DP band.
    pub fn with_band(mut self, band: usize) -> Self {
        self.band = band;
        self
    }

    /// Set the target slack.
    pub fn with_target_slack(mut self, target_slack: usize) -> Self {
        self.target_slack = target_slack;
        self
    }

    /// Set the DP branch cap.
    pub fn with_max_branches(mut self, max_branches: usize) -> Self {
        self.max_branches = max_branches;
        self
    }

    /// Set the seed branch cap.
    pub fn with_max_seed_branches(mut self, max_seed_branches: usize) -> Self {
        self.max_seed_branches = max_seed_branches;
        self
    }

    /// Set the spanning-key cap of the index.
    pub fn with_max_spanning_keys(mut self, max_spanning_keys: usize) -> Self {
        self.max_spanning_keys = max_spanning_keys;
        self
    }

    /// Check every parameter.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_KMER_LEN..=MAX_KMER_LEN).contains(&self.kmer_len) {
            return Err(ConfigError::InvalidKmerLength(self.kmer_len));
        }
        if self.step == 0 {
            return Err(ConfigError::InvalidStep);
        }
        if self.band == 0 {
            return Err(ConfigError::InvalidBand);
        }
        if self.max_branches == 0 {
            return Err(ConfigError::InvalidBranchCap("max_branches"));
        }
        if self.max_seed_branches == 0 {
            return Err(ConfigError::InvalidBranchCap("max_seed_branches"));
        }
        if self.max_spanning_keys == 0 {
            return Err(ConfigError::InvalidBranchCap("max_spanning_keys"));
        }
        if self.scoring.gap() >= 0 {
            return Err(ConfigError::NonNegativeGap(self.scoring.gap()));
        }
        if self.scoring.max_match() <= 0 {
            return Err(ConfigError::NonPositiveMatch(self.scoring.max_match()));
        }
        Ok(())
    }

    /// Score of a read aligned end to end with every base matching.
    pub fn perfect_score(&self, read: &[u8]) -> i64 {
        read.iter().map(|&base| self.scoring.match_score(base)).sum()
    }
}
