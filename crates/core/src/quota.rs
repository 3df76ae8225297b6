//! Quota levels and the level to maximum-identifier table.

use crate::hash::Identifier;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Highest level with a quota entry.
pub const MAX_LEVEL: u16 = 78;

/// Number of entries in a quota table (levels `0..=MAX_LEVEL`).
pub const LEVEL_COUNT: usize = MAX_LEVEL as usize + 1;

/// Default maximum identifier per level.
///
/// Level 0 has a quota of 0 and therefore never admits a token.
pub const DEFAULT_QUOTAS: [Identifier; LEVEL_COUNT] = [
    0, 532_275, 998_662, 1_407_317, 1_765_387, 2_079_134,
    2_354_043, 2_594_923, 2_805_986, 2_990_922, 3_152_966, 3_294_951,
    3_419_361, 3_528_371, 3_623_887, 3_707_579, 3_780_912, 3_845_167,
    3_901_469, 3_950_801, 3_994_026, 4_031_901, 4_065_088, 4_094_166,
    4_119_645, 4_141_971, 4_161_532, 4_178_672, 4_193_691, 4_206_850,
    4_218_381, 4_228_484, 4_237_337, 4_245_093, 4_251_890, 4_257_845,
    4_263_063, 4_267_636, 4_271_642, 4_275_152, 4_278_228, 4_280_923,
    4_283_284, 4_285_354, 4_287_167, 4_288_755, 4_290_147, 4_291_367,
    4_292_435, 4_293_372, 4_294_192, 4_294_911, 4_295_541, 4_296_093,
    4_296_577, 4_297_000, 4_297_372, 4_297_697, 4_297_982, 4_298_232,
    4_298_451, 4_298_643, 4_298_811, 4_298_958, 4_299_087, 4_299_200,
    4_299_299, 4_299_386, 4_299_462, 4_299_528, 4_299_587, 4_299_638,
    4_299_683, 4_299_722, 4_299_756, 4_299_787, 4_299_813, 4_299_836,
    4_299_856,
];

/// A quota level as decoded from a token.
///
/// Any three-digit value decodes to a `Level`; only `0..=MAX_LEVEL` have a
/// quota entry, every other level is treated as quota 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Level(u16);

impl Level {
    /// Create a level from its numeric value.
    pub fn new(value: u16) -> Self {
        Self(value)
    }

    /// Get the numeric value.
    pub fn value(&self) -> u16 {
        self.0
    }

    /// Whether this level has an entry in the quota table.
    pub fn is_known(&self) -> bool {
        self.0 <= MAX_LEVEL
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable mapping from level to maximum identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuotaTable {
    quotas: Box<[Identifier]>,
}

impl QuotaTable {
    /// Build a table from one quota per level, starting at level 0.
    pub fn new(quotas: Vec<Identifier>) -> crate::Result<Self> {
        if quotas.len() != LEVEL_COUNT {
            return Err(crate::Error::InvalidQuotaTable(format!(
                "expected {LEVEL_COUNT} levels, got {}",
                quotas.len()
            )));
        }
        if quotas[0] != 0 {
            return Err(crate::Error::InvalidQuotaTable(format!(
                "level 0 must have quota 0, got {}",
                quotas[0]
            )));
        }
        if let Some(level) = quotas.windows(2).position(|w| w[1] <= w[0]) {
            return Err(crate::Error::InvalidQuotaTable(format!(
                "quotas must be strictly increasing (level {} is not above level {level})",
                level + 1
            )));
        }
        Ok(Self {
            quotas: quotas.into_boxed_slice(),
        })
    }

    /// Maximum identifier admitted at `level`; 0 for unknown levels.
    pub fn quota(&self, level: Level) -> Identifier {
        self.quotas
            .get(usize::from(level.value()))
            .copied()
            .unwrap_or(0)
    }

    /// Whether `identifier` is within the quota of `level`.
    ///
    /// Identifier 0 is never admitted.
    pub fn permits(&self, level: Level, identifier: Identifier) -> bool {
        identifier > 0 && identifier <= self.quota(level)
    }

    /// Largest quota across all levels.
    pub fn max_quota(&self) -> Identifier {
        self.quotas.iter().copied().max().unwrap_or(0)
    }

    /// Quotas in level order.
    pub fn as_slice(&self) -> &[Identifier] {
        &self.quotas
    }
}

impl Default for QuotaTable {
    fn default() -> Self {
        Self {
            quotas: DEFAULT_QUOTAS.to_vec().into_boxed_slice(),
        }
    }
}
