//! Engine configuration.
//!
//! Settings are read with the `config` crate from an optional TOML file (or TOML
//! text) layered over built-in defaults:
//!
//! ```toml
//! segment_size = 32768
//! upper_conversion_limit = 2047
//! lower_conversion_limit = 1536
//! use_indexes = true
//! ```

use std::path::Path;

use config::{Config, File, FileFormat};
use serde::Deserialize;

use crate::error::{Result, WhereError};
use crate::recordset::SegmentSize;

pub const DEFAULT_SEGMENT_SIZE: u32 = 32768;
// A list offset costs two bytes, so a list stops being smaller than the
// segment's bitmap at about segment_size / 16 offsets.
pub const DEFAULT_UPPER_CONVERSION_LIMIT: u32 = DEFAULT_SEGMENT_SIZE / 16 - 1;
pub const DEFAULT_LOWER_CONVERSION_LIMIT: u32 =
    DEFAULT_UPPER_CONVERSION_LIMIT - DEFAULT_UPPER_CONVERSION_LIMIT / 4;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Records per segment.
    pub segment_size: u32,
    /// A list segment holding more offsets than this becomes a bitmap.
    pub upper_conversion_limit: u32,
    /// A bitmap segment holding this many offsets or fewer becomes a list again.
    pub lower_conversion_limit: u32,
    /// When false every leaf condition is resolved by scanning records.
    pub use_indexes: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            segment_size: DEFAULT_SEGMENT_SIZE,
            upper_conversion_limit: DEFAULT_UPPER_CONVERSION_LIMIT,
            lower_conversion_limit: DEFAULT_LOWER_CONVERSION_LIMIT,
            use_indexes: true,
        }
    }
}

impl EngineConfig {
    /// Load settings from a TOML file; a missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let settings = Self::builder()?
            .add_source(File::from(path.as_ref()).format(FileFormat::Toml).required(false))
            .build()?;
        Self::finish(settings)
    }

    /// Load settings from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings = Self::builder()?
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?;
        Self::finish(settings)
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        let defaults = Self::default();
        Ok(Config::builder()
            .set_default("segment_size", defaults.segment_size as i64)?
            .set_default("upper_conversion_limit", defaults.upper_conversion_limit as i64)?
            .set_default("lower_conversion_limit", defaults.lower_conversion_limit as i64)?
            .set_default("use_indexes", defaults.use_indexes)?)
    }

    fn finish(settings: Config) -> Result<Self> {
        let engine: EngineConfig = settings.try_deserialize()?;
        engine.validate()?;
        Ok(engine)
    }

    pub fn validate(&self) -> Result<()> {
        if self.segment_size == 0 {
            return Err(WhereError::Config("segment_size must be greater than zero".into()));
        }
        if self.upper_conversion_limit >= self.segment_size {
            return Err(WhereError::Config(format!(
                "upper_conversion_limit {} must be less than segment_size {}",
                self.upper_conversion_limit, self.segment_size
            )));
        }
        if self.lower_conversion_limit > self.upper_conversion_limit {
            return Err(WhereError::Config(format!(
                "lower_conversion_limit {} exceeds upper_conversion_limit {}",
                self.lower_conversion_limit, self.upper_conversion_limit
            )));
        }
        Ok(())
    }

    pub fn segment_size(&self) -> SegmentSize {
        SegmentSize::new(
            self.segment_size,
            self.upper_conversion_limit,
            self.lower_conversion_limit,
        )
    }
}
