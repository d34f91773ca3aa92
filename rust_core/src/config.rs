use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::gradient::ReportLevel;

/// Settings for one gradient computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientConfig {
    /// Upper bound on the dual width of a single forward pass.
    pub chunk_width: usize,
    /// Detail of the diagnostic emitted when a gradient fails validation.
    pub report: ReportLevel,
}

impl Default for GradientConfig {
    fn default() -> Self {
        Self {
            chunk_width: 40,
            report: ReportLevel::Summary,
        }
    }
}

impl GradientConfig {
    pub fn with_chunk_width(chunk_width: usize) -> Self {
        Self {
            chunk_width,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_width == 0 {
            return Err(Error::InvalidChunkWidth(self.chunk_width));
        }
        Ok(())
    }
}
