//! Bridge configuration

/// Bridge configuration options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeOptions {
    /// Refuse UI-affine operations from threads other than the creating one
    pub enforce_thread_affinity: bool,

    /// Report a second mapping for an already-mapped live handle as an error
    /// instead of keeping the incumbent
    pub strict_mappings: bool,

    /// Report managed handler panics through the engine's unhandled-error
    /// channel (otherwise they are only logged)
    pub report_handler_panics: bool,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            enforce_thread_affinity: true,
            strict_mappings: false,
            report_handler_panics: true,
        }
    }
}

impl BridgeOptions {
    /// Options with thread-affinity checks disabled
    pub fn without_thread_affinity() -> Self {
        Self {
            enforce_thread_affinity: false,
            ..Self::default()
        }
    }

    /// Options that reject duplicate mappings
    pub fn with_strict_mappings() -> Self {
        Self {
            strict_mappings: true,
            ..Self::default()
        }
    }
}
