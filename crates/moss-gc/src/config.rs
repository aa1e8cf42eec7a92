//! Collector configuration

/// How a candidate value is matched against tracked blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointerValidity {
    /// Candidate must equal the first data byte of a block
    #[default]
    Exact,
    /// Candidate may point anywhere inside a block's data region
    Interior,
}

/// Step between consecutive candidate slots during a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanGranularity {
    /// Every byte offset (finds pointers stored at unaligned addresses)
    #[default]
    Byte,
    /// Only slots aligned to `size_of::<usize>()`
    Word,
}

impl ScanGranularity {
    /// Distance in bytes between two slots
    pub const fn step(self) -> usize {
        match self {
            ScanGranularity::Byte => 1,
            ScanGranularity::Word => std::mem::size_of::<usize>(),
        }
    }
}

/// GC configuration
#[derive(Debug, Clone)]
pub struct GcConfig {
    /// Pointer matching rule (default: exact)
    pub pointer_validity: PointerValidity,
    /// Scan step (default: every byte)
    pub scan_granularity: ScanGranularity,
    /// Anchor at the allocating thread's stack base on the first allocation
    /// if `init` was never called (default: true)
    pub lazy_anchor: bool,
    /// Live bytes above which `should_collect` reports true (default: 1MB)
    pub collect_threshold: usize,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            pointer_validity: PointerValidity::Exact,
            scan_granularity: ScanGranularity::Byte,
            lazy_anchor: true,
            collect_threshold: 1024 * 1024, // 1MB
        }
    }
}

impl GcConfig {
    /// Set the pointer matching rule
    pub fn with_pointer_validity(mut self, validity: PointerValidity) -> Self {
        self.pointer_validity = validity;
        self
    }

    /// Set the scan step
    pub fn with_scan_granularity(mut self, granularity: ScanGranularity) -> Self {
        self.scan_granularity = granularity;
        self
    }

    /// Enable or disable anchoring on first allocation
    pub fn with_lazy_anchor(mut self, lazy: bool) -> Self {
        self.lazy_anchor = lazy;
        self
    }

    /// Set the collection hint threshold
    pub fn with_collect_threshold(mut self, threshold: usize) -> Self {
        self.collect_threshold = threshold;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GcConfig::default();
        assert_eq!(config.pointer_validity, PointerValidity::Exact);
        assert_eq!(config.scan_granularity, ScanGranularity::Byte);
        assert!(config.lazy_anchor);
        assert_eq!(config.collect_threshold, 1024 * 1024);
    }

    #[test]
    fn test_builders() {
        let config = GcConfig::default()
            .with_pointer_validity(PointerValidity::Interior)
            .with_scan_granularity(ScanGranularity::Word)
            .with_lazy_anchor(false)
            .with_collect_threshold(4096);

        assert_eq!(config.pointer_validity, PointerValidity::Interior);
        assert_eq!(config.scan_granularity.step(), std::mem::size_of::<usize>());
        assert!(!config.lazy_anchor);
        assert_eq!(config.collect_threshold, 4096);
    }
}
