//! Device capabilities consumed by the transform passes.

/// Device properties relevant to sub-group handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Upper bound on the vectorization width the device supports. Work
    /// widths that are a multiple of this are always safe to execute
    /// with native sub-groups.
    pub max_work_width: u32,
}

impl DeviceInfo {
    pub fn new(max_work_width: u32) -> Self {
        assert!(max_work_width > 0, "max_work_width must be positive");
        Self { max_work_width }
    }
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self { max_work_width: 8 }
    }
}
