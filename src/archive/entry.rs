//! Archive directory entry (§3 "Archive entry"), shared by every variant.
//! Mirrors the original `entry_t`: name, uncompressed size, stored
//! ("z") size, absolute body offset, and one variant-specific scalar.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub size: u32,
    pub zsize: u32,
    pub offset: u32,
    /// v2: unused. v6: running checksum of the compressed body. Other
    /// variants: unused.
    pub extra: u32,
}

impl Entry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}
