//! Parsing configuration for archive ingestion.
//!
//! Real SDK import libraries are produced by several toolchains, and not all of them agree
//! on the finer points of the `ar` container. [`ArchiveConfig`] decides which deviations
//! are tolerated (logged through `tracing`) and which abort the read.

/// Configuration for [`crate::archive::ArchiveReader`].
///
/// # Examples
///
/// ```rust
/// use comlink::ArchiveConfig;
///
/// let config = ArchiveConfig {
///     allow_duplicate_symbols: true,
///     ..ArchiveConfig::default()
/// };
/// assert!(config.require_symbol_index);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct ArchiveConfig {
    /// Treat a member header whose end marker is not `` `\n `` (or a padding byte that is
    /// not `\n`) as a format error instead of a warning
    pub strict_header_markers: bool,

    /// Require the first member to be the `/` symbol index
    pub require_symbol_index: bool,

    /// Check that the second linker member, when present, lists the same symbols as the
    /// first one
    pub verify_second_linker: bool,

    /// Keep the first definition when a symbol appears twice in the index, instead of
    /// failing the read
    pub allow_duplicate_symbols: bool,

    /// Upper bound on the number of member headers scanned (default: 1 << 20)
    pub max_members: usize,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            strict_header_markers: false,
            require_symbol_index: true,
            verify_second_linker: false,
            allow_duplicate_symbols: false,
            max_members: 1 << 20,
        }
    }
}

impl ArchiveConfig {
    /// Fails on every structural deviation, including header markers and a second linker
    /// member that disagrees with the first
    #[must_use]
    pub fn strict() -> Self {
        Self {
            strict_header_markers: true,
            require_symbol_index: true,
            verify_second_linker: true,
            allow_duplicate_symbols: false,
            max_members: 1 << 20,
        }
    }

    /// Accepts archives without a symbol index and with duplicate symbol entries
    #[must_use]
    pub fn lenient() -> Self {
        Self {
            strict_header_markers: false,
            require_symbol_index: false,
            verify_second_linker: false,
            allow_duplicate_symbols: true,
            max_members: 1 << 20,
        }
    }
}
