//! Transaction manager configuration.

/// Configuration for opening a transaction manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionConfig {
    /// Return the same shared instance when one object is materialized
    /// twice. Off by default: every materialization builds an independent
    /// shadow that reads the journal as of its creation.
    pub cache_materializations: bool,

    /// Notify listeners again, with committed keys, after a successful
    /// commit.
    pub refire_on_commit: bool,

    /// Write `Null` instead of failing the commit when a reference points at
    /// a new object that was deleted before commit.
    pub null_dangling_references: bool,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            cache_materializations: false,
            refire_on_commit: true,
            null_dangling_references: false,
        }
    }
}

impl TransactionConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether repeated materializations share one instance.
    #[must_use]
    pub const fn cache_materializations(mut self, value: bool) -> Self {
        self.cache_materializations = value;
        self
    }

    /// Sets whether listeners are notified again after commit.
    #[must_use]
    pub const fn refire_on_commit(mut self, value: bool) -> Self {
        self.refire_on_commit = value;
        self
    }

    /// Sets whether dangling references are nulled instead of rejected.
    #[must_use]
    pub const fn null_dangling_references(mut self, value: bool) -> Self {
        self.null_dangling_references = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = TransactionConfig::default();
        assert!(!config.cache_materializations);
        assert!(config.refire_on_commit);
        assert!(!config.null_dangling_references);
    }

    #[test]
    fn builder_pattern() {
        let config = TransactionConfig::new()
            .cache_materializations(true)
            .refire_on_commit(false)
            .null_dangling_references(true);

        assert!(config.cache_materializations);
        assert!(!config.refire_on_commit);
        assert!(config.null_dangling_references);
    }
}
