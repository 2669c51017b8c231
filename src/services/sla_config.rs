//! Process-wide SLA configuration with hot-swapping

use crate::domain::entities::SlaConfig;
use crate::domain::errors::DomainResult;
use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Single owner of the active SLA configuration. Readers take a snapshot and
/// keep it for the whole computation; writers validate and swap atomically.
pub struct SlaConfigHolder {
    current: ArcSwap<SlaConfig>,
    revision: AtomicU64,
}

impl SlaConfigHolder {
    pub fn new(config: SlaConfig) -> DomainResult<Self> {
        config.validate()?;
        Ok(Self {
            current: ArcSwap::from_pointee(config),
            revision: AtomicU64::new(1),
        })
    }

    /// Current configuration snapshot
    pub fn snapshot(&self) -> Arc<SlaConfig> {
        self.current.load_full()
    }

    /// Incremented on every successful replace
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    /// Validate and publish a new configuration. An invalid one leaves the
    /// active snapshot untouched.
    pub fn replace(&self, config: SlaConfig) -> DomainResult<u64> {
        config.validate()?;
        self.current.store(Arc::new(config));
        Ok(self.revision.fetch_add(1, Ordering::AcqRel) + 1)
    }
}

impl Default for SlaConfigHolder {
    fn default() -> Self {
        Self {
            current: ArcSwap::from_pointee(SlaConfig::default()),
            revision: AtomicU64::new(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::DomainError;

    #[test]
    fn test_replace_bumps_revision() {
        let holder = SlaConfigHolder::default();
        let before = holder.snapshot();

        let mut next = SlaConfig::default();
        next.limits.insert("Critical".to_string(), 2.0);
        assert_eq!(holder.replace(next).unwrap(), 2);

        assert_eq!(holder.revision(), 2);
        assert_eq!(holder.snapshot().limit_for("Critical").unwrap(), 2.0);
        // Earlier snapshots are unaffected
        assert_eq!(before.limit_for("Critical").unwrap(), 4.0);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let holder = SlaConfigHolder::default();
        let mut bad = SlaConfig::default();
        bad.limits.clear();

        assert!(matches!(holder.replace(bad), Err(DomainError::Validation(_))));
        assert_eq!(holder.revision(), 1);
        assert!(holder.snapshot().limit_for("Normal").is_ok());
    }
}
