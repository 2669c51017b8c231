use crate::domain::entities::SlaConfig;
use crate::domain::errors::DomainResult;

/// Durable copy of the SLA configuration.
#[async_trait::async_trait]
pub trait SlaConfigRepository: Send + Sync {
    async fn load_sla_config(&self) -> DomainResult<SlaConfig>;

    /// Replace limits, calendar and holidays in one transaction.
    async fn save_sla_config(&self, config: &SlaConfig) -> DomainResult<()>;
}
