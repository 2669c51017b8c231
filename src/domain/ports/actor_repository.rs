use crate::domain::entities::{Actor, ActorId};
use crate::domain::errors::DomainResult;

#[async_trait::async_trait]
pub trait ActorRepository: Send + Sync {
    async fn upsert_actor(&self, actor: &Actor) -> DomainResult<()>;
    async fn get_actor(&self, id: ActorId) -> DomainResult<Option<Actor>>;
}
