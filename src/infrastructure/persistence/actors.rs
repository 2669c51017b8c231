use crate::domain::entities::{Actor, ActorId, ActorRole};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::ActorRepository;
use crate::infrastructure::persistence::Database;
use sqlx::Row;

#[async_trait::async_trait]
impl ActorRepository for Database {
    async fn upsert_actor(&self, actor: &Actor) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO actors (id, name, role) VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, role = excluded.role",
        )
        .bind(actor.id)
        .bind(&actor.name)
        .bind(actor.role.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_actor(&self, id: ActorId) -> DomainResult<Option<Actor>> {
        let row = sqlx::query("SELECT id, name, role FROM actors WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = row {
            Ok(Some(Actor {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                role: row
                    .try_get::<String, _>("role")?
                    .parse::<ActorRole>()
                    .map_err(DomainError::DataIntegrity)?,
            }))
        } else {
            Ok(None)
        }
    }
}
