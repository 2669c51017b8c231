use crate::domain::errors::{DomainError, DomainResult};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type ActorId = i64;
pub type TicketId = i64;

/// Storage and wire key of a ticket status. Display wording lives in
/// [`StatusLabels`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Completed,
    Cancelled,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Completed => "completed",
            TicketStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Completed | TicketStatus::Cancelled)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(TicketStatus::Open),
            "in_progress" => Ok(TicketStatus::InProgress),
            "completed" => Ok(TicketStatus::Completed),
            "cancelled" => Ok(TicketStatus::Cancelled),
            _ => Err(format!("Invalid ticket status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketAction {
    Assume,
    Complete,
    Cancel,
}

impl fmt::Display for TicketAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketAction::Assume => write!(f, "assume"),
            TicketAction::Complete => write!(f, "complete"),
            TicketAction::Cancel => write!(f, "cancel"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pickup {
    pub at: DateTime<Utc>,
    pub by: ActorId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub at: DateTime<Utc>,
    pub by: ActorId,
}

/// Lifecycle of a ticket. Terminal states carry their own timestamp so a
/// completed ticket without `completed_at` cannot be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TicketState {
    Open,
    InProgress(Pickup),
    Completed {
        pickup: Option<Pickup>,
        resolution: Resolution,
    },
    Cancelled {
        pickup: Option<Pickup>,
        resolution: Resolution,
    },
}

impl TicketState {
    pub fn status(&self) -> TicketStatus {
        match self {
            TicketState::Open => TicketStatus::Open,
            TicketState::InProgress(_) => TicketStatus::InProgress,
            TicketState::Completed { .. } => TicketStatus::Completed,
            TicketState::Cancelled { .. } => TicketStatus::Cancelled,
        }
    }

    pub fn pickup(&self) -> Option<Pickup> {
        match self {
            TicketState::Open => None,
            TicketState::InProgress(pickup) => Some(*pickup),
            TicketState::Completed { pickup, .. } | TicketState::Cancelled { pickup, .. } => {
                *pickup
            }
        }
    }

    pub fn completed(&self) -> Option<Resolution> {
        match self {
            TicketState::Completed { resolution, .. } => Some(*resolution),
            _ => None,
        }
    }

    pub fn cancelled(&self) -> Option<Resolution> {
        match self {
            TicketState::Cancelled { resolution, .. } => Some(*resolution),
            _ => None,
        }
    }

    /// Apply `action` at instant `at` on behalf of `by`.
    pub fn transition(
        &self,
        action: TicketAction,
        at: DateTime<Utc>,
        by: ActorId,
    ) -> DomainResult<TicketState> {
        use TicketAction::*;

        match (self, action) {
            (TicketState::Open, Assume) => Ok(TicketState::InProgress(Pickup { at, by })),
            (TicketState::Open | TicketState::InProgress(_), Complete) => {
                Ok(TicketState::Completed {
                    pickup: self.pickup(),
                    resolution: Resolution { at, by },
                })
            }
            (TicketState::Open | TicketState::InProgress(_), Cancel) => {
                Ok(TicketState::Cancelled {
                    pickup: self.pickup(),
                    resolution: Resolution { at, by },
                })
            }
            _ => Err(DomainError::InvalidTransition {
                from: self.status(),
                action,
            }),
        }
    }

    /// Rebuild a state from the flattened columns stored per ticket.
    pub fn from_columns(
        status: TicketStatus,
        assumed: (Option<DateTime<Utc>>, Option<ActorId>),
        completed: (Option<DateTime<Utc>>, Option<ActorId>),
        cancelled: (Option<DateTime<Utc>>, Option<ActorId>),
    ) -> DomainResult<TicketState> {
        let pickup = pair(assumed, "assumed")?.map(|(at, by)| Pickup { at, by });
        let completed = pair(completed, "completed")?.map(|(at, by)| Resolution { at, by });
        let cancelled = pair(cancelled, "cancelled")?.map(|(at, by)| Resolution { at, by });

        match (status, pickup, completed, cancelled) {
            (TicketStatus::Open, None, None, None) => Ok(TicketState::Open),
            (TicketStatus::InProgress, Some(pickup), None, None) => {
                Ok(TicketState::InProgress(pickup))
            }
            (TicketStatus::Completed, pickup, Some(resolution), None) => {
                Ok(TicketState::Completed { pickup, resolution })
            }
            (TicketStatus::Cancelled, pickup, None, Some(resolution)) => {
                Ok(TicketState::Cancelled { pickup, resolution })
            }
            (status, pickup, completed, cancelled) => Err(DomainError::DataIntegrity(format!(
                "status '{}' is inconsistent with timestamps (assumed: {}, completed: {}, cancelled: {})",
                status,
                pickup.is_some(),
                completed.is_some(),
                cancelled.is_some()
            ))),
        }
    }
}

fn pair<A, B>(value: (Option<A>, Option<B>), what: &str) -> DomainResult<Option<(A, B)>> {
    match value {
        (Some(a), Some(b)) => Ok(Some((a, b))),
        (None, None) => Ok(None),
        _ => Err(DomainError::DataIntegrity(format!(
            "{}_at and {}_by must be set together",
            what, what
        ))),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub code: String,
    pub protocol: String,
    pub priority: String,
    pub category: String,
    pub requester_name: String,
    pub requester_email: String,
    pub description: Option<String>,
    pub opened_at: DateTime<Utc>,
    pub state: TicketState,
}

impl Ticket {
    pub fn status(&self) -> TicketStatus {
        self.state.status()
    }
}

/// A ticket about to be inserted; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketDraft {
    pub code: String,
    pub protocol: String,
    pub priority: String,
    pub category: String,
    pub requester_name: String,
    pub requester_email: String,
    pub description: Option<String>,
    pub opened_at: DateTime<Utc>,
    pub opened_by: Option<ActorId>,
}

/// Ticket as stored: status plus nullable transition columns.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketRow {
    pub id: TicketId,
    pub code: String,
    pub protocol: String,
    pub priority: String,
    pub category: String,
    pub requester_name: String,
    pub requester_email: String,
    pub description: Option<String>,
    pub status: String,
    pub opened_at: DateTime<Utc>,
    pub assumed_at: Option<DateTime<Utc>>,
    pub assumed_by: Option<ActorId>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_by: Option<ActorId>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<ActorId>,
}

impl TicketRow {
    pub fn into_ticket(self) -> DomainResult<Ticket> {
        let status: TicketStatus = self.status.parse().map_err(|e: String| {
            DomainError::DataIntegrity(format!("ticket {}: {}", self.id, e))
        })?;
        let state = TicketState::from_columns(
            status,
            (self.assumed_at, self.assumed_by),
            (self.completed_at, self.completed_by),
            (self.cancelled_at, self.cancelled_by),
        )
        .map_err(|e| match e {
            DomainError::DataIntegrity(msg) => {
                DomainError::DataIntegrity(format!("ticket {}: {}", self.id, msg))
            }
            other => other,
        })?;

        Ok(Ticket {
            id: self.id,
            code: self.code,
            protocol: self.protocol,
            priority: self.priority,
            category: self.category,
            requester_name: self.requester_name,
            requester_email: self.requester_email,
            description: self.description,
            opened_at: self.opened_at,
            state,
        })
    }
}

/// Fields supplied when opening a ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTicket {
    pub priority: String,
    pub category: String,
    pub requester_name: String,
    pub requester_email: String,
    pub description: Option<String>,
    pub opened_by: Option<ActorId>,
}

impl NewTicket {
    pub fn validate(&self) -> DomainResult<()> {
        if self.requester_name.trim().is_empty() {
            return Err(DomainError::Validation(
                "requester_name must not be empty".to_string(),
            ));
        }
        if self.category.trim().is_empty() {
            return Err(DomainError::Validation("category must not be empty".to_string()));
        }
        if !email_address::EmailAddress::is_valid(self.requester_email.trim()) {
            return Err(DomainError::Validation(format!(
                "Invalid requester email: {}",
                self.requester_email
            )));
        }
        Ok(())
    }
}

/// Human-readable identifiers assigned at creation.
pub fn generate_code() -> String {
    let bytes: [u8; 3] = rand::thread_rng().gen();
    format!("TKT-{}", hex::encode_upper(bytes))
}

pub fn generate_protocol(opened_at: DateTime<Utc>) -> String {
    let serial: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{}{:06}", opened_at.format("%Y%m%d"), serial)
}

/// Display wording for statuses. Configurable; the keys stay fixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusLabels {
    pub open: String,
    pub in_progress: String,
    pub completed: String,
    pub cancelled: String,
}

impl StatusLabels {
    pub fn label(&self, status: TicketStatus) -> &str {
        match status {
            TicketStatus::Open => &self.open,
            TicketStatus::InProgress => &self.in_progress,
            TicketStatus::Completed => &self.completed,
            TicketStatus::Cancelled => &self.cancelled,
        }
    }

    /// Parse a comma-separated list in status order.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
        match parts.as_slice() {
            [open, in_progress, completed, cancelled]
                if parts.iter().all(|p| !p.is_empty()) =>
            {
                Ok(Self {
                    open: open.to_string(),
                    in_progress: in_progress.to_string(),
                    completed: completed.to_string(),
                    cancelled: cancelled.to_string(),
                })
            }
            _ => Err(format!(
                "Expected four comma-separated status labels, got '{}'",
                raw
            )),
        }
    }
}

impl Default for StatusLabels {
    fn default() -> Self {
        Self {
            open: "Open".to_string(),
            in_progress: "In progress".to_string(),
            completed: "Completed".to_string(),
            cancelled: "Cancelled".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 12, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_open_to_in_progress() {
        let state = TicketState::Open.transition(TicketAction::Assume, at(9), 7).unwrap();
        assert_eq!(state, TicketState::InProgress(Pickup { at: at(9), by: 7 }));
    }

    #[test]
    fn test_complete_keeps_pickup() {
        let state = TicketState::InProgress(Pickup { at: at(9), by: 7 })
            .transition(TicketAction::Complete, at(11), 8)
            .unwrap();
        assert_eq!(state.pickup(), Some(Pickup { at: at(9), by: 7 }));
        assert_eq!(state.completed(), Some(Resolution { at: at(11), by: 8 }));
        assert_eq!(state.cancelled(), None);
    }

    #[test]
    fn test_direct_cancel_from_open() {
        let state = TicketState::Open.transition(TicketAction::Cancel, at(10), 3).unwrap();
        assert_eq!(state.status(), TicketStatus::Cancelled);
        assert_eq!(state.pickup(), None);
    }

    #[test]
    fn test_assume_twice_invalid() {
        let state = TicketState::InProgress(Pickup { at: at(9), by: 7 });
        let err = state.transition(TicketAction::Assume, at(10), 8).unwrap_err();
        assert!(matches!(
            err,
            DomainError::InvalidTransition {
                from: TicketStatus::InProgress,
                action: TicketAction::Assume
            }
        ));
        assert_eq!(err.to_string(), "Cannot assume a ticket that is in_progress");
    }

    #[test]
    fn test_no_transition_out_of_terminal() {
        let completed = TicketState::Completed {
            pickup: None,
            resolution: Resolution { at: at(9), by: 1 },
        };
        for action in [TicketAction::Assume, TicketAction::Complete, TicketAction::Cancel] {
            assert!(completed.transition(action, at(10), 1).is_err());
        }
    }

    #[test]
    fn test_from_columns_rejects_completed_without_timestamp() {
        let result = TicketState::from_columns(
            TicketStatus::Completed,
            (None, None),
            (None, None),
            (None, None),
        );
        assert!(matches!(result, Err(DomainError::DataIntegrity(_))));
    }

    #[test]
    fn test_from_columns_rejects_both_terminal_markers() {
        let result = TicketState::from_columns(
            TicketStatus::Completed,
            (None, None),
            (Some(at(10)), Some(1)),
            (Some(at(11)), Some(1)),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_from_columns_rejects_open_with_completion() {
        let result = TicketState::from_columns(
            TicketStatus::Open,
            (None, None),
            (Some(at(10)), Some(1)),
            (None, None),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_status_labels_parse() {
        let labels = StatusLabels::parse("Aberto, Em andamento, Concluido, Cancelado").unwrap();
        assert_eq!(labels.label(TicketStatus::InProgress), "Em andamento");
        assert!(StatusLabels::parse("a,b,c").is_err());
        assert!(StatusLabels::parse("a,,c,d").is_err());
    }

    #[test]
    fn test_new_ticket_validation() {
        let mut ticket = NewTicket {
            priority: "High".to_string(),
            category: "Network".to_string(),
            requester_name: "Dana".to_string(),
            requester_email: "dana@example.com".to_string(),
            description: None,
            opened_by: None,
        };
        assert!(ticket.validate().is_ok());
        ticket.requester_email = "not-an-email".to_string();
        assert!(ticket.validate().is_err());
    }

    #[test]
    fn test_generated_identifiers() {
        let code = generate_code();
        assert!(code.starts_with("TKT-"));
        assert_eq!(code.len(), 10);
        let protocol = generate_protocol(at(9));
        assert!(protocol.starts_with("20260112"));
        assert_eq!(protocol.len(), 14);
    }
}
