use crate::domain::entities::{CalendarSettings, Holiday, SlaConfig};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::SlaConfigRepository;
use crate::infrastructure::persistence::Database;
use chrono::{NaiveDate, Weekday};
use sqlx::Row;
use std::collections::BTreeMap;

fn encode_weekdays(days: &[Weekday]) -> String {
    days.iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn decode_weekdays(raw: &str) -> DomainResult<Vec<Weekday>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<Weekday>()
                .map_err(|_| DomainError::DataIntegrity(format!("Invalid weekday '{}'", s)))
        })
        .collect()
}

#[async_trait::async_trait]
impl SlaConfigRepository for Database {
    async fn load_sla_config(&self) -> DomainResult<SlaConfig> {
        let limit_rows = sqlx::query("SELECT priority, limit_hours FROM sla_limits")
            .fetch_all(&self.pool)
            .await?;
        let mut limits = BTreeMap::new();
        for row in &limit_rows {
            limits.insert(
                row.try_get::<String, _>("priority")?,
                row.try_get::<f64, _>("limit_hours")?,
            );
        }

        let calendar_row = sqlx::query(
            "SELECT start_hour, end_hour, weekdays, timezone FROM business_calendar WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let holiday_rows = sqlx::query("SELECT date, name, recurring FROM holidays ORDER BY date")
            .fetch_all(&self.pool)
            .await?;
        let holidays = holiday_rows
            .iter()
            .map(|row| {
                let raw: String = row.try_get("date")?;
                Ok(Holiday {
                    date: NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| {
                        DomainError::DataIntegrity(format!("Invalid holiday date '{}': {}", raw, e))
                    })?,
                    name: row.try_get("name")?,
                    recurring: row.try_get::<i64, _>("recurring")? != 0,
                })
            })
            .collect::<DomainResult<Vec<_>>>()?;

        let calendar = match calendar_row {
            Some(row) => CalendarSettings {
                start_hour: row.try_get::<i64, _>("start_hour")? as u32,
                end_hour: row.try_get::<i64, _>("end_hour")? as u32,
                weekdays: decode_weekdays(&row.try_get::<String, _>("weekdays")?)?,
                holidays,
                timezone: row.try_get("timezone")?,
            },
            None => CalendarSettings {
                holidays,
                ..CalendarSettings::default()
            },
        };

        Ok(SlaConfig { limits, calendar })
    }

    async fn save_sla_config(&self, config: &SlaConfig) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM sla_limits")
            .execute(&mut *tx)
            .await?;
        for (priority, hours) in &config.limits {
            sqlx::query("INSERT INTO sla_limits (priority, limit_hours) VALUES (?, ?)")
                .bind(priority)
                .bind(*hours)
                .execute(&mut *tx)
                .await?;
        }

        let calendar = &config.calendar;
        sqlx::query(
            "INSERT INTO business_calendar (id, start_hour, end_hour, weekdays, timezone)
             VALUES (1, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                start_hour = excluded.start_hour,
                end_hour = excluded.end_hour,
                weekdays = excluded.weekdays,
                timezone = excluded.timezone",
        )
        .bind(calendar.start_hour as i64)
        .bind(calendar.end_hour as i64)
        .bind(encode_weekdays(&calendar.weekdays))
        .bind(&calendar.timezone)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM holidays").execute(&mut *tx).await?;
        for holiday in &calendar.holidays {
            sqlx::query("INSERT INTO holidays (date, name, recurring) VALUES (?, ?, ?)")
                .bind(holiday.date.format("%Y-%m-%d").to_string())
                .bind(&holiday.name)
                .bind(holiday.recurring as i64)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
