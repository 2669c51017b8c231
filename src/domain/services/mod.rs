pub mod business_calendar;
pub mod sla_calculator;

pub use business_calendar::BusinessCalendar;
