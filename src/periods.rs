use crate::models::API_DATE_FORMAT;
use chrono::{Datelike, Days, Months, NaiveDate};

/// A month-aligned date range. `end` is exclusive, matching the billing API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportingPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub label: String,
}

impl ReportingPeriod {
    pub fn start_param(&self) -> String {
        self.start.format(API_DATE_FORMAT).to_string()
    }

    pub fn end_param(&self) -> String {
        self.end.format(API_DATE_FORMAT).to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPeriods {
    pub previous: ReportingPeriod,
    pub current: ReportingPeriod,
    pub day_of_month: u32,
}

impl ReportPeriods {
    /// Returns `None` only when the neighbouring months fall outside the
    /// representable date range.
    pub fn from_date(today: NaiveDate) -> Option<Self> {
        let current_start = today.checked_sub_days(Days::new(u64::from(today.day0())))?;
        let current_end = current_start.checked_add_months(Months::new(1))?;
        let previous_start = current_start.checked_sub_months(Months::new(1))?;

        Some(Self {
            previous: ReportingPeriod {
                start: previous_start,
                end: current_start,
                label: format!("Previous Month ({})", previous_start.format("%b %Y")),
            },
            current: ReportingPeriod {
                start: current_start,
                end: current_end,
                label: format!("Current Month MTD ({})", current_start.format("%b %Y")),
            },
            day_of_month: today.day(),
        })
    }

    /// The billing API has nothing for a month that started today.
    pub fn current_month_available(&self) -> bool {
        self.day_of_month != 1
    }
}
