use crate::config::ReportConfig;
use crate::error::{AppError, BillingError, FetchError};
use crate::markup::MarkupFactor;
use crate::periods::{ReportPeriods, ReportingPeriod};
use crate::providers::{fetch_all, BillingSource, FetchPolicy};
use crate::report::{separator, PeriodReport};
use std::io::Write;
use tokio::time::{timeout_at, Instant};
use tracing::{error, warn};

/// Labels of the periods handled by one run, by outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub rendered: Vec<String>,
    pub failed: Vec<String>,
    pub skipped: Vec<String>,
}

pub struct ReportService<S> {
    source: S,
    cfg: ReportConfig,
    markup: MarkupFactor,
    policy: FetchPolicy,
}

impl<S: BillingSource> ReportService<S> {
    pub fn new(source: S, cfg: ReportConfig, markup: MarkupFactor) -> Self {
        let policy = FetchPolicy::from_config(&cfg);
        Self {
            source,
            cfg,
            markup,
            policy,
        }
    }

    #[cfg(test)]
    pub fn with_policy(mut self, policy: FetchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Writes the previous-month report, then the month-to-date report.
    /// A period whose fetch fails is logged and skipped; only output errors
    /// abort the run.
    pub async fn run<W: Write>(
        &self,
        periods: &ReportPeriods,
        out: &mut W,
    ) -> Result<RunSummary, AppError> {
        let deadline = Instant::now() + self.cfg.run_timeout();
        let mut summary = RunSummary::default();

        self.report_period(&periods.previous, "Previous Month's", deadline, out, &mut summary)
            .await?;

        if periods.current_month_available() {
            self.report_period(&periods.current, "Current Month's", deadline, out, &mut summary)
                .await?;
        } else {
            writeln!(out, "--- Current Month Results ---")?;
            writeln!(
                out,
                "Today is the 1st of the month. Check back tomorrow to see this month's usage data."
            )?;
            writeln!(out, "{}", separator())?;
            summary.skipped.push(periods.current.label.clone());
        }

        out.flush()?;
        Ok(summary)
    }

    async fn report_period<W: Write>(
        &self,
        period: &ReportingPeriod,
        heading: &str,
        deadline: Instant,
        out: &mut W,
        summary: &mut RunSummary,
    ) -> Result<(), AppError> {
        writeln!(
            out,
            "Fetching {heading} Data ({} to {})...",
            period.start_param(),
            period.end_param()
        )?;
        out.flush()?;

        let query = self.cfg.query_for(period);
        let fetched = match timeout_at(deadline, fetch_all(&self.source, &query, self.policy)).await
        {
            Ok(result) => result,
            Err(_) => Err(FetchError {
                start: period.start_param(),
                end: period.end_param(),
                source: BillingError::Timeout(self.cfg.run_timeout()),
            }),
        };

        match fetched {
            Ok(records) => {
                let report = PeriodReport::build(
                    &period.label,
                    &records,
                    self.cfg.report_metric(),
                    &self.cfg.group_by,
                    self.markup,
                );
                for w in &report.warnings {
                    warn!(
                        period = %period.label,
                        bucket = %w.period_start,
                        group = w.group.as_deref().unwrap_or("-"),
                        amount = %w.raw,
                        "could not parse amount; left out of the report"
                    );
                }
                report.write_to(out)?;
                summary.rendered.push(period.label.clone());
            }
            Err(e) => {
                error!(period = %period.label, error = %e, "fetching data failed; skipping period");
                summary.failed.push(period.label.clone());
            }
        }
        Ok(())
    }
}
