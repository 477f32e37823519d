use crate::config::ReportConfig;
use crate::error::{BillingError, FetchError};
use crate::models::{UsagePage, UsageQuery, UsageRecord};
use async_trait::async_trait;
use backoff::future::retry_notify;
use backoff::ExponentialBackoffBuilder;
use std::time::Duration;
use tracing::{debug, info, warn};

pub mod aws;

/// A paginated cost-and-usage API. Implementations answer one page per call;
/// `fetch_all` drives the continuation tokens.
#[async_trait]
pub trait BillingSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_page(
        &self,
        query: &UsageQuery,
        page_token: Option<&str>,
    ) -> Result<UsagePage, BillingError>;
}

#[derive(Debug, Clone, Copy)]
pub struct FetchPolicy {
    pub page_timeout: Duration,
    pub retry_initial_interval: Duration,
    pub retry_max_elapsed: Duration,
}

impl FetchPolicy {
    pub fn from_config(cfg: &ReportConfig) -> Self {
        Self {
            page_timeout: cfg.page_timeout(),
            retry_initial_interval: Duration::from_millis(500),
            retry_max_elapsed: cfg.retry_max_elapsed(),
        }
    }
}

/// Fetches every page for `query` and concatenates the buckets in API order.
/// Any page failure discards what was collected so far.
pub async fn fetch_all<S: BillingSource + ?Sized>(
    source: &S,
    query: &UsageQuery,
    policy: FetchPolicy,
) -> Result<Vec<UsageRecord>, FetchError> {
    info!(
        source = source.name(),
        start = %query.start_param(),
        end = %query.end_param(),
        granularity = query.granularity.as_api_str(),
        "fetching cost and usage"
    );

    let mut results = Vec::new();
    let mut page_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = fetch_page_with_retry(source, query, page_token.as_deref(), policy)
            .await
            .map_err(|source| FetchError {
                start: query.start_param(),
                end: query.end_param(),
                source,
            })?;
        pages += 1;
        results.extend(page.results);

        match page.next_page_token {
            Some(token) if !token.is_empty() => page_token = Some(token),
            _ => break,
        }
    }

    info!(pages, buckets = results.len(), "fetch complete");
    if tracing::enabled!(tracing::Level::DEBUG) {
        match serde_json::to_string_pretty(&results) {
            Ok(raw) => debug!("raw results:\n{raw}"),
            Err(e) => debug!(error = %e, "could not serialize raw results"),
        }
    }
    Ok(results)
}

async fn fetch_page_with_retry<S: BillingSource + ?Sized>(
    source: &S,
    query: &UsageQuery,
    page_token: Option<&str>,
    policy: FetchPolicy,
) -> Result<UsagePage, BillingError> {
    let backoff = ExponentialBackoffBuilder::new()
        .with_initial_interval(policy.retry_initial_interval)
        .with_max_elapsed_time(Some(policy.retry_max_elapsed))
        .build();

    retry_notify(
        backoff,
        move || async move {
            match tokio::time::timeout(policy.page_timeout, source.fetch_page(query, page_token))
                .await
            {
                Ok(Ok(page)) => Ok(page),
                Ok(Err(err)) if err.is_transient() => Err(backoff::Error::transient(err)),
                Ok(Err(err)) => Err(backoff::Error::permanent(err)),
                Err(_) => Err(backoff::Error::transient(BillingError::Timeout(
                    policy.page_timeout,
                ))),
            }
        },
        |err: BillingError, wait: Duration| {
            warn!(
                error = %err,
                retry_in_ms = wait.as_millis() as u64,
                "page request failed; retrying"
            );
        },
    )
    .await
}


#[cfg(test)]
mod tests {
    use super::testing::{fast_policy, page, ScriptedSource};
    use super::*;
    use crate::models::Granularity;
    use chrono::NaiveDate;

    fn query() -> UsageQuery {
        UsageQuery {
            start: NaiveDate::from_ymd_opt(2025, 4, 1).expect("date"),
            end: NaiveDate::from_ymd_opt(2025, 5, 1).expect("date"),
            granularity: Granularity::Daily,
            metrics: vec!["UnblendedCost".into()],
            group_by: vec![],
            filter: None,
        }
    }

    fn starts(records: &[UsageRecord]) -> Vec<&str> {
        records.iter().map(|r| r.period_start.as_str()).collect()
    }

    #[tokio::test]
    async fn concatenates_pages_in_order_until_token_runs_out() {
        let source = ScriptedSource::new(vec![
            Ok(page(&["d1", "d2"], Some("t1"))),
            Ok(page(&["d3"], Some("t2"))),
            Ok(page(&["d4", "d5"], None)),
        ]);

        let records = fetch_all(&source, &query(), fast_policy())
            .await
            .expect("fetch succeeds");

        assert_eq!(starts(&records), vec!["d1", "d2", "d3", "d4", "d5"]);
        assert_eq!(
            source.requested_tokens(),
            vec![None, Some("t1".to_string()), Some("t2".to_string())]
        );
    }

    #[tokio::test]
    async fn empty_token_is_treated_as_last_page() {
        let source = ScriptedSource::new(vec![Ok(page(&["d1"], Some("")))]);
        let records = fetch_all(&source, &query(), fast_policy())
            .await
            .expect("fetch succeeds");
        assert_eq!(records.len(), 1);
        assert_eq!(source.requested_tokens().len(), 1);
    }

    #[tokio::test]
    async fn failure_mid_pagination_discards_partial_results() {
        let source = ScriptedSource::new(vec![
            Ok(page(&["d1"], Some("t1"))),
            Err(BillingError::Api("InvalidNextTokenException".into())),
            Ok(page(&["never"], None)),
        ]);

        let err = fetch_all(&source, &query(), fast_policy())
            .await
            .expect_err("fetch fails");

        assert_eq!(err.start, "2025-04-01");
        assert_eq!(err.end, "2025-05-01");
        assert_eq!(
            err.source,
            BillingError::Api("InvalidNextTokenException".into())
        );
        assert_eq!(source.requested_tokens().len(), 2);
    }

    #[tokio::test]
    async fn transient_failures_are_retried_with_the_same_token() {
        let source = ScriptedSource::new(vec![
            Ok(page(&["d1"], Some("t1"))),
            Err(BillingError::Throttled("LimitExceededException".into())),
            Err(BillingError::Transport("connection reset".into())),
            Ok(page(&["d2"], None)),
        ]);

        let records = fetch_all(&source, &query(), fast_policy())
            .await
            .expect("retries recover");

        assert_eq!(starts(&records), vec!["d1", "d2"]);
        assert_eq!(
            source.requested_tokens(),
            vec![
                None,
                Some("t1".to_string()),
                Some("t1".to_string()),
                Some("t1".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn slow_pages_time_out() {
        let mut source = ScriptedSource::new(vec![Ok(page(&["d1"], None))]);
        source.delay = Some(Duration::from_millis(300));
        let policy = FetchPolicy {
            page_timeout: Duration::from_millis(20),
            retry_initial_interval: Duration::from_millis(1),
            retry_max_elapsed: Duration::ZERO,
        };

        let err = fetch_all(&source, &query(), policy)
            .await
            .expect_err("page times out");
        assert_eq!(
            err.source,
            BillingError::Timeout(Duration::from_millis(20))
        );
    }
}
