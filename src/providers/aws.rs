use crate::config::ReportConfig;
use crate::error::{AppError, BillingError};
use crate::models::{FilterExpr, GroupBy, GroupEntry, Granularity, UsagePage, UsageQuery, UsageRecord};
use crate::providers::BillingSource;
use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_costexplorer::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_costexplorer::operation::get_cost_and_usage::GetCostAndUsageError;
use aws_sdk_costexplorer::types::{
    CostCategoryValues, DateInterval, Dimension as CeDimension, DimensionValues, Expression,
    Granularity as CeGranularity, GroupDefinition, GroupDefinitionType, MetricValue, ResultByTime,
    TagValues,
};
use aws_sdk_costexplorer::Client;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::info;

/// AWS Cost Explorer `GetCostAndUsage`.
pub struct AwsCostExplorer {
    client: Client,
}

impl AwsCostExplorer {
    /// Loads region and credentials from the default provider chain and
    /// resolves credentials once, so a missing profile fails the run up front.
    pub async fn connect(cfg: &ReportConfig) -> Result<Self, AppError> {
        let timeouts = TimeoutConfig::builder()
            .connect_timeout(Duration::from_secs(10))
            .operation_attempt_timeout(cfg.page_timeout())
            .build();

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .retry_config(RetryConfig::disabled())
            .timeout_config(timeouts);
        if let Some(endpoint) = &cfg.endpoint_url {
            loader = loader.endpoint_url(endpoint.as_str());
        }
        let sdk_config = loader.load().await;

        let provider = sdk_config.credentials_provider().ok_or_else(|| {
            AppError::Credentials("no AWS credentials provider is configured".into())
        })?;
        provider
            .provide_credentials()
            .await
            .map_err(|e| AppError::Credentials(DisplayErrorContext(&e).to_string()))?;

        info!(region = %cfg.region, "AWS Cost Explorer client ready");
        Ok(Self {
            client: Client::new(&sdk_config),
        })
    }
}

#[async_trait]
impl BillingSource for AwsCostExplorer {
    fn name(&self) -> &'static str {
        "aws-cost-explorer"
    }

    async fn fetch_page(
        &self,
        query: &UsageQuery,
        page_token: Option<&str>,
    ) -> Result<UsagePage, BillingError> {
        let interval = DateInterval::builder()
            .start(query.start_param())
            .end(query.end_param())
            .build()
            .map_err(|e| BillingError::Request(e.to_string()))?;

        let group_by = if query.group_by.is_empty() {
            None
        } else {
            Some(query.group_by.iter().map(group_definition).collect())
        };

        let output = self
            .client
            .get_cost_and_usage()
            .time_period(interval)
            .granularity(granularity(query.granularity))
            .set_metrics(Some(query.metrics.clone()))
            .set_group_by(group_by)
            .set_filter(query.filter.as_ref().map(expression))
            .set_next_page_token(page_token.map(str::to_string))
            .send()
            .await
            .map_err(classify)?;

        Ok(UsagePage {
            results: output.results_by_time().iter().map(usage_record).collect(),
            next_page_token: output.next_page_token().map(str::to_string),
        })
    }
}

fn granularity(g: Granularity) -> CeGranularity {
    match g {
        Granularity::Daily => CeGranularity::Daily,
        Granularity::Monthly => CeGranularity::Monthly,
    }
}

fn group_definition(group: &GroupBy) -> GroupDefinition {
    let kind = match group {
        GroupBy::Dimension(_) => GroupDefinitionType::Dimension,
        GroupBy::Tag(_) => GroupDefinitionType::Tag,
        GroupBy::CostCategory(_) => GroupDefinitionType::CostCategory,
    };
    GroupDefinition::builder()
        .r#type(kind)
        .key(group.api_key())
        .build()
}

fn expression(filter: &FilterExpr) -> Expression {
    match filter {
        FilterExpr::Dimension { key, values } => Expression::builder()
            .dimensions(
                DimensionValues::builder()
                    .key(CeDimension::from(key.as_api_str()))
                    .set_values(Some(values.clone()))
                    .build(),
            )
            .build(),
        FilterExpr::Tag { key, values } => Expression::builder()
            .tags(
                TagValues::builder()
                    .key(key.as_str())
                    .set_values(Some(values.clone()))
                    .build(),
            )
            .build(),
        FilterExpr::CostCategory { key, values } => Expression::builder()
            .cost_categories(
                CostCategoryValues::builder()
                    .key(key.as_str())
                    .set_values(Some(values.clone()))
                    .build(),
            )
            .build(),
        FilterExpr::And(items) => Expression::builder()
            .set_and(Some(items.iter().map(expression).collect()))
            .build(),
        FilterExpr::Or(items) => Expression::builder()
            .set_or(Some(items.iter().map(expression).collect()))
            .build(),
        FilterExpr::Not(inner) => Expression::builder().not(expression(inner)).build(),
    }
}

// Metrics without an amount are dropped, same as a missing metric.
fn amounts(metrics: &HashMap<String, MetricValue>) -> BTreeMap<String, String> {
    metrics
        .iter()
        .filter_map(|(name, value)| Some((name.clone(), value.amount()?.to_string())))
        .collect()
}

fn usage_record(result: &ResultByTime) -> UsageRecord {
    UsageRecord {
        period_start: result
            .time_period()
            .map(|p| p.start().to_string())
            .unwrap_or_default(),
        total: result.total().map(amounts).unwrap_or_default(),
        groups: result
            .groups()
            .iter()
            .map(|g| GroupEntry {
                keys: g.keys().to_vec(),
                metrics: g.metrics().map(amounts).unwrap_or_default(),
            })
            .collect(),
        estimated: result.estimated(),
    }
}

fn classify<R: std::fmt::Debug>(err: SdkError<GetCostAndUsageError, R>) -> BillingError {
    let message = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            BillingError::Transport(message)
        }
        SdkError::ServiceError(_) => match err.as_service_error() {
            Some(e)
                if e.is_limit_exceeded_exception()
                    || matches!(e.code(), Some("ThrottlingException" | "TooManyRequestsException")) =>
            {
                BillingError::Throttled(message)
            }
            _ => BillingError::Api(message),
        },
        _ => BillingError::Request(message),
    }
}
