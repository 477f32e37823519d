use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const API_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Granularity {
    Daily,
    Monthly,
}

impl Granularity {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_uppercase().as_str() {
            "DAILY" => Some(Granularity::Daily),
            "MONTHLY" => Some(Granularity::Monthly),
            _ => None,
        }
    }

    pub fn as_api_str(self) -> &'static str {
        match self {
            Granularity::Daily => "DAILY",
            Granularity::Monthly => "MONTHLY",
        }
    }
}

/// Cost dimensions a report can be split by or filtered on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Dimension {
    Service,
    LinkedAccount,
    Region,
    UsageType,
    InstanceType,
    Operation,
    #[serde(rename = "AZ")]
    AvailabilityZone,
    RecordType,
}

impl Dimension {
    const ALL: [Dimension; 8] = [
        Dimension::Service,
        Dimension::LinkedAccount,
        Dimension::Region,
        Dimension::UsageType,
        Dimension::InstanceType,
        Dimension::Operation,
        Dimension::AvailabilityZone,
        Dimension::RecordType,
    ];

    pub fn as_api_str(self) -> &'static str {
        match self {
            Dimension::Service => "SERVICE",
            Dimension::LinkedAccount => "LINKED_ACCOUNT",
            Dimension::Region => "REGION",
            Dimension::UsageType => "USAGE_TYPE",
            Dimension::InstanceType => "INSTANCE_TYPE",
            Dimension::Operation => "OPERATION",
            Dimension::AvailabilityZone => "AZ",
            Dimension::RecordType => "RECORD_TYPE",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        let wanted = input.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL.into_iter().find(|d| d.as_api_str() == wanted)
    }

    fn labels(self) -> (&'static str, &'static str) {
        match self {
            Dimension::Service => ("Service", "Services"),
            Dimension::LinkedAccount => ("Linked Account", "Linked Accounts"),
            Dimension::Region => ("Region", "Regions"),
            Dimension::UsageType => ("Usage Type", "Usage Types"),
            Dimension::InstanceType => ("Instance Type", "Instance Types"),
            Dimension::Operation => ("Operation", "Operations"),
            Dimension::AvailabilityZone => ("Availability Zone", "Availability Zones"),
            Dimension::RecordType => ("Record Type", "Record Types"),
        }
    }
}

/// One group-by definition. Each kind knows how to label its column and
/// how to turn the raw group key returned by the billing API into a row name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "key", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupBy {
    Dimension(Dimension),
    Tag(String),
    CostCategory(String),
}

impl GroupBy {
    /// Parses the `--group-by` flag. `none` disables grouping.
    pub fn from_cli(input: &str) -> Result<Option<Self>, String> {
        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("none") {
            return Ok(None);
        }
        if let Some((kind, key)) = trimmed.split_once(':') {
            let key = key.trim();
            if key.is_empty() {
                return Err(format!("Group-by '{trimmed}' is missing a key."));
            }
            return match kind.trim().to_ascii_lowercase().as_str() {
                "tag" => Ok(Some(GroupBy::Tag(key.to_string()))),
                "cost-category" | "cost_category" => {
                    Ok(Some(GroupBy::CostCategory(key.to_string())))
                }
                "dimension" => Dimension::parse(key)
                    .map(|d| Some(GroupBy::Dimension(d)))
                    .ok_or_else(|| format!("Unsupported group-by dimension '{key}'.")),
                _ => Err(format!("Unsupported group-by kind '{kind}'.")),
            };
        }
        Dimension::parse(trimmed)
            .map(|d| Some(GroupBy::Dimension(d)))
            .ok_or_else(|| {
                format!(
                    "Unsupported group-by '{trimmed}'. Use none, a dimension such as SERVICE, tag:<key> or cost-category:<key>."
                )
            })
    }

    pub fn api_key(&self) -> &str {
        match self {
            GroupBy::Dimension(d) => d.as_api_str(),
            GroupBy::Tag(key) | GroupBy::CostCategory(key) => key,
        }
    }

    pub fn header(&self) -> String {
        match self {
            GroupBy::Dimension(d) => d.labels().0.to_string(),
            GroupBy::Tag(key) => format!("Tag {key}"),
            GroupBy::CostCategory(key) => format!("Cost Category {key}"),
        }
    }

    pub fn plural(&self) -> &'static str {
        match self {
            GroupBy::Dimension(d) => d.labels().1,
            GroupBy::Tag(_) => "Tag Values",
            GroupBy::CostCategory(_) => "Cost Categories",
        }
    }

    /// Tag and cost category keys come back as `name$value`.
    pub fn display_key(&self, raw: &str) -> String {
        match self {
            GroupBy::Dimension(_) => raw.to_string(),
            GroupBy::Tag(_) | GroupBy::CostCategory(_) => {
                let value = raw.split_once('$').map_or(raw, |(_, v)| v);
                if value.is_empty() {
                    "(untagged)".to_string()
                } else {
                    value.to_string()
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FilterExpr {
    Dimension { key: Dimension, values: Vec<String> },
    Tag { key: String, values: Vec<String> },
    CostCategory { key: String, values: Vec<String> },
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
    Not(Box<FilterExpr>),
}

/// Everything a billing source needs to answer one paginated query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub granularity: Granularity,
    pub metrics: Vec<String>,
    pub group_by: Vec<GroupBy>,
    pub filter: Option<FilterExpr>,
}

impl UsageQuery {
    pub fn start_param(&self) -> String {
        self.start.format(API_DATE_FORMAT).to_string()
    }

    pub fn end_param(&self) -> String {
        self.end.format(API_DATE_FORMAT).to_string()
    }
}

/// One time bucket. Amounts stay as the text the API returned until the
/// report parses them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsageRecord {
    pub period_start: String,
    #[serde(default)]
    pub total: BTreeMap<String, String>,
    #[serde(default)]
    pub groups: Vec<GroupEntry>,
    #[serde(default)]
    pub estimated: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupEntry {
    pub keys: Vec<String>,
    pub metrics: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsagePage {
    pub results: Vec<UsageRecord>,
    pub next_page_token: Option<String>,
}
