use crate::markup::MarkupFactor;
use crate::models::{GroupBy, GroupEntry, UsageRecord};
use std::collections::HashMap;
use std::io::{self, Write};

pub const SEPARATOR_WIDTH: usize = 30;
const KEY_WIDTH: usize = 50;
const VALUE_WIDTH: usize = 15;

pub fn separator() -> String {
    "-".repeat(SEPARATOR_WIDTH)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceTotal {
    pub key: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReportBody {
    NoResults,
    Total {
        amount: f64,
    },
    Grouped {
        header: String,
        plural: String,
        rows: Vec<ServiceTotal>,
        total: f64,
    },
}

/// An amount that could not be parsed and was left out of the sums.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmountWarning {
    pub period_start: String,
    pub group: Option<String>,
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodReport {
    pub label: String,
    pub metric: String,
    pub body: ReportBody,
    pub estimated: bool,
    pub warnings: Vec<AmountWarning>,
}

fn parse_amount(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Row name for a group entry: each key rendered by its group-by kind,
/// joined when more than one definition is active.
fn group_key(group_by: &[GroupBy], entry: &GroupEntry) -> Option<String> {
    if entry.keys.is_empty() {
        return None;
    }
    let parts: Vec<String> = entry
        .keys
        .iter()
        .enumerate()
        .map(|(i, raw)| match group_by.get(i) {
            Some(g) => g.display_key(raw),
            None => raw.clone(),
        })
        .collect();
    Some(parts.join(" / "))
}

fn group_labels(group_by: &[GroupBy]) -> (String, String) {
    match group_by {
        [single] => (single.header(), single.plural().to_string()),
        many => (
            many.iter().map(GroupBy::header).collect::<Vec<_>>().join(" / "),
            "Groups".to_string(),
        ),
    }
}

impl PeriodReport {
    /// Aggregates fetched buckets for one period. With no group-by the
    /// metric's bucket totals are summed; otherwise amounts are accumulated
    /// per group key and sorted by amount descending, then key ascending.
    /// Group rows are held in cents so the total row is the sum of the
    /// printed rows. Unparseable amounts are left out and returned in
    /// `warnings`.
    pub fn build(
        label: &str,
        records: &[UsageRecord],
        metric: &str,
        group_by: &[GroupBy],
        markup: MarkupFactor,
    ) -> Self {
        let mut warnings = Vec::new();
        let estimated = records.iter().any(|r| r.estimated);

        let body = if records.is_empty() {
            ReportBody::NoResults
        } else if group_by.is_empty() {
            let mut amount = 0.0;
            for record in records {
                let Some(raw) = record.total.get(metric) else {
                    continue;
                };
                match parse_amount(raw) {
                    Some(v) => amount += markup.apply(v),
                    None => {
                        warnings.push(AmountWarning {
                            period_start: record.period_start.clone(),
                            group: None,
                            raw: raw.clone(),
                        });
                    }
                }
            }
            ReportBody::Total { amount }
        } else {
            let mut totals: HashMap<String, f64> = HashMap::new();
            for record in records {
                for entry in &record.groups {
                    let Some(key) = group_key(group_by, entry) else {
                        continue;
                    };
                    let Some(raw) = entry.metrics.get(metric) else {
                        continue;
                    };
                    match parse_amount(raw) {
                        Some(v) => *totals.entry(key).or_insert(0.0) += markup.apply(v),
                        None => {
                            warnings.push(AmountWarning {
                                period_start: record.period_start.clone(),
                                group: Some(key),
                                raw: raw.clone(),
                            });
                        }
                    }
                }
            }

            let mut rows: Vec<ServiceTotal> = totals
                .into_iter()
                .map(|(key, amount)| ServiceTotal {
                    key,
                    amount: round_cents(amount),
                })
                .collect();
            rows.sort_by(|a, b| {
                b.amount
                    .total_cmp(&a.amount)
                    .then_with(|| a.key.cmp(&b.key))
            });
            let total = round_cents(rows.iter().map(|r| r.amount).sum());
            let (header, plural) = group_labels(group_by);
            ReportBody::Grouped {
                header,
                plural,
                rows,
                total,
            }
        };

        Self {
            label: label.to_string(),
            metric: metric.to_string(),
            body,
            estimated,
            warnings,
        }
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "--- {} Results ---", self.label)?;

        match &self.body {
            ReportBody::NoResults => {
                writeln!(out, "No results found for this period.")?;
            }
            ReportBody::Total { amount } => {
                writeln!(out, "Total {} for {}: {:.2}", self.metric, self.label, amount)?;
            }
            ReportBody::Grouped {
                header,
                plural,
                rows,
                total,
            } => {
                let key_rule = "-".repeat(KEY_WIDTH);
                let value_rule = "-".repeat(VALUE_WIDTH);
                writeln!(out, "Cost Summary by {} ({}):", header, self.label)?;
                writeln!(out, "  {:<KEY_WIDTH$} {:>VALUE_WIDTH$}", header, self.metric)?;
                writeln!(out, "  {key_rule:<KEY_WIDTH$} {value_rule:>VALUE_WIDTH$}")?;
                for row in rows {
                    writeln!(
                        out,
                        "  {:<KEY_WIDTH$} {:>VALUE_WIDTH$.2}",
                        row.key, row.amount
                    )?;
                }
                writeln!(out, "  {key_rule:<KEY_WIDTH$} {value_rule:>VALUE_WIDTH$}")?;
                writeln!(
                    out,
                    "  {:<KEY_WIDTH$} {:>VALUE_WIDTH$.2}",
                    format!("Total (Sum of {plural})"),
                    total
                )?;
            }
        }

        if self.estimated && self.body != ReportBody::NoResults {
            writeln!(out, "Note: includes estimated amounts.")?;
        }
        writeln!(out, "{}", separator())
    }
}
