use tracing::{info, warn};

/// Multiplier applied to every displayed amount: `1 + percent / 100`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkupFactor {
    percent: f64,
}

impl Default for MarkupFactor {
    fn default() -> Self {
        Self { percent: 0.0 }
    }
}

impl MarkupFactor {
    pub const MIN_PERCENT: f64 = -100.0;

    /// Reads the raw margin setting. Absent, blank or malformed input falls
    /// back to zero markup; discounts beyond -100% are clamped so amounts
    /// never change sign.
    pub fn from_setting(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            info!("AWS_MARGIN not set; applying 0% margin");
            return Self::default();
        };

        let percent = match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            _ => {
                warn!(value = raw, "AWS_MARGIN is not a number; applying 0% margin");
                return Self::default();
            }
        };

        if percent < Self::MIN_PERCENT {
            warn!(
                percent,
                "AWS_MARGIN discount below -100%; clamping to -100%"
            );
            return Self {
                percent: Self::MIN_PERCENT,
            };
        }
        if percent < 0.0 {
            info!("Applying negative AWS_MARGIN (discount) of {percent:.2}%");
        }
        Self { percent }
    }

    pub fn percent(self) -> f64 {
        self.percent
    }

    pub fn multiplier(self) -> f64 {
        1.0 + self.percent / 100.0
    }

    pub fn apply(self, raw: f64) -> f64 {
        raw * self.multiplier()
    }
}
