//! Output checks for country reports.
//!
//! These verify what the pipeline promises about its output:
//!
//! - every normalized value lies in `[0, 1]`
//! - series and merged records have strictly ascending, unique quarters
//! - Index1 to Index3 are always finite, Index4 and Index5 whenever defined
//!
//! # Example
//!
//! ```rust,ignore
//! use dtpi::validation::validate_country_report;
//!
//! if let Err(errors) = validate_country_report(&report) {
//!     for e in errors {
//!         eprintln!("{}", e);
//!     }
//! }
//! ```

use crate::models::{IndexKind, Metric, PeriodKey};
use crate::transform::pipeline::CountryReport;

/// Check one country report.
///
/// # Returns
/// * `Ok(())` if every check passes
/// * `Err(Vec<String>)` with one message per violation
pub fn validate_country_report(report: &CountryReport) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    for metric in Metric::ALL {
        let series = report.series(metric);
        for p in series {
            if !(0.0..=1.0).contains(&p.normalized_value) {
                errors.push(format!(
                    "{} {}: normalized value {} outside [0, 1]",
                    metric, p.quarter, p.normalized_value
                ));
            }
        }
        check_ascending(metric.as_str(), series.iter().map(|p| p.quarter), &mut errors);
    }

    check_ascending("records", report.records.iter().map(|r| r.quarter), &mut errors);

    for record in &report.records {
        for kind in IndexKind::ALL {
            // Index4 and Index5 are undefined for the first quarter.
            if let Some(v) = kind.value(&record.indices) {
                if !v.is_finite() {
                    errors.push(format!(
                        "{} {}: {} is not finite ({})",
                        record.country, record.quarter, kind, v
                    ));
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Quick pass/fail check.
pub fn is_valid_country_report(report: &CountryReport) -> bool {
    validate_country_report(report).is_ok()
}

fn check_ascending(label: &str, quarters: impl Iterator<Item = PeriodKey>, errors: &mut Vec<String>) {
    let mut previous: Option<PeriodKey> = None;
    for quarter in quarters {
        if let Some(prev) = previous {
            if quarter <= prev {
                errors.push(format!("{}: {} does not follow {}", label, quarter, prev));
            }
        }
        previous = Some(quarter);
    }
}
