//! Import report assembly.

use crate::types::import::{CampaignRef, ImportError, ImportReport, ImportSummary};

/// Row errors returned to the caller; the rest are counted but dropped.
pub const MAX_REPORTED_ERRORS: usize = 50;

/// Fold counts and row errors into the caller-facing report. `skipped`
/// counts every error, including those truncated out of the list.
pub fn build_report(
    total: u32,
    inserted: u32,
    updated: u32,
    mut errors: Vec<ImportError>,
    campaign: Option<CampaignRef>,
) -> ImportReport {
    let skipped = errors.len() as u32;
    let success_rate = if total == 0 {
        0.0
    } else {
        let rate = f64::from(total.saturating_sub(skipped)) / f64::from(total) * 100.0;
        (rate * 100.0).round() / 100.0
    };

    errors.truncate(MAX_REPORTED_ERRORS);

    ImportReport {
        success: true,
        message: "Bulk import completed".to_string(),
        summary: ImportSummary {
            total,
            inserted,
            updated,
            skipped,
            success_rate,
        },
        errors,
        campaign,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err(row: u32) -> ImportError {
        ImportError {
            row,
            reason: "Missing required field".to_string(),
        }
    }

    #[test]
    fn success_rate_rounds_to_two_decimals() {
        let report = build_report(3, 1, 1, vec![err(3)], None);
        assert_eq!(report.summary.skipped, 1);
        assert!((report.summary.success_rate - 66.67).abs() < 1e-9);
    }

    #[test]
    fn error_list_capped_but_skipped_counts_all() {
        let errors: Vec<ImportError> = (1u32..=80).map(err).collect();
        let report = build_report(100, 20, 0, errors, None);
        assert_eq!(report.errors.len(), MAX_REPORTED_ERRORS);
        assert_eq!(report.summary.skipped, 80);
        assert_eq!(report.summary.success_rate, 20.0);
    }

    #[test]
    fn empty_total_yields_zero_rate() {
        let report = build_report(0, 0, 0, vec![], None);
        assert_eq!(report.summary.success_rate, 0.0);
    }

    #[test]
    fn campaign_ref_is_echoed() {
        let id = uuid::Uuid::new_v4();
        let report = build_report(
            1,
            1,
            0,
            vec![],
            Some(CampaignRef {
                id,
                name: "Spring Outreach".to_string(),
            }),
        );
        let campaign = report.campaign.unwrap();
        assert_eq!(campaign.id, id);
        assert_eq!(campaign.name, "Spring Outreach");
        assert_eq!(report.summary.success_rate, 100.0);
    }
}
