//! Run summary printed to stdout.

use std::fmt::Write;
use wpfeed_core::sync::{BatchSyncSummary, SiteSyncResult};

pub fn print_summary(summary: &BatchSyncSummary) {
    print!("{}", render_summary(summary));
}

pub fn render_summary(summary: &BatchSyncSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "\nSync complete: {} of {} sites, {} items written",
        summary.successful_count(),
        summary.total_sites(),
        summary.total_items()
    );
    if summary.total_recorded_failures() > 0 {
        let _ = writeln!(out, "  Skipped pages/items:   {}", summary.total_recorded_failures());
    }
    let _ = writeln!(out);

    for result in &summary.results {
        render_site(&mut out, result);
    }
    out
}

fn render_site(out: &mut String, result: &SiteSyncResult) {
    let Some(report) = &result.report else {
        let _ = writeln!(
            out,
            "  ✗ {}: {}",
            result.site_name,
            result.error.as_deref().unwrap_or("unknown error")
        );
        return;
    };

    let target = if report.dry_run {
        "dry run, not written".to_string()
    } else {
        report.output_path.display().to_string()
    };
    let _ = writeln!(
        out,
        "  ✓ {}: {} items from {} pages ({} new, {} updated) -> {}",
        result.site_name,
        report.items_written,
        report.pages_walked,
        report.stats.created,
        report.stats.updated,
        target
    );
    if report.deadline_hit {
        let _ = writeln!(out, "      stopped at the site deadline");
    }
    for failure in &report.failures {
        let _ = writeln!(out, "      skipped {}", failure);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wpfeed_core::sync::{MergeStats, SyncFailure, SyncReport};

    #[test]
    fn test_render_mixed_summary() {
        let mut summary = BatchSyncSummary::new();
        summary.add(SiteSyncResult::success(
            "novel".into(),
            "https://novel.example.com".into(),
            SyncReport {
                site: "novel".into(),
                output_path: "/feeds/novel.xml".into(),
                items_written: 12,
                pages_walked: 3,
                stats: MergeStats {
                    created: 2,
                    updated: 1,
                    ..MergeStats::default()
                },
                failures: vec![SyncFailure::page(2, "HTTP 502")],
                ..SyncReport::default()
            },
        ));
        summary.add(SiteSyncResult::failure(
            "blog".into(),
            "https://blog.example.com".into(),
            "Authentication failed: bad password".into(),
        ));

        let text = render_summary(&summary);

        assert!(text.contains("Sync complete: 1 of 2 sites, 12 items written"));
        assert!(text.contains("✓ novel: 12 items from 3 pages (2 new, 1 updated) -> /feeds/novel.xml"));
        assert!(text.contains("skipped page 2: HTTP 502"));
        assert!(text.contains("✗ blog: Authentication failed: bad password"));
    }

    #[test]
    fn test_render_dry_run() {
        let mut summary = BatchSyncSummary::new();
        summary.add(SiteSyncResult::success(
            "default".into(),
            "https://example.com".into(),
            SyncReport {
                dry_run: true,
                ..SyncReport::default()
            },
        ));
        assert!(render_summary(&summary).contains("dry run, not written"));
    }
}
