//! Human-readable run report.

use mirror_sync::SyncSummary;

/// Prints the outcome of one run.
pub fn print_summary(summary: &SyncSummary, dry_run: bool) {
    if dry_run {
        println!("Dry run, nothing was changed. Pending volume:");
    } else {
        println!("Synchronization finished:");
    }
    println!("  Added:   {}", summary.added());
    println!("  Updated: {}", summary.updated());
    println!("  Deleted: {}", summary.deleted());

    let failed = summary.not_registered();
    if failed.is_empty() {
        println!("  Failed:  0");
    } else {
        println!("  Failed:  {}", failed.len());
        for key in failed {
            println!("    - {key}");
        }
    }
}
