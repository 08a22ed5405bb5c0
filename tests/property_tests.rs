//! Property-based tests using proptest
//!
//! These tests verify invariants across randomized inputs, helping catch
//! edge cases that might be missed by example-based testing.

use model_catalog::models::cache::{local_reference, preview_file_name, resolve_reference};
use model_catalog::models::{ModelRecord, RemoteMetadata};
use model_catalog::{ProgressKind, ScanProgress};
use proptest::prelude::*;
use std::path::{Path, PathBuf};

// =============================================================================
// Strategies
// =============================================================================

/// Outcome kinds a scan can report for a single file
fn arb_item_kind() -> impl Strategy<Value = ProgressKind> {
    prop_oneof![
        Just(ProgressKind::Skipped {
            path: PathBuf::from("/m/checkpoints/a.safetensors")
        }),
        Just(ProgressKind::Updated {
            path: PathBuf::from("/m/loras/b.safetensors")
        }),
        "[a-z ]{1,20}".prop_map(|error| ProgressKind::Errored {
            path: PathBuf::from("/m/loras/c.safetensors"),
            error,
        }),
    ]
}

// =============================================================================
// Progress
// =============================================================================

proptest! {
    /// Per-file events followed by the terminal event never move backwards
    /// and finish at exactly 1.0
    #[test]
    fn progress_is_monotone(kinds in prop::collection::vec(arb_item_kind(), 1..60)) {
        let total = kinds.len();
        let mut events: Vec<ScanProgress> = kinds
            .into_iter()
            .enumerate()
            .map(|(i, kind)| ScanProgress { processed: i + 1, total, kind })
            .collect();
        events.push(ScanProgress { processed: total, total, kind: ProgressKind::Completed });

        let fractions: Vec<f64> = events.iter().map(ScanProgress::fraction).collect();
        prop_assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
        prop_assert!(fractions.iter().all(|f| (0.0..=1.0).contains(f)));
        prop_assert_eq!(*fractions.last().unwrap(), 1.0);
        prop_assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    /// Every event serializes with a status only when terminal
    #[test]
    fn status_only_on_terminal(processed in 0usize..100, extra in 0usize..100, kind in arb_item_kind()) {
        let total = processed + extra + 1;
        let event = ScanProgress { processed: processed + 1, total, kind }.to_event();
        prop_assert!(event.status.is_none());
        prop_assert!(event.progress > 0.0 && event.progress <= 1.0);
    }
}

// =============================================================================
// Preview names
// =============================================================================

proptest! {
    /// Derived cache names never escape the cache directory
    #[test]
    fn preview_name_has_no_separators(
        host in "[a-z]{1,10}\\.example\\.com",
        segments in prop::collection::vec("[a-zA-Z0-9%._=-]{0,16}", 0..5),
    ) {
        let url = format!("https://{}/{}", host, segments.join("/"));
        if let Some(name) = preview_file_name(&url) {
            prop_assert!(!name.is_empty());
            prop_assert!(!name.contains('/'));
            prop_assert!(!name.contains('\\'));
            prop_assert!(name != "." && name != "..");
        }
    }

    /// A stored reference always resolves back inside the cache directory
    #[test]
    fn reference_resolves_inside_cache_dir(name in "[a-zA-Z0-9 _.=+-]{1,24}") {
        prop_assume!(name != "." && name != "..");
        let dir = Path::new("/cache/images");
        let reference = local_reference(&name);
        prop_assert!(reference.starts_with("/static/images/"));

        let resolved = resolve_reference(dir, &reference);
        prop_assert_eq!(resolved, Some(dir.join(&name)));
    }
}

// =============================================================================
// Catalog records
// =============================================================================

proptest! {
    /// Stored mtimes survive persistence bit-for-bit, so unchanged files
    /// are recognized after a restart
    #[test]
    fn record_mtime_is_exact_after_persistence(mtime in 0.0f64..4_000_000_000.0) {
        let record = ModelRecord::new("ab".repeat(32), RemoteMetadata::default(), None, mtime);

        let json = serde_json::to_string(&record).unwrap();
        let parsed: ModelRecord = serde_json::from_str(&json).unwrap();

        prop_assert_eq!(parsed.info.mtime.to_bits(), mtime.to_bits());
    }
}
