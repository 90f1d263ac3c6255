//! Property-based tests for manifest ordering and template substitution.

#![allow(clippy::expect_used)]

use proptest::prelude::*;

use strato_cli::domain::config::substitute_placeholders;
use strato_cli::domain::manifest::{ManifestEntry, StagingManifest};

fn entry(path: String) -> ManifestEntry {
    ManifestEntry {
        relative_path: path,
        content_hash: "0".repeat(64),
        size_bytes: 0,
    }
}

proptest! {
    #[test]
    fn manifest_is_always_sorted_and_complete(
        paths in proptest::collection::btree_set("[a-z]{1,8}(/[a-z]{1,8}){0,2}", 0..32)
    ) {
        let entries: Vec<ManifestEntry> = paths.iter().cloned().map(entry).collect();
        let manifest = StagingManifest::from_entries(entries).expect("unique paths");

        prop_assert_eq!(manifest.len(), paths.len());
        let listed: Vec<&str> = manifest
            .entries()
            .iter()
            .map(|e| e.relative_path.as_str())
            .collect();
        let mut sorted = listed.clone();
        sorted.sort_unstable();
        prop_assert_eq!(&listed, &sorted);
        for path in &paths {
            prop_assert!(manifest.contains(path));
        }
    }

    #[test]
    fn duplicate_paths_are_always_rejected(
        paths in proptest::collection::vec("[a-z]{1,8}", 1..16),
        dup in "[a-z]{1,8}",
    ) {
        let mut entries: Vec<ManifestEntry> = paths.into_iter().map(entry).collect();
        entries.push(entry(dup.clone()));
        entries.push(entry(dup));
        prop_assert!(StagingManifest::from_entries(entries).is_err());
    }

    #[test]
    fn placeholder_free_templates_pass_through(template in "[a-zA-Z0-9/_.-]{0,40}") {
        let out = substitute_placeholders(&template, None).expect("no placeholders");
        prop_assert_eq!(out, template);
    }

    #[test]
    fn username_substitution_never_leaves_the_placeholder(
        prefix in "[a-z/]{0,10}",
        user in "[a-z]{1,12}",
    ) {
        let template = format!("{prefix}{{username}}/app");
        let out = substitute_placeholders(&template, Some(&user)).expect("substituted");
        prop_assert!(!out.contains("{username}"), "placeholder should be substituted");
        prop_assert!(out.contains(&user));
    }
}
