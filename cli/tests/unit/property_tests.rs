//! Property-based tests for the configuration queue and context naming.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::BTreeMap;

use proptest::prelude::*;

use dsh_cli::application::services::project_manager::{ProjectManager, ProjectTarget};
use dsh_cli::domain::context::ContextSettings;
use dsh_cli::domain::pulumi::PulumiConfig;

use crate::helpers::{context, settings};
use crate::mocks::{MemoryBlobs, MockEngine};

/// One queued option: name, value, replace.
fn queued_option() -> impl Strategy<Value = (String, String, bool)> {
    (
        prop::sample::select(vec!["shm-fqdn", "sre-timezone", "sre-databases", "password-x"]),
        "[a-z0-9]{1,8}",
        proptest::bool::ANY,
    )
        .prop_map(|(name, value, replace)| (name.to_string(), value, replace))
}

proptest! {
    /// Property: the queue keeps one entry per name in first-insertion order,
    /// and applying it leaves each name holding the last queued value unless
    /// that value was queued without `replace` and the stack already had one.
    #[test]
    fn prop_option_queue_applies_last_write_per_name(
        ops in prop::collection::vec(queued_option(), 1..12),
        seeded in prop::collection::btree_set(
            prop::sample::select(vec!["shm-fqdn", "sre-timezone", "sre-databases", "password-x"]),
            0..4,
        ),
    ) {
        let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
        rt.block_on(async {
            let (engine, blobs, ctx) = (MockEngine::new(), MemoryBlobs::new(), context());
            for name in &seeded {
                engine.seed_config(name, "seeded", false);
            }
            let mut manager = ProjectManager::new(
                &engine,
                &blobs,
                &ctx,
                PulumiConfig::default(),
                ProjectTarget::shm(),
                settings(),
                true,
            )
            .unwrap();

            let mut first_seen: Vec<String> = Vec::new();
            let mut last: BTreeMap<String, (String, bool)> = BTreeMap::new();
            for (name, value, replace) in &ops {
                manager.add_option(name, value, *replace);
                if !first_seen.contains(name) {
                    first_seen.push(name.clone());
                }
                last.insert(name.clone(), (value.clone(), *replace));
            }
            prop_assert_eq!(manager.pending_options(), first_seen.iter().map(String::as_str).collect::<Vec<_>>());

            manager.apply_config_options().await.unwrap();
            prop_assert!(manager.pending_options().is_empty());

            for (name, (value, replace)) in &last {
                let expected = if !replace && seeded.contains(name.as_str()) { "seeded" } else { value.as_str() };
                let stored = engine.config_value(name);
                prop_assert_eq!(stored.as_deref(), Some(expected));
            }
            Ok(())
        })?;
    }

    /// Property: context keys never contain separators or uppercase letters,
    /// and names differing only in separators and case share a key.
    #[test]
    fn prop_context_key_is_normalised(name in "[A-Za-z0-9 _.-]{1,32}") {
        let key = ContextSettings::key_for(&name);
        prop_assert!(!key.contains([' ', '_', '-', '.']));
        prop_assert_eq!(key.to_lowercase(), key.clone());
        prop_assert_eq!(ContextSettings::key_for(&name.to_uppercase().replace(' ', "_")), key);
    }
}
