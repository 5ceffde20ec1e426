//! Unit tests for context backend creation and teardown.

#![allow(clippy::unwrap_used)]

use dsh_cli::application::services::backend;
use dsh_cli::domain::error::AzureError;

use crate::helpers::context;
use crate::mocks::{MockResourceManager, RecordingReporter};

#[tokio::test]
async fn create_ensures_resources_in_dependency_order() {
    let (cloud, reporter, ctx) = (MockResourceManager::default(), RecordingReporter::default(), context());

    let summary = backend::create(&cloud, &ctx, &reporter).await.unwrap();

    let calls = cloud.calls();
    let kinds: Vec<&str> = calls.iter().map(|c| c.split(' ').next().unwrap_or_default()).collect();
    assert_eq!(
        kinds,
        vec![
            "subscription",
            "resource_group",
            "managed_identity",
            "storage_account",
            "container",
            "container",
            "keyvault",
            "keyvault_key"
        ]
    );
    assert!(calls.contains(&"container config".to_string()));
    assert!(calls.contains(&"container pulumi".to_string()));
    assert!(calls.contains(&format!("resource_group {}", ctx.resource_group_name())));
    assert_eq!(summary.key_vault, ctx.key_vault_name());
    assert_eq!(summary.encryption_key_version, "0123abcd");
    assert_eq!(summary.tenant_id, "1d93a235-0c16-4f39-adff-a550ea31b5c5");
}

#[tokio::test]
async fn blank_storage_account_is_reported_as_not_created() {
    let cloud = MockResourceManager {
        blank_storage_account: true,
        ..MockResourceManager::default()
    };

    let err = backend::create(&cloud, &context(), &RecordingReporter::default())
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Failed to create backend resources.");
    assert!(matches!(
        err.root_cause().downcast_ref::<AzureError>(),
        Some(AzureError::NotCreated { kind: "Storage account", .. })
    ));
    assert!(!cloud.calls().iter().any(|c| c.starts_with("keyvault")));
}

#[tokio::test]
async fn keyvault_failure_is_wrapped() {
    let cloud = MockResourceManager {
        fail_keyvault: true,
        ..MockResourceManager::default()
    };

    let err = backend::create(&cloud, &context(), &RecordingReporter::default())
        .await
        .unwrap_err();

    assert_eq!(format!("{err:#}"), "Failed to create backend resources.: vault name is already in use");
}

#[tokio::test]
async fn teardown_removes_resource_group() {
    let (cloud, reporter, ctx) = (MockResourceManager::default(), RecordingReporter::default(), context());

    backend::teardown(&cloud, &ctx, &reporter).await.unwrap();

    assert_eq!(cloud.calls(), vec![format!("remove_resource_group {}", ctx.resource_group_name())]);
    assert_eq!(
        reporter.events(),
        vec![
            "step: removing backend resource group...".to_string(),
            "success: backend resources removed".to_string()
        ]
    );
}
