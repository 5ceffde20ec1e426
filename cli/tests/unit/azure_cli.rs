//! Unit tests for the `az` adapter, driven through a recording runner.

#![allow(clippy::unwrap_used)]

use dsh_cli::application::ports::{BlobStorage, ResourceManager};
use dsh_cli::domain::error::AzureError;
use dsh_cli::infra::azure::AzureCli;

use crate::helpers::{context, err_output, ok_output};
use crate::mocks::RecordingRunner;

const SUBSCRIPTION: &str = "Data Safe Haven Acme";

#[tokio::test]
async fn every_call_targets_the_subscription() {
    let runner = RecordingRunner::new().respond(ok_output(
        br#"{"id":"10de18e7-b238-6f1e-a4ad-772708929203","name":"Acme","tenantId":"1d93a235-0c16-4f39-adff-a550ea31b5c5"}"#,
    ));
    let az = AzureCli::new(&runner, SUBSCRIPTION);

    let sub = az.subscription().await.unwrap();

    assert_eq!(sub.tenant_id, "1d93a235-0c16-4f39-adff-a550ea31b5c5");
    let call = &runner.invocations()[0];
    assert_eq!(call.program, "az");
    assert_eq!(
        call.args,
        vec![
            "account",
            "show",
            "--output",
            "json",
            "--subscription",
            SUBSCRIPTION,
            "--only-show-errors"
        ]
    );
}

#[tokio::test]
async fn account_key_is_read_once_per_account() {
    let runner = RecordingRunner::new()
        .respond(ok_output(b"account-key\n"))
        .respond(ok_output(br#"{"exists": true}"#))
        .respond(ok_output(br#"{"exists": false}"#));
    let az = AzureCli::new(&runner, SUBSCRIPTION);
    let location = context().config_blobs();

    assert!(az.blob_exists(&location, "shm.yaml").await.unwrap());
    assert!(!az.blob_exists(&location, "pulumi.yaml").await.unwrap());

    let invocations = runner.invocations();
    assert_eq!(invocations.len(), 3);
    assert_eq!(invocations[0].args[..4], ["storage", "account", "keys", "list"]);
    for call in &invocations[1..] {
        let key = call.args.iter().position(|a| a == "--account-key").unwrap();
        assert_eq!(call.args[key + 1], "account-key");
    }
}

#[tokio::test]
async fn missing_blob_maps_to_blob_not_found() {
    let runner = RecordingRunner::new()
        .respond(ok_output(b"account-key"))
        .respond(err_output(
            3,
            b"ERROR: The specified blob does not exist.\nErrorCode:BlobNotFound",
        ));
    let az = AzureCli::new(&runner, SUBSCRIPTION);

    let err = az
        .remove_blob(&context().config_blobs(), "sre-sandbox.yaml")
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<AzureError>(),
        Some(AzureError::BlobNotFound(name)) if name == "sre-sandbox.yaml"
    ));
}

#[tokio::test]
async fn other_blob_failures_pass_through() {
    let runner = RecordingRunner::new()
        .respond(ok_output(b"account-key"))
        .respond(err_output(1, b"ERROR: AuthorizationPermissionMismatch"));
    let az = AzureCli::new(&runner, SUBSCRIPTION);

    let err = az
        .remove_blob(&context().config_blobs(), "shm.yaml")
        .await
        .unwrap_err();

    assert!(err.downcast_ref::<AzureError>().is_none());
    assert!(err.to_string().contains("az storage blob delete"));
}

#[tokio::test]
async fn absent_resource_group_is_not_deleted() {
    let runner = RecordingRunner::new().respond(ok_output(b"false\n"));
    let az = AzureCli::new(&runner, SUBSCRIPTION);

    az.remove_resource_group("shm-acmedeployment-rg-context").await.unwrap();

    let invocations = runner.invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].args[..2], ["group", "exists"]);
}

#[tokio::test]
async fn existing_resource_group_is_deleted() {
    let runner = RecordingRunner::new().respond(ok_output(b"true\n"));
    let az = AzureCli::new(&runner, SUBSCRIPTION);

    az.remove_resource_group("shm-acmedeployment-rg-context").await.unwrap();

    let invocations = runner.invocations();
    assert_eq!(invocations.len(), 2);
    assert_eq!(
        invocations[1].args[..5],
        ["group", "delete", "--name", "shm-acmedeployment-rg-context", "--yes"]
    );
}
