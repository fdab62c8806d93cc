//! End-to-end pipeline runs against the sandbox ledger

use std::fs;
use std::path::Path;

use forge_resilience::FailureMode;
use forge_sandbox::{Operation, SandboxLedger};
use forge_transport::Cluster;
use forge_types::{to_base_units, TokenStandard};
use nft_forge::steps::{
    burn_token, create_collection, mint_nfts, upload_assets, verify_collection, CollectionSettings, UploadOptions,
};
use nft_forge::{AssetLayout, Cache, MintSettings, StepPolicies, TokenMetadata};
use tempfile::TempDir;

const PAYER: &str = "7NLD2Ps6Xek4kjkM1gFxFAFZqf7nJA2jjQWeq3QHvm77";

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn write_assets(root: &Path, nfts: usize) -> AssetLayout {
    let layout = AssetLayout::new(root);
    write(&layout.collection_images().join("collection.png"), "collection art");
    write(
        &layout.collection_metadata().join("collection.json"),
        r#"{"name": "Forge Collection", "symbol": "FRG", "description": "test drop"}"#,
    );
    for i in 0..nfts {
        write(&layout.nft_images().join(format!("{:02}.png", i)), &format!("art {}", i));
        write(
            &layout.nft_metadata().join(format!("{:02}.json", i)),
            &format!(r#"{{"name": "Forge #{}", "symbol": "FRG", "attributes": [{{"trait_type": "n", "value": {}}}]}}"#, i, i),
        );
    }
    layout
}

struct Pipeline {
    _dir: TempDir,
    layout: AssetLayout,
    cache: Cache,
    ledger: SandboxLedger,
    policies: StepPolicies,
}

impl Pipeline {
    fn new(nfts: usize) -> Self {
        let dir = TempDir::new().unwrap();
        let layout = write_assets(dir.path(), nfts);
        let cache = Cache::new(layout.cache_dir());
        let ledger = SandboxLedger::in_memory(PAYER).unwrap();
        ledger.credit(PAYER, to_base_units(1.0));
        Self {
            _dir: dir,
            layout,
            cache,
            ledger,
            policies: StepPolicies::default().with_delay_ms(0),
        }
    }

    async fn upload(&self) {
        upload_assets(
            &self.ledger.storage_node(),
            &self.layout,
            &self.cache,
            &self.policies,
            &UploadOptions::default(),
        )
        .await
        .unwrap();
    }

    async fn create_collection(&self) -> String {
        create_collection(
            &self.ledger,
            &self.layout,
            &self.cache,
            Cluster::Devnet,
            &self.policies,
            &CollectionSettings::default(),
        )
        .await
        .unwrap()
        .address
    }

    fn settings(&self, standard: TokenStandard, parallelism: usize) -> MintSettings {
        MintSettings {
            parallelism,
            token_standard: standard,
            ..MintSettings::default()
        }
    }
}

#[tokio::test]
async fn test_full_pipeline_with_transient_failures() {
    let p = Pipeline::new(5);
    p.ledger.fail_next(Operation::Upload, 2);
    p.upload().await;

    let metadata = TokenMetadata::read(&p.layout.nft_metadata().join("03.json")).unwrap();
    assert!(metadata.uri.as_deref().unwrap().starts_with("https://"));
    assert_eq!(metadata.extra["attributes"][0]["value"], 3);

    let collection = p.create_collection().await;
    assert_eq!(p.cache.require_collection().unwrap(), collection);

    p.ledger.fail_next(Operation::Mint, 2);
    p.ledger.fail_next(Operation::Fetch, 1);
    let minted = mint_nfts(
        &p.ledger,
        &p.layout,
        &p.cache,
        Cluster::Devnet,
        &p.policies,
        &p.settings(TokenStandard::NonFungible, 2),
        FailureMode::Continue,
    )
    .await
    .unwrap();
    assert!(minted.is_clean(), "failures: {:?}", minted.failed);
    assert_eq!(minted.minted.len(), 5);
    assert_eq!(p.cache.minted().unwrap().minted_nfts.len(), 5);

    let verified = verify_collection(&p.ledger, &p.cache, &p.policies, 3, FailureMode::Continue)
        .await
        .unwrap();
    assert!(verified.is_clean());
    assert_eq!(verified.verified.len(), 5);
    assert!(verified.collection_programmable);

    // A second pass finds everything already verified.
    let again = verify_collection(&p.ledger, &p.cache, &p.policies, 3, FailureMode::Continue)
        .await
        .unwrap();
    assert!(again.verified.is_empty());
    assert_eq!(again.already_verified.len(), 5);

    let victim = minted.minted[0].mint.clone();
    let burned = burn_token(&p.ledger, &victim, &p.cache, &p.policies.send).await.unwrap();
    assert!(burned.uncached);
    assert!(burned.reclaimed > 0);
    let remaining = p.cache.minted().unwrap();
    assert_eq!(remaining.minted_nfts.len(), 4);
    assert!(!remaining.minted_nfts.contains(&victim));
}

#[tokio::test]
async fn test_rerun_mints_only_what_failed() {
    let p = Pipeline::new(4);
    p.upload().await;
    p.create_collection().await;

    // Enough consecutive failures to exhaust the first unit's retries.
    let attempts = p.policies.send.max_attempts();
    p.ledger.fail_next(Operation::Mint, attempts);
    let first = mint_nfts(
        &p.ledger,
        &p.layout,
        &p.cache,
        Cluster::Devnet,
        &p.policies,
        &p.settings(TokenStandard::NonFungible, 1),
        FailureMode::Continue,
    )
    .await
    .unwrap();
    assert_eq!(first.minted.len(), 3);
    assert_eq!(first.failed.len(), 1);
    assert_eq!(first.failed[0].unit, "00.json");
    assert_eq!(first.failed[0].attempts, Some(attempts));

    let second = mint_nfts(
        &p.ledger,
        &p.layout,
        &p.cache,
        Cluster::Devnet,
        &p.policies,
        &p.settings(TokenStandard::NonFungible, 1),
        FailureMode::Continue,
    )
    .await
    .unwrap();
    assert_eq!(second.already_minted, 3);
    assert_eq!(second.minted.len(), 1);
    assert_eq!(second.minted[0].source, "00.json");
    assert_eq!(p.cache.minted().unwrap().minted_nfts.len(), 4);
}

#[tokio::test]
async fn test_programmable_members_are_not_verified() {
    let p = Pipeline::new(3);
    p.upload().await;
    p.create_collection().await;

    mint_nfts(
        &p.ledger,
        &p.layout,
        &p.cache,
        Cluster::Devnet,
        &p.policies,
        &p.settings(TokenStandard::ProgrammableNonFungible, 3),
        FailureMode::Continue,
    )
    .await
    .unwrap();

    let summary = verify_collection(&p.ledger, &p.cache, &p.policies, 3, FailureMode::Continue)
        .await
        .unwrap();
    assert_eq!(summary.skipped_programmable.len(), 3);
    assert!(summary.verified.is_empty());
    assert!(summary.is_clean());
}

#[tokio::test]
async fn test_mint_before_upload_fails_validation() {
    let p = Pipeline::new(2);
    p.cache.write_collection(PAYER).unwrap();

    let err = mint_nfts(
        &p.ledger,
        &p.layout,
        &p.cache,
        Cluster::Devnet,
        &p.policies,
        &p.settings(TokenStandard::NonFungible, 2),
        FailureMode::Continue,
    )
    .await
    .unwrap_err();
    assert!(forge_types::is_permanent(&err), "{:#}", err);
    assert!(p.cache.minted().unwrap().is_empty());
}
