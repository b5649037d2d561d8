//! Validate demo: one dataset from fetch to ledger
//!
//! Shows:
//! 1. A clean dataset is verified and published
//! 2. A damaged dataset gets a failed (but signed) verdict
//! 3. The ledger goes down, the attestation survives
//! 4. Tampering with the document breaks its signature

use std::sync::Arc;
use std::time::Duration;

use attest::{fixtures::sample_csv, verify, ValidatorKey};
use uuid::Uuid;
use validator::error::CollaboratorError;
use validator::events::MemoryEventSink;
use validator::ledger::InMemoryLedger;
use validator::pipeline::{Pipeline, RunContext, RunOutcome};
use validator::retry::RetryPolicy;
use validator::store::InMemoryContentStore;
use validator::types::ValidationRequest;

#[tokio::main]
async fn main() {
    println!("╔════════════════════════════════════════════════╗");
    println!("║  Dataset Validator - Demo                      ║");
    println!("║  Signed Attestations for Marketplace Data      ║");
    println!("╚════════════════════════════════════════════════╝\n");

    let store = Arc::new(InMemoryContentStore::new());
    let ledger = Arc::new(InMemoryLedger::new());
    let events = Arc::new(MemoryEventSink::new());
    let pipeline = validator::build_pipeline(
        store.clone(),
        ledger.clone(),
        ValidatorKey::generate(),
        RetryPolicy::immediate(3),
        Duration::from_secs(5),
        events.clone(),
    );
    println!("   Validator: {}\n", pipeline.identity());

    // 1. Clean dataset
    println!("📝 Step 1: Validate a clean 1000-row dataset");
    println!("   ─────────────────────────────────────────");
    store.insert("QmSampleClean", sample_csv(1000, 42)).await;
    let clean = run(&pipeline, "QmSampleClean", "1").await;
    let Some(clean) = clean else { return };
    print_outcome(&clean);
    println!("   Ledger records: {}\n", ledger.records().await.len());

    // 2. Damaged dataset
    println!("🧪 Step 2: Validate a dataset with a malformed row");
    println!("   ──────────────────────────────────────────────");
    let mut damaged = sample_csv(200, 7);
    damaged.push_str("\n201,item_201,Z,oops,,extra");
    store.insert("QmSampleDamaged", damaged).await;
    if let Some(out) = run(&pipeline, "QmSampleDamaged", "2").await {
        print_outcome(&out);
        for check in &out.attestation().validation.schema.checks {
            println!("     {} {}", if check.passed { "✓" } else { "✗" }, check.name);
        }
    }
    println!();

    // 3. Ledger outage
    println!("⚠️  Step 3: Ledger rejects the record");
    println!("   ─────────────────────────────────");
    ledger
        .fail_next([CollaboratorError::Rejected("token not listed".into())])
        .await;
    if let Some(out) = run(&pipeline, "QmSampleClean", "3").await {
        print_outcome(&out);
    }
    println!();

    // 4. Tampering
    println!("😈 Step 4: Someone edits the published verdict");
    println!("   ───────────────────────────────────────────");
    let mut forged = clean.attestation().clone();
    forged.validation.quality.score = 100;
    println!("   Original signature check: {}", verdict(verify(clean.attestation()).is_ok()));
    println!("   Forged signature check:   {}", verdict(verify(&forged).is_ok()));

    println!("\n   Events recorded: {}", events.events().len());
}

async fn run(pipeline: &Arc<Pipeline>, locator: &str, token: &str) -> Option<RunOutcome> {
    let req = match ValidationRequest::new(locator, token) {
        Ok(r) => r,
        Err(e) => {
            println!("   ✗ bad request: {e}");
            return None;
        }
    };
    let (ctx, _phase) = RunContext::new(Uuid::new_v4());
    match pipeline.run(req, ctx).await {
        Ok(out) => Some(out),
        Err(e) => {
            println!("   ✗ run failed: {e}");
            None
        }
    }
}

fn print_outcome(out: &RunOutcome) {
    let att = out.attestation();
    let q = &att.validation.quality;
    println!("   Status: {}", att.status);
    println!(
        "   Quality: completeness {}%, consistency {}%, accuracy {}%, score {}",
        q.completeness, q.consistency, q.accuracy, q.score
    );
    match out {
        RunOutcome::Published { attestation_locator, receipt, .. } => {
            println!("   Attestation: {attestation_locator}");
            println!("   Transaction: {}", receipt.transaction_hash);
            println!("   ✓ Published");
        }
        RunOutcome::PublishedPartially { attestation_locator, failure, .. } => {
            println!("   Attestation: {}", attestation_locator.as_deref().unwrap_or("(not uploaded)"));
            println!("   ✗ Publication incomplete: {failure}");
        }
    }
    if let Ok(json) = serde_json::to_string(&att.validation.integrity) {
        println!("   Integrity: {json}");
    }
}

fn verdict(ok: bool) -> &'static str {
    if ok {
        "✓ valid"
    } else {
        "✗ TAMPERING DETECTED"
    }
}
