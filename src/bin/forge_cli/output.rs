//! Output formatting for nft-forge CLI
//!
//! Provides human-readable and JSON output formatting for all commands.

use serde::Serialize;

use forge_types::{format_amount, ForgeError};
use nft_forge::steps::{
    AirdropSummary, BurnSummary, CollectionSummary, MintSummary, UnitFailure, UploadSummary, VerifySummary,
};

/// Pretty JSON, falling back to `{}` if serialization fails.
pub fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

fn push_failures(out: &mut String, title: &str, failures: &[UnitFailure]) {
    if failures.is_empty() {
        return;
    }
    out.push_str(&format!("\n\x1b[1m{}:\x1b[0m\n", title));
    for failure in failures {
        out.push_str(&format!("  \x1b[31m✗\x1b[0m {}: {}\n", failure.unit, failure.error));
    }
}

pub fn format_upload_summary(summary: &UploadSummary, json_output: bool) -> String {
    if json_output {
        return to_json(summary);
    }
    let mut out = String::new();
    out.push_str(&format!(
        "\x1b[32m✓ Uploaded {} unit(s)\x1b[0m ({} already uploaded)\n\n",
        summary.uploaded(),
        summary.nfts.len() + 1 - summary.uploaded()
    ));
    if let Some(funding) = &summary.funding {
        out.push_str(&format!(
            "Storage balance: {} (funded: {})\n",
            format_amount(funding.balance()),
            funding.funded()
        ));
    }
    out.push_str(&format!("Total cost: {}\n\n", format_amount(summary.total_cost)));
    out.push_str(&format!(
        "\x1b[1mCollection:\x1b[0m {} -> \x1b[36m{}\x1b[0m\n",
        summary.collection.metadata_file, summary.collection.metadata_url
    ));
    for unit in &summary.nfts {
        let marker = if unit.skipped { "=" } else { "+" };
        out.push_str(&format!(
            "  {} {} -> \x1b[36m{}\x1b[0m\n",
            marker, unit.metadata_file, unit.metadata_url
        ));
    }
    out
}

pub fn format_collection_summary(summary: &CollectionSummary, json_output: bool) -> String {
    if json_output {
        return to_json(summary);
    }
    let mut out = String::new();
    out.push_str("\x1b[32m✓ Collection created\x1b[0m\n\n");
    out.push_str(&format!("\x1b[1mName:\x1b[0m {}\n", summary.name));
    out.push_str(&format!("\x1b[1mAddress:\x1b[0m \x1b[36m{}\x1b[0m\n", summary.address));
    out.push_str(&format!("\x1b[1mMetadata:\x1b[0m {}\n", summary.uri));
    if let Some(rule_set) = &summary.rule_set {
        out.push_str(&format!("\x1b[1mRule set:\x1b[0m {}\n", rule_set));
    }
    if let Some(funding) = &summary.funding {
        out.push_str(&format!(
            "\x1b[1mWallet:\x1b[0m {} (airdropped: {})\n",
            format_amount(funding.balance()),
            funding.funded()
        ));
    }
    out.push_str(&format!("\x1b[1mExplorer:\x1b[0m {}\n", summary.explorer));
    out.push_str(&format!("\nSaved to {}\n", summary.cache_file.display()));
    out
}

pub fn format_mint_summary(summary: &MintSummary, json_output: bool) -> String {
    if json_output {
        return to_json(summary);
    }
    let mut out = String::new();
    if summary.is_clean() {
        out.push_str(&format!("\x1b[32m✓ Minted {} token(s)\x1b[0m\n\n", summary.minted.len()));
    } else {
        out.push_str(&format!(
            "\x1b[33m! Minted {} token(s), {} unconfirmed, {} failed, {} not attempted\x1b[0m\n\n",
            summary.minted.len(),
            summary.unconfirmed.len(),
            summary.failed.len(),
            summary.skipped.len()
        ));
    }
    out.push_str(&format!(
        "Selected: {} ({} already minted)\n",
        summary.selected, summary.already_minted
    ));
    out.push_str(&format!("Collection: {}\n", summary.collection));
    out.push_str(&format!(
        "Balance: {} -> {}\n",
        format_amount(summary.balance_before),
        format_amount(summary.balance_after)
    ));
    if !summary.minted.is_empty() {
        out.push_str("\n\x1b[1mMinted:\x1b[0m\n");
        for token in &summary.minted {
            out.push_str(&format!(
                "  {} \x1b[36m{}\x1b[0m ({})\n",
                token.source, token.mint, token.name
            ));
        }
    }
    for (title, tokens) in [("Confirmed", &summary.confirmed), ("Unconfirmed", &summary.unconfirmed)] {
        if tokens.is_empty() {
            continue;
        }
        out.push_str(&format!("\n\x1b[1m{}:\x1b[0m\n", title));
        for token in tokens {
            out.push_str(&format!("  {} \x1b[36m{}\x1b[0m\n", token.source, token.mint));
        }
    }
    push_failures(&mut out, "Failed", &summary.failed);
    if !summary.skipped.is_empty() {
        out.push_str(&format!("\nNot attempted: {}\n", summary.skipped.join(", ")));
    }
    out.push_str(&format!("\nAddresses saved to {}\n", summary.cache_file.display()));
    out
}

pub fn format_verify_summary(summary: &VerifySummary, json_output: bool) -> String {
    if json_output {
        return to_json(summary);
    }
    let mut out = String::new();
    let marker = if summary.is_clean() {
        "\x1b[32m✓"
    } else {
        "\x1b[33m!"
    };
    out.push_str(&format!(
        "{} Verified {}, already verified {}, skipped {}, failed {}\x1b[0m\n",
        marker,
        summary.verified.len(),
        summary.already_verified.len(),
        summary.skipped_programmable.len(),
        summary.failed.len()
    ));
    out.push_str(&format!("Collection: {}\n", summary.collection));
    push_failures(&mut out, "Failed", &summary.failed);
    if !summary.not_attempted.is_empty() {
        out.push_str(&format!("\nNot attempted: {}\n", summary.not_attempted.join(", ")));
    }
    out
}

pub fn format_burn_summary(summary: &BurnSummary, json_output: bool) -> String {
    if json_output {
        return to_json(summary);
    }
    format!(
        "\x1b[32m✓ Burned {}\x1b[0m ({})\nReclaimed: {}\nBalance: {}\n",
        summary.mint,
        summary.name,
        format_amount(summary.reclaimed),
        format_amount(summary.balance_after)
    )
}

pub fn format_airdrop_summary(summary: &AirdropSummary, json_output: bool) -> String {
    if json_output {
        return to_json(summary);
    }
    if summary.funded {
        format!(
            "\x1b[32m✓ Airdropped on {}\x1b[0m\nBalance: {} -> {}\n",
            summary.cluster,
            format_amount(summary.before),
            format_amount(summary.after)
        )
    } else {
        format!(
            "Balance {} already above the minimum, nothing to do\n",
            format_amount(summary.after)
        )
    }
}

/// Format an error for display
pub fn format_error(error: &anyhow::Error, json_output: bool) -> String {
    let forge_error = error.chain().find_map(|e| e.downcast_ref::<ForgeError>());
    if json_output {
        #[derive(Serialize)]
        struct ErrorJson {
            error: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            cause: Option<String>,
            #[serde(skip_serializing_if = "Option::is_none")]
            attempts: Option<u32>,
            permanent: bool,
        }

        let err = ErrorJson {
            error: error.to_string(),
            cause: error.source().map(|e| e.to_string()),
            attempts: forge_error.and_then(ForgeError::attempts),
            permanent: forge_types::is_permanent(error),
        };
        to_json(&err)
    } else {
        let mut out = format!("\x1b[31mError:\x1b[0m {}\n", error);
        let mut causes = error.chain().skip(1).peekable();
        if causes.peek().is_some() {
            out.push_str("Caused by:\n");
            for (idx, cause) in causes.enumerate() {
                out.push_str(&format!("  {}: {}\n", idx + 1, cause));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_format_error_json_carries_attempts() {
        let err: anyhow::Error = ForgeError::Exhausted {
            operation: "mint".into(),
            attempts: 3,
            source: anyhow!("node unavailable"),
        }
        .into();
        let json: serde_json::Value = serde_json::from_str(&format_error(&err, true)).unwrap();
        assert_eq!(json["attempts"], 3);
        assert_eq!(json["permanent"], false);
        assert_eq!(json["cause"], "node unavailable");

        let human = format_error(&err, false);
        assert!(human.contains("mint failed after 3 attempt(s)"));
        assert!(human.contains("1: node unavailable"));
    }

    #[test]
    fn test_invalid_input_is_permanent() {
        let err: anyhow::Error = ForgeError::InvalidInput("bad".into()).into();
        let json: serde_json::Value = serde_json::from_str(&format_error(&err, true)).unwrap();
        assert_eq!(json["permanent"], true);
        assert!(json.get("attempts").is_none());
    }
}
