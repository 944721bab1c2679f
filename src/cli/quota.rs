//! CLI command: `themis quota`
//!
//! Displays a user's evaluated quota state: plan, token/tool-call ceilings,
//! usage percentages and expiry.

use anyhow::Context;
use chrono::Utc;
use themis_billing::{format_compact_number, month_start, plan, quota};
use themis_usage::UsageAggregator;

/// Run the quota subcommand.
pub async fn run(user: &str, json: bool) -> anyhow::Result<()> {
    let config = crate::server::load_config().context("Failed to load configuration")?;
    let stores = crate::server::init_stores(&config).await?;
    let aggregator = UsageAggregator::new(stores.store);

    let now = Utc::now();
    let subscription = stores.subscriptions.subscription_for(user).await;
    let summary = aggregator
        .summarize_user(user, Some(month_start(now)), None)
        .await;
    let tool_calls_used: u64 = summary.tool_usage.iter().map(|t| t.count).sum();

    let status = quota::evaluate(
        &subscription,
        summary.summary.total_tokens,
        tool_calls_used,
        now,
        config.billing.expiration_policy,
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let plan = plan(status.tier);

    println!();
    println!("  Quota for {user}");
    println!("  {}", "-".repeat(72));
    println!("  Plan: {} ({})", plan.name, status.tier);
    println!(
        "  Tokens:     {:<24} {}%{}",
        format_ratio(status.tokens_used, status.token_limit),
        status.token_usage_pct,
        level_marker(status.token_usage_pct)
    );
    println!(
        "  Tool calls: {:<24} {}%{}",
        format_ratio(status.tool_calls_used, status.tool_call_limit),
        status.tool_call_usage_pct,
        level_marker(status.tool_call_usage_pct)
    );
    println!("  {}", "-".repeat(72));
    if status.blocked {
        println!("  Subscription expired — usage is blocked");
    } else if status.expired {
        println!("  Subscription expired — evaluated on the Free plan");
    } else if status.renewal_due {
        println!(
            "  Renews {} (within the renewal notice window)",
            status.expires_at.format("%Y-%m-%d")
        );
    } else {
        println!("  Renews {}", status.expires_at.format("%Y-%m-%d"));
    }
    println!();

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────

fn format_ratio(used: u64, limit: u64) -> String {
    format!(
        "{} / {}",
        format_compact_number(used),
        format_compact_number(limit)
    )
}

fn level_marker(pct: u8) -> &'static str {
    match quota::level_for(pct) {
        quota::UsageLevel::Critical => " !!",
        quota::UsageLevel::Warning => " !",
        quota::UsageLevel::Normal => "",
    }
}
