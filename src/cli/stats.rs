//! CLI command: `themis stats`
//!
//! Prints a user's usage summary against the configured storage backend.

use anyhow::Context;
use themis_billing::format_compact_number;
use themis_usage::UsageAggregator;

use crate::api::usage::{parse_window_bound, UsageSummaryView};

/// Run the stats subcommand.
pub async fn run(user: &str, from: Option<&str>, to: Option<&str>, json: bool) -> anyhow::Result<()> {
    let from = parse_window_bound(from)
        .map_err(|param| anyhow::anyhow!("invalid --from date: {param}"))?;
    let to =
        parse_window_bound(to).map_err(|param| anyhow::anyhow!("invalid --to date: {param}"))?;

    let config = crate::server::load_config().context("Failed to load configuration")?;
    let stores = crate::server::init_stores(&config).await?;
    let aggregator = UsageAggregator::new(stores.store);

    let summary = aggregator.summarize_user(user, from, to).await;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&UsageSummaryView::from(summary))?
        );
        return Ok(());
    }

    println!();
    println!("  Usage for {user}");
    println!("  {}", "-".repeat(72));
    println!(
        "  Tokens: {} total ({} in / {} out)  |  Messages: {}",
        format_compact_number(summary.summary.total_tokens),
        format_compact_number(summary.summary.input_tokens),
        format_compact_number(summary.summary.output_tokens),
        summary.summary.total_messages
    );

    if !summary.model_breakdown.is_empty() {
        println!("  {}", "-".repeat(72));
        println!("  {:<40} {:<14} Messages", "Model", "Tokens");
        let mut models = summary.model_breakdown.clone();
        models.sort_by(|a, b| b.total_tokens.cmp(&a.total_tokens));
        for model in &models {
            println!(
                "  {:<40} {:<14} {}",
                format!("{}/{}", model.provider, model.model),
                format_compact_number(model.total_tokens),
                model.message_count
            );
        }
    }

    if !summary.tool_usage.is_empty() {
        println!("  {}", "-".repeat(72));
        println!("  {:<40} Calls", "Tool");
        let mut tools = summary.tool_usage.clone();
        tools.sort_by(|a, b| b.count.cmp(&a.count));
        for tool in &tools {
            println!("  {:<40} {}", tool.name, tool.count);
        }
    }

    println!();
    Ok(())
}
