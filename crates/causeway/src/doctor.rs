// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `causeway doctor`: configuration and local connectivity report.

use causeway_core::CausewayError;
use causeway_storage::{Database, queries::heartbeats, queries::queue};

pub async fn run() -> Result<(), CausewayError> {
    let config = causeway_config::load_config()
        .map_err(|e| CausewayError::Config(format!("failed to load configuration: {e}")))?;

    println!("causeway doctor");
    println!("  database path        {}", config.storage.database_path);
    println!("  server               {}:{}", config.server.host, config.server.port);
    println!("  worker concurrency   {}", config.worker.concurrency);
    println!("  max turn duration    {}s", config.worker.max_turn_secs);
    println!(
        "  guard                {} ({})",
        if config.guard.enabled { "enabled" } else { "disabled" },
        if config.guard.fail_closed { "fail-closed" } else { "fail-open" },
    );
    println!(
        "  platform model       {} @ {}",
        config.llm.platform_model, config.llm.platform_base_url
    );
    println!(
        "  platform api key     {}",
        if config.llm.platform_api_key.is_some() { "configured" } else { "MISSING" }
    );
    println!(
        "  vault master key     {}",
        if config.vault.master_key.is_some() { "configured" } else { "MISSING" }
    );

    match Database::open(&config.storage.database_path).await {
        Ok(db) => {
            let depth = queue::depth(&db, causeway_storage::RCA_JOB_QUEUE).await?;
            let workers = heartbeats::workers_seen_since(&db, 60).await?;
            println!("  database             ok (queue depth {depth}, workers seen {workers})");
            db.close().await?;
        }
        Err(e) => {
            println!("  database             FAILED: {e}");
        }
    }

    Ok(())
}
