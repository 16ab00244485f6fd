//! CLI for deleting expired OTP records
//!
//! Verification only ever reads the newest record per phone, so expired rows
//! are dead weight. Run periodically (cron or by hand). Outputs JSON.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::Parser;
use serde::Serialize;
use server_core::domains::auth::models::OtpCode;
use sqlx::PgPool;

#[derive(Parser)]
#[command(name = "prune_otp_codes")]
#[command(about = "Delete OTP records that expired more than N hours ago")]
struct Cli {
    /// Only delete records whose expiry is older than this many hours
    #[arg(long, default_value_t = 24)]
    older_than_hours: i64,

    /// Count matching records without deleting them
    #[arg(long)]
    dry_run: bool,
}

#[derive(Serialize)]
struct Response {
    success: bool,
    dry_run: bool,
    cutoff: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    matched: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deleted: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    anyhow::ensure!(cli.older_than_hours >= 0, "--older-than-hours must not be negative");

    let _ = dotenvy::dotenv();
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = PgPool::connect(&database_url)
        .await
        .context("Failed to connect to database")?;

    let cutoff = Utc::now() - Duration::hours(cli.older_than_hours);

    let response = if cli.dry_run {
        let matched = OtpCode::count_expired_before(cutoff, &pool).await?;
        Response {
            success: true,
            dry_run: true,
            cutoff: cutoff.to_rfc3339(),
            matched: Some(matched),
            deleted: None,
        }
    } else {
        let deleted = OtpCode::delete_expired_before(cutoff, &pool).await?;
        Response {
            success: true,
            dry_run: false,
            cutoff: cutoff.to_rfc3339(),
            matched: None,
            deleted: Some(deleted),
        }
    };

    println!("{}", serde_json::to_string(&response)?);
    Ok(())
}
