//! Handler for `ggshield quota`.

use clap::Args;
use ggshield_core::{Error, ExitCode};

use crate::commands::common;
use crate::CommandResult;

#[derive(Args, Clone)]
pub struct QuotaArgs {
    /// JSON output.
    #[arg(long)]
    json: bool,
}

pub fn handle(args: QuotaArgs) -> CommandResult {
    let client = common::create_client_from_env()?;
    let response = client.quota_overview().map_err(Error::from)?;
    let quota = response.content;

    if args.json {
        let serialized = serde_json::to_string(&quota)
            .map_err(|err| Error::Unexpected(err.to_string()))?;
        println!("{serialized}");
    } else {
        println!(
            "Quota available: {}\nQuota used in the last 30 days: {}\nTotal Quota of the workspace: {}",
            quota.remaining, quota.count, quota.limit
        );
    }
    Ok(ExitCode::Success)
}
