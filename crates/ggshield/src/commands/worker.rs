//! Hidden worker subcommand: runs the pre-receive scan in its own
//! process so the parent can kill it on timeout.

use std::io::Read;

use clap::Args;
use ggshield_cache::Cache;
use ggshield_core::config::Config;
use ggshield_core::{Error, ExitCode, ScanContext, ScanMode};
use ggshield_exclude::ExclusionRegexes;
use ggshield_output::{OutputContext, SecretOutputHandler, TextOutputHandler};
use ggshield_secret::{check_client_api_key, default_scan_threads, repo, ClientChunkScanner};
use serde::{Deserialize, Serialize};

use crate::commands::common;
use crate::CommandResult;

/// Everything the worker needs, received on stdin as JSON.
#[derive(Debug, Serialize, Deserialize)]
pub struct WorkerPayload {
    pub commit_list: Vec<String>,
    pub config: Config,
    pub mode: String,
    pub gitlab_web_ui: bool,
}

#[derive(Args, Clone)]
pub struct WorkerArgs {}

pub fn handle(_args: WorkerArgs) -> CommandResult {
    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .map_err(Error::from)?;
    let payload: WorkerPayload = serde_json::from_str(&raw)
        .map_err(|err| Error::Unexpected(format!("invalid worker payload: {err}")))?;

    let client = common::create_client_from_env()?;
    check_client_api_key(&client, &payload.config.secret)?;

    let exclusion_regexes = ExclusionRegexes::with_defaults(&payload.config.secret.ignored_paths)
        .map_err(|err| Error::Usage(err.to_string()))?;
    let scan_context =
        ScanContext::new(ScanMode::PreReceive, "ggshield secret scan pre-receive");
    let chunk_scanner = std::sync::Arc::new(ClientChunkScanner::new(
        client.clone(),
        payload.config.secret.source_uuid.clone(),
    ));

    // Pre-receive runs server side: never write the cache there.
    let mut cache = Cache::in_memory();
    let mut scan = repo::scan_commit_range(
        chunk_scanner,
        &mut cache,
        &payload.commit_list,
        &exclusion_regexes,
        &payload.config.secret,
        &scan_context,
        default_scan_threads(),
    )?;

    let handler: Box<dyn SecretOutputHandler> = if payload.gitlab_web_ui {
        let mut ctx = crate::ContextObj::new(payload.config.clone());
        ctx.exclusion_regexes = exclusion_regexes;
        common::create_gitlab_webui_handler(&ctx)
    } else {
        Box::new(TextOutputHandler::new(OutputContext {
            show_secrets: payload.config.secret.show_secrets,
            verbose: payload.config.verbose,
            ignore_known_secrets: payload.config.secret.ignore_known_secrets,
            secrets_engine_version: client.secrets_engine_version(),
            ..OutputContext::default()
        }))
    };

    let code = handler.process_scan(&mut scan)?;
    if code == ExitCode::ScanFoundProblems {
        let message = payload
            .config
            .secret
            .prereceive_remediation_message
            .clone()
            .unwrap_or_else(|| client.remediation_messages().pre_receive);
        eprintln!("{message}");
    }
    Ok(code)
}
