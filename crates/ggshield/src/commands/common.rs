//! Shared wiring for the `secret scan` commands: configuration from
//! options and environment, client construction, reporter selection.

use std::sync::Arc;

use ggshield_api::{ClientConfig, GGClient, DEFAULT_API_URL};
use ggshield_cache::Cache;
use ggshield_core::config::{Config, SecretConfig};
use ggshield_core::Error;
use ggshield_exclude::ExclusionRegexes;
use ggshield_output::{
    GitLabWebUiOutputHandler, JsonOutputHandler, OutputContext, OutputFormat, SarifOutputHandler,
    SecretOutputHandler, TextOutputHandler,
};
use ggshield_secret::SecretScanCollection;

use crate::context::ContextObj;
use crate::SecretScanArgs;

/// Build the resolved configuration and context from the scan options.
pub fn make_context(args: &SecretScanArgs, verbose: bool) -> Result<ContextObj, Error> {
    if let Some(source_uuid) = &args.source_uuid {
        if !is_valid_uuid(source_uuid) {
            return Err(Error::Usage("source-uuid must be a valid UUID".to_string()));
        }
    }

    let mut secret = SecretConfig {
        show_secrets: args.show_secrets,
        ignore_known_secrets: args.ignore_known_secrets,
        with_incident_details: args.with_incident_details,
        all_secrets: args.all_secrets,
        source_uuid: args.source_uuid.clone(),
        ..SecretConfig::default()
    };
    secret.ignored_detectors.extend(args.banlist_detectors.iter().cloned());
    secret.ignored_paths.extend(args.exclude.iter().cloned());

    let config = Config {
        verbose,
        exit_zero: args.exit_zero,
        secret,
        ..Config::default()
    };

    let exclusion_regexes = ExclusionRegexes::with_defaults(&config.secret.ignored_paths)
        .map_err(|err| Error::Usage(err.to_string()))?;

    let mut ctx = ContextObj::new(config);
    ctx.exclusion_regexes = exclusion_regexes;
    ctx.output = args.output.clone();
    ctx.output_format = parse_format(&args.format)?;
    Ok(ctx)
}

fn parse_format(format: &str) -> Result<OutputFormat, Error> {
    match format {
        "text" => Ok(OutputFormat::Text),
        "json" => Ok(OutputFormat::Json),
        "sarif" => Ok(OutputFormat::Sarif),
        other => Err(Error::Usage(format!(
            "Invalid value for '--format': {other} (choose from text, json, sarif)"
        ))),
    }
}

fn is_valid_uuid(value: &str) -> bool {
    let parts: Vec<&str> = value.split('-').collect();
    let lengths = [8, 4, 4, 4, 12];
    parts.len() == lengths.len()
        && parts
            .iter()
            .zip(lengths)
            .all(|(part, len)| part.len() == len && part.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Build the API client from the environment
/// (`GITGUARDIAN_API_KEY`, `GITGUARDIAN_API_URL`, `GITGUARDIAN_INSTANCE`).
pub fn create_client_from_env() -> Result<Arc<GGClient>, Error> {
    let api_key = std::env::var("GITGUARDIAN_API_KEY").unwrap_or_default();
    let api_url = match std::env::var("GITGUARDIAN_API_URL") {
        Ok(url) => url,
        Err(_) => match std::env::var("GITGUARDIAN_INSTANCE") {
            // A dashboard instance exposes its API under /exposed.
            Ok(instance) => format!("{}/exposed", instance.trim_end_matches('/')),
            Err(_) => DEFAULT_API_URL.to_string(),
        },
    };
    let client = GGClient::new(ClientConfig::new(api_url, api_key)).map_err(Error::from)?;
    Ok(Arc::new(client))
}

/// Default cache, loaded from the platform cache home.
pub fn create_cache() -> Cache {
    Cache::load_default()
}

/// Build the reporter matching the context, fetching incident details
/// first when asked to.
pub fn create_output_handler(
    ctx: &ContextObj,
    scan: &SecretScanCollection,
    client: Option<&GGClient>,
) -> Box<dyn SecretOutputHandler> {
    let mut output_context = OutputContext {
        show_secrets: ctx.config.secret.show_secrets,
        verbose: ctx.config.verbose,
        ignore_known_secrets: ctx.config.secret.ignore_known_secrets,
        secrets_engine_version: client.and_then(GGClient::secrets_engine_version),
        output: ctx.output.clone(),
        ..OutputContext::default()
    };

    let wants_details = ctx.config.secret.with_incident_details
        && matches!(ctx.output_format, OutputFormat::Json | OutputFormat::Sarif);
    if wants_details {
        if let Some(client) = client {
            match scan.incident_details(client) {
                Ok(details) => output_context.incident_details = details,
                Err(err) => tracing::warn!(error = %err, "could not fetch incident details"),
            }
        }
    }

    match ctx.output_format {
        OutputFormat::Text => Box::new(TextOutputHandler::new(output_context)),
        OutputFormat::Json => Box::new(JsonOutputHandler::new(output_context)),
        OutputFormat::Sarif => Box::new(SarifOutputHandler::new(output_context)),
    }
}

/// The GitLab Web UI reporter, used by pre-receive when `GL_PROTOCOL=web`.
pub fn create_gitlab_webui_handler(ctx: &ContextObj) -> Box<dyn SecretOutputHandler> {
    Box::new(GitLabWebUiOutputHandler::new(OutputContext {
        show_secrets: ctx.config.secret.show_secrets,
        ignore_known_secrets: ctx.config.secret.ignore_known_secrets,
        ..OutputContext::default()
    }))
}
