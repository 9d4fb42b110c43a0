mod args;

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use mailsieve_core::gmail::{FileTokenStore, GmailActionExecutor, GmailClient};
use mailsieve_core::{
    Config, Database, MailFetcher, RecordRepository, RuleProcessor, RuleSet, init_telemetry,
};
use tracing::info;

use crate::args::{Cli, Commands};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> CliResult<()> {
    let cli = Cli::parse();

    // A standalone rules file can be checked without any other configuration.
    if let Commands::CheckRules {
        rules: Some(rules), ..
    } = &cli.command
    {
        return check_rules(rules);
    }

    let config = Config::load(cli.command.config_path())?;
    let _guard = init_telemetry(&config.app, &config.telemetry)?;

    match cli.command {
        Commands::InitDb { .. } => init_db(&config).await,
        Commands::Fetch { .. } => fetch(&config).await,
        Commands::Process { .. } => process(&config).await,
        Commands::CheckRules { .. } => check_rules(&config.paths.rules),
    }
}

async fn open_repository(config: &Config) -> CliResult<RecordRepository> {
    let db = Database::open(&config.paths.database).await?;
    let repo = RecordRepository::new(db);
    repo.ensure_schema().await?;
    Ok(repo)
}

async fn gmail_client(config: &Config) -> CliResult<Arc<GmailClient<FileTokenStore>>> {
    let store = FileTokenStore::new(&config.gmail.token_file);
    let tokens = store.load().await?;

    let mut client = GmailClient::new(
        reqwest::Client::new(),
        config.gmail.user_id.clone(),
        config.gmail.client_id.clone(),
        config.gmail.client_secret.clone(),
        tokens,
        Arc::new(store),
    );
    if let Some(api_base) = &config.gmail.api_base {
        client = client.with_api_base(api_base.clone());
    }
    Ok(Arc::new(client))
}

async fn init_db(config: &Config) -> CliResult<()> {
    open_repository(config).await?;
    info!(database = %config.paths.database.display(), "store schema ready");
    println!("Initialized {}", config.paths.database.display());
    Ok(())
}

async fn fetch(config: &Config) -> CliResult<()> {
    let repo = open_repository(config).await?;
    let client = gmail_client(config).await?;

    let fetcher = MailFetcher::new(
        client,
        repo,
        config.gmail.fetch_label.clone(),
        config.gmail.max_results,
    );
    let summary = fetcher.fetch().await?;

    println!(
        "Fetched {} message(s): {} stored, {} already present, {} failed",
        summary.listed, summary.stored, summary.duplicates, summary.failed
    );
    Ok(())
}

async fn process(config: &Config) -> CliResult<()> {
    let rules = RuleSet::load(&config.paths.rules)?;
    let repo = open_repository(config).await?;
    let client = gmail_client(config).await?;

    let processor = RuleProcessor::new(
        Arc::new(repo),
        rules,
        Arc::new(GmailActionExecutor::new(client)),
    );
    let summary = processor.run().await?;

    println!(
        "Processed {} record(s): {} matched, {} updated, {} unchanged, {} failed, {} rule errors",
        summary.records,
        summary.matched,
        summary.applied,
        summary.no_changes,
        summary.failed,
        summary.condition_errors
    );
    Ok(())
}

fn check_rules(path: &Path) -> CliResult<()> {
    let rules = RuleSet::load(path)?;

    println!("{}: {} rule(s)", path.display(), rules.len());
    for rule in &rules {
        let actions: Vec<String> = rule
            .actions
            .iter()
            .map(|action| match &action.value {
                Some(value) => format!("{} '{}'", action.kind.as_str(), value),
                None => action.kind.as_str().to_string(),
            })
            .collect();
        println!(
            "  {} ({}, {} condition(s)) -> {}",
            rule.name,
            rule.aggregate.as_str(),
            rule.conditions.len(),
            if actions.is_empty() {
                "no actions".to_string()
            } else {
                actions.join(", ")
            }
        );
    }
    Ok(())
}
