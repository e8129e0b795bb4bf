use std::process::ExitCode;

use clap::Parser;
use miette::IntoDiagnostic;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use docmeta_query::app::{App, QueryResult};
use docmeta_query::config::{ConfigLoader, ToolParameters};
use docmeta_query::error::DocmetaError;
use docmeta_query::knowledge::KnowledgeHttpClient;
use docmeta_query::output::{JsonOutput, OutputMode, StderrProgress};

#[derive(Parser)]
#[command(name = "docmeta-query")]
#[command(about = "Query document metadata across knowledge-base datasets by document name")]
#[command(version, author)]
struct Cli {
    /// JSON object with the tool parameters; `-` reads it from stdin
    #[arg(long)]
    params: Option<String>,

    /// Dataset ids: JSON array or comma-separated list
    #[arg(long)]
    dataset_list: Option<String>,

    #[arg(long, env = "KB_API_KEY", hide_env_values = true)]
    kb_api_key: Option<String>,

    /// Defaults to http://127.0.0.1:5001
    #[arg(long)]
    kb_base_url: Option<String>,

    /// Document-name keyword(s): JSON array, comma-separated list, or a single keyword
    #[arg(long)]
    document_name: Option<String>,

    /// Field names (`a,b` or `["a","b"]`) or required values (`a=1;b=2` or `{"a":"1"}`)
    #[arg(long)]
    metadata_filter: Option<String>,

    /// Print the result as JSON instead of a summary
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn overrides(&self) -> ToolParameters {
        let text = |value: &Option<String>| value.clone().map(Value::String);
        ToolParameters {
            dataset_list: text(&self.dataset_list),
            kb_api_key: text(&self.kb_api_key),
            kb_base_url: text(&self.kb_base_url),
            document_name: text(&self.document_name),
            metadata_filter: text(&self.metadata_filter),
        }
    }
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<DocmetaError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &DocmetaError) -> u8 {
    match error {
        DocmetaError::NoDocuments {
            all_failed: true, ..
        } => 3,
        DocmetaError::NoDocuments { .. } => 2,
        error if error.is_upstream() => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Summary
    };

    let params = ConfigLoader::load(cli.params.as_deref())?.merge(cli.overrides());
    let resolved = ConfigLoader::resolve_parameters(params)?;
    tracing::debug!(?resolved, "parameters resolved");

    let client = KnowledgeHttpClient::new(resolved.base_url.clone(), &resolved.api_key)?;
    let app = App::new(client);
    let attempted = resolved.request.datasets.len() * resolved.request.keywords.len();

    match output_mode {
        OutputMode::Json => {
            let result = app
                .query(&resolved.request, &JsonOutput)
                .require_documents(attempted)?;
            JsonOutput::print_query(&result).into_diagnostic()?;
        }
        OutputMode::Summary => {
            let result = app
                .query(&resolved.request, &StderrProgress)
                .require_documents(attempted)?;
            print_query_summary(&result);
        }
    }
    Ok(())
}

fn print_query_summary(result: &QueryResult) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    println!("{cyan}docmeta-query summary{reset}");
    println!("{green}Documents: {}{reset}", result.documents.len());
    println!("{yellow}Errors: {}{reset}", result.errors.len());

    for entry in &result.documents {
        println!(
            "{cyan}- {} [{}] in {}{reset}",
            entry.document_name, entry.document_id, entry.dataset_id
        );
        for field in &entry.metadata {
            println!("    {} = {}", field.name, field.value_text());
        }
    }

    for error in &result.errors {
        println!("{yellow}! {error}{reset}");
    }
}
