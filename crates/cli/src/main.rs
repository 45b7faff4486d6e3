// rekap: capture student records from free text into a CSV store.
//
// stdout carries results (tables, JSON, exported bytes); stderr carries
// summaries, logs, and error/hint lines.

use std::io::{self, IsTerminal, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use rekap_ai::{check_reachable, oracle_from_config, Extractor, Normalizer, Oracle};
use rekap_cli::exit_codes::*;
use rekap_cli::{Submitter, SubmitStatus};
use rekap_config::ai::{self, AIConfigStatus, AIDiagnostics, ResolvedAIConfig};
use rekap_config::{AIProvider, Settings};
use rekap_core::{MergePolicy, RecordStore, StoreError, ValidationMode};
use rekap_io::CsvStore;
use rekap_recon::Reconciler;

/// Environment variable holding the log filter (e.g. `REKAP_LOG=debug`).
const LOG_ENV: &str = "REKAP_LOG";

#[derive(Parser)]
#[command(name = "rekap")]
#[command(about = "Turn free-text notes about students into rows of a CSV store")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct GlobalArgs {
    /// Store file (default: settings "store.path", then ./data_akademik.csv)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Keep records that carry a name but no valid id
    #[arg(long, global = true)]
    lenient: bool,

    /// How matched rows are overwritten: field_wise or replace
    #[arg(long, global = true, value_name = "POLICY", value_parser = parse_policy)]
    policy: Option<MergePolicy>,

    /// AI provider: none, local (Ollama) or openai
    #[arg(long, global = true, value_parser = parse_provider)]
    provider: Option<AIProvider>,

    /// Model name (default depends on the provider)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Provider base URL
    #[arg(long, global = true, value_name = "URL")]
    endpoint: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract records from text and merge them into the store
    #[command(after_help = "\
Reads TEXT, or stdin when TEXT is omitted or \"-\".

Examples:
  rekap submit \"Putri (NIM 105) mendapat nilai 88 untuk UTS\"
  cat catatan.txt | rekap submit --json")]
    Submit {
        /// Text describing one or more students
        text: Option<String>,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show what would be extracted, without touching the store
    Extract {
        /// Text describing one or more students
        text: Option<String>,

        /// Also print the raw model answer to stderr
        #[arg(long)]
        raw: bool,
    },

    /// List the records in the store
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write the store file unmodified to stdout or a file
    Export {
        /// Output file (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// AI provider configuration
    Ai {
        #[command(subcommand)]
        command: AiCommands,
    },
}

#[derive(Subcommand)]
enum AiCommands {
    /// Check AI configuration and connectivity
    Doctor {
        /// Output as JSON for machine parsing
        #[arg(long)]
        json: bool,

        /// Test provider connectivity (requires network)
        #[arg(long)]
        test: bool,
    },

    /// Store an API key in the system keychain (key is read from stdin)
    SetKey {
        /// Provider the key belongs to
        #[arg(default_value = "openai")]
        provider: String,
    },
}

fn parse_policy(s: &str) -> Result<MergePolicy, String> {
    match s.trim().to_lowercase().replace('-', "_").as_str() {
        "field_wise" | "fieldwise" => Ok(MergePolicy::FieldWise),
        "replace" => Ok(MergePolicy::Replace),
        other => Err(format!("unknown policy \"{}\" (expected field_wise or replace)", other)),
    }
}

fn parse_provider(s: &str) -> Result<AIProvider, String> {
    AIProvider::from_name(s).ok_or_else(|| format!("unknown provider \"{}\" (expected none, local or openai)", s))
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\ntarget:  ", env!("TARGET"),
    )
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    // Fails only if a subscriber is already installed
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .without_time()
        .try_init();
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();
    let ctx = Context::resolve(cli.global);

    let result = match cli.command {
        Commands::Submit { text, json } => cmd_submit(&ctx, text, json),
        Commands::Extract { text, raw } => cmd_extract(&ctx, text, raw),
        Commands::Show { json } => cmd_show(&ctx, json),
        Commands::Export { output } => cmd_export(&ctx, output),
        Commands::Ai { command } => match command {
            AiCommands::Doctor { json, test } => cmd_ai_doctor(&ctx, json, test),
            AiCommands::SetKey { provider } => cmd_ai_set_key(&provider),
        },
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_STORE_IO, msg)
    }

    /// Oracle construction failures, with the fix the user most likely needs.
    pub fn oracle(err: rekap_ai::OracleError, config: &ResolvedAIConfig) -> Self {
        let hint = match &err {
            rekap_ai::OracleError::NotConfigured(_) => {
                Some("set \"ai.provider\" in the settings file or pass --provider local".to_string())
            }
            rekap_ai::OracleError::MissingKey => Some(format!(
                "run `rekap ai set-key {}` or set {}",
                config.provider_name(),
                ai::env_var_name(config.provider_name())
            )),
            rekap_ai::OracleError::NetworkError(_) | rekap_ai::OracleError::Timeout(_) => {
                Some(format!("is the {} server running at {}?", config.provider_name(), config.endpoint))
            }
            _ => None,
        };
        Self { code: oracle_exit_code(&err), message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ============================================================================
// Context (settings + flags)
// ============================================================================

struct Context {
    settings: Settings,
    store_path: PathBuf,
    mode: ValidationMode,
    policy: MergePolicy,
    ai: ResolvedAIConfig,
}

impl Context {
    /// Flags override the settings file.
    fn resolve(global: GlobalArgs) -> Self {
        let settings = Settings::load();

        let store_path = global.store.unwrap_or_else(|| settings.effective_store_path());
        let mode = if global.lenient { ValidationMode::Lenient } else { settings.validation };
        let policy = global.policy.unwrap_or(settings.merge_policy);

        let mut ai_settings = settings.ai.clone();
        if let Some(provider) = global.provider {
            if provider != ai_settings.provider {
                // Model and endpoint in the file belong to the other provider
                ai_settings.model.clear();
                ai_settings.endpoint = None;
            }
            ai_settings.provider = provider;
        }
        if let Some(model) = global.model {
            ai_settings.model = model;
        }
        if let Some(endpoint) = global.endpoint {
            ai_settings.endpoint = Some(endpoint);
        }
        let ai = ResolvedAIConfig::from_settings(&ai_settings);

        log::debug!(
            "store={} mode={} policy={} provider={}",
            store_path.display(),
            mode.as_str(),
            policy.as_str(),
            ai.provider_name()
        );

        Self { settings, store_path, mode, policy, ai }
    }

    fn store(&self) -> CsvStore {
        CsvStore::new(&self.store_path)
    }

    fn extractor(&self) -> Result<Extractor<Box<dyn Oracle>>, CliError> {
        let oracle = oracle_from_config(&self.ai).map_err(|e| CliError::oracle(e, &self.ai))?;
        let normalizer = Normalizer::new(self.mode)
            .with_placeholder_tokens(self.settings.placeholder_tokens.iter().cloned());
        Ok(Extractor::new(oracle, normalizer))
    }
}

/// TEXT argument, or all of stdin for `None` / `-`.
fn read_input(text: Option<String>) -> Result<String, CliError> {
    let text = match text {
        Some(t) if t != "-" => t,
        _ => {
            if io::stdin().is_terminal() {
                return Err(CliError::usage("no text given")
                    .with_hint("pass the text as an argument or pipe it on stdin"));
            }
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| CliError::io(format!("stdin: {}", e)))?;
            buf
        }
    };

    if text.trim().is_empty() {
        return Err(CliError::usage("input text is empty"));
    }
    Ok(text)
}

// ============================================================================
// submit
// ============================================================================

fn cmd_submit(ctx: &Context, text: Option<String>, json: bool) -> Result<(), CliError> {
    let text = read_input(text)?;
    let extractor = ctx.extractor()?;
    let reconciler = Reconciler::new(ctx.store(), ctx.policy);
    let mut submitter = Submitter::new(extractor, reconciler);

    let submission = submitter.submit(&text);

    if json {
        let report = serde_json::to_string_pretty(&submission.to_json())
            .map_err(|e| CliError::new(EXIT_ERROR, e.to_string()))?;
        println!("{}", report);
    }

    if let Some(extraction) = &submission.extraction {
        for warning in &extraction.warnings {
            eprintln!("warning: {}", warning);
        }
    }

    match submission.status {
        SubmitStatus::Success { added, updated } => {
            if !json {
                let outcome = submission.outcome.unwrap_or_default();
                eprintln!(
                    "saved to {}: {} added, {} updated",
                    ctx.store_path.display(),
                    added,
                    updated
                );
                if outcome.unchanged > 0 {
                    eprintln!("  {} updated row(s) already had these values", outcome.unchanged);
                }
                if outcome.skipped > 0 {
                    eprintln!("  {} record(s) without an id were not saved", outcome.skipped);
                }
            }
            Ok(())
        }
        SubmitStatus::NoChange => {
            if !json {
                eprintln!("nothing to save: extracted records carry no id");
            }
            Ok(())
        }
        SubmitStatus::Failure(failure) => {
            let code = submit_exit_code(&failure);
            if json {
                // Report already on stdout
                return Err(CliError::new(code, String::new()));
            }
            let message = failure.to_string();
            let hint = match &failure {
                rekap_cli::SubmitFailure::NothingExtracted { .. } => {
                    Some("mention each student's NIM; use --lenient to keep name-only records".to_string())
                }
                rekap_cli::SubmitFailure::Store(e) if e.is_corrupt() => Some(format!(
                    "{} was left unchanged; fix or move it and retry",
                    ctx.store_path.display()
                )),
                _ => None,
            };
            Err(CliError { code, message, hint })
        }
    }
}

// ============================================================================
// extract (dry run)
// ============================================================================

fn cmd_extract(ctx: &Context, text: Option<String>, raw: bool) -> Result<(), CliError> {
    let text = read_input(text)?;
    let extractor = ctx.extractor()?;

    let extraction = extractor.extract(&text).map_err(|e| {
        CliError::new(extraction_exit_code(&e), format!("extraction failed: {}", e))
    })?;

    if raw {
        eprintln!("{}", extraction.raw);
    }
    for warning in &extraction.warnings {
        eprintln!("warning: {}", warning);
    }

    let out = serde_json::to_string_pretty(&extraction.records)
        .map_err(|e| CliError::new(EXIT_ERROR, e.to_string()))?;
    println!("{}", out);
    eprintln!("{} record(s), {} rejected", extraction.records.len(), extraction.rejected);
    Ok(())
}

// ============================================================================
// show
// ============================================================================

fn cmd_show(ctx: &Context, json: bool) -> Result<(), CliError> {
    let store = ctx.store();
    let table = store.load().map_err(|e| {
        let code = if matches!(e, StoreError::Corrupt { .. }) { EXIT_STORE_CORRUPT } else { EXIT_STORE_IO };
        CliError::new(code, e.to_string())
    })?;

    if json {
        let out = serde_json::json!({
            "store": ctx.store_path.display().to_string(),
            "count": table.len(),
            "records": table.records(),
        });
        let out = serde_json::to_string_pretty(&out).map_err(|e| CliError::new(EXIT_ERROR, e.to_string()))?;
        println!("{}", out);
        return Ok(());
    }

    if !store.exists() {
        eprintln!("{} does not exist yet", ctx.store_path.display());
        return Ok(());
    }

    let headers: Vec<String> = table.headers().iter().map(|h| h.to_string()).collect();
    let rows: Vec<Vec<String>> = table.records().iter().map(|r| table.row_cells(r)).collect();
    print!("{}", render_table(&headers, &rows));
    eprintln!("{} record(s) in {}", table.len(), ctx.store_path.display());
    Ok(())
}

/// Left-aligned plain-text table, columns padded to their widest cell.
fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let line = |cells: &[String]| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{:<width$}", cell, width = *w))
            .collect();
        format!("{}\n", padded.join("  ").trim_end())
    };

    let mut out = line(headers);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&line(&rule));
    for row in rows {
        out.push_str(&line(row));
    }
    out
}

// ============================================================================
// export
// ============================================================================

fn cmd_export(ctx: &Context, output: Option<PathBuf>) -> Result<(), CliError> {
    let bytes = ctx
        .store()
        .export_bytes()
        .map_err(|e| CliError::io(e.to_string()))?
        .ok_or_else(|| {
            CliError::io(format!("{} does not exist", ctx.store_path.display()))
                .with_hint("submit some text first")
        })?;

    match output {
        Some(path) => {
            std::fs::write(&path, &bytes).map_err(|e| CliError::io(format!("{}: {}", path.display(), e)))?;
            eprintln!("exported {} bytes to {}", bytes.len(), path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(&bytes)
                .and_then(|_| stdout.flush())
                .map_err(|e| CliError::io(e.to_string()))?;
        }
    }
    Ok(())
}

// ============================================================================
// ai doctor / ai set-key
// ============================================================================

fn cmd_ai_doctor(ctx: &Context, json: bool, test: bool) -> Result<(), CliError> {
    let diag = AIDiagnostics::from_resolved(&ctx.ai);

    let test_result = if test && ctx.ai.status.is_ready() {
        Some(check_reachable(&ctx.ai))
    } else {
        None
    };

    if json {
        let mut out = diag.to_json();
        out["test"] = match &test_result {
            None => serde_json::Value::from("skipped"),
            Some(Ok(_)) => serde_json::Value::from("ok"),
            Some(Err(e)) => serde_json::Value::from(e.to_string()),
        };
        let out = serde_json::to_string_pretty(&out).map_err(|e| CliError::new(EXIT_ERROR, e.to_string()))?;
        println!("{}", out);
    } else {
        print!("{}", diag);
        match &test_result {
            None => println!("Test:              skipped (use --test)"),
            Some(Ok(message)) => println!("Test:              ok ({})", message),
            Some(Err(e)) => println!("Test:              failed ({})", e),
        }

        // Actionable fix suggestions
        match ctx.ai.status {
            AIConfigStatus::Disabled => {
                println!();
                println!("AI is disabled. To enable:");
                println!("  Set \"ai.provider\" in {}", Settings::config_path().display());
            }
            AIConfigStatus::MissingKey => {
                println!();
                println!(
                    "Fix: run `rekap ai set-key {}` or set {}",
                    ctx.ai.provider_name(),
                    ai::env_var_name(ctx.ai.provider_name())
                );
            }
            AIConfigStatus::Ready => {}
        }
    }

    match (ctx.ai.status, test_result) {
        (AIConfigStatus::Disabled, _) => Err(CliError::new(EXIT_AI_DISABLED, "AI is disabled")),
        (AIConfigStatus::MissingKey, _) => Err(CliError::new(EXIT_AI_MISSING_KEY, "AI misconfigured: missing API key")),
        (AIConfigStatus::Ready, Some(Err(e))) => Err(CliError::oracle(e, &ctx.ai)),
        (AIConfigStatus::Ready, _) => Ok(()),
    }
}

fn cmd_ai_set_key(provider: &str) -> Result<(), CliError> {
    let provider = AIProvider::from_name(provider)
        .filter(|p| p.needs_api_key())
        .ok_or_else(|| CliError::usage(format!("provider \"{}\" does not use an API key", provider)))?;

    let mut key = String::new();
    io::stdin()
        .read_line(&mut key)
        .map_err(|e| CliError::io(format!("stdin: {}", e)))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(CliError::usage("no key on stdin"));
    }

    ai::set_api_key(provider.name(), key).map_err(|e| {
        CliError::new(EXIT_AI_KEYCHAIN_ERR, format!("keychain: {}", e))
            .with_hint(format!("set {} instead", ai::env_var_name(provider.name())))
    })?;
    eprintln!("stored {} key in the system keychain", provider.name());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rekap_core::format_score;

    #[test]
    fn test_parse_policy() {
        assert_eq!(parse_policy("field_wise").unwrap(), MergePolicy::FieldWise);
        assert_eq!(parse_policy("Field-Wise").unwrap(), MergePolicy::FieldWise);
        assert_eq!(parse_policy("replace").unwrap(), MergePolicy::Replace);
        assert!(parse_policy("merge").is_err());
    }

    #[test]
    fn test_parse_provider() {
        assert_eq!(parse_provider("ollama").unwrap(), AIProvider::Local);
        assert_eq!(parse_provider("none").unwrap(), AIProvider::None);
        assert!(parse_provider("anthropic").is_err());
    }

    #[test]
    fn test_render_table() {
        let headers = vec!["id".to_string(), "name".to_string(), "score".to_string()];
        let rows = vec![
            vec!["105".to_string(), "Putri".to_string(), format_score(88.0)],
            vec!["7".to_string(), String::new(), format_score(92.5)],
        ];
        assert_eq!(
            render_table(&headers, &rows),
            "id   name   score\n---  -----  -----\n105  Putri  88\n7           92.5\n"
        );
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
