mod exit_codes;

use anyhow::Result;
use clap::Parser;
use exit_codes::{EXIT_ERROR, EXIT_STORE_ERRORS, EXIT_SUCCESS};
use kvload::{
    init_tracing_once, EventLog, FileEventLog, LoadSummary, Loader, MemoryStore, SourceOptions,
    StderrEventLog, StoreOptions, DEFAULT_DB, DEFAULT_HOST, DEFAULT_PORT,
};
use std::path::PathBuf;
use std::process::ExitCode;

/// Load a CSV file into Redis, rejecting rows whose key field value was already loaded.
///
/// Each accepted row becomes a hash named `<keyset><row number>`; key values are
/// claimed in a Redis set named after the key field. Duplicates and store errors
/// are appended to the output log.
#[derive(Parser, Debug)]
#[command(name = "kvload", version)]
#[command(override_usage = "kvload -i <input-csv-file> -o <output-file> -k <key-set> -f <key-fieldname> [OPTIONS]")]
struct Cli {
    /// Input CSV file (`.zst` compressed input is decoded transparently)
    #[arg(short = 'i', long = "ifile", value_name = "PATH")]
    ifile: PathBuf,

    /// Log file for rejected duplicates and errors (appended)
    #[arg(short = 'o', long = "ofile", value_name = "PATH")]
    ofile: PathBuf,

    /// Column whose values must be unique
    #[arg(short = 'f', long = "keyfield", value_name = "NAME")]
    keyfield: String,

    /// Prefix of each row's hash key
    #[arg(short = 'k', long = "keyset", value_name = "PREFIX")]
    keyset: String,

    /// Redis host
    #[arg(long, env = "REDIS_HOST", default_value = DEFAULT_HOST)]
    host: String,

    /// Redis port
    #[arg(long, env = "REDIS_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Redis database index
    #[arg(long, env = "REDIS_DB", default_value_t = DEFAULT_DB)]
    db: i64,

    /// Redis password
    #[arg(long, env = "REDIS_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Field delimiter (single ASCII character, `\t` for tab)
    #[arg(long, default_value = ",", value_parser = parse_ascii_byte)]
    delimiter: u8,

    /// Quote character
    #[arg(long, default_value = "\"", value_parser = parse_ascii_byte)]
    quote: u8,

    /// Escape character, honoured inside and outside quoted fields
    #[arg(long, default_value = "\\", value_parser = parse_ascii_byte)]
    escape: u8,

    /// Treat backslashes literally
    #[arg(long, conflicts_with = "escape")]
    no_escape: bool,

    /// Flush container writes every N accepted rows instead of once at the end
    #[arg(long, value_name = "N")]
    flush_every: Option<usize>,

    /// Wrap each write batch in MULTI/EXEC
    #[arg(long)]
    transactional: bool,

    /// Run against an in-memory store; nothing is written to Redis
    #[arg(long)]
    dry_run: bool,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    summary_json: bool,
}

fn parse_ascii_byte(s: &str) -> Result<u8, String> {
    if s == "\\t" {
        return Ok(b'\t');
    }
    match s.as_bytes() {
        [b] if b.is_ascii() => Ok(*b),
        _ => Err(format!("expected a single ASCII character, got `{s}`")),
    }
}

fn report(summary: &LoadSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(summary)?);
    } else {
        println!(
            "rows: {}  accepted: {}  rejected: {}  claim errors: {}  written: {}  write errors: {}",
            summary.rows_seen, summary.accepted, summary.rejected,
            summary.claim_errors, summary.written, summary.write_errors
        );
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing_once();

    let log: Box<dyn EventLog> = match FileEventLog::open(&cli.ofile) {
        Ok(l) => Box::new(l),
        Err(e) => {
            tracing::warn!("cannot open log file {}: {}; logging to stderr", cli.ofile.display(), e);
            Box::new(StderrEventLog)
        }
    };

    let escape = if cli.no_escape { None } else { Some(cli.escape) };
    let loader = Loader::new()
        .input(&cli.ifile)
        .key_field(&cli.keyfield)
        .keyset_prefix(&cli.keyset)
        .store(
            StoreOptions::default()
                .with_host(&cli.host)
                .with_port(cli.port)
                .with_db(cli.db)
                .with_password(cli.password.clone()),
        )
        .source(
            SourceOptions::default()
                .with_delimiter(cli.delimiter)
                .with_quote(cli.quote)
                .with_escape(escape),
        )
        .flush_every(cli.flush_every)
        .transactional(cli.transactional)
        .progress(!cli.no_progress);

    let result = if cli.dry_run {
        let mut store = MemoryStore::new();
        loader.run_with(&mut store, &*log)
    } else {
        loader.run(&*log)
    };

    match result {
        Ok(summary) => {
            if let Err(e) = report(&summary, cli.summary_json) {
                eprintln!("ERROR: {e:#}");
            }
            if summary.has_store_errors() {
                ExitCode::from(EXIT_STORE_ERRORS)
            } else {
                ExitCode::from(EXIT_SUCCESS)
            }
        }
        Err(e) => {
            eprintln!("ERROR: {e:#}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}
