//! stratumctl - operator front end for the stratum configuration store.
//!
//! Loads the persisted store (JSON), applies one operation, and writes
//! the store back when the operation mutated it. stdout carries command
//! payloads; all log output goes to stderr.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use stratum_config::resolve::ValueSource;
use stratum_config::schema::ConfigSchema;
use stratum_config::store::{ConfigStore, StoreValues};
use stratum_config::subsys::SubSys;
use stratum_config::write_config_to;

/// stratumctl - hierarchical, multi-target configuration management
#[derive(Parser)]
#[command(name = "stratumctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Path to the persisted configuration
    #[arg(
        long,
        global = true,
        env = "STRATUM_CONFIG_FILE",
        default_value = "stratum-config.json"
    )]
    config: PathBuf,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a directive: subsystem[:target] key=value ...
    Set(SetArgs),

    /// Remove a sub-system target, restoring its defaults
    Del(DelArgs),

    /// Apply directives in bulk, one per line, from a file or stdin
    Import(ImportArgs),

    /// Print the configuration matching subsystem[:target]
    Get(GetArgs),

    /// Print the whole configuration as directive text
    Export(ExportArgs),

    /// Check stored keys and environment variables against the schema
    Validate,

    /// Show the effective value of one parameter and which layer won
    Resolve(ResolveArgs),

    /// List the configured targets of a sub-system
    Targets(TargetsArgs),
}

#[derive(Args, Debug)]
struct SetArgs {
    /// The directive, e.g. `notify_webhook:primary endpoint=http://h/ auth_token="t k"`
    #[arg(required = true, trailing_var_arg = true)]
    directive: Vec<String>,
}

#[derive(Args, Debug)]
struct DelArgs {
    /// `subsystem` or `subsystem:target`
    #[arg(required_unless_present = "from")]
    query: Option<String>,

    /// Delete the targets named in a file, one query per line
    #[arg(long, conflicts_with = "query")]
    from: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ImportArgs {
    /// Directive file; reads stdin when omitted
    file: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct GetArgs {
    /// `subsystem` or `subsystem:target`; a unique prefix is accepted
    query: String,
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// Mask sensitive values and drop the credentials sub-system
    #[arg(long)]
    redact: bool,
}

#[derive(Args, Debug)]
struct ResolveArgs {
    /// `subsystem` or `subsystem:target`
    query: String,

    /// Parameter name, e.g. `claim_name`
    param: String,
}

#[derive(Args, Debug)]
struct TargetsArgs {
    /// Sub-system name
    subsys: SubSys,
}

/// Exit codes, stable for automation.
///
/// 0 success, 10-19 user/input errors, 20-29 internal errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
enum ExitCode {
    Clean = 0,
    InvalidInput = 10,
    Io = 20,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.global.quiet {
        "error"
    } else {
        match cli.global.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("stratum={}", default_level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let exit_code = match cli.command {
        Commands::Set(args) => run_set(&cli.global, &args),
        Commands::Del(args) => run_del(&cli.global, &args),
        Commands::Import(args) => run_import(&cli.global, &args),
        Commands::Get(args) => run_get(&cli.global, &args),
        Commands::Export(args) => run_export(&cli.global, &args),
        Commands::Validate => run_validate(&cli.global),
        Commands::Resolve(args) => run_resolve(&cli.global, &args),
        Commands::Targets(args) => run_targets(&cli.global, &args),
    };

    std::process::exit(exit_code as i32);
}

/// Loads the store from disk, running it through a schema merge so
/// values persisted by older releases migrate on read. A missing file
/// yields a fresh store.
fn load_store(path: &Path) -> Result<ConfigStore, ExitCode> {
    let schema = ConfigSchema::builtin();
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no persisted configuration, starting fresh");
        return Ok(ConfigStore::new(schema));
    }
    let file = File::open(path).map_err(|err| {
        tracing::error!(path = %path.display(), %err, "cannot open configuration");
        ExitCode::Io
    })?;
    let values: StoreValues = serde_json::from_reader(BufReader::new(file)).map_err(|err| {
        tracing::error!(path = %path.display(), %err, "cannot parse configuration");
        ExitCode::Io
    })?;
    Ok(ConfigStore::from_values(schema, values).merge())
}

fn save_store(path: &Path, store: &ConfigStore) -> Result<(), ExitCode> {
    let file = File::create(path).map_err(|err| {
        tracing::error!(path = %path.display(), %err, "cannot write configuration");
        ExitCode::Io
    })?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, store).map_err(|err| {
        tracing::error!(path = %path.display(), %err, "cannot serialize configuration");
        ExitCode::Io
    })?;
    writer.flush().map_err(|err| {
        tracing::error!(path = %path.display(), %err, "cannot flush configuration");
        ExitCode::Io
    })?;
    Ok(())
}

fn run_set(global: &GlobalOpts, args: &SetArgs) -> ExitCode {
    let mut store = match load_store(&global.config) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let directive = args.directive.join(" ");
    let dynamic = match store.set_kvs(&directive) {
        Ok(dynamic) => dynamic,
        Err(err) => {
            tracing::error!(%err, "set failed");
            return ExitCode::InvalidInput;
        }
    };
    if let Err(code) = save_store(&global.config, &store) {
        return code;
    }
    if !dynamic {
        tracing::warn!("this change takes effect after a server restart");
    }
    ExitCode::Clean
}

fn run_del(global: &GlobalOpts, args: &DelArgs) -> ExitCode {
    let mut store = match load_store(&global.config) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let result = match (&args.query, &args.from) {
        (Some(query), _) => store.del_kvs(query),
        (None, Some(path)) => match File::open(path) {
            Ok(file) => store.del_from(BufReader::new(file)),
            Err(err) => {
                tracing::error!(path = %path.display(), %err, "cannot open delete list");
                return ExitCode::Io;
            }
        },
        // clap guarantees one of the two is present.
        (None, None) => unreachable!(),
    };
    if let Err(err) = result {
        tracing::error!(%err, "del failed");
        return ExitCode::InvalidInput;
    }
    if let Err(code) = save_store(&global.config, &store) {
        return code;
    }
    ExitCode::Clean
}

fn run_import(global: &GlobalOpts, args: &ImportArgs) -> ExitCode {
    let mut store = match load_store(&global.config) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let dyn_only = match &args.file {
        Some(path) => match File::open(path) {
            Ok(file) => store.read_config(BufReader::new(file)),
            Err(err) => {
                tracing::error!(path = %path.display(), %err, "cannot open directive file");
                return ExitCode::Io;
            }
        },
        None => store.read_config(io::stdin().lock()),
    };
    let dyn_only = match dyn_only {
        Ok(dyn_only) => dyn_only,
        Err(err) => {
            tracing::error!(%err, "import failed");
            return ExitCode::InvalidInput;
        }
    };
    if let Err(code) = save_store(&global.config, &store) {
        return code;
    }
    if !dyn_only {
        tracing::warn!("some imported changes take effect after a server restart");
    }
    ExitCode::Clean
}

fn run_get(global: &GlobalOpts, args: &GetArgs) -> ExitCode {
    let store = match load_store(&global.config) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let mut out = Vec::new();
    if let Err(err) = write_config_to(&store, &args.query, &mut out) {
        tracing::error!(%err, "get failed");
        return ExitCode::InvalidInput;
    }
    print_directives(&out)
}

fn run_export(global: &GlobalOpts, args: &ExportArgs) -> ExitCode {
    let store = match load_store(&global.config) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let store = if args.redact {
        store.redact_sensitive_info()
    } else {
        store
    };
    let mut out = Vec::new();
    for entry in store.schema().listing_order() {
        // Redaction drops whole sub-systems; don't resurrect their
        // defaults in the export.
        if args.redact && !store.values().contains_key(&entry.key) {
            continue;
        }
        if let Err(err) = write_config_to(&store, &entry.key, &mut out) {
            tracing::error!(%err, subsys = %entry.key, "export failed");
            return ExitCode::InvalidInput;
        }
        if !out.ends_with(b"\n") {
            out.push(b'\n');
        }
    }
    print_directives(&out)
}

fn run_validate(global: &GlobalOpts) -> ExitCode {
    let store = match load_store(&global.config) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let mut failures = 0usize;
    for &subsys in SubSys::ALL {
        if let Err(err) = store.check_valid_keys(subsys, &[]) {
            failures += 1;
            eprintln!("{}: {}", subsys, err);
        }
    }
    if failures > 0 {
        tracing::error!(failures, "configuration is invalid");
        return ExitCode::InvalidInput;
    }
    println!("configuration is valid");
    ExitCode::Clean
}

fn run_resolve(global: &GlobalOpts, args: &ResolveArgs) -> ExitCode {
    let store = match load_store(&global.config) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let (name, target) = match args.query.split_once(':') {
        Some((name, target)) => (name, target),
        None => (args.query.as_str(), ""),
    };
    let subsys = match name.parse::<SubSys>() {
        Ok(s) => s,
        Err(err) => {
            tracing::error!(%err, "resolve failed");
            return ExitCode::InvalidInput;
        }
    };
    let (value, source) = store.resolve_config_param(subsys, target, &args.param);
    if source == ValueSource::Absent {
        tracing::error!(
            subsys = %subsys,
            param = %args.param,
            "parameter is not resolvable"
        );
        return ExitCode::InvalidInput;
    }
    println!(
        "{}",
        serde_json::json!({
            "subsystem": subsys.as_str(),
            "target": if target.is_empty() { "_" } else { target },
            "param": args.param,
            "value": value,
            "source": source,
        })
    );
    ExitCode::Clean
}

fn run_targets(global: &GlobalOpts, args: &TargetsArgs) -> ExitCode {
    let store = match load_store(&global.config) {
        Ok(s) => s,
        Err(code) => return code,
    };
    for target in store.get_available_targets(args.subsys) {
        println!("{}", target);
    }
    ExitCode::Clean
}

fn print_directives(out: &[u8]) -> ExitCode {
    let mut stdout = io::stdout().lock();
    if stdout.write_all(out).is_err() || (!out.ends_with(b"\n") && stdout.write_all(b"\n").is_err())
    {
        return ExitCode::Io;
    }
    ExitCode::Clean
}
