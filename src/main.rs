use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use loadplan::config::{CliConfig, CompilerConfig, DialectName};
use loadplan::load_plan::LoadPlanDefinition;
use loadplan::mapping_catalog::MappingCatalog;
use loadplan::sql_render::{compile, CompiledLoadQuery};

/// Loadplan - compile ORM load plans into SQL
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a load plan and print the SQL with its readers
    Explain(ExplainArgs),
    /// Load a mapping file and report what it declares
    Check(CheckArgs),
}

#[derive(Args)]
struct CommonArgs {
    /// YAML configuration file (overrides LOADPLAN_* environment variables)
    #[arg(long)]
    config: Option<PathBuf>,

    /// SQL dialect: ansi or oracle
    #[arg(long)]
    dialect: Option<DialectName>,

    /// Default log filter when RUST_LOG is not set
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Args)]
struct ExplainArgs {
    /// Mapping file describing entities and collections
    #[arg(long)]
    mappings: PathBuf,

    /// Load plan definition
    #[arg(long)]
    plan: PathBuf,

    /// Enable a filter by name (repeatable)
    #[arg(long = "filter")]
    filters: Vec<String>,

    /// Number of root keys bound as parameters
    #[arg(long)]
    batch_size: Option<usize>,

    /// Also read non-join fetches whose tables were joined
    #[arg(long)]
    all_fetches: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct CheckArgs {
    /// Mapping file describing entities and collections
    #[arg(long)]
    mappings: PathBuf,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Environment, then the config file, then command line flags.
fn load_config(
    common: &CommonArgs,
    filters: Vec<String>,
    batch_size: Option<usize>,
    all_fetches: bool,
) -> anyhow::Result<CompilerConfig> {
    let mut config = CompilerConfig::from_env().context("invalid LOADPLAN_* environment")?;
    if let Some(path) = &common.config {
        config
            .apply_yaml_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?;
    }

    let cli_config = CliConfig {
        dialect: common.dialect.unwrap_or(config.dialect),
        enabled_filters: filters,
        batch_size: batch_size.unwrap_or(config.batch_size),
        all_fetches: all_fetches || !config.joined_fetches_only,
        log_level: common.log_level.clone().unwrap_or_else(|| config.log_level.clone()),
    };
    config.merge(CompilerConfig::from_cli(cli_config).context("invalid command line options")?);
    Ok(config)
}

fn init_logging(config: &CompilerConfig) {
    // RUST_LOG wins over the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.log_level),
    )
    .init();
}

fn explain(args: ExplainArgs) -> anyhow::Result<()> {
    let config = load_config(&args.common, args.filters, args.batch_size, args.all_fetches)?;
    init_logging(&config);
    log::debug!("Compiler configuration: {:?}", config);

    let dialect = config.dialect();
    let catalog = MappingCatalog::from_yaml_file(&args.mappings, dialect.clone())
        .with_context(|| format!("failed to load mappings {}", args.mappings.display()))?;
    let plan = LoadPlanDefinition::from_yaml_file(&args.plan)
        .and_then(|definition| definition.build(&catalog))
        .with_context(|| format!("failed to build load plan {}", args.plan.display()))?;

    let compiled = compile(&plan, &config.query_building_parameters(), dialect.as_ref())
        .context("load plan compilation failed")?;

    match args.format {
        OutputFormat::Text => print!("{}", render_text(&compiled, &config)),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&compiled).context("failed to serialize compiled query")?
        ),
    }
    Ok(())
}

fn render_text(compiled: &CompiledLoadQuery, config: &CompilerConfig) -> String {
    let mut out = format!("-- dialect: {}\n{}\n", config.dialect, compiled.sql);
    out.push_str("\nreturns:\n");
    for reader in &compiled.returns {
        out.push_str(&format!("  {reader}\n"));
    }
    if !compiled.readers.is_empty() {
        out.push_str("readers:\n");
        for reader in &compiled.readers {
            out.push_str(&format!("  {reader}\n"));
        }
    }
    if !compiled.joined_collection_roles.is_empty() {
        out.push_str(&format!(
            "joined collections: {}\n",
            compiled.joined_collection_roles.join(", ")
        ));
    }
    if compiled.has_deferred_subselect_fetch {
        out.push_str("deferred subselect fetches: yes\n");
    }
    out
}

fn check(args: CheckArgs) -> anyhow::Result<()> {
    let config = load_config(&args.common, Vec::new(), None, false)?;
    init_logging(&config);

    let catalog = MappingCatalog::from_yaml_file(&args.mappings, config.dialect())
        .with_context(|| format!("failed to load mappings {}", args.mappings.display()))?;
    println!("entities:");
    for name in catalog.entity_names() {
        println!("  {name}");
    }
    println!("collections:");
    for role in catalog.collection_roles() {
        println!("  {role}");
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Explain(args) => explain(args),
        Command::Check(args) => check(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
