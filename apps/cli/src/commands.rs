//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use licensegraph_core::{LicenseCatalog, ProgressReporter, read_license_data, write_license_data};
use licensegraph_ingest::{CatalogSource, FetchOptions};
use licensegraph_shared::{
    AppConfig, ComparisonMode, GenerationConfig, LicenseData, Product, RelationEdge, init_config,
    load_config,
};
use tracing::info;
use url::Url;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// LicenseGraph: find Microsoft 365 licenses made redundant by others.
#[derive(Parser)]
#[command(
    name = "licensegraph",
    version,
    about = "Build and query the supersedence graph of Microsoft 365 license products.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Entitlement comparison mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum ModeArg {
    Direct,
    Transitive,
}

impl From<ModeArg> for ComparisonMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Direct => ComparisonMode::Direct,
            ModeArg::Transitive => ComparisonMode::Transitive,
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Download (or read) the catalog and write the supersedence JSON.
    Generate {
        /// Read this CSV instead of downloading.
        #[arg(long)]
        local_csv: Option<PathBuf>,

        /// Catalog CSV URL (defaults to the configured source).
        #[arg(long)]
        url: Option<String>,

        /// Output JSON path (defaults to the configured output).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Compare raw or alias-expanded entitlements.
        #[arg(short, long)]
        mode: Option<ModeArg>,
    },

    /// Show one product by guid or string id.
    Show {
        /// Product guid or string id (e.g. SPE_E3).
        product: String,

        #[command(flatten)]
        data: DataArg,
    },

    /// List redundant licenses among a set of held products.
    Overlaps {
        /// Guids of the held products.
        #[arg(required = true)]
        guids: Vec<String>,

        #[command(flatten)]
        data: DataArg,
    },

    /// List every supersedence relation.
    Relations {
        #[command(flatten)]
        data: DataArg,
    },

    /// Compare the service plans of two products.
    Compare {
        guid1: String,
        guid2: String,

        #[command(flatten)]
        data: DataArg,
    },

    /// Search products by display name or string id.
    Search {
        term: String,

        #[command(flatten)]
        data: DataArg,
    },

    /// Show which products include a service plan.
    Plan {
        /// Service plan id.
        id: String,

        #[command(flatten)]
        data: DataArg,
    },

    /// List products whose base-license plan was filtered.
    SelfRefs {
        #[command(flatten)]
        data: DataArg,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Location of a generated JSON file.
#[derive(clap::Args)]
pub(crate) struct DataArg {
    /// Generated JSON (defaults to the configured output).
    #[arg(long)]
    pub data: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "licensegraph=info",
        1 => "licensegraph=debug",
        _ => "licensegraph=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Generate {
            local_csv,
            url,
            output,
            mode,
        } => cmd_generate(local_csv, url.as_deref(), output, mode).await,
        Command::Show { product, data } => cmd_show(&product, &data),
        Command::Overlaps { guids, data } => cmd_overlaps(&guids, &data),
        Command::Relations { data } => cmd_relations(&data),
        Command::Compare { guid1, guid2, data } => cmd_compare(&guid1, &guid2, &data),
        Command::Search { term, data } => cmd_search(&term, &data),
        Command::Plan { id, data } => cmd_plan(&id, &data),
        Command::SelfRefs { data } => cmd_self_refs(&data),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// generate
// ---------------------------------------------------------------------------

async fn cmd_generate(
    local_csv: Option<PathBuf>,
    url: Option<&str>,
    output: Option<PathBuf>,
    mode: Option<ModeArg>,
) -> Result<()> {
    let config = load_config()?;
    let source = resolve_source(&config, local_csv, url)?;
    let output = output.unwrap_or_else(|| PathBuf::from(&config.generation.output));

    let mut generation = GenerationConfig::from(&config);
    generation.source_url = source.describe();
    if let Some(mode) = mode {
        generation.mode = mode.into();
    }

    info!(
        source = %generation.source_url,
        mode = %generation.mode,
        output = %output.display(),
        "generating license data"
    );

    let reporter = CliProgress::new()?;
    reporter.phase("Loading catalog");

    let fetch = FetchOptions {
        timeout_secs: config.source.timeout_secs,
    };
    let rows = match licensegraph_ingest::load_rows(&source, &fetch).await {
        Ok(rows) => rows,
        Err(e) => {
            reporter.abandon();
            return Err(e.into());
        }
    };

    let data = match licensegraph_core::generate(&rows, &generation, &reporter) {
        Ok(data) => data,
        Err(e) => {
            reporter.abandon();
            return Err(e.into());
        }
    };
    let receipt = write_license_data(&output, &data)?;

    println!();
    println!("  License data generated!");
    println!("  Products:       {}", data.metadata.total_products);
    println!(
        "  Relationships:  {}",
        data.metadata.total_supersedence_relationships
    );
    println!("  Self-ref plans: {}", data.metadata.self_referencing_count);
    println!("  Mode:           {}", data.metadata.comparison_mode);
    println!("  Output:         {}", receipt.path.display());
    println!("  SHA-256:        {}", receipt.sha256);
    println!();

    Ok(())
}

/// CLI flags override the config file.
fn resolve_source(
    config: &AppConfig,
    local_csv: Option<PathBuf>,
    url: Option<&str>,
) -> Result<CatalogSource> {
    if let Some(path) = local_csv {
        return Ok(CatalogSource::Local(path));
    }
    if let Some(url) = url {
        let parsed = Url::parse(url).map_err(|e| eyre!("invalid URL '{url}': {e}"))?;
        return Ok(CatalogSource::Remote(parsed));
    }
    if let Some(path) = &config.source.local_csv {
        return Ok(CatalogSource::Local(PathBuf::from(path)));
    }
    let parsed = Url::parse(&config.source.url)
        .map_err(|e| eyre!("invalid source URL '{}': {e}", config.source.url))?;
    Ok(CatalogSource::Remote(parsed))
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Result<Self> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")?
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Ok(Self { spinner })
    }

    fn abandon(&self) {
        self.spinner.abandon_with_message("generation failed");
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, _data: &LicenseData) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Load the generated JSON named by `--data` or the configured output.
fn load_data(arg: &DataArg) -> Result<LicenseData> {
    let path = match &arg.data {
        Some(path) => path.clone(),
        None => PathBuf::from(load_config()?.generation.output),
    };
    if !path.exists() {
        return Err(eyre!(
            "no license data at '{}'; run `licensegraph generate` first",
            path.display()
        ));
    }
    Ok(read_license_data(&path)?)
}

fn cmd_show(key: &str, arg: &DataArg) -> Result<()> {
    let data = load_data(arg)?;
    let catalog = LicenseCatalog::new(&data);
    let product = catalog
        .resolve(key)
        .ok_or_else(|| eyre!("no product with guid or string id '{key}'"))?;
    println!("{}", serde_json::to_string_pretty(product)?);
    Ok(())
}

fn cmd_overlaps(guids: &[String], arg: &DataArg) -> Result<()> {
    let data = load_data(arg)?;
    let catalog = LicenseCatalog::new(&data);

    for guid in guids {
        if catalog.get_product_by_guid(guid).is_none() {
            tracing::warn!(%guid, "unknown product guid, ignoring");
        }
    }

    let edges = catalog.find_overlaps_for_holdings(guids);
    if edges.is_empty() {
        println!("No redundant licenses among {} held products.", guids.len());
        return Ok(());
    }

    println!("{} redundant license(s):", edges.len());
    print_edges(&edges);
    Ok(())
}

fn cmd_relations(arg: &DataArg) -> Result<()> {
    let data = load_data(arg)?;
    let edges = LicenseCatalog::new(&data).relation_edges();
    print_edges(&edges);
    println!();
    println!("{} relation(s)", edges.len());
    Ok(())
}

fn cmd_compare(guid1: &str, guid2: &str, arg: &DataArg) -> Result<()> {
    let data = load_data(arg)?;
    let cmp = LicenseCatalog::new(&data)
        .compare_products(guid1, guid2)
        .ok_or_else(|| eyre!("one or both product guids not found"))?;

    println!();
    println!(
        "  {} ({}): {} plans",
        cmp.first.product.display_name, cmp.first.product.string_id, cmp.first.total_plans
    );
    println!(
        "  {} ({}): {} plans",
        cmp.second.product.display_name, cmp.second.product.string_id, cmp.second.total_plans
    );
    println!("  Common:         {}", cmp.common_plans);
    println!("  Only in first:  {}", cmp.only_in_first);
    println!("  Only in second: {}", cmp.only_in_second);
    println!(
        "  Overlap:        {}% of first, {}% of second",
        cmp.overlap_percentage_first, cmp.overlap_percentage_second
    );
    println!();
    Ok(())
}

fn cmd_search(term: &str, arg: &DataArg) -> Result<()> {
    let data = load_data(arg)?;
    let hits = LicenseCatalog::new(&data).search_products(term);
    if hits.is_empty() {
        println!("No products match '{term}'.");
        return Ok(());
    }
    for product in hits {
        print_product_line(product);
    }
    Ok(())
}

fn cmd_plan(id: &str, arg: &DataArg) -> Result<()> {
    let data = load_data(arg)?;
    let catalog = LicenseCatalog::new(&data);
    let index = catalog.service_plan_index();
    let usage = index
        .get(id)
        .ok_or_else(|| eyre!("no product includes service plan '{id}'"))?;

    println!(
        "{} ({}) is included in {} product(s):",
        usage.plan.name,
        usage.plan.friendly_name,
        usage.products.len()
    );
    for product in usage
        .products
        .iter()
        .filter_map(|guid| catalog.get_product_by_guid(guid))
    {
        print_product_line(product);
    }
    Ok(())
}

fn cmd_self_refs(arg: &DataArg) -> Result<()> {
    let data = load_data(arg)?;
    let plans = LicenseCatalog::new(&data).self_referencing_plans();
    for plan in plans {
        println!(
            "  {:<36}  {:<28}  {}",
            plan.product_guid, plan.string_id, plan.service_plan_id
        );
    }
    println!();
    println!("{} product(s) with a filtered base-license plan", plans.len());
    Ok(())
}

fn print_edges(edges: &[RelationEdge]) {
    for edge in edges {
        println!(
            "  {} ({}) is superseded by {} ({})",
            edge.subset.display_name,
            edge.subset.string_id,
            edge.superset.display_name,
            edge.superset.string_id
        );
    }
}

fn print_product_line(product: &Product) {
    println!(
        "  {:<36}  {:<28}  {} [{} plans]",
        product.guid,
        product.string_id,
        product.display_name,
        product.included_service_plans.len()
    );
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_generate_flags() {
        let cli = Cli::try_parse_from([
            "licensegraph",
            "-vv",
            "generate",
            "--local-csv",
            "catalog.csv",
            "--mode",
            "direct",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Generate {
                local_csv, mode, ..
            } => {
                assert_eq!(local_csv, Some(PathBuf::from("catalog.csv")));
                assert_eq!(mode, Some(ModeArg::Direct));
            }
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn overlaps_requires_guids() {
        assert!(Cli::try_parse_from(["licensegraph", "overlaps"]).is_err());
        assert!(
            Cli::try_parse_from(["licensegraph", "overlaps", "a", "b", "--data", "x.json"]).is_ok()
        );
    }

    #[test]
    fn flags_override_configured_source() {
        let mut config = AppConfig::default();
        config.source.local_csv = Some("configured.csv".into());

        match resolve_source(&config, None, Some("https://example.com/c.csv")).unwrap() {
            CatalogSource::Remote(url) => assert_eq!(url.as_str(), "https://example.com/c.csv"),
            other => panic!("unexpected source: {other:?}"),
        }
        match resolve_source(&config, None, None).unwrap() {
            CatalogSource::Local(path) => assert_eq!(path, PathBuf::from("configured.csv")),
            other => panic!("unexpected source: {other:?}"),
        }
    }

    #[test]
    fn default_source_is_remote() {
        let source = resolve_source(&AppConfig::default(), None, None).unwrap();
        assert!(matches!(source, CatalogSource::Remote(_)));
        assert!(resolve_source(&AppConfig::default(), None, Some("not a url")).is_err());
    }

    #[test]
    fn mode_arg_maps_to_comparison_mode() {
        assert_eq!(ComparisonMode::from(ModeArg::Direct), ComparisonMode::Direct);
        assert_eq!(
            ComparisonMode::from(ModeArg::Transitive),
            ComparisonMode::Transitive
        );
    }
}
