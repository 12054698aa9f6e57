//! CLI command definitions, routing, and tracing setup.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use harvest_core::{
    Pipeline, PipelineOutput, ProgressReporter, Query, QueryValue, RANGE_FIELD, ThumbnailFailure,
};
use harvest_fetch::HttpTransport;
use harvest_shared::{
    AppConfig, NormalizedItem, PipelineConfig, SortKey, init_config, load_config, load_config_from,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// omeka-harvest: fetch, filter and sort items from an Omeka Classic site.
#[derive(Parser)]
#[command(
    name = "omeka-harvest",
    version,
    about = "Fetch, filter and sort items from an Omeka Classic API.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.omeka-harvest/harvest.toml.
    #[arg(long, global = true, env = "OMEKA_HARVEST_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch items, apply a query, and print the sorted result.
    Items(ItemsArgs),

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Arguments of `omeka-harvest items`.
///
/// Repeating a field flag ORs its values; different fields are ANDed.
#[derive(Args, Debug)]
pub(crate) struct ItemsArgs {
    /// Year range, e.g. 1840-1860 (matched by decade).
    #[arg(long)]
    pub range: Option<String>,

    /// State to match (repeatable).
    #[arg(long)]
    pub state: Vec<String>,

    /// City to match (repeatable).
    #[arg(long)]
    pub city: Vec<String>,

    /// Year to match exactly (repeatable).
    #[arg(long)]
    pub year: Vec<String>,

    /// Any field, as FIELD=VALUE (repeatable).
    #[arg(long = "where", value_name = "FIELD=VALUE")]
    pub filters: Vec<String>,

    /// JSON or TOML file holding a query; flags override its fields.
    #[arg(long)]
    pub query_file: Option<PathBuf>,

    /// Sort key: title, date, city or state.
    #[arg(long, default_value = "date")]
    pub sort: SortKey,

    /// Skip image lookups.
    #[arg(long)]
    pub no_thumbnails: bool,

    /// Print the result as JSON.
    #[arg(long)]
    pub json: bool,

    /// Omeka site to query, overriding the config file.
    #[arg(long)]
    pub base_url: Option<String>,
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

/// Initialize tracing based on CLI flags. Logs go to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "harvest=info",
        1 => "harvest=debug",
        _ => "harvest=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
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
    let config_path = cli.config;
    match cli.command {
        Command::Items(args) => cmd_items(config_path.as_deref(), &args).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path.as_deref()).await,
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

async fn cmd_items(config_path: Option<&Path>, args: &ItemsArgs) -> Result<()> {
    let mut config = resolve_config(config_path)?;
    if let Some(base_url) = &args.base_url {
        config.api.base_url = base_url.clone();
    }
    if args.no_thumbnails {
        config.fetch.thumbnails = false;
    }

    let query = build_query(args)?;
    let pipeline_config = PipelineConfig::from(&config);
    let transport = HttpTransport::new(pipeline_config.fetch.timeout())?;
    let pipeline = Pipeline::new(pipeline_config, Arc::new(transport))?;

    info!(
        base_url = %config.api.base_url,
        sort = %args.sort,
        fields = query.len(),
        "harvesting items"
    );

    let reporter = CliProgress::new();
    let output = pipeline.run(&query, args.sort, &reporter).await?;

    if args.json {
        let report = JsonReport::new(&output, &config.api.base_url);
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_text(&output, &config.api.base_url));
    }

    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Query building
// ---------------------------------------------------------------------------

/// One value stays a scalar, several become an any-of list.
fn flag_value(values: &[String]) -> Option<QueryValue> {
    match values {
        [] => None,
        [one] => Some(QueryValue::One(one.clone())),
        many => Some(QueryValue::Many(many.to_vec())),
    }
}

fn read_query_file(path: &Path) -> Result<Query> {
    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read query file {}", path.display()))?;

    let is_toml = path.extension().is_some_and(|ext| ext == "toml");
    let query = if is_toml {
        toml::from_str(&content)
            .wrap_err_with(|| format!("invalid query file {}", path.display()))?
    } else {
        serde_json::from_str(&content)
            .wrap_err_with(|| format!("invalid query file {}", path.display()))?
    };
    Ok(query)
}

/// Combine the query file (if any) with the field flags.
pub(crate) fn build_query(args: &ItemsArgs) -> Result<Query> {
    let mut query = match &args.query_file {
        Some(path) => read_query_file(path)?,
        None => Query::new(),
    };

    let mut flags = Query::new();
    if let Some(range) = &args.range {
        flags.insert(RANGE_FIELD, range.as_str());
    }
    for (field, values) in [("state", &args.state), ("city", &args.city), ("year", &args.year)] {
        if let Some(value) = flag_value(values) {
            flags.insert(field, value);
        }
    }

    let mut wheres: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for filter in &args.filters {
        let (field, value) = filter
            .split_once('=')
            .ok_or_else(|| eyre!("invalid --where '{filter}': expected FIELD=VALUE"))?;
        let field = field.trim();
        if field.is_empty() {
            return Err(eyre!("invalid --where '{filter}': field name is empty"));
        }
        wheres
            .entry(field.to_string())
            .or_default()
            .push(value.to_string());
    }
    for (field, values) in wheres {
        if let Some(value) = flag_value(&values) {
            flags.insert(field, value);
        }
    }

    query.merge(flags);
    Ok(query)
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn or_dash(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}

/// Human-readable listing: one block per item, then the count and link.
pub(crate) fn render_text(output: &PipelineOutput, base_url: &str) -> String {
    let mut out = String::new();

    for item in &output.items {
        let title = if item.title.is_empty() {
            "(untitled)"
        } else {
            item.title.as_str()
        };
        out.push_str(&format!("{title}\n"));
        out.push_str(&format!("  Date:      {}\n", or_dash(&item.date)));
        out.push_str(&format!("  State:     {}\n", or_dash(&item.state)));
        out.push_str(&format!("  City:      {}\n", or_dash(&item.city)));
        out.push_str(&format!("  URL:       {}\n", item.url(base_url)));
        if let Some(url) = item.thumbnail.as_url() {
            out.push_str(&format!("  Thumbnail: {url}\n"));
        }
        out.push('\n');
    }

    out.push_str(&format!("Found {} records.\n", output.matched));
    if !output.items.is_empty() {
        out.push_str(&format!("Stable link: {}\n", output.search_link));
    }
    for failure in &output.thumbnail_failures {
        out.push_str(&format!(
            "warning: no thumbnail for item {}: {}\n",
            failure.item_id, failure.error
        ));
    }
    out
}

#[derive(Serialize)]
struct JsonItem<'a> {
    #[serde(flatten)]
    item: &'a NormalizedItem,
    url: String,
    year: &'a str,
    month: &'a str,
    day: &'a str,
}

/// Machine-readable result.
#[derive(Serialize)]
pub(crate) struct JsonReport<'a> {
    run_id: String,
    matched: usize,
    total_results: u64,
    pages_fetched: usize,
    sort: SortKey,
    search_link: &'a str,
    completed_at: String,
    thumbnail_failures: &'a [ThumbnailFailure],
    items: Vec<JsonItem<'a>>,
}

impl<'a> JsonReport<'a> {
    pub(crate) fn new(output: &'a PipelineOutput, base_url: &str) -> Self {
        Self {
            run_id: output.run_id.to_string(),
            matched: output.matched,
            total_results: output.total_results,
            pages_fetched: output.pages_fetched,
            sort: output.sort,
            search_link: &output.search_link,
            completed_at: output.completed_at.to_rfc3339(),
            thumbnail_failures: &output.thumbnail_failures,
            items: output
                .items
                .iter()
                .map(|item| JsonItem {
                    item,
                    url: item.url(base_url),
                    year: item.year(),
                    month: item.month(),
                    day: item.day(),
                })
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner on stderr.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn page_fetched(&self, page: u32, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Fetching pages [{current}/{total}] (page {page})"));
    }

    fn thumbnail_fetched(&self, item_id: u64, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Fetching thumbnails [{current}/{total}] (item {item_id})"));
    }

    fn done(&self, _output: &PipelineOutput) {
        self.spinner.finish_and_clear();
    }
}
