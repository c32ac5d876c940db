use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use formsnap::{
    collect_fields, fill_fields, CollectOptions, FillOptions, FillSummary, LoadConfig, Source,
};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "formsnap",
    version,
    about = "Collect form state from an HTML page and fill it back"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log resolution and filtering decisions
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the page's form controls as a JSON field list
    Collect {
        /// http(s) URL or path to an HTML file
        source: String,

        #[command(flatten)]
        filters: CollectArgs,

        /// Write the JSON to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Fill a field list into the page and report per-field results
    Fill {
        /// http(s) URL or path to an HTML file
        source: String,

        /// JSON field list produced by `collect`
        #[arg(short, long)]
        fields: PathBuf,

        #[command(flatten)]
        policy: FillArgs,

        /// Save the filled page as HTML
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct CollectArgs {
    /// Keep hidden controls
    #[arg(long)]
    include_hidden: bool,
    /// Keep disabled and read-only controls
    #[arg(long)]
    include_disabled: bool,
    /// Keep button, submit, reset and image inputs
    #[arg(long)]
    include_buttons: bool,
    /// Keep controls with no value
    #[arg(long)]
    include_empty: bool,
    /// Attach every select's option list
    #[arg(long)]
    include_options: bool,
}

impl From<CollectArgs> for CollectOptions {
    fn from(a: CollectArgs) -> Self {
        CollectOptions {
            include_hidden: a.include_hidden,
            include_disabled: a.include_disabled,
            include_buttons: a.include_buttons,
            include_empty: a.include_empty,
            include_options: a.include_options,
        }
    }
}

#[derive(Args, Debug)]
struct FillArgs {
    /// Do not dispatch input/change events after each write
    #[arg(long)]
    no_fire_events: bool,
    /// Only use the recorded selector, never name or id
    #[arg(long)]
    no_fallback: bool,
    /// Write into read-only controls
    #[arg(long)]
    fill_readonly: bool,
    /// Write into disabled controls
    #[arg(long)]
    fill_disabled: bool,
}

impl From<FillArgs> for FillOptions {
    fn from(a: FillArgs) -> Self {
        FillOptions {
            fire_events: !a.no_fire_events,
            fallback_match: !a.no_fallback,
            fill_readonly: a.fill_readonly,
            fill_disabled: a.fill_disabled,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::builder().filter_level(level).init();

    match cli.command {
        Commands::Collect {
            source,
            filters,
            output,
        } => {
            let doc = load(&source)?;
            let fields = collect_fields(&doc, &filters.into());
            let json = formsnap::to_json_pretty(&fields)?;
            match output {
                Some(path) => {
                    write_file(&path, &json)?;
                    log::info!("wrote {} fields to {}", fields.len(), path.display());
                }
                None => println!("{}", json),
            }
        }
        Commands::Fill {
            source,
            fields,
            policy,
            output,
        } => {
            let text = std::fs::read_to_string(&fields)
                .with_context(|| format!("reading {}", fields.display()))?;
            let records = formsnap::from_json(&text)
                .with_context(|| format!("parsing field list {}", fields.display()))?;

            let mut doc = load(&source)?;
            let results = fill_fields(&mut doc, &records, &policy.into());
            for r in &results {
                println!("{}", r);
            }
            println!("{}", FillSummary::from_results(&results));

            if let Some(path) = output {
                write_file(&path, &doc.to_html())?;
                log::info!("saved filled page to {}", path.display());
            }
        }
    }

    Ok(())
}

fn load(raw: &str) -> Result<formsnap::Document> {
    Source::parse(raw)
        .load(&LoadConfig::default())
        .with_context(|| format!("loading {}", raw))
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("writing {}", path.display()))
}
