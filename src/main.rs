use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

use cypher_translate::config::Config;

mod cli;

#[derive(Parser)]
#[command(name = "cyt")]
#[command(author, version, about = "Compile filter and connect inputs to Cypher")]
struct Cli {
    /// Path to schema.yaml
    #[arg(long, global = true)]
    schema: Option<PathBuf>,

    /// Path to config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log compiler decisions to stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a filter input to a WHERE clause
    Where {
        /// Node type the filter applies to
        #[arg(long)]
        node: String,

        /// Variable the node is bound to
        #[arg(long)]
        var: Option<String>,

        /// JSON file with the resolve tree ({ name, args })
        #[arg(long)]
        resolve_tree: Option<PathBuf>,

        /// JSON file with decoded JWT claims
        #[arg(long)]
        jwt: Option<PathBuf>,

        /// JSON file with request values for `$context.` placeholders
        #[arg(long)]
        context: Option<PathBuf>,

        /// Filter input file, or - for stdin
        input: PathBuf,
    },

    /// Compile a connect input to MERGE statements
    Connect {
        /// Node type of the parent
        #[arg(long)]
        node: String,

        /// Relationship field on the parent being connected
        #[arg(long)]
        field: String,

        /// Variable the parent is bound to
        #[arg(long, default_value = "this0")]
        parent_var: String,

        /// Base name for connected node variables
        #[arg(long)]
        var: Option<String>,

        /// JSON file with decoded JWT claims
        #[arg(long)]
        jwt: Option<PathBuf>,

        /// JSON file with request values for `$context.` placeholders
        #[arg(long)]
        context: Option<PathBuf>,

        /// The parent is created in the same statement
        #[arg(long)]
        from_create: bool,

        /// Escape quotes for embedding inside a quoted string
        #[arg(long)]
        escaped: bool,

        /// Connect input file, or - for stdin
        input: PathBuf,
    },

    /// Validate the schema (check for errors)
    Check {
        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,
    },

    /// Write an example schema.yaml
    Init {
        /// Directory to create the schema in
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let schema_path = cli
        .schema
        .or_else(|| config.schema.clone())
        .unwrap_or_else(|| PathBuf::from("schema.yaml"));

    match cli.command {
        Commands::Where {
            node,
            var,
            resolve_tree,
            jwt,
            context,
            input,
        } => {
            let var = var.or_else(|| config.var.clone()).unwrap_or_else(|| "this".to_string());
            let opts = cli::commands::WhereOptions {
                node: &node,
                var: &var,
                resolve_tree: resolve_tree.as_deref(),
                jwt: jwt.as_deref(),
                context: context.as_deref(),
                max_depth: config.max_depth,
            };
            cli::commands::where_clause(&schema_path, &opts, &input)
        }
        Commands::Connect {
            node,
            field,
            parent_var,
            var,
            jwt,
            context,
            from_create,
            escaped,
            input,
        } => {
            let var = var.unwrap_or_else(|| format!("{}_connect_{}", parent_var, field));
            let opts = cli::commands::ConnectOptions {
                node: &node,
                field: &field,
                parent_var: &parent_var,
                var: &var,
                jwt: jwt.as_deref(),
                context: context.as_deref(),
                from_create,
                escaped,
                max_depth: config.max_depth,
            };
            cli::commands::connect(&schema_path, &opts, &input)
        }
        Commands::Check { strict } => cli::commands::check(&schema_path, strict),
        Commands::Init { path } => cli::commands::init(&path),
    }
}
