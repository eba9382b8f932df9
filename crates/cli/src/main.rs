mod commands;

use clap::{Parser, Subcommand};
use fetchgraph_orm::LoaderConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::scenario::ScenarioName;

#[derive(Parser)]
#[command(name = "fetchgraph")]
#[command(about = "Entity-graph fetch planning and round-trip accounting")]
struct Cli {
    /// Override FETCHGRAPH_MAX_DEPTH
    #[arg(long, global = true)]
    max_depth: Option<usize>,

    /// Override FETCHGRAPH_MAX_BATCH_SIZE
    #[arg(long, global = true)]
    max_batch_size: Option<usize>,

    /// Log as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare unplanned and planned loads on the seeded university dataset
    Scenario {
        #[arg(value_enum, default_value_t = ScenarioName::All)]
        name: ScenarioName,
    },

    /// Print the fetch plan and the SQL of each statement
    Plan {
        /// Root entity type
        root: String,

        /// Relationship path, repeatable (e.g. -p courses.students)
        #[arg(short, long = "path")]
        paths: Vec<String>,

        /// Also load relationships whose default fetch policy is eager
        #[arg(long)]
        load: bool,

        /// Dialect used to render SQL (postgresql, mysql, sqlite)
        #[arg(long)]
        dialect: Option<String>,
    },

    /// Execute a plan and print the root entities as JSON
    Fetch {
        /// Root entity type
        root: String,

        #[arg(short, long = "path")]
        paths: Vec<String>,

        #[arg(long)]
        load: bool,

        /// Run against PostgreSQL instead of the in-memory dataset; falls
        /// back to DATABASE_URL
        #[arg(long)]
        database_url: Option<String>,
    },

    /// List entity types and their relationships
    Schema,
}

fn init_tracing(json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("warn"))?;
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).json())
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs)?;

    let mut config = LoaderConfig::from_env()?;
    if let Some(max_depth) = cli.max_depth {
        config = config.with_max_depth(max_depth);
    }
    if let Some(max_batch_size) = cli.max_batch_size {
        config = config.with_max_batch_size(max_batch_size);
    }
    config.validate()?;
    tracing::debug!(?config, "loader configuration");

    match cli.command {
        Commands::Scenario { name } => {
            commands::scenario::run(name, config).await?;
        }
        Commands::Plan {
            root,
            paths,
            load,
            dialect,
        } => {
            if let Some(dialect) = dialect {
                config.dialect = dialect.parse()?;
            }
            commands::plan::run(&root, &paths, load, config)?;
        }
        Commands::Fetch {
            root,
            paths,
            load,
            database_url,
        } => {
            let database_url = database_url.or_else(|| std::env::var("DATABASE_URL").ok());
            commands::fetch::run(&root, &paths, load, database_url.as_deref(), config).await?;
        }
        Commands::Schema => {
            commands::schema::run()?;
        }
    }

    Ok(())
}
