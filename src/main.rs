use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use ddlgraph::config::Config;
use ddlgraph::parse_sql;
use ddlgraph::render::to_ddl;
use ddlgraph::store::SchemaStore;

#[derive(Parser)]
#[command(name = "ddlgraph")]
#[command(version, about = "Parse MySQL DDL and keep versioned schema graphs", long_about = None)]
struct Cli {
    /// SQLite URL of the schema store (overrides DDLGRAPH_DATABASE_URL)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Default, ValueEnum)]
enum ShowFormat {
    #[default]
    Json,
    Ddl,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a DDL file and print its tables as JSON
    Parse {
        file: PathBuf,

        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },

    /// Parse a DDL file and store it as a new schema version
    Import {
        file: PathBuf,

        /// Version name, unique per store
        #[arg(long)]
        name: String,

        #[arg(long)]
        description: Option<String>,
    },

    /// Print a stored schema version
    Show {
        /// Version id
        #[arg(required_unless_present = "name", conflicts_with = "name")]
        id: Option<i64>,

        /// Look the version up by name instead of id
        #[arg(long)]
        name: Option<String>,

        #[arg(long, value_enum, default_value_t = ShowFormat::Json)]
        format: ShowFormat,
    },

    /// List stored schema versions, newest first
    List,

    /// Delete a schema version and everything it owns
    Delete { id: i64 },
}

fn read_script(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Parse { file, pretty } = &cli.command {
        let tables = parse_sql(&read_script(file)?)?;
        let json = if *pretty {
            serde_json::to_string_pretty(&tables)?
        } else {
            serde_json::to_string(&tables)?
        };
        println!("{json}");
        return Ok(());
    }

    let store = SchemaStore::connect(&config.database_url, config.max_connections)
        .await
        .with_context(|| format!("Failed to open {}", config.database_url))?;

    match cli.command {
        Commands::Parse { .. } => {}
        Commands::Import {
            file,
            name,
            description,
        } => {
            let sql = read_script(&file)?;
            let version = store
                .parse_and_store(&sql, &name, description.as_deref())
                .await?;
            println!("{}", version.id);
        }
        Commands::Show { id, name, format } => {
            let version = match (id, name) {
                (Some(id), _) => store.get_schema_version(id).await?,
                (None, Some(name)) => store.get_schema_version_by_name(&name).await?,
                (None, None) => None,
            };
            let version = version.context("Schema version not found")?;
            match format {
                ShowFormat::Json => println!("{}", serde_json::to_string_pretty(&version)?),
                ShowFormat::Ddl => print!("{}", to_ddl(&version)),
            }
        }
        Commands::List => {
            for v in store.list_schema_versions().await? {
                println!(
                    "{}\t{}\t{}\t{}",
                    v.id,
                    v.version_name,
                    v.created_at,
                    v.description.unwrap_or_default()
                );
            }
        }
        Commands::Delete { id } => {
            if !store.delete_schema_version(id).await? {
                anyhow::bail!("Schema version {id} not found");
            }
        }
    }

    Ok(())
}
