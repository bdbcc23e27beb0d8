use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dwbridge::{
    config::{default_config_path, Config},
    duck::DuckWarehouse,
    fetch::{DirScriptSource, HttpScriptSource, ScriptRef, ScriptSource},
    Bridge, Row, Target,
};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Run warehouse scripts and load their results into warehouse tables.
#[derive(Parser, Debug)]
#[command(name = "dwbridge", version)]
struct Cli {
    /// Credentials/connections JSON (default: next to the executable)
    #[arg(long, env = "DWBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Connection profile: prod or dev
    #[arg(long, default_value = "prod")]
    connection: String,

    /// Credentials profile: public or private
    #[arg(long, default_value = "public")]
    credentials: String,

    /// Directory holding `<id>.sql` scripts
    #[arg(long)]
    scripts_dir: Option<PathBuf>,

    /// URL template for scripts, with `{id}` in place of the script id
    #[arg(long, conflicts_with = "scripts_dir")]
    scripts_url: Option<String>,

    /// Bearer token for --scripts-url
    #[arg(long, env = "DWBRIDGE_SCRIPTS_TOKEN", requires = "scripts_url")]
    scripts_token: Option<String>,

    /// Where database files live for profiles without a `database` entry
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct ScriptArgs {
    /// Script id resolved through the script source
    #[arg(long)]
    script: Option<String>,

    /// Literal SQL
    #[arg(long)]
    sql: Option<String>,
}

impl ScriptArgs {
    fn to_ref(&self) -> ScriptRef {
        match (&self.script, &self.sql) {
            (Some(id), _) => ScriptRef::Id(id.clone()),
            (None, Some(sql)) => ScriptRef::Raw(sql.clone()),
            (None, None) => unreachable!("clap enforces one of --script/--sql"),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute a statement and commit
    Exec {
        #[arg(long)]
        sql: String,
    },
    /// Run a script and print its rows
    Run {
        #[command(flatten)]
        script: ScriptArgs,
    },
    /// Print rows of a table
    Read {
        #[arg(long)]
        table: String,
        /// Comma-separated column list
        #[arg(long)]
        columns: Option<String>,
        #[arg(long, requires = "columns")]
        distinct: bool,
    },
    /// Delete every row of a table
    Clear {
        #[arg(long)]
        table: String,
    },
    /// Print the column names and kinds of a table
    Columns {
        #[arg(long)]
        table: String,
    },
    /// Run a script and upload its result into a table
    Load {
        #[command(flatten)]
        script: ScriptArgs,
        #[arg(long)]
        table: String,
        /// Empty the table before uploading
        #[arg(long)]
        clear: bool,
    },
}

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    // ─── 2) configuration & collaborators ───────────────────────────
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = Config::load(&config_path)?;
    let target = Target::parse(&cli.connection, &cli.credentials)?;
    info!(config = %config_path.display(), %target, "startup");

    let mut bridge = Bridge::new(config, DuckWarehouse::new(&cli.data_dir));
    if let Some(scripts) = script_source(&cli)? {
        bridge = bridge.with_scripts(scripts);
    }

    // ─── 3) dispatch ─────────────────────────────────────────────────
    match &cli.command {
        Command::Exec { sql } => bridge.execute_query(sql, &target)?,
        Command::Run { script } => {
            let rows = bridge.run_query(&script.to_ref(), &target)?;
            print_rows(&rows)?;
        }
        Command::Read {
            table,
            columns,
            distinct,
        } => {
            let rows = bridge.get_data_from_table(table, *distinct, columns.as_deref(), &target)?;
            print_rows(&rows)?;
        }
        Command::Clear { table } => bridge.clear_table(table, &target)?,
        Command::Columns { table } => {
            let mut out = io::stdout().lock();
            for col in bridge.get_column_info(table, &target)? {
                writeln!(out, "{}\t{}\t{}", col.name, col.kind.as_str(), col.type_tag)?;
            }
        }
        Command::Load {
            script,
            table,
            clear,
        } => {
            let report = bridge
                .load_script(&script.to_ref(), table, *clear, &target)
                .with_context(|| format!("loading into {table}"))?;
            info!(
                table = %report.table,
                received = report.received,
                removed = report.removed.len(),
                inserted = report.inserted(),
                rejected = report.rejected(),
                "load finished"
            );
        }
    }
    Ok(())
}

fn script_source(cli: &Cli) -> Result<Option<Box<dyn ScriptSource>>> {
    if let Some(dir) = &cli.scripts_dir {
        return Ok(Some(Box::new(DirScriptSource::new(dir))));
    }
    if let Some(url) = &cli.scripts_url {
        let src = HttpScriptSource::new(url.clone(), cli.scripts_token.clone())?;
        return Ok(Some(Box::new(src)));
    }
    Ok(None)
}

fn print_rows(rows: &[Row]) -> Result<()> {
    let mut out = io::stdout().lock();
    for row in rows {
        let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        writeln!(out, "{}", cells.join("\t"))?;
    }
    Ok(())
}
