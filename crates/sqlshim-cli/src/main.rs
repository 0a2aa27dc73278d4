use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use sqlshim::{Connection, Statement, StepResult, split_statements};
use tracing::debug;

#[derive(Parser)]
#[command(name = "sqlshim")]
#[command(about = "Run SQLite-style prepared statements against PostgreSQL")]
#[command(version)]
struct Cli {
    /// Log more (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print each statement of an SQL buffer on its own line
    Split {
        /// SQL text (read from stdin when omitted)
        sql: Option<String>,
    },
    /// Run every statement and print result rows as tab-separated text
    Exec {
        /// JSON connection config (host, port, user, pass, db)
        #[arg(short, long)]
        config: PathBuf,
        /// SQL text (read from stdin when omitted)
        sql: Option<String>,
    },
    /// Rebuild the Cars table and query it back
    Demo {
        /// JSON connection config (host, port, user, pass, db)
        #[arg(short, long)]
        config: PathBuf,
    },
}

const CARS: &str = "DROP TABLE IF EXISTS Cars;\
                    CREATE TABLE Cars(Id INT, Name TEXT, Price INT);\
                    INSERT INTO Cars VALUES(1, 'Audi', 52642);\
                    INSERT INTO Cars VALUES(3, 'Skoda', 9000);\
                    INSERT INTO Cars VALUES(4, 'Volvo', 29000);\
                    INSERT INTO Cars VALUES(5, 'Bentley', 350000);\
                    INSERT INTO Cars VALUES(6, 'Citroen', 21000);\
                    INSERT INTO Cars VALUES(7, 'Hummer', 41400);\
                    INSERT INTO Cars VALUES(8, 'Volkswagen', 21600);";

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    sqlshim::logging::init_logging_with_level(level);

    match cli.command {
        Commands::Split { sql } => {
            let sql = sql_or_stdin(sql)?;
            for stmt in split_statements(&sql) {
                println!("{stmt}");
            }
        }
        Commands::Exec { config, sql } => {
            let sql = sql_or_stdin(sql)?;
            let conn = open(&config)?;
            exec(&conn, &sql)?;
            conn.close().context("closing connection")?;
        }
        Commands::Demo { config } => {
            let conn = open(&config)?;
            demo(&conn)?;
            conn.close().context("closing connection")?;
        }
    }
    Ok(())
}

fn sql_or_stdin(sql: Option<String>) -> Result<String> {
    match sql {
        Some(sql) => Ok(sql),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading SQL from stdin")?;
            Ok(buf)
        }
    }
}

fn open(config: &Path) -> Result<Connection> {
    Connection::open(config).with_context(|| format!("opening {}", config.display()))
}

/// Column `index` of the current row as display text.
fn text(stmt: &mut Statement<'_>, index: usize) -> String {
    stmt.column_text(index)
        .map_or_else(|| "NULL".to_string(), |t| t.to_string_lossy().into_owned())
}

fn exec(conn: &Connection, sql: &str) -> Result<()> {
    let mut rest = Some(sql);
    while let Some(sql) = rest {
        let (mut stmt, tail) = conn.prepare(sql);
        rest = tail;
        if stmt.sql().is_empty() {
            continue;
        }
        debug!(sql = stmt.sql(), "running");

        let mut rows = 0;
        while stmt
            .try_step()
            .with_context(|| format!("running `{}`", stmt.sql()))?
        {
            if rows == 0 {
                let header: Vec<&str> = (0..stmt.column_count())
                    .map(|i| stmt.column_name(i).unwrap_or("?"))
                    .collect();
                println!("{}", header.join("\t").bold());
            }
            let line: Vec<String> = (0..stmt.column_count()).map(|i| text(&mut stmt, i)).collect();
            println!("{}", line.join("\t"));
            rows += 1;
        }
        if stmt.column_count() > 0 {
            println!("{}", format!("({rows} rows)").dimmed());
        }
        stmt.finalize()?;
    }
    Ok(())
}

fn demo(conn: &Connection) -> Result<()> {
    println!("{}", "Loading Cars".green().bold());
    let mut rest = Some(CARS);
    while let Some(sql) = rest {
        let (mut stmt, tail) = conn.prepare(sql);
        if stmt.step() == StepResult::Error {
            bail!("statement failed: {}", stmt.sql());
        }
        stmt.finalize()?;
        rest = tail;
    }

    let (mut insert, _) = conn.prepare("INSERT INTO Cars VALUES($1, $2, $3)");
    insert.bind_int(0, 2);
    insert.bind_text(1, b"Mercedes", None);
    insert.bind_int(2, 57127);
    if insert.step() != StepResult::Done {
        bail!("parameterized insert failed");
    }
    insert.finalize()?;

    println!("{}", "Typed columns".green().bold());
    let (mut select, _) = conn.prepare("SELECT * FROM Cars ORDER BY Id ASC");
    while select.step() == StepResult::Row {
        let id = select.column_int(0);
        let name = text(&mut select, 1);
        let price = select.column_int(2);
        println!("{id} {name} {price}");
    }
    select.finalize()?;

    println!("{}", "Everything as text".green().bold());
    let (mut select, _) = conn.prepare("SELECT * FROM Cars WHERE Id > 5");
    while select.step() == StepResult::Row {
        let line: Vec<String> = (0..3).map(|i| text(&mut select, i)).collect();
        println!("{}", line.join(" "));
    }
    select.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_exec() {
        let cli = Cli::try_parse_from(["sqlshim", "-vv", "exec", "--config", "db.json", "SELECT 1"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Exec { config, sql } => {
                assert_eq!(config, PathBuf::from("db.json"));
                assert_eq!(sql.as_deref(), Some("SELECT 1"));
            }
            _ => panic!("expected exec"),
        }
    }

    #[test]
    fn test_demo_script_splits_into_nine_statements() {
        let statements: Vec<&str> = split_statements(CARS).collect();
        assert_eq!(statements.len(), 9);
        assert_eq!(statements[0], "DROP TABLE IF EXISTS Cars");
        assert_eq!(statements[8], "INSERT INTO Cars VALUES(8, 'Volkswagen', 21600)");
    }
}
