//! Command-line interface definition.

use std::path::PathBuf;

use clap::{ArgGroup, Args as ClapArgs, Parser, Subcommand};

use crate::config::{DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS};
use crate::dump::DumpMode;

/// An append-only database of 32-mer counts across sequencing experiments.
#[derive(Parser, Debug)]
#[command(name = "kiq")]
#[command(version, author, about, long_about = None)]
pub struct Args {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the index and an empty database from a list of k-mers
    Index(IndexArgs),
    /// Count k-mers of the experiments in a sample list into the database
    Db(DbArgs),
    /// Query k-mers in the database
    Query(QueryArgs),
    /// Print the database contents
    Dump(DumpArgs),
    /// Delete experiments or update their descriptions
    Modify(ModifyArgs),
}

/// Index and database file locations, shared by every command.
#[derive(ClapArgs, Debug, Clone)]
pub struct DatabaseFiles {
    /// Index file
    #[arg(short = 'i', long = "index")]
    pub index: PathBuf,

    /// K-mer count database file
    #[arg(short = 'k', long = "database")]
    pub database: PathBuf,
}

#[derive(ClapArgs, Debug)]
pub struct IndexArgs {
    #[command(flatten)]
    pub files: DatabaseFiles,

    /// File with one k-mer per line
    #[arg(short = 'l', long = "kmers")]
    pub kmers: PathBuf,
}

#[derive(ClapArgs, Debug)]
pub struct DbArgs {
    #[command(flatten)]
    pub files: DatabaseFiles,

    /// Sample list: name<TAB>file[<TAB>description] per line
    #[arg(short = 'l', long = "samples")]
    pub samples: PathBuf,

    /// Keep experiments already in the database and skip samples with their names
    #[arg(short, long)]
    pub append: bool,

    /// Number of counting threads
    #[arg(short = 'z', long, default_value_t = DEFAULT_WORKERS, value_parser = parse_positive)]
    pub threads: usize,

    /// Maximum number of reads waiting to be counted
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY, value_parser = parse_positive)]
    pub queue_capacity: usize,
}

#[derive(ClapArgs, Debug)]
#[command(group(ArgGroup::new("queries").required(true).args(["query_file", "kmers"])))]
pub struct QueryArgs {
    #[command(flatten)]
    pub files: DatabaseFiles,

    /// File with query k-mers, one per line
    #[arg(short = 'q', long = "query-file")]
    pub query_file: Option<PathBuf>,

    /// Single query k-mer or comma-separated list of query k-mers
    #[arg(short = 'Q', long = "kmers", value_delimiter = ',')]
    pub kmers: Vec<String>,

    /// Count threshold; only experiments with a higher count are reported
    #[arg(short = 't', long = "threshold", default_value_t = 0)]
    pub threshold: u32,

    /// Reads-per-million threshold; only experiments with a higher rpm are reported
    #[arg(short = 'r', long = "rpm", default_value_t = 0.0, value_parser = parse_rpm)]
    pub rpm: f64,

    /// Only report experiments that contain all query k-mers
    #[arg(short = 'a', long = "all")]
    pub all: bool,

    /// Output JSON
    #[arg(short = 'j', long)]
    pub json: bool,
}

#[derive(ClapArgs, Debug)]
pub struct DumpArgs {
    #[command(flatten)]
    pub files: DatabaseFiles,

    /// What to print
    #[arg(short = 'p', long, value_enum)]
    pub mode: DumpMode,
}

#[derive(ClapArgs, Debug)]
pub struct ModifyArgs {
    #[command(flatten)]
    pub files: DatabaseFiles,

    /// Modification file: name<TAB>delete or name<TAB>update_desc<TAB>text per line
    #[arg(short = 'c', long = "commands")]
    pub commands: PathBuf,
}

fn parse_positive(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    if n == 0 {
        return Err("value must be at least 1".to_string());
    }
    Ok(n)
}

fn parse_rpm(s: &str) -> Result<f64, String> {
    let rpm: f64 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    if !rpm.is_finite() || rpm < 0.0 {
        return Err("rpm threshold must be a non-negative number".to_string());
    }
    Ok(rpm)
}
