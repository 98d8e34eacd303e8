//! Batch modifications of stored experiments.
//!
//! A modification file has one command per line:
//!
//! ```text
//! name<TAB>delete
//! name<TAB>update_desc<TAB>new description
//! ```
//!
//! Lines that cannot be applied are skipped with a warning; the remaining
//! lines are still applied.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use thiserror::Error;

#[cfg(feature = "tracing")]
use tracing::{info, warn};

use crate::database::Database;
use crate::error::KiqError;

/// A command from a modification file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModifyCommand {
    /// Remove the experiment and all of its counts.
    Delete,
    /// Replace the experiment description.
    UpdateDescription(String),
}

/// One parsed line of a modification file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modification {
    pub experiment: String,
    pub command: ModifyCommand,
}

/// Why a modification line was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkippedLine {
    #[error("bad format in line '{0}'")]
    BadFormat(String),

    #[error("unknown command '{command}' in line '{line}'")]
    UnknownCommand { command: String, line: String },

    #[error("missing description in line '{0}'")]
    MissingArgument(String),

    #[error("experiment '{0}' is not contained in the database")]
    UnknownExperiment(String),
}

impl Modification {
    /// Parses a non-empty modification line.
    pub fn parse(line: &str) -> Result<Self, SkippedLine> {
        let Some((experiment, rest)) = line.split_once('\t').filter(|(name, _)| !name.is_empty())
        else {
            return Err(SkippedLine::BadFormat(line.to_owned()));
        };
        let (command, argument) = rest.split_once('\t').unwrap_or((rest, ""));

        let command = match command {
            "delete" => ModifyCommand::Delete,
            "update_desc" if argument.is_empty() => {
                return Err(SkippedLine::MissingArgument(line.to_owned()))
            }
            "update_desc" => ModifyCommand::UpdateDescription(argument.to_owned()),
            other => {
                return Err(SkippedLine::UnknownCommand {
                    command: other.to_owned(),
                    line: line.to_owned(),
                })
            }
        };
        Ok(Self {
            experiment: experiment.to_owned(),
            command,
        })
    }

    /// Applies this modification to `db`.
    pub fn apply(&self, db: &mut Database) -> Result<(), SkippedLine> {
        let applied = match &self.command {
            ModifyCommand::Delete => db.delete_experiment(&self.experiment),
            ModifyCommand::UpdateDescription(text) => {
                db.update_description(&self.experiment, text)
            }
        };
        if applied {
            Ok(())
        } else {
            Err(SkippedLine::UnknownExperiment(self.experiment.clone()))
        }
    }
}

/// Outcome of [`apply_lines`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifySummary {
    pub applied: usize,
    pub skipped: Vec<SkippedLine>,
}

/// Parses and applies every non-empty line in order.
pub fn apply_lines<'l, L>(db: &mut Database, lines: L) -> ModifySummary
where
    L: IntoIterator<Item = &'l str>,
{
    let mut summary = ModifySummary::default();
    for line in lines {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        match Modification::parse(line).and_then(|m| m.apply(db)) {
            Ok(()) => summary.applied += 1,
            Err(skipped) => {
                #[cfg(feature = "tracing")]
                warn!("Skipping modification: {skipped}");
                summary.skipped.push(skipped);
            }
        }
    }

    #[cfg(feature = "tracing")]
    info!(
        applied = summary.applied,
        skipped = summary.skipped.len(),
        "Applied modifications"
    );

    summary
}

/// Applies the modification file at `path` to `db`.
pub fn apply_file<P: AsRef<Path>>(db: &mut Database, path: P) -> Result<ModifySummary, KiqError> {
    let path = path.as_ref();
    let read_err = |source| KiqError::InputRead {
        source,
        path: path.to_path_buf(),
    };

    let lines = BufReader::new(File::open(path).map_err(read_err)?)
        .lines()
        .collect::<Result<Vec<_>, _>>()
        .map_err(read_err)?;
    Ok(apply_lines(db, lines.iter().map(String::as_str)))
}
