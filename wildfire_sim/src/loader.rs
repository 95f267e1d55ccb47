//! Topology configuration file reader.
//!
//! One directive per line, fields separated by whitespace:
//!
//! ```text
//! # three sensors in a row
//! node 0 0
//! node 1 0
//! node 2 0
//! edge 0 0 1 0
//! edge 1 0 2 0
//! station 0 0
//! fire 2 0
//! ```
//!
//! Consistency (declared endpoints, one station, one fire origin) is checked
//! later by `Topology::build`; this module only checks syntax.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;
use wildfire_core::{Location, TopologyInput};

/// Failure to read or parse a configuration file.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A directive has the wrong number of fields
    #[error("line {line}: `{directive}` takes {expected} coordinates, found {found}")]
    Arity {
        line: usize,
        directive: String,
        expected: usize,
        found: usize,
    },

    /// A coordinate is not an integer
    #[error("line {line}: `{token}` is not an integer coordinate")]
    InvalidNumber { line: usize, token: String },
}

/// Reads and parses a configuration file.
pub fn load_config(path: impl AsRef<Path>) -> Result<TopologyInput, LoadError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&text)
}

/// Parses configuration text into a topology declaration.
pub fn parse_config(text: &str) -> Result<TopologyInput, LoadError> {
    let mut input = TopologyInput::new();

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let content = raw.split('#').next().unwrap_or_default().trim();
        let mut fields = content.split_whitespace();
        let Some(directive) = fields.next() else {
            continue;
        };
        let args: Vec<&str> = fields.collect();

        match directive {
            "node" => input.locations.push(point(line, directive, &args)?),
            "station" => input.stations.push(point(line, directive, &args)?),
            "fire" => input.fire_origins.push(point(line, directive, &args)?),
            "edge" => {
                let [x1, y1, x2, y2] = coordinates::<4>(line, directive, &args)?;
                input.edges.push((Location::new(x1, y1), Location::new(x2, y2)));
            }
            other => warn!(line, directive = other, "unknown directive skipped"),
        }
    }

    Ok(input)
}

fn point(line: usize, directive: &str, args: &[&str]) -> Result<Location, LoadError> {
    let [x, y] = coordinates::<2>(line, directive, args)?;
    Ok(Location::new(x, y))
}

fn coordinates<const N: usize>(
    line: usize,
    directive: &str,
    args: &[&str],
) -> Result<[i32; N], LoadError> {
    if args.len() != N {
        return Err(LoadError::Arity {
            line,
            directive: directive.to_string(),
            expected: N,
            found: args.len(),
        });
    }
    let mut values = [0; N];
    for (value, token) in values.iter_mut().zip(args) {
        *value = token.parse().map_err(|_| LoadError::InvalidNumber {
            line,
            token: token.to_string(),
        })?;
    }
    Ok(values)
}
