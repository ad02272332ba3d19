use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

/// Command-line arguments, parsed directly into the crate's one and only
/// configuration record (mirroring `zarrs_tools`'s "the CLI struct IS the
/// config struct" pattern: `#[derive(Parser, Serialize, Deserialize)]` on a
/// single flat struct, so it can also be dumped/round-tripped as JSON).
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(
    name = "hisview",
    about = "Read a legacy .drr/.his histogram catalog and emit slices, projections, crops and rebinned views"
)]
pub struct Configuration {
    /// Shared basename for `<base>.drr` / `<base>.his`.
    pub base: PathBuf,

    /// Select a histogram by its catalog id.
    #[arg(long)]
    pub id: Option<i64>,

    /// List every id in the catalog with its dimensionality.
    #[arg(long)]
    pub list: bool,

    /// Like --list, but also report whether each histogram is all-zero.
    #[arg(long = "list-empty")]
    pub list_empty: bool,

    /// Emit header fields for --id and exit.
    #[arg(long)]
    pub info: bool,

    /// Channel-range gate on X: "lo,hi".
    #[arg(long = "gate-x", value_parser = parse_channel_range)]
    pub gate_x: Option<(i64, i64)>,

    /// Channel-range gate on Y: "lo,hi".
    #[arg(long = "gate-y", value_parser = parse_channel_range)]
    pub gate_y: Option<(i64, i64)>,

    /// Background channel range(s) to subtract: "lo,hi" or "lo,hi,lo2,hi2"
    /// when --sbg is also set.
    #[arg(long = "bg", value_parser = parse_bg_range)]
    pub bg_range: Option<Vec<i64>>,

    /// Use a split background: entries 2..3 of --bg as a second range.
    #[arg(long)]
    pub sbg: bool,

    /// Polygon-gate file, optionally "path,id" to select one polygon from a
    /// multi-polygon file.
    #[arg(long, value_parser = parse_polygon_arg)]
    pub polygon: Option<(PathBuf, Option<i64>)>,

    /// Integer rebin factors per axis (>= 1): "bx,by" or a single value
    /// applied to both axes.
    #[arg(long, value_delimiter = ',', default_value = "1,1")]
    pub bin: Vec<u32>,

    /// Output stride per axis (>= 1): "sx,sy" or a single value applied to
    /// both axes.
    #[arg(long, value_delimiter = ',', default_value = "1,1")]
    pub every: Vec<u32>,

    /// Suppress zero-count rows (and zero cells in crop/no-gate 2D mode).
    #[arg(long = "zero-sup")]
    pub zero_sup: bool,

    /// Print stage diagnostics to stderr.
    #[arg(long, short)]
    pub verbose: bool,
}

fn parse_channel_range(s: &str) -> Result<(i64, i64), String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 2 {
        return Err(format!("expected \"lo,hi\", found \"{s}\""));
    }
    let lo: i64 = parts[0]
        .trim()
        .parse()
        .map_err(|_| format!("not an integer: \"{}\"", parts[0]))?;
    let hi: i64 = parts[1]
        .trim()
        .parse()
        .map_err(|_| format!("not an integer: \"{}\"", parts[1]))?;
    Ok((lo, hi))
}

/// Keeps the entries the user actually supplied (2 or 4) rather than
/// zero-filling, so callers can tell a bare `lo,hi` apart from an explicit
/// split range and reject `--sbg` against too few points.
fn parse_bg_range(s: &str) -> Result<Vec<i64>, String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 2 && parts.len() != 4 {
        return Err(format!(
            "expected \"lo,hi\" or \"lo,hi,lo2,hi2\", found \"{s}\""
        ));
    }
    parts
        .iter()
        .map(|p| {
            p.trim()
                .parse()
                .map_err(|_| format!("not an integer: \"{p}\""))
        })
        .collect()
}

fn parse_polygon_arg(s: &str) -> Result<(PathBuf, Option<i64>), String> {
    match s.split_once(',') {
        Some((path, id)) => {
            let id: i64 = id
                .trim()
                .parse()
                .map_err(|_| format!("not an integer polygon id: \"{id}\""))?;
            Ok((PathBuf::from(path), Some(id)))
        }
        None => Ok((PathBuf::from(s), None)),
    }
}

impl Configuration {
    /// `bin`/`every` accept either one shared factor or a per-axis pair;
    /// this normalizes to `[x, y]`, failing closed on anything else.
    pub fn bin_factors(&self) -> Result<[u32; 2], String> {
        normalize_pair(&self.bin, "bin")
    }

    pub fn every_strides(&self) -> Result<[u32; 2], String> {
        normalize_pair(&self.every, "every")
    }
}

fn normalize_pair(values: &[u32], name: &str) -> Result<[u32; 2], String> {
    match values {
        [v] => Ok([*v, *v]),
        [x, y] => Ok([*x, *y]),
        other => Err(format!(
            "--{name} takes one or two values, found {}",
            other.len()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_channel_range() {
        assert_eq!(parse_channel_range("0,2").unwrap(), (0, 2));
        assert!(parse_channel_range("0").is_err());
        assert!(parse_channel_range("a,b").is_err());
    }

    #[test]
    fn parses_bg_range_both_arities() {
        assert_eq!(parse_bg_range("3,4").unwrap(), vec![3, 4]);
        assert_eq!(parse_bg_range("3,4,10,11").unwrap(), vec![3, 4, 10, 11]);
        assert!(parse_bg_range("3,4,5").is_err());
    }

    #[test]
    fn parses_polygon_arg_with_and_without_id() {
        assert_eq!(
            parse_polygon_arg("gate.txt").unwrap(),
            (PathBuf::from("gate.txt"), None)
        );
        assert_eq!(
            parse_polygon_arg("gate.txt,3").unwrap(),
            (PathBuf::from("gate.txt"), Some(3))
        );
    }

    #[test]
    fn normalizes_single_and_pair_factors() {
        assert_eq!(normalize_pair(&[2], "bin").unwrap(), [2, 2]);
        assert_eq!(normalize_pair(&[2, 3], "bin").unwrap(), [2, 3]);
        assert!(normalize_pair(&[1, 2, 3], "bin").is_err());
    }
}
