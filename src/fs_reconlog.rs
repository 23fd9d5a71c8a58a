//! Quality control numbers from the `scripts/recon-all.log` file of a FreeSurfer subject.
//!
//! During topology fixing, recon-all logs lines like `orig.nofix lheno =  -40, rheno =  -28`
//! and `orig.nofix lhholes =   21, rhholes =   15`. The Euler number of a closed surface with
//! genus 0 is 2; every hole (topological defect) lowers it by 2.

use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::error::{FsPostError, Result};
use crate::util::open_maybe_gz;

/// Euler numbers and hole counts of the uncorrected surfaces of both hemispheres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EulerStats {
    pub lh_euler: f64,
    pub rh_euler: f64,
    pub lh_holes: f64,
    pub rh_holes: f64,
}

impl EulerStats {
    /// Read the Euler statistics from a recon-all log file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<EulerStats> {
        EulerStats::from_reader(open_maybe_gz(path)?)
    }

    pub fn from_reader<S>(input: S) -> Result<EulerStats>
    where
        S: Read,
    {
        let lines: Vec<String> = BufReader::new(input)
            .lines()
            .map(|l| l.map(|l| l.trim().to_string()))
            .collect::<std::result::Result<_, _>>()?;

        let (lh_euler, rh_euler) = read_qc_pair(&lines, "lheno")?;
        let (lh_holes, rh_holes) = read_qc_pair(&lines, "lhholes")?;
        Ok(EulerStats {
            lh_euler,
            rh_euler,
            lh_holes,
            rh_holes,
        })
    }
}

/// Find the single line containing `target` and return its (lh, rh) values.
fn read_qc_pair(lines: &[String], target: &str) -> Result<(f64, f64)> {
    let matching: Vec<&String> = lines.iter().filter(|line| line.contains(target)).collect();
    if matching.len() != 1 {
        return Err(FsPostError::InvalidReconLog(format!(
            "expected exactly one line containing '{}', found {}",
            target,
            matching.len()
        )));
    }
    let cleaned = matching[0].replace(',', "");
    let tokens: Vec<&str> = cleaned.split_whitespace().collect();
    if tokens.len() < 4 {
        return Err(FsPostError::InvalidReconLog(format!("too few tokens in line '{}'", matching[0])));
    }
    let parse = |token: &str| -> Result<f64> {
        token
            .parse::<f64>()
            .map_err(|_| FsPostError::InvalidReconLog(format!("cannot parse '{}' in line '{}'", token, matching[0])))
    };
    let rh = parse(tokens[tokens.len() - 1])?;
    let lh = parse(tokens[tokens.len() - 4])?;
    Ok((lh, rh))
}

/// Read Euler numbers and hole counts from a recon-all log file.
pub fn read_euler_from_log<P: AsRef<Path>>(path: P) -> Result<EulerStats> {
    EulerStats::from_file(path)
}
