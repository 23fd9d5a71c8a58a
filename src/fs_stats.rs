//! Functions for reading FreeSurfer stats files.
//!
//! Stats files are the tabular text outputs of tools like `mris_anatomical_stats` and `mri_segstats`.
//! They consist of a commented header, which contains whole-brain `# Measure` lines and a single
//! `# ColHeaders` line naming the columns, followed by one whitespace-separated row per structure.

use regex::Regex;

use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::error::{FsPostError, Result};
use crate::util::open_maybe_gz;

const COL_HEADERS_TAG: &str = "# ColHeaders";
const MEASURE_PATTERN: &str = r"^# Measure ([A-Za-z]+), ([A-Za-z]+),* ([-A-Za-z ]+), ([0-9.]+), (.*)";

/// A whole-brain `# Measure` line, like `# Measure Cortex, NumVert, Number of Vertices, 136255, unitless`.
#[derive(Debug, Clone, PartialEq)]
pub struct FsMeasure {
    pub name: String,
    pub short_name: String,
    pub description: String,
    pub value: f64,
    pub unit: String,
}

/// Models a FreeSurfer stats file.
#[derive(Debug, Clone, PartialEq)]
pub struct FsStats {
    /// The part of the file name before the first dot, e.g. `lh` or `aseg`.
    pub name: String,
    pub col_headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub measures: Vec<FsMeasure>,
}

impl FsStats {
    /// Read a stats file. Files ending with ".gz" are GZip-decoded.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<FsStats> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().split('.').next().unwrap_or("").to_string())
            .unwrap_or_default();
        FsStats::from_reader(open_maybe_gz(path)?, &name).map_err(|e| match e {
            FsPostError::InvalidStatsFile(_, msg) => FsPostError::InvalidStatsFile(path.display().to_string(), msg),
            other => other,
        })
    }

    /// Parse a stats file from a reader. The `name` is stored as given.
    pub fn from_reader<S>(input: S, name: &str) -> Result<FsStats>
    where
        S: Read,
    {
        let lines: Vec<String> = BufReader::new(input).lines().collect::<std::result::Result<_, _>>()?;
        let invalid = |msg: String| FsPostError::InvalidStatsFile(name.to_string(), msg);

        let header_idx: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.starts_with(COL_HEADERS_TAG))
            .map(|(idx, _)| idx)
            .collect();
        if header_idx.len() != 1 {
            return Err(invalid(format!("expected exactly one '{}' line, found {}", COL_HEADERS_TAG, header_idx.len())));
        }
        let header_idx = header_idx[0];

        let col_headers: Vec<String> = lines[header_idx][COL_HEADERS_TAG.len()..]
            .split_whitespace()
            .map(String::from)
            .collect();
        if col_headers.is_empty() {
            return Err(invalid(String::from("the column header line is empty")));
        }

        let mut rows = Vec::new();
        for (line_idx, line) in lines.iter().enumerate().skip(header_idx + 1) {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let fields: Vec<String> = trimmed.split_whitespace().map(String::from).collect();
            if fields.len() != col_headers.len() {
                return Err(invalid(format!(
                    "line {} has {} fields, but there are {} columns",
                    line_idx + 1,
                    fields.len(),
                    col_headers.len()
                )));
            }
            rows.push(fields);
        }

        let measure_re = Regex::new(MEASURE_PATTERN)?;
        let mut measures = Vec::new();
        for line in lines.iter() {
            if let Some(caps) = measure_re.captures(line) {
                let value: f64 = caps[4]
                    .parse()
                    .map_err(|_| invalid(format!("cannot parse measure value '{}'", &caps[4])))?;
                measures.push(FsMeasure {
                    name: caps[1].to_string(),
                    short_name: caps[2].to_string(),
                    description: caps[3].trim().to_string(),
                    value,
                    unit: caps[5].trim().to_string(),
                });
            }
        }

        Ok(FsStats {
            name: name.to_string(),
            col_headers,
            rows,
            measures,
        })
    }

    /// Get the index of the named column.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.col_headers.iter().position(|c| c == column)
    }

    /// Get all values of the named column, in row order.
    pub fn column(&self, column: &str) -> Option<Vec<&str>> {
        let idx = self.column_index(column)?;
        Some(self.rows.iter().map(|row| row[idx].as_str()).collect())
    }

    /// The number of structures (rows) in the file.
    pub fn num_structures(&self) -> usize {
        self.rows.len()
    }
}

/// Read a FreeSurfer stats file.
///
/// # Examples
///
/// ```no_run
/// let stats = freesurfer_post::read_stats("/path/to/subjects_dir/subject1/stats/lh.aparc.stats").unwrap();
/// println!("Stats for {} structures.", stats.num_structures());
/// ```
pub fn read_stats<P: AsRef<Path>>(path: P) -> Result<FsStats> {
    FsStats::from_file(path)
}
