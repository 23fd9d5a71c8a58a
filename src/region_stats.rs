//! Per-region surface statistics for one atlas, merged across hemispheres.
//!
//! For each hemisphere, the anatomical stats written by `mris_anatomical_stats` (area, thickness,
//! curvature, ...) are merged with the gray/white percent contrast stats written by `mri_segstats`,
//! whose columns get the suffix `_wgpct`. The result is a single long-format table with one row per
//! subject, session, atlas, hemisphere and structure.

use serde_json::{json, Map, Value};
use tracing::{debug, info};

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::atlas::Parcellation;
use crate::error::{FsPostError, Result};
use crate::fs_stats::FsStats;
use crate::hemisphere::Hemisphere;
use crate::table::Table;
use crate::util::{output_prefix, snake_case_column};

/// Columns which never get a suffix, because they identify the structure rather than measure it.
pub const NOSUFFIX_COLS: [&str; 3] = ["Index", "SegId", "StructName"];

/// The suffix for columns from the gray/white contrast stats files.
pub const WGPCT_SUFFIX: &str = "_wgpct";

/// Pairs of columns which both stats files report, with the absolute tolerance for their agreement.
const REDUNDANT_COLUMNS: [(&str, &str, f32); 2] = [("NumVert", "NVertices_wgpct", 0.0), ("SurfArea", "Area_mm2_wgpct", 1.0)];

/// The stats files of one hemisphere.
#[derive(Debug, Clone, PartialEq)]
pub struct HemiStatsFiles {
    /// Output of `mris_anatomical_stats`, e.g. `stats/lh.aparc.stats`.
    pub stats_file: PathBuf,
    /// Output of `mri_segstats` on the `w-g.pct.mgh` overlay, e.g. `stats/lh.aparc.g-w.pct.stats`.
    pub gwr_stats_file: PathBuf,
}

impl HemiStatsFiles {
    /// The default locations inside a FreeSurfer subject directory.
    pub fn in_subject_dir(fs_dir: &Path, hemi: Hemisphere, parc_name: &str) -> HemiStatsFiles {
        HemiStatsFiles {
            stats_file: fs_dir.join("stats").join(format!("{}.{}.stats", hemi, parc_name)),
            gwr_stats_file: fs_dir.join("stats").join(format!("{}.{}.g-w.pct.stats", hemi, parc_name)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionStatsInputs {
    pub subject_id: String,
    pub session_id: Option<String>,
    pub atlas: Parcellation,
    pub lh: HemiStatsFiles,
    pub rh: HemiStatsFiles,
}

impl RegionStatsInputs {
    pub fn files(&self, hemi: Hemisphere) -> &HemiStatsFiles {
        match hemi {
            Hemisphere::Lh => &self.lh,
            Hemisphere::Rh => &self.rh,
        }
    }
}

/// The files written by [`write_region_stats`].
#[derive(Debug, Clone, PartialEq)]
pub struct RegionStatsOutputs {
    pub tsv_file: PathBuf,
    pub json_file: PathBuf,
}

/// Turn a parsed stats file into a table with leading `atlas` and `hemisphere` columns.
///
/// The `column_suffix` is appended to all stats columns, except for those in [`NOSUFFIX_COLS`].
pub fn stats_to_table(stats: &FsStats, hemi: Hemisphere, atlas: &str, column_suffix: &str) -> Result<Table> {
    let mut columns = vec![String::from("atlas"), String::from("hemisphere")];
    columns.extend(stats.col_headers.iter().map(|col| {
        if NOSUFFIX_COLS.contains(&col.as_str()) {
            col.clone()
        } else {
            format!("{}{}", col, column_suffix)
        }
    }));

    let mut table = Table::new(columns);
    for row in stats.rows.iter() {
        let mut cells = vec![Some(atlas.to_string()), Some(hemi.to_string())];
        cells.extend(row.iter().map(|v| Some(v.clone())));
        table.push_row(cells)?;
    }
    Ok(table)
}

/// Like numpy's `allclose` with the default relative tolerance, computed in single precision.
fn all_close(reference: &[f32], other: &[f32], atol: f32) -> bool {
    const RTOL: f32 = 1e-5;
    reference.len() == other.len()
        && reference
            .iter()
            .zip(other.iter())
            .all(|(a, b)| (a - b).abs() <= atol + RTOL * b.abs())
}

fn float_column(table: &Table, column: &str) -> Result<Vec<f32>> {
    table
        .column_values(column)?
        .into_iter()
        .map(|v| match v {
            Some(s) => s
                .parse::<f32>()
                .map_err(|_| FsPostError::Table(format!("cannot parse '{}' in column '{}' as a number", s, column))),
            None => Ok(f32::NAN),
        })
        .collect()
}

/// Check that two columns agree, then drop the redundant one.
fn sanity_check_columns(table: &mut Table, reference: &str, redundant: &str, atol: f32) -> Result<()> {
    let ref_values = float_column(table, reference)?;
    let red_values = float_column(table, redundant)?;
    if !all_close(&ref_values, &red_values, atol) {
        return Err(FsPostError::SanityCheck(reference.to_string(), redundant.to_string()));
    }
    table.drop_column(redundant)
}

/// Merge the stats files of both hemispheres into the region stats table.
///
/// The returned table has snake case columns, starting with `participant_id` and `session_id`.
pub fn summarize_region_stats(inputs: &RegionStatsInputs) -> Result<Table> {
    let atlas = inputs.atlas.name.as_str();
    let mut hemi_tables = Vec::with_capacity(2);

    for hemi in Hemisphere::BOTH.iter() {
        let files = inputs.files(*hemi);
        debug!("Reading {} stats for atlas {} from {}", hemi, atlas, files.stats_file.display());
        let surfstats = stats_to_table(&FsStats::from_file(&files.stats_file)?, *hemi, atlas, "")?;
        let gwpct = stats_to_table(&FsStats::from_file(&files.gwr_stats_file)?, *hemi, atlas, WGPCT_SUFFIX)?;
        hemi_tables.push(surfstats.inner_join(&gwpct)?);
    }

    let mut table = Table::concat(hemi_tables)?;
    table.insert_column(0, "session_id", inputs.session_id.as_deref())?;
    table.insert_column(0, "subject_id", Some(inputs.subject_id.as_str()))?;

    for (reference, redundant, atol) in REDUNDANT_COLUMNS.iter() {
        sanity_check_columns(&mut table, reference, redundant, *atol)?;
    }

    table.map_column_names(snake_case_column);
    table.rename_column("subject_id", "participant_id")?;
    table.move_column_to_front("participant_id")?;
    Ok(table)
}

/// The column descriptions for the JSON sidecar of a region stats table.
pub fn region_stats_metadata(table: &Table) -> Map<String, Value> {
    let mut metadata = Map::new();
    for col in table.columns.iter() {
        let description = match col.as_str() {
            "participant_id" => String::from("BIDS participant ID"),
            "session_id" => String::from("BIDS session ID"),
            "hemisphere" => String::from("Brain hemisphere (lh or rh)"),
            "atlas" => String::from("Atlas used for parcellation"),
            other => format!("Surface statistic: {}", other),
        };
        metadata.insert(col.clone(), json!({ "Description": description }));
    }
    metadata
}

/// Summarize the region stats and write them as TSV with a JSON sidecar to `<output_dir>/<subject_id>/`.
pub fn write_region_stats(inputs: &RegionStatsInputs, output_dir: &Path) -> Result<RegionStatsOutputs> {
    let table = summarize_region_stats(inputs)?;

    let subject_dir = output_dir.join(&inputs.subject_id);
    fs::create_dir_all(&subject_dir)?;
    let stem = format!(
        "{}_seg-{}_surfacestats",
        output_prefix(&inputs.subject_id, inputs.session_id.as_deref()),
        inputs.atlas.output_name()
    );
    let outputs = RegionStatsOutputs {
        tsv_file: subject_dir.join(format!("{}.tsv", stem)),
        json_file: subject_dir.join(format!("{}.json", stem)),
    };

    let metadata = region_stats_metadata(&table);
    serde_json::to_writer_pretty(BufWriter::new(File::create(&outputs.json_file)?), &metadata)?;
    table.write_tsv(&outputs.tsv_file)?;

    info!(
        "Wrote {} region stats rows for atlas {} to {}",
        table.num_rows(),
        inputs.atlas,
        outputs.tsv_file.display()
    );
    Ok(outputs)
}
