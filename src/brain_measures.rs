//! Whole-brain measures and quality control numbers of one subject, collected into a single-row table.
//!
//! The measures come from three places: the Euler numbers in `scripts/recon-all.log`, the
//! `# Measure` lines of the pial aparc stats files of both hemispheres, and both the rows and the
//! measures of `stats/aseg.stats`.

use serde_json::{json, Map, Value};
use tracing::{debug, info};

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::error::{FsPostError, Result};
use crate::fs_reconlog::EulerStats;
use crate::fs_stats::FsStats;
use crate::table::Table;
use crate::util::{format_float, output_prefix, snake_case_column};

#[derive(Debug, Clone, PartialEq)]
pub enum MeasureValue {
    Text(String),
    Number(f64),
    Missing,
}

impl MeasureValue {
    /// The value as written to a table cell.
    pub fn to_cell(&self) -> Option<String> {
        match self {
            MeasureValue::Text(s) => Some(s.clone()),
            MeasureValue::Number(v) => Some(format_float(*v)),
            MeasureValue::Missing => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeasureEntry {
    pub key: String,
    pub value: MeasureValue,
    pub description: String,
}

/// An insertion-ordered collection of named measures with descriptions.
#[derive(Debug, Clone, Default)]
pub struct MeasureSet {
    entries: Vec<MeasureEntry>,
    index: HashMap<String, usize>,
}

impl MeasureSet {
    pub fn new() -> MeasureSet {
        MeasureSet::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&MeasureEntry> {
        self.index.get(key).map(|&idx| &self.entries[idx])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn entries(&self) -> &[MeasureEntry] {
        &self.entries
    }

    /// Insert a measure, replacing the value of an existing key in place.
    pub fn insert(&mut self, key: &str, value: MeasureValue, description: &str) {
        let entry = MeasureEntry {
            key: key.to_string(),
            value,
            description: description.to_string(),
        };
        match self.index.get(key) {
            Some(&idx) => self.entries[idx] = entry,
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    /// Drop all measures for which the predicate on the key returns `true`.
    pub fn remove_where<F>(&mut self, predicate: F)
    where
        F: Fn(&str) -> bool,
    {
        self.entries.retain(|e| !predicate(&e.key));
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(idx, e)| (e.key.clone(), idx))
            .collect();
    }

    /// Add the Euler numbers and hole counts from the recon-all log.
    pub fn add_euler(&mut self, euler: &EulerStats) {
        self.insert("lh_euler", MeasureValue::Number(euler.lh_euler), "Left hemisphere Euler number from recon-all.log");
        self.insert("rh_euler", MeasureValue::Number(euler.rh_euler), "Right hemisphere Euler number from recon-all.log");
        self.insert("lh_holes", MeasureValue::Number(euler.lh_holes), "Left hemisphere number of holes from recon-all.log");
        self.insert("rh_holes", MeasureValue::Number(euler.rh_holes), "Right hemisphere number of holes from recon-all.log");
    }
}

/// Make a flattened `<StructName>_<column>` key safe as a column name.
fn clean_flat_name(name: &str) -> String {
    name.replace('-', "_")
        .replace("3rd", "Third")
        .replace("4th", "Fourth")
        .replace("5th", "Fifth")
}

/// Add every value of the stats table as its own measure, named `<StructName>_<column>`.
///
/// Measures are added column by column. The `Index` column is skipped. Numeric cells become
/// numbers, so `6541` and `9.0000` are both written as floats.
pub fn collect_stat_rows(stats: &FsStats, set: &mut MeasureSet) -> Result<()> {
    let struct_idx = stats.column_index("StructName").ok_or_else(|| {
        FsPostError::InvalidStatsFile(stats.name.clone(), String::from("no StructName column"))
    })?;

    for (col_idx, column) in stats.col_headers.iter().enumerate() {
        if col_idx == struct_idx || column == "Index" {
            continue;
        }
        for row in stats.rows.iter() {
            let struct_name = &row[struct_idx];
            let key = clean_flat_name(&format!("{}_{}", struct_name, column));
            if set.contains_key(&key) {
                return Err(FsPostError::DuplicateKey(key));
            }
            let description = format!(
                "The \"{}\" value for the \"{}\" structure. Originally in the stats/{} file.",
                column, struct_name, stats.name
            );
            let cell = &row[col_idx];
            let value = cell
                .parse::<f64>()
                .map(MeasureValue::Number)
                .unwrap_or_else(|_| MeasureValue::Text(cell.clone()));
            set.insert(&key, value, &description);
        }
    }
    Ok(())
}

/// Add the `# Measure` lines of a stats file.
///
/// The key is the measure name, joined with its short name if the two differ, and suffixed with
/// `_lh` or `_rh` if the stats file is hemisphere specific.
pub fn collect_stat_measures(stats: &FsStats, stats_path: &Path, set: &mut MeasureSet) -> Result<()> {
    let path_str = stats_path.to_string_lossy();
    let suffix = if path_str.contains("/rh.") {
        "_rh"
    } else if path_str.contains("/lh.") {
        "_lh"
    } else {
        ""
    };

    for measure in stats.measures.iter() {
        let base = if measure.name == measure.short_name {
            measure.name.clone()
        } else {
            format!("{}_{}", measure.name, measure.short_name)
        };
        let key = format!("{}{}", base, suffix);
        if let Some(existing) = set.get(&key) {
            if existing.value != MeasureValue::Number(measure.value) {
                return Err(FsPostError::DuplicateKey(key));
            }
        }
        let description = format!(
            "This is a whole-brain metadata measure with two possible labels, \"{}\" and \"{}\". It comes from the stats/{} file.",
            measure.name, measure.short_name, stats.name
        );
        set.insert(&key, MeasureValue::Number(measure.value), &description);
    }
    Ok(())
}

/// Collect all brain measures for a subject from its FreeSurfer directory `fs_dir`.
pub fn collect_brain_measures(subject_id: &str, session_id: Option<&str>, fs_dir: &Path) -> Result<MeasureSet> {
    let mut set = MeasureSet::new();
    set.insert("subject_id", MeasureValue::Text(subject_id.to_string()), "BIDS subject id");
    set.insert(
        "session_id",
        session_id.map_or(MeasureValue::Missing, |s| MeasureValue::Text(s.to_string())),
        "BIDS session id",
    );

    let euler = EulerStats::from_file(fs_dir.join("scripts").join("recon-all.log"))?;
    set.add_euler(&euler);

    let stats_dir = fs_dir.join("stats");
    for pial_stats in ["lh.aparc.pial.stats", "rh.aparc.pial.stats"].iter() {
        let path = stats_dir.join(pial_stats);
        debug!("Reading global measures from {}", path.display());
        let stats = FsStats::from_file(&path)?;
        collect_stat_measures(&stats, &path, &mut set)?;
    }

    let aseg_path = stats_dir.join("aseg.stats");
    let aseg = FsStats::from_file(&aseg_path)?;
    collect_stat_rows(&aseg, &mut set)?;
    collect_stat_measures(&aseg, &aseg_path, &mut set)?;

    // segmentation ids are the same for everyone
    set.remove_where(|key| key.contains("SegId"));
    Ok(set)
}

/// The column name in the output table for a measure key.
fn column_name(key: &str) -> String {
    if key == "subject_id" {
        String::from("participant_id")
    } else {
        snake_case_column(key)
    }
}

/// Turn the measures into a single-row table with `participant_id` as the first column.
pub fn brain_measures_table(set: &MeasureSet) -> Result<Table> {
    let mut table = Table::new(set.entries().iter().map(|e| column_name(&e.key)).collect());
    table.push_row(set.entries().iter().map(|e| e.value.to_cell()).collect())?;
    if table.column_index("participant_id").is_some() {
        table.move_column_to_front("participant_id")?;
    }
    Ok(table)
}

/// The column descriptions for the JSON sidecar, in measure order.
pub fn brain_measures_metadata(set: &MeasureSet) -> Map<String, Value> {
    let mut metadata = Map::new();
    for entry in set.entries().iter() {
        metadata.insert(column_name(&entry.key), json!({ "Description": entry.description }));
    }
    metadata
}

/// The files written by [`write_brain_measures`].
#[derive(Debug, Clone, PartialEq)]
pub struct BrainMeasuresOutputs {
    pub tsv_file: PathBuf,
    pub json_file: PathBuf,
}

/// Collect the brain measures and write them as TSV with a JSON sidecar to `<output_dir>/<subject_id>/`.
pub fn write_brain_measures(
    subject_id: &str,
    session_id: Option<&str>,
    fs_dir: &Path,
    output_dir: &Path,
) -> Result<BrainMeasuresOutputs> {
    let set = collect_brain_measures(subject_id, session_id, fs_dir)?;

    let subject_dir = output_dir.join(subject_id);
    fs::create_dir_all(&subject_dir)?;
    let prefix = output_prefix(subject_id, session_id);
    let outputs = BrainMeasuresOutputs {
        tsv_file: subject_dir.join(format!("{}_brainmeasures.tsv", prefix)),
        json_file: subject_dir.join(format!("{}_brainmeasures.json", prefix)),
    };

    serde_json::to_writer_pretty(BufWriter::new(File::create(&outputs.json_file)?), &brain_measures_metadata(&set))?;
    brain_measures_table(&set)?.write_tsv(&outputs.tsv_file)?;

    info!("Wrote {} brain measures to {}", set.len(), outputs.tsv_file.display());
    Ok(outputs)
}

#[cfg(test)]
mod test {
    use super::*;

    const ASEG: &str = "# Measure BrainSeg, BrainSegVol, Brain Segmentation Volume, 1243340.000000, mm^3
# Measure EstimatedTotalIntraCranialVol, eTIV, Estimated Total Intracranial Volume, 1588423.911, mm^3
# ColHeaders  Index SegId NVoxels Volume_mm3 StructName normMean
  1   4     6541     6320.4  Left-Lateral-Ventricle     32.1
  2  14      821      760.0  3rd-Ventricle              41.8
";

    #[test]
    fn stat_rows_are_flattened_column_by_column() {
        let stats = FsStats::from_reader(ASEG.as_bytes(), "aseg").unwrap();
        let mut set = MeasureSet::new();
        collect_stat_rows(&stats, &mut set).unwrap();

        let keys: Vec<&str> = set.entries().iter().map(|e| e.key.as_str()).collect();
        assert_eq!(
            vec![
                "Left_Lateral_Ventricle_SegId",
                "Third_Ventricle_SegId",
                "Left_Lateral_Ventricle_NVoxels",
                "Third_Ventricle_NVoxels",
                "Left_Lateral_Ventricle_Volume_mm3",
                "Third_Ventricle_Volume_mm3",
                "Left_Lateral_Ventricle_normMean",
                "Third_Ventricle_normMean",
            ],
            keys
        );
        let vol = set.get("Third_Ventricle_Volume_mm3").unwrap();
        assert_eq!(MeasureValue::Number(760.0), vol.value);
        assert_eq!(Some(String::from("760.0")), vol.value.to_cell());
        let voxels = set.get("Left_Lateral_Ventricle_NVoxels").unwrap();
        assert_eq!(Some(String::from("6541.0")), voxels.value.to_cell());
        assert_eq!(
            "The \"Volume_mm3\" value for the \"3rd-Ventricle\" structure. Originally in the stats/aseg file.",
            vol.description
        );
    }

    #[test]
    fn non_numeric_cells_stay_text() {
        let content = "# ColHeaders Index StructName Status\n1 Left-Hippocampus ok\n";
        let stats = FsStats::from_reader(content.as_bytes(), "aseg").unwrap();
        let mut set = MeasureSet::new();
        collect_stat_rows(&stats, &mut set).unwrap();
        assert_eq!(MeasureValue::Text(String::from("ok")), set.get("Left_Hippocampus_Status").unwrap().value);
    }

    #[test]
    fn duplicate_rows_are_an_error() {
        let stats = FsStats::from_reader(ASEG.as_bytes(), "aseg").unwrap();
        let mut set = MeasureSet::new();
        collect_stat_rows(&stats, &mut set).unwrap();
        assert!(matches!(collect_stat_rows(&stats, &mut set), Err(FsPostError::DuplicateKey(_))));
    }

    #[test]
    fn measures_get_hemisphere_suffixes() {
        let content = "# Measure Cortex, NumVert, Number of Vertices, 136255, unitless\n# ColHeaders StructName NumVert\n";
        let stats = FsStats::from_reader(content.as_bytes(), "lh").unwrap();
        let mut set = MeasureSet::new();
        collect_stat_measures(&stats, Path::new("/data/sub-01/stats/lh.aparc.pial.stats"), &mut set).unwrap();
        assert_eq!(MeasureValue::Number(136255.0), set.get("Cortex_NumVert_lh").unwrap().value);

        let aseg = FsStats::from_reader(ASEG.as_bytes(), "aseg").unwrap();
        collect_stat_measures(&aseg, Path::new("/data/sub-01/stats/aseg.stats"), &mut set).unwrap();
        assert!(set.contains_key("BrainSeg_BrainSegVol"));
        assert!(set.contains_key("EstimatedTotalIntraCranialVol_eTIV"));
    }

    #[test]
    fn repeated_measures_must_agree() {
        let stats = FsStats::from_reader(ASEG.as_bytes(), "aseg").unwrap();
        let path = Path::new("/data/sub-01/stats/aseg.stats");
        let mut set = MeasureSet::new();
        collect_stat_measures(&stats, path, &mut set).unwrap();
        collect_stat_measures(&stats, path, &mut set).unwrap();
        assert_eq!(2, set.len());

        set.insert("BrainSeg_BrainSegVol", MeasureValue::Number(1.0), "other");
        assert!(collect_stat_measures(&stats, path, &mut set).is_err());
    }

    #[test]
    fn table_starts_with_participant_id_and_has_one_row() {
        let mut set = MeasureSet::new();
        set.insert("lh_euler", MeasureValue::Number(-40.0), "euler");
        set.insert("subject_id", MeasureValue::Text(String::from("sub-01")), "BIDS subject id");
        set.insert("session_id", MeasureValue::Missing, "BIDS session id");
        set.insert("Left-Lateral-Ventricle_Volume_mm3", MeasureValue::Text(String::from("6320.4")), "vol");

        let table = brain_measures_table(&set).unwrap();
        assert_eq!(
            vec!["participant_id", "lh_euler", "session_id", "left_lateral_ventricle_volume_mm3"],
            table.columns
        );
        assert_eq!(
            vec![Some(String::from("sub-01")), Some(String::from("-40.0")), None, Some(String::from("6320.4"))],
            table.rows[0]
        );
        let metadata = brain_measures_metadata(&set);
        assert_eq!("BIDS subject id", metadata["participant_id"]["Description"]);
    }

    #[test]
    fn segids_can_be_removed() {
        let stats = FsStats::from_reader(ASEG.as_bytes(), "aseg").unwrap();
        let mut set = MeasureSet::new();
        collect_stat_rows(&stats, &mut set).unwrap();
        set.remove_where(|key| key.contains("SegId"));
        assert_eq!(6, set.len());
        assert!(set.get("Third_Ventricle_NVoxels").is_some());
        assert!(set.get("Third_Ventricle_SegId").is_none());
    }
}
