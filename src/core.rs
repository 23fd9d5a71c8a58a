//! Processing entry points: resolving what to process, running the workflows, and mapping
//! per-vertex data onto an atlas.

use ndarray::Array1;
use ndarray_stats::QuantileExt;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::PostConfig;
use crate::error::{FsPostError, Result};
use crate::fs_annot::FsAnnot;
use crate::fs_curv::FsCurv;
use crate::fs_label::FsLabel;
use crate::fs_mgh::FsMgh;
use crate::fs_tools::{CommandRunner, DryRunner, ProcessRunner};
use crate::subjects::{find_freesurfer_dir, find_freesurfer_subjects};
use crate::table::Table;
use crate::util::format_float;
use crate::workflow::{build_workflow, RunMode, StepFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingLevel {
    /// Process a single subject.
    Subject,
    /// Process every subject found in the subjects directory.
    Group,
}

impl FromStr for ProcessingLevel {
    type Err = FsPostError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "subject" => Ok(ProcessingLevel::Subject),
            "group" => Ok(ProcessingLevel::Group),
            other => Err(FsPostError::Config(format!("invalid processing level '{}'", other))),
        }
    }
}

impl fmt::Display for ProcessingLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProcessingLevel::Subject => write!(f, "subject"),
            ProcessingLevel::Group => write!(f, "group"),
        }
    }
}

/// What to process, and how.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingRequest {
    /// A FreeSurfer `SUBJECTS_DIR`, or a single subject directory.
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub subject_id: Option<String>,
    pub session_id: Option<String>,
    pub processing_level: ProcessingLevel,
    pub config: PostConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingReport {
    pub subject_ids: Vec<String>,
    pub session_id: Option<String>,
    pub processing_level: ProcessingLevel,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub status: String,
    pub processed_files: Vec<PathBuf>,
    pub failures: Vec<StepFailure>,
}

impl ProcessingReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// One subject to run the workflow for.
struct SubjectTarget {
    subject_id: String,
    session_id: Option<String>,
    fs_dir: PathBuf,
}

/// Work out which subject directories the request refers to.
fn resolve_targets(request: &ProcessingRequest) -> Result<Vec<SubjectTarget>> {
    let input = &request.input_path;
    match request.processing_level {
        ProcessingLevel::Subject => {
            if input.join("surf").is_dir() {
                // The input is a subject directory itself.
                let subject_id = match &request.subject_id {
                    Some(id) => id.clone(),
                    None => input
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .ok_or(FsPostError::SubjectDetection)?,
                };
                Ok(vec![SubjectTarget {
                    subject_id,
                    session_id: request.session_id.clone(),
                    fs_dir: input.clone(),
                }])
            } else {
                let subject_id = request.subject_id.clone().ok_or(FsPostError::SubjectDetection)?;
                let fs_dir = find_freesurfer_dir(input, &subject_id, request.session_id.as_deref())?;
                Ok(vec![SubjectTarget {
                    subject_id,
                    session_id: request.session_id.clone(),
                    fs_dir,
                }])
            }
        }
        ProcessingLevel::Group => {
            let subjects = find_freesurfer_subjects(input)?;
            if subjects.is_empty() {
                return Err(FsPostError::NotFound(format!(
                    "No FreeSurfer subjects found in {}",
                    input.display()
                )));
            }
            Ok(subjects
                .into_iter()
                .map(|subject_id| SubjectTarget {
                    fs_dir: input.join(&subject_id),
                    subject_id,
                    session_id: None,
                })
                .collect())
        }
    }
}

/// Process FreeSurfer data: build and run the workflow for every subject the request refers to.
///
/// Failed steps do not abort the run; they are listed in the report, whose status is then `failed`.
pub fn process_data(request: &ProcessingRequest) -> Result<ProcessingReport> {
    debug!("Processing request: {:?}", request);
    request.config.validate()?;

    fs::create_dir_all(&request.output_path)?;
    if !request.input_path.exists() {
        return Err(FsPostError::NotFound(format!(
            "Input path does not exist: {}",
            request.input_path.display()
        )));
    }

    let targets = resolve_targets(request)?;
    let work_dir = request
        .config
        .work_dir
        .clone()
        .unwrap_or_else(|| request.output_path.join("work"));

    let mode = RunMode::from_config(&request.config);
    let runner: Box<dyn CommandRunner> = match mode {
        RunMode::DryRun => Box::new(DryRunner),
        _ => Box::new(ProcessRunner {
            reuse_existing: request.config.reuse_existing,
        }),
    };

    let mut report = ProcessingReport {
        subject_ids: Vec::new(),
        session_id: request.session_id.clone(),
        processing_level: request.processing_level,
        input_path: request.input_path.clone(),
        output_path: request.output_path.clone(),
        status: String::new(),
        processed_files: Vec::new(),
        failures: Vec::new(),
    };

    for target in targets.iter() {
        info!("Processing subject {} from {}", target.subject_id, target.fs_dir.display());
        let workflow = build_workflow(
            &target.subject_id,
            target.session_id.as_deref(),
            &target.fs_dir,
            &request.output_path,
            &work_dir,
            &request.config,
        )?;
        let run = workflow.run(runner.as_ref());
        report.subject_ids.push(target.subject_id.clone());
        report.processed_files.extend(run.outputs);
        report.failures.extend(run.failures);
    }

    report.status = if report.is_success() {
        String::from("completed")
    } else {
        warn!("{} step(s) failed", report.failures.len());
        String::from("failed")
    };
    Ok(report)
}

/// Load per-vertex surface data from a `.mgh`/`.mgz` overlay or a curv file.
pub fn load_surface_data<P: AsRef<Path>>(filepath: P) -> Result<Array1<f32>> {
    let filepath = filepath.as_ref();
    if !filepath.exists() {
        return Err(FsPostError::NotFound(format!("File not found: {}", filepath.display())));
    }
    let name = filepath.to_string_lossy().to_lowercase();
    if name.ends_with(".mgh") || name.ends_with(".mgz") || name.ends_with(".mgh.gz") {
        Ok(Array1::from(FsMgh::from_file(filepath)?.vertex_data()?))
    } else {
        Ok(FsCurv::from_file(filepath)?.data)
    }
}

/// Summary statistics of per-vertex data within one atlas region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionSummary {
    pub region: String,
    pub num_vertices: usize,
    pub mean: Option<f32>,
    pub std: Option<f32>,
    pub min: Option<f32>,
    pub max: Option<f32>,
}

/// Summarize per-vertex data within each region of the annotation.
///
/// If a cortex label is given, only its vertices are considered, which excludes the medial wall.
pub fn map_to_atlas(data: &Array1<f32>, annot: &FsAnnot, cortex: Option<&FsLabel>) -> Result<Vec<RegionSummary>> {
    if data.len() != annot.num_vertices() {
        return Err(FsPostError::Table(format!(
            "the data has {} values, but the annotation covers {} vertices",
            data.len(),
            annot.num_vertices()
        )));
    }
    let mask = cortex.map(|label| label.vertex_set());

    let mut summaries = Vec::with_capacity(annot.num_regions());
    for region in annot.colortable.name.iter() {
        let vertices = annot.region_vertices(region).unwrap_or_default();
        let values: Array1<f32> = vertices
            .iter()
            .filter(|v| mask.as_ref().map_or(true, |m| m.contains(*v)))
            .map(|&v| data[v])
            .collect();

        let num_vertices = values.len();
        summaries.push(RegionSummary {
            region: region.clone(),
            num_vertices,
            mean: values.mean(),
            std: if num_vertices > 0 { Some(values.std(0.0)) } else { None },
            min: values.min().ok().copied(),
            max: values.max().ok().copied(),
        });
    }
    Ok(summaries)
}

/// Turn region summaries into a table with `atlas` and `hemisphere` columns.
pub fn region_summary_table(summaries: &[RegionSummary], atlas: &str, hemisphere: &str) -> Result<Table> {
    let mut table = Table::new(vec!["atlas", "hemisphere", "region", "num_vertices", "mean", "std", "min", "max"]);
    let cell = |v: Option<f32>| v.map(|v| format_float(v as f64));
    for s in summaries.iter() {
        table.push_row(vec![
            Some(atlas.to_string()),
            Some(hemisphere.to_string()),
            Some(s.region.clone()),
            Some(s.num_vertices.to_string()),
            cell(s.mean),
            cell(s.std),
            cell(s.min),
            cell(s.max),
        ])?;
    }
    Ok(table)
}

/// Output formats for [`save_results`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultFormat {
    Json,
    Csv,
}

impl FromStr for ResultFormat {
    type Err = FsPostError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(ResultFormat::Json),
            "csv" => Ok(ResultFormat::Csv),
            other => Err(FsPostError::UnsupportedFormat(other.to_string())),
        }
    }
}

fn csv_cell(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Turn JSON into a table: an object with a `data` array of records, or a single record.
fn value_to_table(data: &Value) -> Result<Table> {
    let records: Vec<&serde_json::Map<String, Value>> = match data.get("data").and_then(Value::as_array) {
        Some(items) => items
            .iter()
            .map(|item| {
                item.as_object()
                    .ok_or_else(|| FsPostError::Table(String::from("Cannot convert data to CSV format")))
            })
            .collect::<Result<_>>()?,
        None => vec![data
            .as_object()
            .ok_or_else(|| FsPostError::Table(String::from("Cannot convert data to CSV format")))?],
    };

    let mut columns: Vec<String> = Vec::new();
    for record in records.iter() {
        for key in record.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }
    let mut table = Table::new(columns.clone());
    for record in records.iter() {
        table.push_row(columns.iter().map(|c| record.get(c).and_then(csv_cell)).collect())?;
    }
    Ok(table)
}

/// Save processing results as JSON or CSV, creating parent directories as needed.
pub fn save_results<T: Serialize>(data: &T, output_path: &Path, format: ResultFormat) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let value = serde_json::to_value(data)?;
    match format {
        ResultFormat::Json => {
            fs::write(output_path, serde_json::to_string_pretty(&value)?)?;
        }
        ResultFormat::Csv => value_to_table(&value)?.write_csv(output_path)?,
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fs_annot::test::annot_bytes;
    use approx::assert_relative_eq;
    use serde_json::json;

    fn demo_annot() -> FsAnnot {
        let regions = [("unknown", 25, 5, 25), ("bankssts", 25, 100, 40), ("cuneus", 220, 180, 140)];
        let bytes = annot_bytes(&regions, &[0, 1, 1, 1, 0, 0]);
        FsAnnot::from_reader(&mut bytes.as_slice()).unwrap()
    }

    #[test]
    fn region_statistics_are_computed() {
        let annot = demo_annot();
        let data = Array1::from(vec![0.0, 2.0, 3.0, 4.0, 0.0, 0.0]);
        let summaries = map_to_atlas(&data, &annot, None).unwrap();

        assert_eq!(3, summaries.len());
        let bankssts = &summaries[1];
        assert_eq!("bankssts", bankssts.region);
        assert_eq!(3, bankssts.num_vertices);
        assert_relative_eq!(3.0, bankssts.mean.unwrap());
        assert_relative_eq!((2.0f32 / 3.0).sqrt(), bankssts.std.unwrap(), epsilon = 1e-6);
        assert_eq!(Some(2.0), bankssts.min);
        assert_eq!(Some(4.0), bankssts.max);

        let cuneus = &summaries[2];
        assert_eq!(0, cuneus.num_vertices);
        assert_eq!(None, cuneus.mean);
        assert_eq!(None, cuneus.max);
    }

    #[test]
    fn cortex_label_restricts_vertices() {
        let annot = demo_annot();
        let data = Array1::from(vec![0.0, 2.0, 3.0, 4.0, 0.0, 0.0]);
        let cortex = FsLabel::from_reader("#!ascii label\n2\n1 0 0 0 0\n3 0 0 0 0\n".as_bytes()).unwrap();
        let summaries = map_to_atlas(&data, &annot, Some(&cortex)).unwrap();
        assert_eq!(2, summaries[1].num_vertices);
        assert_relative_eq!(3.0, summaries[1].mean.unwrap());
        assert_eq!(0, summaries[0].num_vertices);
    }

    #[test]
    fn mismatching_vertex_counts_are_rejected() {
        let annot = demo_annot();
        let data = Array1::from(vec![1.0, 2.0]);
        assert!(map_to_atlas(&data, &annot, None).is_err());
    }

    #[test]
    fn summary_table_has_missing_values_for_empty_regions() {
        let annot = demo_annot();
        let data = Array1::from(vec![0.0, 2.0, 3.0, 4.0, 0.0, 0.0]);
        let summaries = map_to_atlas(&data, &annot, None).unwrap();
        let table = region_summary_table(&summaries, "aparc", "lh").unwrap();
        assert_eq!(3, table.num_rows());
        assert_eq!(Some("3.0"), table.rows[1][4].as_deref());
        assert_eq!(None, table.rows[2][4]);
    }

    #[test]
    fn missing_surface_data_is_reported() {
        assert!(matches!(load_surface_data("dummy_path.mgh"), Err(FsPostError::NotFound(_))));
    }

    #[test]
    fn results_are_saved_as_json_and_csv() {
        let dir = tempfile::tempdir().unwrap();
        let data = json!({"test": "value", "number": 42});
        let json_path = dir.path().join("out").join("results.json");
        save_results(&data, &json_path, ResultFormat::Json).unwrap();
        let loaded: Value = serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(data, loaded);

        let records = json!({"data": [{"col1": 1, "col2": "a"}, {"col1": 2, "col2": "b"}]});
        let csv_path = dir.path().join("results.csv");
        save_results(&records, &csv_path, ResultFormat::Csv).unwrap();
        assert_eq!("col1,col2\n1,a\n2,b\n", fs::read_to_string(&csv_path).unwrap());
    }

    #[test]
    fn processing_levels_are_parsed() {
        assert_eq!(ProcessingLevel::Group, "group".parse::<ProcessingLevel>().unwrap());
        assert_eq!(ProcessingLevel::Subject, "subject".parse::<ProcessingLevel>().unwrap());
        assert!("participant".parse::<ProcessingLevel>().is_err());
        assert_eq!("group", ProcessingLevel::Group.to_string());
    }

    #[test]
    fn unsupported_result_formats_are_rejected() {
        assert!(matches!("pkl".parse::<ResultFormat>(), Err(FsPostError::UnsupportedFormat(_))));
        assert_eq!(ResultFormat::Csv, "csv".parse::<ResultFormat>().unwrap());
    }

    #[test]
    fn subject_id_is_detected_from_subject_directories() {
        let dir = tempfile::tempdir().unwrap();
        let subject_dir = dir.path().join("sub-01");
        fs::create_dir_all(subject_dir.join("surf")).unwrap();
        let request = ProcessingRequest {
            input_path: subject_dir.clone(),
            output_path: dir.path().join("out"),
            subject_id: None,
            session_id: None,
            processing_level: ProcessingLevel::Subject,
            config: PostConfig::default(),
        };
        let targets = resolve_targets(&request).unwrap();
        assert_eq!(1, targets.len());
        assert_eq!("sub-01", targets[0].subject_id);
        assert_eq!(subject_dir, targets[0].fs_dir);
    }

    #[test]
    fn missing_subject_id_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("not_a_subject");
        fs::create_dir_all(&input).unwrap();
        let request = ProcessingRequest {
            input_path: input,
            output_path: dir.path().join("out"),
            subject_id: None,
            session_id: None,
            processing_level: ProcessingLevel::Subject,
            config: PostConfig::default(),
        };
        let err = process_data(&request).unwrap_err();
        assert!(err.to_string().contains("Could not detect subject ID"));
    }

    #[test]
    fn nonexistent_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let request = ProcessingRequest {
            input_path: dir.path().join("nonexistent"),
            output_path: dir.path().join("out"),
            subject_id: Some(String::from("sub-01")),
            session_id: None,
            processing_level: ProcessingLevel::Subject,
            config: PostConfig::default(),
        };
        assert!(matches!(process_data(&request), Err(FsPostError::NotFound(_))));
        assert!(dir.path().join("out").is_dir());
    }
}
