//! The per-subject processing plan: which FreeSurfer commands run for which parcellation, and
//! which tables are written from their outputs.
//!
//! Steps run one after another. A failing parcellation does not stop the others; its error is
//! written as a crash record and reported at the end.

use serde::Serialize;
use serde_json::json;
use tracing::{error, info};

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::atlas::Parcellation;
use crate::brain_measures::write_brain_measures;
use crate::config::PostConfig;
use crate::error::{FsPostError, Result};
use crate::fs_tools::{parcellation_stats, seg_stats, surface_transform, CommandRunner, FsCommand};
use crate::hemisphere::Hemisphere;
use crate::region_stats::{write_region_stats, HemiStatsFiles, RegionStatsInputs};

/// How a workflow treats its FreeSurfer commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Run the commands, then tabulate their outputs.
    Execute,
    /// Hand the commands to the runner, but write no tables.
    DryRun,
    /// Skip the commands and tabulate the stats files that already exist.
    TabulateOnly,
}

impl RunMode {
    pub fn from_config(config: &PostConfig) -> RunMode {
        if config.tabulate_only {
            RunMode::TabulateOnly
        } else if config.dry_run {
            RunMode::DryRun
        } else {
            RunMode::Execute
        }
    }
}

/// The commands for one hemisphere of one parcellation.
#[derive(Debug, Clone, PartialEq)]
pub struct HemiSteps {
    pub hemi: Hemisphere,
    /// Resampling of the fsaverage annotation, only for fsaverage parcellations.
    pub transform: Option<FsCommand>,
    pub parc_stats: FsCommand,
    pub seg_stats: FsCommand,
}

impl HemiSteps {
    pub fn commands(&self) -> Vec<&FsCommand> {
        self.transform
            .iter()
            .chain(std::iter::once(&self.parc_stats))
            .chain(std::iter::once(&self.seg_stats))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParcellationPlan {
    pub parcellation: Parcellation,
    pub steps: Vec<HemiSteps>,
    pub summary: RegionStatsInputs,
}

impl ParcellationPlan {
    pub fn node_name(&self) -> String {
        format!("parcellation_{}", self.parcellation.node_name())
    }
}

/// A step that failed, by name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepFailure {
    pub step: String,
    pub error: String,
}

/// What a workflow run produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub outputs: Vec<PathBuf>,
    pub failures: Vec<StepFailure>,
}

impl RunReport {
    /// Turn a report with failures into an error.
    pub fn into_result(self) -> Result<RunReport> {
        if self.failures.is_empty() {
            Ok(self)
        } else {
            Err(FsPostError::WorkflowFailed(self.failures.iter().map(|f| f.step.clone()).collect()))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Workflow {
    pub name: String,
    pub subject_id: String,
    pub session_id: Option<String>,
    /// The subject's FreeSurfer directory, `subjects_dir/fs_subject`.
    pub fs_dir: PathBuf,
    pub subjects_dir: PathBuf,
    /// The FreeSurfer subject name, which may include the session.
    pub fs_subject: String,
    pub output_dir: PathBuf,
    pub work_dir: PathBuf,
    pub mode: RunMode,
    pub parcellations: Vec<ParcellationPlan>,
}

/// Build the processing plan for one subject.
pub fn build_workflow(
    subject_id: &str,
    session_id: Option<&str>,
    subject_freesurfer_dir: &Path,
    output_dir: &Path,
    work_dir: &Path,
    config: &PostConfig,
) -> Result<Workflow> {
    let fs_subject = subject_freesurfer_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| {
            FsPostError::NotFound(format!("Invalid FreeSurfer directory: {}", subject_freesurfer_dir.display()))
        })?;
    let subjects_dir = subject_freesurfer_dir
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut parcellations = Vec::new();
    for parcellation in config.resolved_parcellations()? {
        parcellations.push(init_parcellation_plan(
            subject_id,
            session_id,
            &subjects_dir,
            &fs_subject,
            &parcellation,
            config,
        ));
    }

    let name = format!("freesurfer_post_{}", subject_id);
    Ok(Workflow {
        work_dir: work_dir.join(&name),
        name,
        subject_id: subject_id.to_string(),
        session_id: session_id.map(String::from),
        fs_dir: subject_freesurfer_dir.to_path_buf(),
        subjects_dir,
        fs_subject,
        output_dir: output_dir.to_path_buf(),
        mode: RunMode::from_config(config),
        parcellations,
    })
}

/// Plan the commands and the summary of a single parcellation.
pub fn init_parcellation_plan(
    subject_id: &str,
    session_id: Option<&str>,
    subjects_dir: &Path,
    fs_subject: &str,
    parcellation: &Parcellation,
    config: &PostConfig,
) -> ParcellationPlan {
    let fs_dir = subjects_dir.join(fs_subject);
    let parc = parcellation.name.as_str();
    let node = parcellation.node_name();

    let steps = Hemisphere::BOTH
        .iter()
        .map(|&hemi| {
            let native_annot = fs_dir.join("label").join(format!("{}.{}.annot", hemi, parc));
            let files = HemiStatsFiles::in_subject_dir(&fs_dir, hemi, parc);
            let transform = if parcellation.needs_transform() {
                Some(surface_transform(
                    &format!("{}_{}_transform", hemi, node),
                    subjects_dir,
                    &config.fsaverage_subject,
                    fs_subject,
                    hemi,
                    &config.annots_dir.join(format!("{}.{}.annot", hemi, parc)),
                    &native_annot,
                ))
            } else {
                None
            };
            HemiSteps {
                hemi,
                transform,
                parc_stats: parcellation_stats(
                    &format!("{}_{}_parcstats", hemi, node),
                    subjects_dir,
                    fs_subject,
                    hemi,
                    &native_annot,
                    &files.stats_file,
                ),
                seg_stats: seg_stats(
                    &format!("{}_{}_gwr_segstats", hemi, node),
                    subjects_dir,
                    fs_subject,
                    hemi,
                    parc,
                    &files.gwr_stats_file,
                ),
            }
        })
        .collect();

    ParcellationPlan {
        parcellation: parcellation.clone(),
        steps,
        summary: RegionStatsInputs {
            subject_id: subject_id.to_string(),
            session_id: session_id.map(String::from),
            atlas: parcellation.clone(),
            lh: HemiStatsFiles::in_subject_dir(&fs_dir, Hemisphere::Lh, parc),
            rh: HemiStatsFiles::in_subject_dir(&fs_dir, Hemisphere::Rh, parc),
        },
    }
}

impl Workflow {
    /// All commands of the workflow, in execution order.
    pub fn commands(&self) -> Vec<&FsCommand> {
        self.parcellations
            .iter()
            .flat_map(|p| p.steps.iter().flat_map(|s| s.commands()))
            .collect()
    }

    fn run_parcellation(&self, plan: &ParcellationPlan, runner: &dyn CommandRunner) -> Result<Option<PathBuf>> {
        if self.mode != RunMode::TabulateOnly {
            let log_dir = self.work_dir.join(plan.node_name());
            for steps in plan.steps.iter() {
                for cmd in steps.commands() {
                    runner.run(cmd, &log_dir)?;
                }
            }
        }
        if self.mode == RunMode::DryRun {
            return Ok(None);
        }
        let outputs = write_region_stats(&plan.summary, &self.output_dir)?;
        Ok(Some(outputs.tsv_file))
    }

    /// Write a crash record for a failed step to `<output_dir>/crash/`.
    fn write_crash_record(&self, step: &str, err: &FsPostError) -> Result<PathBuf> {
        let crash_dir = self.output_dir.join("crash");
        fs::create_dir_all(&crash_dir)?;
        let path = crash_dir.join(format!("crash-{}-{}.json", self.name, step));
        let record = json!({
            "workflow": self.name,
            "node": step,
            "subject_id": self.subject_id,
            "session_id": self.session_id,
            "error": err.to_string(),
        });
        serde_json::to_writer_pretty(BufWriter::new(File::create(&path)?), &record)?;
        Ok(path)
    }

    fn record_failure(&self, report: &mut RunReport, step: &str, err: FsPostError) {
        error!("Step {} of {} failed: {}", step, self.name, err);
        if let Err(crash_err) = self.write_crash_record(step, &err) {
            error!("Could not write crash record for {}: {}", step, crash_err);
        }
        report.failures.push(StepFailure {
            step: step.to_string(),
            error: err.to_string(),
        });
    }

    /// Run all parcellations, then collect the brain measures.
    pub fn run(&self, runner: &dyn CommandRunner) -> RunReport {
        info!(
            "Running workflow {} for {} parcellation(s) of {}",
            self.name,
            self.parcellations.len(),
            self.fs_dir.display()
        );
        let mut report = RunReport::default();

        for plan in self.parcellations.iter() {
            match self.run_parcellation(plan, runner) {
                Ok(Some(output)) => report.outputs.push(output),
                Ok(None) => {}
                Err(err) => self.record_failure(&mut report, &plan.node_name(), err),
            }
        }

        if self.mode != RunMode::DryRun {
            match write_brain_measures(&self.subject_id, self.session_id.as_deref(), &self.fs_dir, &self.output_dir) {
                Ok(outputs) => report.outputs.push(outputs.tsv_file),
                Err(err) => self.record_failure(&mut report, "fs_stats", err),
            }
        }

        info!(
            "Workflow {} finished with {} output(s) and {} failure(s)",
            self.name,
            report.outputs.len(),
            report.failures.len()
        );
        report
    }
}
