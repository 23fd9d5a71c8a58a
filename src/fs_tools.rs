//! Construction and execution of the external FreeSurfer commands.
//!
//! The pipeline only needs three FreeSurfer programs: `mri_surf2surf` to resample fsaverage
//! annotations onto the subject's surface, `mris_anatomical_stats` for the per-region
//! morphometry, and `mri_segstats` for the per-region gray/white contrast.

use tracing::{debug, info, warn};

use std::collections::BTreeMap;
use std::env;
use std::ffi::OsString;
use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{FsPostError, Result};
use crate::hemisphere::Hemisphere;

pub const MRI_SURF2SURF: &str = "mri_surf2surf";
pub const MRIS_ANATOMICAL_STATS: &str = "mris_anatomical_stats";
pub const MRI_SEGSTATS: &str = "mri_segstats";

/// The FreeSurfer programs the pipeline runs.
pub const REQUIRED_PROGRAMS: [&str; 3] = [MRI_SURF2SURF, MRIS_ANATOMICAL_STATS, MRI_SEGSTATS];

/// A single external command invocation, with the files it reads and writes.
#[derive(Debug, Clone, PartialEq)]
pub struct FsCommand {
    /// Unique step name, used for log files.
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub inputs: Vec<PathBuf>,
    pub outputs: Vec<PathBuf>,
}

impl FsCommand {
    pub fn new(name: &str, program: &str, subjects_dir: &Path) -> FsCommand {
        FsCommand {
            name: name.to_string(),
            program: program.to_string(),
            args: Vec::new(),
            env: vec![(String::from("SUBJECTS_DIR"), subjects_dir.display().to_string())],
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    fn arg<S: Into<String>>(mut self, arg: S) -> FsCommand {
        self.args.push(arg.into());
        self
    }

    fn path_arg(self, flag: &str, path: &Path) -> FsCommand {
        self.arg(flag).arg(path.display().to_string())
    }

    fn input(mut self, path: &Path) -> FsCommand {
        self.inputs.push(path.to_path_buf());
        self
    }

    fn output(mut self, path: &Path) -> FsCommand {
        self.outputs.push(path.to_path_buf());
        self
    }

    /// The inputs which do not exist (yet).
    pub fn missing_inputs(&self) -> Vec<&PathBuf> {
        self.inputs.iter().filter(|p| !p.exists()).collect()
    }

    pub fn outputs_exist(&self) -> bool {
        !self.outputs.is_empty() && self.outputs.iter().all(|p| p.exists())
    }

    /// Build the process for this command. Output handling is left to the caller.
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (key, value) in self.env.iter() {
            cmd.env(key, value);
        }
        cmd
    }
}

impl fmt::Display for FsCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.program, self.args.join(" "))
    }
}

/// Resample an fsaverage annotation onto the native surface of `subject`.
pub fn surface_transform(
    name: &str,
    subjects_dir: &Path,
    source_subject: &str,
    target_subject: &str,
    hemi: Hemisphere,
    source_annot: &Path,
    target_annot: &Path,
) -> FsCommand {
    FsCommand::new(name, MRI_SURF2SURF, subjects_dir)
        .arg("--srcsubject")
        .arg(source_subject)
        .arg("--trgsubject")
        .arg(target_subject)
        .arg("--hemi")
        .arg(hemi.as_str())
        .path_arg("--sval-annot", source_annot)
        .path_arg("--tval", target_annot)
        .input(source_annot)
        .output(target_annot)
}

/// Compute per-region anatomical stats for a parcellation, restricted to the cortex label.
///
/// `fs_dir` is the subject's FreeSurfer directory, `subjects_dir/subject`.
pub fn parcellation_stats(
    name: &str,
    subjects_dir: &Path,
    subject: &str,
    hemi: Hemisphere,
    annot: &Path,
    out_table: &Path,
) -> FsCommand {
    let fs_dir = subjects_dir.join(subject);
    let cortex_label = fs_dir.join("label").join(format!("{}.cortex.label", hemi));
    let thickness = fs_dir.join("surf").join(format!("{}.thickness", hemi));
    let white = fs_dir.join("surf").join(format!("{}.white", hemi));
    let pial = fs_dir.join("surf").join(format!("{}.pial", hemi));
    let ribbon = fs_dir.join("mri").join("ribbon.mgz");
    FsCommand::new(name, MRIS_ANATOMICAL_STATS, subjects_dir)
        .arg("-th3")
        .path_arg("-a", annot)
        .path_arg("-cortex", &cortex_label)
        .path_arg("-f", out_table)
        .arg("-noglobal")
        .arg(subject)
        .arg(hemi.as_str())
        .input(annot)
        .input(&cortex_label)
        .input(&thickness)
        .input(&white)
        .input(&pial)
        .input(&ribbon)
        .output(out_table)
}

/// Compute per-region summary stats of the gray/white percent contrast overlay `<hemi>.w-g.pct.mgh`.
pub fn seg_stats(
    name: &str,
    subjects_dir: &Path,
    subject: &str,
    hemi: Hemisphere,
    parc_name: &str,
    summary_file: &Path,
) -> FsCommand {
    let fs_dir = subjects_dir.join(subject);
    let in_file = fs_dir.join("surf").join(format!("{}.w-g.pct.mgh", hemi));
    let annot = fs_dir.join("label").join(format!("{}.{}.annot", hemi, parc_name));
    FsCommand::new(name, MRI_SEGSTATS, subjects_dir)
        .arg("--annot")
        .arg(subject)
        .arg(hemi.as_str())
        .arg(parc_name)
        .path_arg("--i", &in_file)
        .arg("--snr")
        .path_arg("--sum", summary_file)
        .input(&in_file)
        .input(&annot)
        .output(summary_file)
}

/// Executes [`FsCommand`]s.
pub trait CommandRunner {
    /// Run the command. Tool output goes to a log file inside `log_dir`.
    fn run(&self, cmd: &FsCommand, log_dir: &Path) -> Result<()>;
}

/// Runs the commands as child processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    /// Skip commands whose outputs already exist.
    pub reuse_existing: bool,
}

impl CommandRunner for ProcessRunner {
    fn run(&self, cmd: &FsCommand, log_dir: &Path) -> Result<()> {
        if self.reuse_existing && cmd.outputs_exist() {
            info!("Reusing existing outputs of step {}", cmd.name);
            return Ok(());
        }
        if let Some(missing) = cmd.missing_inputs().first() {
            return Err(FsPostError::MissingInput(missing.to_path_buf()));
        }
        for output in cmd.outputs.iter() {
            if let Some(parent) = output.parent() {
                fs::create_dir_all(parent)?;
            }
        }

        fs::create_dir_all(log_dir)?;
        let log_path = log_dir.join(format!("{}.log", cmd.name));
        let log = File::create(&log_path)?;
        info!("Running step {}: {}", cmd.name, cmd);
        let status = cmd
            .to_command()
            .stdout(Stdio::from(log.try_clone()?))
            .stderr(Stdio::from(log))
            .status()
            .map_err(|e| FsPostError::CommandFailed(cmd.program.clone(), e.to_string()))?;

        if status.success() {
            debug!("Step {} finished", cmd.name);
            Ok(())
        } else {
            Err(FsPostError::CommandFailed(
                cmd.program.clone(),
                format!("{}, see {}", status, log_path.display()),
            ))
        }
    }
}

/// Only logs the commands it would run.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunner;

impl CommandRunner for DryRunner {
    fn run(&self, cmd: &FsCommand, _log_dir: &Path) -> Result<()> {
        let missing = cmd.missing_inputs();
        if !missing.is_empty() {
            warn!("Step {} would miss {} input(s), e.g. {}", cmd.name, missing.len(), missing[0].display());
        }
        info!("[dry run] {}: SUBJECTS_DIR={} {}", cmd.name, env_value(cmd, "SUBJECTS_DIR"), cmd);
        Ok(())
    }
}

fn env_value<'a>(cmd: &'a FsCommand, key: &str) -> &'a str {
    cmd.env
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .unwrap_or("")
}

/// Find an executable file named `program` in the directories listed in `path`.
fn find_in_path(program: &str, path: &OsString) -> Option<PathBuf> {
    env::split_paths(path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

/// Check which FreeSurfer programs are available on the `PATH`, and whether `FREESURFER_HOME` is set.
pub fn check_toolchain() -> BTreeMap<String, bool> {
    let path = env::var_os("PATH").unwrap_or_default();
    let mut status: BTreeMap<String, bool> = REQUIRED_PROGRAMS
        .iter()
        .map(|program| (program.to_string(), find_in_path(program, &path).is_some()))
        .collect();
    status.insert(String::from("FREESURFER_HOME"), env::var_os("FREESURFER_HOME").is_some());
    status
}
