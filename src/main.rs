//! freesurfer-post CLI: tabulate FreeSurfer outputs and summarize surface data within atlas regions.

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use freesurfer_post::config::{load_config, PostConfig};
use freesurfer_post::core::{
    load_surface_data, map_to_atlas, process_data, region_summary_table, save_results, ProcessingLevel,
    ProcessingRequest, ResultFormat,
};
use freesurfer_post::fs_tools::check_toolchain;
use freesurfer_post::subjects::find_freesurfer_subjects;
use freesurfer_post::{logging, FsAnnot, FsLabel, FsPostError, Hemisphere, Parcellation};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "freesurfer-post")]
#[command(about = "Tabulate FreeSurfer surface reconstructions into regional statistics")]
#[command(version)]
struct Cli {
    /// Enable debug logging. RUST_LOG takes precedence.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write the log to this file.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Pipeline configuration file (JSON, YAML or TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Parse a command line value with the library's `FromStr` implementation.
fn parse_value<T>(s: &str) -> Result<T, String>
where
    T: FromStr<Err = FsPostError>,
{
    s.parse::<T>().map_err(|e| e.to_string())
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Csv,
    Tsv,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Tabulate regional surface statistics and brain measures for FreeSurfer subjects.
    Process {
        /// A FreeSurfer SUBJECTS_DIR, or a single subject directory.
        input_path: PathBuf,

        /// Directory the tables are written to.
        output_path: PathBuf,

        /// `subject` or `group`.
        #[arg(default_value = "subject", value_parser = parse_value::<ProcessingLevel>)]
        processing_level: ProcessingLevel,

        /// Subject identifier, detected from the input directory if omitted.
        #[arg(long)]
        subject_id: Option<String>,

        #[arg(long)]
        session_id: Option<String>,

        /// Parcellation to tabulate, may be repeated. Defaults to all known parcellations.
        #[arg(long = "parcellation")]
        parcellations: Vec<String>,

        /// Directory with the fsaverage annotations.
        #[arg(long)]
        annots_dir: Option<PathBuf>,

        /// Directory for step logs.
        #[arg(long)]
        work_dir: Option<PathBuf>,

        /// Log the FreeSurfer commands instead of running them.
        #[arg(long)]
        dry_run: bool,

        /// Only tabulate stats files that already exist.
        #[arg(long)]
        tabulate_only: bool,

        /// Skip FreeSurfer commands whose outputs already exist.
        #[arg(long)]
        reuse_existing: bool,

        /// Write the processing report to this file (.json or .csv).
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Summarize per-vertex surface data within the regions of an atlas.
    MapToAtlas {
        /// Per-vertex data, as a curv file like `surf/lh.thickness` or an MGH overlay.
        input_file: PathBuf,

        /// Atlas name, like DKT, DK, Destrieux or a parcellation name.
        #[arg(long, default_value = "DKT")]
        atlas: String,

        /// Annotation file. Defaults to `label/<hemi>.<parcellation>.annot` of the subject.
        #[arg(long)]
        annot: Option<PathBuf>,

        /// Cortex label restricting the vertices. Defaults to `label/<hemi>.cortex.label` if present.
        #[arg(long)]
        cortex_label: Option<PathBuf>,

        /// Hemisphere (`lh` or `rh`), if the input file name does not start with it.
        #[arg(long, value_parser = parse_value::<Hemisphere>)]
        hemisphere: Option<Hemisphere>,

        #[arg(long, value_enum, default_value = "csv")]
        output_format: OutputFormat,

        /// Output file. The result goes to stdout if omitted.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// List the FreeSurfer subjects in a SUBJECTS_DIR.
    ListSubjects { subjects_dir: PathBuf },

    /// Check that the FreeSurfer programs needed for processing are available.
    Check,
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_file.as_deref())?;

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => PostConfig::default(),
    };

    match cli.command {
        Commands::Process {
            input_path,
            output_path,
            processing_level,
            subject_id,
            session_id,
            parcellations,
            annots_dir,
            work_dir,
            dry_run,
            tabulate_only,
            reuse_existing,
            report,
        } => {
            let mut config = config;
            if !parcellations.is_empty() {
                config.parcellations = parcellations;
            }
            if let Some(dir) = annots_dir {
                config.annots_dir = dir;
            }
            if work_dir.is_some() {
                config.work_dir = work_dir;
            }
            config.dry_run |= dry_run;
            config.tabulate_only |= tabulate_only;
            config.reuse_existing |= reuse_existing;

            let request = ProcessingRequest {
                input_path,
                output_path,
                subject_id,
                session_id,
                processing_level,
                config,
            };
            run_process(&request, report.as_deref())
        }
        Commands::MapToAtlas {
            input_file,
            atlas,
            annot,
            cortex_label,
            hemisphere,
            output_format,
            out,
        } => run_map_to_atlas(
            &input_file,
            &atlas,
            annot.as_deref(),
            cortex_label.as_deref(),
            hemisphere,
            output_format,
            out.as_deref(),
        ),
        Commands::ListSubjects { subjects_dir } => {
            for subject in find_freesurfer_subjects(&subjects_dir)? {
                println!("{}", subject);
            }
            Ok(())
        }
        Commands::Check => run_check(),
    }
}

fn run_process(request: &ProcessingRequest, report_path: Option<&Path>) -> CliResult<()> {
    let report = process_data(request)?;
    info!(
        "Processed {} subject(s), wrote {} file(s)",
        report.subject_ids.len(),
        report.processed_files.len()
    );

    if let Some(path) = report_path {
        let format = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => ext.parse::<ResultFormat>()?,
            None => ResultFormat::Json,
        };
        save_results(&report, path, format)?;
        info!("Report written to {}", path.display());
    }

    if !report.is_success() {
        let steps: Vec<&str> = report.failures.iter().map(|f| f.step.as_str()).collect();
        return Err(format!("Processing failed in steps: {}", steps.join(", ")).into());
    }
    Ok(())
}

fn run_map_to_atlas(
    input_file: &Path,
    atlas: &str,
    annot_path: Option<&Path>,
    cortex_path: Option<&Path>,
    hemisphere: Option<Hemisphere>,
    output_format: OutputFormat,
    out: Option<&Path>,
) -> CliResult<()> {
    let parcellation = Parcellation::lookup(atlas)?;
    let file_name = input_file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let hemi = hemisphere
        .or_else(|| Hemisphere::from_file_name(&file_name))
        .ok_or_else(|| -> CliError { format!("Cannot tell the hemisphere of {}", input_file.display()).into() })?;

    // Input files live in `<subject>/surf/`.
    let label_dir = input_file
        .parent()
        .and_then(Path::parent)
        .map(|subject_dir| subject_dir.join("label"))
        .unwrap_or_else(|| PathBuf::from("label"));
    let annot_path = match annot_path {
        Some(p) => p.to_path_buf(),
        None => label_dir.join(format!("{}.{}.annot", hemi, parcellation.name)),
    };
    let cortex_path = match cortex_path {
        Some(p) => Some(p.to_path_buf()),
        None => Some(label_dir.join(format!("{}.cortex.label", hemi))).filter(|p| p.is_file()),
    };

    info!("Mapping {} to {}", input_file.display(), annot_path.display());
    let data = load_surface_data(input_file)?;
    let annot = FsAnnot::from_file(&annot_path)?;
    let cortex = match &cortex_path {
        Some(p) => Some(FsLabel::from_file(p)?),
        None => {
            warn!("No cortex label, the medial wall is included");
            None
        }
    };
    let summaries = map_to_atlas(&data, &annot, cortex.as_ref())?;

    match output_format {
        OutputFormat::Json => match out {
            Some(path) => save_results(&summaries, path, ResultFormat::Json)?,
            None => println!("{}", serde_json::to_string_pretty(&summaries)?),
        },
        OutputFormat::Csv | OutputFormat::Tsv => {
            let table = region_summary_table(&summaries, &parcellation.name, hemi.as_str())?;
            let delimiter = if matches!(output_format, OutputFormat::Csv) { b',' } else { b'\t' };
            match out {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    table.write_delimited(std::fs::File::create(path)?, delimiter)?
                }
                None => table.write_delimited(io::stdout(), delimiter)?,
            }
        }
    }
    if let Some(path) = out {
        info!("Results written to {}", path.display());
    }
    Ok(())
}

fn run_check() -> CliResult<()> {
    let status = check_toolchain();
    let mut missing = Vec::new();
    for (program, available) in status.iter() {
        println!("{:<24} {}", program, if *available { "ok" } else { "missing" });
        if !available {
            missing.push(program.as_str());
        }
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(format!("Missing FreeSurfer dependencies: {}", missing.join(", ")).into())
    }
}
