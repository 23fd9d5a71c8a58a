use quick_error::quick_error;
use std::io::Error as IOError;
use std::path::PathBuf;

quick_error! {
    /// Error type for all error variants originated by this crate.
    #[derive(Debug)]
    pub enum FsPostError {
        /// Invalid curv file: wrong magic number.
        InvalidCurvFormat {
            display("Invalid Curv file")
        }

        /// Invalid annot file, or an annot colortable version we cannot read.
        UnsupportedFsAnnotFormatVersion {
            display("Unsupported FreeSurfer annot file format version")
        }

        /// Invalid MGH file: wrong format version or data type.
        InvalidFsMghFormat {
            display("Invalid FreeSurfer MGH file")
        }

        InvalidFsLabelFormat(msg: String) {
            display("Invalid FreeSurfer label file: {}", msg)
        }

        /// A stats file could not be interpreted.
        InvalidStatsFile(path: String, msg: String) {
            display("Invalid FreeSurfer stats file '{}': {}", path, msg)
        }

        /// The recon-all log did not contain the expected QC lines.
        InvalidReconLog(msg: String) {
            display("Invalid recon-all log: {}", msg)
        }

        /// Table shape errors: wrong row arity, unknown column, incompatible tables.
        Table(msg: String) {
            display("Table error: {}", msg)
        }

        /// Two columns that must agree did not.
        SanityCheck(reference: String, redundant: String) {
            display("The {} values were not identical to {}", reference, redundant)
        }

        DuplicateKey(key: String) {
            display("{} is already present in the collected data", key)
        }

        /// An external FreeSurfer program exited unsuccessfully.
        CommandFailed(program: String, msg: String) {
            display("Command '{}' failed: {}", program, msg)
        }

        MissingInput(path: PathBuf) {
            display("Required input does not exist: {}", path.display())
        }

        NotFound(msg: String) {
            display("{}", msg)
        }

        Config(msg: String) {
            display("Configuration error: {}", msg)
        }

        UnsupportedFormat(format: String) {
            display("Unsupported format: {}", format)
        }

        UnknownParcellation(name: String) {
            display("Unknown parcellation '{}'", name)
        }

        SubjectDetection {
            display("Could not detect subject ID. Please provide --subject-id")
        }

        /// One or more pipeline steps failed.
        WorkflowFailed(failures: Vec<String>) {
            display("{} workflow step(s) failed: {}", failures.len(), failures.join(", "))
        }

        /// I/O Error
        Io(err: IOError) {
            from()
            source(err)
            display("I/O error: {}", err)
        }

        Csv(err: csv::Error) {
            from()
            source(err)
            display("CSV error: {}", err)
        }

        Json(err: serde_json::Error) {
            from()
            source(err)
            display("JSON error: {}", err)
        }

        Yaml(err: serde_yaml::Error) {
            from()
            source(err)
            display("YAML error: {}", err)
        }

        Toml(err: toml::de::Error) {
            from()
            source(err)
            display("TOML error: {}", err)
        }

        Regex(err: regex::Error) {
            from()
            source(err)
            display("Regex error: {}", err)
        }
    }
}

/// Alias type for results originated from this crate.
pub type Result<T> = ::std::result::Result<T, FsPostError>;
