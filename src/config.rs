//! Pipeline configuration, loaded from JSON, YAML or TOML files.

use serde::{Deserialize, Serialize};

use std::fs;
use std::path::{Path, PathBuf};

use crate::atlas::Parcellation;
use crate::error::{FsPostError, Result};

/// Directory in the container with the collection of fsaverage annotations.
pub const DEFAULT_ANNOTS_DIR: &str = "/opt/freesurfer_tabulate/annots";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostConfig {
    /// Where the fsaverage annotations `<hemi>.<parcellation>.annot` live.
    pub annots_dir: PathBuf,
    /// The FreeSurfer subject the fsaverage annotations are defined on.
    pub fsaverage_subject: String,
    /// Names of the parcellations to tabulate. Empty means all known parcellations.
    pub parcellations: Vec<String>,
    /// Where step logs go. Defaults to `<output_dir>/work`.
    pub work_dir: Option<PathBuf>,
    /// Log the FreeSurfer commands instead of running them.
    pub dry_run: bool,
    /// Skip the FreeSurfer commands and only tabulate existing stats files.
    pub tabulate_only: bool,
    /// Skip FreeSurfer commands whose outputs already exist.
    pub reuse_existing: bool,
}

impl Default for PostConfig {
    fn default() -> PostConfig {
        PostConfig {
            annots_dir: PathBuf::from(DEFAULT_ANNOTS_DIR),
            fsaverage_subject: String::from("fsaverage"),
            parcellations: Vec::new(),
            work_dir: None,
            dry_run: false,
            tabulate_only: false,
            reuse_existing: false,
        }
    }
}

impl PostConfig {
    /// The configured parcellations, resolved against the catalog.
    pub fn resolved_parcellations(&self) -> Result<Vec<Parcellation>> {
        if self.parcellations.is_empty() {
            return Ok(Parcellation::all());
        }
        self.parcellations.iter().map(|name| Parcellation::lookup(name)).collect()
    }

    /// Check the configuration for contradictions.
    pub fn validate(&self) -> Result<()> {
        if self.dry_run && self.tabulate_only {
            return Err(FsPostError::Config(String::from("dry_run and tabulate_only are mutually exclusive")));
        }
        if self.fsaverage_subject.is_empty() {
            return Err(FsPostError::Config(String::from("fsaverage_subject must not be empty")));
        }
        self.resolved_parcellations()?;
        Ok(())
    }
}

/// Load a configuration file. The format is picked by the file suffix: `.json`, `.yaml`/`.yml` or `.toml`.
pub fn load_config<P: AsRef<Path>>(config_path: P) -> Result<PostConfig> {
    let config_path = config_path.as_ref();
    if !config_path.exists() {
        return Err(FsPostError::NotFound(format!("Config file not found: {}", config_path.display())));
    }

    let suffix = config_path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let content = fs::read_to_string(config_path)?;
    let config: PostConfig = match suffix.as_str() {
        "json" => serde_json::from_str(&content)?,
        "yaml" | "yml" => serde_yaml::from_str(&content)?,
        "toml" => toml::from_str(&content)?,
        other => return Err(FsPostError::UnsupportedFormat(format!("config file suffix '.{}'", other))),
    };
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_cover_all_parcellations() {
        let config = PostConfig::default();
        assert_eq!(25, config.resolved_parcellations().unwrap().len());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn json_yaml_and_toml_configs_are_loaded() {
        let dir = tempfile::tempdir().unwrap();

        let json = dir.path().join("config.json");
        fs::write(&json, r#"{"parcellations": ["aparc", "glasser"], "dry_run": true}"#).unwrap();
        let config = load_config(&json).unwrap();
        assert_eq!(vec!["aparc", "glasser"], config.parcellations);
        assert!(config.dry_run);
        assert_eq!(PathBuf::from(DEFAULT_ANNOTS_DIR), config.annots_dir);

        let yaml = dir.path().join("config.yml");
        fs::write(&yaml, "annots_dir: /data/annots\nparcellations:\n  - aparc.a2009s\n").unwrap();
        let config = load_config(&yaml).unwrap();
        assert_eq!(PathBuf::from("/data/annots"), config.annots_dir);

        let toml_path = dir.path().join("config.toml");
        fs::write(&toml_path, "fsaverage_subject = \"fsaverage6\"\nreuse_existing = true\n").unwrap();
        let config = load_config(&toml_path).unwrap();
        assert_eq!("fsaverage6", config.fsaverage_subject);
        assert!(config.reuse_existing);
    }

    #[test]
    fn bad_configs_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load_config(dir.path().join("missing.json")), Err(FsPostError::NotFound(_))));

        let ini = dir.path().join("config.ini");
        fs::write(&ini, "x=1").unwrap();
        assert!(matches!(load_config(&ini), Err(FsPostError::UnsupportedFormat(_))));

        let unknown = dir.path().join("unknown.json");
        fs::write(&unknown, r#"{"parcellations": ["nope"]}"#).unwrap();
        assert!(matches!(load_config(&unknown), Err(FsPostError::UnknownParcellation(_))));

        let both = dir.path().join("both.json");
        fs::write(&both, r#"{"dry_run": true, "tabulate_only": true}"#).unwrap();
        assert!(matches!(load_config(&both), Err(FsPostError::Config(_))));
    }
}
