//! Post-processing of FreeSurfer outputs into tidy tables.
//!
//! The focus of this package is on the tabular data produced by FreeSurfer: per-region surface
//! statistics for a range of parcellations, and whole-brain measures, written as BIDS-style TSV
//! files with JSON sidecars. It also reads the binary surface formats needed to summarize
//! per-vertex data within atlas regions.

pub mod atlas;
pub mod brain_measures;
pub mod config;
pub mod core;
pub mod error;
pub mod fs_annot;
pub mod fs_curv;
pub mod fs_label;
pub mod fs_mgh;
pub mod fs_reconlog;
pub mod fs_stats;
pub mod fs_tools;
pub mod hemisphere;
pub mod logging;
pub mod region_stats;
pub mod subjects;
pub mod table;
pub mod util;
pub mod workflow;

pub use atlas::Parcellation;
pub use config::{load_config, PostConfig};
pub use self::core::{load_surface_data, map_to_atlas, process_data, save_results, ProcessingLevel, ProcessingRequest};
pub use error::{FsPostError, Result};
pub use fs_annot::{read_annot, FsAnnot};
pub use fs_curv::{read_curv, CurvHeader, FsCurv};
pub use fs_label::{read_label, FsLabel};
pub use fs_mgh::{read_mgh, FsMgh, FsMghHeader};
pub use fs_reconlog::{read_euler_from_log, EulerStats};
pub use fs_stats::{read_stats, FsStats};
pub use hemisphere::Hemisphere;
pub use table::Table;
