//! The catalog of cortical parcellations (atlases) the pipeline tabulates.

use std::fmt;

use crate::error::{FsPostError, Result};

/// Atlases distributed as fsaverage annotations, which must be resampled to the subject's native surface.
pub const FSAVERAGE_PARCELLATIONS: [&str; 21] = [
    "AAL",
    "CC200",
    "CC400",
    "glasser",
    "gordon333dil",
    "HOCPATh25",
    "Juelich",
    "PALS_B12_Brodmann",
    "Schaefer2018_1000Parcels_7Networks_order",
    "Schaefer2018_100Parcels_7Networks_order",
    "Schaefer2018_200Parcels_7Networks_order",
    "Schaefer2018_300Parcels_7Networks_order",
    "Schaefer2018_400Parcels_7Networks_order",
    "Schaefer2018_500Parcels_7Networks_order",
    "Schaefer2018_600Parcels_7Networks_order",
    "Schaefer2018_700Parcels_7Networks_order",
    "Schaefer2018_800Parcels_7Networks_order",
    "Schaefer2018_900Parcels_7Networks_order",
    "Slab",
    "Yeo2011_17Networks_N1000",
    "Yeo2011_7Networks_N1000",
];

/// Atlases created by recon-all itself, already present in the subject's `label` directory.
pub const NATIVE_PARCELLATIONS: [&str; 4] = ["aparc.DKTatlas", "aparc.a2009s", "aparc", "BA_exvivo"];

/// The surface space an atlas annotation is defined on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtlasSpace {
    Fsaverage,
    Native,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parcellation {
    pub name: String,
    pub space: AtlasSpace,
}

impl Parcellation {
    /// Look up a known parcellation by name. Also accepts the short names `DKT`, `DK` and `Destrieux`.
    pub fn lookup(name: &str) -> Result<Parcellation> {
        let name = match name {
            "DKT" => "aparc.DKTatlas",
            "DK" => "aparc",
            "Destrieux" => "aparc.a2009s",
            other => other,
        };
        if FSAVERAGE_PARCELLATIONS.contains(&name) {
            Ok(Parcellation {
                name: name.to_string(),
                space: AtlasSpace::Fsaverage,
            })
        } else if NATIVE_PARCELLATIONS.contains(&name) {
            Ok(Parcellation {
                name: name.to_string(),
                space: AtlasSpace::Native,
            })
        } else {
            Err(FsPostError::UnknownParcellation(name.to_string()))
        }
    }

    /// All known parcellations, fsaverage ones first.
    pub fn all() -> Vec<Parcellation> {
        FSAVERAGE_PARCELLATIONS
            .iter()
            .map(|n| Parcellation {
                name: n.to_string(),
                space: AtlasSpace::Fsaverage,
            })
            .chain(NATIVE_PARCELLATIONS.iter().map(|n| Parcellation {
                name: n.to_string(),
                space: AtlasSpace::Native,
            }))
            .collect()
    }

    pub fn needs_transform(&self) -> bool {
        self.space == AtlasSpace::Fsaverage
    }

    /// The atlas name as used in output file names, e.g. `Schaefer2018100Parcels7Networks`.
    pub fn output_name(&self) -> String {
        self.name.replace('.', "").replace("_order", "").replace('_', "")
    }

    /// The atlas name as used for work directory and step names, e.g. `aparcDKTatlas`.
    pub fn node_name(&self) -> String {
        self.name.replace('.', "").replace('_', "")
    }
}

impl fmt::Display for Parcellation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
