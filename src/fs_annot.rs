//! Functions for managing FreeSurfer brain surface parcellations in annot files.
//!
//! These files assign each vertex of a brain surface mesh to exactly one brain region
//! or label. A so-called colortable contains data on the regions, including the region's
//! name, an RGB display color, and a unique identifier.

use byteordered::ByteOrdered;

use std::fmt;
use std::io::Read;
use std::path::Path;

use crate::error::{FsPostError, Result};
use crate::util::{open_maybe_gz, read_fixed_length_string};

#[derive(Debug, Clone, PartialEq)]
pub struct FsAnnotColortable {
    pub id: Vec<i32>, // A region index, not really needed. The 'label' is unique as well and more relevant, see below.
    pub name: Vec<String>,
    pub r: Vec<i32>,
    pub g: Vec<i32>,
    pub b: Vec<i32>,
    pub a: Vec<i32>,
    pub label: Vec<i32>, // A unique label computed from r,g,b. Used in annot.vertex_labels to identify the region.
}

impl FsAnnotColortable {
    /// Read a colortable in format version 2 from a reader. The reader must be at the start position of the colortable.
    pub fn from_reader<S>(input: &mut S) -> Result<FsAnnotColortable>
    where
        S: Read,
    {
        let mut input = ByteOrdered::be(input);

        let num_chars_orig_filename: i32 = input.read_i32()?; // Length of following string.
        if num_chars_orig_filename < 0 {
            return Err(FsPostError::UnsupportedFsAnnotFormatVersion);
        }
        let _orig_filename = read_fixed_length_string(&mut input, num_chars_orig_filename as usize)?;
        let num_entries: i32 = input.read_i32()?; // Yes, it is stored twice. Once here, once before.
        if num_entries < 0 {
            return Err(FsPostError::UnsupportedFsAnnotFormatVersion);
        }
        let num_entries = num_entries as usize;

        let mut ct = FsAnnotColortable {
            id: Vec::with_capacity(num_entries),
            name: Vec::with_capacity(num_entries),
            r: Vec::with_capacity(num_entries),
            g: Vec::with_capacity(num_entries),
            b: Vec::with_capacity(num_entries),
            a: Vec::with_capacity(num_entries),
            label: Vec::with_capacity(num_entries),
        };

        for _ in 0..num_entries {
            ct.id.push(input.read_i32()?);
            let num_chars_region_name: i32 = input.read_i32()?; // Length of following string.
            if num_chars_region_name < 0 {
                return Err(FsPostError::UnsupportedFsAnnotFormatVersion);
            }
            ct.name.push(read_fixed_length_string(&mut input, num_chars_region_name as usize)?);
            let (r, g, b, a) = (input.read_i32()?, input.read_i32()?, input.read_i32()?, input.read_i32()?);
            ct.r.push(r);
            ct.g.push(g);
            ct.b.push(b);
            ct.a.push(a);
            ct.label.push(r + g * (1 << 8) + b * (1 << 16) + a * (1 << 24));
        }

        Ok(ct)
    }

    pub fn num_regions(&self) -> usize {
        self.name.len()
    }
}

impl fmt::Display for FsAnnotColortable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Colortable for {} brain regions.", self.id.len())
    }
}

/// Models a FreeSurfer brain surface parcellation from an annot file. This is the result of applying a brain atlas (like Desikan-Killiani) to a subject. The `vertex_indices` are the 0-based indices used in FreeSurfer and should be ignored. The `vertex_labels` field contains the mesh vertices in order, and assigns to each vertex a brain region using the `label` field (not the `id` field!) from the `colortable`.
#[derive(Debug, Clone, PartialEq)]
pub struct FsAnnot {
    pub vertex_indices: Vec<i32>, // 0-based indices, not really needed as all vertices need to be covered in order.
    pub vertex_labels: Vec<i32>,
    pub colortable: FsAnnotColortable,
}

impl FsAnnot {
    /// Read an FsAnnot instance from a file. Files ending with ".gz" are GZip-decoded.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<FsAnnot> {
        FsAnnot::from_reader(&mut open_maybe_gz(path)?)
    }

    pub fn from_reader<S>(input: &mut S) -> Result<FsAnnot>
    where
        S: Read,
    {
        let mut input = ByteOrdered::be(input);

        let num_vertices: i32 = input.read_i32()?;
        if num_vertices < 0 {
            return Err(FsPostError::UnsupportedFsAnnotFormatVersion);
        }

        let mut vertex_indices: Vec<i32> = Vec::with_capacity(num_vertices as usize);
        let mut vertex_labels: Vec<i32> = Vec::with_capacity(num_vertices as usize);
        for _ in 0..num_vertices {
            vertex_indices.push(input.read_i32()?);
            vertex_labels.push(input.read_i32()?);
        }

        let has_colortable: i32 = input.read_i32()?;
        if has_colortable != 1 {
            return Err(FsPostError::UnsupportedFsAnnotFormatVersion);
        }

        // If this is negative, the absolute value encodes the file format version. We only support version 2.
        let format_version: i32 = input.read_i32()?;
        if format_version != -2 {
            return Err(FsPostError::UnsupportedFsAnnotFormatVersion);
        }
        let _max_structure_id: i32 = input.read_i32()?;
        let colortable = FsAnnotColortable::from_reader(&mut input)?;

        Ok(FsAnnot {
            vertex_indices,
            vertex_labels,
            colortable,
        })
    }

    /// Get the region names contained in the [`FsAnnot`] struct.
    pub fn regions(&self) -> Vec<String> {
        self.colortable.name.clone()
    }

    pub fn num_regions(&self) -> usize {
        self.colortable.num_regions()
    }

    pub fn num_vertices(&self) -> usize {
        self.vertex_labels.len()
    }

    /// Get the indices of all vertices which are part of the given brain region.
    ///
    /// Returns `None` if `region` is not a region of this annot. The result may be empty if no vertices are assigned to the region.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// let annot = freesurfer_post::read_annot("/path/to/subjects_dir/subject1/label/lh.aparc.annot").unwrap();
    /// let verts = annot.region_vertices("bankssts").unwrap_or_default();
    /// ```
    pub fn region_vertices(&self, region: &str) -> Option<Vec<usize>> {
        let region_idx = self.colortable.name.iter().position(|x| x == region)?;
        let region_label = self.colortable.label[region_idx];
        Some(
            self.vertex_labels
                .iter()
                .enumerate()
                .filter(|(_, vlabel)| **vlabel == region_label)
                .map(|(idx, _)| idx)
                .collect(),
        )
    }
}

impl fmt::Display for FsAnnot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Surface parcellation assigning {} vertices to {} brain regions.",
            self.vertex_indices.len(),
            self.colortable.id.len()
        )
    }
}

/// Read a brain parcellation from a FreeSurfer annot file.
///
/// A parcellation assigns each vertex of a brain surface mesh to exactly one brain region.
/// A parcellation is the result of applying a brain atlas to the brain surface reconstruction of a subject.
///
/// # Examples
///
/// ```no_run
/// let annot = freesurfer_post::read_annot("/path/to/subjects_dir/subject1/label/lh.aparc.annot").unwrap();
/// println!("Annotation assigns the {} brain mesh vertices to {} different regions.", annot.num_vertices(), annot.num_regions());
/// ```
pub fn read_annot<P: AsRef<Path>>(path: P) -> Result<FsAnnot> {
    FsAnnot::from_file(path)
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    /// Encode an annot in format version 2. Regions are `(name, r, g, b)`, vertices hold region indices.
    pub(crate) fn annot_bytes(regions: &[(&str, i32, i32, i32)], vertex_regions: &[usize]) -> Vec<u8> {
        let mut buf: Vec<u8> = Vec::new();
        {
            let mut out = ByteOrdered::be(&mut buf);
            out.write_i32(vertex_regions.len() as i32).unwrap();
            for (idx, region) in vertex_regions.iter().enumerate() {
                let (_, r, g, b) = regions[*region];
                out.write_i32(idx as i32).unwrap();
                out.write_i32(r + g * 256 + b * 65536).unwrap();
            }
            out.write_i32(1).unwrap();
            out.write_i32(-2).unwrap();
            out.write_i32(regions.len() as i32).unwrap();
            let orig = "colortable.txt";
            out.write_i32(orig.len() as i32).unwrap();
            for byte in orig.bytes() {
                out.write_u8(byte).unwrap();
            }
            out.write_i32(regions.len() as i32).unwrap();
            for (id, (name, r, g, b)) in regions.iter().enumerate() {
                out.write_i32(id as i32).unwrap();
                out.write_i32(name.len() as i32 + 1).unwrap();
                for byte in name.bytes() {
                    out.write_u8(byte).unwrap();
                }
                out.write_u8(0).unwrap();
                out.write_i32(*r).unwrap();
                out.write_i32(*g).unwrap();
                out.write_i32(*b).unwrap();
                out.write_i32(0).unwrap();
            }
        }
        buf
    }

    fn demo_annot() -> FsAnnot {
        let regions = [("unknown", 25, 5, 25), ("bankssts", 25, 100, 40), ("cuneus", 220, 180, 140)];
        let bytes = annot_bytes(&regions, &[0, 1, 1, 2, 1, 0]);
        FsAnnot::from_reader(&mut bytes.as_slice()).unwrap()
    }

    #[test]
    fn annot_is_read() {
        let annot = demo_annot();
        assert_eq!(6, annot.num_vertices());
        assert_eq!(3, annot.num_regions());
        assert_eq!(vec!["unknown", "bankssts", "cuneus"], annot.regions());
        assert_eq!(1639705, annot.colortable.label[0]);
        assert_eq!(0, annot.colortable.a[2]);
    }

    #[test]
    fn region_vertices_are_computed() {
        let annot = demo_annot();
        assert_eq!(Some(vec![1, 2, 4]), annot.region_vertices("bankssts"));
        assert_eq!(Some(vec![3]), annot.region_vertices("cuneus"));
        assert_eq!(None, annot.region_vertices("insula"));
    }

    #[test]
    fn annots_without_colortable_are_rejected() {
        let mut buf: Vec<u8> = Vec::new();
        {
            let mut out = ByteOrdered::be(&mut buf);
            out.write_i32(1).unwrap();
            out.write_i32(0).unwrap();
            out.write_i32(0).unwrap();
            out.write_i32(0).unwrap();
        }
        assert!(matches!(
            FsAnnot::from_reader(&mut buf.as_slice()),
            Err(FsPostError::UnsupportedFsAnnotFormatVersion)
        ));
    }
}
