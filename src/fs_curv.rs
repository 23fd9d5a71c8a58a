// Functions for managing FreeSurfer per-vertex data in binary 'curv' files.
// These files store 1 scalar value (typically a morphological descriptor, like cortical thickness at that point)
// for each vertex of the respective brain surface mesh.

use byteordered::ByteOrdered;
use ndarray::Array1;

use std::io::Read;
use std::path::Path;

use crate::error::{FsPostError, Result};
use crate::util::open_maybe_gz;

pub const CURV_MAGIC: [u8; 3] = [255; 3];

#[derive(Debug, Clone, PartialEq)]
pub struct CurvHeader {
    pub curv_magic: [u8; 3],
    pub num_vertices: i32,
    pub num_faces: i32,
    pub num_values_per_vertex: i32,
}

impl Default for CurvHeader {
    fn default() -> CurvHeader {
        CurvHeader {
            curv_magic: CURV_MAGIC,
            num_vertices: 0,
            num_faces: 0,
            num_values_per_vertex: 1,
        }
    }
}

impl CurvHeader {
    /// Read a Curv header from the given byte stream.
    /// It is assumed that the input is currently at the start of the
    /// Curv header.
    pub fn from_reader<S>(input: &mut S) -> Result<CurvHeader>
    where
        S: Read,
    {
        let mut hdr = CurvHeader::default();
        let mut input = ByteOrdered::be(input);

        for v in &mut hdr.curv_magic {
            *v = input.read_u8()?;
        }
        if hdr.curv_magic != CURV_MAGIC {
            return Err(FsPostError::InvalidCurvFormat);
        }

        hdr.num_vertices = input.read_i32()?;
        hdr.num_faces = input.read_i32()?;
        hdr.num_values_per_vertex = input.read_i32()?;

        if hdr.num_vertices < 0 || hdr.num_values_per_vertex != 1 {
            return Err(FsPostError::InvalidCurvFormat);
        }
        Ok(hdr)
    }
}

/// A FreeSurfer Curv file: one value per vertex, like cortical thickness.
#[derive(Debug, Clone, PartialEq)]
pub struct FsCurv {
    pub header: CurvHeader,
    pub data: Array1<f32>,
}

impl FsCurv {
    /// Read a Curv file.
    /// If the file's name ends with ".gz", the file is assumed to need GZip decoding. This is not typically the case
    /// for FreeSurfer Curv files, but very handy (and it helps us to reduce the size of our test data).
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<FsCurv> {
        FsCurv::from_reader(&mut open_maybe_gz(path)?)
    }

    pub fn from_reader<S>(input: &mut S) -> Result<FsCurv>
    where
        S: Read,
    {
        let header = CurvHeader::from_reader(input)?;
        let mut input = ByteOrdered::be(input);

        let mut data: Vec<f32> = Vec::with_capacity(header.num_vertices as usize);
        for _ in 0..header.num_vertices {
            data.push(input.read_f32()?);
        }

        Ok(FsCurv {
            header,
            data: Array1::from(data),
        })
    }
}

/// Read per-vertex data from a FreeSurfer Curv file, like `surf/lh.thickness`.
///
/// # Examples
///
/// ```no_run
/// let curv = freesurfer_post::read_curv("/path/to/subjects_dir/subject1/surf/lh.thickness").unwrap();
/// println!("Read {} thickness values.", curv.data.len());
/// ```
pub fn read_curv<P: AsRef<Path>>(path: P) -> Result<FsCurv> {
    FsCurv::from_file(path)
}
