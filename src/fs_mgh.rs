//! Functions for managing FreeSurfer brain volumes in binary 'MGH' files.
//!
//! Per-vertex surface overlays like `surf/lh.w-g.pct.mgh` are stored as MGH volumes with
//! dimensions `(num_vertices, 1, 1, 1)`.

use byteordered::ByteOrdered;
use ndarray::{Array, Array4, ShapeBuilder};

use std::io::{self, Read};
use std::path::Path;

use crate::error::{FsPostError, Result};
use crate::util::open_maybe_gz;

pub const MGH_VERSION: i32 = 1;

pub const MRI_UCHAR: i32 = 0;
pub const MRI_INT: i32 = 1;
pub const MRI_FLOAT: i32 = 3;
pub const MRI_SHORT: i32 = 4;

pub const MGH_DATATYPE_NAMES: [&str; 4] = ["MRI_UCHAR", "MRI_INT", "MRI_FLOAT", "MRI_SHORT"];
pub const MGH_DATATYPE_CODES: [i32; 4] = [MRI_UCHAR, MRI_INT, MRI_FLOAT, MRI_SHORT];
pub const MGH_DATA_START: usize = 284; // The index in bytes where the data part starts in an MGH file.

/// Size of the fixed part of the header: 7 i32 values and the i16 RAS flag.
const MGH_HEADER_FIXED_SIZE: usize = 7 * 4 + 2;
/// Size of the optional RAS part of the header: delta, Mdc and Pxyz_c as 15 f32 values.
const MGH_HEADER_RAS_SIZE: usize = 15 * 4;

/// Models the header of a FreeSurfer MGH file containing a brain volume.
#[derive(Debug, Clone, PartialEq)]
pub struct FsMghHeader {
    pub mgh_format_version: i32,
    pub dim1len: i32,
    pub dim2len: i32,
    pub dim3len: i32,
    pub dim4len: i32, // aka "num_frames"
    pub dtype: i32,
    pub dof: i32,
    pub is_ras_good: i16,
    pub delta: [f32; 3],
    pub mdc_raw: [f32; 9],
    pub p_xyz_c: [f32; 3],
}

impl Default for FsMghHeader {
    fn default() -> FsMghHeader {
        FsMghHeader {
            mgh_format_version: MGH_VERSION,
            dim1len: 0,
            dim2len: 0,
            dim3len: 0,
            dim4len: 0,
            dtype: MRI_INT,
            dof: 0,
            is_ras_good: 0,
            delta: [0.; 3],
            mdc_raw: [0.; 9],
            p_xyz_c: [0.; 3],
        }
    }
}

impl FsMghHeader {
    /// Read an MGH header from the given byte stream.
    /// It is assumed that the input is currently at the start of the
    /// header. Returns the header and the number of bytes consumed.
    pub fn from_reader<S>(input: &mut S) -> Result<(FsMghHeader, usize)>
    where
        S: Read,
    {
        let mut hdr = FsMghHeader::default();
        let mut input = ByteOrdered::be(input);

        hdr.mgh_format_version = input.read_i32()?;
        if hdr.mgh_format_version != MGH_VERSION {
            return Err(FsPostError::InvalidFsMghFormat);
        }

        hdr.dim1len = input.read_i32()?;
        hdr.dim2len = input.read_i32()?;
        hdr.dim3len = input.read_i32()?;
        hdr.dim4len = input.read_i32()?;
        if [hdr.dim1len, hdr.dim2len, hdr.dim3len, hdr.dim4len].iter().any(|&d| d < 0) {
            return Err(FsPostError::InvalidFsMghFormat);
        }

        hdr.dtype = input.read_i32()?;
        if !MGH_DATATYPE_CODES.contains(&hdr.dtype) {
            return Err(FsPostError::InvalidFsMghFormat);
        }
        hdr.dof = input.read_i32()?;

        hdr.is_ras_good = input.read_i16()?;
        let mut consumed = MGH_HEADER_FIXED_SIZE;

        if hdr.is_ras_good == 1 {
            for v in hdr.delta.iter_mut() {
                *v = input.read_f32()?;
            }
            for v in hdr.mdc_raw.iter_mut() {
                *v = input.read_f32()?;
            }
            for v in hdr.p_xyz_c.iter_mut() {
                *v = input.read_f32()?;
            }
            consumed += MGH_HEADER_RAS_SIZE;
        }
        Ok((hdr, consumed))
    }

    pub fn num_values(&self) -> usize {
        self.dim1len as usize * self.dim2len as usize * self.dim3len as usize * self.dim4len as usize
    }

    pub fn dtype_name(&self) -> &'static str {
        MGH_DATATYPE_CODES
            .iter()
            .position(|&c| c == self.dtype)
            .map(|idx| MGH_DATATYPE_NAMES[idx])
            .unwrap_or("unknown")
    }
}

/// Models a FreeSurfer MGH file. The data is converted to `f32`, whatever the stored data type.
#[derive(Debug, Clone, PartialEq)]
pub struct FsMgh {
    pub header: FsMghHeader,
    pub data: Array4<f32>,
}

impl FsMgh {
    /// Read an MGH file, or a GZip-compressed MGZ file if the name ends with ".mgz" or ".gz".
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<FsMgh> {
        let path = path.as_ref();
        let is_mgz = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("mgz"))
            .unwrap_or(false);
        if is_mgz {
            let file = io::BufReader::new(std::fs::File::open(path)?);
            FsMgh::from_reader(&mut flate2::bufread::GzDecoder::new(file))
        } else {
            FsMgh::from_reader(&mut open_maybe_gz(path)?)
        }
    }

    pub fn from_reader<S>(input: &mut S) -> Result<FsMgh>
    where
        S: Read,
    {
        let (header, consumed) = FsMghHeader::from_reader(input)?;

        // We cannot seek in a GZ stream, so skip the unused header space by reading it.
        let skip = (MGH_DATA_START - consumed) as u64;
        let skipped = io::copy(&mut input.by_ref().take(skip), &mut io::sink())?;
        if skipped != skip {
            return Err(FsPostError::InvalidFsMghFormat);
        }

        let n = header.num_values();
        let mut values: Vec<f32> = Vec::with_capacity(n);
        let mut input = ByteOrdered::be(input);
        for _ in 0..n {
            let v = match header.dtype {
                MRI_UCHAR => input.read_u8()? as f32,
                MRI_INT => input.read_i32()? as f32,
                MRI_FLOAT => input.read_f32()?,
                MRI_SHORT => input.read_i16()? as f32,
                _ => return Err(FsPostError::InvalidFsMghFormat),
            };
            values.push(v);
        }

        let shape = (
            header.dim1len as usize,
            header.dim2len as usize,
            header.dim3len as usize,
            header.dim4len as usize,
        );
        // MGH data is stored in column-major order.
        let data = Array::from_shape_vec(shape.f(), values).map_err(|_| FsPostError::InvalidFsMghFormat)?;
        Ok(FsMgh { header, data })
    }

    /// The data as one value per vertex, for surface overlays of shape `(n, 1, 1, 1)`.
    pub fn vertex_data(&self) -> Result<Vec<f32>> {
        let h = &self.header;
        if h.dim2len != 1 || h.dim3len != 1 || h.dim4len != 1 {
            return Err(FsPostError::InvalidFsMghFormat);
        }
        Ok(self.data.iter().copied().collect())
    }
}

/// Read an MGH or MGZ file.
pub fn read_mgh<P: AsRef<Path>>(path: P) -> Result<FsMgh> {
    FsMgh::from_file(path)
}

#[cfg(test)]
mod test {
    use super::*;

    fn mgh_bytes(dims: [i32; 4], dtype: i32, ras: bool, values: &[f32]) -> Vec<u8> {
        let mut buf: Vec<u8> = Vec::new();
        {
            let mut out = ByteOrdered::be(&mut buf);
            out.write_i32(MGH_VERSION).unwrap();
            for d in dims.iter() {
                out.write_i32(*d).unwrap();
            }
            out.write_i32(dtype).unwrap();
            out.write_i32(0).unwrap();
            out.write_i16(if ras { 1 } else { 0 }).unwrap();
            if ras {
                for _ in 0..15 {
                    out.write_f32(1.0).unwrap();
                }
            }
        }
        buf.resize(MGH_DATA_START, 0);
        {
            let mut out = ByteOrdered::be(&mut buf);
            for v in values {
                match dtype {
                    MRI_FLOAT => out.write_f32(*v).unwrap(),
                    MRI_INT => out.write_i32(*v as i32).unwrap(),
                    MRI_SHORT => out.write_i16(*v as i16).unwrap(),
                    _ => out.write_u8(*v as u8).unwrap(),
                }
            }
        }
        buf
    }

    #[test]
    fn float_overlay_is_read() {
        let bytes = mgh_bytes([4, 1, 1, 1], MRI_FLOAT, true, &[10.5, 20.0, 30.25, 40.0]);
        let mgh = FsMgh::from_reader(&mut bytes.as_slice()).unwrap();
        assert_eq!(4, mgh.header.dim1len);
        assert_eq!("MRI_FLOAT", mgh.header.dtype_name());
        assert_eq!([1.0; 3], mgh.header.delta);
        assert_eq!(vec![10.5, 20.0, 30.25, 40.0], mgh.vertex_data().unwrap());
    }

    #[test]
    fn integer_volumes_are_column_major() {
        let bytes = mgh_bytes([2, 3, 1, 1], MRI_INT, false, &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        let mgh = FsMgh::from_reader(&mut bytes.as_slice()).unwrap();
        assert_eq!(1.0, mgh.data[[1, 0, 0, 0]]);
        assert_eq!(2.0, mgh.data[[0, 1, 0, 0]]);
        assert_eq!(5.0, mgh.data[[1, 2, 0, 0]]);
        assert!(mgh.vertex_data().is_err());
    }

    #[test]
    fn wrong_version_is_rejected() {
        let mut bytes = mgh_bytes([1, 1, 1, 1], MRI_UCHAR, false, &[3.0]);
        bytes[3] = 2;
        assert!(matches!(FsMgh::from_reader(&mut bytes.as_slice()), Err(FsPostError::InvalidFsMghFormat)));
    }
}
