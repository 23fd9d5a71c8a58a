//! Utility functions used in all other freesurfer_post modules.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use byteordered::byteorder::ReadBytesExt;
use flate2::bufread::GzDecoder;

use crate::error::Result;

/// Check whether the file extension ends with ".gz".
pub fn is_gz_file<P>(path: P) -> bool
where
    P: AsRef<Path>,
{
    path.as_ref()
        .file_name()
        .map(|a| a.to_string_lossy().ends_with(".gz"))
        .unwrap_or(false)
}

/// Open a file for reading, transparently GZip-decoding it if its name ends with ".gz".
/// FreeSurfer does not compress its text and curv outputs, but compressed copies keep test data small.
pub fn open_maybe_gz<P: AsRef<Path>>(path: P) -> Result<Box<dyn Read>> {
    let gz = is_gz_file(&path);
    let file = BufReader::new(File::open(path)?);
    if gz {
        Ok(Box::new(GzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

/// Read a fixed length zero-terminated byte string of the given length from the input. Embedded '\0' chars are allowed, but not added to the returned String.
pub fn read_fixed_length_string<S>(input: &mut S, len: usize) -> Result<String>
where
    S: Read,
{
    let mut info_line = String::with_capacity(len);
    for _ in 0..len {
        let cur_char = input.read_u8()? as char;
        if cur_char != '\0' {
            info_line.push(cur_char);
        }
    }
    Ok(info_line)
}

/// Turn a FreeSurfer column or measure name into a snake case table column name.
pub fn snake_case_column(name: &str) -> String {
    name.to_lowercase().replace('-', "_").replace('.', "_")
}

/// The file name prefix shared by all outputs of one subject (and session).
pub fn output_prefix(subject_id: &str, session_id: Option<&str>) -> String {
    match session_id {
        Some(session) => format!("{}_{}", subject_id, session),
        None => subject_id.to_string(),
    }
}

/// Format a float the way it appears in the tables: whole numbers keep a trailing ".0".
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn column_names_are_snake_cased() {
        assert_eq!("thickavg_wgpct", snake_case_column("ThickAvg_wgpct"));
        assert_eq!("left_lateral_ventricle_volume_mm3", snake_case_column("Left-Lateral-Ventricle_Volume_mm3"));
        assert_eq!("aparc_dktatlas", snake_case_column("aparc.DKTatlas"));
    }

    #[test]
    fn output_prefix_includes_session_when_given() {
        assert_eq!("sub-01_ses-1", output_prefix("sub-01", Some("ses-1")));
        assert_eq!("sub-01", output_prefix("sub-01", None));
    }

    #[test]
    fn floats_are_formatted_with_decimal_point() {
        assert_eq!("-22.0", format_float(-22.0));
        assert_eq!("1243340.0", format_float(1243340.0));
        assert_eq!("0.25", format_float(0.25));
    }

    #[test]
    fn gz_files_are_recognized_by_name() {
        assert!(is_gz_file("lh.aparc.stats.gz"));
        assert!(!is_gz_file("lh.aparc.stats"));
    }
}
