//! Functions for reading FreeSurfer label files.
//!
//! An ASCII label file lists a subset of the vertices of a surface, like `label/lh.cortex.label`
//! which excludes the medial wall. The first line is a comment, the second the number of
//! vertices, followed by one `index x y z value` line per vertex.

use csv::ReaderBuilder;

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use crate::error::{FsPostError, Result};
use crate::util::open_maybe_gz;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FsLabelVertex {
    pub index: i32,
    pub coord1: f32,
    pub coord2: f32,
    pub coord3: f32,
    pub value: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FsLabel {
    pub vertexes: Vec<FsLabelVertex>,
}

impl FsLabel {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<FsLabel> {
        FsLabel::from_reader(open_maybe_gz(path)?)
    }

    pub fn from_reader<S>(input: S) -> Result<FsLabel>
    where
        S: Read,
    {
        // Fields are separated by runs of spaces, so we let csv split on single spaces and skip the empty fields.
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .delimiter(b' ')
            .flexible(true)
            .comment(Some(b'#'))
            .from_reader(input);

        let mut records = rdr.records();
        let expected: usize = match records.next() {
            Some(record) => {
                let record = record?;
                let count = record.iter().find(|f| !f.is_empty()).unwrap_or("");
                count
                    .parse()
                    .map_err(|_| FsPostError::InvalidFsLabelFormat(format!("invalid vertex count '{}'", count)))?
            }
            None => return Err(FsPostError::InvalidFsLabelFormat(String::from("missing vertex count"))),
        };

        let mut vertexes = Vec::with_capacity(expected);
        for record in records {
            let record = record?;
            let fields: Vec<&str> = record.iter().filter(|f| !f.is_empty()).collect();
            if fields.is_empty() {
                continue;
            }
            if fields.len() != 5 {
                return Err(FsPostError::InvalidFsLabelFormat(format!("expected 5 fields, found {}", fields.len())));
            }
            let parse_err = |f: &str| FsPostError::InvalidFsLabelFormat(format!("invalid number '{}'", f));
            let index: i32 = fields[0].parse().map_err(|_| parse_err(fields[0]))?;
            let mut coords = [0f32; 4];
            for (c, f) in coords.iter_mut().zip(fields[1..].iter()) {
                *c = f.parse().map_err(|_| parse_err(*f))?;
            }
            vertexes.push(FsLabelVertex {
                index,
                coord1: coords[0],
                coord2: coords[1],
                coord3: coords[2],
                value: coords[3],
            });
        }

        if vertexes.len() != expected {
            return Err(FsPostError::InvalidFsLabelFormat(format!(
                "header announces {} vertices, found {}",
                expected,
                vertexes.len()
            )));
        }
        Ok(FsLabel { vertexes })
    }

    /// The set of vertex indices in this label.
    pub fn vertex_set(&self) -> HashSet<usize> {
        self.vertexes
            .iter()
            .filter(|v| v.index >= 0)
            .map(|v| v.index as usize)
            .collect()
    }
}

/// Read a FreeSurfer ASCII label file.
pub fn read_label<P: AsRef<Path>>(path: P) -> Result<FsLabel> {
    FsLabel::from_file(path)
}

#[cfg(test)]
mod test {
    use super::*;

    const LABEL: &str = "#!ascii label  , from subject subject1 vox2ras=TkReg
3
0  -1.852  -107.983  22.770 0.0000000000
1  -2.139  -108.102  22.826 0.0000000000
5  -3.205  -107.786  22.954 0.0000000000
";

    #[test]
    fn label_is_read() {
        let label = FsLabel::from_reader(LABEL.as_bytes()).unwrap();
        assert_eq!(3, label.vertexes.len());
        assert_eq!(5, label.vertexes[2].index);
        assert_eq!(-107.983, label.vertexes[0].coord2);
        let set = label.vertex_set();
        assert!(set.contains(&1) && set.contains(&5) && !set.contains(&2));
    }

    #[test]
    fn wrong_vertex_count_is_rejected() {
        let content = LABEL.replace("\n3\n", "\n4\n");
        assert!(FsLabel::from_reader(content.as_bytes()).is_err());
    }
}
