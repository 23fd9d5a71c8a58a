use flate2::write::GzEncoder;
use flate2::Compression;
use freesurfer_post::read_curv;

use std::fs;
use std::io::Write;

const CURV_FILE: &str = "resources/subjects_dir/sub-01/surf/lh.thickness";

#[test]
fn the_demo_curv_file_can_be_read() {
    let curv = read_curv(CURV_FILE).unwrap();

    assert_eq!(6, curv.header.num_vertices);
    assert_eq!(0, curv.header.num_faces);
    assert_eq!(1, curv.header.num_values_per_vertex);
    assert_eq!(vec![2.5, 3.0, 1.5, 2.0, 4.0, 0.0], curv.data.to_vec());
}

#[test]
fn gzipped_curv_files_can_be_read() {
    let dir = tempfile::tempdir().unwrap();
    let gz_file = dir.path().join("lh.thickness.gz");
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&fs::read(CURV_FILE).unwrap()).unwrap();
    fs::write(&gz_file, encoder.finish().unwrap()).unwrap();

    let curv = read_curv(&gz_file).unwrap();
    assert_eq!(read_curv(CURV_FILE).unwrap(), curv);
}

#[test]
fn missing_curv_files_are_an_error() {
    assert!(read_curv("resources/subjects_dir/sub-01/surf/rh.thickness").is_err());
}
