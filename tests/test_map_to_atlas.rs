use approx::assert_relative_eq;
use freesurfer_post::core::region_summary_table;
use freesurfer_post::{load_surface_data, map_to_atlas, read_annot, read_label, read_stats};

const SUBJECT_DIR: &str = "resources/subjects_dir/sub-01";

#[test]
fn thickness_is_summarized_within_cortex() {
    let data = load_surface_data(format!("{}/surf/lh.thickness", SUBJECT_DIR)).unwrap();
    let annot = read_annot(format!("{}/label/lh.aparc.annot", SUBJECT_DIR)).unwrap();
    let cortex = read_label(format!("{}/label/lh.cortex.label", SUBJECT_DIR)).unwrap();

    let summaries = map_to_atlas(&data, &annot, Some(&cortex)).unwrap();
    let regions: Vec<&str> = summaries.iter().map(|s| s.region.as_str()).collect();
    assert_eq!(vec!["unknown", "bankssts", "cuneus"], regions);

    assert_eq!(0, summaries[0].num_vertices);
    assert_eq!(None, summaries[0].mean);

    assert_eq!(2, summaries[1].num_vertices);
    assert_relative_eq!(2.75, summaries[1].mean.unwrap());

    let cuneus = &summaries[2];
    assert_eq!(3, cuneus.num_vertices);
    assert_relative_eq!(2.5, cuneus.mean.unwrap());
    assert_eq!(Some(1.5), cuneus.min);
    assert_eq!(Some(4.0), cuneus.max);

    let table = region_summary_table(&summaries, "aparc", "lh").unwrap();
    assert_eq!(
        vec!["atlas", "hemisphere", "region", "num_vertices", "mean", "std", "min", "max"],
        table.columns
    );
    assert_eq!(3, table.num_rows());
}

#[test]
fn without_cortex_the_medial_wall_counts() {
    let data = load_surface_data(format!("{}/surf/lh.thickness", SUBJECT_DIR)).unwrap();
    let annot = read_annot(format!("{}/label/lh.aparc.annot", SUBJECT_DIR)).unwrap();
    let summaries = map_to_atlas(&data, &annot, None).unwrap();
    assert_eq!(1, summaries[0].num_vertices);
    assert_eq!(Some(0.0), summaries[0].max);
}

#[test]
fn demo_stats_files_can_be_read() {
    let stats = read_stats(format!("{}/stats/lh.aparc.stats", SUBJECT_DIR)).unwrap();
    assert_eq!("lh", stats.name);
    assert_eq!(4, stats.num_structures());
    assert_eq!(Some(vec!["1456", "1070", "2156", "3121"]), stats.column("NumVert"));
    assert_eq!(3, stats.measures.len());

    let aseg = read_stats(format!("{}/stats/aseg.stats", SUBJECT_DIR)).unwrap();
    assert_eq!(4, aseg.measures.len());
    assert_eq!("eTIV", aseg.measures[3].short_name);
    assert_relative_eq!(1588423.911, aseg.measures[3].value);
}
