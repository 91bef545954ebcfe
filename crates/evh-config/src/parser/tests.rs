use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use approx::assert_relative_eq;
use evh_core::Error;

use super::*;
use crate::spec::AxisScale;
use crate::species::{ExpansionPolicy, Role, SpeciesKey};

fn parse(text: &str) -> Result<Config> {
    parse_str(text, "analysis.txt")
}

fn tmp_dir(tag: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let dir = std::env::temp_dir().join(format!("evh_parser_{tag}_{}_{}", std::process::id(), nanos));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn histogram_line_round_trip() {
    let config = parse("Histogram1D Event. h1 {10} {0:10} Primary.x 1\n").unwrap();
    let hists = config.histograms("Event.").unwrap();
    assert_eq!(hists.all().len(), 1);
    let h = &hists.all()[0];
    let HistogramSpec::D1 { header, x } = h else { panic!("expected a 1D spec, got {h:?}") };
    assert_eq!((x.n, x.low, x.high), (10, 0.0, 10.0));
    assert_eq!(header.variable, "Primary.x");
    assert_eq!(header.selection, "1");
    assert!(header.per_entry);
    assert_eq!(h.to_kind_string(), "Histogram1D");
    assert_eq!(h.to_binning_string(), "{10} {0:10}");
    assert_eq!(hists.per_entry().count(), 1);
    assert_eq!(hists.simple().count(), 0);
    assert!(config.options.per_entry_event);
    assert!(config.branches("Event.").unwrap().contains("Primary"));
}

#[test]
fn comments_blank_and_unknown_lines_are_ignored() {
    let config = parse(
        "# a comment\n\n   # indented comment\nSomething else entirely here\nFoo 1\nHistogram1D Event. h {1} {0:1} x 1\n",
    )
    .unwrap();
    assert_eq!(config.n_histograms(), 1);
}

#[test]
fn duplicate_names_are_rejected_across_trees() {
    let err = parse("Histogram1D Event. h {10} {0:10} x 1\nSimpleHistogram1D Run. h {10} {0:10} y 1\n")
        .unwrap_err();
    assert!(err.is_config());
    match &err {
        Error::AtLine { line, path, .. } => {
            assert_eq!(*line, 2);
            assert_eq!(path, &PathBuf::from("analysis.txt"));
        }
        other => panic!("expected a line annotation, got {other:?}"),
    }
    assert!(err.to_string().contains("Duplicate histogram name: h"));
}

#[test]
fn token_count_mismatch_names_the_counts() {
    let msg = parse("Histogram1D Event. h {10} {0:10} x\n").unwrap_err().to_string();
    assert!(msg.contains("found 6, expected 7"), "{msg}");
    assert!(msg.contains("too few"), "{msg}");
    let msg = parse("Histogram1D Event. h {10} {0:10} x 1 extra\n").unwrap_err().to_string();
    assert!(msg.contains("too many"), "{msg}");
}

#[test]
fn tree_names_are_normalized_and_checked() {
    let config = parse("SimpleHistogram1D Run h {2} {0:2} Summary.duration 1\n").unwrap();
    let run = config.histograms("Run.").unwrap();
    assert_eq!(run.simple().count(), 1);
    assert_eq!(run.all()[0].tree(), "Run.");
    assert!(!config.options.per_entry_run);

    let err = parse("Histogram1D Events. h {2} {0:2} x 1\n").unwrap_err();
    assert!(err.is_config());
    let msg = err.to_string();
    assert!(msg.contains("Beam., Event., Model., Options., Run."), "{msg}");
}

#[test]
fn axis_flags_are_assigned_in_order() {
    let config = parse(
        "Histogram2DLog Event. a {2,3} {0:2,0:3} y:x 1\nHistogram2DLinLog Event. b {2,3} {0:2,0:3} y:x 1\n",
    )
    .unwrap();
    let all = config.histograms("Event.").unwrap().all();
    let a = all[0].axes();
    assert!(a[0].is_log_spaced() && !a[1].is_log_spaced());
    assert_relative_eq!(a[0].high, 100.0, max_relative = 1e-12);
    let b = all[1].axes();
    assert!(!b[0].is_log_spaced() && b[1].is_log_spaced());
    assert_eq!(all[1].to_kind_string(), "Histogram2DLinLog");

    assert!(parse("Histogram1DLogLog Event. c {2} {0:2} x 1\n").unwrap_err().is_config());
}

#[test]
fn log_binning_string_keeps_declared_exponents() {
    let config = parse("Histogram1DLog Event. l {10} {0.1:2.7} x 1\n").unwrap();
    let h = &config.histograms("Event.").unwrap().all()[0];
    assert_eq!(h.to_binning_string(), "{10} {0.1:2.7}");
    assert_eq!(h.axes()[0].log_exponents, Some((0.1, 2.7)));
}

#[test]
fn bins_and_binning_must_match_dimension() {
    let msg = parse("Histogram2D Event. h {10} {0:1,0:1} y:x 1\n").unwrap_err().to_string();
    assert!(msg.contains("dimension"), "{msg}");
    assert!(parse("Histogram2D Event. h {10,10} {0:1} y:x 1\n").unwrap_err().is_config());
    assert!(parse("Histogram1D Event. h {0} {0:1} x 1\n").unwrap_err().is_config());
    assert!(parse("Histogram1D Event. h {2.5} {0:1} x 1\n").unwrap_err().is_config());
    assert!(parse("Histogram1D Event. h {10} {a:b} x 1\n").unwrap_err().is_config());

    let config = parse("Histogram1D Event. h {1e2} {0:1} x 1\n").unwrap();
    assert_eq!(config.histograms("Event.").unwrap().all()[0].axes()[0].n, 100);
}

#[test]
fn too_many_sub_variables_are_rejected() {
    let msg = parse("Histogram2D Event. h {2,2} {0:1,0:1} z:y:x 1\n").unwrap_err().to_string();
    assert!(msg.contains("3 sub-variables"), "{msg}");
    parse("Histogram3D Event. h {2,2,2} {0:1,0:1,0:1} z:y:x 1\n").unwrap();
}

#[test]
fn four_dimensional_histograms() {
    let config =
        parse("Histogram4DLinLinLinLog Event. h4 {2,2,2,3} {0:1,0:1,0:1,-1:2} t:z:y:x 1\n").unwrap();
    let h = &config.histograms("Event.").unwrap().all()[0];
    assert_eq!(h.dimension(), 4);
    assert!(matches!(h, HistogramSpec::D4 { t_scale: AxisScale::Log, .. }));
}

#[test]
fn branches_are_inferred_from_expressions() {
    let config = parse(
        "Histogram1D Event. h {10} {0:10} Primary.energy Eloss.weight*(Primary.x>0.5)\n\
         SimpleHistogram1D Model. m {10} {0:10} Model.staS 1\n",
    )
    .unwrap();
    let event: Vec<&str> = config.branches("Event.").unwrap().iter().map(String::as_str).collect();
    assert!(event.contains(&"Primary"));
    assert!(event.contains(&"Eloss"));
    assert!(config.branches("Model.").unwrap().contains("Model"));
}

#[test]
fn edge_files_resolve_against_the_config_directory() {
    let dir = tmp_dir("edges");
    std::fs::write(dir.join("edges.txt"), "0\n1\n5\n10\n").unwrap();
    let config_path = dir.join("ana.txt");
    let config = parse_str("Histogram1D Event. h {3} {edges.txt} x 1\n", &config_path).unwrap();
    let h = &config.histograms("Event.").unwrap().all()[0];
    assert_eq!(h.axes()[0].bin_edges(), vec![0.0, 1.0, 5.0, 10.0]);
    assert_eq!(h.to_binning_string(), "{3} {edges.txt}");

    std::fs::write(dir.join("bad.txt"), "0\n1\nx\n").unwrap();
    let err = parse_str("Histogram1D Event. g {2} {bad.txt} x 1\n", &config_path).unwrap_err();
    assert!(matches!(err.root_cause(), Error::Parse(_)));
    assert!(err.to_string().contains("line 3"));

    std::fs::write(dir.join("desc.txt"), "3\n2\n1\n").unwrap();
    let err = parse_str("Histogram1D Event. d {2} {desc.txt} x 1\n", &config_path).unwrap_err();
    assert!(matches!(err.root_cause(), Error::Range(_)));
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn options_are_set_case_insensitively() {
    let config = parse(
        "debug true\nInputFilePath data.json\nEventStart 2\nEVENTEND 10\nMergeHistograms 0\nPrintModuloFraction 0.5\n",
    )
    .unwrap();
    assert!(config.options.debug);
    assert_eq!(config.options.input_file_path, "data.json");
    assert_eq!((config.options.event_start, config.options.event_end), (2, 10));
    assert!(!config.options.merge_histograms);
    assert_eq!(config.options.print_modulo_fraction, 0.5);
    assert!(!config.options.per_entry_event);
    assert!(config.branches("Event.").is_none());

    let err = parse("Debug perhaps\n").unwrap_err();
    assert!(err.is_config());
}

#[test]
fn post_parse_invariants() {
    let config = parse("MergeHistograms 1\n").unwrap();
    assert!(config.options.per_entry_event);
    assert!(config.branches("Event.").unwrap().contains("Histos"));
    assert!(config.branches("Run.").unwrap().contains("Histos"));

    let config = parse("MergeHistograms 0\nCalculateOpticalFunctions true\n").unwrap();
    assert!(config.options.process_samplers);
    assert!(config.options.per_entry_event);

    let err = parse("EventStart 10\nEventEnd 5\n").unwrap_err();
    assert!(err.is_config());
    assert!(!matches!(err, Error::AtLine { .. }));
    parse("EventStart 10\nEventEnd -1\n").unwrap();
}

#[test]
fn particle_sets() {
    let config = parse("ParticleSet Sampler1\nSimpleParticleSet Sampler2\n").unwrap();
    assert!(config.particle_sets_per_entry().contains("Sampler1"));
    assert!(config.particle_sets_simple().contains("Sampler2"));
    assert!(config.branches("Event.").unwrap().contains("Sampler2"));
}

#[test]
fn spectra_declarations() {
    let config = parse(
        "Spectra Sampler1 {10} {0:10} {11,p2212} 1\n\
         Spectra Sampler1 {10} {0:10} particles 1\n\
         SpectraTELog Sampler1. {4} {-1:3} {total} 1\n\
         SimpleSpectraRigidity Sampler2 {5} {0:5} {22} Sampler2.weight\n",
    )
    .unwrap();

    let per_entry = config.per_entry_sets();
    assert_eq!(per_entry.len(), 3);
    assert_eq!(per_entry[0].name(), "Sampler1_0");
    assert_eq!(per_entry[0].base.variable(), "Sampler1.kineticEnergy");
    let names: Vec<&str> = per_entry[0].materialized().values().map(|s| s.name()).collect();
    assert_eq!(names, vec!["Spectra_Sampler1_0_11", "Spectra_Sampler1_0_2212_Primary"]);
    let p = &per_entry[0].materialized()[&SpeciesKey::new(2212, Role::Primary)];
    assert_eq!(p.selection(), "Sampler1.speciesId==2212&&Sampler1.parentId==0");

    assert_eq!(per_entry[1].name(), "Sampler1_1");
    assert!(per_entry[1].is_dynamic());
    assert_eq!(per_entry[1].policy, ExpansionPolicy::ParticlesOnly);

    assert_eq!(per_entry[2].name(), "Sampler1_TE_2");
    assert_eq!(per_entry[2].base.variable(), "Sampler1.energy");
    assert!(per_entry[2].base.axes()[0].is_log_spaced());

    let simple = config.simple_sets();
    assert_eq!(simple.len(), 1);
    assert_eq!(simple[0].name(), "Sampler2_Rigidity_0");
    assert_eq!(simple[0].base.variable(), "Sampler2.rigidity");
    assert_eq!(
        simple[0].materialized()[&SpeciesKey::any(22)].selection(),
        "Sampler2.weight*(Sampler2.speciesId==22)"
    );

    let event = config.branches("Event.").unwrap();
    assert!(event.contains("Sampler1") && event.contains("Sampler2"));
}

#[test]
fn dynamic_species_on_simple_spectra_is_an_error() {
    let err = parse("\nSimpleSpectra Sampler1 {10} {0:10} top3 1\n").unwrap_err();
    assert!(err.is_config());
    assert!(matches!(err, Error::AtLine { line: 2, .. }));
}

#[test]
fn spectra_errors() {
    assert!(parse("Spectra S1 {10} {0:10} {11}\n").unwrap_err().is_config());
    assert!(parse("SpectraFoo S1 {10} {0:10} {11} 1\n").unwrap_err().is_config());
    assert!(parse("Spectra S1 {10} {0:10} {q11} 1\n").unwrap_err().is_config());
    assert!(parse("Spectra S1 {10,10} {0:10} {11} 1\n").unwrap_err().is_config());
}

#[test]
fn merge_histograms_after_a_histogram_prefix_is_an_option() {
    let config = parse("SimpleHistogram1D MergeHistograms 0\n").unwrap();
    assert!(!config.options.merge_histograms);
    assert_eq!(config.n_histograms(), 0);

    let config = parse("MergeHistograms 0\nHistogram2D mergehistograms true\n").unwrap();
    assert!(config.options.merge_histograms);
}

#[test]
fn histogram_named_merge_histograms_is_a_histogram() {
    let config = parse("Histogram1D Event. MergeHistograms {10} {0:10} Primary.x 1\n").unwrap();
    let hists = config.histograms("Event.").unwrap();
    assert_eq!(hists.all().len(), 1);
    assert_eq!(hists.all()[0].name(), "MergeHistograms");
    assert!(config.options.merge_histograms);
}

#[test]
fn load_reads_files_from_disk() {
    let dir = tmp_dir("load");
    let path = dir.join("ana.txt");
    std::fs::write(&path, "MergeHistograms false\nSimpleHistogram1D Event. e {5} {0:5} Primary.n 1\n").unwrap();
    let config = Config::load(&path).unwrap();
    assert_eq!(config.path(), path.as_path());
    assert_eq!(config.histograms("Event.").unwrap().simple().count(), 1);
    assert!(Config::load(dir.join("missing.txt")).unwrap_err().is_config());
    let _ = std::fs::remove_dir_all(dir);
}
