mod common;

use common::*;

fn run_once(dir: &std::path::Path, config: &std::path::Path, input: &str, name: &str) -> std::path::PathBuf {
    let input_path = dir.join(format!("{name}.input.json"));
    std::fs::write(&input_path, input).unwrap();
    let output = dir.join(format!("{name}.json"));
    let out = run(&[
        "run",
        "--config",
        config.to_str().unwrap(),
        "--input",
        input_path.to_str().unwrap(),
        "--output",
        output.to_str().unwrap(),
    ]);
    assert_success(&out);
    output
}

#[test]
fn combine_averages_per_entry_and_sums_simple() {
    let (dir, config) = fixture("combine");
    let a = run_once(&dir, &config, INPUT, "a");
    let other = INPUT.replace("[[0.5], [1.5, 2.5]]", "[[0.5], [0.5]]");
    let b = run_once(&dir, &config, &other, "b");

    let merged = dir.join("merged.json");
    let out = run(&["combine", "--output", merged.to_str().unwrap(), a.to_str().unwrap(), b.to_str().unwrap()]);
    assert_success(&out);

    let doc = read_json(&merged);
    let px = &doc["groups"]["Event/PerEntryHistograms"]["px"];
    // bin 1 means: 0.5 and 1.0
    assert_eq!(px["content"][1].as_f64(), Some(0.75));
    assert_eq!(px["entries"].as_f64(), Some(2.0));
    let spx = &doc["groups"]["Event/SimpleHistograms"]["spx"];
    assert_eq!(spx["content"][1].as_f64(), Some(3.0));
    assert_eq!(spx["entries"].as_f64(), Some(5.0));
}

#[test]
fn combine_needs_inputs() {
    let dir = tmp_dir("combine_empty");
    let out = run(&["combine", "--output", dir.join("m.json").to_str().unwrap()]);
    assert!(!out.status.success());
}
