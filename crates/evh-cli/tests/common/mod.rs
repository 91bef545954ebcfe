#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_evh"))
}

pub fn tmp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("evh_cli_{}_{}_{}", std::process::id(), nanos, name));
    std::fs::create_dir_all(&p).unwrap();
    p
}

pub fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

/// Run from `cwd` instead of the test's working directory.
pub fn run_in(cwd: &Path, args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .current_dir(cwd)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

pub fn assert_success(out: &Output) {
    assert!(
        out.status.success(),
        "command failed\nstdout:\n{}\nstderr:\n{}",
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );
}

pub fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

pub const CONFIG: &str = "\
InputFilePath input.json
MergeHistograms 0
Histogram1D Event. px {4} {0:4} Primary.x 1
SimpleHistogram1D Event. spx {4} {0:4} Primary.x 1
Spectra Sampler {4} {0:4} {11} 1
";

pub const INPUT: &str = r#"{
  "trees": {
    "Event.": {
      "entries": 2,
      "jagged": {
        "Primary.x": [[0.5], [1.5, 2.5]],
        "Sampler.speciesId": [[11], [11, 22]],
        "Sampler.kineticEnergy": [[0.5], [0.5, 3.5]]
      }
    }
  }
}"#;

/// Write the config and input files into a fresh directory.
pub fn fixture(name: &str) -> (PathBuf, PathBuf) {
    let dir = tmp_dir(name);
    let config = dir.join("analysis.txt");
    std::fs::write(&config, CONFIG).unwrap();
    std::fs::write(dir.join("input.json"), INPUT).unwrap();
    (dir, config)
}
