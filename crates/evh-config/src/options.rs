//! Analysis options set by `Key value` lines.

use evh_core::{Error, Result};
use serde::Serialize;

/// Option keys accepted in a configuration file (matched case-insensitively).
pub const OPTION_KEYS: [&str; 18] = [
    "Debug",
    "InputFilePath",
    "OutputFileName",
    "CalculateOpticalFunctions",
    "CalculateOpticalFunctionsFileName",
    "EmittanceOnTheFly",
    "EventStart",
    "EventEnd",
    "ProcessSamplers",
    "MergeHistograms",
    "PerEntryBeam",
    "PerEntryEvent",
    "PerEntryRun",
    "PerEntryOption",
    "PerEntryModel",
    "BackwardsCompatible",
    "PrintModuloFraction",
    "Verbose",
];

/// Typed analysis options.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Options {
    pub debug: bool,
    pub input_file_path: String,
    pub output_file_name: String,
    pub calculate_optical_functions: bool,
    pub calculate_optical_functions_file_name: String,
    pub emittance_on_the_fly: bool,
    /// First `Event.` record to process.
    pub event_start: i64,
    /// One past the last `Event.` record to process; negative means unbounded.
    pub event_end: i64,
    pub process_samplers: bool,
    pub merge_histograms: bool,
    pub per_entry_beam: bool,
    pub per_entry_event: bool,
    pub per_entry_run: bool,
    pub per_entry_option: bool,
    pub per_entry_model: bool,
    pub backwards_compatible: bool,
    /// Fraction of a tree's records between progress messages.
    pub print_modulo_fraction: f64,
    pub verbose: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            debug: false,
            input_file_path: String::new(),
            output_file_name: "output_ana.json".into(),
            calculate_optical_functions: false,
            calculate_optical_functions_file_name: String::new(),
            emittance_on_the_fly: false,
            event_start: 0,
            event_end: -1,
            process_samplers: false,
            merge_histograms: true,
            per_entry_beam: false,
            per_entry_event: false,
            per_entry_run: false,
            per_entry_option: false,
            per_entry_model: false,
            backwards_compatible: false,
            print_modulo_fraction: 0.01,
            verbose: false,
        }
    }
}

/// Whether `key` names an option.
pub fn is_option_key(key: &str) -> bool {
    OPTION_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    if value.eq_ignore_ascii_case("true") {
        return Ok(true);
    }
    if value.eq_ignore_ascii_case("false") {
        return Ok(false);
    }
    value
        .parse::<i64>()
        .map(|v| v != 0)
        .map_err(|_| Error::Config(format!("option {key}: '{value}' is not a boolean")))
}

fn parse_int(key: &str, value: &str) -> Result<i64> {
    // accept 1e6-style values as long as they are integral
    if let Ok(v) = value.parse::<i64>() {
        return Ok(v);
    }
    match value.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => Ok(v as i64),
        _ => Err(Error::Config(format!("option {key}: '{value}' is not an integer"))),
    }
}

fn parse_float(key: &str, value: &str) -> Result<f64> {
    value
        .parse::<f64>()
        .map_err(|_| Error::Config(format!("option {key}: '{value}' is not a number")))
}

impl Options {
    /// Set one option from its textual value.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key.to_ascii_lowercase().as_str() {
            "debug" => self.debug = parse_bool(key, value)?,
            "inputfilepath" => self.input_file_path = value.to_string(),
            "outputfilename" => self.output_file_name = value.to_string(),
            "calculateopticalfunctions" => self.calculate_optical_functions = parse_bool(key, value)?,
            "calculateopticalfunctionsfilename" => {
                self.calculate_optical_functions_file_name = value.to_string()
            }
            "emittanceonthefly" => self.emittance_on_the_fly = parse_bool(key, value)?,
            "eventstart" => self.event_start = parse_int(key, value)?,
            "eventend" => self.event_end = parse_int(key, value)?,
            "processsamplers" => self.process_samplers = parse_bool(key, value)?,
            "mergehistograms" => self.merge_histograms = parse_bool(key, value)?,
            "perentrybeam" => self.per_entry_beam = parse_bool(key, value)?,
            "perentryevent" => self.per_entry_event = parse_bool(key, value)?,
            "perentryrun" => self.per_entry_run = parse_bool(key, value)?,
            "perentryoption" => self.per_entry_option = parse_bool(key, value)?,
            "perentrymodel" => self.per_entry_model = parse_bool(key, value)?,
            "backwardscompatible" => self.backwards_compatible = parse_bool(key, value)?,
            "printmodulofraction" => self.print_modulo_fraction = parse_float(key, value)?,
            "verbose" => self.verbose = parse_bool(key, value)?,
            _ => return Err(Error::Config(format!("Invalid option: {key}"))),
        }
        Ok(())
    }

    /// Per-entry flag of a tree.
    pub fn per_entry(&self, tree: &str) -> bool {
        match tree {
            "Beam." => self.per_entry_beam,
            "Event." => self.per_entry_event,
            "Run." => self.per_entry_run,
            "Options." => self.per_entry_option,
            "Model." => self.per_entry_model,
            _ => false,
        }
    }

    /// Switch on the per-entry flag of a tree.
    pub fn enable_per_entry(&mut self, tree: &str) {
        match tree {
            "Beam." => self.per_entry_beam = true,
            "Event." => self.per_entry_event = true,
            "Run." => self.per_entry_run = true,
            "Options." => self.per_entry_option = true,
            "Model." => self.per_entry_model = true,
            _ => {}
        }
    }

    /// `EventEnd` with "unbounded" resolved to the largest index.
    pub fn event_end_effective(&self) -> i64 {
        if self.event_end < 0 { i64::MAX } else { self.event_end }
    }

    /// `Event.` records to process, clamped to `entries`.
    pub fn event_range(&self, entries: u64) -> std::ops::Range<u64> {
        let start = (self.event_start.max(0) as u64).min(entries);
        let end = (self.event_end_effective() as u64).min(entries);
        start..end.max(start)
    }

    /// Check the event range.
    pub fn validate(&self) -> Result<()> {
        if self.event_start < 0 {
            return Err(Error::Config(format!("EventStart ({}) must be >= 0", self.event_start)));
        }
        if self.event_end_effective() < self.event_start {
            return Err(Error::Config(format!(
                "EventEnd ({}) must be >= EventStart ({})",
                self.event_end, self.event_start
            )));
        }
        Ok(())
    }
}
