use std::path::Path;

use crate::config::Settings;
use crate::error::ScenarioError;
use crate::hints::alphabet::HintAlphabet;
use crate::scenario::report::{format_console_report, format_json_lines, ReplayReport};
use crate::scenario::runner::ScenarioRunner;
use crate::scenario::scenario_model::Scenario;

// ============================================================================
// replay subcommand
// ============================================================================

/// Replay scenarios and return whether all passed.
pub fn cmd_replay(
    scenario_path: &str,
    format: &str,
    output: Option<&str>,
    settings: &Settings,
    verbose: u8,
) -> Result<bool, Box<dyn std::error::Error>> {
    let scenarios = load_scenarios(scenario_path)?;

    if scenarios.is_empty() {
        eprintln!("No scenarios found at: {}", scenario_path);
        return Ok(true);
    }

    if verbose > 0 {
        eprintln!("Replaying {} scenarios...", scenarios.len());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let start = std::time::Instant::now();

    let results = runtime.block_on(async {
        let mut results = Vec::with_capacity(scenarios.len());
        for scenario in &scenarios {
            if verbose > 0 {
                eprintln!("  Replaying: {}", scenario.name);
            }
            results.push(ScenarioRunner::run(scenario, settings).await);
        }
        results
    });

    let report = ReplayReport::from_results(results).with_duration(start.elapsed().as_millis());
    let all_passed = report.all_passed();

    let output_content = match format {
        "json" => format_json_lines(&report),
        _ => format_console_report(&report),
    };

    match output {
        Some(path) => std::fs::write(path, &output_content)?,
        None => print!("{}", output_content),
    }

    Ok(all_passed)
}

/// Load scenarios from a single YAML file or a directory of YAML files.
pub fn load_scenarios(path: &str) -> Result<Vec<Scenario>, ScenarioError> {
    let read_err = |source| ScenarioError::Read {
        path: path.to_string(),
        source,
    };
    let metadata = std::fs::metadata(path).map_err(read_err)?;
    if metadata.is_dir() {
        let mut scenarios = Vec::new();
        for entry in std::fs::read_dir(path).map_err(read_err)? {
            let p = entry.map_err(read_err)?.path();
            if p.extension().is_some_and(|e| e == "yaml" || e == "yml") {
                scenarios.push(load_scenario(&p)?);
            }
        }
        // Sort by name for deterministic order
        scenarios.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(scenarios)
    } else {
        Ok(vec![load_scenario(Path::new(path))?])
    }
}

fn load_scenario(path: &Path) -> Result<Scenario, ScenarioError> {
    let display = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|source| ScenarioError::Read {
        path: display.clone(),
        source,
    })?;
    serde_yaml::from_str(&content).map_err(|source| ScenarioError::Parse { path: display, source })
}

// ============================================================================
// alphabet subcommand
// ============================================================================

/// Labels in hand-out order, space separated, wrapped at 26 per line.
pub fn cmd_alphabet(letters: Option<&str>, single: bool, settings: &Settings) -> String {
    let letters = letters.unwrap_or(&settings.hint_letters);
    let alphabet = HintAlphabet::new(letters, single || settings.include_single_letter_hints);
    let labels: Vec<&str> = alphabet.labels().iter().map(|l| l.as_str()).collect();

    let mut out = String::new();
    for line in labels.chunks(26) {
        out.push_str(&line.join(" "));
        out.push('\n');
    }
    out.push_str(&format!("({} labels)\n", alphabet.len()));
    out
}
