//! Headless driver standing in for the visualization shell: loads a scenario,
//! runs simulation cycles through the engine and collects a JSON-ready report.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use herdfield_core::{
    CycleInputs, CycleReport, CycleSummary, EngineConfig, HerdEngine, NEUTRAL_SUITABILITY, Point,
    Raster, Weights,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// One scenario file: engine settings plus the inputs the shell would feed each cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Scenario {
    pub engine: EngineConfig,
    /// Month index, 1..=12.
    pub month: u32,
    /// Advance the month (wrapping 12 -> 1) after every cycle.
    pub advance_month: bool,
    /// Suitability rows (outer = rows); any resolution.
    #[serde(alias = "ndvi_matrix")]
    pub suitability: Option<Vec<Vec<f64>>>,
    /// Hazard points; extra fields such as `intensity` are ignored.
    #[serde(alias = "conflicts")]
    pub hazards: Vec<Point>,
    pub start: Point,
    pub end: Point,
    /// Sensed trajectory; simulated from the ideal path when absent.
    pub observed: Option<Vec<Point>>,
    pub cycles: u32,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            month: 3,
            advance_month: false,
            suitability: None,
            hazards: Vec::new(),
            start: Point::new(0.1, 0.9),
            end: Point::new(0.8, 0.2),
            observed: None,
            cycles: 1,
        }
    }
}

impl Scenario {
    /// Read a JSON scenario from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        let scenario: Scenario = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse scenario {}", path.display()))?;
        Ok(scenario)
    }

    /// Built-in Jonglei (Bor South) scenario: three camp clusters as hazards, seasonal run to the water.
    #[must_use]
    pub fn demo() -> Self {
        Self {
            engine: EngineConfig {
                rng_seed: Some(0xB0B5_0117),
                ..EngineConfig::default()
            },
            month: 1,
            advance_month: true,
            hazards: vec![
                Point::new(0.3695, 0.8637),
                Point::new(0.4140, 0.7919),
                Point::new(0.3260, 0.9233),
            ],
            start: Point::new(0.15, 0.85),
            end: Point::new(0.8, 0.2),
            cycles: 12,
            ..Self::default()
        }
    }

    fn suitability_raster(&self) -> Result<Option<Raster>> {
        match &self.suitability {
            Some(rows) => {
                let raster = Raster::from_rows(rows, NEUTRAL_SUITABILITY)
                    .context("suitability matrix needs at least 2 rows and 2 columns")?;
                Ok(Some(raster))
            }
            None => Ok(None),
        }
    }
}

/// Output of a scenario run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioReport {
    pub config: EngineConfig,
    pub final_weights: Weights,
    pub cycles: Vec<CycleSummary>,
    /// Potential raster after the last cycle, as rows.
    pub potential: Vec<Vec<f64>>,
    pub last_cycle: Option<CycleReport>,
}

fn next_month(month: u32) -> u32 {
    month % 12 + 1
}

/// Run `scenario`, optionally overriding its cycle count.
pub fn run_scenario(scenario: &Scenario, cycles: Option<u32>) -> Result<ScenarioReport> {
    let cycles = cycles.unwrap_or(scenario.cycles);
    if cycles == 0 {
        bail!("scenario must run at least one cycle");
    }
    let suitability = scenario.suitability_raster()?;
    let mut engine =
        HerdEngine::new(scenario.engine.clone()).context("invalid engine configuration")?;
    info!(
        columns = engine.dims().columns(),
        rows = engine.dims().rows(),
        hazards = scenario.hazards.len(),
        cycles,
        "running scenario"
    );

    let mut month = scenario.month;
    let mut summaries = Vec::with_capacity(cycles as usize);
    let mut last_cycle = None;
    for _ in 0..cycles {
        let report = engine.run_cycle(&CycleInputs {
            suitability: suitability.as_ref(),
            month,
            hazards: &scenario.hazards,
            start: scenario.start,
            end: scenario.end,
            observed: scenario.observed.as_deref(),
        });
        debug!(
            cycle = report.cycle.0,
            month,
            naturalness = report.observed_metrics.naturalness,
            "cycle finished"
        );
        if let Some(summary) = engine.history().last() {
            summaries.push(summary.clone());
        }
        last_cycle = Some(report);
        if scenario.advance_month {
            month = next_month(month);
        }
    }

    info!(
        safety = engine.weights().safety,
        resource = engine.weights().resource,
        "scenario complete"
    );
    Ok(ScenarioReport {
        config: engine.config().clone(),
        final_weights: engine.weights(),
        cycles: summaries,
        potential: engine.potential().rows().map(<[f64]>::to_vec).collect(),
        last_cycle,
    })
}
