//! WebAssembly bindings for the collapse engine.
//!
//! JSON in, JSON out. Threshold sweeps run serially on wasm32 whether or
//! not `parallel` is enabled.
//!
//! ## Usage (JavaScript/TypeScript)
//!
//! ```javascript
//! import init, { WasmCollapseEngine, stressIndex } from 'collapse-engine';
//!
//! await init();
//!
//! const engine = new WasmCollapseEngine();
//! const h0 = [0.7, 0.7, 0.6, 0.65, 0.6, 0.65, 0.75];
//!
//! const run = JSON.parse(engine.simulateWithShock(h0, 0, 100, 20, 0.8, 10));
//! console.log(`final K = ${run.k[run.k.length - 1]}`);
//!
//! const sweep = JSON.parse(engine.findCollapseThreshold(h0, 0, 2, 21, 0.3));
//! ```

use crate::case::HistoricalCase;
use crate::comparator::{ComparatorConfig, MultiCaseComparator};
use crate::harmony::harmony_state;
use crate::integrator::IntegrationMethod;
use crate::params::CascadeParameters;
use crate::recovery::RecoveryAnalyzer;
use crate::simulator::{CascadeSimulator, ShockWindow, SimulatorConfig};
use early_warning::{DetectorConfig, EarlyWarningDetector};
use wasm_bindgen::prelude::*;

/// Initialize the WASM module (call once at startup)
#[wasm_bindgen(start)]
pub fn wasm_init() {
    console_error_panic_hook::set_once();
}

fn to_js<E: std::fmt::Display>(e: E) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// WASM-compatible cascade simulator
#[wasm_bindgen]
pub struct WasmCollapseEngine {
    simulator: CascadeSimulator,
}

#[wasm_bindgen]
impl WasmCollapseEngine {
    /// Create an engine with the default parameter set
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            simulator: CascadeSimulator::new(CascadeParameters::default()),
        }
    }

    /// Create from parameter JSON and optional simulator config JSON
    #[wasm_bindgen(js_name = "withParameters")]
    pub fn with_parameters(
        params_json: &str,
        config_json: Option<String>,
    ) -> Result<WasmCollapseEngine, JsValue> {
        let params = CascadeParameters::from_json(params_json).map_err(to_js)?;
        let config = match config_json {
            Some(json) => SimulatorConfig::from_json(&json).map_err(to_js)?,
            None => SimulatorConfig::default(),
        };
        Ok(Self {
            simulator: CascadeSimulator::with_config(params, config),
        })
    }

    /// Integrate from `h0` over [t_start, t_end]
    #[wasm_bindgen(js_name = "simulate")]
    pub fn simulate(
        &self,
        h0: Vec<f64>,
        t_start: f64,
        t_end: f64,
        method: Option<String>,
    ) -> Result<String, JsValue> {
        let h0 = harmony_state(&h0).map_err(to_js)?;
        let method = match method {
            Some(m) => m.parse::<IntegrationMethod>().map_err(to_js)?,
            None => self.simulator.config().method,
        };
        let traj = self
            .simulator
            .simulate(&h0, (t_start, t_end), None, method)
            .map_err(to_js)?;
        traj.to_json().map_err(to_js)
    }

    #[wasm_bindgen(js_name = "simulateWithShock")]
    pub fn simulate_with_shock(
        &self,
        h0: Vec<f64>,
        t_start: f64,
        t_end: f64,
        onset: f64,
        magnitude: f64,
        duration: Option<f64>,
    ) -> Result<String, JsValue> {
        let h0 = harmony_state(&h0).map_err(to_js)?;
        let mut shock = ShockWindow::new(onset, magnitude);
        if let Some(d) = duration {
            shock = shock.with_duration(d);
        }
        let traj = self
            .simulator
            .simulate_with_shock(&h0, (t_start, t_end), shock)
            .map_err(to_js)?;
        traj.to_json().map_err(to_js)
    }

    #[wasm_bindgen(js_name = "findCollapseThreshold")]
    pub fn find_collapse_threshold(
        &self,
        h0: Vec<f64>,
        shock_min: f64,
        shock_max: f64,
        n_samples: usize,
        k_threshold: f64,
    ) -> Result<String, JsValue> {
        let h0 = harmony_state(&h0).map_err(to_js)?;
        let samples = self
            .simulator
            .find_collapse_threshold(&h0, (shock_min, shock_max), n_samples, k_threshold)
            .map_err(to_js)?;
        to_json(&samples)
    }

    /// Export the resolved parameter set as JSON
    #[wasm_bindgen(js_name = "exportParameters")]
    pub fn export_parameters(&self) -> Result<String, JsValue> {
        self.simulator.params().to_json().map_err(to_js)
    }

    /// Get engine version
    #[wasm_bindgen(js_name = "version")]
    pub fn version() -> String {
        crate::VERSION.to_string()
    }
}

impl Default for WasmCollapseEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Collapse/recovery asymmetry of one historical case (case JSON)
#[wasm_bindgen(js_name = "analyzeCase")]
pub fn analyze_case(case_json: &str, trust_building_rate: Option<f64>) -> Result<String, JsValue> {
    let case = HistoricalCase::from_json(case_json).map_err(to_js)?;
    let analyzer = match trust_building_rate {
        Some(rate) => RecoveryAnalyzer::new(rate).map_err(to_js)?,
        None => RecoveryAnalyzer::default(),
    };
    to_json(&analyzer.analyze_historical_case(&case))
}

/// Run all cross-case comparisons over a JSON array of cases
#[wasm_bindgen(js_name = "compareCases")]
pub fn compare_cases(cases_json: &str, config_json: Option<String>) -> Result<String, JsValue> {
    let raw: Vec<serde_json::Value> = serde_json::from_str(cases_json).map_err(to_js)?;
    let cases = raw
        .iter()
        .map(|v| HistoricalCase::from_json(&v.to_string()))
        .collect::<crate::Result<Vec<_>>>()
        .map_err(to_js)?;
    let config = match config_json {
        Some(json) => ComparatorConfig::from_json(&json).map_err(to_js)?,
        None => ComparatorConfig::default(),
    };
    let report = MultiCaseComparator::with_config(cases, config)
        .and_then(|c| c.compare_all())
        .map_err(to_js)?;
    to_json(&report)
}

/// Coordination Stress Index of a scalar series
#[wasm_bindgen(js_name = "stressIndex")]
pub fn stress_index(
    series: Vec<f64>,
    threshold: f64,
    config_json: Option<String>,
) -> Result<String, JsValue> {
    let config = match config_json {
        Some(json) => serde_json::from_str::<DetectorConfig>(&json).map_err(to_js)?,
        None => DetectorConfig::default(),
    };
    let detector = EarlyWarningDetector::new(config).map_err(to_js)?;
    let index = detector.compute_csi(&series, threshold).map_err(to_js)?;
    to_json(&index)
}

#[cfg(test)]
mod tests {
    use super::*;

    const H0: [f64; 7] = [0.7, 0.7, 0.6, 0.65, 0.6, 0.65, 0.75];

    #[test]
    fn test_simulate_json() {
        let engine = WasmCollapseEngine::new();
        let json = engine.simulate(H0.to_vec(), 0.0, 10.0, None).unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["status"], "Success");
        assert!(v["k"].as_array().unwrap().len() > 1);
    }

    #[test]
    fn test_sweep_json() {
        let engine = WasmCollapseEngine::new();
        let json = engine
            .find_collapse_threshold(H0.to_vec(), 0.0, 1.0, 3, 0.3)
            .unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v.as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_analyze_case_json() {
        let rows: Vec<Vec<f64>> = (0..7)
            .map(|_| vec![0.8, 0.6, 0.3, 0.25, 0.4, 0.6, 0.7])
            .collect();
        let case = serde_json::json!({
            "name": "synthetic",
            "time": [0, 1, 2, 3, 4, 5, 6],
            "harmonies": rows,
        });
        let json = analyze_case(&case.to_string(), None).unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["recovery_duration"], 2.0);
    }
}
