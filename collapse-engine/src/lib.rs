//! # Collapse Engine
//!
//! Simulation and diagnosis of coordination collapse in complex societies.
//!
//! ## Theory
//!
//! A society's coordination state is described by seven interacting
//! harmonies (governance, economy, trust, complexity, knowledge, wellbeing,
//! technology). Their joint coherence is the K-index:
//!
//! ```text
//! K = (H1 · H2 · H3 · H4 · H5 · H6 · H7)^(1/7)
//! ```
//!
//! Trust (H3) sits at the root of the causal ordering. Once it falls below
//! θ ≈ 0.37 the cascade through the other harmonies accelerates, and it is
//! rebuilt several times more slowly than it erodes.
//!
//! ## Features
//!
//! - `std` (default): Standard library support
//! - `parallel` (default): threshold sweeps on a rayon pool (ignored on wasm32)
//! - `wasm`: WebAssembly bindings via wasm-bindgen
//!
//! ## Example
//!
//! ```rust
//! use collapse_engine::{harmony_state, CascadeParameters, CascadeSimulator, ShockWindow};
//!
//! let simulator = CascadeSimulator::new(CascadeParameters::default());
//! let h0 = harmony_state(&[0.7, 0.7, 0.6, 0.65, 0.6, 0.65, 0.75]).unwrap();
//!
//! // A trust shock of 0.8 starting at t = 20 and lasting 10 time units
//! let run = simulator
//!     .simulate_with_shock(&h0, (0.0, 100.0), ShockWindow::new(20.0, 0.8))
//!     .unwrap();
//! println!("K(100) = {:.3}", run.final_k().unwrap());
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        collapse-engine                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  harmony.rs  │  params.rs        │  dynamics.rs  │ integrator.rs│
//! │  - Harmony   │  - ParameterSpec  │  - 7 coupled  │ - RK45/RK23  │
//! │  - K-index   │  - Cascade-       │    equations  │ - adaptive   │
//! │              │    Parameters     │               │   steps      │
//! ├──────────────┴───────────────────┴───────────────┴──────────────┤
//! │  simulator.rs: simulate, simulate_with_shock, threshold sweep   │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  case.rs     │  recovery.rs      │  comparator.rs │ velocity.rs │
//! │  - Historical│  - asymmetry      │  - sequences   │ - v_c model │
//! │    Case      │  - recovery time  │  - thresholds  │             │
//! │              │                   │  - speed/cap.  │             │
//! ├──────────────┴───────────────────┴────────────────┴─────────────┤
//! │  early_warning (re-exported): window signals, CSI, risk         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod case;
pub mod comparator;
pub mod dynamics;
pub mod error;
pub mod harmony;
pub mod integrator;
pub mod params;
pub mod recovery;
pub mod simulator;
pub mod velocity;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use early_warning;

// Re-exports
pub use case::HistoricalCase;
pub use comparator::{
    ComparatorConfig, ComparisonReport, MultiCaseComparator, SequenceComparison, SpacingPolicy,
    SpeedCapacity, ThresholdComparison,
};
pub use dynamics::{CascadeDynamics, VectorField};
pub use error::{CollapseError, Result};
pub use harmony::{
    harmony_state, k_index, k_series, Harmony, HarmonyMatrix, HarmonyState, N_HARMONIES,
    TRUST_ASYMMETRY_RATIO, TRUST_THRESHOLD, TRUST_THRESHOLD_RANGE,
};
pub use integrator::{IntegrationMethod, IntegrationStatus, SolverOptions};
pub use params::{CascadeParameters, ParameterSpec};
pub use recovery::{
    trust_asymmetry_ratio, trust_collapse_probability, CaseAsymmetry, RecoveryAnalyzer,
    RecoveryEstimate,
};
pub use simulator::{CascadeSimulator, ShockWindow, SimulatorConfig, ThresholdSample, Trajectory};
pub use velocity::{
    validate_cases, NetworkTopology, SocietyType, VelocityCase, VELOCITY_THRESHOLD,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the engine (call once, especially important for WASM)
#[cfg(feature = "wasm")]
pub fn init() {
    console_error_panic_hook::set_once();
}
