//! WASM bindings for Nodal Core.
//!
//! This module provides JavaScript-friendly bindings for running transient
//! analyses inside a browser without blocking the event loop.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { WasmTransient } from 'nodal_core';
//!
//! await init();
//!
//! const run = new WasmTransient(topologyJson, 1e-5, 0.04);
//!
//! function tick() {
//!   if (!run.run_batch(200)) {
//!     requestAnimationFrame(tick);
//!   } else {
//!     plot(JSON.parse(run.series_json()));
//!   }
//! }
//! tick();
//! ```

use wasm_bindgen::prelude::*;

use crate::error::CircuitError;
use crate::solver::{Progress, Simulator, SimulatorConfig, Transient, TransientParams};
use crate::Topology;

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
}

fn js_error(err: CircuitError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// A transient run driven in batches from JavaScript.
#[wasm_bindgen]
pub struct WasmTransient {
    run: Transient,
}

#[wasm_bindgen]
impl WasmTransient {
    /// Create a run from topology JSON.
    ///
    /// # Arguments
    /// * `topology_json` - Components and connections as produced by the editor
    /// * `dt` - Time step in seconds
    /// * `t_stop` - End time in seconds
    #[wasm_bindgen(constructor)]
    pub fn new(topology_json: &str, dt: f64, t_stop: f64) -> Result<WasmTransient, JsValue> {
        Self::with_config(topology_json, dt, t_stop, false, 100, 1e-6)
    }

    /// Create a run with explicit start mode and Newton-Raphson settings.
    #[wasm_bindgen]
    pub fn with_config(
        topology_json: &str,
        dt: f64,
        t_stop: f64,
        use_operating_point: bool,
        max_iterations: usize,
        abs_tol: f64,
    ) -> Result<WasmTransient, JsValue> {
        let topology = Topology::from_json(topology_json).map_err(js_error)?;
        let config = SimulatorConfig::new()
            .with_max_iterations(max_iterations)
            .with_abs_tol(abs_tol);
        let simulator = Simulator::from_topology(&topology, config).map_err(js_error)?;
        let params = TransientParams::new(dt, t_stop).with_operating_point(use_operating_point);
        let run = Transient::new(simulator, params).map_err(js_error)?;
        Ok(WasmTransient { run })
    }

    /// Take up to `steps` steps. Returns `true` once the run is finished.
    #[wasm_bindgen]
    pub fn run_batch(&mut self, steps: usize) -> Result<bool, JsValue> {
        let progress = self.run.advance(steps).map_err(js_error)?;
        Ok(progress == Progress::Finished)
    }

    /// Request cancellation; the next batch stops before its next step.
    #[wasm_bindgen]
    pub fn cancel(&self) {
        self.run.cancel_flag().cancel();
    }

    /// Last committed step index.
    #[wasm_bindgen(getter)]
    pub fn time_index(&self) -> usize {
        self.run.time_index()
    }

    /// Total number of steps after t = 0.
    #[wasm_bindgen(getter)]
    pub fn num_steps(&self) -> usize {
        self.run.num_steps()
    }

    /// Everything committed so far, as JSON.
    #[wasm_bindgen]
    pub fn series_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(self.run.series()).map_err(|e| js_error(e.into()))
    }

    /// Component state records for persisting with the schematic, as JSON.
    #[wasm_bindgen]
    pub fn states_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.run.simulator().component_states()).map_err(|e| js_error(e.into()))
    }
}

/// Get the library version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
