#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod deformer;
pub mod exchange;
pub mod geom;
pub mod muscle;
pub mod schema;

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use deformer::{DeformDiagnostics, DeformInput, DeformerError, VertexSnapDeformer};
use exchange::{
    DeformRequest, DeformResponse, ExchangeError, MeshExport, MuscleInputsDescriptor,
    MuscleValueExport, RegistrationExport,
};
use geom::{GeomMesh, MeshDiagnostics, Point3, mesh_surface_grid};
use muscle::{
    MuscleError, MuscleEvaluation, MuscleInputs, MuscleNode, MuscleOutput, MuscleParams,
    MuscleValue,
};
use schema::{PluginSchema, RegistrationReport, SchemaRegistry, register_plugin};
use wasm_bindgen::JsError;
use wasm_bindgen::prelude::*;

cfg_if::cfg_if! {
    if #[cfg(all(feature = "console_error_panic_hook", target_arch = "wasm32"))] {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            console_error_panic_hook::set_once();
            init_logger();
        }
    } else {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            init_logger();
        }
    }
}

#[cfg(feature = "debug_logs")]
fn init_logger() {
    use log::LevelFilter;
    use wasm_bindgen_console_logger::DEFAULT_LOGGER;
    log::set_logger(&DEFAULT_LOGGER).expect("error initializing logger");
    log::set_max_level(LevelFilter::Debug);
}

#[cfg(not(feature = "debug_logs"))]
fn init_logger() {}

/// Starts the rayon pool used by the bind search.
#[cfg(all(feature = "parallel", target_arch = "wasm32"))]
#[wasm_bindgen]
pub async fn initialize_parallel(worker_count: Option<u32>) -> Result<(), JsError> {
    let threads = worker_count
        .map(|count| count.max(1) as usize)
        .or_else(|| {
            std::thread::available_parallelism()
                .map(|value| value.get())
                .ok()
        })
        .unwrap_or(1);

    wasm_bindgen_rayon::init_thread_pool(threads)
        .await
        .map_err(|err| JsError::new(&format!("could not start the rayon thread pool: {err}")))
}

#[macro_export]
macro_rules! debug_log {
    ($($t:tt)*) => {{
        #[cfg(feature = "debug_logs")]
        {
            #[cfg(target_arch = "wasm32")]
            {
                ::web_sys::console::log_1(&::wasm_bindgen::JsValue::from_str(&format!($($t)*)));
            }
            #[cfg(not(target_arch = "wasm32"))]
            {
                println!("{}", format!($($t)*));
            }
        }
    }};
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("unknown muscle id {0}")]
    UnknownMuscle(u32),
    #[error("unknown deformer id {0}")]
    UnknownDeformer(u32),
    #[error(transparent)]
    Muscle(#[from] MuscleError),
    #[error(transparent)]
    Deformer(#[from] DeformerError),
    #[error(transparent)]
    Exchange(#[from] ExchangeError),
}

/// Grid density used when previewing a muscle surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MeshPreviewOptions {
    /// Samples around the ring.
    pub u_samples: usize,
    /// Samples along the muscle.
    pub v_samples: usize,
}

impl Default for MeshPreviewOptions {
    fn default() -> Self {
        Self {
            u_samples: 32,
            v_samples: 12,
        }
    }
}

#[derive(Debug, Default)]
struct MuscleSlot {
    node: MuscleNode,
    inputs: MuscleInputs,
    cache: HashMap<MuscleOutput, MuscleValue>,
    last_warnings: Vec<String>,
}

impl MuscleSlot {
    fn invalidate(&mut self, plugin: &PluginSchema, inputs: &[&str]) {
        let schema = plugin.muscle();
        for input in inputs {
            for output in schema.affected_outputs(input) {
                if let Some(output) = MuscleOutput::from_name(output) {
                    self.cache.remove(&output);
                }
            }
        }
    }

    /// Recomputes once and fills every output missing from the cache.
    fn value(&mut self, output: MuscleOutput) -> Result<&MuscleValue, MuscleError> {
        if !self.cache.contains_key(&output) {
            let evaluation = self.node.evaluate(&self.inputs)?;
            for missing in MuscleOutput::ALL {
                self.cache
                    .entry(missing)
                    .or_insert_with(|| evaluation.value(missing));
            }
            self.last_warnings = evaluation.diagnostics.warnings;
        }
        self.cache
            .get(&output)
            .ok_or_else(|| MuscleError::Surface(format!("{} was not produced", output.long_name())))
    }
}

/// Public entry point for consumers.
#[wasm_bindgen]
pub struct Engine {
    initialized: bool,
    schema: PluginSchema,
    registration: RegistrationReport,
    muscles: BTreeMap<u32, MuscleSlot>,
    deformers: BTreeMap<u32, VertexSnapDeformer>,
    next_id: u32,
    preview: MeshPreviewOptions,
}

#[wasm_bindgen]
impl Engine {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Engine {
        let schema = PluginSchema::new();
        let mut registry = SchemaRegistry::default();
        let registration = register_plugin(&mut registry, &schema);
        Engine {
            initialized: true,
            schema,
            registration,
            muscles: BTreeMap::new(),
            deformers: BTreeMap::new(),
            next_id: 1,
            preview: MeshPreviewOptions::default(),
        }
    }

    #[wasm_bindgen]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Outcome of registering both node types against the in-memory host.
    #[wasm_bindgen]
    pub fn registration_report(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&RegistrationExport::from(&self.registration))
            .map_err(|err| JsError::new(&err.to_string()).into())
    }

    #[wasm_bindgen]
    pub fn create_muscle(&mut self) -> u32 {
        let id = self.allocate_id();
        self.muscles.insert(id, MuscleSlot::default());
        id
    }

    /// Replaces attachments and knobs from a `MuscleInputsDescriptor`.
    #[wasm_bindgen]
    pub fn set_muscle_inputs(&mut self, id: u32, inputs: JsValue) -> Result<(), JsValue> {
        let descriptor: MuscleInputsDescriptor =
            serde_wasm_bindgen::from_value(inputs).map_err(to_js_error)?;
        let inputs = descriptor.to_inputs().map_err(to_js_error)?;
        self.apply_muscle_inputs(id, inputs).map_err(to_js_error)
    }

    /// Replaces only the knobs, keeping the attachments.
    #[wasm_bindgen]
    pub fn set_muscle_params(&mut self, id: u32, params: JsValue) -> Result<(), JsValue> {
        let params: MuscleParams = serde_wasm_bindgen::from_value(params).map_err(to_js_error)?;
        self.apply_muscle_params(id, params).map_err(to_js_error)
    }

    /// Restores a persisted `internalMuscleLength`. Negative values clear it.
    #[wasm_bindgen]
    pub fn set_muscle_rest_length(&mut self, id: u32, rest_length: f64) -> Result<(), JsValue> {
        let slot = self.muscle_slot(id).map_err(to_js_error)?;
        slot.node.set_rest_length(Some(rest_length));
        slot.cache.clear();
        Ok(())
    }

    /// Evaluates an output by long or short name; `null` when the muscle
    /// does not produce that plug.
    #[wasm_bindgen]
    pub fn evaluate_muscle(&mut self, id: u32, plug: &str) -> Result<JsValue, JsValue> {
        match self.muscle_output(id, plug).map_err(to_js_error)? {
            Some(value) => serde_wasm_bindgen::to_value(&MuscleValueExport::from(&value))
                .map_err(|err| JsError::new(&err.to_string()).into()),
            None => Ok(JsValue::NULL),
        }
    }

    #[wasm_bindgen]
    pub fn muscle_preview(&mut self, id: u32) -> Result<JsValue, JsValue> {
        let (mesh, diagnostics) = self.muscle_mesh(id).map_err(to_js_error)?;
        serde_wasm_bindgen::to_value(&MeshExport::new(mesh, diagnostics))
            .map_err(|err| JsError::new(&err.to_string()).into())
    }

    #[wasm_bindgen]
    pub fn set_preview_density(&mut self, u_samples: usize, v_samples: usize) {
        self.preview = MeshPreviewOptions {
            u_samples: u_samples.max(3),
            v_samples: v_samples.max(2),
        };
    }

    #[wasm_bindgen]
    pub fn create_deformer(&mut self) -> u32 {
        let id = self.allocate_id();
        self.deformers.insert(id, VertexSnapDeformer::new());
        id
    }

    /// Flags the deformer to rebuild its vertex map on the next deform.
    #[wasm_bindgen]
    pub fn rebind(&mut self, id: u32) -> Result<(), JsValue> {
        self.deformer_mut(id).map_err(to_js_error)?.request_rebind();
        Ok(())
    }

    #[wasm_bindgen]
    pub fn deform(&mut self, id: u32, request: JsValue) -> Result<JsValue, JsValue> {
        let request: DeformRequest = serde_wasm_bindgen::from_value(request).map_err(to_js_error)?;
        let response = self.deform_request(id, &request).map_err(to_js_error)?;
        serde_wasm_bindgen::to_value(&response).map_err(|err| JsError::new(&err.to_string()).into())
    }

    #[wasm_bindgen]
    pub fn vertex_map(&self, id: u32) -> Result<Vec<i32>, JsValue> {
        self.deformers
            .get(&id)
            .map(|deformer| deformer.map().as_slice().to_vec())
            .ok_or_else(|| to_js_error(EngineError::UnknownDeformer(id)))
    }
}

impl Engine {
    #[must_use]
    pub fn registration(&self) -> &RegistrationReport {
        &self.registration
    }

    #[must_use]
    pub fn schema(&self) -> &PluginSchema {
        &self.schema
    }

    pub fn set_preview_options(&mut self, options: MeshPreviewOptions) {
        self.set_preview_density(options.u_samples, options.v_samples);
    }

    /// Replaces a muscle's inputs. Attachments always count as changed;
    /// knobs only when their value differs.
    pub fn apply_muscle_inputs(&mut self, id: u32, inputs: MuscleInputs) -> Result<(), EngineError> {
        let slot = self
            .muscles
            .get_mut(&id)
            .ok_or(EngineError::UnknownMuscle(id))?;
        let mut changed = slot.inputs.params.changed_attributes(&inputs.params);
        changed.push("connectionPt");
        slot.inputs = inputs;
        slot.invalidate(&self.schema, &changed);
        Ok(())
    }

    pub fn apply_muscle_params(&mut self, id: u32, params: MuscleParams) -> Result<(), EngineError> {
        let slot = self
            .muscles
            .get_mut(&id)
            .ok_or(EngineError::UnknownMuscle(id))?;
        let changed = slot.inputs.params.changed_attributes(&params);
        slot.inputs.params = params;
        slot.invalidate(&self.schema, &changed);
        Ok(())
    }

    /// Cached evaluation of one plug. `Ok(None)` for plugs the muscle does
    /// not compute (inputs, unknown names).
    pub fn muscle_output(&mut self, id: u32, plug: &str) -> Result<Option<MuscleValue>, EngineError> {
        let schema = self.schema.muscle();
        let Some(output) = schema
            .attribute(plug)
            .and_then(|attr| MuscleOutput::from_name(attr.long_name))
        else {
            return Ok(None);
        };
        let slot = self.muscle_slot(id)?;
        Ok(Some(slot.value(output)?.clone()))
    }

    /// Uncached full evaluation, advancing the muscle's rest length like a
    /// host evaluation would.
    pub fn evaluate_muscle_full(&mut self, id: u32) -> Result<MuscleEvaluation, EngineError> {
        let slot = self.muscle_slot(id)?;
        let evaluation = slot.node.evaluate(&slot.inputs)?;
        slot.cache.clear();
        Ok(evaluation)
    }

    /// Warnings of the evaluation that filled the cache last.
    pub fn muscle_warnings(&self, id: u32) -> Result<&[String], EngineError> {
        self.muscles
            .get(&id)
            .map(|slot| slot.last_warnings.as_slice())
            .ok_or(EngineError::UnknownMuscle(id))
    }

    pub fn muscle_mesh(&mut self, id: u32) -> Result<(GeomMesh, MeshDiagnostics), EngineError> {
        let preview = self.preview;
        let slot = self.muscle_slot(id)?;
        match slot.value(MuscleOutput::Surface)? {
            MuscleValue::Surface(surface) => {
                Ok(mesh_surface_grid(surface, preview.u_samples, preview.v_samples))
            }
            _ => Err(MuscleError::Surface("muscleSurface holds no surface".to_string()).into()),
        }
    }

    pub fn deformer(&self, id: u32) -> Option<&VertexSnapDeformer> {
        self.deformers.get(&id)
    }

    pub fn deformer_mut(&mut self, id: u32) -> Result<&mut VertexSnapDeformer, EngineError> {
        self.deformers
            .get_mut(&id)
            .ok_or(EngineError::UnknownDeformer(id))
    }

    pub fn deform_points(
        &mut self,
        id: u32,
        input: &DeformInput<'_>,
    ) -> Result<(Vec<Point3>, DeformDiagnostics), EngineError> {
        Ok(self.deformer_mut(id)?.deform(input)?)
    }

    pub fn deform_request(
        &mut self,
        id: u32,
        request: &DeformRequest,
    ) -> Result<DeformResponse, EngineError> {
        let deformer = self.deformer_mut(id)?;
        let previous = deformer.options();
        if let Some(envelope) = request.envelope {
            deformer.set_envelope(envelope);
        }

        let driven = request.driven_points();
        let driver = request.driver_points();
        let mut input = DeformInput::new(&driven, &driver).with_local_to_world(request.transform());
        if let Some(weights) = request.weights.as_deref() {
            input = input.with_weights(weights);
        }

        match deformer.deform(&input) {
            Ok((positions, diagnostics)) => {
                Ok(DeformResponse::new(&positions, deformer.state(), diagnostics))
            }
            Err(err) => {
                deformer.set_options(previous);
                Err(err.into())
            }
        }
    }

    fn muscle_slot(&mut self, id: u32) -> Result<&mut MuscleSlot, EngineError> {
        self.muscles
            .get_mut(&id)
            .ok_or(EngineError::UnknownMuscle(id))
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        id
    }
}

fn to_js_error<E: fmt::Display>(error: E) -> JsValue {
    js_error(&error.to_string())
}

fn js_error(message: &str) -> JsValue {
    #[cfg(target_arch = "wasm32")]
    {
        JsError::new(message).into()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = message;
        JsValue::NULL
    }
}
