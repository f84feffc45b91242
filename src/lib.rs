pub mod config;
pub mod dsp;
pub mod error;
pub mod pitch;
pub mod rng;
pub mod score;

pub use crate::config::RenderConfig;
pub use crate::dsp::engine::{Backend, Synthesizer};
pub use crate::dsp::mixer::{concat, mono_mix, stereo_mix, AudioBuffer};
pub use crate::dsp::sampler::SampleLibrary;
pub use crate::error::{Result, SynthError};
pub use crate::pitch::{PitchTable, PitchToken};
pub use crate::score::{duration_in_samples, duration_to_samples, Event, Score};

use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// WASM-exposed: return the keysynth version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// Parse the JSON score and config and render with the named backend.
/// An empty config string means the backend's defaults.
pub fn render_score(score_json: &str, backend: &str, config_json: &str) -> Result<AudioBuffer> {
    let backend: Backend = backend.parse()?;
    let score = Score::from_json(score_json)?;
    let config = if config_json.trim().is_empty() {
        RenderConfig::for_backend(backend)
    } else {
        RenderConfig::from_json(config_json)?
    };
    Synthesizer::new().render(backend, &score, &config)
}

/// WASM-exposed: render a JSON score such as `[["c4", 4], ["r", 8]]` to a
/// WAV byte array.
#[wasm_bindgen]
pub fn render_score_wav(
    score_json: &str,
    backend: &str,
    config_json: &str,
) -> std::result::Result<Vec<u8>, JsValue> {
    render_score(score_json, backend, config_json)
        .and_then(|audio| audio.to_wav_bytes())
        .map_err(js_error)
}

/// WASM-exposed: render a JSON score to raw mono 16-bit samples.
#[wasm_bindgen]
pub fn render_score_samples(
    score_json: &str,
    backend: &str,
    config_json: &str,
) -> std::result::Result<Vec<i16>, JsValue> {
    render_score(score_json, backend, config_json)
        .map(|audio| audio.samples)
        .map_err(js_error)
}

/// WASM-exposed: every key with its frequency and spellings.
#[wasm_bindgen]
pub fn pitch_table() -> std::result::Result<JsValue, JsValue> {
    let keys: Vec<_> = PitchTable::new().keys().collect();
    serde_wasm_bindgen::to_value(&keys).map_err(js_error)
}
