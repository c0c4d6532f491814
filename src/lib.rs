//! An embeddable chat widget and a small model viewer, both drawn with egui.
//!
//! The host page picks what to mount through the explicit factory exports
//! [`start_chat_widget`] and [`start_model_viewer`]; nothing is attached to a
//! global namespace.

pub mod config;
pub mod message;
mod renderer;
pub mod transport;
pub mod view;
pub mod viewer;
pub mod widget;

use std::future::Future;

pub use config::{Position, ViewerConfig, ViewerOptions, WidgetConfig, WidgetOptions};
pub use message::{Message, Role};
pub use viewer::{LoadEvent, ModelViewer};
pub use widget::{ChatWidget, ChatWidgetApp};

// ── Web entry‑points ──
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
fn init_web_logging() {
    // Redirect `log` macros & panic messages to the browser console.
    // A second widget on the same page finds the logger already set.
    eframe::WebLogger::init(log::LevelFilter::Debug).ok();
    console_error_panic_hook::set_once();
}

#[cfg(target_arch = "wasm32")]
fn canvas_by_id(id: &str) -> Result<web_sys::HtmlCanvasElement, JsValue> {
    web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| JsValue::from_str("no document"))?
        .get_element_by_id(id)
        .ok_or_else(|| JsValue::from_str(&format!("no element with id {id:?}")))?
        .dyn_into::<web_sys::HtmlCanvasElement>()
        .map_err(|_| JsValue::from_str(&format!("element {id:?} is not a <canvas>")))
}

#[cfg(target_arch = "wasm32")]
fn to_js_err(e: &anyhow::Error) -> JsValue {
    JsValue::from_str(&format!("{e:#}"))
}

/// Mounts the chat widget on the given canvas.
///
/// `options_json` is the widget's option object serialized as JSON. Fails,
/// and draws nothing, when the options carry no API key.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub async fn start_chat_widget(canvas_id: String, options_json: String) -> Result<(), JsValue> {
    init_web_logging();

    let options = WidgetOptions::from_json(&options_json).map_err(|e| to_js_err(&e))?;
    let widget = ChatWidget::new(options, Box::new(transport::FetchTransport)).map_err(|e| to_js_err(&e))?;
    let canvas = canvas_by_id(&canvas_id)?;

    eframe::WebRunner::new()
        .start(
            canvas,
            eframe::WebOptions::default(),
            Box::new(|_cc| Ok(Box::new(ChatWidgetApp::new(widget)))),
        )
        .await
}

/// Mounts the model viewer on the given canvas and starts loading its asset.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub async fn start_model_viewer(canvas_id: String, options_json: String) -> Result<(), JsValue> {
    init_web_logging();

    let config = ViewerOptions::from_json(&options_json)
        .and_then(ViewerConfig::from_options)
        .map_err(|e| to_js_err(&e))?;
    let canvas = canvas_by_id(&canvas_id)?;

    eframe::WebRunner::new()
        .start(
            canvas,
            viewer::web_options(),
            Box::new(|_cc| {
                let viewer = ModelViewer::new(config);
                viewer.load();
                Ok(Box::new(viewer))
            }),
        )
        .await
}

// Executes an async future without blocking the egui thread
#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn execute<F: Future<Output = ()> + Send + 'static>(f: F) {
    std::thread::spawn(move || futures::executor::block_on(f));
}
#[cfg(target_arch = "wasm32")]
pub(crate) fn execute<F: Future<Output = ()> + 'static>(f: F) {
    wasm_bindgen_futures::spawn_local(f);
}
