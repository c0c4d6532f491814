// ── Native entry‑point ──
//
//   chat-widget chat   [options.json]
//   chat-widget viewer [options.json]

#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    use anyhow::{Context as _, anyhow, bail};
    use chat_widget::transport::BlockingTransport;
    use chat_widget::{ChatWidget, ChatWidgetApp, ModelViewer, ViewerConfig, ViewerOptions, WidgetOptions};

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let mode = args.next().unwrap_or_else(|| "chat".to_owned());
    let options_json = match args.next() {
        Some(path) => std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?,
        None => String::new(),
    };

    match mode.as_str() {
        "chat" => {
            let widget = ChatWidget::new(
                WidgetOptions::from_json(&options_json)?,
                Box::new(BlockingTransport::default()),
            )?;
            eframe::run_native(
                "Chat widget",
                eframe::NativeOptions::default(),
                Box::new(|_cc| Ok(Box::new(ChatWidgetApp::new(widget)))),
            )
        }
        "viewer" => {
            let config = ViewerConfig::from_options(ViewerOptions::from_json(&options_json)?)?;
            eframe::run_native(
                "Model viewer",
                chat_widget::viewer::native_options(),
                Box::new(|_cc| {
                    let viewer = ModelViewer::new(config);
                    viewer.load();
                    Ok(Box::new(viewer))
                }),
            )
        }
        other => bail!("unknown mode {other:?}, expected `chat` or `viewer`"),
    }
    .map_err(|e| anyhow!("{e}"))
}

#[cfg(target_arch = "wasm32")]
fn main() {}
