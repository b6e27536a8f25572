//! Desktop shell: an eframe window around one [`Viewer`](crate::Viewer)

mod app;
mod viewport;

use anyhow::Result;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::settings::Settings;

/// Open the viewer window and block until it is closed
pub fn run() -> Result<()> {
    env_logger::init();

    let trace_guard = init_tracing();

    // Friendly panic handler for GPU errors
    std::panic::set_hook(Box::new(|info| {
        let msg = info
            .payload()
            .downcast_ref::<String>()
            .map(|s| s.as_str())
            .or_else(|| info.payload().downcast_ref::<&str>().copied())
            .unwrap_or("Unknown error");

        if msg.contains("wgpu") || msg.contains("Buffer") || msg.contains("shader") {
            eprintln!("\n[GPU Error] {}", msg);
            eprintln!("\nThe GPU rejected a command; the driver or a shader/buffer layout mismatch is the likely cause.");
        } else {
            eprintln!("\n[Error] {}", msg);
        }
        if let Some(loc) = info.location() {
            eprintln!("  at {}:{}:{}", loc.file(), loc.line(), loc.column());
        }
    }));

    let settings = Settings::load();
    tracing::info!(
        "meshview {} (built {})",
        env!("CARGO_PKG_VERSION"),
        env!("MESHVIEW_BUILD_DATE")
    );

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([settings.window_width, settings.window_height])
            .with_title("meshview"),
        renderer: eframe::Renderer::Wgpu,
        depth_buffer: 0,
        ..Default::default()
    };

    eframe::run_native(
        "meshview",
        options,
        Box::new(move |cc| Ok(Box::new(app::MeshViewApp::new(cc, settings, trace_guard)?))),
    )
    .map_err(|e| anyhow::anyhow!("Failed to run: {}", e))
}

/// Fmt layer filtered by `RUST_LOG`; a Chrome trace layer when
/// `MESHVIEW_TRACE=1`.
fn init_tracing() -> Option<tracing_chrome::FlushGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("meshview=info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);

    let (chrome_layer, guard) = if std::env::var("MESHVIEW_TRACE").ok().as_deref() == Some("1") {
        let (layer, guard) = tracing_chrome::ChromeLayerBuilder::new().file("trace.json").build();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(chrome_layer);
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return None;
    }
    guard
}
