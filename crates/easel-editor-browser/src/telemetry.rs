//! Browser console logging.

use tracing::Level;
use tracing::subscriber::set_global_default;
use tracing_subscriber::Registry;
use tracing_subscriber::layer::SubscriberExt;

/// Install panic messages and a console `tracing` subscriber.
///
/// Returns false if a global subscriber was already set.
pub fn init(console_level: Level) -> bool {
    console_error_panic_hook::set_once();

    let wasm_layer = tracing_wasm::WASMLayer::new(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(console_level)
            .build(),
    );
    set_global_default(Registry::default().with(wasm_layer)).is_ok()
}

/// Debug builds log at DEBUG, release builds at INFO.
pub fn default_level() -> Level {
    if cfg!(debug_assertions) {
        Level::DEBUG
    } else {
        Level::INFO
    }
}
