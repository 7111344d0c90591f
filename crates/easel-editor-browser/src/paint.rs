//! Paint timing.

use std::future::Future;

use send_wrapper::SendWrapper;
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::JsFuture;

/// Resolves on the next `requestAnimationFrame` callback.
///
/// Engine bindings return this from `Engine::after_paint`. Without a window
/// (workers) it resolves on the next microtask instead.
pub fn next_animation_frame() -> impl Future<Output = ()> + Send {
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        let scheduled = web_sys::window()
            .map(|window| window.request_animation_frame(&resolve).is_ok())
            .unwrap_or(false);
        if !scheduled {
            let _ = resolve.call0(&JsValue::NULL);
        }
    });
    // Only ever polled on the browser's single thread.
    let frame = SendWrapper::new(JsFuture::from(promise));
    async move {
        if frame.await.is_err() {
            tracing::trace!("animation frame promise rejected");
        }
    }
}
