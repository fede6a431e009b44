use wasm_bindgen::JsValue;
use web_sys as web;

pub fn js_err(e: JsValue) -> anyhow::Error {
    anyhow::anyhow!("{:?}", e)
}

pub fn to_js(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Element whose box sizes the canvas: its parent, or the canvas itself when
/// detached. Measuring the canvas would track its own backing-store size.
pub fn layout_box(canvas: &web::HtmlCanvasElement) -> web::Element {
    canvas
        .parent_element()
        .unwrap_or_else(|| canvas.clone().into())
}

/// CSS box of the canvas' parent plus the display's pixel ratio.
pub fn css_layout(canvas: &web::HtmlCanvasElement) -> Option<(f64, f64, f64)> {
    let window = web::window()?;
    let rect = layout_box(canvas).get_bounding_client_rect();
    Some((rect.width(), rect.height(), window.device_pixel_ratio()))
}

/// Keeps the canvas' drawing buffer at the engine's backing size.
pub fn sync_canvas_backing_size(canvas: &web::HtmlCanvasElement, (w, h): (u32, u32)) {
    if canvas.width() != w {
        canvas.set_width(w.max(1));
    }
    if canvas.height() != h {
        canvas.set_height(h.max(1));
    }
}
