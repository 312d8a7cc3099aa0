use shared::protocol::{ClientMsg, ServerMsg};
use std::cell::RefCell;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CloseEvent, MessageEvent, WebSocket};

// Thread-local storage for the active WebSocket, so Leptos closures that must be
// Send + Sync never capture it.
thread_local! {
    static WS_REF: RefCell<Option<WebSocket>> = const { RefCell::new(None) };
}

/// `ws://host/ws`, or `wss://` when the page itself came over https.
pub fn socket_url() -> Option<String> {
    let location = web_sys::window()?.location();
    let scheme = match location.protocol().ok()?.as_str() {
        "https:" => "wss",
        _ => "ws",
    };
    Some(format!("{}://{}/ws", scheme, location.host().ok()?))
}

/// Open the socket and route every decoded `ServerMsg` to `on_message`.
pub fn connect<M, C>(url: &str, on_message: M, on_close: C) -> Result<(), JsValue>
where
    M: Fn(ServerMsg) + 'static,
    C: Fn() + 'static,
{
    let ws = WebSocket::new(url)?;

    let onmessage_callback = Closure::wrap(Box::new(move |e: MessageEvent| {
        if let Ok(text) = e.data().dyn_into::<js_sys::JsString>() {
            let text: String = text.into();
            match serde_json::from_str::<ServerMsg>(&text) {
                Ok(msg) => on_message(msg),
                Err(err) => {
                    web_sys::console::error_1(&format!("Bad server message: {}", err).into())
                }
            }
        }
    }) as Box<dyn FnMut(_)>);
    ws.set_onmessage(Some(onmessage_callback.as_ref().unchecked_ref()));
    onmessage_callback.forget();

    let onopen_callback = Closure::wrap(Box::new(move |_: web_sys::Event| {
        web_sys::console::log_1(&"WebSocket connected".into());
    }) as Box<dyn FnMut(_)>);
    ws.set_onopen(Some(onopen_callback.as_ref().unchecked_ref()));
    onopen_callback.forget();

    let onerror_callback = Closure::wrap(Box::new(move |_: web_sys::Event| {
        web_sys::console::error_1(&"WebSocket error".into());
    }) as Box<dyn FnMut(_)>);
    ws.set_onerror(Some(onerror_callback.as_ref().unchecked_ref()));
    onerror_callback.forget();

    let onclose_callback = Closure::wrap(Box::new(move |_: CloseEvent| {
        web_sys::console::log_1(&"WebSocket disconnected".into());
        WS_REF.with(|cell| *cell.borrow_mut() = None);
        on_close();
    }) as Box<dyn FnMut(_)>);
    ws.set_onclose(Some(onclose_callback.as_ref().unchecked_ref()));
    onclose_callback.forget();

    WS_REF.with(|cell| *cell.borrow_mut() = Some(ws));
    Ok(())
}

/// Send over the active socket. Returns false when there is none.
pub fn send(msg: &ClientMsg) -> bool {
    WS_REF.with(|cell| match cell.borrow().as_ref() {
        Some(ws) => match serde_json::to_string(msg) {
            Ok(json) => ws.send_with_str(&json).is_ok(),
            Err(_) => false,
        },
        None => false,
    })
}
