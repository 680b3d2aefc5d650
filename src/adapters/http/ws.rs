use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use futures_util::future::ready;
use futures_util::{SinkExt, StreamExt};
use crate::adapters::http::state::HttpState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(st): State<HttpState>) -> impl axum::response::IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, st))
}

/// Traduce el WebSocket a un flujo de textos JSON y delega en `LiveSession`.
async fn handle_socket(socket: WebSocket, st: HttpState) {
    let (sender, receiver) = socket.split();

    let inbound = receiver
        .take_while(|msg| ready(!matches!(msg, Ok(Message::Close(_)))))
        .filter_map(|msg| ready(as_text(msg)));
    let outbound = sender.with(|json: String| ready(Ok::<_, axum::Error>(Message::Text(json))));

    st.detection
        .open_session()
        .run(Box::pin(inbound), Box::pin(outbound))
        .await;
}

/// Ping/pong se descartan; los binarios se interpretan como texto UTF-8.
fn as_text(msg: Result<Message, axum::Error>) -> Option<Result<String, axum::Error>> {
    match msg {
        Ok(Message::Text(text)) => Some(Ok(text)),
        Ok(Message::Binary(bytes)) => Some(Ok(String::from_utf8_lossy(&bytes).into_owned())),
        Ok(_) => None,
        Err(e) => Some(Err(e)),
    }
}
