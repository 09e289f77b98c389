use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{MessageEvent, WebSocket};

use crate::error::ClientError;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::render::GridCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

impl ConnectionState {
    /// Maps `WebSocket.readyState`; CLOSING counts as closed.
    pub fn from_ready_state(state: u16) -> ConnectionState {
        match state {
            WebSocket::CONNECTING => ConnectionState::Connecting,
            WebSocket::OPEN => ConnectionState::Open,
            _ => ConnectionState::Closed,
        }
    }
}

/// What the socket reports back to the page.
#[derive(Debug)]
pub enum ChannelEvent {
    Opened,
    Message(ServerMessage),
    Closed,
}

pub type EventHandler = Rc<dyn Fn(ChannelEvent)>;

/// The single live realtime connection of a page. There is no reconnect:
/// once closed it stays closed until `connect` is called again.
#[derive(Default)]
pub struct Channel {
    socket: Option<WebSocket>,
}

impl Channel {
    pub fn new() -> Channel {
        Channel { socket: None }
    }

    pub fn state(&self) -> ConnectionState {
        self.socket.as_ref().map_or(ConnectionState::Closed, |ws| {
            ConnectionState::from_ready_state(ws.ready_state())
        })
    }

    /// Opens `url`, closing any previous socket first.
    pub fn connect(&mut self, url: &str, handler: EventHandler) -> Result<(), ClientError> {
        self.close();

        let ws = WebSocket::new(url)?;
        log::info!("connecting to {url}");

        {
            let handler = handler.clone();
            let onopen_callback = Closure::wrap(Box::new(move || {
                handler(ChannelEvent::Opened);
            }) as Box<dyn FnMut()>);
            ws.set_onopen(Some(onopen_callback.as_ref().unchecked_ref()));
            onopen_callback.forget();
        }

        {
            let handler = handler.clone();
            let onmessage_callback = Closure::wrap(Box::new(move |e: MessageEvent| {
                let Ok(txt) = e.data().dyn_into::<js_sys::JsString>() else {
                    log::warn!("ignoring non-text frame");
                    return;
                };
                let txt: String = txt.into();
                match ServerMessage::decode(&txt) {
                    Ok(msg) => handler(ChannelEvent::Message(msg)),
                    Err(err) => log::warn!("dropping frame: {err}"),
                }
            }) as Box<dyn FnMut(MessageEvent)>);
            ws.set_onmessage(Some(onmessage_callback.as_ref().unchecked_ref()));
            onmessage_callback.forget();
        }

        {
            let onclose_callback = Closure::wrap(Box::new(move || {
                handler(ChannelEvent::Closed);
            }) as Box<dyn FnMut()>);
            ws.set_onclose(Some(onclose_callback.as_ref().unchecked_ref()));
            onclose_callback.forget();
        }

        self.socket = Some(ws);
        Ok(())
    }

    /// Move intents are only sent on an open socket; anything else is
    /// dropped. Bounds and walkability are the server's call.
    pub fn send_move(&self, cell: GridCell) -> Result<bool, ClientError> {
        let Some(ws) = self.socket.as_ref().filter(|_| self.state() == ConnectionState::Open) else {
            log::debug!("move to ({}, {}) dropped: socket not open", cell.x, cell.y);
            return Ok(false);
        };
        ws.send_with_str(&ClientMessage::Move { x: cell.x, y: cell.y }.encode()?)?;
        Ok(true)
    }

    /// Returns whether anything was sent; blank input never is.
    pub fn send_chat(&self, input: &str) -> Result<bool, ClientError> {
        let Some(msg) = ClientMessage::chat(input) else {
            return Ok(false);
        };
        let ws = self.socket.as_ref().ok_or(ClientError::NotConnected)?;
        ws.send_with_str(&msg.encode()?)?;
        Ok(true)
    }

    /// Detaches the handlers so a replaced socket cannot touch the session,
    /// then closes it.
    pub fn close(&mut self) {
        if let Some(ws) = self.socket.take() {
            ws.set_onopen(None);
            ws.set_onmessage(None);
            ws.set_onclose(None);
            if let Err(err) = ws.close() {
                log::warn!("closing socket: {}", ClientError::from(err));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_state_mapping() {
        assert_eq!(ConnectionState::from_ready_state(0), ConnectionState::Connecting);
        assert_eq!(ConnectionState::from_ready_state(1), ConnectionState::Open);
        assert_eq!(ConnectionState::from_ready_state(2), ConnectionState::Closed);
        assert_eq!(ConnectionState::from_ready_state(3), ConnectionState::Closed);
    }

    #[test]
    fn channel_without_socket_is_closed_and_sends_nothing() {
        let ch = Channel::new();
        assert_eq!(ch.state(), ConnectionState::Closed);
        assert!(!ch.send_move(GridCell { x: 1, y: 2 }).unwrap());
        assert!(!ch.send_chat("   ").unwrap());
        assert!(matches!(ch.send_chat("hello"), Err(ClientError::NotConnected)));
    }
}
