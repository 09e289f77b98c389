use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{Headers, Request, RequestInit, Response};

use crate::error::ClientError;
use crate::protocol::{
    Character, CharacterClass, CreateCharacterRequest, ErrorDetail, Location, TravelRequest,
    TravelResponse,
};

const GENERIC_ERROR: &str = "Error";

/// Raw outcome of one HTTP exchange.
struct Reply {
    ok: bool,
    status: u16,
    body: String,
}

impl Reply {
    fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// The game's HTTP API. Calls are never retried or timed out; a stalled
/// request simply never resolves.
pub struct ApiClient {
    base: String,
    token: String,
}

impl ApiClient {
    pub fn new(base: impl Into<String>, token: impl Into<String>) -> ApiClient {
        ApiClient { base: base.into(), token: token.into() }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn send(
        &self,
        method: &str,
        path: &str,
        body: Option<String>,
        authed: bool,
    ) -> Result<Reply, ClientError> {
        let headers = Headers::new()?;
        if body.is_some() {
            headers.set("Content-Type", "application/json")?;
        }
        if authed {
            headers.set("Authorization", &format!("Bearer {}", self.token))?;
        }

        let init = RequestInit::new();
        init.set_method(method);
        init.set_headers(&headers);
        if let Some(body) = &body {
            init.set_body(&JsValue::from_str(body));
        }

        let request = Request::new_with_str_and_init(&self.url(path), &init)?;
        let window =
            web_sys::window().ok_or_else(|| ClientError::Js("no global `window`".to_string()))?;
        let response: Response =
            JsFuture::from(window.fetch_with_request(&request)).await?.dyn_into()?;
        let text = JsFuture::from(response.text()?).await?;

        log::debug!("{method} {path} -> {}", response.status());
        Ok(Reply {
            ok: response.ok(),
            status: response.status(),
            body: text.as_string().unwrap_or_default(),
        })
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<Reply, ClientError> {
        let body = serde_json::to_string(body)?;
        self.send("POST", path, Some(body), true).await
    }

    /// `None` when the account has no character yet.
    pub async fn fetch_character(&self) -> Result<Option<Character>, ClientError> {
        let reply = self.send("GET", "/character", None, true).await?;
        if !reply.ok {
            log::info!("no character (status {})", reply.status);
            return Ok(None);
        }
        parse_character(&reply.body)
    }

    pub async fn create_character(
        &self,
        name: &str,
        class: CharacterClass,
    ) -> Result<(), ClientError> {
        let request = CreateCharacterRequest { name, character_class: class };
        let reply = self.post("/character/create", &request).await?;
        if reply.ok {
            return Ok(());
        }
        Err(ClientError::Rejected(rejection_message(&reply.body)))
    }

    pub async fn fetch_locations(&self) -> Result<Vec<Location>, ClientError> {
        self.send("GET", "/locations", None, false).await?.json()
    }

    /// `None` when the server refused the move; the page stays where it is.
    pub async fn travel(&self, location_id: i64) -> Result<Option<TravelResponse>, ClientError> {
        let reply = self.post("/character/move", &TravelRequest { location_id }).await?;
        if !reply.ok {
            log::info!("travel to {location_id} refused (status {})", reply.status);
            return Ok(None);
        }
        reply.json().map(Some)
    }
}

fn parse_character(body: &str) -> Result<Option<Character>, ClientError> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    // Missing, null and blank names all mean the account has no character yet.
    let named = value
        .get("character_name")
        .and_then(|v| v.as_str())
        .is_some_and(|n| !n.is_empty());
    if !named {
        return Ok(None);
    }
    Ok(Some(serde_json::from_value(value)?))
}

fn rejection_message(body: &str) -> String {
    serde_json::from_str::<ErrorDetail>(body)
        .ok()
        .and_then(|d| d.message())
        .unwrap_or_else(|| GENERIC_ERROR.to_string())
}
