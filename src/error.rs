use wasm_bindgen::JsValue;

#[derive(Debug)]
pub enum ClientError {
    /// A browser API call threw.
    Js(String),
    Decode(serde_json::Error),
    /// The server refused the request and said why.
    Rejected(String),
    MissingElement(&'static str),
    NotConnected,
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Js(msg) => write!(f, "browser error: {msg}"),
            ClientError::Decode(err) => write!(f, "malformed payload: {err}"),
            ClientError::Rejected(detail) => write!(f, "{detail}"),
            ClientError::MissingElement(id) => write!(f, "missing page element #{id}"),
            ClientError::NotConnected => write!(f, "realtime channel is not connected"),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClientError::Decode(err) => Some(err),
            _ => None,
        }
    }
}

impl From<JsValue> for ClientError {
    fn from(value: JsValue) -> Self {
        let msg = value
            .as_string()
            .or_else(|| js_sys::JSON::stringify(&value).ok().and_then(|s| s.as_string()))
            .unwrap_or_else(|| format!("{value:?}"));
        ClientError::Js(msg)
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err)
    }
}

impl From<ClientError> for JsValue {
    fn from(err: ClientError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_displays_server_detail_verbatim() {
        let err = ClientError::Rejected("Name already taken".to_string());
        assert_eq!(err.to_string(), "Name already taken");
    }

    #[test]
    fn decode_error_keeps_source() {
        let bad = serde_json::from_str::<u32>("nope").unwrap_err();
        let err = ClientError::from(bad);
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().starts_with("malformed payload"));
    }
}
