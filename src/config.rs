// --- CLIENT CONFIGURATION ---

pub const DEFAULT_API_BASE: &str = "https://dream-mmorpg-production.up.railway.app";
pub const DEFAULT_WS_BASE: &str = "wss://dream-mmorpg-production.up.railway.app/ws";
pub const LOGIN_PAGE: &str = "index.html";

/// Grid cell edge in canvas pixels.
pub const CELL_SIZE: u32 = 20;
/// Redraw cadence of the render loop.
pub const TICK_MS: i32 = 50;

/// Console verbosity: everything in debug builds, `info` and up otherwise.
pub fn log_level() -> log::Level {
    if cfg!(debug_assertions) {
        log::Level::Debug
    } else {
        log::Level::Info
    }
}

pub const TOKEN_KEY: &str = "token";
pub const USERNAME_KEY: &str = "username";

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_base: String,
    pub ws_base: String,
    pub login_page: String,
    pub cell_size: u32,
    pub tick_ms: i32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            api_base: DEFAULT_API_BASE.to_string(),
            ws_base: DEFAULT_WS_BASE.to_string(),
            login_page: LOGIN_PAGE.to_string(),
            cell_size: CELL_SIZE,
            tick_ms: TICK_MS,
        }
    }
}

impl ClientConfig {
    /// Applies endpoint overrides (the canvas `data-api` / `data-ws`
    /// attributes). Blank values are ignored and trailing slashes dropped.
    pub fn with_overrides(mut self, api: Option<String>, ws: Option<String>) -> Self {
        if let Some(api) = clean_base(api) {
            self.api_base = api;
        }
        if let Some(ws) = clean_base(ws) {
            self.ws_base = ws;
        }
        self
    }

    pub fn from_canvas(canvas: &web_sys::Element) -> Self {
        ClientConfig::default()
            .with_overrides(canvas.get_attribute("data-api"), canvas.get_attribute("data-ws"))
    }

    /// The realtime channel is keyed by user id in the path.
    pub fn ws_url(&self, user_id: i64) -> String {
        format!("{}/{}", self.ws_base, user_id)
    }
}

fn clean_base(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
