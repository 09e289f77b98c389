use std::cell::RefCell;
use std::rc::{Rc, Weak};

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Element, HtmlCanvasElement, KeyboardEvent, MouseEvent, Window};

pub mod api;
pub mod config;
pub mod error;
pub mod protocol;
pub mod realtime;
pub mod render;
pub mod session;
pub mod ui;

use crate::api::ApiClient;
use crate::config::{ClientConfig, TOKEN_KEY, USERNAME_KEY};
use crate::error::ClientError;
use crate::protocol::{Character, CharacterClass, Location};
use crate::realtime::{Channel, ChannelEvent, EventHandler};
use crate::render::{cell_at, Renderer};
use crate::session::{Refresh, Session};
use crate::ui::Page;

const CONNECTED: &str = "Connected to server";
const DISCONNECTED: &str = "Connection lost";
const EMPTY_NAME: &str = "Enter a character name";

// --- GAME CLIENT ---
// One per logged-in page. Lives in `CLIENT` so the functions exported to the
// page markup can reach it; `logout` takes it out and tears it down.

struct GameClient {
    config: ClientConfig,
    api: ApiClient,
    page: Page,
    session: RefCell<Session>,
    channel: RefCell<Channel>,
    renderer: RefCell<Renderer>,
    ticker: RefCell<Option<(i32, Closure<dyn FnMut()>)>>,
}

thread_local! {
    static CLIENT: RefCell<Option<Rc<GameClient>>> = const { RefCell::new(None) };
}

fn client() -> Result<Rc<GameClient>, ClientError> {
    CLIENT
        .with(|cell| cell.borrow().clone())
        .ok_or_else(|| ClientError::Js("game client not started".to_string()))
}

fn window() -> Result<Window, ClientError> {
    web_sys::window().ok_or_else(|| ClientError::Js("no global `window` exists".to_string()))
}

fn redirect(window: &Window, url: &str) -> Result<(), ClientError> {
    log::info!("redirecting to {url}");
    window.location().set_href(url)?;
    Ok(())
}

impl GameClient {
    fn refresh(&self, what: Refresh) {
        let session = self.session.borrow();
        let result = match what {
            Refresh::Nothing => Ok(()),
            Refresh::Character => {
                self.page.update_hud(&session);
                self.page.render_players(&session)
            }
            Refresh::Players => self.page.render_players(&session),
            Refresh::Chat => match session.last_chat() {
                Some(line) => self.page.append_chat(line),
                None => Ok(()),
            },
        };
        if let Err(err) = result {
            log::error!("page update failed: {err}");
        }
    }

    fn system(&self, text: impl Into<String>) {
        let refresh = self.session.borrow_mut().push_system(text);
        self.refresh(refresh);
    }

    fn on_channel_event(&self, event: ChannelEvent) {
        match event {
            ChannelEvent::Opened => {
                log::info!("realtime channel open");
                self.system(CONNECTED);
            }
            ChannelEvent::Message(msg) => {
                let refresh = self.session.borrow_mut().apply(msg);
                self.refresh(refresh);
            }
            ChannelEvent::Closed => {
                log::warn!("realtime channel closed");
                self.system(DISCONNECTED);
            }
        }
    }

    fn adopt_character(&self, character: Character) {
        let mut session = self.session.borrow_mut();
        log::info!(
            "{} playing as {} (user {})",
            session.username().unwrap_or("anonymous"),
            character.character_name,
            character.user_id
        );
        session.set_character(character);
        drop(session);
        self.refresh(Refresh::Character);
    }

    fn adopt_locations(self: &Rc<Self>, locations: Vec<Location>) -> Result<(), ClientError> {
        let weak = Rc::downgrade(self);
        let on_pick: Rc<dyn Fn(i64)> = Rc::new(move |id| {
            if let Some(client) = weak.upgrade() {
                spawn_local(async move {
                    if let Err(err) = client.travel(id).await {
                        log::error!("travel to {id} failed: {err}");
                    }
                });
            }
        });
        self.page.render_locations(&locations, on_pick)?;
        self.session.borrow_mut().set_locations(locations);
        self.refresh(Refresh::Character);
        Ok(())
    }

    fn connect(self: &Rc<Self>) -> Result<(), ClientError> {
        let user_id = self
            .session
            .borrow()
            .user_id()
            .ok_or_else(|| ClientError::Rejected("no character loaded".to_string()))?;
        let weak: Weak<GameClient> = Rc::downgrade(self);
        let handler: EventHandler = Rc::new(move |event| {
            if let Some(client) = weak.upgrade() {
                client.on_channel_event(event);
            }
        });
        self.channel.borrow_mut().connect(&self.config.ws_url(user_id), handler)
    }

    /// Redraws every `tick_ms`, independent of network traffic. Starting an
    /// already running loop does nothing.
    fn start_render_loop(self: &Rc<Self>) -> Result<(), ClientError> {
        if self.ticker.borrow().is_some() {
            return Ok(());
        }
        let weak = Rc::downgrade(self);
        let tick = Closure::wrap(Box::new(move || {
            let Some(client) = weak.upgrade() else { return };
            let session = client.session.borrow();
            let mut renderer = client.renderer.borrow_mut();
            if let Err(err) = renderer.render(&session) {
                log::error!("render failed: {err}");
            };
        }) as Box<dyn FnMut()>);
        let id = window()?.set_interval_with_callback_and_timeout_and_arguments_0(
            tick.as_ref().unchecked_ref(),
            self.config.tick_ms,
        )?;
        *self.ticker.borrow_mut() = Some((id, tick));
        Ok(())
    }

    fn enter_world(self: &Rc<Self>) -> Result<(), ClientError> {
        self.connect()?;
        self.start_render_loop()
    }

    fn fit_canvas(&self) {
        if let Some((w, h)) = self.page.map_area_size() {
            self.renderer.borrow_mut().resize(w, h);
        }
    }

    fn on_canvas_click(&self, event: &MouseEvent) -> Result<(), ClientError> {
        if self.session.borrow().character().is_none() {
            return Ok(());
        }
        let rect = self.renderer.borrow().canvas().get_bounding_client_rect();
        let cell = cell_at(
            event.client_x() as f64 - rect.left(),
            event.client_y() as f64 - rect.top(),
            self.config.cell_size,
        );
        self.channel.borrow().send_move(cell)?;
        Ok(())
    }

    fn send_chat(&self) -> Result<(), ClientError> {
        let input = self.page.input(ui::CHAT_INPUT)?;
        match self.channel.borrow().send_chat(&input.value()) {
            Ok(true) => input.set_value(""),
            Ok(false) => {}
            Err(ClientError::NotConnected) => log::debug!("chat dropped: no socket"),
            Err(err) => return Err(err),
        }
        Ok(())
    }

    async fn travel(self: Rc<Self>, location_id: i64) -> Result<(), ClientError> {
        let Some(resp) = self.api.travel(location_id).await? else {
            return Ok(());
        };
        let destination = self.session.borrow_mut().apply_travel(resp);
        self.refresh(Refresh::Character);
        let name = destination.unwrap_or_else(|| format!("location {location_id}"));
        self.system(format!("Moved to {name}"));
        Ok(())
    }

    async fn create_character(self: Rc<Self>) -> Result<(), ClientError> {
        let name = self.page.input(ui::CHAR_NAME_INPUT)?.value();
        let name = name.trim();
        if name.is_empty() {
            self.page.show_char_error(EMPTY_NAME);
            return Ok(());
        }
        let class = self.session.borrow().selected_class();
        match self.api.create_character(name, class).await {
            Ok(()) => {}
            Err(ClientError::Rejected(detail)) => {
                self.page.show_char_error(&detail);
                return Ok(());
            }
            Err(err) => return Err(err),
        }

        self.page.show_create_overlay(false);
        if let Some(character) = self.api.fetch_character().await? {
            self.adopt_character(character);
        }
        self.enter_world()
    }

    fn shutdown(&self) {
        if let Some((id, _tick)) = self.ticker.borrow_mut().take() {
            if let Ok(window) = window() {
                window.clear_interval_with_handle(id);
            }
        }
        self.channel.borrow_mut().close();
        self.session.borrow_mut().clear();
    }
}

async fn bootstrap(client: Rc<GameClient>) -> Result<(), ClientError> {
    let character = client.api.fetch_character().await?;
    let locations = client.api.fetch_locations().await?;
    client.adopt_locations(locations)?;
    match character {
        Some(character) => {
            client.adopt_character(character);
            client.enter_world()
        }
        None => {
            log::info!("no character yet, showing creation");
            client.page.show_create_overlay(true);
            Ok(())
        }
    }
}

fn wire_listeners(client: &Rc<GameClient>, window: &Window) -> Result<(), ClientError> {
    {
        let weak = Rc::downgrade(client);
        let closure = Closure::wrap(Box::new(move || {
            if let Some(client) = weak.upgrade() {
                client.fit_canvas();
            }
        }) as Box<dyn FnMut()>);
        window.add_event_listener_with_callback("resize", closure.as_ref().unchecked_ref())?;
        closure.forget();
    }

    {
        let weak = Rc::downgrade(client);
        let closure = Closure::wrap(Box::new(move |event: MouseEvent| {
            let Some(client) = weak.upgrade() else { return };
            if let Err(err) = client.on_canvas_click(&event) {
                log::error!("move failed: {err}");
            }
        }) as Box<dyn FnMut(_)>);
        let canvas = client.renderer.borrow().canvas().clone();
        canvas.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref())?;
        closure.forget();
    }

    {
        let weak = Rc::downgrade(client);
        let closure = Closure::wrap(Box::new(move |event: KeyboardEvent| {
            if event.key() != "Enter" {
                return;
            }
            let Some(client) = weak.upgrade() else { return };
            if let Err(err) = client.send_chat() {
                log::error!("chat failed: {err}");
            }
        }) as Box<dyn FnMut(_)>);
        client
            .page
            .element(ui::CHAT_INPUT)?
            .add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref())?;
        closure.forget();
    }

    Ok(())
}

// --- MAIN ---

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(config::log_level());
    let window = window()?;

    let storage = window.local_storage()?;
    let stored = |key: &str| storage.as_ref().and_then(|s| s.get_item(key).ok().flatten());
    let Some(token) = stored(TOKEN_KEY) else {
        redirect(&window, config::LOGIN_PAGE)?;
        return Ok(());
    };
    let username = stored(USERNAME_KEY);

    let document =
        window.document().ok_or_else(|| ClientError::Js("no document on window".to_string()))?;
    let page = Page::new(document);
    let canvas = page
        .element(ui::CANVAS)?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|_| ClientError::MissingElement(ui::CANVAS))?;
    let config = ClientConfig::from_canvas(&canvas);
    let renderer = Renderer::new(canvas, config.cell_size)?;

    let client = Rc::new(GameClient {
        api: ApiClient::new(config.api_base.clone(), token),
        config,
        page,
        session: RefCell::new(Session::new(username)),
        channel: RefCell::new(Channel::new()),
        renderer: RefCell::new(renderer),
        ticker: RefCell::new(None),
    });
    CLIENT.with(|cell| *cell.borrow_mut() = Some(client.clone()));

    client.fit_canvas();
    wire_listeners(&client, &window)?;

    spawn_local(async move {
        if let Err(err) = bootstrap(client).await {
            log::error!("bootstrap failed: {err}");
        }
    });
    Ok(())
}

// --- PAGE EXPORTS ---

#[wasm_bindgen(js_name = selectClass)]
pub fn select_class(card: Element, class: &str) -> Result<(), JsValue> {
    let class: CharacterClass = class.parse()?;
    let client = client()?;
    client.session.borrow_mut().select_class(class);
    client.page.highlight_class(&card);
    Ok(())
}

#[wasm_bindgen(js_name = createCharacter)]
pub async fn create_character() -> Result<(), JsValue> {
    client()?.create_character().await?;
    Ok(())
}

#[wasm_bindgen(js_name = travelTo)]
pub async fn travel_to(location_id: i32) -> Result<(), JsValue> {
    client()?.travel(location_id as i64).await?;
    Ok(())
}

#[wasm_bindgen(js_name = sendChat)]
pub fn send_chat() -> Result<(), JsValue> {
    client()?.send_chat()?;
    Ok(())
}

#[wasm_bindgen]
pub fn logout() -> Result<(), JsValue> {
    let window = window()?;
    if let Some(storage) = window.local_storage()? {
        storage.clear()?;
    }
    let login_page = match CLIENT.with(|cell| cell.borrow_mut().take()) {
        Some(client) => {
            client.shutdown();
            client.config.login_page.clone()
        }
        None => config::LOGIN_PAGE.to_string(),
    };
    redirect(&window, &login_page)?;
    Ok(())
}
