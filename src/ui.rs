use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement, HtmlInputElement, MouseEvent};

use crate::error::ClientError;
use crate::protocol::{Character, Location};
use crate::session::{ChatLine, Session};

// --- PAGE ELEMENT IDS ---
pub const CANVAS: &str = "gameCanvas";
pub const MAP_AREA: &str = ".map-area";
pub const CHAT_INPUT: &str = "chatInput";
pub const CHAR_NAME_INPUT: &str = "charName";
const CREATE_OVERLAY: &str = "createCharOverlay";
const CHAR_MSG: &str = "char-msg";
const CHAT_MESSAGES: &str = "chatMessages";
const PLAYERS_LIST: &str = "playersList";
const LOCATIONS_LIST: &str = "locationsList";
const CLASS_CARD: &str = ".class-card";

/// Thin wrapper over the game page's DOM. Missing optional panels are
/// skipped silently so a trimmed-down page still works.
pub struct Page {
    document: Document,
}

impl Page {
    pub fn new(document: Document) -> Page {
        Page { document }
    }

    pub fn element(&self, id: &'static str) -> Result<Element, ClientError> {
        self.document.get_element_by_id(id).ok_or(ClientError::MissingElement(id))
    }

    pub fn input(&self, id: &'static str) -> Result<HtmlInputElement, ClientError> {
        self.element(id)?
            .dyn_into::<HtmlInputElement>()
            .map_err(|_| ClientError::MissingElement(id))
    }

    fn set_text(&self, id: &str, text: &str) {
        if let Some(el) = self.document.get_element_by_id(id) {
            el.set_text_content(Some(text));
        }
    }

    fn set_style(&self, id: &str, prop: &str, value: &str) {
        let Some(el) = self
            .document
            .get_element_by_id(id)
            .and_then(|el| el.dyn_into::<HtmlElement>().ok())
        else {
            return;
        };
        if let Err(err) = el.style().set_property(prop, value) {
            log::debug!("style {prop} on #{id}: {}", ClientError::from(err));
        }
    }

    /// Size of the element the canvas is meant to fill.
    pub fn map_area_size(&self) -> Option<(u32, u32)> {
        let area = self.document.query_selector(MAP_AREA).ok()??;
        Some((area.client_width().max(0) as u32, area.client_height().max(0) as u32))
    }

    // --- CHARACTER CREATION ---

    pub fn show_create_overlay(&self, visible: bool) {
        self.set_style(CREATE_OVERLAY, "display", if visible { "flex" } else { "none" });
    }

    pub fn show_char_error(&self, text: &str) {
        if let Some(el) = self.document.get_element_by_id(CHAR_MSG) {
            el.set_text_content(Some(text));
            el.set_class_name("message err");
        }
    }

    /// Marks `card` as the only selected class card.
    pub fn highlight_class(&self, card: &Element) {
        if let Ok(cards) = self.document.query_selector_all(CLASS_CARD) {
            for i in 0..cards.length() {
                if let Some(el) = cards.get(i).and_then(|n| n.dyn_into::<Element>().ok()) {
                    let _ = el.class_list().remove_1("selected");
                }
            }
        }
        let _ = card.class_list().add_1("selected");
    }

    // --- HUD ---

    pub fn update_hud(&self, session: &Session) {
        let Some(me) = session.character() else { return };
        self.set_text("topName", &me.character_name);
        self.set_text("hpText", &format!("{}/{}", me.hp, me.max_hp));
        self.set_style("hpFill", "width", &format!("{}%", me.hp_percent()));
        self.set_style("xpFill", "width", &format!("{}%", me.xp_percent()));
        self.set_text("lvlText", &format!("Lv.{}", me.level));
        self.set_text("goldText", &format!("\u{2605} {}", me.gold));
        self.set_text("sClass", &me.character_class);
        self.set_text("sLvl", &me.level.to_string());
        self.set_text("sHp", &format!("{}/{}", me.hp, me.max_hp));
        self.set_text("sAtk", &me.attack.to_string());
        self.set_text("sDef", &me.defense.to_string());
        self.set_text("sSpd", &me.speed.to_string());
        self.set_text("sLoc", session.current_location().map_or("-", |l| l.name.as_str()));
        self.set_text("sPosX", &coord(me, |c| c.x_pos));
        self.set_text("sPosY", &coord(me, |c| c.y_pos));
    }

    // --- LISTS ---

    pub fn render_players(&self, session: &Session) -> Result<(), ClientError> {
        let Some(list) = self.document.get_element_by_id(PLAYERS_LIST) else { return Ok(()) };
        list.set_inner_html("");

        let players = session.visible_players();
        if players.is_empty() {
            let empty = self.div("players-empty")?;
            empty.set_text_content(Some("No players here"));
            list.append_child(&empty)?;
            return Ok(());
        }
        for p in players {
            let item = self.div("player-item")?;
            let name = self.span("pname", &p.character_name)?;
            let level = self.span("plvl", &format!("Lv.{}", p.level))?;
            item.append_child(&name)?;
            item.append_child(&self.document.create_text_node(" "))?;
            item.append_child(&level)?;
            list.append_child(&item)?;
        }
        Ok(())
    }

    /// One clickable row per location; clicking calls `on_pick` with its id.
    pub fn render_locations(
        &self,
        locations: &[Location],
        on_pick: Rc<dyn Fn(i64)>,
    ) -> Result<(), ClientError> {
        let Some(list) = self.document.get_element_by_id(LOCATIONS_LIST) else { return Ok(()) };
        list.set_inner_html("");

        for loc in locations {
            let row = self.div("location-item")?;
            row.set_text_content(Some(&format!("{} [Lv.{}]", loc.name, loc.min_level)));

            let on_pick = on_pick.clone();
            let id = loc.id;
            let closure = Closure::wrap(Box::new(move |_event: MouseEvent| {
                on_pick(id);
            }) as Box<dyn FnMut(_)>);
            row.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref())?;
            closure.forget();

            list.append_child(&row)?;
        }
        Ok(())
    }

    // --- CHAT ---

    pub fn append_chat(&self, line: &ChatLine) -> Result<(), ClientError> {
        let Some(pane) = self.document.get_element_by_id(CHAT_MESSAGES) else { return Ok(()) };
        let row = self.div("chat-msg")?;
        let (who, text) = match line {
            ChatLine::Player { name, text } => (self.span("cm-name", &format!("{name}:"))?, text),
            ChatLine::System(text) => (self.span("cm-sys", "[SYSTEM]")?, text),
        };
        let body = self.span("cm-text", text)?;
        row.append_child(&who)?;
        row.append_child(&self.document.create_text_node(" "))?;
        row.append_child(&body)?;
        pane.append_child(&row)?;
        pane.set_scroll_top(pane.scroll_height());
        Ok(())
    }

    fn div(&self, class: &str) -> Result<Element, ClientError> {
        let el = self.document.create_element("div")?;
        el.set_class_name(class);
        Ok(el)
    }

    // Text goes in as text content; names and messages are never parsed as HTML.
    fn span(&self, class: &str, text: &str) -> Result<Element, ClientError> {
        let el = self.document.create_element("span")?;
        el.set_class_name(class);
        el.set_text_content(Some(text));
        Ok(el)
    }
}

fn coord(me: &Character, pick: impl Fn(&Character) -> Option<i32>) -> String {
    pick(me).map_or_else(|| "-".to_string(), |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_coordinate_shows_dash() {
        let raw = r#"{"user_id":1,"character_name":"Ada","location_id":1,"x_pos":3}"#;
        let me: Character = serde_json::from_str(raw).unwrap();
        assert_eq!(coord(&me, |c| c.x_pos), "3");
        assert_eq!(coord(&me, |c| c.y_pos), "-");
    }
}
