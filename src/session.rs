use std::collections::{HashMap, VecDeque};

use crate::protocol::{
    Character, CharacterClass, ChatPayload, Location, PlayerMoved, PositionUpdate, RemotePlayer,
    ServerMessage, TravelResponse,
};

/// Oldest chat lines are dropped past this many.
pub const CHAT_HISTORY: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub enum ChatLine {
    Player { name: String, text: String },
    System(String),
}

/// Which page panels need repainting after a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    Nothing,
    /// Own stats/position changed; the players list depends on it too.
    Character,
    Players,
    Chat,
}

/// Everything the client knows about the running game. One per logged-in
/// page; dropped on logout.
#[derive(Debug, Default)]
pub struct Session {
    user_id: Option<i64>,
    username: Option<String>,
    character: Option<Character>,
    locations: Vec<Location>,
    players: HashMap<i64, RemotePlayer>,
    chat: VecDeque<ChatLine>,
    selected_class: CharacterClass,
}

impl Session {
    pub fn new(username: Option<String>) -> Session {
        Session { username, ..Session::default() }
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user_id
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn character(&self) -> Option<&Character> {
        self.character.as_ref()
    }

    pub fn set_character(&mut self, character: Character) {
        self.user_id = Some(character.user_id);
        self.character = Some(character);
    }

    pub fn set_locations(&mut self, locations: Vec<Location>) {
        self.locations = locations;
    }

    pub fn location_name(&self, id: i64) -> Option<&str> {
        self.locations.iter().find(|l| l.id == id).map(|l| l.name.as_str())
    }

    pub fn current_location(&self) -> Option<&Location> {
        let id = self.character.as_ref()?.location_id;
        self.locations.iter().find(|l| l.id == id)
    }

    pub fn selected_class(&self) -> CharacterClass {
        self.selected_class
    }

    pub fn select_class(&mut self, class: CharacterClass) {
        self.selected_class = class;
    }

    /// Applies one realtime message in arrival order.
    pub fn apply(&mut self, msg: ServerMessage) -> Refresh {
        match msg {
            ServerMessage::StateUpdate(update) => self.apply_state_update(update),
            ServerMessage::Players(list) => self.replace_players(list),
            ServerMessage::PlayerMoved(moved) => self.apply_player_moved(moved),
            ServerMessage::Chat(ChatPayload { user_name, message }) => {
                self.push_chat(ChatLine::Player { name: user_name, text: message });
                Refresh::Chat
            }
            ServerMessage::System(text) => self.push_system(text),
            ServerMessage::Error(text) => {
                log::warn!("server error: {text}");
                self.push_system(text)
            }
        }
    }

    fn apply_state_update(&mut self, update: PositionUpdate) -> Refresh {
        let Some(me) = self.character.as_mut() else {
            log::debug!("state_update before character load, ignored");
            return Refresh::Nothing;
        };
        me.x_pos = Some(update.x_pos);
        me.y_pos = Some(update.y_pos);
        me.location_id = update.location_id;
        Refresh::Character
    }

    fn replace_players(&mut self, list: Vec<RemotePlayer>) -> Refresh {
        let me = self.user_id;
        self.players = list
            .into_iter()
            .filter(|p| Some(p.user_id) != me)
            .map(|p| (p.user_id, p))
            .collect();
        Refresh::Players
    }

    fn apply_player_moved(&mut self, moved: PlayerMoved) -> Refresh {
        if Some(moved.user_id) == self.user_id {
            return Refresh::Nothing;
        }
        let here = match self.character.as_ref() {
            Some(me) => me.location_id,
            None => return Refresh::Nothing,
        };
        if moved.location_id != here {
            return Refresh::Nothing;
        }
        let entry = self
            .players
            .entry(moved.user_id)
            .or_insert_with(|| RemotePlayer::placeholder(moved.user_id));
        // The sender is in our location now, whatever the last `players` list said.
        entry.location_id = Some(moved.location_id);
        entry.x_pos = Some(moved.x_pos);
        entry.y_pos = Some(moved.y_pos);
        Refresh::Nothing
    }

    /// Overwrites own location/position from a successful travel call and
    /// returns the destination name, if known.
    pub fn apply_travel(&mut self, resp: TravelResponse) -> Option<String> {
        let me = self.character.as_mut()?;
        me.location_id = resp.location_id;
        me.x_pos = Some(resp.x_pos);
        me.y_pos = Some(resp.y_pos);
        self.location_name(resp.location_id).map(str::to_string)
    }

    /// Remote players sharing the viewer's current location. Entries are
    /// never removed; anyone elsewhere is simply filtered out here.
    pub fn visible_players(&self) -> Vec<&RemotePlayer> {
        let Some(here) = self.character.as_ref().map(|c| c.location_id) else {
            return Vec::new();
        };
        let mut list: Vec<&RemotePlayer> =
            self.players.values().filter(|p| p.location_id == Some(here)).collect();
        list.sort_by_key(|p| p.user_id);
        list
    }

    pub fn drawable_players(&self) -> Vec<(&RemotePlayer, (i32, i32))> {
        self.visible_players()
            .into_iter()
            .filter_map(|p| p.position().map(|pos| (p, pos)))
            .collect()
    }

    pub fn known_players(&self) -> usize {
        self.players.len()
    }

    pub fn chat_log(&self) -> impl Iterator<Item = &ChatLine> {
        self.chat.iter()
    }

    pub fn last_chat(&self) -> Option<&ChatLine> {
        self.chat.back()
    }

    pub fn push_system(&mut self, text: impl Into<String>) -> Refresh {
        self.push_chat(ChatLine::System(text.into()));
        Refresh::Chat
    }

    fn push_chat(&mut self, line: ChatLine) {
        if self.chat.len() == CHAT_HISTORY {
            self.chat.pop_front();
        }
        self.chat.push_back(line);
    }

    pub fn clear(&mut self) {
        *self = Session::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hero(location_id: i64) -> Character {
        Character {
            user_id: 1,
            character_name: "Hero".into(),
            character_class: "warrior".into(),
            level: 3,
            hp: 80,
            max_hp: 100,
            xp: 10,
            xp_to_next: 100,
            gold: 5,
            attack: 7,
            defense: 4,
            speed: 2,
            location_id,
            x_pos: Some(0),
            y_pos: Some(0),
        }
    }

    fn session_at(location_id: i64) -> Session {
        let mut s = Session::new(Some("hero".into()));
        s.set_character(hero(location_id));
        s
    }

    fn moved(user_id: i64, x_pos: i32, y_pos: i32, location_id: i64) -> ServerMessage {
        ServerMessage::PlayerMoved(PlayerMoved { user_id, x_pos, y_pos, location_id })
    }

    fn update(x_pos: i32, y_pos: i32, location_id: i64) -> ServerMessage {
        ServerMessage::StateUpdate(PositionUpdate { x_pos, y_pos, location_id })
    }

    fn remote(user_id: i64, location_id: i64, x: i32, y: i32) -> RemotePlayer {
        RemotePlayer {
            user_id,
            character_name: format!("P{user_id}"),
            level: 2,
            location_id: Some(location_id),
            x_pos: Some(x),
            y_pos: Some(y),
        }
    }

    #[test]
    fn state_update_is_last_write_wins() {
        let mut s = session_at(1);
        let updates = [(3, 4, 1), (9, 2, 6), (0, 0, 2)];
        for (x, y, loc) in updates {
            let refresh = s.apply(update(x, y, loc));
            assert_eq!(refresh, Refresh::Character);
            let me = s.character().unwrap();
            assert_eq!((me.x_pos, me.y_pos, me.location_id), (Some(x), Some(y), loc));
        }
    }

    #[test]
    fn state_update_without_character_is_ignored() {
        let mut s = Session::new(None);
        let refresh = s.apply(update(1, 1, 1));
        assert_eq!(refresh, Refresh::Nothing);
        assert!(s.character().is_none());
    }

    #[test]
    fn players_replaces_set_and_excludes_self() {
        let mut s = session_at(5);
        s.apply(ServerMessage::Players(vec![remote(2, 5, 1, 1), remote(3, 5, 2, 2)]));
        assert_eq!(s.known_players(), 2);

        s.apply(ServerMessage::Players(vec![remote(1, 5, 0, 0), remote(4, 5, 3, 3)]));
        assert_eq!(s.known_players(), 1);
        let ids: Vec<i64> = s.visible_players().iter().map(|p| p.user_id).collect();
        assert_eq!(ids, vec![4]);
    }

    #[test]
    fn player_moved_for_self_is_noop() {
        let mut s = session_at(5);
        s.apply(moved(1, 9, 9, 5));
        assert_eq!(s.known_players(), 0);
        assert_eq!(s.character().unwrap().position(), Some((0, 0)));
    }

    #[test]
    fn player_moved_elsewhere_is_not_listed() {
        let mut s = session_at(5);
        s.apply(moved(2, 1, 1, 6));
        assert!(s.visible_players().is_empty());
        assert!(s.drawable_players().is_empty());
    }

    #[test]
    fn player_moved_creates_placeholder_and_updates_position() {
        let mut s = session_at(5);
        s.apply(moved(8, 4, 6, 5));
        let visible = s.visible_players();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].character_name, "Player");
        assert_eq!(visible[0].level, 1);
        assert_eq!(visible[0].position(), Some((4, 6)));

        s.apply(moved(8, 5, 6, 5));
        assert_eq!(s.drawable_players()[0].1, (5, 6));
    }

    #[test]
    fn player_moved_keeps_known_name() {
        let mut s = session_at(5);
        s.apply(ServerMessage::Players(vec![remote(2, 5, 1, 1)]));
        s.apply(moved(2, 7, 3, 5));
        let p = s.visible_players()[0];
        assert_eq!(p.character_name, "P2");
        assert_eq!(p.position(), Some((7, 3)));
    }

    #[test]
    fn leaving_location_hides_players_without_new_list() {
        let mut s = session_at(5);
        s.apply(ServerMessage::Players(vec![remote(2, 5, 1, 1)]));
        assert_eq!(s.visible_players().len(), 1);

        s.apply(update(0, 0, 7));
        assert!(s.visible_players().is_empty());
        assert_eq!(s.known_players(), 1);
    }

    #[test]
    fn players_without_position_are_listed_but_not_drawn() {
        let mut s = session_at(5);
        let mut ghost = remote(2, 5, 0, 0);
        ghost.x_pos = None;
        s.apply(ServerMessage::Players(vec![ghost]));
        assert_eq!(s.visible_players().len(), 1);
        assert!(s.drawable_players().is_empty());
    }

    #[test]
    fn chat_and_notices_append_in_order() {
        let mut s = session_at(1);
        s.apply(ServerMessage::Chat(ChatPayload { user_name: "Ann".into(), message: "hi".into() }));
        s.apply(ServerMessage::System("Bob joined".into()));
        s.apply(ServerMessage::Error("bad token".into()));
        let lines: Vec<&ChatLine> = s.chat_log().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], &ChatLine::Player { name: "Ann".into(), text: "hi".into() });
        assert_eq!(lines[2], &ChatLine::System("bad token".into()));
    }

    #[test]
    fn chat_history_is_bounded() {
        let mut s = Session::default();
        for i in 0..CHAT_HISTORY + 5 {
            s.push_system(format!("line {i}"));
        }
        assert_eq!(s.chat_log().count(), CHAT_HISTORY);
        assert_eq!(s.chat_log().next(), Some(&ChatLine::System("line 5".into())));
    }

    #[test]
    fn travel_overwrites_location_and_names_destination() {
        let mut s = session_at(1);
        s.set_locations(vec![
            Location { id: 1, name: "Village".into(), min_level: 1 },
            Location { id: 2, name: "Dark Forest".into(), min_level: 5 },
        ]);
        let name = s.apply_travel(TravelResponse { location_id: 2, x_pos: 10, y_pos: 12 });
        assert_eq!(name.as_deref(), Some("Dark Forest"));
        let me = s.character().unwrap();
        assert_eq!((me.location_id, me.position()), (2, Some((10, 12))));
        assert_eq!(s.current_location().map(|l| l.min_level), Some(5));
    }

    #[test]
    fn clear_forgets_everything() {
        let mut s = session_at(5);
        s.apply(ServerMessage::Players(vec![remote(2, 5, 1, 1)]));
        s.clear();
        assert!(s.character().is_none());
        assert!(s.user_id().is_none());
        assert_eq!(s.known_players(), 0);
    }
}
