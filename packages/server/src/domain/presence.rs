//! Presence / Typing Tracker
//!
//! Room ごとの一時的な状態（誰が入力中か、誰がビデオ通話の準備ができているか）。
//! 永続化しません。

use std::collections::{BTreeMap, HashMap};

use super::{ConnectionId, ParticipantRole, RoomId};

/// Room ごとの presence
///
/// 各フラグは、それを立てた接続を所有者として記録します。
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RoomPresence {
    typing: BTreeMap<ParticipantRole, ConnectionId>,
    ready: BTreeMap<ParticipantRole, ConnectionId>,
}

impl RoomPresence {
    pub fn typing_roles(&self) -> Vec<ParticipantRole> {
        self.typing.keys().copied().collect()
    }

    pub fn ready_roles(&self) -> Vec<ParticipantRole> {
        self.ready.keys().copied().collect()
    }

    fn is_empty(&self) -> bool {
        self.typing.is_empty() && self.ready.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct PresenceTracker {
    rooms: HashMap<RoomId, RoomPresence>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_typing(&mut self, room_id: RoomId, role: ParticipantRole, owner: ConnectionId) {
        self.rooms
            .entry(room_id)
            .or_default()
            .typing
            .insert(role, owner);
    }

    pub fn clear_typing(&mut self, room_id: &RoomId, role: ParticipantRole) {
        self.update(room_id, |presence| {
            presence.typing.remove(&role);
        });
    }

    pub fn set_ready(&mut self, room_id: RoomId, role: ParticipantRole, owner: ConnectionId) {
        self.rooms
            .entry(room_id)
            .or_default()
            .ready
            .insert(role, owner);
    }

    /// Room の全ての ready フラグを消す（通話終了時）
    pub fn clear_ready(&mut self, room_id: &RoomId) {
        self.update(room_id, |presence| presence.ready.clear());
    }

    /// 接続が所有する Room 内のフラグを全て消す（切断・退出時）
    pub fn clear(&mut self, room_id: &RoomId, connection_id: &ConnectionId) {
        self.update(room_id, |presence| {
            presence.typing.retain(|_, owner| owner != connection_id);
            presence.ready.retain(|_, owner| owner != connection_id);
        });
    }

    pub fn is_typing(&self, room_id: &RoomId, role: ParticipantRole) -> bool {
        self.rooms
            .get(room_id)
            .is_some_and(|presence| presence.typing.contains_key(&role))
    }

    pub fn is_ready(&self, room_id: &RoomId, role: ParticipantRole) -> bool {
        self.rooms
            .get(room_id)
            .is_some_and(|presence| presence.ready.contains_key(&role))
    }

    pub fn snapshot(&self, room_id: &RoomId) -> Option<&RoomPresence> {
        self.rooms.get(room_id)
    }

    fn update(&mut self, room_id: &RoomId, f: impl FnOnce(&mut RoomPresence)) {
        if let Some(presence) = self.rooms.get_mut(room_id) {
            f(presence);
            if presence.is_empty() {
                self.rooms.remove(room_id);
            }
        }
    }
}
