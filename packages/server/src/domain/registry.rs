//! Room Registry
//!
//! Room ID から接続中の Connection ID の集合へのマッピング。
//! 永続化せず、プロセス再起動時は空から再構築されます（接続も全て切れるため）。

use std::collections::{BTreeSet, HashMap};

use super::{ConnectionId, RoomId};

/// Room のメンバーシップ
///
/// Room は最初の `join` で作られ、最後のメンバーが抜けた時点で削除されます。
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomId, BTreeSet<ConnectionId>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 接続を Room に追加し、追加後のメンバー数を返す
    ///
    /// 既にメンバーの場合は何もしない（冪等）。
    pub fn join(&mut self, room_id: RoomId, connection_id: ConnectionId) -> usize {
        let members = self.rooms.entry(room_id).or_default();
        members.insert(connection_id);
        members.len()
    }

    /// 接続を Room から削除し、メンバーだったかどうかを返す
    ///
    /// 空になった Room はエントリごと削除します。
    pub fn leave(&mut self, room_id: &RoomId, connection_id: &ConnectionId) -> bool {
        let Some(members) = self.rooms.get_mut(room_id) else {
            return false;
        };
        let removed = members.remove(connection_id);
        if members.is_empty() {
            self.rooms.remove(room_id);
        }
        removed
    }

    /// Room の全メンバー（ID 順）
    pub fn members(&self, room_id: &RoomId) -> Vec<ConnectionId> {
        self.rooms
            .get(room_id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// 指定した接続以外の Room メンバー（ID 順）
    pub fn members_except(
        &self,
        room_id: &RoomId,
        exclude_connection_id: &ConnectionId,
    ) -> Vec<ConnectionId> {
        self.rooms
            .get(room_id)
            .map(|members| {
                members
                    .iter()
                    .filter(|id| *id != exclude_connection_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn size(&self, room_id: &RoomId) -> usize {
        self.rooms.get(room_id).map_or(0, BTreeSet::len)
    }

    pub fn is_member(&self, room_id: &RoomId, connection_id: &ConnectionId) -> bool {
        self.rooms
            .get(room_id)
            .is_some_and(|members| members.contains(connection_id))
    }

    pub fn contains_room(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// 全ての Room とメンバー数（Room ID 順）
    pub fn rooms(&self) -> Vec<(RoomId, usize)> {
        let mut rooms: Vec<(RoomId, usize)> = self
            .rooms
            .iter()
            .map(|(room_id, members)| (room_id.clone(), members.len()))
            .collect();
        rooms.sort_by(|a, b| a.0.cmp(&b.0));
        rooms
    }
}
