//! シグナリングイベント
//!
//! トランスポート（WebSocket の JSON フレーム）から独立した、Hub が扱うイベントの定義。
//! ワイヤ形式との変換は Infrastructure 層の DTO が担当します。

use super::{
    ChatMessage, ConnectionId, MessageContent, MessageKind, ParticipantRole, RoomId,
    SignalPayload, UserId,
};

/// WebRTC シグナリングの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

/// 中継先
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Room の送信者以外の全員
    ToRoom(RoomId),
    /// 特定の接続
    ToConnection(ConnectionId),
}

/// クライアントから Hub へのイベント
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    JoinRoom {
        room_id: RoomId,
    },
    SendMessage {
        room_id: RoomId,
        sender_id: UserId,
        sender_role: ParticipantRole,
        content: MessageContent,
        kind: MessageKind,
    },
    MarkRead {
        room_id: RoomId,
        reader_id: UserId,
    },
    Ready {
        room_id: RoomId,
        role: ParticipantRole,
    },
    CheckRoom {
        room_id: RoomId,
    },
    StartCall {
        room_id: RoomId,
    },
    AcceptCall {
        target: ConnectionId,
        room_id: RoomId,
    },
    Signal {
        kind: SignalKind,
        destination: Destination,
        payload: SignalPayload,
    },
    EndCall {
        room_id: RoomId,
    },
    Typing {
        room_id: RoomId,
        role: ParticipantRole,
        display_name: String,
        is_typing: bool,
    },
    LeaveRoom {
        room_id: RoomId,
    },
}

impl InboundEvent {
    /// ログ出力用のイベント名（ワイヤ上の名前）
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => "join-room",
            Self::SendMessage { .. } => "send-message",
            Self::MarkRead { .. } => "mark-messages-read",
            Self::Ready { .. } => "user-ready",
            Self::CheckRoom { .. } => "check-room",
            Self::StartCall { .. } => "start-video-call",
            Self::AcceptCall { .. } => "accept-call",
            Self::Signal {
                kind: SignalKind::Offer,
                ..
            } => "offer",
            Self::Signal {
                kind: SignalKind::Answer,
                ..
            } => "answer",
            Self::Signal {
                kind: SignalKind::IceCandidate,
                ..
            } => "ice-candidate",
            Self::EndCall { .. } => "end-call",
            Self::Typing {
                is_typing: true, ..
            } => "typing-start",
            Self::Typing {
                is_typing: false, ..
            } => "typing-stop",
            Self::LeaveRoom { .. } => "leave-appointment",
        }
    }
}

/// Hub からクライアントへのイベント
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    Connected {
        connection_id: ConnectionId,
    },
    ChatHistory(Vec<ChatMessage>),
    NewMessage(ChatMessage),
    MessagesRead {
        room_id: RoomId,
        reader_id: UserId,
    },
    PeerReady {
        room_id: RoomId,
        role: ParticipantRole,
        from: ConnectionId,
    },
    RoomHasPeers {
        room_id: RoomId,
        count: usize,
    },
    IncomingCall {
        room_id: RoomId,
        from: ConnectionId,
    },
    CallAccepted {
        room_id: RoomId,
        from: ConnectionId,
    },
    Signal {
        kind: SignalKind,
        from: ConnectionId,
        payload: SignalPayload,
    },
    CallEnded {
        room_id: RoomId,
        from: ConnectionId,
    },
    UserTyping {
        room_id: RoomId,
        role: ParticipantRole,
        display_name: String,
        is_typing: bool,
    },
    Error(String),
}
