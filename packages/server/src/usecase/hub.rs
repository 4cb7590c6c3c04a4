//! UseCase: Signaling Hub
//!
//! ## 責務
//!
//! - 接続ごとの状態（所属 Room、参加待ちの Room、Identity、役割タグ）を保持
//! - 受信イベントをイベント種別でディスパッチ
//! - Room メンバーへの中継（broadcast-except-sender / 特定接続宛て）
//! - 永続化が必要なイベントを Room ごとの `RoomWorker` に渡し、その結果を配信
//!
//! ## 並行性
//!
//! Hub は 1 つのタスク（`SignalingHub::run`）で動き、Registry と Presence を所有します。
//! トランスポート層は `HubHandle` 経由のコマンドキューでのみ Hub と通信します。
//! メンバーシップの変更と中継は Hub タスク内で同期的に処理されるため、
//! 1 つの接続から来たシグナリングは順序どおりに届きます。
//! ストア I/O は `RoomWorker` が Room ごとに直列化して実行します。
//!
//! ## join の受理
//!
//! join した接続は RoomWorker が Consultation と参加者を確認するまで参加待ちで、
//! Registry には入りません。参加待ちの間はメンバーとして扱われず、
//! Room 宛ての配信も届きません。

use std::{collections::HashMap, sync::Arc};

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use crate::domain::{
    AppointmentDirectory, ChatMessage, ConnectionId, Destination, Identity, InboundEvent,
    MessagePusher, MessageStore, NewMessage, OutboundEvent, ParticipantRole, PresenceTracker,
    PusherChannel, RoomId, RoomRegistry, UserId,
};

use super::{
    error::HubError,
    room_worker::{RoomJob, RoomWorker},
};

/// トランスポート層と RoomWorker から Hub へのコマンド
#[derive(Debug)]
pub(crate) enum HubCommand {
    Connect {
        connection_id: ConnectionId,
        identity: Option<Identity>,
        channel: PusherChannel,
    },
    Inbound {
        connection_id: ConnectionId,
        event: InboundEvent,
    },
    /// 解釈できなかったフレーム
    Reject {
        connection_id: ConnectionId,
        reason: String,
    },
    Disconnect {
        connection_id: ConnectionId,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<RoomSnapshot>>,
    },
    /// RoomWorker が join を受理した
    JoinAccepted {
        connection_id: ConnectionId,
        room_id: RoomId,
        history: Vec<ChatMessage>,
    },
    /// RoomWorker が join を完了できなかった
    JoinRejected {
        connection_id: ConnectionId,
        room_id: RoomId,
        error: HubError,
    },
    /// RoomWorker がメッセージを永続化した
    MessagePersisted {
        room_id: RoomId,
        message: ChatMessage,
    },
    /// RoomWorker が既読を記録した
    MessagesRead {
        connection_id: ConnectionId,
        room_id: RoomId,
        reader_id: UserId,
    },
    /// RoomWorker のジョブが失敗した
    JobFailed {
        connection_id: ConnectionId,
        room_id: RoomId,
        error: HubError,
    },
}

/// Room メンバー 1 接続分の状態
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSnapshot {
    pub connection_id: ConnectionId,
    pub user_id: Option<UserId>,
    pub role: Option<ParticipantRole>,
}

/// Room の現在の状態（HTTP の確認用エンドポイント向け）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub members: Vec<MemberSnapshot>,
    pub typing: Vec<ParticipantRole>,
    pub ready: Vec<ParticipantRole>,
}

/// Hub への送信口
///
/// クローンして各接続のタスクに渡します。全ての `HubHandle` が drop されると Hub は停止します。
#[derive(Debug, Clone)]
pub struct HubHandle {
    commands: mpsc::UnboundedSender<HubCommand>,
}

impl HubHandle {
    fn send(&self, command: HubCommand) -> Result<(), HubError> {
        self.commands.send(command).map_err(|_| HubError::HubClosed)
    }

    /// 新しい接続を登録（`connected` イベントが送られる）
    pub fn connect(
        &self,
        connection_id: ConnectionId,
        identity: Option<Identity>,
        channel: PusherChannel,
    ) -> Result<(), HubError> {
        self.send(HubCommand::Connect {
            connection_id,
            identity,
            channel,
        })
    }

    /// 受信イベントを Hub に渡す
    pub fn dispatch(&self, connection_id: ConnectionId, event: InboundEvent) -> Result<(), HubError> {
        self.send(HubCommand::Inbound {
            connection_id,
            event,
        })
    }

    /// 解釈できなかったフレームを報告（送信者に `error` が返る）
    pub fn reject(
        &self,
        connection_id: ConnectionId,
        reason: impl Into<String>,
    ) -> Result<(), HubError> {
        self.send(HubCommand::Reject {
            connection_id,
            reason: reason.into(),
        })
    }

    /// 接続の切断を通知
    pub fn disconnect(&self, connection_id: ConnectionId) -> Result<(), HubError> {
        self.send(HubCommand::Disconnect { connection_id })
    }

    /// 全 Room の状態を取得
    pub async fn snapshot(&self) -> Result<Vec<RoomSnapshot>, HubError> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Snapshot { reply })?;
        rx.await.map_err(|_| HubError::HubClosed)
    }
}

/// 接続ごとの状態
#[derive(Debug, Default)]
struct ConnectionState {
    identity: Option<Identity>,
    /// 受理済みの Room
    room: Option<RoomId>,
    /// RoomWorker の確認待ちの Room
    pending: Option<RoomId>,
    /// `user-ready` で宣言された役割
    role: Option<ParticipantRole>,
}

/// Room の worker と、結果がまだ返ってきていないジョブ数
#[derive(Debug)]
struct WorkerSlot {
    jobs: mpsc::UnboundedSender<RoomJob>,
    in_flight: usize,
}

/// Signaling Hub
pub struct SignalingHub {
    registry: RoomRegistry,
    presence: PresenceTracker,
    connections: HashMap<ConnectionId, ConnectionState>,
    workers: HashMap<RoomId, WorkerSlot>,
    store: Arc<dyn MessageStore>,
    appointments: Arc<dyn AppointmentDirectory>,
    pusher: Arc<dyn MessagePusher>,
    /// RoomWorker に渡す折り返し用の送信口（Hub 自身の停止を妨げないよう weak）
    commands: mpsc::WeakUnboundedSender<HubCommand>,
}

impl SignalingHub {
    /// Hub タスクを起動
    pub fn spawn(
        store: Arc<dyn MessageStore>,
        appointments: Arc<dyn AppointmentDirectory>,
        pusher: Arc<dyn MessagePusher>,
    ) -> (HubHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let hub = Self {
            registry: RoomRegistry::new(),
            presence: PresenceTracker::new(),
            connections: HashMap::new(),
            workers: HashMap::new(),
            store,
            appointments,
            pusher,
            commands: tx.downgrade(),
        };
        let task = tokio::spawn(hub.run(rx));
        (HubHandle { commands: tx }, task)
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<HubCommand>) {
        tracing::info!("Signaling hub started");
        while let Some(command) = commands.recv().await {
            self.handle(command).await;
        }
        tracing::info!("Signaling hub stopped");
    }

    async fn handle(&mut self, command: HubCommand) {
        match command {
            HubCommand::Connect {
                connection_id,
                identity,
                channel,
            } => self.connect(connection_id, identity, channel).await,
            HubCommand::Inbound {
                connection_id,
                event,
            } => self.dispatch(connection_id, event).await,
            HubCommand::Reject {
                connection_id,
                reason,
            } => {
                tracing::warn!(connection = %connection_id, "Rejected frame: {}", reason);
                self.reply_error(&connection_id, HubError::MalformedPayload(reason))
                    .await;
            }
            HubCommand::Disconnect { connection_id } => self.disconnect(&connection_id).await,
            HubCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            HubCommand::JoinAccepted {
                connection_id,
                room_id,
                history,
            } => {
                self.admit(&connection_id, &room_id, history).await;
                self.job_finished(&room_id);
            }
            HubCommand::JoinRejected {
                connection_id,
                room_id,
                error,
            } => {
                self.rollback_join(&connection_id, &room_id, error).await;
                self.job_finished(&room_id);
            }
            HubCommand::MessagePersisted { room_id, message } => {
                // チャットは送信者を含む全メンバーに届ける
                let recipients = self.registry.members(&room_id);
                tracing::debug!(
                    appointment = %room_id,
                    message = %message.id,
                    recipients = recipients.len(),
                    "Broadcasting new message"
                );
                if let Err(e) = self
                    .pusher
                    .broadcast(recipients, &OutboundEvent::NewMessage(message))
                    .await
                {
                    tracing::warn!("Failed to broadcast message in '{}': {}", room_id, e);
                }
                self.job_finished(&room_id);
            }
            HubCommand::MessagesRead {
                connection_id,
                room_id,
                reader_id,
            } => {
                let recipients = self.registry.members_except(&room_id, &connection_id);
                let event = OutboundEvent::MessagesRead {
                    room_id: room_id.clone(),
                    reader_id,
                };
                if let Err(e) = self.pusher.broadcast(recipients, &event).await {
                    tracing::warn!("Failed to broadcast read receipt in '{}': {}", room_id, e);
                }
                self.job_finished(&room_id);
            }
            HubCommand::JobFailed {
                connection_id,
                room_id,
                error,
            } => {
                self.reply_error(&connection_id, error).await;
                self.job_finished(&room_id);
            }
        }
    }

    // ========================================
    // 接続のライフサイクル
    // ========================================

    async fn connect(
        &mut self,
        connection_id: ConnectionId,
        identity: Option<Identity>,
        channel: PusherChannel,
    ) {
        self.pusher
            .register_client(connection_id.clone(), channel)
            .await;
        tracing::info!(
            connection = %connection_id,
            user = identity.as_ref().map(|i| i.user_id.as_str()).unwrap_or("anonymous"),
            "Connection opened"
        );
        self.connections.insert(
            connection_id.clone(),
            ConnectionState {
                identity,
                ..Default::default()
            },
        );
        self.push(
            &connection_id,
            &OutboundEvent::Connected {
                connection_id: connection_id.clone(),
            },
        )
        .await;
    }

    async fn disconnect(&mut self, connection_id: &ConnectionId) {
        self.leave_current_room(connection_id);
        if self.connections.remove(connection_id).is_some() {
            self.pusher.unregister_client(connection_id).await;
            tracing::info!(connection = %connection_id, "Connection closed");
        }
    }

    /// 現在の Room から抜ける（presence も消え、参加待ちも取り消される）
    fn leave_current_room(&mut self, connection_id: &ConnectionId) -> Option<RoomId> {
        let state = self.connections.get_mut(connection_id)?;
        state.pending = None;
        let room_id = state.room.take()?;
        state.role = None;

        self.registry.leave(&room_id, connection_id);
        self.presence.clear(&room_id, connection_id);
        tracing::info!(
            connection = %connection_id,
            appointment = %room_id,
            members = self.registry.size(&room_id),
            "Left room"
        );
        self.release_idle_worker(&room_id);
        Some(room_id)
    }

    /// RoomWorker が確認した join を受理する
    async fn admit(
        &mut self,
        connection_id: &ConnectionId,
        room_id: &RoomId,
        history: Vec<ChatMessage>,
    ) {
        let newly_admitted = match self.connections.get_mut(connection_id) {
            Some(state) if state.pending.as_ref() == Some(room_id) => {
                state.pending = None;
                state.room = Some(room_id.clone());
                true
            }
            // 受理済みの Room への再 join は履歴だけ送り直す
            Some(state) if state.room.as_ref() == Some(room_id) => false,
            _ => {
                tracing::debug!(
                    connection = %connection_id,
                    appointment = %room_id,
                    "Ignoring stale join result"
                );
                return;
            }
        };

        if newly_admitted {
            let size = self.registry.join(room_id.clone(), connection_id.clone());
            tracing::info!(
                connection = %connection_id,
                appointment = %room_id,
                members = size,
                "Joined room"
            );

            let others = size.saturating_sub(1);
            if others > 0 {
                self.push(
                    connection_id,
                    &OutboundEvent::RoomHasPeers {
                        room_id: room_id.clone(),
                        count: others,
                    },
                )
                .await;
            }
        }

        self.push(connection_id, &OutboundEvent::ChatHistory(history))
            .await;
    }

    async fn rollback_join(
        &mut self,
        connection_id: &ConnectionId,
        room_id: &RoomId,
        error: HubError,
    ) {
        let Some(state) = self.connections.get_mut(connection_id) else {
            return;
        };
        if state.pending.as_ref() == Some(room_id) {
            state.pending = None;
        } else if state.room.as_ref() == Some(room_id) {
            self.leave_current_room(connection_id);
        }
        tracing::info!(
            connection = %connection_id,
            appointment = %room_id,
            "Join rolled back"
        );
        self.reply_error(connection_id, error).await;
    }

    // ========================================
    // イベントのディスパッチ
    // ========================================

    async fn dispatch(&mut self, connection_id: ConnectionId, event: InboundEvent) {
        if !self.connections.contains_key(&connection_id) {
            tracing::warn!(
                connection = %connection_id,
                "Dropping '{}' from unknown connection",
                event.name()
            );
            return;
        }
        tracing::debug!(connection = %connection_id, event = event.name(), "Dispatching event");

        let from = connection_id.clone();
        let result = match event {
            InboundEvent::JoinRoom { room_id } => {
                self.join_room(&connection_id, room_id);
                Ok(())
            }
            InboundEvent::SendMessage {
                room_id,
                sender_id,
                sender_role,
                content,
                kind,
            } => self.send_message(
                &connection_id,
                NewMessage {
                    room_id,
                    sender_id,
                    sender_role,
                    content,
                    kind,
                },
            ),
            InboundEvent::MarkRead { room_id, reader_id } => {
                self.mark_read(&connection_id, room_id, reader_id)
            }
            InboundEvent::Ready { room_id, role } => {
                self.ready(&connection_id, room_id, role).await
            }
            InboundEvent::CheckRoom { room_id } => {
                let count = self.registry.members_except(&room_id, &connection_id).len();
                self.push(&connection_id, &OutboundEvent::RoomHasPeers { room_id, count })
                    .await;
                Ok(())
            }
            InboundEvent::StartCall { room_id } => {
                self.start_call(&connection_id, room_id).await
            }
            InboundEvent::AcceptCall { target, room_id } => {
                let event = OutboundEvent::CallAccepted {
                    room_id,
                    from: from.clone(),
                };
                self.relay(&from, Destination::ToConnection(target), event)
                    .await
            }
            InboundEvent::Signal {
                kind,
                destination,
                payload,
            } => {
                let event = OutboundEvent::Signal {
                    kind,
                    from: from.clone(),
                    payload,
                };
                self.relay(&from, destination, event).await
            }
            InboundEvent::EndCall { room_id } => self.end_call(&connection_id, room_id).await,
            InboundEvent::Typing {
                room_id,
                role,
                display_name,
                is_typing,
            } => {
                self.typing(&connection_id, room_id, role, display_name, is_typing)
                    .await
            }
            InboundEvent::LeaveRoom { room_id } => self.leave_room(&connection_id, &room_id),
        };

        if let Err(error) = result {
            tracing::warn!(connection = %connection_id, "Event rejected: {}", error);
            self.reply_error(&connection_id, error).await;
        }
    }

    fn join_room(&mut self, connection_id: &ConnectionId, room_id: RoomId) {
        let Some(state) = self.connections.get(connection_id) else {
            return;
        };
        let identity = state.identity.clone();

        if state.room.as_ref() != Some(&room_id) {
            self.leave_current_room(connection_id);
            if let Some(state) = self.connections.get_mut(connection_id) {
                state.pending = Some(room_id.clone());
            }
            tracing::info!(
                connection = %connection_id,
                appointment = %room_id,
                "Join requested"
            );
        }

        self.submit(
            room_id,
            RoomJob::Join {
                connection_id: connection_id.clone(),
                identity,
            },
        );
    }

    fn leave_room(
        &mut self,
        connection_id: &ConnectionId,
        room_id: &RoomId,
    ) -> Result<(), HubError> {
        let pending = self
            .connections
            .get(connection_id)
            .is_some_and(|state| state.pending.as_ref() == Some(room_id));
        if !pending {
            self.ensure_member(room_id, connection_id)?;
        }
        self.leave_current_room(connection_id);
        Ok(())
    }

    fn send_message(
        &mut self,
        connection_id: &ConnectionId,
        message: NewMessage,
    ) -> Result<(), HubError> {
        self.ensure_member(&message.room_id, connection_id)?;
        let identified = match self.identity(connection_id) {
            Some(identity) if identity.user_id != message.sender_id => {
                return Err(HubError::NotAParticipant(message.sender_id));
            }
            Some(_) => true,
            None => false,
        };

        let room_id = message.room_id.clone();
        self.submit(
            room_id,
            RoomJob::Send {
                connection_id: connection_id.clone(),
                message,
                identified,
            },
        );
        Ok(())
    }

    fn mark_read(
        &mut self,
        connection_id: &ConnectionId,
        room_id: RoomId,
        reader_id: UserId,
    ) -> Result<(), HubError> {
        self.ensure_member(&room_id, connection_id)?;
        self.submit(
            room_id,
            RoomJob::MarkRead {
                connection_id: connection_id.clone(),
                reader_id,
            },
        );
        Ok(())
    }

    async fn ready(
        &mut self,
        connection_id: &ConnectionId,
        room_id: RoomId,
        role: ParticipantRole,
    ) -> Result<(), HubError> {
        self.ensure_member(&room_id, connection_id)?;
        self.presence
            .set_ready(room_id.clone(), role, connection_id.clone());
        if let Some(state) = self.connections.get_mut(connection_id) {
            state.role = Some(role);
        }

        let event = OutboundEvent::PeerReady {
            room_id: room_id.clone(),
            role,
            from: connection_id.clone(),
        };
        self.relay(connection_id, Destination::ToRoom(room_id), event)
            .await
    }

    async fn start_call(
        &self,
        connection_id: &ConnectionId,
        room_id: RoomId,
    ) -> Result<(), HubError> {
        self.ensure_member(&room_id, connection_id)?;
        let event = OutboundEvent::IncomingCall {
            room_id: room_id.clone(),
            from: connection_id.clone(),
        };
        self.relay(connection_id, Destination::ToRoom(room_id), event)
            .await
    }

    async fn end_call(
        &mut self,
        connection_id: &ConnectionId,
        room_id: RoomId,
    ) -> Result<(), HubError> {
        self.ensure_member(&room_id, connection_id)?;
        self.presence.clear_ready(&room_id);

        let event = OutboundEvent::CallEnded {
            room_id: room_id.clone(),
            from: connection_id.clone(),
        };
        self.relay(connection_id, Destination::ToRoom(room_id), event)
            .await
    }

    async fn typing(
        &mut self,
        connection_id: &ConnectionId,
        room_id: RoomId,
        role: ParticipantRole,
        display_name: String,
        is_typing: bool,
    ) -> Result<(), HubError> {
        self.ensure_member(&room_id, connection_id)?;
        if is_typing {
            self.presence
                .set_typing(room_id.clone(), role, connection_id.clone());
        } else {
            self.presence.clear_typing(&room_id, role);
        }

        let event = OutboundEvent::UserTyping {
            room_id: room_id.clone(),
            role,
            display_name,
            is_typing,
        };
        self.relay(connection_id, Destination::ToRoom(room_id), event)
            .await
    }

    /// シグナリングの中継
    ///
    /// Room 宛ては送信者以外の全メンバーへ、接続宛てはその接続だけへ送る。
    async fn relay(
        &self,
        from: &ConnectionId,
        destination: Destination,
        event: OutboundEvent,
    ) -> Result<(), HubError> {
        match destination {
            Destination::ToRoom(room_id) => {
                let targets = self.registry.members_except(&room_id, from);
                tracing::debug!(
                    connection = %from,
                    appointment = %room_id,
                    targets = targets.len(),
                    "Relaying to room"
                );
                if let Err(e) = self.pusher.broadcast(targets, &event).await {
                    tracing::warn!("Failed to relay to room '{}': {}", room_id, e);
                }
                Ok(())
            }
            Destination::ToConnection(target) => {
                if !self.connections.contains_key(&target) {
                    return Err(HubError::TargetNotFound(target.into_string()));
                }
                tracing::debug!(connection = %from, target = %target, "Relaying to connection");
                self.push(&target, &event).await;
                Ok(())
            }
        }
    }

    // ========================================
    // 補助
    // ========================================

    /// 受理済みのメンバーか（参加待ちの接続はメンバーではない）
    fn ensure_member(&self, room_id: &RoomId, connection_id: &ConnectionId) -> Result<(), HubError> {
        if self.registry.is_member(room_id, connection_id) {
            Ok(())
        } else {
            Err(HubError::NotAMember(room_id.clone()))
        }
    }

    fn identity(&self, connection_id: &ConnectionId) -> Option<&Identity> {
        self.connections
            .get(connection_id)
            .and_then(|state| state.identity.as_ref())
    }

    /// Room の worker にジョブを渡す（なければ起動する）
    fn submit(&mut self, room_id: RoomId, job: RoomJob) {
        let slot = match self.workers.remove(&room_id) {
            Some(slot) => slot,
            None => WorkerSlot {
                jobs: self.spawn_worker(room_id.clone()),
                in_flight: 0,
            },
        };

        let slot = match slot.jobs.send(job) {
            Ok(()) => WorkerSlot {
                in_flight: slot.in_flight + 1,
                ..slot
            },
            Err(mpsc::error::SendError(job)) => {
                // 結果が返らないジョブは数えない
                tracing::warn!("Room worker for '{}' has stopped, restarting", room_id);
                let jobs = self.spawn_worker(room_id.clone());
                let in_flight = match jobs.send(job) {
                    Ok(()) => 1,
                    Err(_) => {
                        tracing::error!("Failed to submit job to room worker for '{}'", room_id);
                        0
                    }
                };
                WorkerSlot { jobs, in_flight }
            }
        };
        self.workers.insert(room_id, slot);
    }

    /// RoomWorker から結果が 1 つ返ってきた
    fn job_finished(&mut self, room_id: &RoomId) {
        if let Some(slot) = self.workers.get_mut(room_id) {
            slot.in_flight = slot.in_flight.saturating_sub(1);
        }
        self.release_idle_worker(room_id);
    }

    /// メンバーも処理中のジョブもない Room の worker を止める
    ///
    /// 処理中のジョブがある間は同じ worker を使い続けるので、
    /// 1 つの Room のジョブが 2 つの worker で同時に実行されることはない。
    fn release_idle_worker(&mut self, room_id: &RoomId) {
        let idle = self
            .workers
            .get(room_id)
            .is_some_and(|slot| slot.in_flight == 0);
        if idle && !self.registry.contains_room(room_id) {
            self.workers.remove(room_id);
            tracing::debug!(appointment = %room_id, "Room worker released");
        }
    }

    fn spawn_worker(&self, room_id: RoomId) -> mpsc::UnboundedSender<RoomJob> {
        RoomWorker::new(
            room_id,
            Arc::clone(&self.store),
            Arc::clone(&self.appointments),
            self.commands.clone(),
        )
        .spawn()
    }

    async fn push(&self, connection_id: &ConnectionId, event: &OutboundEvent) {
        if let Err(e) = self.pusher.push_to(connection_id, event).await {
            tracing::debug!("Failed to push to '{}': {}", connection_id, e);
        }
    }

    async fn reply_error(&self, connection_id: &ConnectionId, error: HubError) {
        self.push(connection_id, &OutboundEvent::Error(error.to_string()))
            .await;
    }

    fn snapshot(&self) -> Vec<RoomSnapshot> {
        self.registry
            .rooms()
            .into_iter()
            .map(|(room_id, _)| {
                let members = self
                    .registry
                    .members(&room_id)
                    .into_iter()
                    .map(|connection_id| {
                        let state = self.connections.get(&connection_id);
                        let identity = state.and_then(|s| s.identity.as_ref());
                        MemberSnapshot {
                            user_id: identity.map(|i| i.user_id.clone()),
                            role: state
                                .and_then(|s| s.role)
                                .or_else(|| identity.map(|i| i.role)),
                            connection_id,
                        }
                    })
                    .collect();
                let presence = self.presence.snapshot(&room_id);
                RoomSnapshot {
                    typing: presence.map(|p| p.typing_roles()).unwrap_or_default(),
                    ready: presence.map(|p| p.ready_roles()).unwrap_or_default(),
                    members,
                    room_id,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use async_trait::async_trait;
    use serde_json::{Value, json};
    use tokio::time::timeout;

    use super::*;
    use crate::{
        domain::{
            Appointment, ChatMessage, Consultation, MessageContent, MessageKind, MockMessageStore,
            SignalKind, SignalPayload, StoreError, Timestamp,
        },
        infrastructure::{
            message_pusher::WebSocketMessagePusher,
            repository::{InMemoryAppointmentDirectory, InMemoryMessageStore},
        },
    };

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - Hub のイベントディスパッチ（join / chat / シグナリング / presence / 切断）
    // - チャットは永続化に成功したものだけが全メンバーに届くこと
    // - シグナリングは永続化されず、送信者以外に中継されること
    //
    // 【どのようなシナリオをテストするか】
    // 1. 2 人の参加者による診察の一連の流れ（チャット、既読、通話開始、切断）
    // 2. Room に参加していない接続からの send-message は拒否される
    // 3. 後から join した接続が永続化順の履歴を受け取る
    // 4. ストア障害時に new-message が配信されない
    // 5. 新しい Room への同時 join で Consultation が 1 つだけ作られる
    // 6. 未知の予約・参加者でないユーザーの join はロールバックされる
    // 7. 参加待ちの間に送られたイベントは効果を持たない
    // 8. 空になった Room の worker は処理中のジョブを終えるまで使い続けられる
    // ========================================

    const WAIT: Duration = Duration::from_secs(2);
    const QUIET: Duration = Duration::from_millis(100);

    struct TestClient {
        id: ConnectionId,
        rx: mpsc::UnboundedReceiver<String>,
    }

    impl TestClient {
        async fn next(&mut self) -> Value {
            let frame = timeout(WAIT, self.rx.recv())
                .await
                .expect("timed out waiting for an event")
                .expect("connection channel closed");
            serde_json::from_str(&frame).unwrap()
        }

        /// 次のイベントが `name` であることを確認し、`data` を返す
        async fn expect(&mut self, name: &str) -> Value {
            let frame = self.next().await;
            assert_eq!(frame["event"], name, "unexpected frame: {frame}");
            frame["data"].clone()
        }

        async fn assert_silent(&mut self) {
            if let Ok(Some(frame)) = timeout(QUIET, self.rx.recv()).await {
                panic!("unexpected frame: {frame}");
            }
        }
    }

    fn room(id: &str) -> RoomId {
        RoomId::new(id.to_string()).unwrap()
    }

    fn user(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    fn directory() -> Arc<InMemoryAppointmentDirectory> {
        Arc::new(InMemoryAppointmentDirectory::new([
            Appointment::new(room("apt-1"), user("patient-1"), user("doctor-1")),
            Appointment::new(room("apt-2"), user("patient-2"), user("doctor-2")),
        ]))
    }

    fn spawn_hub(store: Arc<dyn MessageStore>) -> HubHandle {
        let (hub, _task) = SignalingHub::spawn(
            store,
            directory(),
            Arc::new(WebSocketMessagePusher::default()),
        );
        hub
    }

    async fn connect(hub: &HubHandle, id: &str, identity: Option<Identity>) -> TestClient {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = ConnectionId::new(id.to_string()).unwrap();
        hub.connect(id.clone(), identity, tx).unwrap();
        let mut client = TestClient { id, rx };
        let data = client.expect("connected").await;
        assert_eq!(data["connectionId"], client.id.as_str());
        client
    }

    fn join(hub: &HubHandle, client: &TestClient, room_id: &str) {
        hub.dispatch(
            client.id.clone(),
            InboundEvent::JoinRoom {
                room_id: room(room_id),
            },
        )
        .unwrap();
    }

    fn chat(hub: &HubHandle, client: &TestClient, room_id: &str, sender: &str, text: &str) {
        let sender_role = if sender.starts_with("doctor") {
            ParticipantRole::Doctor
        } else {
            ParticipantRole::Patient
        };
        hub.dispatch(
            client.id.clone(),
            InboundEvent::SendMessage {
                room_id: room(room_id),
                sender_id: user(sender),
                sender_role,
                content: MessageContent::new(text.to_string()).unwrap(),
                kind: MessageKind::Text,
            },
        )
        .unwrap();
    }

    fn check_room(hub: &HubHandle, client: &TestClient, room_id: &str) {
        hub.dispatch(
            client.id.clone(),
            InboundEvent::CheckRoom {
                room_id: room(room_id),
            },
        )
        .unwrap();
    }

    /// create_consultation の呼び出し回数を数え、append_message を遅らせる Message Store
    struct InstrumentedStore {
        inner: InMemoryMessageStore,
        creates: AtomicUsize,
        append_delay: Duration,
    }

    impl InstrumentedStore {
        fn new(append_delay: Duration) -> Self {
            Self {
                inner: InMemoryMessageStore::default(),
                creates: AtomicUsize::new(0),
                append_delay,
            }
        }
    }

    #[async_trait]
    impl MessageStore for InstrumentedStore {
        async fn find_consultation(
            &self,
            room_id: &RoomId,
        ) -> Result<Option<Consultation>, StoreError> {
            self.inner.find_consultation(room_id).await
        }

        async fn create_consultation(
            &self,
            room_id: &RoomId,
            patient_id: &UserId,
            doctor_id: &UserId,
        ) -> Result<Consultation, StoreError> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            self.inner
                .create_consultation(room_id, patient_id, doctor_id)
                .await
        }

        async fn append_message(&self, message: NewMessage) -> Result<ChatMessage, StoreError> {
            tokio::time::sleep(self.append_delay).await;
            self.inner.append_message(message).await
        }

        async fn list_messages(&self, room_id: &RoomId) -> Result<Vec<ChatMessage>, StoreError> {
            self.inner.list_messages(room_id).await
        }

        async fn mark_read(&self, room_id: &RoomId, reader_id: &UserId) -> Result<u64, StoreError> {
            self.inner.mark_read(room_id, reader_id).await
        }
    }

    #[tokio::test]
    async fn test_consultation_between_two_participants() {
        // テスト項目: join → チャット → 既読 → 通話開始 → 切断 の一連の流れ
        // given (前提条件):
        let store = Arc::new(InMemoryMessageStore::default());
        let hub = spawn_hub(store.clone());
        let mut a = connect(&hub, "conn-a", None).await;
        let mut b = connect(&hub, "conn-b", None).await;

        // when (操作): A が空の Room に join
        join(&hub, &a, "apt-1");

        // then (期待する結果): 履歴は空、Consultation が作成される
        assert_eq!(a.expect("chat-history").await, json!([]));
        assert!(store.find_consultation(&room("apt-1")).await.unwrap().is_some());

        // when (操作): B が join
        join(&hub, &b, "apt-1");

        // then (期待する結果): B に他 1 人が通知され、履歴は空
        assert_eq!(
            b.expect("room-has-peers").await,
            json!({"appointmentId": "apt-1", "count": 1})
        );
        assert_eq!(b.expect("chat-history").await, json!([]));

        // when (操作): A が Room を確認
        check_room(&hub, &a, "apt-1");

        // then (期待する結果):
        assert_eq!(a.expect("room-has-peers").await["count"], 1);

        // when (操作): A がメッセージを送信
        chat(&hub, &a, "apt-1", "doctor-1", "hello");

        // then (期待する結果): 送信者を含む全員に永続化済みのメッセージが届く
        let received = b.expect("new-message").await;
        assert_eq!(received["message"], "hello");
        assert_eq!(received["senderRole"], "DOCTOR");
        assert_eq!(received["senderId"], "doctor-1");
        assert!(!received["createdAt"].as_str().unwrap().is_empty());
        assert_eq!(a.expect("new-message").await, received);

        // when (操作): B が既読にする
        hub.dispatch(
            b.id.clone(),
            InboundEvent::MarkRead {
                room_id: room("apt-1"),
                reader_id: user("patient-1"),
            },
        )
        .unwrap();

        // then (期待する結果): A に既読通知が届き、B には届かない
        assert_eq!(
            a.expect("messages-read").await,
            json!({"appointmentId": "apt-1", "readerId": "patient-1"})
        );

        // when (操作): A がビデオ通話を開始
        hub.dispatch(
            a.id.clone(),
            InboundEvent::StartCall {
                room_id: room("apt-1"),
            },
        )
        .unwrap();

        // then (期待する結果):
        assert_eq!(
            b.expect("incoming-call").await,
            json!({"appointmentId": "apt-1", "from": "conn-a"})
        );

        // when (操作): B が切断し、A が Room を確認
        hub.disconnect(b.id.clone()).unwrap();
        check_room(&hub, &a, "apt-1");

        // then (期待する結果): 他のメンバーは 0 人
        assert_eq!(a.expect("room-has-peers").await["count"], 0);
        a.assert_silent().await;
        b.assert_silent().await;
    }

    #[tokio::test]
    async fn test_send_message_from_non_member_is_rejected() {
        // テスト項目: Room に参加していない接続からの send-message は拒否される
        // given (前提条件):
        let store = Arc::new(InMemoryMessageStore::default());
        let hub = spawn_hub(store.clone());
        let mut member = connect(&hub, "conn-member", None).await;
        let mut outsider = connect(&hub, "conn-outsider", None).await;
        join(&hub, &member, "apt-2");
        member.expect("chat-history").await;

        // when (操作):
        chat(&hub, &outsider, "apt-2", "patient-2", "let me in");

        // then (期待する結果):
        let error = outsider.expect("error").await;
        assert_eq!(error, "not a member of appointment 'apt-2'");
        member.assert_silent().await;
        assert!(store.list_messages(&room("apt-2")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_late_joiner_receives_history_in_order() {
        // テスト項目: 後から join した接続は送信された N 件を永続化順で受け取る
        // given (前提条件):
        let hub = spawn_hub(Arc::new(InMemoryMessageStore::default()));
        let mut a = connect(&hub, "conn-a", None).await;
        join(&hub, &a, "apt-1");
        a.expect("chat-history").await;
        for text in ["one", "two", "three"] {
            chat(&hub, &a, "apt-1", "patient-1", text);
        }
        for _ in 0..3 {
            a.expect("new-message").await;
        }

        // when (操作):
        let mut late = connect(&hub, "conn-late", None).await;
        join(&hub, &late, "apt-1");

        // then (期待する結果):
        late.expect("room-has-peers").await;
        let history = late.expect("chat-history").await;
        let contents: Vec<&str> = history
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["message"].as_str().unwrap())
            .collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_store_failure_does_not_broadcast() {
        // テスト項目: 永続化に失敗したメッセージは誰にも配信されず、送信者に error が返る
        // given (前提条件):
        let consultation = Consultation::new(
            room("apt-1"),
            user("patient-1"),
            user("doctor-1"),
            Timestamp::new(1_000),
        );
        let mut store = MockMessageStore::new();
        store
            .expect_find_consultation()
            .returning(move |_| Ok(Some(consultation.clone())));
        store.expect_list_messages().returning(|_| Ok(vec![]));
        store
            .expect_append_message()
            .returning(|_| Err(StoreError::Unavailable("disk full".to_string())));
        let hub = spawn_hub(Arc::new(store));
        let mut a = connect(&hub, "conn-a", None).await;
        let mut b = connect(&hub, "conn-b", None).await;
        join(&hub, &a, "apt-1");
        a.expect("chat-history").await;
        join(&hub, &b, "apt-1");
        b.expect("room-has-peers").await;
        b.expect("chat-history").await;

        // when (操作):
        chat(&hub, &a, "apt-1", "doctor-1", "hello");

        // then (期待する結果):
        let error = a.expect("error").await;
        assert!(error.as_str().unwrap().contains("disk full"));
        b.assert_silent().await;

        // when (操作): ストア障害中もシグナリングは中継される
        hub.dispatch(
            a.id.clone(),
            InboundEvent::Signal {
                kind: SignalKind::Offer,
                destination: Destination::ToRoom(room("apt-1")),
                payload: SignalPayload::new(json!({"type": "offer", "sdp": "v=0"})),
            },
        )
        .unwrap();

        // then (期待する結果):
        assert_eq!(b.expect("offer").await["from"], "conn-a");
    }

    #[tokio::test]
    async fn test_concurrent_join_creates_one_consultation() {
        // テスト項目: 新しい Room への同時 join で Consultation は 1 回だけ作成される
        // given (前提条件):
        let store = Arc::new(InstrumentedStore::new(Duration::ZERO));
        let hub = spawn_hub(store.clone());
        let mut a = connect(&hub, "conn-a", None).await;
        let mut b = connect(&hub, "conn-b", None).await;

        // when (操作):
        join(&hub, &a, "apt-1");
        join(&hub, &b, "apt-1");

        // then (期待する結果):
        let history_a = a.expect("chat-history").await;
        b.expect("room-has-peers").await;
        let history_b = b.expect("chat-history").await;
        assert_eq!(history_a, history_b);
        assert_eq!(store.creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_signaling_is_relayed_and_not_persisted() {
        // テスト項目: offer / answer / ice-candidate は中継されるが履歴には残らない
        // given (前提条件):
        let store = Arc::new(InMemoryMessageStore::default());
        let hub = spawn_hub(store.clone());
        let mut a = connect(&hub, "conn-a", None).await;
        let mut b = connect(&hub, "conn-b", None).await;
        join(&hub, &a, "apt-1");
        a.expect("chat-history").await;
        join(&hub, &b, "apt-1");
        b.expect("room-has-peers").await;
        b.expect("chat-history").await;

        // when (操作):
        hub.dispatch(
            a.id.clone(),
            InboundEvent::Signal {
                kind: SignalKind::Offer,
                destination: Destination::ToRoom(room("apt-1")),
                payload: SignalPayload::new(json!({"type": "offer", "sdp": "v=0"})),
            },
        )
        .unwrap();
        hub.dispatch(
            b.id.clone(),
            InboundEvent::Signal {
                kind: SignalKind::Answer,
                destination: Destination::ToConnection(a.id.clone()),
                payload: SignalPayload::new(json!({"type": "answer", "sdp": "v=0"})),
            },
        )
        .unwrap();
        hub.dispatch(
            a.id.clone(),
            InboundEvent::Signal {
                kind: SignalKind::IceCandidate,
                destination: Destination::ToConnection(b.id.clone()),
                payload: SignalPayload::new(json!({"candidate": "candidate:1", "sdpMid": "0"})),
            },
        )
        .unwrap();

        // then (期待する結果):
        assert_eq!(
            b.expect("offer").await,
            json!({"offer": {"type": "offer", "sdp": "v=0"}, "from": "conn-a"})
        );
        assert_eq!(
            a.expect("answer").await,
            json!({"answer": {"type": "answer", "sdp": "v=0"}, "from": "conn-b"})
        );
        assert_eq!(b.expect("ice-candidate").await["from"], "conn-a");
        a.assert_silent().await;

        let mut late = connect(&hub, "conn-late", None).await;
        join(&hub, &late, "apt-1");
        late.expect("room-has-peers").await;
        assert_eq!(late.expect("chat-history").await, json!([]));
        assert!(store.list_messages(&room("apt-1")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_join_unknown_appointment_is_rolled_back() {
        // テスト項目: 予約が存在しない Room への join は error になり、メンバーから外される
        // given (前提条件):
        let hub = spawn_hub(Arc::new(InMemoryMessageStore::default()));
        let mut a = connect(&hub, "conn-a", None).await;

        // when (操作):
        join(&hub, &a, "apt-404");

        // then (期待する結果):
        assert_eq!(a.expect("error").await, "unknown appointment 'apt-404'");
        assert_eq!(hub.snapshot().await.unwrap(), vec![]);
    }

    #[tokio::test]
    async fn test_join_requires_participant_identity() {
        // テスト項目: 識別済みのユーザーは予約の患者か医師でなければ join できない
        // given (前提条件):
        let hub = spawn_hub(Arc::new(InMemoryMessageStore::default()));
        let stranger = Identity {
            user_id: user("stranger"),
            role: ParticipantRole::Patient,
        };
        let patient = Identity {
            user_id: user("patient-1"),
            role: ParticipantRole::Patient,
        };
        let mut s = connect(&hub, "conn-s", Some(stranger)).await;
        let mut p = connect(&hub, "conn-p", Some(patient)).await;

        // when (操作):
        join(&hub, &s, "apt-1");
        let error = s.expect("error").await;
        join(&hub, &p, "apt-1");

        // then (期待する結果):
        assert_eq!(
            error,
            "user 'stranger' is not a participant of this consultation"
        );
        assert_eq!(p.expect("chat-history").await, json!([]));
        let rooms = hub.snapshot().await.unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(
            rooms[0].members,
            vec![MemberSnapshot {
                connection_id: p.id.clone(),
                user_id: Some(user("patient-1")),
                role: Some(ParticipantRole::Patient),
            }]
        );
    }

    #[tokio::test]
    async fn test_events_while_join_is_pending_have_no_effect() {
        // テスト項目: 参加者でないユーザーが join 直後に送ったイベントは永続化も配信もされない
        // given (前提条件):
        let store = Arc::new(InMemoryMessageStore::default());
        let hub = spawn_hub(store.clone());
        let doctor = Identity {
            user_id: user("doctor-1"),
            role: ParticipantRole::Doctor,
        };
        let stranger = Identity {
            user_id: user("stranger"),
            role: ParticipantRole::Patient,
        };
        let mut d = connect(&hub, "conn-d", Some(doctor)).await;
        join(&hub, &d, "apt-1");
        d.expect("chat-history").await;
        let mut s = connect(&hub, "conn-s", Some(stranger)).await;

        // when (操作): join の確認を待たずに送信と通話開始
        join(&hub, &s, "apt-1");
        chat(&hub, &s, "apt-1", "stranger", "injected");
        hub.dispatch(
            s.id.clone(),
            InboundEvent::StartCall {
                room_id: room("apt-1"),
            },
        )
        .unwrap();

        // then (期待する結果): 参加待ちの間はメンバーではなく、Room の人数も知らされない
        assert_eq!(s.expect("error").await, "not a member of appointment 'apt-1'");
        assert_eq!(s.expect("error").await, "not a member of appointment 'apt-1'");
        assert_eq!(
            s.expect("error").await,
            "user 'stranger' is not a participant of this consultation"
        );
        s.assert_silent().await;
        d.assert_silent().await;
        assert!(store.list_messages(&room("apt-1")).await.unwrap().is_empty());
        let rooms = hub.snapshot().await.unwrap();
        assert_eq!(rooms[0].members.len(), 1);
    }

    #[tokio::test]
    async fn test_rejoin_waits_for_in_flight_message() {
        // テスト項目: 空になった Room に再 join しても、処理中のメッセージは履歴に含まれる
        // given (前提条件):
        let store = Arc::new(InstrumentedStore::new(Duration::from_millis(200)));
        let hub = spawn_hub(store.clone());
        let mut a = connect(&hub, "conn-a", None).await;
        join(&hub, &a, "apt-1");
        a.expect("chat-history").await;

        // when (操作): 永続化の完了前に切断し、別の接続で join
        chat(&hub, &a, "apt-1", "patient-1", "hello");
        hub.disconnect(a.id.clone()).unwrap();
        let mut again = connect(&hub, "conn-again", None).await;
        join(&hub, &again, "apt-1");

        // then (期待する結果): 履歴にちょうど 1 回だけ含まれる
        let history = again.expect("chat-history").await;
        assert_eq!(history.as_array().unwrap().len(), 1);
        assert_eq!(history[0]["message"], "hello");
        again.assert_silent().await;
        assert_eq!(store.list_messages(&room("apt-1")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_message_sent_while_peer_joins_is_delivered_once() {
        // テスト項目: 参加待ちの接続には、処理中のメッセージが履歴か new-message のどちらかで 1 回だけ届く
        // given (前提条件):
        let store = Arc::new(InstrumentedStore::new(Duration::from_millis(100)));
        let hub = spawn_hub(store);
        let mut a = connect(&hub, "conn-a", None).await;
        join(&hub, &a, "apt-1");
        a.expect("chat-history").await;
        let mut b = connect(&hub, "conn-b", None).await;

        // when (操作):
        chat(&hub, &a, "apt-1", "doctor-1", "before you came");
        join(&hub, &b, "apt-1");

        // then (期待する結果):
        assert_eq!(a.expect("new-message").await["message"], "before you came");
        b.expect("room-has-peers").await;
        let history = b.expect("chat-history").await;
        assert_eq!(history.as_array().unwrap().len(), 1);
        b.assert_silent().await;
    }

    #[tokio::test]
    async fn test_sender_must_match_identity() {
        // テスト項目: 識別済みの接続は他人の名前でメッセージを送れない
        // given (前提条件):
        let hub = spawn_hub(Arc::new(InMemoryMessageStore::default()));
        let patient = Identity {
            user_id: user("patient-1"),
            role: ParticipantRole::Patient,
        };
        let mut p = connect(&hub, "conn-p", Some(patient)).await;
        join(&hub, &p, "apt-1");
        p.expect("chat-history").await;

        // when (操作):
        chat(&hub, &p, "apt-1", "doctor-1", "prescribing myself");

        // then (期待する結果):
        assert_eq!(
            p.expect("error").await,
            "user 'doctor-1' is not a participant of this consultation"
        );
        p.assert_silent().await;
    }

    #[tokio::test]
    async fn test_joining_another_room_leaves_the_first() {
        // テスト項目: 接続は同時に 1 つの Room にだけ所属する
        // given (前提条件):
        let hub = spawn_hub(Arc::new(InMemoryMessageStore::default()));
        let mut a = connect(&hub, "conn-a", None).await;
        join(&hub, &a, "apt-1");
        a.expect("chat-history").await;

        // when (操作):
        join(&hub, &a, "apt-2");
        a.expect("chat-history").await;

        // then (期待する結果):
        let rooms = hub.snapshot().await.unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].room_id, room("apt-2"));
    }

    #[tokio::test]
    async fn test_presence_typing_and_ready() {
        // テスト項目: typing / ready が他のメンバーに中継され、presence に反映される
        // given (前提条件):
        let hub = spawn_hub(Arc::new(InMemoryMessageStore::default()));
        let mut a = connect(&hub, "conn-a", None).await;
        let mut b = connect(&hub, "conn-b", None).await;
        join(&hub, &a, "apt-1");
        a.expect("chat-history").await;
        join(&hub, &b, "apt-1");
        b.expect("room-has-peers").await;
        b.expect("chat-history").await;

        // when (操作):
        hub.dispatch(
            b.id.clone(),
            InboundEvent::Typing {
                room_id: room("apt-1"),
                role: ParticipantRole::Patient,
                display_name: "Hana".to_string(),
                is_typing: true,
            },
        )
        .unwrap();
        hub.dispatch(
            a.id.clone(),
            InboundEvent::Ready {
                room_id: room("apt-1"),
                role: ParticipantRole::Doctor,
            },
        )
        .unwrap();

        // then (期待する結果):
        assert_eq!(
            a.expect("user-typing").await,
            json!({"appointmentId": "apt-1", "role": "PATIENT", "displayName": "Hana", "isTyping": true})
        );
        assert_eq!(
            b.expect("peer-ready").await,
            json!({"appointmentId": "apt-1", "role": "DOCTOR", "from": "conn-a"})
        );
        let rooms = hub.snapshot().await.unwrap();
        assert_eq!(rooms[0].typing, vec![ParticipantRole::Patient]);
        assert_eq!(rooms[0].ready, vec![ParticipantRole::Doctor]);

        // when (操作): 通話終了と B の切断
        hub.dispatch(
            a.id.clone(),
            InboundEvent::EndCall {
                room_id: room("apt-1"),
            },
        )
        .unwrap();
        assert_eq!(b.expect("call-ended").await["from"], "conn-a");
        hub.disconnect(b.id.clone()).unwrap();

        // then (期待する結果): ready も typing も消える
        let rooms = hub.snapshot().await.unwrap();
        assert!(rooms[0].typing.is_empty());
        assert!(rooms[0].ready.is_empty());
        assert_eq!(rooms[0].members.len(), 1);
    }

    #[tokio::test]
    async fn test_accept_call_to_unknown_connection() {
        // テスト項目: 存在しない接続宛ての中継は送信者に error を返す
        // given (前提条件):
        let hub = spawn_hub(Arc::new(InMemoryMessageStore::default()));
        let mut a = connect(&hub, "conn-a", None).await;
        let mut b = connect(&hub, "conn-b", None).await;

        // when (操作):
        hub.dispatch(
            a.id.clone(),
            InboundEvent::AcceptCall {
                target: ConnectionId::new("ghost".to_string()).unwrap(),
                room_id: room("apt-1"),
            },
        )
        .unwrap();
        hub.dispatch(
            a.id.clone(),
            InboundEvent::AcceptCall {
                target: b.id.clone(),
                room_id: room("apt-1"),
            },
        )
        .unwrap();

        // then (期待する結果):
        assert_eq!(a.expect("error").await, "connection 'ghost' not found");
        assert_eq!(
            b.expect("call-accepted").await,
            json!({"appointmentId": "apt-1", "from": "conn-a"})
        );
    }

    #[tokio::test]
    async fn test_malformed_frame_is_reported_to_sender() {
        // テスト項目: 解釈できなかったフレームは送信者にだけ error が返る
        // given (前提条件):
        let hub = spawn_hub(Arc::new(InMemoryMessageStore::default()));
        let mut a = connect(&hub, "conn-a", None).await;

        // when (操作):
        hub.reject(a.id.clone(), "expected value at line 1 column 1")
            .unwrap();

        // then (期待する結果):
        assert_eq!(
            a.expect("error").await,
            "malformed payload: expected value at line 1 column 1"
        );
    }

    #[tokio::test]
    async fn test_leave_appointment() {
        // テスト項目: leave-appointment で Room から抜け、未参加なら error になる
        // given (前提条件):
        let hub = spawn_hub(Arc::new(InMemoryMessageStore::default()));
        let mut a = connect(&hub, "conn-a", None).await;
        let mut b = connect(&hub, "conn-b", None).await;
        join(&hub, &a, "apt-1");
        a.expect("chat-history").await;
        join(&hub, &b, "apt-1");
        b.expect("room-has-peers").await;
        b.expect("chat-history").await;

        // when (操作):
        let leave = InboundEvent::LeaveRoom {
            room_id: room("apt-1"),
        };
        hub.dispatch(b.id.clone(), leave.clone()).unwrap();
        hub.dispatch(b.id.clone(), leave).unwrap();
        check_room(&hub, &a, "apt-1");

        // then (期待する結果):
        assert_eq!(
            b.expect("error").await,
            "not a member of appointment 'apt-1'"
        );
        assert_eq!(a.expect("room-has-peers").await["count"], 0);
    }
}
