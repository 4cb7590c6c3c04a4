//! UseCase: Room ごとのストア I/O
//!
//! 1 つの Room のジョブ（join / send / mark-read）を 1 つのタスクで順番に処理します。
//! これにより同じ Room のメッセージは永続化と配信が同じ順序になり、
//! 新しい Room への同時 join でも Consultation の作成は 1 回だけになります。
//! 別々の Room のジョブは互いを待ちません。
//!
//! 結果は全て Hub のコマンドキューに報告し、配信先は Hub がその時点のメンバーから決めます。

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::domain::{
    AppointmentDirectory, ChatMessage, ConnectionId, Consultation, Identity, MessageStore,
    NewMessage, RoomId, UserId,
};

use super::{error::HubError, hub::HubCommand};

/// RoomWorker が処理するジョブ
///
/// どのジョブも Hub に結果をちょうど 1 回報告します。
#[derive(Debug)]
pub(crate) enum RoomJob {
    Join {
        connection_id: ConnectionId,
        identity: Option<Identity>,
    },
    Send {
        connection_id: ConnectionId,
        message: NewMessage,
        /// 送信者が識別済みの接続か（参加者であることを確認する）
        identified: bool,
    },
    MarkRead {
        connection_id: ConnectionId,
        reader_id: UserId,
    },
}

pub(crate) struct RoomWorker {
    room_id: RoomId,
    store: Arc<dyn MessageStore>,
    appointments: Arc<dyn AppointmentDirectory>,
    hub: mpsc::WeakUnboundedSender<HubCommand>,
    consultation: Option<Consultation>,
}

impl RoomWorker {
    pub(crate) fn new(
        room_id: RoomId,
        store: Arc<dyn MessageStore>,
        appointments: Arc<dyn AppointmentDirectory>,
        hub: mpsc::WeakUnboundedSender<HubCommand>,
    ) -> Self {
        Self {
            room_id,
            store,
            appointments,
            hub,
            consultation: None,
        }
    }

    /// タスクを起動し、ジョブの送信口を返す
    ///
    /// 送信口が全て drop されると、残りのジョブを処理してから終了します。
    pub(crate) fn spawn(self) -> mpsc::UnboundedSender<RoomJob> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(self.run(rx));
        tx
    }

    async fn run(mut self, mut jobs: mpsc::UnboundedReceiver<RoomJob>) {
        tracing::debug!(appointment = %self.room_id, "Room worker started");
        while let Some(job) = jobs.recv().await {
            let command = match job {
                RoomJob::Join {
                    connection_id,
                    identity,
                } => self.join(connection_id, identity).await,
                RoomJob::Send {
                    connection_id,
                    message,
                    identified,
                } => self.send(connection_id, message, identified).await,
                RoomJob::MarkRead {
                    connection_id,
                    reader_id,
                } => self.mark_read(connection_id, reader_id).await,
            };
            self.report(command);
        }
        tracing::debug!(appointment = %self.room_id, "Room worker stopped");
    }

    async fn join(
        &mut self,
        connection_id: ConnectionId,
        identity: Option<Identity>,
    ) -> HubCommand {
        match self.load_history(identity.as_ref()).await {
            Ok(history) => {
                tracing::debug!(
                    connection = %connection_id,
                    appointment = %self.room_id,
                    messages = history.len(),
                    "Join accepted"
                );
                HubCommand::JoinAccepted {
                    connection_id,
                    room_id: self.room_id.clone(),
                    history,
                }
            }
            Err(error) => {
                tracing::warn!(
                    connection = %connection_id,
                    appointment = %self.room_id,
                    "Join failed: {}",
                    error
                );
                HubCommand::JoinRejected {
                    connection_id,
                    room_id: self.room_id.clone(),
                    error,
                }
            }
        }
    }

    async fn load_history(
        &mut self,
        identity: Option<&Identity>,
    ) -> Result<Vec<ChatMessage>, HubError> {
        let consultation = self.consultation().await?;
        if let Some(identity) = identity
            && !consultation.is_participant(&identity.user_id)
        {
            return Err(HubError::NotAParticipant(identity.user_id.clone()));
        }
        Ok(self.store.list_messages(&self.room_id).await?)
    }

    async fn consultation(&mut self) -> Result<Consultation, HubError> {
        if let Some(consultation) = &self.consultation {
            return Ok(consultation.clone());
        }
        let consultation = self.open_consultation().await?;
        self.consultation = Some(consultation.clone());
        Ok(consultation)
    }

    /// Consultation を取得し、なければ予約から作成する
    async fn open_consultation(&self) -> Result<Consultation, HubError> {
        if let Some(consultation) = self.store.find_consultation(&self.room_id).await? {
            return Ok(consultation);
        }

        let appointment = self
            .appointments
            .find_appointment(&self.room_id)
            .await?
            .ok_or_else(|| HubError::UnknownRoom(self.room_id.clone()))?;

        let consultation = self
            .store
            .create_consultation(
                &self.room_id,
                &appointment.patient_id,
                &appointment.doctor_id,
            )
            .await?;
        tracing::info!(appointment = %self.room_id, "Consultation created");
        Ok(consultation)
    }

    async fn send(
        &mut self,
        connection_id: ConnectionId,
        message: NewMessage,
        identified: bool,
    ) -> HubCommand {
        match self.persist(message, identified).await {
            Ok(message) => HubCommand::MessagePersisted {
                room_id: self.room_id.clone(),
                message,
            },
            Err(error) => {
                tracing::warn!(
                    connection = %connection_id,
                    appointment = %self.room_id,
                    "Message not persisted: {}",
                    error
                );
                HubCommand::JobFailed {
                    connection_id,
                    room_id: self.room_id.clone(),
                    error,
                }
            }
        }
    }

    async fn persist(
        &mut self,
        message: NewMessage,
        identified: bool,
    ) -> Result<ChatMessage, HubError> {
        if identified {
            let consultation = self.consultation().await?;
            if !consultation.is_participant(&message.sender_id) {
                return Err(HubError::NotAParticipant(message.sender_id));
            }
        }
        Ok(self.store.append_message(message).await?)
    }

    async fn mark_read(&self, connection_id: ConnectionId, reader_id: UserId) -> HubCommand {
        match self.store.mark_read(&self.room_id, &reader_id).await {
            Ok(updated) => {
                tracing::debug!(
                    appointment = %self.room_id,
                    reader = %reader_id,
                    updated,
                    "Messages marked as read"
                );
                HubCommand::MessagesRead {
                    connection_id,
                    room_id: self.room_id.clone(),
                    reader_id,
                }
            }
            Err(e) => {
                let error = HubError::from(e);
                tracing::warn!(connection = %connection_id, "Mark read failed: {}", error);
                HubCommand::JobFailed {
                    connection_id,
                    room_id: self.room_id.clone(),
                    error,
                }
            }
        }
    }

    fn report(&self, command: HubCommand) {
        // Hub が停止していれば結果は捨てる
        let Some(hub) = self.hub.upgrade() else {
            return;
        };
        let _ = hub.send(command);
    }
}
