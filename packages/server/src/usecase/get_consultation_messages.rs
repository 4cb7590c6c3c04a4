//! UseCase: 診察メッセージ履歴の取得
//!
//! 永続化済みの Consultation とメッセージを Message Store から読み出します。

use std::sync::Arc;

use crate::domain::{ChatMessage, Consultation, MessageStore, RoomId};

use super::error::GetConsultationMessagesError;

/// 診察メッセージ履歴取得のユースケース
pub struct GetConsultationMessagesUseCase {
    store: Arc<dyn MessageStore>,
}

impl GetConsultationMessagesUseCase {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    /// # Returns
    ///
    /// * `Ok((Consultation, Vec<ChatMessage>))` - 診察記録と作成順のメッセージ
    /// * `Err(GetConsultationMessagesError::NotFound)` - Consultation が未作成
    pub async fn execute(
        &self,
        room_id: RoomId,
    ) -> Result<(Consultation, Vec<ChatMessage>), GetConsultationMessagesError> {
        let consultation = self
            .store
            .find_consultation(&room_id)
            .await
            .map_err(|e| GetConsultationMessagesError::StoreUnavailable(e.to_string()))?
            .ok_or_else(|| GetConsultationMessagesError::NotFound(room_id.clone()))?;

        let messages = self
            .store
            .list_messages(&room_id)
            .await
            .map_err(|e| GetConsultationMessagesError::StoreUnavailable(e.to_string()))?;

        Ok((consultation, messages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{
            MessageContent, MessageKind, MockMessageStore, NewMessage, ParticipantRole,
            StoreError, UserId,
        },
        infrastructure::repository::InMemoryMessageStore,
    };

    fn room(id: &str) -> RoomId {
        RoomId::new(id.to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_execute_returns_history() {
        // テスト項目: Consultation と作成順のメッセージが返る
        // given (前提条件):
        let store = Arc::new(InMemoryMessageStore::default());
        let patient = UserId::new("patient-1".to_string()).unwrap();
        let doctor = UserId::new("doctor-1".to_string()).unwrap();
        store
            .create_consultation(&room("apt-1"), &patient, &doctor)
            .await
            .unwrap();
        for text in ["first", "second"] {
            store
                .append_message(NewMessage {
                    room_id: room("apt-1"),
                    sender_id: patient.clone(),
                    sender_role: ParticipantRole::Patient,
                    content: MessageContent::new(text.to_string()).unwrap(),
                    kind: MessageKind::Text,
                })
                .await
                .unwrap();
        }
        let usecase = GetConsultationMessagesUseCase::new(store);

        // when (操作):
        let (consultation, messages) = usecase.execute(room("apt-1")).await.unwrap();

        // then (期待する結果):
        assert_eq!(consultation.doctor_id, doctor);
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_execute_not_found() {
        // テスト項目: Consultation が未作成の場合は NotFound を返す
        // given (前提条件):
        let usecase = GetConsultationMessagesUseCase::new(Arc::new(InMemoryMessageStore::default()));

        // when (操作):
        let result = usecase.execute(room("apt-9")).await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(GetConsultationMessagesError::NotFound(room("apt-9")))
        );
    }

    #[tokio::test]
    async fn test_execute_store_unavailable() {
        // テスト項目: ストアの障害は StoreUnavailable として返る
        // given (前提条件):
        let mut store = MockMessageStore::new();
        store
            .expect_find_consultation()
            .returning(|_| Err(StoreError::Unavailable("connection refused".to_string())));
        let usecase = GetConsultationMessagesUseCase::new(Arc::new(store));

        // when (操作):
        let result = usecase.execute(room("apt-1")).await;

        // then (期待する結果):
        assert!(matches!(
            result,
            Err(GetConsultationMessagesError::StoreUnavailable(_))
        ));
    }
}
