//! ドメイン層のエラー型

use thiserror::Error;

/// 値オブジェクトの検証エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("{0} is required")]
    Missing(&'static str),

    #[error("unknown {field} '{value}'")]
    UnknownVariant { field: &'static str, value: String },
}

/// Message Store / Appointment Directory のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// 一時的な永続化の失敗（接続断、ロック競合など）
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// 対象の Consultation が存在しない
    #[error("consultation '{0}' not found")]
    ConsultationNotFound(String),

    /// 保存済みデータが値オブジェクトの検証に通らない
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// MessagePusher のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessagePushError {
    #[error("client '{0}' not found")]
    ClientNotFound(String),

    #[error("failed to push message: {0}")]
    PushFailed(String),
}
