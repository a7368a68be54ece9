use crate::registry::HandlerId;
use crate::request::RequestKind;
use std::fmt;

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("authorization: {0}")]
    Authorization(String),

    #[error("infra: {0}")]
    Infra(String),

    #[error("cancelled")]
    Cancelled,

    #[error("handler not found: {kind}={request}")]
    HandlerNotFound {
        request: &'static str,
        kind: RequestKind,
    },

    #[error("ambiguous handler: {kind}={request}, count={count}")]
    AmbiguousHandler {
        request: &'static str,
        kind: RequestKind,
        count: usize,
    },

    #[error("handler already registered: {kind}={request}")]
    AlreadyRegistered {
        request: &'static str,
        kind: RequestKind,
    },

    #[error("handler panicked: {handler}")]
    HandlerPanicked { handler: &'static str },

    #[error("{} notification handler(s) failed: notification={notification}", .failures.len())]
    AggregateNotification {
        notification: &'static str,
        failures: Vec<HandlerFailure>,
    },

    #[error("type mismatch: expected={expected}, found={found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

/// 单个通知处理器的失败记录
#[derive(Debug)]
pub struct HandlerFailure {
    pub handler: HandlerId,
    pub handler_name: &'static str,
    pub error: AppError,
}

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}: {}", self.handler_name, self.handler, self.error)
    }
}

impl AppError {
    /// 聚合错误中的各处理器失败；其他错误返回空切片
    pub fn handler_failures(&self) -> &[HandlerFailure] {
        match self {
            Self::AggregateNotification { failures, .. } => failures,
            _ => &[],
        }
    }
}
