use crate::error::{AppError, AppResult};
use bon::Builder;
use tokio_util::sync::CancellationToken;

/// 应用层上下文（Application Context）
///
/// 承载一次应用层调用（命令/查询/通知）所需的横切信息，例如：
/// - 业务语境：关联追踪 `correlation_id`、因果链 `causation_id`、执行者类型/ID；
/// - 幂等键（`idempotency_key`）：用于在基础设施层实现请求幂等；
/// - 取消信号（`cancellation`）：沿行为链按值传递到处理器，由各环节自行协作检查，
///   中介者本身不会强制中断正在执行的处理器。
///
/// 典型用法：
/// ```rust
/// use ddd_mediator::context::AppContext;
///
/// let ctx = AppContext::builder()
///     .maybe_correlation_id(Some("cor-123".into()))
///     .maybe_actor_type(Some("user".into()))
///     .maybe_actor_id(Some("u-1".into()))
///     .idempotency_key("idem-xyz".into())
///     .build();
/// assert!(!ctx.is_cancelled());
/// ```
#[derive(Builder, Clone, Debug, Default)]
pub struct AppContext {
    /// 关联ID
    correlation_id: Option<String>,
    /// 因果ID
    causation_id: Option<String>,
    /// 触发调用的主体类型（如用户、系统等）
    actor_type: Option<String>,
    /// 触发调用的主体ID
    actor_id: Option<String>,
    /// 幂等键（可选）：为空则由上层或基础设施决定是否参与幂等
    idempotency_key: Option<String>,
    #[builder(default)]
    cancellation: CancellationToken,
}

impl AppContext {
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn causation_id(&self) -> Option<&str> {
        self.causation_id.as_deref()
    }

    pub fn actor_type(&self) -> Option<&str> {
        self.actor_type.as_deref()
    }

    pub fn actor_id(&self) -> Option<&str> {
        self.actor_id.as_deref()
    }

    pub fn idempotency_key(&self) -> Option<&str> {
        self.idempotency_key.as_deref()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// 替换取消信号，其余字段保持不变
    ///
    /// 超时类行为可以传入 `ctx.cancellation_token().child_token()`，
    /// 在截止时间到达时仅取消自身及下游。
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// 协作式取消检查点
    pub fn ensure_active(&self) -> AppResult<()> {
        if self.cancellation.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        Ok(())
    }
}
