use crate::{context::AppContext, error::AppResult, notification::Notification};
use async_trait::async_trait;

/// 通知处理器
///
/// 同一通知可以注册多个处理器，彼此之间不应依赖执行顺序，
/// 也不应假设其他处理器一定成功。
#[async_trait]
pub trait NotificationHandler<N>: Send + Sync
where
    N: Notification,
{
    async fn handle(&self, ctx: &AppContext, notification: N) -> AppResult<()>;
}
