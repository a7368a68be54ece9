//! 中介者（Mediator）
//!
//! 进程内请求分发的门面：
//! - `send` / `send_with_result` / `query`：解析唯一处理器，包裹行为链后执行；
//! - `publish`：解析全部通知处理器，为每个处理器构建独立的行为链并全部执行，
//!   汇总失败后以 [`AppError::AggregateNotification`] 一次性返回。
//!
//! 处理器解析总是先于行为链执行：无人处理的请求不会触发任何行为。
//! 引擎内部不做重试与超时，二者都应以行为的形式注册。
//!
use crate::{
    command::{Command, CommandWithResult},
    context::AppContext,
    error::{AppError, AppResult, HandlerFailure},
    notification::Notification,
    pipeline::Pipeline,
    query::Query,
    registry::{HandlerBinding, HandlerRegistry},
    request::{RequestEnvelope, RequestKey, Response},
};
use bon::Builder;
use futures_util::{FutureExt, StreamExt, stream};
use serde::Deserialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

/// 通知分发策略
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStrategy {
    /// 按注册顺序逐个执行
    Sequential,
    /// 并发执行，同时在途的处理器数量不超过 `max_in_flight`
    Concurrent { max_in_flight: usize },
}

impl Default for PublishStrategy {
    fn default() -> Self {
        Self::Concurrent { max_in_flight: 8 }
    }
}

/// 中介者配置
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct MediatorConfig {
    /// 同一通知广播给多个处理器时的执行方式
    pub publish_strategy: PublishStrategy,
}

#[derive(Builder)]
pub struct Mediator {
    registry: Arc<dyn HandlerRegistry>,
    /// 带返回值命令与查询的行为链
    #[builder(default)]
    request_behaviors: Pipeline<Response>,
    /// 无返回值命令与通知处理器的行为链
    #[builder(default)]
    void_behaviors: Pipeline<()>,
    #[builder(default)]
    config: MediatorConfig,
}

impl Mediator {
    pub fn registry(&self) -> &Arc<dyn HandlerRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &MediatorConfig {
        &self.config
    }

    /// 分发无返回值命令
    pub async fn send<C: Command>(&self, ctx: AppContext, cmd: C) -> AppResult<()> {
        let key = RequestKey::command::<C>();
        let binding = self.registry.resolve_command(&key)?;

        debug!(
            request = key.name(),
            kind = %key.kind(),
            handler = binding.name(),
            "dispatching"
        );
        let out = self
            .void_behaviors
            .run(ctx, RequestEnvelope::new(key, cmd), binding.clone())
            .await;
        log_outcome(&key, &binding, &out);

        out
    }

    /// 分发带返回值命令
    pub async fn send_with_result<C: CommandWithResult>(
        &self,
        ctx: AppContext,
        cmd: C,
    ) -> AppResult<C::Output> {
        let key = RequestKey::command_with_result::<C>();
        self.dispatch_request(ctx, key, cmd)
            .await?
            .into_inner::<C::Output>()
    }

    /// 分发查询
    pub async fn query<Q: Query>(&self, ctx: AppContext, q: Q) -> AppResult<Q::Output> {
        let key = RequestKey::query::<Q>();
        self.dispatch_request(ctx, key, q)
            .await?
            .into_inner::<Q::Output>()
    }

    async fn dispatch_request<R: Send + Sync + 'static>(
        &self,
        ctx: AppContext,
        key: RequestKey,
        request: R,
    ) -> AppResult<Response> {
        let binding = self.registry.resolve_request(&key)?;

        debug!(
            request = key.name(),
            kind = %key.kind(),
            handler = binding.name(),
            "dispatching"
        );
        let out = self
            .request_behaviors
            .run(ctx, RequestEnvelope::new(key, request), binding.clone())
            .await;
        log_outcome(&key, &binding, &out);

        out
    }

    /// 广播通知
    ///
    /// 每个处理器拥有独立的行为链与通知副本；某个处理器失败（或 panic）不会阻止其余处理器执行。
    /// 全部执行完毕后，若存在失败则返回聚合错误，否则成功。没有处理器时直接成功。
    pub async fn publish<N: Notification>(
        &self,
        ctx: AppContext,
        notification: N,
    ) -> AppResult<()> {
        let key = RequestKey::notification::<N>();
        let bindings = self.registry.resolve_all(&key);
        if bindings.is_empty() {
            debug!(request = key.name(), "no notification handlers, skipping");
            return Ok(());
        }

        debug!(
            request = key.name(),
            handlers = bindings.len(),
            strategy = ?self.config.publish_strategy,
            "publishing"
        );
        let runs = bindings.into_iter().enumerate().map(|(index, binding)| {
            let pipeline = self.void_behaviors.clone();
            let ctx = ctx.clone();
            let request = RequestEnvelope::new(key, notification.clone());

            async move {
                // 链的组装与处理器的同步部分同样可能 panic，需一并放进 catch_unwind
                let run = {
                    let binding = binding.clone();
                    async move { pipeline.run(ctx, request, binding).await }
                };
                let out = match AssertUnwindSafe(run).catch_unwind().await {
                    Ok(out) => out,
                    Err(_) => Err(AppError::HandlerPanicked {
                        handler: binding.name(),
                    }),
                };
                (index, binding, out)
            }
        });

        let mut outcomes: Vec<_> = match self.config.publish_strategy {
            PublishStrategy::Sequential => stream::iter(runs).then(|run| run).collect().await,
            PublishStrategy::Concurrent { max_in_flight } => {
                stream::iter(runs)
                    .buffer_unordered(max_in_flight.max(1))
                    .collect()
                    .await
            }
        };
        // 失败按注册顺序汇报
        outcomes.sort_by_key(|(index, ..)| *index);

        let failures: Vec<HandlerFailure> = outcomes
            .into_iter()
            .filter_map(|(_, binding, out)| {
                let error = out.err()?;
                warn!(
                    request = key.name(),
                    handler = binding.name(),
                    id = %binding.id(),
                    error = %error,
                    "notification handler failed"
                );
                Some(HandlerFailure {
                    handler: binding.id(),
                    handler_name: binding.name(),
                    error,
                })
            })
            .collect();

        if failures.is_empty() {
            return Ok(());
        }

        Err(AppError::AggregateNotification {
            notification: key.name(),
            failures,
        })
    }
}

fn log_outcome<O, T>(key: &RequestKey, binding: &HandlerBinding<O>, out: &AppResult<T>) {
    match out {
        Ok(_) => debug!(request = key.name(), handler = binding.name(), "completed"),
        Err(e) => debug!(request = key.name(), handler = binding.name(), error = %e, "failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_publishes_concurrently() {
        assert_eq!(
            MediatorConfig::default().publish_strategy,
            PublishStrategy::Concurrent { max_in_flight: 8 }
        );
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let cfg: MediatorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.publish_strategy, PublishStrategy::default());

        let cfg: MediatorConfig =
            serde_json::from_str(r#"{"publish_strategy":"sequential"}"#).unwrap();
        assert_eq!(cfg.publish_strategy, PublishStrategy::Sequential);

        let cfg: MediatorConfig = serde_json::from_str(
            r#"{"publish_strategy":{"concurrent":{"max_in_flight":2}}}"#,
        )
        .unwrap();
        assert_eq!(
            cfg.publish_strategy,
            PublishStrategy::Concurrent { max_in_flight: 2 }
        );
    }
}
