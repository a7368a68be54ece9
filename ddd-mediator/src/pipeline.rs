//! 行为链（Pipeline）
//!
//! 横切行为（日志、校验、事务、重试、超时等）以洋葱模型包裹处理器调用：
//! 先注册的行为位于最外层，进入时最先执行、返回时最后执行。
//!
//! 行为按请求形态注册而非按具体请求类型注册，因此存在两条互不相干的链：
//! - `Pipeline<Response>`：带返回值的命令与查询；
//! - `Pipeline<()>`：无返回值的命令，以及通知的每个处理器。
//!
//! 链在每次分发时按需组装，调用结束即丢弃，不存在跨调用的共享可变状态。
//!
use crate::{
    context::AppContext,
    error::AppResult,
    registry::HandlerBinding,
    request::{RequestEnvelope, Response},
};
use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use tracing::trace;

/// 行为链中剩余部分（后续行为，最终是处理器）的续体
///
/// 行为可以不调用 `next` 以短路处理器（如缓存命中、校验失败）；
/// 也可以向下游传入修改过的上下文（如带超时的子取消信号）。
pub type Next<O> =
    Box<dyn FnOnce(AppContext, RequestEnvelope) -> BoxFuture<'static, AppResult<O>> + Send>;

/// 有返回值链上的行为
pub type RequestBehavior = dyn Behavior<Response>;

/// 无返回值链上的行为
pub type VoidBehavior = dyn Behavior<()>;

#[async_trait]
pub trait Behavior<O>: Send + Sync {
    async fn handle(&self, ctx: AppContext, request: RequestEnvelope, next: Next<O>)
    -> AppResult<O>;
}

/// 有序的行为列表，顺序在构建中介者时确定
pub struct Pipeline<O> {
    behaviors: Arc<[Arc<dyn Behavior<O>>]>,
}

impl<O> Clone for Pipeline<O> {
    fn clone(&self) -> Self {
        Self {
            behaviors: self.behaviors.clone(),
        }
    }
}

impl<O: Send + 'static> Default for Pipeline<O> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<O: Send + 'static> From<Vec<Arc<dyn Behavior<O>>>> for Pipeline<O> {
    fn from(behaviors: Vec<Arc<dyn Behavior<O>>>) -> Self {
        Self::new(behaviors)
    }
}

impl<O: Send + 'static> Pipeline<O> {
    pub fn new(behaviors: Vec<Arc<dyn Behavior<O>>>) -> Self {
        Self {
            behaviors: behaviors.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.behaviors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.behaviors.is_empty()
    }

    /// 将行为依次包裹在处理器外层并执行
    pub fn run(
        &self,
        ctx: AppContext,
        request: RequestEnvelope,
        handler: Arc<HandlerBinding<O>>,
    ) -> BoxFuture<'static, AppResult<O>> {
        Self::run_from(self.behaviors.clone(), 0, ctx, request, handler)
    }

    fn run_from(
        behaviors: Arc<[Arc<dyn Behavior<O>>]>,
        index: usize,
        ctx: AppContext,
        request: RequestEnvelope,
        handler: Arc<HandlerBinding<O>>,
    ) -> BoxFuture<'static, AppResult<O>> {
        let Some(behavior) = behaviors.get(index).cloned() else {
            trace!(request = request.name(), handler = handler.name(), "invoking handler");
            return handler.invoke(ctx, request);
        };

        trace!(request = request.name(), behavior_index = index, "entering behavior");
        let next: Next<O> = Box::new(move |ctx, request| {
            Self::run_from(behaviors, index + 1, ctx, request, handler)
        });

        async move { behavior.handle(ctx, request, next).await }.boxed()
    }
}
