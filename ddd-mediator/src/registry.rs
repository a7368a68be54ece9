//! 处理器注册表（HandlerRegistry）
//!
//! 中介者只依赖该只读接口完成“请求类型 → 处理器”的解析；
//! 注册表如何被填充（手工注册、容器扫描等）属于组合根的职责。
//!
use crate::{
    context::AppContext,
    error::{AppError, AppResult},
    request::{RequestEnvelope, RequestKey, Response},
};
use futures_util::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// 类型擦除后的处理器调用
pub type HandlerFn<O> =
    Arc<dyn Fn(AppContext, RequestEnvelope) -> BoxFuture<'static, AppResult<O>> + Send + Sync>;

/// 进程内唯一的处理器标识，在注册时分配
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl HandlerId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 一条处理器绑定：标识、名称与擦除后的调用闭包
pub struct HandlerBinding<O> {
    id: HandlerId,
    name: &'static str,
    call: HandlerFn<O>,
}

impl<O> HandlerBinding<O> {
    pub fn new(name: &'static str, call: HandlerFn<O>) -> Self {
        Self {
            id: HandlerId::next(),
            name,
            call,
        }
    }

    pub fn id(&self) -> HandlerId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn invoke(
        &self,
        ctx: AppContext,
        request: RequestEnvelope,
    ) -> BoxFuture<'static, AppResult<O>> {
        (self.call)(ctx, request)
    }
}

impl<O: Send + 'static> HandlerBinding<O> {
    /// 由异步闭包构造绑定
    pub fn from_fn<F, Fut>(name: &'static str, f: F) -> Self
    where
        F: Fn(AppContext, RequestEnvelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<O>> + Send + 'static,
    {
        Self::new(name, Arc::new(move |ctx, request| f(ctx, request).boxed()))
    }
}

impl<O> fmt::Debug for HandlerBinding<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerBinding")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// 处理器注册表
///
/// - `command_bindings`：无返回值命令；
/// - `request_bindings`：带返回值命令与查询；
/// - `notification_bindings`：通知，可为空。
///
/// 实现方只需返回候选绑定，唯一性校验由 `resolve_*` 统一完成：
/// 注册表可能由容器动态填充，因此解析时仍需再次检查。
pub trait HandlerRegistry: Send + Sync {
    fn command_bindings(&self, key: &RequestKey) -> Vec<Arc<HandlerBinding<()>>>;

    fn request_bindings(&self, key: &RequestKey) -> Vec<Arc<HandlerBinding<Response>>>;

    fn notification_bindings(&self, key: &RequestKey) -> Vec<Arc<HandlerBinding<()>>>;

    fn resolve_command(&self, key: &RequestKey) -> AppResult<Arc<HandlerBinding<()>>> {
        single(key, self.command_bindings(key))
    }

    fn resolve_request(&self, key: &RequestKey) -> AppResult<Arc<HandlerBinding<Response>>> {
        single(key, self.request_bindings(key))
    }

    /// 通知没有处理器是合法的，返回空列表
    fn resolve_all(&self, key: &RequestKey) -> Vec<Arc<HandlerBinding<()>>> {
        self.notification_bindings(key)
    }
}

fn single<O>(
    key: &RequestKey,
    mut bindings: Vec<Arc<HandlerBinding<O>>>,
) -> AppResult<Arc<HandlerBinding<O>>> {
    match bindings.len() {
        1 => Ok(bindings.remove(0)),
        0 => {
            warn!(request = key.name(), kind = %key.kind(), "no handler registered");
            Err(AppError::HandlerNotFound {
                request: key.name(),
                kind: key.kind(),
            })
        }
        count => {
            warn!(request = key.name(), kind = %key.kind(), count, "multiple handlers registered");
            Err(AppError::AmbiguousHandler {
                request: key.name(),
                kind: key.kind(),
                count,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;

    struct Noop;

    impl Command for Noop {
        const NAME: &'static str = "Noop";
    }

    fn noop_binding() -> Arc<HandlerBinding<()>> {
        Arc::new(HandlerBinding::from_fn("NoopHandler", |_ctx, _req| async {
            Ok(())
        }))
    }

    /// 模拟容器动态填充：同一键下可能出现多个绑定
    struct ListRegistry(Vec<Arc<HandlerBinding<()>>>);

    impl HandlerRegistry for ListRegistry {
        fn command_bindings(&self, _key: &RequestKey) -> Vec<Arc<HandlerBinding<()>>> {
            self.0.clone()
        }

        fn request_bindings(&self, _key: &RequestKey) -> Vec<Arc<HandlerBinding<Response>>> {
            Vec::new()
        }

        fn notification_bindings(&self, _key: &RequestKey) -> Vec<Arc<HandlerBinding<()>>> {
            self.0.clone()
        }
    }

    #[test]
    fn handler_ids_are_unique() {
        let a = noop_binding();
        let b = noop_binding();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn resolve_checks_cardinality() {
        let key = RequestKey::command::<Noop>();

        let empty = ListRegistry(vec![]);
        assert!(matches!(
            empty.resolve_command(&key),
            Err(AppError::HandlerNotFound { request: "Noop", .. })
        ));
        assert!(empty.resolve_all(&key).is_empty());

        let one = ListRegistry(vec![noop_binding()]);
        assert!(one.resolve_command(&key).is_ok());

        let two = ListRegistry(vec![noop_binding(), noop_binding()]);
        match two.resolve_command(&key) {
            Err(AppError::AmbiguousHandler { count, .. }) => assert_eq!(count, 2),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(two.resolve_all(&key).len(), 2);
    }
}
