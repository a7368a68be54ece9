use crate::{
    command::{Command, CommandWithResult},
    command_handler::{CommandHandler, CommandWithResultHandler},
    error::{AppError, AppResult},
    notification::Notification,
    notification_handler::NotificationHandler,
    query::Query,
    query_handler::QueryHandler,
    registry::{HandlerBinding, HandlerId, HandlerRegistry},
    request::{RequestKey, Response},
};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::any::type_name;
use std::sync::Arc;
use tracing::debug;

/// 基于内存的 HandlerRegistry 实现
/// - 通过 `RequestKey`（请求形态 + TypeId）注册处理器
/// - 命令/查询每个键只允许一个处理器，重复注册在启动阶段即返回错误
/// - 通知每个键可追加任意多个处理器
#[derive(Default)]
pub struct InMemoryHandlerRegistry {
    commands: DashMap<RequestKey, Arc<HandlerBinding<()>>>,
    requests: DashMap<RequestKey, Arc<HandlerBinding<Response>>>,
    notifications: DashMap<RequestKey, Vec<Arc<HandlerBinding<()>>>>,
}

impl InMemoryHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册无返回值命令处理器
    pub fn register_command<C, H>(&self, handler: Arc<H>) -> AppResult<HandlerId>
    where
        C: Command,
        H: CommandHandler<C> + 'static,
    {
        let binding = HandlerBinding::from_fn(type_name::<H>(), move |ctx, request| {
            let handler = handler.clone();

            async move {
                let cmd = request.into_inner::<C>()?;
                handler.handle(&ctx, cmd).await
            }
        });

        insert_once(&self.commands, RequestKey::command::<C>(), binding)
    }

    /// 注册带返回值命令处理器
    pub fn register_command_with_result<C, H>(&self, handler: Arc<H>) -> AppResult<HandlerId>
    where
        C: CommandWithResult,
        H: CommandWithResultHandler<C> + 'static,
    {
        let binding = HandlerBinding::from_fn(type_name::<H>(), move |ctx, request| {
            let handler = handler.clone();

            async move {
                let cmd = request.into_inner::<C>()?;
                let out = handler.handle(&ctx, cmd).await?;
                Ok(Response::new(out))
            }
        });

        insert_once(
            &self.requests,
            RequestKey::command_with_result::<C>(),
            binding,
        )
    }

    /// 注册查询处理器
    pub fn register_query<Q, H>(&self, handler: Arc<H>) -> AppResult<HandlerId>
    where
        Q: Query,
        H: QueryHandler<Q> + 'static,
    {
        let binding = HandlerBinding::from_fn(type_name::<H>(), move |ctx, request| {
            let handler = handler.clone();

            async move {
                let q = request.into_inner::<Q>()?;
                let out = handler.handle(&ctx, q).await?;
                Ok(Response::new(out))
            }
        });

        insert_once(&self.requests, RequestKey::query::<Q>(), binding)
    }

    /// 追加通知处理器
    pub fn register_notification<N, H>(&self, handler: Arc<H>) -> HandlerId
    where
        N: Notification,
        H: NotificationHandler<N> + 'static,
    {
        let binding = HandlerBinding::from_fn(type_name::<H>(), move |ctx, request| {
            let handler = handler.clone();

            async move {
                let n = request.into_inner::<N>()?;
                handler.handle(&ctx, n).await
            }
        });
        let id = binding.id();
        let key = RequestKey::notification::<N>();

        debug!(
            request = key.name(),
            handler = binding.name(),
            %id,
            "notification handler registered"
        );
        self.notifications
            .entry(key)
            .or_default()
            .push(Arc::new(binding));

        id
    }

    /// 已注册的命令/查询名称列表（只读视图）
    pub fn registered_requests(&self) -> Vec<&'static str> {
        self.commands
            .iter()
            .map(|e| e.key().name())
            .chain(self.requests.iter().map(|e| e.key().name()))
            .collect()
    }

    /// 已注册的通知名称及其处理器数量
    pub fn registered_notifications(&self) -> Vec<(&'static str, usize)> {
        self.notifications
            .iter()
            .map(|e| (e.key().name(), e.value().len()))
            .collect()
    }
}

fn insert_once<O>(
    map: &DashMap<RequestKey, Arc<HandlerBinding<O>>>,
    key: RequestKey,
    binding: HandlerBinding<O>,
) -> AppResult<HandlerId> {
    match map.entry(key) {
        Entry::Occupied(_) => Err(AppError::AlreadyRegistered {
            request: key.name(),
            kind: key.kind(),
        }),
        Entry::Vacant(slot) => {
            let id = binding.id();
            debug!(
                request = key.name(),
                kind = %key.kind(),
                handler = binding.name(),
                %id,
                "handler registered"
            );
            slot.insert(Arc::new(binding));
            Ok(id)
        }
    }
}

impl HandlerRegistry for InMemoryHandlerRegistry {
    fn command_bindings(&self, key: &RequestKey) -> Vec<Arc<HandlerBinding<()>>> {
        self.commands
            .get(key)
            .map(|b| vec![b.value().clone()])
            .unwrap_or_default()
    }

    fn request_bindings(&self, key: &RequestKey) -> Vec<Arc<HandlerBinding<Response>>> {
        self.requests
            .get(key)
            .map(|b| vec![b.value().clone()])
            .unwrap_or_default()
    }

    fn notification_bindings(&self, key: &RequestKey) -> Vec<Arc<HandlerBinding<()>>> {
        self.notifications
            .get(key)
            .map(|list| list.value().clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AppContext;
    use crate::request::RequestEnvelope;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Get;

    impl Query for Get {
        const NAME: &'static str = "Get";
        type Output = usize;
    }

    struct GetHandler {
        counter: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl QueryHandler<Get> for GetHandler {
        async fn handle(&self, _ctx: &AppContext, _q: Get) -> AppResult<usize> {
            Ok(self.counter.fetch_add(1, Ordering::SeqCst) + 1)
        }
    }

    #[derive(Debug)]
    struct Touch;

    impl Command for Touch {
        const NAME: &'static str = "Touch";
    }

    struct TouchHandler;

    #[async_trait]
    impl CommandHandler<Touch> for TouchHandler {
        async fn handle(&self, _ctx: &AppContext, _cmd: Touch) -> AppResult<()> {
            Ok(())
        }
    }

    #[derive(Clone, Debug)]
    struct Touched;

    impl Notification for Touched {
        const NAME: &'static str = "Touched";
    }

    struct TouchedHandler;

    #[async_trait]
    impl NotificationHandler<Touched> for TouchedHandler {
        async fn handle(&self, _ctx: &AppContext, _n: Touched) -> AppResult<()> {
            Ok(())
        }
    }

    fn get_handler() -> Arc<GetHandler> {
        Arc::new(GetHandler {
            counter: Arc::new(AtomicUsize::new(0)),
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn registered_query_binding_runs_handler() {
        let registry = InMemoryHandlerRegistry::new();
        registry.register_query::<Get, _>(get_handler()).unwrap();

        let key = RequestKey::query::<Get>();
        let binding = registry.resolve_request(&key).unwrap();
        let out = binding
            .invoke(AppContext::default(), RequestEnvelope::new(key, Get))
            .await
            .unwrap();

        assert_eq!(out.into_inner::<usize>().unwrap(), 1);
        assert!(binding.name().contains("GetHandler"));
    }

    #[test]
    fn duplicate_registration_fails_fast() {
        let registry = InMemoryHandlerRegistry::new();
        registry.register_query::<Get, _>(get_handler()).unwrap();

        match registry.register_query::<Get, _>(get_handler()).unwrap_err() {
            AppError::AlreadyRegistered { request, kind } => {
                assert_eq!(request, "Get");
                assert_eq!(kind, crate::request::RequestKind::Query);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        registry
            .register_command::<Touch, _>(Arc::new(TouchHandler))
            .unwrap();
        assert!(
            registry
                .register_command::<Touch, _>(Arc::new(TouchHandler))
                .is_err()
        );
    }

    #[test]
    fn resolution_is_stable() {
        let registry = InMemoryHandlerRegistry::new();
        let id = registry.register_query::<Get, _>(get_handler()).unwrap();
        let key = RequestKey::query::<Get>();

        let first = registry.resolve_request(&key).unwrap();
        let second = registry.resolve_request(&key).unwrap();

        assert_eq!(first.id(), id);
        assert_eq!(first.id(), second.id());
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn notification_handlers_are_appended() {
        let registry = InMemoryHandlerRegistry::new();
        let key = RequestKey::notification::<Touched>();
        assert!(registry.resolve_all(&key).is_empty());

        let a = registry.register_notification::<Touched, _>(Arc::new(TouchedHandler));
        let b = registry.register_notification::<Touched, _>(Arc::new(TouchedHandler));

        let ids: Vec<_> = registry.resolve_all(&key).iter().map(|b| b.id()).collect();
        assert_eq!(ids, vec![a, b]);
        assert_eq!(registry.registered_notifications(), vec![("Touched", 2)]);
    }

    #[test]
    fn void_and_result_slots_are_separate() {
        let registry = InMemoryHandlerRegistry::new();
        registry
            .register_command::<Touch, _>(Arc::new(TouchHandler))
            .unwrap();

        let key = RequestKey::command::<Touch>();
        assert!(registry.resolve_command(&key).is_ok());
        assert!(matches!(
            registry.resolve_request(&key),
            Err(AppError::HandlerNotFound { .. })
        ));

        let mut names = registry.registered_requests();
        names.sort_unstable();
        assert_eq!(names, vec!["Touch"]);
    }
}
