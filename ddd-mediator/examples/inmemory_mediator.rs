use async_trait::async_trait;
use ddd_mediator::command::{Command, CommandWithResult};
use ddd_mediator::command_handler::{CommandHandler, CommandWithResultHandler};
use ddd_mediator::context::AppContext;
use ddd_mediator::error::{AppError, AppResult};
use ddd_mediator::notification::Notification;
use ddd_mediator::notification_handler::NotificationHandler;
use ddd_mediator::pipeline::{Behavior, Next, Pipeline};
use ddd_mediator::query::Query;
use ddd_mediator::query_handler::QueryHandler;
use ddd_mediator::request::{RequestEnvelope, Response};
use ddd_mediator::{InMemoryHandlerRegistry, Mediator};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

#[derive(Debug)]
struct CreateUser {
    name: String,
}

impl CommandWithResult for CreateUser {
    const NAME: &'static str = "CreateUser";
    type Output = u32;
}

struct CreateUserHandler;

#[async_trait]
impl CommandWithResultHandler<CreateUser> for CreateUserHandler {
    async fn handle(&self, _ctx: &AppContext, cmd: CreateUser) -> AppResult<u32> {
        info!(name = %cmd.name, "user created");
        Ok(42)
    }
}

#[derive(Debug)]
struct DeleteUser {
    id: u32,
}

impl Command for DeleteUser {
    const NAME: &'static str = "DeleteUser";
}

struct DeleteUserHandler;

#[async_trait]
impl CommandHandler<DeleteUser> for DeleteUserHandler {
    async fn handle(&self, ctx: &AppContext, cmd: DeleteUser) -> AppResult<()> {
        ctx.ensure_active()?;
        info!(id = cmd.id, "user deleted");
        Ok(())
    }
}

#[derive(Debug)]
struct GetUserName {
    id: u32,
}

impl Query for GetUserName {
    const NAME: &'static str = "GetUserName";
    type Output = Option<String>;
}

struct GetUserNameHandler;

#[async_trait]
impl QueryHandler<GetUserName> for GetUserNameHandler {
    async fn handle(&self, _ctx: &AppContext, q: GetUserName) -> AppResult<Option<String>> {
        Ok((q.id == 42).then(|| "Alice".to_string()))
    }
}

#[derive(Clone, Debug)]
struct UserDeleted {
    id: u32,
}

impl Notification for UserDeleted {
    const NAME: &'static str = "UserDeleted";
}

struct SendFarewellMail;

#[async_trait]
impl NotificationHandler<UserDeleted> for SendFarewellMail {
    async fn handle(&self, _ctx: &AppContext, n: UserDeleted) -> AppResult<()> {
        info!(id = n.id, "farewell mail sent");
        Ok(())
    }
}

struct SyncSearchIndex;

#[async_trait]
impl NotificationHandler<UserDeleted> for SyncSearchIndex {
    async fn handle(&self, _ctx: &AppContext, _n: UserDeleted) -> AppResult<()> {
        Err(AppError::Infra("search index offline".into()))
    }
}

/// 计时行为：包裹所有带返回值的请求
struct Timing;

#[async_trait]
impl Behavior<Response> for Timing {
    async fn handle(
        &self,
        ctx: AppContext,
        request: RequestEnvelope,
        next: Next<Response>,
    ) -> AppResult<Response> {
        let name = request.name();
        let started = Instant::now();
        let out = next(ctx, request).await;
        info!(
            request = name,
            elapsed_us = started.elapsed().as_micros() as u64,
            "handled"
        );
        out
    }
}

/// 校验行为：拒绝非法的删除请求
struct RejectZeroId;

#[async_trait]
impl Behavior<()> for RejectZeroId {
    async fn handle(
        &self,
        ctx: AppContext,
        request: RequestEnvelope,
        next: Next<()>,
    ) -> AppResult<()> {
        if let Some(DeleteUser { id: 0 }) = request.downcast_ref::<DeleteUser>() {
            return Err(AppError::Validation("id must not be zero".into()));
        }
        next(ctx, request).await
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ddd_mediator=debug".into()),
        )
        .init();

    let registry = Arc::new(InMemoryHandlerRegistry::new());
    registry.register_command_with_result::<CreateUser, _>(Arc::new(CreateUserHandler))?;
    registry.register_command::<DeleteUser, _>(Arc::new(DeleteUserHandler))?;
    registry.register_query::<GetUserName, _>(Arc::new(GetUserNameHandler))?;
    registry.register_notification::<UserDeleted, _>(Arc::new(SendFarewellMail));
    registry.register_notification::<UserDeleted, _>(Arc::new(SyncSearchIndex));

    let mediator = Mediator::builder()
        .registry(registry)
        .request_behaviors(Pipeline::new(vec![Arc::new(Timing)]))
        .void_behaviors(Pipeline::new(vec![Arc::new(RejectZeroId)]))
        .build();

    let ctx = AppContext::builder()
        .correlation_id("cor-1".into())
        .actor_type("user".into())
        .actor_id("u-1".into())
        .idempotency_key("idem-1".into())
        .build();

    let id = mediator
        .send_with_result(
            ctx.clone(),
            CreateUser {
                name: "Alice".into(),
            },
        )
        .await?;
    let name = mediator.query(ctx.clone(), GetUserName { id }).await?;
    info!(id, ?name, "user loaded");

    // 校验行为拦截 -> Validation 错误，处理器不会执行
    if let Err(AppError::Validation(reason)) =
        mediator.send(ctx.clone(), DeleteUser { id: 0 }).await
    {
        eprintln!("rejected as expected: {reason}");
    }

    mediator.send(ctx.clone(), DeleteUser { id }).await?;

    // 其中一个订阅者失败：其余订阅者照常执行，失败被聚合返回
    if let Err(err) = mediator.publish(ctx.clone(), UserDeleted { id }).await {
        for failure in err.handler_failures() {
            eprintln!("subscriber failed: {failure}");
        }
    }

    // 未注册的查询 -> HandlerNotFound，行为链不会被触发
    #[derive(Debug)]
    struct CountUsers;

    impl Query for CountUsers {
        const NAME: &'static str = "CountUsers";
        type Output = usize;
    }

    if let Err(AppError::HandlerNotFound { request, .. }) = mediator.query(ctx, CountUsers).await
    {
        eprintln!("HandlerNotFound as expected for query: {request}");
    }

    Ok(())
}
