use crate::{
    command::{Command, CommandWithResult},
    context::AppContext,
    error::AppResult,
};
use async_trait::async_trait;

#[async_trait]
pub trait CommandHandler<C>: Send + Sync
where
    C: Command,
{
    async fn handle(&self, ctx: &AppContext, cmd: C) -> AppResult<()>;
}

#[async_trait]
pub trait CommandWithResultHandler<C>: Send + Sync
where
    C: CommandWithResult,
{
    async fn handle(&self, ctx: &AppContext, cmd: C) -> AppResult<C::Output>;
}
