//! 进程内中介者（ddd-mediator）
//!
//! 面向 DDD/CQRS 应用层的请求分发引擎：
//! - 命令（`command`）与查询（`query`）各自只绑定一个处理器；
//! - 通知（`notification`）可绑定零到多个处理器，失败被逐个收集后聚合返回；
//! - 行为链（`pipeline`）以洋葱模型包裹每一次分发，承载日志、校验、事务、重试等横切逻辑；
//! - 处理器注册表（`registry`）作为注入接口，`InMemoryHandlerRegistry` 为默认实现。
//!
//! 典型用法：
//! 1. 定义请求类型并实现 `Command` / `CommandWithResult` / `Query` / `Notification`；
//! 2. 实现对应的处理器 trait 并注册到 `InMemoryHandlerRegistry`；
//! 3. 通过 `Mediator::builder()` 装配注册表与行为链；
//! 4. 调用 `send` / `send_with_result` / `query` / `publish`。
//!
pub mod command;
pub mod command_handler;
pub mod context;
pub mod error;
pub mod inmemory_registry;
pub mod mediator;
pub mod notification;
pub mod notification_handler;
pub mod pipeline;
pub mod query;
pub mod query_handler;
pub mod registry;
pub mod request;

pub use inmemory_registry::InMemoryHandlerRegistry;
pub use mediator::{Mediator, MediatorConfig, PublishStrategy};
