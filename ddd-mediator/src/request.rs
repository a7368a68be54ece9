//! 请求分类与类型擦除载体
//!
//! - `RequestKind`：命令 / 带返回值命令 / 查询 / 通知四种形态；
//! - `RequestKey`：分发键，由形态与具体类型的 `TypeId` 组成；
//! - `RequestEnvelope`：行为链中流转的类型擦除请求；
//! - `Response`：有返回值行为链中流转的类型擦除结果。
//!
use crate::{
    command::{Command, CommandWithResult},
    error::{AppError, AppResult},
    notification::Notification,
    query::Query,
};
use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Command,
    CommandWithResult,
    Query,
    Notification,
}

impl RequestKind {
    /// 是否走有返回值的行为链
    pub fn returns_value(self) -> bool {
        matches!(self, Self::CommandWithResult | Self::Query)
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Command => "command",
            Self::CommandWithResult => "command_with_result",
            Self::Query => "query",
            Self::Notification => "notification",
        };
        f.write_str(s)
    }
}

/// 分发键
///
/// 相等性只由 `(kind, type_id)` 决定，`name` 仅用于日志与错误信息。
/// 同一 Rust 类型即便同时实现了 `Command` 与 `CommandWithResult`，也会得到两个不同的键。
#[derive(Clone, Copy, Debug)]
pub struct RequestKey {
    kind: RequestKind,
    type_id: TypeId,
    name: &'static str,
}

impl RequestKey {
    pub fn command<C: Command>() -> Self {
        Self {
            kind: RequestKind::Command,
            type_id: TypeId::of::<C>(),
            name: C::NAME,
        }
    }

    pub fn command_with_result<C: CommandWithResult>() -> Self {
        Self {
            kind: RequestKind::CommandWithResult,
            type_id: TypeId::of::<C>(),
            name: C::NAME,
        }
    }

    pub fn query<Q: Query>() -> Self {
        Self {
            kind: RequestKind::Query,
            type_id: TypeId::of::<Q>(),
            name: Q::NAME,
        }
    }

    pub fn notification<N: Notification>() -> Self {
        Self {
            kind: RequestKind::Notification,
            type_id: TypeId::of::<N>(),
            name: N::NAME,
        }
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for RequestKey {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.type_id == other.type_id
    }
}

impl Eq for RequestKey {}

impl Hash for RequestKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.type_id.hash(state);
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.name)
    }
}

/// 类型擦除后的请求
///
/// 行为（Behavior）面向请求形态注册，而非具体请求类型，
/// 因此只能看到擦除后的载体；需要时可通过 [`downcast_ref`](Self::downcast_ref) 还原。
pub struct RequestEnvelope {
    key: RequestKey,
    payload: Box<dyn Any + Send + Sync>,
}

impl RequestEnvelope {
    pub fn new<T: Send + Sync + 'static>(key: RequestKey, payload: T) -> Self {
        Self {
            key,
            payload: Box::new(payload),
        }
    }

    pub fn key(&self) -> &RequestKey {
        &self.key
    }

    pub fn kind(&self) -> RequestKind {
        self.key.kind
    }

    pub fn name(&self) -> &'static str {
        self.key.name
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.payload.downcast_mut::<T>()
    }

    /// 取回具体请求；键与注册闭包共享同一泛型，正常情况下不会失败
    pub fn into_inner<T: 'static>(self) -> AppResult<T> {
        let name = self.key.name;
        self.payload
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| AppError::TypeMismatch {
                expected: type_name::<T>(),
                found: name,
            })
    }
}

impl fmt::Debug for RequestEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestEnvelope")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// 类型擦除后的结果，用于有返回值的行为链
///
/// 短路的行为（如缓存命中）需要用请求声明的结果类型构造 `Response`，
/// 否则调用方会收到 [`AppError::TypeMismatch`]。
pub struct Response {
    type_name: &'static str,
    value: Box<dyn Any + Send>,
}

impl Response {
    pub fn new<T: Send + 'static>(value: T) -> Self {
        Self {
            type_name: type_name::<T>(),
            value: Box::new(value),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.value.is::<T>()
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    pub fn into_inner<T: 'static>(self) -> AppResult<T> {
        let found = self.type_name;
        self.value
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| AppError::TypeMismatch {
                expected: type_name::<T>(),
                found,
            })
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Ping(u32);

    impl Command for Ping {
        const NAME: &'static str = "Ping";
    }

    impl CommandWithResult for Ping {
        const NAME: &'static str = "PingWithResult";
        type Output = u32;
    }

    #[test]
    fn same_type_different_shape_gives_distinct_keys() {
        let void = RequestKey::command::<Ping>();
        let with_result = RequestKey::command_with_result::<Ping>();

        assert_ne!(void, with_result);
        assert_eq!(void, RequestKey::command::<Ping>());
        assert!(!void.kind().returns_value());
        assert!(with_result.kind().returns_value());
    }

    #[test]
    fn envelope_downcasts_to_original_request() {
        let env = RequestEnvelope::new(RequestKey::command::<Ping>(), Ping(7));
        assert_eq!(env.name(), "Ping");
        assert_eq!(env.downcast_ref::<Ping>(), Some(&Ping(7)));
        assert!(env.downcast_ref::<String>().is_none());
        assert_eq!(env.into_inner::<Ping>().unwrap(), Ping(7));
    }

    #[test]
    fn response_reports_type_mismatch() {
        let resp = Response::new(String::from("hello"));
        assert!(resp.is::<String>());

        match resp.into_inner::<u32>().unwrap_err() {
            AppError::TypeMismatch { expected, found } => {
                assert_eq!(expected, "u32");
                assert!(found.contains("String"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
