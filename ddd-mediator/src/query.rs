/// 应用层查询（Query）
///
/// 表达只读意图，不改变领域状态，总是返回结果。
/// - 与 [`Command`](crate::command::Command) 相对，`Query` 应避免副作用；
/// - 可按 CQRS 将写/读分离，查询可直连读模型或投影存储。
pub trait Query: Send + Sync + 'static {
    /// 查询的稳定名称（建议常量字符串，不随重构变化）
    const NAME: &'static str;

    /// 查询结果（读模型/DTO）
    type Output: Send + 'static;
}
