/// 应用层命令（Command）
///
/// 表达“意图”的写操作请求，通常会修改领域状态。
/// - 不返回业务数据，仅表达执行结果（成功/失败）。
/// - 需要返回值（如新建实体的 ID）时使用 [`CommandWithResult`]。
/// - 建议保持语义化的“动宾结构”命名，如 `CreateUser`、`CloseOrder`。
///
/// 关联常量：
/// - `NAME`：命令的稳定名称，用于日志、追踪与错误信息。避免依赖 `type_name::<T>()`。
pub trait Command: Send + Sync + 'static {
    /// 命令的稳定名称（建议常量字符串，不随重构变化）
    const NAME: &'static str;
}

/// 带返回值的命令
///
/// 与 [`Command`] 属于不同的请求形态：两者在注册表中占用不同的槽位，
/// 也分别走“有返回值”与“无返回值”两条行为链。
pub trait CommandWithResult: Send + Sync + 'static {
    const NAME: &'static str;

    /// 命令执行后返回给调用方的结果
    type Output: Send + 'static;
}
