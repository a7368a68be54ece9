/// 通知（Notification）
///
/// 已发生的事实，广播给零到多个处理器，无返回值。
/// 每个处理器拿到一份独立的副本，因此要求 `Clone`。
pub trait Notification: Clone + Send + Sync + 'static {
    const NAME: &'static str;
}
