//! 分发入口：渲染、构建任务、入队并等待结果，聚合失败信息。
//!
//! Dispatcher surface. Implementation is split into submodules under
//! `src/dispatcher/`.

pub mod builder;
pub mod config;
mod core;
mod render;

pub use builder::DispatcherBuilder;
pub use config::DispatchConfig;
pub use self::core::Dispatcher;
pub use render::{DispatchTarget, Renderer, SegmentRenderer};
