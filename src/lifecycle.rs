//! The `{open, close, isOpen}` capability shared by every layer the
//! composition root drives (C2–C6, and optionally a REST surface).
//!
//! Per the design notes, heterogeneous components are not modeled with a
//! class hierarchy: each is a value implementing this one trait, and the
//! orchestration root holds them as an ordered list (see
//! [`crate::atomix::Atomix`]) and drives them in sequence.

use async_trait::async_trait;

use crate::error::AtomixResult;

#[async_trait]
pub trait Lifecycle: Send + Sync {
    async fn open(&self) -> AtomixResult<()>;
    async fn close(&self) -> AtomixResult<()>;
    fn is_open(&self) -> bool;

    /// A short name used in tracing spans and error messages.
    fn name(&self) -> &str;
}
