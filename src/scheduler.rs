// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The cooperative scheduling contract. An import is a name bound to a
//! [`HostFunction`]; a debugger hook is a plain closure
//! registered on an instance. Neither type depends on a concrete async
//! runtime — both return a [`LocalBoxFuture`], so any executor capable of
//! polling a `Future` (a hand-rolled loop, `futures::executor::block_on`, a
//! single-threaded `tokio`) can drive an invocation to completion without
//! this crate bundling or assuming one.

use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use async_trait::async_trait;

use crate::value::Value;

/// A `!Send` boxed future. The state threaded through a suspension
/// (instance handles, frame references) is `Rc`/`RefCell`-based: this engine
/// is single-threaded cooperative and never claims `Send`.
pub type LocalBoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// A host import. Invoked with arguments already coerced to the import's
/// declared parameter types; may resolve immediately or suspend for an
/// arbitrary number of poll cycles before the engine continues. An `Err`
/// here surfaces to the caller as `TrapKind::ImportError`, wrapping whatever
/// the host raised or rejected with.
#[async_trait(?Send)]
pub trait HostFunction {
    async fn call(&self, args: &[Value]) -> anyhow::Result<Option<Value>>;
}

/// A debugger hook invoked at each armed location, and at every location
/// while single-step is on. Takes no arguments — it is expected to capture
/// the owning [`crate::instance::Instance`] by value
/// and call `stack_trace()` on it if it wants context, rather than being
/// handed one as a parameter. An `Err` return surfaces as
/// `TrapKind::DebuggerAbort`.
pub type DebuggerHook = Rc<dyn Fn() -> LocalBoxFuture<'static, anyhow::Result<()>>>;
