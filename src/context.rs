// cotorra is a multi-repository file broadcast tool
// Copyright (C) 2025  Javier Lancha Vázquez <javier.lancha@gmail.com>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use thiserror::Error;

/// Why a context stopped being live.
///
/// These errors are surfaced verbatim through every wrapper: code that
/// aggregates or rewraps failures must check [`is_context_error`] first and
/// pass the original through, so that callers can tell a user interrupt from
/// a real failure. They never trigger a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("operation canceled")]
    Canceled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// A cancellation and deadline handle threaded through every blocking call.
///
/// Deriving a child context shares the parents' cancel flags, so canceling
/// the root stops the whole pipeline. Blocking loops call [`Context::check`]
/// at each suspension point (channel waits, subprocess spawns, HTTP calls,
/// backoff sleeps).
#[derive(Clone, Default)]
pub struct Context {
    cancel_flags: Vec<Arc<AtomicBool>>,
    deadline: Option<Instant>,
}

/// Flips the cancel flag of the context it was created with.
#[derive(Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }
}

impl Context {
    /// A context that is never canceled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context with a fresh cancel flag and the handle that flips it.
    pub fn cancellable() -> (Self, CancelHandle) {
        let flag = Arc::new(AtomicBool::new(false));
        let ctx = Self {
            cancel_flags: vec![flag.clone()],
            deadline: None,
        };
        (ctx, CancelHandle { flag })
    }

    /// Derives a child that shares this context's cancel flags and carries
    /// the earlier of the two deadlines.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let new_deadline = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) => Some(existing.min(new_deadline)),
            None => Some(new_deadline),
        };
        Self {
            cancel_flags: self.cancel_flags.clone(),
            deadline,
        }
    }

    /// A context with cancellation detached from this one, bounded only by
    /// `timeout`. Used to flush metrics after the run context has been
    /// canceled, so the final counters can still be recorded.
    pub fn detached(timeout: Duration) -> Self {
        Self {
            cancel_flags: Vec::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn err(&self) -> Option<ContextError> {
        for flag in &self.cancel_flags {
            if flag.load(Ordering::Acquire) {
                return Some(ContextError::Canceled);
            }
        }
        if let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            return Some(ContextError::DeadlineExceeded);
        }
        None
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Returns the context error if the context is done, so callers can
    /// write `ctx.check()?` at suspension points.
    pub fn check(&self) -> Result<(), ContextError> {
        match self.err() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Sleeps for `duration`, waking early (with the context error) if the
    /// context is canceled or its deadline passes.
    pub fn sleep(&self, duration: Duration) -> Result<(), ContextError> {
        const SLICE: Duration = Duration::from_millis(25);

        let wake = Instant::now() + duration;
        loop {
            self.check()?;
            let now = Instant::now();
            if now >= wake {
                return Ok(());
            }
            std::thread::sleep(SLICE.min(wake - now));
        }
    }
}

/// Returns the [`ContextError`] buried inside an error chain, if any.
pub fn find_context_error(err: &anyhow::Error) -> Option<ContextError> {
    for cause in err.chain() {
        if let Some(ctx_err) = cause.downcast_ref::<ContextError>() {
            return Some(*ctx_err);
        }
    }
    None
}

pub fn is_context_error(err: &anyhow::Error) -> bool {
    find_context_error(err).is_some()
}
