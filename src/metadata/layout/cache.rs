//! Per-type memoization cells for layout results.
//!
//! Every layout answer is computed at most once per type and shared. The cell is a
//! small state machine guarded by one mutex:
//!
//! - `Vacant` - nothing computed yet
//! - `InProgress` - a thread is computing; the owning thread id is recorded so a
//!   re-entrant request from the same computation (a value type inlining itself
//!   through a field chain) is detected and reported as a cycle fault instead of
//!   recursing indefinitely or deadlocking
//! - `Ready` - the published, immutable result
//!
//! Other threads arriving while a computation is in progress block on a condvar and
//! share the single published result. A failed computation restores the previous
//! state; faults never poison the cell or other types' caches.
//!
//! Containment cycles split across threads (thread one computes A and needs B while
//! thread two computes B and needs A) are caught by a process-wide wait graph:
//! before blocking, a thread records which owner it is about to wait for, and a
//! registration that would close a waiter chain back onto itself is refused with
//! the same cycle fault the re-entrant path reports. Malformed inputs fail fast
//! instead of deadlocking.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, ThreadId};

use crate::{metadata::token::Token, Result};

/// One blocked thread: `waiter` is waiting for `owner` to finish the cell at `cell`.
struct WaitEdge {
    waiter: ThreadId,
    owner: ThreadId,
    cell: usize,
}

/// All currently blocked cross-cell waits in the process. Each thread has at most
/// one outgoing edge, and registrations that would close a cycle are refused, so
/// the graph stays acyclic and chains stay short.
static WAIT_EDGES: Mutex<Vec<WaitEdge>> = Mutex::new(Vec::new());

/// Register that `waiter` is about to block on the cell at `cell`, owned by `owner`.
///
/// Walks the owner's wait chain first; if it leads back to `waiter` the wait would
/// deadlock, and the registration is refused with [`crate::Error::LayoutCycle`].
fn begin_wait(cell: usize, waiter: ThreadId, owner: ThreadId, token: Token) -> Result<()> {
    let mut edges = WAIT_EDGES.lock().map_err(|_| crate::Error::LockError)?;

    let mut current = owner;
    loop {
        if current == waiter {
            return Err(crate::Error::LayoutCycle(token));
        }
        match edges.iter().find(|e| e.waiter == current).map(|e| e.owner) {
            Some(next) => current = next,
            None => break,
        }
    }

    edges.push(WaitEdge {
        waiter,
        owner,
        cell,
    });
    Ok(())
}

/// Drop `waiter`'s outgoing edge after its wait returned.
fn end_wait(waiter: ThreadId) {
    if let Ok(mut edges) = WAIT_EDGES.lock() {
        edges.retain(|e| e.waiter != waiter);
    }
}

/// Drop every edge pointing at the cell at `cell`; called by the owner while
/// publishing or restoring, before waiters are woken, so no stale edge survives
/// into the waiters' next decision.
fn clear_cell_waits(cell: usize) {
    if let Ok(mut edges) = WAIT_EDGES.lock() {
        edges.retain(|e| e.cell != cell);
    }
}

enum MemoState<T> {
    Vacant,
    InProgress {
        owner: ThreadId,
        prior: Option<Arc<T>>,
    },
    Ready(Arc<T>),
}

/// A per-type, per-operation memoization cell.
pub(crate) struct MemoCell<T> {
    state: Mutex<MemoState<T>>,
    ready: Condvar,
}

impl<T> MemoCell<T> {
    pub(crate) fn new() -> Self {
        MemoCell {
            state: Mutex::new(MemoState::Vacant),
            ready: Condvar::new(),
        }
    }

    /// Get the cached value, or compute it exactly once.
    ///
    /// `needs_recompute` decides whether an already-published value is deep enough
    /// for the current request; when it returns true the cell recomputes and the
    /// prior value is handed to `compute` for consistency checking. `compute` runs
    /// without the cell lock held, so it may recurse into other types' cells.
    ///
    /// # Errors
    /// Returns [`crate::Error::LayoutCycle`] if the calling thread re-enters a cell
    /// it is already computing, or if blocking on another thread's in-progress
    /// computation would close a cross-thread wait cycle;
    /// [`crate::Error::LockError`] on a poisoned cell; or whatever fault `compute`
    /// reports.
    pub(crate) fn get_or_compute<N, C>(
        &self,
        token: Token,
        needs_recompute: N,
        compute: C,
    ) -> Result<Arc<T>>
    where
        N: Fn(&T) -> bool,
        C: FnOnce(Option<&T>) -> Result<T>,
    {
        let me = thread::current().id();
        let cell_id = self as *const Self as usize;

        let prior = {
            let mut state = self.state.lock().map_err(|_| crate::Error::LockError)?;
            loop {
                match &*state {
                    MemoState::Ready(value) if !needs_recompute(value) => {
                        return Ok(value.clone());
                    }
                    MemoState::Ready(value) => {
                        let prior = Some(value.clone());
                        *state = MemoState::InProgress {
                            owner: me,
                            prior: prior.clone(),
                        };
                        break prior;
                    }
                    MemoState::Vacant => {
                        *state = MemoState::InProgress {
                            owner: me,
                            prior: None,
                        };
                        break None;
                    }
                    MemoState::InProgress { owner, .. } if *owner == me => {
                        return Err(crate::Error::LayoutCycle(token));
                    }
                    MemoState::InProgress { owner, .. } => {
                        begin_wait(cell_id, me, *owner, token)?;
                        let waited = self.ready.wait(state);
                        end_wait(me);
                        state = waited.map_err(|_| crate::Error::LockError)?;
                    }
                }
            }
        };

        // Lock released: the computation may recurse into other cells.
        let outcome = compute(prior.as_deref());

        let mut state = self.state.lock().map_err(|_| crate::Error::LockError)?;
        match outcome {
            Ok(value) => {
                let published = Arc::new(value);
                *state = MemoState::Ready(published.clone());
                clear_cell_waits(cell_id);
                self.ready.notify_all();
                Ok(published)
            }
            Err(fault) => {
                *state = match prior {
                    Some(previous) => MemoState::Ready(previous),
                    None => MemoState::Vacant,
                };
                clear_cell_waits(cell_id);
                self.ready.notify_all();
                Err(fault)
            }
        }
    }

    /// The published value, if any (no computation is triggered).
    pub(crate) fn get(&self) -> Option<Arc<T>> {
        match self.state.lock() {
            Ok(state) => match &*state {
                MemoState::Ready(value) => Some(value.clone()),
                _ => None,
            },
            Err(_) => None,
        }
    }
}

impl<T> Default for MemoCell<T> {
    fn default() -> Self {
        MemoCell::new()
    }
}

/// The memoization slot attached to every type.
///
/// One cell per independently memoizable operation. The cells share nothing; a
/// fault in one computation leaves the others untouched.
pub(crate) struct LayoutCache {
    pub(crate) instance: MemoCell<super::ComputedInstanceLayout>,
    pub(crate) statics: MemoCell<super::ComputedStaticLayout>,
    pub(crate) gc_pointers: MemoCell<bool>,
    pub(crate) shape: MemoCell<super::ShapeCharacteristics>,
    pub(crate) byref_like: MemoCell<bool>,
}

impl LayoutCache {
    pub(crate) fn new() -> Self {
        LayoutCache {
            instance: MemoCell::new(),
            statics: MemoCell::new(),
            gc_pointers: MemoCell::new(),
            shape: MemoCell::new(),
            byref_like: MemoCell::new(),
        }
    }
}

impl Default for LayoutCache {
    fn default() -> Self {
        LayoutCache::new()
    }
}
