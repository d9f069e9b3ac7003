//! Generic directed-graph state machine engine.
//!
//! A flow manager owns a [`StateGraph`] parameterized over its state enum.
//! The graph enforces that a transition into a state is only legal from that
//! state's permitted predecessors (or from nothing, for a start state),
//! assigns the new state, and notifies observers. The domain logic for each
//! state lives in the manager; the manager may auto-advance by computing the
//! next state and transitioning again, or park the machine in a state that
//! waits for external input.
//!
//! Illegal transition requests are integrity violations: they indicate a
//! caller bug, leave the current state untouched, and surface as
//! [`VaultError::IllegalTransition`] so the caller fails closed instead of
//! proceeding with a corrupted flow.

use std::collections::{HashMap, HashSet};
use std::fmt::{Debug, Display};
use std::hash::Hash;

use tracing::{debug, warn};

use crate::error::{VaultError, VaultResult};

/// Bound for types usable as state tags: small, comparable, printable.
pub trait GraphState: Copy + Eq + Hash + Debug + Display + 'static {}

impl<S: Copy + Eq + Hash + Debug + Display + 'static> GraphState for S {}

/// Observer notified of state machine activity.
///
/// `entered` fires synchronously as part of every state assignment,
/// including the start state. `leaving` fires immediately before an
/// auto-advance transition; it does not fire when the machine parks.
pub trait StateGraphObserver<S>: Send {
    /// The machine is about to auto-advance out of `state`.
    fn leaving(&mut self, state: S);

    /// The machine entered `state`.
    fn entered(&mut self, state: S);
}

/// Mapping from target state to the set of states it may be entered from.
#[derive(Debug, Clone, Default)]
pub struct TransitionTable<S: GraphState> {
    permitted: HashMap<S, HashSet<S>>,
}

impl<S: GraphState> TransitionTable<S> {
    /// Creates an empty table. A state with no entry permits no predecessors.
    #[must_use]
    pub fn new() -> Self {
        Self {
            permitted: HashMap::new(),
        }
    }

    /// Declares the states from which `target` may be entered.
    ///
    /// Replaces any previously declared predecessor set for `target`.
    pub fn permit(&mut self, target: S, predecessors: impl IntoIterator<Item = S>) -> &mut Self {
        self.permitted
            .insert(target, predecessors.into_iter().collect());
        self
    }

    /// Returns whether entering `target` from `from` is legal.
    #[must_use]
    pub fn permits(&self, from: S, target: S) -> bool {
        self.permitted
            .get(&target)
            .is_some_and(|predecessors| predecessors.contains(&from))
    }
}

/// A constrained state machine instance.
pub struct StateGraph<S: GraphState> {
    table: TransitionTable<S>,
    start_states: Vec<S>,
    current: Option<S>,
    observers: Vec<Box<dyn StateGraphObserver<S>>>,
}

impl<S: GraphState> StateGraph<S> {
    /// Creates a machine with the given transition table and start states.
    ///
    /// The machine holds no state until [`StateGraph::start`] is called.
    #[must_use]
    pub const fn new(table: TransitionTable<S>, start_states: Vec<S>) -> Self {
        Self {
            table,
            start_states,
            current: None,
            observers: Vec::new(),
        }
    }

    /// Registers an observer for transition notifications.
    pub fn add_observer(&mut self, observer: Box<dyn StateGraphObserver<S>>) {
        self.observers.push(observer);
    }

    /// Replaces the transition table and start states.
    ///
    /// Used when a machine's context changes; the current state is cleared
    /// and the machine must be started again.
    pub fn reconfigure(&mut self, table: TransitionTable<S>, start_states: Vec<S>) {
        self.table = table;
        self.start_states = start_states;
        self.current = None;
    }

    /// The machine's current state, if it has been started.
    #[must_use]
    pub const fn current(&self) -> Option<S> {
        self.current
    }

    /// Resets the machine and enters its first start state.
    ///
    /// Emits `entered` for the start state.
    ///
    /// # Panics
    ///
    /// Panics if the machine was constructed with no start states.
    pub fn start(&mut self) -> S {
        let start = self.start_states[0];
        self.current = None;
        self.assign(start);
        start
    }

    /// Transitions into `next` if the active table permits it.
    ///
    /// A transition is legal iff `next` is a start state or the current
    /// state is in `next`'s permitted predecessor set. Emits `entered` on
    /// success.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::IllegalTransition`] and leaves the state
    /// unchanged when the transition is not permitted.
    pub fn transition_to(&mut self, next: S) -> VaultResult<S> {
        let legal = self.start_states.contains(&next)
            || self
                .current
                .is_some_and(|current| self.table.permits(current, next));
        if !legal {
            let from = self
                .current
                .map_or_else(|| "<unstarted>".to_owned(), |current| current.to_string());
            warn!(%next, %from, "illegal transition request");
            return Err(VaultError::IllegalTransition {
                from,
                to: next.to_string(),
            });
        }
        self.assign(next);
        Ok(next)
    }

    /// Emits `leaving` for the current state.
    ///
    /// Managers call this immediately before an auto-advance transition.
    pub fn announce_leaving(&mut self) {
        if let Some(current) = self.current {
            for observer in &mut self.observers {
                observer.leaving(current);
            }
        }
    }

    fn assign(&mut self, state: S) {
        debug!(%state, "entering state");
        self.current = Some(state);
        for observer in &mut self.observers {
            observer.entered(state);
        }
    }
}
