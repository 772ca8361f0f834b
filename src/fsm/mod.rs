//! Function-pointer finite state machine engine.
//!
//! Classic embedded FSM pattern ported to Rust:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  StateTable                                                   │
//! │  ┌──────────────┬───────────┬──────────┬───────────────────┐  │
//! │  │ StateId      │ on_enter  │ on_exit  │ on_update         │  │
//! │  ├──────────────┼───────────┼──────────┼───────────────────┤  │
//! │  │ Idle         │ fn(ctx)   │ -        │ fn(ctx)->Option<> │  │
//! │  │ PoweringUp   │ fn(ctx)   │ -        │ fn(ctx)->Option<> │  │
//! │  │ PoweringDown │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │  │
//! │  └──────────────┴───────────┴──────────┴───────────────────┘  │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** state.
//! If it returns `Some(next_id)`, the engine runs `on_exit` for the
//! current state, then `on_enter` for the next, and updates the
//! current pointer.  All functions receive `&mut FsmContext` which
//! holds power state, timing, config, and one-shot commands.

pub mod context;
pub mod states;

use context::FsmContext;
use log::info;
use serde::Serialize;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Power transition states.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum StateId {
    Idle = 0,
    PoweringUp = 1,
    PoweringDown = 2,
}

impl StateId {
    /// Total number of states — used to size the table array.
    pub const COUNT: usize = 3;

    /// A press has been issued and the stove is still settling.
    pub fn is_transitioning(self) -> bool {
        self != Self::Idle
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
/// These run exactly once on each state transition.
pub type StateActionFn = fn(&mut FsmContext);

/// Signature for the per-tick update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn = fn(&mut FsmContext) -> Option<StateId>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single FSM state.
/// Stored in a fixed-size array — no heap, no `dyn`.
pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The finite state machine engine.
///
/// Owns the state table (array of [`StateDescriptor`]).  The mutable
/// [`FsmContext`] is owned by the caller and threaded through every
/// handler call.
pub struct Fsm {
    /// Fixed-size table indexed by `StateId as usize`.
    table: [StateDescriptor; StateId::COUNT],
    /// Index of the currently active state.
    current: usize,
}

impl Fsm {
    /// Construct a new FSM with the given state table, starting in `initial`.
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        Self {
            table,
            current: initial as usize,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    /// Call once after construction, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut FsmContext) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance the FSM by one tick.
    ///
    /// 1. Call `on_update` for the current state.
    /// 2. If it returns `Some(next)`, execute the transition:
    ///    `on_exit(current)` → update pointer → `on_enter(next)`.
    pub fn tick(&mut self, ctx: &mut FsmContext) {
        let next = (self.table[self.current].on_update)(ctx);

        if let Some(next_id) = next {
            self.transition(next_id, ctx);
        }
    }

    /// The current state's identity.
    pub fn current_state(&self) -> StateId {
        self.table[self.current].id
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: StateId, ctx: &mut FsmContext) {
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::context::FsmContext;
    use super::*;
    use crate::config::StoveConfig;
    use proptest::prelude::*;

    fn arb_step() -> impl Strategy<Value = (bool, u64)> {
        (
            any::<bool>(),        // desired power request
            1u64..=120_000,       // ms until next tick
        )
    }

    proptest! {
        #[test]
        fn desired_and_actual_only_diverge_while_transitioning(
            steps in proptest::collection::vec(arb_step(), 1..200)
        ) {
            let mut fsm = Fsm::new(states::build_state_table(), StateId::Idle);
            let mut ctx = FsmContext::new(StoveConfig::default(), 0);
            fsm.start(&mut ctx);

            for (desired, dt) in steps {
                // External requests are only accepted while idle.
                if fsm.current_state() == StateId::Idle {
                    ctx.desired_power = desired;
                }
                let before = ctx.actual_power;
                let state_before = fsm.current_state();

                ctx.now_ms += dt;
                fsm.tick(&mut ctx);
                let cmds = ctx.commands.take();

                if ctx.actual_power != before {
                    prop_assert_eq!(state_before, StateId::Idle);
                    prop_assert!(cmds.press_power);
                }
                if fsm.current_state() == StateId::Idle {
                    prop_assert_eq!(ctx.desired_power, ctx.actual_power);
                }
            }
        }

        #[test]
        fn press_count_matches_transitions(
            steps in proptest::collection::vec(arb_step(), 1..200)
        ) {
            let mut fsm = Fsm::new(states::build_state_table(), StateId::Idle);
            let mut ctx = FsmContext::new(StoveConfig::default(), 0);
            fsm.start(&mut ctx);

            let mut presses = 0u32;
            let mut entries = 0u32;
            for (desired, dt) in steps {
                if fsm.current_state() == StateId::Idle {
                    ctx.desired_power = desired;
                }
                let prev = fsm.current_state();
                ctx.now_ms += dt;
                fsm.tick(&mut ctx);
                if ctx.commands.take().press_power {
                    presses += 1;
                }
                if prev == StateId::Idle && fsm.current_state().is_transitioning() {
                    entries += 1;
                }
            }
            prop_assert_eq!(presses, entries);
        }
    }
}
