//! Concrete state handler functions and table builder.
//!
//! Each state is defined by three plain `fn` pointers, with no closures,
//! dynamic dispatch or heap.  This is the classic embedded C FSM pattern
//! expressed in safe Rust.
//!
//! ```text
//!          [desired ∧ ¬actual]               [desired ∧ ¬actual]
//!   IDLE ───────────────────▶ POWERING_UP      (press, actual := true,
//!    ▲  ▲                          │            persist, "Turning On")
//!    │  └──[elapsed > on settle]───┘  "On"
//!    │
//!    │  [¬desired ∧ actual]
//!    ├───────────────────────▶ POWERING_DOWN    (press, actual := false,
//!    │                             │            "Turning Off")
//!    └──[elapsed > off settle]─────┘  persist, "Off"
//! ```
//!
//! The stove itself gives no feedback.  Each transition holds for the
//! stove's own boot or burn-down time before another press is allowed.

use super::context::{FsmContext, StoveStatus};
use super::{StateDescriptor, StateId};
use log::info;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0 — Idle
        StateDescriptor {
            id: StateId::Idle,
            name: "Idle",
            on_enter: Some(idle_enter),
            on_exit: None,
            on_update: idle_update,
        },
        // Index 1 — PoweringUp
        StateDescriptor {
            id: StateId::PoweringUp,
            name: "PoweringUp",
            on_enter: Some(powering_up_enter),
            on_exit: None,
            on_update: powering_up_update,
        },
        // Index 2 — PoweringDown
        StateDescriptor {
            id: StateId::PoweringDown,
            name: "PoweringDown",
            on_enter: Some(powering_down_enter),
            on_exit: Some(powering_down_exit),
            on_update: powering_down_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE state
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter(ctx: &mut FsmContext) {
    ctx.status = StoveStatus::settled(ctx.actual_power);
    info!("IDLE: stove {}", ctx.status);
}

fn idle_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.maintenance {
        return None;
    }

    match (ctx.desired_power, ctx.actual_power) {
        (true, false) => Some(StateId::PoweringUp),
        (false, true) => Some(StateId::PoweringDown),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  POWERING_UP state — stove ignition and flame establishment
// ═══════════════════════════════════════════════════════════════════════════

fn powering_up_enter(ctx: &mut FsmContext) {
    ctx.begin_transition(ctx.config.power_on_settle_ms());
    ctx.actual_power = true;
    ctx.commands.persist_power = true;
    ctx.status = StoveStatus::TurningOn;
    info!(
        "POWERING_UP: power pressed, holding for {}s",
        ctx.config.power_on_settle_secs
    );
}

fn powering_up_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.transition_settled() {
        return Some(StateId::Idle);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  POWERING_DOWN state — burn-down and fan run-on
// ═══════════════════════════════════════════════════════════════════════════

fn powering_down_enter(ctx: &mut FsmContext) {
    ctx.begin_transition(ctx.config.power_off_settle_ms());
    ctx.actual_power = false;
    ctx.status = StoveStatus::TurningOff;
    info!(
        "POWERING_DOWN: power pressed, holding for {}s",
        ctx.config.power_off_settle_secs
    );
}

fn powering_down_exit(ctx: &mut FsmContext) {
    // The off state is only committed once the stove has burned down.
    ctx.commands.persist_power = true;
}

fn powering_down_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.transition_settled() {
        return Some(StateId::Idle);
    }
    None
}
