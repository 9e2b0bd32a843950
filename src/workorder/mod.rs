//! Workorder lifecycle engine for river and waterway field maintenance.
//!
//! ## Overview
//!
//! A workorder is raised either by an AI vision alarm or by a human
//! patroller, routed through dispatch, field processing, multi-stage review,
//! and confirmation. Every transition is permission-gated by role, and
//! orders stuck awaiting reporter confirmation are forcibly resolved by a
//! periodic escalation sweep acting on behalf of the area supervisor.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐   HTTP   ┌──────────────────────────────────────────────────┐
//! │  Client  │ ───────> │  server.rs  (axum Router, graceful shutdown)     │
//! │ (mobile/ │ <─────── │    └─ api.rs  (route handlers, AppState)         │
//! │   web)   │          │         │                                        │
//! └──────────┘          │         │ WorkOrderEngine::apply_action()        │
//!                       │         v                                        │
//!                       │  engine.rs  (load → gate → machine → CAS write)  │
//!                       │     │          │           │                     │
//!                       │     │          │           └ machine.rs          │
//!                       │     │          └ permissions.rs (+ roster.rs)    │
//!                       │     v                                            │
//!                       │  store.rs   (DbHandle, SQLite, version CAS)      │
//!                       │                                                  │
//!                       │  escalation.rs  (periodic sweep — just another   │
//!                       │                  caller of the engine contract)  │
//!                       └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Supporting Modules
//!
//! | Module        | Responsibility                                          |
//! |---------------|---------------------------------------------------------|
//! | `models`      | `WorkOrder`, `StatusHistoryEntry`, typed status enums   |
//! | `clock`       | Injectable `Clock` + `IdGenerator` for determinism      |
//! | `events`      | `DomainEvent` enum + fire-and-forget `EventSink`        |
//! | `roster`      | Read-only user/area lookups for dispatch validation     |
//!
//! ## Typical Request Flow (`POST /api/workorders/:id/actions`)
//!
//! 1. `api.rs` reads the verified principal from the auth-proxy headers and
//!    builds a [`engine::TransitionRequest`].
//! 2. `engine.rs` loads the order, asks `permissions::can_perform`, then
//!    `machine::next_status`, applies the action's side effects, and commits
//!    the new snapshot with a compare-and-swap on `version` — the history
//!    row lands in the same transaction, so no status change can ever commit
//!    without its audit entry.
//! 3. The resulting [`events::DomainEvent`] is published to the sink;
//!    publish failures are logged and never fail the transition.

pub mod api;
pub mod clock;
pub mod engine;
pub mod escalation;
pub mod events;
pub mod machine;
pub mod models;
pub mod permissions;
pub mod roster;
pub mod server;
pub mod store;
