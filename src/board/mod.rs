//! Agent Board: a Kanban view over remote cloud coding agents.
//!
//! ## Overview
//!
//! Agents live in a remote directory service. The board polls that service,
//! looks up each agent's pull request on GitHub, and places every agent in
//! exactly one of twelve columns. Column order is user-defined and persisted
//! locally, along with drafts of agents not yet launched.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐   HTTP   ┌──────────────────────────────────────────────────┐
//! │  Client  │ ───────> │  server.rs  (axum Router, ServerConfig)          │
//! │ (browser)│ <─────── │    ├─ api.rs    (route handlers, AppState)       │
//! └──────────┘ WebSocket│    ├─ ws.rs     (BoardUpdated / PollFailed)      │
//!                       │    └─ relay.rs  (/relay/* → directory service)   │
//!                       │         │                                        │
//!                       │         │ BoardPoller::poll_once()               │
//!                       │         v                                        │
//!                       │  poller.rs  (interval loop, watch snapshots)     │
//!                       │    ├─ directory.rs  (AgentDirectory trait)       │
//!                       │    └─ pr_status.rs  (batched PR fan-out, cache)  │
//!                       │              └─ github.rs (PrStatusSource)       │
//!                       │         │                                        │
//!                       │         │ build_board(snapshot, drafts, order)   │
//!                       │         v                                        │
//!                       │  view.rs → classifier.rs + column_order.rs       │
//!                       └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Supporting Modules
//!
//! | Module         | Responsibility                                          |
//! |----------------|---------------------------------------------------------|
//! | `models`       | Shared types: `Agent`, `PrStatus`, `ColumnKey`, `Draft` |
//! | `classifier`   | Pure `(status, prUrl, prStatus) → ColumnKey` rule table |
//! | `column_order` | Self-healing persisted column order                     |
//! | `storage`      | `KvStore` trait, JSON file and in-memory stores         |
//! | `drafts`       | Local drafts and the last-used repository               |
//! | `cache`        | `TtlCache` with an injectable `Clock`                   |
//!
//! ## Poll Cycle
//!
//! 1. The poller ticks (every 30s by default) unless a detail view is open.
//! 2. `list_all` follows `nextCursor` until the directory has no more pages.
//! 3. The new agent list is published right away, then PR statuses are
//!    fetched in batches and published as a second snapshot.
//! 4. The server turns each snapshot into a `BoardView` and pushes it to
//!    WebSocket clients. A failed poll keeps the old agents and sets the
//!    snapshot's `error`, which clients show as a banner.

pub mod api;
pub mod cache;
pub mod classifier;
pub mod column_order;
pub mod directory;
pub mod drafts;
pub mod github;
pub mod models;
pub mod poller;
pub mod pr_status;
pub mod relay;
pub mod server;
pub mod storage;
pub mod view;
pub mod ws;
