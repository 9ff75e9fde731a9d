/*!
# Sleepwatch

A monitoring dashboard for a classroom sleep-detection service, built in Rust.

## Overview

The detection backend (camera capture, face recognition, eye-state inference)
runs as a separate HTTP service. This crate is the client side: it keeps a
local view of the remote service's state by polling its status feed, lets an
operator start and stop detection, and maintains the list of currently flagged
students with CSV export.

## Architecture

Two independent view-models, both fed by timer-based polling:

- **StreamSync** (`stream`) owns the live video panel: the streaming flag, a
  derived connection status, the last detection snapshot, and the video
  element's cache-busted source URL. Polled every second.
- **RosterDedup** (`roster`) owns the flagged list: each refresh replaces it
  with the server snapshot deduplicated by name (first occurrence wins).
  Polled every three seconds.

Both models are plain synchronous state machines; all HTTP goes through
`ApiClient` (`client`) and all timers live in the hosting layer (`app`), which
serves the dashboard page and a small JSON API over axum. Responses carry
sequence tokens so a slow poll can never overwrite a newer snapshot.

## Modules

- **stream**: live video/detection view-model
- **roster**: flagged-list view-model with name deduplication
- **client**: remote detection API client
- **downloader**: CSV export of the roster
- **session**: logged-in user context with a single load/clear lifecycle
- **config**: runtime configuration (API URL, poll intervals, backoff)
- **app**: axum host composing the two panels, poll loops and routes
*/

pub mod app;
pub mod client;
pub mod config;
pub mod downloader;
pub mod roster;
pub mod session;
pub mod stream;

/// Re-export the commonly used types
pub use client::{ApiClient, DetectionStatus, StatusPayload};
pub use config::Config;
pub use roster::{RosterDedup, RosterEntry};
pub use session::{Role, Session};
pub use stream::{ConnectionStatus, Detection, StreamSync};
