// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod lock_free_queue;

pub use lock_free_queue::{LockFreeQueue, QueueEvent};
