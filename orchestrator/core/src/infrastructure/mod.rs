// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod event_bus;
pub mod llm;
pub mod prompt_template_engine;
pub mod tools;

pub use event_bus::{EventBus, EventBusError};
