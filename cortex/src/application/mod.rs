// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod topology_sync;

pub use topology_sync::{sync_topology, DependencyRecord, SyncReport, TopologyDocument, TopologyRecord};
