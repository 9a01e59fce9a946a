// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// LLM Provider Infrastructure - Anti-Corruption Layer Implementations
//
// Each adapter translates between the domain chat interface and one
// external API.

pub mod ollama;
pub mod openai;
pub mod registry;

pub use ollama::OllamaAdapter;
pub use openai::OpenAIAdapter;
pub use registry::ProviderRegistry;
