//! Shared UI icons and emojis.
//!
//! Each icon falls back to a plain ASCII marker on terminals without emoji
//! support.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static BLOCKED: Emoji<'_, '_> = Emoji("🚧 ", "[BLOCK]");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");

// Artifact indicators
pub static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
pub static FILE: Emoji<'_, '_> = Emoji("📄 ", "+");
pub static MISSING: Emoji<'_, '_> = Emoji("⬜ ", "-");

// Stage indicators
pub static RUNNING: Emoji<'_, '_> = Emoji("▶️  ", "[>]");
pub static QUESTION: Emoji<'_, '_> = Emoji("🤔 ", "[?]");
pub static NEXT: Emoji<'_, '_> = Emoji("🎯 ", "->");
pub static CLOCK: Emoji<'_, '_> = Emoji("⏱️  ", "[T]");
