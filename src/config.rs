// ABOUTME: Configuration and constants for the TreeP toolchain
// This module contains version info, REPL messages, and engine limits

pub const VERSION: &str = "1.0.0";
pub const WELCOME_MESSAGE: &str = "TreeP v1.0";
pub const WELCOME_SUBTITLE: &str = "A small functional language on one uniform tree";
pub const WELCOME_FOOTER: &str = "Type an expression to evaluate it. Ctrl-D exits.";

/// Maximum number of expansion rounds applied to a single node before the
/// expander gives up. Only reachable through a self-expanding user macro;
/// the built-in macros always terminate.
pub const EXPANSION_LIMIT: usize = 256;

/// Default iteration cap for fixpoint transduction.
pub const FIXPOINT_CAP: usize = 100;
