//! Shared utility structures used across the analysis passes.

mod bitset;

pub use bitset::{BitSet, Bits};

/// Escapes a string for inclusion in a DOT graph label.
#[must_use]
pub fn escape_dot(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('{', "\\{")
        .replace('}', "\\}")
        .replace('<', "\\<")
        .replace('>', "\\>")
}
