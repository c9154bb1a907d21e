//! Names the generated program and the interpreter agree on.

/// `highlightBlock(id)`: record the current block and suspend.
pub const HIGHLIGHT_BLOCK: &str = "highlightBlock";
/// `pause()`: suspend without recording anything.
pub const PAUSE: &str = "pause";
/// `exit(correct, message?)`: set the verdict and finish.
pub const EXIT: &str = "exit";
/// Per-test-case initial state.
pub const STATE: &str = "state";
/// Remaining loop-body entries.
pub const LOOP_TRAP: &str = "loopTrap";
/// Scratch slot used by bound guards.
pub const TMP: &str = "tmp";

/// Identifiers block snippets may not bind or assign.
pub const RESERVED: [&str; 6] = [EXIT, HIGHLIGHT_BLOCK, LOOP_TRAP, PAUSE, STATE, TMP];

pub fn is_reserved(name: &str) -> bool {
    RESERVED.contains(&name)
}
