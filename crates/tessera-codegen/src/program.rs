//! The generated program handed to the interpreter.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::source_map::SourceMap;

/// Program text plus what hosts need to reason about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedProgram {
    /// The block-script program.
    pub code: String,
    /// Hex SHA-256 of `code`; equal programs have equal hashes.
    pub hash: String,
    pub source_map: SourceMap,
}

impl GeneratedProgram {
    pub fn new(code: String, source_map: SourceMap) -> Self {
        let hash = fingerprint(&code);
        Self {
            code,
            hash,
            source_map,
        }
    }

    pub fn line_count(&self) -> usize {
        self.code.lines().count()
    }
}

/// Hex-encoded SHA-256 of a program text.
pub fn fingerprint(code: &str) -> String {
    let digest = Sha256::digest(code.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_hex_sha256() {
        assert_eq!(
            fingerprint(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(fingerprint("move();\n").len(), 64);
    }
}
