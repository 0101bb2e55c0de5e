//! Header Label Fingerprinting
//!
//! Recognizes diskgroup labels stamped into a device header from an
//! `od --format=c` character dump, where each byte is printed as its own
//! whitespace-separated column (`D   A   T   A   0   1`).

/// Label assigned when no signature matches
pub const UNLABELED_POOL: &str = "none";

/// Labels recognized in device headers, in match priority order
pub const KNOWN_LABELS: [&str; 8] = [
    "DATA01", "DATA02", "ARCH01", "ARCH02", "REDO01", "REDO02", "TEMP01", "ORAC01",
];

// =============================================================================
// Label Signature
// =============================================================================

/// A label matched as consecutive single-character columns of a dump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelSignature {
    pub label: &'static str,
}

impl LabelSignature {
    pub const fn new(label: &'static str) -> Self {
        Self { label }
    }

    /// Check if the label's letters appear as adjacent columns of the line
    pub fn matches(&self, line: &str) -> bool {
        let columns: Vec<&str> = line.split_whitespace().collect();
        let letters: Vec<char> = self.label.chars().collect();
        if letters.is_empty() || columns.len() < letters.len() {
            return false;
        }

        columns.windows(letters.len()).any(|window| {
            window.iter().zip(&letters).all(|(column, letter)| {
                let mut chars = column.chars();
                chars.next() == Some(*letter) && chars.next().is_none()
            })
        })
    }
}

static SIGNATURES: [LabelSignature; 8] = [
    LabelSignature::new(KNOWN_LABELS[0]),
    LabelSignature::new(KNOWN_LABELS[1]),
    LabelSignature::new(KNOWN_LABELS[2]),
    LabelSignature::new(KNOWN_LABELS[3]),
    LabelSignature::new(KNOWN_LABELS[4]),
    LabelSignature::new(KNOWN_LABELS[5]),
    LabelSignature::new(KNOWN_LABELS[6]),
    LabelSignature::new(KNOWN_LABELS[7]),
];

// =============================================================================
// Signature Database
// =============================================================================

/// The fixed set of header label signatures
pub struct SignatureDatabase;

impl SignatureDatabase {
    pub fn signatures() -> &'static [LabelSignature] {
        &SIGNATURES
    }

    /// Label found in a dump: the first line carrying any signature wins,
    /// and within a line the earlier signature wins
    pub fn identify(dump: &str) -> Option<&'static str> {
        dump.lines().find_map(|line| {
            Self::signatures()
                .iter()
                .find(|sig| sig.matches(line))
                .map(|sig| sig.label)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn test_signature_requires_spacing() {
        let sig = LabelSignature::new("DATA01");
        assert!(sig.matches("   D   A   T   A   0   1  \\0"));
        assert!(sig.matches("D A T A 0 1"));
        assert!(!sig.matches("DATA01"));
        assert!(!sig.matches("D   A   T   A   0   2"));
    }

    #[test]
    fn test_identify_asm_header() {
        let dump = indoc! {r"
            0000000  \0 202 001 001  \0  \0  \0  \0  \0  \0  \0 200 301 244   x 212
            0000020  \0  \0  \0  \0  \0  \0  \0  \0  \0  \0  \0  \0  \0  \0  \0  \0
            0000040   O   R   C   L   D   I   S   K   R   E   D   O   0   2  \0  \0
            0000060  \0  \0  \0  \0  \0  \0  \0  \0  \0  \0  \0  \0  \0  \0  \0  \0
            0000200
        "};
        assert_eq!(SignatureDatabase::identify(dump), Some("REDO02"));
    }

    #[test]
    fn test_identify_priority_within_line() {
        let line = "T   E   M   P   0   1   D   A   T   A   0   2";
        assert_eq!(SignatureDatabase::identify(line), Some("DATA02"));
    }

    #[test]
    fn test_identify_blank_device() {
        let dump = "0000000  \\0  \\0  \\0  \\0\n*\n0000200\n";
        assert_eq!(SignatureDatabase::identify(dump), None);
    }

    #[test]
    fn test_all_known_labels_have_signatures() {
        assert_eq!(SignatureDatabase::signatures().len(), 8);
        for label in KNOWN_LABELS {
            let spaced: Vec<String> = label.chars().map(|c| c.to_string()).collect();
            assert_eq!(
                SignatureDatabase::identify(&spaced.join("   ")),
                Some(label)
            );
        }
    }
}
