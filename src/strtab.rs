//! The deduplicated, suffix-compressed string-table builder (§4.3) used for
//! `.shstrtab` and any other `SHT_STRTAB` section content this crate emits.
//!
//! This is the one part of the spec with no direct analogue in the teacher
//! crate (which reads string tables but never needed to build one); the
//! suffix-compression algorithm below is the standard one used by
//! production linkers' string-table builders, generalized to this crate's
//! byte-oriented, panic-free style.

use std::collections::HashMap;

/// Build a deduplicated, suffix-compressed string table from `strings`.
///
/// Returns the section content bytes (always starting with a `0` byte, the
/// empty string at offset 0) and a map from each input string to the byte
/// offset of its encoded representation. If two inputs are equal, or one is
/// a proper suffix of another, they share storage: the map may point two
/// different strings into overlapping byte ranges of the same entry.
pub fn build<S: AsRef<str>>(strings: &[S]) -> (Vec<u8>, HashMap<String, u32>) {
    let mut uniques: Vec<Vec<u8>> = strings
        .iter()
        .map(|s| s.as_ref().as_bytes().to_vec())
        .filter(|b| !b.is_empty())
        .collect();
    uniques.sort();
    uniques.dedup();

    // Reverse every candidate, sort lexicographically so suffix-equivalent
    // strings become adjacent, then drop any entry whose reversed bytes are
    // a prefix of its successor's — the successor, being longer, subsumes it.
    let mut reversed: Vec<Vec<u8>> = uniques
        .iter()
        .map(|b| b.iter().rev().copied().collect::<Vec<u8>>())
        .collect();
    reversed.sort();

    let mut kept_reversed: Vec<Vec<u8>> = Vec::new();
    let mut i = 0;
    while i < reversed.len() {
        if i + 1 < reversed.len() && reversed[i + 1].starts_with(&reversed[i]) {
            i += 1;
            continue;
        }
        kept_reversed.push(reversed[i].clone());
        i += 1;
    }

    let kept: Vec<Vec<u8>> = kept_reversed
        .into_iter()
        .map(|mut b| {
            b.reverse();
            b
        })
        .collect();

    // Emit the empty string at offset 0, then every surviving entry in order.
    let mut bytes = vec![0u8];
    let mut kept_offsets = Vec::with_capacity(kept.len());
    for entry in &kept {
        kept_offsets.push(bytes.len() as u32);
        bytes.extend_from_slice(entry);
        bytes.push(0);
    }

    // Record the offset of every suffix of every retained string, so a
    // lookup for a subsumed shorter string still resolves correctly.
    let mut suffix_offsets: HashMap<Vec<u8>, u32> = HashMap::new();
    suffix_offsets.insert(Vec::new(), 0);
    for (entry, &base_offset) in kept.iter().zip(kept_offsets.iter()) {
        for start in 0..=entry.len() {
            suffix_offsets
                .entry(entry[start..].to_vec())
                .or_insert(base_offset + start as u32);
        }
    }

    let mut map = HashMap::new();
    for s in strings {
        let b = s.as_ref().as_bytes();
        if let Some(&offset) = suffix_offsets.get(b) {
            map.insert(s.as_ref().to_string(), offset);
        }
    }
    (bytes, map)
}

/// Read the null-terminated string at `offset`, not including the
/// terminating `0` byte. An out-of-range offset yields an empty slice
/// rather than panicking.
pub fn lookup(bytes: &[u8], offset: usize) -> &[u8] {
    let start = offset.min(bytes.len());
    let end = bytes[start..]
        .iter()
        .position(|&b| b == 0)
        .map(|p| start + p)
        .unwrap_or(bytes.len());
    &bytes[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_always_at_offset_zero() {
        let (bytes, map) = build(&[".text"]);
        assert_eq!(bytes[0], 0);
        assert_eq!(lookup(&bytes, 0), b"");
        assert_eq!(map.get(".text"), Some(&1));
    }

    #[test]
    fn every_string_looks_up_to_itself() {
        let names = vec!["".to_string(), ".text".to_string(), ".data".to_string(), ".bss".to_string()];
        let (bytes, map) = build(&names);
        for name in &names {
            let offset = map[name];
            assert_eq!(lookup(&bytes, offset as usize), name.as_bytes());
        }
    }

    #[test]
    fn suffix_sharing_matches_spec_example() {
        // S6: ["", ".text", ".data", "text"] — "text" and ".text" share
        // their trailing four bytes, and map[".text"] + 1 == map["text"].
        let names = vec!["".to_string(), ".text".to_string(), ".data".to_string(), "text".to_string()];
        let (bytes, map) = build(&names);
        assert_eq!(bytes[0], 0);
        assert_eq!(map[".text"] + 1, map["text"]);
        assert_eq!(lookup(&bytes, map["text"] as usize), b"text");
        assert_eq!(lookup(&bytes, map[".text"] as usize), b".text");
    }

    #[test]
    fn proper_suffix_offset_relationship() {
        let names = vec!["rodata".to_string(), ".rodata".to_string()];
        let (_bytes, map) = build(&names);
        let s = "rodata";
        let t = ".rodata";
        // "rodata" is a proper suffix of ".rodata".
        assert_eq!(map[s], map[t] + (t.len() - s.len()) as u32);
    }

    #[test]
    fn lookup_past_end_of_buffer_is_empty_not_a_panic() {
        let (bytes, _) = build::<&str>(&[]);
        assert_eq!(lookup(&bytes, bytes.len() + 100), b"");
    }
}
