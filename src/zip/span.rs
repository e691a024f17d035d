//! Entry spans in the file area.
//!
//! An entry occupies its local header, its compressed payload and an optional
//! data descriptor. Only the payload length is recorded in the central
//! directory, so the full span is measured up to the next local header in
//! enumeration order, or to the end of the file area for the last entry.

use super::structures::ZipFileEntry;

/// Extra bytes added to the compressed length when no span can be derived.
pub const SPAN_SAFETY_MARGIN: u64 = 1024;

/// Bytes from `entry`'s local header to the next entry in `entries`.
///
/// Returns `None` if the entry is not enumerated or the following entry's
/// header lies before it.
pub fn full_length_of(
    entry: &ZipFileEntry,
    file_area_size: u64,
    entries: &[ZipFileEntry],
) -> Option<u64> {
    let index = entries.iter().position(|e| e.same_entry(entry))?;
    let boundary = match entries.get(index + 1) {
        Some(next) => next.lfh_offset,
        None => file_area_size,
    };
    boundary.checked_sub(entry.lfh_offset)
}

/// Bytes covered by a contiguous run of entries extracted together.
///
/// The run starts at `run[start]` and extends as long as the enumeration keeps
/// matching `run[start..]` in order. The first enumerated entry that breaks the
/// sequence bounds the span; if the run reaches the end of the enumeration the
/// file area does.
pub fn full_length_of_run(
    run: &[ZipFileEntry],
    start: usize,
    file_area_size: u64,
    entries: &[ZipFileEntry],
) -> Option<u64> {
    let first = run.get(start)?;
    let index = entries.iter().position(|e| e.same_entry(first))?;

    let mut expected = run[start + 1..].iter();
    let boundary = entries[index + 1..]
        .iter()
        .find(|entry| !expected.next().is_some_and(|e| e.same_entry(entry)))
        .map_or(file_area_size, |entry| entry.lfh_offset);

    boundary.checked_sub(first.lfh_offset)
}

/// Span to fetch for `entry`, falling back to its compressed length plus
/// [`SPAN_SAFETY_MARGIN`] when the enumeration gives no answer.
pub fn span_or_estimate(
    run: &[ZipFileEntry],
    start: usize,
    file_area_size: u64,
    entries: &[ZipFileEntry],
) -> u64 {
    full_length_of_run(run, start, file_area_size, entries).unwrap_or_else(|| {
        run.get(start)
            .map_or(SPAN_SAFETY_MARGIN, |e| e.compressed_size + SPAN_SAFETY_MARGIN)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::CompressionMethod;

    fn entry(name: &str, lfh_offset: u64) -> ZipFileEntry {
        ZipFileEntry {
            file_name: name.to_string(),
            compression_method: CompressionMethod::Stored,
            compressed_size: 100,
            uncompressed_size: 100,
            crc32: 0,
            lfh_offset,
            last_mod_time: 0,
            last_mod_date: 0,
            is_encrypted: false,
            is_directory: false,
            comment: String::new(),
        }
    }

    #[test]
    fn two_entry_scenario() {
        let entries = vec![entry("a", 0), entry("b", 500_000)];

        assert_eq!(full_length_of(&entries[0], 997_978, &entries), Some(500_000));
        assert_eq!(full_length_of(&entries[1], 997_978, &entries), Some(497_978));
    }

    #[test]
    fn missing_entry_has_no_length() {
        let entries = vec![entry("a", 0), entry("b", 500)];
        assert_eq!(full_length_of(&entry("c", 700), 1000, &entries), None);
    }

    #[test]
    fn out_of_order_offsets_have_no_length() {
        let entries = vec![entry("a", 500), entry("b", 0)];
        assert_eq!(full_length_of(&entries[0], 1000, &entries), None);
        assert_eq!(full_length_of(&entries[1], 1000, &entries), Some(1000));
    }

    #[test]
    fn run_is_bounded_by_interrupting_entry() {
        let entries = vec![
            entry("a", 0),
            entry("b", 100),
            entry("c", 250),
            entry("d", 400),
            entry("e", 600),
        ];
        let run = vec![entries[1].clone(), entries[2].clone(), entries[4].clone()];

        // b, c match; d interrupts
        assert_eq!(full_length_of_run(&run, 0, 900, &entries), Some(300));
        // c alone, then d interrupts
        assert_eq!(full_length_of_run(&run, 1, 900, &entries), Some(150));
        // e runs to the end of the file area
        assert_eq!(full_length_of_run(&run, 2, 900, &entries), Some(300));
    }

    #[test]
    fn run_reaching_the_end_uses_file_area() {
        let entries = vec![entry("a", 0), entry("b", 100), entry("c", 250)];
        assert_eq!(full_length_of_run(&entries, 0, 900, &entries), Some(900));
        assert_eq!(full_length_of_run(&entries, 1, 900, &entries), Some(800));
    }

    #[test]
    fn single_entry_run_matches_full_length() {
        let entries = vec![entry("a", 0), entry("b", 100), entry("c", 250)];
        for e in &entries {
            let run = std::slice::from_ref(e);
            assert_eq!(
                full_length_of_run(run, 0, 900, &entries),
                full_length_of(e, 900, &entries)
            );
        }
    }

    #[test]
    fn estimate_falls_back_to_compressed_size() {
        let entries = vec![entry("a", 0)];
        let stranger = vec![entry("zzz", 42)];
        assert_eq!(span_or_estimate(&stranger, 0, 900, &entries), 100 + SPAN_SAFETY_MARGIN);
        assert_eq!(span_or_estimate(&entries, 0, 900, &entries), 900);
    }
}
