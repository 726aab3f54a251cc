//! Plain-text segment codec.
//!
//! A segment is persisted as a handful of files sharing the segment name and
//! differing by extension. Every file is line oriented (see [`line`]) and ends
//! with a CRC32 footer, so an index can be inspected with a text editor while
//! damage is still detected on open.

pub mod doc_values;
pub mod field_infos;
pub mod line;
pub mod live_docs;
pub mod postings;
pub mod segment_info;
pub mod stored_fields;
pub mod term_vectors;

use std::sync::Arc;

use crate::codec::field_infos::FieldInfos;
use crate::codec::segment_info::SegmentInfo;
use crate::storage::Storage;

/// Postings (terms, docs, positions, offsets, payloads).
pub const POSTINGS_EXTENSION: &str = "pst";
/// Doc values.
pub const DOC_VALUES_EXTENSION: &str = "dat";
/// Norms, stored with the doc-values format.
pub const NORMS_EXTENSION: &str = "len";
/// Segment metadata.
pub const SEGMENT_INFO_EXTENSION: &str = "si";
/// Field metadata.
pub const FIELD_INFOS_EXTENSION: &str = "inf";
/// Stored fields.
pub const STORED_FIELDS_EXTENSION: &str = "fld";
/// Term vectors.
pub const TERM_VECTORS_EXTENSION: &str = "vec";
/// Live documents.
pub const LIVE_DOCS_EXTENSION: &str = "liv";

/// Sentinel doc id returned by exhausted iterators.
pub const NO_MORE_DOCS: i32 = i32::MAX;

/// File name for `segment`, an optional per-format `suffix` and `ext`.
pub fn segment_file_name(segment: &str, suffix: &str, ext: &str) -> String {
    if suffix.is_empty() {
        format!("{segment}.{ext}")
    } else {
        format!("{segment}_{suffix}.{ext}")
    }
}

/// File name for a generation of a per-segment file. Generation 0 carries no
/// generation marker; later generations are written in base 36.
pub fn file_name_from_generation(base: &str, ext: &str, generation: u64) -> String {
    if generation == 0 {
        format!("{base}.{ext}")
    } else {
        format!("{base}_{}.{ext}", to_base36(generation))
    }
}

/// Lower-case base-36 rendering of `value`.
pub fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    out.into_iter().map(char::from).collect()
}

/// Everything a format writer needs to create its files.
#[derive(Debug, Clone)]
pub struct SegmentWriteState {
    pub storage: Arc<dyn Storage>,
    pub segment_name: String,
    pub max_doc: i32,
    pub field_infos: Arc<FieldInfos>,
    pub segment_suffix: String,
}

impl SegmentWriteState {
    /// Name of this segment's file with extension `ext`.
    pub fn file_name(&self, ext: &str) -> String {
        segment_file_name(&self.segment_name, &self.segment_suffix, ext)
    }
}

/// Everything a format reader needs to open its files.
#[derive(Debug, Clone)]
pub struct SegmentReadState {
    pub storage: Arc<dyn Storage>,
    pub segment_info: Arc<SegmentInfo>,
    pub field_infos: Arc<FieldInfos>,
    pub segment_suffix: String,
}

impl SegmentReadState {
    /// Name of this segment's file with extension `ext`.
    pub fn file_name(&self, ext: &str) -> String {
        segment_file_name(&self.segment_info.name, &self.segment_suffix, ext)
    }

    pub fn max_doc(&self) -> i32 {
        self.segment_info.doc_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_file_name() {
        assert_eq!(segment_file_name("_0", "", "pst"), "_0.pst");
        assert_eq!(segment_file_name("_0", "text", "pst"), "_0_text.pst");
    }

    #[test]
    fn test_generation_file_name() {
        assert_eq!(file_name_from_generation("_3", "liv", 0), "_3.liv");
        assert_eq!(file_name_from_generation("_3", "liv", 1), "_3_1.liv");
        assert_eq!(file_name_from_generation("_3", "liv", 36), "_3_10.liv");
        assert_eq!(to_base36(35), "z");
    }
}
