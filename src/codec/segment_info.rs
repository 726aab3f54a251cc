//! Segment metadata (`.si`).

use std::collections::{BTreeMap, BTreeSet};

use crate::codec::line::{
    check_footer, read_bool, read_string, read_value, write_checksum, write_line,
    ChecksumInput, ChecksumOutput, LineBuf,
};
use crate::codec::{segment_file_name, SEGMENT_INFO_EXTENSION};
use crate::error::{Result, XiphosError};
use crate::storage::Storage;

const VERSION: &str = "    version ";
const DOC_COUNT: &str = "    number of documents ";
const USE_COMPOUND: &str = "    uses compound file ";
const NUM_DIAG: &str = "    diagnostics ";
const DIAG_KEY: &str = "      key ";
const DIAG_VALUE: &str = "      value ";
const NUM_FILES: &str = "    files ";
const FILE: &str = "      file ";

/// Metadata describing one immutable segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentInfo {
    /// Segment name, the common prefix of all its files.
    pub name: String,
    /// Number of documents, deleted ones included.
    pub doc_count: i32,
    /// Version of the library that wrote the segment.
    pub version: String,
    pub use_compound_file: bool,
    pub diagnostics: BTreeMap<String, String>,
    /// Every file belonging to the segment.
    pub files: BTreeSet<String>,
}

impl SegmentInfo {
    pub fn new(name: impl Into<String>, doc_count: i32) -> Self {
        SegmentInfo {
            name: name.into(),
            doc_count,
            version: crate::VERSION.to_string(),
            use_compound_file: false,
            diagnostics: BTreeMap::new(),
            files: BTreeSet::new(),
        }
    }

    /// Name of the `.si` file for this segment.
    pub fn file_name(&self) -> String {
        segment_file_name(&self.name, "", SEGMENT_INFO_EXTENSION)
    }
}

/// Write `info` to `<name>.si`. The `.si` file itself is added to the file set.
pub fn write_segment_info(storage: &dyn Storage, info: &mut SegmentInfo) -> Result<()> {
    let file_name = info.file_name();
    info.files.insert(file_name.clone());

    let output = storage.create_output(&file_name)?;
    let mut out = ChecksumOutput::new(output, file_name.clone());
    let written = write_body(&mut out, info);
    match written {
        Ok(()) => out.close(),
        Err(e) => {
            drop(out);
            if let Err(cleanup) = storage.delete_file(&file_name) {
                log::warn!("failed to delete {file_name} after write error: {cleanup}");
            }
            Err(e)
        }
    }
}

fn write_body(out: &mut ChecksumOutput, info: &SegmentInfo) -> Result<()> {
    write_line(out, VERSION, &info.version)?;
    write_line(out, DOC_COUNT, info.doc_count)?;
    write_line(out, USE_COMPOUND, info.use_compound_file)?;

    write_line(out, NUM_DIAG, info.diagnostics.len())?;
    for (key, value) in &info.diagnostics {
        write_line(out, DIAG_KEY, key)?;
        write_line(out, DIAG_VALUE, value)?;
    }

    write_line(out, NUM_FILES, info.files.len())?;
    for file in &info.files {
        write_line(out, FILE, file)?;
    }

    write_checksum(out)
}

/// Read the metadata of segment `name`.
pub fn read_segment_info(storage: &dyn Storage, name: &str) -> Result<SegmentInfo> {
    let file_name = segment_file_name(name, "", SEGMENT_INFO_EXTENSION);
    let res = file_name.as_str();
    let mut input = ChecksumInput::new(storage.open_input(&file_name)?);
    let mut line = LineBuf::new();

    let version = read_string(&mut input, &mut line, VERSION, res)?;
    let doc_count: i32 = read_value(&mut input, &mut line, DOC_COUNT, res)?;
    if doc_count < 0 {
        return Err(XiphosError::corruption(
            format!("negative document count {doc_count}"),
            res,
        ));
    }
    let use_compound_file = read_bool(&mut input, &mut line, USE_COMPOUND, res)?;

    let num_diag: usize = read_value(&mut input, &mut line, NUM_DIAG, res)?;
    let mut diagnostics = BTreeMap::new();
    for _ in 0..num_diag {
        let key = read_string(&mut input, &mut line, DIAG_KEY, res)?;
        let value = read_string(&mut input, &mut line, DIAG_VALUE, res)?;
        diagnostics.insert(key, value);
    }

    let num_files: usize = read_value(&mut input, &mut line, NUM_FILES, res)?;
    let mut files = BTreeSet::new();
    for _ in 0..num_files {
        files.insert(read_string(&mut input, &mut line, FILE, res)?);
    }

    check_footer(&mut input, res)?;

    Ok(SegmentInfo {
        name: name.to_string(),
        doc_count,
        version,
        use_compound_file,
        diagnostics,
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn sample() -> SegmentInfo {
        let mut info = SegmentInfo::new("_0", 12);
        info.diagnostics.insert("source".to_string(), "flush".to_string());
        info.diagnostics.insert("os".to_string(), "linux\nx86".to_string());
        info.files.insert("_0.pst".to_string());
        info.files.insert("_0.fld".to_string());
        info
    }

    #[test]
    fn test_round_trip() {
        let storage = MemoryStorage::new_default();
        let mut info = sample();
        write_segment_info(&storage, &mut info).unwrap();
        assert!(info.files.contains("_0.si"));

        let read = read_segment_info(&storage, "_0").unwrap();
        assert_eq!(read, info);
        assert_eq!(read.version, crate::VERSION);
    }

    #[test]
    fn test_wire_format() {
        let storage = MemoryStorage::new_default();
        let mut info = SegmentInfo::new("_1", 3);
        write_segment_info(&storage, &mut info).unwrap();

        let text = String::from_utf8(storage.read_all("_1.si").unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "    number of documents 3");
        assert_eq!(lines[2], "    uses compound file false");
        assert_eq!(lines[3], "    diagnostics 0");
        assert_eq!(lines[4], "    files 1");
        assert_eq!(lines[5], "      file _1.si");
        assert!(lines[6].starts_with("checksum "));
    }

    #[test]
    fn test_damaged_file_is_rejected() {
        let storage = MemoryStorage::new_default();
        let mut info = sample();
        write_segment_info(&storage, &mut info).unwrap();

        let mut bytes = storage.read_all("_0.si").unwrap();
        let pos = bytes.iter().position(|&b| b == b'2').unwrap();
        bytes[pos] = b'3';
        storage.overwrite("_0.si", bytes);

        assert!(read_segment_info(&storage, "_0").unwrap_err().is_corruption());
    }
}
