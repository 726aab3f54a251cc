//! Stored fields (`.fld`).
//!
//! A flat log of documents. Each document lists its stored values with the
//! field number, name and a type tag. The reader scans the file once at open
//! to record where every document starts; there is no on-disk index.

use std::fmt;
use std::io::{Seek, SeekFrom};
use std::sync::Arc;

use crate::codec::field_infos::{FieldInfo, FieldInfos};
use crate::codec::line::{
    ChecksumInput, ChecksumOutput, LineBuf, check_footer, write_checksum, write_line,
    write_line_bytes,
};
use crate::codec::{STORED_FIELDS_EXTENSION, SegmentReadState, SegmentWriteState};
use crate::error::{Result, XiphosError};
use crate::storage::{SharedInput, Storage, StorageInput};

const DOC: &str = "doc ";
const NUM: &str = "  numfields ";
const FIELD: &str = "  field ";
const NAME: &str = "    name ";
const TYPE: &str = "    type ";
const VALUE: &str = "    value ";
const END: &str = crate::codec::line::END;

const TYPE_STRING: &str = "string";
const TYPE_BINARY: &str = "binary";
const TYPE_INT: &str = "int";
const TYPE_LONG: &str = "long";
const TYPE_FLOAT: &str = "float";
const TYPE_DOUBLE: &str = "double";

/// A stored field value.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    String(String),
    Binary(Vec<u8>),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

impl StoredValue {
    fn type_tag(&self) -> &'static str {
        match self {
            StoredValue::String(_) => TYPE_STRING,
            StoredValue::Binary(_) => TYPE_BINARY,
            StoredValue::Int(_) => TYPE_INT,
            StoredValue::Long(_) => TYPE_LONG,
            StoredValue::Float(_) => TYPE_FLOAT,
            StoredValue::Double(_) => TYPE_DOUBLE,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StoredValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// The value as a number, if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            StoredValue::Int(v) => Some(v as f64),
            StoredValue::Long(v) => Some(v as f64),
            StoredValue::Float(v) => Some(v as f64),
            StoredValue::Double(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for StoredValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoredValue::String(s) => f.write_str(s),
            StoredValue::Binary(b) => write!(f, "{}", String::from_utf8_lossy(b)),
            StoredValue::Int(v) => write!(f, "{v}"),
            StoredValue::Long(v) => write!(f, "{v}"),
            StoredValue::Float(v) => write!(f, "{v}"),
            StoredValue::Double(v) => write!(f, "{v}"),
        }
    }
}

/// Answer of [`StoredFieldVisitor::needs_field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitStatus {
    /// Decode the value and pass it to `visit`.
    Yes,
    /// Skip this field.
    No,
    /// Stop visiting the document.
    Stop,
}

/// Receives the stored fields of a document.
pub trait StoredFieldVisitor {
    fn needs_field(&mut self, field: &FieldInfo) -> Result<VisitStatus>;

    fn visit(&mut self, field: &FieldInfo, value: StoredValue) -> Result<()>;
}

/// Collects stored values into a list, optionally restricted to some fields.
#[derive(Debug, Default)]
pub struct DocumentStoredFieldVisitor {
    fields: Option<Vec<String>>,
    values: Vec<(String, StoredValue)>,
}

impl DocumentStoredFieldVisitor {
    /// Collect every stored field.
    pub fn new() -> Self {
        DocumentStoredFieldVisitor::default()
    }

    /// Collect only the named fields.
    pub fn with_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DocumentStoredFieldVisitor {
            fields: Some(fields.into_iter().map(Into::into).collect()),
            values: Vec::new(),
        }
    }

    pub fn into_values(self) -> Vec<(String, StoredValue)> {
        self.values
    }

    /// First collected value of `field`.
    pub fn get(&self, field: &str) -> Option<&StoredValue> {
        self.values
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }
}

impl StoredFieldVisitor for DocumentStoredFieldVisitor {
    fn needs_field(&mut self, field: &FieldInfo) -> Result<VisitStatus> {
        Ok(match &self.fields {
            Some(wanted) if !wanted.iter().any(|name| *name == field.name) => VisitStatus::No,
            _ => VisitStatus::Yes,
        })
    }

    fn visit(&mut self, field: &FieldInfo, value: StoredValue) -> Result<()> {
        self.values.push((field.name.clone(), value));
        Ok(())
    }
}

/// Appends documents to a `.fld` file.
#[derive(Debug)]
pub struct StoredFieldsWriter {
    storage: Arc<dyn Storage>,
    file_name: String,
    out: Option<ChecksumOutput>,
    num_docs_written: i32,
}

impl StoredFieldsWriter {
    pub fn new(state: &SegmentWriteState) -> Result<Self> {
        let file_name = state.file_name(STORED_FIELDS_EXTENSION);
        let output = match state.storage.create_output(&file_name) {
            Ok(output) => output,
            Err(e) => {
                if let Err(cleanup) = state.storage.delete_file(&file_name) {
                    log::warn!("failed to delete {file_name} after open error: {cleanup}");
                }
                return Err(e);
            }
        };
        Ok(StoredFieldsWriter {
            storage: Arc::clone(&state.storage),
            out: Some(ChecksumOutput::new(output, file_name.clone())),
            file_name,
            num_docs_written: 0,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    fn out(&mut self) -> Result<&mut ChecksumOutput> {
        self.out
            .as_mut()
            .ok_or_else(|| XiphosError::invariant("stored fields writer already closed"))
    }

    /// Begin the next document, which will have `num_fields` stored values.
    pub fn start_document(&mut self, num_fields: usize) -> Result<()> {
        let doc = self.num_docs_written;
        let out = self.out()?;
        write_line(out, DOC, doc)?;
        write_line(out, NUM, num_fields)?;
        self.num_docs_written += 1;
        Ok(())
    }

    pub fn write_field(&mut self, field: &FieldInfo, value: &StoredValue) -> Result<()> {
        let out = self.out()?;
        write_line(out, FIELD, field.number)?;
        write_line(out, NAME, &field.name)?;
        write_line(out, TYPE, value.type_tag())?;
        match value {
            StoredValue::String(s) => write_line(out, VALUE, s),
            StoredValue::Binary(b) => write_line_bytes(out, VALUE, b),
            StoredValue::Int(v) => write_line(out, VALUE, v),
            StoredValue::Long(v) => write_line(out, VALUE, v),
            StoredValue::Float(v) => write_line(out, VALUE, v),
            StoredValue::Double(v) => write_line(out, VALUE, v),
        }
    }

    /// Close the file after checking `num_docs` documents were written. On a
    /// mismatch the writer aborts and the file is deleted.
    pub fn finish(mut self, num_docs: i32) -> Result<()> {
        if self.num_docs_written != num_docs {
            let written = self.num_docs_written;
            self.abort();
            return Err(XiphosError::invariant(format!(
                "stored fields writer wrote {written} documents but the segment has {num_docs}"
            )));
        }
        let mut out = self
            .out
            .take()
            .ok_or_else(|| XiphosError::invariant("stored fields writer already closed"))?;
        write_line(&mut out, END, "")?;
        write_checksum(&mut out)?;
        out.close()
    }

    /// Drop the partial output and delete the file.
    pub fn abort(mut self) {
        self.out.take();
        if let Err(e) = self.storage.delete_file(&self.file_name) {
            log::warn!("failed to delete {} on abort: {e}", self.file_name);
        }
    }
}

/// Random access to stored documents.
#[derive(Debug)]
pub struct StoredFieldsReader {
    input: SharedInput,
    cursor: Box<dyn StorageInput>,
    field_infos: Arc<FieldInfos>,
    offsets: Arc<Vec<u64>>,
    line: LineBuf,
}

impl StoredFieldsReader {
    /// Open the file and record the start of every document.
    pub fn open(state: &SegmentReadState) -> Result<Self> {
        let file_name = state.file_name(STORED_FIELDS_EXTENSION);
        let input = SharedInput::open(state.storage.as_ref(), &file_name)?;
        let offsets = read_index(&input, state.max_doc())?;
        log::debug!("opened {file_name} with {} documents", offsets.len());
        Ok(StoredFieldsReader {
            cursor: input.clone_input()?,
            input,
            field_infos: Arc::clone(&state.field_infos),
            offsets: Arc::new(offsets),
            line: LineBuf::new(),
        })
    }

    /// A reader with its own cursor sharing this reader's offsets.
    pub fn try_clone(&self) -> Result<Self> {
        Ok(StoredFieldsReader {
            input: self.input.clone(),
            cursor: self.input.clone_input()?,
            field_infos: Arc::clone(&self.field_infos),
            offsets: Arc::clone(&self.offsets),
            line: LineBuf::new(),
        })
    }

    pub fn num_docs(&self) -> usize {
        self.offsets.len()
    }

    /// Replay the stored fields of `doc` through `visitor`.
    pub fn visit_document(&mut self, doc: i32, visitor: &mut dyn StoredFieldVisitor) -> Result<()> {
        let offset = usize::try_from(doc)
            .ok()
            .and_then(|d| self.offsets.get(d))
            .copied()
            .ok_or_else(|| XiphosError::invalid_argument(format!("document {doc} out of range")))?;
        let res = self.input.name().to_string();
        let res = res.as_str();
        self.cursor.seek(SeekFrom::Start(offset))?;

        self.line.read(&mut self.cursor, res)?;
        let num_fields: usize = self.line.parse(NUM, res)?;
        for _ in 0..num_fields {
            self.line.read(&mut self.cursor, res)?;
            let number: i32 = self.line.parse(FIELD, res)?;
            let field_info = self.field_infos.field_info_by_number(number).ok_or_else(|| {
                XiphosError::corruption(format!("unknown field number {number}"), res)
            })?;
            self.line.read(&mut self.cursor, res)?;
            self.line.expect(NAME, res)?;
            self.line.read(&mut self.cursor, res)?;
            let tag = self.line.string(TYPE, res)?;

            match visitor.needs_field(field_info)? {
                VisitStatus::Yes => {
                    self.line.read(&mut self.cursor, res)?;
                    let value = decode_value(&self.line, &tag, res)?;
                    visitor.visit(field_info, value)?;
                }
                VisitStatus::No => {
                    self.line.read(&mut self.cursor, res)?;
                    self.line.expect(VALUE, res)?;
                }
                VisitStatus::Stop => return Ok(()),
            }
        }
        Ok(())
    }

    /// The footer was verified at open.
    pub fn check_integrity(&self) -> Result<()> {
        Ok(())
    }
}

fn decode_value(line: &LineBuf, tag: &str, res: &str) -> Result<StoredValue> {
    Ok(match tag {
        TYPE_STRING => StoredValue::String(line.string(VALUE, res)?),
        TYPE_BINARY => StoredValue::Binary(line.expect(VALUE, res)?.to_vec()),
        TYPE_INT => StoredValue::Int(line.parse(VALUE, res)?),
        TYPE_LONG => StoredValue::Long(line.parse(VALUE, res)?),
        TYPE_FLOAT => StoredValue::Float(line.parse(VALUE, res)?),
        TYPE_DOUBLE => StoredValue::Double(line.parse(VALUE, res)?),
        other => {
            return Err(XiphosError::corruption(
                format!("unknown stored field type '{other}'"),
                res,
            ));
        }
    })
}

fn read_index(input: &SharedInput, max_doc: i32) -> Result<Vec<u64>> {
    let res = input.name();
    let mut cin = ChecksumInput::new(input.clone_input()?);
    let mut line = LineBuf::new();
    let mut offsets = Vec::with_capacity(max_doc.max(0) as usize);
    loop {
        line.read(&mut cin, res)?;
        if line.as_bytes() == END.as_bytes() {
            break;
        }
        if line.starts_with(DOC) {
            offsets.push(cin.position());
        }
    }
    check_footer(&mut cin, res)?;
    if offsets.len() != max_doc as usize {
        return Err(XiphosError::corruption(
            format!("found {} documents but the segment has {max_doc}", offsets.len()),
            res,
        ));
    }
    Ok(offsets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::segment_info::SegmentInfo;
    use crate::storage::MemoryStorage;

    fn infos() -> Arc<FieldInfos> {
        Arc::new(
            FieldInfos::new(vec![
                FieldInfo::new("title", 0),
                FieldInfo::new("blob", 1),
                FieldInfo::new("count", 2),
                FieldInfo::new("score", 3),
            ])
            .unwrap(),
        )
    }

    fn write_state(storage: &Arc<MemoryStorage>, max_doc: i32) -> SegmentWriteState {
        SegmentWriteState {
            storage: storage.clone(),
            segment_name: "_0".to_string(),
            max_doc,
            field_infos: infos(),
            segment_suffix: String::new(),
        }
    }

    fn read_state(storage: &Arc<MemoryStorage>, max_doc: i32) -> SegmentReadState {
        SegmentReadState {
            storage: storage.clone(),
            segment_info: Arc::new(SegmentInfo::new("_0", max_doc)),
            field_infos: infos(),
            segment_suffix: String::new(),
        }
    }

    fn write_docs(storage: &Arc<MemoryStorage>) {
        let infos = infos();
        let mut writer = StoredFieldsWriter::new(&write_state(storage, 2)).unwrap();
        writer.start_document(4).unwrap();
        writer
            .write_field(infos.field_info("title").unwrap(), &StoredValue::String("line\none".into()))
            .unwrap();
        writer
            .write_field(infos.field_info("blob").unwrap(), &StoredValue::Binary(vec![0, 10, 92, 255]))
            .unwrap();
        writer
            .write_field(infos.field_info("count").unwrap(), &StoredValue::Long(-42))
            .unwrap();
        writer
            .write_field(infos.field_info("score").unwrap(), &StoredValue::Float(0.1))
            .unwrap();
        writer.start_document(0).unwrap();
        writer.finish(2).unwrap();
    }

    #[test]
    fn test_round_trip() {
        let storage = Arc::new(MemoryStorage::new_default());
        write_docs(&storage);

        let mut reader = StoredFieldsReader::open(&read_state(&storage, 2)).unwrap();
        assert_eq!(reader.num_docs(), 2);

        let mut visitor = DocumentStoredFieldVisitor::new();
        reader.visit_document(0, &mut visitor).unwrap();
        assert_eq!(
            visitor.into_values(),
            vec![
                ("title".to_string(), StoredValue::String("line\none".into())),
                ("blob".to_string(), StoredValue::Binary(vec![0, 10, 92, 255])),
                ("count".to_string(), StoredValue::Long(-42)),
                ("score".to_string(), StoredValue::Float(0.1)),
            ]
        );

        let mut visitor = DocumentStoredFieldVisitor::new();
        reader.visit_document(1, &mut visitor).unwrap();
        assert!(visitor.into_values().is_empty());
        assert!(reader.visit_document(2, &mut DocumentStoredFieldVisitor::new()).is_err());
    }

    struct StopAfterFirst {
        seen: Vec<String>,
    }

    impl StoredFieldVisitor for StopAfterFirst {
        fn needs_field(&mut self, _field: &FieldInfo) -> Result<VisitStatus> {
            Ok(if self.seen.is_empty() {
                VisitStatus::Yes
            } else {
                VisitStatus::Stop
            })
        }

        fn visit(&mut self, field: &FieldInfo, _value: StoredValue) -> Result<()> {
            self.seen.push(field.name.clone());
            Ok(())
        }
    }

    #[test]
    fn test_visitor_filtering_and_stop() {
        let storage = Arc::new(MemoryStorage::new_default());
        write_docs(&storage);
        let reader = StoredFieldsReader::open(&read_state(&storage, 2)).unwrap();

        let mut clone = reader.try_clone().unwrap();
        let mut visitor = DocumentStoredFieldVisitor::with_fields(["count"]);
        clone.visit_document(0, &mut visitor).unwrap();
        assert_eq!(visitor.get("count"), Some(&StoredValue::Long(-42)));
        assert_eq!(visitor.get("title"), None);

        let mut stop = StopAfterFirst { seen: Vec::new() };
        clone.visit_document(0, &mut stop).unwrap();
        assert_eq!(stop.seen, vec!["title".to_string()]);
    }

    #[test]
    fn test_unknown_type_is_corruption() {
        let storage = Arc::new(MemoryStorage::new_default());
        let infos = infos();
        let mut writer = StoredFieldsWriter::new(&write_state(&storage, 1)).unwrap();
        writer.start_document(1).unwrap();
        writer
            .write_field(infos.field_info("count").unwrap(), &StoredValue::Int(7))
            .unwrap();
        writer.finish(1).unwrap();

        // Rewrite the tag and recompute a valid footer so only the tag is wrong.
        let bytes = storage.read_all("_0.fld").unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let body = text[..text.find("checksum ").unwrap()].replace("type int", "type quad");
        let mut out = ChecksumOutput::new(storage.create_output("_0.fld").unwrap(), "_0.fld");
        std::io::Write::write_all(&mut out, body.as_bytes()).unwrap();
        write_checksum(&mut out).unwrap();
        out.close().unwrap();

        let mut reader = StoredFieldsReader::open(&read_state(&storage, 1)).unwrap();
        let err = reader
            .visit_document(0, &mut DocumentStoredFieldVisitor::new())
            .unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_finish_with_wrong_count_aborts() {
        let storage = Arc::new(MemoryStorage::new_default());
        let mut writer = StoredFieldsWriter::new(&write_state(&storage, 2)).unwrap();
        writer.start_document(0).unwrap();
        let err = writer.finish(2).unwrap_err();
        assert!(matches!(err, XiphosError::Invariant(_)));
        assert!(!storage.file_exists("_0.fld"));
    }

    #[test]
    fn test_abort_leaves_no_file() {
        let storage = Arc::new(MemoryStorage::new_default());
        let infos = infos();
        let mut writer = StoredFieldsWriter::new(&write_state(&storage, 2)).unwrap();
        writer.start_document(2).unwrap();
        writer
            .write_field(infos.field_info("title").unwrap(), &StoredValue::String("half".into()))
            .unwrap();
        writer.abort();
        assert!(!storage.file_exists("_0.fld"));
    }
}
