//! Doc-values reader.

use std::collections::BTreeMap;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use crate::codec::SegmentReadState;
use crate::codec::doc_values::{
    BinaryDocValues, DocsWithField, END, FIELD, HAS_VALUE, LENGTH, MAXLENGTH, MINVALUE, MISSING,
    NUMVALUES, NumericDocValues, ORDPATTERN, PATTERN, SortedDocValues, SortedSetDocValues, TYPE,
    binary_record_width, dictionary_record_width, numeric_record_width, ord_record_width,
};
use crate::codec::field_infos::DocValuesType;
use crate::codec::line::{ChecksumInput, LineBuf, check_footer, parse_bytes};
use crate::error::{Result, XiphosError};
use crate::storage::{SharedInput, StorageInput};

/// Header of one field, with the file pointer of its first record.
#[derive(Debug, Clone)]
struct FieldEntry {
    dv_type: DocValuesType,
    data_start: u64,
    min_value: i64,
    max_length: usize,
    pattern_len: usize,
    ord_pattern_len: usize,
    num_values: i64,
}

impl FieldEntry {
    /// Bytes of record data following the header.
    fn data_len(&self, max_doc: i32) -> u64 {
        let max_doc = max_doc as u64;
        match self.dv_type {
            DocValuesType::Numeric => numeric_record_width(self.pattern_len) * max_doc,
            DocValuesType::Binary => binary_record_width(self.pattern_len, self.max_length) * max_doc,
            DocValuesType::Sorted | DocValuesType::SortedSet => {
                self.dictionary_len() + ord_record_width(self.ord_pattern_len) * max_doc
            }
        }
    }

    fn dictionary_len(&self) -> u64 {
        dictionary_record_width(self.pattern_len, self.max_length) * self.num_values as u64
    }
}

/// A stream the field headers can be parsed from.
trait HeaderSource: Read {
    fn file_pointer(&mut self) -> Result<u64>;

    fn skip_data(&mut self, len: u64, resource: &str) -> Result<()>;
}

impl HeaderSource for Box<dyn StorageInput> {
    fn file_pointer(&mut self) -> Result<u64> {
        Ok(self.stream_position()?)
    }

    fn skip_data(&mut self, len: u64, _resource: &str) -> Result<()> {
        self.seek(SeekFrom::Current(len as i64))?;
        Ok(())
    }
}

impl<R: Read> HeaderSource for ChecksumInput<R> {
    fn file_pointer(&mut self) -> Result<u64> {
        Ok(self.position())
    }

    /// Reads through the data so it is covered by the checksum.
    fn skip_data(&mut self, len: u64, resource: &str) -> Result<()> {
        let copied = io::copy(&mut self.by_ref().take(len), &mut io::sink())?;
        if copied != len {
            return Err(XiphosError::corruption("truncated doc values data", resource));
        }
        Ok(())
    }
}

fn read_headers<S: HeaderSource>(
    input: &mut S,
    max_doc: i32,
    resource: &str,
) -> Result<BTreeMap<String, FieldEntry>> {
    let mut line = LineBuf::new();
    let mut fields = BTreeMap::new();
    loop {
        line.read(input, resource)?;
        if line.as_bytes() == END.as_bytes() {
            break;
        }
        let name = line.string(FIELD, resource)?;
        line.read(input, resource)?;
        let dv_type: DocValuesType = line
            .string(TYPE, resource)?
            .parse()
            .map_err(|e: XiphosError| XiphosError::corruption(e.to_string(), resource))?;

        let mut entry = FieldEntry {
            dv_type,
            data_start: 0,
            min_value: 0,
            max_length: 0,
            pattern_len: 0,
            ord_pattern_len: 0,
            num_values: 0,
        };
        match dv_type {
            DocValuesType::Numeric => {
                line.read(input, resource)?;
                entry.min_value = line.parse(MINVALUE, resource)?;
                line.read(input, resource)?;
                entry.pattern_len = line.expect(PATTERN, resource)?.len();
            }
            DocValuesType::Binary => {
                line.read(input, resource)?;
                entry.max_length = line.parse(MAXLENGTH, resource)?;
                line.read(input, resource)?;
                entry.pattern_len = line.expect(PATTERN, resource)?.len();
            }
            DocValuesType::Sorted | DocValuesType::SortedSet => {
                line.read(input, resource)?;
                entry.num_values = line.parse(NUMVALUES, resource)?;
                line.read(input, resource)?;
                entry.max_length = line.parse(MAXLENGTH, resource)?;
                line.read(input, resource)?;
                entry.pattern_len = line.expect(PATTERN, resource)?.len();
                line.read(input, resource)?;
                entry.ord_pattern_len = line.expect(ORDPATTERN, resource)?.len();
            }
        }
        if entry.num_values < 0 {
            return Err(XiphosError::corruption(
                format!("negative value count for field '{name}'"),
                resource,
            ));
        }
        entry.data_start = input.file_pointer()?;
        input.skip_data(entry.data_len(max_doc), resource)?;
        fields.insert(name, entry);
    }
    Ok(fields)
}

/// Random access to the doc-values columns of one segment.
#[derive(Debug)]
pub struct DocValuesReader {
    input: SharedInput,
    max_doc: i32,
    fields: BTreeMap<String, FieldEntry>,
}

impl DocValuesReader {
    /// Open `<segment>.<ext>` and index its field headers.
    pub fn open(state: &SegmentReadState, ext: &str) -> Result<Self> {
        let file_name = state.file_name(ext);
        let input = SharedInput::open(state.storage.as_ref(), &file_name)?;
        let max_doc = state.max_doc();
        let mut stream = input.clone_input()?;
        let fields = read_headers(&mut stream, max_doc, &file_name)?;
        log::debug!("opened {file_name} with {} doc values fields", fields.len());
        Ok(DocValuesReader {
            input,
            max_doc,
            fields,
        })
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Type of the column stored for `field`.
    pub fn field_type(&self, field: &str) -> Option<DocValuesType> {
        self.fields.get(field).map(|entry| entry.dv_type)
    }

    fn column(&self, field: &str, expected: DocValuesType) -> Result<Column> {
        let entry = self.fields.get(field).ok_or_else(|| {
            XiphosError::field(format!("no doc values for field '{field}' in {}", self.input.name()))
        })?;
        if entry.dv_type != expected {
            return Err(XiphosError::field(format!(
                "field '{field}' has {} doc values, not {expected}",
                entry.dv_type
            )));
        }
        Ok(Column {
            input: self.input.clone_input()?,
            resource: Arc::from(self.input.name()),
            entry: entry.clone(),
            max_doc: self.max_doc,
            line: LineBuf::new(),
        })
    }

    pub fn numeric(&self, field: &str) -> Result<Box<dyn NumericDocValues>> {
        Ok(Box::new(self.column(field, DocValuesType::Numeric)?))
    }

    pub fn binary(&self, field: &str) -> Result<Box<dyn BinaryDocValues>> {
        Ok(Box::new(self.column(field, DocValuesType::Binary)?))
    }

    pub fn sorted(&self, field: &str) -> Result<Box<dyn SortedDocValues>> {
        Ok(Box::new(self.column(field, DocValuesType::Sorted)?))
    }

    pub fn sorted_set(&self, field: &str) -> Result<Box<dyn SortedSetDocValues>> {
        Ok(Box::new(self.column(field, DocValuesType::SortedSet)?))
    }

    /// Which documents have a value for `field`, whatever its type.
    pub fn docs_with_field(&self, field: &str) -> Result<Box<dyn DocsWithField>> {
        let dv_type = self.field_type(field).ok_or_else(|| {
            XiphosError::field(format!("no doc values for field '{field}' in {}", self.input.name()))
        })?;
        Ok(Box::new(self.column(field, dv_type)?))
    }

    /// Re-read the whole file through a checksumming stream and verify the
    /// footer.
    pub fn check_integrity(&self) -> Result<()> {
        let mut input = ChecksumInput::new(self.input.clone_input()?);
        read_headers(&mut input, self.max_doc, self.input.name())?;
        check_footer(&mut input, self.input.name())
    }
}

/// One column with its own cursor, serving every doc-values view.
#[derive(Debug)]
struct Column {
    input: Box<dyn StorageInput>,
    resource: Arc<str>,
    entry: FieldEntry,
    max_doc: i32,
    line: LineBuf,
}

impl Column {
    fn check_doc(&self, doc: i32) -> Result<()> {
        if doc < 0 || doc >= self.max_doc {
            return Err(XiphosError::invalid_argument(format!(
                "document {doc} out of range (max_doc={})",
                self.max_doc
            )));
        }
        Ok(())
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        self.input.seek(SeekFrom::Start(self.entry.data_start + offset))?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<()> {
        self.line.read(&mut self.input, &self.resource)
    }

    /// Read a length line and the raw bytes that follow it.
    fn read_value(&mut self) -> Result<Vec<u8>> {
        self.read_line()?;
        let len: usize = self.line.parse(LENGTH, &self.resource)?;
        if len > self.entry.max_length {
            return Err(XiphosError::corruption(
                format!("value length {len} exceeds max length {}", self.entry.max_length),
                &self.resource,
            ));
        }
        let mut bytes = vec![0u8; len];
        self.input.read_exact(&mut bytes).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                XiphosError::corruption("unexpected end of file", &self.resource)
            }
            _ => XiphosError::Io(e),
        })?;
        Ok(bytes)
    }

    fn read_flag(&mut self) -> Result<bool> {
        self.read_line()?;
        match self.line.as_bytes() {
            [HAS_VALUE] => Ok(true),
            [MISSING] => Ok(false),
            other => Err(XiphosError::corruption(
                format!("expected T or F but got '{}'", String::from_utf8_lossy(other)),
                &self.resource,
            )),
        }
    }

    fn ord_record(&mut self, doc: i32) -> Result<()> {
        self.check_doc(doc)?;
        let offset = self.entry.dictionary_len() + ord_record_width(self.entry.ord_pattern_len) * doc as u64;
        self.seek(offset)?;
        self.read_line()
    }

    fn lookup(&mut self, ord: i64) -> Result<Vec<u8>> {
        if ord < 0 || ord >= self.entry.num_values {
            return Err(XiphosError::invalid_argument(format!(
                "ordinal {ord} out of range (value count {})",
                self.entry.num_values
            )));
        }
        let width = dictionary_record_width(self.entry.pattern_len, self.entry.max_length);
        self.seek(width * ord as u64)?;
        self.read_value()
    }

    fn sorted_set_ords(&mut self, doc: i32) -> Result<Vec<i64>> {
        self.ord_record(doc)?;
        let text = std::str::from_utf8(self.line.as_bytes())
            .map_err(|_| XiphosError::corruption("invalid ordinal list", &self.resource))?
            .trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        text.split(',')
            .map(|ord| parse_bytes(ord.as_bytes(), &self.resource))
            .collect()
    }
}

impl NumericDocValues for Column {
    fn get(&mut self, doc: i32) -> Result<i64> {
        self.check_doc(doc)?;
        self.seek(numeric_record_width(self.entry.pattern_len) * doc as u64)?;
        self.read_line()?;
        let delta: i128 = parse_bytes(self.line.as_bytes(), &self.resource)?;
        i64::try_from(self.entry.min_value as i128 + delta).map_err(|_| {
            XiphosError::corruption(format!("numeric value out of range for document {doc}"), &self.resource)
        })
    }
}

impl BinaryDocValues for Column {
    fn get(&mut self, doc: i32) -> Result<Vec<u8>> {
        self.check_doc(doc)?;
        let width = binary_record_width(self.entry.pattern_len, self.entry.max_length);
        self.seek(width * doc as u64)?;
        self.read_value()
    }
}

impl SortedDocValues for Column {
    fn ord(&mut self, doc: i32) -> Result<i32> {
        self.ord_record(doc)?;
        let stored: i64 = parse_bytes(self.line.as_bytes(), &self.resource)?;
        Ok((stored - 1) as i32)
    }

    fn lookup_ord(&mut self, ord: i32) -> Result<Vec<u8>> {
        self.lookup(ord as i64)
    }

    fn value_count(&self) -> i32 {
        self.entry.num_values as i32
    }
}

impl SortedSetDocValues for Column {
    fn ords(&mut self, doc: i32) -> Result<Vec<i64>> {
        self.sorted_set_ords(doc)
    }

    fn lookup_ord(&mut self, ord: i64) -> Result<Vec<u8>> {
        self.lookup(ord)
    }

    fn value_count(&self) -> i64 {
        self.entry.num_values
    }
}

impl DocsWithField for Column {
    fn has_value(&mut self, doc: i32) -> Result<bool> {
        self.check_doc(doc)?;
        match self.entry.dv_type {
            DocValuesType::Numeric => {
                let width = numeric_record_width(self.entry.pattern_len);
                self.seek(width * doc as u64 + self.entry.pattern_len as u64 + 1)?;
                self.read_flag()
            }
            DocValuesType::Binary => {
                let width = binary_record_width(self.entry.pattern_len, self.entry.max_length);
                let flag_offset = dictionary_record_width(self.entry.pattern_len, self.entry.max_length);
                self.seek(width * doc as u64 + flag_offset)?;
                self.read_flag()
            }
            DocValuesType::Sorted => Ok(SortedDocValues::ord(self, doc)? >= 0),
            DocValuesType::SortedSet => Ok(!self.sorted_set_ords(doc)?.is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::doc_values::DocValuesWriter;
    use crate::codec::field_infos::{FieldInfo, FieldInfos};
    use crate::codec::segment_info::SegmentInfo;
    use crate::codec::{DOC_VALUES_EXTENSION, SegmentWriteState};
    use crate::storage::{MemoryStorage, Storage};

    fn states(storage: &Arc<MemoryStorage>, max_doc: i32) -> (SegmentWriteState, SegmentReadState) {
        let infos = Arc::new(FieldInfos::default());
        (
            SegmentWriteState {
                storage: storage.clone(),
                segment_name: "_0".to_string(),
                max_doc,
                field_infos: Arc::clone(&infos),
                segment_suffix: String::new(),
            },
            SegmentReadState {
                storage: storage.clone(),
                segment_info: Arc::new(SegmentInfo::new("_0", max_doc)),
                field_infos: infos,
                segment_suffix: String::new(),
            },
        )
    }

    fn write_all_types(storage: &Arc<MemoryStorage>) -> SegmentReadState {
        let (write_state, read_state) = states(storage, 4);
        let mut writer = DocValuesWriter::new(&write_state, DOC_VALUES_EXTENSION).unwrap();
        writer
            .add_numeric_field(&FieldInfo::new("price", 0), &[Some(-5), None, Some(1200), Some(7)])
            .unwrap();
        writer
            .add_binary_field(
                &FieldInfo::new("blob", 1),
                &[Some(b"a\nb".to_vec()), Some(Vec::new()), None, Some(b"xyz  ".to_vec())],
            )
            .unwrap();
        writer
            .add_sorted_field(
                &FieldInfo::new("color", 2),
                &[b"blue".to_vec(), b"red".to_vec()],
                &[1, -1, 0, 1],
            )
            .unwrap();
        writer
            .add_sorted_set_field(
                &FieldInfo::new("tags", 3),
                &[b"a".to_vec(), b"b".to_vec(), b"c".to_vec()],
                &[vec![0, 2], vec![], vec![1], vec![0, 1, 2]],
            )
            .unwrap();
        writer.finish().unwrap();
        read_state
    }

    #[test]
    fn test_numeric_round_trip_and_pattern_width() {
        let storage = Arc::new(MemoryStorage::new_default());
        let state = write_all_types(&storage);
        let reader = DocValuesReader::open(&state, DOC_VALUES_EXTENSION).unwrap();

        let mut values = reader.numeric("price").unwrap();
        assert_eq!(values.get(0).unwrap(), -5);
        assert_eq!(values.get(1).unwrap(), 0);
        assert_eq!(values.get(2).unwrap(), 1200);
        assert_eq!(values.get(3).unwrap(), 7);
        assert!(values.get(4).is_err());

        let mut docs = reader.docs_with_field("price").unwrap();
        assert!(docs.has_value(0).unwrap());
        assert!(!docs.has_value(1).unwrap());

        let text = String::from_utf8_lossy(&storage.read_all("_0.dat").unwrap()).to_string();
        assert!(text.contains("  minvalue -5\n  pattern 0000\n0000\nT\n0005\nF\n1205\nT\n"));
    }

    #[test]
    fn test_binary_round_trip() {
        let storage = Arc::new(MemoryStorage::new_default());
        let state = write_all_types(&storage);
        let reader = DocValuesReader::open(&state, DOC_VALUES_EXTENSION).unwrap();

        let mut values = reader.binary("blob").unwrap();
        assert_eq!(values.get(0).unwrap(), b"a\nb");
        assert_eq!(values.get(1).unwrap(), b"");
        assert_eq!(values.get(2).unwrap(), b"");
        assert_eq!(values.get(3).unwrap(), b"xyz  ");

        let mut docs = reader.docs_with_field("blob").unwrap();
        assert!(docs.has_value(1).unwrap());
        assert!(!docs.has_value(2).unwrap());
    }

    #[test]
    fn test_sorted_round_trip() {
        let storage = Arc::new(MemoryStorage::new_default());
        let state = write_all_types(&storage);
        let reader = DocValuesReader::open(&state, DOC_VALUES_EXTENSION).unwrap();

        let mut values = reader.sorted("color").unwrap();
        assert_eq!(values.value_count(), 2);
        assert_eq!(values.ord(0).unwrap(), 1);
        assert_eq!(values.ord(1).unwrap(), -1);
        assert_eq!(values.lookup_ord(0).unwrap(), b"blue");
        assert_eq!(values.get(3).unwrap(), Some(b"red".to_vec()));
        assert_eq!(values.get(1).unwrap(), None);
        assert_eq!(values.lookup_term(b"red").unwrap(), 1);
        assert_eq!(values.lookup_term(b"green").unwrap(), -2);

        let mut docs = reader.docs_with_field("color").unwrap();
        assert!(!docs.has_value(1).unwrap());
        assert!(docs.has_value(2).unwrap());
    }

    #[test]
    fn test_sorted_set_round_trip_with_empty_lists() {
        let storage = Arc::new(MemoryStorage::new_default());
        let state = write_all_types(&storage);
        let reader = DocValuesReader::open(&state, DOC_VALUES_EXTENSION).unwrap();

        let mut values = reader.sorted_set("tags").unwrap();
        assert_eq!(values.value_count(), 3);
        assert_eq!(values.ords(0).unwrap(), vec![0, 2]);
        assert!(values.ords(1).unwrap().is_empty());
        assert_eq!(values.ords(3).unwrap(), vec![0, 1, 2]);
        assert_eq!(values.lookup_ord(2).unwrap(), b"c");
        assert_eq!(values.lookup_term(b"b").unwrap(), 1);

        let text = String::from_utf8_lossy(&storage.read_all("_0.dat").unwrap()).to_string();
        assert!(text.contains("  ordpattern XXXXX\n"));
    }

    #[test]
    fn test_wrong_type_and_missing_field() {
        let storage = Arc::new(MemoryStorage::new_default());
        let state = write_all_types(&storage);
        let reader = DocValuesReader::open(&state, DOC_VALUES_EXTENSION).unwrap();
        assert!(reader.numeric("color").is_err());
        assert!(reader.numeric("missing").is_err());
        assert_eq!(reader.field_type("tags"), Some(DocValuesType::SortedSet));
    }

    #[test]
    fn test_check_integrity_detects_flipped_byte() {
        let storage = Arc::new(MemoryStorage::new_default());
        let state = write_all_types(&storage);
        let reader = DocValuesReader::open(&state, DOC_VALUES_EXTENSION).unwrap();
        reader.check_integrity().unwrap();

        let mut bytes = storage.read_all("_0.dat").unwrap();
        let pos = bytes.windows(3).position(|w| w == b"xyz").unwrap();
        bytes[pos] = b'q';
        storage.overwrite("_0.dat", bytes);

        let reader = DocValuesReader::open(&state, DOC_VALUES_EXTENSION).unwrap();
        assert!(reader.check_integrity().unwrap_err().is_corruption());
    }

    #[test]
    fn test_empty_segment_and_invariants() {
        let storage = Arc::new(MemoryStorage::new_default());
        let (write_state, read_state) = states(&storage, 0);
        let mut writer = DocValuesWriter::new(&write_state, DOC_VALUES_EXTENSION).unwrap();
        let field = FieldInfo::new("n", 0);
        writer.add_numeric_field(&field, &[]).unwrap();
        assert!(matches!(
            writer.add_numeric_field(&field, &[]).unwrap_err(),
            XiphosError::Invariant(_)
        ));
        assert!(writer
            .add_sorted_field(&FieldInfo::new("s", 1), &[b"b".to_vec(), b"a".to_vec()], &[])
            .is_err());
        assert!(writer.add_numeric_field(&FieldInfo::new("m", 2), &[Some(1)]).is_err());
        writer.finish().unwrap();

        let reader = DocValuesReader::open(&read_state, DOC_VALUES_EXTENSION).unwrap();
        assert!(reader.has_field("n"));
        reader.check_integrity().unwrap();
    }
}
