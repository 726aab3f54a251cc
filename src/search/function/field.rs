//! Sources that read a field of each document.

use std::sync::Arc;

use crate::codec::doc_values::{BinaryDocValues, DocsWithField, NumericDocValues, SortedDocValues};
use crate::error::{Result, XiphosError};
use crate::index::field_cache::NumericKind;
use crate::index::reader::LeafReaderContext;
use crate::search::function::{FunctionValues, MutableValue, ValueContext, ValueSource, tag_error};
use crate::util::bits::{Bits, FixedBitSet};

/// A numeric field, read from NUMERIC doc values when the leaf has them and
/// otherwise by uninverting the field's decimal terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumericFieldSource {
    field: String,
    kind: NumericKind,
}

impl NumericFieldSource {
    pub fn new(field: impl Into<String>, kind: NumericKind) -> Self {
        NumericFieldSource {
            field: field.into(),
            kind,
        }
    }

    pub fn int(field: impl Into<String>) -> Self {
        NumericFieldSource::new(field, NumericKind::Int)
    }

    pub fn long(field: impl Into<String>) -> Self {
        NumericFieldSource::new(field, NumericKind::Long)
    }

    pub fn float(field: impl Into<String>) -> Self {
        NumericFieldSource::new(field, NumericKind::Float)
    }

    pub fn double(field: impl Into<String>) -> Self {
        NumericFieldSource::new(field, NumericKind::Double)
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    fn column(&self, leaf: &LeafReaderContext) -> Result<(Column, Presence)> {
        let reader = leaf.reader();
        if let Some(values) = reader.numeric_doc_values(&self.field)? {
            let presence = Presence::DocValues(reader.docs_with_field(&self.field)?);
            return Ok((Column::DocValues(values), presence));
        }
        let cache = reader.field_cache();
        let column = if self.kind.is_integral() {
            Column::Longs(cache.longs(reader, &self.field, self.kind)?)
        } else {
            Column::Doubles(cache.doubles(reader, &self.field, self.kind)?)
        };
        let presence = Presence::Bits(cache.docs_with_field(reader, &self.field)?);
        Ok((column, presence))
    }
}

impl ValueSource for NumericFieldSource {
    fn get_values(&self, _context: &ValueContext, leaf: &LeafReaderContext) -> Result<Box<dyn FunctionValues>> {
        let description = self.description();
        let (column, presence) = self.column(leaf).map_err(|e| tag_error(&description, e))?;
        Ok(Box::new(NumericFieldValues {
            description,
            kind: self.kind,
            column,
            presence,
        }))
    }

    fn description(&self) -> String {
        format!("{}({})", self.kind, self.field)
    }
}

#[derive(Debug)]
enum Column {
    DocValues(Box<dyn NumericDocValues>),
    Longs(Arc<Vec<i64>>),
    Doubles(Arc<Vec<f64>>),
}

#[derive(Debug)]
enum Presence {
    DocValues(Option<Box<dyn DocsWithField>>),
    Bits(Arc<FixedBitSet>),
}

#[derive(Debug)]
struct NumericFieldValues {
    description: String,
    kind: NumericKind,
    column: Column,
    presence: Presence,
}

/// Index into a cached column, rejecting documents outside the leaf.
fn slot(description: &str, doc: i32, len: usize) -> Result<usize> {
    if doc < 0 || doc as usize >= len {
        return Err(XiphosError::function(format!(
            "{description}: document {doc} out of range for {len} documents"
        )));
    }
    Ok(doc as usize)
}

impl FunctionValues for NumericFieldValues {
    fn double_val(&mut self, doc: i32) -> Result<f64> {
        let description = &self.description;
        match &mut self.column {
            Column::DocValues(values) => Ok(values.get(doc).map_err(|e| tag_error(description, e))? as f64),
            Column::Longs(values) => Ok(values[slot(description, doc, values.len())?] as f64),
            Column::Doubles(values) => Ok(values[slot(description, doc, values.len())?]),
        }
    }

    fn long_val(&mut self, doc: i32) -> Result<i64> {
        let description = &self.description;
        match &mut self.column {
            Column::DocValues(values) => values.get(doc).map_err(|e| tag_error(description, e)),
            Column::Longs(values) => Ok(values[slot(description, doc, values.len())?]),
            Column::Doubles(values) => Ok(values[slot(description, doc, values.len())?] as i64),
        }
    }

    fn int_val(&mut self, doc: i32) -> Result<i32> {
        Ok(self.long_val(doc)? as i32)
    }

    fn str_val(&mut self, doc: i32) -> Result<Option<String>> {
        Ok(Some(match self.kind {
            NumericKind::Int => self.int_val(doc)?.to_string(),
            NumericKind::Long => self.long_val(doc)?.to_string(),
            NumericKind::Float => self.float_val(doc)?.to_string(),
            NumericKind::Double => self.double_val(doc)?.to_string(),
        }))
    }

    fn exists(&mut self, doc: i32) -> Result<bool> {
        if self.double_val(doc)? != 0.0 {
            return Ok(true);
        }
        match &mut self.presence {
            Presence::DocValues(Some(docs)) => docs.has_value(doc).map_err(|e| tag_error(&self.description, e)),
            Presence::DocValues(None) => Ok(false),
            Presence::Bits(bits) => Ok(bits.get(doc as usize)),
        }
    }

    fn describe(&mut self, doc: i32) -> Result<String> {
        let val = self.str_val(doc)?.unwrap_or_default();
        Ok(format!("{}={}", self.description, val))
    }

    fn fill_value(&mut self, doc: i32, value: &mut MutableValue) -> Result<()> {
        *value = if !self.exists(doc)? {
            MutableValue::Missing
        } else {
            match self.kind {
                NumericKind::Int => MutableValue::Int(self.int_val(doc)?),
                NumericKind::Long => MutableValue::Long(self.long_val(doc)?),
                NumericKind::Float => MutableValue::Float(self.float_val(doc)?),
                NumericKind::Double => MutableValue::Double(self.double_val(doc)?),
            }
        };
        Ok(())
    }
}

/// The bytes of a field, from SORTED doc values or else BINARY doc values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BytesRefFieldSource {
    field: String,
}

impl BytesRefFieldSource {
    pub fn new(field: impl Into<String>) -> Self {
        BytesRefFieldSource { field: field.into() }
    }
}

impl ValueSource for BytesRefFieldSource {
    fn get_values(&self, _context: &ValueContext, leaf: &LeafReaderContext) -> Result<Box<dyn FunctionValues>> {
        let reader = leaf.reader();
        let column = if let Some(sorted) = reader.sorted_doc_values(&self.field)? {
            BytesColumn::Sorted(sorted)
        } else if let Some(binary) = reader.binary_doc_values(&self.field)? {
            BytesColumn::Binary(binary, reader.docs_with_field(&self.field)?)
        } else {
            BytesColumn::Empty
        };
        Ok(Box::new(BytesValues {
            description: self.description(),
            column,
        }))
    }

    fn description(&self) -> String {
        self.field.clone()
    }
}

#[derive(Debug)]
enum BytesColumn {
    Sorted(Box<dyn SortedDocValues>),
    Binary(Box<dyn BinaryDocValues>, Option<Box<dyn DocsWithField>>),
    Empty,
}

#[derive(Debug)]
struct BytesValues {
    description: String,
    column: BytesColumn,
}

impl FunctionValues for BytesValues {
    fn double_val(&mut self, _doc: i32) -> Result<f64> {
        Err(XiphosError::unsupported(format!("{} has no numeric value", self.description)))
    }

    fn bool_val(&mut self, doc: i32) -> Result<bool> {
        self.exists(doc)
    }

    fn bytes_val(&mut self, doc: i32) -> Result<Option<Vec<u8>>> {
        if !self.exists(doc)? {
            return Ok(None);
        }
        match &mut self.column {
            BytesColumn::Sorted(sorted) => sorted.get(doc),
            BytesColumn::Binary(binary, _) => binary.get(doc).map(Some),
            BytesColumn::Empty => Ok(None),
        }
    }

    fn str_val(&mut self, doc: i32) -> Result<Option<String>> {
        Ok(self
            .bytes_val(doc)?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    fn exists(&mut self, doc: i32) -> Result<bool> {
        match &mut self.column {
            BytesColumn::Sorted(sorted) => Ok(sorted.ord(doc)? >= 0),
            BytesColumn::Binary(_, Some(docs)) => docs.has_value(doc),
            BytesColumn::Binary(_, None) | BytesColumn::Empty => Ok(false),
        }
    }

    fn ord_val(&mut self, doc: i32) -> Result<i32> {
        match &mut self.column {
            BytesColumn::Sorted(sorted) => sorted.ord(doc),
            _ => Err(XiphosError::unsupported(format!("{} has no ordinals", self.description))),
        }
    }

    fn num_ord(&self) -> Result<i32> {
        match &self.column {
            BytesColumn::Sorted(sorted) => Ok(sorted.value_count()),
            _ => Err(XiphosError::unsupported(format!("{} has no ordinals", self.description))),
        }
    }

    fn describe(&mut self, doc: i32) -> Result<String> {
        let val = self.str_val(doc)?.unwrap_or_default();
        Ok(format!("{}='{}'", self.description, val))
    }

    fn fill_value(&mut self, doc: i32, value: &mut MutableValue) -> Result<()> {
        *value = match self.str_val(doc)? {
            Some(s) => MutableValue::Str(s),
            None => MutableValue::Missing,
        };
        Ok(())
    }
}

/// `ord(field)`: 1-based position of the document's value in the leaf's
/// sorted dictionary, 0 for documents without a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrdFieldSource {
    field: String,
}

impl OrdFieldSource {
    pub fn new(field: impl Into<String>) -> Self {
        OrdFieldSource { field: field.into() }
    }
}

impl ValueSource for OrdFieldSource {
    fn get_values(&self, _context: &ValueContext, leaf: &LeafReaderContext) -> Result<Box<dyn FunctionValues>> {
        Ok(Box::new(OrdValues {
            description: self.description(),
            sorted: leaf.reader().sorted_doc_values(&self.field)?,
            reverse: false,
        }))
    }

    fn description(&self) -> String {
        format!("ord({})", self.field)
    }
}

/// `rord(field)`: `value_count - ord`, so the largest value gets 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReverseOrdFieldSource {
    field: String,
}

impl ReverseOrdFieldSource {
    pub fn new(field: impl Into<String>) -> Self {
        ReverseOrdFieldSource { field: field.into() }
    }
}

impl ValueSource for ReverseOrdFieldSource {
    fn get_values(&self, _context: &ValueContext, leaf: &LeafReaderContext) -> Result<Box<dyn FunctionValues>> {
        Ok(Box::new(OrdValues {
            description: self.description(),
            sorted: leaf.reader().sorted_doc_values(&self.field)?,
            reverse: true,
        }))
    }

    fn description(&self) -> String {
        format!("rord({})", self.field)
    }
}

#[derive(Debug)]
struct OrdValues {
    description: String,
    sorted: Option<Box<dyn SortedDocValues>>,
    reverse: bool,
}

impl FunctionValues for OrdValues {
    fn double_val(&mut self, doc: i32) -> Result<f64> {
        Ok(self.int_val(doc)? as f64)
    }

    fn long_val(&mut self, doc: i32) -> Result<i64> {
        Ok(self.int_val(doc)? as i64)
    }

    fn int_val(&mut self, doc: i32) -> Result<i32> {
        let Some(sorted) = self.sorted.as_mut() else {
            return Ok(if self.reverse { 1 } else { 0 });
        };
        let ord = sorted.ord(doc)?;
        Ok(if self.reverse { sorted.value_count() - ord } else { ord + 1 })
    }

    fn str_val(&mut self, doc: i32) -> Result<Option<String>> {
        Ok(Some(self.int_val(doc)?.to_string()))
    }

    fn exists(&mut self, doc: i32) -> Result<bool> {
        match self.sorted.as_mut() {
            Some(sorted) => Ok(sorted.ord(doc)? >= 0),
            None => Ok(false),
        }
    }

    fn ord_val(&mut self, doc: i32) -> Result<i32> {
        self.int_val(doc)
    }

    fn num_ord(&self) -> Result<i32> {
        Ok(self.sorted.as_ref().map_or(0, |sorted| sorted.value_count()))
    }

    fn describe(&mut self, doc: i32) -> Result<String> {
        let val = self.int_val(doc)?;
        Ok(format!("{}={}", self.description, val))
    }

    fn fill_value(&mut self, doc: i32, value: &mut MutableValue) -> Result<()> {
        *value = MutableValue::Int(self.int_val(doc)?);
        Ok(())
    }
}
