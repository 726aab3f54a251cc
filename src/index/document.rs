//! Documents and fields.
//!
//! A [`Document`] is an ordered list of [`Field`]s. Each field carries a
//! value and a [`FieldType`] saying how the segment writer should treat it:
//! whether it is inverted, tokenized, stored, given term vectors or written
//! as a doc-values column. The same name may appear several times in one
//! document.

use crate::analysis::token::Token;
use crate::codec::field_infos::{DocValuesType, IndexOptions};
use crate::codec::stored_fields::StoredValue;

/// How a field is indexed and stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldType {
    /// Invert the value into postings, with these options.
    pub index_options: Option<IndexOptions>,
    /// Run text values through the analyzer. Untokenized values are indexed
    /// as a single term.
    pub tokenized: bool,
    pub stored: bool,
    pub store_term_vectors: bool,
    pub store_term_vector_positions: bool,
    pub store_term_vector_offsets: bool,
    pub store_term_vector_payloads: bool,
    pub omit_norms: bool,
    pub doc_values_type: Option<DocValuesType>,
}

impl FieldType {
    /// A field that is neither indexed, stored nor given doc values.
    pub fn empty() -> Self {
        FieldType {
            index_options: None,
            tokenized: false,
            stored: false,
            store_term_vectors: false,
            store_term_vector_positions: false,
            store_term_vector_offsets: false,
            store_term_vector_payloads: false,
            omit_norms: false,
            doc_values_type: None,
        }
    }

    /// Analyzed full text with positions.
    pub fn text(stored: bool) -> Self {
        FieldType {
            index_options: Some(IndexOptions::DocsAndFreqsAndPositions),
            tokenized: true,
            stored,
            ..FieldType::empty()
        }
    }

    /// A single untokenized term without norms.
    pub fn string(stored: bool) -> Self {
        FieldType {
            index_options: Some(IndexOptions::DocsOnly),
            stored,
            omit_norms: true,
            ..FieldType::empty()
        }
    }

    /// Stored only, not searchable.
    pub fn stored_only() -> Self {
        FieldType {
            stored: true,
            ..FieldType::empty()
        }
    }

    /// A doc-values column of `dv_type`.
    pub fn doc_values(dv_type: DocValuesType) -> Self {
        FieldType {
            doc_values_type: Some(dv_type),
            ..FieldType::empty()
        }
    }

    pub fn is_indexed(&self) -> bool {
        self.index_options.is_some()
    }
}

/// The value carried by a field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Binary(Vec<u8>),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    /// Tokens produced outside the writer's analyzer.
    Tokens(Vec<Token>),
}

impl FieldValue {
    /// The value as written to stored fields. Pre-analyzed tokens cannot be
    /// stored.
    pub fn to_stored(&self) -> Option<StoredValue> {
        Some(match self {
            FieldValue::Text(s) => StoredValue::String(s.clone()),
            FieldValue::Binary(b) => StoredValue::Binary(b.clone()),
            FieldValue::Int(v) => StoredValue::Int(*v),
            FieldValue::Long(v) => StoredValue::Long(*v),
            FieldValue::Float(v) => StoredValue::Float(*v),
            FieldValue::Double(v) => StoredValue::Double(*v),
            FieldValue::Tokens(_) => return None,
        })
    }

    /// The single term indexed for an untokenized value. Numbers are indexed
    /// in decimal so that they can be uninverted.
    pub fn to_term(&self) -> Option<Vec<u8>> {
        Some(match self {
            FieldValue::Text(s) => s.as_bytes().to_vec(),
            FieldValue::Binary(b) => b.clone(),
            FieldValue::Int(v) => v.to_string().into_bytes(),
            FieldValue::Long(v) => v.to_string().into_bytes(),
            FieldValue::Float(v) => v.to_string().into_bytes(),
            FieldValue::Double(v) => v.to_string().into_bytes(),
            FieldValue::Tokens(_) => return None,
        })
    }

    /// The value as a doc-values number.
    pub fn to_numeric(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v as i64),
            FieldValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as doc-values bytes.
    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        match self {
            FieldValue::Text(s) => Some(s.as_bytes().to_vec()),
            FieldValue::Binary(b) => Some(b.clone()),
            _ => None,
        }
    }
}

/// A named value with its indexing options.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
    pub value: FieldValue,
    /// Multiplied into the field's length norm.
    pub boost: f32,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType, value: FieldValue) -> Self {
        Field {
            name: name.into(),
            field_type,
            value,
            boost: 1.0,
        }
    }

    /// Analyzed text.
    pub fn text(name: impl Into<String>, value: impl Into<String>, stored: bool) -> Self {
        Field::new(name, FieldType::text(stored), FieldValue::Text(value.into()))
    }

    /// A single term, such as an id.
    pub fn string(name: impl Into<String>, value: impl Into<String>, stored: bool) -> Self {
        Field::new(name, FieldType::string(stored), FieldValue::Text(value.into()))
    }

    /// Tokens with positions, offsets and payloads supplied by the caller.
    pub fn tokens(name: impl Into<String>, tokens: Vec<Token>) -> Self {
        let field_type = FieldType {
            index_options: Some(IndexOptions::DocsAndFreqsAndPositionsAndOffsets),
            tokenized: true,
            ..FieldType::empty()
        };
        Field::new(name, field_type, FieldValue::Tokens(tokens))
    }

    /// A 32-bit integer indexed as a decimal term.
    pub fn int(name: impl Into<String>, value: i32, stored: bool) -> Self {
        Field::new(name, FieldType::string(stored), FieldValue::Int(value))
    }

    /// A 64-bit integer indexed as a decimal term.
    pub fn long(name: impl Into<String>, value: i64, stored: bool) -> Self {
        Field::new(name, FieldType::string(stored), FieldValue::Long(value))
    }

    /// A 32-bit float indexed as a decimal term.
    pub fn float(name: impl Into<String>, value: f32, stored: bool) -> Self {
        Field::new(name, FieldType::string(stored), FieldValue::Float(value))
    }

    /// A 64-bit float indexed as a decimal term.
    pub fn double(name: impl Into<String>, value: f64, stored: bool) -> Self {
        Field::new(name, FieldType::string(stored), FieldValue::Double(value))
    }

    /// A stored-only value.
    pub fn stored(name: impl Into<String>, value: FieldValue) -> Self {
        Field::new(name, FieldType::stored_only(), value)
    }

    pub fn numeric_doc_values(name: impl Into<String>, value: i64) -> Self {
        Field::new(
            name,
            FieldType::doc_values(DocValuesType::Numeric),
            FieldValue::Long(value),
        )
    }

    pub fn binary_doc_values(name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Field::new(
            name,
            FieldType::doc_values(DocValuesType::Binary),
            FieldValue::Binary(value.into()),
        )
    }

    pub fn sorted_doc_values(name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Field::new(
            name,
            FieldType::doc_values(DocValuesType::Sorted),
            FieldValue::Binary(value.into()),
        )
    }

    /// One value of a sorted-set column. Add the field once per value.
    pub fn sorted_set_doc_values(name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Field::new(
            name,
            FieldType::doc_values(DocValuesType::SortedSet),
            FieldValue::Binary(value.into()),
        )
    }

    /// Record term vectors for this field.
    pub fn with_term_vectors(mut self, positions: bool, offsets: bool, payloads: bool) -> Self {
        self.field_type.store_term_vectors = true;
        self.field_type.store_term_vector_positions = positions;
        self.field_type.store_term_vector_offsets = offsets;
        self.field_type.store_term_vector_payloads = payloads;
        self
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    pub fn without_norms(mut self) -> Self {
        self.field_type.omit_norms = true;
        self
    }
}

/// An ordered collection of fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    fields: Vec<Field>,
}

impl Document {
    pub fn new() -> Self {
        Document::default()
    }

    pub fn add(&mut self, field: Field) -> &mut Self {
        self.fields.push(field);
        self
    }

    /// Builder-style [`Document::add`].
    pub fn with(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// The first field named `name`.
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Every field named `name`, in insertion order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Field> + 'a {
        self.fields.iter().filter(move |f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
