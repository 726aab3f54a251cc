//! Doc-values writer.

use std::io::Write;
use std::sync::Arc;

use ahash::AHashSet;

use crate::codec::SegmentWriteState;
use crate::codec::doc_values::{
    END, FIELD, HAS_VALUE, LENGTH, MAXLENGTH, MINVALUE, MISSING, NUMVALUES, ORDPATTERN, PATTERN,
    TYPE,
};
use crate::codec::field_infos::{DocValuesType, FieldInfo};
use crate::codec::line::{
    ChecksumOutput, decimal_width, write_checksum, write_line, write_newline, write_str, zero_pad,
};
use crate::error::{Result, XiphosError};
use crate::storage::Storage;

/// Writes doc-values columns, one field at a time.
///
/// Every column must hold exactly `max_doc` entries.
#[derive(Debug)]
pub struct DocValuesWriter {
    storage: Arc<dyn Storage>,
    file_name: String,
    out: Option<ChecksumOutput>,
    max_doc: i32,
    written_fields: AHashSet<String>,
}

impl DocValuesWriter {
    /// Create `<segment>.<ext>`.
    pub fn new(state: &SegmentWriteState, ext: &str) -> Result<Self> {
        let file_name = state.file_name(ext);
        let output = state.storage.create_output(&file_name)?;
        Ok(DocValuesWriter {
            storage: Arc::clone(&state.storage),
            out: Some(ChecksumOutput::new(output, file_name.clone())),
            file_name,
            max_doc: state.max_doc,
            written_fields: AHashSet::new(),
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    fn start_field(&mut self, field: &FieldInfo, dv_type: DocValuesType, len: usize) -> Result<&mut ChecksumOutput> {
        if len != self.max_doc as usize {
            return Err(XiphosError::invariant(format!(
                "field '{}' has {len} values but the segment has {} documents",
                field.name, self.max_doc
            )));
        }
        if !self.written_fields.insert(field.name.clone()) {
            return Err(XiphosError::invariant(format!(
                "doc values for field '{}' were already written",
                field.name
            )));
        }
        let out = self
            .out
            .as_mut()
            .ok_or_else(|| XiphosError::invariant("doc values writer already closed"))?;
        write_line(out, FIELD, &field.name)?;
        write_line(out, TYPE, dv_type)?;
        Ok(out)
    }

    /// Write a numeric column. `None` marks a document without a value.
    pub fn add_numeric_field(&mut self, field: &FieldInfo, values: &[Option<i64>]) -> Result<()> {
        let (min_value, max_value) = if values.is_empty() {
            (0, 0)
        } else {
            values
                .iter()
                .map(|v| v.unwrap_or(0))
                .fold((i64::MAX, i64::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)))
        };
        let width = decimal_width((max_value as i128 - min_value as i128) as u128);

        let out = self.start_field(field, DocValuesType::Numeric, values.len())?;
        write_line(out, MINVALUE, min_value)?;
        write_line(out, PATTERN, "0".repeat(width))?;
        for value in values {
            let delta = value.unwrap_or(0) as i128 - min_value as i128;
            write_str(out, &zero_pad(delta, width))?;
            write_newline(out)?;
            write_flag(out, value.is_some())?;
        }
        Ok(())
    }

    /// Write a binary column. `None` marks a document without a value.
    pub fn add_binary_field(&mut self, field: &FieldInfo, values: &[Option<Vec<u8>>]) -> Result<()> {
        let max_length = values
            .iter()
            .map(|v| v.as_ref().map_or(0, Vec::len))
            .max()
            .unwrap_or(0);
        let width = decimal_width(max_length as u128);

        let out = self.start_field(field, DocValuesType::Binary, values.len())?;
        write_line(out, MAXLENGTH, max_length)?;
        write_line(out, PATTERN, "0".repeat(width))?;
        for value in values {
            let bytes = value.as_deref().unwrap_or(&[]);
            write_padded_value(out, bytes, width, max_length)?;
            write_flag(out, value.is_some())?;
        }
        Ok(())
    }

    /// Write a sorted column: the unique `values` in ascending byte order and
    /// each document's ordinal into them, -1 for documents without a value.
    pub fn add_sorted_field(&mut self, field: &FieldInfo, values: &[Vec<u8>], doc_to_ord: &[i32]) -> Result<()> {
        check_dictionary(field, values)?;
        let value_count = values.len() as i64;
        for &ord in doc_to_ord {
            if ord < -1 || ord as i64 >= value_count {
                return Err(XiphosError::invariant(format!(
                    "ordinal {ord} out of range for field '{}'",
                    field.name
                )));
            }
        }

        let max_length = values.iter().map(Vec::len).max().unwrap_or(0);
        let width = decimal_width(max_length as u128);
        let ord_width = decimal_width(value_count as u128 + 1);

        let out = self.start_field(field, DocValuesType::Sorted, doc_to_ord.len())?;
        write_line(out, NUMVALUES, value_count)?;
        write_line(out, MAXLENGTH, max_length)?;
        write_line(out, PATTERN, "0".repeat(width))?;
        write_line(out, ORDPATTERN, "0".repeat(ord_width))?;
        for value in values {
            write_padded_value(out, value, width, max_length)?;
        }
        for &ord in doc_to_ord {
            write_str(out, &zero_pad(ord as i64 + 1, ord_width))?;
            write_newline(out)?;
        }
        Ok(())
    }

    /// Write a sorted-set column: the unique `values` in ascending byte order
    /// and each document's increasing ordinals into them.
    pub fn add_sorted_set_field(
        &mut self,
        field: &FieldInfo,
        values: &[Vec<u8>],
        doc_to_ords: &[Vec<i64>],
    ) -> Result<()> {
        check_dictionary(field, values)?;
        let value_count = values.len() as i64;
        let mut lists = Vec::with_capacity(doc_to_ords.len());
        for ords in doc_to_ords {
            let mut last = -1;
            for &ord in ords {
                if ord <= last || ord >= value_count {
                    return Err(XiphosError::invariant(format!(
                        "ordinal {ord} out of order or range for field '{}'",
                        field.name
                    )));
                }
                last = ord;
            }
            lists.push(
                ords.iter()
                    .map(i64::to_string)
                    .collect::<Vec<_>>()
                    .join(","),
            );
        }

        let max_length = values.iter().map(Vec::len).max().unwrap_or(0);
        let width = decimal_width(max_length as u128);
        let ord_list_width = lists.iter().map(String::len).max().unwrap_or(0);

        let out = self.start_field(field, DocValuesType::SortedSet, doc_to_ords.len())?;
        write_line(out, NUMVALUES, value_count)?;
        write_line(out, MAXLENGTH, max_length)?;
        write_line(out, PATTERN, "0".repeat(width))?;
        write_line(out, ORDPATTERN, "X".repeat(ord_list_width))?;
        for value in values {
            write_padded_value(out, value, width, max_length)?;
        }
        for list in &lists {
            write_str(out, &format!("{list:<ord_list_width$}"))?;
            write_newline(out)?;
        }
        Ok(())
    }

    /// Write the end marker and checksum, and close the file.
    pub fn finish(mut self) -> Result<()> {
        let mut out = self
            .out
            .take()
            .ok_or_else(|| XiphosError::invariant("doc values writer already closed"))?;
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

fn check_dictionary(field: &FieldInfo, values: &[Vec<u8>]) -> Result<()> {
    if values.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err(XiphosError::invariant(format!(
            "dictionary of field '{}' is not sorted and unique",
            field.name
        )));
    }
    Ok(())
}

fn write_flag(out: &mut ChecksumOutput, has_value: bool) -> Result<()> {
    out.write_all(&[if has_value { HAS_VALUE } else { MISSING }])?;
    write_newline(out)
}

/// Length line, then the raw bytes padded with spaces to `max_length`. The
/// bytes are not escaped so that every record has the same width.
fn write_padded_value(out: &mut ChecksumOutput, bytes: &[u8], width: usize, max_length: usize) -> Result<()> {
    write_str(out, LENGTH)?;
    write_str(out, &zero_pad(bytes.len(), width))?;
    write_newline(out)?;
    out.write_all(bytes)?;
    for _ in bytes.len()..max_length {
        out.write_all(b" ")?;
    }
    write_newline(out)
}
