//! Live documents (`.liv`).
//!
//! Lists the ids of documents that are not deleted. A segment without
//! deletions has no live-docs file at all.

use std::sync::Arc;

use crate::codec::line::{
    ChecksumInput, ChecksumOutput, LineBuf, check_footer, read_value, write_checksum, write_line,
};
use crate::codec::{LIVE_DOCS_EXTENSION, file_name_from_generation};
use crate::error::{Result, XiphosError};
use crate::storage::Storage;
use crate::util::bits::{Bits, FixedBitSet};

const SIZE: &str = "size ";
const DOC: &str = "  doc ";
const END: &str = crate::codec::line::END;

/// Live docs under construction. Every document starts live.
#[derive(Debug, Clone)]
pub struct MutableLiveDocs {
    bits: FixedBitSet,
}

impl MutableLiveDocs {
    pub fn new(size: usize) -> Self {
        MutableLiveDocs {
            bits: FixedBitSet::all_set(size),
        }
    }

    /// Mark `doc` deleted. Returns whether it was live before.
    pub fn clear(&mut self, doc: usize) -> Result<bool> {
        if doc >= self.bits.len() {
            return Err(XiphosError::invalid_argument(format!(
                "document {doc} out of range for {} documents",
                self.bits.len()
            )));
        }
        let was_live = self.bits.get(doc);
        self.bits.clear(doc);
        Ok(was_live)
    }

    pub fn get(&self, doc: usize) -> bool {
        self.bits.get(doc)
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Number of deleted documents.
    pub fn del_count(&self) -> usize {
        self.bits.len() - self.bits.cardinality()
    }

    pub fn freeze(self) -> LiveDocs {
        LiveDocs::new(self.bits)
    }
}

/// Frozen live docs shared by a segment reader and its enumerators.
#[derive(Debug, Clone)]
pub struct LiveDocs {
    bits: Arc<FixedBitSet>,
    num_live: usize,
}

impl LiveDocs {
    fn new(bits: FixedBitSet) -> Self {
        let num_live = bits.cardinality();
        LiveDocs {
            bits: Arc::new(bits),
            num_live,
        }
    }

    pub fn num_live(&self) -> usize {
        self.num_live
    }

    pub fn del_count(&self) -> usize {
        self.bits.len() - self.num_live
    }
}

impl Bits for LiveDocs {
    fn get(&self, index: usize) -> bool {
        self.bits.get(index)
    }

    fn len(&self) -> usize {
        self.bits.len()
    }
}

/// Name of the live-docs file of `segment` at `generation`.
pub fn live_docs_file_name(segment: &str, generation: u64) -> String {
    file_name_from_generation(segment, LIVE_DOCS_EXTENSION, generation)
}

/// Write `live_docs` for `segment` at `generation` and return the file name.
pub fn write_live_docs(
    storage: &dyn Storage,
    segment: &str,
    generation: u64,
    live_docs: &MutableLiveDocs,
) -> Result<String> {
    let file_name = live_docs_file_name(segment, generation);
    let output = storage.create_output(&file_name)?;
    let mut out = ChecksumOutput::new(output, file_name.clone());
    let result = (|| -> Result<()> {
        write_line(&mut out, SIZE, live_docs.len())?;
        for doc in live_docs.bits.iter_set() {
            write_line(&mut out, DOC, doc)?;
        }
        write_line(&mut out, END, "")?;
        write_checksum(&mut out)?;
        out.close()
    })();
    if let Err(e) = result {
        if let Err(delete_err) = storage.delete_file(&file_name) {
            log::warn!("failed to delete {file_name} after write error: {delete_err}");
        }
        return Err(e);
    }
    Ok(file_name)
}

/// Read the live docs of a segment with `max_doc` documents from `file_name`.
pub fn read_live_docs(storage: &dyn Storage, file_name: &str, max_doc: i32) -> Result<LiveDocs> {
    let mut input = ChecksumInput::new(storage.open_input(file_name)?);
    let mut line = LineBuf::new();
    let size: usize = read_value(&mut input, &mut line, SIZE, file_name)?;
    if size != max_doc as usize {
        return Err(XiphosError::corruption(
            format!("live docs size {size} does not match segment size {max_doc}"),
            file_name,
        ));
    }
    let mut bits = FixedBitSet::new(size);
    let mut last: Option<usize> = None;
    loop {
        line.read(&mut input, file_name)?;
        if line.as_bytes() == END.as_bytes() {
            break;
        }
        let doc: usize = line.parse(DOC, file_name)?;
        if doc >= size || last.is_some_and(|prev| doc <= prev) {
            return Err(XiphosError::corruption(
                format!("live doc {doc} out of order or range"),
                file_name,
            ));
        }
        bits.set(doc);
        last = Some(doc);
    }
    check_footer(&mut input, file_name)?;
    Ok(LiveDocs::new(bits))
}
