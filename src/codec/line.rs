//! Line-oriented primitives shared by every codec file.
//!
//! Each file is a sequence of logical lines. Inside a line the bytes `\n` and
//! `\` are escaped by a preceding `\`, so arbitrary term or payload bytes can
//! be stored without breaking the line structure. Every file ends with a
//! checksum footer: `checksum ` followed by the CRC32 of all preceding bytes,
//! zero-padded to 20 decimal digits, and a newline.

use std::fmt::Display;
use std::io::{self, Read, Write};
use std::str::FromStr;

use crate::error::{Result, XiphosError};
use crate::storage::StorageOutput;

/// Line terminator.
pub const NEWLINE: u8 = b'\n';

/// Escape byte.
pub const ESCAPE: u8 = b'\\';

/// Prefix of the footer line.
pub const CHECKSUM: &str = "checksum ";

/// Prefix marking the end of the record section of a file.
pub const END: &str = "END";

/// Write `bytes` escaping newlines and escape bytes. No newline is appended.
pub fn write_bytes<W: Write + ?Sized>(out: &mut W, bytes: &[u8]) -> Result<()> {
    let mut start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        if b == NEWLINE || b == ESCAPE {
            out.write_all(&bytes[start..i])?;
            out.write_all(&[ESCAPE, b])?;
            start = i + 1;
        }
    }
    out.write_all(&bytes[start..])?;
    Ok(())
}

/// Write a string, escaped.
pub fn write_str<W: Write + ?Sized>(out: &mut W, s: &str) -> Result<()> {
    write_bytes(out, s.as_bytes())
}

/// Terminate the current line.
pub fn write_newline<W: Write + ?Sized>(out: &mut W) -> Result<()> {
    out.write_all(&[NEWLINE])?;
    Ok(())
}

/// Write `prefix`, the display form of `value` and a newline.
pub fn write_line<W: Write + ?Sized, V: Display>(out: &mut W, prefix: &str, value: V) -> Result<()> {
    write_str(out, prefix)?;
    write_str(out, &value.to_string())?;
    write_newline(out)
}

/// Write `prefix`, raw `value` bytes and a newline.
pub fn write_line_bytes<W: Write + ?Sized>(out: &mut W, prefix: &str, value: &[u8]) -> Result<()> {
    write_str(out, prefix)?;
    write_bytes(out, value)?;
    write_newline(out)
}

fn read_byte<R: Read + ?Sized>(input: &mut R) -> io::Result<Option<u8>> {
    let mut buf = [0u8; 1];
    loop {
        match input.read(&mut buf) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(buf[0])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// One decoded line, reused across reads.
#[derive(Debug, Default, Clone)]
pub struct LineBuf {
    bytes: Vec<u8>,
}

impl LineBuf {
    pub fn new() -> Self {
        LineBuf::default()
    }

    /// Decode the next line from `input`, leaving the stream just past its
    /// terminating newline. End of file inside a line is corruption.
    pub fn read<R: Read + ?Sized>(&mut self, input: &mut R, resource: &str) -> Result<()> {
        self.bytes.clear();
        loop {
            let b = read_byte(input)?
                .ok_or_else(|| XiphosError::corruption("unexpected end of file", resource))?;
            match b {
                ESCAPE => {
                    let escaped = read_byte(input)?.ok_or_else(|| {
                        XiphosError::corruption("unexpected end of file after escape", resource)
                    })?;
                    self.bytes.push(escaped);
                }
                NEWLINE => return Ok(()),
                other => self.bytes.push(other),
            }
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.bytes.starts_with(prefix.as_bytes())
    }

    /// The bytes after `prefix`, or corruption if the line does not start with it.
    pub fn expect(&self, prefix: &str, resource: &str) -> Result<&[u8]> {
        if !self.starts_with(prefix) {
            return Err(XiphosError::corruption(
                format!(
                    "expected '{}' but got '{}'",
                    prefix.trim_end(),
                    String::from_utf8_lossy(&self.bytes)
                ),
                resource,
            ));
        }
        Ok(&self.bytes[prefix.len()..])
    }

    /// The text after `prefix`.
    pub fn string(&self, prefix: &str, resource: &str) -> Result<String> {
        let value = self.expect(prefix, resource)?;
        String::from_utf8(value.to_vec()).map_err(|_| {
            XiphosError::corruption(format!("invalid UTF-8 after '{}'", prefix.trim_end()), resource)
        })
    }

    /// Parse the text after `prefix`.
    pub fn parse<T: FromStr>(&self, prefix: &str, resource: &str) -> Result<T> {
        let value = self.expect(prefix, resource)?;
        parse_bytes(value, resource)
    }

    /// Parse `true` or `false` after `prefix`.
    pub fn bool(&self, prefix: &str, resource: &str) -> Result<bool> {
        match self.expect(prefix, resource)? {
            b"true" => Ok(true),
            b"false" => Ok(false),
            other => Err(XiphosError::corruption(
                format!("expected boolean but got '{}'", String::from_utf8_lossy(other)),
                resource,
            )),
        }
    }
}

/// Parse a number (or any `FromStr` value) from raw line bytes.
pub fn parse_bytes<T: FromStr>(bytes: &[u8], resource: &str) -> Result<T> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse::<T>().ok())
        .ok_or_else(|| {
            XiphosError::corruption(
                format!("failed to parse '{}'", String::from_utf8_lossy(bytes)),
                resource,
            )
        })
}

/// Read a line and parse the value after `prefix`.
pub fn read_value<R: Read + ?Sized, T: FromStr>(
    input: &mut R,
    line: &mut LineBuf,
    prefix: &str,
    resource: &str,
) -> Result<T> {
    line.read(input, resource)?;
    line.parse(prefix, resource)
}

/// Read a line and return the text after `prefix`.
pub fn read_string<R: Read + ?Sized>(
    input: &mut R,
    line: &mut LineBuf,
    prefix: &str,
    resource: &str,
) -> Result<String> {
    line.read(input, resource)?;
    line.string(prefix, resource)
}

/// Read a line and parse a boolean after `prefix`.
pub fn read_bool<R: Read + ?Sized>(
    input: &mut R,
    line: &mut LineBuf,
    prefix: &str,
    resource: &str,
) -> Result<bool> {
    line.read(input, resource)?;
    line.bool(prefix, resource)
}

/// An output that tracks its position and a running CRC32 of all bytes written.
#[derive(Debug)]
pub struct ChecksumOutput {
    inner: Box<dyn StorageOutput>,
    hasher: crc32fast::Hasher,
    position: u64,
    name: String,
}

impl ChecksumOutput {
    pub fn new(inner: Box<dyn StorageOutput>, name: impl Into<String>) -> Self {
        ChecksumOutput {
            inner,
            hasher: crc32fast::Hasher::new(),
            position: 0,
            name: name.into(),
        }
    }

    /// CRC32 of everything written so far.
    pub fn checksum(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// The file name this output writes.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Close the underlying output, publishing the file.
    pub fn close(mut self) -> Result<()> {
        self.inner.close()
    }
}

impl Write for ChecksumOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.position += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// An input that tracks its position and a running CRC32 of all bytes read.
#[derive(Debug)]
pub struct ChecksumInput<R> {
    inner: R,
    hasher: crc32fast::Hasher,
    position: u64,
}

impl<R: Read> ChecksumInput<R> {
    /// Wrap `inner`, which must be positioned at the start of the file.
    pub fn new(inner: R) -> Self {
        ChecksumInput {
            inner,
            hasher: crc32fast::Hasher::new(),
            position: 0,
        }
    }

    /// CRC32 of everything read so far.
    pub fn checksum(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    /// Number of bytes read so far, which is the file pointer.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for ChecksumInput<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        self.position += n as u64;
        Ok(n)
    }
}

fn format_checksum(crc: u32) -> String {
    format!("{crc:020}")
}

/// Write the footer line for everything written to `out` so far.
pub fn write_checksum(out: &mut ChecksumOutput) -> Result<()> {
    let checksum = format_checksum(out.checksum());
    write_line(out, CHECKSUM, checksum)
}

/// Read the footer line and verify it matches the bytes read so far. The
/// footer must be the last line of the file.
pub fn check_footer<R: Read>(input: &mut ChecksumInput<R>, resource: &str) -> Result<()> {
    let expected = format_checksum(input.checksum());
    let mut line = LineBuf::new();
    line.read(input, resource)?;
    let actual = line.expect(CHECKSUM, resource)?;
    if actual != expected.as_bytes() {
        return Err(XiphosError::corruption(
            format!(
                "checksum mismatch: expected {expected} but footer has {}",
                String::from_utf8_lossy(actual)
            ),
            resource,
        ));
    }

    if read_byte(&mut input.inner)?.is_some() {
        return Err(XiphosError::corruption(
            "unexpected bytes after checksum footer",
            resource,
        ));
    }
    Ok(())
}

/// Number of decimal digits needed to print `value`.
pub fn decimal_width(value: u128) -> usize {
    value.to_string().len()
}

/// Left-pad `value` with zeros to `width`.
pub fn zero_pad(value: impl Display, width: usize) -> String {
    format!("{value:0>width$}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use crate::storage::{MemoryStorage, Storage};

    #[test]
    fn test_escaping_round_trip() {
        let mut buf = Vec::new();
        write_bytes(&mut buf, b"a\nb\\c").unwrap();
        write_newline(&mut buf).unwrap();
        assert_eq!(buf, b"a\\\nb\\\\c\n");

        let mut input = Cursor::new(buf);
        let mut line = LineBuf::new();
        line.read(&mut input, "test").unwrap();
        assert_eq!(line.as_bytes(), b"a\nb\\c");
        assert_eq!(input.position(), 8);
    }

    #[test]
    fn test_eof_inside_line_is_corruption() {
        let mut input = Cursor::new(b"no newline".to_vec());
        let mut line = LineBuf::new();
        let err = line.read(&mut input, "_0.pst").unwrap_err();
        assert!(err.is_corruption());
        assert!(err.to_string().contains("_0.pst"));
    }

    #[test]
    fn test_prefix_helpers() {
        let mut input = Cursor::new(b"  freq 12\n  flag true\n  freq x\n".to_vec());
        let mut line = LineBuf::new();
        let freq: i32 = read_value(&mut input, &mut line, "  freq ", "r").unwrap();
        assert_eq!(freq, 12);
        assert!(read_bool(&mut input, &mut line, "  flag ", "r").unwrap());
        let err = read_value::<_, i32>(&mut input, &mut line, "  freq ", "r").unwrap_err();
        assert!(err.is_corruption());

        let mut input = Cursor::new(b"other 1\n".to_vec());
        let err = read_value::<_, i32>(&mut input, &mut line, "  freq ", "r").unwrap_err();
        assert!(err.is_corruption());
    }

    fn write_sample(storage: &MemoryStorage) -> Vec<u8> {
        let output = storage.create_output("sample.txt").unwrap();
        let mut out = ChecksumOutput::new(output, "sample.txt");
        write_line(&mut out, "value ", 42).unwrap();
        write_checksum(&mut out).unwrap();
        out.close().unwrap();
        storage.read_all("sample.txt").unwrap()
    }

    #[test]
    fn test_footer_format_and_verification() {
        let storage = MemoryStorage::new_default();
        let bytes = write_sample(&storage);
        let text = String::from_utf8(bytes.clone()).unwrap();
        let footer = text.lines().last().unwrap();
        assert!(footer.starts_with(CHECKSUM));
        assert_eq!(footer.len(), CHECKSUM.len() + 20);

        let mut input = ChecksumInput::new(Cursor::new(bytes));
        let mut line = LineBuf::new();
        line.read(&mut input, "sample.txt").unwrap();
        check_footer(&mut input, "sample.txt").unwrap();
    }

    #[test]
    fn test_footer_detects_damage() {
        let storage = MemoryStorage::new_default();
        let mut bytes = write_sample(&storage);
        bytes[6] = b'7';

        let mut input = ChecksumInput::new(Cursor::new(bytes));
        let mut line = LineBuf::new();
        line.read(&mut input, "sample.txt").unwrap();
        assert!(check_footer(&mut input, "sample.txt").unwrap_err().is_corruption());
    }

    #[test]
    fn test_footer_rejects_trailing_bytes() {
        let storage = MemoryStorage::new_default();
        let mut bytes = write_sample(&storage);
        bytes.push(b' ');

        let mut input = ChecksumInput::new(Cursor::new(bytes));
        let mut line = LineBuf::new();
        line.read(&mut input, "sample.txt").unwrap();
        let err = check_footer(&mut input, "sample.txt").unwrap_err();
        assert!(err.to_string().contains("after checksum footer"));
    }

    #[test]
    fn test_padding_helpers() {
        assert_eq!(decimal_width(0), 1);
        assert_eq!(decimal_width(999), 3);
        assert_eq!(decimal_width(1000), 4);
        assert_eq!(zero_pad(7, 3), "007");
        assert_eq!(zero_pad(1234, 3), "1234");
    }
}
