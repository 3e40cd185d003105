//! TS framing: `<NNNN><filename bytes><file body bytes until EOF>`, where `NNNN` is a
//! 4-ASCII-digit, zero-padded filename length. The body has no length prefix of its own;
//! TCP's own end-of-stream is the terminator, copied in `buffer_size`-sized chunks.

use crate::error::{TsError, TsResult};
use std::io::{Read, Write};

const LENGTH_PREFIX_WIDTH: usize = 4;
const MAX_FILENAME_LEN: usize = 9999;

pub fn write_filename_header(writer: &mut impl Write, filename: &str) -> TsResult<()> {
    let bytes = filename.as_bytes();
    if bytes.len() > MAX_FILENAME_LEN {
        return Err(TsError::Framing);
    }
    writer.write_all(format!("{:0width$}", bytes.len(), width = LENGTH_PREFIX_WIDTH).as_bytes())?;
    writer.write_all(bytes)?;
    Ok(())
}

pub fn read_filename_header(reader: &mut impl Read) -> TsResult<String> {
    let mut prefix = [0u8; LENGTH_PREFIX_WIDTH];
    reader.read_exact(&mut prefix)?;
    let len: usize = std::str::from_utf8(&prefix).map_err(|_| TsError::Framing)?.parse().map_err(|_| TsError::Framing)?;

    let mut name_bytes = vec![0u8; len];
    reader.read_exact(&mut name_bytes)?;
    String::from_utf8(name_bytes).map_err(|_| TsError::Framing)
}

/// Copies from `reader` to `writer` until EOF, in `buffer_size`-sized chunks. Returns the
/// total number of bytes copied.
pub fn copy_body(reader: &mut impl Read, writer: &mut impl Write, buffer_size: usize) -> TsResult<u64> {
    let mut buf = vec![0u8; buffer_size.max(1)];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n])?;
        total += n as u64;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn filename_header_round_trips() {
        let mut buf = Vec::new();
        write_filename_header(&mut buf, "alert_m042_task-003_7.json").unwrap();
        let mut cursor = Cursor::new(buf);
        assert_eq!(read_filename_header(&mut cursor).unwrap(), "alert_m042_task-003_7.json");
    }

    #[test]
    fn zero_length_filename_is_valid() {
        let mut buf = Vec::new();
        write_filename_header(&mut buf, "").unwrap();
        assert_eq!(buf, b"0000");
    }

    #[test]
    fn length_prefix_is_zero_padded_to_four_digits() {
        let mut buf = Vec::new();
        write_filename_header(&mut buf, "m.json").unwrap();
        assert_eq!(&buf[..4], b"0006");
    }

    #[test]
    fn non_numeric_prefix_is_framing_error() {
        let mut cursor = Cursor::new(b"abcdname".to_vec());
        assert!(matches!(read_filename_header(&mut cursor), Err(TsError::Framing)));
    }

    #[test]
    fn truncated_stream_is_io_error() {
        let mut cursor = Cursor::new(b"01".to_vec());
        assert!(read_filename_header(&mut cursor).is_err());
    }

    #[test]
    fn copy_body_streams_in_chunks() {
        let source = vec![7u8; 5000];
        let mut reader = Cursor::new(source.clone());
        let mut sink = Vec::new();
        let n = copy_body(&mut reader, &mut sink, 1024).unwrap();
        assert_eq!(n, 5000);
        assert_eq!(sink, source);
    }
}
