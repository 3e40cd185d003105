//! TS client: one-shot file push. Opens a connection, writes the framed header and
//! body, then closes.

use crate::codec::{copy_body, write_filename_header};
use crate::error::TsResult;
use std::fs::File;
use std::io::BufWriter;
use std::net::{SocketAddr, TcpStream};
use std::path::Path;

/// Pushes a local file to a TS server over a fresh TCP connection. `filename` is what the
/// server will write the file as on its side (normally the source file's own name).
pub fn send_file(addr: SocketAddr, path: &Path, filename: &str, buffer_size: usize) -> TsResult<()> {
    let stream = TcpStream::connect(addr)?;
    let mut writer = BufWriter::new(&stream);
    write_filename_header(&mut writer, filename)?;
    let mut file = File::open(path)?;
    copy_body(&mut file, &mut writer, buffer_size)?;
    Ok(())
}
