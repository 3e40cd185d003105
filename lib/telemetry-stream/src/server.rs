//! TS server: accepts TCP connections serially, writes each file into `store_dir` under
//! its received filename, then closes the connection. One client at a time, matching the
//! source's lack of concurrency on this path.

use crate::codec::{copy_body, read_filename_header};
use crate::error::TsResult;
use groundlink::logging::{self, Logger};
use std::fs::File;
use std::io::BufReader;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct TsServer {
    listener: TcpListener,
    store_dir: PathBuf,
    buffer_size: usize,
    closed: Arc<AtomicBool>,
    log: Logger,
}

impl TsServer {
    pub fn bind(addr: SocketAddr, store_dir: PathBuf, buffer_size: usize, log: Logger) -> TsResult<TsServer> {
        std::fs::create_dir_all(&store_dir)?;
        let listener = TcpListener::bind(addr)?;
        Ok(TsServer { listener, store_dir, buffer_size, closed: Arc::new(AtomicBool::new(false)), log })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }

    /// Accepts and serves connections until `close` is called.
    pub fn run(&self) -> TsResult<()> {
        while !self.closed.load(Ordering::Relaxed) {
            let (stream, peer) = self.listener.accept()?;
            if let Err(err) = self.serve_one(stream, peer) {
                logging::warn!(self.log, "ts connection failed"; "peer" => peer.to_string(), "error" => err.to_string());
            }
        }
        Ok(())
    }

    /// Accepts and serves exactly one connection; used by tests and by callers that want
    /// to drive the accept loop themselves.
    pub fn serve_once(&self) -> TsResult<PathBuf> {
        let (stream, peer) = self.listener.accept()?;
        self.serve_one(stream, peer)
    }

    fn serve_one(&self, stream: TcpStream, peer: SocketAddr) -> TsResult<PathBuf> {
        let mut reader = BufReader::new(&stream);
        let filename = read_filename_header(&mut reader)?;
        let path = self.store_dir.join(&filename);
        let mut file = File::create(&path)?;
        let bytes = copy_body(&mut reader, &mut file, self.buffer_size)?;
        logging::info!(self.log, "file received"; "peer" => peer.to_string(), "filename" => &filename, "bytes" => bytes);
        Ok(path)
    }
}
