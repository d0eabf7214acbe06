// Copyright (c) The Toitware Authors.
// Licensed under the MIT License.

//! The LSP-mode filesystem RPC and the transport it can ride on: a
//! line-framed text protocol for `SDK PATH` / `PACKAGE CACHE PATHS` /
//! `LIST DIRECTORY` / `INFO` requests, and the three transport variants the
//! orchestrator picks between by port number.

use std::io::{self, Read, Write};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FsRequest {
    SdkPath,
    PackageCachePaths,
    ListDirectory(String),
    Info(String),
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FileInfo {
    pub exists: bool,
    pub is_regular: bool,
    pub is_directory: bool,
    pub contents: Option<Vec<u8>>,
}

/// What the orchestrator's LSP-mode filesystem requests resolve to. The
/// SDK/project-loading machinery is generic over this trait so it can run
/// against either a real local filesystem or a client-driven transport.
pub trait FsTransport {
    fn sdk_path(&mut self) -> io::Result<String>;
    fn package_cache_paths(&mut self) -> io::Result<Vec<String>>;
    fn list_directory(&mut self, path: &str) -> io::Result<Vec<String>>;
    fn info(&mut self, path: &str) -> io::Result<FileInfo>;
}

/// Drives the line-framed FS protocol over any `Read + Write` stream.
/// Keeps its own read-ahead buffer across calls instead of wrapping a fresh
/// `BufReader` around the stream on every call, which would silently
/// discard whatever bytes a previous call had already buffered but not
/// consumed.
pub struct LineFramedFs<S> {
    stream: S,
    buf: Vec<u8>,
}

impl<S: Read + Write> LineFramedFs<S> {
    pub fn new(stream: S) -> Self {
        Self { stream, buf: Vec::new() }
    }

    fn fill_until(&mut self, predicate: impl Fn(&[u8]) -> bool) -> io::Result<()> {
        let mut chunk = [0u8; 4096];
        while !predicate(&self.buf) {
            let n = self.stream.read(&mut chunk)?;
            if n == 0 {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "fs stream closed mid-message"));
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
        Ok(())
    }

    fn read_line(&mut self) -> io::Result<String> {
        self.fill_until(|buf| buf.contains(&b'\n'))?;
        let newline_at = self.buf.iter().position(|&b| b == b'\n').expect("fill_until guarantees a newline");
        let mut line: Vec<u8> = self.buf.drain(..=newline_at).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        String::from_utf8(line).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }

    fn read_count_line(&mut self) -> io::Result<usize> {
        self.read_line()?.trim().parse().map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }

    fn read_exact_bytes(&mut self, count: usize) -> io::Result<Vec<u8>> {
        self.fill_until(|buf| buf.len() >= count)?;
        Ok(self.buf.drain(..count).collect())
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.stream, "{line}")
    }

    /// The server side's counterpart to `sdk_path`/`package_cache_paths`/
    /// etc: reads the next request header (and its path argument, for the
    /// two requests that take one) off the wire.
    pub fn read_request(&mut self) -> io::Result<FsRequest> {
        match self.read_line()?.as_str() {
            "SDK PATH" => Ok(FsRequest::SdkPath),
            "PACKAGE CACHE PATHS" => Ok(FsRequest::PackageCachePaths),
            "LIST DIRECTORY" => Ok(FsRequest::ListDirectory(self.read_line()?)),
            "INFO" => Ok(FsRequest::Info(self.read_line()?)),
            other => Err(io::Error::new(io::ErrorKind::InvalidData, format!("unknown fs request header: {other}"))),
        }
    }
}

impl<S: Read + Write> FsTransport for LineFramedFs<S> {
    fn sdk_path(&mut self) -> io::Result<String> {
        self.write_line("SDK PATH")?;
        self.read_line()
    }

    fn package_cache_paths(&mut self) -> io::Result<Vec<String>> {
        self.write_line("PACKAGE CACHE PATHS")?;
        let count = self.read_count_line()?;
        (0..count).map(|_| self.read_line()).collect()
    }

    fn list_directory(&mut self, path: &str) -> io::Result<Vec<String>> {
        self.write_line("LIST DIRECTORY")?;
        self.write_line(path)?;
        let count = self.read_count_line()?;
        (0..count).map(|_| self.read_line()).collect()
    }

    fn info(&mut self, path: &str) -> io::Result<FileInfo> {
        self.write_line("INFO")?;
        self.write_line(path)?;
        let exists = self.read_line()? == "true";
        let is_regular = self.read_line()? == "true";
        let is_directory = self.read_line()? == "true";
        let content_size = self.read_count_line()?;
        let contents = if content_size > 0 { Some(self.read_exact_bytes(content_size)?) } else { None };
        Ok(FileInfo {
            exists,
            is_regular,
            is_directory,
            contents,
        })
    }
}

/// The server side of the same protocol: answers a parsed `FsRequest`
/// straight onto the wire, given the concrete answers to report.
pub fn respond_package_cache_paths<S: Write>(stream: &mut S, paths: &[String]) -> io::Result<()> {
    write_count_then_lines(stream, paths)
}

pub fn respond_list_directory<S: Write>(stream: &mut S, entries: &[String]) -> io::Result<()> {
    write_count_then_lines(stream, entries)
}

pub fn respond_info<S: Write>(stream: &mut S, info: &FileInfo) -> io::Result<()> {
    writeln!(stream, "{}", info.exists)?;
    writeln!(stream, "{}", info.is_regular)?;
    writeln!(stream, "{}", info.is_directory)?;
    let contents = info.contents.as_deref().unwrap_or(&[]);
    writeln!(stream, "{}", contents.len())?;
    stream.write_all(contents)
}

fn write_count_then_lines<S: Write>(stream: &mut S, lines: &[String]) -> io::Result<()> {
    writeln!(stream, "{}", lines.len())?;
    for line in lines {
        writeln!(stream, "{line}")?;
    }
    Ok(())
}

/// Which transport the orchestrator's LSP mode speaks, keyed by the port
/// argument it was started with.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransportKind {
    /// Port `-1`: the filesystem is read directly off the local disk and
    /// LSP messages go straight to stdout.
    Local,
    /// Port `-2`: FS and LSP frames are multiplexed on stdin/stdout.
    Multiplexed,
    /// Any other port: a TCP socket carries FS requests; stdout still
    /// carries LSP messages.
    Socket,
}

#[must_use]
pub fn transport_kind_for_port(port: i32) -> TransportKind {
    match port {
        -1 => TransportKind::Local,
        -2 => TransportKind::Multiplexed,
        _ => TransportKind::Socket,
    }
}

/// One `int32 size; bytes` frame of the port `-2` multiplexed transport. A
/// negative size marks an FS frame (its magnitude is the real length); a
/// non-negative size marks an LSP frame. Byte order is native: both ends of
/// this pipe are always the same binary.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MultiplexedFrame {
    pub is_fs: bool,
    pub bytes: Vec<u8>,
}

pub fn read_multiplexed_frame(stream: &mut impl Read) -> io::Result<MultiplexedFrame> {
    let mut size_bytes = [0u8; 4];
    stream.read_exact(&mut size_bytes)?;
    let raw = i32::from_ne_bytes(size_bytes);
    let is_fs = raw < 0;
    let size = usize::try_from(raw.unsigned_abs()).expect("frame size fits usize");
    let mut bytes = vec![0u8; size];
    stream.read_exact(&mut bytes)?;
    Ok(MultiplexedFrame { is_fs, bytes })
}

pub fn write_multiplexed_frame(stream: &mut impl Write, frame: &MultiplexedFrame) -> io::Result<()> {
    let len = i32::try_from(frame.bytes.len()).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    let size = if frame.is_fs { -len } else { len };
    stream.write_all(&size.to_ne_bytes())?;
    stream.write_all(&frame.bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// A stream that hands back pre-scripted bytes to read and records
    /// whatever gets written, so a single in-memory buffer can stand in for
    /// both directions of the pipe.
    struct ScriptedStream {
        incoming: Cursor<Vec<u8>>,
        outgoing: Vec<u8>,
    }

    impl Read for ScriptedStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.incoming.read(buf)
        }
    }

    impl Write for ScriptedStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.outgoing.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn sdk_path_round_trips_a_single_line_response() {
        let stream = ScriptedStream {
            incoming: Cursor::new(b"/opt/toit-sdk\n".to_vec()),
            outgoing: Vec::new(),
        };
        let mut fs = LineFramedFs::new(stream);
        let path = fs.sdk_path().unwrap();
        assert_eq!(path, "/opt/toit-sdk");
        assert_eq!(fs.stream.outgoing, b"SDK PATH\n");
    }

    #[test]
    fn package_cache_paths_reads_a_count_prefixed_list() {
        let stream = ScriptedStream {
            incoming: Cursor::new(b"2\n/cache/a\n/cache/b\n".to_vec()),
            outgoing: Vec::new(),
        };
        let mut fs = LineFramedFs::new(stream);
        let paths = fs.package_cache_paths().unwrap();
        assert_eq!(paths, vec!["/cache/a".to_string(), "/cache/b".to_string()]);
    }

    #[test]
    fn info_reads_booleans_then_exact_content_bytes() {
        let mut incoming = b"true\ntrue\nfalse\n5\n".to_vec();
        incoming.extend_from_slice(b"hello");
        let stream = ScriptedStream {
            incoming: Cursor::new(incoming),
            outgoing: Vec::new(),
        };
        let mut fs = LineFramedFs::new(stream);
        let info = fs.info("/work/main.toit").unwrap();
        assert!(info.exists);
        assert!(info.is_regular);
        assert!(!info.is_directory);
        assert_eq!(info.contents.as_deref(), Some(&b"hello"[..]));
    }

    #[test]
    fn info_with_zero_content_size_has_no_contents() {
        let stream = ScriptedStream {
            incoming: Cursor::new(b"false\nfalse\ntrue\n0\n".to_vec()),
            outgoing: Vec::new(),
        };
        let mut fs = LineFramedFs::new(stream);
        let info = fs.info("/work").unwrap();
        assert!(!info.exists);
        assert!(info.contents.is_none());
    }

    #[test]
    fn read_request_parses_each_header_and_its_path_argument() {
        let stream = ScriptedStream {
            incoming: Cursor::new(b"LIST DIRECTORY\n/work/src\nINFO\n/work/src/main.toit\nSDK PATH\n".to_vec()),
            outgoing: Vec::new(),
        };
        let mut fs = LineFramedFs::new(stream);
        assert_eq!(fs.read_request().unwrap(), FsRequest::ListDirectory("/work/src".to_string()));
        assert_eq!(fs.read_request().unwrap(), FsRequest::Info("/work/src/main.toit".to_string()));
        assert_eq!(fs.read_request().unwrap(), FsRequest::SdkPath);
    }

    #[test]
    fn port_selects_the_right_transport_kind() {
        assert_eq!(transport_kind_for_port(-1), TransportKind::Local);
        assert_eq!(transport_kind_for_port(-2), TransportKind::Multiplexed);
        assert_eq!(transport_kind_for_port(9000), TransportKind::Socket);
    }

    #[test]
    fn multiplexed_frame_round_trips_and_negates_size_for_fs_frames() {
        let mut buf = Vec::new();
        write_multiplexed_frame(
            &mut buf,
            &MultiplexedFrame {
                is_fs: true,
                bytes: b"LIST DIRECTORY\n".to_vec(),
            },
        )
        .unwrap();
        write_multiplexed_frame(
            &mut buf,
            &MultiplexedFrame {
                is_fs: false,
                bytes: b"{\"jsonrpc\":\"2.0\"}".to_vec(),
            },
        )
        .unwrap();

        let mut cursor = Cursor::new(buf);
        let first = read_multiplexed_frame(&mut cursor).unwrap();
        assert!(first.is_fs);
        assert_eq!(first.bytes, b"LIST DIRECTORY\n");
        let second = read_multiplexed_frame(&mut cursor).unwrap();
        assert!(!second.is_fs);
        assert_eq!(second.bytes, b"{\"jsonrpc\":\"2.0\"}");
    }
}
