// Copyright (c) The Toitware Authors.
// Licensed under the MIT License.

//! Dual-compile isolation: the compiler always produces a main snapshot and
//! a debug snapshot (the latter has assertions enabled and keeps toitdoc),
//! and the two runs must not share mutable global state. Compilers in this
//! lineage used to get that isolation by calling `fork()` and running the
//! debug compile in the child; here there is no `fork`, so instead we
//! re-exec the current binary with a hidden flag that makes it behave as
//! the "child": it runs one dual-compile leg and writes its result as four
//! length-prefixed frames on stdout, which the parent reads back.

use std::io::{self, Read, Write};
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{Command, Stdio};

use crate::pipeline::SnapshotBundle;

/// Hidden CLI flag that selects child mode; never documented in `--help`.
pub const CHILD_MODE_FLAG: &str = "--__dual_compile_child";

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum DualCompileError {
    #[error("failed to spawn dual-compile child process")]
    Spawn(#[source] io::Error),
    #[error("dual-compile child exited with status {0}")]
    ChildFailed(i32),
    #[error("dual-compile child was killed by signal {0}")]
    ChildSignaled(i32),
    #[error("dual-compile child produced a truncated frame (expected {expected} bytes, got {got})")]
    ShortRead { expected: usize, got: usize },
    #[error("i/o error while communicating with dual-compile child")]
    Io(#[source] io::Error),
}

/// Runs the current binary as a child with `CHILD_MODE_FLAG` plus
/// `child_args`, and reads back a `SnapshotBundle` serialized as four
/// native-endian length-prefixed frames on its stdout, in
/// main_snapshot/main_source_map/debug_snapshot/debug_source_map order.
pub fn run_dual_compile_child(current_exe: &Path, child_args: &[String]) -> Result<SnapshotBundle, DualCompileError> {
    let mut child = Command::new(current_exe)
        .arg(CHILD_MODE_FLAG)
        .args(child_args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(DualCompileError::Spawn)?;

    let mut stdout = child.stdout.take().expect("child stdout was piped");
    let main_snapshot = read_frame(&mut stdout)?;
    let main_source_map = read_frame(&mut stdout)?;
    let debug_snapshot = read_frame(&mut stdout)?;
    let debug_source_map = read_frame(&mut stdout)?;
    drop(stdout);

    let status = child.wait().map_err(DualCompileError::Io)?;
    if let Some(signal) = status.signal() {
        return Err(DualCompileError::ChildSignaled(signal));
    }
    match status.code() {
        Some(0) => Ok(SnapshotBundle {
            main_snapshot,
            main_source_map,
            debug_snapshot,
            debug_source_map,
        }),
        Some(code) => Err(DualCompileError::ChildFailed(code)),
        None => Err(DualCompileError::ChildFailed(-1)),
    }
}

/// Child-side counterpart: writes the bundle as four frames on `out`
/// (typically stdout), each a native-endian `u32` length followed by the
/// raw bytes.
pub fn write_bundle_frames<W: Write>(out: &mut W, bundle: &SnapshotBundle) -> io::Result<()> {
    write_frame(out, &bundle.main_snapshot)?;
    write_frame(out, &bundle.main_source_map)?;
    write_frame(out, &bundle.debug_snapshot)?;
    write_frame(out, &bundle.debug_source_map)?;
    out.flush()
}

fn write_frame<W: Write>(out: &mut W, payload: &[u8]) -> io::Result<()> {
    let len = u32::try_from(payload.len()).expect("frame payload fits u32");
    out.write_all(&len.to_ne_bytes())?;
    out.write_all(payload)
}

fn read_frame<R: Read>(input: &mut R) -> Result<Vec<u8>, DualCompileError> {
    let mut len_bytes = [0u8; 4];
    input.read_exact(&mut len_bytes).map_err(DualCompileError::Io)?;
    let len = u32::from_ne_bytes(len_bytes) as usize;
    let mut payload = vec![0u8; len];
    let got = read_as_much_as_possible(input, &mut payload).map_err(DualCompileError::Io)?;
    if got != len {
        return Err(DualCompileError::ShortRead { expected: len, got });
    }
    Ok(payload)
}

fn read_as_much_as_possible<R: Read>(input: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn frames_round_trip_through_a_buffer() {
        let bundle = SnapshotBundle {
            main_snapshot: b"main-snap".to_vec(),
            main_source_map: b"main-map".to_vec(),
            debug_snapshot: b"debug-snap".to_vec(),
            debug_source_map: b"debug-map".to_vec(),
        };
        let mut buf = Vec::new();
        write_bundle_frames(&mut buf, &bundle).unwrap();

        let mut cursor = Cursor::new(buf);
        let main_snapshot = read_frame(&mut cursor).unwrap();
        let main_source_map = read_frame(&mut cursor).unwrap();
        let debug_snapshot = read_frame(&mut cursor).unwrap();
        let debug_source_map = read_frame(&mut cursor).unwrap();
        assert_eq!(main_snapshot, bundle.main_snapshot);
        assert_eq!(main_source_map, bundle.main_source_map);
        assert_eq!(debug_snapshot, bundle.debug_snapshot);
        assert_eq!(debug_source_map, bundle.debug_source_map);
    }

    #[test]
    fn an_empty_frame_round_trips_as_a_zero_length_payload() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &[]).unwrap();
        let mut cursor = Cursor::new(buf);
        assert_eq!(read_frame(&mut cursor).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn a_truncated_frame_is_reported_as_a_short_read() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"hello world").unwrap();
        buf.truncate(buf.len() - 3);
        let mut cursor = Cursor::new(buf);
        let err = read_frame(&mut cursor).unwrap_err();
        assert!(matches!(err, DualCompileError::ShortRead { expected: 11, got: 8 }));
    }
}
