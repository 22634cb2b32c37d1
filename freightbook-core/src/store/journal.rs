use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{error, warn};

use crate::error::{FreightError, Result};
use crate::store::batch::BatchOp;

const MAGIC: &[u8; 8] = b"FBKLOG\0\0";
const VERSION: u8 = 1;
const HEADER_LEN: u64 = (MAGIC.len() + 1) as u64;
const CHECKSUM_LEN: usize = 32;
const PREFIX_CHECK_LEN: usize = 4;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum LogRecord {
    /// One committed batch. A batch is durable exactly when its record is.
    Commit { at_ms: i64, ops: Vec<BatchOp> },
}

/// Append-only log of committed batches.
///
/// Frame: `uvarint(len) || blake3(uvarint)[..4] || cbor(record) || blake3(cbor)`.
/// Only a frame cut short at the end of the file is treated as torn: it is dropped
/// on replay and truncated away before new appends. Any damage to a complete prefix
/// or body is a `Format` error and the file is left as is.
pub struct Journal {
    f: File,
    path: PathBuf,
    /// Set when a failed append could not be rolled back; no further appends.
    broken: Option<String>,
}

fn prefix_check(len_bytes: &[u8]) -> [u8; PREFIX_CHECK_LEN] {
    let mut out = [0u8; PREFIX_CHECK_LEN];
    out.copy_from_slice(&blake3::hash(len_bytes).as_bytes()[..PREFIX_CHECK_LEN]);
    out
}

/// Fill `dst` or report that the file ended first.
fn read_full(f: &mut File, dst: &mut [u8]) -> Result<bool> {
    match f.read_exact(dst) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn read_next_record(f: &mut File, file_len: u64) -> Result<Option<LogRecord>> {
    let start = f.stream_position()?;
    let len = match get_uvarint(f)? {
        Some(n) => n,
        None => return Ok(None),
    };
    let mut check = [0u8; PREFIX_CHECK_LEN];
    if !read_full(f, &mut check)? {
        return Ok(None);
    }
    let mut len_bytes = Vec::with_capacity(10);
    put_uvarint(&mut len_bytes, len);
    if prefix_check(&len_bytes) != check {
        return Err(FreightError::Format(format!(
            "journal length prefix at offset {start} failed its checksum"
        )));
    }

    let body_off = f.stream_position()?;
    if body_off + len + CHECKSUM_LEN as u64 > file_len {
        return Ok(None);
    }

    let mut buf = vec![0u8; len as usize];
    let mut sum = [0u8; CHECKSUM_LEN];
    if !read_full(f, &mut buf)? || !read_full(f, &mut sum)? {
        return Ok(None);
    }

    if blake3::hash(&buf).as_bytes() != &sum {
        return Err(FreightError::Format(format!(
            "journal record at offset {start} failed its checksum"
        )));
    }

    let rec: LogRecord = serde_cbor::from_slice(&buf)
        .map_err(|e| FreightError::Format(format!("journal record at offset {start}: {e}")))?;
    Ok(Some(rec))
}

fn put_uvarint(out: &mut Vec<u8>, mut x: u64) {
    while x >= 0x80 {
        out.push((x as u8) | 0x80);
        x >>= 7;
    }
    out.push(x as u8);
}

fn get_uvarint<R: Read>(r: &mut R) -> Result<Option<u64>> {
    let mut x: u64 = 0;
    let mut s: u32 = 0;
    for _ in 0..10 {
        let mut b = [0u8; 1];
        match r.read(&mut b) {
            Ok(0) => return Ok(None),
            Ok(_) => {
                let byte = b[0];
                if byte < 0x80 {
                    x |= (byte as u64) << s;
                    return Ok(Some(x));
                }
                x |= ((byte & 0x7f) as u64) << s;
                s += 7;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(FreightError::Format("journal length prefix too long".into()))
}

impl Journal {
    pub fn open(path: &Path) -> Result<Self> {
        let mut f = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        if f.metadata()?.len() == 0 {
            f.write_all(MAGIC)?;
            f.write_all(&[VERSION])?;
            f.sync_all()?;
        } else {
            let mut magic = [0u8; 8];
            let mut ver = [0u8; 1];
            f.read_exact(&mut magic)
                .and_then(|_| f.read_exact(&mut ver))
                .map_err(|_| {
                    FreightError::Format(format!("{} is not a freightbook journal", path.display()))
                })?;
            if &magic != MAGIC {
                return Err(FreightError::Format(format!(
                    "{} is not a freightbook journal",
                    path.display()
                )));
            }
            if ver[0] != VERSION {
                return Err(FreightError::Format(format!(
                    "journal version {} is not supported",
                    ver[0]
                )));
            }
        }
        f.seek(SeekFrom::End(0))?;
        Ok(Self {
            f,
            path: path.to_path_buf(),
            broken: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every complete record from the start, then cut off any torn tail so the
    /// next append starts on a frame boundary.
    pub fn replay(&mut self) -> Result<Vec<LogRecord>> {
        let file_len = self.f.metadata()?.len();
        self.f.seek(SeekFrom::Start(HEADER_LEN))?;
        let mut out = Vec::new();
        let mut good_end = HEADER_LEN;
        while let Some(rec) = read_next_record(&mut self.f, file_len)? {
            out.push(rec);
            good_end = self.f.stream_position()?;
        }
        if good_end < file_len {
            warn!(
                journal = %self.path.display(),
                dropped_bytes = file_len - good_end,
                "truncating incomplete journal tail"
            );
            self.f.set_len(good_end)?;
        }
        self.f.seek(SeekFrom::End(0))?;
        Ok(out)
    }

    /// Append one record as a single frame and sync it to disk.
    pub fn append(&mut self, rec: &LogRecord) -> Result<()> {
        if let Some(reason) = &self.broken {
            return Err(FreightError::WriteFailure(format!(
                "journal {} is unusable: {reason}",
                self.path.display()
            )));
        }

        let mut body = Vec::with_capacity(256);
        serde_cbor::to_writer(&mut body, rec)
            .map_err(|e| FreightError::Format(format!("journal encode: {e}")))?;

        let mut frame = Vec::with_capacity(body.len() + 10 + PREFIX_CHECK_LEN + CHECKSUM_LEN);
        put_uvarint(&mut frame, body.len() as u64);
        let check = prefix_check(&frame);
        frame.extend_from_slice(&check);
        frame.extend_from_slice(&body);
        frame.extend_from_slice(blake3::hash(&body).as_bytes());

        let pos = self.f.seek(SeekFrom::End(0))?;
        let written = self
            .f
            .write_all(&frame)
            .and_then(|_| self.f.sync_data());
        if let Err(e) = written {
            // Leave no partial frame behind for the next append.
            let rollback = self.f.set_len(pos).and_then(|_| self.f.sync_data());
            return Err(match rollback {
                Ok(()) => FreightError::WriteFailure(format!(
                    "journal append to {}: {e}",
                    self.path.display()
                )),
                Err(r) => {
                    let reason = format!("append failed ({e}) and rollback failed ({r})");
                    error!(
                        journal = %self.path.display(),
                        %reason,
                        "journal left with a partial frame"
                    );
                    let err = FreightError::WriteFailure(format!(
                        "journal append to {}: {reason}",
                        self.path.display()
                    ));
                    self.broken = Some(reason);
                    err
                }
            });
        }
        Ok(())
    }
}
