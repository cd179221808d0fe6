// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The disk queue file (§3 "Disk queue file", §4.3): a header followed by
//! a ring of length-prefixed frames. `tail` is the write head, `read_head`
//! the next-unread pointer, `backlog_head` the oldest unacked frame;
//! `backlog_head <= read_head <= tail` is maintained at every step.
//!
//! Logical pointers are monotonically increasing byte counters; the
//! physical file offset for a logical position is `HEADER_SIZE + (logical
//! % capacity)`, so a frame that crosses the end of the ring is split into
//! two writes/reads. Frame boundaries within the still-live
//! `[backlog_head, tail)` window are tracked in memory (`frame_lengths`)
//! so `ack_backlog`/`rewind_backlog` can move by a count of *messages*
//! without re-parsing the file. `backlog_head`/`tail` are themselves
//! persisted in the header on every mutation: since the ring reuses bytes
//! once they fall behind `backlog_head`, a reopen must resume scanning
//! from the last-persisted `backlog_head`, not from byte zero, or it would
//! reinterpret stale bytes from a previous lap around the ring as frames.

use crate::error::DiskQueueError;
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const MAGIC: &[u8; 8] = b"FLOWLOGQ";
const FORMAT_ID: u32 = 1;
const HEADER_SIZE: u64 = 48;
/// Each frame is a 4-byte big-endian length prefix followed by the payload.
const FRAME_PREFIX_LEN: u64 = 4;

pub struct DiskQueueFile {
    file: File,
    path: PathBuf,
    capacity: u64,
    /// Write head, as a monotonically increasing logical byte offset.
    tail: u64,
    /// Next-unread pointer; `backlog_head <= read_head <= tail`.
    read_head: u64,
    /// Oldest unacked frame.
    backlog_head: u64,
    /// Lengths (including the 4-byte prefix) of frames still live in
    /// `[backlog_head, tail)`, in order. `read_index` frames of this deque
    /// (from the front) have already been popped into the backlog.
    frame_lengths: VecDeque<u64>,
    read_index: usize,
}

fn read_exact_at(file: &mut File, pos: u64, buf: &mut [u8]) -> std::io::Result<()> {
    file.seek(SeekFrom::Start(pos))?;
    file.read_exact(buf)
}

fn write_all_at(file: &mut File, pos: u64, buf: &[u8]) -> std::io::Result<()> {
    file.seek(SeekFrom::Start(pos))?;
    file.write_all(buf)
}

impl DiskQueueFile {
    /// Create a fresh queue file with the given ring capacity (bytes of
    /// frame storage, excluding the header).
    pub fn create(path: &Path, capacity: u64) -> Result<Self, DiskQueueError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).truncate(true).read(true).write(true).open(path)?;
        let mut queue = DiskQueueFile {
            file,
            path: path.to_path_buf(),
            capacity,
            tail: 0,
            read_head: 0,
            backlog_head: 0,
            frame_lengths: VecDeque::new(),
            read_index: 0,
        };
        queue.write_header()?;
        queue.file.set_len(HEADER_SIZE + capacity)?;
        Ok(queue)
    }

    fn write_header(&mut self) -> Result<(), DiskQueueError> {
        let mut header = Vec::with_capacity(HEADER_SIZE as usize);
        header.extend_from_slice(MAGIC);
        header.extend_from_slice(&FORMAT_ID.to_be_bytes());
        header.extend_from_slice(&self.capacity.to_be_bytes());
        header.extend_from_slice(&self.backlog_head.to_be_bytes());
        header.extend_from_slice(&self.tail.to_be_bytes());
        header.resize(HEADER_SIZE as usize, 0);
        write_all_at(&mut self.file, 0, &header)?;
        Ok(())
    }

    /// Open an existing queue file, resuming from the last-persisted
    /// `backlog_head`/`tail` and replaying every frame between them to
    /// rebuild `frame_lengths` (ack state past the last header write is
    /// lost on crash, per §7 "best-effort semantics under crash" -- a
    /// frame popped but not yet acked before a crash replays again).
    /// Returns `Err` if the header is invalid or a frame fails to parse.
    pub fn open_existing(path: &Path) -> Result<Self, DiskQueueError> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;
        if &header[0..8] != MAGIC {
            return Err(DiskQueueError::Corrupt { offset: 0, message: "bad magic".to_string() });
        }
        let format_id = u32::from_be_bytes(header[8..12].try_into().unwrap_or_default());
        if format_id != FORMAT_ID {
            return Err(DiskQueueError::Corrupt {
                offset: 8,
                message: format!("unsupported format id {format_id}"),
            });
        }
        let capacity = u64::from_be_bytes(header[12..20].try_into().unwrap_or_default());
        let backlog_head = u64::from_be_bytes(header[20..28].try_into().unwrap_or_default());
        let tail = u64::from_be_bytes(header[28..36].try_into().unwrap_or_default());
        if tail < backlog_head || tail - backlog_head > capacity {
            return Err(DiskQueueError::Corrupt { offset: 20, message: "inconsistent header pointers".to_string() });
        }

        let mut queue = DiskQueueFile {
            file,
            path: path.to_path_buf(),
            capacity,
            tail,
            read_head: backlog_head,
            backlog_head,
            frame_lengths: VecDeque::new(),
            read_index: 0,
        };
        queue.scan_frames()?;
        Ok(queue)
    }

    /// Replay every frame between `backlog_head` and `tail` to rebuild
    /// `frame_lengths`, surfacing a parse failure as
    /// [`DiskQueueError::Corrupt`].
    fn scan_frames(&mut self) -> Result<(), DiskQueueError> {
        let mut offset = self.backlog_head;
        while offset < self.tail {
            let mut len_buf = [0u8; 4];
            self.read_ring(offset, &mut len_buf).map_err(|e| DiskQueueError::Corrupt {
                offset,
                message: format!("failed to read frame length prefix: {e}"),
            })?;
            let len = u32::from_be_bytes(len_buf) as u64;
            let frame_len = FRAME_PREFIX_LEN + len;
            if offset + frame_len > self.tail {
                return Err(DiskQueueError::Corrupt {
                    offset,
                    message: "frame length overruns persisted tail".to_string(),
                });
            }
            self.frame_lengths.push_back(frame_len);
            offset += frame_len;
        }
        self.read_head = self.tail;
        self.read_index = self.frame_lengths.len();
        Ok(())
    }

    fn read_ring(&mut self, logical: u64, buf: &mut [u8]) -> std::io::Result<()> {
        let phys = HEADER_SIZE + (logical % self.capacity);
        let first_len = (self.capacity - (logical % self.capacity)).min(buf.len() as u64) as usize;
        read_exact_at(&mut self.file, phys, &mut buf[..first_len])?;
        if first_len < buf.len() {
            read_exact_at(&mut self.file, HEADER_SIZE, &mut buf[first_len..])?;
        }
        Ok(())
    }

    fn write_ring(&mut self, logical: u64, buf: &[u8]) -> std::io::Result<()> {
        let phys = HEADER_SIZE + (logical % self.capacity);
        let first_len = (self.capacity - (logical % self.capacity)).min(buf.len() as u64) as usize;
        write_all_at(&mut self.file, phys, &buf[..first_len])?;
        if first_len < buf.len() {
            write_all_at(&mut self.file, HEADER_SIZE, &buf[first_len..])?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes currently occupied by live (unacked) frames.
    pub fn used_useful_space(&self) -> u64 {
        self.tail - self.backlog_head
    }

    pub fn max_useful_space(&self) -> u64 {
        self.capacity
    }

    pub fn file_size(&self) -> u64 {
        HEADER_SIZE + self.capacity
    }

    /// Number of unread (not-yet-popped) messages.
    pub fn length(&self) -> usize {
        self.frame_lengths.len() - self.read_index
    }

    pub fn get_next_head_position(&self) -> u64 {
        self.read_head
    }

    /// Append a framed message at the tail. Fails with [`DiskQueueError::Full`]
    /// if the ring does not have room (§8 "Disk queue at exactly capacity").
    pub fn push_tail(&mut self, payload: &[u8]) -> Result<(), DiskQueueError> {
        let frame_len = FRAME_PREFIX_LEN + payload.len() as u64;
        if self.used_useful_space() + frame_len > self.capacity {
            return Err(DiskQueueError::Full);
        }
        let mut frame = Vec::with_capacity(frame_len as usize);
        frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        frame.extend_from_slice(payload);
        self.write_ring(self.tail, &frame)?;
        self.tail += frame_len;
        self.frame_lengths.push_back(frame_len);
        self.write_header()?;
        Ok(())
    }

    fn read_frame_at(&mut self, logical: u64, frame_len: u64) -> Result<Vec<u8>, DiskQueueError> {
        let mut raw = vec![0u8; frame_len as usize];
        self.read_ring(logical, &mut raw).map_err(|e| DiskQueueError::Corrupt {
            offset: logical,
            message: e.to_string(),
        })?;
        let declared_len = u32::from_be_bytes(raw[0..4].try_into().unwrap_or_default()) as u64;
        if declared_len + FRAME_PREFIX_LEN != frame_len {
            return Err(DiskQueueError::Corrupt { offset: logical, message: "frame length mismatch".to_string() });
        }
        Ok(raw[4..].to_vec())
    }

    /// Read the next unread frame's payload without advancing `read_head`.
    pub fn peek_head(&mut self) -> Result<Option<Vec<u8>>, DiskQueueError> {
        if self.read_index >= self.frame_lengths.len() {
            return Ok(None);
        }
        let len = self.frame_lengths[self.read_index];
        Ok(Some(self.read_frame_at(self.read_head, len)?))
    }

    /// Read the next unread frame and advance `read_head`; the frame
    /// remains in the backlog (between `backlog_head` and `read_head`)
    /// until [`Self::ack_backlog`] releases it.
    pub fn pop_head(&mut self) -> Result<Option<Vec<u8>>, DiskQueueError> {
        if self.read_index >= self.frame_lengths.len() {
            return Ok(None);
        }
        let len = self.frame_lengths[self.read_index];
        let payload = self.read_frame_at(self.read_head, len)?;
        self.read_head += len;
        self.read_index += 1;
        Ok(Some(payload))
    }

    /// Advance `backlog_head` past `n` of the oldest unacked frames,
    /// freeing that ring space for reuse.
    pub fn ack_backlog(&mut self, n: usize) -> Result<(), DiskQueueError> {
        let n = n.min(self.read_index);
        for _ in 0..n {
            if let Some(len) = self.frame_lengths.pop_front() {
                self.backlog_head += len;
                self.read_index -= 1;
            }
        }
        if n > 0 {
            self.write_header()?;
        }
        Ok(())
    }

    /// Move `read_head` back toward `backlog_head` by `n` messages so the
    /// next `pop_head` calls replay them.
    pub fn rewind_backlog(&mut self, n: usize) {
        self.read_index = self.read_index.saturating_sub(n);
        self.read_head = self.backlog_head + self.frame_lengths.iter().take(self.read_index).sum::<u64>();
    }

    /// Rewind the entire backlog: `read_head` becomes `backlog_head`.
    pub fn rewind_backlog_all(&mut self) {
        self.read_index = 0;
        self.read_head = self.backlog_head;
    }

    pub fn sync(&mut self) -> Result<(), DiskQueueError> {
        self.write_header()?;
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn push_pop_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("q.dq");
        let mut q = DiskQueueFile::create(&path, 4096).unwrap();
        q.push_tail(b"hello").unwrap();
        q.push_tail(b"world").unwrap();
        assert_eq!(q.length(), 2);
        assert_eq!(q.pop_head().unwrap().unwrap(), b"hello");
        assert_eq!(q.pop_head().unwrap().unwrap(), b"world");
        assert_eq!(q.length(), 0);
    }

    #[test]
    fn peek_does_not_advance() {
        let dir = tempdir().unwrap();
        let mut q = DiskQueueFile::create(&dir.path().join("q.dq"), 4096).unwrap();
        q.push_tail(b"x").unwrap();
        assert_eq!(q.peek_head().unwrap().unwrap(), b"x");
        assert_eq!(q.peek_head().unwrap().unwrap(), b"x");
        assert_eq!(q.pop_head().unwrap().unwrap(), b"x");
    }

    #[test]
    fn ack_frees_space_for_reuse() {
        let dir = tempdir().unwrap();
        let mut q = DiskQueueFile::create(&dir.path().join("q.dq"), 32).unwrap();
        // 32 bytes of ring; each "xxxxxxxx" frame is 4 + 8 = 12 bytes.
        q.push_tail(b"xxxxxxxx").unwrap();
        q.push_tail(b"xxxxxxxx").unwrap();
        assert!(q.push_tail(b"xxxxxxxx").is_err(), "third frame should not fit before ack");
        q.pop_head().unwrap();
        q.ack_backlog(1).unwrap();
        q.push_tail(b"xxxxxxxx").unwrap();
    }

    #[test]
    fn rewind_replays_popped_but_unacked_messages() {
        let dir = tempdir().unwrap();
        let mut q = DiskQueueFile::create(&dir.path().join("q.dq"), 4096).unwrap();
        q.push_tail(b"a").unwrap();
        q.push_tail(b"b").unwrap();
        assert_eq!(q.pop_head().unwrap().unwrap(), b"a");
        assert_eq!(q.pop_head().unwrap().unwrap(), b"b");
        q.rewind_backlog_all();
        assert_eq!(q.pop_head().unwrap().unwrap(), b"a");
        assert_eq!(q.pop_head().unwrap().unwrap(), b"b");
    }

    #[test]
    fn rewind_partial_replays_only_n_messages() {
        let dir = tempdir().unwrap();
        let mut q = DiskQueueFile::create(&dir.path().join("q.dq"), 4096).unwrap();
        q.push_tail(b"a").unwrap();
        q.push_tail(b"b").unwrap();
        q.push_tail(b"c").unwrap();
        q.pop_head().unwrap();
        q.pop_head().unwrap();
        q.pop_head().unwrap();
        q.rewind_backlog(1);
        assert_eq!(q.pop_head().unwrap().unwrap(), b"c");
    }

    #[test]
    fn backlog_head_read_head_tail_ordering_invariant() {
        let dir = tempdir().unwrap();
        let mut q = DiskQueueFile::create(&dir.path().join("q.dq"), 4096).unwrap();
        q.push_tail(b"a").unwrap();
        q.push_tail(b"b").unwrap();
        q.pop_head().unwrap();
        assert!(q.backlog_head <= q.read_head);
        assert!(q.read_head <= q.tail);
        q.rewind_backlog_all();
        assert_eq!(q.read_head, q.backlog_head);
    }

    #[test]
    fn wraparound_write_and_read_round_trip() {
        let dir = tempdir().unwrap();
        let mut q = DiskQueueFile::create(&dir.path().join("q.dq"), 24).unwrap();
        // Each frame is 4 + 8 = 12 bytes; two frames exactly fill the ring.
        q.push_tail(b"aaaaaaaa").unwrap();
        q.push_tail(b"bbbbbbbb").unwrap();
        q.pop_head().unwrap();
        q.pop_head().unwrap();
        q.ack_backlog(2).unwrap();
        // This push wraps the physical write across the ring boundary.
        q.push_tail(b"cccccccc").unwrap();
        assert_eq!(q.pop_head().unwrap().unwrap(), b"cccccccc");
    }

    #[test]
    fn reopen_survives_process_restart() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("q.dq");
        {
            let mut q = DiskQueueFile::create(&path, 4096).unwrap();
            q.push_tail(b"a").unwrap();
            q.push_tail(b"b").unwrap();
            q.pop_head().unwrap();
            q.sync().unwrap();
        }
        let mut reopened = DiskQueueFile::open_existing(&path).unwrap();
        // Ack state is not persisted past the last header write (§7's
        // best-effort crash semantics); both frames replay since neither
        // was acked before the header was written.
        assert_eq!(reopened.pop_head().unwrap().unwrap(), b"a");
        assert_eq!(reopened.pop_head().unwrap().unwrap(), b"b");
    }

    #[test]
    fn reopen_after_ack_does_not_replay_acked_frames() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("q.dq");
        {
            let mut q = DiskQueueFile::create(&path, 4096).unwrap();
            q.push_tail(b"a").unwrap();
            q.push_tail(b"b").unwrap();
            q.pop_head().unwrap();
            q.ack_backlog(1).unwrap();
        }
        let mut reopened = DiskQueueFile::open_existing(&path).unwrap();
        assert_eq!(reopened.length(), 1);
        assert_eq!(reopened.pop_head().unwrap().unwrap(), b"b");
    }

    #[test]
    fn bad_magic_is_reported_as_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("q.dq");
        std::fs::write(&path, vec![0u8; 64]).unwrap();
        let err = DiskQueueFile::open_existing(&path).unwrap_err();
        assert!(matches!(err, DiskQueueError::Corrupt { .. }));
    }

    #[test]
    fn truncated_record_mid_file_is_reported_as_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("q.dq");
        {
            let mut q = DiskQueueFile::create(&path, 4096).unwrap();
            for i in 0..100u32 {
                q.push_tail(format!("message-{i}").as_bytes()).unwrap();
            }
        }
        // Corrupt the frame-length prefix of the very first frame so it
        // claims to be far larger than the data actually persisted.
        let mut file = OpenOptions::new().write(true).open(&path).unwrap();
        write_all_at(&mut file, HEADER_SIZE, &u32::MAX.to_be_bytes()).unwrap();
        drop(file);

        let err = DiskQueueFile::open_existing(&path).unwrap_err();
        assert!(matches!(err, DiskQueueError::Corrupt { .. }));
    }
}
