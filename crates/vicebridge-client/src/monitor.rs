//! Typed high-level monitor operations.
//!
//! Every operation validates its inputs against the 16-bit address space
//! before any byte hits the socket, builds the request body, runs it
//! through the connection's correlator, and decodes the response body
//! into a typed result.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::{BufMut, BytesMut};
use tracing::{debug, trace};
use vicebridge_wire::BodyCursor;

use crate::connection::{Connection, ConnectionConfig, RunStateSink};
use crate::error::{ClientError, Result};
use crate::types::{
    Checkpoint, CheckpointKind, CheckpointOptions, ConnectionState, DisplayFrame, MemSpace,
    PaletteEntry, RegisterId, Registers, StatusFlags,
};

/// Monitor client: the command facade over one [`Connection`].
///
/// Checkpoints are mirrored in a local id map because the peer has no
/// reliable enumerate-all command; the map is kept honest by evicting
/// temporary checkpoints when the peer reports consuming them.
pub struct MonitorClient {
    connection: Connection,
    checkpoints: Arc<Mutex<BTreeMap<u32, Checkpoint>>>,
}

impl MonitorClient {
    pub fn new(config: ConnectionConfig) -> Self {
        let connection = Connection::new(config);
        let checkpoints = Arc::new(Mutex::new(BTreeMap::<u32, Checkpoint>::new()));

        let map = Arc::clone(&checkpoints);
        let info_kind = connection.config().protocol.commands.checkpoint_get;
        connection.on_unsolicited_frame(Box::new(move |frame| {
            if frame.kind != info_kind {
                return;
            }
            let Ok((checkpoint, hit)) = decode_checkpoint(&frame.body) else {
                trace!("undecodable unsolicited checkpoint report, ignoring");
                return;
            };
            let mut map = map.lock().unwrap_or_else(PoisonError::into_inner);
            if hit && checkpoint.temporary {
                // The peer deletes a temporary checkpoint on first hit;
                // drop our mirror entry so the two sides stay in step.
                if map.remove(&checkpoint.id).is_some() {
                    debug!(id = checkpoint.id, "temporary checkpoint consumed by peer");
                }
            } else if let Some(entry) = map.get_mut(&checkpoint.id) {
                entry.hit_count = checkpoint.hit_count;
                entry.ignore_count = checkpoint.ignore_count;
                entry.enabled = checkpoint.enabled;
            }
        }));

        Self {
            connection,
            checkpoints,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        self.connection.config()
    }

    pub fn connect(&self) -> Result<()> {
        self.connection.connect()
    }

    pub fn disconnect(&self) {
        self.connection.disconnect();
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn on_run_state_changed(&self, sink: RunStateSink) {
        self.connection.on_run_state_changed(sink);
    }

    fn command(&self, pick: impl Fn(&vicebridge_wire::CommandSet) -> u8) -> u8 {
        pick(&self.connection.config().protocol.commands)
    }

    /// Liveness probe; an ack means the monitor is responsive.
    pub fn ping(&self) -> Result<()> {
        self.connection.transact(self.command(|c| c.ping), &[])?;
        Ok(())
    }

    /// Read `start..=end` from the given memory space.
    pub fn read_memory(&self, start: u16, end: u16, space: MemSpace) -> Result<Vec<u8>> {
        if start > end {
            return Err(ClientError::InvalidRange { start, end });
        }

        let mut body = BytesMut::new();
        body.put_u8(0); // no side effects on IO reads
        body.put_u16_le(start);
        body.put_u16_le(end);
        body.put_u8(space.code());
        body.put_u16_le(0); // bank: current configuration

        let frame = self.connection.transact(self.command(|c| c.mem_get), &body)?;
        decode("memory", &frame.body, |cursor| {
            let len = cursor.u16_le()? as usize;
            Ok(cursor.take(len)?.to_vec())
        })
    }

    /// Write `bytes` starting at `addr` in the given memory space.
    pub fn write_memory(&self, addr: u16, bytes: &[u8], space: MemSpace) -> Result<()> {
        if bytes.is_empty() {
            return Err(ClientError::EmptyPayload);
        }
        if addr as usize + bytes.len() > 0x1_0000 {
            return Err(ClientError::RangeOverflow {
                addr,
                len: bytes.len(),
            });
        }
        let end = addr + (bytes.len() - 1) as u16;

        let mut body = BytesMut::new();
        body.put_u8(0);
        body.put_u16_le(addr);
        body.put_u16_le(end);
        body.put_u8(space.code());
        body.put_u16_le(0);
        body.put_slice(bytes);

        self.connection.transact(self.command(|c| c.mem_set), &body)?;
        Ok(())
    }

    /// Fetch the CPU register file for a memory space.
    pub fn registers(&self, space: MemSpace) -> Result<Registers> {
        let frame = self
            .connection
            .transact(self.command(|c| c.registers_get), &[space.code()])?;
        decode("registers", &frame.body, |cursor| {
            let count = cursor.u16_le()?;
            let mut registers = Registers::default();
            for _ in 0..count {
                let item_size = cursor.u8()? as usize;
                if item_size < 3 {
                    return Err(vicebridge_wire::WireError::Truncated {
                        needed: 3 - item_size,
                    });
                }
                let id = cursor.u8()?;
                let value = cursor.u16_le()?;
                cursor.skip(item_size - 3)?;
                match RegisterId::from_code(id) {
                    Some(RegisterId::A) => registers.a = value as u8,
                    Some(RegisterId::X) => registers.x = value as u8,
                    Some(RegisterId::Y) => registers.y = value as u8,
                    Some(RegisterId::Pc) => registers.pc = value,
                    Some(RegisterId::Sp) => registers.sp = value as u8,
                    Some(RegisterId::Flags) => {
                        registers.flags = StatusFlags::from_bits(value as u8)
                    }
                    None => trace!(id, "unknown register id in response, skipping"),
                }
            }
            Ok(registers)
        })
    }

    /// Write one or more registers.
    pub fn set_registers(&self, values: &[(RegisterId, u16)], space: MemSpace) -> Result<()> {
        let mut body = BytesMut::new();
        body.put_u8(space.code());
        body.put_u16_le(values.len() as u16);
        for &(id, value) in values {
            body.put_u8(3);
            body.put_u8(id.code());
            body.put_u16_le(value);
        }

        self.connection
            .transact(self.command(|c| c.registers_set), &body)?;
        Ok(())
    }

    /// Execute `count` instructions, optionally stepping over subroutines.
    pub fn step(&self, count: u16, step_over: bool) -> Result<()> {
        if count == 0 {
            return Err(ClientError::ZeroCount);
        }
        let mut body = BytesMut::new();
        body.put_u8(step_over as u8);
        body.put_u16_le(count);

        self.connection
            .transact(self.command(|c| c.advance_instructions), &body)?;
        self.connection.set_running(false);
        Ok(())
    }

    /// Resume execution.
    pub fn resume(&self) -> Result<()> {
        self.connection.transact(self.command(|c| c.exit), &[])?;
        self.connection.set_running(true);
        Ok(())
    }

    /// Run until the current subroutine returns.
    pub fn execute_until_return(&self) -> Result<()> {
        self.connection
            .transact(self.command(|c| c.execute_until_return), &[])?;
        self.connection.set_running(true);
        Ok(())
    }

    /// Reset the machine. A hard reset also clears memory.
    pub fn reset(&self, hard: bool) -> Result<()> {
        self.connection
            .transact(self.command(|c| c.reset), &[hard as u8])?;
        self.connection.set_running(true);
        Ok(())
    }

    /// Set an execution breakpoint over `start..=end`.
    pub fn set_breakpoint(
        &self,
        start: u16,
        end: u16,
        options: CheckpointOptions,
    ) -> Result<Checkpoint> {
        self.set_checkpoint(start, end, CheckpointKind::Exec, options)
    }

    /// Set a memory watchpoint over `start..=end`.
    pub fn set_watchpoint(
        &self,
        start: u16,
        end: u16,
        kind: CheckpointKind,
        options: CheckpointOptions,
    ) -> Result<Checkpoint> {
        self.set_checkpoint(start, end, kind, options)
    }

    fn set_checkpoint(
        &self,
        start: u16,
        end: u16,
        kind: CheckpointKind,
        options: CheckpointOptions,
    ) -> Result<Checkpoint> {
        if start > end {
            return Err(ClientError::InvalidRange { start, end });
        }

        let mut body = BytesMut::new();
        body.put_u16_le(start);
        body.put_u16_le(end);
        body.put_u8(options.stop as u8);
        body.put_u8(options.enabled as u8);
        body.put_u8(kind.mask());
        body.put_u8(options.temporary as u8);

        let frame = self
            .connection
            .transact(self.command(|c| c.checkpoint_set), &body)?;
        let (checkpoint, _hit) = decode_checkpoint(&frame.body)?;
        self.lock_checkpoints()
            .insert(checkpoint.id, checkpoint.clone());
        debug!(
            id = checkpoint.id,
            start, end, "checkpoint confirmed by peer"
        );
        Ok(checkpoint)
    }

    /// Enable or disable a checkpoint by peer id.
    pub fn toggle_checkpoint(&self, id: u32, enabled: bool) -> Result<()> {
        let mut body = BytesMut::new();
        body.put_u32_le(id);
        body.put_u8(enabled as u8);

        self.connection
            .transact(self.command(|c| c.checkpoint_toggle), &body)?;
        if let Some(entry) = self.lock_checkpoints().get_mut(&id) {
            entry.enabled = enabled;
        }
        Ok(())
    }

    /// Delete a checkpoint by peer id.
    ///
    /// The peer is authoritative: the delete is sent even when the id is
    /// unknown locally, and a stale local entry is dropped either way.
    pub fn delete_checkpoint(&self, id: u32) -> Result<()> {
        let mut body = BytesMut::new();
        body.put_u32_le(id);

        self.connection
            .transact(self.command(|c| c.checkpoint_delete), &body)?;
        self.lock_checkpoints().remove(&id);
        Ok(())
    }

    /// Locally tracked checkpoints, ordered by id.
    pub fn checkpoints(&self) -> Vec<Checkpoint> {
        self.lock_checkpoints().values().cloned().collect()
    }

    /// Fetch the current display frame.
    pub fn display(&self, use_indexed_palette: bool) -> Result<DisplayFrame> {
        let mut body = BytesMut::new();
        body.put_u8(use_indexed_palette as u8);
        body.put_u8(0); // format: raw

        let frame = self
            .connection
            .transact(self.command(|c| c.display_get), &body)?;
        decode("display", &frame.body, |cursor| {
            let header_len = cursor.u32_le()? as usize;
            if header_len < 13 {
                return Err(vicebridge_wire::WireError::Truncated {
                    needed: 13 - header_len,
                });
            }
            let width = cursor.u16_le()?;
            let height = cursor.u16_le()?;
            let x_offset = cursor.u16_le()?;
            let y_offset = cursor.u16_le()?;
            let inner_width = cursor.u16_le()?;
            let inner_height = cursor.u16_le()?;
            let bits_per_pixel = cursor.u8()?;
            // Newer peers may append header fields we do not know.
            cursor.skip(header_len - 13)?;
            let buffer_len = cursor.u32_le()? as usize;
            let pixels = cursor.take(buffer_len)?.to_vec();
            Ok(DisplayFrame {
                width,
                height,
                x_offset,
                y_offset,
                inner_width,
                inner_height,
                bits_per_pixel,
                pixels,
            })
        })
    }

    /// Fetch the active palette.
    pub fn palette(&self) -> Result<Vec<PaletteEntry>> {
        let frame = self
            .connection
            .transact(self.command(|c| c.palette_get), &[])?;
        decode("palette", &frame.body, |cursor| {
            let count = cursor.u16_le()?;
            let mut entries = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let item_size = cursor.u8()? as usize;
                if item_size < 3 {
                    return Err(vicebridge_wire::WireError::Truncated {
                        needed: 3 - item_size,
                    });
                }
                let red = cursor.u8()?;
                let green = cursor.u8()?;
                let blue = cursor.u8()?;
                cursor.skip(item_size - 3)?;
                entries.push(PaletteEntry { red, green, blue });
            }
            Ok(entries)
        })
    }

    /// Ask the peer to write a machine snapshot to `path` (peer-side).
    pub fn save_snapshot(&self, path: &str) -> Result<()> {
        let mut body = BytesMut::new();
        body.put_u8(0); // without ROMs
        body.put_u8(0); // without attached disks
        put_filename(&mut body, path)?;

        self.connection.transact(self.command(|c| c.dump), &body)?;
        Ok(())
    }

    /// Ask the peer to restore a machine snapshot from `path` (peer-side).
    pub fn load_snapshot(&self, path: &str) -> Result<()> {
        let mut body = BytesMut::new();
        put_filename(&mut body, path)?;

        self.connection
            .transact(self.command(|c| c.undump), &body)?;
        Ok(())
    }

    /// Autostart a program image from `path` (peer-side).
    pub fn autostart(&self, path: &str, run_after_load: bool, file_index: u16) -> Result<()> {
        let mut body = BytesMut::new();
        body.put_u8(run_after_load as u8);
        body.put_u16_le(file_index);
        put_filename(&mut body, path)?;

        self.connection
            .transact(self.command(|c| c.autostart), &body)?;
        self.connection.set_running(true);
        Ok(())
    }

    fn lock_checkpoints(&self) -> MutexGuard<'_, BTreeMap<u32, Checkpoint>> {
        self.checkpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn put_filename(body: &mut BytesMut, path: &str) -> Result<()> {
    let bytes = path.as_bytes();
    if bytes.len() > u8::MAX as usize {
        return Err(ClientError::FilenameTooLong { len: bytes.len() });
    }
    body.put_u8(bytes.len() as u8);
    body.put_slice(bytes);
    Ok(())
}

fn decode<T>(
    what: &'static str,
    body: &[u8],
    parse: impl FnOnce(&mut BodyCursor<'_>) -> vicebridge_wire::Result<T>,
) -> Result<T> {
    let mut cursor = BodyCursor::new(body);
    parse(&mut cursor).map_err(|err| ClientError::MalformedResponse {
        what,
        detail: err.to_string(),
    })
}

/// Decode a checkpoint-info body into a checkpoint plus its hit flag.
fn decode_checkpoint(body: &[u8]) -> Result<(Checkpoint, bool)> {
    decode("checkpoint", body, |cursor| {
        let id = cursor.u32_le()?;
        let hit = cursor.bool()?;
        let start = cursor.u16_le()?;
        let end = cursor.u16_le()?;
        let _stop = cursor.bool()?;
        let enabled = cursor.bool()?;
        let mask = cursor.u8()?;
        let temporary = cursor.bool()?;
        let hit_count = cursor.u32_le()?;
        let ignore_count = cursor.u32_le()?;
        let kind = CheckpointKind::from_mask(mask).unwrap_or(CheckpointKind::Exec);
        Ok((
            Checkpoint {
                id,
                start,
                end,
                enabled,
                temporary,
                kind,
                hit_count,
                ignore_count,
            },
            hit,
        ))
    })
}

/// Encode a checkpoint-info body; the mirror of [`decode_checkpoint`],
/// used by the mock peers in the test suite.
pub fn encode_checkpoint_body(checkpoint: &Checkpoint, hit: bool) -> Vec<u8> {
    let mut body = BytesMut::new();
    body.put_u32_le(checkpoint.id);
    body.put_u8(hit as u8);
    body.put_u16_le(checkpoint.start);
    body.put_u16_le(checkpoint.end);
    body.put_u8(1);
    body.put_u8(checkpoint.enabled as u8);
    body.put_u8(checkpoint.kind.mask());
    body.put_u8(checkpoint.temporary as u8);
    body.put_u32_le(checkpoint.hit_count);
    body.put_u32_le(checkpoint.ignore_count);
    body.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_client() -> MonitorClient {
        MonitorClient::new(ConnectionConfig::default())
    }

    #[test]
    fn read_memory_rejects_inverted_range_before_io() {
        // No connection exists, so reaching the socket would fail with
        // NotConnected; the range error proves validation came first.
        let client = offline_client();
        let err = client
            .read_memory(0x0427, 0x0400, MemSpace::Main)
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::InvalidRange {
                start: 0x0427,
                end: 0x0400
            }
        ));
    }

    #[test]
    fn write_memory_rejects_empty_and_overflowing_payloads() {
        let client = offline_client();
        assert!(matches!(
            client.write_memory(0x1000, &[], MemSpace::Main).unwrap_err(),
            ClientError::EmptyPayload
        ));
        let bytes = vec![0u8; 3];
        assert!(matches!(
            client
                .write_memory(0xfffe, &bytes, MemSpace::Main)
                .unwrap_err(),
            ClientError::RangeOverflow { addr: 0xfffe, len: 3 }
        ));
    }

    #[test]
    fn write_memory_accepts_exact_top_of_memory() {
        let client = offline_client();
        // 0xfffe + 2 bytes = exactly 0x10000; only the missing
        // connection trips it up.
        let err = client
            .write_memory(0xfffe, &[0xaa, 0xbb], MemSpace::Main)
            .unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));
    }

    #[test]
    fn step_requires_a_positive_count() {
        let client = offline_client();
        assert!(matches!(
            client.step(0, false).unwrap_err(),
            ClientError::ZeroCount
        ));
    }

    #[test]
    fn checkpoint_range_validated_locally() {
        let client = offline_client();
        let err = client
            .set_breakpoint(0xc000, 0x1000, CheckpointOptions::default())
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidRange { .. }));
    }

    #[test]
    fn overlong_filename_rejected_locally() {
        let client = offline_client();
        let path = "x".repeat(300);
        assert!(matches!(
            client.save_snapshot(&path).unwrap_err(),
            ClientError::FilenameTooLong { len: 300 }
        ));
    }

    #[test]
    fn checkpoint_body_roundtrip() {
        let checkpoint = Checkpoint {
            id: 7,
            start: 0xd020,
            end: 0xd020,
            enabled: true,
            temporary: true,
            kind: CheckpointKind::Store,
            hit_count: 2,
            ignore_count: 0,
        };
        let body = encode_checkpoint_body(&checkpoint, true);
        let (decoded, hit) = decode_checkpoint(&body).unwrap();
        assert_eq!(decoded, checkpoint);
        assert!(hit);
    }

    #[test]
    fn truncated_checkpoint_body_is_malformed() {
        let err = decode_checkpoint(&[0x01, 0x00]).unwrap_err();
        assert!(matches!(
            err,
            ClientError::MalformedResponse {
                what: "checkpoint",
                ..
            }
        ));
    }
}
