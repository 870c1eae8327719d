//! Binary framing
//!
//! Format: `[kind:1][length:4][payload:N][crc32:4]`
//!
//! The payload is the bincode serialization of [`SyncEntry`]; the CRC
//! covers kind, length, and payload. Length and CRC are little-endian.

use crate::entry::SyncEntry;
use crate::{Error, Result};
use crc32fast::Hasher;
use std::io::{Read, Write};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Fixed header size: kind byte + payload length
const HEADER_LEN: usize = 5;

/// Minimum frame size: header + CRC trailer
const MIN_FRAME_LEN: usize = HEADER_LEN + 4;

impl SyncEntry {
    /// Encode entry to a framed byte buffer
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)
            .map_err(|e| Error::codec(format!("serialization failed: {}", e)))?;

        let mut buf = Vec::with_capacity(HEADER_LEN + payload.len() + 4);
        buf.push(self.metadata.kind as u8);
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&payload);

        let mut hasher = Hasher::new();
        hasher.update(&buf);
        let crc = hasher.finalize();
        buf.extend_from_slice(&crc.to_le_bytes());

        Ok(buf)
    }

    /// Decode entry from a framed byte buffer
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < MIN_FRAME_LEN {
            return Err(Error::Truncated(buf.len()));
        }

        // Kind byte must be recognizable even before the payload parses
        crate::entry::MessageKind::try_from(buf[0])?;

        let crc_offset = buf.len() - 4;
        let expected = u32::from_le_bytes(
            buf[crc_offset..]
                .try_into()
                .map_err(|_| Error::Truncated(buf.len()))?,
        );

        let mut hasher = Hasher::new();
        hasher.update(&buf[..crc_offset]);
        let actual = hasher.finalize();

        if expected != actual {
            return Err(Error::Crc { expected, actual });
        }

        let length = u32::from_le_bytes(
            buf[1..HEADER_LEN]
                .try_into()
                .map_err(|_| Error::Truncated(buf.len()))?,
        ) as usize;
        if buf.len() < HEADER_LEN + length + 4 {
            return Err(Error::Truncated(buf.len()));
        }

        let payload = &buf[HEADER_LEN..HEADER_LEN + length];
        bincode::deserialize(payload)
            .map_err(|e| Error::codec(format!("deserialization failed: {}", e)))
    }

    /// Write framed entry to an async stream
    pub async fn write_to<W: AsyncWrite + Unpin>(&self, writer: &mut W) -> Result<()> {
        let buf = self.encode()?;
        writer.write_all(&buf).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Read one framed entry from an async stream
    pub async fn read_from<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Self> {
        let mut header = [0u8; HEADER_LEN];
        reader.read_exact(&mut header).await?;

        let length = u32::from_le_bytes(
            header[1..HEADER_LEN]
                .try_into()
                .map_err(|_| Error::Truncated(header.len()))?,
        ) as usize;

        let mut rest = vec![0u8; length + 4];
        reader.read_exact(&mut rest).await?;

        let mut full = Vec::with_capacity(HEADER_LEN + rest.len());
        full.extend_from_slice(&header);
        full.extend_from_slice(&rest);

        Self::decode(&full)
    }

    /// Write framed entry to a sync stream
    pub fn write_to_sync<W: Write>(&self, writer: &mut W) -> Result<()> {
        let buf = self.encode()?;
        writer.write_all(&buf)?;
        writer.flush()?;
        Ok(())
    }

    /// Read one framed entry from a sync stream
    pub fn read_from_sync<R: Read>(reader: &mut R) -> Result<Self> {
        let mut header = [0u8; HEADER_LEN];
        reader.read_exact(&mut header)?;

        let length = u32::from_le_bytes(
            header[1..HEADER_LEN]
                .try_into()
                .map_err(|_| Error::Truncated(header.len()))?,
        ) as usize;

        let mut rest = vec![0u8; length + 4];
        reader.read_exact(&mut rest)?;

        let mut full = Vec::with_capacity(HEADER_LEN + rest.len());
        full.extend_from_slice(&header);
        full.extend_from_slice(&rest);

        Self::decode(&full)
    }
}
