use std::fmt;

use crate::{render::VideoFrame, Result, VisualiserError};

/// Container/codec pairing negotiated when a recording starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingProfile {
    pub mime_type: &'static str,
    pub extension: &'static str,
}

impl EncodingProfile {
    /// Widely supported pairing tried first.
    pub const PREFERRED: Self = Self {
        mime_type: "video/webm;codecs=vp9,opus",
        extension: "webm",
    };

    /// Fallback every encoder has to accept.
    pub const DEFAULT: Self = Self {
        mime_type: "video/x-waveform-interleaved",
        extension: "wfv",
    };
}

impl fmt::Display for EncodingProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type)
    }
}

/// Stream parameters handed to the encoder at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub sample_rate: u32,
}

/// Muxes captured video frames and audio blocks into a byte stream.
pub trait CaptureEncoder {
    /// Prepares a new stream. Fails with
    /// [`VisualiserError::EncodingUnsupported`] when `profile` cannot be
    /// produced.
    fn configure(&mut self, profile: EncodingProfile, format: StreamFormat) -> Result<()>;

    fn encode_frame(&mut self, frame: &VideoFrame, timestamp_ms: u64) -> Result<()>;

    fn encode_audio(&mut self, samples: &[f32], timestamp_ms: u64) -> Result<()>;

    /// Hands over everything encoded since the previous call. May be empty.
    fn take_chunk(&mut self) -> Vec<u8>;
}

pub const MAGIC: &[u8; 4] = b"WFV1";
pub const VIDEO_TAG: u8 = b'V';
pub const AUDIO_TAG: u8 = b'A';

const HEADER_LEN: usize = 4 + 4 * 4;
const PACKET_HEADER_LEN: usize = 1 + 8 + 4;

/// Encoder for [`EncodingProfile::DEFAULT`].
///
/// Layout: `WFV1`, then width, height, sample rate and fps as `u32` LE,
/// followed by packets of `tag: u8`, `timestamp_ms: u64 LE`,
/// `len: u32 LE` and the payload. Video payloads are PNG images, audio
/// payloads mono 16-bit LE PCM. The header is written in front of the
/// first packet, so a stream with no packets produces no bytes.
#[derive(Debug, Default)]
pub struct InterleavedEncoder {
    format: Option<StreamFormat>,
    header_written: bool,
    pending: Vec<u8>,
}

impl InterleavedEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_packet(&mut self, tag: u8, timestamp_ms: u64, payload: &[u8]) -> Result<()> {
        let format = self
            .format
            .ok_or_else(|| VisualiserError::msg("encoder used before configure"))?;
        let len = u32::try_from(payload.len())
            .map_err(|_| VisualiserError::InvalidInput("packet exceeds 4 GiB"))?;

        if !self.header_written {
            self.pending.extend_from_slice(MAGIC);
            for field in [format.width, format.height, format.sample_rate, format.fps] {
                self.pending.extend_from_slice(&field.to_le_bytes());
            }
            self.header_written = true;
        }

        self.pending.push(tag);
        self.pending.extend_from_slice(&timestamp_ms.to_le_bytes());
        self.pending.extend_from_slice(&len.to_le_bytes());
        self.pending.extend_from_slice(payload);
        Ok(())
    }
}

impl CaptureEncoder for InterleavedEncoder {
    fn configure(&mut self, profile: EncodingProfile, format: StreamFormat) -> Result<()> {
        if profile != EncodingProfile::DEFAULT {
            return Err(VisualiserError::EncodingUnsupported(profile.mime_type.to_string()));
        }
        self.format = Some(format);
        self.header_written = false;
        self.pending.clear();
        Ok(())
    }

    fn encode_frame(&mut self, frame: &VideoFrame, timestamp_ms: u64) -> Result<()> {
        let png = frame.encode_png()?;
        self.push_packet(VIDEO_TAG, timestamp_ms, &png)
    }

    fn encode_audio(&mut self, samples: &[f32], timestamp_ms: u64) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }
        let mut pcm = Vec::with_capacity(samples.len() * 2);
        for &sample in samples {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            pcm.extend_from_slice(&value.to_le_bytes());
        }
        self.push_packet(AUDIO_TAG, timestamp_ms, &pcm)
    }

    fn take_chunk(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.pending)
    }
}

/// Totals read back from an interleaved stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterleavedSummary {
    pub width: u32,
    pub height: u32,
    pub sample_rate: u32,
    pub fps: u32,
    pub video_packets: usize,
    pub audio_samples: usize,
    /// Timestamp of the last packet.
    pub last_timestamp_ms: u64,
}

/// Walks an interleaved stream and checks its framing.
pub fn inspect_interleaved(bytes: &[u8]) -> Result<InterleavedSummary> {
    let truncated = || VisualiserError::InvalidInput("truncated interleaved stream");

    if bytes.len() < HEADER_LEN || &bytes[..4] != MAGIC {
        return Err(VisualiserError::InvalidInput("missing interleaved stream header"));
    }
    let field = |index: usize| {
        let start = 4 + index * 4;
        let mut word = [0; 4];
        word.copy_from_slice(&bytes[start..start + 4]);
        u32::from_le_bytes(word)
    };
    let mut summary = InterleavedSummary {
        width: field(0),
        height: field(1),
        sample_rate: field(2),
        fps: field(3),
        ..InterleavedSummary::default()
    };

    let mut rest = &bytes[HEADER_LEN..];
    while !rest.is_empty() {
        if rest.len() < PACKET_HEADER_LEN {
            return Err(truncated());
        }
        let (head, tail) = rest.split_at(PACKET_HEADER_LEN);
        let mut timestamp = [0u8; 8];
        timestamp.copy_from_slice(&head[1..9]);
        let mut len = [0u8; 4];
        len.copy_from_slice(&head[9..13]);
        let len = u32::from_le_bytes(len) as usize;
        if tail.len() < len {
            return Err(truncated());
        }

        match head[0] {
            VIDEO_TAG => summary.video_packets += 1,
            AUDIO_TAG => summary.audio_samples += len / 2,
            _ => return Err(VisualiserError::InvalidInput("unknown packet tag")),
        }
        summary.last_timestamp_ms = u64::from_le_bytes(timestamp);
        rest = &tail[len..];
    }

    Ok(summary)
}
