use std::{
    f32::consts::PI,
    fs::File,
    io::{BufReader, ErrorKind, Read},
    path::Path,
};

use hound::{SampleFormat, WavReader};
use tracing::{debug, warn};

use crate::{BoothError, Result};

/// Full-scale value used to map PCM samples onto `[-1, 1]`.
const PCM_SCALE: f32 = 32_768.0;

/// Producer of signed 16-bit mono PCM.
///
/// Implementations block until samples are available or their own timeout
/// elapses. Returning `Ok(0)` means nothing arrived in time; the capture stage
/// pads the block with silence in that case.
pub trait SampleSource {
    /// Writes up to `buf.len()` samples and returns how many were written.
    fn read_samples(&mut self, buf: &mut [i16]) -> Result<usize>;

    /// Whether the source will never deliver samples again.
    fn is_exhausted(&self) -> bool {
        false
    }
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn read_samples(&mut self, buf: &mut [i16]) -> Result<usize> {
        (**self).read_samples(buf)
    }

    fn is_exhausted(&self) -> bool {
        (**self).is_exhausted()
    }
}

/// Owns the fixed-size capture block and fills it from a [`SampleSource`].
#[derive(Debug)]
pub struct SignalCapture<S> {
    source: S,
    raw: Vec<i16>,
    samples: Vec<f32>,
    shortfalls: u64,
}

impl<S: SampleSource> SignalCapture<S> {
    pub fn new(source: S, block_size: usize) -> Self {
        Self {
            source,
            raw: vec![0; block_size],
            samples: vec![0.0; block_size],
            shortfalls: 0,
        }
    }

    pub fn block_size(&self) -> usize {
        self.raw.len()
    }

    /// Fills the block and returns how many samples actually arrived.
    ///
    /// Read errors and short reads never abort: the remainder of the block is
    /// zero-padded.
    pub fn capture_audio(&mut self) -> usize {
        let block_size = self.raw.len();
        let mut filled = 0;

        while filled < block_size {
            match self.source.read_samples(&mut self.raw[filled..]) {
                Ok(0) => break,
                Ok(count) => filled += count.min(block_size - filled),
                Err(err) => {
                    warn!(%err, "audio read failed, padding block with silence");
                    break;
                }
            }
        }

        if filled < block_size {
            self.raw[filled..].fill(0);
            self.shortfalls += 1;
            debug!(filled, block_size, "audio block under-filled");
        }

        for (dst, src) in self.samples.iter_mut().zip(&self.raw) {
            *dst = f32::from(*src) / PCM_SCALE;
        }

        filled
    }

    /// Normalised samples of the last captured block.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Raw PCM of the last captured block.
    pub fn waveform(&self) -> &[i16] {
        &self.raw
    }

    /// Number of blocks that had to be zero-padded so far.
    pub fn shortfalls(&self) -> u64 {
        self.shortfalls
    }

    pub fn is_exhausted(&self) -> bool {
        self.source.is_exhausted()
    }
}

/// Little-endian signed 16-bit PCM read from any byte stream (stdin, a pipe,
/// a serial device).
#[derive(Debug)]
pub struct PcmStream<R> {
    reader: R,
    bytes: Vec<u8>,
    exhausted: bool,
}

impl<R: Read> PcmStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            bytes: Vec::new(),
            exhausted: false,
        }
    }
}

impl<R: Read> SampleSource for PcmStream<R> {
    fn read_samples(&mut self, buf: &mut [i16]) -> Result<usize> {
        if self.exhausted {
            return Ok(0);
        }

        let wanted = buf.len() * 2;
        self.bytes.resize(wanted, 0);
        let mut filled = 0;
        while filled < wanted {
            match self.reader.read(&mut self.bytes[filled..wanted]) {
                Ok(0) => {
                    self.exhausted = true;
                    break;
                }
                Ok(count) => filled += count,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }

        let count = filled / 2;
        for (dst, pair) in buf.iter_mut().zip(self.bytes[..count * 2].chunks_exact(2)) {
            *dst = i16::from_le_bytes([pair[0], pair[1]]);
        }
        Ok(count)
    }

    fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

/// WAV file reader. Only the first channel is used; integer samples of any
/// bit depth and float samples are rescaled to 16 bits.
pub struct WavSource {
    reader: WavReader<BufReader<File>>,
    channels: usize,
    bits_per_sample: u16,
    format: SampleFormat,
    sample_rate: u32,
    /// Channel of the next interleaved sample the reader will return.
    channel_cursor: usize,
    exhausted: bool,
}

impl WavSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let reader = WavReader::open(path.as_ref())?;
        let spec = reader.spec();
        if spec.channels == 0 {
            return Err(BoothError::msg("WAV file declares zero channels"));
        }
        Ok(Self {
            reader,
            channels: usize::from(spec.channels),
            bits_per_sample: spec.bits_per_sample,
            format: spec.sample_format,
            sample_rate: spec.sample_rate,
            channel_cursor: 0,
            exhausted: false,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl SampleSource for WavSource {
    fn read_samples(&mut self, buf: &mut [i16]) -> Result<usize> {
        if self.exhausted || buf.is_empty() {
            return Ok(0);
        }

        let channels = self.channels;
        let mut cursor = self.channel_cursor;
        let mut written = 0;
        let mut ended = true;

        match self.format {
            SampleFormat::Int => {
                let shift = i32::from(self.bits_per_sample) - 16;
                for sample in self.reader.samples::<i32>() {
                    let sample = sample?;
                    if cursor == 0 {
                        buf[written] = rescale_int(sample, shift);
                        written += 1;
                    }
                    cursor = (cursor + 1) % channels;
                    if written == buf.len() {
                        ended = false;
                        break;
                    }
                }
            }
            SampleFormat::Float => {
                for sample in self.reader.samples::<f32>() {
                    let sample = sample?;
                    if cursor == 0 {
                        buf[written] = (sample.clamp(-1.0, 1.0) * 32_767.0) as i16;
                        written += 1;
                    }
                    cursor = (cursor + 1) % channels;
                    if written == buf.len() {
                        ended = false;
                        break;
                    }
                }
            }
        }

        self.channel_cursor = cursor;
        self.exhausted = ended;
        Ok(written)
    }

    fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

impl std::fmt::Debug for WavSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WavSource")
            .field("channels", &self.channels)
            .field("bits_per_sample", &self.bits_per_sample)
            .field("sample_rate", &self.sample_rate)
            .field("exhausted", &self.exhausted)
            .finish()
    }
}

fn rescale_int(sample: i32, shift: i32) -> i16 {
    let scaled = if shift >= 0 {
        sample >> shift
    } else {
        sample << -shift
    };
    scaled.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

/// In-memory sample buffer, handed out in order. Useful for replaying
/// recorded material and for tests.
#[derive(Debug, Clone, Default)]
pub struct BufferedSource {
    samples: Vec<i16>,
    position: usize,
}

impl BufferedSource {
    pub fn new(samples: Vec<i16>) -> Self {
        Self {
            samples,
            position: 0,
        }
    }
}

impl SampleSource for BufferedSource {
    fn read_samples(&mut self, buf: &mut [i16]) -> Result<usize> {
        let remaining = &self.samples[self.position..];
        let count = remaining.len().min(buf.len());
        buf[..count].copy_from_slice(&remaining[..count]);
        self.position += count;
        Ok(count)
    }

    fn is_exhausted(&self) -> bool {
        self.position >= self.samples.len()
    }
}

/// Generates a four-on-the-floor style test signal: a low sine tone whose
/// level jumps to `kick_level` at the start of every beat for `kick_ms` and
/// rests at `bed_level` otherwise.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    sample_rate: u32,
    bpm: f32,
    tone_hz: f32,
    kick_ms: f32,
    kick_level: f32,
    bed_level: f32,
    position: u64,
    limit: Option<u64>,
}

impl SyntheticSource {
    pub fn new(sample_rate: u32, bpm: f32) -> Self {
        Self {
            sample_rate,
            bpm,
            tone_hz: 60.0,
            kick_ms: 60.0,
            kick_level: 0.7,
            bed_level: 0.2,
            position: 0,
            limit: None,
        }
    }

    #[must_use]
    pub fn with_levels(mut self, kick_level: f32, bed_level: f32) -> Self {
        self.kick_level = kick_level.clamp(0.0, 1.0);
        self.bed_level = bed_level.clamp(0.0, 1.0);
        self
    }

    /// Stops the generator after `seconds` of audio.
    #[must_use]
    pub fn with_duration(mut self, seconds: f32) -> Self {
        self.limit = Some((seconds.max(0.0) * self.sample_rate as f32) as u64);
        self
    }

    fn sample_at(&self, index: u64) -> i16 {
        let rate = self.sample_rate.max(1) as f32;
        let t = index as f32 / rate;
        let level = if self.bpm > 0.0 {
            let beat_ms = 60_000.0 / self.bpm;
            let phase_ms = (t * 1000.0) % beat_ms;
            if phase_ms < self.kick_ms {
                self.kick_level
            } else {
                self.bed_level
            }
        } else {
            self.bed_level
        };
        let value = level * (2.0 * PI * self.tone_hz * t).sin();
        (value * 32_767.0) as i16
    }
}

impl SampleSource for SyntheticSource {
    fn read_samples(&mut self, buf: &mut [i16]) -> Result<usize> {
        let available = self
            .limit
            .map(|limit| limit.saturating_sub(self.position))
            .unwrap_or(u64::MAX);
        let count = (buf.len() as u64).min(available) as usize;
        for (offset, slot) in buf[..count].iter_mut().enumerate() {
            *slot = self.sample_at(self.position + offset as u64);
        }
        self.position += count as u64;
        Ok(count)
    }

    fn is_exhausted(&self) -> bool {
        self.limit.is_some_and(|limit| self.position >= limit)
    }
}

/// Source that never delivers anything, as a disconnected input would.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silence;

impl SampleSource for Silence {
    fn read_samples(&mut self, _buf: &mut [i16]) -> Result<usize> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl SampleSource for Failing {
        fn read_samples(&mut self, _buf: &mut [i16]) -> Result<usize> {
            Err(BoothError::msg("bus stalled"))
        }
    }

    #[test]
    fn zero_pads_short_reads() {
        let mut capture = SignalCapture::new(BufferedSource::new(vec![16_384; 3]), 8);

        assert_eq!(capture.capture_audio(), 3);
        assert_eq!(capture.waveform(), &[16_384, 16_384, 16_384, 0, 0, 0, 0, 0]);
        assert!((capture.samples()[0] - 0.5).abs() < 1e-6);
        assert_eq!(capture.samples()[7], 0.0);
        assert_eq!(capture.shortfalls(), 1);
        assert!(capture.is_exhausted());
    }

    #[test]
    fn read_errors_degrade_to_silence() {
        let mut capture = SignalCapture::new(Failing, 16);

        assert_eq!(capture.capture_audio(), 0);
        assert!(capture.samples().iter().all(|s| *s == 0.0));
    }

    #[test]
    fn previous_block_does_not_leak_into_padding() {
        let mut samples = vec![1000; 4];
        samples.extend([2000; 2]);
        let mut capture = SignalCapture::new(BufferedSource::new(samples), 4);

        capture.capture_audio();
        assert_eq!(capture.capture_audio(), 2);
        assert_eq!(capture.waveform(), &[2000, 2000, 0, 0]);
    }

    #[test]
    fn decodes_little_endian_pcm() {
        let bytes: Vec<u8> = [1i16, -2, 300]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let mut stream = PcmStream::new(bytes.as_slice());
        let mut buf = [0i16; 4];

        assert_eq!(stream.read_samples(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[1, -2, 300]);
        assert!(stream.is_exhausted());
    }

    #[test]
    fn synthetic_source_respects_duration() {
        let mut source = SyntheticSource::new(1000, 120.0).with_duration(0.01);
        let mut buf = [0i16; 32];

        assert_eq!(source.read_samples(&mut buf).unwrap(), 10);
        assert!(source.is_exhausted());
        assert_eq!(source.read_samples(&mut buf).unwrap(), 0);
    }

    #[test]
    fn synthetic_kick_is_louder_than_bed() {
        let source = SyntheticSource::new(44_100, 120.0).with_levels(1.0, 0.1);
        let kick_peak = (0..441).map(|i| source.sample_at(i).unsigned_abs()).max();
        let bed_peak = (4410..4851).map(|i| source.sample_at(i).unsigned_abs()).max();
        assert!(kick_peak > bed_peak);
    }

    #[test]
    fn rescales_wider_integer_samples() {
        assert_eq!(rescale_int(8_388_607, 8), 32_767);
        assert_eq!(rescale_int(-128, -8), -32_768);
    }
}
