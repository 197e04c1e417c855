use std::f32::consts::PI;

/// Interleaved 16-bit PCM samples
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
    /// Cached duration in seconds
    pub duration_secs: f32,
}

impl AudioBuffer {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            samples: Vec::new(),
            sample_rate,
            channels,
            duration_secs: 0.0,
        }
    }

    /// Mono sine tone at half amplitude
    pub fn sine_tone(frequency_hz: f32, duration_secs: u32, sample_rate: u32) -> Self {
        let mut buffer = Self::new(sample_rate, 1);
        let sample_count = (sample_rate as usize) * (duration_secs as usize);
        let samples: Vec<i16> = (0..sample_count)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                ((2.0 * PI * frequency_hz * t).sin() * 16383.0).round() as i16
            })
            .collect();
        buffer.append(&samples);
        buffer
    }

    /// Recalculate and update duration_secs
    pub fn update_duration(&mut self) {
        if self.sample_rate == 0 {
            self.duration_secs = 0.0;
        } else {
            let channels = self.channels.max(1) as f32;
            self.duration_secs = self.samples.len() as f32 / (self.sample_rate as f32 * channels);
        }
    }

    pub fn append(&mut self, data: &[i16]) {
        self.samples.extend_from_slice(data);
        self.update_duration();
    }

    /// Encode as a canonical 44-byte-header PCM WAV file
    pub fn to_wav_bytes(&self) -> Vec<u8> {
        let data_size = (self.samples.len() * 2) as u32;
        let mut wav = Vec::with_capacity(44 + self.samples.len() * 2);

        // RIFF header
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&(36 + data_size).to_le_bytes());
        wav.extend_from_slice(b"WAVE");

        // fmt chunk
        wav.extend_from_slice(b"fmt ");
        wav.extend_from_slice(&16u32.to_le_bytes()); // chunk size
        wav.extend_from_slice(&1u16.to_le_bytes()); // PCM format
        wav.extend_from_slice(&self.channels.to_le_bytes());
        wav.extend_from_slice(&self.sample_rate.to_le_bytes());
        let byte_rate = self.sample_rate * self.channels as u32 * 2;
        wav.extend_from_slice(&byte_rate.to_le_bytes());
        wav.extend_from_slice(&(self.channels * 2).to_le_bytes()); // block align
        wav.extend_from_slice(&16u16.to_le_bytes()); // bits per sample

        // data chunk
        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&data_size.to_le_bytes());

        for &sample in &self.samples {
            wav.extend_from_slice(&sample.to_le_bytes());
        }

        wav
    }
}

/// Duration of a PCM WAV file from its header, walking chunks up to `data`.
/// `file_len` bounds the data chunk when the header carries a bogus size.
pub fn wav_duration_secs(header: &[u8], file_len: u64) -> Option<f64> {
    if header.len() < 12 || &header[0..4] != b"RIFF" || &header[8..12] != b"WAVE" {
        return None;
    }

    let mut offset = 12usize;
    let mut byte_rate: Option<u32> = None;

    while offset + 8 <= header.len() {
        let id = &header[offset..offset + 4];
        let size = u32::from_le_bytes(header[offset + 4..offset + 8].try_into().ok()?);
        let body = offset + 8;

        if id == b"fmt " {
            if body + 12 > header.len() {
                return None;
            }
            byte_rate = Some(u32::from_le_bytes(header[body + 8..body + 12].try_into().ok()?));
        } else if id == b"data" {
            let rate = byte_rate.filter(|r| *r > 0)?;
            let remaining = file_len.saturating_sub(body as u64);
            let data_len = if size == 0 || size as u64 > remaining {
                remaining
            } else {
                size as u64
            };
            return Some(data_len as f64 / rate as f64);
        }

        // chunks are word-aligned
        offset = body + size as usize + (size as usize & 1);
    }

    None
}
