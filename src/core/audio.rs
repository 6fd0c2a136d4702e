use std::io::Cursor;

use anyhow::{anyhow, Context};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hound::{WavSpec, WavWriter};
use symphonia::core::{
    audio::SampleBuffer,
    codecs::{DecoderOptions, CODEC_TYPE_NULL},
    errors::Error as SymphoniaError,
    formats::FormatOptions,
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
};
use symphonia::default::{get_codecs, get_probe};
use tracing::debug;

use crate::{
    error::{IsolationError, Result},
    types::AudioBuffer,
};

/// Decode a base64 string into raw bytes. Embedded whitespace and line
/// breaks are tolerated.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>> {
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| IsolationError::Decode(format!("invalid base64 payload: {e}")))
}

pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Parse any container/codec symphonia knows (WAV, MP3, FLAC, OGG) into a
/// planar buffer.
pub fn decode_audio(bytes: Vec<u8>) -> Result<AudioBuffer> {
    read_audio_bytes(bytes).map_err(|e| IsolationError::Decode(format!("{e:#}")))
}

fn read_audio_bytes(bytes: Vec<u8>) -> anyhow::Result<AudioBuffer> {
    if bytes.is_empty() {
        return Err(anyhow!("empty audio payload"));
    }

    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let probed = get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .context("unsupported or unrecognized audio format")?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .context("No decodable audio track found")?;
    let track_id = track.id;

    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("unsupported codec")?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_rate: u32 = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels: usize = track
        .codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(0);

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e).context("failed to read packet"),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(msg)) => {
                debug!(msg, "skipping corrupt packet");
                continue;
            }
            Err(e) => return Err(e).context("failed to decode packet"),
        };

        let spec = *decoded.spec();
        if channels != 0 && spec.channels.count() != channels && !samples.is_empty() {
            return Err(anyhow!(
                "channel count changed mid-stream ({} -> {})",
                channels,
                spec.channels.count()
            ));
        }
        sample_rate = spec.rate;
        channels = spec.channels.count();

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);

        samples.extend_from_slice(buffer.samples());
    }

    if channels == 0 || sample_rate == 0 {
        return Err(anyhow!("stream reports no channels or sample rate"));
    }
    if samples.len() < channels {
        return Err(anyhow!("no audio frames decoded"));
    }

    debug!(
        sample_rate,
        channels,
        frames = samples.len() / channels,
        "decoded audio"
    );

    Ok(AudioBuffer::from_interleaved(&samples, channels, sample_rate))
}

/// Serialize a buffer as 16-bit PCM WAV in memory.
pub fn encode_wav(audio: &AudioBuffer) -> Result<Vec<u8>> {
    write_wav_bytes(audio).map_err(|e| IsolationError::Encode(format!("{e:#}")))
}

fn write_wav_bytes(audio: &AudioBuffer) -> anyhow::Result<Vec<u8>> {
    let channels = u16::try_from(audio.num_channels())
        .ok()
        .filter(|c| *c > 0)
        .context("WAV needs between 1 and 65535 channels")?;
    if audio.sample_rate == 0 {
        return Err(anyhow!("sample rate must be positive"));
    }

    let spec = WavSpec {
        channels,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + audio.samples.len() * 2));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for sample in audio.to_interleaved() {
            let s = (sample * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
            writer.write_sample(s)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

pub fn encode_wav_base64(audio: &AudioBuffer) -> Result<String> {
    Ok(encode_base64(&encode_wav(audio)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn invalid_base64_is_a_decode_error() {
        let err = decode_base64("not*base64!").unwrap_err();
        assert_eq!(err.kind(), "decode");
    }

    #[test]
    fn base64_tolerates_line_breaks() {
        let encoded = encode_base64(b"voice isolation");
        let wrapped = format!("{}\n{}", &encoded[..8], &encoded[8..]);
        assert_eq!(decode_base64(&wrapped).unwrap(), b"voice isolation");
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = decode_audio(vec![7u8; 512]).unwrap_err();
        assert_eq!(err.kind(), "decode");
    }

    #[test]
    fn empty_payload_fails_to_decode() {
        assert!(decode_audio(Vec::new()).is_err());
    }

    #[test]
    fn wav_header_matches_buffer() {
        let buf = AudioBuffer::new(Array2::zeros((2, 100)), 22_050);
        let bytes = encode_wav(&buf).unwrap();
        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 22_050);
        assert_eq!(reader.len(), 200);
    }
}
