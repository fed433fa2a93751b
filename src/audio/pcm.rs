use super::AudioFormat;

/// リトルエンディアンPCMを -1.0..1.0 の f32 サンプル列へ変換（インタリーブのまま）
///
/// 8bit は符号なし、16/32bit は符号付きとして解釈する。未対応の幅は空を返す。
pub fn decode_samples(audio: &[u8], sample_width_bytes: u16) -> Vec<f32> {
    match sample_width_bytes {
        1 => audio
            .iter()
            .map(|b| (*b as f32 - 128.0) / 128.0)
            .collect(),
        2 => audio
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32_768.0)
            .collect(),
        4 => audio
            .chunks_exact(4)
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32 / 2_147_483_648.0)
            .collect(),
        _ => Vec::new(),
    }
}

/// 完全なフレームのみをデコードし、チャネル平均でモノラル化
pub fn to_mono(audio: &[u8], format: AudioFormat) -> Vec<f32> {
    let whole = format.frame_count(audio.len()) * format.frame_bytes();
    let samples = decode_samples(&audio[..whole], format.sample_width_bytes);

    let channels = format.channels as usize;
    if channels <= 1 {
        return samples;
    }

    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_signed_16_bit_little_endian() {
        let bytes: [u8; 4] = [0x00, 0x40, 0x00, 0xC0];
        assert_eq!(decode_samples(&bytes, 2), vec![0.5, -0.5]);
    }

    #[test]
    fn eight_bit_is_unsigned() {
        assert_eq!(decode_samples(&[128, 0], 1), vec![0.0, -1.0]);
    }

    #[test]
    fn stereo_is_averaged_and_partial_frame_dropped() {
        let format = AudioFormat {
            channels: 2,
            ..AudioFormat::PCM16_MONO_16K
        };
        // L=0.5, R=-0.5, then a dangling left sample
        let bytes: [u8; 6] = [0x00, 0x40, 0x00, 0xC0, 0x00, 0x40];
        assert_eq!(to_mono(&bytes, format), vec![0.0]);
    }
}
