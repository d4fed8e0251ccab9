//! On-disk media fixtures written at test time.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

/// Temporary media file removed on drop
pub struct TempMedia(PathBuf);

impl TempMedia {
    fn new(extension: &str, data: Vec<u8>) -> Self {
        let path = std::env::temp_dir().join(format!(
            "video-playback-{}.{}",
            uuid::Uuid::new_v4(),
            extension
        ));
        std::fs::write(&path, data).expect("write fixture");
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for TempMedia {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

fn y4m_bytes(frames: usize, width: u32, height: u32, fps: u32) -> Vec<u8> {
    let luma = (width * height) as usize;
    let chroma = luma / 4;

    let mut data = format!("YUV4MPEG2 W{width} H{height} F{fps}:1 Ip A1:1 C420jpeg\n").into_bytes();
    for i in 0..frames {
        data.extend_from_slice(b"FRAME\n");
        data.extend(std::iter::repeat((i * 16 % 256) as u8).take(luma));
        data.extend(std::iter::repeat(128u8).take(chroma * 2));
    }
    data
}

/// YUV4MPEG2 clip in 4:2:0; frame `i` has luma `i * 16`
pub fn y4m_clip(frames: usize, width: u32, height: u32, fps: u32) -> TempMedia {
    TempMedia::new("y4m", y4m_bytes(frames, width, height, fps))
}

/// Like [`y4m_clip`], but the marker of frame `damaged` is corrupt so the
/// demuxer can't read that packet
pub fn y4m_clip_with_bad_frame(
    frames: usize,
    width: u32,
    height: u32,
    fps: u32,
    damaged: usize,
) -> TempMedia {
    let mut data = y4m_bytes(frames, width, height, fps);
    let header_len = data.iter().position(|&b| b == b'\n').map_or(0, |p| p + 1);
    let frame_len = 6 + (width * height) as usize * 3 / 2;
    let marker = header_len + damaged * frame_len;
    data[marker..marker + 5].copy_from_slice(b"FRAMX");
    TempMedia::new("y4m", data)
}

/// Clip whose file name is not valid UTF-8
#[cfg(unix)]
pub fn y4m_clip_non_utf8_name(frames: usize, width: u32, height: u32, fps: u32) -> TempMedia {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let mut name = format!("video-playback-{}-", uuid::Uuid::new_v4()).into_bytes();
    name.extend_from_slice(b"\xff\xfe.y4m");
    let path = std::env::temp_dir().join(OsStr::from_bytes(&name));
    std::fs::write(&path, y4m_bytes(frames, width, height, fps)).expect("write fixture");
    TempMedia(path)
}

/// One second of silent 16-bit mono PCM
pub fn wav_silence() -> TempMedia {
    let sample_rate: u32 = 8000;
    let data_len: u32 = sample_rate * 2;

    let mut data = Vec::with_capacity(44 + data_len as usize);
    data.extend_from_slice(b"RIFF");
    data.extend_from_slice(&(36 + data_len).to_le_bytes());
    data.extend_from_slice(b"WAVE");
    data.extend_from_slice(b"fmt ");
    data.extend_from_slice(&16u32.to_le_bytes());
    data.extend_from_slice(&1u16.to_le_bytes()); // PCM
    data.extend_from_slice(&1u16.to_le_bytes()); // mono
    data.extend_from_slice(&sample_rate.to_le_bytes());
    data.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    data.extend_from_slice(&2u16.to_le_bytes());
    data.extend_from_slice(&16u16.to_le_bytes());
    data.extend_from_slice(b"data");
    data.extend_from_slice(&data_len.to_le_bytes());
    data.resize(44 + data_len as usize, 0);

    TempMedia::new("wav", data)
}
