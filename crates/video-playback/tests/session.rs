mod common;

use std::cell::RefCell;
use std::rc::Rc;

use video_playback::decoder::{DeviceFactory, HwDevice};
use video_playback::{
    DecodeError, DecodeSession, DecoderConfig, HwBackend, PixelLayout, SessionState, VideoStream,
};

/// Device factory where every backend is missing
struct NoDevices {
    tried: Rc<RefCell<Vec<HwBackend>>>,
}

impl DeviceFactory for NoDevices {
    fn create(&self, backend: HwBackend) -> Result<HwDevice, DecodeError> {
        self.tried.borrow_mut().push(backend);
        Err(DecodeError::HwDevice {
            backend: backend.name(),
            reason: "simulated".to_string(),
        })
    }
}

fn software_session() -> DecodeSession {
    DecodeSession::new(DecoderConfig::software_only())
}

#[test]
fn open_reports_stream_metadata() {
    let clip = common::y4m_clip(10, 100, 100, 25);
    let mut session = software_session();

    session.open(clip.path()).unwrap();

    assert!(session.is_open());
    assert_eq!(session.state(), SessionState::Open);
    assert_eq!((session.width(), session.height()), (100, 100));
    assert_eq!(session.frame_rate(), 25.0);
    assert!(!session.has_alpha());
    assert_eq!(session.pixel_format_name(), "yuv420p");
    assert_eq!(session.current_hw_decoder(), "Software");

    let duration = session.duration();
    assert!((duration - 0.4).abs() < 0.05, "duration {duration}");
}

#[test]
fn decodes_every_frame_then_ends() {
    let clip = common::y4m_clip(10, 100, 100, 25);
    let mut session = software_session();
    session.open(clip.path()).unwrap();

    let mut decoded = 0;
    while let Some(image) = session.decode_next_frame() {
        assert_eq!(image.layout, PixelLayout::Rgb24);
        assert_eq!((image.width, image.height), (100, 100));
        assert_eq!(image.data.len(), 100 * 100 * 3);
        decoded += 1;
    }

    assert_eq!(decoded, 10);
    // End of stream is sticky and not an error
    assert!(session.decode_next_frame().is_none());
    assert!(session.is_open());
}

#[test]
fn seek_to_start_replays_first_frame() {
    let clip = common::y4m_clip(10, 64, 64, 25);
    let mut session = software_session();
    session.open(clip.path()).unwrap();

    let first = session.decode_next_frame().unwrap();
    let second = session.decode_next_frame().unwrap();
    assert_ne!(first, second);

    session.seek_to_time(0.0).unwrap();
    assert_eq!(session.decode_next_frame().unwrap(), first);

    // Seeking after end of stream re-arms reading
    while session.decode_next_frame().is_some() {}
    session.seek_to_frame(0).unwrap();
    assert_eq!(session.decode_next_frame().unwrap(), first);
}

/// The `n`th decoded frame of a fresh session over `clip`
fn nth_frame(clip: &common::TempMedia, n: usize) -> video_playback::Image {
    let mut session = software_session();
    session.open(clip.path()).unwrap();
    for _ in 0..n {
        session.decode_next_frame().unwrap();
    }
    session.decode_next_frame().unwrap()
}

#[test]
fn seek_to_frame_matches_seek_to_time() {
    let clip = common::y4m_clip(10, 64, 64, 25);
    let mut session = software_session();
    session.open(clip.path()).unwrap();

    session.seek_to_frame(5).unwrap();
    let by_frame = session.decode_next_frame().unwrap();

    session.seek_to_time(5.0 / 25.0).unwrap();
    let by_time = session.decode_next_frame().unwrap();

    assert_eq!(by_frame, by_time);
    assert_ne!(by_frame, nth_frame(&clip, 0));
}

#[test]
fn seek_past_duration_is_rejected() {
    let clip = common::y4m_clip(10, 64, 64, 25);
    let mut session = software_session();
    session.open(clip.path()).unwrap();
    let duration = session.duration();
    assert!(duration > 0.0);

    session.decode_next_frame().unwrap();
    let err = session.seek_to_time(duration + 1.0).unwrap_err();
    assert!(matches!(err, DecodeError::Seek { .. }), "{err}");
    assert!(session.is_open());

    // Reading carries on where it was
    assert_eq!(session.decode_next_frame().unwrap(), nth_frame(&clip, 1));
}

#[test]
fn unreadable_packets_give_up_without_closing() {
    let clip = common::y4m_clip_with_bad_frame(4, 64, 64, 25, 1);
    let config = DecoderConfig {
        max_consecutive_send_failures: 0,
        ..DecoderConfig::software_only()
    };
    let mut session = DecodeSession::new(config);
    session.open(clip.path()).unwrap();

    assert!(session.decode_next_frame().is_some());
    assert!(session.decode_next_frame().is_none());
    assert!(session.is_open());
}

#[cfg(unix)]
#[test]
fn opens_file_with_non_utf8_name() {
    let clip = common::y4m_clip_non_utf8_name(2, 32, 32, 25);
    let mut session = software_session();
    session.open(clip.path()).unwrap();
    assert_eq!((session.width(), session.height()), (32, 32));
    assert!(session.decode_next_frame().is_some());
}

#[test]
fn seek_rejects_negative_time() {
    let clip = common::y4m_clip(10, 64, 64, 25);
    let mut session = software_session();
    session.open(clip.path()).unwrap();

    let err = session.seek_to_time(-1.0).unwrap_err();
    assert!(matches!(err, DecodeError::Seek { .. }));
    assert!(session.seek_to_time(f64::NAN).is_err());
    assert!(session.seek_to_frame(-5).is_err());
    assert!(session.is_open());
}

#[test]
fn container_without_video_fails_closed() {
    let wav = common::wav_silence();
    let mut session = software_session();

    let err = session.open(wav.path()).unwrap_err();
    assert!(matches!(err, DecodeError::NoVideoStream), "{err}");
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(session.width(), 0);
}

#[test]
fn close_is_idempotent_after_open() {
    let clip = common::y4m_clip(4, 32, 32, 25);
    let mut session = software_session();
    session.open(clip.path()).unwrap();

    session.close();
    session.close();

    assert!(!session.is_open());
    assert_eq!((session.width(), session.height()), (0, 0));
    assert_eq!(session.frame_rate(), 0.0);
    assert_eq!(session.duration(), 0.0);
    assert!(!session.has_alpha());
    assert_eq!(session.pixel_format_name(), "Unknown");
    assert!(session.decode_next_frame().is_none());
}

#[test]
fn reopen_replaces_previous_stream() {
    let small = common::y4m_clip(4, 32, 32, 25);
    let large = common::y4m_clip(4, 64, 48, 30);
    let mut session = software_session();

    session.open(small.path()).unwrap();
    session.open(large.path()).unwrap();

    assert_eq!((session.width(), session.height()), (64, 48));
    assert_eq!(session.frame_rate(), 30.0);
    assert_eq!(session.decode_next_frame().unwrap().data.len(), 64 * 48 * 3);
}

#[test]
fn missing_hardware_falls_back_to_software() {
    let clip = common::y4m_clip(6, 100, 100, 25);
    let tried = Rc::new(RefCell::new(Vec::new()));
    let devices = NoDevices {
        tried: Rc::clone(&tried),
    };
    let mut session = DecodeSession::with_devices(DecoderConfig::default(), Box::new(devices));

    session.open(clip.path()).unwrap();

    assert_eq!(*tried.borrow(), HwBackend::DEFAULT_PRIORITY.to_vec());
    assert_eq!(session.hw_backend(), None);
    assert_eq!(session.current_hw_decoder(), "Software");

    let image = session.decode_next_frame().unwrap();
    assert_eq!(image.data.len(), 100 * 100 * 3);
}

#[test]
fn software_only_never_touches_devices() {
    let clip = common::y4m_clip(2, 32, 32, 25);
    let tried = Rc::new(RefCell::new(Vec::new()));
    let devices = NoDevices {
        tried: Rc::clone(&tried),
    };
    let mut session = DecodeSession::with_devices(DecoderConfig::software_only(), Box::new(devices));

    session.open(clip.path()).unwrap();
    assert!(tried.borrow().is_empty());
}

#[test]
fn playback_instances_decode_independently() {
    let clip = common::y4m_clip(10, 100, 100, 25);
    let mut stream = VideoStream::new(DecoderConfig::software_only());
    stream.set_file(clip.path()).unwrap();

    let mut first = stream.instantiate_playback();
    let mut second = stream.instantiate_playback();
    first.play();
    second.play();

    let mut refreshed = 0;
    for _ in 0..5 {
        if first.update(0.04) {
            refreshed += 1;
        }
    }
    assert!(refreshed > 0);

    let image = first.image().unwrap();
    assert_eq!(image.data.len(), 100 * 100 * 3);

    // The second playback still shows its blank seed image
    assert!(second.image().unwrap().data.iter().all(|&b| b == 0));
    assert_eq!(second.position(), 0.0);

    assert!((first.length() - 0.4).abs() < 0.05);
    for _ in 0..30 {
        first.update(0.04);
    }
    assert!(!first.is_playing());
    assert_eq!(first.position(), 0.0);
}
