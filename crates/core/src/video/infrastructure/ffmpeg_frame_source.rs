use std::path::PathBuf;

use crate::shared::frame::Frame;
use crate::video::domain::frame_source::{FrameSource, FrameSourceError};

/// Where frames come from.
#[derive(Clone, Debug, PartialEq)]
pub enum SourceLocation {
    /// Capture device by index (`/dev/video<N>` on Linux).
    Camera(u32),
    /// Anything libavformat can open: a recording, a stream URL, a device path.
    Path(PathBuf),
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceLocation::Camera(index) => write!(f, "camera {index}"),
            SourceLocation::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Decodes frames via ffmpeg-next (libavdevice + libavformat + libavcodec).
///
/// Each decoded frame is converted to packed RGB24 and wrapped in a [`Frame`].
pub struct FfmpegFrameSource {
    location: SourceLocation,
    stream: Option<OpenStream>,
}

struct OpenStream {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    video_stream_index: usize,
    frame_index: usize,
    flushing: bool,
}

// Safety: FfmpegFrameSource is only used from the tracking loop's thread.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegFrameSource {}

impl FfmpegFrameSource {
    pub fn new(location: SourceLocation) -> Self {
        Self {
            location,
            stream: None,
        }
    }

    pub fn camera(index: u32) -> Self {
        Self::new(SourceLocation::Camera(index))
    }

    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    fn connection_error(&self, reason: impl std::fmt::Display) -> FrameSourceError {
        FrameSourceError::Connection {
            source_name: self.location.to_string(),
            reason: reason.to_string(),
        }
    }

    fn open_input(&self) -> Result<ffmpeg_next::format::context::Input, FrameSourceError> {
        match &self.location {
            SourceLocation::Path(path) => {
                ffmpeg_next::format::input(path).map_err(|e| self.connection_error(e))
            }
            SourceLocation::Camera(index) => {
                ffmpeg_next::device::register_all();
                let (format_name, url) = camera_url(*index);
                let format = ffmpeg_next::device::input::video()
                    .find(|f| f.name() == format_name)
                    .ok_or_else(|| {
                        self.connection_error(format!("input format '{format_name}' unavailable"))
                    })?;
                let ctx = ffmpeg_next::format::open_with(
                    &url,
                    &ffmpeg_next::format::Format::Input(format),
                    ffmpeg_next::Dictionary::new(),
                )
                .map_err(|e| self.connection_error(e))?;
                match ctx {
                    ffmpeg_next::format::context::Context::Input(ictx) => Ok(ictx),
                    _ => Err(self.connection_error("device did not open as an input")),
                }
            }
        }
    }
}

#[cfg(target_os = "macos")]
fn camera_url(index: u32) -> (&'static str, String) {
    ("avfoundation", index.to_string())
}

#[cfg(not(target_os = "macos"))]
fn camera_url(index: u32) -> (&'static str, String) {
    ("v4l2", format!("/dev/video{index}"))
}

impl FrameSource for FfmpegFrameSource {
    fn connect(&mut self) -> Result<(), FrameSourceError> {
        ffmpeg_next::init().map_err(|e| self.connection_error(e))?;

        let ictx = self.open_input()?;
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| self.connection_error("no video stream found"))?;
        let video_stream_index = stream.index();

        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| self.connection_error(e))?;
        let decoder = codec_ctx
            .decoder()
            .video()
            .map_err(|e| self.connection_error(e))?;

        let width = decoder.width();
        let height = decoder.height();
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(|e| self.connection_error(e))?;

        log::info!("Connected to {} ({width}x{height})", self.location);
        self.stream = Some(OpenStream {
            ictx,
            decoder,
            scaler,
            width,
            height,
            video_stream_index,
            frame_index: 0,
            flushing: false,
        });
        Ok(())
    }

    fn get_frame(&mut self) -> Result<Frame, FrameSourceError> {
        let stream = self.stream.as_mut().ok_or(FrameSourceError::NotConnected)?;
        stream.next_frame()
    }

    fn release(&mut self) {
        if self.stream.take().is_some() {
            log::info!("Released {}", self.location);
        }
    }
}

impl OpenStream {
    fn next_frame(&mut self) -> Result<Frame, FrameSourceError> {
        loop {
            if let Some(frame) = self.try_receive()? {
                return Ok(frame);
            }
            if self.flushing {
                return Err(FrameSourceError::Capture("end of stream".to_string()));
            }

            let next = self
                .ictx
                .packets()
                .next()
                .map(|(stream, packet)| (stream.index(), packet));
            match next {
                None => {
                    let _ = self.decoder.send_eof();
                    self.flushing = true;
                }
                Some((index, packet)) => {
                    if index != self.video_stream_index {
                        continue;
                    }
                    if let Err(e) = self.decoder.send_packet(&packet) {
                        log::debug!("Dropping undecodable packet: {e}");
                    }
                }
            }
        }
    }

    fn try_receive(&mut self) -> Result<Option<Frame>, FrameSourceError> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler
            .run(&decoded, &mut rgb_frame)
            .map_err(|e| FrameSourceError::Capture(e.to_string()))?;

        let pixels = extract_rgb_pixels(&rgb_frame, self.width, self.height);
        let frame = Frame::new(pixels, self.width, self.height, 3, self.frame_index);
        self.frame_index += 1;
        Ok(Some(frame))
    }
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer,
/// dropping any per-row stride padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}
