//! Container sniffing for the sim splitter
//!
//! Just enough of each container to say which elementary streams it holds,
//! what codec each one uses and how long the file runs. MP4 is walked box
//! by box so `moov` is found wherever the muxer put it. Matroska goes through
//! `matroska-demuxer`. AVI and WAV keep their headers up front, so their
//! chunk tags are located by scanning the head of the file.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use matroska_demuxer::{MatroskaFile, TrackType};

use crate::framework::{hresult, FrameworkError, FrameworkResult, MajorType, MediaType};

/// Bytes read from the head of the file for sniffing and RIFF headers
const SNIFF_LIMIT: u64 = 1 << 20;

/// Largest `moov` payload loaded into memory
const MOOV_LIMIT: u64 = 64 << 20;

const MKV_MAGIC: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    Mp4,
    Avi,
    Wav,
    Matroska,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerInfo {
    pub format: ContainerFormat,
    /// Elementary streams in file order
    pub streams: Vec<MediaType>,
    /// Seconds, when the header carries it
    pub duration: Option<f64>,
    pub video_size: Option<(u32, u32)>,
}

impl ContainerInfo {
    fn new(format: ContainerFormat) -> Self {
        Self {
            format,
            streams: Vec::new(),
            duration: None,
            video_size: None,
        }
    }
}

fn io_error(e: io::Error) -> FrameworkError {
    FrameworkError::new(hresult::E_FAIL, e.to_string())
}

pub fn probe_file(path: &Path) -> FrameworkResult<ContainerInfo> {
    let file = File::open(path).map_err(|e| {
        FrameworkError::new(
            hresult::E_FILE_NOT_FOUND,
            format!("{}: {}", path.display(), e),
        )
    })?;

    probe_reader(file)
        .map_err(|e| FrameworkError::new(e.code, format!("{}: {}", path.display(), e.message)))
}

pub fn probe_bytes(data: &[u8]) -> FrameworkResult<ContainerInfo> {
    probe_reader(Cursor::new(data))
}

pub fn probe_reader<R: Read + Seek>(mut reader: R) -> FrameworkResult<ContainerInfo> {
    let mut head = Vec::new();
    (&mut reader)
        .take(SNIFF_LIMIT)
        .read_to_end(&mut head)
        .map_err(io_error)?;

    let format = sniff(&head).ok_or_else(|| {
        FrameworkError::new(hresult::VFW_E_UNSUPPORTED_STREAM, "unrecognised container")
    })?;

    match format {
        ContainerFormat::Mp4 => probe_mp4(&mut reader).map_err(io_error),
        ContainerFormat::Avi => Ok(probe_avi(&head)),
        ContainerFormat::Wav => Ok(probe_wav(&head)),
        ContainerFormat::Matroska => {
            reader.seek(SeekFrom::Start(0)).map_err(io_error)?;
            probe_matroska(reader)
        }
    }
}

fn sniff(head: &[u8]) -> Option<ContainerFormat> {
    if head.get(4..8) == Some(&b"ftyp"[..]) {
        return Some(ContainerFormat::Mp4);
    }
    if head.get(0..4) == Some(&b"RIFF"[..]) {
        return match head.get(8..12) {
            Some(b"AVI ") => Some(ContainerFormat::Avi),
            Some(b"WAVE") => Some(ContainerFormat::Wav),
            _ => None,
        };
    }
    if head.get(0..4) == Some(&MKV_MAGIC[..]) {
        return Some(ContainerFormat::Matroska);
    }
    None
}

// ============================================================================
// Byte helpers
// ============================================================================

fn find_tag(data: &[u8], tag: &[u8; 4], from: usize) -> Option<usize> {
    data.get(from..)?
        .windows(4)
        .position(|w| w == tag)
        .map(|p| p + from)
}

fn be_u16(data: &[u8], at: usize) -> Option<u16> {
    data.get(at..at + 2).map(|b| u16::from_be_bytes([b[0], b[1]]))
}

fn be_u32(data: &[u8], at: usize) -> Option<u32> {
    data.get(at..at + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn be_u64(data: &[u8], at: usize) -> Option<u64> {
    let b = data.get(at..at + 8)?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(b);
    Some(u64::from_be_bytes(buf))
}

fn le_u16(data: &[u8], at: usize) -> Option<u16> {
    data.get(at..at + 2).map(|b| u16::from_le_bytes([b[0], b[1]]))
}

fn le_u32(data: &[u8], at: usize) -> Option<u32> {
    data.get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn fourcc(data: &[u8], at: usize) -> Option<String> {
    let raw = data.get(at..at + 4)?;
    let text: String = raw
        .iter()
        .filter(|b| b.is_ascii_graphic() || **b == b' ' || **b == b'-')
        .map(|b| *b as char)
        .collect();
    Some(text.trim().to_string())
}

// ============================================================================
// MP4 / MOV
// ============================================================================

/// Child boxes of an in-memory box payload
struct Mp4Boxes<'a> {
    data: &'a [u8],
}

impl<'a> Iterator for Mp4Boxes<'a> {
    type Item = ([u8; 4], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let size = be_u32(self.data, 0)?;
        let tag: [u8; 4] = self.data.get(4..8)?.try_into().ok()?;
        let (size, header) = match size {
            0 => (self.data.len() as u64, 8),
            1 => (be_u64(self.data, 8)?, 16),
            n => (u64::from(n), 8),
        };
        if size < header || size > self.data.len() as u64 {
            self.data = &[];
            return None;
        }

        let (current, rest) = self.data.split_at(size as usize);
        self.data = rest;
        Some((tag, &current[header as usize..]))
    }
}

fn mp4_boxes(data: &[u8]) -> Mp4Boxes<'_> {
    Mp4Boxes { data }
}

fn mp4_child<'a>(data: &'a [u8], tag: &[u8; 4]) -> Option<&'a [u8]> {
    mp4_boxes(data).find(|(t, _)| t == tag).map(|(_, body)| body)
}

/// Walk the top-level boxes and parse `moov` wherever it sits
fn probe_mp4<R: Read + Seek>(reader: &mut R) -> io::Result<ContainerInfo> {
    let mut info = ContainerInfo::new(ContainerFormat::Mp4);
    let file_len = reader.seek(SeekFrom::End(0))?;

    let mut offset = 0u64;
    while offset + 8 <= file_len {
        reader.seek(SeekFrom::Start(offset))?;
        let mut header = [0u8; 8];
        reader.read_exact(&mut header)?;
        let tag = [header[4], header[5], header[6], header[7]];

        let declared = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        let (size, header_len) = match declared {
            0 => (file_len - offset, 8),
            1 => {
                if offset + 16 > file_len {
                    break;
                }
                let mut large = [0u8; 8];
                reader.read_exact(&mut large)?;
                (u64::from_be_bytes(large), 16)
            }
            n => (u64::from(n), 8),
        };
        if size < header_len || size > file_len - offset {
            tracing::debug!(
                "mp4: truncated {} box at {}",
                fourcc(&tag, 0).unwrap_or_default(),
                offset
            );
            break;
        }

        if &tag == b"moov" {
            let len = size - header_len;
            if len > MOOV_LIMIT {
                tracing::warn!("mp4: moov of {} bytes is too large to inspect", len);
                break;
            }
            let mut moov = vec![0u8; len as usize];
            reader.read_exact(&mut moov)?;
            parse_moov(&moov, &mut info);
            break;
        }

        offset += size;
    }

    Ok(info)
}

fn parse_moov(moov: &[u8], info: &mut ContainerInfo) {
    for (tag, body) in mp4_boxes(moov) {
        match &tag {
            b"mvhd" => info.duration = mvhd_duration(body),
            b"trak" => {
                let Some((stream, size)) = parse_trak(body) else {
                    continue;
                };
                if info.video_size.is_none() {
                    info.video_size = size;
                }
                info.streams.push(stream);
            }
            _ => {}
        }
    }
}

fn mvhd_duration(mvhd: &[u8]) -> Option<f64> {
    let (timescale, duration) = match mvhd.first()? {
        1 => (be_u32(mvhd, 20)?, be_u64(mvhd, 24)?),
        _ => (be_u32(mvhd, 12)?, u64::from(be_u32(mvhd, 16)?)),
    };
    (timescale > 0).then(|| duration as f64 / timescale as f64)
}

/// Stream type of one track, plus the frame size for video tracks
fn parse_trak(trak: &[u8]) -> Option<(MediaType, Option<(u32, u32)>)> {
    let mdia = mp4_child(trak, b"mdia")?;
    let handler = mp4_child(mdia, b"hdlr")
        .and_then(|h| fourcc(h, 8))
        .unwrap_or_default();

    // stsd: version/flags, entry count, then the sample entries
    let entry = mp4_child(mdia, b"minf")
        .and_then(|m| mp4_child(m, b"stbl"))
        .and_then(|s| mp4_child(s, b"stsd"))
        .and_then(|s| mp4_boxes(s.get(8..)?).next());

    let codec = entry
        .and_then(|(tag, _)| fourcc(&tag, 0))
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    let major = match handler.as_str() {
        "vide" => MajorType::Video,
        "soun" => MajorType::Audio,
        _ => MajorType::Other,
    };

    let size = match (major, entry) {
        (MajorType::Video, Some((_, body))) => match (be_u16(body, 24), be_u16(body, 26)) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some((u32::from(w), u32::from(h))),
            _ => None,
        },
        _ => None,
    };

    Some((MediaType::new(major, codec), size))
}

// ============================================================================
// RIFF: AVI and WAV
// ============================================================================

fn wave_format_name(tag: u16) -> String {
    match tag {
        0x0001 => "pcm".to_string(),
        0x0003 => "float".to_string(),
        0x0055 => "mp3".to_string(),
        0x00FF | 0x1610 => "mp4a".to_string(),
        0x2000 => "ac-3".to_string(),
        other => format!("wave{:04x}", other),
    }
}

fn probe_avi(data: &[u8]) -> ContainerInfo {
    let mut info = ContainerInfo::new(ContainerFormat::Avi);

    if let Some(a) = find_tag(data, b"avih", 0) {
        let usec_per_frame = le_u32(data, a + 8);
        let total_frames = le_u32(data, a + 24);
        if let (Some(us), Some(frames)) = (usec_per_frame, total_frames) {
            if us > 0 && frames > 0 {
                info.duration = Some(us as f64 * frames as f64 / 1_000_000.0);
            }
        }
        if let (Some(w), Some(h)) = (le_u32(data, a + 40), le_u32(data, a + 44)) {
            if w > 0 && h > 0 {
                info.video_size = Some((w, h));
            }
        }
    }

    let mut cursor = 0;
    while let Some(strh) = find_tag(data, b"strh", cursor) {
        let kind = fourcc(data, strh + 8).unwrap_or_default();
        match kind.as_str() {
            "vids" => {
                let handler = fourcc(data, strh + 12)
                    .filter(|h| !h.is_empty())
                    .map(|h| h.to_ascii_lowercase())
                    .unwrap_or_else(|| "unknown".to_string());
                info.streams.push(MediaType::new(MajorType::Video, handler));
            }
            "auds" => {
                // Audio handlers are usually zero; the format tag is in strf
                let codec = find_tag(data, b"strf", strh + 4)
                    .and_then(|f| le_u16(data, f + 8))
                    .map(wave_format_name)
                    .unwrap_or_else(|| "unknown".to_string());
                info.streams.push(MediaType::new(MajorType::Audio, codec));
            }
            _ => info
                .streams
                .push(MediaType::new(MajorType::Other, kind)),
        }
        cursor = strh + 4;
    }

    info
}

fn probe_wav(data: &[u8]) -> ContainerInfo {
    let mut info = ContainerInfo::new(ContainerFormat::Wav);

    let Some(fmt) = find_tag(data, b"fmt ", 12) else {
        return info;
    };
    let codec = le_u16(data, fmt + 8)
        .map(wave_format_name)
        .unwrap_or_else(|| "unknown".to_string());
    info.streams.push(MediaType::new(MajorType::Audio, codec));

    let byte_rate = le_u32(data, fmt + 16);
    let data_size = find_tag(data, b"data", fmt + 8).and_then(|d| le_u32(data, d + 4));
    if let (Some(rate), Some(size)) = (byte_rate, data_size) {
        if rate > 0 {
            info.duration = Some(size as f64 / rate as f64);
        }
    }

    info
}

// ============================================================================
// Matroska
// ============================================================================

/// Codec IDs mapped onto the subtypes the MP4 and AVI paths produce
fn matroska_subtype(codec_id: &str) -> String {
    let rest = ["V_", "A_", "S_"]
        .iter()
        .find_map(|prefix| codec_id.strip_prefix(prefix))
        .unwrap_or(codec_id);
    match rest {
        "MPEG4/ISO/AVC" => "avc1".to_string(),
        "MPEGH/ISO/HEVC" => "hvc1".to_string(),
        "VP9" => "vp09".to_string(),
        "AV1" => "av01".to_string(),
        "AAC" => "mp4a".to_string(),
        "AC3" => "ac-3".to_string(),
        other => other.to_ascii_lowercase(),
    }
}

fn probe_matroska<R: Read + Seek>(reader: R) -> FrameworkResult<ContainerInfo> {
    let mkv = MatroskaFile::open(reader).map_err(|e| {
        FrameworkError::new(
            hresult::VFW_E_UNSUPPORTED_STREAM,
            format!("invalid matroska file: {}", e),
        )
    })?;

    let mut info = ContainerInfo::new(ContainerFormat::Matroska);

    // Duration is counted in timestamp-scale ticks (nanoseconds each)
    let scale = mkv.info().timestamp_scale().get() as f64;
    info.duration = mkv.info().duration().map(|ticks| ticks * scale / 1e9);

    for track in mkv.tracks() {
        let major = match track.track_type() {
            TrackType::Video => MajorType::Video,
            TrackType::Audio => MajorType::Audio,
            _ => MajorType::Other,
        };

        if major == MajorType::Video && info.video_size.is_none() {
            if let Some(video) = track.video() {
                info.video_size = Some((
                    video.pixel_width().get() as u32,
                    video.pixel_height().get() as u32,
                ));
            }
        }

        info.streams
            .push(MediaType::new(major, matroska_subtype(track.codec_id())));
    }

    Ok(info)
}
