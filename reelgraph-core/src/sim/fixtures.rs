//! Minimal container files for tests. Only the headers the probe looks at
//! are written; there is no sample data.

use std::io::Write;

use tempfile::NamedTempFile;

fn mp4_box(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 8);
    out.extend_from_slice(&((payload.len() + 8) as u32).to_be_bytes());
    out.extend_from_slice(tag);
    out.extend_from_slice(payload);
    out
}

fn riff_chunk(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 8);
    out.extend_from_slice(tag);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

fn mp4_moov(tracks: &[(&str, &str)], duration_secs: f64) -> Vec<u8> {
    let timescale: u32 = 1000;
    let mut mvhd = vec![0u8; 4]; // version 0, flags
    mvhd.extend_from_slice(&[0u8; 8]); // creation, modification
    mvhd.extend_from_slice(&timescale.to_be_bytes());
    mvhd.extend_from_slice(&((duration_secs * timescale as f64) as u32).to_be_bytes());
    mvhd.extend_from_slice(&[0u8; 80]);

    let mut moov = mp4_box(b"mvhd", &mvhd);

    for (handler, codec) in tracks {
        let mut hdlr = vec![0u8; 8]; // version/flags, pre_defined
        hdlr.extend_from_slice(&fourcc(handler));
        hdlr.extend_from_slice(&[0u8; 12]);
        hdlr.push(0);

        let mut entry = vec![0u8; 8]; // reserved, data_reference_index
        entry.extend_from_slice(&[0u8; 16]);
        if *handler == "vide" {
            entry.extend_from_slice(&1280u16.to_be_bytes());
            entry.extend_from_slice(&720u16.to_be_bytes());
        }
        entry.extend_from_slice(&[0u8; 16]);
        let mut stsd = vec![0u8; 4];
        stsd.extend_from_slice(&1u32.to_be_bytes());
        stsd.extend_from_slice(&mp4_box(&fourcc(codec), &entry));

        let stbl = mp4_box(b"stbl", &mp4_box(b"stsd", &stsd));
        let minf = mp4_box(b"minf", &stbl);
        let mut mdia = mp4_box(b"hdlr", &hdlr);
        mdia.extend_from_slice(&minf);
        moov.extend_from_slice(&mp4_box(b"trak", &mp4_box(b"mdia", &mdia)));
    }

    mp4_box(b"moov", &moov)
}

fn mp4_ftyp() -> Vec<u8> {
    let mut ftyp = b"isom".to_vec();
    ftyp.extend_from_slice(&0u32.to_be_bytes());
    ftyp.extend_from_slice(b"isommp41");
    mp4_box(b"ftyp", &ftyp)
}

/// MP4 with one `trak` per `(handler, codec)` pair. Video tracks are
/// 1280x720.
pub fn mp4_bytes(tracks: &[(&str, &str)], duration_secs: f64) -> Vec<u8> {
    let mut out = mp4_ftyp();
    out.extend_from_slice(&mp4_moov(tracks, duration_secs));
    out
}

/// Camera-style layout: `ftyp`, a zero-filled `mdat` of `mdat_len` bytes,
/// then `moov`
pub fn mp4_bytes_moov_last(
    tracks: &[(&str, &str)],
    duration_secs: f64,
    mdat_len: usize,
) -> Vec<u8> {
    let mut out = mp4_ftyp();
    out.extend_from_slice(&mp4_box(b"mdat", &vec![0u8; mdat_len]));
    out.extend_from_slice(&mp4_moov(tracks, duration_secs));
    out
}

fn fourcc(s: &str) -> [u8; 4] {
    let mut out = [b' '; 4];
    for (dst, src) in out.iter_mut().zip(s.bytes()) {
        *dst = src;
    }
    out
}

fn wave_format(tag: u16, channels: u16, rate: u32, bits: u16) -> Vec<u8> {
    let align = channels * bits / 8;
    let mut fmt = Vec::new();
    fmt.extend_from_slice(&tag.to_le_bytes());
    fmt.extend_from_slice(&channels.to_le_bytes());
    fmt.extend_from_slice(&rate.to_le_bytes());
    fmt.extend_from_slice(&(rate * align as u32).to_le_bytes());
    fmt.extend_from_slice(&align.to_le_bytes());
    fmt.extend_from_slice(&bits.to_le_bytes());
    fmt
}

/// 16-bit stereo 44.1 kHz PCM. The data chunk declares its full size but
/// carries no samples.
pub fn wav_bytes(seconds: f64) -> Vec<u8> {
    let byte_rate = 44_100u32 * 4;
    let mut body = b"WAVE".to_vec();
    body.extend_from_slice(&riff_chunk(b"fmt ", &wave_format(1, 2, 44_100, 16)));
    body.extend_from_slice(b"data");
    body.extend_from_slice(&((seconds * byte_rate as f64) as u32).to_le_bytes());
    riff_chunk(b"RIFF", &body)
}

/// 640x480 at 25 fps for 10 s, optionally with an MP3 audio stream
pub fn avi_bytes(video_handler: &str, with_audio: bool) -> Vec<u8> {
    let mut avih = Vec::new();
    for value in [40_000u32, 0, 0, 0, 250, 0, if with_audio { 2 } else { 1 }, 0, 640, 480] {
        avih.extend_from_slice(&value.to_le_bytes());
    }
    avih.extend_from_slice(&[0u8; 16]);

    let mut video_strh = b"vids".to_vec();
    video_strh.extend_from_slice(&fourcc(video_handler));
    video_strh.extend_from_slice(&[0u8; 48]);
    let mut video_strl = b"strl".to_vec();
    video_strl.extend_from_slice(&riff_chunk(b"strh", &video_strh));
    video_strl.extend_from_slice(&riff_chunk(b"strf", &[0u8; 40]));

    let mut hdrl = b"hdrl".to_vec();
    hdrl.extend_from_slice(&riff_chunk(b"avih", &avih));
    hdrl.extend_from_slice(&riff_chunk(b"LIST", &video_strl));

    if with_audio {
        let mut audio_strh = b"auds".to_vec();
        audio_strh.extend_from_slice(&[0u8; 52]);
        let mut audio_strl = b"strl".to_vec();
        audio_strl.extend_from_slice(&riff_chunk(b"strh", &audio_strh));
        audio_strl.extend_from_slice(&riff_chunk(b"strf", &wave_format(0x0055, 2, 44_100, 16)));
        hdrl.extend_from_slice(&riff_chunk(b"LIST", &audio_strl));
    }

    let mut body = b"AVI ".to_vec();
    body.extend_from_slice(&riff_chunk(b"LIST", &hdrl));
    riff_chunk(b"RIFF", &body)
}

// ============================================================================
// Matroska
// ============================================================================

/// Duration written into every Matroska fixture
pub const MKV_DURATION: f64 = 10.0;

/// Size as an EBML variable-length integer, shortest form
fn ebml_size(len: usize) -> Vec<u8> {
    let len = len as u64;
    let width = (1..8u32).find(|w| len < (1u64 << (7 * w)) - 1).unwrap_or(8);
    let bytes = ((1u64 << (7 * width)) | len).to_be_bytes();
    bytes[8 - width as usize..].to_vec()
}

fn ebml(id: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut out = id.to_vec();
    out.extend_from_slice(&ebml_size(payload.len()));
    out.extend_from_slice(payload);
    out
}

fn ebml_uint(id: &[u8], value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take(7).take_while(|b| **b == 0).count();
    ebml(id, &bytes[skip..])
}

fn ebml_float(id: &[u8], value: f64) -> Vec<u8> {
    ebml(id, &value.to_be_bytes())
}

fn mkv_track(number: u64, codec_id: &str, private: Option<&[u8]>) -> Vec<u8> {
    let mut entry = ebml_uint(&[0xD7], number);
    entry.extend_from_slice(&ebml_uint(&[0x73, 0xC5], 1000 + number));
    match codec_id.get(..2) {
        Some("V_") => {
            entry.extend_from_slice(&ebml_uint(&[0x83], 1));
            let mut video = ebml_uint(&[0xB0], 1920);
            video.extend_from_slice(&ebml_uint(&[0xBA], 1080));
            entry.extend_from_slice(&ebml(&[0xE0], &video));
        }
        Some("A_") => {
            entry.extend_from_slice(&ebml_uint(&[0x83], 2));
            let mut audio = ebml_float(&[0xB5], 48_000.0);
            audio.extend_from_slice(&ebml_uint(&[0x9F], 2));
            entry.extend_from_slice(&ebml(&[0xE1], &audio));
        }
        _ => entry.extend_from_slice(&ebml_uint(&[0x83], 17)),
    }
    entry.extend_from_slice(&ebml(&[0x86], codec_id.as_bytes()));
    if let Some(private) = private {
        entry.extend_from_slice(&ebml(&[0x63, 0xA2], private));
    }
    ebml(&[0xAE], &entry)
}

fn mkv_file_bytes(tracks: Vec<Vec<u8>>) -> Vec<u8> {
    let mut header = ebml_uint(&[0x42, 0x86], 1);
    header.extend_from_slice(&ebml_uint(&[0x42, 0xF7], 1));
    header.extend_from_slice(&ebml_uint(&[0x42, 0xF2], 4));
    header.extend_from_slice(&ebml_uint(&[0x42, 0xF3], 8));
    header.extend_from_slice(&ebml(&[0x42, 0x82], b"matroska"));
    header.extend_from_slice(&ebml_uint(&[0x42, 0x87], 4));
    header.extend_from_slice(&ebml_uint(&[0x42, 0x85], 2));

    let mut info = ebml_uint(&[0x2A, 0xD7, 0xB1], 1_000_000);
    info.extend_from_slice(&ebml_float(&[0x44, 0x89], MKV_DURATION * 1000.0));
    info.extend_from_slice(&ebml(&[0x4D, 0x80], b"reelgraph"));
    info.extend_from_slice(&ebml(&[0x57, 0x41], b"reelgraph"));
    let info = ebml(&[0x15, 0x49, 0xA9, 0x66], &info);

    let tracks = ebml(&[0x16, 0x54, 0xAE, 0x6B], &tracks.concat());
    let cluster = ebml(&[0x1F, 0x43, 0xB6, 0x75], &ebml_uint(&[0xE7], 0));

    // Positions are relative to the segment payload; fixed-width so the
    // seek head's own size does not depend on them
    let seek_head = |offset: u64| {
        let mut seeks = Vec::new();
        for (id, position) in [
            (&[0x15u8, 0x49, 0xA9, 0x66][..], offset),
            (&[0x16u8, 0x54, 0xAE, 0x6B][..], offset + info.len() as u64),
        ] {
            let mut seek = ebml(&[0x53, 0xAB], id);
            seek.extend_from_slice(&ebml(&[0x53, 0xAC], &position.to_be_bytes()));
            seeks.extend_from_slice(&ebml(&[0x4D, 0xBB], &seek));
        }
        ebml(&[0x11, 0x4D, 0x9B, 0x74], &seeks)
    };
    let head_len = seek_head(0).len() as u64;

    let mut segment = seek_head(head_len);
    segment.extend_from_slice(&info);
    segment.extend_from_slice(&tracks);
    segment.extend_from_slice(&cluster);

    let mut out = ebml(&[0x1A, 0x45, 0xDF, 0xA3], &header);
    out.extend_from_slice(&ebml(&[0x18, 0x53, 0x80, 0x67], &segment));
    out
}

/// Matroska file with one track per CodecID. The track type follows the
/// ID prefix; video tracks are 1920x1080.
pub fn mkv_bytes(codec_ids: &[&str]) -> Vec<u8> {
    let tracks = codec_ids
        .iter()
        .enumerate()
        .map(|(i, id)| mkv_track(i as u64 + 1, id, None))
        .collect();
    mkv_file_bytes(tracks)
}

/// Single-track Matroska file carrying `private` as CodecPrivate
pub fn mkv_bytes_with_private(codec_id: &str, private: &[u8]) -> Vec<u8> {
    mkv_file_bytes(vec![mkv_track(1, codec_id, Some(private))])
}

fn write_temp(suffix: &str, data: &[u8]) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .prefix("reelgraph-")
        .suffix(suffix)
        .tempfile()
        .unwrap();
    file.write_all(data).unwrap();
    file.flush().unwrap();
    file
}

pub fn mp4_file(tracks: &[(&str, &str)], duration_secs: f64) -> NamedTempFile {
    write_temp(".mp4", &mp4_bytes(tracks, duration_secs))
}

pub fn mp4_file_moov_last(
    tracks: &[(&str, &str)],
    duration_secs: f64,
    mdat_len: usize,
) -> NamedTempFile {
    write_temp(".mp4", &mp4_bytes_moov_last(tracks, duration_secs, mdat_len))
}

pub fn wav_file(seconds: f64) -> NamedTempFile {
    write_temp(".wav", &wav_bytes(seconds))
}

pub fn avi_file(video_handler: &str, with_audio: bool) -> NamedTempFile {
    write_temp(".avi", &avi_bytes(video_handler, with_audio))
}

pub fn mkv_file(codec_ids: &[&str]) -> NamedTempFile {
    write_temp(".mkv", &mkv_bytes(codec_ids))
}

pub fn unknown_file() -> NamedTempFile {
    write_temp(".bin", b"this is not a media container")
}
