//! Fake engine binaries for exercising the process plumbing in tests.
//!
//! The scripts speak just enough of the ffmpeg/ffprobe protocol: ffprobe
//! prints a canned JSON document, ffmpeg writes `out_time=` lines on stdout
//! and treats its last argument as the output path.

use std::path::{Path, PathBuf};

/// ffprobe answer for a 12.5 s 1080p h264 clip
pub const PROBE_1080P_JSON: &str = r#"{
    "streams": [
        {
            "codec_type": "video",
            "codec_name": "h264",
            "width": 1920,
            "height": 1080,
            "avg_frame_rate": "30000/1001",
            "r_frame_rate": "30000/1001"
        },
        {"codec_type": "audio", "codec_name": "aac"}
    ],
    "format": {
        "duration": "12.500000",
        "bit_rate": "5000000",
        "size": "7812500"
    }
}"#;

/// ffprobe answer for a 10 s 640x480 mpeg4 clip
pub const PROBE_SMALL_JSON: &str = r#"{
    "streams": [
        {
            "codec_type": "video",
            "codec_name": "mpeg4",
            "width": 640,
            "height": 480,
            "avg_frame_rate": "25/1"
        }
    ],
    "format": {
        "duration": "10.000000",
        "bit_rate": "800000",
        "size": "1000000"
    }
}"#;

/// Same clip, but the container does not report a duration
pub const PROBE_NO_DURATION_JSON: &str = r#"{
    "streams": [
        {"codec_type": "video", "codec_name": "mpeg4", "width": 640, "height": 480}
    ],
    "format": {"size": "1000000"}
}"#;

/// Binds `$out` to the last argument, where ffmpeg expects the output path
const LAST_ARG: &str = "for out; do :; done\n";

/// Encodes 10 s of media in three progress samples, then writes the output
pub const FFMPEG_OK: &str = "echo 'frame=25'\n\
echo 'out_time=00:00:02.500000'\n\
echo 'progress=continue'\n\
echo 'out_time=00:00:05.000000'\n\
echo 'progress=continue'\n\
echo 'out_time=00:00:10.000000'\n\
echo 'progress=end'\n\
printf 'compressed-bytes' > \"$out\"\n";

/// Exits 0 without producing anything
pub const FFMPEG_NO_OUTPUT: &str = "echo 'out_time=00:00:10.000000'\necho 'progress=end'\n";

/// Rejects its parameters
pub const FFMPEG_REJECT: &str = "printf 'partial' > \"$out\"\n\
echo 'Unrecognized option crf' >&2\n\
echo 'Error splitting the argument list' >&2\n\
exit 1\n";

/// Writes a partial output, reports some progress, then hangs until signalled
pub const FFMPEG_HANG: &str = "printf 'partial' > \"$out\"\n\
echo 'out_time=00:00:01.000000'\n\
exec sleep 30\n";

/// Like [`FFMPEG_HANG`] but deaf to SIGTERM
pub const FFMPEG_STUBBORN: &str = "trap '' TERM\n\
printf 'partial' > \"$out\"\n\
echo 'out_time=00:00:01.000000'\n\
exec sleep 30\n";

/// Write an executable `/bin/sh` script named `name` into `dir`
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}", body)).expect("write fake engine script");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("make fake engine executable");
    }

    path
}

/// ffprobe stand-in that always prints `json`
pub fn fake_ffprobe(dir: &Path, json: &str) -> PathBuf {
    write_script(dir, "ffprobe", &format!("cat <<'EOF'\n{}\nEOF\n", json))
}

/// ffmpeg stand-in running `body` with `$out` bound to the output path
pub fn fake_ffmpeg(dir: &Path, body: &str) -> PathBuf {
    write_script(dir, "ffmpeg", &format!("{}{}", LAST_ARG, body))
}

/// A non-empty input file; its content is irrelevant to the fake engines
pub fn touch_input(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"source-video-bytes").expect("write input");
    path
}
