//! # Encoder Invoker
//!
//! Turns the numbered frame sequence into a video by spawning the system
//! `ffmpeg` binary. Using the external binary rather than linked FFmpeg
//! libraries keeps the build free of native dev headers; the encoder is an
//! opaque collaborator that either exits zero or fails the run.
//!
//! The invocation mirrors the classic image-sequence form:
//! `ffmpeg -y -r <fps> -f image2 -i frames/sst%05d.png -vcodec libx264
//!  -preset veryslow -crf 25 -pix_fmt yuv420p [-vf scale=iw/2:ih/2] out.mp4`

use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::error::{RenderError, RenderResult};
use crate::input::{Codec, EncodeSettings};

/// Probes PATH for a usable ffmpeg binary.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Builds the ffmpeg argument list for a frame-sequence encode.
pub fn ffmpeg_args(
    frame_pattern: &Path,
    settings: &EncodeSettings,
    output_path: &Path,
) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-y".into(),
        "-loglevel".into(),
        "error".into(),
        "-r".into(),
        settings.frame_rate.to_string(),
        "-f".into(),
        "image2".into(),
        "-i".into(),
        frame_pattern.display().to_string(),
    ];
    match settings.codec {
        Codec::H264 => {
            args.extend([
                "-vcodec".into(),
                "libx264".into(),
                "-preset".into(),
                settings.preset.clone(),
                "-crf".into(),
                settings.crf.to_string(),
                "-pix_fmt".into(),
                "yuv420p".into(),
            ]);
        }
        Codec::Vp9 => {
            args.extend([
                "-vcodec".into(),
                "libvpx-vp9".into(),
                "-crf".into(),
                settings.crf.to_string(),
                "-b:v".into(),
                "0".into(),
                "-pix_fmt".into(),
                "yuv420p".into(),
            ]);
        }
    }
    if settings.half_scale {
        args.extend(["-vf".into(), "scale=iw/2:ih/2".into()]);
    }
    args.push(output_path.display().to_string());
    args
}

/// Encodes the frame sequence matching `frame_pattern` (printf-style, e.g.
/// `frames/sst%05d.png`) into `output_path`. Blocks until the encoder exits;
/// with `timeout_secs` set, a hung encoder is killed and reported instead of
/// blocking the run forever.
pub fn encode(
    frame_pattern: &Path,
    settings: &EncodeSettings,
    output_path: &Path,
) -> RenderResult<()> {
    if !is_ffmpeg_on_path() {
        return Err(RenderError::Encode {
            status: -1,
            stderr: "ffmpeg not found on PATH".to_string(),
        });
    }
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let args = ffmpeg_args(frame_pattern, settings, output_path);
    debug!("invoking ffmpeg {}", args.join(" "));

    let mut child = Command::new("ffmpeg")
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()?;

    let (status, stderr) = match settings.timeout_secs {
        None => {
            let output = child.wait_with_output()?;
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            (output.status, stderr)
        }
        Some(limit) => {
            // Drain stderr concurrently; a failing encoder can emit more
            // than the pipe buffer holds and would otherwise block on write
            // until the deadline kills it, masking the real error.
            let stderr_pipe = child.stderr.take();
            let drain = std::thread::spawn(move || {
                let mut buf = String::new();
                if let Some(mut pipe) = stderr_pipe {
                    use std::io::Read as _;
                    let _ = pipe.read_to_string(&mut buf);
                }
                buf
            });
            let deadline = Instant::now() + Duration::from_secs(limit);
            let status = loop {
                if let Some(status) = child.try_wait()? {
                    break status;
                }
                if Instant::now() >= deadline {
                    child.kill()?;
                    child.wait()?;
                    let partial = drain.join().unwrap_or_default();
                    return Err(RenderError::Encode {
                        status: -1,
                        stderr: if partial.is_empty() {
                            format!("ffmpeg did not finish within {}s", limit)
                        } else {
                            format!(
                                "ffmpeg did not finish within {}s; output so far: {}",
                                limit,
                                partial.trim()
                            )
                        },
                    });
                }
                std::thread::sleep(Duration::from_millis(100));
            };
            (status, drain.join().unwrap_or_default())
        }
    };

    if !status.success() {
        return Err(RenderError::Encode {
            status: status.code().unwrap_or(-1),
            stderr: stderr.trim().to_string(),
        });
    }

    info!("encoded {}", output_path.display());
    Ok(())
}
