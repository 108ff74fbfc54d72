//! ALSA PCM device wrappers for the session's two audio endpoints.

use alsa::pcm::{Access, Format, HwParams, PCM};
use alsa::{Direction, ValueOr};
use anyhow::{Context, Result};

/// Parameters actually negotiated with the hardware. The devices are asked
/// for the session rates (16 kHz in, 24 kHz out) but may land elsewhere;
/// callers resample against these values.
#[derive(Debug, Clone)]
pub struct NegotiatedParams {
    pub sample_rate: u32,
    pub channels: u32,
    pub period_size: usize,
}

/// Open the microphone endpoint.
pub fn open_capture(device: &str, sample_rate: u32) -> Result<(PCM, NegotiatedParams)> {
    open_pcm(device, Direction::Capture, sample_rate, 1, "capture")
}

/// Open the playback endpoint (mono requested; upmixed by the caller if
/// the hardware insists on more channels).
pub fn open_playback(device: &str, sample_rate: u32) -> Result<(PCM, NegotiatedParams)> {
    open_pcm(device, Direction::Playback, sample_rate, 1, "playback")
}

fn open_pcm(
    device: &str,
    direction: Direction,
    sample_rate: u32,
    channels: u32,
    dir_name: &str,
) -> Result<(PCM, NegotiatedParams)> {
    let pcm = PCM::new(device, direction, false)
        .with_context(|| format!("failed to open PCM device '{}' for {}", device, dir_name))?;

    {
        let hwp = HwParams::any(&pcm).context("failed to initialize HwParams")?;
        hwp.set_access(Access::RWInterleaved)?;
        hwp.set_format(Format::S16LE)?;
        hwp.set_channels_near(channels)?;
        hwp.set_rate_near(sample_rate, ValueOr::Nearest)?;
        pcm.hw_params(&hwp)?;
    }

    let params = {
        let hwp = pcm.hw_params_current()?;
        NegotiatedParams {
            sample_rate: hwp.get_rate()?,
            channels: hwp.get_channels()?,
            period_size: hwp.get_period_size()? as usize,
        }
    };

    log::info!(
        "ALSA {}: device={}, rate={}, channels={}, period_size={}",
        dir_name,
        device,
        params.sample_rate,
        params.channels,
        params.period_size,
    );

    Ok((pcm, params))
}
