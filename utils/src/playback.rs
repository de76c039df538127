use crate::audio::{self, ChunkedResampler};
use crate::capture::CaptureError;
use crate::device;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::StreamConfig;
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Seconds of agent audio the output buffer can hold ahead of the speaker.
const OUTPUT_BUFFER_SECS: usize = 30;
const PLAYBACK_CHUNK_SIZE: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// Queued audio finished playing.
    Drained,
}

/// Plays base64 PCM16 agent audio on an output device.
pub struct AudioPlayback {
    producer: HeapProd<f32>,
    resampler: ChunkedResampler,
    flush: Arc<AtomicBool>,
    stop_tx: Option<std_mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

type Ready = Result<(u32, HeapProd<f32>), CaptureError>;

impl AudioPlayback {
    pub fn open(
        device_name: Option<&str>,
        source_rate: u32,
        events: tokio::sync::mpsc::UnboundedSender<PlaybackEvent>,
    ) -> Result<Self, CaptureError> {
        let device_name = device_name.map(str::to_string);
        let flush = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = std_mpsc::channel::<Ready>();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

        let stream_flush = flush.clone();
        let thread = std::thread::Builder::new()
            .name("agent-playback".to_string())
            .spawn(move || {
                match build_output_stream(device_name.as_deref(), stream_flush, events) {
                    Ok((stream, rate, producer)) => {
                        let _ = ready_tx.send(Ok((rate, producer)));
                        let _ = stop_rx.recv();
                        drop(stream);
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
            })
            .map_err(|e| CaptureError::Unavailable(format!("failed to spawn playback thread: {}", e)))?;

        let (output_rate, producer) = match ready_rx.recv() {
            Ok(Ok(ready)) => ready,
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => {
                return Err(CaptureError::Unavailable(
                    "playback thread exited before opening the device".to_string(),
                ))
            }
        };
        let resampler = ChunkedResampler::new(source_rate, output_rate, PLAYBACK_CHUNK_SIZE)
            .map_err(|e| CaptureError::Unavailable(e.to_string()))?;

        Ok(Self {
            producer,
            resampler,
            flush,
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        })
    }

    /// Queues one base64 PCM16 chunk for playback.
    pub fn enqueue(&mut self, base64_fragment: &str) {
        let samples = audio::decode_f32(base64_fragment);
        let resampled = self.resampler.push(&samples);
        let pushed = self.producer.push_slice(&resampled);
        if pushed < resampled.len() {
            tracing::warn!(
                "output buffer full, dropped {} samples",
                resampled.len() - pushed
            );
        }
    }

    /// Drops everything still queued, used when the user interrupts the agent.
    pub fn interrupt(&mut self) {
        self.resampler.reset();
        self.flush.store(true, Ordering::Release);
    }
}

impl Drop for AudioPlayback {
    fn drop(&mut self) {
        self.stop_tx.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("playback thread panicked");
            }
        }
    }
}

fn build_output_stream(
    device_name: Option<&str>,
    flush: Arc<AtomicBool>,
    events: tokio::sync::mpsc::UnboundedSender<PlaybackEvent>,
) -> Result<(cpal::Stream, u32, HeapProd<f32>), CaptureError> {
    let output = device::get_or_default_output(device_name)?;
    let default_config = output.default_output_config()?;
    let config = StreamConfig {
        channels: default_config.channels(),
        sample_rate: default_config.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    };
    let output_rate = config.sample_rate.0;
    let channels = config.channels as usize;
    tracing::debug!("output: device={:?}, config={:?}", output.name().ok(), config);

    let buffer = HeapRb::<f32>::new(output_rate as usize * OUTPUT_BUFFER_SECS);
    let (producer, mut consumer) = buffer.split();

    let mut playing = false;
    let output_data_fn = move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        if flush.swap(false, Ordering::AcqRel) {
            while consumer.try_pop().is_some() {}
        }
        let mut wrote_audio = false;
        for frame in data.chunks_mut(channels.max(1)) {
            let sample = match consumer.try_pop() {
                Some(sample) => {
                    wrote_audio = true;
                    sample
                }
                None => 0.0,
            };
            frame.iter_mut().for_each(|out| *out = sample);
        }
        if playing && !wrote_audio {
            let _ = events.send(PlaybackEvent::Drained);
        }
        playing = wrote_audio;
    };

    let stream = output.build_output_stream(
        &config,
        output_data_fn,
        move |err| tracing::error!("an error occurred on output stream: {}", err),
        None,
    )?;
    stream.play()?;
    Ok((stream, output_rate, producer))
}
