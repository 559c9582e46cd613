//! Real-time bridge between the hardware pull and the user's push callback
//!
//! CoreAudio asks for `N` bytes whenever it likes; the user callback always
//! produces exactly one generation quantum (`spec.size` bytes). The bridge
//! keeps one quantum in an intermediate buffer and splices it across render
//! requests.
//!
//! The callback thread owns the bridge (buffer and cursor). The only shared
//! state is `StreamControl` (atomics) and the user-callback lock.
//!
//! Nothing in here may block for long, allocate, or log.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::audio::types::{AudioSpec, Direction};

/// User audio callback, called with one silence-initialized quantum
///
/// Output streams fill `buffer` in place; capture streams read it.
pub trait AudioCallback: Send {
    fn callback(&mut self, buffer: &mut [u8]);
}

impl<F> AudioCallback for F
where
    F: FnMut(&mut [u8]) + Send,
{
    fn callback(&mut self, buffer: &mut [u8]) {
        self(buffer)
    }
}

/// The user callback behind its mutual-exclusion lock
///
/// The bridge holds the lock for the whole callback invocation. The
/// application takes the same lock to mutate the callback's mixing state.
pub type CallbackLock = Arc<Mutex<Box<dyn AudioCallback>>>;

/// Flags written by the control thread and observed by the callback thread
#[derive(Debug)]
pub struct StreamControl {
    enabled: AtomicBool,
    paused: AtomicBool,
}

impl StreamControl {
    pub fn new(enabled: bool, paused: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            paused: AtomicBool::new(paused),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    fn is_active(&self) -> bool {
        self.is_enabled() && !self.is_paused()
    }
}

impl Default for StreamControl {
    fn default() -> Self {
        Self::new(true, true)
    }
}

/// Intermediate buffer + fill cursor
pub struct RenderBridge {
    direction: Direction,
    buffer: Box<[u8]>,
    /// 0 <= cursor <= capacity. For output, `capacity` means exhausted.
    /// For capture, it is the number of bytes collected so far.
    cursor: usize,
    silence: u8,
    control: Arc<StreamControl>,
    callback: CallbackLock,
}

impl RenderBridge {
    /// Allocate the bridge for one stream
    ///
    /// The output buffer starts exhausted so the first request regenerates it;
    /// the capture buffer starts empty.
    pub fn new(
        direction: Direction,
        spec: &AudioSpec,
        control: Arc<StreamControl>,
        callback: CallbackLock,
    ) -> Self {
        let capacity = spec.size as usize;
        let cursor = match direction {
            Direction::Output => capacity,
            Direction::Capture => 0,
        };
        Self {
            direction,
            buffer: vec![spec.silence; capacity].into_boxed_slice(),
            cursor,
            silence: spec.silence,
            control,
            callback,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Current intermediate buffer contents
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Serve one hardware render request
    ///
    /// Only single-segment requests are filled; anything else is left
    /// untouched. Every byte of the segment is written.
    pub fn render(&mut self, segments: &mut [&mut [u8]]) {
        let [dest] = segments else {
            return;
        };
        self.render_into(dest);
    }

    /// Fill `dest` completely, either with silence or with callback output
    pub fn render_into(&mut self, dest: &mut [u8]) {
        if !self.control.is_active() || self.buffer.is_empty() {
            dest.fill(self.silence);
            return;
        }

        let capacity = self.buffer.len();
        let mut written = 0;
        while written < dest.len() {
            if self.cursor >= capacity {
                self.regenerate();
            }
            let len = (dest.len() - written).min(capacity - self.cursor);
            dest[written..written + len]
                .copy_from_slice(&self.buffer[self.cursor..self.cursor + len]);
            written += len;
            self.cursor += len;
        }
    }

    /// Accept one hardware capture delivery
    ///
    /// Bytes accumulate in the intermediate buffer; each time it fills up the
    /// user callback receives the whole quantum and the cursor goes back to 0.
    /// Input arriving while disabled or paused is dropped.
    pub fn capture(&mut self, input: &[u8]) {
        if !self.control.is_active() || self.buffer.is_empty() {
            return;
        }

        let capacity = self.buffer.len();
        let mut read = 0;
        while read < input.len() {
            let len = (input.len() - read).min(capacity - self.cursor);
            self.buffer[self.cursor..self.cursor + len].copy_from_slice(&input[read..read + len]);
            read += len;
            self.cursor += len;
            if self.cursor >= capacity {
                let mut callback = self.callback.lock();
                callback.callback(&mut self.buffer);
                drop(callback);
                self.cursor = 0;
            }
        }
    }

    fn regenerate(&mut self) {
        self.buffer.fill(self.silence);
        {
            let mut callback = self.callback.lock();
            callback.callback(&mut self.buffer);
        }
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::types::AudioFormat;
    use std::sync::atomic::AtomicUsize;

    /// 64-byte quantum (U8 mono, 64 frames)
    fn spec_64() -> AudioSpec {
        AudioSpec::new(8000, AudioFormat::S8, 1, 64)
    }

    /// Callback filling the i-th buffer with the byte value i
    fn counting_callback(calls: Arc<AtomicUsize>) -> CallbackLock {
        Arc::new(Mutex::new(Box::new(move |buf: &mut [u8]| {
            let i = calls.fetch_add(1, Ordering::SeqCst);
            buf.fill(i as u8);
        })))
    }

    fn active_bridge(direction: Direction, spec: &AudioSpec, callback: CallbackLock) -> RenderBridge {
        let control = Arc::new(StreamControl::new(true, false));
        RenderBridge::new(direction, spec, control, callback)
    }

    #[test]
    fn test_byte_conservation_across_requests() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut bridge = active_bridge(Direction::Output, &spec_64(), counting_callback(Arc::clone(&calls)));

        let mut delivered = Vec::new();
        for n in [10usize, 100, 54] {
            let mut dest = vec![0xEEu8; n];
            bridge.render(&mut [&mut dest[..]]);
            assert_eq!(dest.len(), n);
            delivered.extend_from_slice(&dest);
        }

        // 164 bytes = buffers 0, 1 whole and 36 bytes of buffer 2
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let mut expected = vec![0u8; 64];
        expected.extend(vec![1u8; 64]);
        expected.extend(vec![2u8; 36]);
        assert_eq!(delivered, expected);
        assert_eq!(bridge.cursor(), 36);
    }

    #[test]
    fn test_residual_bytes_served_without_callback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut bridge = active_bridge(Direction::Output, &spec_64(), counting_callback(Arc::clone(&calls)));

        let mut first = vec![0u8; 20];
        bridge.render(&mut [&mut first[..]]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let mut second = vec![0xEEu8; 44];
        bridge.render(&mut [&mut second[..]]);
        assert_eq!(calls.load(Ordering::SeqCst), 1, "residual bytes should not regenerate");
        assert!(second.iter().all(|&b| b == 0));
        assert_eq!(bridge.cursor(), bridge.capacity());
    }

    #[test]
    fn test_large_request_regenerates_many_times() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut bridge = active_bridge(Direction::Output, &spec_64(), counting_callback(Arc::clone(&calls)));

        let mut dest = vec![0xEEu8; 64 * 5];
        bridge.render(&mut [&mut dest[..]]);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        for (i, chunk) in dest.chunks(64).enumerate() {
            assert!(chunk.iter().all(|&b| b == i as u8), "chunk {} out of order", i);
        }
    }

    #[test]
    fn test_callback_sees_silence_initialized_buffer() {
        let spec = AudioSpec::new(8000, AudioFormat::U8, 1, 16);
        let callback: CallbackLock = Arc::new(Mutex::new(Box::new(|buf: &mut [u8]| {
            assert!(buf.iter().all(|&b| b == 0x80));
            buf[0] = 1;
        })));
        let mut bridge = active_bridge(Direction::Output, &spec, callback);

        let mut dest = vec![0u8; 32];
        bridge.render(&mut [&mut dest[..]]);
        assert_eq!(dest[0], 1);
        assert_eq!(dest[1], 0x80);
        assert_eq!(dest[16], 1);
    }

    #[test]
    fn test_silence_when_paused_or_disabled() {
        let spec = AudioSpec::new(8000, AudioFormat::U8, 1, 64);
        let calls = Arc::new(AtomicUsize::new(0));
        let control = Arc::new(StreamControl::new(true, false));
        let mut bridge = RenderBridge::new(
            Direction::Output,
            &spec,
            Arc::clone(&control),
            counting_callback(Arc::clone(&calls)),
        );

        let mut warmup = vec![0u8; 10];
        bridge.render(&mut [&mut warmup[..]]);
        let cursor_before = bridge.cursor();
        let buffer_before = bridge.buffer().to_vec();

        control.set_paused(true);
        let mut dest = vec![0u8; 200];
        bridge.render(&mut [&mut dest[..]]);
        assert!(dest.iter().all(|&b| b == 0x80));

        control.set_paused(false);
        control.set_enabled(false);
        let mut dest = vec![0u8; 7];
        bridge.render(&mut [&mut dest[..]]);
        assert!(dest.iter().all(|&b| b == 0x80));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(bridge.cursor(), cursor_before);
        assert_eq!(bridge.buffer(), &buffer_before[..]);
    }

    #[test]
    fn test_multi_segment_request_untouched() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut bridge = active_bridge(Direction::Output, &spec_64(), counting_callback(Arc::clone(&calls)));

        let mut left = vec![0xAAu8; 16];
        let mut right = vec![0xBBu8; 16];
        bridge.render(&mut [&mut left[..], &mut right[..]]);

        assert!(left.iter().all(|&b| b == 0xAA));
        assert!(right.iter().all(|&b| b == 0xBB));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_zero_capacity_emits_silence() {
        let spec = AudioSpec::new(8000, AudioFormat::U8, 1, 0);
        let calls = Arc::new(AtomicUsize::new(0));
        let mut bridge = active_bridge(Direction::Output, &spec, counting_callback(Arc::clone(&calls)));

        let mut dest = vec![0u8; 12];
        bridge.render(&mut [&mut dest[..]]);
        assert!(dest.iter().all(|&b| b == 0x80));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_capture_hands_over_full_quanta() {
        let spec = AudioSpec::new(8000, AudioFormat::S8, 1, 8);
        let received = Arc::new(Mutex::new(Vec::<Vec<u8>>::new()));
        let sink = Arc::clone(&received);
        let callback: CallbackLock = Arc::new(Mutex::new(Box::new(move |buf: &mut [u8]| {
            sink.lock().push(buf.to_vec());
        })));
        let mut bridge = active_bridge(Direction::Capture, &spec, callback);
        assert_eq!(bridge.cursor(), 0);

        let input: Vec<u8> = (0..20).collect();
        bridge.capture(&input[..5]);
        assert!(received.lock().is_empty());
        bridge.capture(&input[5..]);

        let received = received.lock();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0], (0..8).collect::<Vec<u8>>());
        assert_eq!(received[1], (8..16).collect::<Vec<u8>>());
        assert_eq!(bridge.cursor(), 4);
    }

    #[test]
    fn test_capture_drops_input_while_paused() {
        let spec = AudioSpec::new(8000, AudioFormat::S8, 1, 8);
        let calls = Arc::new(AtomicUsize::new(0));
        let control = Arc::new(StreamControl::new(true, true));
        let mut bridge = RenderBridge::new(
            Direction::Capture,
            &spec,
            control,
            counting_callback(Arc::clone(&calls)),
        );

        bridge.capture(&[1u8; 32]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(bridge.cursor(), 0);
    }
}
