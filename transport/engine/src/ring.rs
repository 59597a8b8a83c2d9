/*!
    Per-channel sample rings between the render path and the realtime callback.

    Each channel gets its own single-producer/single-consumer ring of fixed
    capacity. The writer half lives with the render/decode thread and the
    reader half with the server's process callback; neither side ever blocks.
*/

use ringbuf::{
    HeapCons, HeapProd, HeapRb,
    traits::{Consumer, Observer, Producer, Split},
};

/**
    Producer half of one channel ring (used by the render path).
*/
pub struct ChannelWriter {
    producer: HeapProd<f32>,
}

impl ChannelWriter {
    /**
        Push samples into the ring. Returns number of samples written.

        Never blocks: when the ring is short on space the tail of
        `samples` is dropped.
    */
    pub fn write(&mut self, samples: &[f32]) -> usize {
        self.producer.push_slice(samples)
    }

    /// Number of samples that can be written right now.
    pub fn free_space(&self) -> usize {
        self.producer.vacant_len()
    }

    /// Total capacity in samples.
    pub fn capacity(&self) -> usize {
        self.producer.capacity().get()
    }
}

/**
    Consumer half of one channel ring (used by the realtime callback).
*/
pub struct ChannelReader {
    consumer: HeapCons<f32>,
}

impl ChannelReader {
    /**
        Fill `output` from the ring. Returns number of samples actually read.

        Whatever the ring cannot supply is zero-filled, so the caller never
        hands stale memory to the audio server.
    */
    pub fn read(&mut self, output: &mut [f32]) -> usize {
        let read = self.consumer.pop_slice(output);

        // Fill remaining with silence
        for sample in &mut output[read..] {
            *sample = 0.0;
        }

        read
    }

    /// Number of samples waiting to be read.
    pub fn available(&self) -> usize {
        self.consumer.occupied_len()
    }

    /// Drop all queued samples. Returns how many were discarded.
    pub fn clear(&mut self) -> usize {
        self.consumer.clear()
    }
}

/**
    Create a single channel ring with room for `capacity` samples.

    # Panics

    Panics if `capacity` is zero.
*/
pub fn channel_ring(capacity: usize) -> (ChannelWriter, ChannelReader) {
    let rb = HeapRb::<f32>::new(capacity);
    let (producer, consumer) = rb.split();
    (ChannelWriter { producer }, ChannelReader { consumer })
}

/**
    Writer side of a ring pool: one [`ChannelWriter`] per channel.
*/
pub struct PoolWriter {
    writers: Vec<ChannelWriter>,
    scratch: Vec<f32>,
}

impl PoolWriter {
    /// Number of channels.
    pub fn channels(&self) -> usize {
        self.writers.len()
    }

    /// Write samples into one channel. Out-of-range channels write nothing.
    pub fn write_channel(&mut self, channel: usize, samples: &[f32]) -> usize {
        self.writers
            .get_mut(channel)
            .map(|writer| writer.write(samples))
            .unwrap_or(0)
    }

    /**
        Split interleaved samples across the channel rings.

        `interleaved` must use the pool's channel count. Only as many
        frames as fit in the fullest ring are written, so every channel
        receives the same frames. Returns that frame count.
    */
    pub fn write_interleaved(&mut self, interleaved: &[f32]) -> usize {
        let channels = self.writers.len();
        if channels == 0 {
            return 0;
        }

        let frames = (interleaved.len() / channels).min(self.free_space());
        let mut written = frames;

        for (channel, writer) in self.writers.iter_mut().enumerate() {
            self.scratch.clear();
            self.scratch.extend(
                interleaved
                    .iter()
                    .skip(channel)
                    .step_by(channels)
                    .take(frames),
            );
            written = written.min(writer.write(&self.scratch));
        }

        written
    }

    /// Smallest free space across all channels.
    pub fn free_space(&self) -> usize {
        self.writers
            .iter()
            .map(ChannelWriter::free_space)
            .min()
            .unwrap_or(0)
    }

    /// Per-channel capacity in samples.
    pub fn capacity(&self) -> usize {
        self.writers.first().map(ChannelWriter::capacity).unwrap_or(0)
    }
}

/**
    Reader side of a ring pool: one [`ChannelReader`] per channel.
*/
pub struct PoolReader {
    readers: Vec<ChannelReader>,
}

impl PoolReader {
    /// Number of channels.
    pub fn channels(&self) -> usize {
        self.readers.len()
    }

    /**
        Fill `output` from one channel, zero-filling any shortfall.
        Out-of-range channels produce silence.
    */
    pub fn read_channel(&mut self, channel: usize, output: &mut [f32]) -> usize {
        match self.readers.get_mut(channel) {
            Some(reader) => reader.read(output),
            None => {
                output.fill(0.0);
                0
            }
        }
    }

    /// Samples waiting in one channel.
    pub fn available(&self, channel: usize) -> usize {
        self.readers
            .get(channel)
            .map(ChannelReader::available)
            .unwrap_or(0)
    }

    /// Drop all queued samples on every channel.
    pub fn clear(&mut self) {
        for reader in &mut self.readers {
            reader.clear();
        }
    }
}

/**
    Create one ring per channel, each holding `capacity` samples.

    # Panics

    Panics if `capacity` is zero.
*/
pub fn ring_pool(channels: usize, capacity: usize) -> (PoolWriter, PoolReader) {
    let (writers, readers) = (0..channels).map(|_| channel_ring(capacity)).unzip();
    (
        PoolWriter {
            writers,
            scratch: Vec::with_capacity(capacity),
        },
        PoolReader { readers },
    )
}

static_assertions::assert_impl_all!(PoolWriter: Send);
static_assertions::assert_impl_all!(PoolReader: Send);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_across_writes_and_reads() {
        let (mut writer, mut reader) = channel_ring(16);

        assert_eq!(writer.write(&[1.0, 2.0, 3.0]), 3);
        assert_eq!(writer.write(&[4.0, 5.0]), 2);

        let mut out = [0.0f32; 2];
        assert_eq!(reader.read(&mut out), 2);
        assert_eq!(out, [1.0, 2.0]);

        assert_eq!(writer.write(&[6.0]), 1);

        let mut out = [0.0f32; 4];
        assert_eq!(reader.read(&mut out), 4);
        assert_eq!(out, [3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn fifo_survives_wraparound() {
        let (mut writer, mut reader) = channel_ring(4);
        let mut expected = Vec::new();
        let mut got = Vec::new();
        let mut next = 0.0f32;

        for _ in 0..10 {
            let chunk = [next, next + 1.0, next + 2.0];
            next += 3.0;
            assert_eq!(writer.write(&chunk), 3);
            expected.extend_from_slice(&chunk);

            let mut out = [0.0f32; 3];
            assert_eq!(reader.read(&mut out), 3);
            got.extend_from_slice(&out);
        }

        assert_eq!(got, expected);
    }

    #[test]
    fn underrun_zero_fills() {
        let (mut writer, mut reader) = channel_ring(8);
        writer.write(&[0.5, -0.5, 0.25]);

        let mut out = [9.0f32; 6];
        assert_eq!(reader.read(&mut out), 3);
        assert_eq!(out, [0.5, -0.5, 0.25, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn empty_ring_reads_silence() {
        let (_writer, mut reader) = channel_ring(8);
        let mut out = [1.0f32; 4];
        assert_eq!(reader.read(&mut out), 0);
        assert_eq!(out, [0.0; 4]);
    }

    #[test]
    fn overflow_truncates() {
        let (mut writer, mut reader) = channel_ring(4);
        assert_eq!(writer.write(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]), 4);
        assert_eq!(writer.free_space(), 0);
        assert_eq!(writer.write(&[7.0]), 0);

        let mut out = [0.0f32; 6];
        assert_eq!(reader.read(&mut out), 4);
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0, 0.0, 0.0]);
    }

    #[test]
    fn clear_discards_queued_samples() {
        let (mut writer, mut reader) = channel_ring(8);
        writer.write(&[1.0, 2.0, 3.0]);
        assert_eq!(reader.clear(), 3);
        assert_eq!(reader.available(), 0);
    }

    #[test]
    fn pool_deinterleaves_per_channel() {
        let (mut writer, mut reader) = ring_pool(2, 8);
        assert_eq!(writer.channels(), 2);
        assert_eq!(writer.capacity(), 8);

        let written = writer.write_interleaved(&[1.0, -1.0, 2.0, -2.0, 3.0, -3.0]);
        assert_eq!(written, 3);

        let mut left = [0.0f32; 3];
        let mut right = [0.0f32; 3];
        reader.read_channel(0, &mut left);
        reader.read_channel(1, &mut right);
        assert_eq!(left, [1.0, 2.0, 3.0]);
        assert_eq!(right, [-1.0, -2.0, -3.0]);
    }

    #[test]
    fn pool_reports_frames_that_fit_everywhere() {
        let (mut writer, _reader) = ring_pool(2, 4);
        writer.write_channel(1, &[0.0, 0.0, 0.0]);

        // channel 1 only has room for one more sample
        assert_eq!(writer.write_interleaved(&[1.0, 1.0, 2.0, 2.0]), 1);
        assert_eq!(writer.free_space(), 0);
    }

    #[test]
    fn pool_keeps_channels_aligned() {
        let (mut writer, mut reader) = ring_pool(2, 4);
        writer.write_channel(1, &[9.0, 9.0, 9.0]);

        assert_eq!(writer.write_interleaved(&[1.0, -1.0, 2.0, -2.0]), 1);
        assert_eq!(reader.available(0), 1);
        let mut stale = [0.0f32; 3];
        reader.read_channel(1, &mut stale);

        // the dropped second frame must not surface on channel 0 only
        assert_eq!(writer.write_interleaved(&[3.0, -3.0]), 1);
        let mut left = [0.0f32; 2];
        let mut right = [0.0f32; 2];
        reader.read_channel(0, &mut left);
        reader.read_channel(1, &mut right);
        assert_eq!(left, [1.0, 3.0]);
        assert_eq!(right, [-1.0, -3.0]);
    }

    #[test]
    fn pool_out_of_range_channel() {
        let (mut writer, mut reader) = ring_pool(1, 4);
        assert_eq!(writer.write_channel(3, &[1.0]), 0);

        let mut out = [5.0f32; 2];
        assert_eq!(reader.read_channel(3, &mut out), 0);
        assert_eq!(out, [0.0, 0.0]);
    }
}
