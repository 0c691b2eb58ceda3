//! Per-thread scratch state.
//!
//! Each thread that touches the logging API gets a [`PerThreadData`] holding
//! its diagnostic-context stack and reusable buffers. The slot is created on
//! first use and torn down when the thread exits or when
//! [`thread_cleanup`] is called; teardown may run more than once without
//! effect.

use std::cell::RefCell;
use std::fs::File;
use std::io;

use crate::ndc::NdcEntry;
use crate::wire_buffer::WireBuffer;

use super::current_epoch;

#[cfg(unix)]
const NULL_DEVICE: &str = "/dev/null";
#[cfg(not(unix))]
const NULL_DEVICE: &str = "NUL";

/// Scratch state owned by one thread.
#[derive(Debug)]
pub struct PerThreadData {
    pub(crate) ndc: Vec<NdcEntry>,
    pub(crate) ndc_max_depth: Option<usize>,
    thread_name: Option<String>,
    encode_buffer: Option<WireBuffer>,
    null_sink: Option<File>,
    epoch: u64,
}

impl PerThreadData {
    fn new(epoch: u64) -> Self {
        Self {
            ndc: Vec::new(),
            ndc_max_depth: None,
            thread_name: None,
            encode_buffer: None,
            null_sink: None,
            epoch,
        }
    }

    /// The full nested diagnostic context, or `""` when the stack is empty.
    pub fn render_ndc(&self) -> &str {
        self.ndc.last().map_or("", |entry| entry.full_message.as_str())
    }

    /// Name of the owning thread, resolved once.
    pub fn thread_name(&mut self) -> &str {
        self.thread_name.get_or_insert_with(|| {
            let current = std::thread::current();
            match current.name() {
                Some(name) => name.to_owned(),
                None => format!("{:?}", current.id()),
            }
        })
    }

    /// A cleared buffer of at least `capacity` bytes, reused across calls.
    pub fn encode_buffer(&mut self, capacity: usize) -> &mut WireBuffer {
        let buffer = match self.encode_buffer.take() {
            Some(mut buffer) if buffer.capacity() >= capacity => {
                buffer.clear();
                buffer
            }
            _ => WireBuffer::with_capacity(capacity),
        };
        self.encode_buffer.insert(buffer)
    }

    /// A handle on the platform null device, opened on first use.
    pub fn null_sink(&mut self) -> io::Result<&mut File> {
        if self.null_sink.is_none() {
            self.null_sink = Some(File::options().write(true).open(NULL_DEVICE)?);
        }
        self.null_sink
            .as_mut()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }

    /// Number of context teardowns that preceded this state.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

thread_local! {
    static SLOT: RefCell<Option<PerThreadData>> = const { RefCell::new(None) };
}

/// Run `f` with the calling thread's scratch state, creating it if needed.
///
/// Returns `None` while the thread is being torn down or when called
/// re-entrantly from inside `f`. State left over from a context that has
/// since been destroyed is discarded first.
pub fn with_per_thread_data<R>(f: impl FnOnce(&mut PerThreadData) -> R) -> Option<R> {
    SLOT.try_with(|slot| {
        let mut slot = slot.try_borrow_mut().ok()?;
        let epoch = current_epoch();
        if !matches!(slot.as_ref(), Some(data) if data.epoch == epoch) {
            *slot = Some(PerThreadData::new(epoch));
        }
        slot.as_mut().map(f)
    })
    .ok()
    .flatten()
}

/// `true` if the calling thread currently holds scratch state.
pub fn has_per_thread_data() -> bool {
    SLOT.try_with(|slot| slot.try_borrow().is_ok_and(|slot| slot.is_some()))
        .unwrap_or(false)
}

/// Release the calling thread's scratch state.
///
/// Returns `true` if there was state to release. Safe to call repeatedly and
/// from thread-exit paths.
pub fn thread_cleanup() -> bool {
    SLOT.try_with(|slot| {
        slot.try_borrow_mut()
            .map(|mut slot| slot.take().is_some())
            .unwrap_or(false)
    })
    .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;
    use std::thread;

    #[rstest]
    fn cleanup_is_idempotent() {
        thread::spawn(|| {
            assert!(!has_per_thread_data());
            with_per_thread_data(|_| ()).expect("slot available");
            assert!(has_per_thread_data());
            assert!(thread_cleanup());
            assert!(!thread_cleanup());
            assert!(!has_per_thread_data());
        })
        .join()
        .expect("thread completes");
    }

    #[rstest]
    fn reentrant_access_is_refused() {
        let nested = with_per_thread_data(|_| with_per_thread_data(|_| ()));
        assert_eq!(nested, Some(None));
    }

    #[rstest]
    fn encode_buffer_is_reused() {
        with_per_thread_data(|ptd| {
            ptd.encode_buffer(64).append_u8(1).expect("room");
            let buffer = ptd.encode_buffer(32);
            assert!(buffer.is_empty());
            assert_eq!(buffer.capacity(), 64);
        })
        .expect("slot available");
    }

    #[rstest]
    fn null_sink_accepts_writes() {
        with_per_thread_data(|ptd| {
            let sink = ptd.null_sink().expect("open null device");
            sink.write_all(b"discarded").expect("write to null device");
        })
        .expect("slot available");
    }

    #[rstest]
    fn unnamed_threads_use_their_id() {
        let name = thread::spawn(|| with_per_thread_data(|ptd| ptd.thread_name().to_owned()))
            .join()
            .expect("thread completes")
            .expect("slot available");
        assert!(name.starts_with("ThreadId("));
    }
}
