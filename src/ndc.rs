//! Nested diagnostic context.
//!
//! Each thread keeps a stack of context messages. The full context rendered
//! into a record is the stack joined with spaces, cached per entry so
//! rendering never rebuilds the string.

use crate::context::per_thread::with_per_thread_data;

/// One level of the diagnostic stack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NdcEntry {
    pub message: String,
    pub full_message: String,
}

impl NdcEntry {
    fn on_top_of(parent: Option<&NdcEntry>, message: &str) -> Self {
        let full_message = match parent {
            Some(parent) => format!("{} {message}", parent.full_message),
            None => message.to_owned(),
        };
        Self {
            message: message.to_owned(),
            full_message,
        }
    }
}

/// Push `message` onto the calling thread's stack.
///
/// Pushes beyond the configured maximum depth are ignored.
pub fn push(message: &str) {
    with_per_thread_data(|ptd| {
        if ptd.ndc_max_depth.is_some_and(|max| ptd.ndc.len() >= max) {
            return;
        }
        let entry = NdcEntry::on_top_of(ptd.ndc.last(), message);
        ptd.ndc.push(entry);
    });
}

/// Remove and return the innermost message.
pub fn pop() -> Option<String> {
    with_per_thread_data(|ptd| ptd.ndc.pop().map(|entry| entry.message)).flatten()
}

/// The innermost message without removing it.
pub fn peek() -> Option<String> {
    with_per_thread_data(|ptd| ptd.ndc.last().map(|entry| entry.message.clone())).flatten()
}

/// The full rendered context.
pub fn get() -> String {
    with_per_thread_data(|ptd| ptd.render_ndc().to_owned()).unwrap_or_default()
}

pub fn depth() -> usize {
    with_per_thread_data(|ptd| ptd.ndc.len()).unwrap_or(0)
}

pub fn clear() {
    with_per_thread_data(|ptd| ptd.ndc.clear());
}

/// Limit the stack depth, dropping any entries above it.
pub fn set_max_depth(max: usize) {
    with_per_thread_data(|ptd| {
        ptd.ndc.truncate(max);
        ptd.ndc_max_depth = Some(max);
    });
}

/// Copy of the stack, for handing to a child thread.
pub fn clone_stack() -> Vec<NdcEntry> {
    with_per_thread_data(|ptd| ptd.ndc.clone()).unwrap_or_default()
}

/// Replace the calling thread's stack with `stack`.
pub fn inherit(stack: Vec<NdcEntry>) {
    with_per_thread_data(|ptd| ptd.ndc = stack);
}

/// Pushes a message for the lifetime of the guard.
#[must_use = "the context is popped when the guard is dropped"]
pub struct NdcGuard {
    depth: usize,
}

impl NdcGuard {
    pub fn new(message: &str) -> Self {
        push(message);
        Self { depth: depth() }
    }
}

impl Drop for NdcGuard {
    fn drop(&mut self) {
        with_per_thread_data(|ptd| ptd.ndc.truncate(self.depth.saturating_sub(1)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::thread;

    fn on_fresh_thread<R: Send + 'static>(f: impl FnOnce() -> R + Send + 'static) -> R {
        thread::spawn(f).join().expect("thread completes")
    }

    #[rstest]
    fn nested_messages_render_with_spaces() {
        let rendered = on_fresh_thread(|| {
            push("request=7");
            push("user=ada");
            get()
        });
        assert_eq!(rendered, "request=7 user=ada");
    }

    #[rstest]
    fn pop_returns_innermost_message() {
        let (popped, remaining) = on_fresh_thread(|| {
            push("outer");
            push("inner");
            (pop(), get())
        });
        assert_eq!(popped.as_deref(), Some("inner"));
        assert_eq!(remaining, "outer");
    }

    #[rstest]
    fn guard_pops_on_drop() {
        let (inside, after) = on_fresh_thread(|| {
            let _outer = NdcGuard::new("outer");
            let inside = {
                let _inner = NdcGuard::new("inner");
                get()
            };
            (inside, get())
        });
        assert_eq!(inside, "outer inner");
        assert_eq!(after, "outer");
    }

    #[rstest]
    fn max_depth_caps_pushes() {
        let depth = on_fresh_thread(|| {
            set_max_depth(1);
            push("a");
            push("b");
            depth()
        });
        assert_eq!(depth, 1);
    }

    #[rstest]
    fn child_inherits_stack() {
        let rendered = on_fresh_thread(|| {
            push("parent");
            let stack = clone_stack();
            on_fresh_thread(move || {
                inherit(stack);
                get()
            })
        });
        assert_eq!(rendered, "parent");
    }
}
