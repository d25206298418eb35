//! Record function entry/exit events as call stack state.
//!
//! Each thread gets a `CallStack` attribute with one child per stack depth
//! (`1`, `2`, ...). While a function is on the stack, the attribute of its
//! depth holds the function's symbol value.
//!
//! Example: entering `main` at 0, `work` at 10, leaving `work` at 30 and
//! `main` at 100 stores `main` on depth `1` over `[0, 99]` and `work` on
//! depth `2` over `[10, 29]`.

use super::{AttributeId, MemoryStateSystem, StateValue};
use crate::utils::config::{CALLSTACK_ATTRIBUTE, PROCESSES_ATTRIBUTE, THREADS_ATTRIBUTE};
use crate::utils::error::OracleError;
use log::{debug, warn};
use std::collections::HashMap;

/// Open frame on a thread's stack
#[derive(Debug, Clone)]
struct Frame {
    start: i64,
    value: StateValue,
}

/// Recorded state of one thread
#[derive(Debug, Default)]
struct ThreadStack {
    depth_attributes: Vec<AttributeId>,
    frames: Vec<Frame>,
}

/// Builds a `MemoryStateSystem` from entry/exit events
///
/// **Public** - the state provider behind the CLI input path
#[derive(Debug)]
pub struct CallStackRecorder {
    state: MemoryStateSystem,
    threads: HashMap<(i32, i32), ThreadStack>,
    last_timestamp: i64,
}

impl CallStackRecorder {
    pub fn new(start: i64) -> Self {
        Self {
            state: MemoryStateSystem::new(start),
            threads: HashMap::new(),
            last_timestamp: start,
        }
    }

    /// Push `value` on the stack of thread `(pid, tid)` at `timestamp`
    pub fn enter(
        &mut self,
        timestamp: i64,
        pid: i32,
        tid: i32,
        value: StateValue,
    ) -> Result<(), OracleError> {
        self.advance(timestamp)?;

        let state = &mut self.state;
        let thread = self.threads.entry((pid, tid)).or_default();
        let depth = thread.frames.len() + 1;

        // Depth attributes are created in order, so child_attributes lists them by depth
        if thread.depth_attributes.len() < depth {
            let pid_name = pid.to_string();
            let tid_name = tid.to_string();
            let depth_name = depth.to_string();
            let attribute = state.attribute_for_path(&[
                PROCESSES_ATTRIBUTE,
                &pid_name,
                THREADS_ATTRIBUTE,
                &tid_name,
                CALLSTACK_ATTRIBUTE,
                &depth_name,
            ]);
            thread.depth_attributes.push(attribute);
        }

        thread.frames.push(Frame {
            start: timestamp,
            value,
        });

        Ok(())
    }

    /// Pop the top frame of thread `(pid, tid)` at `timestamp`
    ///
    /// Exits on an empty stack are ignored. Calls that return at the tick
    /// they started are dropped: they hold no tick of their own.
    pub fn exit(&mut self, timestamp: i64, pid: i32, tid: i32) -> Result<(), OracleError> {
        self.advance(timestamp)?;

        let Some(thread) = self.threads.get_mut(&(pid, tid)) else {
            warn!("Exit at {} for unknown thread {}/{}", timestamp, pid, tid);
            return Ok(());
        };

        let depth = thread.frames.len();
        let Some(frame) = thread.frames.pop() else {
            warn!("Exit at {} on empty stack of thread {}/{}", timestamp, pid, tid);
            return Ok(());
        };

        if timestamp == frame.start {
            debug!(
                "Dropping zero-length call at {} (thread {}/{}, depth {})",
                timestamp, pid, tid, depth
            );
            return Ok(());
        }

        let attribute = thread.depth_attributes[depth - 1];
        self.state
            .add_interval(attribute, frame.start, timestamp - 1, frame.value)
    }

    /// Close every open frame at `end` and return the finished state system
    pub fn finish(mut self, end: i64) -> Result<MemoryStateSystem, OracleError> {
        let end = end.max(self.last_timestamp);

        for ((pid, tid), thread) in self.threads.iter_mut() {
            while let Some(frame) = thread.frames.pop() {
                let depth = thread.frames.len() + 1;
                debug!(
                    "Closing open call on thread {}/{} at depth {} (started {})",
                    pid, tid, depth, frame.start
                );
                let attribute = thread.depth_attributes[depth - 1];
                self.state
                    .add_interval(attribute, frame.start, end, frame.value)?;
            }
        }

        self.state.close(end);
        Ok(self.state)
    }

    fn advance(&mut self, timestamp: i64) -> Result<(), OracleError> {
        if timestamp < self.last_timestamp {
            return Err(OracleError::TimeRange {
                timestamp,
                start: self.last_timestamp,
                end: i64::MAX,
            });
        }
        self.last_timestamp = timestamp;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::StateOracle;

    #[test]
    fn test_nested_calls_become_depth_intervals() {
        let mut recorder = CallStackRecorder::new(0);
        recorder.enter(0, 1, 2, StateValue::Str("main".into())).unwrap();
        recorder.enter(10, 1, 2, StateValue::Str("work".into())).unwrap();
        recorder.exit(30, 1, 2).unwrap();
        recorder.exit(100, 1, 2).unwrap();
        let ss = recorder.finish(100).unwrap();

        let depth1 = ss
            .find_attribute(&["Processes", "1", "Threads", "2", "CallStack", "1"])
            .unwrap();
        let depth2 = ss
            .find_attribute(&["Processes", "1", "Threads", "2", "CallStack", "2"])
            .unwrap();

        let main = ss.query(50, depth1).unwrap();
        assert_eq!((main.start, main.end), (0, 99));
        assert_eq!(main.value, StateValue::Str("main".into()));

        let work = ss.query(10, depth2).unwrap();
        assert_eq!((work.start, work.end), (10, 29));
        assert!(ss.query(30, depth2).unwrap().value.is_null());
    }

    #[test]
    fn test_finish_closes_open_frames() {
        let mut recorder = CallStackRecorder::new(0);
        recorder.enter(5, 1, 1, StateValue::Long(0x1000)).unwrap();
        let ss = recorder.finish(40).unwrap();

        let depth1 = ss
            .find_attribute(&["Processes", "1", "Threads", "1", "CallStack", "1"])
            .unwrap();
        let interval = ss.query(40, depth1).unwrap();
        assert_eq!((interval.start, interval.end), (5, 40));
        assert_eq!(ss.end_time(), 40);
    }

    #[test]
    fn test_out_of_order_event_rejected() {
        let mut recorder = CallStackRecorder::new(0);
        recorder.enter(10, 1, 1, StateValue::Int(1)).unwrap();
        assert!(recorder.exit(5, 1, 1).is_err());
    }

    #[test]
    fn test_zero_length_call_dropped() {
        let mut recorder = CallStackRecorder::new(0);
        recorder.enter(10, 1, 1, StateValue::Int(1)).unwrap();
        recorder.exit(10, 1, 1).unwrap();
        let ss = recorder.finish(20).unwrap();

        let depth1 = ss
            .find_attribute(&["Processes", "1", "Threads", "1", "CallStack", "1"])
            .unwrap();
        assert!(ss.query(10, depth1).unwrap().value.is_null());
    }
}
