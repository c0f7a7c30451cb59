//! Shared-memory monitor block.
//!
//! A fixed-layout packed record memory-mapped from a file (by default
//! under `/dev/shm`) so an external dashboard process can watch every
//! worker live. Each slot is written only by its owning thread and read
//! by any number of external readers; the monitor is a dashboard, not
//! authoritative state, so torn reads of a field in flight are
//! acceptable. The layout below is a wire format: field order, types and
//! packing must not change.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;

use memmap2::MmapMut;

use crate::board::{COLS, ROWS};
use crate::constants::{MONITOR_SLOTS, OPERATOR_SLOTS};

/// Size of the mapped region. Larger than `MonitorData` so the layout can
/// grow without resizing the mapping external readers hold.
const MONITOR_REGION_BYTES: u64 = 65_536;

/// Default monitor path.
pub const DEFAULT_MONITOR_PATH: &str = "/dev/shm/gridwalk_monitor";

/// Per-thread snapshot slot.
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct ThreadStatus {
    pub thread_id: i32,
    pub current_score: i64,
    pub best_score: i64,
    pub temperature: f64,
    pub total_iter: i64,
    pub mode: i32,
    pub strategy: i32,
    pub cycle_count: i32,
    pub seed_count: i32,
    pub trial_id: i32,
    pub reheat_factor: f64,
    pub overall_ar: f64,
    pub bad_ar: f64,
    pub energy_stddev: f64,
    pub action_weights: [f64; OPERATOR_SLOTS],
    pub action_ars: [f64; OPERATOR_SLOTS],
    pub action_deltas: [f64; OPERATOR_SLOTS],
    pub current_board: [[i32; COLS]; ROWS],
}

impl Default for ThreadStatus {
    fn default() -> Self {
        Self {
            thread_id: 0,
            current_score: 0,
            best_score: 0,
            temperature: 0.0,
            total_iter: 0,
            mode: 0,
            strategy: 0,
            cycle_count: 0,
            seed_count: 0,
            trial_id: 0,
            reheat_factor: 0.0,
            overall_ar: 0.0,
            bad_ar: 0.0,
            energy_stddev: 0.0,
            action_weights: [0.0; OPERATOR_SLOTS],
            action_ars: [0.0; OPERATOR_SLOTS],
            action_deltas: [0.0; OPERATOR_SLOTS],
            current_board: [[0; COLS]; ROWS],
        }
    }
}

/// One pending command from the dashboard to a worker.
#[repr(C, packed)]
#[derive(Clone, Copy, Default)]
pub struct ControlCommand {
    pub target_thread: i32,
    /// 1 = trigger reseed, 2 = force cycle stagnation, 3 = set temperature.
    pub command_type: i32,
    pub processed: i32,
    pub param_idx: i32,
    pub new_value: f64,
}

/// The whole mapped block.
#[repr(C, packed)]
pub struct MonitorData {
    pub num_threads: i32,
    pub global_best_score: i64,
    pub cmd: ControlCommand,
    pub status: [ThreadStatus; MONITOR_SLOTS],
}

/// Decoded control command delivered to a worker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MonitorCommand {
    TriggerReseed,
    ForceCycleStagnation,
    SetTemperature(f64),
}

/// Handle to the mapped monitor region. Shared by all workers; every
/// write goes through raw unaligned pointer stores because slots belong
/// to different threads and the struct is packed.
pub struct Monitor {
    map: MmapMut,
}

// Slot ownership is the synchronization discipline: thread `i` writes
// only `status[i]`, the main thread writes only the header, and the
// command word is a processed-flag handshake.
unsafe impl Send for Monitor {}
unsafe impl Sync for Monitor {}

impl Monitor {
    /// Map the monitor file, zero it, and stamp the thread count.
    pub fn create(path: &str, num_threads: usize) -> io::Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        file.set_len(MONITOR_REGION_BYTES)?;

        let mut map = unsafe { MmapMut::map_mut(&file)? };
        map.fill(0);

        let monitor = Self { map };
        unsafe {
            std::ptr::addr_of_mut!((*monitor.base()).num_threads)
                .write_unaligned(num_threads as i32);
        }
        Ok(monitor)
    }

    fn base(&self) -> *mut MonitorData {
        self.map.as_ptr() as *mut MonitorData
    }

    /// Overwrite one thread's slot. Out-of-range ids are ignored (the
    /// block holds 32 slots; machines with more cores just go dark on the
    /// dashboard past that).
    pub fn write_status(&self, thread_id: usize, status: ThreadStatus) {
        if thread_id >= MONITOR_SLOTS {
            return;
        }
        unsafe {
            let slots = std::ptr::addr_of_mut!((*self.base()).status) as *mut ThreadStatus;
            slots.add(thread_id).write_unaligned(status);
        }
    }

    pub fn set_global_best(&self, score: i64) {
        unsafe {
            std::ptr::addr_of_mut!((*self.base()).global_best_score).write_unaligned(score);
        }
    }

    /// Check for an unprocessed command aimed at `thread_id`. Marking the
    /// command processed happens here, before the worker acts on it, so a
    /// command is consumed exactly once even if acting on it reseeds.
    pub fn poll_command(&self, thread_id: usize) -> Option<MonitorCommand> {
        unsafe {
            let cmd_ptr = std::ptr::addr_of_mut!((*self.base()).cmd);
            let cmd = cmd_ptr.read_unaligned();
            if cmd.processed != 0 || cmd.target_thread != thread_id as i32 {
                return None;
            }
            std::ptr::addr_of_mut!((*cmd_ptr).processed).write_unaligned(1);

            match cmd.command_type {
                1 => Some(MonitorCommand::TriggerReseed),
                2 => Some(MonitorCommand::ForceCycleStagnation),
                3 => Some(MonitorCommand::SetTemperature(cmd.new_value)),
                _ => None,
            }
        }
    }

    /// Test/dashboard helper: plant a command in the block.
    pub fn post_command(&self, cmd: ControlCommand) {
        unsafe {
            std::ptr::addr_of_mut!((*self.base()).cmd).write_unaligned(cmd);
        }
    }

    /// Read one slot back (dashboard view of a worker).
    pub fn read_status(&self, thread_id: usize) -> Option<ThreadStatus> {
        if thread_id >= MONITOR_SLOTS {
            return None;
        }
        unsafe {
            let slots = std::ptr::addr_of!((*self.base()).status) as *const ThreadStatus;
            Some(slots.add(thread_id).read_unaligned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn layout_is_pinned() {
        // External readers decode these structs byte-for-byte; any drift
        // here is a protocol break.
        assert_eq!(size_of::<ControlCommand>(), 24);
        assert_eq!(
            size_of::<ThreadStatus>(),
            4 + 8 + 8 + 8 + 8 + 5 * 4 + 4 * 8 + 3 * OPERATOR_SLOTS * 8 + ROWS * COLS * 4
        );
        assert_eq!(
            size_of::<MonitorData>(),
            4 + 8 + size_of::<ControlCommand>() + MONITOR_SLOTS * size_of::<ThreadStatus>()
        );
        assert!(size_of::<MonitorData>() as u64 <= MONITOR_REGION_BYTES);
    }

    #[test]
    fn write_and_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor");
        let monitor = Monitor::create(path.to_str().unwrap(), 4).unwrap();

        let mut status = ThreadStatus::default();
        status.thread_id = 2;
        status.current_score = 900;
        status.best_score = 950;
        status.temperature = 39.23;
        status.action_weights[0] = 0.4;
        status.current_board[7][13] = 9;
        monitor.write_status(2, status);

        let read = monitor.read_status(2).unwrap();
        assert_eq!({ read.thread_id }, 2);
        assert_eq!({ read.best_score }, 950);
        assert_eq!({ read.temperature }, 39.23);
        assert_eq!({ read.action_weights }[0], 0.4);
        assert_eq!({ read.current_board }[7][13], 9);

        // Slot 3 is untouched.
        let other = monitor.read_status(3).unwrap();
        assert_eq!({ other.best_score }, 0);
    }

    #[test]
    fn out_of_range_slots_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor");
        let monitor = Monitor::create(path.to_str().unwrap(), 64).unwrap();
        monitor.write_status(MONITOR_SLOTS + 1, ThreadStatus::default());
        assert!(monitor.read_status(MONITOR_SLOTS + 1).is_none());
    }

    #[test]
    fn commands_are_consumed_once_by_the_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor");
        let monitor = Monitor::create(path.to_str().unwrap(), 4).unwrap();

        monitor.post_command(ControlCommand {
            target_thread: 1,
            command_type: 3,
            processed: 0,
            param_idx: 0,
            new_value: 12.5,
        });

        // Wrong thread sees nothing and leaves the command pending.
        assert_eq!(monitor.poll_command(0), None);
        assert_eq!(
            monitor.poll_command(1),
            Some(MonitorCommand::SetTemperature(12.5))
        );
        // Processed: nobody sees it again.
        assert_eq!(monitor.poll_command(1), None);
    }
}
