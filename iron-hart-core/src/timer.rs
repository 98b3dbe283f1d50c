//! Memory-mapped machine timer.
//!
//! A background thread increments the 64-bit `mtime` register at a fixed host interval. Both
//! `mtime` and `mtimecmp` are stored as arrays of independently atomic bytes, so the hart can
//! access them byte by byte through the address router without taking a lock. Multi-byte reads
//! are therefore not atomic as a whole, which is acceptable for this timer model.

use log::{debug, error, trace};
use parking_lot::{Condvar, Mutex};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Default `mtime` address of the CLINT memory map.
pub const DEFAULT_MTIME_ADDRESS: u32 = 0x0200_BFF8;
/// Default `mtimecmp` address (hart 0) of the CLINT memory map.
pub const DEFAULT_MTIMECMP_ADDRESS: u32 = 0x0200_4000;

/// Width in bytes of each timer register window.
const REGISTER_SIZE: u32 = 8;

#[derive(Debug, Clone)]
pub struct TimerConfig {
    pub mtime_address: u32,
    pub mtimecmp_address: u32,
    /// Host time between two increments of `mtime`.
    pub tick_interval: Duration,
    /// Raised by the driver to ask the timer thread to stop as soon as possible.
    pub interrupt: Arc<AtomicBool>,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            mtime_address: DEFAULT_MTIME_ADDRESS,
            mtimecmp_address: DEFAULT_MTIMECMP_ADDRESS,
            tick_interval: Duration::from_millis(1),
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// The two timer registers, little-endian, one atomic per byte.
#[derive(Debug, Default)]
pub struct TimerRegisters {
    mtime: [AtomicU8; 8],
    mtimecmp: [AtomicU8; 8],
}

impl TimerRegisters {
    /// Increment `mtime` by one, carrying into higher bytes.
    pub fn tick(&self) {
        for byte in &self.mtime {
            if byte.fetch_add(1, Ordering::AcqRel) != u8::MAX {
                break;
            }
        }
    }

    pub fn mtime(&self) -> u64 {
        load(&self.mtime)
    }

    pub fn mtimecmp(&self) -> u64 {
        load(&self.mtimecmp)
    }

    pub fn set_mtimecmp(&self, value: u64) {
        store(&self.mtimecmp, value);
    }
}

fn load(bytes: &[AtomicU8; 8]) -> u64 {
    let mut buf = [0u8; 8];
    for (dst, src) in buf.iter_mut().zip(bytes) {
        *dst = src.load(Ordering::Acquire);
    }
    u64::from_le_bytes(buf)
}

fn store(bytes: &[AtomicU8; 8], value: u64) {
    for (dst, src) in bytes.iter().zip(value.to_le_bytes()) {
        dst.store(src, Ordering::Release);
    }
}

#[derive(Debug, Default)]
struct Control {
    exit: Mutex<bool>,
    wake: Condvar,
}

/// A running timer: the shared registers plus the thread ticking them.
///
/// Dropping the device stops the thread and waits for it to finish.
#[derive(Debug)]
pub struct TimerDevice {
    config: TimerConfig,
    registers: Arc<TimerRegisters>,
    control: Arc<Control>,
    handle: Option<JoinHandle<()>>,
}

impl TimerDevice {
    /// Spawn the ticking thread.
    pub fn start(config: TimerConfig) -> io::Result<Self> {
        let registers = Arc::new(TimerRegisters::default());
        let control = Arc::new(Control::default());
        let handle = thread::Builder::new().name("mtime".to_owned()).spawn({
            let registers = Arc::clone(&registers);
            let control = Arc::clone(&control);
            let interrupt = Arc::clone(&config.interrupt);
            let interval = config.tick_interval;
            move || run(&registers, &control, &interrupt, interval)
        })?;
        debug!(
            mtime_address = config.mtime_address,
            mtimecmp_address = config.mtimecmp_address;
            "Timer started with interval {:?}",
            config.tick_interval
        );
        Ok(Self {
            config,
            registers,
            control,
            handle: Some(handle),
        })
    }

    pub fn registers(&self) -> &TimerRegisters {
        &self.registers
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    /// Signal the thread to exit and block until it has.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        *self.control.exit.lock() = true;
        self.control.wake.notify_all();
        if handle.join().is_err() {
            error!("Timer thread panicked");
        }
        debug!("Timer stopped at mtime {}", self.registers.mtime());
    }

    /// Read a byte of `mtime` or `mtimecmp`, or `None` if `address` is outside both windows.
    pub fn read_byte(&self, address: u32) -> Option<u8> {
        if let Some(offset) = window_offset(self.config.mtime_address, address) {
            Some(self.registers.mtime[offset].load(Ordering::Acquire))
        } else {
            window_offset(self.config.mtimecmp_address, address)
                .map(|offset| self.registers.mtimecmp[offset].load(Ordering::Acquire))
        }
    }

    /// Write a byte of `mtimecmp`, returning whether `address` belongs to the timer.
    ///
    /// `mtime` is owned by the timer thread; guest writes to it are consumed and dropped.
    pub fn write_byte(&self, address: u32, value: u8) -> bool {
        if window_offset(self.config.mtime_address, address).is_some() {
            trace!("Ignoring write to mtime at {address:#010x}");
            true
        } else if let Some(offset) = window_offset(self.config.mtimecmp_address, address) {
            self.registers.mtimecmp[offset].store(value, Ordering::Release);
            true
        } else {
            false
        }
    }
}

impl Drop for TimerDevice {
    fn drop(&mut self) {
        self.stop();
    }
}

fn window_offset(base: u32, address: u32) -> Option<usize> {
    let offset = address.wrapping_sub(base);
    (offset < REGISTER_SIZE).then_some(offset as usize)
}

fn run(registers: &TimerRegisters, control: &Control, interrupt: &AtomicBool, interval: Duration) {
    let mut exit = control.exit.lock();
    while !*exit && !interrupt.load(Ordering::Acquire) {
        if control.wake.wait_for(&mut exit, interval).timed_out() {
            registers.tick();
        }
    }
}
