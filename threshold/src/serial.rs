//! # Early Log Sink (UART 16550)
//!
//! With the `early-log` feature, `_start` routes the `log` facade to COM1
//! before handing off, so the handoff and the kernel's first steps can be
//! watched from a serial console (`-serial stdio` under QEMU).

use core::fmt;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use spin::Mutex;
use x86_64::instructions::port::Port;

/// COM1 base port
const COM1: u16 = 0x3F8;

/// Serial port registers (offsets from base)
const DATA: u16 = 0;          // Data register (DLAB=0)
const INT_ENABLE: u16 = 1;    // Interrupt Enable (DLAB=0)
const FIFO_CTRL: u16 = 2;     // FIFO Control
const LINE_CTRL: u16 = 3;     // Line Control
const MODEM_CTRL: u16 = 4;    // Modem Control
const LINE_STATUS: u16 = 5;   // Line Status
const DIVISOR_LSB: u16 = 0;   // Divisor Latch LSB (DLAB=1)
const DIVISOR_MSB: u16 = 1;   // Divisor Latch MSB (DLAB=1)

/// Line status: transmit holding register empty
const THR_EMPTY: u8 = 0x20;

pub struct SerialPort {
    base: u16,
    data: Port<u8>,
    int_enable: Port<u8>,
    fifo_ctrl: Port<u8>,
    line_ctrl: Port<u8>,
    modem_ctrl: Port<u8>,
    line_status: Port<u8>,
    initialized: bool,
}

impl SerialPort {
    /// Create a new serial port instance (doesn't touch the hardware)
    const fn new(base: u16) -> Self {
        Self {
            base,
            data: Port::new(base + DATA),
            int_enable: Port::new(base + INT_ENABLE),
            fifo_ctrl: Port::new(base + FIFO_CTRL),
            line_ctrl: Port::new(base + LINE_CTRL),
            modem_ctrl: Port::new(base + MODEM_CTRL),
            line_status: Port::new(base + LINE_STATUS),
            initialized: false,
        }
    }

    /// Program 115200 baud, 8N1, FIFOs on, interrupts off
    ///
    /// # Safety
    /// Port I/O; the caller must own COM1.
    unsafe fn init(&mut self) {
        self.int_enable.write(0x00);

        // DLAB on to reach the divisor latch; divisor 1 = 115200 baud
        self.line_ctrl.write(0x80);
        Port::<u8>::new(self.base + DIVISOR_LSB).write(0x01);
        Port::<u8>::new(self.base + DIVISOR_MSB).write(0x00);

        // 8 data bits, no parity, 1 stop bit, DLAB off
        self.line_ctrl.write(0x03);

        // Enable FIFO, clear buffers, 14-byte threshold
        self.fifo_ctrl.write(0xC7);

        // DTR, RTS, OUT2
        self.modem_ctrl.write(0x0B);

        self.initialized = true;
    }

    unsafe fn write_byte(&mut self, byte: u8) {
        while self.line_status.read() & THR_EMPTY == 0 {
            core::hint::spin_loop();
        }
        self.data.write(byte);
    }
}

impl fmt::Write for SerialPort {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            // Serial consoles want CRLF
            unsafe {
                if byte == b'\n' {
                    self.write_byte(b'\r');
                }
                self.write_byte(byte);
            }
        }
        Ok(())
    }
}

static COM1_PORT: Mutex<SerialPort> = Mutex::new(SerialPort::new(COM1));

/// Render one log line: `[LEVEL target] message`
pub fn format_record(out: &mut dyn fmt::Write, record: &Record) -> fmt::Result {
    writeln!(out, "[{:<5} {}] {}", record.level(), record.target(), record.args())
}

/// `log` facade backend writing to COM1
pub struct SerialLogger;

static LOGGER: SerialLogger = SerialLogger;

impl Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            emit(&COM1_PORT, record);
        }
    }

    fn flush(&self) {}
}

/// Write one record to `port`, or drop it if the port is already held
///
/// A panic raised while a record is being written must still reach the
/// panic handler's halt, so this never waits for the lock.
fn emit(port: &Mutex<SerialPort>, record: &Record) -> bool {
    let Some(mut port) = port.try_lock() else {
        return false;
    };
    if !port.initialized {
        unsafe { port.init() };
    }
    let _ = format_record(&mut *port, record);
    true
}

/// Install the serial logger as the global `log` backend
///
/// Fails if some other logger is already installed.
pub fn init_logger(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_format() {
        let mut line = String::new();
        format_record(
            &mut line,
            &Record::builder()
                .level(log::Level::Error)
                .target("threshold::trampoline")
                .args(format_args!("boot stack exhausted"))
                .build(),
        )
        .unwrap();
        assert_eq!(line, "[ERROR threshold::trampoline] boot stack exhausted\n");
    }

    #[test]
    fn test_short_level_is_padded() {
        let mut line = String::new();
        format_record(
            &mut line,
            &Record::builder()
                .level(log::Level::Info)
                .target("hearth")
                .args(format_args!("awake"))
                .build(),
        )
        .unwrap();
        assert_eq!(line, "[INFO  hearth] awake\n");
    }

    #[test]
    fn test_busy_port_drops_the_record() {
        let port = Mutex::new(SerialPort::new(COM1));
        let held = port.lock();

        let emitted = emit(
            &port,
            &Record::builder()
                .level(log::Level::Error)
                .target("hearth")
                .args(format_args!("panicked while logging"))
                .build(),
        );

        assert!(!emitted);
        assert!(!held.initialized);
    }
}
