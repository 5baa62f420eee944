//! # The Entry Trampoline
//!
//! The bridge between loader-controlled and kernel-controlled execution.
//! It calls `kernel_main` exactly once with the loader's pointer and, should
//! that call ever come back, parks the processor for good.
//!
//! ```text
//!   Entered ──call──▶ RunningKernel ──returns──▶ Halted ◀─┐
//!                                                  │      │
//!                                                  └─wake─┘
//! ```
//!
//! `kernel_main` is contractually never supposed to return, but the halted
//! state is modeled explicitly instead of being trusted away, so it can be
//! driven one step at a time in tests.

use crate::boot_info::BootInfoPtr;
use crate::cpu::Cpu;

/// Where the trampoline is in its short life
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffState {
    /// Running on the boot stack, about to call the kernel
    Entered,
    /// Inside the kernel's main routine
    RunningKernel,
    /// The kernel returned; only halts from here on
    Halted,
}

/// The kernel's main routine, the one collaborator the trampoline calls
pub trait KernelMain {
    /// Receives the boot-information pointer widened to 64 bits
    fn enter(&mut self, boot_info: u64);
}

impl<F: FnMut(u64)> KernelMain for F {
    fn enter(&mut self, boot_info: u64) {
        self(boot_info)
    }
}

/// The external `kernel_main` symbol the kernel image provides
#[cfg(target_os = "none")]
pub struct ExternKernelMain;

#[cfg(target_os = "none")]
extern "C" {
    fn kernel_main(boot_info: u64);
}

#[cfg(target_os = "none")]
impl KernelMain for ExternKernelMain {
    fn enter(&mut self, boot_info: u64) {
        // Safety: the kernel image defines `kernel_main` with this signature
        unsafe { kernel_main(boot_info) }
    }
}

/// The handoff state machine
pub struct Trampoline<K: KernelMain, C: Cpu> {
    boot_info: BootInfoPtr,
    kernel: K,
    cpu: C,
    state: HandoffState,
}

impl<K: KernelMain, C: Cpu> Trampoline<K, C> {
    pub fn new(boot_info: BootInfoPtr, kernel: K, cpu: C) -> Self {
        Self {
            boot_info,
            kernel,
            cpu,
            state: HandoffState::Entered,
        }
    }

    pub fn state(&self) -> HandoffState {
        self.state
    }

    /// Perform one transition and report the state we ended up in
    ///
    /// From `Entered` this is the kernel call, which normally never comes
    /// back. From `Halted` it is a single halt; the state stays `Halted`
    /// whatever woke the processor.
    pub fn step(&mut self) -> HandoffState {
        match self.state {
            HandoffState::Entered => {
                let boot_info = self.boot_info.as_u64();
                log::debug!("handing off to kernel_main (boot info {:#018x})", boot_info);

                self.state = HandoffState::RunningKernel;
                self.kernel.enter(boot_info);

                // Nothing but halts from here, not even a log line
                self.state = HandoffState::Halted;
            }
            HandoffState::RunningKernel => {
                // Only reachable if the kernel call unwound; it is over either way
                self.state = HandoffState::Halted;
            }
            HandoffState::Halted => {
                self.cpu.wait_for_interrupt();
            }
        }
        self.state
    }

    /// Run the handoff to its end, which never comes
    pub fn run(mut self) -> ! {
        loop {
            self.step();
        }
    }
}
