//! # The halt primitive
//!
//! The one architecture-specific instruction the handoff needs: stop the
//! processor until the next interrupt. Everything else in Threshold is
//! platform-neutral and talks to the CPU only through [`Cpu`].

/// The processor as the trampoline sees it
pub trait Cpu {
    /// Halt until the next interrupt (or other wake event), then return
    fn wait_for_interrupt(&mut self);
}

/// The real processor
#[derive(Debug, Default, Clone, Copy)]
pub struct Hardware;

impl Cpu for Hardware {
    #[inline(always)]
    fn wait_for_interrupt(&mut self) {
        #[cfg(target_arch = "x86_64")]
        x86_64::instructions::hlt();

        #[cfg(target_arch = "aarch64")]
        unsafe {
            core::arch::asm!("wfi", options(nomem, nostack, preserves_flags));
        }

        #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
        core::hint::spin_loop();
    }
}

/// Park the processor for good
///
/// No interrupt handling exists at this layer, so every wake simply halts
/// again.
pub fn halt_forever<C: Cpu>(cpu: &mut C) -> ! {
    loop {
        cpu.wait_for_interrupt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};

    /// Counts halts and bails out of the loop after `limit` wakes
    struct CountingCpu {
        halts: usize,
        limit: usize,
    }

    impl Cpu for CountingCpu {
        fn wait_for_interrupt(&mut self) {
            self.halts += 1;
            if self.halts == self.limit {
                panic!("wake limit reached");
            }
        }
    }

    #[test]
    fn test_halt_forever_rehalts_after_every_wake() {
        let mut cpu = CountingCpu { halts: 0, limit: 1000 };
        let escaped = panic::catch_unwind(AssertUnwindSafe(|| halt_forever(&mut cpu)));

        // Only the harness limit gets us out
        assert!(escaped.is_err());
        assert_eq!(cpu.halts, 1000);
    }
}
