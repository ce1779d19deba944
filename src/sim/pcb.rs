//! Process control blocks and saved execution context.

use std::collections::VecDeque;

use super::mem::Word;
use super::page::PageTable;
use super::Cpu;
use crate::deck::JobCard;

/// The scheduling state of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    /// Waiting in the ready queue.
    Ready,
    /// Currently executing on the CPU.
    Running,
    /// Parked while an interrupt handler runs on its behalf.
    Blocked,
    /// Done. A terminated process owns no frames and holds no locks.
    Terminated,
}

/// Sentinel instruction-counter value for a process that has never run.
pub const IC_UNSET: i64 = -1;

/// A saved CPU snapshot, restored when its process is scheduled back in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    /// Saved instruction counter, or [`IC_UNSET`] before the first run.
    pub ic: i64,
    /// Saved general register.
    pub r: Word,
    /// Saved condition flag.
    pub c: bool,
}

impl Default for Context {
    fn default() -> Self {
        Context {
            ic: IC_UNSET,
            r: Word::BLANK,
            c: false,
        }
    }
}

/// A process control block: everything the system tracks per job.
#[derive(Debug)]
pub struct Pcb {
    /// Job identity, from the job card.
    pub pid: u16,
    /// Total time limit: instructions this job may execute.
    pub ttl: u32,
    /// Total line limit: output lines this job may write.
    pub tll: u32,
    /// Time counter: instructions executed so far.
    pub ttc: u32,
    /// Line counter: output lines written so far.
    pub llc: u32,
    /// This job's page table.
    pub page_table: PageTable,
    /// Word address of the frame holding the page table, kept so the
    /// frame can be released at termination.
    pub ptr: usize,
    /// Data cards, consumed front-to-back by read syscalls.
    pub data: VecDeque<String>,
    /// Scheduling state.
    pub state: ProcState,
    /// Saved CPU snapshot.
    pub context: Context,
}

impl Pcb {
    /// Creates a ready, never-run PCB for a job whose page table lives at
    /// word address `ptr`.
    pub fn new(card: &JobCard, ptr: usize) -> Self {
        Pcb {
            pid: card.pid,
            ttl: card.ttl,
            tll: card.tll,
            ttc: 0,
            llc: 0,
            page_table: PageTable::new(),
            ptr,
            data: VecDeque::new(),
            state: ProcState::Ready,
            context: Context::default(),
        }
    }

    /// Snapshots the CPU into this PCB and parks the process.
    pub fn save_context(&mut self, cpu: &Cpu) {
        self.context = Context {
            ic: cpu.ic,
            r: cpu.r,
            c: cpu.c,
        };
        self.state = ProcState::Blocked;
    }

    /// Restores this PCB's snapshot into the CPU and marks it running.
    ///
    /// A process that has never run ([`IC_UNSET`]) starts at address 0.
    pub fn restore_context(&mut self, cpu: &mut Cpu) {
        self.state = ProcState::Running;
        cpu.ic = if self.context.ic == IC_UNSET {
            0
        } else {
            self.context.ic
        };
        cpu.r = self.context.r;
        cpu.c = self.context.c;
    }
}

#[cfg(test)]
mod tests {
    use super::{Pcb, ProcState, IC_UNSET};
    use crate::deck::JobCard;
    use crate::sim::mem::Word;
    use crate::sim::Cpu;

    fn pcb() -> Pcb {
        Pcb::new(
            &JobCard {
                pid: 7,
                ttl: 20,
                tll: 5,
            },
            30,
        )
    }

    #[test]
    fn test_new_pcb_is_ready_and_unrun() {
        let pcb = pcb();
        assert_eq!(pcb.state, ProcState::Ready);
        assert_eq!(pcb.context.ic, IC_UNSET);
        assert_eq!((pcb.ttc, pcb.llc), (0, 0));
    }

    #[test]
    fn test_first_restore_starts_at_zero() {
        let mut pcb = pcb();
        let mut cpu = Cpu::new();
        cpu.ic = 55;

        pcb.restore_context(&mut cpu);
        assert_eq!(cpu.ic, 0);
        assert_eq!(pcb.state, ProcState::Running);
    }

    #[test]
    fn test_save_restore_round_trip() {
        let mut pcb = pcb();
        let mut cpu = Cpu::new();
        cpu.ic = 13;
        cpu.r = Word::from_text("ABCD");
        cpu.c = true;

        pcb.save_context(&cpu);
        assert_eq!(pcb.state, ProcState::Blocked);

        let mut other = Cpu::new();
        pcb.restore_context(&mut other);
        assert_eq!(other.ic, 13);
        assert_eq!(other.r, Word::from_text("ABCD"));
        assert!(other.c);
    }
}
