//! Executing loaded jobs.
//!
//! This module is the machine itself. It consists of:
//! - [`System`]: the aggregate of memory, CPU, scheduler and output that
//!   drives a batch to completion.
//! - [`mem`]: the module handling words, frames, and frame allocation.
//! - [`page`]: the module handling page tables and address translation.
//! - [`pcb`]: the module handling process control blocks.
//! - [`interrupt`]: the module handling causes, priorities and dispatch
//!   selection.
//! - [`instr`]: the module handling instruction decoding.
//! - [`io`]: the module handling simulator output.
//!
//! The simulator is single-threaded and cooperative: multiprogramming is
//! the interleaving of jobs at quantum boundaries, never parallelism.

pub mod instr;
pub mod interrupt;
pub mod io;
pub mod mem;
pub mod page;
pub mod pcb;

use std::collections::VecDeque;

use log::{debug, info, trace, warn};

pub use self::io::SimOutput;

use self::instr::Instr;
use self::interrupt::{Cause, ProgramErr, Syscall};
use self::mem::{FrameAllocStrategy, Mem, Word};
use self::pcb::{Pcb, ProcState};

/// Total words of memory.
pub const MEM_SIZE: usize = 100;
/// Characters per memory word.
pub const WORD_SIZE: usize = 4;
/// Words per page (and per frame).
pub const PAGE_SIZE: usize = 10;
/// Number of physical frames.
pub const FRAME_COUNT: usize = 10;
/// Default scheduler quantum, in ticks.
pub const QUANTUM: u64 = 10;
/// Default global tick cutoff for a whole batch.
pub const MAX_TIMER: u64 = 1_000_000;

/// Configuration for a [`System`].
///
/// The defaults reproduce the machine's standard parameters; tests
/// typically swap in a deterministic [`FrameAllocStrategy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemFlags {
    /// How the allocator places frames.
    pub alloc: FrameAllocStrategy,
    /// Ticks between preemption checks. A value of 0 is treated as 1.
    pub quantum: u64,
    /// Global tick count at which the whole batch halts.
    pub max_ticks: u64,
}

impl Default for SystemFlags {
    fn default() -> Self {
        SystemFlags {
            alloc: FrameAllocStrategy::default(),
            quantum: QUANTUM,
            max_ticks: MAX_TIMER,
        }
    }
}

/// Why a job was terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// Normal halt or terminate syscall.
    Normal,
    /// Read with no data cards remaining.
    OutOfData,
    /// Output line quota exceeded.
    LineLimit,
    /// Instruction quota exceeded.
    TimeLimit,
    /// Unknown or malformed operation code.
    OpCode,
    /// Bad operand or virtual address outside the address space.
    Operand,
    /// In-range virtual address referencing an unmapped page.
    InvalidPage,
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reason::Normal => f.write_str("Normal termination"),
            Reason::OutOfData => f.write_str("Out of data"),
            Reason::LineLimit => f.write_str("Line limit exceeded"),
            Reason::TimeLimit => f.write_str("Time limit exceeded"),
            Reason::OpCode => f.write_str("Invalid operation code"),
            Reason::Operand => f.write_str("Invalid operand"),
            Reason::InvalidPage => f.write_str("Invalid page access"),
        }
    }
}

impl From<ProgramErr> for Reason {
    fn from(err: ProgramErr) -> Self {
        match err {
            ProgramErr::OpCode => Reason::OpCode,
            ProgramErr::Operand => Reason::Operand,
            ProgramErr::PageFault => Reason::InvalidPage,
        }
    }
}

/// The CPU: one instruction register, one general register, a condition
/// flag, and the interrupt cause fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cpu {
    /// Instruction register: the word fetched this cycle.
    pub ir: Word,
    /// Instruction counter: the virtual word address of the next fetch.
    pub ic: i64,
    /// General register.
    pub r: Word,
    /// Condition flag, set by `CR` and consumed by `BT`.
    pub c: bool,
    /// Pending service call, if any.
    pub si: Option<Syscall>,
    /// Pending program error, if any.
    pub pi: Option<ProgramErr>,
    /// Pending timer interrupt.
    pub ti: bool,
    /// Scratch virtual address used by the I/O syscalls.
    pub ra: i64,
}

impl Cpu {
    /// Creates a cleared CPU.
    pub fn new() -> Self {
        Cpu {
            ir: Word::BLANK,
            ic: 0,
            r: Word::BLANK,
            c: false,
            si: None,
            pi: None,
            ti: false,
            ra: 0,
        }
    }

    /// The causes currently pending, in field order.
    pub fn pending(&self) -> Vec<Cause> {
        let mut causes = Vec::with_capacity(3);
        if self.ti {
            causes.push(Cause::Timer);
        }
        if let Some(err) = self.pi {
            causes.push(Cause::Program(err));
        }
        if let Some(call) = self.si {
            causes.push(Cause::Syscall(call));
        }
        causes
    }

    /// Whether any cause is pending.
    pub fn any_pending(&self) -> bool {
        self.ti || self.pi.is_some() || self.si.is_some()
    }

    /// Clears every cause field and the scratch address.
    pub fn clear_causes(&mut self) {
        self.si = None;
        self.pi = None;
        self.ti = false;
        self.ra = 0;
    }
}
impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

/// The whole machine: memory, CPU, the ready queue, and the output
/// device, driven by [`System::run`].
///
/// The scheduler owns every PCB by value. The job currently on the CPU
/// sits in `current`; termination consumes it out again.
#[derive(Debug)]
pub struct System {
    /// The machine memory.
    pub mem: Mem,
    /// The CPU.
    pub cpu: Cpu,
    flags: SystemFlags,
    pub(crate) ready: VecDeque<Pcb>,
    pub(crate) current: Option<Pcb>,
    tick: u64,
    running: bool,
    ctx_switched: bool,
    output: SimOutput,
}

impl System {
    /// Creates an idle system with a cleared memory.
    pub fn new(flags: SystemFlags, output: SimOutput) -> Self {
        System {
            mem: Mem::new(flags.alloc),
            cpu: Cpu::new(),
            flags,
            ready: VecDeque::new(),
            current: None,
            tick: 0,
            running: true,
            ctx_switched: false,
            output,
        }
    }

    /// The global tick count: one tick per executed instruction.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Appends a loaded PCB to the tail of the ready queue.
    pub fn enqueue(&mut self, pcb: Pcb) {
        debug!("job {} enqueued", pcb.pid);
        self.ready.push_back(pcb);
    }

    /// Runs the batch to completion.
    ///
    /// Jobs are selected FIFO and interleaved at quantum boundaries.
    /// Returns when every job is done or the global tick cutoff is
    /// reached.
    pub fn run(&mut self) {
        while self.running && self.tick < self.flags.max_ticks {
            if self.current.is_none() {
                let Some(mut next) = self.ready.pop_front() else {
                    break;
                };
                next.restore_context(&mut self.cpu);
                debug!("job {} starts", next.pid);
                self.current = Some(next);
            }
            self.step();
        }
        if self.tick >= self.flags.max_ticks {
            warn!("global tick limit reached after {} ticks, halting batch", self.tick);
            self.running = false;
        }
        self.output.flush();
    }

    /// One instruction cycle: quota check, fetch, decode, execute,
    /// dispatch, preemption check.
    fn step(&mut self) {
        // A context switch recorded by a previous cycle must not suppress
        // this cycle's preemption check.
        self.ctx_switched = false;

        let (ttc, ttl, pid) = match &self.current {
            Some(pcb) => (pcb.ttc, pcb.ttl, pcb.pid),
            None => return,
        };

        if ttc >= ttl {
            self.cpu.ti = true;
            self.dispatch();
            return;
        }

        // Fetch. A translation failure leaves the PI set for dispatch
        // below; the cycle still consumes a tick.
        let fetched = match &self.current {
            Some(pcb) => pcb.page_table.translate(self.cpu.ic),
            None => return,
        };
        match fetched {
            Ok(ra) => {
                let word = self.mem.read(ra);
                let text = word.text().into_owned();
                if text.is_empty() {
                    self.retire_quietly();
                    return;
                }
                trace!("job {pid}: fetched {text:?} at VA {}", self.cpu.ic);
                self.cpu.ir = word;
                self.cpu.ic += 1;
                match Instr::decode(&text) {
                    Ok(instr) => self.execute(instr),
                    Err(err) => self.cpu.pi = Some(err.into()),
                }
            }
            Err(err) => self.cpu.pi = Some(err),
        }

        if let Some(pcb) = self.current.as_mut() {
            pcb.ttc += 1;
            if pcb.ttc >= pcb.ttl {
                self.cpu.ti = true;
            }
        }
        self.tick += 1;

        if self.cpu.any_pending() {
            self.dispatch();
        }
        if self.current.is_none() || self.ctx_switched {
            return;
        }
        if self.tick % self.flags.quantum.max(1) == 0 && !self.ready.is_empty() {
            self.preempt();
        }
    }

    /// Executes one decoded instruction, mutating CPU and memory or
    /// raising a cause.
    fn execute(&mut self, instr: Instr) {
        let Some(pcb) = self.current.as_mut() else {
            return;
        };
        match instr {
            Instr::GD(addr) => {
                self.cpu.ra = addr;
                self.cpu.si = Some(Syscall::Read);
            }
            Instr::PD(addr) => match pcb.page_table.translate(addr) {
                Ok(_) => {
                    self.cpu.ra = addr;
                    self.cpu.si = Some(Syscall::Write);
                }
                Err(err) => self.cpu.pi = Some(err),
            },
            Instr::LR(addr) => match pcb.page_table.translate(addr) {
                Ok(ra) => self.cpu.r = self.mem.read(ra),
                Err(err) => self.cpu.pi = Some(err),
            },
            Instr::SR(addr) => match pcb.page_table.translate(addr) {
                Ok(ra) => self.mem.write(ra, self.cpu.r),
                Err(err) => self.cpu.pi = Some(err),
            },
            Instr::CR(addr) => match pcb.page_table.translate(addr) {
                Ok(ra) => self.cpu.c = self.cpu.r == self.mem.read(ra),
                Err(err) => self.cpu.pi = Some(err),
            },
            Instr::BT(addr) => {
                if self.cpu.c {
                    self.cpu.ic = addr;
                }
            }
            Instr::H => self.cpu.si = Some(Syscall::Terminate),
        }
    }

    /// Services the highest-priority pending cause.
    ///
    /// The current context is saved around the handler and restored
    /// afterwards unless the handler retired the job. Only the serviced
    /// cause field is cleared; anything a handler raises is observed on
    /// the next cycle.
    fn dispatch(&mut self) {
        let Some(cause) = interrupt::select(&self.cpu.pending()) else {
            return;
        };
        let Some(pcb) = self.current.as_mut() else {
            return;
        };
        debug!("job {}: dispatching {cause}", pcb.pid);
        pcb.save_context(&self.cpu);

        match cause {
            Cause::Timer => {
                self.cpu.ti = false;
                self.terminate(Reason::TimeLimit);
            }
            Cause::Program(err) => {
                self.cpu.pi = None;
                self.terminate(err.into());
            }
            Cause::Syscall(Syscall::Read) => {
                self.cpu.si = None;
                self.handle_read();
            }
            Cause::Syscall(Syscall::Write) => {
                self.cpu.si = None;
                self.handle_write();
            }
            Cause::Syscall(Syscall::Terminate) => {
                self.cpu.si = None;
                self.terminate(Reason::Normal);
            }
        }

        if !self.ctx_switched {
            if let Some(pcb) = self.current.as_mut() {
                pcb.restore_context(&mut self.cpu);
            }
        }
    }

    /// Read syscall: pops the next data card and writes it into memory
    /// word-by-word starting at the virtual address in `RA`.
    ///
    /// The final chunk is right-padded with spaces. A translation failure
    /// aborts the read and leaves the PI set; running out of data cards
    /// retires the job.
    fn handle_read(&mut self) {
        let Some(pcb) = self.current.as_mut() else {
            return;
        };
        let Some(card) = pcb.data.pop_front() else {
            debug!("job {}: read with no data cards left", pcb.pid);
            self.terminate(Reason::OutOfData);
            return;
        };
        debug!("job {}: reading {card:?}", pcb.pid);
        for (i, chunk) in card.as_bytes().chunks(WORD_SIZE).enumerate() {
            match pcb.page_table.translate(self.cpu.ra + i as i64) {
                Ok(ra) => self.mem.write(ra, Word::from_chunk(chunk)),
                Err(err) => {
                    self.cpu.pi = Some(err);
                    return;
                }
            }
        }
    }

    /// Write syscall: emits the word at the virtual address in `RA` as
    /// one output line, charging the job's line quota first.
    fn handle_write(&mut self) {
        let Some(pcb) = self.current.as_mut() else {
            return;
        };
        pcb.llc += 1;
        if pcb.llc > pcb.tll {
            debug!("job {}: line limit exceeded ({}/{})", pcb.pid, pcb.llc, pcb.tll);
            self.terminate(Reason::LineLimit);
            return;
        }
        match pcb.page_table.translate(self.cpu.ra) {
            Ok(ra) => {
                let line = self.mem.read(ra).text().into_owned();
                self.output.put_line(&line);
            }
            Err(err) => self.cpu.pi = Some(err),
        }
    }

    /// Terminates the current job: writes its report block, releases its
    /// resources, and hands the CPU to the next job.
    fn terminate(&mut self, reason: Reason) {
        let Some(mut pcb) = self.current.take() else {
            return;
        };
        info!("job {} terminated: {reason} (TTC {}, LLC {})", pcb.pid, pcb.ttc, pcb.llc);
        self.output.put_line("");
        self.output.put_line("");
        self.output
            .put_line(&format!("Process {} terminated: {reason}", pcb.pid));
        self.output
            .put_line(&format!("TTC: {}, LLC: {}", pcb.ttc, pcb.llc));
        self.teardown(pcb);
    }

    /// Retires the current job without a report block. Used when a fetch
    /// runs past the end of the program into a blank word.
    fn retire_quietly(&mut self) {
        let Some(pcb) = self.current.take() else {
            return;
        };
        debug!("job {}: ran past its program, retiring without a report", pcb.pid);
        self.teardown(pcb);
    }

    /// Releases a retired job's frames, clears the cause fields, and
    /// schedules the next job. Output is flushed before the hand-off so
    /// each job's output block is complete once the next job starts.
    fn teardown(&mut self, mut pcb: Pcb) {
        self.mem.release_frame(pcb.ptr / PAGE_SIZE);
        for page in 0..FRAME_COUNT {
            if let Some(frame) = pcb.page_table.unmap_page(page) {
                self.mem.release_frame(frame);
            }
        }
        self.cpu.clear_causes();
        pcb.data.clear();
        pcb.state = ProcState::Terminated;
        self.output.flush();
        self.schedule_next();
    }

    /// Hands the CPU to the next ready job, or stops the system when the
    /// queue is empty.
    fn schedule_next(&mut self) {
        self.ctx_switched = true;
        match self.ready.pop_front() {
            Some(mut next) => {
                next.restore_context(&mut self.cpu);
                debug!("job {} scheduled", next.pid);
                self.current = Some(next);
            }
            None => {
                debug!("ready queue empty, system stopping");
                self.current = None;
                self.running = false;
            }
        }
    }

    /// Quantum expiry: parks the current job at the tail of the ready
    /// queue and resumes the head.
    fn preempt(&mut self) {
        let Some(mut pcb) = self.current.take() else {
            return;
        };
        let Some(mut next) = self.ready.pop_front() else {
            self.current = Some(pcb);
            return;
        };
        debug!("quantum expired: job {} yields to job {}", pcb.pid, next.pid);
        pcb.save_context(&self.cpu);
        pcb.state = ProcState::Ready;
        self.ready.push_back(pcb);
        next.restore_context(&mut self.cpu);
        self.current = Some(next);
    }
}
