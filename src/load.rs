//! Loading parsed jobs into memory and the ready queue.
//!
//! For each [`Job`] the loader allocates and pins a frame for the page
//! table, allocates the program's frames, lays the instruction words
//! into them, attaches the data cards, and enqueues the finished PCB.
//! Running out of frames is fatal to the whole batch.

use log::{debug, info};

use crate::deck::Job;
use crate::sim::mem::Word;
use crate::sim::pcb::Pcb;
use crate::sim::{System, FRAME_COUNT, PAGE_SIZE, WORD_SIZE};

/// Instruction slots charged against each page when sizing a program.
const INSTRUCTIONS_PER_PAGE: usize = PAGE_SIZE / WORD_SIZE;

/// Error from loading a batch. Loading errors abort the batch: jobs
/// already enqueued never run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadErr {
    /// No free frame was left while loading the named job.
    OutOfFrames {
        /// The job that could not be loaded.
        pid: u16,
    },
}

impl std::fmt::Display for LoadErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadErr::OutOfFrames { pid } => {
                write!(f, "out of memory frames while loading job {pid}")
            }
        }
    }
}
impl std::error::Error for LoadErr {}
impl crate::err::Error for LoadErr {
    fn help(&self) -> Option<std::borrow::Cow<'_, str>> {
        Some("the batch needs more frames than the machine has; split it into smaller runs".into())
    }
}

impl System {
    /// Loads every job of a batch, in deck order.
    pub fn load_deck(&mut self, jobs: impl IntoIterator<Item = Job>) -> Result<(), LoadErr> {
        for job in jobs {
            self.load_job(job)?;
        }
        Ok(())
    }

    /// Loads one job: builds its PCB, lays its program image into pages,
    /// attaches its data cards, and enqueues it.
    ///
    /// Instruction `k` of the program is placed at virtual address `k`.
    /// The number of frames the program receives is
    /// `ceil(n / INSTRUCTIONS_PER_PAGE)`, but never zero, so short
    /// programs still get pages past their text to use as data area and
    /// an empty program's first fetch lands on a mapped blank word.
    pub fn load_job(&mut self, job: Job) -> Result<(), LoadErr> {
        let pid = job.card.pid;
        let exhausted = LoadErr::OutOfFrames { pid };

        let pt_frame = self.mem.alloc_frame().ok_or(exhausted)?;
        self.mem.clear_frame(pt_frame);
        self.mem.lock_frame(pt_frame);
        let mut pcb = Pcb::new(&job.card, pt_frame * PAGE_SIZE);
        debug!("job {pid}: page table pinned in frame {pt_frame}");

        let instructions: Vec<&str> = job
            .program
            .iter()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .collect();
        let pages_needed = instructions
            .len()
            .div_ceil(INSTRUCTIONS_PER_PAGE)
            .clamp(1, FRAME_COUNT);

        for page in 0..pages_needed {
            let Some(frame) = self.mem.alloc_frame() else {
                self.unload(pcb);
                return Err(exhausted);
            };
            self.mem.clear_frame(frame);
            pcb.page_table.map_page(page, frame);
            debug!("job {pid}: page {page} in frame {frame}");
        }

        for (index, text) in instructions.iter().enumerate() {
            let page = index / PAGE_SIZE;
            let offset = index % PAGE_SIZE;
            if let Some(frame) = pcb.page_table.entry(page) {
                self.mem
                    .write(frame * PAGE_SIZE + offset, Word::from_text(text));
            }
        }

        pcb.data.extend(job.data);
        info!(
            "job {pid} loaded: {} instructions over {pages_needed} pages, {} data cards",
            instructions.len(),
            pcb.data.len()
        );
        self.enqueue(pcb);
        Ok(())
    }

    /// Returns a half-loaded job's frames to the pool.
    fn unload(&mut self, mut pcb: Pcb) {
        self.mem.release_frame(pcb.ptr / PAGE_SIZE);
        for page in 0..FRAME_COUNT {
            if let Some(frame) = pcb.page_table.unmap_page(page) {
                self.mem.release_frame(frame);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::LoadErr;
    use crate::deck::{Job, JobCard};
    use crate::sim::io::SimOutput;
    use crate::sim::mem::FrameAllocStrategy;
    use crate::sim::{System, SystemFlags, FRAME_COUNT, PAGE_SIZE};

    fn system() -> System {
        let flags = SystemFlags {
            alloc: FrameAllocStrategy::Sequential,
            ..Default::default()
        };
        System::new(flags, SimOutput::Empty)
    }

    fn job(pid: u16, program: &[&str]) -> Job {
        Job {
            card: JobCard {
                pid,
                ttl: 10,
                tll: 10,
            },
            program: program.iter().map(|s| s.to_string()).collect(),
            data: vec!["HELLO".to_string()],
        }
    }

    #[test]
    fn test_program_image_layout() {
        let mut sys = system();
        sys.load_job(job(1, &["GD10", "PD10", "H"])).unwrap();

        let pcb = sys.ready.front().unwrap();
        // Page-table frame 0 is pinned; three instructions need two pages.
        assert_eq!(pcb.ptr, 0);
        assert!(sys.mem.is_locked(0));
        assert_eq!(pcb.page_table.entry(0), Some(1));
        assert_eq!(pcb.page_table.entry(1), Some(2));
        assert_eq!(pcb.page_table.entry(2), None);

        // Instruction k sits at virtual address k.
        assert_eq!(sys.mem.read(PAGE_SIZE).text(), "GD10");
        assert_eq!(sys.mem.read(PAGE_SIZE + 1).text(), "PD10");
        assert_eq!(sys.mem.read(PAGE_SIZE + 2).text(), "H");
        assert_eq!(pcb.page_table.translate(0), Ok(PAGE_SIZE));
    }

    #[test]
    fn test_zero_instruction_job_gets_one_page() {
        let mut sys = system();
        sys.load_job(job(1, &[])).unwrap();

        let pcb = sys.ready.front().unwrap();
        assert_eq!(pcb.page_table.entry(0), Some(1));
        assert_eq!(pcb.page_table.entry(1), None);
        assert_eq!(sys.mem.read(PAGE_SIZE).text(), "");
    }

    #[test]
    fn test_blank_program_lines_dropped() {
        let mut sys = system();
        sys.load_job(job(1, &["  GD10  ", "", "   ", "H"])).unwrap();

        assert_eq!(sys.mem.read(PAGE_SIZE).text(), "GD10");
        assert_eq!(sys.mem.read(PAGE_SIZE + 1).text(), "H");
    }

    #[test]
    fn test_long_lines_truncate_to_word() {
        let mut sys = system();
        sys.load_job(job(1, &["GD100"])).unwrap();
        assert_eq!(sys.mem.read(PAGE_SIZE).text(), "GD10");
    }

    #[test]
    fn test_data_cards_attached_in_order() {
        let mut sys = system();
        let mut j = job(1, &["H"]);
        j.data = vec!["A".into(), "B".into()];
        sys.load_job(j).unwrap();

        let pcb = sys.ready.front().unwrap();
        assert_eq!(pcb.data, ["A", "B"]);
    }

    #[test]
    fn test_frame_exhaustion_is_fatal() {
        let mut sys = system();
        // Three jobs of three frames each fit; the fourth does not.
        for pid in 1..=3 {
            sys.load_job(job(pid, &["LR00", "LR00", "LR00"])).unwrap();
        }
        let err = sys
            .load_job(job(4, &["LR00", "LR00", "LR00"]))
            .unwrap_err();
        assert_eq!(err, LoadErr::OutOfFrames { pid: 4 });
    }

    #[test]
    fn test_failed_load_releases_its_frames() {
        let mut sys = system();
        for pid in 1..=3 {
            sys.load_job(job(pid, &["LR00", "LR00", "LR00"])).unwrap();
        }
        let free_before = sys.mem.free_frames();
        assert!(sys.load_job(job(4, &["LR00", "LR00", "LR00"])).is_err());
        assert_eq!(sys.mem.free_frames(), free_before);
    }

    #[test]
    fn test_jobs_do_not_share_frames() {
        let mut sys = system();
        sys.load_job(job(1, &["LR00"])).unwrap();
        sys.load_job(job(2, &["LR00"])).unwrap();

        let a = &sys.ready[0];
        let b = &sys.ready[1];
        let mut frames: Vec<usize> = a.page_table.iter().map(|(_, f)| f).collect();
        frames.extend(b.page_table.iter().map(|(_, f)| f));
        frames.push(a.ptr / PAGE_SIZE);
        frames.push(b.ptr / PAGE_SIZE);
        frames.sort_unstable();
        frames.dedup();
        assert_eq!(frames.len(), 4);
        assert!(frames.iter().all(|&f| f < FRAME_COUNT && sys.mem.is_allocated(f)));
    }
}
