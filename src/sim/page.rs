//! Per-process page tables and virtual→real address translation.

use super::interrupt::ProgramErr;
use super::{FRAME_COUNT, MEM_SIZE, PAGE_SIZE};

/// A per-process page table mapping virtual pages to frames.
///
/// The table has one slot per possible page. Translation distinguishes
/// two failure classes: a virtual address outside the address space is
/// an operand error, while an in-range address whose page is unmapped
/// is a page fault. Both are fatal to the job that raised them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageTable([Option<usize>; FRAME_COUNT]);

impl PageTable {
    /// Creates a page table with every page unmapped.
    pub fn new() -> Self {
        Self::default()
    }

    /// The frame backing a page, if the page is mapped.
    pub fn entry(&self, page: usize) -> Option<usize> {
        self.0.get(page).copied().flatten()
    }

    /// Maps a page to a frame.
    pub fn map_page(&mut self, page: usize, frame: usize) {
        debug_assert!(frame < FRAME_COUNT);
        self.0[page] = Some(frame);
    }

    /// Unmaps a page, returning the frame it was backed by.
    pub fn unmap_page(&mut self, page: usize) -> Option<usize> {
        self.0[page].take()
    }

    /// Iterates over the `(page, frame)` pairs of all mapped pages.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(page, entry)| entry.map(|frame| (page, frame)))
    }

    /// Translates a virtual address to a real address.
    ///
    /// The decisions, in order:
    /// 1. An address outside `[0, MEM_SIZE)` is an operand error.
    /// 2. An in-range address whose page is unmapped is a page fault.
    /// 3. A real address outside memory is an operand error.
    pub fn translate(&self, va: i64) -> Result<usize, ProgramErr> {
        if va < 0 || va >= MEM_SIZE as i64 {
            return Err(ProgramErr::Operand);
        }
        let page = va as usize / PAGE_SIZE;
        let offset = va as usize % PAGE_SIZE;

        if page >= FRAME_COUNT {
            return Err(ProgramErr::PageFault);
        }
        let Some(frame) = self.entry(page) else {
            return Err(ProgramErr::PageFault);
        };
        if frame >= FRAME_COUNT {
            return Err(ProgramErr::PageFault);
        }

        let ra = frame * PAGE_SIZE + offset;
        if ra >= MEM_SIZE {
            return Err(ProgramErr::Operand);
        }
        Ok(ra)
    }
}
