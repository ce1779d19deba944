//! Word-addressed memory, frames, and the frame allocator.
//!
//! This module consists of:
//! - [`Word`]: one fixed-width memory word.
//! - [`Mem`]: the machine memory, partitioned into frames with an
//!   allocation bitmap and per-frame lock bits.
//! - [`FrameAllocStrategy`]: how the allocator places frames.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{FRAME_COUNT, MEM_SIZE, PAGE_SIZE, WORD_SIZE};

/// One memory word: [`WORD_SIZE`] characters.
///
/// A cleared word is all NULs. Text shorter than the word is stored
/// right-padded with spaces, so [`Word::text`] trims trailing NULs and
/// spaces back off when reading the word as text.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Word([u8; WORD_SIZE]);

impl Word {
    /// The cleared word.
    pub const BLANK: Word = Word([0; WORD_SIZE]);

    /// Creates a word from text, truncating past the word width and
    /// right-padding with spaces.
    pub fn from_text(text: &str) -> Self {
        Self::from_chunk(text.as_bytes())
    }

    /// Creates a word from a byte chunk, truncating past the word width
    /// and right-padding with spaces.
    pub fn from_chunk(chunk: &[u8]) -> Self {
        let mut data = [b' '; WORD_SIZE];
        let n = chunk.len().min(WORD_SIZE);
        data[..n].copy_from_slice(&chunk[..n]);
        Word(data)
    }

    /// The raw bytes of this word.
    pub fn bytes(&self) -> &[u8; WORD_SIZE] {
        &self.0
    }

    /// The word as text, with trailing NULs and spaces trimmed.
    ///
    /// Bytes that do not form valid UTF-8 are replaced, which no valid
    /// instruction ever contains.
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        let mut end = WORD_SIZE;
        while end > 0 && matches!(self.0[end - 1], b'\0' | b' ') {
            end -= 1;
        }
        String::from_utf8_lossy(&self.0[..end])
    }
}
impl Default for Word {
    fn default() -> Self {
        Word::BLANK
    }
}
impl std::fmt::Debug for Word {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Word({:?})", self.text())
    }
}
impl std::fmt::Display for Word {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.text().fmt(f)
    }
}

/// Strategy used by [`Mem`] to place newly allocated frames.
///
/// Frame placement has no effect on what a batch outputs (jobs only see
/// virtual addresses), but randomized placement exercises the address
/// mapper against arbitrary layouts. The seeded variant reproduces a
/// layout exactly.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum FrameAllocStrategy {
    /// Random placement, non-deterministic.
    #[default]
    Unseeded,

    /// Random placement from a seeded RNG, deterministic.
    Seeded {
        /// The seed the RNG is initialized with.
        seed: u64,
    },

    /// Lowest free frame first.
    Sequential,
}

impl FrameAllocStrategy {
    fn allocator(self) -> FrameAllocator {
        match self {
            FrameAllocStrategy::Unseeded => {
                FrameAllocator::Random(Box::new(StdRng::from_entropy()))
            }
            FrameAllocStrategy::Seeded { seed } => {
                FrameAllocator::Random(Box::new(StdRng::seed_from_u64(seed)))
            }
            FrameAllocStrategy::Sequential => FrameAllocator::Sequential,
        }
    }
}

#[derive(Debug)]
enum FrameAllocator {
    Random(Box<StdRng>),
    Sequential,
}

/// The machine memory: [`MEM_SIZE`] words in [`FRAME_COUNT`] frames of
/// [`PAGE_SIZE`] words each.
///
/// Frames carry an allocation bit and a lock bit. A locked frame is
/// never handed out by [`Mem::alloc_frame`]; the lock pins frames that
/// must survive as long as their owner (page-table frames).
///
/// Word access is by real address and is not checked here: callers
/// validate addresses through the page-table mapper first.
#[derive(Debug)]
pub struct Mem {
    data: [Word; MEM_SIZE],
    allocated: [bool; FRAME_COUNT],
    locked: [bool; FRAME_COUNT],
    alloc: FrameAllocator,
}

impl Mem {
    /// Creates a cleared memory with no frames allocated.
    pub fn new(strategy: FrameAllocStrategy) -> Self {
        Mem {
            data: [Word::BLANK; MEM_SIZE],
            allocated: [false; FRAME_COUNT],
            locked: [false; FRAME_COUNT],
            alloc: strategy.allocator(),
        }
    }

    /// Reads the word at a real address.
    pub fn read(&self, ra: usize) -> Word {
        self.data[ra]
    }

    /// Writes the word at a real address.
    pub fn write(&mut self, ra: usize, word: Word) {
        self.data[ra] = word;
    }

    /// Zeroes every word of a frame.
    pub fn clear_frame(&mut self, frame: usize) {
        for word in &mut self.data[frame * PAGE_SIZE..(frame + 1) * PAGE_SIZE] {
            *word = Word::BLANK;
        }
    }

    /// Pins a frame so the allocator never hands it out.
    pub fn lock_frame(&mut self, frame: usize) {
        self.locked[frame] = true;
    }

    /// Unpins a frame.
    pub fn unlock_frame(&mut self, frame: usize) {
        self.locked[frame] = false;
    }

    /// Whether a frame is locked.
    pub fn is_locked(&self, frame: usize) -> bool {
        self.locked[frame]
    }

    /// Whether a frame is allocated.
    pub fn is_allocated(&self, frame: usize) -> bool {
        self.allocated[frame]
    }

    /// Number of frames neither allocated nor locked.
    pub fn free_frames(&self) -> usize {
        (0..FRAME_COUNT)
            .filter(|&f| !self.allocated[f] && !self.locked[f])
            .count()
    }

    /// Allocates a free frame, or `None` when every frame is allocated
    /// or locked.
    ///
    /// The starting probe position depends on the [`FrameAllocStrategy`];
    /// the frames are then scanned circularly, so allocation fails only
    /// when memory is genuinely exhausted.
    pub fn alloc_frame(&mut self) -> Option<usize> {
        let start = match &mut self.alloc {
            FrameAllocator::Random(rng) => rng.gen_range(0..FRAME_COUNT),
            FrameAllocator::Sequential => 0,
        };
        for i in 0..FRAME_COUNT {
            let frame = (start + i) % FRAME_COUNT;
            if !self.allocated[frame] && !self.locked[frame] {
                self.allocated[frame] = true;
                return Some(frame);
            }
        }
        None
    }

    /// Returns a frame to the free pool: clears its allocation bit, its
    /// contents, and its lock bit.
    pub fn release_frame(&mut self, frame: usize) {
        self.allocated[frame] = false;
        self.clear_frame(frame);
        self.unlock_frame(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::{FrameAllocStrategy, Mem, Word, FRAME_COUNT, PAGE_SIZE};

    #[test]
    fn test_word_text_padding() {
        assert_eq!(Word::from_text("GD10").text(), "GD10");
        assert_eq!(Word::from_text("H").bytes(), b"H   ");
        assert_eq!(Word::from_text("H").text(), "H");
        assert_eq!(Word::from_text("").text(), "");
        assert_eq!(Word::BLANK.text(), "");
    }

    #[test]
    fn test_word_truncates() {
        assert_eq!(Word::from_text("GD100").text(), "GD10");
        assert_eq!(Word::from_chunk(b"HELLO").bytes(), b"HELL");
    }

    #[test]
    fn test_sequential_alloc() {
        let mut mem = Mem::new(FrameAllocStrategy::Sequential);
        assert_eq!(mem.alloc_frame(), Some(0));
        assert_eq!(mem.alloc_frame(), Some(1));
        assert!(mem.is_allocated(0));
        assert!(!mem.is_allocated(2));
    }

    #[test]
    fn test_alloc_skips_locked() {
        let mut mem = Mem::new(FrameAllocStrategy::Sequential);
        mem.lock_frame(0);
        assert_eq!(mem.alloc_frame(), Some(1));
    }

    #[test]
    fn test_alloc_exhaustion() {
        let mut mem = Mem::new(FrameAllocStrategy::Sequential);
        for _ in 0..FRAME_COUNT {
            assert!(mem.alloc_frame().is_some());
        }
        assert_eq!(mem.alloc_frame(), None);
        assert_eq!(mem.free_frames(), 0);
    }

    #[test]
    fn test_seeded_alloc_is_deterministic() {
        let mut a = Mem::new(FrameAllocStrategy::Seeded { seed: 2110 });
        let mut b = Mem::new(FrameAllocStrategy::Seeded { seed: 2110 });
        let frames_a: Vec<_> = (0..FRAME_COUNT).map(|_| a.alloc_frame()).collect();
        let frames_b: Vec<_> = (0..FRAME_COUNT).map(|_| b.alloc_frame()).collect();
        assert_eq!(frames_a, frames_b);
        assert!(frames_a.iter().all(|f| f.is_some()));
    }

    #[test]
    fn test_random_alloc_never_fails_spuriously() {
        let mut mem = Mem::new(FrameAllocStrategy::Seeded { seed: 7 });
        let mut seen = [false; FRAME_COUNT];
        for _ in 0..FRAME_COUNT {
            let f = mem.alloc_frame().unwrap();
            assert!(!seen[f]);
            seen[f] = true;
        }
        assert_eq!(mem.alloc_frame(), None);
    }

    #[test]
    fn test_release_frame() {
        let mut mem = Mem::new(FrameAllocStrategy::Sequential);
        let f = mem.alloc_frame().unwrap();
        mem.lock_frame(f);
        mem.write(f * PAGE_SIZE, Word::from_text("ABCD"));

        mem.release_frame(f);
        assert!(!mem.is_allocated(f));
        assert!(!mem.is_locked(f));
        assert_eq!(mem.read(f * PAGE_SIZE), Word::BLANK);
        assert_eq!(mem.alloc_frame(), Some(f));
    }
}
