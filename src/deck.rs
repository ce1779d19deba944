//! Data model for the input card deck.
//!
//! A batch stream is a sequence of jobs. Each [`Job`] holds the quotas
//! from its `$AMJ` card, its program cards (one instruction per line),
//! and its data cards (arbitrary text consumed by read system calls).

/// The fields of a `$AMJ` control card.
///
/// The card is fixed-column: `$AMJ` followed by three 4-digit decimal
/// fields with no separators.
///
/// ```text
/// $AMJ 0001 0010 0010
///      ~~~~ pid
///           ~~~~ total time limit (instructions)
///                ~~~~ total line limit (output lines)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobCard {
    /// Job identity.
    pub pid: u16,
    /// Total time limit: the number of instructions the job may execute.
    pub ttl: u32,
    /// Total line limit: the number of output lines the job may write.
    pub tll: u32,
}

/// One job from the batch stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Identity and quotas from the `$AMJ` card.
    pub card: JobCard,
    /// Program cards, in order, as they appeared between `$AMJ` and `$DTA`.
    pub program: Vec<String>,
    /// Data cards, verbatim, as they appeared between `$DTA` and `$END`.
    pub data: Vec<String>,
}

impl Job {
    /// Creates a job with no program or data cards.
    pub fn new(card: JobCard) -> Self {
        Job {
            card,
            program: Vec::new(),
            data: Vec::new(),
        }
    }
}
