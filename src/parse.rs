//! Parsing the batch input stream into jobs.
//!
//! The stream is tokenized one card (line) at a time by the [`Card`]
//! lexer. Control cards are recognized by their prefix at column 0;
//! every other non-empty line is a raw [`Card::Text`] card whose meaning
//! depends on where it appears in the deck. [`parse_deck`] runs the
//! lexer and folds the cards into a sequence of [`Job`]s.

use logos::{Lexer, Logos};

use crate::deck::{Job, JobCard};

/// A unit of information in the batch stream: one card per input line.
#[derive(Debug, Logos, PartialEq, Eq, Clone)]
#[logos(skip r"[\r\n]+", error = LexErr)]
pub enum Card {
    /// A `$AMJ` card opening a job, with its identity and quota fields.
    #[regex(r"\$AMJ[^\r\n]*", lex_job_card, priority = 4)]
    Begin(JobCard),

    /// A `$DTA` card ending program text and starting the data section.
    #[regex(r"\$DTA[^\r\n]*", priority = 4)]
    Data,

    /// A `$END` card closing the current job.
    #[regex(r"\$END[^\r\n]*", priority = 4)]
    End,

    /// Any other non-empty line: program text or a data card.
    #[regex(r"[^\r\n]+", |lx| lx.slice().to_string(), priority = 1)]
    Text(String),
}

/// Errors raised while tokenizing the batch stream.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum LexErr {
    /// A `$AMJ` card is shorter than its three 4-digit fields require.
    TruncatedJobCard,
    /// A `$AMJ` field contains a non-decimal character.
    BadJobField,
    /// A card could not be recognized at all.
    #[default]
    UnrecognizedCard,
}

impl std::fmt::Display for LexErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LexErr::TruncatedJobCard => f.write_str("job card is missing quota fields"),
            LexErr::BadJobField => f.write_str("job card field is not a decimal number"),
            LexErr::UnrecognizedCard => f.write_str("unrecognized card"),
        }
    }
}
impl std::error::Error for LexErr {}
impl crate::err::Error for LexErr {
    fn help(&self) -> Option<std::borrow::Cow<'_, str>> {
        match self {
            LexErr::TruncatedJobCard => {
                Some("a job card has the form $AMJ<pid:4><ttl:4><tll:4>".into())
            }
            LexErr::BadJobField => Some("each field is a zero-padded decimal integer".into()),
            LexErr::UnrecognizedCard => None,
        }
    }
}

fn lex_field(bytes: &[u8]) -> Result<u32, LexErr> {
    if !bytes.iter().all(|b| b.is_ascii_digit()) {
        return Err(LexErr::BadJobField);
    }
    Ok(bytes
        .iter()
        .fold(0u32, |acc, b| acc * 10 + u32::from(b - b'0')))
}

fn lex_job_card(lx: &Lexer<'_, Card>) -> Result<JobCard, LexErr> {
    // Fields sit immediately after the prefix; trailing characters past
    // the third field are ignored.
    let fields = &lx.slice().as_bytes()[4..];
    if fields.len() < 12 {
        return Err(LexErr::TruncatedJobCard);
    }
    Ok(JobCard {
        pid: lex_field(&fields[0..4])? as u16,
        ttl: lex_field(&fields[4..8])?,
        tll: lex_field(&fields[8..12])?,
    })
}

/// Kinds of errors that can occur from parsing a batch stream.
///
/// See [`ParseErr`] for this error type with line information included.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ParseErrKind {
    /// A card failed to tokenize.
    Lex(LexErr),
    /// A `$AMJ` card appeared while the named job was still open.
    JobAlreadyOpen(u16),
    /// The stream ended while the named job was still open.
    UnterminatedJob(u16),
}

impl std::fmt::Display for ParseErrKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseErrKind::Lex(e) => e.fmt(f),
            ParseErrKind::JobAlreadyOpen(pid) => {
                write!(f, "new job begins while job {pid} is still open")
            }
            ParseErrKind::UnterminatedJob(pid) => {
                write!(f, "input ended while job {pid} is still open")
            }
        }
    }
}

/// Error from parsing a batch stream.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ParseErr {
    /// What went wrong.
    pub kind: ParseErrKind,
    /// The 1-based input line the error occurred on.
    pub line: usize,
}

impl ParseErr {
    fn new(kind: ParseErrKind, line: usize) -> Self {
        ParseErr { kind, line }
    }
}
impl std::fmt::Display for ParseErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.kind.fmt(f)
    }
}
impl std::error::Error for ParseErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ParseErrKind::Lex(e) => Some(e),
            _ => None,
        }
    }
}
impl crate::err::Error for ParseErr {
    fn line(&self) -> Option<usize> {
        Some(self.line)
    }

    fn help(&self) -> Option<std::borrow::Cow<'_, str>> {
        match &self.kind {
            ParseErrKind::Lex(e) => crate::err::Error::help(e),
            ParseErrKind::JobAlreadyOpen(_) => {
                Some("close the previous job with a $END card first".into())
            }
            ParseErrKind::UnterminatedJob(_) => {
                Some("add a $END card at the end of the job".into())
            }
        }
    }
}

enum Phase {
    Program,
    Data,
}

/// Parses a batch stream into its jobs, in deck order.
///
/// Cards outside any job, stray `$DTA`/`$END` cards, and blank lines are
/// ignored. A malformed `$AMJ` card, a `$AMJ` inside an open job, or an
/// unterminated job is an error.
pub fn parse_deck(src: &str) -> Result<Vec<Job>, ParseErr> {
    let mut jobs = Vec::new();
    let mut open: Option<(Job, Phase)> = None;
    let mut last_line = 1;

    for (card, span) in Card::lexer(src).spanned() {
        let line = line_of(src, span.start);
        last_line = line;
        let card = card.map_err(|e| ParseErr::new(ParseErrKind::Lex(e), line))?;

        match card {
            Card::Begin(header) => {
                if let Some((job, _)) = &open {
                    return Err(ParseErr::new(
                        ParseErrKind::JobAlreadyOpen(job.card.pid),
                        line,
                    ));
                }
                open = Some((Job::new(header), Phase::Program));
            }
            Card::Data => {
                if let Some((_, phase)) = &mut open {
                    *phase = Phase::Data;
                }
            }
            Card::End => {
                if let Some((job, _)) = open.take() {
                    jobs.push(job);
                }
            }
            Card::Text(text) => match &mut open {
                Some((job, Phase::Program)) => job.program.push(text),
                Some((job, Phase::Data)) => job.data.push(text),
                None => {}
            },
        }
    }

    if let Some((job, _)) = open {
        return Err(ParseErr::new(
            ParseErrKind::UnterminatedJob(job.card.pid),
            last_line,
        ));
    }
    Ok(jobs)
}

fn line_of(src: &str, offset: usize) -> usize {
    src[..offset].bytes().filter(|&b| b == b'\n').count() + 1
}

#[cfg(test)]
mod tests {
    use logos::Logos;

    use super::{parse_deck, Card, LexErr, ParseErrKind};
    use crate::deck::JobCard;

    fn text(s: &str) -> Card {
        Card::Text(s.to_string())
    }

    #[test]
    fn test_control_cards() {
        let mut cards = Card::lexer("$AMJ000100100010\n$DTA\n$END\n");
        assert_eq!(
            cards.next(),
            Some(Ok(Card::Begin(JobCard {
                pid: 1,
                ttl: 10,
                tll: 10
            })))
        );
        assert_eq!(cards.next(), Some(Ok(Card::Data)));
        assert_eq!(cards.next(), Some(Ok(Card::End)));
        assert_eq!(cards.next(), None);
    }

    #[test]
    fn test_job_card_fields() {
        let mut cards = Card::lexer("$AMJ999912345678");
        assert_eq!(
            cards.next(),
            Some(Ok(Card::Begin(JobCard {
                pid: 9999,
                ttl: 1234,
                tll: 5678
            })))
        );

        // Trailing characters past the fields are ignored.
        let mut cards = Card::lexer("$AMJ000200050001 trailing junk");
        assert_eq!(
            cards.next(),
            Some(Ok(Card::Begin(JobCard {
                pid: 2,
                ttl: 5,
                tll: 1
            })))
        );
    }

    #[test]
    fn test_job_card_invalid() {
        assert_eq!(
            Card::lexer("$AMJ0001").next(),
            Some(Err(LexErr::TruncatedJobCard))
        );
        assert_eq!(
            Card::lexer("$AMJ0001ABCD0010").next(),
            Some(Err(LexErr::BadJobField))
        );
        assert_eq!(
            Card::lexer("$AMJ00-100100010").next(),
            Some(Err(LexErr::BadJobField))
        );
    }

    #[test]
    fn test_text_cards() {
        let mut cards = Card::lexer("GD10\nsome data line\n$ not a control card\n");
        assert_eq!(cards.next(), Some(Ok(text("GD10"))));
        assert_eq!(cards.next(), Some(Ok(text("some data line"))));
        assert_eq!(cards.next(), Some(Ok(text("$ not a control card"))));
        assert_eq!(cards.next(), None);
    }

    #[test]
    fn test_crlf_and_blank_lines() {
        let mut cards = Card::lexer("$DTA\r\n\r\nABCD\r\n");
        assert_eq!(cards.next(), Some(Ok(Card::Data)));
        assert_eq!(cards.next(), Some(Ok(text("ABCD"))));
        assert_eq!(cards.next(), None);
    }

    #[test]
    fn test_parse_one_job() {
        let jobs = parse_deck("$AMJ000100100010\nGD10\nPD10\nH\n$DTA\nHELLO\n$END\n").unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].card.pid, 1);
        assert_eq!(jobs[0].program, vec!["GD10", "PD10", "H"]);
        assert_eq!(jobs[0].data, vec!["HELLO"]);
    }

    #[test]
    fn test_parse_two_jobs() {
        let jobs = parse_deck(
            "$AMJ000100100010\nH\n$DTA\n$END\n$AMJ000200100010\nH\n$DTA\nAB\nCD\n$END\n",
        )
        .unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].card.pid, 1);
        assert_eq!(jobs[1].card.pid, 2);
        assert_eq!(jobs[1].data, vec!["AB", "CD"]);
    }

    #[test]
    fn test_parse_stray_cards_ignored() {
        let jobs = parse_deck("stray line\n$END\n$DTA\n$AMJ000100100010\nH\n$DTA\n$END\n").unwrap();
        assert_eq!(jobs.len(), 1);
        assert!(jobs[0].program == vec!["H"]);
    }

    #[test]
    fn test_parse_job_already_open() {
        let err = parse_deck("$AMJ000100100010\n$AMJ000200100010\n").unwrap_err();
        assert_eq!(err.kind, ParseErrKind::JobAlreadyOpen(1));
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_parse_unterminated_job() {
        let err = parse_deck("$AMJ000100100010\nGD10\n").unwrap_err();
        assert_eq!(err.kind, ParseErrKind::UnterminatedJob(1));
    }

    #[test]
    fn test_parse_bad_card_has_line() {
        let err = parse_deck("$AMJ000100100010\nH\n$DTA\n$END\n$AMJ01\n").unwrap_err();
        assert_eq!(err.kind, ParseErrKind::Lex(LexErr::TruncatedJobCard));
        assert_eq!(err.line, 5);
    }
}
