//! A multiprogramming OS (MOS) batch simulator.
//!
//! Jobs arrive as text "cards" in a batch stream: a `$AMJ` control card
//! opens a job and carries its identity and quotas, program cards follow,
//! `$DTA` switches to data cards, and `$END` closes the job. The simulator
//! loads each job into a paged memory, then interleaves the jobs on a
//! simulated CPU under a round-robin quantum, servicing system calls for
//! line-oriented I/O and terminating each job with a reason code.
//!
//! # Usage
//!
//! A batch is parsed into jobs, loaded into a [`System`], and run:
//!
//! ```
//! use mos_sim::parse::parse_deck;
//! use mos_sim::sim::io::BufferedOutput;
//! use mos_sim::sim::{SimOutput, System};
//!
//! let deck = "\
//! $AMJ000100100010
//! GD10
//! PD10
//! H
//! $DTA
//! HELLO
//! $END
//! ";
//! let jobs = parse_deck(deck).unwrap();
//!
//! let out = BufferedOutput::new();
//! let mut system = System::new(Default::default(), SimOutput::from(out.clone()));
//! system.load_deck(jobs).unwrap();
//! system.run();
//!
//! let lines = out.lines();
//! assert_eq!(lines[0], "HELL");
//! assert_eq!(lines.last().unwrap(), "TTC: 3, LLC: 1");
//! ```
//!
//! The crate is organized as a pipeline:
//! - [`parse`]: tokenizes and parses the batch stream into [`deck::Job`]s.
//! - [`load`]: lays each job's program image into memory and builds its PCB.
//! - [`sim`]: the machine itself (memory, CPU, interrupts, scheduler).
//!
//! [`System`]: sim::System
#![warn(missing_docs)]

pub mod deck;
pub mod err;
pub mod load;
pub mod parse;
pub mod sim;
