// tecount: Transposable element quantification from sequencing reads.
//
// Copyright 2026 tecount contributors.
//
// Copyrights in this project are retained by contributors. No copyright assignment
// is required to contribute to this project.
//
// Except as otherwise noted (below and/or in individual files), this
// project is licensed under the Apache License, Version 2.0
// <LICENSE-APACHE> or <http://www.apache.org/licenses/LICENSE-2.0> or
// the MIT license, <LICENSE-MIT> or <http://opensource.org/licenses/MIT>,
// at your option.
//

//! tecount is a library and a command-line client for counting sequencing
//! reads that align to transposable elements (TEs), aggregated by an
//! annotation attribute (typically the TE family name) across samples.
//!
//! Input is either raw paired or unpaired sequencing reads or pre-computed
//! SAM alignments; output is a per-family, per-sample count matrix plus
//! lifetime totals, with an optional split between siRNA-sized reads and
//! the other sizes.
//!
//! The pipeline per sample is: optional quality trimming with
//! [UrQt](https://github.com/l-modolo/UrQt), a lazy one-time
//! [bowtie](https://bowtie-bio.sourceforge.net/)/[bowtie2](https://bowtie-bio.sourceforge.net/bowtie2/)
//! index build from the TE reference, alignment, and classification of the
//! resulting alignment records. The external tools are driven as opaque
//! executables; their output is multiplexed to the console while they run.
//!
//! ## Components
//!
//!   - [InternTable](intern::InternTable): bidirectional dense interning of
//!     the redundant annotation columns.
//!   - [Supervisor](supervisor::Supervisor): runs external tools, drains
//!     and multiplexes their output, and kills anything left running on
//!     teardown.
//!   - [Rosette](rosette::Rosette): the annotation table holding per-sample
//!     and lifetime counts keyed by the grouping column.
//!   - [Counter](count::Counter): the per-sample pipeline driver feeding
//!     classified alignment records into the rosette.

pub mod count;
pub mod intern;
pub mod rosette;
pub mod supervisor;
