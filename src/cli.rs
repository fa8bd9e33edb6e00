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
use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(version)]
pub struct Cli {
    // RNA fastq file(s), one per sample
    #[arg(long = "rna", value_name = "FASTQ", num_args = 0..)]
    pub fastq_files: Vec<PathBuf>,

    // Second mates for paired-end data, parallel to --rna
    #[arg(long = "rna-pair", value_name = "FASTQ", num_args = 0..)]
    pub fastq_pair_files: Vec<PathBuf>,

    // Pre-computed alignment file(s), one per sample
    #[arg(long = "sam", value_name = "SAM", num_args = 0..)]
    pub sam_files: Vec<PathBuf>,

    // Insert size for paired-end data
    #[arg(long = "insert", default_value_t = 500)]
    pub insert_size: u32,

    // TE sequence fasta file
    #[arg(long = "te-fasta", value_name = "FASTA")]
    pub fasta_file: Option<PathBuf>,

    // Use bowtie2 instead of bowtie
    #[arg(long = "bowtie2", default_value_t = false)]
    pub bowtie2: bool,

    // Maximal mapping quality (from 0 to 255, 0 the best)
    #[arg(long = "mapq", default_value_t = 255)]
    pub mapq: u32,

    // Quality trim the fastq files with UrQt before aligning
    #[arg(long = "qc", default_value_t = false)]
    pub quality_control: bool,

    // Rosette file with the TE annotation
    #[arg(long = "rosette", required = true)]
    pub rosette_file: PathBuf,

    // Rosette column to group the counts on (1-based)
    #[arg(long = "column", default_value_t = 2)]
    pub count_column: i64,

    // Output count file
    #[arg(long = "count", required = true)]
    pub count_file: PathBuf,

    // Output siRNA count file; enables the small-RNA split, which stores
    // siRNA-sized reads apart from the other sizes
    #[arg(long = "sirna")]
    pub count_sirna_file: Option<PathBuf>,

    // siRNA read length
    #[arg(long = "sirna-size", default_value_t = 21)]
    pub sirna_size: usize,

    // Number of threads passed to the external tools
    #[arg(long = "thread", default_value_t = 3)]
    pub threads: usize,

    // External tool locations
    #[arg(long = "urqt", default_value = "UrQt")]
    pub urqt: String,

    #[arg(long = "bowtie-path", default_value = "bowtie")]
    pub bowtie: String,

    #[arg(long = "bowtie2-path", default_value = "bowtie2")]
    pub bowtie2_path: String,

    // Verbosity
    #[arg(long = "verbose", default_value_t = false)]
    pub verbose: bool,
}
