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
use std::path::Path;

use clap::Parser;

use tecount::count::Counter;
use tecount::count::Settings;
use tecount::count::ToolPaths;
use tecount::rosette::Rosette;

mod cli;

type E = Box<dyn std::error::Error>;

/// Initializes the logger with verbosity given in `log_max_level`.
fn init_log(log_max_level: usize) {
    stderrlog::new()
    .module(module_path!())
    .quiet(false)
    .verbosity(log_max_level)
    .timestamp(stderrlog::Timestamp::Off)
    .init()
    .unwrap();
}

fn main() {
    let args = cli::Cli::parse();
    init_log(if args.verbose { 2 } else { 1 });

    if let Err(err) = run(&args) {
        log::error!("{}", err);
        std::process::exit(1);
    }
}

fn run(args: &cli::Cli) -> Result<(), E> {
    let n_fastq = args.fastq_files.len();
    let n_sam = args.sam_files.len();
    if n_fastq > 0 && n_sam > 0 && n_sam < n_fastq {
        return Err(format!(
            "the number of sam files ({}) must not be less than the number of fastq files ({})",
            n_sam, n_fastq
        )
        .into());
    }
    let sample_count = n_sam.max(n_fastq);
    if sample_count == 0 {
        return Err("need at least one sample to count something".into());
    }

    let sirna = args.count_sirna_file.is_some();

    println!("loading rosette file...");
    let rosette = Rosette::from_path(&args.rosette_file, args.count_column, sample_count, sirna)?;

    let tools = ToolPaths {
        urqt: args.urqt.clone(),
        bowtie: args.bowtie.clone(),
        bowtie2: args.bowtie2_path.clone(),
    };
    let settings = Settings {
        threads: args.threads,
        max_mapq: args.mapq,
        bowtie2: args.bowtie2,
        insert_size: args.insert_size,
        sirna_size: if sirna { Some(args.sirna_size) } else { None },
        fasta: args.fasta_file.clone(),
    };
    let mut counter = Counter::new(rosette, tools, settings);

    for sample in 0..sample_count {
        // A declared sam file that exists on disk strictly wins over the
        // fastq path for the same sample.
        let declared_sam = args.sam_files.get(sample);
        if let Some(sam) = declared_sam {
            if sam.is_file() {
                println!("counting {}...", sam.display());
                counter.from_sam(sam)?;
                continue;
            }
        }

        let fastq = match args.fastq_files.get(sample) {
            Some(fastq) => fastq,
            None => match declared_sam {
                Some(sam) => return Err(format!("{} file not found", sam.display()).into()),
                None => return Err(format!("no input for sample {}", sample).into()),
            },
        };
        if let Some(sam) = declared_sam {
            log::warn!(
                "{} file not found, aligning {} instead",
                sam.display(),
                fastq.display()
            );
        }

        let pair: Option<&Path> = if args.fastq_pair_files.len() == args.fastq_files.len() {
            args.fastq_pair_files.get(sample).map(|pair| pair.as_path())
        } else {
            None
        };

        println!("counting {}...", fastq.display());
        if let Some(pair) = pair {
            println!("counting {}...", pair.display());
        }
        if args.quality_control && !sirna {
            counter.from_raw_fastq(fastq, pair)?;
        } else {
            counter.from_fastq(fastq, pair)?;
        }
    }

    counter.write(&args.count_file, args.count_sirna_file.as_deref())?;
    Ok(())
}
