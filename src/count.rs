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
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::path::PathBuf;

use bstr::io::BufReadExt;
use bstr::ByteSlice;

use crate::rosette::Rosette;
use crate::supervisor::Supervisor;

type E = Box<dyn std::error::Error>;

#[derive(Debug, Clone)]
pub struct MissingFile(PathBuf);

impl std::fmt::Display for MissingFile {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} file not found", self.0.display())
    }
}

impl std::error::Error for MissingFile {}

/// Locations of the external tools.
#[derive(Debug, Clone)]
pub struct ToolPaths {
    pub urqt: String,
    pub bowtie: String,
    pub bowtie2: String,
}

/// Engine settings shared by every sample.
#[derive(Debug, Clone)]
pub struct Settings {
    pub threads: usize,
    /// Records with a mapping quality above this never count. In the bowtie
    /// convention lower is more confident, so the default 255 accepts all.
    pub max_mapq: u32,
    pub bowtie2: bool,
    /// Maximum insert size passed to bowtie2 for paired-end data.
    pub insert_size: u32,
    /// Read length of the small-RNA fraction; None disables the split.
    pub sirna_size: Option<usize>,
    /// TE reference sequences, used for the alignment index and the purge.
    pub fasta: Option<PathBuf>,
}

/// Drives the per-sample pipeline: optional quality trim, lazy index build,
/// alignment, and classification of the resulting SAM stream into the
/// [Rosette] counts.
///
/// Samples are processed one at a time; every external step goes through the
/// [Supervisor] with passthrough echoing so the operator sees the tools'
/// progress chatter live.
pub struct Counter {
    rosette: Rosette,
    supervisor: Supervisor,
    tools: ToolPaths,
    settings: Settings,
    /// Alignment index location, built once on first use.
    index: Option<PathBuf>,
}

impl Counter {
    pub fn new(rosette: Rosette, tools: ToolPaths, settings: Settings) -> Self {
        Self {
            rosette,
            supervisor: Supervisor::new(),
            tools,
            settings,
            index: None,
        }
    }

    pub fn rosette(&self) -> &Rosette {
        &self.rosette
    }

    /// Counts a sample from an existing alignment file.
    ///
    /// The file must exist; a missing required input is fatal.
    pub fn from_sam(&mut self, sam: &Path) -> Result<(), E> {
        self.rosette.start_sample();
        if !sam.is_file() {
            return Err(MissingFile(sam.to_path_buf()).into());
        }
        self.count_sam(sam)
    }

    /// Counts a sample from FASTQ reads, aligning them first.
    ///
    /// Paired-end alignment is used when `pair` is given.
    pub fn from_fastq(&mut self, fastq: &Path, pair: Option<&Path>) -> Result<(), E> {
        self.rosette.start_sample();
        let (fastq, pair) = Self::check_inputs(fastq, pair)?;
        let sam = Self::sam_path(&fastq)?;
        self.map_reads(&fastq, pair.as_deref(), &sam)?;
        self.count_sam(&sam)
    }

    /// Counts a sample from raw FASTQ reads, quality trimming them with UrQt
    /// before alignment.
    pub fn from_raw_fastq(&mut self, fastq: &Path, pair: Option<&Path>) -> Result<(), E> {
        self.rosette.start_sample();
        let (fastq, pair) = Self::check_inputs(fastq, pair)?;
        let (fastq, pair) = self.trim(&fastq, pair.as_deref())?;
        let sam = Self::sam_path(&fastq)?;
        self.map_reads(&fastq, pair.as_deref(), &sam)?;
        self.count_sam(&sam)
    }

    /// Purges the rosette against the TE reference when one was supplied,
    /// then writes the count matrix.
    pub fn write(&mut self, out: &Path, sirna_out: Option<&Path>) -> Result<(), E> {
        if let Some(fasta) = self.settings.fasta.clone() {
            self.rosette.purge(&fasta)?;
        }
        self.rosette.write(out, sirna_out)
    }

    fn check_inputs(fastq: &Path, pair: Option<&Path>) -> Result<(PathBuf, Option<PathBuf>), E> {
        if !fastq.is_file() {
            return Err(MissingFile(fastq.to_path_buf()).into());
        }
        if let Some(pair) = pair {
            if !pair.is_file() {
                return Err(MissingFile(pair.to_path_buf()).into());
            }
        }
        Ok((fastq.to_path_buf(), pair.map(Path::to_path_buf)))
    }

    // Deterministic per-sample alignment output under ./alignment/.
    fn sam_path(fastq: &Path) -> Result<PathBuf, E> {
        let dir = Path::new("alignment");
        if !dir.is_dir() {
            std::fs::create_dir(dir)?;
        }
        let stem = fastq.file_stem().ok_or("fastq file has no name")?;
        let sam = dir.join(stem).with_extension("sam");
        println!("{}", sam.display());
        Ok(sam)
    }

    fn qc_path(path: &Path) -> PathBuf {
        let name = match path.file_name() {
            Some(name) => format!("QC_{}", name.to_string_lossy()),
            None => "QC_reads".to_string(),
        };
        path.with_file_name(name)
    }

    fn trim(&mut self, fastq: &Path, pair: Option<&Path>) -> Result<(PathBuf, Option<PathBuf>), E> {
        println!("quality trimming using UrQt");
        let trimmed = Self::qc_path(fastq);
        let mut command = format!(
            "{} --m {} --t 20 --in {} --out {} --v",
            self.tools.urqt,
            self.settings.threads,
            fastq.display(),
            trimmed.display()
        );
        let trimmed_pair = match pair {
            Some(pair) => {
                let trimmed_pair = Self::qc_path(pair);
                command += &format!(
                    " --inpair {} --outpair {}",
                    pair.display(),
                    trimmed_pair.display()
                );
                Some(trimmed_pair)
            }
            None => None,
        };
        let output = self.supervisor.run(&command, true)?;
        if !output.success() {
            log::warn!("UrQt exited with code {}", output.code);
        }
        Ok((trimmed, trimmed_pair))
    }

    // Builds the alignment index from the TE fasta on first use; the index
    // is reused across samples.
    fn ensure_index(&mut self) -> Result<PathBuf, E> {
        if let Some(index) = &self.index {
            return Ok(index.clone());
        }
        println!("building index");
        let Some(fasta) = self.settings.fasta.clone() else {
            return Err("no TE fasta file to build the alignment index from".into());
        };
        if !fasta.is_file() {
            return Err(MissingFile(fasta).into());
        }
        let (builder, suffix) = if self.settings.bowtie2 {
            (format!("{}-build", self.tools.bowtie2), ".index2")
        } else {
            (format!("{}-build", self.tools.bowtie), ".index")
        };
        let index = PathBuf::from(format!("{}{}", fasta.display(), suffix));
        let command = format!("{} -f {} {}", builder, fasta.display(), index.display());
        let output = self.supervisor.run(&command, true)?;
        if !output.success() {
            log::warn!("index build exited with code {}", output.code);
        }
        self.index = Some(index.clone());
        Ok(index)
    }

    fn map_reads(&mut self, fastq: &Path, pair: Option<&Path>, sam: &Path) -> Result<(), E> {
        let index = self.ensure_index()?;
        println!("mapping reads");
        let command = if self.settings.bowtie2 {
            let mut command = format!(
                "{} -p {} --time --very-sensitive -x {}",
                self.tools.bowtie2,
                self.settings.threads,
                index.display()
            );
            match pair {
                Some(pair) => {
                    command += &format!(
                        " --dovetail -X {} -1 {} -2 {}",
                        self.settings.insert_size,
                        fastq.display(),
                        pair.display()
                    );
                }
                None => command += &format!(" -U {}", fastq.display()),
            }
            command += &format!(" -S {}", sam.display());
            command
        } else {
            format!(
                "{} -S -p {} --time --chunkmbs 200 --best {} {} {}",
                self.tools.bowtie,
                self.settings.threads,
                index.display(),
                fastq.display(),
                sam.display()
            )
        };
        let output = self.supervisor.run(&command, true)?;
        if !output.success() {
            log::warn!("aligner exited with code {}", output.code);
        }
        Ok(())
    }

    // Classifies the alignment stream into the rosette counts.
    //
    // A line counts iff it is not a header line, has more than 4 fields, is
    // mapped, and has a mapping quality at or below the configured maximum.
    fn count_sam(&mut self, sam: &Path) -> Result<(), E> {
        let file = File::open(sam)?;
        let reader = BufReader::new(file);
        for line in reader.byte_lines() {
            let line = line?;
            if line.first() == Some(&b'@') {
                continue;
            }
            let fields: Vec<&[u8]> = line.fields().collect();
            if fields.len() <= 4 {
                continue;
            }
            if fields[2].starts_with(b"*") {
                continue;
            }
            let mapq = match fields[4].to_str().ok().and_then(|mapq| mapq.parse::<u32>().ok()) {
                Some(mapq) => mapq,
                None => {
                    log::warn!(
                        "skipping alignment of {} with unparseable mapping quality",
                        fields[0].to_str_lossy()
                    );
                    continue;
                }
            };
            if mapq > self.settings.max_mapq {
                continue;
            }
            let identifier = fields[2].to_str_lossy();
            match self.settings.sirna_size {
                Some(size) if fields.get(9).map_or(0, |seq| seq.len()) == size => {
                    self.rosette.count_sirna(&identifier, 1)
                }
                _ => self.rosette.count(&identifier, 1),
            }
        }
        Ok(())
    }
}
