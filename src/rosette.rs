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
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;

use bstr::io::BufReadExt;
use bstr::ByteSlice;
use indexmap::IndexMap;

use crate::intern::InternTable;

type E = Box<dyn std::error::Error>;

/// One distinct value of the grouping column.
///
/// Holds the first-seen key vector of the rows that share this value, the
/// per-sample count slots, and the lifetime total. The lifetime total is
/// never reset, so it always equals the sum of every contribution counted
/// against this variable regardless of how many samples have been started.
#[derive(Debug, Clone)]
struct GroupVariable {
    /// Interned keys of the first row seen with this grouping value, one per
    /// annotation column.
    keys: Vec<usize>,
    counts: Vec<u64>,
    total: u64,
    sirna_counts: Vec<u64>,
    sirna_total: u64,
    valid: bool,
}

/// The rosette: annotation-driven count aggregation across samples.
///
/// Loads a whitespace-delimited annotation (rosette) file where column 1 is
/// a unique TE copy identifier and one configured column is the grouping
/// attribute (typically the family name). Counts are aggregated per distinct
/// grouping value, with one slot per sample plus a lifetime total.
///
/// Each column gets its own [InternTable]; rows are stored as key vectors,
/// which keeps the highly redundant annotation columns compact.
pub struct Rosette {
    column_count: usize,
    /// 0-based index of the grouping column.
    group_column: usize,
    sample_count: usize,
    current_sample: Option<usize>,
    sirna: bool,
    purged: bool,
    columns: Vec<InternTable>,
    /// TE copy identifier to the key vector of its (last seen) row.
    identifiers: HashMap<String, Vec<usize>>,
    /// Grouping-column key to its variable, in first-seen order.
    groups: IndexMap<usize, GroupVariable>,
}

impl Rosette {
    /// Loads a rosette file.
    ///
    /// The first line fixes the column count; every line, the first
    /// included, is a record. Records with a mismatched column count are
    /// logged and processed with the values present, missing trailing
    /// columns defaulting to empty. Duplicate identifiers overwrite the
    /// stored key vector; the attributes reported for a grouping variable
    /// come from its first-seen row.
    ///
    /// `group_column` is 1-based; an out-of-range value is coerced to
    /// column 1 with a warning.
    pub fn from_path(
        path: &Path,
        group_column: i64,
        sample_count: usize,
        sirna: bool,
    ) -> Result<Self, E> {
        let mut group_column = group_column;
        if group_column <= 0 {
            log::warn!(
                "grouping column {} is out of range, counting on column 1",
                group_column
            );
            group_column = 1;
        }

        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let mut rosette: Option<Self> = None;
        for (idx, line) in reader.byte_lines().enumerate() {
            let line = line?;
            let fields: Vec<String> = line
                .fields()
                .map(|field| field.to_str_lossy().into_owned())
                .collect();
            if fields.is_empty() {
                log::warn!("skipping empty line {} in {}", idx + 1, path.display());
                continue;
            }

            if rosette.is_none() {
                let column_count = fields.len();
                let mut group = group_column as usize;
                if group > column_count {
                    log::warn!(
                        "grouping column {} is out of range for {} columns, counting on column 1",
                        group,
                        column_count
                    );
                    group = 1;
                }
                rosette = Some(Self {
                    column_count,
                    group_column: group - 1,
                    sample_count,
                    current_sample: None,
                    sirna,
                    purged: false,
                    columns: vec![InternTable::new(); column_count],
                    identifiers: HashMap::new(),
                    groups: IndexMap::new(),
                });
            }

            if let Some(table) = rosette.as_mut() {
                table.add_row(&fields, idx + 1);
            }
        }

        match rosette {
            Some(table) => Ok(table),
            None => Err(format!("{}: rosette file is empty", path.display()).into()),
        }
    }

    fn add_row(&mut self, fields: &[String], line_no: usize) {
        if fields.len() != self.column_count {
            log::warn!(
                "line {} has {} columns, expected {}",
                line_no,
                fields.len(),
                self.column_count
            );
        }
        let empty = String::new();
        let field = |idx: usize| fields.get(idx).unwrap_or(&empty).as_str();

        // Grouping value first so group keys follow first-seen row order.
        let group_key = self.columns[self.group_column].add(field(self.group_column));
        let mut keys: Vec<usize> = vec![0; self.column_count];
        keys[self.group_column] = group_key;
        for idx in 0..self.column_count {
            if idx != self.group_column {
                keys[idx] = self.columns[idx].add(field(idx));
            }
        }

        self.identifiers.insert(field(0).to_string(), keys.clone());

        let sample_count = self.sample_count;
        self.groups.entry(group_key).or_insert_with(|| GroupVariable {
            keys,
            counts: vec![0; sample_count],
            total: 0,
            sirna_counts: vec![0; sample_count],
            sirna_total: 0,
            valid: false,
        });
    }

    /// Advances to the next sample and zeroes its count slot for every
    /// grouping variable. Lifetime totals and the slots of earlier samples
    /// are untouched.
    ///
    /// Must be called once per sample, before counting it, and at most
    /// `sample_count` times.
    pub fn start_sample(&mut self) {
        let next = self.current_sample.map_or(0, |current| current + 1);
        self.current_sample = Some(next);
        for variable in self.groups.values_mut() {
            variable.counts[next] = 0;
            if self.sirna {
                variable.sirna_counts[next] = 0;
            }
        }
    }

    fn bump(&mut self, identifier: &str, amount: u64, sirna: bool) {
        let Some(current) = self.current_sample else {
            log::warn!("counted {} before any sample was started", identifier);
            return;
        };
        let Some(keys) = self.identifiers.get(identifier) else {
            log::warn!("{} not found in the rosette file", identifier);
            return;
        };
        let group_key = keys[self.group_column];
        if let Some(variable) = self.groups.get_mut(&group_key) {
            if sirna {
                variable.sirna_counts[current] += amount;
                variable.sirna_total += amount;
            } else {
                variable.counts[current] += amount;
                variable.total += amount;
            }
        }
    }

    /// Adds `amount` reads to the grouping variable `identifier` belongs to,
    /// in the current sample's slot and the lifetime total.
    ///
    /// Unknown identifiers are logged and discarded; misassembled alignment
    /// references are expected in real data.
    pub fn count(&mut self, identifier: &str, amount: u64) {
        self.bump(identifier, amount, false);
    }

    /// Same as [count](Self::count) but for the small-RNA-sized fraction.
    pub fn count_sirna(&mut self, identifier: &str, amount: u64) {
        self.bump(identifier, amount, true);
    }

    /// Grouping-column value for a TE copy identifier.
    pub fn group_of(&self, identifier: &str) -> Option<&str> {
        let keys = self.identifiers.get(identifier)?;
        self.columns[self.group_column].value(keys[self.group_column]).ok()
    }

    /// Whether the small-RNA split is enabled.
    pub fn sirna(&self) -> bool {
        self.sirna
    }

    /// Per-sample counts and lifetime total for a grouping value.
    pub fn counts_for(&self, group: &str) -> Option<(&[u64], u64)> {
        let key = self.columns[self.group_column].key(group).ok()?;
        let variable = self.groups.get(&key)?;
        Some((&variable.counts, variable.total))
    }

    /// Per-sample small-RNA counts and lifetime total for a grouping value.
    pub fn sirna_counts_for(&self, group: &str) -> Option<(&[u64], u64)> {
        let key = self.columns[self.group_column].key(group).ok()?;
        let variable = self.groups.get(&key)?;
        Some((&variable.sirna_counts, variable.sirna_total))
    }

    /// Marks grouping variables valid iff at least one sequence record in
    /// `fasta_path` resolves to them through the identifier relation.
    ///
    /// Grouping variables whose TE copies never appear in the reference
    /// sequence set stay invalid and are excluded from [write](Self::write).
    pub fn purge(&mut self, fasta_path: &Path) -> Result<(), E> {
        for variable in self.groups.values_mut() {
            variable.valid = false;
        }

        let mut matched: Vec<usize> = Vec::new();
        let mut reader = needletail::parse_fastx_file(fasta_path)?;
        while let Some(record) = reader.next() {
            let record = record?;
            // The identifier is the header's first whitespace-delimited token.
            let Some(token) = record.id().fields().next() else {
                continue;
            };
            let name = token.to_str_lossy();
            if let Some(keys) = self.identifiers.get(name.as_ref()) {
                matched.push(keys[self.group_column]);
            } else {
                log::warn!("{} copy name not found in the rosette file", name);
            }
        }

        for key in matched {
            if let Some(variable) = self.groups.get_mut(&key) {
                variable.valid = true;
            }
        }
        self.purged = true;
        Ok(())
    }

    /// Writes the count matrix, one line per valid grouping variable in
    /// first-insertion order.
    ///
    /// Each line holds the grouping value, the other attribute values of the
    /// variable's first-seen row (identifier column excluded, original
    /// column order), the per-sample counts, and the lifetime total, all
    /// space delimited with no header. When `sirna_out` is given a parallel
    /// file is written with the small-RNA counts instead.
    ///
    /// If [purge](Self::purge) has not run, no reference sequence universe
    /// was supplied and every variable is written.
    pub fn write(&self, out_path: &Path, sirna_out: Option<&Path>) -> Result<(), E> {
        let mut out = BufWriter::new(File::create(out_path)?);
        let mut sirna_handle = match sirna_out {
            Some(path) => Some(BufWriter::new(File::create(path)?)),
            None => None,
        };

        for (group_key, variable) in self.groups.iter() {
            if self.purged && !variable.valid {
                continue;
            }

            let mut attrs: Vec<String> = Vec::new();
            attrs.push(self.columns[self.group_column].value(*group_key)?.to_string());
            for (idx, key) in variable.keys.iter().enumerate() {
                if idx == 0 || idx == self.group_column {
                    continue;
                }
                attrs.push(self.columns[idx].value(*key)?.to_string());
            }

            let mut line = attrs.clone();
            for count in &variable.counts {
                line.push(count.to_string());
            }
            line.push(variable.total.to_string());
            writeln!(out, "{}", line.join(" "))?;

            if let Some(handle) = sirna_handle.as_mut() {
                let mut line = attrs;
                for count in &variable.sirna_counts {
                    line.push(count.to_string());
                }
                line.push(variable.sirna_total.to_string());
                writeln!(handle, "{}", line.join(" "))?;
            }
        }

        out.flush()?;
        if let Some(handle) = sirna_handle.as_mut() {
            handle.flush()?;
        }
        Ok(())
    }
}

// Tests
#[cfg(test)]
mod tests {
    use std::io::Write;

    fn write_rosette(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn load_groups_rows_by_column_value() {
        use super::Rosette;

        let file = write_rosette(
            "L1_copy1 LINE1 LINE active\n\
             L1_copy2 LINE1 LINE active\n\
             B1_copy1 SINE1 SINE active\n",
        );
        let rosette = Rosette::from_path(file.path(), 2, 1, false).unwrap();

        assert_eq!(rosette.column_count, 4);
        assert_eq!(rosette.groups.len(), 2);
        assert_eq!(rosette.group_of("L1_copy2").unwrap(), "LINE1");
        assert_eq!(rosette.group_of("B1_copy1").unwrap(), "SINE1");
        assert!(rosette.group_of("unknown").is_none());
    }

    #[test]
    fn short_rows_are_padded_with_defaults() {
        use super::Rosette;

        let file = write_rosette(
            "L1_copy1 LINE1 LINE\n\
             L1_copy2 LINE1\n",
        );
        let rosette = Rosette::from_path(file.path(), 2, 1, false).unwrap();

        assert_eq!(rosette.group_of("L1_copy2").unwrap(), "LINE1");
        assert_eq!(rosette.identifiers["L1_copy2"].len(), 3);
    }

    #[test]
    fn out_of_range_column_is_coerced_to_first() {
        use super::Rosette;

        let file = write_rosette("L1_copy1 LINE1\nB1_copy1 SINE1\n");

        let rosette = Rosette::from_path(file.path(), 0, 1, false).unwrap();
        assert_eq!(rosette.group_column, 0);
        assert_eq!(rosette.group_of("L1_copy1").unwrap(), "L1_copy1");

        let rosette = Rosette::from_path(file.path(), 7, 1, false).unwrap();
        assert_eq!(rosette.group_column, 0);
    }

    #[test]
    fn lifetime_total_survives_sample_resets() {
        use super::Rosette;

        let file = write_rosette(
            "L1_copy1 LINE1\n\
             L1_copy2 LINE1\n\
             B1_copy1 SINE1\n",
        );
        let mut rosette = Rosette::from_path(file.path(), 2, 3, false).unwrap();

        rosette.start_sample();
        rosette.count("L1_copy1", 3);
        rosette.count("L1_copy2", 2);

        rosette.start_sample();
        rosette.count("L1_copy1", 1);

        rosette.start_sample();

        let (counts, total) = rosette.counts_for("LINE1").unwrap();
        assert_eq!(counts, &[5, 1, 0]);
        assert_eq!(total, 6);

        let (counts, total) = rosette.counts_for("SINE1").unwrap();
        assert_eq!(counts, &[0, 0, 0]);
        assert_eq!(total, 0);
    }

    #[test]
    fn start_sample_only_touches_the_new_slot() {
        use super::Rosette;

        let file = write_rosette("L1_copy1 LINE1\n");
        let mut rosette = Rosette::from_path(file.path(), 2, 2, false).unwrap();

        rosette.start_sample();
        rosette.count("L1_copy1", 4);
        rosette.start_sample();

        let (counts, total) = rosette.counts_for("LINE1").unwrap();
        assert_eq!(counts, &[4, 0]);
        assert_eq!(total, 4);
    }

    #[test]
    fn unknown_identifiers_are_discarded() {
        use super::Rosette;

        let file = write_rosette("L1_copy1 LINE1\n");
        let mut rosette = Rosette::from_path(file.path(), 2, 1, false).unwrap();

        rosette.start_sample();
        rosette.count("no_such_copy", 1);

        let (_, total) = rosette.counts_for("LINE1").unwrap();
        assert_eq!(total, 0);
    }

    #[test]
    fn counting_before_start_sample_is_discarded() {
        use super::Rosette;

        let file = write_rosette("L1_copy1 LINE1\n");
        let mut rosette = Rosette::from_path(file.path(), 2, 1, false).unwrap();

        rosette.count("L1_copy1", 1);

        let (_, total) = rosette.counts_for("LINE1").unwrap();
        assert_eq!(total, 0);
    }

    #[test]
    fn sirna_counts_are_kept_apart() {
        use super::Rosette;

        let file = write_rosette("L1_copy1 LINE1\n");
        let mut rosette = Rosette::from_path(file.path(), 2, 1, true).unwrap();

        rosette.start_sample();
        rosette.count("L1_copy1", 2);
        rosette.count_sirna("L1_copy1", 5);

        let (counts, total) = rosette.counts_for("LINE1").unwrap();
        assert_eq!(counts, &[2]);
        assert_eq!(total, 2);

        let (counts, total) = rosette.sirna_counts_for("LINE1").unwrap();
        assert_eq!(counts, &[5]);
        assert_eq!(total, 5);
    }

    #[test]
    fn purge_validates_from_fasta_headers() {
        use super::Rosette;

        let file = write_rosette(
            "L1_copy1 LINE1\n\
             L1_copy2 LINE1\n\
             B1_copy1 SINE1\n",
        );
        let mut rosette = Rosette::from_path(file.path(), 2, 1, false).unwrap();

        let mut fasta = tempfile::NamedTempFile::with_suffix(".fasta").unwrap();
        fasta
            .write_all(b">L1_copy2 some description\nACGTACGT\n")
            .unwrap();
        fasta.flush().unwrap();

        rosette.purge(fasta.path()).unwrap();

        assert!(rosette.purged);
        let line1 = rosette.columns[1].key("LINE1").unwrap();
        let sine1 = rosette.columns[1].key("SINE1").unwrap();
        assert!(rosette.groups[&line1].valid);
        assert!(!rosette.groups[&sine1].valid);
    }

    #[test]
    fn write_emits_valid_variables_in_first_insertion_order() {
        use super::Rosette;

        // The scenario: three LINE1 copies, one SINE1 copy, reference
        // containing a single LINE1 copy, two samples.
        let file = write_rosette(
            "L1_copy1 LINE1 LINE\n\
             L1_copy2 LINE1 LINE\n\
             L1_copy3 LINE1 LINE\n\
             B1_copy1 SINE1 SINE\n",
        );
        let mut rosette = Rosette::from_path(file.path(), 2, 2, false).unwrap();

        rosette.start_sample();
        for _ in 0..5 {
            rosette.count("L1_copy1", 1);
        }
        rosette.start_sample();
        rosette.count("B1_copy1", 3);

        let mut fasta = tempfile::NamedTempFile::with_suffix(".fasta").unwrap();
        fasta.write_all(b">L1_copy1\nACGT\n").unwrap();
        fasta.flush().unwrap();
        rosette.purge(fasta.path()).unwrap();

        let out = tempfile::NamedTempFile::new().unwrap();
        rosette.write(out.path(), None).unwrap();

        let written = std::fs::read_to_string(out.path()).unwrap();
        assert_eq!(written, "LINE1 LINE 5 0 5\n");
    }

    #[test]
    fn write_without_purge_keeps_every_variable() {
        use super::Rosette;

        let file = write_rosette(
            "L1_copy1 LINE1\n\
             B1_copy1 SINE1\n",
        );
        let mut rosette = Rosette::from_path(file.path(), 2, 1, false).unwrap();
        rosette.start_sample();
        rosette.count("B1_copy1", 2);

        let out = tempfile::NamedTempFile::new().unwrap();
        rosette.write(out.path(), None).unwrap();

        let written = std::fs::read_to_string(out.path()).unwrap();
        assert_eq!(written, "LINE1 0 0\nSINE1 2 2\n");
    }

    #[test]
    fn write_emits_parallel_sirna_file() {
        use super::Rosette;

        let file = write_rosette("L1_copy1 LINE1 LINE\n");
        let mut rosette = Rosette::from_path(file.path(), 2, 1, true).unwrap();

        rosette.start_sample();
        rosette.count("L1_copy1", 2);
        rosette.count_sirna("L1_copy1", 7);

        let out = tempfile::NamedTempFile::new().unwrap();
        let sirna_out = tempfile::NamedTempFile::new().unwrap();
        rosette.write(out.path(), Some(sirna_out.path())).unwrap();

        assert_eq!(std::fs::read_to_string(out.path()).unwrap(), "LINE1 LINE 2 2\n");
        assert_eq!(
            std::fs::read_to_string(sirna_out.path()).unwrap(),
            "LINE1 LINE 7 7\n"
        );
    }
}
