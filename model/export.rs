//! Flattening of simulated studies into parallel columns.
//!
//! Hosts that move data across a process or language boundary want flat
//! arrays, not nested records. [`FlatStudy`] holds one row per sample plus
//! one entry per individual, and writes the per-sample table as TSV.

use crate::types::Individual;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Infection time reported for individuals with no infection.
pub const NO_INFECTION_TIME: f64 = -1.0;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to write TSV output: {0}")]
    CsvError(#[from] csv::Error),
}

/// Parallel-column view of a study. Only built by
/// [`FlatStudy::from_individuals`], so the columns always agree in length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatStudy {
    // One entry per sample.
    individual_ids: Vec<usize>,
    sample_times: Vec<f64>,
    pub titres: Vec<f64>,
    // One entry per individual, in study order.
    samples_per_individual: Vec<usize>,
    infection_status: Vec<u8>,
    infection_times: Vec<f64>,
}

#[derive(Serialize)]
struct SampleRow {
    individual_id: usize,
    sample_time: f64,
    titre: f64,
    infected: u8,
    infection_time: f64,
}

impl FlatStudy {
    /// Flattens individuals. Observed individuals without ground truth are
    /// reported as uninfected.
    pub fn from_individuals(individuals: &[Individual]) -> Self {
        let total: usize = individuals.iter().map(Individual::n_samples).sum();
        let mut flat = Self {
            individual_ids: Vec::with_capacity(total),
            sample_times: Vec::with_capacity(total),
            titres: Vec::with_capacity(total),
            samples_per_individual: Vec::with_capacity(individuals.len()),
            infection_status: Vec::with_capacity(individuals.len()),
            infection_times: Vec::with_capacity(individuals.len()),
        };

        for individual in individuals {
            for (time, titre) in individual.observations() {
                flat.individual_ids.push(individual.id);
                flat.sample_times.push(time);
                flat.titres.push(titre);
            }
            flat.samples_per_individual.push(individual.n_samples());
            let truth = individual.truth.filter(|t| t.infected);
            flat.infection_status.push(u8::from(truth.is_some()));
            flat.infection_times.push(
                truth
                    .and_then(|t| t.infection_time)
                    .unwrap_or(NO_INFECTION_TIME),
            );
        }
        flat
    }

    pub fn total_samples(&self) -> usize {
        self.individual_ids.len()
    }

    pub fn n_individuals(&self) -> usize {
        self.infection_status.len()
    }

    pub fn n_infected(&self) -> usize {
        self.infection_status.iter().filter(|&&s| s == 1).count()
    }

    /// Writes one tab-separated row per sample with the owning individual's
    /// infection status and time repeated on each row.
    pub fn write_tsv<W: Write>(&self, writer: W) -> Result<(), ExportError> {
        let mut out = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(writer);

        let mut samples = self
            .individual_ids
            .iter()
            .zip(&self.sample_times)
            .zip(&self.titres);
        let people = self
            .samples_per_individual
            .iter()
            .zip(&self.infection_status)
            .zip(&self.infection_times);
        for ((&count, &infected), &infection_time) in people {
            for ((&individual_id, &sample_time), &titre) in samples.by_ref().take(count) {
                out.serialize(SampleRow {
                    individual_id,
                    sample_time,
                    titre,
                    infected,
                    infection_time,
                })?;
            }
        }
        out.flush()?;
        Ok(())
    }

    pub fn save_tsv(&self, path: impl AsRef<Path>) -> Result<(), ExportError> {
        self.write_tsv(File::create(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GroundTruth;
    use ndarray::array;

    fn two_people() -> Vec<Individual> {
        vec![
            Individual {
                id: 1,
                sample_times: array![0.0, 10.0],
                titres: array![2.0, 4.5],
                truth: Some(GroundTruth {
                    infected: true,
                    infection_time: Some(5.0),
                    baseline: 2.0,
                }),
            },
            Individual {
                id: 2,
                sample_times: array![0.0, 10.0],
                titres: array![1.8, 1.9],
                truth: Some(GroundTruth {
                    infected: false,
                    infection_time: None,
                    baseline: 1.85,
                }),
            },
        ]
    }

    #[test]
    fn flattens_into_parallel_columns() {
        let flat = FlatStudy::from_individuals(&two_people());
        assert_eq!(flat.total_samples(), 4);
        assert_eq!(flat.n_individuals(), 2);
        assert_eq!(flat.individual_ids, vec![1, 1, 2, 2]);
        assert_eq!(flat.titres, vec![2.0, 4.5, 1.8, 1.9]);
        assert_eq!(flat.samples_per_individual, vec![2, 2]);
        assert_eq!(flat.infection_status, vec![1, 0]);
        assert_eq!(flat.infection_times, vec![5.0, NO_INFECTION_TIME]);
        assert_eq!(flat.n_infected(), 1);
    }

    #[test]
    fn observed_individuals_export_as_uninfected() {
        let people = vec![Individual::observed(7, array![1.0], array![3.0])];
        let flat = FlatStudy::from_individuals(&people);
        assert_eq!(flat.infection_status, vec![0]);
        assert_eq!(flat.infection_times, vec![NO_INFECTION_TIME]);
    }

    #[test]
    fn tsv_has_header_and_one_row_per_sample() {
        let flat = FlatStudy::from_individuals(&two_people());
        let mut buffer = Vec::new();
        flat.write_tsv(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "individual_id\tsample_time\ttitre\tinfected\tinfection_time"
        );
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[1], "1\t0.0\t2.0\t1\t5.0");
        assert_eq!(lines[4], "2\t10.0\t1.9\t0\t-1.0");
    }

    #[test]
    fn individuals_without_samples_keep_columns_aligned() {
        let mut people = two_people();
        people.insert(1, Individual::observed(9, array![], array![]));
        let flat = FlatStudy::from_individuals(&people);
        assert_eq!(flat.samples_per_individual, vec![2, 0, 2]);

        let mut buffer = Vec::new();
        flat.write_tsv(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let last = text.lines().last().unwrap();
        assert_eq!(last, "2\t10.0\t1.9\t0\t-1.0");
    }

    #[test]
    fn short_sample_columns_do_not_panic() {
        let mut flat = FlatStudy::from_individuals(&two_people());
        flat.titres.truncate(3);
        flat.infection_times.truncate(1);

        let mut buffer = Vec::new();
        flat.write_tsv(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        // Header plus the rows every column can fill.
        assert_eq!(text.lines().count(), 3);
    }
}
