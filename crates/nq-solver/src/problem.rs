//! Problem definition for equilibrium concentration solving.

use crate::error::{SolverError, SolverResult};
use nalgebra::{DMatrix, DVector};

/// Dilute equilibrium problem definition.
///
/// Models a system where a fixed set of monomer strands combines into a
/// catalog of complexes. Column j of the stoichiometry matrix counts how many
/// copies of each strand complex j contains; every strand also appears as a
/// singleton complex of itself. Free energies are dimensionless (kT units)
/// and ordered identically to the columns.
///
/// The value is fully validated at construction and never mutated afterwards.
#[derive(Debug)]
pub struct EquilibriumProblem {
    /// Stoichiometry, strands x complexes
    a: DMatrix<f64>,

    /// Transpose of `a`, materialized once: column i of `at` is row i of `a`,
    /// contiguous in nalgebra's column-major storage. The exponential map
    /// walks columns of `a`; the gradient walks columns of `at`.
    at: DMatrix<f64>,

    /// Standard free energies per complex (kT units)
    g: DVector<f64>,

    /// Target strand mole fractions (strictly positive)
    x0: DVector<f64>,

    /// Thermal energy (kcal/mol)
    kt: f64,

    /// Moles of water per liter of solution
    water_molarity: f64,

    /// Total strand count per complex (column sums of `a`)
    strand_counts: DVector<f64>,

    /// Strands that appear only in their own singleton complex, as
    /// (strand index, singleton column index) pairs. Their multiplier is
    /// fixed in closed form by the initial-guess builder.
    inert: Vec<(usize, usize)>,
}

impl EquilibriumProblem {
    /// Create a new problem with validation.
    ///
    /// `stoichiometry` is row-major: one row per strand, one count per
    /// complex. Every complex must contain at least one strand and every
    /// strand must own a singleton column.
    pub fn new(
        stoichiometry: &[Vec<u32>],
        free_energies: &[f64],
        x0: &[f64],
        kt: f64,
        water_molarity: f64,
    ) -> SolverResult<Self> {
        let m = stoichiometry.len();
        if m == 0 {
            return Err(SolverError::ProblemSetup {
                what: "stoichiometry has no strands".to_string(),
            });
        }
        let n = stoichiometry[0].len();
        for (i, row) in stoichiometry.iter().enumerate() {
            if row.len() != n {
                return Err(SolverError::ProblemSetup {
                    what: format!("stoichiometry row {} has length {}, expected {}", i, row.len(), n),
                });
            }
        }
        if free_energies.len() != n {
            return Err(SolverError::ProblemSetup {
                what: format!(
                    "free energy length mismatch: {} != {}",
                    free_energies.len(),
                    n
                ),
            });
        }
        if x0.len() != m {
            return Err(SolverError::ProblemSetup {
                what: format!("x0 length mismatch: {} != {}", x0.len(), m),
            });
        }
        for (j, &gj) in free_energies.iter().enumerate() {
            if !gj.is_finite() {
                return Err(SolverError::ProblemSetup {
                    what: format!("free energy for complex {} is not finite", j),
                });
            }
        }
        for (i, &c) in x0.iter().enumerate() {
            if !(c.is_finite() && c > 0.0) {
                return Err(SolverError::ProblemSetup {
                    what: format!("x0[{}] = {} must be strictly positive", i, c),
                });
            }
        }
        if !(kt.is_finite() && kt > 0.0) {
            return Err(SolverError::ProblemSetup {
                what: format!("kT = {} must be strictly positive", kt),
            });
        }
        if !(water_molarity.is_finite() && water_molarity > 0.0) {
            return Err(SolverError::ProblemSetup {
                what: format!("water molarity = {} must be strictly positive", water_molarity),
            });
        }

        // Column scan: strand counts, empty complexes, singleton coverage
        let mut strand_counts = DVector::zeros(n);
        let mut has_singleton = vec![false; m];
        for j in 0..n {
            let mut count = 0u32;
            let mut last_row = 0;
            for (i, row) in stoichiometry.iter().enumerate() {
                count += row[j];
                if row[j] > 0 {
                    last_row = i;
                }
            }
            if count == 0 {
                return Err(SolverError::ProblemSetup {
                    what: format!("complex {} contains no strands", j),
                });
            }
            if count == 1 {
                has_singleton[last_row] = true;
            }
            strand_counts[j] = f64::from(count);
        }
        if let Some(i) = has_singleton.iter().position(|&s| !s) {
            return Err(SolverError::ProblemSetup {
                what: format!("strand {} has no singleton complex", i),
            });
        }

        // Row scan: a strand whose row sums to one participates only in its
        // own singleton complex
        let mut inert = Vec::new();
        for (i, row) in stoichiometry.iter().enumerate() {
            let row_sum: u32 = row.iter().sum();
            if row_sum == 1 {
                let j = row
                    .iter()
                    .position(|&c| c > 0)
                    .ok_or_else(|| SolverError::ProblemSetup {
                        what: format!("strand {} appears in no complex", i),
                    })?;
                inert.push((i, j));
            }
        }

        let a = DMatrix::from_fn(m, n, |i, j| f64::from(stoichiometry[i][j]));
        let at = a.transpose();

        Ok(Self {
            a,
            at,
            g: DVector::from_column_slice(free_energies),
            x0: DVector::from_column_slice(x0),
            kt,
            water_molarity,
            strand_counts,
            inert,
        })
    }

    /// Number of monomer strands (rows of the stoichiometry).
    pub fn num_strands(&self) -> usize {
        self.a.nrows()
    }

    /// Number of cataloged complexes (columns of the stoichiometry).
    pub fn num_complexes(&self) -> usize {
        self.a.ncols()
    }

    /// Stoichiometry matrix, strands x complexes.
    pub fn a(&self) -> &DMatrix<f64> {
        &self.a
    }

    /// Transposed stoichiometry, complexes x strands.
    pub fn at(&self) -> &DMatrix<f64> {
        &self.at
    }

    /// Free energies in kT units.
    pub fn g(&self) -> &DVector<f64> {
        &self.g
    }

    /// Target strand mole fractions.
    pub fn x0(&self) -> &DVector<f64> {
        &self.x0
    }

    /// Thermal energy (kcal/mol).
    pub fn kt(&self) -> f64 {
        self.kt
    }

    /// Moles of water per liter of solution.
    pub fn water_molarity(&self) -> f64 {
        self.water_molarity
    }

    /// Total strand count per complex.
    pub fn strand_counts(&self) -> &DVector<f64> {
        &self.strand_counts
    }

    /// Strands fixed in closed form, as (strand, singleton column) pairs.
    pub fn inert_pairs(&self) -> &[(usize, usize)] {
        &self.inert
    }
}
