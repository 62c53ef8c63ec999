use crate::errors::{EndynError, EndynResult};
use crate::FloatValue;
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2, Axis};

/// Species without any prey.
pub fn producers(trophic: &Array2<bool>) -> Array1<bool> {
    trophic.map_axis(Axis(1), |row| !row.iter().any(|x| *x))
}

/// Prey-averaged trophic level of every species.
///
/// Producers sit at level 1 and every consumer one level above the mean level of its prey:
/// `TL_i = 1 + Σ_j A_ij TL_j / Σ_j A_ij`, solved as a linear system.
pub fn trophic_levels(trophic: &Array2<bool>) -> EndynResult<Array1<FloatValue>> {
    let n = trophic.nrows();
    if trophic.ncols() != n {
        return Err(EndynError::Error(format!(
            "Trophic levels need a square adjacency matrix, got {:?}",
            trophic.dim()
        )));
    }

    let mut system = DMatrix::<FloatValue>::identity(n, n);
    for (i, row) in trophic.outer_iter().enumerate() {
        let n_prey = row.iter().filter(|x| **x).count();
        if n_prey == 0 {
            continue;
        }
        for (j, eats) in row.iter().enumerate() {
            if *eats {
                system[(i, j)] -= 1.0 / n_prey as FloatValue;
            }
        }
    }

    let levels = system
        .lu()
        .solve(&DVector::from_element(n, 1.0))
        .ok_or_else(|| {
            EndynError::Error(
                "Trophic levels are undefined: some species do not feed on any producer"
                    .to_string(),
            )
        })?;
    Ok(Array1::from_iter(levels.iter().copied()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;
    use ndarray::array;

    #[test]
    fn chain_levels() {
        // 3 eats 2 eats 1
        let a = array![[false, false, false], [true, false, false], [false, true, false]];
        let tl = trophic_levels(&a).unwrap();
        assert!(is_close!(tl[0], 1.0));
        assert!(is_close!(tl[1], 2.0));
        assert!(is_close!(tl[2], 3.0));
        assert_eq!(producers(&a), array![true, false, false]);
    }

    #[test]
    fn omnivore_level() {
        // 3 eats both 1 and 2, 2 eats 1
        let a = array![[false, false, false], [true, false, false], [true, true, false]];
        let tl = trophic_levels(&a).unwrap();
        assert!(is_close!(tl[2], 2.5));
    }

    #[test]
    fn disconnected_loop_fails() {
        // 1 and 2 only eat each other
        let a = array![[false, true], [true, false]];
        assert!(trophic_levels(&a).is_err());
    }
}
