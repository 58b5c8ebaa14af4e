/// Lower bound of every percentage-style value (skills, mental state, tire wear, fuel level).
pub const PCT_MIN: f64 = 0.0;
/// Upper bound of every percentage-style value.
pub const PCT_MAX: f64 = 100.0;

/// clamp_pct clamps x into [0.0, 100.0]. NaN is mapped to 0.0 so that a single bad input cannot
/// poison later comparisons.
pub fn clamp_pct(x: f64) -> f64 {
    if x.is_nan() {
        PCT_MIN
    } else {
        x.clamp(PCT_MIN, PCT_MAX)
    }
}

/// argmax returns the index of the maximum value in the array x. The first index wins on ties.
/// Returns None for an empty array.
pub fn argmax<T: std::cmp::PartialOrd + std::marker::Copy>(x: &[T]) -> Option<usize> {
    let mut val_max = *x.first()?;
    let mut idx_max = 0;

    for (i, &val) in x.iter().enumerate().skip(1) {
        if val > val_max {
            val_max = val;
            idx_max = i;
        }
    }

    Some(idx_max)
}

/// max returns the maximum value in the array x, or None for an empty array.
pub fn max<T: std::cmp::PartialOrd + std::marker::Copy>(x: &[T]) -> Option<T> {
    let first = *x.first()?;
    Some(
        x.iter()
            .fold(first, |val_max, &val| if val_max > val { val_max } else { val }),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// argsort returns the indices that would sort an array. The sort is stable, so equal values keep
/// their original relative order.
pub fn argsort(x: &[f64], order: SortOrder) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..x.len()).collect();
    match order {
        SortOrder::Ascending => indices.sort_by(|&a, &b| x[a].total_cmp(&x[b])),
        SortOrder::Descending => indices.sort_by(|&a, &b| x[b].total_cmp(&x[a])),
    }
    indices
}

/// lin_interp returns the linearly interpolated value at x for given discrete data points xp, fp.
/// xp must be increasing and of the same length as fp. Values outside the data range are clamped
/// to the first/last value. Inspired by numpy.interp.
pub fn lin_interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    debug_assert_eq!(xp.len(), fp.len(), "Number of items in xp and fp must be equal!");

    let (first_x, first_f) = match (xp.first(), fp.first()) {
        (Some(&x0), Some(&f0)) => (x0, f0),
        _ => return 0.0,
    };

    if x <= first_x {
        return first_f;
    }

    for i in 1..xp.len().min(fp.len()) {
        if x <= xp[i] {
            return fp[i - 1] + (x - xp[i - 1]) * (fp[i] - fp[i - 1]) / (xp[i] - xp[i - 1]);
        }
    }

    fp.last().copied().unwrap_or(first_f)
}
