//! Series statistics: outlier trimming and the mean/median/mode reducers
//!
//! Reducers assume a non-empty series; callers check for emptiness first.

/// Remove samples further than two standard deviations from the median
///
/// Series with two or fewer samples are returned unmodified. Otherwise the
/// population standard deviation `sqrt(E[x²] - μ²)` is taken over the full
/// series and the survivors of `m - 2σ <= x <= m + 2σ` are returned in
/// ascending order (the filter runs over a value-sorted copy).
pub fn remove_outliers(series: &[f64]) -> Vec<f64> {
    if series.len() <= 2 {
        return series.to_vec();
    }

    let n = series.len() as f64;
    let (sum, squared_sum) = series
        .iter()
        .fold((0.0, 0.0), |(s, sq), x| (s + x, sq + x * x));
    let mean = sum / n;
    // Rounding can push the variance of a constant series just below zero.
    // An overflowed (NaN) variance stays NaN and trims everything.
    let variance = squared_sum / n - mean * mean;
    let std_dev = if variance < 0.0 { 0.0 } else { variance.sqrt() };

    let sorted = sorted_copy(series);
    let median = median_of_sorted(&sorted);
    let (low, high) = (median - 2.0 * std_dev, median + 2.0 * std_dev);

    sorted.into_iter().filter(|x| low <= *x && *x <= high).collect()
}

pub fn mean(series: &[f64]) -> f64 {
    if series.len() == 1 {
        return series[0];
    }
    series.iter().sum::<f64>() / series.len() as f64
}

pub fn median(series: &[f64]) -> f64 {
    median_of_sorted(&sorted_copy(series))
}

/// Most frequent exact value; the smallest value wins ties
pub fn mode(series: &[f64]) -> f64 {
    let sorted = sorted_copy(series);

    let mut best = (sorted[0], 0usize);
    let mut run = (sorted[0], 0usize);
    for &x in &sorted {
        if x == run.0 {
            run.1 += 1;
        } else {
            run = (x, 1);
        }
        if run.1 > best.1 {
            best = run;
        }
    }
    best.0
}

fn sorted_copy(series: &[f64]) -> Vec<f64> {
    let mut sorted = series.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

fn median_of_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}
