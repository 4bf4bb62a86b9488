use anyhow::{Result, bail};
use std::{fmt::Debug, ops::RangeBounds};

pub fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }

    Ok(())
}

/// Check that `prob` is a valid probability (NaN is rejected).
pub fn check_prob(prob: f64) -> Result<()> {
    check_num(prob, 0.0..=1.0)
}
