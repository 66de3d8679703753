use crate::compute::evaluator::EvaluationError;
use crate::store::Operator;
use wide::f64x4;

/// Element-wise `lhs op rhs`, reusing the `lhs` buffer.
#[inline(always)]
pub fn apply(op: Operator, mut lhs: Vec<f64>, rhs: &[f64]) -> Result<Vec<f64>, EvaluationError> {
    if lhs.len() != rhs.len() {
        return Err(EvaluationError::ShapeMismatch { left: lhs.len(), right: rhs.len() });
    }
    match op {
        Operator::Add => zip_in_place(&mut lhs, rhs, |a, b| a + b, |a, b| a + b),
        Operator::Mul => zip_in_place(&mut lhs, rhs, |a, b| a * b, |a, b| a * b),
    }
    Ok(lhs)
}

#[inline(always)]
fn zip_in_place(
    dest: &mut [f64],
    src: &[f64],
    lanes: impl Fn(f64x4, f64x4) -> f64x4,
    scalar: impl Fn(f64, f64) -> f64,
) {
    let mut dest_chunks = dest.chunks_exact_mut(4);
    let mut src_chunks = src.chunks_exact(4);
    for (d, s) in (&mut dest_chunks).zip(&mut src_chunks) {
        let a = f64x4::from([d[0], d[1], d[2], d[3]]);
        let b = f64x4::from([s[0], s[1], s[2], s[3]]);
        d.copy_from_slice(&lanes(a, b).to_array());
    }
    for (d, s) in dest_chunks.into_remainder().iter_mut().zip(src_chunks.remainder()) {
        *d = scalar(*d, *s);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Operator::Add, 1)]
    #[case(Operator::Add, 4)]
    #[case(Operator::Mul, 7)]
    #[case(Operator::Mul, 12)]
    fn test_matches_scalar_loop(#[case] op: Operator, #[case] len: usize) {
        let lhs: Vec<f64> = (0..len).map(|i| i as f64 + 0.5).collect();
        let rhs: Vec<f64> = (0..len).map(|i| 2.0 - i as f64).collect();
        let expected: Vec<f64> = lhs.iter().zip(&rhs).map(|(a, b)| op.apply(*a, *b)).collect();
        assert_eq!(apply(op, lhs, &rhs).unwrap(), expected);
    }

    #[test]
    fn test_length_mismatch() {
        let err = apply(Operator::Add, vec![1.0; 3], &[1.0; 2]).unwrap_err();
        assert_eq!(err, EvaluationError::ShapeMismatch { left: 3, right: 2 });
    }
}
