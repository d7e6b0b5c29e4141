use nalgebra::DVector;

pub mod validation;

/// Componentwise mean of equally sized vectors. Vectors whose length differs
/// from the first one are skipped; `None` when nothing is left to average.
pub fn mean_vector<'a, I>(vectors: I) -> Option<Vec<f32>>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut iter = vectors.into_iter();
    let first = iter.next()?;
    let dim = first.len();
    let mut sum = DVector::from_column_slice(first);
    let mut count = 1usize;

    for vector in iter {
        if vector.len() != dim {
            continue;
        }
        sum += DVector::from_column_slice(vector);
        count += 1;
    }

    if dim == 0 {
        return None;
    }

    sum /= count as f32;
    Some(sum.as_slice().to_vec())
}
