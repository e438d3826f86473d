//! Implements `Convert` functions between the wire representation of points (`[f64; 2]`) and the
//! `nalgebra` vectors used for geometry.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector2;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

pub trait Convert<O> {
    fn convert(&self) -> O;
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Convert<[f64; 2]> for Vector2<f64> {
    fn convert(&self) -> [f64; 2] {
        [self.x, self.y]
    }
}

impl Convert<Vector2<f64>> for [f64; 2] {
    fn convert(&self) -> Vector2<f64> {
        Vector2::new(self[0], self[1])
    }
}

impl<T, O> Convert<Vec<O>> for [T]
where
    T: Convert<O>,
{
    fn convert(&self) -> Vec<O> {
        self.iter().map(|t| t.convert()).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_convert_points() {
        let v = Vector2::new(1.5, -2.0);
        let a: [f64; 2] = v.convert();
        assert_eq!(a, [1.5, -2.0]);

        let back: Vector2<f64> = a.convert();
        assert_eq!(back, v);

        let many: Vec<[f64; 2]> = vec![v, Vector2::new(0.0, 3.0)].as_slice().convert();
        assert_eq!(many, vec![[1.5, -2.0], [0.0, 3.0]]);
    }
}
