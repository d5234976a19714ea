// utils.rs
use ndarray::Array2;

/// Print a 2D array as a matrix.
/// # Arguments
///     `a`:  Array2, matrix to print.
pub fn print_array2(a: &Array2<f64>) {
    let (nr, nc) = a.dim();
    for i in 0..nr {
        for j in 0..nc {
            print!("{:>12.6}", a[(i, j)]);
        }
        println!();
    }
}
