// Simpson's rule integration
pub(crate) fn simpson_integration<F>(f: F, a: f64, b: f64, n: usize) -> f64
where
    F: Fn(f64) -> f64,
{
    let n = if n % 2 == 0 { n } else { n + 1 };
    let h = (b - a) / n as f64;

    let mut sum = f(a) + f(b);
    for i in 1..n {
        let x = a + i as f64 * h;
        sum += if i % 2 == 0 { 2.0 * f(x) } else { 4.0 * f(x) };
    }
    sum * h / 3.0
}

/// Radial overlap int_0^inf f(r) g(r) r^2 dr of two radial functions,
/// integrated on [0, rmax].
pub(crate) fn radial_overlap<F, G>(f: F, g: G, rmax: f64, n: usize) -> f64
where
    F: Fn(f64) -> f64,
    G: Fn(f64) -> f64,
{
    simpson_integration(|r| f(r) * g(r) * r * r, 0.0, rmax, n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simpson_polynomial() {
        // exact for cubics
        let v = simpson_integration(|x| x * x * x - 2.0 * x + 1.0, 0.0, 2.0, 10);
        assert!((v - 2.0).abs() < 1e-12, "got {}", v);
    }

    #[test]
    fn test_radial_overlap_gaussian() {
        // int_0^inf r^2 exp(-2 r^2) dr = sqrt(pi/2) / 8
        let v = radial_overlap(|r| (-r * r).exp(), |r| (-r * r).exp(), 12.0, 20_000);
        let exact = (std::f64::consts::PI / 2.0).sqrt() / 8.0;
        assert!((v - exact).abs() < 1e-9, "got {} expected {}", v, exact);
    }
}
