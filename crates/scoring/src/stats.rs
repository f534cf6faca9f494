/// Pearson product-moment correlation with a two-tailed significance level.
///
/// `r` and `p_value` are NaN when the correlation is undefined (fewer than
/// two points, mismatched lengths, or a constant series).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Correlation {
    pub r: f64,
    pub p_value: f64,
}

impl Correlation {
    const UNDEFINED: Correlation = Correlation {
        r: f64::NAN,
        p_value: f64::NAN,
    };
}

pub fn pearson(xs: &[f64], ys: &[f64]) -> Correlation {
    if xs.len() != ys.len() || xs.len() < 2 {
        return Correlation::UNDEFINED;
    }
    let n = xs.len();

    // With one degree of freedom the fit is exact and carries no evidence,
    // so the significance level is 1 and r collapses to a sign.
    if n == 2 {
        let dx = xs[1] - xs[0];
        let dy = ys[1] - ys[0];
        if dx == 0.0 || dy == 0.0 {
            return Correlation::UNDEFINED;
        }
        return Correlation {
            r: (dx * dy).signum(),
            p_value: 1.0,
        };
    }

    let mean_x = mean(xs);
    let mean_y = mean(ys);
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return Correlation::UNDEFINED;
    }

    let r = (cov / (var_x * var_y).sqrt()).clamp(-1.0, 1.0);
    let df = (n - 2) as f64;
    let p_value = if r.abs() == 1.0 {
        0.0
    } else {
        // Two-tailed p of the t statistic r * sqrt(df / (1 - r^2)), via the
        // regularised incomplete beta function.
        let t_sq = r * r * df / (1.0 - r * r);
        incomplete_beta(df / 2.0, 0.5, df / (df + t_sq))
    };
    Correlation { r, p_value }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Regularised incomplete beta function I_x(a, b).
fn incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let ln_front = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_continued_fraction(b, a, 1.0 - x) / b
    }
}

/// Continued-fraction expansion of the incomplete beta, evaluated with the
/// modified Lentz algorithm.
fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITER: usize = 200;
    const EPS: f64 = 3.0e-12;
    const TINY: f64 = 1.0e-30;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;
    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < TINY {
        d = TINY;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        h *= d * c;

        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < EPS {
            break;
        }
    }
    h
}

/// Lanczos approximation of ln Γ(x) for x > 0.
fn ln_gamma(x: f64) -> f64 {
    const COEFFS: [f64; 6] = [
        76.180_091_729_471_46,
        -86.505_320_329_416_77,
        24.014_098_240_830_91,
        -1.231_739_572_450_155,
        0.120_865_097_386_617_7e-2,
        -0.539_523_938_495_3e-5,
    ];
    let tmp = x + 5.5;
    let tmp = tmp - (x + 0.5) * tmp.ln();
    let mut series = 1.000_000_000_190_015;
    for (i, coeff) in COEFFS.iter().enumerate() {
        series += coeff / (x + 1.0 + i as f64);
    }
    -tmp + (2.506_628_274_631_000_5 * series / x).ln()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn perfect_linear_relation_has_r_one_p_zero() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        let ys = [2.0, 4.0, 6.0, 8.0];
        let c = pearson(&xs, &ys);
        assert_relative_eq!(c.r, 1.0);
        assert_eq!(c.p_value, 0.0);

        let neg = [8.0, 6.0, 4.0, 2.0];
        let c = pearson(&xs, &neg);
        assert_relative_eq!(c.r, -1.0);
        assert_eq!(c.p_value, 0.0);
    }

    #[test]
    fn moderate_correlation_matches_reference_values() {
        let xs = [1.0, 2.0, 3.0, 4.0, 5.0];
        let ys = [2.0, 1.0, 4.0, 3.0, 5.0];
        let c = pearson(&xs, &ys);
        assert_relative_eq!(c.r, 0.8);
        assert_relative_eq!(c.p_value, 0.104_088, max_relative = 1e-4);
    }

    #[test]
    fn two_points_collapse_to_sign_with_p_one() {
        let c = pearson(&[1.0, 3.0], &[5.0, 2.0]);
        assert_eq!(c.r, -1.0);
        assert_eq!(c.p_value, 1.0);

        let c = pearson(&[1.0, 3.0], &[2.0, 2.0]);
        assert!(c.r.is_nan());
    }

    #[test]
    fn degenerate_inputs_are_undefined() {
        assert!(pearson(&[], &[]).r.is_nan());
        assert!(pearson(&[1.0], &[2.0]).r.is_nan());
        assert!(pearson(&[1.0, 2.0, 3.0], &[1.0, 2.0]).r.is_nan());
        assert!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).r.is_nan());
    }

    #[test]
    fn ln_gamma_matches_known_values() {
        assert_relative_eq!(ln_gamma(1.0), 0.0, epsilon = 1e-9);
        assert_relative_eq!(ln_gamma(0.5), std::f64::consts::PI.sqrt().ln(), epsilon = 1e-9);
        assert_relative_eq!(ln_gamma(5.0), 24.0_f64.ln(), epsilon = 1e-9);
    }

    #[test]
    fn mean_of_empty_slice_is_nan() {
        assert!(mean(&[]).is_nan());
        assert_relative_eq!(mean(&[2.0, 4.0]), 3.0);
    }
}
